use super::cutoff::CljCutoffFunction;
use super::error::ConfigError;
use super::function::{CljFunction, CljFunctionBase, self_energy, vacuum_distance};
use super::params::{CombiningRules, LjParameter, LjParameterDb};
use super::term::CljEnergy;
use crate::core::models::atoms::CljAtom;
use crate::core::models::ids::MolNum;
use crate::core::models::molecule::Connectivity;
use crate::core::models::space::Space;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

/// Default 1-4 scale factors `(coulomb, lj)`.
pub const DEFAULT_SCALE_14: (f64, f64) = (1.0 / 1.2, 0.5);

const MAX_SEPARATION: u8 = 3;

#[inline]
fn pair_key(i: u32, j: u32) -> u64 {
    let (lo, hi) = if i < j { (i, j) } else { (j, i) };
    ((lo as u64) << 32) | hi as u64
}

/// Bond separations of all atom pairs within three bonds of each other.
///
/// Pairs one or two bonds apart are excluded from the intramolecular energy and
/// pairs exactly three bonds apart are scaled. Everything else interacts fully.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExclusionMatrix {
    separations: HashMap<u64, u8>,
}

impl ExclusionMatrix {
    /// Builds the matrix with a breadth-first search from every atom.
    pub fn from_connectivity(connectivity: &Connectivity) -> Self {
        let n_atoms = connectivity.n_atoms();
        let mut separations = HashMap::new();
        let mut depth = vec![u8::MAX; n_atoms];
        let mut queue = VecDeque::new();

        for start in 0..n_atoms {
            depth.fill(u8::MAX);
            depth[start] = 0;
            queue.clear();
            queue.push_back(start);

            while let Some(atom) = queue.pop_front() {
                let d = depth[atom];
                if d == MAX_SEPARATION {
                    continue;
                }
                for &next in connectivity.neighbours(atom) {
                    if depth[next] == u8::MAX {
                        depth[next] = d + 1;
                        queue.push_back(next);
                        if next > start {
                            separations.insert(pair_key(start as u32, next as u32), d + 1);
                        }
                    }
                }
            }
        }
        Self { separations }
    }

    /// Number of bonds on the shortest path between `i` and `j`, if at most three.
    pub fn separation(&self, i: u32, j: u32) -> Option<u8> {
        self.separations.get(&pair_key(i, j)).copied()
    }

    /// `(coulomb, lj)` scale of the pair, or `None` when it is excluded.
    #[inline]
    pub fn scale(&self, i: u32, j: u32, scale14: (f64, f64)) -> Option<(f64, f64)> {
        if i == j {
            return None;
        }
        match self.separation(i, j) {
            Some(1) | Some(2) => None,
            Some(_) => Some(scale14),
            None => Some((1.0, 1.0)),
        }
    }

    pub fn n_excluded(&self) -> usize {
        self.separations.values().filter(|&&d| d < MAX_SEPARATION).count()
    }

    pub fn n_scaled(&self) -> usize {
        self.separations.values().filter(|&&d| d == MAX_SEPARATION).count()
    }
}

/// Intramolecular kernel: cutoff physics restricted to pairs within one
/// molecule, with bonded exclusions and 1-4 scaling.
///
/// As a [`CljFunction`] it looks up each molecule's [`ExclusionMatrix`] in its own
/// table; molecules without a registered matrix contribute nothing.
#[derive(Debug, Clone)]
pub struct CljIntraFunction {
    hard: CljCutoffFunction,
    scale14: (f64, f64),
    exclusions: BTreeMap<MolNum, Arc<ExclusionMatrix>>,
}

impl CljIntraFunction {
    pub fn new(lj_params: Arc<LjParameterDb>, combining_rules: CombiningRules) -> Self {
        Self {
            hard: CljCutoffFunction::new(lj_params, combining_rules),
            scale14: DEFAULT_SCALE_14,
            exclusions: BTreeMap::new(),
        }
    }

    pub fn with_cutoffs(mut self, coulomb: f64, lj: f64) -> Result<Self, ConfigError> {
        self.hard.set_cutoffs(coulomb, lj)?;
        Ok(self)
    }

    pub fn with_scale14(mut self, coulomb: f64, lj: f64) -> Self {
        self.scale14 = (coulomb, lj);
        self
    }

    pub fn scale14(&self) -> (f64, f64) {
        self.scale14
    }

    pub fn set_scale14(&mut self, coulomb: f64, lj: f64) {
        self.scale14 = (coulomb, lj);
    }

    /// Registers the exclusions used for pairs inside molecule `molecule`.
    pub fn register(&mut self, molecule: MolNum, exclusions: Arc<ExclusionMatrix>) {
        self.exclusions.insert(molecule, exclusions);
    }

    pub fn unregister(&mut self, molecule: MolNum) -> Option<Arc<ExclusionMatrix>> {
        self.exclusions.remove(&molecule)
    }

    pub fn exclusions(&self, molecule: MolNum) -> Option<&Arc<ExclusionMatrix>> {
        self.exclusions.get(&molecule)
    }

    #[inline]
    fn scale_within(
        &self,
        a: &CljAtom,
        b: &CljAtom,
        exclusions: Option<&ExclusionMatrix>,
    ) -> Option<(f64, f64)> {
        if a.molecule != b.molecule {
            return None;
        }
        exclusions?.scale(a.atom_index, b.atom_index, self.scale14)
    }

    /// Intramolecular energy of one molecule's atoms using `exclusions` instead of
    /// the registered table.
    ///
    /// Atom pairs are looked up in `exclusions` by their intra-molecule index.
    /// Pairs from different molecules never contribute.
    pub fn calculate_molecule(&self, atoms: &[CljAtom], exclusions: &ExclusionMatrix) -> CljEnergy {
        let cutoff = self.max_cutoff();
        let pairs = self.base().lj_pairs();
        let scale = |a: &CljAtom, b: &CljAtom| self.scale_within(a, b, Some(exclusions));
        let pair = |r: f64, qq: f64, lj: &LjParameter| self.pair_energy(r, qq, lj);
        match self.space() {
            Space::Vacuum => self_energy(atoms, pairs, cutoff, vacuum_distance, scale, pair),
            Space::Periodic(cell) => self_energy(
                atoms,
                pairs,
                cutoff,
                |p, q| cell.min_image(p - q).norm(),
                scale,
                pair,
            ),
        }
    }
}

impl CljFunction for CljIntraFunction {
    fn name(&self) -> &'static str {
        "intra"
    }

    fn base(&self) -> &CljFunctionBase {
        self.hard.base()
    }

    fn base_mut(&mut self) -> &mut CljFunctionBase {
        self.hard.base_mut()
    }

    fn box_clone(&self) -> Box<dyn CljFunction> {
        Box::new(self.clone())
    }

    fn coulomb_cutoff(&self) -> f64 {
        self.hard.coulomb_cutoff()
    }

    fn lj_cutoff(&self) -> f64 {
        self.hard.lj_cutoff()
    }

    #[inline]
    fn pair_energy(&self, r: f64, qq: f64, lj: &LjParameter) -> CljEnergy {
        self.hard.pair_energy(r, qq, lj)
    }

    #[inline]
    fn interacts(&self, a: &CljAtom, b: &CljAtom) -> Option<(f64, f64)> {
        let exclusions = self.exclusions.get(&a.molecule).map(Arc::as_ref);
        self.scale_within(a, b, exclusions)
    }

    fn set_cutoffs(&mut self, coulomb: f64, lj: f64) -> Result<(), ConfigError> {
        self.hard.set_cutoffs(coulomb, lj)
    }
}
