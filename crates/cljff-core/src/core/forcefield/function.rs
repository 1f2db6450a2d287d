use super::error::ConfigError;
use super::params::{CombiningRules, LjPairMatrix, LjParameter, LjParameterDb};
use super::soft::SoftParameters;
use super::term::CljEnergy;
use crate::core::models::atoms::CljAtom;
use crate::core::models::space::Space;
use nalgebra::Point3;
use std::fmt;
use std::sync::Arc;

/// State shared by every kernel: geometry, LJ parameters and how they are combined.
#[derive(Debug, Clone)]
pub struct CljFunctionBase {
    space: Space,
    combining_rules: CombiningRules,
    lj_params: Arc<LjParameterDb>,
    lj_pairs: LjPairMatrix,
}

impl CljFunctionBase {
    pub fn new(lj_params: Arc<LjParameterDb>, combining_rules: CombiningRules) -> Self {
        let lj_pairs = LjPairMatrix::new(&lj_params, combining_rules);
        Self {
            space: Space::Vacuum,
            combining_rules,
            lj_params,
            lj_pairs,
        }
    }

    pub fn space(&self) -> &Space {
        &self.space
    }

    pub fn combining_rules(&self) -> CombiningRules {
        self.combining_rules
    }

    pub fn lj_params(&self) -> &Arc<LjParameterDb> {
        &self.lj_params
    }

    pub fn lj_pairs(&self) -> &LjPairMatrix {
        &self.lj_pairs
    }

    pub(crate) fn set_space(&mut self, space: Space) {
        self.space = space;
    }

    pub(crate) fn set_combining_rules(&mut self, rules: CombiningRules) {
        if rules != self.combining_rules {
            self.combining_rules = rules;
            self.lj_pairs = LjPairMatrix::new(&self.lj_params, rules);
        }
    }

    pub(crate) fn set_lj_params(&mut self, lj_params: Arc<LjParameterDb>) {
        self.lj_pairs = LjPairMatrix::new(&lj_params, self.combining_rules);
        self.lj_params = lj_params;
    }
}

/// A pluggable Coulomb + Lennard-Jones kernel.
///
/// Implementors only describe the physics of a single pair through
/// [`CljFunction::pair_energy`] and which pairs count through
/// [`CljFunction::interacts`]. The pair loops themselves are provided and are
/// monomorphised per space, so vacuum evaluations never pay for the
/// minimum-image convention.
pub trait CljFunction: fmt::Debug + Send + Sync {
    /// Short kernel name used in logs and error messages.
    fn name(&self) -> &'static str;

    fn base(&self) -> &CljFunctionBase;

    fn base_mut(&mut self) -> &mut CljFunctionBase;

    fn box_clone(&self) -> Box<dyn CljFunction>;

    fn coulomb_cutoff(&self) -> f64;

    fn lj_cutoff(&self) -> f64;

    fn max_cutoff(&self) -> f64 {
        self.coulomb_cutoff().max(self.lj_cutoff())
    }

    /// Energy of one pair at distance `r` with reduced charge product `qq` and
    /// combined LJ parameter `lj`. Each term must be exactly zero at or beyond its cutoff.
    fn pair_energy(&self, r: f64, qq: f64, lj: &LjParameter) -> CljEnergy;

    /// Returns the `(coulomb, lj)` scale of the pair `a`-`b`, or `None` if the pair is skipped.
    ///
    /// Intermolecular kernels ignore pairs within the same molecule.
    #[inline]
    fn interacts(&self, a: &CljAtom, b: &CljAtom) -> Option<(f64, f64)> {
        if a.molecule == b.molecule {
            None
        } else {
            Some((1.0, 1.0))
        }
    }

    fn space(&self) -> &Space {
        self.base().space()
    }

    fn combining_rules(&self) -> CombiningRules {
        self.base().combining_rules()
    }

    fn lj_params(&self) -> &Arc<LjParameterDb> {
        self.base().lj_params()
    }

    /// Changes the space, checking that the current cutoffs fit inside a periodic box.
    fn set_space(&mut self, space: Space) -> Result<(), ConfigError> {
        space.validate_cutoff(self.max_cutoff())?;
        self.base_mut().set_space(space);
        Ok(())
    }

    fn set_combining_rules(&mut self, rules: CombiningRules) {
        self.base_mut().set_combining_rules(rules);
    }

    fn set_lj_params(&mut self, lj_params: Arc<LjParameterDb>) {
        self.base_mut().set_lj_params(lj_params);
    }

    fn set_cutoffs(&mut self, _coulomb: f64, _lj: f64) -> Result<(), ConfigError> {
        Err(ConfigError::Unsupported {
            function: self.name(),
            parameter: "cutoffs",
        })
    }

    fn soft_parameters(&self) -> Option<SoftParameters> {
        None
    }

    fn set_soft_parameters(&mut self, _params: SoftParameters) -> Result<(), ConfigError> {
        Err(ConfigError::Unsupported {
            function: self.name(),
            parameter: "soft-core parameters",
        })
    }

    /// Energy of all interacting pairs within `atoms`.
    fn calculate(&self, atoms: &[CljAtom]) -> CljEnergy {
        let cutoff = self.max_cutoff();
        let pairs = self.base().lj_pairs();
        let scale = |a: &CljAtom, b: &CljAtom| self.interacts(a, b);
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

    /// Energy of all interacting pairs with one atom in `a` and the other in `b`.
    fn calculate_between(&self, a: &[CljAtom], b: &[CljAtom]) -> CljEnergy {
        let cutoff = self.max_cutoff();
        let pairs = self.base().lj_pairs();
        let scale = |x: &CljAtom, y: &CljAtom| self.interacts(x, y);
        let pair = |r: f64, qq: f64, lj: &LjParameter| self.pair_energy(r, qq, lj);
        match self.space() {
            Space::Vacuum => cross_energy(a, b, pairs, cutoff, vacuum_distance, scale, pair),
            Space::Periodic(cell) => cross_energy(
                a,
                b,
                pairs,
                cutoff,
                |p, q| cell.min_image(p - q).norm(),
                scale,
                pair,
            ),
        }
    }
}

impl Clone for Box<dyn CljFunction> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

#[inline]
pub(crate) fn vacuum_distance(p: &Point3<f64>, q: &Point3<f64>) -> f64 {
    (p - q).norm()
}

pub(crate) fn self_energy<D, S, P>(
    atoms: &[CljAtom],
    pairs: &LjPairMatrix,
    cutoff: f64,
    distance: D,
    scale: S,
    pair: P,
) -> CljEnergy
where
    D: Fn(&Point3<f64>, &Point3<f64>) -> f64,
    S: Fn(&CljAtom, &CljAtom) -> Option<(f64, f64)>,
    P: Fn(f64, f64, &LjParameter) -> CljEnergy,
{
    let mut total = CljEnergy::ZERO;
    for (i, a) in atoms.iter().enumerate() {
        for b in &atoms[i + 1..] {
            accumulate(&mut total, a, b, pairs, cutoff, &distance, &scale, &pair);
        }
    }
    total
}

pub(crate) fn cross_energy<D, S, P>(
    a: &[CljAtom],
    b: &[CljAtom],
    pairs: &LjPairMatrix,
    cutoff: f64,
    distance: D,
    scale: S,
    pair: P,
) -> CljEnergy
where
    D: Fn(&Point3<f64>, &Point3<f64>) -> f64,
    S: Fn(&CljAtom, &CljAtom) -> Option<(f64, f64)>,
    P: Fn(f64, f64, &LjParameter) -> CljEnergy,
{
    let mut total = CljEnergy::ZERO;
    for x in a {
        for y in b {
            accumulate(&mut total, x, y, pairs, cutoff, &distance, &scale, &pair);
        }
    }
    total
}

#[inline(always)]
#[allow(clippy::too_many_arguments)]
fn accumulate<D, S, P>(
    total: &mut CljEnergy,
    a: &CljAtom,
    b: &CljAtom,
    pairs: &LjPairMatrix,
    cutoff: f64,
    distance: &D,
    scale: &S,
    pair: &P,
) where
    D: Fn(&Point3<f64>, &Point3<f64>) -> f64,
    S: Fn(&CljAtom, &CljAtom) -> Option<(f64, f64)>,
    P: Fn(f64, f64, &LjParameter) -> CljEnergy,
{
    let Some((coulomb_scale, lj_scale)) = scale(a, b) else {
        return;
    };
    let r = distance(&a.position, &b.position);
    if r >= cutoff {
        return;
    }
    let energy = pair(r, a.charge * b.charge, &pairs.get(a.lj_id, b.lj_id));
    total.coulomb += coulomb_scale * energy.coulomb;
    total.lj += lj_scale * energy.lj;
}
