use super::error::CljError;
use super::extractor::CljExtractor;
use super::workspace::{CljDelta, CljWorkspace};
use crate::core::boxes::{CljBoxes, box_length_for};
use crate::core::forcefield::intra::CljIntraFunction;
use crate::core::forcefield::params::LjParameterDb;
use crate::core::forcefield::term::CljEnergy;
use crate::core::models::atoms::CljAtoms;
use crate::core::models::ids::MolNum;
use crate::core::models::molecule::{Molecule, MoleculeView};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A set of molecules whose atoms live in one [`CljBoxes`].
///
/// Updates are staged in a [`CljWorkspace`] and only reach the boxes on
/// [`CljGroup::accept`]. Every fallible operation either succeeds completely or
/// leaves the group exactly as it was.
#[derive(Debug, Clone)]
pub struct CljGroup {
    lj_params: Arc<LjParameterDb>,
    boxes: CljBoxes,
    molecules: BTreeMap<MolNum, CljExtractor>,
    workspace: CljWorkspace,
    from_scratch: bool,
}

impl CljGroup {
    /// Creates an empty group whose boxes suit a kernel with the given largest cutoff.
    pub fn new(lj_params: Arc<LjParameterDb>, cutoff: f64) -> Self {
        Self {
            lj_params,
            boxes: CljBoxes::for_cutoff(cutoff),
            molecules: BTreeMap::new(),
            workspace: CljWorkspace::new(),
            from_scratch: true,
        }
    }

    pub fn lj_params(&self) -> &Arc<LjParameterDb> {
        &self.lj_params
    }

    pub fn boxes(&self) -> &CljBoxes {
        &self.boxes
    }

    pub fn workspace(&self) -> &CljWorkspace {
        &self.workspace
    }

    pub fn is_empty(&self) -> bool {
        self.molecules.is_empty()
    }

    pub fn n_molecules(&self) -> usize {
        self.molecules.len()
    }

    pub fn contains(&self, number: MolNum) -> bool {
        self.molecules.contains_key(&number)
    }

    /// The last accepted version of a molecule.
    pub fn molecule(&self, number: MolNum) -> Option<&Molecule> {
        self.molecules.get(&number).map(CljExtractor::molecule)
    }

    /// The newest version of a molecule, pending or accepted.
    pub fn current_molecule(&self, number: MolNum) -> Option<&Molecule> {
        match self.workspace.get(number) {
            Some(delta) => Some(&delta.new_molecule),
            None => self.molecule(number),
        }
    }

    pub fn molecules(&self) -> impl Iterator<Item = &Molecule> {
        self.molecules.values().map(CljExtractor::molecule)
    }

    pub fn extractors(&self) -> impl Iterator<Item = &CljExtractor> {
        self.molecules.values()
    }

    /// Every atom currently in the boxes.
    pub fn atoms(&self) -> CljAtoms {
        self.boxes.atoms()
    }

    /// Whether the next energy evaluation must start from scratch.
    pub fn recalculating_from_scratch(&self) -> bool {
        self.from_scratch
    }

    pub(crate) fn mark_calculated(&mut self) {
        self.from_scratch = false;
    }

    /// Adds a molecule and boxes its atoms immediately.
    pub fn add(&mut self, molecule: &(impl MoleculeView + ?Sized)) -> Result<(), CljError> {
        let atoms = self.prepare_add(molecule)?;
        self.insert(molecule, atoms);
        Ok(())
    }

    /// Runs every check of [`add`](Self::add) and returns the extracted atoms
    /// without changing the group.
    pub fn prepare_add(
        &self,
        molecule: &(impl MoleculeView + ?Sized),
    ) -> Result<CljAtoms, CljError> {
        let number = molecule.number();
        if self.contains(number) {
            return Err(CljError::DuplicateMolecule(number));
        }
        CljExtractor::extract(molecule, &self.lj_params)
    }

    /// Boxes atoms produced by [`prepare_add`](Self::prepare_add) for the same molecule.
    pub(crate) fn insert(&mut self, molecule: &(impl MoleculeView + ?Sized), atoms: CljAtoms) {
        let number = molecule.number();
        let indices = self.boxes.add(&atoms);
        debug!("Added {} with {} atoms", number, atoms.len());
        self.molecules.insert(
            number,
            CljExtractor::new(Molecule::from_view(molecule), atoms, indices),
        );
        self.from_scratch = true;
    }

    /// Stages a new version of a tracked molecule. The boxes are not touched.
    ///
    /// Updating a molecule that already has a pending change merges the two.
    pub fn update(&mut self, molecule: &(impl MoleculeView + ?Sized)) -> Result<(), CljError> {
        let delta = self.stage(molecule)?;
        self.workspace.record(delta);
        Ok(())
    }

    /// Extracts a new version of a tracked molecule and describes the change
    /// against its accepted version, without recording it.
    pub fn stage(&self, molecule: &(impl MoleculeView + ?Sized)) -> Result<CljDelta, CljError> {
        let number = molecule.number();
        self.molecules
            .get(&number)
            .ok_or(CljError::MoleculeNotFound(number))?
            .delta_to(molecule, &self.lj_params)
    }

    /// Removes a molecule and reports whether it was present.
    ///
    /// Any pending change to the molecule is discarded with it.
    pub fn remove(&mut self, number: MolNum) -> Result<bool, CljError> {
        let Some(extractor) = self.molecules.get(&number) else {
            return Ok(false);
        };
        self.boxes.remove(extractor.indices())?;
        self.molecules.remove(&number);
        self.workspace.discard(number);
        self.from_scratch = true;
        debug!("Removed {}", number);
        Ok(true)
    }

    pub fn needs_accepting(&self) -> bool {
        !self.workspace.is_empty()
    }

    /// New atoms of all pending changes.
    pub fn changed_atoms(&self) -> CljAtoms {
        self.workspace.changed_atoms()
    }

    /// Atoms the pending changes will replace.
    pub fn old_changed_atoms(&self) -> CljAtoms {
        self.workspace.old_changed_atoms()
    }

    /// Applies every pending change to the boxes.
    ///
    /// All old handles are validated first; on error the boxes, the molecules and
    /// the workspace are left untouched.
    pub fn accept(&mut self) -> Result<(), CljError> {
        if self.workspace.is_empty() {
            return Ok(());
        }
        self.boxes.validate(&self.workspace.old_indices())?;

        let deltas = self.workspace.take();
        debug!("Accepting {} pending molecule change(s)", deltas.len());
        for (number, delta) in deltas {
            let indices = self.boxes.apply(&delta.old_indices, &delta.new_atoms)?;
            if let Some(extractor) = self.molecules.get_mut(&number) {
                extractor.commit(delta, indices);
            }
        }
        Ok(())
    }

    /// Drops all pending changes; tracked molecules keep their accepted versions.
    pub fn discard_pending(&mut self) {
        if !self.workspace.is_empty() {
            debug!("Discarding {} pending molecule change(s)", self.workspace.len());
            self.workspace.clear();
        }
    }

    /// Drops all pending changes and flags the next evaluation as a full one.
    pub fn must_recalculate_from_scratch(&mut self) {
        self.discard_pending();
        self.from_scratch = true;
    }

    /// Rebuilds the boxes for a kernel with the given largest cutoff.
    ///
    /// Pending changes are discarded, since their box handles would not survive.
    pub fn rebox(&mut self, cutoff: f64) {
        let box_length = box_length_for(cutoff);
        self.discard_pending();
        info!(
            "Reboxing {} molecules with box length {:.3}",
            self.molecules.len(),
            box_length
        );
        let mut boxes = CljBoxes::with_box_length(box_length);
        for extractor in self.molecules.values_mut() {
            let indices = boxes.add(extractor.atoms());
            extractor.set_indices(indices);
        }
        self.boxes = boxes;
        self.from_scratch = true;
    }

    /// Switches to another LJ parameter table.
    ///
    /// Fails with [`CljError::MissingLjParameter`] if a tracked or pending atom uses
    /// a type the new table lacks.
    pub fn set_lj_params(&mut self, lj_params: Arc<LjParameterDb>) -> Result<(), CljError> {
        let pending = self.workspace.iter().map(|delta| &delta.new_atoms);
        let tracked = self.molecules.values().map(CljExtractor::atoms);
        for atoms in tracked.chain(pending) {
            if let Some(atom) = atoms.iter().find(|atom| !lj_params.contains(atom.lj_id)) {
                return Err(CljError::MissingLjParameter {
                    molecule: atom.molecule,
                    atom: atom.atom_index as usize,
                    lj_id: atom.lj_id,
                });
            }
        }
        self.lj_params = lj_params;
        self.from_scratch = true;
        Ok(())
    }

    /// Registers the exclusions of every tracked molecule with `function`, so the
    /// kernel can be evaluated over the boxes like any other [`CljFunction`].
    ///
    /// [`CljFunction`]: crate::core::forcefield::function::CljFunction
    pub fn register_exclusions(&self, function: &mut CljIntraFunction) {
        for extractor in self.molecules.values() {
            match extractor.exclusions() {
                Some(exclusions) => function.register(extractor.number(), exclusions.clone()),
                None => {
                    function.unregister(extractor.number());
                }
            }
        }
    }

    /// Intramolecular energy of every tracked molecule that has connectivity.
    pub fn intra_energy(&self, function: &CljIntraFunction) -> CljEnergy {
        self.molecules
            .values()
            .filter_map(|extractor| {
                extractor
                    .exclusions()
                    .map(|exclusions| function.calculate_molecule(extractor.atoms().as_slice(), exclusions))
            })
            .sum()
    }

    /// Change in intramolecular energy caused by the pending changes.
    pub fn intra_delta(&self, function: &CljIntraFunction) -> CljEnergy {
        self.workspace.iter().map(|delta| intra_change(function, delta)).sum()
    }
}

fn intra_change(function: &CljIntraFunction, delta: &CljDelta) -> CljEnergy {
    let new = delta
        .new_exclusions
        .as_ref()
        .map(|exclusions| function.calculate_molecule(delta.new_atoms.as_slice(), exclusions))
        .unwrap_or_default();
    let old = delta
        .old_exclusions
        .as_ref()
        .map(|exclusions| function.calculate_molecule(delta.old_atoms.as_slice(), exclusions))
        .unwrap_or_default();
    new - old
}
