use crate::core::boxes::CljBoxIndex;
use crate::core::forcefield::intra::ExclusionMatrix;
use crate::core::models::atoms::CljAtoms;
use crate::core::models::ids::MolNum;
use crate::core::models::molecule::Molecule;
use std::collections::BTreeMap;
use std::collections::btree_map::Values;
use std::sync::Arc;
use tracing::debug;

/// A pending, un-accepted change to one molecule.
#[derive(Debug, Clone)]
pub struct CljDelta {
    pub molecule: MolNum,
    /// Box handles of the atoms the change will vacate.
    pub old_indices: Vec<CljBoxIndex>,
    pub old_atoms: CljAtoms,
    pub new_atoms: CljAtoms,
    pub new_molecule: Molecule,
    pub old_exclusions: Option<Arc<ExclusionMatrix>>,
    pub new_exclusions: Option<Arc<ExclusionMatrix>>,
}

/// The set of pending molecule changes of a group, at most one per molecule.
///
/// Empty in steady state. Boxes are never touched while a change sits here.
#[derive(Debug, Clone, Default)]
pub struct CljWorkspace {
    deltas: BTreeMap<MolNum, CljDelta>,
}

impl CljWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn contains(&self, molecule: MolNum) -> bool {
        self.deltas.contains_key(&molecule)
    }

    pub fn get(&self, molecule: MolNum) -> Option<&CljDelta> {
        self.deltas.get(&molecule)
    }

    pub fn iter(&self) -> Values<'_, MolNum, CljDelta> {
        self.deltas.values()
    }

    /// Records a change.
    ///
    /// A second change to a molecule that is already pending is merged: the
    /// original old side is kept and only the new side is replaced.
    pub fn record(&mut self, delta: CljDelta) {
        match self.deltas.get_mut(&delta.molecule) {
            Some(pending) => {
                debug!("Merging repeated update of {} into pending delta", delta.molecule);
                pending.new_atoms = delta.new_atoms;
                pending.new_molecule = delta.new_molecule;
                pending.new_exclusions = delta.new_exclusions;
            }
            None => {
                self.deltas.insert(delta.molecule, delta);
            }
        }
    }

    /// Drops the pending change to `molecule`, if any.
    pub fn discard(&mut self, molecule: MolNum) -> Option<CljDelta> {
        self.deltas.remove(&molecule)
    }

    pub fn clear(&mut self) {
        self.deltas.clear();
    }

    pub(crate) fn take(&mut self) -> BTreeMap<MolNum, CljDelta> {
        std::mem::take(&mut self.deltas)
    }

    /// New atoms of every pending change, merged in molecule order.
    pub fn changed_atoms(&self) -> CljAtoms {
        let mut atoms = CljAtoms::new();
        for delta in self.deltas.values() {
            atoms.extend_from(&delta.new_atoms);
        }
        atoms
    }

    /// Old atoms of every pending change, merged in molecule order.
    pub fn old_changed_atoms(&self) -> CljAtoms {
        let mut atoms = CljAtoms::new();
        for delta in self.deltas.values() {
            atoms.extend_from(&delta.old_atoms);
        }
        atoms
    }

    /// Every box handle that accepting the workspace will vacate.
    pub fn old_indices(&self) -> Vec<CljBoxIndex> {
        self.deltas
            .values()
            .flat_map(|delta| delta.old_indices.iter().copied())
            .collect()
    }
}
