use super::error::CljError;
use super::workspace::CljDelta;
use crate::core::boxes::CljBoxIndex;
use crate::core::forcefield::intra::ExclusionMatrix;
use crate::core::forcefield::params::LjParameterDb;
use crate::core::models::atoms::{CljAtom, CljAtoms, reduce_charge};
use crate::core::models::ids::MolNum;
use crate::core::models::molecule::{Molecule, MoleculeView};
use std::sync::Arc;

/// Tracks one molecule inside a [`CljGroup`](super::group::CljGroup).
///
/// Holds the last accepted snapshot of the molecule, the atoms extracted from it
/// and the box handles of those atoms, slot for slot.
#[derive(Debug, Clone)]
pub struct CljExtractor {
    molecule: Molecule,
    atoms: CljAtoms,
    indices: Vec<CljBoxIndex>,
    exclusions: Option<Arc<ExclusionMatrix>>,
}

impl CljExtractor {
    /// Extracts the CLJ atoms of `view`.
    ///
    /// # Errors
    ///
    /// Returns [`CljError::Incompatible`] if the per-atom arrays disagree in length
    /// or a coordinate or charge is not finite, and [`CljError::MissingLjParameter`]
    /// if an atom uses an LJ type missing from `lj_params`.
    pub fn extract(
        view: &(impl MoleculeView + ?Sized),
        lj_params: &LjParameterDb,
    ) -> Result<CljAtoms, CljError> {
        let molecule = view.number();
        let coordinates = view.coordinates();
        let charges = view.charges();
        let lj_types = view.lj_types();

        if charges.len() != coordinates.len() || lj_types.len() != coordinates.len() {
            return Err(CljError::Incompatible {
                molecule,
                reason: format!(
                    "{} coordinates, {} charges and {} LJ types",
                    coordinates.len(),
                    charges.len(),
                    lj_types.len()
                ),
            });
        }
        if let Some(connectivity) = view.connectivity() {
            if connectivity.n_atoms() != coordinates.len() {
                return Err(CljError::Incompatible {
                    molecule,
                    reason: format!(
                        "connectivity covers {} atoms but the molecule has {}",
                        connectivity.n_atoms(),
                        coordinates.len()
                    ),
                });
            }
        }

        let mut atoms = CljAtoms::with_capacity(coordinates.len());
        for (i, ((position, &charge), &lj_id)) in
            coordinates.iter().zip(charges).zip(lj_types).enumerate()
        {
            if !lj_params.contains(lj_id) {
                return Err(CljError::MissingLjParameter {
                    molecule,
                    atom: i,
                    lj_id,
                });
            }
            if !(position.coords.iter().all(|c| c.is_finite()) && charge.is_finite()) {
                return Err(CljError::Incompatible {
                    molecule,
                    reason: format!("atom {i} has a non-finite coordinate or charge"),
                });
            }
            atoms.push(CljAtom::new(
                *position,
                reduce_charge(charge),
                lj_id,
                molecule,
                i as u32,
            ));
        }
        Ok(atoms)
    }

    pub(crate) fn new(molecule: Molecule, atoms: CljAtoms, indices: Vec<CljBoxIndex>) -> Self {
        let exclusions = exclusions_of(&molecule);
        Self {
            molecule,
            atoms,
            indices,
            exclusions,
        }
    }

    pub fn number(&self) -> MolNum {
        self.molecule.number()
    }

    /// The last accepted snapshot of the molecule.
    pub fn molecule(&self) -> &Molecule {
        &self.molecule
    }

    pub fn atoms(&self) -> &CljAtoms {
        &self.atoms
    }

    pub fn indices(&self) -> &[CljBoxIndex] {
        &self.indices
    }

    pub fn exclusions(&self) -> Option<&Arc<ExclusionMatrix>> {
        self.exclusions.as_ref()
    }

    /// Extracts `view` as a replacement for the tracked molecule and describes the change.
    ///
    /// Nothing in `self` is modified.
    pub(crate) fn delta_to(
        &self,
        view: &(impl MoleculeView + ?Sized),
        lj_params: &LjParameterDb,
    ) -> Result<CljDelta, CljError> {
        let number = self.number();
        if view.number() != number {
            return Err(CljError::Incompatible {
                molecule: number,
                reason: format!("update carries molecule number {}", view.number()),
            });
        }
        if view.n_atoms() != self.atoms.len() {
            return Err(CljError::Incompatible {
                molecule: number,
                reason: format!(
                    "expected {} atoms, got {}",
                    self.atoms.len(),
                    view.n_atoms()
                ),
            });
        }
        let new_atoms = Self::extract(view, lj_params)?;
        let new_molecule = Molecule::from_view(view);
        let new_exclusions = if new_molecule.connectivity() == self.molecule.connectivity() {
            self.exclusions.clone()
        } else {
            exclusions_of(&new_molecule)
        };

        Ok(CljDelta {
            molecule: number,
            old_indices: self.indices.clone(),
            old_atoms: self.atoms.clone(),
            new_atoms,
            new_molecule,
            old_exclusions: self.exclusions.clone(),
            new_exclusions,
        })
    }

    /// Makes an accepted delta the tracked state.
    pub(crate) fn commit(&mut self, delta: CljDelta, indices: Vec<CljBoxIndex>) {
        self.molecule = delta.new_molecule;
        self.atoms = delta.new_atoms;
        self.exclusions = delta.new_exclusions;
        self.indices = indices;
    }

    pub(crate) fn set_indices(&mut self, indices: Vec<CljBoxIndex>) {
        self.indices = indices;
    }
}

fn exclusions_of(molecule: &Molecule) -> Option<Arc<ExclusionMatrix>> {
    molecule
        .connectivity()
        .map(|connectivity| Arc::new(ExclusionMatrix::from_connectivity(connectivity)))
}
