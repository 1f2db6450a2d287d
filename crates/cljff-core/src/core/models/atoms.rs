use super::ids::{LjId, MolNum};
use crate::core::forcefield::potentials::COULOMB_CONSTANT;
use nalgebra::Point3;

/// Converts a partial charge in elementary charge units into a reduced charge.
///
/// Reduced charges already carry the square root of the Coulomb constant, so the
/// electrostatic energy of a pair is simply `q1 * q2 / r` in kcal/mol.
#[inline]
pub fn reduce_charge(charge: f64) -> f64 {
    charge * COULOMB_CONSTANT.sqrt()
}

/// A single atom as seen by the non-bonded kernels.
///
/// This is a compact, copyable record extracted from a molecule. It is never
/// edited in place: when the source molecule changes, a new record replaces it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CljAtom {
    /// Cartesian position in Angstroms.
    pub position: Point3<f64>,
    /// Reduced partial charge (see [`reduce_charge`]).
    pub charge: f64,
    /// Lennard-Jones atom type.
    pub lj_id: LjId,
    /// Number of the molecule that owns this atom.
    pub molecule: MolNum,
    /// Index of the atom inside its molecule.
    pub atom_index: u32,
}

impl CljAtom {
    /// Creates a new atom record.
    ///
    /// # Arguments
    ///
    /// * `position` - The atom position in Angstroms.
    /// * `charge` - The reduced partial charge.
    /// * `lj_id` - The Lennard-Jones type of the atom.
    /// * `molecule` - The number of the owning molecule.
    /// * `atom_index` - The index of the atom within the owning molecule.
    pub fn new(
        position: Point3<f64>,
        charge: f64,
        lj_id: LjId,
        molecule: MolNum,
        atom_index: u32,
    ) -> Self {
        Self {
            position,
            charge,
            lj_id,
            molecule,
            atom_index,
        }
    }
}

/// An ordered collection of [`CljAtom`] records.
///
/// A `CljAtoms` may hold one molecule, part of a molecule or an arbitrary merged
/// set. Order matters only in that it corresponds slot-for-slot with the box
/// indices returned when the set is added to a [`CljBoxes`](crate::core::boxes::CljBoxes).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CljAtoms {
    atoms: Vec<CljAtom>,
}

impl CljAtoms {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty set with room for `capacity` atoms.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            atoms: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, atom: CljAtom) {
        self.atoms.push(atom);
    }

    /// Appends every atom of `other` to this set.
    pub fn extend_from(&mut self, other: &CljAtoms) {
        self.atoms.extend_from_slice(&other.atoms);
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn as_slice(&self) -> &[CljAtom] {
        &self.atoms
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CljAtom> {
        self.atoms.iter()
    }

    /// Returns the axis-aligned bounding box of the set as `(min, max)`.
    ///
    /// # Return
    ///
    /// `None` when the set is empty.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        bounding_box_of(self.atoms.iter())
    }
}

pub(crate) fn bounding_box_of<'a>(
    atoms: impl Iterator<Item = &'a CljAtom>,
) -> Option<(Point3<f64>, Point3<f64>)> {
    atoms.fold(None, |acc, atom| {
        let p = atom.position;
        Some(match acc {
            None => (p, p),
            Some((min, max)) => (
                Point3::from(min.coords.inf(&p.coords)),
                Point3::from(max.coords.sup(&p.coords)),
            ),
        })
    })
}

impl From<Vec<CljAtom>> for CljAtoms {
    fn from(atoms: Vec<CljAtom>) -> Self {
        Self { atoms }
    }
}

impl FromIterator<CljAtom> for CljAtoms {
    fn from_iter<I: IntoIterator<Item = CljAtom>>(iter: I) -> Self {
        Self {
            atoms: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CljAtoms {
    type Item = &'a CljAtom;
    type IntoIter = std::slice::Iter<'a, CljAtom>;

    fn into_iter(self) -> Self::IntoIter {
        self.atoms.iter()
    }
}

impl AsRef<[CljAtom]> for CljAtoms {
    fn as_ref(&self) -> &[CljAtom] {
        &self.atoms
    }
}
