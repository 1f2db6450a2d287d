use super::ids::{LjId, MolNum};
use nalgebra::{Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoleculeError {
    #[error("Bond ({0}, {1}) references an atom outside a molecule of {2} atoms")]
    BondOutOfRange(usize, usize, usize),
    #[error("Atom {0} cannot be bonded to itself")]
    SelfBond(usize),
}

/// Bonded connectivity of a single molecule.
///
/// Only the bond graph is stored; angle and dihedral relationships are derived
/// from it by graph distance when an exclusion matrix is built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Connectivity {
    adjacency: Vec<Vec<usize>>,
}

impl Connectivity {
    /// Creates an unbonded connectivity for `n_atoms` atoms.
    pub fn new(n_atoms: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); n_atoms],
        }
    }

    /// Builds a connectivity from a list of bonded atom-index pairs.
    ///
    /// # Errors
    ///
    /// Returns [`MoleculeError`] if a bond references a missing atom or bonds an atom to itself.
    pub fn from_bonds(
        n_atoms: usize,
        bonds: impl IntoIterator<Item = (usize, usize)>,
    ) -> Result<Self, MoleculeError> {
        let mut connectivity = Self::new(n_atoms);
        for (i, j) in bonds {
            connectivity.add_bond(i, j)?;
        }
        Ok(connectivity)
    }

    /// Adds a bond between atoms `i` and `j`. Duplicate bonds are ignored.
    pub fn add_bond(&mut self, i: usize, j: usize) -> Result<(), MoleculeError> {
        let n_atoms = self.adjacency.len();
        if i >= n_atoms || j >= n_atoms {
            return Err(MoleculeError::BondOutOfRange(i, j, n_atoms));
        }
        if i == j {
            return Err(MoleculeError::SelfBond(i));
        }
        if !self.adjacency[i].contains(&j) {
            self.adjacency[i].push(j);
            self.adjacency[j].push(i);
        }
        Ok(())
    }

    pub fn n_atoms(&self) -> usize {
        self.adjacency.len()
    }

    /// Atoms directly bonded to `atom`.
    pub fn neighbours(&self, atom: usize) -> &[usize] {
        self.adjacency.get(atom).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn n_bonds(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }
}

/// The narrow view of a molecule that the non-bonded engine consumes.
///
/// Implementors expose parallel per-atom arrays. All arrays must have the same
/// length; a mismatch is reported as an incompatibility during extraction.
pub trait MoleculeView {
    /// The stable number identifying this molecule.
    fn number(&self) -> MolNum;

    /// Per-atom coordinates in Angstroms.
    fn coordinates(&self) -> &[Point3<f64>];

    /// Per-atom partial charges in elementary charge units.
    fn charges(&self) -> &[f64];

    /// Per-atom Lennard-Jones types.
    fn lj_types(&self) -> &[LjId];

    /// Bond graph, needed only by the intramolecular kernel.
    fn connectivity(&self) -> Option<&Connectivity> {
        None
    }

    fn n_atoms(&self) -> usize {
        self.coordinates().len()
    }
}

/// A minimal owned molecule implementing [`MoleculeView`].
///
/// The engine keeps one of these per tracked molecule as the last accepted
/// snapshot, which is what a rejected change rolls back to.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Molecule {
    number: MolNum,
    coordinates: Vec<Point3<f64>>,
    charges: Vec<f64>,
    lj_types: Vec<LjId>,
    connectivity: Option<Connectivity>,
}

impl Molecule {
    /// Creates an empty molecule with the given number.
    pub fn new(number: MolNum) -> Self {
        Self {
            number,
            ..Self::default()
        }
    }

    /// Appends an atom and returns its index.
    ///
    /// # Arguments
    ///
    /// * `position` - The atom position in Angstroms.
    /// * `charge` - The partial charge in elementary charge units.
    /// * `lj_type` - The Lennard-Jones type of the atom.
    pub fn push_atom(&mut self, position: Point3<f64>, charge: f64, lj_type: LjId) -> usize {
        self.coordinates.push(position);
        self.charges.push(charge);
        self.lj_types.push(lj_type);
        self.coordinates.len() - 1
    }

    /// Builder-style variant of [`Molecule::push_atom`].
    pub fn with_atom(mut self, position: Point3<f64>, charge: f64, lj_type: LjId) -> Self {
        self.push_atom(position, charge, lj_type);
        self
    }

    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    pub fn set_connectivity(&mut self, connectivity: Option<Connectivity>) {
        self.connectivity = connectivity;
    }

    /// Copies any molecule view into an owned snapshot.
    pub fn from_view(view: &(impl MoleculeView + ?Sized)) -> Self {
        Self {
            number: view.number(),
            coordinates: view.coordinates().to_vec(),
            charges: view.charges().to_vec(),
            lj_types: view.lj_types().to_vec(),
            connectivity: view.connectivity().cloned(),
        }
    }

    pub fn coordinates_mut(&mut self) -> &mut [Point3<f64>] {
        &mut self.coordinates
    }

    pub fn charges_mut(&mut self) -> &mut [f64] {
        &mut self.charges
    }

    /// Rigidly translates every atom by `shift`.
    pub fn translate(&mut self, shift: &Vector3<f64>) {
        for position in &mut self.coordinates {
            *position += *shift;
        }
    }

    /// Returns a translated copy of this molecule.
    pub fn translated(&self, shift: &Vector3<f64>) -> Self {
        let mut moved = self.clone();
        moved.translate(shift);
        moved
    }

    /// Geometric centre of the molecule, or `None` if it has no atoms.
    pub fn centre(&self) -> Option<Point3<f64>> {
        if self.coordinates.is_empty() {
            return None;
        }
        let sum = self
            .coordinates
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Some(Point3::from(sum / self.coordinates.len() as f64))
    }
}

impl MoleculeView for Molecule {
    fn number(&self) -> MolNum {
        self.number
    }

    fn coordinates(&self) -> &[Point3<f64>] {
        &self.coordinates
    }

    fn charges(&self) -> &[f64] {
        &self.charges
    }

    fn lj_types(&self) -> &[LjId] {
        &self.lj_types
    }

    fn connectivity(&self) -> Option<&Connectivity> {
        self.connectivity.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_records_bonds_symmetrically() {
        let connectivity = Connectivity::from_bonds(3, [(0, 1), (1, 2)]).unwrap();
        assert_eq!(connectivity.neighbours(1), &[0, 2]);
        assert_eq!(connectivity.neighbours(0), &[1]);
        assert_eq!(connectivity.n_bonds(), 2);
    }

    #[test]
    fn connectivity_ignores_duplicate_bonds() {
        let connectivity = Connectivity::from_bonds(2, [(0, 1), (1, 0)]).unwrap();
        assert_eq!(connectivity.n_bonds(), 1);
    }

    #[test]
    fn connectivity_rejects_invalid_bonds() {
        assert_eq!(
            Connectivity::from_bonds(2, [(0, 2)]),
            Err(MoleculeError::BondOutOfRange(0, 2, 2))
        );
        assert_eq!(
            Connectivity::from_bonds(2, [(1, 1)]),
            Err(MoleculeError::SelfBond(1))
        );
    }

    #[test]
    fn molecule_builder_keeps_arrays_parallel() {
        let molecule = Molecule::new(MolNum(5))
            .with_atom(Point3::new(0.0, 0.0, 0.0), 0.5, LjId(0))
            .with_atom(Point3::new(1.0, 0.0, 0.0), -0.5, LjId(1));
        assert_eq!(molecule.number(), MolNum(5));
        assert_eq!(molecule.n_atoms(), 2);
        assert_eq!(molecule.charges(), &[0.5, -0.5]);
        assert_eq!(molecule.lj_types(), &[LjId(0), LjId(1)]);
        assert!(molecule.connectivity().is_none());
    }

    #[test]
    fn translate_moves_every_atom_and_centre() {
        let mut molecule = Molecule::new(MolNum(1))
            .with_atom(Point3::new(0.0, 0.0, 0.0), 0.0, LjId(0))
            .with_atom(Point3::new(2.0, 0.0, 0.0), 0.0, LjId(0));
        molecule.translate(&Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(molecule.coordinates()[1], Point3::new(2.0, 1.0, 0.0));
        assert_eq!(molecule.centre(), Some(Point3::new(1.0, 1.0, 0.0)));
    }

    #[test]
    fn from_view_copies_everything() {
        let original = Molecule::new(MolNum(2))
            .with_atom(Point3::new(1.0, 2.0, 3.0), 1.0, LjId(3))
            .with_connectivity(Connectivity::new(1));
        let copy = Molecule::from_view(&original);
        assert_eq!(copy, original);
    }
}
