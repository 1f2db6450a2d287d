use crate::core::models::atoms::{CljAtom, CljAtoms, bounding_box_of};
use crate::core::models::ids::AtomSlot;
use crate::core::models::space::Space;
use itertools::Itertools;
use nalgebra::{Point3, Vector3};
use slotmap::SlotMap;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Box length used when the cutoff gives no usable length (infinite, zero or huge).
pub const DEFAULT_BOX_LENGTH: f64 = 7.5;
/// Smallest box length ever used.
pub const MIN_BOX_LENGTH: f64 = 1.0;

const MAX_CUTOFF_BOX_LENGTH: f64 = 1.0e6;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BoxError {
    #[error("Box index {0:?} does not refer to a stored atom")]
    InvalidIndex(CljBoxIndex),
    #[error("Box index {0:?} was given more than once")]
    DuplicateIndex(CljBoxIndex),
}

/// Integer coordinate of a box on the cubic grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoxCoord {
    pub i: i32,
    pub j: i32,
    pub k: i32,
}

impl BoxCoord {
    pub fn new(i: i32, j: i32, k: i32) -> Self {
        Self { i, j, k }
    }

    /// The box containing `position` for boxes of edge `box_length`.
    #[inline]
    pub fn of(position: &Point3<f64>, box_length: f64) -> Self {
        let scaled = position.coords / box_length;
        Self {
            i: scaled.x.floor() as i32,
            j: scaled.y.floor() as i32,
            k: scaled.z.floor() as i32,
        }
    }

    pub fn centre(&self, box_length: f64) -> Point3<f64> {
        Point3::new(
            (self.i as f64 + 0.5) * box_length,
            (self.j as f64 + 0.5) * box_length,
            (self.k as f64 + 0.5) * box_length,
        )
    }
}

/// Stable handle of one atom stored in a [`CljBoxes`].
///
/// A handle stays valid until its own atom is removed, whatever happens to the
/// other atoms of the same box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CljBoxIndex {
    pub coord: BoxCoord,
    pub slot: AtomSlot,
}

/// One bucket of atoms.
///
/// Atoms are kept contiguous so kernels can loop over a plain slice. Removal
/// swaps the last atom into the hole and re-points the moved atom's slot.
#[derive(Debug, Clone, Default)]
pub struct CljBox {
    atoms: Vec<CljAtom>,
    slots: Vec<AtomSlot>,
    positions: SlotMap<AtomSlot, usize>,
}

impl CljBox {
    pub fn atoms(&self) -> &[CljAtom] {
        &self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn get(&self, slot: AtomSlot) -> Option<&CljAtom> {
        self.positions.get(slot).map(|&pos| &self.atoms[pos])
    }

    pub fn contains(&self, slot: AtomSlot) -> bool {
        self.positions.contains_key(slot)
    }

    fn insert(&mut self, atom: CljAtom) -> AtomSlot {
        let slot = self.positions.insert(self.atoms.len());
        self.atoms.push(atom);
        self.slots.push(slot);
        slot
    }

    fn remove(&mut self, slot: AtomSlot) -> Option<CljAtom> {
        let pos = self.positions.remove(slot)?;
        let atom = self.atoms.swap_remove(pos);
        self.slots.swap_remove(pos);
        if let Some(&moved) = self.slots.get(pos) {
            self.positions[moved] = pos;
        }
        Some(atom)
    }
}

/// A pair of boxes whose atoms may lie within the cutoff of each other.
#[derive(Debug, Clone, Copy)]
pub enum BoxPair<'a> {
    /// Pairs of atoms inside a single box.
    Within(&'a CljBox),
    /// Pairs with one atom in each box.
    Between(&'a CljBox, &'a CljBox),
}

/// Chooses the box edge for a kernel with the given (largest) cutoff.
pub fn box_length_for(cutoff: f64) -> f64 {
    if !cutoff.is_finite() || cutoff <= 0.0 || cutoff > MAX_CUTOFF_BOX_LENGTH {
        DEFAULT_BOX_LENGTH
    } else {
        cutoff.max(MIN_BOX_LENGTH)
    }
}

/// Atoms partitioned into cubic boxes of fixed edge length.
///
/// Boxes are kept in a `BTreeMap`, so every enumeration order is deterministic.
/// Empty boxes are dropped as soon as their last atom leaves.
#[derive(Debug, Clone)]
pub struct CljBoxes {
    box_length: f64,
    boxes: BTreeMap<BoxCoord, CljBox>,
    n_atoms: usize,
}

impl Default for CljBoxes {
    fn default() -> Self {
        Self::new()
    }
}

impl CljBoxes {
    pub fn new() -> Self {
        Self::with_box_length(DEFAULT_BOX_LENGTH)
    }

    pub fn with_box_length(box_length: f64) -> Self {
        Self {
            box_length: box_length_for(box_length),
            boxes: BTreeMap::new(),
            n_atoms: 0,
        }
    }

    /// Empty boxes sized for a kernel whose largest cutoff is `cutoff`.
    pub fn for_cutoff(cutoff: f64) -> Self {
        Self::with_box_length(box_length_for(cutoff))
    }

    /// Boxes sized for `cutoff` and pre-filled with `atoms`.
    pub fn from_atoms(atoms: &CljAtoms, cutoff: f64) -> (Self, Vec<CljBoxIndex>) {
        let mut boxes = Self::for_cutoff(cutoff);
        let indices = boxes.add(atoms);
        (boxes, indices)
    }

    pub fn box_length(&self) -> f64 {
        self.box_length
    }

    pub fn n_atoms(&self) -> usize {
        self.n_atoms
    }

    pub fn n_boxes(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_atoms == 0
    }

    /// Adds atoms and returns their handles in input order.
    pub fn add(&mut self, atoms: &CljAtoms) -> Vec<CljBoxIndex> {
        atoms.iter().map(|atom| self.add_atom(*atom)).collect()
    }

    pub fn add_atom(&mut self, atom: CljAtom) -> CljBoxIndex {
        let coord = BoxCoord::of(&atom.position, self.box_length);
        let slot = self.boxes.entry(coord).or_default().insert(atom);
        self.n_atoms += 1;
        CljBoxIndex { coord, slot }
    }

    /// Removes the atoms behind `indices`.
    ///
    /// Every handle is checked before anything is removed, so on error the boxes
    /// are left exactly as they were.
    pub fn remove(&mut self, indices: &[CljBoxIndex]) -> Result<(), BoxError> {
        self.validate(indices)?;
        for index in indices {
            let emptied = match self.boxes.get_mut(&index.coord) {
                Some(bucket) => {
                    if bucket.remove(index.slot).is_some() {
                        self.n_atoms -= 1;
                    }
                    bucket.is_empty()
                }
                None => false,
            };
            if emptied {
                self.boxes.remove(&index.coord);
            }
        }
        Ok(())
    }

    /// Replaces the atoms behind `old` with `new_atoms` and returns the new handles.
    pub fn apply(
        &mut self,
        old: &[CljBoxIndex],
        new_atoms: &CljAtoms,
    ) -> Result<Vec<CljBoxIndex>, BoxError> {
        self.remove(old)?;
        Ok(self.add(new_atoms))
    }

    /// Checks that every handle refers to a stored atom and none repeats.
    pub fn validate(&self, indices: &[CljBoxIndex]) -> Result<(), BoxError> {
        let mut seen = HashSet::with_capacity(indices.len());
        for index in indices {
            if !self.contains(index) {
                return Err(BoxError::InvalidIndex(*index));
            }
            if !seen.insert(*index) {
                return Err(BoxError::DuplicateIndex(*index));
            }
        }
        Ok(())
    }

    pub fn contains(&self, index: &CljBoxIndex) -> bool {
        self.boxes
            .get(&index.coord)
            .is_some_and(|bucket| bucket.contains(index.slot))
    }

    pub fn get(&self, index: &CljBoxIndex) -> Option<&CljAtom> {
        self.boxes.get(&index.coord)?.get(index.slot)
    }

    pub fn get_box(&self, coord: &BoxCoord) -> Option<&CljBox> {
        self.boxes.get(coord)
    }

    /// The atoms behind `indices`, in the same order.
    pub fn atoms_at(&self, indices: &[CljBoxIndex]) -> Result<CljAtoms, BoxError> {
        indices
            .iter()
            .map(|index| self.get(index).copied().ok_or(BoxError::InvalidIndex(*index)))
            .collect()
    }

    /// Every stored atom, box by box.
    pub fn atoms(&self) -> CljAtoms {
        self.iter_atoms().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BoxCoord, &CljBox)> {
        self.boxes.iter()
    }

    pub fn iter_atoms(&self) -> impl Iterator<Item = &CljAtom> {
        self.boxes.values().flat_map(|bucket| bucket.atoms().iter())
    }

    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        bounding_box_of(self.iter_atoms())
    }

    fn half_diagonal(&self) -> f64 {
        0.5 * self.box_length * 3.0_f64.sqrt()
    }

    /// Every box with itself, plus every pair of distinct boxes that may hold
    /// atoms within `cutoff` of each other.
    pub fn box_pairs_within(&self, cutoff: f64, space: &Space) -> Vec<BoxPair<'_>> {
        let reach = cutoff + 2.0 * self.half_diagonal();
        let mut pairs: Vec<BoxPair<'_>> = self.boxes.values().map(BoxPair::Within).collect();
        pairs.extend(
            self.boxes
                .iter()
                .tuple_combinations()
                .filter(|((c1, _), (c2, _))| {
                    centre_distance(c1, self.box_length, c2, self.box_length, space) <= reach
                })
                .map(|((_, b1), (_, b2))| BoxPair::Between(b1, b2)),
        );
        pairs
    }

    /// Pairs of boxes, one from `self` and one from `other`, that may hold atoms
    /// within `cutoff` of each other.
    pub fn box_pairs_between<'a>(
        &'a self,
        other: &'a CljBoxes,
        cutoff: f64,
        space: &Space,
    ) -> Vec<(&'a CljBox, &'a CljBox)> {
        let reach = cutoff + self.half_diagonal() + other.half_diagonal();
        self.boxes
            .iter()
            .cartesian_product(other.boxes.iter())
            .filter(|((c1, _), (c2, _))| {
                centre_distance(c1, self.box_length, c2, other.box_length, space) <= reach
            })
            .map(|((_, b1), (_, b2))| (b1, b2))
            .collect()
    }
}

fn centre_distance(a: &BoxCoord, a_length: f64, b: &BoxCoord, b_length: f64, space: &Space) -> f64 {
    let delta: Vector3<f64> = a.centre(a_length) - b.centre(b_length);
    space.min_image(delta).norm()
}

impl PartialEq for CljBoxes {
    fn eq(&self, other: &Self) -> bool {
        self.box_length == other.box_length
            && self.n_atoms == other.n_atoms
            && self.boxes.len() == other.boxes.len()
            && self
                .boxes
                .iter()
                .zip(&other.boxes)
                .all(|((c1, b1), (c2, b2))| c1 == c2 && b1.atoms == b2.atoms)
    }
}
