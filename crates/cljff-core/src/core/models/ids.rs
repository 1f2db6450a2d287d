use serde::Deserialize;
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Generational handle of one atom inside a box bucket.
    ///
    /// A slot stays valid while its atom is stored, no matter how the bucket
    /// reorders its dense storage after removals.
    pub struct AtomSlot;
}

/// Stable numeric identifier of a molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize)]
#[serde(transparent)]
pub struct MolNum(pub u32);

/// Index of a Lennard-Jones atom type inside an [`LjParameterDb`](crate::core::forcefield::params::LjParameterDb).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize)]
#[serde(transparent)]
pub struct LjId(pub u32);

impl LjId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MolNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MolNum({})", self.0)
    }
}

impl fmt::Display for LjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LjId({})", self.0)
    }
}
