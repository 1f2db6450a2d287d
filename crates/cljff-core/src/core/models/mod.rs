//! # Core Models Module
//!
//! Data structures describing the particles the non-bonded engine works on.
//!
//! ## Key Components
//!
//! - [`atoms`] - `CljAtom` records and `CljAtoms` sets extracted from molecules
//! - [`molecule`] - The `MoleculeView` interface, an owned `Molecule` and bond `Connectivity`
//! - [`space`] - Vacuum and periodic geometry with the minimum-image convention
//! - [`ids`] - Identifier types for molecules, LJ types and box slots
//!
//! ```ignore
//! use cljff::core::models::{ids::{LjId, MolNum}, molecule::Molecule};
//! use nalgebra::Point3;
//!
//! let water = Molecule::new(MolNum(1))
//!     .with_atom(Point3::new(0.0, 0.0, 0.0), -0.834, LjId(0))
//!     .with_atom(Point3::new(0.9572, 0.0, 0.0), 0.417, LjId(1));
//! ```

pub mod atoms;
pub mod ids;
pub mod molecule;
pub mod space;
