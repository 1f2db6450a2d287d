//! # Core Module
//!
//! This module provides the stateless building blocks of the CLJ engine: the atom and
//! molecule data model, the non-bonded forcefield kernels, the spatial box container, and
//! file loading.
//!
//! ## Architecture
//!
//! - **Data Model** ([`models`]) - Atoms, molecules, identifiers and the simulation space
//! - **Energy Kernels** ([`forcefield`]) - Pair potentials, LJ parameters and `CljFunction` kernels
//! - **Spatial Partitioning** ([`boxes`]) - Cutoff-sized boxes with stable atom handles
//! - **File I/O** ([`io`]) - Molecule and bond tables in CSV form
//!
//! Nothing in this module tracks change over time. Incremental bookkeeping and the
//! accept/reject cycle live in [`crate::engine`].

pub mod boxes;
pub mod forcefield;
pub mod io;
pub mod models;
