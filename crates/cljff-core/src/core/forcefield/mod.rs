//! # Force Field Module
//!
//! This module provides the non-bonded Coulomb and Lennard-Jones physics of the CLJ engine:
//! pair potentials, parameter tables, and the pluggable kernels that turn sets of atoms into
//! `(coulomb, lj)` energy pairs.
//!
//! ## Overview
//!
//! Every kernel implements the [`function::CljFunction`] trait. A kernel only describes the
//! energy of a single pair and which pairs interact; the pair loops, the space dispatch
//! (vacuum or periodic) and the combined LJ parameter lookup are shared.
//!
//! - **Hard cutoff** ([`cutoff`]) with truncated, force-shifted or reaction-field Coulomb
//! - **Soft core** ([`soft`]) for alchemical perturbations
//! - **Intramolecular** ([`intra`]) with 1-2/1-3 exclusions and scaled 1-4 pairs
//!
//! ## Key Components
//!
//! - [`params`] - LJ atom types, combining rules and the precomputed pair matrix
//! - [`potentials`] - Analytic pair formulas in reduced units
//! - [`term`] - The [`term::CljEnergy`] pair carried through the whole engine
//! - [`error`] - Configuration errors raised by kernel setters
//!
//! ## Usage
//!
//! ```ignore
//! use cljff::core::forcefield::cutoff::CljCutoffFunction;
//! use cljff::core::forcefield::function::CljFunction;
//!
//! let function = CljCutoffFunction::new(lj_params, CombiningRules::Arithmetic)
//!     .with_cutoffs(12.0, 10.0)?;
//! let energy = function.calculate(atoms.as_slice());
//! ```

pub mod cutoff;
pub mod error;
pub mod function;
pub mod intra;
pub mod params;
pub mod potentials;
pub mod soft;
pub mod term;
