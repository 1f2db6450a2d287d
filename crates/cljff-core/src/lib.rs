//! # CLJFF Core Library
//!
//! An incremental Coulomb and Lennard-Jones energy engine for Monte Carlo simulations of
//! molecular systems.
//!
//! ## Architectural Philosophy
//!
//! The library is split into two layers with a strict dependency direction.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`CljAtom`, `Molecule`, `Space`),
//!   the pair potentials and `CljFunction` kernels, the spatial `CljBoxes` container, and
//!   CSV/TOML loading.
//!
//! - **[`engine`]: The Logic Core.** The stateful layer that tracks molecules in groups,
//!   stages their updates, evaluates full or delta energies through `CljCalculator`, and
//!   exposes the accept/reject cycle through `InterFF` and `InterGroupFF`.
//!
//! Parallel evaluation over box pairs is available with the `parallel` feature (enabled by
//! default) and can be made bit-for-bit reproducible regardless of the thread count.

pub mod core;
pub mod engine;
