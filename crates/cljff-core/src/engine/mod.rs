//! # Engine Module
//!
//! This module implements the stateful side of the CLJ engine: tracking molecules, staging
//! their changes, and keeping a cached energy consistent through Monte Carlo accept/reject
//! cycles.
//!
//! ## Overview
//!
//! A forcefield owns one or two [`group::CljGroup`]s. Each group boxes the atoms of its
//! molecules and records molecule updates in a [`workspace::CljWorkspace`] without touching
//! the boxes. The [`calculator::CljCalculator`] evaluates either the full energy or only the
//! change caused by the pending updates, and the [`state::EnergyState`] machine decides which
//! of the two is needed.
//!
//! ## Architecture
//!
//! - **Extraction** ([`extractor`]) - Turns molecule views into reduced-charge atom records
//! - **Staging** ([`workspace`]) - Pending per-molecule deltas, merged on repeated updates
//! - **Groups** ([`group`]) - Molecules, boxes and workspace with all-or-nothing updates
//! - **Evaluation** ([`calculator`]) - Sequential, parallel and reproducible box-pair sums
//! - **Forcefields** ([`forcefield`]) - `InterFF` and `InterGroupFF` with accept/reject
//! - **Configuration** ([`config`]) - TOML run settings and a builder
//! - **Error Handling** ([`error`]) - Engine errors wrapping configuration and box errors

pub mod calculator;
pub mod config;
pub mod error;
pub mod extractor;
pub mod forcefield;
pub mod group;
pub mod state;
pub mod workspace;
