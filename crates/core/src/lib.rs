//! `roscenes-core` library crate.
//!
//! Pure dataset logic with no filesystem or async dependencies: the
//! deterministic token rules, the frame filename codec, temporal chain
//! linkage, instance aggregation, table record builders, the fixed
//! taxonomy, SUS label conversion and the merge reconciler.

pub mod chain;
pub mod config;
pub mod error;
pub mod filename;
pub mod geometry;
pub mod instance;
pub mod label;
pub mod merge;
pub mod records;
pub mod repair;
pub mod taxonomy;
pub mod token;
pub mod types;
