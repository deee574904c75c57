//! `roscenes-pipeline` library crate.
//!
//! Filesystem and batch plumbing around `roscenes-core`: scene directory
//! scanning, atomic JSON table I/O, the build, load, export, repair and merge
//! steps, and the bounded per-scene worker pool.

pub mod batch;
pub mod build;
pub mod error;
pub mod export;
pub mod layout;
pub mod load;
pub mod merge;
pub mod repair;
pub mod scan;
pub mod tables;

pub use error::{PipelineError, Result};
