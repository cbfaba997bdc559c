//! Memoized analyses for Lineage.
//!
//! An analysis is a deterministic step (running tests, transpiling, finding
//! unsafe code) whose result is stored as a node that refers to its inputs.
//! Before running the step again, [`Analysis::run`] asks the reverse index
//! for an existing result with the same inputs and returns it instead.
//!
//! # Key Types
//!
//! - [`Analysis`] -- an analysis declaration over one result kind
//! - [`Bindings`] -- argument values for one run
//! - [`AnalysisError`] -- declaration, lookup and consistency failures

pub mod analysis;
pub mod error;

pub use analysis::{Analysis, Bindings};
pub use error::{AnalysisError, AnalysisResult};
