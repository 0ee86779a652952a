//! drugmatch
//!
//! Maps drug product names to their active ingredients through the openFDA
//! registry, translates the ingredients to local-market names and counts the
//! original and generic products registered with MFDS.

pub mod cache;
pub mod calculator;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod logging;
pub mod mapping;
pub mod pipeline;
pub mod progress;
pub mod registry;

pub use cancel::{CancellationToken, Cancelled};
pub use error::{DrugMatchError, Result};
pub use pipeline::{Pipeline, RunOptions, RunOutcome, RunReport, RunState, RunStatus};
