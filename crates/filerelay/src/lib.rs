//! Filerelay - Core Library
//!
//! Reconciles files dropped on a remote directory with records in a system
//! of record: each matching file is attached to the records its name points
//! at, then moved to an archive that is purged by age.

pub mod config;
pub mod relay;

pub use config::{ConfigError, DirLayout, MatchRule, ParamSpec, PipelineConfig, RelaySettings};
pub use relay::{run_batch, FileReport, RelayError, RunAborted, RunOptions, RunSummary, TransferOutcome};
