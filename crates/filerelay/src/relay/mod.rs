//! Relay - File-to-Record Reconciliation
//!
//! One batch pass per invocation:
//!
//! ```text
//! list live dir ──▶ match (per rule) ──▶ extract params ──▶ build predicate
//!                                                                │
//!      archive / retain ◀── upload to each record ◀── resolve + re-validate
//!                                   │
//!                     retention sweep over the archive (once)
//! ```

pub mod batch;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod orchestrator;
pub mod query;
pub mod resolver;
pub mod retention;
pub mod types;

pub use batch::{run_batch, RunOptions};
pub use error::{RelayError, Result, RunAborted};
pub use extract::{extract_params, ExtractedParams};
pub use matcher::{claim_files, list_candidates, match_names, RuleFiles};
pub use orchestrator::TransferOrchestrator;
pub use query::{build_predicate, referenced_fields, FieldClause, Predicate};
pub use resolver::RecordResolver;
pub use retention::{find_expired, sweep, SweepReport};
pub use types::{FileReport, RunSummary, TransferOutcome};
