//! One batch pass over the live directory.

use super::error::{RelayError, Result, RunAborted};
use super::extract::extract_params;
use super::matcher::{claim_files, list_candidates, RuleFiles};
use super::orchestrator::TransferOrchestrator;
use super::query::build_predicate;
use super::resolver::RecordResolver;
use super::retention::{find_expired, sweep};
use super::types::{FileReport, RunSummary, TransferOutcome};
use crate::config::PipelineConfig;
use chrono::{DateTime, Utc};
use filerelay_records::RecordStore;
use filerelay_remote::{RemoteConnector, RemoteFs};
use tracing::{debug, info};

/// Per-invocation switches.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Resolve records but download, upload, move and purge nothing.
    pub dry_run: bool,
    /// Reference time for the retention cutoff. Taken once when the options
    /// are built, usually at the start of the run, so the cutoff lags the
    /// wall clock at sweep time by the duration of the transfers.
    pub now: DateTime<Utc>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            now: Utc::now(),
        }
    }
}

/// Connect, reconcile every matched file, then sweep the archive.
///
/// Stops at the first fatal error; the returned [`RunAborted`] carries the
/// outcomes recorded up to that point. The remote session is closed before
/// this returns, whichever way it returns.
pub fn run_batch<C, S>(
    connector: &C,
    store: &S,
    config: &PipelineConfig,
    options: &RunOptions,
) -> std::result::Result<RunSummary, RunAborted>
where
    C: RemoteConnector,
    S: RecordStore,
{
    let mut summary = RunSummary {
        dry_run: options.dry_run,
        ..RunSummary::default()
    };
    match run_pass(connector, store, config, options, &mut summary) {
        Ok(()) => Ok(summary),
        Err(error) => Err(RunAborted { summary, error }),
    }
}

fn run_pass<C, S>(
    connector: &C,
    store: &S,
    config: &PipelineConfig,
    options: &RunOptions,
    summary: &mut RunSummary,
) -> Result<()>
where
    C: RemoteConnector,
    S: RecordStore,
{
    info!(
        "Starting run{}",
        if options.dry_run { " (dry run)" } else { "" }
    );
    let session = connector
        .connect()
        .map_err(|source| RelayError::Connection { source })?;

    let layout = &config.layout;
    let candidates = list_candidates(&session, &layout.live)?;
    info!("{} files found in {}", candidates.len(), layout.live);

    let resolver = RecordResolver::new(store);
    let orchestrator = TransferOrchestrator::new(&session, store, layout, &config.scratch_dir);

    for RuleFiles { rule, files } in claim_files(&candidates, &config.rules) {
        debug!("Rule '{}' matched {} files", rule.name, files.len());

        for file_name in files {
            let params = extract_params(&file_name, &rule.params);
            let predicate = build_predicate(&rule.search, &params);
            let records = resolver.resolve(rule, &predicate, &params)?;
            info!(
                "{} {} records found for the file \"{}\"",
                records.len(),
                rule.record_type,
                file_name
            );

            let mut report = FileReport {
                file_name: file_name.clone(),
                rule: rule.name.clone(),
                predicate: predicate.text.clone(),
                record_ids: records.iter().map(|r| r.id).collect(),
                outcome: None,
            };
            if options.dry_run {
                summary.files.push(report);
                continue;
            }

            match orchestrator.transfer(rule, &file_name, &records) {
                Ok(outcome) => {
                    report.outcome = Some(outcome);
                    summary.files.push(report);
                }
                Err(err) => {
                    if matches!(err, RelayError::Upload { .. }) {
                        report.outcome = Some(TransferOutcome::UploadedPartialFailure);
                        summary.files.push(report);
                    }
                    return Err(err);
                }
            }
        }
    }

    if config.retention_days.is_some() {
        let listing = session
            .list_directory(&layout.archive)
            .map_err(|source| RelayError::Listing {
                directory: layout.archive.clone(),
                source,
            })?;
        let report = if options.dry_run {
            let report = find_expired(
                &session,
                &layout.archive,
                &listing,
                config.retention_days,
                options.now,
            );
            info!("{} files to purge found in {}", report.candidates.len(), layout.archive);
            summary.purged = report.candidates.clone();
            report
        } else {
            let report = sweep(
                &session,
                &layout.archive,
                &listing,
                config.retention_days,
                options.now,
            );
            summary.purged = report.deleted.clone();
            report
        };
        summary.purge_failures = report.failures.len();
    }

    info!(
        "Run has been completed: {} archived, {} skipped, {} purged",
        summary.count(TransferOutcome::UploadedAndArchived),
        summary.count(TransferOutcome::SkippedNoMatch),
        summary.purged.len()
    );
    Ok(())
}
