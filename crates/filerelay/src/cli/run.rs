//! `filerelay run`: one batch pass.

use super::error::HelpfulError;
use super::load_settings;
use super::output::print_summary;
use anyhow::{Context, Result};
use filerelay::{run_batch, RunOptions, RunSummary};
use filerelay_records::HttpRecordStore;
use filerelay_remote::SftpConnector;
use std::path::PathBuf;
use tracing::error;

#[derive(Debug)]
pub struct RunArgs {
    pub config: PathBuf,
    pub dry_run: bool,
    pub json: bool,
}

pub fn run(args: RunArgs) -> Result<()> {
    let settings = load_settings(&args.config)?;

    let store = HttpRecordStore::new(&settings.record_store).map_err(|issue| {
        HelpfulError::new("Cannot create the record store client")
            .with_context(issue.to_string())
            .with_suggestion("TRY: Check record_store.url in the settings file")
    })?;
    let connector = SftpConnector::new(settings.sftp.clone());
    let options = RunOptions {
        dry_run: args.dry_run,
        ..RunOptions::default()
    };

    match run_batch(&connector, &store, &settings.pipeline, &options) {
        Ok(summary) => report(&summary, args.json),
        Err(aborted) => {
            error!("{} | {}", aborted.error.message(), aborted.error.description());
            report(&aborted.summary, args.json)?;
            Err(HelpfulError::run_failed(&aborted.error).into())
        }
    }
}

fn report(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(summary).context("Failed to serialize run summary")?;
        println!("{}", rendered);
    } else {
        print_summary(summary);
    }
    Ok(())
}
