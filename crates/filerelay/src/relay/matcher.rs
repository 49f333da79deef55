//! Filename matching against rule patterns.
//!
//! Patterns use search semantics: a name matches if the regex matches
//! anywhere in it. Output keeps the remote listing's order.

use super::error::{RelayError, Result};
use crate::config::MatchRule;
use filerelay_remote::{join_remote, RemoteFs};
use regex::Regex;
use tracing::debug;

/// Names matched by `pattern`, in input order. No dedup, no sort.
pub fn match_names(names: &[String], pattern: &Regex) -> Vec<String> {
    names
        .iter()
        .filter(|name| pattern.is_match(name))
        .cloned()
        .collect()
}

/// List the live directory and drop sub-directories.
///
/// Each entry costs one `is_directory` round trip.
pub fn list_candidates<R: RemoteFs>(remote: &R, live_dir: &str) -> Result<Vec<String>> {
    let listing_err = |source| RelayError::Listing {
        directory: live_dir.to_string(),
        source,
    };

    let names = remote.list_directory(live_dir).map_err(listing_err)?;
    let mut files = Vec::with_capacity(names.len());
    for name in names {
        if remote
            .is_directory(&join_remote(live_dir, &name))
            .map_err(listing_err)?
        {
            debug!("Skipping directory {}{}", live_dir, name);
            continue;
        }
        files.push(name);
    }
    Ok(files)
}

/// Files claimed by one rule.
#[derive(Debug)]
pub struct RuleFiles<'a> {
    pub rule: &'a MatchRule,
    pub files: Vec<String>,
}

/// Assign files to rules (first match wins, in rule order).
pub fn claim_files<'a>(candidates: &[String], rules: &'a [MatchRule]) -> Vec<RuleFiles<'a>> {
    let mut unclaimed: Vec<String> = candidates.to_vec();
    let mut claimed = Vec::with_capacity(rules.len());

    for rule in rules {
        let files = match_names(&unclaimed, &rule.file_pattern);
        unclaimed.retain(|name| !rule.file_pattern.is_match(name));
        claimed.push(RuleFiles { rule, files });
    }

    claimed
}
