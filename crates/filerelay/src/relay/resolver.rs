//! Record resolution with client-side re-validation.
//!
//! The record store matches search clauses loosely (a clause value may match
//! as a substring of the stored value), so every returned record is checked
//! again here before a file is attached to it.

use super::error::{RelayError, Result};
use super::extract::ExtractedParams;
use super::query::{FieldClause, Predicate};
use crate::config::MatchRule;
use filerelay_records::{ExternalRecord, RecordStore};
use tracing::debug;

/// Runs rule predicates against a record store.
#[derive(Debug)]
pub struct RecordResolver<S> {
    store: S,
}

impl<S: RecordStore> RecordResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fields requested from the store: the rule's explicit list, else every
    /// field the predicate references.
    pub fn projected_fields(rule: &MatchRule, predicate: &Predicate) -> Vec<String> {
        if rule.fields.is_empty() {
            predicate.field_names()
        } else {
            rule.fields.clone()
        }
    }

    /// Query the store and keep only records that really match.
    ///
    /// Any error reported by the store fails the call, even if data came
    /// back with it.
    pub fn resolve(
        &self,
        rule: &MatchRule,
        predicate: &Predicate,
        params: &ExtractedParams,
    ) -> Result<Vec<ExternalRecord>> {
        let fields = Self::projected_fields(rule, predicate);
        let reply = self.store.query(&rule.record_type, &predicate.text, &fields);
        if reply.has_errors() {
            return Err(RelayError::Query {
                record_type: rule.record_type.clone(),
                predicate: predicate.text.clone(),
                issues: reply.errors,
            });
        }

        let returned = reply.data.unwrap_or_default();
        let total = returned.len();
        let records: Vec<ExternalRecord> = match fields.as_slice() {
            [] => returned,
            [field] => {
                let token = predicate
                    .clause_for(field)
                    .map(|c| c.value.as_str())
                    .or_else(|| params.key_token());
                returned
                    .into_iter()
                    .filter(|r| token.is_some() && r.field(field) == token)
                    .collect()
            }
            _ => returned
                .into_iter()
                .filter(|r| revalidate(rule, predicate, &fields, r))
                .collect(),
        };

        if records.len() < total {
            debug!(
                "Dropped {} of {} {} records not matching \"{}\"",
                total - records.len(),
                total,
                rule.record_type,
                predicate.text
            );
        }
        Ok(records)
    }
}

fn revalidate(rule: &MatchRule, predicate: &Predicate, fields: &[String], record: &ExternalRecord) -> bool {
    predicate
        .clauses
        .iter()
        .filter(|c| fields.contains(&c.field))
        .all(|clause| match record.field(&clause.field) {
            Some(value) => clause_holds(rule, clause, value),
            None => false,
        })
}

fn clause_holds(rule: &MatchRule, clause: &FieldClause, value: &str) -> bool {
    if value == clause.value {
        return true;
    }
    // Re-apply the extraction that produced the clause value.
    clause
        .placeholder
        .as_deref()
        .and_then(|name| rule.param(name))
        .and_then(|spec| spec.extract(value))
        .map_or(false, |extracted| extracted == clause.value)
}
