//! In-memory record store.

use filerelay_records::{ExternalRecord, RecordId, RecordStore, StoreIssue, StoreReply};
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCall {
    pub record_type: String,
    pub predicate: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCall {
    pub record_type: String,
    pub record_id: RecordId,
    pub field: String,
    pub file_name: String,
    /// Content of the local file at upload time.
    pub content: Vec<u8>,
}

#[derive(Debug, Default)]
struct StoreState {
    records: Vec<ExternalRecord>,
    queries: Vec<QueryCall>,
    uploads: Vec<UploadCall>,
    query_errors: Vec<StoreIssue>,
    failing_uploads: Vec<RecordId>,
}

/// Record store fake. Clones share state.
///
/// Predicates are read as a conjunction of `equal(FIELD,value)` clauses and
/// each clause matches when the record's value *contains* the clause value,
/// reproducing the partial matching of the real search API. Anything else in
/// the predicate is ignored.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_record(&self, record: ExternalRecord) {
        self.lock().records.push(record);
    }

    /// Make every query report this error.
    pub fn fail_queries(&self, message: &str) {
        self.lock().query_errors.push(StoreIssue::with_status(500, message));
    }

    pub fn fail_upload_for(&self, record_id: RecordId) {
        self.lock().failing_uploads.push(record_id);
    }

    pub fn queries(&self) -> Vec<QueryCall> {
        self.lock().queries.clone()
    }

    pub fn uploads(&self) -> Vec<UploadCall> {
        self.lock().uploads.clone()
    }

    pub fn uploaded_record_ids(&self) -> Vec<RecordId> {
        self.lock().uploads.iter().map(|u| u.record_id).collect()
    }
}

fn equal_clauses(predicate: &str) -> Vec<(String, String)> {
    let clause = Regex::new(r"equal\(\s*([A-Za-z0-9_]+)\s*,\s*([^)]*?)\s*\)")
        .expect("valid clause regex");
    clause
        .captures_iter(predicate)
        .map(|caps| {
            let value = caps[2].trim_matches('"').to_string();
            (caps[1].to_string(), value)
        })
        .collect()
}

impl RecordStore for MemoryRecordStore {
    fn query(
        &self,
        record_type: &str,
        predicate: &str,
        fields: &[String],
    ) -> StoreReply<Vec<ExternalRecord>> {
        let mut state = self.lock();
        state.queries.push(QueryCall {
            record_type: record_type.to_string(),
            predicate: predicate.to_string(),
            fields: fields.to_vec(),
        });
        if !state.query_errors.is_empty() {
            return StoreReply::failed(state.query_errors.clone());
        }

        let clauses = equal_clauses(predicate);
        let matched = state
            .records
            .iter()
            .filter(|r| r.record_type == record_type)
            .filter(|r| {
                clauses.iter().all(|(field, value)| {
                    r.field(field).map(|v| v.contains(value.as_str())).unwrap_or(false)
                })
            })
            .map(|r| {
                let mut projected = ExternalRecord::new(r.record_type.clone(), r.id);
                for (name, value) in &r.fields {
                    if fields.is_empty() || fields.contains(name) {
                        projected.fields.insert(name.clone(), value.clone());
                    }
                }
                projected
            })
            .collect();
        StoreReply::ok(matched)
    }

    fn attach_file(
        &self,
        record_type: &str,
        record_id: RecordId,
        field: &str,
        local_path: &Path,
    ) -> StoreReply<()> {
        let mut state = self.lock();
        let content = match std::fs::read(local_path) {
            Ok(content) => content,
            Err(e) => {
                return StoreReply::failed(vec![StoreIssue::new(format!(
                    "Failed to read {}: {}",
                    local_path.display(),
                    e
                ))])
            }
        };
        state.uploads.push(UploadCall {
            record_type: record_type.to_string(),
            record_id,
            field: field.to_string(),
            file_name: local_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            content,
        });
        if state.failing_uploads.contains(&record_id) {
            return StoreReply::failed(vec![StoreIssue::with_status(
                409,
                format!("Upload rejected for record {}", record_id),
            )]);
        }
        StoreReply::ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryRecordStore {
        let store = MemoryRecordStore::new();
        store.add_record(
            ExternalRecord::new("Project", 1)
                .with_field("FUZE_ID", "00123")
                .with_field("STATUS", "Active"),
        );
        store.add_record(
            ExternalRecord::new("Project", 2)
                .with_field("FUZE_ID", "001234")
                .with_field("STATUS", "Active"),
        );
        store.add_record(ExternalRecord::new("Site", 3).with_field("FUZE_ID", "00123"));
        store
    }

    #[test]
    fn test_substring_matching_like_the_real_store() {
        let store = store();
        let reply = store.query("Project", "equal(FUZE_ID,00123)", &["FUZE_ID".to_string()]);
        let ids: Vec<_> = reply.data.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_projection_and_conjunction() {
        let store = store();
        let reply = store.query(
            "Project",
            "equal(STATUS,\"Active\") and equal(FUZE_ID,001234)",
            &["FUZE_ID".to_string()],
        );
        let records = reply.data.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 2);
        assert!(records[0].field("STATUS").is_none());
    }

    #[test]
    fn test_injected_query_error() {
        let store = store();
        store.fail_queries("Invalid search");
        let reply = store.query("Project", "equal(FUZE_ID,1)", &[]);
        assert!(reply.has_errors());
        assert_eq!(store.queries().len(), 1);
    }
}
