//! Trackor REST client.
//!
//! Uses raw HTTP requests against the v3 trackor API:
//!
//! - search: `GET /api/v3/trackor_types/{type}/trackors/search?search=...&fields=A,B`
//! - attach: `POST /api/v3/trackor/{id}/file/{field}?file_name=...` (multipart `file`)
//!
//! Authentication is a token pair sent as `Authorization: Bearer <access>:<secret>`.

use crate::{ExternalRecord, RecordId, RecordStore, StoreIssue, StoreReply};
use reqwest::blocking::{multipart, Client, Response};
use reqwest::Url;
use serde_json::Value;
use std::path::Path;

/// Key of the record identifier column in search results.
pub const RECORD_ID_FIELD: &str = "TRACKOR_ID";

/// Credentials and endpoint for the record store.
#[derive(Debug, Clone)]
pub struct RecordStoreSettings {
    /// Base URL; a bare host is accepted and treated as https.
    pub url: String,
    pub access_key: String,
    pub secret_key: String,
}

/// Blocking HTTP implementation of [`RecordStore`].
pub struct HttpRecordStore {
    base: Url,
    auth_header: String,
    client: Client,
}

impl HttpRecordStore {
    pub fn new(settings: &RecordStoreSettings) -> Result<Self, StoreIssue> {
        let base = normalize_base_url(&settings.url)?;
        let client = Client::builder()
            .build()
            .map_err(|e| StoreIssue::new(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base,
            auth_header: format!("Bearer {}:{}", settings.access_key, settings.secret_key),
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<Response, StoreIssue> {
        let response = request
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .send()
            .map_err(|e| StoreIssue::new(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(StoreIssue::with_status(status.as_u16(), error_message(&body)))
    }
}

impl RecordStore for HttpRecordStore {
    fn query(
        &self,
        record_type: &str,
        predicate: &str,
        fields: &[String],
    ) -> StoreReply<Vec<ExternalRecord>> {
        let url = match search_url(&self.base, record_type) {
            Ok(url) => url,
            Err(issue) => return StoreReply::failed(vec![issue]),
        };
        let mut params = vec![("search", predicate.to_string())];
        if !fields.is_empty() {
            params.push(("fields", fields.join(",")));
        }

        tracing::debug!("Searching {} records: {}", record_type, predicate);

        let response = match self.send(self.client.get(url).query(&params)) {
            Ok(response) => response,
            Err(issue) => return StoreReply::failed(vec![issue]),
        };
        let body: Value = match response.json() {
            Ok(body) => body,
            Err(e) => {
                return StoreReply::failed(vec![StoreIssue::new(format!(
                    "Failed to parse search response: {}",
                    e
                ))])
            }
        };

        match parse_records(record_type, &body) {
            Ok(records) => StoreReply::ok(records),
            Err(issue) => StoreReply::failed(vec![issue]),
        }
    }

    fn attach_file(
        &self,
        record_type: &str,
        record_id: RecordId,
        field: &str,
        local_path: &Path,
    ) -> StoreReply<()> {
        let url = match upload_url(&self.base, record_id, field) {
            Ok(url) => url,
            Err(issue) => return StoreReply::failed(vec![issue]),
        };
        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let form = match multipart::Form::new().file("file", local_path) {
            Ok(form) => form,
            Err(e) => {
                return StoreReply::failed(vec![StoreIssue::new(format!(
                    "Failed to read {}: {}",
                    local_path.display(),
                    e
                ))])
            }
        };

        tracing::debug!(
            "Uploading {} to {} {} field {}",
            file_name,
            record_type,
            record_id,
            field
        );

        let request = self
            .client
            .post(url)
            .query(&[("file_name", file_name.as_str())])
            .multipart(form);
        match self.send(request) {
            Ok(_) => StoreReply::ok(()),
            Err(issue) => StoreReply::failed(vec![issue]),
        }
    }
}

/// Accept `host`, `host/`, `http://host` or `https://host/`.
pub fn normalize_base_url(raw: &str) -> Result<Url, StoreIssue> {
    let trimmed = raw.trim();
    let (scheme, rest) = match trimmed.split_once("://") {
        Some((scheme @ ("http" | "https"), rest)) => (scheme, rest),
        Some((other, _)) => {
            return Err(StoreIssue::new(format!(
                "Invalid record store URL '{}': unsupported scheme '{}'",
                raw, other
            )))
        }
        None => ("https", trimmed),
    };
    let host = rest.trim_end_matches('/');
    if host.is_empty() || host.starts_with('/') {
        return Err(StoreIssue::new(format!(
            "Invalid record store URL '{}': missing host",
            raw
        )));
    }
    Url::parse(&format!("{}://{}", scheme, host))
        .map_err(|e| StoreIssue::new(format!("Invalid record store URL '{}': {}", raw, e)))
}

fn with_segments(base: &Url, segments: &[&str]) -> Result<Url, StoreIssue> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| StoreIssue::new(format!("Record store URL cannot be a base: {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub fn search_url(base: &Url, record_type: &str) -> Result<Url, StoreIssue> {
    with_segments(
        base,
        &["api", "v3", "trackor_types", record_type, "trackors", "search"],
    )
}

pub fn upload_url(base: &Url, record_id: RecordId, field: &str) -> Result<Url, StoreIssue> {
    let id = record_id.to_string();
    with_segments(base, &["api", "v3", "trackor", id.as_str(), "file", field])
}

/// Convert a search response body into records.
pub fn parse_records(record_type: &str, body: &Value) -> Result<Vec<ExternalRecord>, StoreIssue> {
    let rows = body
        .as_array()
        .ok_or_else(|| StoreIssue::new("Search response is not a JSON array"))?;

    rows.iter()
        .map(|row| {
            let object = row
                .as_object()
                .ok_or_else(|| StoreIssue::new("Search result row is not a JSON object"))?;
            let id = object
                .get(RECORD_ID_FIELD)
                .and_then(value_as_id)
                .ok_or_else(|| StoreIssue::new(format!("Search result row has no {}", RECORD_ID_FIELD)))?;

            let mut record = ExternalRecord::new(record_type, id);
            for (name, value) in object {
                if name == RECORD_ID_FIELD {
                    continue;
                }
                if let Some(text) = value_as_text(value) {
                    record.fields.insert(name.clone(), text);
                }
            }
            Ok(record)
        })
        .collect()
}

fn value_as_id(value: &Value) -> Option<RecordId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Pull a readable message out of an error body; falls back to the raw text.
fn error_message(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error", "errorMessage"] {
            if let Some(Value::String(msg)) = map.get(key) {
                return msg.clone();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty error response".to_string()
    } else {
        trimmed.to_string()
    }
}
