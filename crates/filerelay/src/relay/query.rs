//! Search predicate construction.
//!
//! A rule's search template is a record-store search string with
//! `:placeholder` tokens, e.g.
//!
//! ```text
//! equal(P_PROJECT_STATUS,Active) and equal(P_FUZE_ID,:fuze_id)
//! ```
//!
//! Substitution is a single pass: a substituted value is never scanned for
//! further placeholders. Tokens that do not name a declared param are left
//! as written.

use super::extract::ExtractedParams;
use regex::{Captures, Regex};
use serde::Serialize;
use std::sync::OnceLock;
use tracing::warn;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("placeholder regex"))
}

fn clause_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"equal\(\s*([A-Za-z0-9_.]+)\s*,\s*([^)]*?)\s*\)").expect("clause regex")
    })
}

/// Distinct placeholder names in a template, in first-use order.
pub fn template_placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in placeholder_regex().captures_iter(template) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Field names referenced by `equal(FIELD,...)` clauses.
///
/// A field named more than once is kept once, at its last position.
pub fn referenced_fields(template: &str) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    for caps in clause_regex().captures_iter(template) {
        push_last(&mut fields, &caps[1]);
    }
    fields
}

fn push_last(fields: &mut Vec<String>, name: &str) {
    fields.retain(|f| f != name);
    fields.push(name.to_string());
}

/// One `equal(FIELD,value)` clause after substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldClause {
    pub field: String,
    /// Substituted value with surrounding quotes removed.
    pub value: String,
    /// Param the value came from, when the clause value was exactly `:name`.
    pub placeholder: Option<String>,
}

impl FieldClause {
    pub fn is_literal(&self) -> bool {
        self.placeholder.is_none()
    }
}

/// A fully substituted search string plus its parsed clauses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Predicate {
    pub text: String,
    pub clauses: Vec<FieldClause>,
}

impl Predicate {
    /// Referenced field names, last declaration wins.
    pub fn field_names(&self) -> Vec<String> {
        let mut fields = Vec::new();
        for clause in &self.clauses {
            push_last(&mut fields, &clause.field);
        }
        fields
    }

    /// Last clause on `field`, if any.
    pub fn clause_for(&self, field: &str) -> Option<&FieldClause> {
        self.clauses.iter().rev().find(|c| c.field == field)
    }
}

fn substitute(text: &str, params: &ExtractedParams) -> String {
    placeholder_regex()
        .replace_all(text, |caps: &Captures<'_>| {
            let name = &caps[1];
            if !params.is_declared(name) {
                return caps[0].to_string();
            }
            params.get(name).unwrap_or_default().to_string()
        })
        .into_owned()
}

fn strip_quotes(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn sole_placeholder(raw: &str) -> Option<&str> {
    let caps = placeholder_regex().captures(raw)?;
    let whole = caps.get(0)?;
    if whole.start() == 0 && whole.end() == raw.len() {
        caps.get(1).map(|m| m.as_str())
    } else {
        None
    }
}

/// Substitute extracted values into `template`.
///
/// Absent values substitute as the empty string; the resulting predicate is
/// left for the record store to reject.
pub fn build_predicate(template: &str, params: &ExtractedParams) -> Predicate {
    for name in template_placeholders(template) {
        if params.is_declared(&name) && params.get(&name).is_none() {
            warn!("No value for :{}; substituting an empty string in \"{}\"", name, template);
        }
    }

    let clauses = clause_regex()
        .captures_iter(template)
        .map(|caps| {
            let raw = strip_quotes(&caps[2]);
            let placeholder = sole_placeholder(raw)
                .filter(|name| params.is_declared(name))
                .map(str::to_string);
            FieldClause {
                field: caps[1].to_string(),
                value: strip_quotes(&substitute(raw, params)).to_string(),
                placeholder,
            }
        })
        .collect();

    Predicate {
        text: substitute(template, params),
        clauses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParamSpec;
    use crate::relay::extract::extract_params;

    fn params(file_name: &str, specs: &[(&str, &str)]) -> ExtractedParams {
        let specs: Vec<ParamSpec> = specs
            .iter()
            .map(|(name, pattern)| ParamSpec {
                name: name.to_string(),
                pattern: Regex::new(pattern).unwrap(),
                group: 0,
                strip: None,
            })
            .collect();
        extract_params(file_name, &specs)
    }

    #[test]
    fn test_simple_substitution() {
        let p = params("PROJ-00123_report.csv", &[("id", r"\d+")]);
        let predicate = build_predicate("equal(FUZE_ID,:id)", &p);
        assert_eq!(predicate.text, "equal(FUZE_ID,00123)");
        assert_eq!(
            predicate.clauses,
            vec![FieldClause {
                field: "FUZE_ID".to_string(),
                value: "00123".to_string(),
                placeholder: Some("id".to_string()),
            }]
        );
    }

    #[test]
    fn test_every_occurrence_replaced_in_one_pass() {
        // "x" extracts ":y", which must not be expanded again
        let p = params("a:y_7", &[("x", r":y"), ("y", r"\d")]);
        let predicate = build_predicate("equal(A,:x) and equal(B,:x) or equal(C,:y)", &p);
        assert_eq!(predicate.text, "equal(A,:y) and equal(B,:y) or equal(C,7)");
    }

    #[test]
    fn test_absent_value_substitutes_empty() {
        let p = params("readme.txt", &[("id", r"\d+")]);
        let predicate = build_predicate("equal(FUZE_ID,:id)", &p);
        assert_eq!(predicate.text, "equal(FUZE_ID,)");
        assert_eq!(predicate.clauses[0].value, "");
    }

    #[test]
    fn test_literal_and_quoted_clauses() {
        let p = params("PROJ-9.csv", &[("id", r"\d+")]);
        let predicate = build_predicate(
            "equal(STATUS,\"Active\") and equal(ID,\":id\") and equal(TAG,pre-:id)",
            &p,
        );
        assert_eq!(
            predicate.text,
            "equal(STATUS,\"Active\") and equal(ID,\"9\") and equal(TAG,pre-9)"
        );
        let clauses = &predicate.clauses;
        assert!(clauses[0].is_literal());
        assert_eq!(clauses[0].value, "Active");
        assert_eq!(clauses[1].placeholder.as_deref(), Some("id"));
        assert_eq!(clauses[1].value, "9");
        assert!(clauses[2].is_literal());
        assert_eq!(clauses[2].value, "pre-9");
    }

    #[test]
    fn test_undeclared_tokens_left_alone() {
        let p = params("1.csv", &[("id", r"\d")]);
        let predicate = build_predicate("equal(A,:id) and equal(B,:other)", &p);
        assert_eq!(predicate.text, "equal(A,1) and equal(B,:other)");
        assert!(predicate.clauses[1].is_literal());
    }

    #[test]
    fn test_referenced_fields_last_declaration_wins() {
        let template = "equal(A,:a) and equal(B,:b) and equal(A,x) and equal(C,1)";
        assert_eq!(referenced_fields(template), vec!["B", "A", "C"]);

        let p = params("1", &[("a", "1"), ("b", "1")]);
        let predicate = build_predicate(template, &p);
        assert_eq!(predicate.field_names(), vec!["B", "A", "C"]);
        assert_eq!(predicate.clause_for("A").unwrap().value, "x");
    }

    #[test]
    fn test_template_placeholders() {
        assert_eq!(
            template_placeholders("equal(A,:a) and equal(B,:b_2) and equal(C,:a) and equal(T,10:30)"),
            vec!["a", "b_2"]
        );
    }
}
