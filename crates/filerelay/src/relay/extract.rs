//! Parameter extraction from file names.

use crate::config::ParamSpec;
use tracing::warn;

impl ParamSpec {
    /// Apply the pattern to `text`: take the configured group of the first
    /// match, then remove the first occurrence of the strip literal.
    pub fn extract(&self, text: &str) -> Option<String> {
        let caps = self.pattern.captures(text)?;
        let value = caps.get(self.group)?.as_str();
        Some(match &self.strip {
            Some(strip) => value.replacen(strip.as_str(), "", 1),
            None => value.to_string(),
        })
    }
}

/// Values pulled from one file name, in declared param order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedParams {
    values: Vec<(String, Option<String>)>,
}

impl ExtractedParams {
    /// Value for `name`. `None` if the param is unknown or did not match.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.values.iter().any(|(n, _)| n == name)
    }

    /// The foreign-key token: value of the first declared param.
    pub fn key_token(&self) -> Option<&str> {
        self.values.first().and_then(|(_, v)| v.as_deref())
    }

    /// Names of params whose pattern did not match.
    pub fn missing(&self) -> Vec<&str> {
        self.values
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_deref()))
    }
}

/// Run every param pattern against `file_name`. A pattern that does not match is warned
/// about and recorded as absent; extraction itself never fails.
pub fn extract_params(file_name: &str, specs: &[ParamSpec]) -> ExtractedParams {
    let values = specs
        .iter()
        .map(|spec| {
            let value = spec.extract(file_name);
            if value.is_none() {
                warn!(
                    "Can't extract :{} with pattern \"{}\" from file name \"{}\"",
                    spec.name,
                    spec.pattern.as_str(),
                    file_name
                );
            }
            (spec.name.clone(), value)
        })
        .collect();
    ExtractedParams { values }
}
