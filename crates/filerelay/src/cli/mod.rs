//! CLI module for filerelay

pub mod check;
pub mod error;
pub mod output;
pub mod run;

use anyhow::Result;
use error::HelpfulError;
use filerelay::{ConfigError, RelaySettings};
use std::io;
use std::path::Path;

/// Load and validate the settings file, turning failures into helpful errors.
pub fn load_settings(path: &Path) -> Result<RelaySettings> {
    match RelaySettings::load(path) {
        Ok(settings) => Ok(settings),
        Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            Err(HelpfulError::config_not_found(path).into())
        }
        Err(err) => Err(HelpfulError::invalid_config(path, &err).into()),
    }
}
