// src/model/loader.rs
//! TOML loader for static measure definitions.
//!
//! Definitions are read-only configuration loaded once at start:
//!
//! ```toml
//! [[measures]]
//! key = "closingStock"
//!
//! [[measures.components]]
//! id = "stock"
//! source = { type = "table", tableKey = "stockLevels", fieldName = "quantity" }
//! aggregation = "sum"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::model::measure::Measure;
use crate::registry::MeasureRegistry;

/// Error type for definition loading.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("definition file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read definitions: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse definitions: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate measure key: '{0}'")]
    DuplicateKey(String),
}

#[derive(Debug, Deserialize)]
struct DefinitionFile {
    #[serde(default)]
    measures: Vec<Measure>,
}

/// Parse a registry from a TOML document.
pub fn registry_from_toml(input: &str) -> Result<MeasureRegistry, LoadError> {
    let file: DefinitionFile = toml::from_str(input)?;

    let mut registry = MeasureRegistry::new();
    for measure in file.measures {
        let key = measure.key.clone();
        if registry.insert(measure).is_some() {
            return Err(LoadError::DuplicateKey(key));
        }
    }
    Ok(registry)
}

/// Load a registry from a TOML file on disk.
pub fn registry_from_path(path: impl AsRef<Path>) -> Result<MeasureRegistry, LoadError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LoadError::FileNotFound(path.to_path_buf()));
    }
    let contents = fs::read_to_string(path)?;
    registry_from_toml(&contents)
}
