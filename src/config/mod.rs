//! TOML-based engine configuration.
//!
//! Names the semantic fields and table exceptions the executor and filter
//! evaluator consult. Everything has a default, so a bare
//! `EngineSettings::default()` is a working configuration:
//!
//! ```toml
//! dateField = "date"
//! datelessTables = ["products", "countries", "procurementMargins"]
//! countryOnlyTables = ["procurementMargins"]
//! categoricalField = "category"
//! documentTypeField = "documentType"
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Semantic field carrying a record's date.
    pub date_field: String,

    /// Tables that never receive a derived month range (reference data).
    pub dateless_tables: BTreeSet<String>,

    /// Tables scoped per-country only; the sku context field is dropped
    /// from their queries.
    pub country_only_tables: BTreeSet<String>,

    /// Categorical text field compared case-insensitively and trimmed.
    pub categorical_field: String,

    /// Document-type classification field, always compared numerically via
    /// the code lookup.
    pub document_type_field: String,

    /// How many future months the stock-cover projection walks.
    pub projection_horizon_months: u32,

    /// Cover reported when no future month has positive issuance.
    pub default_cover_months: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            date_field: "date".to_string(),
            dateless_tables: ["products", "countries", "procurementMargins"]
                .into_iter()
                .map(String::from)
                .collect(),
            country_only_tables: ["procurementMargins"]
                .into_iter()
                .map(String::from)
                .collect(),
            categorical_field: "category".to_string(),
            document_type_field: "documentType".to_string(),
            projection_horizon_months: 12,
            default_cover_months: 12.0,
        }
    }
}

impl EngineSettings {
    /// Parse settings from a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(input)?)
    }

    /// Load settings from a TOML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}
