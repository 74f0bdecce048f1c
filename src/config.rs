//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/rootarch/rootarch.toml`
//! 3. Local config: `<project_dir>/.rootarch.toml`
//! 4. Environment variables: `ROOTARCH__*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;

/// Defaults applied by the RSML parser when the document is silent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParserSettings {
    /// Expected name of the document element
    pub document_element: String,
    /// Unit assumed when the metadata block has none
    pub default_unit: String,
    /// Resolution assumed when the metadata block has none
    pub default_resolution: f64,
    /// File key assumed when the metadata block has none
    pub default_file_key: String,
    /// Software tag assumed when the metadata block has none
    pub default_software: String,
    /// Diameter of a point without diameter sample, physical units
    pub default_diameter: f64,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            document_element: "rsml".into(),
            default_unit: "cm".into(),
            default_resolution: 1.0,
            default_file_key: "default".into(),
            default_software: "smartroot".into(),
            default_diameter: 2.0,
        }
    }
}

/// Raw parser settings for intermediate parsing (`None` → not specified).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawParserSettings {
    pub document_element: Option<String>,
    pub default_unit: Option<String>,
    pub default_resolution: Option<f64>,
    pub default_file_key: Option<String>,
    pub default_software: Option<String>,
    pub default_diameter: Option<f64>,
}

impl ParserSettings {
    /// Overlay wins where it specifies a value.
    pub fn merge(&self, overlay: &RawParserSettings) -> Self {
        Self {
            document_element: overlay
                .document_element
                .clone()
                .unwrap_or_else(|| self.document_element.clone()),
            default_unit: overlay
                .default_unit
                .clone()
                .unwrap_or_else(|| self.default_unit.clone()),
            default_resolution: overlay.default_resolution.unwrap_or(self.default_resolution),
            default_file_key: overlay
                .default_file_key
                .clone()
                .unwrap_or_else(|| self.default_file_key.clone()),
            default_software: overlay
                .default_software
                .clone()
                .unwrap_or_else(|| self.default_software.clone()),
            default_diameter: overlay.default_diameter.unwrap_or(self.default_diameter),
        }
    }
}

/// Report rendering preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportSettings {
    /// Resolution of forests built without a document
    pub default_dpi: f64,
    /// Decimal places in table output
    pub precision: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            default_dpi: 300.0,
            precision: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawReportSettings {
    pub default_dpi: Option<f64>,
    pub precision: Option<usize>,
}

impl ReportSettings {
    pub fn merge(&self, overlay: &RawReportSettings) -> Self {
        Self {
            default_dpi: overlay.default_dpi.unwrap_or(self.default_dpi),
            precision: overlay.precision.unwrap_or(self.precision),
        }
    }
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub parser: RawParserSettings,
    pub report: RawReportSettings,
}

/// Unified configuration for rootarch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub parser: ParserSettings,
    pub report: ReportSettings,
}

/// Get the XDG config directory for rootarch.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "rootarch").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("rootarch.toml"))
}

/// Get the path to the local config file in a project directory.
pub fn local_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".rootarch.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            parser: self.parser.merge(&overlay.parser),
            report: self.report.merge(&overlay.report),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `project_dir` - Optional directory holding a local `.rootarch.toml`
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        // 3. Local config
        if let Some(dir) = project_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        // 4. Environment variables (explicit override)
        current = Self::apply_env_overrides(current)?;

        current.validate()?;
        Ok(current)
    }

    /// Apply ROOTARCH__* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("ROOTARCH").separator("__"))
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("parser.document_element") {
            settings.parser.document_element = val;
        }
        if let Ok(val) = config.get_string("parser.default_unit") {
            settings.parser.default_unit = val;
        }
        if let Ok(val) = config.get_float("parser.default_resolution") {
            settings.parser.default_resolution = val;
        }
        if let Ok(val) = config.get_string("parser.default_file_key") {
            settings.parser.default_file_key = val;
        }
        if let Ok(val) = config.get_string("parser.default_software") {
            settings.parser.default_software = val;
        }
        if let Ok(val) = config.get_float("parser.default_diameter") {
            settings.parser.default_diameter = val;
        }
        if let Ok(val) = config.get_float("report.default_dpi") {
            settings.report.default_dpi = val;
        }
        if let Ok(val) = config.get_int("report.precision") {
            settings.report.precision = val.max(0) as usize;
        }

        Ok(settings)
    }

    /// Reject values the model cannot work with.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        if self.parser.document_element.trim().is_empty() {
            return Err(ApplicationError::Config {
                message: "parser.document_element must not be empty".into(),
            });
        }
        if self.parser.default_resolution < 0.0 || self.report.default_dpi < 0.0 {
            return Err(ApplicationError::Config {
                message: "resolution and dpi must not be negative".into(),
            });
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# rootarch configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/rootarch/rootarch.toml
#   Local:  <project_dir>/.rootarch.toml
#   Env:    ROOTARCH__SECTION__KEY, e.g. ROOTARCH__PARSER__DEFAULT_UNIT=mm

[parser]
# Name of the document element
# document_element = "rsml"

# Metadata defaults for documents that omit them
# default_unit = "cm"
# default_resolution = 1.0
# default_file_key = "default"
# default_software = "smartroot"

# Diameter of points without a diameter sample (physical units)
# default_diameter = 2.0

[report]
# Resolution of forests built without a document
# default_dpi = 300.0

# Decimal places in table output
# precision = 3
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
