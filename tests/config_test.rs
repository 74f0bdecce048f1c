//! Integration tests for Settings config loading with layered merge semantics.
//!
//! These tests run without a global config (temp directories only), so they
//! exercise local `.rootarch.toml` files merged over compiled defaults.

use std::fs;

use tempfile::TempDir;

use rootarch::application::ApplicationError;
use rootarch::config::{local_config_path, Settings};

#[test]
fn given_empty_project_dir_when_load_then_defaults() {
    let dir = TempDir::new().unwrap();

    let settings = Settings::load(Some(dir.path())).expect("load settings");

    assert_eq!(settings.parser.document_element, "rsml");
    assert_eq!(settings.parser.default_unit, "cm");
    assert_eq!(settings.report.precision, 3);
}

#[test]
fn given_local_config_when_load_then_overrides_only_given_keys() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let local = r#"
[parser]
default_unit = "mm"
default_resolution = 100.0

[report]
precision = 5
"#;
    fs::write(local_config_path(dir.path()), local).unwrap();

    // Act
    let settings = Settings::load(Some(dir.path())).expect("load settings");

    // Assert
    assert_eq!(settings.parser.default_unit, "mm");
    assert_eq!(settings.parser.default_resolution, 100.0);
    assert_eq!(settings.report.precision, 5);
    // untouched keys keep their defaults
    assert_eq!(settings.parser.default_software, "smartroot");
    assert_eq!(settings.parser.default_diameter, 2.0);
    assert_eq!(settings.report.default_dpi, 300.0);
}

#[test]
fn given_malformed_local_config_when_load_then_config_error() {
    let dir = TempDir::new().unwrap();
    fs::write(local_config_path(dir.path()), "[parser\ndefault_unit = ").unwrap();

    let err = Settings::load(Some(dir.path())).unwrap_err();

    assert!(matches!(err, ApplicationError::Config { .. }));
}

#[test]
fn given_empty_document_element_when_load_then_rejected() {
    let dir = TempDir::new().unwrap();
    fs::write(local_config_path(dir.path()), "[parser]\ndocument_element = \"  \"\n").unwrap();

    let err = Settings::load(Some(dir.path())).unwrap_err();

    assert!(err.to_string().contains("document_element"));
}

#[test]
fn given_template_when_written_as_local_config_then_loads_defaults() {
    let dir = TempDir::new().unwrap();
    fs::write(local_config_path(dir.path()), Settings::template()).unwrap();

    let settings = Settings::load(Some(dir.path())).expect("load settings");

    assert_eq!(settings, Settings::default());
}
