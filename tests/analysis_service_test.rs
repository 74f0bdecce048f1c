//! Tests for AnalysisService over documents on disk

use std::fs;

use tempfile::TempDir;

use rootarch::application::ApplicationError;
use rootarch::config::Settings;
use rootarch::infrastructure::di::ServiceContainer;
use rootarch::parser::ParseError;
use rootarch::util::testing::{self, rsml_document, rsml_root, write_document};

fn container() -> ServiceContainer {
    testing::init_test_setup();
    ServiceContainer::new(Settings::default())
}

fn plant() -> String {
    let lateral = rsml_root("lat", &[(0.0, 5.0), (4.0, 5.0)], 1.0, "");
    let primary = rsml_root("main", &[(0.0, 0.0), (0.0, 5.0), (0.0, 10.0)], 1.0, &lateral);
    rsml_document("cm", 1.0, &primary)
}

#[test]
fn given_document_when_loading_then_forest_and_report_returned() {
    let dir = TempDir::new().unwrap();
    let path = write_document(dir.path(), "plant.rsml", &plant());

    let loaded = container().analysis.load(&path).unwrap();

    assert_eq!(loaded.source, path);
    assert_eq!(loaded.forest.len(), 2);
    assert_eq!(loaded.report.roots_created, 2);
    assert!((loaded.forest.dpi() - 2.54).abs() < 1e-9);
}

#[test]
fn given_document_when_analyzing_then_summary_over_both_orders() {
    let dir = TempDir::new().unwrap();
    let path = write_document(dir.path(), "plant.rsml", &plant());

    let analysis = container().analysis.analyze(&path).unwrap();

    assert_eq!(analysis.image.as_deref(), Some("plate_01.tif"));
    assert_eq!(analysis.summary.primary_count, 1);
    assert_eq!(analysis.summary.lateral_count, 1);
    assert!((analysis.summary.total_length - 14.0).abs() < 1e-9);
    assert!(analysis.warnings.is_empty());
}

#[test]
fn given_document_when_exporting_rows_then_roots_nodes_and_marks() {
    let dir = TempDir::new().unwrap();
    let path = write_document(dir.path(), "plant.rsml", &plant());
    let c = container();

    let roots = c.analysis.root_stats(&path).unwrap();
    let nodes = c.analysis.node_records(&path).unwrap();
    let marks = c.analysis.mark_records(&path).unwrap();

    assert_eq!(roots.len(), 2);
    assert_eq!(roots[1].parent_id.as_deref(), Some("main"));
    assert_eq!(nodes.len(), 5);
    // origin and length row per root
    assert_eq!(marks.len(), 4);
}

#[test]
fn given_missing_file_when_loading_then_operation_failed() {
    let dir = TempDir::new().unwrap();

    let err = container().analysis.load(&dir.path().join("absent.rsml")).unwrap_err();

    assert!(matches!(err, ApplicationError::OperationFailed { .. }));
}

#[test]
fn given_malformed_document_when_loading_then_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write_document(dir.path(), "broken.rsml", "<rsml><scene>");

    let err = container().analysis.load(&path).unwrap_err();

    assert!(matches!(err, ApplicationError::Parse(ParseError::Xml(_))));
}

#[test]
fn given_directory_when_batching_then_failures_collected_not_fatal() {
    let dir = TempDir::new().unwrap();
    write_document(dir.path(), "a_good.rsml", &plant());
    write_document(dir.path(), "b_bad.rsml", "<svg/>");
    write_document(dir.path(), "notes.txt", "not a document");
    let nested = dir.path().join("day2");
    fs::create_dir(&nested).unwrap();
    write_document(&nested, "c_good.RSML", &plant());
    let c = container();

    let flat = c.analysis.batch(dir.path(), false).unwrap();
    let deep = c.analysis.batch(dir.path(), true).unwrap();

    assert_eq!(flat.analyses.len(), 1);
    assert_eq!(flat.failures.len(), 1);
    assert!(flat.failures[0].0.ends_with("b_bad.rsml"));
    assert_eq!(deep.analyses.len(), 2);
    assert_eq!(deep.failures.len(), 1);
}

#[test]
fn given_missing_directory_when_batching_then_error() {
    let dir = TempDir::new().unwrap();

    let result = container().analysis.batch(&dir.path().join("nope"), false);

    assert!(result.is_err());
}

#[test]
fn given_container_when_creating_empty_forest_then_uses_configured_dpi() {
    let mut settings = Settings::default();
    settings.report.default_dpi = 600.0;

    let c = ServiceContainer::new(settings);

    assert_eq!(c.analysis.new_forest().dpi(), 600.0);
    assert!(c.analysis.new_forest().is_empty());
}
