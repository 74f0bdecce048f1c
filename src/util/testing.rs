//! Test helpers: one-time tracing setup and RSML fixtures

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::{debug, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

static TEST_SETUP: Once = Once::new();

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        if env::var("RUST_LOG").is_err() {
            env::set_var("RUST_LOG", "debug");
        }
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_target(true)
            .with_test_writer()
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(env_filter),
    );

    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}

/// Wraps `plant_body` (the content of one `<plant>`) in a complete document.
pub fn rsml_document(unit: &str, resolution: f64, plant_body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rsml>
  <metadata>
    <version>1</version>
    <unit>{unit}</unit>
    <resolution>{resolution}</resolution>
    <file-key>test</file-key>
    <software>rootarch-tests</software>
    <image><name>plate_01.tif</name></image>
  </metadata>
  <scene>
    <plant>
{plant_body}
    </plant>
  </scene>
</rsml>
"#
    )
}

/// A `<root>` element with a polyline and matching diameter function.
pub fn rsml_root(id: &str, points: &[(f64, f64)], diameter: f64, nested: &str) -> String {
    let pts: String = points
        .iter()
        .map(|(x, y)| format!(r#"<point x="{x}" y="{y}"/>"#))
        .collect();
    let samples: String = points
        .iter()
        .map(|_| format!(r#"<sample value="{diameter}"/>"#))
        .collect();
    format!(
        r#"<root id="{id}">
  <geometry><polyline>{pts}</polyline></geometry>
  <functions><function name="diameter" domain="polyline">{samples}</function></functions>
  {nested}
</root>"#
    )
}

/// Writes `content` to `dir/name` and returns the path.
pub fn write_document(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap_or_else(|e| panic!("write {}: {}", path.display(), e));
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_setup() {
        init_test_setup();
    }

    #[test]
    fn given_fixture_helpers_when_composing_then_document_is_well_formed() {
        let doc = rsml_document("cm", 1.0, &rsml_root("r1", &[(0.0, 0.0), (1.0, 1.0)], 2.0, ""));
        assert!(roxmltree::Document::parse(&doc).is_ok());
    }
}
