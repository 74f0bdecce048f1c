//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use crate::application::services::AnalysisService;
use crate::config::Settings;
use crate::domain::HullProvider;
use crate::infrastructure::hull::GeoConvexHull;
use crate::infrastructure::traits::{FileSystem, RealFileSystem};
use crate::parser::RsmlParser;

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Convex hull implementation
    pub hull: Arc<dyn HullProvider + Send + Sync>,

    pub analysis: AnalysisService,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(settings, Arc::new(RealFileSystem), Arc::new(GeoConvexHull))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        hull: Arc<dyn HullProvider + Send + Sync>,
    ) -> Self {
        let settings = Arc::new(settings);
        let parser = RsmlParser::new(settings.parser.clone());
        let analysis = AnalysisService::new(fs.clone(), hull.clone(), parser)
            .with_default_dpi(settings.report.default_dpi);

        Self {
            settings,
            fs,
            hull,
            analysis,
        }
    }
}
