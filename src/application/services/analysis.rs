//! Document analysis service
//!
//! Loads RSML documents through the filesystem boundary and runs the
//! statistics engine over the resulting forest.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::application::statistics::{ForestStats, MarkRecord, NodeRecord, RootStats, StatisticsEngine};
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{HullProvider, RootForest};
use crate::infrastructure::traits::FileSystem;
use crate::parser::{ParseReport, RsmlParser};

/// File extension of RSML documents.
pub const RSML_EXTENSION: &str = "rsml";

/// A parsed document.
#[derive(Debug, Clone)]
pub struct LoadedForest {
    pub source: PathBuf,
    pub forest: RootForest,
    pub report: ParseReport,
}

/// Summary of one document.
#[derive(Debug, Clone, Serialize)]
pub struct ImageAnalysis {
    pub source: PathBuf,
    pub image: Option<String>,
    pub roots_created: usize,
    pub warnings: Vec<String>,
    pub summary: ForestStats,
}

/// Outcome of analysing a directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub analyses: Vec<ImageAnalysis>,
    /// Documents that could not be read, with the reason
    pub failures: Vec<(PathBuf, String)>,
}

/// Service turning documents into report rows.
pub struct AnalysisService {
    fs: Arc<dyn FileSystem>,
    hull: Arc<dyn HullProvider + Send + Sync>,
    parser: RsmlParser,
    default_dpi: f64,
}

impl AnalysisService {
    /// Create a new analysis service.
    pub fn new(fs: Arc<dyn FileSystem>, hull: Arc<dyn HullProvider + Send + Sync>, parser: RsmlParser) -> Self {
        Self {
            fs,
            hull,
            parser,
            default_dpi: 0.0,
        }
    }

    /// Resolution of forests that were never filled from a document.
    pub fn with_default_dpi(mut self, dpi: f64) -> Self {
        self.default_dpi = dpi;
        self
    }

    /// Empty forest at the default resolution.
    pub fn new_forest(&self) -> RootForest {
        RootForest::new(self.default_dpi)
    }

    /// Read and parse one document.
    #[instrument(level = "debug", skip(self))]
    pub fn load(&self, path: &Path) -> ApplicationResult<LoadedForest> {
        if !self.fs.is_file(path) {
            return Err(ApplicationError::OperationFailed {
                context: format!("not a file: {}", path.display()),
                source: "expected an RSML document".into(),
            });
        }
        let text = self.fs.read_to_string(path).with_path_context("read document", path)?;

        let mut forest = self.new_forest();
        let report = self.parser.read_into(&mut forest, &text)?;
        debug!("load: {} root(s) from {}", report.roots_created, path.display());

        Ok(LoadedForest {
            source: path.to_path_buf(),
            forest,
            report,
        })
    }

    pub fn engine<'a>(&'a self, forest: &'a RootForest) -> StatisticsEngine<'a> {
        StatisticsEngine::new(forest, &*self.hull)
    }

    pub fn root_stats(&self, path: &Path) -> ApplicationResult<Vec<RootStats>> {
        let loaded = self.load(path)?;
        Ok(self.engine(&loaded.forest).root_stats())
    }

    pub fn node_records(&self, path: &Path) -> ApplicationResult<Vec<NodeRecord>> {
        let loaded = self.load(path)?;
        Ok(self.engine(&loaded.forest).node_records())
    }

    pub fn mark_records(&self, path: &Path) -> ApplicationResult<Vec<MarkRecord>> {
        let loaded = self.load(path)?;
        Ok(self.engine(&loaded.forest).mark_records())
    }

    /// Whole-image summary of one document.
    #[instrument(level = "debug", skip(self))]
    pub fn analyze(&self, path: &Path) -> ApplicationResult<ImageAnalysis> {
        let loaded = self.load(path)?;
        let summary = self.engine(&loaded.forest).forest_stats();
        Ok(ImageAnalysis {
            source: loaded.source,
            image: loaded.report.metadata.image.clone(),
            roots_created: loaded.report.roots_created,
            warnings: loaded.report.warnings.iter().map(ToString::to_string).collect(),
            summary,
        })
    }

    /// Analyse every document in `dir`; unreadable documents are collected as
    /// failures instead of aborting the batch.
    ///
    /// Documents are analysed in parallel, results keep the sorted file order.
    #[instrument(level = "debug", skip(self))]
    pub fn batch(&self, dir: &Path, recursive: bool) -> ApplicationResult<BatchReport> {
        let depth = if recursive { usize::MAX } else { 1 };
        let files = self
            .fs
            .list_files(dir, RSML_EXTENSION, depth)
            .with_path_context("list documents", dir)?;
        debug!("batch: {} document(s) in {}", files.len(), dir.display());

        let results: Vec<(PathBuf, ApplicationResult<ImageAnalysis>)> = files
            .into_par_iter()
            .map(|file| {
                let result = self.analyze(&file);
                (file, result)
            })
            .collect();

        let mut report = BatchReport::default();
        for (file, result) in results {
            match result {
                Ok(analysis) => report.analyses.push(analysis),
                Err(e) => {
                    warn!("skipping {}: {}", file.display(), e);
                    report.failures.push((file, e.to_string()));
                }
            }
        }
        debug!(
            "batch: {} analysed, {} failed",
            report.analyses.len(),
            report.failures.len()
        );
        Ok(report)
    }
}
