//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (FileSystem, HullProvider)
//! but are themselves concrete structs, not traits.

mod analysis;

pub use analysis::{AnalysisService, BatchReport, ImageAnalysis, LoadedForest, RSML_EXTENSION};
