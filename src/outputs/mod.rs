//! Output generation for pipeline results.
//!
//! # Submodules
//!
//! - [`json`]: Writes `PipelineResult` data to stdout or dated JSON files

pub mod json;
