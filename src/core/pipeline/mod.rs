//! Analysis Pipeline Module
//!
//! Orchestrates one attribution run over a project directory.
//!
//! ## Pipeline Stages
//!
//! 1. **Build Tree**: read `pom.xml` descriptors, or an evaluated dependency tree
//! 2. **Source Acquisition**: one source root per dependency, concurrently
//! 3. **Call Extraction**: imports and call sites of every project file
//! 4. **Declaration Expansion**: locate called declarations in dependency sources
//! 5. **Buffering and Reports**: attribute calls to dependencies and write JSON
//!
//! Stages run strictly in this order; each consumes the previous one's output.
//! Only a failure to write the reports ends a run with an error. Everything
//! else is recorded in [`AnalysisDiagnostics`].
//!
//! ## Usage
//!
//! ```ignore
//! use covsbom_rs::core::config::CovsbomConfig;
//! use covsbom_rs::core::pipeline::AnalysisPipeline;
//!
//! let pipeline = AnalysisPipeline::new(CovsbomConfig::default());
//! let outcome = pipeline.analyze("./my-service".as_ref()).await?;
//! println!("{} third-party calls", outcome.reports.summary.buffered_calls);
//! ```

pub mod diagnostics;
mod pipeline_executor;
mod pipeline_results;

pub use diagnostics::{AnalysisDiagnostics, DiagnosticCategory, DiagnosticRecord};
pub use pipeline_executor::AnalysisPipeline;
pub use pipeline_results::{AnalysisOutcome, RunStats};
