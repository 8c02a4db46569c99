//! # covsbom-rs: Dependency Call Attribution for Maven Projects
//!
//! Reads a Maven project's build descriptors, obtains sources for each
//! third-party dependency, and reports which dependency artifact declares each
//! type the project calls into. Located declarations are attached to the
//! calls, with their own inner calls followed to a configured depth.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      AnalysisPipeline                        │
//! ├──────────────┬──────────────┬───────────────┬────────────────┤
//! │    build     │   acquire    │   analysis    │      io        │
//! │              │              │               │                │
//! │ • pom.xml    │ • Decompiler │ • Extraction  │ • JSON reports │
//! │ • mvn tree   │ • -sources   │ • Resolver    │                │
//! │ • classpath  │   archives   │ • Expansion   │                │
//! │              │              │ • Buffer      │                │
//! └──────────────┴──────────────┴───────────────┴────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use covsbom_rs::{AnalysisPipeline, CovsbomConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = AnalysisPipeline::new(CovsbomConfig::default());
//!     let outcome = pipeline.analyze("./my-service".as_ref()).await?;
//!
//!     println!(
//!         "{} third-party calls across {} dependencies",
//!         outcome.reports.summary.buffered_calls,
//!         outcome.graph.len()
//!     );
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core model, configuration and orchestration
pub mod core {
    //! Shared data model, configuration, errors and the analysis pipeline.

    pub mod config;
    pub mod errors;
    pub mod graph;
    pub mod heuristics;
    pub mod model;
    pub mod pipeline;
}

pub mod acquire;
pub mod analysis;
pub mod build;
pub mod io;
pub mod lang;

pub use core::config::CovsbomConfig;
pub use core::errors::{CovsbomError, Result};
pub use core::graph::{DependencyGraph, DependencyId};
pub use core::model::{Coordinate, Dependency, MethodCallEntry, MethodDeclarationInfo};
pub use core::pipeline::{AnalysisDiagnostics, AnalysisOutcome, AnalysisPipeline};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
