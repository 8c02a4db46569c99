//! Report output.
//!
//! - **reports**: JSON renderings of the full call map, the third-party
//!   subset, per-dependency usage and the run summary

pub mod reports;

pub use reports::{
    CallRecord, CallReport, DeclarationRecord, DependencyUsageRecord, ReportPaths, ReportRenderer,
    ReportSet, ReportWriter, RunSummary, UsageReport,
};
