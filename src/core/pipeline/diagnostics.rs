//! Audit trail for non-fatal failures.
//!
//! Each failure that the pipeline tolerates is counted by category and kept
//! as a record, so callers can judge how complete a report is.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Records kept before further ones are only counted.
const MAX_RECORDS: usize = 1_000;

/// Category of a tolerated failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCategory {
    /// Missing or malformed build descriptor
    Descriptor,
    /// Source acquisition failed for a dependency
    Acquisition,
    /// A source file could not be parsed
    Parse,
    /// A declaring type matched no acquired source root
    ResolutionMiss,
}

/// One tolerated failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticRecord {
    /// Failure category
    pub category: DiagnosticCategory,
    /// Affected path, coordinate or type
    pub subject: String,
    /// Error description
    pub message: String,
}

/// Counters and records for one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDiagnostics {
    /// Descriptor errors
    pub descriptor_errors: usize,
    /// Acquisition errors
    pub acquisition_errors: usize,
    /// Parse errors
    pub parse_errors: usize,
    /// Distinct declaring types left unresolved
    pub resolution_misses: usize,
    /// Individual records, oldest first
    pub records: Vec<DiagnosticRecord>,
    /// Records dropped once the record list was full
    pub dropped_records: usize,
}

impl AnalysisDiagnostics {
    /// Create an empty audit trail
    pub fn new() -> Self {
        Self::default()
    }

    /// Count and log a tolerated failure
    pub fn record(
        &mut self,
        category: DiagnosticCategory,
        subject: impl Into<String>,
        message: impl Display,
    ) {
        let subject = subject.into();
        let message = message.to_string();
        warn!("{:?} failure for {}: {}", category, subject, message);

        match category {
            DiagnosticCategory::Descriptor => self.descriptor_errors += 1,
            DiagnosticCategory::Acquisition => self.acquisition_errors += 1,
            DiagnosticCategory::Parse => self.parse_errors += 1,
            DiagnosticCategory::ResolutionMiss => self.resolution_misses += 1,
        }

        if self.records.len() < MAX_RECORDS {
            self.records.push(DiagnosticRecord {
                category,
                subject,
                message,
            });
        } else {
            self.dropped_records += 1;
        }
    }

    /// Count for one category
    pub fn count(&self, category: DiagnosticCategory) -> usize {
        match category {
            DiagnosticCategory::Descriptor => self.descriptor_errors,
            DiagnosticCategory::Acquisition => self.acquisition_errors,
            DiagnosticCategory::Parse => self.parse_errors,
            DiagnosticCategory::ResolutionMiss => self.resolution_misses,
        }
    }

    /// Total tolerated failures across categories
    pub fn total(&self) -> usize {
        self.descriptor_errors + self.acquisition_errors + self.parse_errors + self.resolution_misses
    }

    /// Fold another audit trail into this one
    pub fn merge(&mut self, other: AnalysisDiagnostics) {
        self.descriptor_errors += other.descriptor_errors;
        self.acquisition_errors += other.acquisition_errors;
        self.parse_errors += other.parse_errors;
        self.resolution_misses += other.resolution_misses;
        self.dropped_records += other.dropped_records;
        for record in other.records {
            if self.records.len() < MAX_RECORDS {
                self.records.push(record);
            } else {
                self.dropped_records += 1;
            }
        }
    }
}
