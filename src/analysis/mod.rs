//! Call extraction, type resolution and declaration expansion.
//!
//! These stages run after sources are acquired. Extraction reads project
//! sources, the resolver attributes declaring types to dependencies, the
//! expander follows calls into dependency sources, and the buffer collects
//! unique third-party calls per dependency.

pub mod buffer;
pub mod expansion;
pub mod extraction;
pub mod resolver;

pub use buffer::MethodCallBuffer;
pub use expansion::{DeclarationArena, DeclarationExpander, ExpansionStats};
pub use extraction::{CallExtractor, ExtractionResult, FileRecord, ShallowestPackage};
pub use resolver::{Resolution, ResolvedType, TypeResolver};
