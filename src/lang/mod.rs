//! Language-specific parsing and AST processing modules.

pub mod common;
// Tree-sitter adapters
pub mod java;

pub use common::{
    CallExpression, CompilationUnit, ImportDeclaration, MethodDeclaration, SourceParser,
    TypeDeclaration, TypeKind,
};
pub use java::JavaAdapter;

use crate::core::errors::Result;

/// Parser used for project and dependency sources
pub fn default_parser() -> Result<Box<dyn SourceParser>> {
    Ok(Box::new(JavaAdapter::new()?))
}
