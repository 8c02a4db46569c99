//! Parser-facing structures shared by every source adapter.
//!
//! A [`SourceParser`] turns one source file into a [`CompilationUnit`]: the
//! package, imports, declared types and methods, and every call expression
//! with its receiver text and 1-based line.

use std::collections::HashMap;
use std::path::Path;

use crate::core::errors::{CovsbomError, Result};

/// One `import` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDeclaration {
    /// Imported name without `import`, `static` or the trailing `.*`
    pub name: String,
    /// `import static ...`
    pub is_static: bool,
    /// `import a.b.*`
    pub is_wildcard: bool,
    /// 1-based line
    pub line: usize,
}

/// Kind of declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// `class`
    Class,
    /// `interface`
    Interface,
    /// `enum`
    Enum,
    /// `record`
    Record,
    /// `@interface`
    Annotation,
    /// Anonymous class body
    Anonymous,
}

/// A declared (possibly nested) type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDeclaration {
    /// Simple name (`Inner`, or `Anonymous-1`)
    pub name: String,
    /// Package plus enclosing types: `com.acme.Outer.Inner`
    pub qualified_name: String,
    /// Declaration kind
    pub kind: TypeKind,
    /// First line
    pub start_line: usize,
    /// Last line
    pub end_line: usize,
}

/// A declared method or constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDeclaration {
    /// Method name (constructors use the type name)
    pub name: String,
    /// Qualified name of the enclosing type
    pub declaring_type: String,
    /// Parameter type text, generics stripped
    pub parameter_types: Vec<String>,
    /// First line
    pub start_line: usize,
    /// Last line
    pub end_line: usize,
    /// Parameters and locals: variable name to simple type name
    pub locals: HashMap<String, String>,
}

impl MethodDeclaration {
    /// `name(Type, Type)`
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.parameter_types.join(", "))
    }
}

/// A method invocation expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallExpression {
    /// Receiver expression text, absent for unqualified calls
    pub receiver: Option<String>,
    /// Invoked method name
    pub method_name: String,
    /// Argument expression text
    pub arguments: Vec<String>,
    /// 1-based line of the expression start
    pub line: usize,
    /// Whole expression text, whitespace collapsed
    pub text: String,
    /// Qualified name of the innermost enclosing type
    pub enclosing_type: Option<String>,
    /// Index into [`CompilationUnit::methods`] of the enclosing method
    pub enclosing_method: Option<usize>,
}

impl CallExpression {
    /// `name(arg, arg)` as written at the call site
    pub fn signature(&self) -> String {
        format!("{}({})", self.method_name, self.arguments.join(", "))
    }
}

/// Parsed structure of one source file.
#[derive(Debug, Clone, Default)]
pub struct CompilationUnit {
    /// `package` declaration
    pub package: Option<String>,
    /// Import declarations in source order
    pub imports: Vec<ImportDeclaration>,
    /// Declared types in source order
    pub types: Vec<TypeDeclaration>,
    /// Declared methods in source order
    pub methods: Vec<MethodDeclaration>,
    /// Call expressions in source order
    pub calls: Vec<CallExpression>,
    /// Field names to simple type names
    pub fields: HashMap<String, String>,
}

impl CompilationUnit {
    /// Qualify a simple or nested type name with the file's package
    pub fn qualify(&self, name: &str) -> String {
        match &self.package {
            Some(package) if !package.is_empty() => format!("{package}.{name}"),
            _ => name.to_string(),
        }
    }

    /// Declared type of a variable visible from `call`
    pub fn variable_type(&self, call: &CallExpression, variable: &str) -> Option<&str> {
        call.enclosing_method
            .and_then(|idx| self.methods.get(idx))
            .and_then(|method| method.locals.get(variable))
            .or_else(|| self.fields.get(variable))
            .map(String::as_str)
    }

    /// Methods declared directly in `declaring_type`
    pub fn methods_of<'a>(
        &'a self,
        declaring_type: &'a str,
    ) -> impl Iterator<Item = (usize, &'a MethodDeclaration)> + 'a {
        self.methods
            .iter()
            .enumerate()
            .filter(move |(_, m)| m.declaring_type == declaring_type)
    }

    /// Calls made from within the method at `method_index`
    pub fn calls_in_method(&self, method_index: usize) -> impl Iterator<Item = &CallExpression> {
        self.calls
            .iter()
            .filter(move |call| call.enclosing_method == Some(method_index))
    }

    /// Whether a type with this simple name is declared in the file
    pub fn declares_type(&self, simple_name: &str) -> bool {
        self.types.iter().any(|t| t.name == simple_name)
    }
}

/// Parser capability consumed by extraction and expansion.
pub trait SourceParser: Send {
    /// Parse source text. Malformed input yields a parse error.
    fn parse_source(&mut self, source: &str, file_path: &str) -> Result<CompilationUnit>;

    /// Language handled by this parser
    fn language_name(&self) -> &str;

    /// Source file extension without the leading dot
    fn file_extension(&self) -> &str;

    /// Read and parse a file
    fn parse_file(&mut self, path: &Path) -> Result<CompilationUnit> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            CovsbomError::io(format!("Failed to read source file {}", path.display()), e)
        })?;
        self.parse_source(&source, &path.to_string_lossy())
    }
}
