//! Java language adapter with tree-sitter integration.

use tree_sitter::{Language, Node, Parser, Tree};

use super::common::{
    CallExpression, CompilationUnit, ImportDeclaration, MethodDeclaration, SourceParser,
    TypeDeclaration, TypeKind,
};
use crate::core::errors::{CovsbomError, Result};

/// Java-specific parsing
pub struct JavaAdapter {
    /// Tree-sitter parser for Java
    parser: Parser,
}

impl JavaAdapter {
    /// Create a new Java adapter
    pub fn new() -> Result<Self> {
        let language: Language = tree_sitter_java::LANGUAGE.into();
        let mut parser = Parser::new();
        parser.set_language(&language).map_err(|e| {
            CovsbomError::parse("java", format!("Failed to set parser language: {}", e))
        })?;

        Ok(Self { parser })
    }

    fn parse_tree(&mut self, source_code: &str) -> Result<Tree> {
        self.parser
            .parse(source_code, None)
            .ok_or_else(|| CovsbomError::parse("java", "Failed to parse Java source"))
    }

    fn first_error(node: Node) -> Option<Node> {
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        children
            .into_iter()
            .filter(|child| child.has_error() || child.is_missing())
            .find_map(Self::first_error)
    }
}

impl SourceParser for JavaAdapter {
    fn parse_source(&mut self, source: &str, file_path: &str) -> Result<CompilationUnit> {
        let tree = self.parse_tree(source)?;
        let root = tree.root_node();

        if root.has_error() {
            let position = Self::first_error(root).map(|n| n.start_position());
            return Err(CovsbomError::parse_with_location(
                "java",
                "syntax error",
                file_path,
                position.map(|p| p.row + 1),
                position.map(|p| p.column + 1),
            ));
        }

        let mut builder = UnitBuilder::new(source);
        builder.visit(root)?;
        Ok(builder.unit)
    }

    fn language_name(&self) -> &str {
        "java"
    }

    fn file_extension(&self) -> &str {
        "java"
    }
}

/// Walks one syntax tree and accumulates the compilation unit.
struct UnitBuilder<'s> {
    source: &'s str,
    unit: CompilationUnit,
    type_stack: Vec<String>,
    method_stack: Vec<usize>,
    anonymous_count: usize,
}

impl<'s> UnitBuilder<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            unit: CompilationUnit::default(),
            type_stack: Vec::new(),
            method_stack: Vec::new(),
            anonymous_count: 0,
        }
    }

    fn node_text(&self, node: Node) -> Result<String> {
        Ok(node
            .utf8_text(self.source.as_bytes())
            .map_err(|e| CovsbomError::parse("java", e.to_string()))?
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn field_text(&self, node: Node, field: &str) -> Result<Option<String>> {
        node.child_by_field_name(field)
            .map(|child| self.node_text(child))
            .transpose()
    }

    fn current_type(&self) -> Option<String> {
        if self.type_stack.is_empty() {
            None
        } else {
            Some(self.unit.qualify(&self.type_stack.join(".")))
        }
    }

    fn visit(&mut self, node: Node) -> Result<()> {
        match node.kind() {
            "package_declaration" => {
                self.unit.package = Self::name_child(node)
                    .map(|n| self.node_text(n))
                    .transpose()?;
                Ok(())
            }
            "import_declaration" => self.visit_import(node),
            "class_declaration" => self.visit_type(node, TypeKind::Class),
            "interface_declaration" => self.visit_type(node, TypeKind::Interface),
            "enum_declaration" => self.visit_type(node, TypeKind::Enum),
            "record_declaration" => self.visit_type(node, TypeKind::Record),
            "annotation_type_declaration" => self.visit_type(node, TypeKind::Annotation),
            "method_declaration" | "constructor_declaration" => self.visit_method(node),
            "object_creation_expression" => self.visit_object_creation(node),
            "field_declaration" => {
                self.record_variables(node, true)?;
                self.visit_children(node)
            }
            "local_variable_declaration" => {
                self.record_variables(node, false)?;
                self.visit_children(node)
            }
            "enhanced_for_statement" => {
                if let (Some(ty), Some(name)) =
                    (self.field_text(node, "type")?, self.field_text(node, "name")?)
                {
                    self.record_variable(name, &ty, false);
                }
                self.visit_children(node)
            }
            "method_invocation" => {
                self.record_call(node)?;
                self.visit_children(node)
            }
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node) -> Result<()> {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            self.visit(child)?;
        }
        Ok(())
    }

    fn name_child(node: Node) -> Option<Node> {
        let mut cursor = node.walk();
        let found = node
            .named_children(&mut cursor)
            .find(|child| matches!(child.kind(), "scoped_identifier" | "identifier"));
        found
    }

    fn visit_import(&mut self, node: Node) -> Result<()> {
        let Some(name_node) = Self::name_child(node) else {
            return Ok(());
        };

        let mut cursor = node.walk();
        let mut is_static = false;
        let mut is_wildcard = false;
        for child in node.children(&mut cursor) {
            match child.kind() {
                "static" => is_static = true,
                "asterisk" => is_wildcard = true,
                _ => {}
            }
        }

        let name = self.node_text(name_node)?;
        self.unit.imports.push(ImportDeclaration {
            name,
            is_static,
            is_wildcard,
            line: node.start_position().row + 1,
        });
        Ok(())
    }

    fn visit_type(&mut self, node: Node, kind: TypeKind) -> Result<()> {
        let Some(name) = self.field_text(node, "name")? else {
            return self.visit_children(node);
        };
        self.type_stack.push(name.clone());
        let qualified_name = self.unit.qualify(&self.type_stack.join("."));
        self.unit.types.push(TypeDeclaration {
            name,
            qualified_name,
            kind,
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
        });

        let result = self.visit_children(node);
        self.type_stack.pop();
        result
    }

    fn visit_object_creation(&mut self, node: Node) -> Result<()> {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            if child.kind() != "class_body" {
                self.visit(child)?;
                continue;
            }

            self.anonymous_count += 1;
            let name = format!("Anonymous-{}", self.anonymous_count);
            self.type_stack.push(name.clone());
            let qualified_name = self.unit.qualify(&self.type_stack.join("."));
            self.unit.types.push(TypeDeclaration {
                name,
                qualified_name,
                kind: TypeKind::Anonymous,
                start_line: child.start_position().row + 1,
                end_line: child.end_position().row + 1,
            });
            let result = self.visit(child);
            self.type_stack.pop();
            result?;
        }
        Ok(())
    }

    fn visit_method(&mut self, node: Node) -> Result<()> {
        let Some(name) = self.field_text(node, "name")? else {
            return self.visit_children(node);
        };

        let mut method = MethodDeclaration {
            name,
            declaring_type: self.current_type().unwrap_or_default(),
            parameter_types: Vec::new(),
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            locals: Default::default(),
        };

        if let Some(parameters) = node.child_by_field_name("parameters") {
            let mut cursor = parameters.walk();
            let params: Vec<Node> = parameters.named_children(&mut cursor).collect();
            for param in params {
                if let Some((ty, name)) = self.parameter(param)? {
                    method.parameter_types.push(ty.clone());
                    method.locals.insert(name, ty.trim_end_matches("...").to_string());
                }
            }
        }

        let index = self.unit.methods.len();
        self.unit.methods.push(method);
        self.method_stack.push(index);
        let result = self.visit_children(node);
        self.method_stack.pop();
        result
    }

    fn parameter(&self, param: Node) -> Result<Option<(String, String)>> {
        match param.kind() {
            "formal_parameter" => {
                let ty = self.field_text(param, "type")?;
                let name = self.field_text(param, "name")?;
                Ok(ty.zip(name).map(|(ty, name)| (simple_type(&ty), name)))
            }
            "spread_parameter" => {
                let mut cursor = param.walk();
                let mut ty = None;
                let mut name = None;
                for child in param.named_children(&mut cursor) {
                    match child.kind() {
                        "modifiers" => {}
                        "variable_declarator" => name = self.field_text(child, "name")?,
                        _ if ty.is_none() => ty = Some(self.node_text(child)?),
                        _ => {}
                    }
                }
                Ok(ty
                    .zip(name)
                    .map(|(ty, name)| (format!("{}...", simple_type(&ty)), name)))
            }
            _ => Ok(None),
        }
    }

    fn record_variables(&mut self, node: Node, is_field: bool) -> Result<()> {
        let Some(ty) = self.field_text(node, "type")? else {
            return Ok(());
        };
        let mut cursor = node.walk();
        let declarators: Vec<Node> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();
        for declarator in declarators {
            if let Some(name) = self.field_text(declarator, "name")? {
                self.record_variable(name, &ty, is_field);
            }
        }
        Ok(())
    }

    fn record_variable(&mut self, name: String, ty: &str, is_field: bool) {
        let ty = simple_type(ty);
        match self.method_stack.last() {
            Some(&idx) if !is_field => {
                self.unit.methods[idx].locals.entry(name).or_insert(ty);
            }
            _ => {
                self.unit.fields.entry(name).or_insert(ty);
            }
        }
    }

    fn record_call(&mut self, node: Node) -> Result<()> {
        let Some(method_name) = self.field_text(node, "name")? else {
            return Ok(());
        };
        let receiver = self.field_text(node, "object")?;

        let mut arguments = Vec::new();
        if let Some(list) = node.child_by_field_name("arguments") {
            let mut cursor = list.walk();
            let args: Vec<Node> = list
                .named_children(&mut cursor)
                .filter(|arg| !arg.kind().ends_with("comment"))
                .collect();
            for arg in args {
                arguments.push(self.node_text(arg)?);
            }
        }

        let call = CallExpression {
            receiver,
            method_name,
            arguments,
            line: node.start_position().row + 1,
            text: self.node_text(node)?,
            enclosing_type: self.current_type(),
            enclosing_method: self.method_stack.last().copied(),
        };
        self.unit.calls.push(call);
        Ok(())
    }
}

/// Reduce a written type to its erasure: `Map.Entry<K, V>[]` becomes `Map.Entry`.
pub fn simple_type(written: &str) -> String {
    let base = written.split('<').next().unwrap_or(written).trim();
    base.trim_end_matches("[]").trim().to_string()
}

#[cfg(test)]
#[path = "java_tests.rs"]
mod tests;
