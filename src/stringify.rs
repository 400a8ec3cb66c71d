//! Expression stringification and qualified-name formatting.
//!
//! The walker never renders script expressions itself; it keeps `ExprSource`
//! handles and asks an `ExpressionStringifier` at final emission.

use indexmap::IndexSet;
use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{Expression, Statement};
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_span::SourceType;
use regex::Regex;
use std::collections::HashSet;

use crate::ast::ExprSource;

lazy_static! {
    static ref DOTTED_PATH: Regex =
        Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)*$").unwrap();

    /// Names the JS runtime provides; never recorded as dependencies.
    static ref JS_NATIVES: HashSet<&'static str> = [
        "Object", "Array", "String", "Number", "Boolean", "Function", "Class", "int", "uint",
        "XML", "XMLList", "Date", "RegExp", "Math", "Error", "JSON", "window", "document",
        "console", "*",
    ]
    .into_iter()
    .collect();
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSION STRINGIFIER
// ═══════════════════════════════════════════════════════════════════════════════

pub trait ExpressionStringifier: Send + Sync {
    /// Source-equivalent text of a statement or expression.
    fn stringify(&self, expr: &ExprSource) -> String;

    /// `a.b.c` when the expression is a plain member-access chain.
    fn dot_path(&self, expr: &ExprSource) -> Option<String>;
}

/// Re-prints expressions through oxc; falls back to the raw text when the
/// source is not parseable as JavaScript.
#[derive(Debug, Default, Clone, Copy)]
pub struct OxcStringifier;

impl ExpressionStringifier for OxcStringifier {
    fn stringify(&self, expr: &ExprSource) -> String {
        let allocator = Allocator::default();
        let source_type = SourceType::default().with_module(true);
        let ret = Parser::new(&allocator, &expr.code, source_type).parse();
        if !ret.errors.is_empty() {
            return expr.code.trim().trim_end_matches(';').to_string();
        }
        let code = Codegen::new().build(&ret.program).code;
        code.trim().trim_end_matches(';').to_string()
    }

    fn dot_path(&self, expr: &ExprSource) -> Option<String> {
        let allocator = Allocator::default();
        let source_type = SourceType::default().with_module(true);
        let ret = Parser::new(&allocator, &expr.code, source_type).parse();
        if !ret.errors.is_empty() {
            return raw_dot_path(&expr.code);
        }
        match ret.program.body.first() {
            Some(Statement::ExpressionStatement(stmt)) => member_chain(&stmt.expression),
            _ => None,
        }
    }
}

/// Leaves expressions untouched. For callers that hand over pre-rendered text.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawStringifier;

impl ExpressionStringifier for RawStringifier {
    fn stringify(&self, expr: &ExprSource) -> String {
        expr.code.trim().trim_end_matches(';').to_string()
    }

    fn dot_path(&self, expr: &ExprSource) -> Option<String> {
        raw_dot_path(&expr.code)
    }
}

fn raw_dot_path(code: &str) -> Option<String> {
    let code = code.trim();
    DOTTED_PATH.is_match(code).then(|| code.to_string())
}

/// Identifier and member chains; a single-argument call is read as a cast
/// and unwrapped.
fn member_chain(expr: &Expression) -> Option<String> {
    match expr {
        Expression::Identifier(id) => Some(id.name.to_string()),
        Expression::ThisExpression(_) => Some("this".to_string()),
        Expression::StaticMemberExpression(st) => {
            let object = member_chain(&st.object)?;
            Some(format!("{}.{}", object, st.property.name))
        }
        Expression::CallExpression(call) if call.arguments.len() == 1 => {
            call.arguments[0].as_expression().and_then(member_chain)
        }
        Expression::ParenthesizedExpression(paren) => member_chain(&paren.expression),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAME REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// Formats qualified names for emission and records the ones the generated
/// code depends on.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    document_name: String,
    sub_document_names: HashSet<String>,
    used: IndexSet<String>,
    exported: IndexSet<String>,
}

impl NameRegistry {
    pub fn new(document_name: &str) -> Self {
        Self {
            document_name: document_name.to_string(),
            ..Self::default()
        }
    }

    pub fn add_sub_document(&mut self, name: &str) {
        self.sub_document_names.insert(name.to_string());
    }

    /// Formats `name` for emission and records it as a dependency unless it
    /// is a JS native, the document itself, or one of its sub-documents.
    pub fn format_qualified_name(&mut self, name: &str) -> String {
        if self.sub_document_names.contains(name) {
            return format!("{}.{}", self.document_name, name);
        }
        if is_js_native(name) {
            return name.to_string();
        }
        if name != self.document_name {
            self.used.insert(name.to_string());
        }
        name.to_string()
    }

    pub fn record_used(&mut self, name: &str) {
        if !is_js_native(name) {
            self.used.insert(name.to_string());
        }
    }

    pub fn add_exported(&mut self, name: &str) {
        self.exported.insert(name.to_string());
    }

    pub fn used_names(&self) -> Vec<String> {
        self.used.iter().cloned().collect()
    }

    pub fn exported_names(&self) -> Vec<String> {
        self.exported.iter().cloned().collect()
    }

    /// Merges a nested document's registry into this one.
    pub fn absorb(&mut self, other: NameRegistry) {
        for name in other.used {
            if name != self.document_name {
                self.used.insert(name);
            }
        }
        self.exported.extend(other.exported);
    }
}

pub fn is_js_native(name: &str) -> bool {
    JS_NATIVES.contains(name)
}

/// Mangled member name for a private definition.
pub fn format_private_name(class_name: &str, name: &str) -> String {
    format!("{}_{}", class_name.replace('.', "_"), name)
}
