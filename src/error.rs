//! Error Module for MXML Codegen
//!
//! Two layers: `CompilerError` is the serialisable diagnostic record handed to
//! callers (and across the Node bridge), `CodegenError` is what internal code
//! propagates with `?`.

#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// INVARIANT CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const INV_MISSING_PROPERTY_ANCESTOR: &str = "MXML001";
pub const INV_UNRESOLVED_BINDING_DESTINATION: &str = "MXML002";
pub const INV_MISSING_OVERRIDE_SCOPE: &str = "MXML003";
pub const INV_BINDING_INDEX: &str = "MXML004";
pub const INV_MALFORMED_INPUT: &str = "MXML005";
pub const INV_IO: &str = "MXML006";

// ═══════════════════════════════════════════════════════════════════════════════
// GUARANTEES
// ═══════════════════════════════════════════════════════════════════════════════

fn get_guarantee(code: &str) -> &'static str {
    match code {
        INV_MISSING_PROPERTY_ANCESTOR => {
            "Every state-added instance sits under a property specifier of its parent."
        }
        INV_UNRESOLVED_BINDING_DESTINATION => {
            "Every data-bound state override has exactly one binding record."
        }
        INV_MISSING_OVERRIDE_SCOPE => "Override records are only emitted inside a state.",
        INV_BINDING_INDEX => {
            "Binding indices in the watcher graph resolve to emitted binding records."
        }
        INV_MALFORMED_INPUT => "Document input matches the MXML AST schema.",
        INV_IO => "Build inputs and cache entries are readable and writable.",
        _ => "Unknown invariant.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct CompilerError {
    pub code: String,
    pub error_type: String,
    pub message: String,
    pub guarantee: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub context: Option<String>,
    pub hints: Vec<String>,
}

impl CompilerError {
    pub fn new(code: &str, message: &str, file: &str, line: u32, column: u32) -> Self {
        Self::with_details(code, message, file, line, column, None, vec![])
    }

    pub fn with_details(
        code: &str,
        message: &str,
        file: &str,
        line: u32,
        column: u32,
        context: Option<String>,
        hints: Vec<String>,
    ) -> Self {
        CompilerError {
            code: code.to_string(),
            error_type: "INTERNAL_CODEGEN_DEFECT".to_string(),
            message: message.to_string(),
            guarantee: get_guarantee(code).to_string(),
            file: file.to_string(),
            line,
            column,
            context,
            hints,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROPAGATED ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Violations of tree shape that a well-formed AST never produces.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StructuralError {
    #[error("state-added instance of '{type_name}' has no enclosing property specifier")]
    MissingPropertyAncestor { type_name: String },

    #[error("data-bound override of '{property}' has no matching binding record")]
    UnresolvedBindingDestination { property: String },

    #[error("override record for '{name}' emitted outside a state overrides scope")]
    MissingOverrideScope { name: String },
}

impl StructuralError {
    pub fn code(&self) -> &'static str {
        match self {
            StructuralError::MissingPropertyAncestor { .. } => INV_MISSING_PROPERTY_ANCESTOR,
            StructuralError::UnresolvedBindingDestination { .. } => {
                INV_UNRESOLVED_BINDING_DESTINATION
            }
            StructuralError::MissingOverrideScope { .. } => INV_MISSING_OVERRIDE_SCOPE,
        }
    }
}

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("structural violation in {class_name}: {source}")]
    Structural {
        class_name: String,
        #[source]
        source: StructuralError,
    },

    #[error("binding index mismatch in {class_name}: {message}")]
    BindingIndex { class_name: String, message: String },

    #[error("malformed document input: {0}")]
    Input(#[from] serde_json::Error),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl CodegenError {
    pub fn code(&self) -> &'static str {
        match self {
            CodegenError::Structural { source, .. } => source.code(),
            CodegenError::BindingIndex { .. } => INV_BINDING_INDEX,
            CodegenError::Input(_) => INV_MALFORMED_INPUT,
            CodegenError::Io(_) => INV_IO,
        }
    }

    /// Flatten into the diagnostic record reported for `file`.
    pub fn to_compiler_error(&self, file: &str) -> CompilerError {
        let (line, column) = match self {
            CodegenError::Input(e) => (e.line() as u32, e.column() as u32),
            _ => (0, 0),
        };
        let mut err = CompilerError::new(self.code(), &self.to_string(), file, line, column);
        if let CodegenError::Input(_) = self {
            err.error_type = "INPUT_ERROR".to_string();
        }
        err
    }
}

pub type Result<T, E = CodegenError> = std::result::Result<T, E>;
