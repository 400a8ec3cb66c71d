//! # MXML Code Generation
//!
//! Turns a parsed MXML class definition into the JavaScript the Royale runtime
//! consumes: a constructor with field declarations, the flat instance
//! descriptor arrays, state-override descriptors, event handler methods,
//! accessors, and the `_bindings` watcher array.
//!
//! ## Pipeline
//!
//! 1. `ast` lowers the parser's JSON dump into an arena and derives the
//!    state-dependence table.
//! 2. `walker` visits the arena and builds the specifier trees.
//! 3. `writer` renders specifier trees as descriptor arrays.
//! 4. `emit` stitches the class text, and `binding` encodes the watcher graph.
//!
//! Structural defects abort the current document only; `discovery` compiles
//! many documents in parallel and reports each failure as a `CompilerError`.

#[cfg(feature = "napi")]
use napi_derive::napi;

pub mod ast;
pub mod binding;
pub mod cache;
pub mod config;
pub mod discovery;
pub mod emit;
pub mod error;
pub mod specifier;
pub mod states;
pub mod stringify;
pub mod visitor;
pub mod walker;
pub mod writer;

#[cfg(test)]
mod document_tests;

pub use ast::{ClassDefinitionInput, MxmlTree, NodeId};
pub use cache::IncrementalCache;
pub use config::CompileOptions;
pub use discovery::{compile_directory, compile_file, find_documents, DocumentOutput};
pub use emit::{compile_document, compile_tree, CompileResult};
pub use error::{CodegenError, CompilerError, StructuralError};
pub use stringify::{ExpressionStringifier, NameRegistry, OxcStringifier, RawStringifier};

/// Compile one serialized class definition. Failures are reported as
/// diagnostics on the result rather than as a thrown error.
#[cfg(feature = "napi")]
#[napi]
pub fn compile_mxml_native(json: String, options_json: Option<String>) -> napi::Result<CompileResult> {
    let options = match options_json {
        Some(o) => CompileOptions::from_json(&o)
            .map_err(|e| napi::Error::from_reason(format!("invalid options: {}", e)))?,
        None => CompileOptions::default(),
    };
    match compile_document(&json, &options) {
        Ok(result) => Ok(result),
        Err(e) => Ok(CompileResult {
            diagnostics: vec![e.to_compiler_error("<input>")],
            ..Default::default()
        }),
    }
}
