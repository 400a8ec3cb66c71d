//! Batch Discovery
//!
//! Recursively scans a directory for `*.mxml.json` AST dumps and compiles them
//! in parallel. A failing document becomes a diagnostic on its own output and
//! never stops the rest of the batch.

#[cfg(feature = "napi")]
use napi_derive::napi;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::cache::IncrementalCache;
use crate::config::CompileOptions;
use crate::emit::{compile_document, CompileResult};
use crate::error::{CodegenError, Result};

/// Suffix of the AST dumps produced by the external MXML parser.
pub const AST_SUFFIX: &str = ".mxml.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct DocumentOutput {
    pub path: String,
    /// Where the generated JavaScript belongs: the input path with `.js` in
    /// place of the AST suffix.
    pub output_path: String,
    pub cached: bool,
    pub result: CompileResult,
}

impl DocumentOutput {
    pub fn is_ok(&self) -> bool {
        self.result.diagnostics.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISCOVERY
// ═══════════════════════════════════════════════════════════════════════════════

/// Recursively find all AST dumps under `dir`, sorted for stable output.
pub fn find_documents(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(AST_SUFFIX))
        })
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

pub fn output_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let stem = name.strip_suffix(AST_SUFFIX).unwrap_or(name);
    path.with_file_name(format!("{}.js", stem))
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Compile one AST dump, consulting and refreshing `cache` when present.
pub fn compile_file(
    path: &Path,
    options: &CompileOptions,
    cache: Option<&IncrementalCache>,
) -> DocumentOutput {
    let path_str = path.to_string_lossy().to_string();
    let output_path = output_path_for(path).to_string_lossy().to_string();

    let source = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            return DocumentOutput {
                path: path_str.clone(),
                output_path,
                cached: false,
                result: failed(CodegenError::Io(e), &path_str),
            }
        }
    };

    if let Some(result) = cache.and_then(|c| c.get(&path_str, &source, options)) {
        return DocumentOutput {
            path: path_str,
            output_path,
            cached: true,
            result,
        };
    }

    let result = match compile_document(&source, options) {
        Ok(result) => {
            if let Some(cache) = cache {
                if let Err(e) = cache.set(&path_str, &source, options, &result) {
                    warn!(file = %path_str, error = %e, "failed to write cache entry");
                }
            }
            result
        }
        Err(e) => failed(e, &path_str),
    };

    DocumentOutput {
        path: path_str,
        output_path,
        cached: false,
        result,
    }
}

fn failed(err: CodegenError, file: &str) -> CompileResult {
    warn!(file, code = err.code(), error = %err, "document failed to compile");
    CompileResult {
        diagnostics: vec![err.to_compiler_error(file)],
        ..Default::default()
    }
}

/// Compile every AST dump under `base_dir` in parallel.
#[tracing::instrument(skip(options), fields(dir = %base_dir.display()))]
pub fn compile_directory(base_dir: &Path, options: &CompileOptions) -> Result<Vec<DocumentOutput>> {
    if !base_dir.exists() {
        return Ok(Vec::new());
    }

    let cache = IncrementalCache::from_options(options)?;
    let files = find_documents(base_dir);
    debug!(count = files.len(), "discovered documents");

    Ok(files
        .par_iter()
        .map(|path| compile_file(path, options, cache.as_ref()))
        .collect())
}

/// Write the generated code of every successful document next to its input.
/// Returns the number of files written.
pub fn write_outputs(outputs: &[DocumentOutput]) -> Result<usize> {
    let mut written = 0;
    for output in outputs.iter().filter(|o| o.is_ok()) {
        fs::write(&output.output_path, &output.result.code)?;
        written += 1;
    }
    Ok(written)
}

#[cfg(feature = "napi")]
#[napi]
pub fn compile_directory_native(
    base_dir: String,
    options_json: Option<String>,
) -> napi::Result<Vec<DocumentOutput>> {
    let options = match options_json {
        Some(json) => CompileOptions::from_json(&json)
            .map_err(|e| napi::Error::from_reason(e.to_string()))?,
        None => CompileOptions::default(),
    };
    compile_directory(Path::new(&base_dir), &options)
        .map_err(|e| napi::Error::from_reason(e.to_string()))
}
