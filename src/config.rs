//! Compile options
//!
//! Loaded from JSON (camelCase keys); every field has a default so partial
//! option files are accepted.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;

pub const DEFAULT_INSTANCE_OVERRIDE: &str = "org.apache.royale.states.AddItems";
pub const DEFAULT_PROPERTY_OVERRIDE: &str = "org.apache.royale.states.SetProperty";
pub const DEFAULT_STYLE_OVERRIDE: &str = "org.apache.royale.states.SetStyle";
pub const DEFAULT_EVENT_OVERRIDE: &str = "org.apache.royale.states.SetEventHandler";
pub const DEFAULT_CLASS_FACTORY: &str = "org.apache.royale.core.ClassFactory";
pub const DEFAULT_LANGUAGE_BIND: &str = "goog.bind";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    /// Newline-and-indent delimiters in rendered descriptors.
    pub pretty_print: bool,
    /// Emit `@export` tags on handlers and state descriptors.
    pub emit_exports: bool,
    /// Wrap descriptor property names in `goog.reflect.objectProperty`.
    pub reflect_object_property: bool,
    pub instance_override_class: String,
    pub property_override_class: String,
    pub style_override_class: String,
    pub event_override_class: String,
    pub class_factory: String,
    pub language_bind: String,
    /// Incremental cache location; `None` disables caching.
    pub cache_dir: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            pretty_print: true,
            emit_exports: true,
            reflect_object_property: false,
            instance_override_class: DEFAULT_INSTANCE_OVERRIDE.to_string(),
            property_override_class: DEFAULT_PROPERTY_OVERRIDE.to_string(),
            style_override_class: DEFAULT_STYLE_OVERRIDE.to_string(),
            event_override_class: DEFAULT_EVENT_OVERRIDE.to_string(),
            class_factory: DEFAULT_CLASS_FACTORY.to_string(),
            language_bind: DEFAULT_LANGUAGE_BIND.to_string(),
            cache_dir: None,
        }
    }
}

impl CompileOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }
}
