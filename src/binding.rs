//! Binding/Watcher Encoder
//!
//! Serializes a class's binding database into the `_bindings` prototype array
//! read by the runtime binding manager. Binding positions in that array are the
//! indices the descriptor refers to, so the database is checked for index
//! consistency before anything is written.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ast::{ClassId, ExprSource, MxmlTree, NodeId, NodeKind};
use crate::error::{CodegenError, StructuralError};
use crate::stringify::{format_private_name, ExpressionStringifier, NameRegistry};

// ═══════════════════════════════════════════════════════════════════════════════
// BINDING DATABASE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BindingDatabase {
    #[serde(default)]
    pub bindings: Vec<BindingInfo>,
    /// Root watchers; each carries its own subtree.
    #[serde(default)]
    pub watchers: Vec<WatcherInfo>,
    /// Closest superclass that declares bindings of its own.
    #[serde(default)]
    pub nearest_ancestor_with_bindings: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BindingInfo {
    pub index: u32,
    #[serde(default)]
    pub source_string: Option<String>,
    #[serde(default)]
    pub source_is_simple_public_property: bool,
    /// Declaring class when the source is a static member.
    #[serde(default)]
    pub source_class: Option<String>,
    #[serde(default)]
    pub getter_expressions: Vec<ExprSource>,
    #[serde(default)]
    pub destination_string: Option<String>,
    #[serde(default)]
    pub destination: Option<BindingDestination>,
    /// Member the source resolves to; exported so the optimizer keeps it.
    #[serde(default)]
    pub resolved_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BindingDestination {
    Expression { expression: ExprSource },
    /// Attribute of the instance enclosing the binding node.
    Attribute { name: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WatcherInfo {
    pub index: u32,
    #[serde(flatten)]
    pub kind: WatcherKind,
    #[serde(default)]
    pub event_names: Vec<String>,
    #[serde(default)]
    pub binding_indices: Vec<u32>,
    #[serde(default)]
    pub is_root: bool,
    #[serde(default)]
    pub children: Vec<WatcherInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum WatcherKind {
    Function {
        function_name: String,
        #[serde(default)]
        params: Vec<ExprSource>,
    },
    StaticProperty {
        property_name: String,
        containing_class: String,
    },
    Property {
        property_name: String,
        /// Root property is private to the class and needs a getter.
        #[serde(default)]
        private_root: bool,
    },
    Xml {
        property_name: String,
    },
}

impl WatcherKind {
    pub fn tag(&self) -> u8 {
        match self {
            WatcherKind::Function { .. } => 0,
            WatcherKind::StaticProperty { .. } => 1,
            WatcherKind::Property { .. } => 2,
            WatcherKind::Xml { .. } => 3,
        }
    }
}

impl BindingDatabase {
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn binding_mut(&mut self, index: u32) -> Option<&mut BindingInfo> {
        self.bindings.iter_mut().find(|b| b.index == index)
    }

    /// Binding records must sit at the position matching their index, and
    /// every index referenced by a watcher or by the descriptor must name one
    /// of them.
    pub fn check_consistency(&self, class_name: &str, referenced: &[u32]) -> Result<(), CodegenError> {
        let count = self.bindings.len() as u32;
        let fail = |message: String| CodegenError::BindingIndex {
            class_name: class_name.to_string(),
            message,
        };

        for (position, binding) in self.bindings.iter().enumerate() {
            if binding.index != position as u32 {
                return Err(fail(format!(
                    "binding at position {} carries index {}",
                    position, binding.index
                )));
            }
        }

        let mut stack: Vec<&WatcherInfo> = self.watchers.iter().collect();
        while let Some(watcher) = stack.pop() {
            if let Some(bad) = watcher.binding_indices.iter().find(|i| **i >= count) {
                return Err(fail(format!(
                    "watcher {} references binding {} of {}",
                    watcher.index, bad, count
                )));
            }
            stack.extend(watcher.children.iter());
        }

        if let Some(bad) = referenced.iter().find(|i| **i >= count) {
            return Err(fail(format!(
                "descriptor references binding {} of {}",
                bad, count
            )));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTRIBUTE DESTINATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Setter bodies for bindings whose destination is an attribute of the
/// enclosing instance, keyed by binding index.
///
/// The path walks from that instance down to the binding node by child
/// position: `this.<id>[i][j].<attr> = value;`. XML targets use
/// `setAttribute` instead of a property store.
pub fn attribute_setters(
    tree: &MxmlTree,
    class: ClassId,
    db: &BindingDatabase,
) -> Result<HashMap<u32, String>, StructuralError> {
    let info = tree.class(class);
    let mut setters = HashMap::new();

    for binding in &db.bindings {
        let Some(BindingDestination::Attribute { name }) = &binding.destination else {
            continue;
        };
        let unresolved = || StructuralError::UnresolvedBindingDestination {
            property: name.clone(),
        };
        let node = *info.binding_nodes.get(&binding.index).ok_or_else(unresolved)?;

        let mut path: Vec<NodeId> = vec![node];
        let mut owner = tree.parent(node).ok_or_else(unresolved)?;
        while !is_addressable(tree.kind(owner)) {
            path.push(owner);
            owner = tree.parent(owner).ok_or_else(unresolved)?;
        }

        let is_xml = matches!(tree.kind(owner), NodeKind::Xml(_));
        let owner_id = match tree.declared_ids(owner) {
            (Some(id), _) | (None, Some(id)) => id.to_string(),
            (None, None) => return Err(unresolved()),
        };

        let mut text = format!("this.{}", owner_id);
        let mut parent = owner;
        while let Some(child) = path.pop() {
            let position = tree
                .children(parent)
                .iter()
                .position(|c| *c == child)
                .ok_or_else(unresolved)?;
            text.push_str(&format!("[{}]", position));
            parent = child;
        }
        if is_xml {
            text.push_str(&format!(".setAttribute('{}', value);", name));
        } else {
            text.push_str(&format!(".{} = value;", name));
        }
        setters.insert(binding.index, text);
    }
    Ok(setters)
}

fn is_addressable(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Instance(_)
            | NodeKind::Object(_)
            | NodeKind::State(_)
            | NodeKind::Xml(_)
            | NodeKind::Service { .. }
            | NodeKind::ServiceOperation { .. }
            | NodeKind::ClassRoot(_)
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENCODER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct BindingEncoder<'a> {
    stringifier: &'a dyn ExpressionStringifier,
    names: &'a mut NameRegistry,
    out: String,
}

impl<'a> BindingEncoder<'a> {
    pub fn new(stringifier: &'a dyn ExpressionStringifier, names: &'a mut NameRegistry) -> Self {
        Self {
            stringifier,
            names,
            out: String::new(),
        }
    }

    fn write(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn write_line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    /// The `_bindings` block for `class_name`, or an empty string when the
    /// class declares no bindings.
    pub fn encode(
        mut self,
        class_name: &str,
        db: &BindingDatabase,
        setters: &HashMap<u32, String>,
    ) -> String {
        if db.is_empty() {
            return String::new();
        }

        let cname = self.names.format_qualified_name(class_name);
        self.write_line("/**");
        self.write_line(" * @export");
        self.write_line(" */");
        self.write_line(&format!("{}.prototype._bindings = [", cname));

        if let Some(ancestor) = &db.nearest_ancestor_with_bindings {
            let ancestor = self.names.format_qualified_name(ancestor);
            self.write_line(&format!("{}.prototype._bindings,", ancestor));
        }

        self.write_line(&format!("{},", db.bindings.len()));
        for (position, binding) in db.bindings.iter().enumerate() {
            if position > 0 {
                self.write_line(",");
            }
            tracing::trace!(index = binding.index, "encoding binding");
            self.encode_binding(binding, setters);
        }

        if db.watchers.is_empty() {
            self.write_line("");
        } else {
            self.write_line(",");
            let count = db.watchers.len();
            for (position, watcher) in db.watchers.iter().enumerate() {
                self.encode_watcher(class_name, watcher);
                if position + 1 < count {
                    self.write_line(",");
                }
            }
        }

        self.write_line("];");
        self.out
    }

    fn encode_binding(&mut self, binding: &BindingInfo, setters: &HashMap<u32, String>) {
        if let Some(name) = &binding.resolved_name {
            self.names.add_exported(name);
        }

        let mut source = binding.source_string.clone();
        if source.is_none() && binding.source_is_simple_public_property {
            source = binding
                .getter_expressions
                .first()
                .and_then(|expr| self.stringifier.dot_path(expr));
        }

        match source.as_deref() {
            None | Some("") => {
                let getter = binding
                    .getter_expressions
                    .iter()
                    .map(|expr| self.stringifier.stringify(expr))
                    .collect::<Vec<_>>()
                    .join(" + ");
                self.write_line(&format!("function() {{ return {}; }},", getter));
            }
            Some(path) if path.contains('.') => {
                let parts: Vec<&str> = path.split('.').collect();
                let head = match &binding.source_class {
                    Some(class) => {
                        self.names.record_used(class);
                        class.as_str()
                    }
                    None => parts[0],
                };
                let mut segments = vec![quoted(head)];
                segments.extend(parts[1..].iter().map(|p| quoted(p)));
                self.write_line(&format!("[{}],", segments.join(", ")));
            }
            Some(path) => self.write_line(&format!("{},", quoted(path))),
        }

        match (&binding.destination, &binding.destination_string) {
            (Some(destination), None) => {
                let body = match destination {
                    BindingDestination::Expression { expression } => {
                        format!("{} = value;", self.stringifier.stringify(expression))
                    }
                    BindingDestination::Attribute { .. } => setters
                        .get(&binding.index)
                        .cloned()
                        .unwrap_or_default(),
                };
                self.write_line(&format!("function (value) {{ {}}},", body));
            }
            _ => self.write_line("null,"),
        }

        match binding.destination_string.as_deref() {
            None => self.write("null"),
            Some(path) if path.contains('.') => {
                let segments: Vec<String> = path.split('.').map(quoted).collect();
                self.write(&format!("[{}]", segments.join(", ")));
            }
            Some(path) => self.write(&quoted(path)),
        }
    }

    fn encode_watcher(&mut self, class_name: &str, watcher: &WatcherInfo) {
        self.write_line(&format!("{},", watcher.index));
        self.write_line(&format!("{},", watcher.kind.tag()));

        match &watcher.kind {
            WatcherKind::Function {
                function_name,
                params,
            } => {
                self.write_line(&format!("{},", quoted(function_name)));
                let params = params
                    .iter()
                    .map(|p| self.stringifier.stringify(p))
                    .collect::<Vec<_>>()
                    .join(",");
                self.write_line(&format!("function() {{ return [{}]; }},", params));
                self.write_event_names(&watcher.event_names);
                self.write_binding_indices(&watcher.binding_indices);
            }
            WatcherKind::StaticProperty {
                property_name,
                containing_class,
            } => {
                self.write_line(&format!("{},", quoted(property_name)));
                self.write_event_names(&watcher.event_names);
                self.write_binding_indices(&watcher.binding_indices);
                self.write_line("null,");
                self.write_line(&format!("{},", containing_class));
            }
            WatcherKind::Property {
                property_name,
                private_root,
            } => {
                self.write_line(&format!("{},", quoted(property_name)));
                self.write_event_names(&watcher.event_names);
                self.write_binding_indices(&watcher.binding_indices);
                if watcher.is_root && *private_root {
                    self.write_line(&format!(
                        "function() {{ return this.{}; }},",
                        format_private_name(class_name, property_name)
                    ));
                } else {
                    self.write_line("null,");
                }
            }
            WatcherKind::Xml { property_name } => {
                self.write_line(&format!("{},", quoted(property_name)));
                self.write_binding_indices(&watcher.binding_indices);
            }
        }

        if watcher.children.is_empty() {
            self.write("null");
        } else {
            self.write_line("[");
            for child in &watcher.children {
                self.encode_watcher(class_name, child);
                self.write_line(",");
            }
            self.write("null]");
        }
    }

    fn write_event_names(&mut self, events: &[String]) {
        match events {
            [] => self.write_line("null,"),
            [single] => self.write_line(&format!("{},", quoted(single))),
            many => {
                let list: Vec<String> = many.iter().map(|e| quoted(e)).collect();
                self.write_line(&format!("[{}],", list.join(",")));
            }
        }
    }

    fn write_binding_indices(&mut self, indices: &[u32]) {
        match indices {
            [] => self.write_line("null,"),
            [single] => self.write_line(&format!("{},", single)),
            many => {
                let list: Vec<String> = many.iter().map(|i| i.to_string()).collect();
                self.write_line(&format!("[{}],", list.join(",")));
            }
        }
    }
}

fn quoted(text: &str) -> String {
    format!("\"{}\"", text)
}
