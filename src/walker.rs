//! Tree-Building Walker
//!
//! One pass over a lowered class definition builds the specifier tree plus
//! the side tables document assembly needs: the instance list for accessors,
//! event handlers, scripts, primitive declarations and the state override
//! descriptors. Inline components are compiled recursively, each with its own
//! `WalkContext` swapped in for the duration.

use std::collections::HashMap;
use std::mem;

use tracing::{debug, trace, warn};

use crate::ast::{ClassId, MxmlTree, NodeId, NodeKind, StateData};
use crate::config::CompileOptions;
use crate::error::{CodegenError, Result, StructuralError};
use crate::specifier::{
    EventId, EventSpecifier, InstanceSpecifier, SpecId, SpecifierTree, MXML_CONTENT,
};
use crate::states::{is_state_dependent, OverrideIndexTable, OverrideSlot};
use crate::stringify::{ExpressionStringifier, NameRegistry};
use crate::visitor::{walk_children, walk_nodes, MxmlVisitor};

pub const ID_PREFIX: &str = "$ID";
pub const EVENT_PREFIX: &str = "$EH";
pub const BINDING_PREFIX: &str = "$BID";

// ═══════════════════════════════════════════════════════════════════════════════
// WALK CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything one class definition accumulates while it is walked.
#[derive(Debug)]
pub struct WalkContext {
    pub class: ClassId,
    pub specs: SpecifierTree,
    /// Content-mode roots; the first one backs the `MXMLDescriptor` getter.
    pub descriptor_tree: Vec<SpecId>,
    /// Root-tag properties and events, rendered by `generateMXMLAttributes`.
    pub properties_tree: SpecId,
    /// Deferred `itemsDescriptor` entries shared by state overrides.
    pub state_overrides: SpecId,
    pub events: Vec<EventId>,
    pub instances: Vec<SpecId>,
    pub scripts: Vec<NodeId>,
    pub primitive_declarations: Vec<NodeId>,
    /// `(binding index, destination)` rewrites for data-bound overrides.
    pub binding_destinations: Vec<(u32, String)>,
    /// Rendered inline components.
    pub sub_documents: String,

    current_instances: Vec<SpecId>,
    current_property_specifiers: Vec<SpecId>,
    in_mxml_content: bool,
    in_states_override: Vec<NodeId>,
    override_instance_to_emit: Option<NodeId>,
    making_simple_array: bool,
    event_counter: u32,
    binding_counter: u32,
    event_handler_names: HashMap<NodeId, String>,
    override_indices: OverrideIndexTable,
}

impl WalkContext {
    pub fn new(class: ClassId) -> Self {
        let mut specs = SpecifierTree::new();
        let properties_tree = specs.alloc(InstanceSpecifier {
            is_top_node: true,
            ..InstanceSpecifier::default()
        });
        let state_overrides = specs.alloc(InstanceSpecifier {
            is_top_node: true,
            ..InstanceSpecifier::default()
        });
        Self {
            class,
            specs,
            descriptor_tree: Vec::new(),
            properties_tree,
            state_overrides,
            events: Vec::new(),
            instances: Vec::new(),
            scripts: Vec::new(),
            primitive_declarations: Vec::new(),
            binding_destinations: Vec::new(),
            sub_documents: String::new(),
            current_instances: Vec::new(),
            current_property_specifiers: Vec::new(),
            in_mxml_content: false,
            in_states_override: Vec::new(),
            override_instance_to_emit: None,
            making_simple_array: false,
            event_counter: 0,
            binding_counter: 0,
            event_handler_names: HashMap::new(),
            override_indices: OverrideIndexTable::new(),
        }
    }

    pub fn has_state_overrides(&self) -> bool {
        !self.specs.get(self.state_overrides).property_specifiers.is_empty()
    }

    /// Adds `spec` to the accessor list unless an instance with the same
    /// explicit id is already there.
    fn add_instance_if_needed(&mut self, spec: SpecId) {
        if let Some(id) = self.specs.get(spec).id.as_deref() {
            let duplicate = self
                .instances
                .iter()
                .any(|other| self.specs.get(*other).id.as_deref() == Some(id));
            if duplicate {
                warn!(id, "duplicate explicit id, keeping first instance");
                return;
            }
        }
        self.instances.push(spec);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WALKER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct Walker<'t> {
    tree: &'t MxmlTree,
    options: &'t CompileOptions,
    stringifier: &'t dyn ExpressionStringifier,
    names: NameRegistry,
    cx: WalkContext,
}

impl<'t> Walker<'t> {
    pub fn new(
        tree: &'t MxmlTree,
        options: &'t CompileOptions,
        stringifier: &'t dyn ExpressionStringifier,
    ) -> Self {
        let root = tree.root_class();
        Self {
            tree,
            options,
            stringifier,
            names: NameRegistry::new(&tree.class(root).class_name),
            cx: WalkContext::new(root),
        }
    }

    /// Walks the root class definition.
    pub fn walk_document(&mut self) -> Result<()> {
        let info = self.tree.class(self.cx.class);
        debug!(class = %info.class_name, "walking document");
        self.visit_node(info.root)
    }

    pub fn into_parts(self) -> (WalkContext, NameRegistry) {
        (self.cx, self.names)
    }

    fn structural(&self, source: StructuralError) -> CodegenError {
        CodegenError::Structural {
            class_name: self.tree.class(self.cx.class).class_name.clone(),
            source,
        }
    }

    fn current_instance(&self) -> Option<SpecId> {
        self.cx.current_instances.last().copied()
    }

    fn current_property_specifier(&self) -> Option<SpecId> {
        self.cx.current_property_specifiers.last().copied()
    }

    fn current_state(&self) -> Option<&'t StateData> {
        let tree = self.tree;
        self.cx
            .in_states_override
            .last()
            .and_then(|node| match tree.kind(*node) {
                NodeKind::State(state) => Some(state),
                _ => None,
            })
    }

    /// Explicit id, else the effective id assigned at lowering.
    fn effective_id(&self, node: NodeId) -> Option<&'t str> {
        match self.tree.declared_ids(node) {
            (Some(id), _) | (None, Some(id)) => Some(id),
            (None, None) => None,
        }
    }

    fn parent_is_declarations(&self, node: NodeId) -> bool {
        self.tree
            .parent(node)
            .map(|p| matches!(self.tree.kind(p), NodeKind::Declarations(_)))
            .unwrap_or(false)
    }

    fn quoted(text: &str) -> String {
        format!("'{}'", text)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INSTANCES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Builds the descriptor for an instance-like node and returns it, or
    /// `None` when the node belongs to a state pass other than the current one.
    fn emit_instance(&mut self, node: NodeId) -> Result<Option<SpecId>> {
        let tree = self.tree;
        let state = self.current_state();
        if self.cx.override_instance_to_emit != Some(node)
            && is_state_dependent(tree, node, state, false)
        {
            return Ok(None);
        }

        let (type_name, has_local_id) = match tree.kind(node) {
            NodeKind::State(state) => (state.type_name.as_str(), false),
            NodeKind::Xml(xml) => (xml.type_name.as_str(), false),
            _ => match tree.instance_data(node) {
                Some(data) => (data.type_name.as_str(), data.local_id.is_some()),
                None => return Ok(None),
            },
        };
        let (id, effective) = tree.declared_ids(node);
        let id = id.map(str::to_string);
        let effective_id = if id.is_none() {
            effective.map(str::to_string)
        } else {
            None
        };

        let ps = self.current_property_specifier();
        let name = self.names.format_qualified_name(type_name);
        let mut spec = InstanceSpecifier {
            id: id.clone(),
            effective_id,
            has_local_id,
            ..InstanceSpecifier::instance(&name, ps)
        };

        let inst = if ps.is_some() {
            self.cx.specs.attach(spec)
        } else if self.cx.in_mxml_content {
            let inst = self.cx.specs.alloc(spec);
            self.cx.descriptor_tree.push(inst);
            inst
        } else {
            // child of a top-level tag with no default property: park it under
            // a property named after its id
            let prop = self.cx.specs.attach(InstanceSpecifier {
                name: id.clone(),
                is_property: true,
                parent: Some(self.cx.properties_tree),
                ..InstanceSpecifier::default()
            });
            spec.parent = Some(prop);
            self.cx.specs.attach(spec)
        };

        self.cx.add_instance_if_needed(inst);

        if let NodeKind::State(state) = tree.kind(node) {
            self.emit_state(node, state, inst, id)?;
        } else if let Some(data) = tree.instance_data(node) {
            self.cx.current_instances.push(inst);
            let walked = walk_nodes(self, &data.properties);
            self.cx.current_instances.pop();
            walked?;

            self.cx.current_instances.push(inst);
            let walked = walk_nodes(self, &data.events);
            self.cx.current_instances.pop();
            walked?;
        }

        Ok(Some(inst))
    }

    fn emit_state(
        &mut self,
        node: NodeId,
        state: &'t StateData,
        inst: SpecId,
        id: Option<String>,
    ) -> Result<()> {
        self.cx.specs.attach(InstanceSpecifier {
            id: id.clone(),
            ..InstanceSpecifier::valued("name", Self::quoted(&state.name), Some(inst))
        });
        let overrides = self.cx.specs.attach(InstanceSpecifier {
            id,
            has_array: true,
            ..InstanceSpecifier::property("overrides", Some(inst))
        });

        let tree = self.tree;
        let Some(dependents) = tree.class(self.cx.class).dependents.get(&state.name) else {
            return Ok(());
        };

        self.cx.current_property_specifiers.push(overrides);
        self.cx.in_states_override.push(node);
        let result = self.emit_state_overrides(node, dependents);
        self.cx.in_states_override.pop();
        self.cx.current_property_specifiers.pop();
        result
    }

    /// Instance additions first, then property, style and event overrides.
    fn emit_state_overrides(&mut self, state: NodeId, dependents: &'t [NodeId]) -> Result<()> {
        let tree = self.tree;
        let options = self.options;
        for node in dependents {
            if tree.instance_data(*node).is_some() {
                self.emit_instance_override(*node, state)?;
            }
        }
        for node in dependents {
            match tree.kind(*node) {
                NodeKind::PropertySpecifier(spec) => {
                    let class = if spec.is_style {
                        &options.style_override_class
                    } else {
                        &options.property_override_class
                    };
                    self.emit_property_or_style_override(*node, class)?;
                }
                NodeKind::EventSpecifier(_) => self.emit_event_override(*node)?,
                _ => {}
            }
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATE OVERRIDES
    // ═══════════════════════════════════════════════════════════════════════════

    fn override_scope(&self, name: &str) -> Result<SpecId> {
        self.current_property_specifier().ok_or_else(|| {
            self.structural(StructuralError::MissingOverrideScope {
                name: name.to_string(),
            })
        })
    }

    fn emit_instance_override(&mut self, node: NodeId, state: NodeId) -> Result<()> {
        let tree = self.tree;
        let type_name = tree
            .instance_data(node)
            .map(|d| d.type_name.as_str())
            .unwrap_or_default();
        let scope = self.override_scope(type_name)?;

        let so = self.cx.state_overrides;
        let next = self.cx.specs.get(so).property_specifiers.len();
        let slot = self.cx.override_indices.index_of(node, next);
        if let OverrideSlot::Allocated(index) = slot {
            trace!(index, ?node, "emitting deferred instance");
            let items = self.cx.specs.attach(InstanceSpecifier {
                has_array: true,
                ..InstanceSpecifier::property("itemsDescriptor", Some(so))
            });
            let old_in_mxml_content = self.cx.in_mxml_content;
            self.cx.current_property_specifiers.push(items);
            self.cx.in_mxml_content = true;
            let previous_override = self.cx.override_instance_to_emit.replace(node);
            let walked = self.visit_node(node);
            self.cx.override_instance_to_emit = previous_override;
            self.cx.in_mxml_content = old_in_mxml_content;
            self.cx.current_property_specifiers.pop();
            walked?;
        }

        let class = self
            .names
            .format_qualified_name(&self.options.instance_override_class);
        let add_items = self
            .cx
            .specs
            .attach(InstanceSpecifier::instance(&class, Some(scope)));
        self.cx.specs.attach(InstanceSpecifier {
            has_array: true,
            ..InstanceSpecifier::valued(
                "itemsDescriptorIndex",
                slot.index().to_string(),
                Some(add_items),
            )
        });

        let property = tree
            .nearest_ancestor(node, |k| matches!(k, NodeKind::PropertySpecifier(_)))
            .ok_or_else(|| {
                self.structural(StructuralError::MissingPropertyAncestor {
                    type_name: type_name.to_string(),
                })
            })?;
        let owner = tree.parent(property).filter(|p| tree.instance_data(*p).is_some());
        if let (Some(owner), NodeKind::PropertySpecifier(spec)) = (owner, tree.kind(property)) {
            let owner_id = self.effective_id(owner).unwrap_or_default();
            self.cx.specs.attach(InstanceSpecifier::valued(
                "destination",
                Self::quoted(owner_id),
                Some(add_items),
            ));
            self.cx.specs.attach(InstanceSpecifier::valued(
                "propertyName",
                Self::quoted(&spec.name),
                Some(add_items),
            ));
        }

        // anchor on the nearest earlier sibling that exists in this state
        let state_data = match tree.kind(state) {
            NodeKind::State(data) => Some(data),
            _ => None,
        };
        let mut previous = None;
        if let Some(parent) = tree.parent(node) {
            for sibling in tree.children(parent) {
                if sibling == node {
                    break;
                }
                if tree.is_instance_node(sibling)
                    && !is_state_dependent(tree, sibling, state_data, true)
                {
                    previous = Some(sibling);
                }
            }
        }

        match previous {
            None => {
                self.cx.specs.attach(InstanceSpecifier::valued(
                    "position",
                    Self::quoted("first"),
                    Some(add_items),
                ));
            }
            Some(sibling) => {
                let relative_to = self.effective_id(sibling).unwrap_or("null");
                self.cx.specs.attach(InstanceSpecifier::valued(
                    "position",
                    Self::quoted("after"),
                    Some(add_items),
                ));
                self.cx.specs.attach(InstanceSpecifier::valued(
                    "relativeTo",
                    Self::quoted(relative_to),
                    Some(add_items),
                ));
            }
        }
        Ok(())
    }

    fn emit_property_or_style_override(&mut self, node: NodeId, override_class: &str) -> Result<()> {
        let tree = self.tree;
        let NodeKind::PropertySpecifier(spec) = tree.kind(node) else {
            return Ok(());
        };
        let scope = self.override_scope(&spec.name)?;
        let target = tree
            .parent(node)
            .filter(|p| tree.instance_data(*p).is_some())
            .and_then(|p| self.effective_id(p));
        trace!(property = %spec.name, target = ?target, "state override");

        let class = self.names.format_qualified_name(override_class);
        let set_prop = self
            .cx
            .specs
            .attach(InstanceSpecifier::instance(&class, Some(scope)));
        if let Some(target) = target {
            self.cx.specs.attach(InstanceSpecifier::valued(
                "target",
                Self::quoted(target),
                Some(set_prop),
            ));
        }
        self.cx.specs.attach(InstanceSpecifier::valued(
            "name",
            Self::quoted(&spec.name),
            Some(set_prop),
        ));

        let bound = spec.value.and_then(|v| match tree.kind(v) {
            NodeKind::DataBinding { binding_index, .. } => Some(*binding_index),
            _ => None,
        });
        match bound {
            None => {
                let value = self
                    .cx
                    .specs
                    .attach(InstanceSpecifier::property("value", Some(set_prop)));
                self.cx.current_property_specifiers.push(value);
                let walked = match spec.value {
                    Some(child) => self.visit_node(child),
                    None => Ok(()),
                };
                self.cx.current_property_specifiers.pop();
                walked?;
            }
            Some(binding_index) => {
                let override_id = format!("{}{}", BINDING_PREFIX, self.cx.binding_counter);
                self.cx.binding_counter += 1;
                self.cx.specs.get_mut(set_prop).id = Some(override_id.clone());
                self.cx.instances.push(set_prop);
                let index = binding_index.ok_or_else(|| {
                    self.structural(StructuralError::UnresolvedBindingDestination {
                        property: spec.name.clone(),
                    })
                })?;
                self.cx
                    .binding_destinations
                    .push((index, format!("{}.value", override_id)));
            }
        }
        Ok(())
    }

    fn emit_event_override(&mut self, node: NodeId) -> Result<()> {
        let tree = self.tree;
        let NodeKind::EventSpecifier(ev) = tree.kind(node) else {
            return Ok(());
        };
        let scope = self.override_scope(&ev.name)?;
        let target = tree
            .parent(node)
            .filter(|p| tree.instance_data(*p).is_some())
            .and_then(|p| self.effective_id(p))
            .unwrap_or_default();
        let name = EventSpecifier::js_event_name(&ev.name);

        let handler = match self.cx.event_handler_names.get(&node) {
            Some(handler) => handler.clone(),
            None => match self.emit_event_specifier(node)? {
                Some(handler) => handler,
                None => {
                    warn!(event = %ev.name, "event override outside its state, skipped");
                    return Ok(());
                }
            },
        };
        trace!(event = %name, handler = %handler, "event override");

        let class = self
            .names
            .format_qualified_name(&self.options.event_override_class);
        let set_event = self
            .cx
            .specs
            .attach(InstanceSpecifier::instance(&class, Some(scope)));
        self.cx.specs.attach(InstanceSpecifier::valued(
            "target",
            Self::quoted(target),
            Some(set_event),
        ));
        self.cx.specs.attach(InstanceSpecifier::valued(
            "name",
            Self::quoted(&name),
            Some(set_event),
        ));
        self.cx.specs.attach(InstanceSpecifier::valued(
            "handlerFunction",
            format!(
                "{}(this.{}, this, '{}')",
                self.options.language_bind, handler, handler
            ),
            Some(set_event),
        ));
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SPECIFIERS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Registers a handler for `node` and returns its name, or `None` when the
    /// event belongs to another state.
    fn emit_event_specifier(&mut self, node: NodeId) -> Result<Option<String>> {
        let tree = self.tree;
        if is_state_dependent(tree, node, self.current_state(), true) {
            return Ok(None);
        }
        let NodeKind::EventSpecifier(ev) = tree.kind(node) else {
            return Ok(None);
        };

        let depth = tree.class(self.cx.class).class_depth;
        let handler = format!("{}_{}_{}", EVENT_PREFIX, depth, self.cx.event_counter);
        self.cx.event_counter += 1;

        let event = self.cx.specs.add_event(EventSpecifier {
            name: ev.name.clone(),
            event_handler: handler.clone(),
            event_type: ev.event_type.clone(),
            node,
        });
        self.cx.event_handler_names.insert(node, handler.clone());

        match self.current_instance() {
            Some(inst) => self.cx.specs.get_mut(inst).event_specifiers.push(event),
            // a top-level tag event
            None if self.cx.in_states_override.is_empty() => {
                let root = self.cx.properties_tree;
                self.cx.specs.get_mut(root).event_specifiers.push(event);
            }
            None => {}
        }
        self.cx.events.push(event);
        Ok(Some(handler))
    }

    fn emit_property_specifier(&mut self, node: NodeId) -> Result<()> {
        let tree = self.tree;
        let NodeKind::PropertySpecifier(spec) = tree.kind(node) else {
            return Ok(());
        };
        let value = spec.value;
        if let Some(v) = value {
            if matches!(tree.kind(v), NodeKind::DataBinding { .. }) {
                return Ok(());
            }
        }
        if is_state_dependent(tree, node, None, true) {
            return Ok(());
        }

        let current = self.current_instance();
        let old_in_mxml_content = self.cx.in_mxml_content;
        let mut reused = None;
        if spec.name == MXML_CONTENT {
            self.cx.in_mxml_content = true;
            let siblings = match current {
                Some(inst) => self.cx.specs.get(inst).property_specifiers.clone(),
                None => self.cx.descriptor_tree.clone(),
            };
            reused = self.cx.specs.find_named(&siblings, MXML_CONTENT);
        }

        let ps = match reused {
            Some(ps) => ps,
            None => {
                let mut created = InstanceSpecifier::property(&spec.name, current);
                if current.is_some() {
                    self.cx.specs.attach(created)
                } else if self.cx.in_mxml_content {
                    let ps = self.cx.specs.alloc(created);
                    self.cx.descriptor_tree.push(ps);
                    ps
                } else {
                    created.parent = Some(self.cx.properties_tree);
                    self.cx.specs.attach(created)
                }
            }
        };

        let (has_array, has_object) = match value.map(|v| tree.kind(v)) {
            Some(NodeKind::Array { .. }) => (true, false),
            Some(NodeKind::Object(_)) => (false, true),
            _ => (false, false),
        };
        let created = self.cx.specs.get_mut(ps);
        created.has_array = has_array;
        created.has_object = has_object;

        self.cx.current_property_specifiers.push(ps);
        let walked = match value {
            Some(v) => self.visit_node(v),
            None => Ok(()),
        };
        self.cx.current_property_specifiers.pop();
        self.cx.in_mxml_content = old_in_mxml_content;
        walked
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // VALUES
    // ═══════════════════════════════════════════════════════════════════════════

    fn emit_literal(&mut self, text: &str) {
        let Some(ps) = self.current_property_specifier() else {
            warn!(literal = text, "literal outside a property, dropped");
            return;
        };
        let quote = self.cx.specs.get(ps).value_needs_quotes;
        let mut escaped = if quote {
            text.replace('\'', "\\'")
        } else {
            text.to_string()
        };
        escaped = escaped.replace("\r\n", "\\n").replace('\n', "\\n");

        let rendered = if quote {
            format!("'{}'", escaped)
        } else {
            escaped
        };
        self.cx.specs.append_value(ps, &rendered);
    }

    fn set_value(&mut self, value: String) {
        match self.current_property_specifier() {
            Some(ps) => self.cx.specs.get_mut(ps).value = Some(value),
            None => warn!(value = %value, "value outside a property, dropped"),
        }
    }

    /// Inline `{k: v, ...}` literal for an object inside a simple array.
    fn emit_inline_object(&mut self, ps: SpecId, node: NodeId) -> Result<()> {
        let tree = self.tree;
        let properties = tree
            .instance_data(node)
            .map(|d| d.properties.as_slice())
            .unwrap_or_default();
        self.cx.specs.append_value(ps, "{");
        for (i, prop) in properties.iter().enumerate() {
            if let NodeKind::PropertySpecifier(spec) = tree.kind(*prop) {
                self.cx.specs.append_value(ps, &format!("{}: ", spec.name));
                if let Some(value) = spec.value {
                    self.visit_node(value)?;
                }
            }
            if i + 1 < properties.len() {
                self.cx.specs.append_value(ps, ", ");
            }
        }
        self.cx.specs.append_value(ps, "}");
        Ok(())
    }

    fn emit_sub_document(&mut self, node: NodeId, class: ClassId) -> Result<()> {
        let tree = self.tree;
        let info = tree.class(class);
        let document = tree.class(tree.root_class()).class_name.clone();
        let factory = self.names.format_qualified_name(&self.options.class_factory);
        let document = self.names.format_qualified_name(&document);
        self.names.add_sub_document(&info.class_name);
        self.set_value(format!(
            "new {}({}.{})",
            factory, document, info.class_name
        ));

        debug!(component = %info.class_name, ?node, "walking inline component");
        let parent = mem::replace(&mut self.cx, WalkContext::new(class));
        let walked = self.visit_node(info.root);
        let finished = mem::replace(&mut self.cx, parent);
        walked?;

        let text = crate::emit::render_class(
            tree,
            finished,
            &mut self.names,
            self.stringifier,
            self.options,
        )?;
        self.cx.sub_documents.push_str(&text);
        Ok(())
    }

    fn string_property(&self, properties: &[NodeId], name: &str) -> Option<&'t str> {
        let tree = self.tree;
        properties.iter().find_map(|p| match tree.kind(*p) {
            NodeKind::PropertySpecifier(spec) if spec.name == name => {
                spec.value.and_then(|v| match tree.kind(v) {
                    NodeKind::String { literal, .. } => literal.as_deref(),
                    _ => None,
                })
            }
            _ => None,
        })
    }

    /// Names declared by an operation's `arguments` object.
    fn argument_names(&self, properties: &[NodeId]) -> Vec<&'t str> {
        let tree = self.tree;
        let arguments = properties.iter().find_map(|p| match tree.kind(*p) {
            NodeKind::PropertySpecifier(spec) if spec.name == "arguments" => spec.value,
            _ => None,
        });
        let Some(object) = arguments.and_then(|a| tree.instance_data(a)) else {
            return Vec::new();
        };
        object
            .properties
            .iter()
            .filter_map(|p| match tree.kind(*p) {
                NodeKind::PropertySpecifier(spec) => Some(spec.name.as_str()),
                _ => None,
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISPATCH
// ═══════════════════════════════════════════════════════════════════════════════

impl<'t> MxmlVisitor<'t> for Walker<'t> {
    fn tree(&self) -> &'t MxmlTree {
        self.tree
    }

    fn visit_instance(&mut self, node: NodeId) -> Result<()> {
        self.emit_instance(node).map(|_| ())
    }

    fn visit_state(&mut self, node: NodeId) -> Result<()> {
        self.emit_instance(node).map(|_| ())
    }

    fn visit_object(&mut self, node: NodeId) -> Result<()> {
        let ps = self.current_property_specifier();
        if self.cx.making_simple_array {
            return match ps {
                Some(ps) => self.emit_inline_object(ps, node),
                None => Ok(()),
            };
        }
        let as_instance = match ps {
            Some(ps) => {
                let spec = self.cx.specs.get(ps);
                spec.has_object || spec.parent.is_none()
            }
            None => true,
        };
        if as_instance {
            self.emit_instance(node).map(|_| ())
        } else {
            walk_children(self, node)
        }
    }

    fn visit_array(&mut self, node: NodeId) -> Result<()> {
        if self.parent_is_declarations(node) {
            self.cx.primitive_declarations.push(node);
            return Ok(());
        }
        let tree = self.tree;
        let children = tree.children(node);
        let simple = !children.iter().any(|c| {
            matches!(
                tree.kind(*c),
                NodeKind::Array { .. } | NodeKind::Instance(_) | NodeKind::State(_)
            )
        });

        let ps = self.current_property_specifier();
        let old_simple = self.cx.making_simple_array;
        let simple_ps = if simple { ps } else { None };
        if let Some(ps) = simple_ps {
            self.cx.making_simple_array = true;
            self.cx.specs.get_mut(ps).value = Some("[".to_string());
        }
        let mut walked = Ok(());
        for (i, child) in children.iter().enumerate() {
            walked = self.visit_node(*child);
            if walked.is_err() {
                break;
            }
            if let Some(ps) = simple_ps {
                if i + 1 < children.len() {
                    self.cx.specs.append_value(ps, ",");
                }
            }
        }
        if let Some(ps) = simple_ps {
            self.cx.specs.append_value(ps, "]");
        }
        self.cx.making_simple_array = old_simple;
        walked
    }

    fn visit_declarations(&mut self, node: NodeId) -> Result<()> {
        self.cx.in_mxml_content = true;
        let current = self.current_instance();
        let reused = match current {
            None => self
                .cx
                .specs
                .find_named(&self.cx.descriptor_tree, MXML_CONTENT),
            Some(_) => None,
        };
        let ps = match reused {
            Some(ps) => ps,
            None => {
                let ps = self
                    .cx
                    .specs
                    .alloc(InstanceSpecifier::property(MXML_CONTENT, current));
                self.cx.descriptor_tree.push(ps);
                ps
            }
        };

        self.cx.current_property_specifiers.push(ps);
        let walked = walk_children(self, node);
        self.cx.current_property_specifiers.pop();
        self.cx.in_mxml_content = false;
        walked
    }

    fn visit_property_specifier(&mut self, node: NodeId) -> Result<()> {
        self.emit_property_specifier(node)
    }

    fn visit_event_specifier(&mut self, node: NodeId) -> Result<()> {
        self.emit_event_specifier(node).map(|_| ())
    }

    fn visit_string(&mut self, node: NodeId) -> Result<()> {
        if self.parent_is_declarations(node) {
            self.cx.primitive_declarations.push(node);
            return Ok(());
        }
        let tree = self.tree;
        let NodeKind::String { literal, .. } = tree.kind(node) else {
            return Ok(());
        };
        if let Some(ps) = self.current_property_specifier() {
            self.cx.specs.get_mut(ps).value_needs_quotes = true;
        }
        self.emit_literal(literal.as_deref().unwrap_or_default());
        Ok(())
    }

    fn visit_primitive(&mut self, node: NodeId) -> Result<()> {
        if self.parent_is_declarations(node) {
            self.cx.primitive_declarations.push(node);
            return Ok(());
        }
        let tree = self.tree;
        if let NodeKind::Primitive { literal, .. } = tree.kind(node) {
            self.emit_literal(literal.as_deref().unwrap_or_default());
        }
        Ok(())
    }

    fn visit_component(&mut self, node: NodeId) -> Result<()> {
        match self.tree.kind(node) {
            NodeKind::Component(class) => self.emit_sub_document(node, *class),
            _ => Ok(()),
        }
    }

    fn visit_factory(&mut self, node: NodeId) -> Result<()> {
        let tree = self.tree;
        if let NodeKind::Factory(class_name) = tree.kind(node) {
            let factory = self.names.format_qualified_name(&self.options.class_factory);
            let class = self.names.format_qualified_name(class_name);
            self.set_value(format!("new {}({})", factory, class));
        }
        Ok(())
    }

    fn visit_class_ref(&mut self, node: NodeId) -> Result<()> {
        let tree = self.tree;
        if let NodeKind::ClassRef(class_name) = tree.kind(node) {
            let class = self.names.format_qualified_name(class_name);
            self.set_value(class);
        }
        Ok(())
    }

    fn visit_function(&mut self, node: NodeId) -> Result<()> {
        let tree = self.tree;
        if let NodeKind::Function(expression) = tree.kind(node) {
            let text = self.stringifier.stringify(expression);
            self.set_value(text);
        }
        Ok(())
    }

    fn visit_xml(&mut self, node: NodeId) -> Result<()> {
        if self.parent_is_declarations(node) {
            self.cx.primitive_declarations.push(node);
            return Ok(());
        }
        self.emit_instance(node).map(|_| ())
    }

    fn visit_script(&mut self, node: NodeId) -> Result<()> {
        self.cx.scripts.push(node);
        Ok(())
    }

    fn visit_service(&mut self, node: NodeId) -> Result<()> {
        let Some(service) = self.emit_instance(node)? else {
            return Ok(());
        };
        let tree = self.tree;
        let NodeKind::Service {
            flavor, operations, ..
        } = tree.kind(node)
        else {
            return Ok(());
        };

        let mut holder = None;
        for op in operations {
            // a RemoteObject only collects remoting methods, a WebService only its operations
            match tree.kind(*op) {
                NodeKind::ServiceOperation { flavor: op_flavor, .. } if op_flavor == flavor => {}
                _ => {
                    warn!(?flavor, ?op, "operation of another service kind, skipped");
                    continue;
                }
            }
            let object = match holder {
                Some(object) => object,
                None => {
                    let prop = self
                        .cx
                        .specs
                        .attach(InstanceSpecifier::property("operations", Some(service)));
                    let name = self.names.format_qualified_name("Object");
                    let object = self
                        .cx
                        .specs
                        .attach(InstanceSpecifier::instance(&name, Some(prop)));
                    self.cx.instances.push(object);
                    holder = Some(object);
                    object
                }
            };
            self.cx.current_instances.push(object);
            let walked = self.visit_node(*op);
            self.cx.current_instances.pop();
            walked?;
        }
        Ok(())
    }

    fn visit_service_operation(&mut self, node: NodeId) -> Result<()> {
        let tree = self.tree;
        let Some(data) = tree.instance_data(node) else {
            return Ok(());
        };
        let Some(owner) = self.current_instance() else {
            warn!(type_name = %data.type_name, "operation outside a service, skipped");
            return Ok(());
        };

        let prop_name = self.string_property(&data.properties, "name");
        let ps = self.cx.specs.attach(InstanceSpecifier {
            name: prop_name.map(str::to_string),
            is_property: true,
            parent: Some(owner),
            ..InstanceSpecifier::default()
        });
        self.cx.current_property_specifiers.push(ps);
        let emitted = self.emit_instance(node);
        self.cx.current_property_specifiers.pop();
        emitted?;

        let arguments = self.argument_names(&data.properties);
        if !arguments.is_empty() {
            let list = arguments
                .iter()
                .map(|a| Self::quoted(a))
                .collect::<Vec<_>>()
                .join(",");
            if let Some(operation) = self.cx.specs.get(ps).property_specifiers.first().copied() {
                self.cx.specs.attach(InstanceSpecifier::valued(
                    "argumentNames",
                    format!("[{}]", list),
                    Some(operation),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stringify::RawStringifier;
    use crate::writer::DescriptorWriter;
    use serde_json::json;

    fn walk(doc: serde_json::Value) -> (MxmlTree, WalkContext) {
        let tree = MxmlTree::from_json(&doc.to_string()).unwrap();
        let options = CompileOptions::default();
        let cx = {
            let mut walker = Walker::new(&tree, &options, &RawStringifier);
            walker.walk_document().unwrap();
            walker.into_parts().0
        };
        (tree, cx)
    }

    fn compact(cx: &mut WalkContext, root: SpecId) -> String {
        cx.specs.seal();
        DescriptorWriter::new(&cx.specs, false).render(root)
    }

    #[test]
    fn test_leaf_instance_with_literals() {
        let (_, mut cx) = walk(json!({
            "className": "MyApp",
            "properties": [{ "name": "initialView", "value": {
                "kind": "instance",
                "typeName": "org.apache.royale.html.Label",
                "properties": [
                    { "name": "width", "value": { "kind": "primitive", "typeName": "Number", "literal": "10" } },
                    { "name": "text", "value": { "kind": "string", "literal": "hi" } }
                ]
            }}]
        }));
        let root = cx.properties_tree;
        let out = compact(&mut cx, root);
        assert_eq!(
            out,
            "1, 'initialView', false, [org.apache.royale.html.Label, 3, '_id', true, '$ID_0_0', \
'width', true, 10, 'text', true, 'hi', 0, 0, null], 0, 0"
        );
    }

    #[test]
    fn test_explicit_id_is_injected_and_registered() {
        let (_, mut cx) = walk(json!({
            "className": "MyApp",
            "children": [{ "kind": "declarations", "children": [{
                "kind": "instance",
                "typeName": "org.apache.royale.html.Button",
                "id": "btn1",
                "properties": [{ "name": "text", "value": { "kind": "string", "literal": "OK" } }]
            }]}]
        }));
        let root = cx.descriptor_tree[0];
        let out = compact(&mut cx, root);
        assert_eq!(
            out,
            "org.apache.royale.html.Button, 2, 'id', true, 'btn1', 'text', true, 'OK', 0, 0, null"
        );
        assert_eq!(cx.instances.len(), 1);
        assert_eq!(cx.specs.get(cx.instances[0]).id.as_deref(), Some("btn1"));
    }

    #[test]
    fn test_mxml_content_is_reused() {
        let (_, mut cx) = walk(json!({
            "className": "MyApp",
            "properties": [{ "name": "initialView", "value": {
                "kind": "instance",
                "typeName": "org.apache.royale.core.View",
                "properties": [
                    { "name": "mxmlContent", "value": { "kind": "array", "children": [
                        { "kind": "instance", "typeName": "org.apache.royale.html.Label" }
                    ]}},
                    { "name": "mxmlContent", "value": { "kind": "array", "children": [
                        { "kind": "instance", "typeName": "org.apache.royale.html.Button" }
                    ]}}
                ]
            }}]
        }));
        let view = cx
            .instances
            .iter()
            .copied()
            .find(|i| cx.specs.get(*i).is_named("org.apache.royale.core.View"))
            .unwrap();
        let contents: Vec<_> = cx
            .specs
            .get(view)
            .property_specifiers
            .iter()
            .filter(|p| cx.specs.get(**p).is_named(MXML_CONTENT))
            .copied()
            .collect();
        assert_eq!(contents.len(), 1);
        assert_eq!(cx.specs.get(contents[0]).property_specifiers.len(), 2);

        cx.specs.seal();
        assert_eq!(cx.specs.get(view).children_specifier, Some(contents[0]));
    }

    #[test]
    fn test_simple_array_and_inline_object() {
        let (_, mut cx) = walk(json!({
            "className": "MyApp",
            "properties": [{ "name": "dataProvider", "value": { "kind": "array", "children": [
                { "kind": "string", "literal": "it's" },
                { "kind": "object", "typeName": "Object", "properties": [
                    { "name": "label", "value": { "kind": "string", "literal": "a" } },
                    { "name": "data", "value": { "kind": "primitive", "typeName": "Number", "literal": "1" } }
                ]}
            ]}}]
        }));
        let root = cx.properties_tree;
        let out = compact(&mut cx, root);
        // the quoting flag stays set for later siblings of a string
        assert_eq!(
            out,
            "1, 'dataProvider', true, ['it\\'s',{label: 'a', data: '1'}], 0, 0"
        );
    }

    #[test]
    fn test_literal_newlines_are_escaped() {
        let (_, mut cx) = walk(json!({
            "className": "MyApp",
            "properties": [{ "name": "text", "value": { "kind": "string", "literal": "a\r\nb\nc" } }]
        }));
        let root = cx.properties_tree;
        let out = compact(&mut cx, root);
        assert_eq!(out, "1, 'text', true, 'a\\nb\\nc', 0, 0");
    }

    #[test]
    fn test_data_bound_property_is_not_inlined() {
        let (_, mut cx) = walk(json!({
            "className": "MyApp",
            "properties": [
                { "name": "title", "value": { "kind": "data-binding",
                  "expression": { "code": "model.title" }, "bindingIndex": 0 } },
                { "name": "width", "value": { "kind": "primitive", "typeName": "Number", "literal": "5" } }
            ]
        }));
        let root = cx.properties_tree;
        let out = compact(&mut cx, root);
        assert_eq!(out, "1, 'width', true, 5, 0, 0");
    }

    #[test]
    fn test_event_handlers_are_numbered_by_class_depth() {
        let (_, cx) = walk(json!({
            "className": "MyApp",
            "classDepth": 9,
            "events": [{ "name": "applicationComplete", "statements": [{ "code": "init()" }] }],
            "children": [{ "kind": "declarations", "children": [{
                "kind": "instance",
                "typeName": "org.apache.royale.html.Button",
                "events": [{ "name": "click", "eventType": "org.apache.royale.events.MouseEvent",
                             "statements": [{ "code": "go()" }] }]
            }]}]
        }));
        let handlers: Vec<_> = cx
            .events
            .iter()
            .map(|e| cx.specs.event(*e).event_handler.clone())
            .collect();
        assert_eq!(handlers, vec!["$EH_9_0", "$EH_9_1"]);
        let root = cx.specs.get(cx.properties_tree);
        assert_eq!(root.event_specifiers.len(), 1);
    }

    fn states_doc() -> serde_json::Value {
        json!({
            "className": "MyApp",
            "classDepth": 8,
            "properties": [
                { "name": "states", "value": { "kind": "array", "children": [
                    { "kind": "state", "stateName": "normal" },
                    { "kind": "state", "stateName": "hover" }
                ]}},
                { "name": "initialView", "value": {
                    "kind": "instance",
                    "typeName": "org.apache.royale.core.View",
                    "id": "view",
                    "properties": [{ "name": "mxmlContent", "value": { "kind": "array", "children": [
                        { "kind": "instance", "typeName": "org.apache.royale.html.Button", "id": "btn1",
                          "properties": [
                            { "name": "color", "suffix": "hover",
                              "value": { "kind": "string", "literal": "red" } }
                          ]},
                        { "kind": "instance", "typeName": "org.apache.royale.html.Label", "id": "tip",
                          "includeIn": ["hover"] }
                    ]}}]
                }}
            ]
        })
    }

    #[test]
    fn test_state_overrides_target_sibling() {
        let (_, mut cx) = walk(states_doc());
        cx.specs.seal();
        let out = DescriptorWriter::new(&cx.specs, false).render(cx.properties_tree);

        // the base tree leaves out the hover-only label and the suffixed color
        assert!(!out.contains("'color', true"));
        assert!(out.contains(
            "org.apache.royale.states.State, 3, '_id', true, '$ID_8_1', 'name', true, 'hover', \
'overrides', null, [org.apache.royale.states.AddItems, 5, 'itemsDescriptorIndex', true, 0, \
'destination', true, 'view', 'propertyName', true, 'mxmlContent', 'position', true, 'after', \
'relativeTo', true, 'btn1', 0, 0, null, \
org.apache.royale.states.SetProperty, 3, 'target', true, 'btn1', 'name', true, 'color', \
'value', true, 'red', 0, 0, null]"
        ));

        assert!(cx.has_state_overrides());
        let deferred = DescriptorWriter::new(&cx.specs, false).render_state_descriptors(cx.state_overrides);
        assert_eq!(
            deferred,
            "[org.apache.royale.html.Label, 1, 'id', true, 'tip', 0, 0, null],\n"
        );
    }

    #[test]
    fn test_shared_deferred_instance_emitted_once() {
        let mut doc = states_doc();
        doc["properties"][0]["value"]["children"][0] = json!({
            "kind": "state", "stateName": "normal", "stateGroups": ["active"]
        });
        doc["properties"][0]["value"]["children"][1] = json!({
            "kind": "state", "stateName": "hover", "stateGroups": ["active"]
        });
        doc["properties"][1]["value"]["properties"][0]["value"]["children"][1]["includeIn"] =
            json!(["active"]);

        let (_, mut cx) = walk(doc);
        cx.specs.seal();
        let so = cx.specs.get(cx.state_overrides);
        assert_eq!(so.property_specifiers.len(), 1);

        let out = DescriptorWriter::new(&cx.specs, false).render(cx.properties_tree);
        assert_eq!(out.matches("'itemsDescriptorIndex', true, 0").count(), 2);
    }

    #[test]
    fn test_event_override_binds_handler() {
        let (_, mut cx) = walk(json!({
            "className": "MyApp",
            "classDepth": 8,
            "properties": [
                { "name": "states", "value": { "kind": "array", "children": [
                    { "kind": "state", "stateName": "down" }
                ]}},
                { "name": "initialView", "value": {
                    "kind": "instance",
                    "typeName": "org.apache.royale.html.Button",
                    "id": "btn",
                    "events": [{ "name": "mouseDown", "suffix": "down", "statements": [{ "code": "press()" }] }]
                }}
            ]
        }));
        cx.specs.seal();
        let out = DescriptorWriter::new(&cx.specs, false).render(cx.properties_tree);
        assert!(out.contains(
            "org.apache.royale.states.SetEventHandler, 3, 'target', true, 'btn', \
'name', true, 'mousedown', 'handlerFunction', true, goog.bind(this.$EH_8_0, this, '$EH_8_0'), 0, 0, null"
        ));
        // not attached to the button in the base tree
        let button = cx
            .instances
            .iter()
            .find(|i| cx.specs.get(**i).id.as_deref() == Some("btn"))
            .unwrap();
        assert!(cx.specs.get(*button).event_specifiers.is_empty());
        assert_eq!(cx.events.len(), 1);
    }

    #[test]
    fn test_data_bound_override_rewrites_destination() {
        let (_, cx) = walk(json!({
            "className": "MyApp",
            "properties": [
                { "name": "states", "value": { "kind": "array", "children": [
                    { "kind": "state", "stateName": "busy" }
                ]}},
                { "name": "initialView", "value": {
                    "kind": "instance",
                    "typeName": "org.apache.royale.html.Label",
                    "id": "status",
                    "properties": [{ "name": "text", "suffix": "busy",
                        "value": { "kind": "data-binding", "expression": { "code": "model.msg" },
                                   "bindingIndex": 0 } }]
                }}
            ]
        }));
        assert_eq!(cx.binding_destinations, vec![(0, "$BID0.value".to_string())]);
        assert!(cx
            .instances
            .iter()
            .any(|i| cx.specs.get(*i).id.as_deref() == Some("$BID0")));
    }

    #[test]
    fn test_override_without_property_ancestor_is_structural() {
        let tree = MxmlTree::from_json(
            &json!({
                "className": "MyApp",
                "properties": [{ "name": "states", "value": { "kind": "array", "children": [
                    { "kind": "state", "stateName": "s" }
                ]}}],
                "children": [{ "kind": "instance", "typeName": "org.apache.royale.html.Label",
                               "includeIn": ["s"] }]
            })
            .to_string(),
        )
        .unwrap();
        let options = CompileOptions::default();
        let mut walker = Walker::new(&tree, &options, &RawStringifier);
        let err = walker.walk_document().unwrap_err();
        assert!(matches!(
            err,
            CodegenError::Structural {
                source: StructuralError::MissingPropertyAncestor { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_declarations_collect_primitives() {
        let (_, cx) = walk(json!({
            "className": "MyApp",
            "children": [{ "kind": "declarations", "children": [
                { "kind": "string", "id": "foo", "literal": "Ro'ale" },
                { "kind": "array", "id": "list", "children": [{ "kind": "string", "literal": "a" }] },
                { "kind": "xml", "id": "doc", "text": "<a/>" }
            ]}]
        }));
        assert_eq!(cx.primitive_declarations.len(), 3);
        assert_eq!(cx.descriptor_tree.len(), 1);
        assert!(cx.specs.get(cx.descriptor_tree[0]).property_specifiers.is_empty());
    }

    #[test]
    fn test_remote_object_operations() {
        let (_, mut cx) = walk(json!({
            "className": "MyApp",
            "children": [{ "kind": "declarations", "children": [{
                "kind": "remote-object",
                "typeName": "org.apache.royale.net.RemoteObject",
                "id": "service",
                "operations": [{
                    "kind": "remote-object-method",
                    "typeName": "org.apache.royale.net.remoting.Operation",
                    "properties": [
                        { "name": "name", "value": { "kind": "string", "literal": "getUser" } },
                        { "name": "arguments", "value": { "kind": "object", "typeName": "Object",
                          "properties": [
                            { "name": "id", "value": { "kind": "string", "literal": "1" } },
                            { "name": "full", "value": { "kind": "primitive", "typeName": "Boolean", "literal": "true" } }
                          ]}}
                    ]
                }]
            }]}]
        }));
        let root = cx.descriptor_tree[0];
        let out = compact(&mut cx, root);
        assert!(out.starts_with("org.apache.royale.net.RemoteObject, 2, 'id', true, 'service', 'operations', false, [Object, "));
        assert!(out.contains("'getUser', false, [org.apache.royale.net.remoting.Operation, "));
        assert!(out.contains("'argumentNames', true, ['id','full']"));
    }

    #[test]
    fn test_inline_component_value_and_isolation() {
        let tree = MxmlTree::from_json(
            &json!({
                "className": "MyApp",
                "properties": [{ "name": "initialView", "value": {
                    "kind": "instance",
                    "typeName": "org.apache.royale.html.List",
                    "properties": [{ "name": "itemRenderer", "value": { "kind": "component", "definition": {
                        "className": "MyApp_component0",
                        "baseClassName": "org.apache.royale.html.supportClasses.DataItemRenderer",
                        "events": [{ "name": "click", "statements": [{ "code": "pick()" }] }]
                    }}}]
                }}]
            })
            .to_string(),
        )
        .unwrap();
        let options = CompileOptions::default();
        let mut walker = Walker::new(&tree, &options, &RawStringifier);
        walker.walk_document().unwrap();
        let (mut cx, _) = walker.into_parts();

        assert!(cx.sub_documents.contains("MyApp.MyApp_component0 = function() {"));
        // the component's handler did not leak into the outer class
        assert!(cx.events.is_empty());
        let root = cx.properties_tree;
        let out = compact(&mut cx, root);
        assert!(out.contains(
            "'itemRenderer', true, new org.apache.royale.core.ClassFactory(MyApp.MyApp_component0)"
        ));
    }

    #[test]
    fn test_root_attributes_render_as_top_node() {
        let (_, mut cx) = walk(json!({
            "className": "MyApp",
            "properties": [
                { "name": "width", "value": { "kind": "primitive", "typeName": "Number", "literal": "10" } },
                { "name": "label", "value": { "kind": "string", "literal": "hi" } }
            ]
        }));
        let root = cx.properties_tree;
        assert_eq!(
            compact(&mut cx, root),
            "2, 'width', true, 10, 'label', true, 'hi', 0, 0"
        );
        assert!(cx.descriptor_tree.is_empty());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_duplicate_explicit_id_keeps_first_instance() {
        let tree = MxmlTree::from_json(
            &json!({
                "className": "MyApp",
                "children": [{ "kind": "declarations", "children": [
                    { "kind": "instance", "typeName": "org.apache.royale.html.Label", "id": "dup" },
                    { "kind": "instance", "typeName": "org.apache.royale.html.Button", "id": "dup" }
                ]}]
            })
            .to_string(),
        )
        .unwrap();
        let options = CompileOptions::default();

        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let (cx, result) = tracing::subscriber::with_default(subscriber, || {
            let mut walker = Walker::new(&tree, &options, &RawStringifier);
            walker.walk_document().unwrap();
            let cx = walker.into_parts().0;
            let result = crate::emit::compile_tree(&tree, &options, &RawStringifier).unwrap();
            (cx, result)
        });

        let dup: Vec<_> = cx
            .instances
            .iter()
            .filter(|s| cx.specs.get(**s).id.as_deref() == Some("dup"))
            .collect();
        assert_eq!(dup.len(), 1);
        assert_eq!(
            cx.specs.get(*dup[0]).name.as_deref(),
            Some("org.apache.royale.html.Label")
        );

        let logged = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("duplicate explicit id, keeping first instance"));

        // one backing field and one accessor, typed after the first instance
        let code = &result.code;
        assert_eq!(code.matches("dup: {").count(), 1);
        assert_eq!(code.matches("\n  this.dup_;").count(), 1);
        assert!(code.contains(" * @type {org.apache.royale.html.Label}\n   */\n  this.dup_;"));
    }

    #[test]
    fn test_web_service_ignores_remoting_methods() {
        let (_, mut cx) = walk(json!({
            "className": "MyApp",
            "children": [{ "kind": "declarations", "children": [{
                "kind": "web-service",
                "typeName": "org.apache.royale.net.WebService",
                "id": "ws",
                "operations": [
                    { "kind": "remote-object-method",
                      "typeName": "org.apache.royale.net.remoting.Operation",
                      "properties": [{ "name": "name", "value": { "kind": "string", "literal": "stray" } }] },
                    { "kind": "web-service-operation",
                      "typeName": "org.apache.royale.net.soap.Operation",
                      "properties": [{ "name": "name", "value": { "kind": "string", "literal": "getQuote" } }] }
                ]
            }]}]
        }));
        let root = cx.descriptor_tree[0];
        let out = compact(&mut cx, root);

        assert!(out.contains("'getQuote', false, [org.apache.royale.net.soap.Operation, "));
        assert!(!out.contains("stray"));
        assert!(!out.contains("org.apache.royale.net.remoting.Operation"));
    }

    #[test]
    fn test_deferred_emission_restores_enclosing_override_target() {
        let tree = MxmlTree::from_json(&states_doc().to_string()).unwrap();
        let options = CompileOptions::default();
        let class = tree.class(tree.root_class());
        let tip = class.dependents["hover"]
            .iter()
            .copied()
            .find(|n| tree.instance_data(*n).is_some())
            .unwrap();
        let states = tree.children(class.children[0])[0];
        let hover = tree.children(states)[1];

        let mut walker = Walker::new(&tree, &options, &RawStringifier);
        let scope = walker
            .cx
            .specs
            .alloc(InstanceSpecifier::property("overrides", None));
        walker.cx.current_property_specifiers.push(scope);
        walker.cx.in_states_override.push(hover);
        walker.cx.override_instance_to_emit = Some(class.root);

        walker.emit_instance_override(tip, hover).unwrap();
        assert_eq!(walker.cx.override_instance_to_emit, Some(class.root));
        assert_eq!(
            walker.cx.specs.get(walker.cx.state_overrides).property_specifiers.len(),
            1
        );
        assert_eq!(walker.cx.specs.get(scope).property_specifiers.len(), 1);
    }
}
