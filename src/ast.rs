//! MXML AST Module
//!
//! The parser hands documents over as serde JSON (`ClassDefinitionInput`).
//! Lowering flattens the nested input into an arena (`MxmlTree`) so the walker
//! can follow parent links and sibling order without shared ownership.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::binding::BindingDatabase;

// ═══════════════════════════════════════════════════════════════════════════════
// INPUT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

/// Unrendered expression. Stringified only at final emission so the
/// stringifier still sees the original source position.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExprSource {
    pub code: String,
    #[serde(default)]
    pub location: SourceLocation,
}

impl ExprSource {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            location: SourceLocation::default(),
        }
    }
}

fn default_base_class() -> String {
    "org.apache.royale.core.Application".to_string()
}

fn default_state_type() -> String {
    "org.apache.royale.states.State".to_string()
}

fn default_event_type() -> String {
    "org.apache.royale.events.Event".to_string()
}

fn default_xml_type() -> String {
    "XML".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDefinitionInput {
    pub class_name: String,
    #[serde(default = "default_base_class")]
    pub base_class_name: String,
    /// Distance from Object in the inheritance chain; seeds generated names.
    #[serde(default)]
    pub class_depth: u32,
    #[serde(default)]
    pub interfaces: Vec<String>,
    /// Attributes and child tags of the root tag that set properties.
    #[serde(default)]
    pub properties: Vec<SpecifierInput>,
    #[serde(default)]
    pub events: Vec<EventInput>,
    #[serde(default)]
    pub children: Vec<NodeInput>,
    #[serde(default)]
    pub bindings: Option<BindingDatabase>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NodeInput {
    Instance(InstanceInput),
    Object(InstanceInput),
    State(StateInput),
    Array(ArrayInput),
    String(LiteralInput),
    Primitive(PrimitiveInput),
    DataBinding(DataBindingInput),
    Declarations(ArrayInput),
    Component(ComponentInput),
    Factory(ClassNameInput),
    ClassRef(ClassNameInput),
    Function(FunctionInput),
    Xml(XmlInput),
    XmlList(XmlInput),
    Script(ScriptInput),
    RemoteObject(InstanceInput),
    RemoteObjectMethod(InstanceInput),
    WebService(InstanceInput),
    WebServiceOperation(InstanceInput),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InstanceInput {
    pub type_name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub local_id: Option<String>,
    #[serde(default)]
    pub effective_id: Option<String>,
    #[serde(default)]
    pub include_in: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_from: Option<Vec<String>>,
    #[serde(default)]
    pub properties: Vec<SpecifierInput>,
    #[serde(default)]
    pub events: Vec<EventInput>,
    /// Method/operation children of RemoteObject and WebService tags.
    #[serde(default)]
    pub operations: Vec<NodeInput>,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateInput {
    #[serde(default = "default_state_type")]
    pub type_name: String,
    pub state_name: String,
    #[serde(default)]
    pub state_groups: Vec<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub effective_id: Option<String>,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecifierInput {
    pub name: String,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub is_style: bool,
    #[serde(default)]
    pub value: Option<Box<NodeInput>>,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    pub name: String,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default = "default_event_type")]
    pub event_type: String,
    #[serde(default)]
    pub statements: Vec<ExprSource>,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArrayInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub children: Vec<NodeInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LiteralInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub literal: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimitiveInput {
    pub type_name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub literal: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataBindingInput {
    pub expression: ExprSource,
    /// Index of the binding record this expression compiled into.
    #[serde(default)]
    pub binding_index: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInput {
    pub definition: Box<ClassDefinitionInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassNameInput {
    pub class_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInput {
    pub expression: ExprSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XmlInput {
    #[serde(default = "default_xml_type")]
    pub type_name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub effective_id: Option<String>,
    #[serde(default)]
    pub text: String,
    /// Attribute bindings target children of the XML literal.
    #[serde(default)]
    pub children: Vec<NodeInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScriptInput {
    #[serde(default)]
    pub statements: Vec<ExprSource>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ARENA
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceFlavor {
    RemoteObject,
    WebService,
}

#[derive(Debug, Clone, Default)]
pub struct InstanceData {
    pub type_name: String,
    pub id: Option<String>,
    pub local_id: Option<String>,
    pub effective_id: Option<String>,
    pub include_in: Option<Vec<String>>,
    pub exclude_from: Option<Vec<String>>,
    pub properties: Vec<NodeId>,
    pub events: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct StateData {
    pub type_name: String,
    pub name: String,
    pub groups: Vec<String>,
    pub id: Option<String>,
    pub effective_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SpecifierData {
    pub name: String,
    pub suffix: Option<String>,
    pub is_style: bool,
    pub value: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct EventData {
    pub name: String,
    pub suffix: Option<String>,
    pub event_type: String,
    pub statements: Vec<ExprSource>,
}

#[derive(Debug, Clone)]
pub struct XmlData {
    pub type_name: String,
    pub id: Option<String>,
    pub effective_id: Option<String>,
    pub text: String,
    pub is_list: bool,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Synthetic root of one class definition; parent of its top-level tags.
    ClassRoot(ClassId),
    Instance(InstanceData),
    Object(InstanceData),
    State(StateData),
    Array {
        children: Vec<NodeId>,
        id: Option<String>,
    },
    String {
        literal: Option<String>,
        id: Option<String>,
    },
    Primitive {
        type_name: String,
        literal: Option<String>,
        id: Option<String>,
    },
    DataBinding {
        expression: ExprSource,
        binding_index: Option<u32>,
    },
    Declarations(Vec<NodeId>),
    Component(ClassId),
    Factory(String),
    ClassRef(String),
    Function(ExprSource),
    Xml(XmlData),
    Script(Vec<ExprSource>),
    Service {
        flavor: ServiceFlavor,
        instance: InstanceData,
        operations: Vec<NodeId>,
    },
    ServiceOperation {
        flavor: ServiceFlavor,
        instance: InstanceData,
    },
    PropertySpecifier(SpecifierData),
    EventSpecifier(EventData),
}

#[derive(Debug, Clone)]
pub struct MxmlNode {
    pub parent: Option<NodeId>,
    pub location: SourceLocation,
    pub kind: NodeKind,
}

/// Per-class metadata gathered during lowering.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub class_name: String,
    pub base_class_name: String,
    pub class_depth: u32,
    pub interfaces: Vec<String>,
    pub root: NodeId,
    pub children: Vec<NodeId>,
    pub bindings: Option<BindingDatabase>,
    /// Nodes whose emission depends on each state, in document order.
    pub dependents: IndexMap<String, Vec<NodeId>>,
    /// Data-binding node per binding index.
    pub binding_nodes: HashMap<u32, NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct MxmlTree {
    nodes: Vec<MxmlNode>,
    classes: Vec<ClassInfo>,
}

/// State-dependence candidate recorded during lowering.
enum Dependence {
    Suffix(String),
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl MxmlTree {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let input: ClassDefinitionInput = serde_json::from_str(json)?;
        Ok(Self::lower(input))
    }

    pub fn lower(input: ClassDefinitionInput) -> Self {
        let mut tree = MxmlTree::default();
        tree.lower_class(input);
        tree
    }

    pub fn root_class(&self) -> ClassId {
        ClassId(0)
    }

    pub fn node(&self, id: NodeId) -> &MxmlNode {
        &self.nodes[id.0 as usize]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn class(&self, id: ClassId) -> &ClassInfo {
        &self.classes[id.0 as usize]
    }

    /// Child nodes in source order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match self.kind(id) {
            NodeKind::ClassRoot(class) => self.class(*class).children.clone(),
            NodeKind::Instance(data)
            | NodeKind::Object(data)
            | NodeKind::ServiceOperation { instance: data, .. } => {
                data.properties.iter().chain(&data.events).copied().collect()
            }
            NodeKind::Service {
                instance,
                operations,
                ..
            } => instance
                .properties
                .iter()
                .chain(&instance.events)
                .chain(operations)
                .copied()
                .collect(),
            NodeKind::Array { children, .. } | NodeKind::Declarations(children) => children.clone(),
            NodeKind::Xml(xml) => xml.children.clone(),
            NodeKind::PropertySpecifier(spec) => spec.value.into_iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn instance_data(&self, id: NodeId) -> Option<&InstanceData> {
        match self.kind(id) {
            NodeKind::Instance(data)
            | NodeKind::Object(data)
            | NodeKind::Service { instance: data, .. }
            | NodeKind::ServiceOperation { instance: data, .. } => Some(data),
            _ => None,
        }
    }

    /// Value-producing nodes; everything the runtime instantiates.
    pub fn is_instance_node(&self, id: NodeId) -> bool {
        !matches!(
            self.kind(id),
            NodeKind::ClassRoot(_)
                | NodeKind::DataBinding { .. }
                | NodeKind::Declarations(_)
                | NodeKind::Script(_)
                | NodeKind::PropertySpecifier(_)
                | NodeKind::EventSpecifier(_)
        )
    }

    /// Explicit id or parser-assigned effective id, if any.
    pub fn declared_ids(&self, id: NodeId) -> (Option<&str>, Option<&str>) {
        match self.kind(id) {
            NodeKind::State(state) => (state.id.as_deref(), state.effective_id.as_deref()),
            NodeKind::Xml(xml) => (xml.id.as_deref(), xml.effective_id.as_deref()),
            NodeKind::Array { id, .. }
            | NodeKind::String { id, .. }
            | NodeKind::Primitive { id, .. } => (id.as_deref(), None),
            _ => match self.instance_data(id) {
                Some(data) => (data.id.as_deref(), data.effective_id.as_deref()),
                None => (None, None),
            },
        }
    }

    pub fn suffix(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::PropertySpecifier(spec) => spec.suffix.as_deref(),
            NodeKind::EventSpecifier(ev) => ev.suffix.as_deref(),
            _ => None,
        }
    }

    pub fn nearest_ancestor<F>(&self, id: NodeId, pred: F) -> Option<NodeId>
    where
        F: Fn(&NodeKind) -> bool,
    {
        let mut cursor = self.parent(id);
        while let Some(current) = cursor {
            if pred(self.kind(current)) {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LOWERING
    // ═══════════════════════════════════════════════════════════════════════════

    fn alloc(&mut self, parent: Option<NodeId>, location: SourceLocation, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(MxmlNode {
            parent,
            location,
            kind,
        });
        id
    }

    fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes[id.0 as usize].kind = kind;
    }

    /// Stand-in kind for a node whose children lower before its own payload.
    fn pending() -> NodeKind {
        NodeKind::Declarations(Vec::new())
    }

    fn node_mut(&mut self, id: NodeId) -> &mut MxmlNode {
        &mut self.nodes[id.0 as usize]
    }

    /// Instances without an explicit id get one. `localId` wins over a
    /// generated id; children are numbered before their parents.
    fn assign_effective_id(&mut self, id: NodeId, cx: &mut LowerCx) {
        let generated = format!("$ID_{}_{}", cx.class_depth, cx.id_counter);
        let slot = match &mut self.node_mut(id).kind {
            NodeKind::Instance(data)
            | NodeKind::Object(data)
            | NodeKind::Service { instance: data, .. }
            | NodeKind::ServiceOperation { instance: data, .. } => {
                if data.id.is_some() || data.effective_id.is_some() {
                    return;
                }
                if let Some(local) = &data.local_id {
                    data.effective_id = Some(local.clone());
                    return;
                }
                &mut data.effective_id
            }
            NodeKind::State(state) if state.id.is_none() && state.effective_id.is_none() => {
                &mut state.effective_id
            }
            NodeKind::Xml(xml) if xml.id.is_none() && xml.effective_id.is_none() => {
                &mut xml.effective_id
            }
            NodeKind::Array { id: slot, .. }
            | NodeKind::String { id: slot, .. }
            | NodeKind::Primitive { id: slot, .. }
                if slot.is_none() =>
            {
                slot
            }
            _ => return,
        };
        *slot = Some(generated);
        cx.id_counter += 1;
    }

    fn lower_class(&mut self, input: ClassDefinitionInput) -> ClassId {
        let class_id = ClassId(self.classes.len() as u32);
        let root = self.alloc(None, SourceLocation::default(), NodeKind::ClassRoot(class_id));
        self.classes.push(ClassInfo {
            class_name: input.class_name,
            base_class_name: input.base_class_name,
            class_depth: input.class_depth,
            interfaces: input.interfaces,
            root,
            children: Vec::new(),
            bindings: input.bindings,
            dependents: IndexMap::new(),
            binding_nodes: HashMap::new(),
        });

        let mut cx = LowerCx {
            class_depth: input.class_depth,
            id_counter: 0,
            states: Vec::new(),
            candidates: Vec::new(),
            binding_nodes: HashMap::new(),
        };
        // root-tag specifiers come first, then the remaining top-level tags
        let mut children = Vec::new();
        for spec in input.properties {
            children.push(self.lower_specifier(spec, root, &mut cx));
        }
        for ev in input.events {
            children.push(self.lower_event(ev, root, &mut cx));
        }
        for child in input.children {
            children.push(self.lower_node(child, root, &mut cx));
        }

        let dependents = self.dependents_by_state(&cx);
        let class = &mut self.classes[class_id.0 as usize];
        class.children = children;
        class.dependents = dependents;
        class.binding_nodes = cx.binding_nodes;
        class_id
    }

    fn lower_node(&mut self, input: NodeInput, parent: NodeId, cx: &mut LowerCx) -> NodeId {
        let id = self.lower_node_kind(input, parent, cx);
        if !matches!(
            self.kind(id),
            NodeKind::Array { .. } | NodeKind::String { .. } | NodeKind::Primitive { .. }
        ) {
            self.assign_effective_id(id, cx);
        }
        id
    }

    fn lower_node_kind(&mut self, input: NodeInput, parent: NodeId, cx: &mut LowerCx) -> NodeId {
        match input {
            NodeInput::Instance(inst) => {
                let location = inst.location;
                let id = self.alloc(Some(parent), location, Self::pending());
                let (data, _) = self.lower_instance(inst, id, cx);
                self.set_kind(id, NodeKind::Instance(data));
                id
            }
            NodeInput::Object(inst) => {
                let id = self.alloc(Some(parent), inst.location, Self::pending());
                let (data, _) = self.lower_instance(inst, id, cx);
                self.set_kind(id, NodeKind::Object(data));
                id
            }
            NodeInput::RemoteObject(inst) => {
                self.lower_service(inst, ServiceFlavor::RemoteObject, parent, cx)
            }
            NodeInput::WebService(inst) => {
                self.lower_service(inst, ServiceFlavor::WebService, parent, cx)
            }
            NodeInput::RemoteObjectMethod(inst) => {
                self.lower_operation(inst, ServiceFlavor::RemoteObject, parent, cx)
            }
            NodeInput::WebServiceOperation(inst) => {
                self.lower_operation(inst, ServiceFlavor::WebService, parent, cx)
            }
            NodeInput::State(state) => {
                let id = self.alloc(
                    Some(parent),
                    state.location,
                    NodeKind::State(StateData {
                        type_name: state.type_name,
                        name: state.state_name,
                        groups: state.state_groups,
                        id: state.id,
                        effective_id: state.effective_id,
                    }),
                );
                cx.states.push(id);
                id
            }
            NodeInput::Array(array) => {
                let id = self.alloc(Some(parent), SourceLocation::default(), Self::pending());
                let children = self.lower_children(array.children, id, cx);
                self.set_kind(
                    id,
                    NodeKind::Array {
                        children,
                        id: array.id,
                    },
                );
                id
            }
            NodeInput::Declarations(decls) => {
                let id = self.alloc(Some(parent), SourceLocation::default(), Self::pending());
                let children = self.lower_children(decls.children, id, cx);
                // primitive declarations become prototype fields and need a name
                for child in &children {
                    self.assign_effective_id(*child, cx);
                }
                self.set_kind(id, NodeKind::Declarations(children));
                id
            }
            NodeInput::String(lit) => self.alloc(
                Some(parent),
                SourceLocation::default(),
                NodeKind::String {
                    literal: lit.literal,
                    id: lit.id,
                },
            ),
            NodeInput::Primitive(prim) => self.alloc(
                Some(parent),
                SourceLocation::default(),
                NodeKind::Primitive {
                    type_name: prim.type_name,
                    literal: prim.literal,
                    id: prim.id,
                },
            ),
            NodeInput::DataBinding(binding) => {
                let location = binding.expression.location;
                let index = binding.binding_index;
                let id = self.alloc(
                    Some(parent),
                    location,
                    NodeKind::DataBinding {
                        expression: binding.expression,
                        binding_index: index,
                    },
                );
                if let Some(index) = index {
                    cx.binding_nodes.insert(index, id);
                }
                id
            }
            NodeInput::Component(component) => {
                let id = self.alloc(Some(parent), SourceLocation::default(), Self::pending());
                let class = self.lower_class(*component.definition);
                self.set_kind(id, NodeKind::Component(class));
                id
            }
            NodeInput::Factory(f) => {
                self.alloc(Some(parent), SourceLocation::default(), NodeKind::Factory(f.class_name))
            }
            NodeInput::ClassRef(c) => {
                self.alloc(Some(parent), SourceLocation::default(), NodeKind::ClassRef(c.class_name))
            }
            NodeInput::Function(f) => {
                let location = f.expression.location;
                self.alloc(Some(parent), location, NodeKind::Function(f.expression))
            }
            NodeInput::Xml(xml) => self.lower_xml(xml, false, parent, cx),
            NodeInput::XmlList(xml) => self.lower_xml(xml, true, parent, cx),
            NodeInput::Script(script) => {
                self.alloc(Some(parent), SourceLocation::default(), NodeKind::Script(script.statements))
            }
        }
    }

    fn lower_children(&mut self, children: Vec<NodeInput>, parent: NodeId, cx: &mut LowerCx) -> Vec<NodeId> {
        children
            .into_iter()
            .map(|child| self.lower_node(child, parent, cx))
            .collect()
    }

    fn lower_service(
        &mut self,
        inst: InstanceInput,
        flavor: ServiceFlavor,
        parent: NodeId,
        cx: &mut LowerCx,
    ) -> NodeId {
        let id = self.alloc(Some(parent), inst.location, Self::pending());
        let (instance, operations) = self.lower_instance(inst, id, cx);
        self.set_kind(
            id,
            NodeKind::Service {
                flavor,
                instance,
                operations,
            },
        );
        id
    }

    fn lower_operation(
        &mut self,
        inst: InstanceInput,
        flavor: ServiceFlavor,
        parent: NodeId,
        cx: &mut LowerCx,
    ) -> NodeId {
        let id = self.alloc(Some(parent), inst.location, Self::pending());
        let (instance, _) = self.lower_instance(inst, id, cx);
        self.set_kind(id, NodeKind::ServiceOperation { flavor, instance });
        id
    }

    fn lower_xml(&mut self, xml: XmlInput, is_list: bool, parent: NodeId, cx: &mut LowerCx) -> NodeId {
        let id = self.alloc(Some(parent), SourceLocation::default(), Self::pending());
        let children = self.lower_children(xml.children, id, cx);
        self.set_kind(
            id,
            NodeKind::Xml(XmlData {
                type_name: xml.type_name,
                id: xml.id,
                effective_id: xml.effective_id,
                text: xml.text,
                is_list,
                children,
            }),
        );
        id
    }

    /// Lowers the shared instance payload for a node already allocated at `id`.
    fn lower_instance(
        &mut self,
        inst: InstanceInput,
        id: NodeId,
        cx: &mut LowerCx,
    ) -> (InstanceData, Vec<NodeId>) {
        if let Some(include) = &inst.include_in {
            cx.candidates.push((id, Dependence::Include(include.clone())));
        } else if let Some(exclude) = &inst.exclude_from {
            cx.candidates.push((id, Dependence::Exclude(exclude.clone())));
        }

        let properties = inst
            .properties
            .into_iter()
            .map(|spec| self.lower_specifier(spec, id, cx))
            .collect();
        let events = inst
            .events
            .into_iter()
            .map(|ev| self.lower_event(ev, id, cx))
            .collect();

        let operations = self.lower_children(inst.operations, id, cx);

        let data = InstanceData {
            type_name: inst.type_name,
            id: inst.id,
            local_id: inst.local_id,
            effective_id: inst.effective_id,
            include_in: inst.include_in,
            exclude_from: inst.exclude_from,
            properties,
            events,
        };
        (data, operations)
    }

    fn lower_specifier(&mut self, spec: SpecifierInput, parent: NodeId, cx: &mut LowerCx) -> NodeId {
        let spec_id = self.alloc(Some(parent), spec.location, Self::pending());
        if let Some(suffix) = spec.suffix.as_ref().filter(|s| !s.is_empty()) {
            cx.candidates.push((spec_id, Dependence::Suffix(suffix.clone())));
        }
        let value = spec.value.map(|v| self.lower_node(*v, spec_id, cx));
        self.set_kind(
            spec_id,
            NodeKind::PropertySpecifier(SpecifierData {
                name: spec.name,
                suffix: spec.suffix,
                is_style: spec.is_style,
                value,
            }),
        );
        spec_id
    }

    fn lower_event(&mut self, ev: EventInput, parent: NodeId, cx: &mut LowerCx) -> NodeId {
        let suffix = ev.suffix.clone();
        let ev_id = self.alloc(
            Some(parent),
            ev.location,
            NodeKind::EventSpecifier(EventData {
                name: ev.name,
                suffix: ev.suffix,
                event_type: ev.event_type,
                statements: ev.statements,
            }),
        );
        if let Some(suffix) = suffix.filter(|s| !s.is_empty()) {
            cx.candidates.push((ev_id, Dependence::Suffix(suffix)));
        }
        ev_id
    }

    /// Expands suffix/includeIn/excludeFrom candidates against the declared
    /// states, honoring state groups.
    fn dependents_by_state(&self, cx: &LowerCx) -> IndexMap<String, Vec<NodeId>> {
        let mut table: IndexMap<String, Vec<NodeId>> = IndexMap::new();
        for state_id in &cx.states {
            let NodeKind::State(state) = self.kind(*state_id) else {
                continue;
            };
            let matches = |name: &String| &state.name == name || state.groups.contains(name);
            let nodes = table.entry(state.name.clone()).or_default();
            for (node, dependence) in &cx.candidates {
                let dependent = match dependence {
                    Dependence::Suffix(suffix) => matches(suffix),
                    Dependence::Include(names) => names.iter().any(matches),
                    Dependence::Exclude(names) => !names.iter().any(matches),
                };
                if dependent {
                    nodes.push(*node);
                }
            }
        }
        table
    }
}

struct LowerCx {
    class_depth: u32,
    id_counter: u32,
    states: Vec<NodeId>,
    candidates: Vec<(NodeId, Dependence)>,
    binding_nodes: HashMap<u32, NodeId>,
}
