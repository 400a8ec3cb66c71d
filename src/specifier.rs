//! Specifier Module
//!
//! Intermediate representation between the MXML AST and descriptor text.
//! Instance and property specifiers share one record type and live in an
//! arena (`SpecifierTree`); parents are indices, not references.

use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};

use crate::ast::NodeId;

pub const MXML_CONTENT: &str = "mxmlContent";

lazy_static! {
    /// DOM event names that only differ from their MXML spelling by case.
    static ref LOWERCASED_EVENTS: HashSet<&'static str> = [
        "rollOver", "rollOut", "mouseDown", "mouseMove", "mouseOver", "mouseOut", "mouseUp",
        "keyDown", "keyUp",
    ]
    .into_iter()
    .collect();

    static ref EVENT_ALIASES: HashMap<&'static str, &'static str> =
        [("doubleClick", "dblclick"), ("mouseWheel", "wheel")].into_iter().collect();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub u32);

/// One instance, or one named property slot when `is_property` is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceSpecifier {
    pub name: Option<String>,
    /// Pre-rendered literal text.
    pub value: Option<String>,
    pub value_needs_quotes: bool,
    pub id: Option<String>,
    pub effective_id: Option<String>,
    pub has_local_id: bool,
    pub is_property: bool,
    pub has_array: bool,
    pub has_object: bool,
    pub property_specifiers: Vec<SpecId>,
    pub event_specifiers: Vec<EventId>,
    pub children_specifier: Option<SpecId>,
    pub parent: Option<SpecId>,
    pub is_top_node: bool,
}

impl InstanceSpecifier {
    pub fn property(name: &str, parent: Option<SpecId>) -> Self {
        Self {
            name: Some(name.to_string()),
            is_property: true,
            parent,
            ..Self::default()
        }
    }

    pub fn instance(type_name: &str, parent: Option<SpecId>) -> Self {
        Self {
            name: Some(type_name.to_string()),
            parent,
            ..Self::default()
        }
    }

    /// Property with a pre-rendered literal value.
    pub fn valued(name: &str, value: impl Into<String>, parent: Option<SpecId>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::property(name, parent)
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventSpecifier {
    pub name: String,
    pub event_handler: String,
    pub event_type: String,
    /// Source event node; the handler body is stringified at emission.
    pub node: NodeId,
}

impl EventSpecifier {
    /// Runtime DOM name for an MXML event name.
    pub fn js_event_name(name: &str) -> String {
        if LOWERCASED_EVENTS.contains(name) {
            name.to_lowercase()
        } else if let Some(alias) = EVENT_ALIASES.get(name) {
            alias.to_string()
        } else {
            name.to_string()
        }
    }

    /// `'name',` + delimiter + `this.handler`. Rendered standalone at indent
    /// zero, so pretty output puts the handler at column 0.
    pub fn render(&self, pretty: bool) -> String {
        let delimiter = if pretty { ",\n" } else { ", " };
        format!(
            "'{}'{}this.{}",
            Self::js_event_name(&self.name),
            delimiter,
            self.event_handler
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpecifierTree {
    specs: Vec<InstanceSpecifier>,
    events: Vec<EventSpecifier>,
}

impl SpecifierTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, spec: InstanceSpecifier) -> SpecId {
        let id = SpecId(self.specs.len() as u32);
        self.specs.push(spec);
        id
    }

    /// Allocates `spec` and appends it to its parent's property list.
    pub fn attach(&mut self, spec: InstanceSpecifier) -> SpecId {
        let parent = spec.parent;
        let id = self.alloc(spec);
        if let Some(parent) = parent {
            self.get_mut(parent).property_specifiers.push(id);
        }
        id
    }

    pub fn get(&self, id: SpecId) -> &InstanceSpecifier {
        &self.specs[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: SpecId) -> &mut InstanceSpecifier {
        &mut self.specs[id.0 as usize]
    }

    pub fn add_event(&mut self, event: EventSpecifier) -> EventId {
        let id = EventId(self.events.len() as u32);
        self.events.push(event);
        id
    }

    pub fn event(&self, id: EventId) -> &EventSpecifier {
        &self.events[id.0 as usize]
    }

    /// First spec in `list` with the given name.
    pub fn find_named(&self, list: &[SpecId], name: &str) -> Option<SpecId> {
        list.iter().copied().find(|id| self.get(*id).is_named(name))
    }

    pub fn append_value(&mut self, id: SpecId, text: &str) {
        let spec = self.get_mut(id);
        match &mut spec.value {
            Some(value) => value.push_str(text),
            None => spec.value = Some(text.to_string()),
        }
    }

    /// Moves each instance's `mxmlContent` slot out of its property list into
    /// `children_specifier`. Idempotent; top nodes keep theirs in place.
    pub fn seal(&mut self) {
        for index in 0..self.specs.len() {
            let spec = &self.specs[index];
            if spec.is_property || spec.is_top_node || spec.children_specifier.is_some() {
                continue;
            }
            let found = spec
                .property_specifiers
                .iter()
                .position(|id| self.specs[id.0 as usize].is_named(MXML_CONTENT));
            if let Some(pos) = found {
                let spec = &mut self.specs[index];
                let child = spec.property_specifiers.remove(pos);
                spec.children_specifier = Some(child);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
