//! State dependence and the state-override index table.

use std::collections::HashMap;

use crate::ast::{MxmlTree, NodeId, NodeKind, StateData};

/// True when `name` is the state itself or one of its groups.
pub fn in_state_or_state_group(name: &str, state: Option<&StateData>) -> bool {
    match state {
        Some(state) => state.name == name || state.groups.iter().any(|g| g == name),
        None => false,
    }
}

/// Whether `node` must be left out of the pass running under `state`.
///
/// Specifier nodes depend on their `.suffix`. Instance nodes depend on
/// `includeIn`/`excludeFrom`; with `include_groups` off any such list makes the
/// node dependent, which keeps state-added instances out of the base tree.
pub fn is_state_dependent(
    tree: &MxmlTree,
    node: NodeId,
    state: Option<&StateData>,
    include_groups: bool,
) -> bool {
    match tree.kind(node) {
        NodeKind::PropertySpecifier(_) | NodeKind::EventSpecifier(_) => match tree.suffix(node) {
            Some(suffix) if !suffix.is_empty() => !in_state_or_state_group(suffix, state),
            _ => false,
        },
        _ => match tree.instance_data(node) {
            Some(data) => is_state_dependent_instance(
                data.include_in.as_deref(),
                data.exclude_from.as_deref(),
                state,
                include_groups,
            ),
            None => false,
        },
    }
}

pub fn is_state_dependent_instance(
    include_in: Option<&[String]>,
    exclude_from: Option<&[String]>,
    state: Option<&StateData>,
    include_groups: bool,
) -> bool {
    if include_groups {
        if state.is_none() {
            return false;
        }
        if let Some(include) = include_in {
            if include.iter().any(|s| in_state_or_state_group(s, state)) {
                return false;
            }
        }
        if let Some(exclude) = exclude_from {
            return exclude.iter().any(|s| in_state_or_state_group(s, state));
        }
    }
    include_in.is_some() || exclude_from.is_some()
}

// ═══════════════════════════════════════════════════════════════════════════════
// OVERRIDE INDEX TABLE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideSlot {
    /// First reference; the caller emits the deferred descriptor.
    Allocated(usize),
    Existing(usize),
}

impl OverrideSlot {
    pub fn index(self) -> usize {
        match self {
            OverrideSlot::Allocated(i) | OverrideSlot::Existing(i) => i,
        }
    }
}

/// Maps a state-added instance node to its slot in the document's deferred
/// items array. Entries are never removed.
#[derive(Debug, Clone, Default)]
pub struct OverrideIndexTable {
    indices: HashMap<NodeId, usize>,
}

impl OverrideIndexTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// `next` is the slot a new entry receives: the current length of the
    /// items array it will be appended to.
    pub fn index_of(&mut self, node: NodeId, next: usize) -> OverrideSlot {
        match self.indices.get(&node) {
            Some(index) => OverrideSlot::Existing(*index),
            None => {
                self.indices.insert(node, next);
                OverrideSlot::Allocated(next)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
