//! Descriptor Writer
//!
//! Renders a sealed `SpecifierTree` into the nested array literal consumed by
//! the runtime descriptor interpreter. Token order is positional and must not
//! drift:
//!
//! ```text
//! instance: Type, count, ['_id', true, 'id',] props..., 0, eventCount, events..., children|null
//! property: 'name', true, value        (literal)
//!           'name', false|null, [ ... ] (nested)
//! ```

use crate::specifier::{InstanceSpecifier, SpecId, SpecifierTree};

const INDENT: &str = "  ";

pub struct DescriptorWriter<'a> {
    tree: &'a SpecifierTree,
    pretty: bool,
    reflect_object_property: bool,
    indent: usize,
    out: String,
}

impl<'a> DescriptorWriter<'a> {
    pub fn new(tree: &'a SpecifierTree, pretty: bool) -> Self {
        Self {
            tree,
            pretty,
            reflect_object_property: false,
            indent: 0,
            out: String::new(),
        }
    }

    /// Starting indent level, inherited from the enclosing emitter.
    pub fn with_indent(mut self, levels: usize) -> Self {
        self.indent = levels;
        self
    }

    pub fn with_reflect_object_property(mut self, enabled: bool) -> Self {
        self.reflect_object_property = enabled;
        self
    }

    pub fn render(mut self, root: SpecId) -> String {
        self.output_descriptor(root);
        self.out
    }

    /// One `[...]` entry per deferred items descriptor, each followed by a
    /// comma line. The caller closes the list with `null]`.
    pub fn render_state_descriptors(mut self, overrides: SpecId) -> String {
        let tree = self.tree;
        for item in &tree.get(overrides).property_specifiers {
            self.write("[");
            self.output_descriptor(*item);
            self.write("]");
            self.write(",");
            self.write_newline();
        }
        self.out
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PRIMITIVES
    // ═══════════════════════════════════════════════════════════════════════════

    fn write(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn write_newline(&mut self) {
        self.out.push('\n');
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
    }

    fn write_delimiter(&mut self) {
        if self.pretty {
            self.write(",");
            self.write_newline();
        } else {
            self.write(", ");
        }
    }

    fn indent_push(&mut self) {
        self.indent += 1;
    }

    fn indent_pop(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    fn spec(&self, id: SpecId) -> &'a InstanceSpecifier {
        self.tree.get(id)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DESCRIPTORS
    // ═══════════════════════════════════════════════════════════════════════════

    fn output_descriptor(&mut self, id: SpecId) {
        let node = self.spec(id);

        if node.is_top_node {
            let named = node
                .property_specifiers
                .iter()
                .filter(|p| self.spec(**p).name.is_some())
                .count();
            self.write(&named.to_string());
            self.write_delimiter();
        }

        let props = &node.property_specifiers;
        let model = props.iter().copied().find(|p| self.spec(*p).is_named("model"));
        let beads = props.iter().copied().find(|p| self.spec(*p).is_named("beads"));

        if let Some(model) = model {
            self.output_property(model);
        }
        for prop in props {
            let spec = self.spec(*prop);
            if spec.name.is_none() || spec.is_named("model") || spec.is_named("beads") {
                continue;
            }
            self.output_property(*prop);
        }
        if let Some(beads) = beads {
            self.output_property(beads);
        }

        if node.is_property {
            return;
        }

        // style descriptors are not supported; the count is always zero
        self.write("0");
        self.write_delimiter();

        self.write(&node.event_specifiers.len().to_string());
        for event in &node.event_specifiers {
            self.write_delimiter();
            let rendered = self.tree.event(*event).render(self.pretty);
            self.write(&rendered);
        }

        if !node.is_top_node {
            self.write_delimiter();
            match node.children_specifier {
                Some(children) => self.output_children(children),
                None => self.write("null"),
            }
            if !self.is_last_child(id) {
                self.write_delimiter();
            }
        }
    }

    fn is_last_child(&self, id: SpecId) -> bool {
        match self.spec(id).parent {
            Some(parent) => self.spec(parent).property_specifiers.last() == Some(&id),
            None => false,
        }
    }

    fn output_children(&mut self, children: SpecId) {
        self.write("[");
        if self.pretty {
            self.indent_push();
            self.write_newline();
        }
        self.output_descriptor(children);
        if self.pretty {
            self.indent_pop();
            self.write_newline();
        }
        self.write("]");
    }

    fn output_property(&mut self, id: SpecId) {
        let spec = self.spec(id);
        let name = spec.name.as_deref().unwrap_or_default();

        if spec.is_property {
            self.write_property_name(spec, name);
        } else {
            self.write(name);
        }
        self.write_delimiter();

        if spec.is_property {
            match &spec.value {
                Some(value) => {
                    self.write("true");
                    self.write_delimiter();
                    self.write(&fix_trailing_escape(value));
                }
                None => {
                    self.write(if spec.has_array { "null" } else { "false" });
                    self.write_delimiter();
                    self.write("[");
                    if self.pretty {
                        self.indent_push();
                        self.write_newline();
                    }
                    self.output_descriptor(id);
                    if self.pretty {
                        self.indent_pop();
                        self.write_newline();
                    }
                    self.write("]");
                }
            }
            if spec.parent.is_some() {
                self.write_delimiter();
            }
        } else {
            let count = spec.property_specifiers.len();
            let id_prop = match (&spec.id, &spec.effective_id) {
                (Some(id), _) => Some(("id", id)),
                (None, Some(effective)) => Some(("_id", effective)),
                (None, None) => None,
            };
            match id_prop {
                Some((key, value)) => {
                    self.write(&(count + 1).to_string());
                    self.write_delimiter();
                    self.write(&format!("'{}'", key));
                    self.write_delimiter();
                    self.write("true");
                    self.write_delimiter();
                    self.write(&format!("'{}'", value));
                    self.write_delimiter();
                }
                None => {
                    self.write(&count.to_string());
                    self.write_delimiter();
                }
            }
            self.output_descriptor(id);
        }
    }

    fn write_property_name(&mut self, spec: &InstanceSpecifier, name: &str) {
        if !self.reflect_object_property {
            self.write(&format!("'{}'", name));
            return;
        }
        let owner = spec.parent.map(|p| self.spec(p));
        let owner_id = owner.and_then(|o| o.id.as_deref().or(o.effective_id.as_deref()));
        match owner_id {
            Some(owner_id) => self.write(&format!(
                "goog.reflect.objectProperty('{}', this.{})",
                name, owner_id
            )),
            None => self.write(&format!("goog.reflect.objectProperty('{}', this)", name)),
        }
    }
}

/// A value ending in `\'` (but not `\\'`) gets one more backslash so the
/// closing quote survives.
pub fn fix_trailing_escape(value: &str) -> String {
    if value.ends_with("\\'") && !value.ends_with("\\\\'") {
        let mut fixed = value[..value.len() - 1].to_string();
        fixed.push_str("\\'");
        fixed
    } else {
        value.to_string()
    }
}
