//! Document Assembly
//!
//! Stitches one walked class definition into Closure-style JavaScript:
//! constructor, field declarations, the attribute and state descriptor arrays,
//! handlers, accessors, the `MXMLDescriptor` getter and the `_bindings` block.

#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{MxmlTree, NodeId, NodeKind};
use crate::binding::{attribute_setters, BindingEncoder};
use crate::config::CompileOptions;
use crate::error::{CodegenError, CompilerError, Result, StructuralError};
use crate::specifier::SpecId;
use crate::stringify::{ExpressionStringifier, NameRegistry, OxcStringifier};
use crate::walker::{WalkContext, Walker, ID_PREFIX};
use crate::writer::DescriptorWriter;

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub code: String,
    /// Qualified names the generated code depends on.
    pub used_names: Vec<String>,
    /// Names the optimizer must keep.
    pub exported_names: Vec<String>,
    pub diagnostics: Vec<CompilerError>,
}

/// Compiles one serialized class definition with the oxc stringifier.
#[tracing::instrument(skip_all, fields(bytes = json.len()))]
pub fn compile_document(json: &str, options: &CompileOptions) -> Result<CompileResult> {
    let tree = MxmlTree::from_json(json)?;
    compile_tree(&tree, options, &OxcStringifier)
}

#[tracing::instrument(skip_all)]
pub fn compile_tree(
    tree: &MxmlTree,
    options: &CompileOptions,
    stringifier: &dyn ExpressionStringifier,
) -> Result<CompileResult> {
    let class_name = &tree.class(tree.root_class()).class_name;
    debug!(class = %class_name, "compiling document");

    let mut walker = Walker::new(tree, options, stringifier);
    walker.walk_document()?;
    let (cx, mut names) = walker.into_parts();
    let code = render_class(tree, cx, &mut names, stringifier, options)?;

    debug!(class = %class_name, bytes = code.len(), "document compiled");
    Ok(CompileResult {
        code,
        used_names: names.used_names(),
        exported_names: names.exported_names(),
        diagnostics: Vec::new(),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// JS WRITER
// ═══════════════════════════════════════════════════════════════════════════════

const INDENT: &str = "  ";

/// Line-oriented text sink. The indent level may dip below zero; newlines
/// clamp it when writing.
#[derive(Debug, Default)]
struct JsWriter {
    out: String,
    indent: i32,
}

impl JsWriter {
    fn write(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn token(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push(' ');
    }

    fn newline(&mut self) {
        self.out.push('\n');
        for _ in 0..self.indent.max(0) {
            self.out.push_str(INDENT);
        }
    }

    fn line(&mut self, text: &str) {
        self.write(text);
        self.newline();
    }

    /// Indents first, so the break after `text` lands one level deeper.
    fn line_push(&mut self, text: &str) {
        self.push();
        self.line(text);
    }

    fn push(&mut self) {
        self.indent += 1;
    }

    fn pop(&mut self) {
        self.indent -= 1;
    }

    fn level(&self) -> usize {
        self.indent.max(0) as usize
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLASS RENDERING
// ═══════════════════════════════════════════════════════════════════════════════

struct ClassEmitter<'a> {
    tree: &'a MxmlTree,
    cx: WalkContext,
    names: &'a mut NameRegistry,
    stringifier: &'a dyn ExpressionStringifier,
    options: &'a CompileOptions,
    w: JsWriter,
    cname: String,
}

/// Renders a walked class definition. Sub-documents come through here too,
/// from inside the walker.
pub(crate) fn render_class(
    tree: &MxmlTree,
    mut cx: WalkContext,
    names: &mut NameRegistry,
    stringifier: &dyn ExpressionStringifier,
    options: &CompileOptions,
) -> Result<String> {
    cx.specs.seal();
    let info = tree.class(cx.class);
    let cname = names.format_qualified_name(&info.class_name);
    let mut emitter = ClassEmitter {
        tree,
        cx,
        names,
        stringifier,
        options,
        w: JsWriter::default(),
        cname,
    };

    emitter.emit_class_decl_start();
    emitter.emit_initializers();
    emitter.emit_property_decls();
    emitter.emit_class_decl_end();
    emitter.emit_declaration_variables();

    let sub_documents = std::mem::take(&mut emitter.cx.sub_documents);
    emitter.w.write(&sub_documents);
    emitter.w.newline();

    emitter.emit_scripts();
    emitter.emit_events();
    let skipped = emitter.emit_property_getter_setters();
    emitter.emit_mxml_descriptor_funcs(skipped);
    emitter.emit_binding_data()?;
    Ok(emitter.w.out)
}

impl ClassEmitter<'_> {
    fn emit_class_decl_start(&mut self) {
        let info = self.tree.class(self.cx.class);
        let base = self.names.format_qualified_name(&info.base_class_name);
        self.w.newline();
        self.w.line("/**");
        self.w.line(" * @constructor");
        self.w.line(&format!(" * @extends {{{}}}", base));
        for iface in &info.interfaces {
            let iface = self.names.format_qualified_name(iface.trim());
            self.w.line(&format!(" * @implements {{{}}}", iface));
        }
        self.w.line(" */");
        let cname = self.cname.clone();
        self.w.token(&cname);
        self.w.token("=");
        self.w.write("function");
        self.w.write("(");
        self.w.token(")");
        self.w.line_push("{");
        self.w.write(&format!("{}.base(this, 'constructor')", cname));
        self.w.line(";");
    }

    /// Constructor assignments for primitive declarations.
    fn emit_initializers(&mut self) {
        let tree = self.tree;
        for node in &self.cx.primitive_declarations {
            let Some(id) = declaration_id(tree, *node) else {
                continue;
            };
            let value = match tree.kind(*node) {
                NodeKind::String { literal, .. } => {
                    format!("'{}'", escape_js(literal.as_deref().unwrap_or_default()))
                }
                NodeKind::Array { children, .. } => {
                    let items: Vec<String> = children
                        .iter()
                        .map(|c| match tree.kind(*c) {
                            NodeKind::String { literal, .. } => {
                                format!("'{}'", escape_js(literal.as_deref().unwrap_or_default()))
                            }
                            _ => String::new(),
                        })
                        .collect();
                    format!("[{}]", items.join(", "))
                }
                NodeKind::Xml(xml) => {
                    let class = if xml.is_list { "XMLList" } else { "XML" };
                    format!("new {}('{}')", class, escape_js(&xml.text))
                }
                NodeKind::Primitive { literal: Some(literal), .. } => literal.clone(),
                _ => continue,
            };
            self.w.newline();
            self.w.write(&format!("this.{} = {};", id, value));
        }
    }

    fn emit_property_decls(&mut self) {
        for inst in &self.cx.instances {
            let spec = self.cx.specs.get(*inst);
            let Some(id) = spec.id.as_ref().or(spec.effective_id.as_ref()) else {
                // the generated operations holder has no id
                continue;
            };
            let type_name = spec.name.as_deref().unwrap_or_default();
            self.w.newline();
            self.w.line("/**");
            self.w.line(" * @private");
            self.w.line(&format!(" * @type {{{}}}", type_name));
            self.w.line(" */");
            self.w.write("this.");
            if id.starts_with(ID_PREFIX) {
                self.w.write(id);
            } else {
                self.w.write(&format!("{}_", id));
            }
            self.w.line(";");
        }
    }

    fn emit_class_decl_end(&mut self) {
        self.w.newline();
        self.w.line("/**");
        self.w.line(" * @private");
        self.w.line(" * @type {Array}");
        self.w.line(" */");
        self.w.line("this.mxmldd;");

        if self.cx.has_state_overrides() {
            let overrides = self.cx.state_overrides;
            self.collect_exported_names(overrides);
            self.w.line("/**");
            if self.options.emit_exports {
                self.w.line(" * @export");
            }
            self.w.line(" * @type {Array}");
            self.w.line(" */");
            self.w.line("this.mxmlsd = [");
            self.w.push();
            let descriptors =
                DescriptorWriter::new(&self.cx.specs, false).render_state_descriptors(overrides);
            self.w.write(&descriptors);
            self.w.write("null");
            self.w.write("]");
            self.w.pop();
            self.w.line(";");
        }

        self.w.newline();
        self.w.line("/**");
        self.w.line(" * @private");
        self.w.line(" * @type {Array}");
        self.w.line(" */");
        self.w.pop();
        self.w.line("this.mxmldp;");

        let root = self.cx.properties_tree;
        let attributes = self.cx.specs.get(root);
        if !attributes.property_specifiers.is_empty() || !attributes.event_specifiers.is_empty() {
            self.w.push();
            self.w.newline();
            self.w.write("this.generateMXMLAttributes(");
            self.w.push();
            self.w.line("[");
            let text = self.descriptor_writer().with_indent(self.w.level()).render(root);
            self.w.write(&text);
            self.w.pop();
            self.w.newline();
            self.collect_exported_names(root);
            self.w.write("])");
            self.w.line(";");
            self.w.pop();
            self.w.newline();
        }

        self.w.write("}");
        self.w.line(";");
        let base = self
            .names
            .format_qualified_name(&self.tree.class(self.cx.class).base_class_name);
        self.w.write(&format!("goog.inherits({}, {})", self.cname, base));
        self.w.line(";");
        self.w.newline();
        self.w.newline();
        self.w.newline();
    }

    /// `@export` prototype fields backing primitive declarations.
    fn emit_declaration_variables(&mut self) {
        let tree = self.tree;
        for node in &self.cx.primitive_declarations {
            let Some(id) = declaration_id(tree, *node) else {
                continue;
            };
            let type_name = match tree.kind(*node) {
                NodeKind::String { .. } => "String",
                NodeKind::Array { .. } => "Array",
                NodeKind::Xml(xml) if xml.is_list => "XMLList",
                NodeKind::Xml(_) => "XML",
                NodeKind::Primitive { type_name, .. } => type_name.as_str(),
                _ => continue,
            };
            let type_name = self.names.format_qualified_name(type_name);
            self.w.newline();
            self.w.line("/**");
            self.w.line(" * @export");
            self.w.line(&format!(" * @type {{{}}}", js_type(&type_name)));
            self.w.line(" */");
            self.w.write(&format!("{}.prototype.{}", self.cname, id));
            self.w.line(";");
        }
    }

    fn emit_scripts(&mut self) {
        let tree = self.tree;
        for node in &self.cx.scripts {
            let NodeKind::Script(statements) = tree.kind(*node) else {
                continue;
            };
            for stmt in statements {
                if stmt.code.trim_start().starts_with("import ") {
                    continue;
                }
                self.w.write(&self.stringifier.stringify(stmt));
                self.w.write(";");
                self.w.newline();
                self.w.newline();
                self.w.newline();
            }
        }
    }

    fn emit_events(&mut self) {
        let tree = self.tree;
        for event in &self.cx.events {
            let event = self.cx.specs.event(*event);
            let event_type = self.names.format_qualified_name(&event.event_type);
            self.w.line("/**");
            if self.options.emit_exports {
                self.w.line(" * @export");
            }
            self.w.line(&format!(" * @param {{{}}} event", event_type));
            self.w.line(" */");
            self.w.line(&format!(
                "{}.prototype.{} = function(event)",
                self.cname, event.event_handler
            ));
            self.w.line_push("{");

            if let NodeKind::EventSpecifier(data) = tree.kind(event.node) {
                for (i, stmt) in data.statements.iter().enumerate() {
                    if i > 0 {
                        self.w.newline();
                    }
                    self.w.write(&self.stringifier.stringify(stmt));
                    self.w.write(";");
                }
            }

            self.w.pop();
            self.w.newline();
            self.w.write("}");
            self.w.line(";");
            self.w.newline();
            self.w.newline();
        }
    }

    /// `Object.defineProperties` accessors for id'd instances. Returns whether
    /// the block was skipped entirely.
    fn emit_property_getter_setters(&mut self) -> bool {
        let specs = &self.cx.specs;
        let accessor_ids: Vec<String> = self
            .cx
            .instances
            .iter()
            .map(|i| specs.get(*i))
            .filter_map(|spec| match (&spec.id, spec.has_local_id) {
                (Some(id), _) => Some(id.clone()),
                (None, true) => spec.effective_id.clone(),
                (None, false) => None,
            })
            .collect();
        let descriptor_tree = &self.cx.descriptor_tree;
        let n = accessor_ids.len();
        if n == 0
            && (descriptor_tree.is_empty()
                || descriptor_tree.len() == 1
                    && specs.get(descriptor_tree[0]).property_specifiers.is_empty())
        {
            return true;
        }
        let has_descriptor = !descriptor_tree.is_empty();

        let cname = self.cname.clone();
        let w = &mut self.w;
        w.write("Object.defineProperties(");
        w.write(&cname);
        w.line(&format!(
            ".prototype, /** @lends {{{}.prototype}} */ {{",
            cname
        ));
        w.push();
        for (i, id) in accessor_ids.iter().enumerate() {
            w.push();
            w.line("/** @export */");
            w.line(&format!("{}: {{", id));
            w.line(&format!("/** @this {{{}}} */", cname));
            w.push();
            w.line("get: function() {");
            w.pop();
            w.line(&format!("return this.{}_;", id));
            w.line("},");
            w.line(&format!("/** @this {{{}}} */", cname));
            w.push();
            w.line("set: function(value) {");
            w.push();
            w.line(&format!("if (value != this.{}_) {{", id));
            w.line(&format!("this.{}_ = value;", id));
            w.write(
                "this.dispatchEvent(org.apache.royale.events.ValueChangeEvent.createUpdateEvent(this, '",
            );
            w.pop();
            w.line(&format!("{}', null, value));", id));
            w.pop();
            w.line("}");
            w.pop();
            w.line("}");
            if i + 1 < n || has_descriptor {
                w.line("},");
            } else {
                w.pop();
                w.line("}");
            }
        }
        if !has_descriptor {
            w.line("});");
        }
        false
    }

    fn emit_mxml_descriptor_funcs(&mut self, skipped_define_props: bool) {
        let Some(root) = self.cx.descriptor_tree.first().copied() else {
            return;
        };
        if self.cx.specs.get(root).property_specifiers.is_empty() && skipped_define_props {
            // every declaration was a primitive
            return;
        }
        self.collect_exported_names(root);

        let cname = self.cname.clone();
        self.w.push();
        self.w.line("'MXMLDescriptor': {");
        self.w.line(&format!("/** @this {{{}}} */", cname));
        self.w.push();
        self.w.line("get: function() {");
        self.w.line("if (this.mxmldd == undefined)");
        self.w.push();
        self.w.line("{");
        self.w.line("/** @type {Array} */");
        self.w.line(&format!(
            "var arr = {}.superClass_.get__MXMLDescriptor.apply(this);",
            cname
        ));
        self.w.line("/** @type {Array} */");
        self.w.push();
        self.w.line("var data = [");

        let text = self.descriptor_writer().with_indent(self.w.level()).render(root);
        self.w.write(&text);
        self.w.pop();
        self.w.newline();

        self.w.line("];");
        self.w.push();
        self.w.line("if (arr)");
        self.w.pop();
        self.w.line("this.mxmldd = arr.concat(data);");
        self.w.push();
        self.w.line("else");
        self.w.pop();
        self.w.pop();
        self.w.line("this.mxmldd = data;");
        self.w.line("}");
        self.w.pop();
        self.w.line("return this.mxmldd;");
        self.w.pop();
        self.w.line("}");
        self.w.pop();
        self.w.line("}");
        self.w.pop();
        self.w.line("});");
    }

    fn emit_binding_data(&mut self) -> Result<()> {
        let tree = self.tree;
        let class = self.cx.class;
        let info = tree.class(class);
        let mut db = info.bindings.clone().unwrap_or_default();

        for (index, destination) in &self.cx.binding_destinations {
            let binding = db.binding_mut(*index).ok_or_else(|| CodegenError::Structural {
                class_name: info.class_name.clone(),
                source: StructuralError::UnresolvedBindingDestination {
                    property: destination.clone(),
                },
            })?;
            binding.destination_string = Some(destination.clone());
        }

        let referenced: Vec<u32> = self
            .cx
            .binding_destinations
            .iter()
            .map(|(index, _)| *index)
            .chain(info.binding_nodes.keys().copied())
            .collect();
        db.check_consistency(&info.class_name, &referenced)?;

        let setters =
            attribute_setters(tree, class, &db).map_err(|source| CodegenError::Structural {
                class_name: info.class_name.clone(),
                source,
            })?;
        let text =
            BindingEncoder::new(self.stringifier, self.names).encode(&info.class_name, &db, &setters);
        self.w.write(&text);
        Ok(())
    }

    fn descriptor_writer(&self) -> DescriptorWriter<'_> {
        DescriptorWriter::new(&self.cx.specs, self.options.pretty_print)
            .with_reflect_object_property(self.options.reflect_object_property)
    }

    fn collect_exported_names(&mut self, descriptor: SpecId) {
        let specs = &self.cx.specs;
        let spec = specs.get(descriptor);
        let props: Vec<(Option<String>, Option<SpecId>)> = spec
            .property_specifiers
            .iter()
            .map(|p| {
                let prop = specs.get(*p);
                (prop.name.clone(), prop.property_specifiers.first().copied())
            })
            .collect();
        let children = spec
            .children_specifier
            .map(|c| specs.get(c).property_specifiers.clone())
            .unwrap_or_default();

        for (name, first) in props {
            if let Some(name) = name {
                self.names.add_exported(&name);
            }
            if let Some(first) = first {
                self.collect_exported_names(first);
            }
        }
        for child in children {
            self.collect_exported_names(child);
        }
    }
}

fn declaration_id(tree: &MxmlTree, node: NodeId) -> Option<&str> {
    match tree.declared_ids(node) {
        (Some(id), _) | (None, Some(id)) => Some(id),
        (None, None) => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEXT HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// JavaScript string-literal escaping: quotes, backslash and `/`, the short
/// control escapes, and `\uXXXX` for everything else outside printable ASCII.
pub fn escape_js(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '/' => out.push_str("\\/"),
            '\u{8}' => out.push_str("\\b"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\u{c}' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 32 || (c as u32) > 0x7f => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{:04X}", unit));
                }
            }
            c => out.push(c),
        }
    }
    out
}

/// Closure type annotation for an ActionScript type name.
pub fn js_type(as_type: &str) -> String {
    match as_type {
        "" | "*" => "*".to_string(),
        "Class" => "Object".to_string(),
        "Boolean" | "String" | "Number" => as_type.to_lowercase(),
        "int" | "uint" => "number".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stringify::RawStringifier;
    use serde_json::json;

    fn compile(doc: serde_json::Value) -> CompileResult {
        let tree = MxmlTree::from_json(&doc.to_string()).unwrap();
        compile_tree(&tree, &CompileOptions::default(), &RawStringifier).unwrap()
    }

    #[test]
    fn test_escape_js() {
        assert_eq!(escape_js("Ro'ale"), "Ro\\'ale");
        assert_eq!(escape_js("a/b\"c\\"), "a\\/b\\\"c\\\\");
        assert_eq!(escape_js("line\nnext\t"), "line\\nnext\\t");
        assert_eq!(escape_js("\u{1}é"), "\\u0001\\u00E9");
    }

    #[test]
    fn test_js_type_mapping() {
        assert_eq!(js_type("String"), "string");
        assert_eq!(js_type("uint"), "number");
        assert_eq!(js_type("Class"), "Object");
        assert_eq!(js_type(""), "*");
        assert_eq!(js_type("Array"), "Array");
    }

    #[test]
    fn test_writer_indent_clamps_below_zero() {
        let mut w = JsWriter::default();
        w.pop();
        w.line("a");
        w.push();
        w.push();
        w.line("b");
        assert_eq!(w.out, "a\nb\n  ");
    }

    #[test]
    fn test_fx_string_declaration() {
        let result = compile(json!({
            "className": "AppName",
            "classDepth": 8,
            "properties": [{ "name": "initialView", "value": {
                "kind": "instance",
                "typeName": "org.apache.royale.core.View",
                "properties": [{ "name": "mxmlContent", "value": { "kind": "array", "children": [{
                    "kind": "instance",
                    "typeName": "org.apache.royale.html.DropDownList",
                    "properties": [{ "name": "dataProvider", "value": { "kind": "array", "children": [
                        { "kind": "string", "literal": "Hello" },
                        { "kind": "string", "literal": "World" }
                    ]}}]
                }]}}]
            }}],
            "children": [{ "kind": "declarations", "children": [
                { "kind": "string", "id": "foo", "literal": "Ro'ale" }
            ]}]
        }));

        let expected = concat!(
            "\n/**\n * @constructor\n * @extends {org.apache.royale.core.Application}\n */\n",
            "AppName = function() {\n",
            "  AppName.base(this, 'constructor');\n",
            "  \n",
            "  this.foo = 'Ro\\'ale';\n",
            "  /**\n   * @private\n   * @type {org.apache.royale.core.View}\n   */\n",
            "  this.$ID_8_1;\n",
            "  \n",
            "  /**\n   * @private\n   * @type {org.apache.royale.html.DropDownList}\n   */\n",
            "  this.$ID_8_0;\n",
            "  \n",
            "  /**\n   * @private\n   * @type {Array}\n   */\n",
            "  this.mxmldd;\n",
            "  \n",
            "  /**\n   * @private\n   * @type {Array}\n   */\n",
            "  this.mxmldp;\n",
            "\n",
            "  this.generateMXMLAttributes([\n",
            "    1,\n",
            "    'initialView',\n",
            "    false,\n",
            "    [\n",
            "      org.apache.royale.core.View,\n",
            "      1,\n",
            "      '_id',\n",
            "      true,\n",
            "      '$ID_8_1',\n",
            "      0,\n",
            "      0,\n",
            "      [\n",
            "        org.apache.royale.html.DropDownList,\n",
            "        2,\n",
            "        '_id',\n",
            "        true,\n",
            "        '$ID_8_0',\n",
            "        'dataProvider',\n",
            "        true,\n",
            "        ['Hello','World'],\n",
            "        0,\n",
            "        0,\n",
            "        null\n",
            "      ]\n",
            "    ],\n",
            "    0,\n",
            "    0\n",
            "  ]);\n",
            "  \n",
            "};\n",
            "goog.inherits(AppName, org.apache.royale.core.Application);\n",
            "\n\n\n",
            "\n/**\n * @export\n * @type {string}\n */\n",
            "AppName.prototype.foo;\n",
            "\n"
        );
        assert_eq!(result.code, expected);
        assert!(result
            .used_names
            .contains(&"org.apache.royale.html.DropDownList".to_string()));
        assert!(!result.used_names.contains(&"AppName".to_string()));
        assert!(result.exported_names.contains(&"initialView".to_string()));
        assert!(result.exported_names.contains(&"dataProvider".to_string()));
    }

    #[test]
    fn test_accessors_and_descriptor_getter() {
        let result = compile(json!({
            "className": "MyApp",
            "classDepth": 8,
            "children": [{ "kind": "declarations", "children": [{
                "kind": "instance",
                "typeName": "org.apache.royale.html.Label",
                "id": "lbl",
                "properties": [{ "name": "text", "value": { "kind": "string", "literal": "x" } }]
            }]}]
        }));
        let code = &result.code;
        assert!(code.contains("  this.lbl_;\n"));
        assert!(code.contains(
            "Object.defineProperties(MyApp.prototype, /** @lends {MyApp.prototype} */ {\n"
        ));
        assert!(code.contains("return this.lbl_;"));
        assert!(code.contains(
            "this.dispatchEvent(org.apache.royale.events.ValueChangeEvent.createUpdateEvent(this, 'lbl', null, value));"
        ));
        assert!(code.contains("'MXMLDescriptor': {"));
        assert!(code.contains("var arr = MyApp.superClass_.get__MXMLDescriptor.apply(this);"));
        assert!(code.contains("'id',"));
        assert!(code.ends_with("});\n"));
    }

    #[test]
    fn test_event_handler_method() {
        let result = compile(json!({
            "className": "MyApp",
            "classDepth": 9,
            "events": [{ "name": "initialize", "statements": [
                { "code": "this.setup()" },
                { "code": "trace('ok')" }
            ]}]
        }));
        let expected = concat!(
            "/**\n * @export\n * @param {org.apache.royale.events.Event} event\n */\n",
            "MyApp.prototype.$EH_9_0 = function(event)\n",
            "{\n",
            "  this.setup();\n",
            "  trace('ok');\n",
            "};\n",
            "\n\n"
        );
        assert!(result.code.contains(expected), "{}", result.code);
        assert!(result.code.contains("    'initialize',\nthis.$EH_9_0\n"));
    }

    #[test]
    fn test_state_descriptors_block() {
        let result = compile(json!({
            "className": "MyApp",
            "properties": [
                { "name": "states", "value": { "kind": "array", "children": [
                    { "kind": "state", "stateName": "open" }
                ]}},
                { "name": "initialView", "value": {
                    "kind": "instance",
                    "typeName": "org.apache.royale.core.View",
                    "id": "view",
                    "properties": [{ "name": "mxmlContent", "value": { "kind": "array", "children": [
                        { "kind": "instance", "typeName": "org.apache.royale.html.Label", "id": "tip",
                          "includeIn": ["open"] }
                    ]}}]
                }}
            ]
        }));
        assert!(result.code.contains(concat!(
            "  /**\n   * @export\n   * @type {Array}\n   */\n",
            "  this.mxmlsd = [\n",
            "  [org.apache.royale.html.Label, 1, 'id', true, 'tip', 0, 0, null],\n",
            "null];\n"
        )));
        assert!(result.exported_names.contains(&"itemsDescriptor".to_string()));
    }

    #[test]
    fn test_exports_can_be_disabled() {
        let tree = MxmlTree::from_json(
            &json!({
                "className": "MyApp",
                "events": [{ "name": "click", "statements": [] }]
            })
            .to_string(),
        )
        .unwrap();
        let options = CompileOptions {
            emit_exports: false,
            ..CompileOptions::default()
        };
        let result = compile_tree(&tree, &options, &RawStringifier).unwrap();
        assert!(!result.code.contains("@export"));
    }

    #[test]
    fn test_bound_override_without_record_fails() {
        let tree = MxmlTree::from_json(
            &json!({
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
                                       "bindingIndex": 3 } }]
                    }}
                ]
            })
            .to_string(),
        )
        .unwrap();
        let err = compile_tree(&tree, &CompileOptions::default(), &RawStringifier).unwrap_err();
        assert!(matches!(
            err,
            CodegenError::Structural {
                source: StructuralError::UnresolvedBindingDestination { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_input_is_reported() {
        let err = compile_document("{ \"className\": ", &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CodegenError::Input(_)));
    }
}
