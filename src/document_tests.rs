//! End-to-end document scenarios: JSON AST in, JavaScript text out.

use serde_json::{json, Value};

use crate::ast::MxmlTree;
use crate::config::CompileOptions;
use crate::emit::{compile_document, compile_tree, CompileResult};
use crate::error::{CodegenError, INV_BINDING_INDEX, INV_MISSING_PROPERTY_ANCESTOR};
use crate::stringify::RawStringifier;

fn compile_raw(doc: Value, options: &CompileOptions) -> crate::error::Result<CompileResult> {
    let tree = MxmlTree::from_json(&doc.to_string())?;
    compile_tree(&tree, options, &RawStringifier)
}

fn bound_label_doc() -> Value {
    json!({
        "className": "AppName",
        "classDepth": 8,
        "properties": [{ "name": "initialView", "value": {
            "kind": "instance",
            "typeName": "org.apache.royale.core.View",
            "properties": [{ "name": "mxmlContent", "value": { "kind": "array", "children": [{
                "kind": "instance",
                "typeName": "org.apache.royale.html.Label",
                "id": "lbl",
                "properties": [{ "name": "text", "value": {
                    "kind": "data-binding",
                    "expression": { "code": "labelText" },
                    "bindingIndex": 0
                }}]
            }]}}]
        }}],
        "bindings": {
            "bindings": [{
                "index": 0,
                "sourceString": "labelText",
                "destination": { "type": "attribute", "name": "text" }
            }],
            "watchers": [{
                "index": 0,
                "type": "property",
                "propertyName": "labelText",
                "eventNames": ["valueChange"],
                "bindingIndices": [0],
                "isRoot": true
            }]
        }
    })
}

#[test]
fn test_bound_attribute_gets_setter_and_watcher() {
    let result = compile_raw(bound_label_doc(), &CompileOptions::default()).unwrap();
    let code = &result.code;

    assert!(code.contains("AppName.prototype._bindings = [\n1,\n\"labelText\",\n"));
    assert!(code.contains("function (value) { this.lbl[0][0].text = value;},"));
    assert!(code.contains("\"valueChange\""));
    // the bound property stays out of the descriptor
    assert!(!code.contains("'text', true"));

    // the explicit id gets a backing field and an accessor
    assert!(code.contains("this.lbl_;"));
    assert!(code.contains("lbl: {"));
    // nothing sits in the content descriptor
    assert!(!code.contains("'MXMLDescriptor': {"));

    assert!(result
        .used_names
        .contains(&"org.apache.royale.html.Label".to_string()));
    assert!(result.diagnostics.is_empty());
}

#[test]
fn test_watcher_pointing_past_bindings_is_rejected() {
    let mut doc = bound_label_doc();
    doc["bindings"]["watchers"][0]["bindingIndices"] = json!([3]);

    let err = compile_raw(doc, &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CodegenError::BindingIndex { .. }));
    assert_eq!(err.code(), INV_BINDING_INDEX);
}

#[test]
fn test_inline_component_is_emitted_after_declaration_fields() {
    let doc = json!({
        "className": "MyApp",
        "properties": [{ "name": "initialView", "value": {
            "kind": "instance",
            "typeName": "org.apache.royale.html.List",
            "properties": [{ "name": "itemRenderer", "value": { "kind": "component", "definition": {
                "className": "MyApp_component0",
                "baseClassName": "org.apache.royale.html.supportClasses.DataItemRenderer",
                "events": [{ "name": "click", "statements": [{ "code": "pick()" }] }]
            }}}]
        }}],
        "children": [{ "kind": "declarations", "children": [
            { "kind": "string", "id": "greeting", "literal": "hi" }
        ]}]
    });
    let result = compile_raw(doc, &CompileOptions::default()).unwrap();
    let code = &result.code;

    let field = code.find("MyApp.prototype.greeting;").unwrap();
    let component = code.find("MyApp.MyApp_component0 = function() {").unwrap();
    assert!(field < component);

    assert!(code.contains("new org.apache.royale.core.ClassFactory(MyApp.MyApp_component0)"));
    assert!(code.contains("goog.inherits(MyApp.MyApp_component0, org.apache.royale.html.supportClasses.DataItemRenderer);"));
    // the component's handler is a method of the component class only
    assert!(code.contains("MyApp.MyApp_component0.prototype.$EH_0_0 = function(event)"));
    assert!(!code.contains("MyApp.prototype.$EH_0_0"));
}

#[test]
fn test_scripts_skip_imports_and_keep_order() {
    let doc = json!({
        "className": "ScriptApp",
        "children": [{ "kind": "script", "statements": [
            { "code": "import org.apache.royale.events.MouseEvent;" },
            { "code": "ScriptApp.prototype.count = 0" },
            { "code": "ScriptApp.prototype.bump = function() { this.count++; }" }
        ]}]
    });
    let result = compile_raw(doc, &CompileOptions::default()).unwrap();
    let code = &result.code;

    assert!(!code.contains("import "));
    let first = code.find("ScriptApp.prototype.count = 0;").unwrap();
    let second = code.find("ScriptApp.prototype.bump = function() { this.count++; };").unwrap();
    assert!(first < second);
}

#[test]
fn test_reflect_mode_wraps_root_attribute_names() {
    let doc = json!({
        "className": "ReflectApp",
        "properties": [{ "name": "title", "value": { "kind": "string", "literal": "Hello" } }]
    });
    let options = CompileOptions {
        reflect_object_property: true,
        pretty_print: false,
        ..CompileOptions::default()
    };
    let result = compile_raw(doc, &options).unwrap();
    assert!(result
        .code
        .contains("goog.reflect.objectProperty('title', this), true, 'Hello'"));
    assert!(result.exported_names.contains(&"title".to_string()));
}

#[test]
fn test_event_handler_with_export_tag() {
    let doc = json!({
        "className": "ClickApp",
        "classDepth": 3,
        "events": [{
            "name": "click",
            "eventType": "org.apache.royale.events.MouseEvent",
            "statements": [{ "code": "this.handle(event)" }]
        }]
    });
    let result = compile_raw(doc, &CompileOptions::default()).unwrap();
    let code = &result.code;

    assert!(code.contains(" * @export\n * @param {org.apache.royale.events.MouseEvent} event\n"));
    assert!(code.contains("ClickApp.prototype.$EH_3_0 = function(event)"));
    assert!(code.contains("this.handle(event);"));
}

#[test]
fn test_state_dependent_child_outside_property_fails_document() {
    let doc = json!({
        "className": "BrokenApp",
        "properties": [{ "name": "states", "value": { "kind": "array", "children": [
            { "kind": "state", "stateName": "normal" },
            { "kind": "state", "stateName": "hover" }
        ]}}],
        "children": [{
            "kind": "instance",
            "typeName": "org.apache.royale.html.Label",
            "includeIn": ["hover"]
        }]
    });
    let err = compile_raw(doc, &CompileOptions::default()).unwrap_err();
    assert_eq!(err.code(), INV_MISSING_PROPERTY_ANCESTOR);

    let diagnostic = err.to_compiler_error("BrokenApp.mxml");
    assert_eq!(diagnostic.file, "BrokenApp.mxml");
    assert!(diagnostic.message.contains("BrokenApp"));
}

#[test]
fn test_oxc_stringifier_entry_point() {
    let doc = json!({
        "className": "OxcApp",
        "events": [{ "name": "click", "statements": [{ "code": "doIt(  1,2 )" }] }]
    });
    let result = compile_document(&doc.to_string(), &CompileOptions::default()).unwrap();
    assert!(result.code.contains("doIt(1, 2);"));
}
