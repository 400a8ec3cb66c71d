use crate::ast::{MxmlTree, NodeId, NodeKind};
use crate::error::Result;

/// The MxmlVisitor trait is the single traversal mechanism over a lowered `MxmlTree`.
///
/// Rules:
/// 1. Dispatch is by `NodeKind`; children are visited in source order.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers call the `walk_*` functions to continue traversal unless pruning is intended.
/// 4. Errors abort the traversal of the current document.
pub trait MxmlVisitor<'t> {
    fn tree(&self) -> &'t MxmlTree;

    fn visit_node(&mut self, node: NodeId) -> Result<()> {
        walk_node(self, node)
    }

    fn visit_class_root(&mut self, node: NodeId) -> Result<()> {
        walk_children(self, node)
    }

    fn visit_instance(&mut self, node: NodeId) -> Result<()> {
        walk_children(self, node)
    }

    fn visit_object(&mut self, node: NodeId) -> Result<()> {
        walk_children(self, node)
    }

    fn visit_state(&mut self, _node: NodeId) -> Result<()> {
        Ok(())
    }

    fn visit_array(&mut self, node: NodeId) -> Result<()> {
        walk_children(self, node)
    }

    fn visit_declarations(&mut self, node: NodeId) -> Result<()> {
        walk_children(self, node)
    }

    fn visit_property_specifier(&mut self, node: NodeId) -> Result<()> {
        walk_children(self, node)
    }

    fn visit_event_specifier(&mut self, _node: NodeId) -> Result<()> {
        Ok(())
    }

    fn visit_string(&mut self, _node: NodeId) -> Result<()> {
        Ok(())
    }

    fn visit_primitive(&mut self, _node: NodeId) -> Result<()> {
        Ok(())
    }

    fn visit_data_binding(&mut self, _node: NodeId) -> Result<()> {
        Ok(())
    }

    fn visit_component(&mut self, _node: NodeId) -> Result<()> {
        Ok(())
    }

    fn visit_factory(&mut self, _node: NodeId) -> Result<()> {
        Ok(())
    }

    fn visit_class_ref(&mut self, _node: NodeId) -> Result<()> {
        Ok(())
    }

    fn visit_function(&mut self, _node: NodeId) -> Result<()> {
        Ok(())
    }

    fn visit_xml(&mut self, _node: NodeId) -> Result<()> {
        Ok(())
    }

    fn visit_script(&mut self, _node: NodeId) -> Result<()> {
        Ok(())
    }

    fn visit_service(&mut self, node: NodeId) -> Result<()> {
        walk_children(self, node)
    }

    fn visit_service_operation(&mut self, node: NodeId) -> Result<()> {
        walk_children(self, node)
    }
}

pub fn walk_node<'t, V: MxmlVisitor<'t> + ?Sized>(visitor: &mut V, node: NodeId) -> Result<()> {
    match visitor.tree().kind(node) {
        NodeKind::ClassRoot(_) => visitor.visit_class_root(node),
        NodeKind::Instance(_) => visitor.visit_instance(node),
        NodeKind::Object(_) => visitor.visit_object(node),
        NodeKind::State(_) => visitor.visit_state(node),
        NodeKind::Array { .. } => visitor.visit_array(node),
        NodeKind::String { .. } => visitor.visit_string(node),
        NodeKind::Primitive { .. } => visitor.visit_primitive(node),
        NodeKind::DataBinding { .. } => visitor.visit_data_binding(node),
        NodeKind::Declarations(_) => visitor.visit_declarations(node),
        NodeKind::Component(_) => visitor.visit_component(node),
        NodeKind::Factory(_) => visitor.visit_factory(node),
        NodeKind::ClassRef(_) => visitor.visit_class_ref(node),
        NodeKind::Function(_) => visitor.visit_function(node),
        NodeKind::Xml(_) => visitor.visit_xml(node),
        NodeKind::Script(_) => visitor.visit_script(node),
        NodeKind::Service { .. } => visitor.visit_service(node),
        NodeKind::ServiceOperation { .. } => visitor.visit_service_operation(node),
        NodeKind::PropertySpecifier(_) => visitor.visit_property_specifier(node),
        NodeKind::EventSpecifier(_) => visitor.visit_event_specifier(node),
    }
}

pub fn walk_children<'t, V: MxmlVisitor<'t> + ?Sized>(visitor: &mut V, node: NodeId) -> Result<()> {
    let tree = visitor.tree();
    for child in tree.children(node) {
        visitor.visit_node(child)?;
    }
    Ok(())
}

/// Visits each node of `nodes` in order.
pub fn walk_nodes<'t, V: MxmlVisitor<'t> + ?Sized>(visitor: &mut V, nodes: &[NodeId]) -> Result<()> {
    for node in nodes {
        visitor.visit_node(*node)?;
    }
    Ok(())
}
