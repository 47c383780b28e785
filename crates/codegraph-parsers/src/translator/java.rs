//! Java visitor (spec §4.3.4, §4.3.7). Also the reference implementation the
//! [`super::csharp`] visitor is adapted from, since both are OOP/annotation
//! languages with classes, interfaces, constructors and method calls.

use codegraph_core::store::GraphStore;
use codegraph_core::types::{Metadata, MetadataValue, NodeKind};
use tree_sitter::Node as TsNode;

use crate::adapter::{field, first_identifier_like, named_children, node_range, text};
use crate::translator::context::{list_meta, str_meta, TranslationCtx};
use crate::translator::{walk_children, walk_node, Visitor};

pub struct JavaVisitor;

impl<S: GraphStore> Visitor<S> for JavaVisitor {
    fn visit(&mut self, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) -> bool {
        match node.kind() {
            "package_declaration" => {
                if let Some(name_node) = named_children(&node).next() {
                    let name = text(&name_node, source).to_string();
                    let scope_owner = ctx.current_scope_owner();
                    let mut md = Metadata::new();
                    md.insert("name".to_string(), str_meta(name.clone()));
                    let id = ctx.emit_node(NodeKind::ModuleScope, Some(name), node_range(&node), scope_owner, md);
                    ctx.contains(scope_owner, id);
                }
                true
            }
            "import_declaration" => {
                let target = named_children(&node).next().map(|n| text(&n, source).to_string()).unwrap_or_default();
                let mut md = Metadata::new();
                md.insert("target".to_string(), str_meta(target));
                let scope_owner = ctx.current_scope_owner();
                let id = ctx.emit_node(NodeKind::Import, None, node_range(&node), scope_owner, md);
                ctx.contains(scope_owner, id);
                true
            }
            "class_declaration" | "interface_declaration" | "enum_declaration" | "record_declaration" => {
                handle_class_like(ctx, node, source);
                true
            }
            "method_declaration" | "constructor_declaration" => {
                handle_function(ctx, node, source);
                true
            }
            "field_declaration" => {
                handle_field(ctx, node, source);
                true
            }
            "local_variable_declaration" => {
                handle_local_variable(ctx, node, source);
                true
            }
            "block" => {
                handle_block(self, ctx, node, source);
                true
            }
            "if_statement" | "switch_expression" | "switch_statement" => {
                handle_conditional(self, ctx, node, source);
                true
            }
            "for_statement" | "while_statement" | "do_statement" | "enhanced_for_statement" => {
                handle_loop(self, ctx, node, source);
                true
            }
            "method_invocation" | "object_creation_expression" => {
                handle_call_chain(ctx, &node, source);
                true
            }
            "assignment_expression" => {
                handle_assignment(ctx, node, source);
                true
            }
            _ => false,
        }
    }
}

fn annotations_metadata(modifiers: Option<TsNode<'_>>, source: &[u8]) -> Vec<MetadataValue> {
    let Some(modifiers) = modifiers else { return Vec::new() };
    let mut out = Vec::new();
    for child in named_children(&modifiers) {
        match child.kind() {
            "marker_annotation" => {
                if let Some(name) = field(&child, "name") {
                    let json = serde_json::json!({ "name": text(&name, source) }).to_string();
                    out.push(str_meta(json));
                }
            }
            "annotation" => {
                let name = field(&child, "name").map(|n| text(&n, source).to_string()).unwrap_or_default();
                let mut args = serde_json::Map::new();
                if let Some(arg_list) = field(&child, "arguments") {
                    let values: Vec<TsNode> = named_children(&arg_list).collect();
                    if values.len() == 1 && values[0].kind() != "element_value_pair" {
                        args.insert("value".to_string(), serde_json::Value::String(text(&values[0], source).to_string()));
                    } else {
                        for pair in values {
                            if pair.kind() == "element_value_pair" {
                                let key = field(&pair, "key").map(|n| text(&n, source).to_string()).unwrap_or_default();
                                let val = field(&pair, "value").map(|n| text(&n, source).to_string()).unwrap_or_default();
                                args.insert(key, serde_json::Value::String(val));
                            }
                        }
                    }
                }
                let json = if args.is_empty() {
                    serde_json::json!({ "name": name }).to_string()
                } else {
                    serde_json::json!({ "name": name, "arguments": args }).to_string()
                };
                out.push(str_meta(json));
            }
            _ => {}
        }
    }
    out
}

fn handle_class_like<S: GraphStore>(ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let name = field(&node, "name").map(|n| text(&n, source).to_string());
    let scope_owner = ctx.current_scope_owner();

    let mut metadata = Metadata::new();
    metadata.insert("is_interface".to_string(), MetadataValue::Bool(node.kind() == "interface_declaration"));
    metadata.insert("is_enum".to_string(), MetadataValue::Bool(node.kind() == "enum_declaration"));
    metadata.insert("is_record".to_string(), MetadataValue::Bool(node.kind() == "record_declaration"));

    let extends: Vec<String> = field(&node, "superclass")
        .map(|n| named_children(&n).map(|t| text(&t, source).to_string()).collect())
        .unwrap_or_default();
    let implements: Vec<String> = field(&node, "interfaces")
        .map(|n| {
            named_children(&n)
                .flat_map(|list| named_children(&list))
                .map(|t| text(&t, source).to_string())
                .collect()
        })
        .unwrap_or_default();
    if !extends.is_empty() {
        metadata.insert("extends".to_string(), list_meta(extends));
    }
    if !implements.is_empty() {
        metadata.insert("implements".to_string(), list_meta(implements));
    }

    if let Some(modifiers) = field(&node, "modifiers") {
        let anns = annotations_metadata(Some(modifiers), source);
        if !anns.is_empty() {
            metadata.insert("annotations".to_string(), MetadataValue::List(anns));
        }
    }

    let id = ctx.emit_node(NodeKind::Class, name.clone(), node_range(&node), scope_owner, metadata);
    ctx.contains(scope_owner, id);
    ctx.defines(scope_owner, id);
    if let Some(n) = &name {
        ctx.define_symbol(n.clone(), id);
    }

    ctx.scopes.push_scope(id);
    if let Some(body) = field(&node, "body") {
        let mut visitor = JavaVisitor;
        walk_children(&mut visitor, ctx, body, source);
    }
    let _ = ctx.scopes.pop_scope();
}

fn handle_function<S: GraphStore>(ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let is_constructor = node.kind() == "constructor_declaration";
    let name = field(&node, "name").map(|n| text(&n, source).to_string());
    let scope_owner = ctx.current_scope_owner();

    let params = field(&node, "parameters").map(|n| text(&n, source).to_string()).unwrap_or_default();
    let return_type = field(&node, "type").map(|n| text(&n, source).to_string());
    let signature = format!("{}{}", name.clone().unwrap_or_default(), params);

    let mut metadata = Metadata::new();
    metadata.insert("signature".to_string(), str_meta(signature));
    metadata.insert("is_constructor".to_string(), MetadataValue::Bool(is_constructor));
    if let Some(ret) = return_type {
        metadata.insert("return".to_string(), str_meta(ret));
    }
    if let Some(modifiers) = field(&node, "modifiers") {
        let anns = annotations_metadata(Some(modifiers), source);
        if !anns.is_empty() {
            metadata.insert("annotations".to_string(), MetadataValue::List(anns));
        }
        metadata.insert("modifiers".to_string(), str_meta(text(&modifiers, source)));
    }

    let id = ctx.emit_node(NodeKind::Function, name.clone(), node_range(&node), scope_owner, metadata);
    ctx.contains(scope_owner, id);
    ctx.defines(scope_owner, id);
    if let Some(n) = &name {
        ctx.define_symbol(n.clone(), id);
    }

    ctx.scopes.push_scope(id);
    ctx.enclosing_function.push(id);
    if let Some(body) = field(&node, "body") {
        let mut visitor = JavaVisitor;
        walk_children(&mut visitor, ctx, body, source);
    }
    ctx.enclosing_function.pop();
    let _ = ctx.scopes.pop_scope();
}

fn handle_field<S: GraphStore>(ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let field_type = field(&node, "type").map(|n| text(&n, source).to_string());
    let scope_owner = ctx.current_scope_owner();
    for declarator in named_children(&node).filter(|c| c.kind() == "variable_declarator") {
        let name = field(&declarator, "name").map(|n| text(&n, source).to_string());
        let mut metadata = Metadata::new();
        if let Some(t) = &field_type {
            metadata.insert("type".to_string(), str_meta(t.clone()));
        }
        if let Some(modifiers) = field(&node, "modifiers") {
            let anns = annotations_metadata(Some(modifiers), source);
            if !anns.is_empty() {
                metadata.insert("annotations".to_string(), MetadataValue::List(anns));
            }
        }
        let id = ctx.emit_node(NodeKind::Field, name.clone(), node_range(&declarator), scope_owner, metadata);
        ctx.contains(scope_owner, id);
        ctx.defines(scope_owner, id);
        if let Some(n) = &name {
            ctx.define_symbol(n.clone(), id);
        }
    }
}

fn handle_local_variable<S: GraphStore>(ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let var_type = field(&node, "type").map(|n| text(&n, source).to_string());
    let scope_owner = ctx.current_scope_owner();
    for declarator in named_children(&node).filter(|c| c.kind() == "variable_declarator") {
        let name = field(&declarator, "name").map(|n| text(&n, source).to_string());
        let mut metadata = Metadata::new();
        if let Some(t) = &var_type {
            metadata.insert("type".to_string(), str_meta(t.clone()));
        }
        let id = ctx.emit_node(NodeKind::Variable, name.clone(), node_range(&declarator), scope_owner, metadata);
        ctx.contains(scope_owner, id);
        ctx.defines(scope_owner, id);
        if let Some(n) = &name {
            ctx.define_symbol(n.clone(), id);
        }
        // An initialiser on a declaration is an assignment for RHS-reference
        // purposes (spec §4.3.6).
        if let Some(value) = field(&declarator, "value") {
            let mut visitor = JavaVisitor;
            walk_node(&mut visitor, ctx, value, source);
        }
    }
}

fn handle_block<S: GraphStore>(visitor: &mut JavaVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let scope_owner = ctx.current_scope_owner();
    let id = ctx.emit_node(NodeKind::Block, None, node_range(&node), scope_owner, Metadata::new());
    ctx.contains(scope_owner, id);
    ctx.scopes.push_scope(id);
    walk_children(visitor, ctx, node, source);
    let _ = ctx.scopes.pop_scope();
}

fn handle_conditional<S: GraphStore>(visitor: &mut JavaVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let scope_owner = ctx.current_scope_owner();
    let id = ctx.emit_node(NodeKind::Conditional, None, node_range(&node), scope_owner, Metadata::new());
    ctx.contains(scope_owner, id);
    ctx.scopes.push_scope(id);
    walk_children(visitor, ctx, node, source);
    let _ = ctx.scopes.pop_scope();
}

fn handle_loop<S: GraphStore>(visitor: &mut JavaVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let scope_owner = ctx.current_scope_owner();
    let id = ctx.emit_node(NodeKind::Loop, None, node_range(&node), scope_owner, Metadata::new());
    ctx.contains(scope_owner, id);
    ctx.scopes.push_scope(id);
    walk_children(visitor, ctx, node, source);
    let _ = ctx.scopes.pop_scope();
}

/// Handle chained call expressions `a.b().c().d()` by recursing into the
/// receiver first so every link produces its own `FunctionCall` node, in
/// source order (spec §4.3.4, §8 boundary behaviour 10).
fn handle_call_chain<S: GraphStore>(ctx: &mut TranslationCtx<'_, S>, node: &TsNode<'_>, source: &[u8]) {
    let is_constructor = node.kind() == "object_creation_expression";

    if let Some(receiver) = field(node, "object") {
        let mut visitor = JavaVisitor;
        walk_node(&mut visitor, ctx, receiver, source);
    }

    let name = if is_constructor {
        field(node, "type").map(|n| text(&n, source).to_string())
    } else {
        field(node, "name")
            .map(|n| text(&n, source).to_string())
            .or_else(|| first_identifier_like(node).map(|n| text(&n, source).to_string()))
    };
    let name = name.unwrap_or_else(|| format!("__unnamed_call__{}", node.start_position().row + 1));

    let scope_owner = ctx.current_scope_owner();
    let mut metadata = Metadata::new();
    metadata.insert("is_constructor".to_string(), MetadataValue::Bool(is_constructor));
    metadata.insert("external".to_string(), MetadataValue::Bool(false));
    let id = ctx.emit_node(NodeKind::FunctionCall, Some(name), node_range(node), scope_owner, metadata);
    ctx.contains(scope_owner, id);

    if let Some(args) = field(node, "arguments") {
        let mut visitor = JavaVisitor;
        walk_children(&mut visitor, ctx, args, source);
    }
}

/// Assignment handling (spec §4.3.6): translate RHS first (collects RHS
/// references), then LHS (defines if new), then emit USES from the current
/// function/block to every collected RHS reference.
fn handle_assignment<S: GraphStore>(ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    if let Some(right) = field(&node, "right") {
        collect_rhs_references(ctx, &right, source);
        let mut visitor = JavaVisitor;
        walk_node(&mut visitor, ctx, right, source);
    }

    let scope_idx = ctx.scopes.current().unwrap();
    if let Some(left) = field(&node, "left") {
        let lhs_name = first_identifier_like(&left).map(|n| text(&n, source).to_string()).or_else(|| {
            if left.kind() == "identifier" {
                Some(text(&left, source).to_string())
            } else {
                None
            }
        });
        if let Some(name) = lhs_name {
            if !ctx.scopes.scope(scope_idx).has_local(&name) {
                let scope_owner = ctx.current_scope_owner();
                let id = ctx.emit_node(NodeKind::Variable, Some(name.clone()), node_range(&left), scope_owner, Metadata::new());
                ctx.contains(scope_owner, id);
                ctx.defines(scope_owner, id);
                ctx.define_symbol(name, id);
            }
        }
    }

    let refs = ctx.scopes.scope_mut(scope_idx).take_rhs_references();
    if let Some(&enclosing) = ctx.enclosing_function.last() {
        for name in refs {
            if let Some(sym) = ctx.scopes.resolve(&name) {
                let target = sym.node_id;
                ctx.uses(enclosing, target);
            }
        }
    }
}

fn collect_rhs_references<S: GraphStore>(ctx: &mut TranslationCtx<'_, S>, node: &TsNode<'_>, source: &[u8]) {
    if node.kind() == "identifier" {
        let name = text(node, source).to_string();
        if let Some(idx) = ctx.scopes.current() {
            ctx.scopes.scope_mut(idx).record_rhs_reference(name);
        }
        return;
    }
    for child in named_children(node) {
        collect_rhs_references(ctx, &child, source);
    }
}
