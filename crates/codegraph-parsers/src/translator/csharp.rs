//! C# visitor (spec §4.3.4). Structurally close to the Java visitor — both
//! are class-based OOP languages with attribute/annotation syntax — but C#
//! separates `class_declaration`/`interface_declaration`/`struct_declaration`/
//! `record_declaration` and spells constructors as `constructor_declaration`
//! rather than a same-named method.

use codegraph_core::store::GraphStore;
use codegraph_core::types::{Metadata, MetadataValue, NodeKind};
use tree_sitter::Node as TsNode;

use crate::adapter::{field, first_identifier_like, named_children, node_range, text};
use crate::translator::context::{list_meta, str_meta, TranslationCtx};
use crate::translator::{walk_children, walk_node, Visitor};

pub struct CSharpVisitor;

impl<S: GraphStore> Visitor<S> for CSharpVisitor {
    fn visit(&mut self, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) -> bool {
        match node.kind() {
            "using_directive" => {
                let target = field(&node, "name").map(|n| text(&n, source).to_string()).unwrap_or_else(|| text(&node, source).to_string());
                let mut md = Metadata::new();
                md.insert("target".to_string(), str_meta(target));
                let scope_owner = ctx.current_scope_owner();
                let id = ctx.emit_node(NodeKind::Import, None, node_range(&node), scope_owner, md);
                ctx.contains(scope_owner, id);
                true
            }
            "namespace_declaration" | "file_scoped_namespace_declaration" => {
                let name = field(&node, "name").map(|n| text(&n, source).to_string());
                let scope_owner = ctx.current_scope_owner();
                let mut md = Metadata::new();
                if let Some(n) = &name {
                    md.insert("name".to_string(), str_meta(n.clone()));
                }
                let id = ctx.emit_node(NodeKind::ModuleScope, name, node_range(&node), scope_owner, md);
                ctx.contains(scope_owner, id);
                ctx.scopes.push_scope(id);
                if let Some(body) = field(&node, "body") {
                    walk_children(self, ctx, body, source);
                } else {
                    walk_children(self, ctx, node, source);
                }
                let _ = ctx.scopes.pop_scope();
                true
            }
            "class_declaration" | "interface_declaration" | "struct_declaration" | "record_declaration" => {
                handle_class_like(self, ctx, node, source);
                true
            }
            "method_declaration" | "constructor_declaration" => {
                handle_function(self, ctx, node, source);
                true
            }
            "field_declaration" => {
                handle_field(ctx, node, source);
                true
            }
            "local_declaration_statement" | "variable_declaration" => {
                handle_local_variable(ctx, node, source);
                true
            }
            "block" => {
                handle_block(self, ctx, node, source);
                true
            }
            "if_statement" | "switch_statement" => {
                handle_conditional(self, ctx, node, source);
                true
            }
            "for_statement" | "foreach_statement" | "while_statement" | "do_statement" => {
                handle_loop(self, ctx, node, source);
                true
            }
            "invocation_expression" | "object_creation_expression" => {
                handle_call_chain(self, ctx, &node, source);
                true
            }
            "assignment_expression" => {
                handle_assignment(self, ctx, node, source);
                true
            }
            _ => false,
        }
    }
}

fn attributes_metadata(node: &TsNode<'_>, source: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    for list in named_children(node).filter(|c| c.kind() == "attribute_list") {
        for attr in named_children(&list).filter(|c| c.kind() == "attribute") {
            let name = field(&attr, "name").map(|n| text(&n, source).to_string()).unwrap_or_else(|| text(&attr, source).to_string());
            out.push(name);
        }
    }
    out
}

fn handle_class_like<S: GraphStore>(visitor: &mut CSharpVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let name = field(&node, "name").map(|n| text(&n, source).to_string());
    let scope_owner = ctx.current_scope_owner();

    let bases: Vec<String> = field(&node, "bases")
        .map(|b| named_children(&b).map(|t| text(&t, source).to_string()).collect())
        .unwrap_or_default();

    let mut metadata = Metadata::new();
    metadata.insert("is_interface".to_string(), MetadataValue::Bool(node.kind() == "interface_declaration"));
    metadata.insert("is_record".to_string(), MetadataValue::Bool(node.kind() == "record_declaration"));
    metadata.insert("is_enum".to_string(), MetadataValue::Bool(false));
    if !bases.is_empty() {
        metadata.insert("extends".to_string(), list_meta(bases));
    }
    let attrs = attributes_metadata(&node, source);
    if !attrs.is_empty() {
        metadata.insert("attributes".to_string(), list_meta(attrs));
    }

    let id = ctx.emit_node(NodeKind::Class, name.clone(), node_range(&node), scope_owner, metadata);
    ctx.contains(scope_owner, id);
    ctx.defines(scope_owner, id);
    if let Some(n) = &name {
        ctx.define_symbol(n.clone(), id);
    }

    ctx.scopes.push_scope(id);
    if let Some(body) = field(&node, "body") {
        walk_children(visitor, ctx, body, source);
    }
    let _ = ctx.scopes.pop_scope();
}

fn handle_function<S: GraphStore>(visitor: &mut CSharpVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let name = field(&node, "name").map(|n| text(&n, source).to_string()).unwrap_or_else(|| "<ctor>".to_string());
    let scope_owner = ctx.current_scope_owner();

    let params = field(&node, "parameters").map(|n| text(&n, source).to_string()).unwrap_or_default();
    let mut metadata = Metadata::new();
    metadata.insert("signature".to_string(), str_meta(format!("{name}{params}")));
    metadata.insert("is_constructor".to_string(), MetadataValue::Bool(node.kind() == "constructor_declaration"));
    let attrs = attributes_metadata(&node, source);
    if !attrs.is_empty() {
        metadata.insert("attributes".to_string(), list_meta(attrs));
    }

    let id = ctx.emit_node(NodeKind::Function, Some(name.clone()), node_range(&node), scope_owner, metadata);
    ctx.contains(scope_owner, id);
    ctx.defines(scope_owner, id);
    ctx.define_symbol(name, id);

    ctx.scopes.push_scope(id);
    ctx.enclosing_function.push(id);
    if let Some(body) = field(&node, "body") {
        walk_children(visitor, ctx, body, source);
    }
    ctx.enclosing_function.pop();
    let _ = ctx.scopes.pop_scope();
}

fn handle_field<S: GraphStore>(ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let field_type = field(&node, "type").map(|n| text(&n, source).to_string());
    let scope_owner = ctx.current_scope_owner();
    if let Some(declaration) = field(&node, "declaration") {
        for declarator in named_children(&declaration).filter(|c| c.kind() == "variable_declarator") {
            let name = field(&declarator, "name").map(|n| text(&n, source).to_string()).unwrap_or_else(|| text(&declarator, source).to_string());
            let mut metadata = Metadata::new();
            if let Some(t) = &field_type {
                metadata.insert("type".to_string(), str_meta(t.clone()));
            }
            let id = ctx.emit_node(NodeKind::Field, Some(name.clone()), node_range(&declarator), scope_owner, metadata);
            ctx.contains(scope_owner, id);
            ctx.defines(scope_owner, id);
            ctx.define_symbol(name, id);
        }
    }
}

fn handle_local_variable<S: GraphStore>(ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let declaration = if node.kind() == "variable_declaration" { node.clone() } else { field(&node, "declaration").unwrap_or(node) };
    let var_type = field(&declaration, "type").map(|n| text(&n, source).to_string());
    let scope_owner = ctx.current_scope_owner();
    for declarator in named_children(&declaration).filter(|c| c.kind() == "variable_declarator") {
        let name = field(&declarator, "name").map(|n| text(&n, source).to_string()).unwrap_or_else(|| text(&declarator, source).to_string());
        let mut metadata = Metadata::new();
        if let Some(t) = &var_type {
            metadata.insert("type".to_string(), str_meta(t.clone()));
        }
        let id = ctx.emit_node(NodeKind::Variable, Some(name.clone()), node_range(&declarator), scope_owner, metadata);
        ctx.contains(scope_owner, id);
        ctx.defines(scope_owner, id);
        ctx.define_symbol(name, id);

        if let Some(value) = field(&declarator, "value") {
            let mut visitor = CSharpVisitor;
            walk_node(&mut visitor, ctx, value, source);
        }
    }
}

fn handle_block<S: GraphStore>(visitor: &mut CSharpVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let scope_owner = ctx.current_scope_owner();
    let id = ctx.emit_node(NodeKind::Block, None, node_range(&node), scope_owner, Metadata::new());
    ctx.contains(scope_owner, id);
    ctx.scopes.push_scope(id);
    walk_children(visitor, ctx, node, source);
    let _ = ctx.scopes.pop_scope();
}

fn handle_conditional<S: GraphStore>(visitor: &mut CSharpVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let scope_owner = ctx.current_scope_owner();
    let id = ctx.emit_node(NodeKind::Conditional, None, node_range(&node), scope_owner, Metadata::new());
    ctx.contains(scope_owner, id);
    ctx.scopes.push_scope(id);
    walk_children(visitor, ctx, node, source);
    let _ = ctx.scopes.pop_scope();
}

fn handle_loop<S: GraphStore>(visitor: &mut CSharpVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let scope_owner = ctx.current_scope_owner();
    let id = ctx.emit_node(NodeKind::Loop, None, node_range(&node), scope_owner, Metadata::new());
    ctx.contains(scope_owner, id);
    ctx.scopes.push_scope(id);
    walk_children(visitor, ctx, node, source);
    let _ = ctx.scopes.pop_scope();
}

/// A chained `a.b().c()` invocation visits the callee chain before emitting
/// its own call node, so the inner calls appear first (spec §4.3.5's
/// "evaluation-order" note, mirrored from the Java visitor's call handling).
fn handle_call_chain<S: GraphStore>(visitor: &mut CSharpVisitor, ctx: &mut TranslationCtx<'_, S>, node: &TsNode<'_>, source: &[u8]) {
    let is_ctor = node.kind() == "object_creation_expression";

    if let Some(func) = field(node, "function") {
        if func.kind() == "member_access_expression" {
            if let Some(expr) = field(&func, "expression") {
                walk_node(visitor, ctx, expr, source);
            }
        }
    }

    let name = if is_ctor {
        field(node, "type").map(|n| text(&n, source).to_string())
    } else {
        field(node, "function").map(|f| {
            if f.kind() == "member_access_expression" {
                field(&f, "name").map(|n| text(&n, source).to_string()).unwrap_or_else(|| text(&f, source).to_string())
            } else {
                text(&f, source).to_string()
            }
        })
    }
    .or_else(|| first_identifier_like(node).map(|n| text(&n, source).to_string()))
    .unwrap_or_else(|| format!("__unnamed_call__{}", node.start_position().row + 1));

    let scope_owner = ctx.current_scope_owner();
    let mut metadata = Metadata::new();
    metadata.insert("is_constructor".to_string(), MetadataValue::Bool(is_ctor));
    metadata.insert("external".to_string(), MetadataValue::Bool(false));
    let id = ctx.emit_node(NodeKind::FunctionCall, Some(name), node_range(node), scope_owner, metadata);
    ctx.contains(scope_owner, id);

    if let Some(args) = field(node, "arguments") {
        walk_children(visitor, ctx, args, source);
    }
}

fn handle_assignment<S: GraphStore>(visitor: &mut CSharpVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    if let Some(right) = field(&node, "right") {
        collect_rhs_references(ctx, &right, source);
        walk_node(visitor, ctx, right, source);
    }

    let scope_idx = ctx.scopes.current().unwrap();
    if let Some(left) = field(&node, "left") {
        if left.kind() == "identifier" {
            let name = text(&left, source).to_string();
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
