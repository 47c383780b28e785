//! Go visitor (spec §4.3.4, §4.5.4). Struct types are emitted as `Class`
//! nodes at translation time without their methods — methods declared with a
//! receiver are translated as ordinary top-level `Function` nodes carrying a
//! `receiver_type` metadata key. The post-processor's "fake class" fix-up
//! (spec §4.5.4) later adds the CONTAINS edges from the struct's Class node to
//! each matching method, since `scope_id` is immutable once a node is
//! created (spec §3.4) but an additional relation is not.

use codegraph_core::store::GraphStore;
use codegraph_core::types::{Metadata, MetadataValue, NodeKind};
use tree_sitter::Node as TsNode;

use crate::adapter::{field, first_identifier_like, named_children, node_range, text};
use crate::translator::context::{str_meta, TranslationCtx};
use crate::translator::{walk_children, walk_node, Visitor};

pub struct GoVisitor;

impl<S: GraphStore> Visitor<S> for GoVisitor {
    fn visit(&mut self, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) -> bool {
        match node.kind() {
            "package_clause" => {
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
                for spec in collect_import_specs(&node) {
                    let target = field(&spec, "path").map(|n| text(&n, source).trim_matches('"').to_string()).unwrap_or_default();
                    let mut md = Metadata::new();
                    md.insert("target".to_string(), str_meta(target));
                    let scope_owner = ctx.current_scope_owner();
                    let id = ctx.emit_node(NodeKind::Import, None, node_range(&spec), scope_owner, md);
                    ctx.contains(scope_owner, id);
                }
                true
            }
            "type_declaration" => {
                handle_type_declaration(ctx, node, source);
                true
            }
            "function_declaration" => {
                handle_function(ctx, node, source, None);
                true
            }
            "method_declaration" => {
                let receiver_type = field(&node, "receiver")
                    .and_then(|r| named_children(&r).next())
                    .and_then(|param| field(&param, "type").or_else(|| named_children(&param).last()))
                    .map(|t| text(&t, source).trim_start_matches('*').to_string());
                handle_function(ctx, node, source, receiver_type);
                true
            }
            "block" => {
                handle_block(self, ctx, node, source);
                true
            }
            "if_statement" => {
                handle_conditional(self, ctx, node, source);
                true
            }
            "for_statement" => {
                handle_loop(self, ctx, node, source);
                true
            }
            "call_expression" => {
                handle_call(ctx, &node, source);
                true
            }
            "assignment_statement" | "short_var_declaration" => {
                handle_assignment(ctx, node, source);
                true
            }
            _ => false,
        }
    }
}

fn collect_import_specs<'a>(node: &'a TsNode<'a>) -> Vec<TsNode<'a>> {
    named_children(node)
        .flat_map(|c| {
            if c.kind() == "import_spec_list" {
                named_children(&c).collect::<Vec<_>>()
            } else {
                vec![c]
            }
        })
        .filter(|c| c.kind() == "import_spec")
        .collect()
}

fn handle_type_declaration<S: GraphStore>(ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    for spec in named_children(&node).filter(|c| c.kind() == "type_spec") {
        let name = field(&spec, "name").map(|n| text(&n, source).to_string());
        let underlying = field(&spec, "type");
        let is_interface = underlying.as_ref().is_some_and(|t| t.kind() == "interface_type");

        let scope_owner = ctx.current_scope_owner();
        let mut metadata = Metadata::new();
        metadata.insert("is_interface".to_string(), MetadataValue::Bool(is_interface));
        metadata.insert("is_enum".to_string(), MetadataValue::Bool(false));
        metadata.insert("is_record".to_string(), MetadataValue::Bool(false));

        let id = ctx.emit_node(NodeKind::Class, name.clone(), node_range(&spec), scope_owner, metadata);
        ctx.contains(scope_owner, id);
        ctx.defines(scope_owner, id);
        if let Some(n) = &name {
            ctx.define_symbol(n.clone(), id);
        }

        if let Some(struct_type) = underlying.filter(|t| t.kind() == "struct_type") {
            for field_decl in named_children(&struct_type).filter(|c| c.kind() == "field_declaration") {
                let field_type = field(&field_decl, "type").map(|n| text(&n, source).to_string());
                for name_node in named_children(&field_decl).filter(|c| c.kind() == "field_identifier") {
                    let field_name = text(&name_node, source).to_string();
                    let mut fmeta = Metadata::new();
                    if let Some(t) = &field_type {
                        fmeta.insert("type".to_string(), str_meta(t.clone()));
                    }
                    let fid = ctx.emit_node(NodeKind::Field, Some(field_name), node_range(&name_node), id, fmeta);
                    ctx.contains(id, fid);
                    ctx.defines(id, fid);
                }
            }
        }
    }
}

fn handle_function<S: GraphStore>(
    ctx: &mut TranslationCtx<'_, S>,
    node: TsNode<'_>,
    source: &[u8],
    receiver_type: Option<String>,
) {
    let name = field(&node, "name").map(|n| text(&n, source).to_string());
    let scope_owner = ctx.current_scope_owner();

    let params = field(&node, "parameters").map(|n| text(&n, source).to_string()).unwrap_or_default();
    let mut metadata = Metadata::new();
    metadata.insert("signature".to_string(), str_meta(format!("{}{params}", name.clone().unwrap_or_default())));
    metadata.insert("is_constructor".to_string(), MetadataValue::Bool(false));
    if let Some(rt) = &receiver_type {
        metadata.insert("receiver_type".to_string(), str_meta(rt.clone()));
    }

    let id = ctx.emit_node(NodeKind::Function, name.clone(), node_range(&node), scope_owner, metadata);
    ctx.contains(scope_owner, id);
    ctx.defines(scope_owner, id);
    let symbol_name = match (&receiver_type, &name) {
        (Some(rt), Some(n)) => format!("{rt}.{n}"),
        (_, Some(n)) => n.clone(),
        _ => return,
    };
    ctx.define_symbol(symbol_name, id);

    ctx.scopes.push_scope(id);
    ctx.enclosing_function.push(id);
    if let Some(body) = field(&node, "body") {
        let mut visitor = GoVisitor;
        walk_children(&mut visitor, ctx, body, source);
    }
    ctx.enclosing_function.pop();
    let _ = ctx.scopes.pop_scope();
}

fn handle_block<S: GraphStore>(visitor: &mut GoVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let scope_owner = ctx.current_scope_owner();
    let id = ctx.emit_node(NodeKind::Block, None, node_range(&node), scope_owner, Metadata::new());
    ctx.contains(scope_owner, id);
    ctx.scopes.push_scope(id);
    walk_children(visitor, ctx, node, source);
    let _ = ctx.scopes.pop_scope();
}

fn handle_conditional<S: GraphStore>(visitor: &mut GoVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let scope_owner = ctx.current_scope_owner();
    let id = ctx.emit_node(NodeKind::Conditional, None, node_range(&node), scope_owner, Metadata::new());
    ctx.contains(scope_owner, id);
    ctx.scopes.push_scope(id);
    walk_children(visitor, ctx, node, source);
    let _ = ctx.scopes.pop_scope();
}

fn handle_loop<S: GraphStore>(visitor: &mut GoVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let scope_owner = ctx.current_scope_owner();
    let id = ctx.emit_node(NodeKind::Loop, None, node_range(&node), scope_owner, Metadata::new());
    ctx.contains(scope_owner, id);
    ctx.scopes.push_scope(id);
    walk_children(visitor, ctx, node, source);
    let _ = ctx.scopes.pop_scope();
}

fn handle_call<S: GraphStore>(ctx: &mut TranslationCtx<'_, S>, node: &TsNode<'_>, source: &[u8]) {
    if let Some(func) = field(node, "function") {
        if func.kind() == "selector_expression" {
            if let Some(operand) = field(&func, "operand") {
                let mut visitor = GoVisitor;
                walk_node(&mut visitor, ctx, operand, source);
            }
        }
    }

    let name = field(node, "function")
        .map(|f| {
            if f.kind() == "selector_expression" {
                let operand = field(&f, "operand").map(|n| text(&n, source).to_string()).unwrap_or_default();
                let field_name = field(&f, "field").map(|n| text(&n, source).to_string()).unwrap_or_default();
                format!("{operand}.{field_name}")
            } else {
                text(&f, source).to_string()
            }
        })
        .or_else(|| first_identifier_like(node).map(|n| text(&n, source).to_string()))
        .unwrap_or_else(|| format!("__unnamed_call__{}", node.start_position().row + 1));

    let scope_owner = ctx.current_scope_owner();
    let mut metadata = Metadata::new();
    metadata.insert("is_constructor".to_string(), MetadataValue::Bool(false));
    metadata.insert("external".to_string(), MetadataValue::Bool(false));
    let id = ctx.emit_node(NodeKind::FunctionCall, Some(name), node_range(node), scope_owner, metadata);
    ctx.contains(scope_owner, id);

    if let Some(args) = field(node, "arguments") {
        let mut visitor = GoVisitor;
        walk_children(&mut visitor, ctx, args, source);
    }
}

fn handle_assignment<S: GraphStore>(ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let mut children = named_children(&node);
    let left = children.next();
    let right = children.last();

    if let Some(right) = &right {
        collect_rhs_references(ctx, right, source);
        let mut visitor = GoVisitor;
        walk_node(&mut visitor, ctx, right.clone(), source);
    }

    let scope_idx = ctx.scopes.current().unwrap();
    if let Some(left) = left.filter(|l| l.kind() == "identifier" || l.kind() == "expression_list") {
        let names: Vec<String> = if left.kind() == "expression_list" {
            named_children(&left).filter(|c| c.kind() == "identifier").map(|n| text(&n, source).to_string()).collect()
        } else {
            vec![text(&left, source).to_string()]
        };
        for name in names {
            if !ctx.scopes.scope(scope_idx).has_local(&name) {
                let scope_owner = ctx.current_scope_owner();
                let id = ctx.emit_node(NodeKind::Variable, Some(name.clone()), node_range(&node), scope_owner, Metadata::new());
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
