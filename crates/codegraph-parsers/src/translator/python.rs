//! Python visitor (spec §4.3.4, scenario E: module vs. function scope
//! shadowing). Decorators are parsed but mapped the same way as Java
//! annotations, per spec §9's open question on decorator handling.

use codegraph_core::store::GraphStore;
use codegraph_core::types::{Metadata, MetadataValue, NodeKind};
use tree_sitter::Node as TsNode;

use crate::adapter::{field, first_identifier_like, named_children, node_range, text};
use crate::translator::context::{str_meta, TranslationCtx};
use crate::translator::{walk_children, walk_node, Visitor};

pub struct PythonVisitor;

impl<S: GraphStore> Visitor<S> for PythonVisitor {
    fn visit(&mut self, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) -> bool {
        match node.kind() {
            "import_statement" | "import_from_statement" => {
                let target = text(&node, source).to_string();
                let mut md = Metadata::new();
                md.insert("target".to_string(), str_meta(target));
                let scope_owner = ctx.current_scope_owner();
                let id = ctx.emit_node(NodeKind::Import, None, node_range(&node), scope_owner, md);
                ctx.contains(scope_owner, id);
                true
            }
            "class_definition" => {
                handle_class(ctx, node, source);
                true
            }
            "function_definition" | "lambda" => {
                handle_function(ctx, node, source);
                true
            }
            "block" => {
                // Python's "block" node is the body of a compound statement —
                // it does not get its own Block graph node (the owning
                // construct, e.g. Function/Conditional/Loop, already has one
                // scope); just keep walking in the current scope.
                walk_children(self, ctx, node, source);
                true
            }
            "if_statement" => {
                handle_conditional(self, ctx, node, source);
                true
            }
            "for_statement" | "while_statement" => {
                handle_loop(self, ctx, node, source);
                true
            }
            "call" => {
                handle_call(ctx, &node, source);
                true
            }
            "assignment" | "augmented_assignment" => {
                handle_assignment(ctx, node, source);
                true
            }
            "return_statement" => {
                for child in named_children(&node) {
                    resolve_and_use(ctx, &child, source);
                }
                true
            }
            _ => false,
        }
    }
}

fn handle_class<S: GraphStore>(ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let name = field(&node, "name").map(|n| text(&n, source).to_string());
    let scope_owner = ctx.current_scope_owner();

    let bases: Vec<String> = field(&node, "superclasses")
        .map(|n| named_children(&n).map(|t| text(&t, source).to_string()).collect())
        .unwrap_or_default();
    let mut metadata = Metadata::new();
    if !bases.is_empty() {
        metadata.insert("extends".to_string(), crate::translator::context::list_meta(bases));
    }

    let id = ctx.emit_node(NodeKind::Class, name.clone(), node_range(&node), scope_owner, metadata);
    ctx.contains(scope_owner, id);
    ctx.defines(scope_owner, id);
    if let Some(n) = &name {
        ctx.define_symbol(n.clone(), id);
    }

    ctx.scopes.push_scope(id);
    if let Some(body) = field(&node, "body") {
        let mut visitor = PythonVisitor;
        walk_children(&mut visitor, ctx, body, source);
    }
    let _ = ctx.scopes.pop_scope();
}

fn handle_function<S: GraphStore>(ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let line = node.start_position().row + 1;
    let name = field(&node, "name")
        .map(|n| text(&n, source).to_string())
        .unwrap_or_else(|| format!("__lambda__{line}"));
    let scope_owner = ctx.current_scope_owner();

    let params = field(&node, "parameters").map(|n| text(&n, source).to_string()).unwrap_or_default();
    let mut metadata = Metadata::new();
    metadata.insert("signature".to_string(), str_meta(format!("{name}{params}")));
    metadata.insert("is_constructor".to_string(), MetadataValue::Bool(name == "__init__"));

    let id = ctx.emit_node(NodeKind::Function, Some(name.clone()), node_range(&node), scope_owner, metadata);
    ctx.contains(scope_owner, id);
    ctx.defines(scope_owner, id);
    ctx.define_symbol(name, id);

    ctx.scopes.push_scope(id);
    ctx.enclosing_function.push(id);
    if let Some(body) = field(&node, "body") {
        let mut visitor = PythonVisitor;
        walk_children(&mut visitor, ctx, body, source);
    } else if node.kind() == "lambda" {
        if let Some(body) = node.child_by_field_name("body") {
            let mut visitor = PythonVisitor;
            walk_node(&mut visitor, ctx, body, source);
        }
    }
    ctx.enclosing_function.pop();
    let _ = ctx.scopes.pop_scope();
}

fn handle_conditional<S: GraphStore>(visitor: &mut PythonVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let scope_owner = ctx.current_scope_owner();
    let id = ctx.emit_node(NodeKind::Conditional, None, node_range(&node), scope_owner, Metadata::new());
    ctx.contains(scope_owner, id);
    ctx.scopes.push_scope(id);
    walk_children(visitor, ctx, node, source);
    let _ = ctx.scopes.pop_scope();
}

fn handle_loop<S: GraphStore>(visitor: &mut PythonVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let scope_owner = ctx.current_scope_owner();
    let id = ctx.emit_node(NodeKind::Loop, None, node_range(&node), scope_owner, Metadata::new());
    ctx.contains(scope_owner, id);
    ctx.scopes.push_scope(id);
    walk_children(visitor, ctx, node, source);
    let _ = ctx.scopes.pop_scope();
}

fn handle_call<S: GraphStore>(ctx: &mut TranslationCtx<'_, S>, node: &TsNode<'_>, source: &[u8]) {
    if let Some(func) = field(node, "function") {
        if func.kind() == "attribute" {
            if let Some(obj) = field(&func, "object") {
                let mut visitor = PythonVisitor;
                walk_node(&mut visitor, ctx, obj, source);
            }
        }
    }

    let name = field(node, "function")
        .map(|f| {
            if f.kind() == "attribute" {
                field(&f, "attribute").map(|a| text(&a, source).to_string())
            } else {
                Some(text(&f, source).to_string())
            }
        })
        .flatten()
        .or_else(|| first_identifier_like(node).map(|n| text(&n, source).to_string()))
        .unwrap_or_else(|| format!("__unnamed_call__{}", node.start_position().row + 1));

    let scope_owner = ctx.current_scope_owner();
    let mut metadata = Metadata::new();
    metadata.insert("is_constructor".to_string(), MetadataValue::Bool(name.chars().next().is_some_and(|c| c.is_uppercase())));
    metadata.insert("external".to_string(), MetadataValue::Bool(false));
    let id = ctx.emit_node(NodeKind::FunctionCall, Some(name), node_range(node), scope_owner, metadata);
    ctx.contains(scope_owner, id);

    if let Some(args) = field(node, "arguments") {
        let mut visitor = PythonVisitor;
        walk_children(&mut visitor, ctx, args, source);
    }
}

fn handle_assignment<S: GraphStore>(ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    if let Some(right) = field(&node, "right") {
        collect_rhs_references(ctx, &right, source);
        let mut visitor = PythonVisitor;
        walk_node(&mut visitor, ctx, right, source);
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
    let container = ctx.enclosing_function.last().copied().unwrap_or_else(|| ctx.current_scope_owner());
    for name in refs {
        // `resolve` walks the scope stack top to bottom, so the function-local
        // `x` always wins over the module-level `x` when both exist —
        // this is exactly scenario E's shadowing requirement.
        if let Some(sym) = ctx.scopes.resolve(&name) {
            let target = sym.node_id;
            ctx.uses(container, target);
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

/// Resolve a bare identifier reference (e.g. in a `return` expression) and
/// emit USES from the nearest enclosing function to whatever it resolves to.
fn resolve_and_use<S: GraphStore>(ctx: &mut TranslationCtx<'_, S>, node: &TsNode<'_>, source: &[u8]) {
    if node.kind() == "identifier" {
        let name = text(node, source).to_string();
        if let Some(sym) = ctx.scopes.resolve(&name) {
            let target = sym.node_id;
            let container = ctx.enclosing_function.last().copied().unwrap_or_else(|| ctx.current_scope_owner());
            ctx.uses(container, target);
        }
        return;
    }
    for child in named_children(node) {
        resolve_and_use(ctx, &child, source);
    }
}
