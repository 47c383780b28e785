//! TypeScript/JavaScript visitor (spec §4.3.4). Both grammars share enough
//! node-kind names (tree-sitter-typescript is a superset grammar covering
//! plain JS too) that one visitor handles both entries in `dispatch_root`.
//! Classes are optional in this family — top-level `function` declarations
//! and arrow functions assigned to `const` are just as common as methods.

use codegraph_core::store::GraphStore;
use codegraph_core::types::{Metadata, MetadataValue, NodeKind};
use tree_sitter::Node as TsNode;

use crate::adapter::{field, first_identifier_like, named_children, node_range, text};
use crate::translator::context::{list_meta, str_meta, TranslationCtx};
use crate::translator::{walk_children, walk_node, Visitor};

pub struct EcmaVisitor;

impl<S: GraphStore> Visitor<S> for EcmaVisitor {
    fn visit(&mut self, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) -> bool {
        match node.kind() {
            "import_statement" => {
                let target = field(&node, "source").map(|n| text(&n, source).trim_matches('"').trim_matches('\'').to_string());
                let mut md = Metadata::new();
                if let Some(t) = target {
                    md.insert("target".to_string(), str_meta(t));
                }
                let scope_owner = ctx.current_scope_owner();
                let id = ctx.emit_node(NodeKind::Import, None, node_range(&node), scope_owner, md);
                ctx.contains(scope_owner, id);
                true
            }
            "class_declaration" | "class" => {
                handle_class(self, ctx, node, source);
                true
            }
            "function_declaration" | "method_definition" | "function_expression" => {
                handle_named_function(self, ctx, node, source);
                true
            }
            "arrow_function" => {
                handle_arrow_function(self, ctx, node, source, None);
                true
            }
            "public_field_definition" | "field_definition" => {
                handle_field(ctx, node, source);
                true
            }
            "statement_block" => {
                handle_block(self, ctx, node, source);
                true
            }
            "if_statement" | "switch_statement" => {
                handle_conditional(self, ctx, node, source);
                true
            }
            "for_statement" | "for_in_statement" | "while_statement" | "do_statement" => {
                handle_loop(self, ctx, node, source);
                true
            }
            "call_expression" | "new_expression" => {
                handle_call_chain(self, ctx, &node, source);
                true
            }
            "assignment_expression" => {
                handle_assignment(self, ctx, node, source);
                true
            }
            "variable_declarator" => {
                handle_variable_declarator(self, ctx, node, source);
                true
            }
            _ => false,
        }
    }
}

fn decorators_metadata(node: &TsNode<'_>, source: &[u8]) -> Vec<String> {
    named_children(node)
        .filter(|c| c.kind() == "decorator")
        .map(|d| text(&d, source).trim_start_matches('@').to_string())
        .collect()
}

fn handle_class<S: GraphStore>(visitor: &mut EcmaVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let name = field(&node, "name").map(|n| text(&n, source).to_string());
    let scope_owner = ctx.current_scope_owner();

    let mut bases = Vec::new();
    if let Some(heritage) = named_children(&node).find(|c| c.kind() == "class_heritage") {
        bases.extend(named_children(&heritage).map(|t| text(&t, source).to_string()));
    }

    let mut metadata = Metadata::new();
    metadata.insert("is_interface".to_string(), MetadataValue::Bool(false));
    metadata.insert("is_enum".to_string(), MetadataValue::Bool(false));
    metadata.insert("is_record".to_string(), MetadataValue::Bool(false));
    if !bases.is_empty() {
        metadata.insert("extends".to_string(), list_meta(bases));
    }
    let decorators = decorators_metadata(&node, source);
    if !decorators.is_empty() {
        metadata.insert("attributes".to_string(), list_meta(decorators));
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

fn handle_named_function<S: GraphStore>(visitor: &mut EcmaVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let line = node.start_position().row + 1;
    let name = field(&node, "name")
        .map(|n| text(&n, source).to_string())
        .unwrap_or_else(|| format!("__anonymous__{line}"));
    let is_constructor = name == "constructor";

    let scope_owner = ctx.current_scope_owner();
    let params = field(&node, "parameters").map(|n| text(&n, source).to_string()).unwrap_or_default();
    let mut metadata = Metadata::new();
    metadata.insert("signature".to_string(), str_meta(format!("{name}{params}")));
    metadata.insert("is_constructor".to_string(), MetadataValue::Bool(is_constructor));
    let decorators = decorators_metadata(&node, source);
    if !decorators.is_empty() {
        metadata.insert("attributes".to_string(), list_meta(decorators));
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

/// An arrow function has no `name` field of its own; when it is the RHS of a
/// `const`/`let` binding or a field initializer, the caller passes the bound
/// name down so the emitted node reads naturally in the graph (matching how
/// the Python visitor synthesizes names only for genuinely anonymous lambdas).
fn handle_arrow_function<S: GraphStore>(
    visitor: &mut EcmaVisitor,
    ctx: &mut TranslationCtx<'_, S>,
    node: TsNode<'_>,
    source: &[u8],
    bound_name: Option<String>,
) {
    let line = node.start_position().row + 1;
    let name = bound_name.unwrap_or_else(|| format!("__lambda__{line}"));
    let scope_owner = ctx.current_scope_owner();

    let params = field(&node, "parameters")
        .or_else(|| field(&node, "parameter"))
        .map(|n| text(&n, source).to_string())
        .unwrap_or_default();
    let mut metadata = Metadata::new();
    metadata.insert("signature".to_string(), str_meta(format!("{name}({params})")));
    metadata.insert("is_constructor".to_string(), MetadataValue::Bool(false));

    let id = ctx.emit_node(NodeKind::Function, Some(name.clone()), node_range(&node), scope_owner, metadata);
    ctx.contains(scope_owner, id);
    ctx.defines(scope_owner, id);
    ctx.define_symbol(name, id);

    ctx.scopes.push_scope(id);
    ctx.enclosing_function.push(id);
    if let Some(body) = field(&node, "body") {
        walk_node(visitor, ctx, body, source);
    }
    ctx.enclosing_function.pop();
    let _ = ctx.scopes.pop_scope();
}

fn handle_field<S: GraphStore>(ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let name = field(&node, "property").or_else(|| field(&node, "name")).map(|n| text(&n, source).to_string());
    let scope_owner = ctx.current_scope_owner();
    if let Some(name) = name {
        let decorators = decorators_metadata(&node, source);
        let mut metadata = Metadata::new();
        if !decorators.is_empty() {
            metadata.insert("attributes".to_string(), list_meta(decorators));
        }
        let id = ctx.emit_node(NodeKind::Field, Some(name.clone()), node_range(&node), scope_owner, metadata);
        ctx.contains(scope_owner, id);
        ctx.defines(scope_owner, id);
        ctx.define_symbol(name, id);
    }
}

fn handle_block<S: GraphStore>(visitor: &mut EcmaVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let scope_owner = ctx.current_scope_owner();
    let id = ctx.emit_node(NodeKind::Block, None, node_range(&node), scope_owner, Metadata::new());
    ctx.contains(scope_owner, id);
    ctx.scopes.push_scope(id);
    walk_children(visitor, ctx, node, source);
    let _ = ctx.scopes.pop_scope();
}

fn handle_conditional<S: GraphStore>(visitor: &mut EcmaVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let scope_owner = ctx.current_scope_owner();
    let id = ctx.emit_node(NodeKind::Conditional, None, node_range(&node), scope_owner, Metadata::new());
    ctx.contains(scope_owner, id);
    ctx.scopes.push_scope(id);
    walk_children(visitor, ctx, node, source);
    let _ = ctx.scopes.pop_scope();
}

fn handle_loop<S: GraphStore>(visitor: &mut EcmaVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let scope_owner = ctx.current_scope_owner();
    let id = ctx.emit_node(NodeKind::Loop, None, node_range(&node), scope_owner, Metadata::new());
    ctx.contains(scope_owner, id);
    ctx.scopes.push_scope(id);
    walk_children(visitor, ctx, node, source);
    let _ = ctx.scopes.pop_scope();
}

fn handle_call_chain<S: GraphStore>(visitor: &mut EcmaVisitor, ctx: &mut TranslationCtx<'_, S>, node: &TsNode<'_>, source: &[u8]) {
    let is_new = node.kind() == "new_expression";

    if let Some(func) = field(node, "function").or_else(|| field(node, "constructor")) {
        if func.kind() == "member_expression" {
            if let Some(obj) = field(&func, "object") {
                walk_node(visitor, ctx, obj, source);
            }
        } else {
            walk_node(visitor, ctx, func, source);
        }
    }

    let name = field(node, "function")
        .or_else(|| field(node, "constructor"))
        .map(|f| {
            if f.kind() == "member_expression" {
                field(&f, "property").map(|p| text(&p, source).to_string()).unwrap_or_else(|| text(&f, source).to_string())
            } else {
                text(&f, source).to_string()
            }
        })
        .or_else(|| first_identifier_like(node).map(|n| text(&n, source).to_string()))
        .unwrap_or_else(|| format!("__unnamed_call__{}", node.start_position().row + 1));

    let scope_owner = ctx.current_scope_owner();
    let mut metadata = Metadata::new();
    metadata.insert("is_constructor".to_string(), MetadataValue::Bool(is_new));
    metadata.insert("external".to_string(), MetadataValue::Bool(false));
    let id = ctx.emit_node(NodeKind::FunctionCall, Some(name), node_range(node), scope_owner, metadata);
    ctx.contains(scope_owner, id);

    if let Some(args) = field(node, "arguments") {
        walk_children(visitor, ctx, args, source);
    }
}

fn handle_variable_declarator<S: GraphStore>(visitor: &mut EcmaVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
    let name_node = field(&node, "name");
    let name = name_node.as_ref().map(|n| text(n, source).to_string());
    let value = field(&node, "value");

    // An arrow function bound directly to a name (`const f = () => ...`)
    // becomes a Function node named after the binding, not a Variable.
    if let (Some(name), Some(value)) = (&name, &value) {
        if value.kind() == "arrow_function" || value.kind() == "function_expression" {
            handle_arrow_function(visitor, ctx, *value, source, Some(name.clone()));
            return;
        }
    }

    if let Some(value) = &value {
        collect_rhs_references(ctx, value, source);
        walk_node(visitor, ctx, value.clone(), source);
    }

    if let (Some(name), Some(name_node)) = (&name, &name_node) {
        let scope_idx = ctx.scopes.current().unwrap();
        if !ctx.scopes.scope(scope_idx).has_local(name) {
            let scope_owner = ctx.current_scope_owner();
            let id = ctx.emit_node(NodeKind::Variable, Some(name.clone()), node_range(name_node), scope_owner, Metadata::new());
            ctx.contains(scope_owner, id);
            ctx.defines(scope_owner, id);
            ctx.define_symbol(name.clone(), id);
        }

        let refs = ctx.scopes.scope_mut(scope_idx).take_rhs_references();
        if let Some(&enclosing) = ctx.enclosing_function.last() {
            for ref_name in refs {
                if let Some(sym) = ctx.scopes.resolve(&ref_name) {
                    let target = sym.node_id;
                    ctx.uses(enclosing, target);
                }
            }
        }
    }
}

fn handle_assignment<S: GraphStore>(visitor: &mut EcmaVisitor, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) {
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
