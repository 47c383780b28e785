//! The translator (spec §4.3): one full walk of a file's syntax tree, emitting
//! AST-level nodes and in-file relations while maintaining a scope stack.
//!
//! Per the design note on language-specific visitors, each language gets its
//! own module implementing [`Visitor`] rather than one function with a mega
//! switch over every language's node kinds.

pub mod context;
pub mod scope;

pub mod csharp;
pub mod ecma;
pub mod go;
pub mod java;
pub mod python;

use codegraph_core::config::Language;
use codegraph_core::id::IdGenerator;
use codegraph_core::store::GraphStore;
use codegraph_core::types::CoreError;
use codegraph_core::writer::GraphWriter;
use tree_sitter::Node as TsNode;

use crate::adapter::ParserAdapter;
use context::TranslationCtx;

/// A per-language visitor: the translator selects one on entry (spec §4.3.3)
/// and it owns the handler dispatch for that language's syntax kinds for the
/// rest of the file's walk. Handlers are pure dispatch; `TranslationCtx` holds
/// all the state.
pub trait Visitor<S: GraphStore> {
    /// Handle `node`; return `true` if this visitor recognised the kind (and
    /// so already recursed into whichever children it cares about), or
    /// `false` to fall through to the default recursive traversal (spec
    /// §4.3.3 "any unrecognised kind falls through to recursive traversal").
    fn visit(&mut self, ctx: &mut TranslationCtx<'_, S>, node: TsNode<'_>, source: &[u8]) -> bool;
}

/// Walk every named child of `node` with the default (non-dispatched)
/// traversal, used both as the top-level driver and as visitors' fallback.
pub fn walk_children<S: GraphStore, V: Visitor<S>>(
    visitor: &mut V,
    ctx: &mut TranslationCtx<'_, S>,
    node: TsNode<'_>,
    source: &[u8],
) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_node(visitor, ctx, child, source);
    }
}

pub fn walk_node<S: GraphStore, V: Visitor<S>>(
    visitor: &mut V,
    ctx: &mut TranslationCtx<'_, S>,
    node: TsNode<'_>,
    source: &[u8],
) {
    if !visitor.visit(ctx, node, source) {
        walk_children(visitor, ctx, node, source);
    }
}

/// Translate one file: parse, select the language visitor, and walk (spec §4.3).
pub fn translate_file<S: GraphStore>(
    language: Language,
    file_path: &str,
    source: &[u8],
    file_id: u32,
    version: u32,
    ids: &IdGenerator,
    writer: &GraphWriter<S>,
) -> Result<(), CoreError> {
    let mut adapter = ParserAdapter::for_language(language)
        .map_err(|e| CoreError::ParseFailure { path: file_path.to_string(), reason: e.to_string() })?;
    let tree = adapter
        .parse(source)
        .map_err(|e| CoreError::ParseFailure { path: file_path.to_string(), reason: e.to_string() })?;

    let mut ctx = TranslationCtx::new(file_id, version, language.as_str(), file_path.to_string(), ids, writer);
    let root_range = crate::adapter::node_range(&tree.root_node());
    let file_scope_id = crate::translator::context::emit_file_scope(&mut ctx, file_path, language.as_str(), root_range);

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        dispatch_root(language, &mut ctx, tree.root_node(), source, file_scope_id);
    }));
    if result.is_err() {
        return Err(CoreError::TranslateFailure {
            path: file_path.to_string(),
            range: None,
            reason: "visitor panicked while walking the syntax tree".to_string(),
        });
    }

    ctx.flush();
    Ok(())
}

fn dispatch_root<S: GraphStore>(
    language: Language,
    ctx: &mut TranslationCtx<'_, S>,
    root: TsNode<'_>,
    source: &[u8],
    file_scope_id: u64,
) {
    let _ = file_scope_id;
    match language {
        Language::Java => {
            let mut visitor = java::JavaVisitor;
            walk_children(&mut visitor, ctx, root, source);
        }
        Language::CSharp => {
            let mut visitor = csharp::CSharpVisitor;
            walk_children(&mut visitor, ctx, root, source);
        }
        Language::Python => {
            let mut visitor = python::PythonVisitor;
            walk_children(&mut visitor, ctx, root, source);
        }
        Language::Go => {
            let mut visitor = go::GoVisitor;
            walk_children(&mut visitor, ctx, root, source);
        }
        Language::TypeScript | Language::JavaScript => {
            let mut visitor = ecma::EcmaVisitor;
            walk_children(&mut visitor, ctx, root, source);
        }
    }
}
