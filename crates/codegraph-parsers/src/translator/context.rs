//! Per-file translation state (spec §4.3). One `TranslationCtx` is created per
//! file and discarded after the walk; the id generator and writer it borrows
//! are process-wide and owned by the dispatcher (spec §9: wrap global mutable
//! state in a single value passed explicitly, never a module-level singleton).

use codegraph_core::id::IdGenerator;
use codegraph_core::types::{Metadata, MetadataValue, Node, NodeKind, Range, Relation, RelationKind};
use codegraph_core::writer::GraphWriter;
use codegraph_core::store::GraphStore;

use super::scope::{ScopeStack, Symbol};

pub struct TranslationCtx<'a, S: GraphStore> {
    pub file_id: u32,
    pub version: u32,
    pub language: &'static str,
    pub file_path: String,
    ids: &'a IdGenerator,
    writer: &'a GraphWriter<S>,
    pub scopes: ScopeStack,
    /// Function-scope nesting only, used to attribute USES/calls to the
    /// nearest enclosing function or block (spec §4.3.6).
    pub enclosing_function: Vec<u64>,
    relation_counter: u64,
}

impl<'a, S: GraphStore> TranslationCtx<'a, S> {
    pub fn new(
        file_id: u32,
        version: u32,
        language: &'static str,
        file_path: String,
        ids: &'a IdGenerator,
        writer: &'a GraphWriter<S>,
    ) -> Self {
        writer.initialize_file_buffers(file_id);
        Self {
            file_id,
            version,
            language,
            file_path,
            ids,
            writer,
            scopes: ScopeStack::new(),
            enclosing_function: Vec::new(),
            relation_counter: 0,
        }
    }

    /// Allocate a node id, build the node, enqueue it on the writer, and
    /// return its id. The node is not contained until a CONTAINS relation is
    /// emitted for it, but its id exists and may be referenced immediately
    /// (spec §5: "the translator emits a node before it emits any relation
    /// that names it as source or target").
    pub fn emit_node(
        &mut self,
        kind: NodeKind,
        name: Option<String>,
        range: Range,
        scope_id: u64,
        metadata: Metadata,
    ) -> u64 {
        let id = self.ids.next_id();
        let node = Node { id, kind, file_id: self.file_id, name, range, version: self.version, scope_id, metadata };
        self.writer.append_node(self.file_id, node);
        id
    }

    pub fn emit_relation(&mut self, source_id: u64, target_id: u64, kind: RelationKind) {
        self.emit_relation_with_meta(source_id, target_id, kind, Metadata::new());
    }

    pub fn emit_relation_with_meta(&mut self, source_id: u64, target_id: u64, kind: RelationKind, metadata: Metadata) {
        if source_id == target_id && kind == RelationKind::Contains {
            return; // no self-loops on CONTAINS (spec §3.3 invariant).
        }
        self.relation_counter += 1;
        let relation = Relation {
            id: self.ids.next_id(),
            source_id,
            target_id,
            kind,
            file_id: self.file_id,
            metadata,
        };
        self.writer.append_relation(self.file_id, relation);
    }

    pub fn contains(&mut self, scope_owner: u64, child: u64) {
        self.emit_relation(scope_owner, child, RelationKind::Contains);
    }

    pub fn defines(&mut self, scope_owner: u64, child: u64) {
        self.emit_relation(scope_owner, child, RelationKind::Defines);
    }

    pub fn uses(&mut self, from: u64, to: u64) {
        self.emit_relation(from, to, RelationKind::Uses);
    }

    pub fn define_symbol(&mut self, name: impl Into<String>, node_id: u64) {
        self.scopes.define_in_current(name, Symbol::new(node_id));
    }

    pub fn current_scope_owner(&self) -> u64 {
        self.scopes.current_owner_node_id().unwrap_or(0)
    }

    /// Flush this file's node and relation buffers (spec §4.4 / §4.5.5:
    /// TRANSLATED means "emitted+flushed").
    pub fn flush(&self) {
        if let Err(e) = self.writer.flush(Some(self.file_id)) {
            eprintln!("codegraph: warning: flush failed for file {}: {e}", self.file_id);
        }
    }
}

/// Create the root `FileScope` node and push it as the translator's root
/// scope (spec §4.3.4 "File / module root"). Every other node in the file is
/// CONTAINS-reachable from this one.
pub fn emit_file_scope<S: GraphStore>(
    ctx: &mut TranslationCtx<'_, S>,
    file_path: &str,
    language: &str,
    root_range: Range,
) -> u64 {
    let mut metadata = Metadata::new();
    metadata.insert("path".to_string(), str_meta(file_path));
    metadata.insert("language".to_string(), str_meta(language));
    let id = ctx.emit_node(NodeKind::FileScope, None, root_range, 0, metadata);
    ctx.scopes.push_scope(id);
    id
}

pub fn str_meta(s: impl Into<String>) -> MetadataValue {
    MetadataValue::Str(s.into())
}

pub fn list_meta(items: Vec<String>) -> MetadataValue {
    MetadataValue::List(items.into_iter().map(MetadataValue::Str).collect())
}
