//! Buffered graph writer (spec §4.4).
//!
//! Maintains a per-`file_id` pair of buffers, guarded by a per-file lock, with
//! the map of buffers itself guarded by a coarser lock (spec §5 "shared
//! resources"). `flush` always writes nodes before relations in the same call,
//! enforcing the ordering invariant mechanically rather than relying on
//! callers to sequence it correctly.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::store::GraphStore;
use crate::types::{CoreError, Node, Relation};

struct FileBuffers {
    nodes: Mutex<Vec<Node>>,
    relations: Mutex<Vec<Relation>>,
}

impl FileBuffers {
    fn new() -> Self {
        Self { nodes: Mutex::new(Vec::new()), relations: Mutex::new(Vec::new()) }
    }
}

pub struct GraphWriter<S: GraphStore> {
    store: Mutex<S>,
    buffers: Mutex<HashMap<u32, FileBuffers>>,
    node_batch_size: usize,
    relation_batch_size: usize,
}

impl<S: GraphStore> GraphWriter<S> {
    pub fn new(store: S, node_batch_size: usize, relation_batch_size: usize) -> Self {
        Self {
            store: Mutex::new(store),
            buffers: Mutex::new(HashMap::new()),
            node_batch_size,
            relation_batch_size,
        }
    }

    /// Idempotent: calling this more than once for the same `file_id` is a no-op.
    pub fn initialize_file_buffers(&self, file_id: u32) {
        self.buffers.lock().unwrap().entry(file_id).or_insert_with(FileBuffers::new);
    }

    pub fn append_node(&self, file_id: u32, node: Node) {
        self.initialize_file_buffers(file_id);
        let buffers = self.buffers.lock().unwrap();
        buffers[&file_id].nodes.lock().unwrap().push(node);
    }

    pub fn append_relation(&self, file_id: u32, relation: Relation) {
        self.initialize_file_buffers(file_id);
        let buffers = self.buffers.lock().unwrap();
        buffers[&file_id].relations.lock().unwrap().push(relation);
    }

    /// Flush buffered nodes for one file, or every file if `file_id` is `None`.
    pub fn flush_nodes(&self, file_id: Option<u32>) -> Result<(), CoreError> {
        let targets = self.target_file_ids(file_id);
        let buffers = self.buffers.lock().unwrap();
        for fid in targets {
            let Some(fb) = buffers.get(&fid) else { continue };
            let mut pending = fb.nodes.lock().unwrap();
            if pending.is_empty() {
                continue;
            }
            let drained: Vec<Node> = pending.drain(..).collect();
            drop(pending);
            for batch in drained.chunks(self.node_batch_size.max(1)) {
                let mut store = self.store.lock().unwrap();
                if let Err(e) = store.batch_create_nodes(batch) {
                    eprintln!("codegraph: warning: node batch write failed for file {fid}: {e}");
                }
            }
        }
        Ok(())
    }

    /// Flush buffered relations for one file, or every file if `file_id` is `None`.
    pub fn flush_relations(&self, file_id: Option<u32>) -> Result<(), CoreError> {
        let targets = self.target_file_ids(file_id);
        let buffers = self.buffers.lock().unwrap();
        for fid in targets {
            let Some(fb) = buffers.get(&fid) else { continue };
            let mut pending = fb.relations.lock().unwrap();
            if pending.is_empty() {
                continue;
            }
            let drained: Vec<Relation> = pending.drain(..).collect();
            drop(pending);
            for batch in drained.chunks(self.relation_batch_size.max(1)) {
                let mut store = self.store.lock().unwrap();
                if let Err(e) = store.batch_create_relations(batch) {
                    eprintln!("codegraph: warning: relation batch write failed for file {fid}: {e}");
                }
            }
        }
        Ok(())
    }

    /// Orchestrated flush: all nodes precede any relation (spec §4.4, §5).
    pub fn flush(&self, file_id: Option<u32>) -> Result<(), CoreError> {
        self.flush_nodes(file_id)?;
        self.flush_relations(file_id)?;
        Ok(())
    }

    /// Force a flush then release the buffers for one file.
    pub fn cleanup_file_buffers(&self, file_id: u32) -> Result<(), CoreError> {
        self.flush(Some(file_id))?;
        self.buffers.lock().unwrap().remove(&file_id);
        Ok(())
    }

    pub fn with_store<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let store = self.store.lock().unwrap();
        f(&store)
    }

    pub fn with_store_mut<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut store = self.store.lock().unwrap();
        f(&mut store)
    }

    fn target_file_ids(&self, file_id: Option<u32>) -> Vec<u32> {
        match file_id {
            Some(id) => vec![id],
            None => self.buffers.lock().unwrap().keys().copied().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteGraphStore;
    use crate::types::{Metadata, NodeKind, Range, RelationKind};

    fn node(id: u64, kind: NodeKind, scope_id: u64, file_id: u32) -> Node {
        Node {
            id,
            kind,
            file_id,
            name: Some("n".into()),
            range: Range { start_line: 0, start_col: 0, end_line: 1, end_col: 0, start_byte: 0, end_byte: 1 },
            version: 1,
            scope_id,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn flush_writes_nodes_before_relations() {
        let writer = GraphWriter::new(SqliteGraphStore::in_memory().unwrap(), 10, 10);
        writer.append_node(1, node(1, NodeKind::FileScope, 0, 1));
        writer.append_node(1, node(2, NodeKind::Function, 1, 1));
        writer.append_relation(
            1,
            Relation { id: 1, source_id: 1, target_id: 2, kind: RelationKind::Contains, file_id: 1, metadata: Metadata::new() },
        );

        writer.flush(Some(1)).unwrap();

        let found = writer.with_store(|s| s.get_node_by_id(2));
        assert!(found.is_some());
    }

    #[test]
    fn cleanup_removes_buffers_after_flush() {
        let writer = GraphWriter::new(SqliteGraphStore::in_memory().unwrap(), 10, 10);
        writer.append_node(2, node(5, NodeKind::FileScope, 0, 2));
        writer.cleanup_file_buffers(2).unwrap();
        // A second cleanup on an already-removed file id is a harmless no-op.
        writer.cleanup_file_buffers(2).unwrap();
    }

    #[test]
    fn initialize_file_buffers_is_idempotent() {
        let writer = GraphWriter::new(SqliteGraphStore::in_memory().unwrap(), 10, 10);
        writer.initialize_file_buffers(9);
        writer.initialize_file_buffers(9);
        assert_eq!(writer.buffers.lock().unwrap().len(), 1);
    }
}
