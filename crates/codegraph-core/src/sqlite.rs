use rusqlite::{params, Connection, OptionalExtension};

use crate::store::{FileStatus, FileVersionCatalog, GraphStore};
use crate::types::{CoreError, Metadata, Node, NodeKind, Range, Relation, RelationKind};

const SCHEMA_VERSION: u32 = 1;

/// SQLite-backed implementation of `GraphStore` and `FileVersionCatalog`.
///
/// Node and relation kinds are stored as their `snake_case` string form
/// (`NodeKind::as_str` / `RelationKind::as_str`) rather than integers, so the
/// schema reads the same vocabulary as spec §3.2/§3.3.
pub struct SqliteGraphStore {
    conn: Connection,
}

impl SqliteGraphStore {
    pub fn open(path: &str) -> Result<Self, CoreError> {
        let conn = Connection::open(path)?;
        let store = SqliteGraphStore { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteGraphStore { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), CoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS codegraph_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS files (
                file_id INTEGER PRIMARY KEY AUTOINCREMENT,
                repo TEXT NOT NULL,
                relative_path TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                status TEXT NOT NULL DEFAULT 'pending',
                UNIQUE(repo, relative_path)
            );
            CREATE INDEX IF NOT EXISTS idx_files_repo ON files(repo);

            CREATE TABLE IF NOT EXISTS nodes (
                id INTEGER PRIMARY KEY,
                kind TEXT NOT NULL,
                file_id INTEGER NOT NULL,
                name TEXT,
                start_line INTEGER NOT NULL,
                start_col INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                end_col INTEGER NOT NULL,
                start_byte INTEGER NOT NULL,
                end_byte INTEGER NOT NULL,
                version INTEGER NOT NULL,
                scope_id INTEGER NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}'
            );
            CREATE INDEX IF NOT EXISTS idx_nodes_file ON nodes(file_id);
            CREATE INDEX IF NOT EXISTS idx_nodes_kind ON nodes(kind);
            CREATE INDEX IF NOT EXISTS idx_nodes_scope ON nodes(scope_id);
            CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(name);

            CREATE TABLE IF NOT EXISTS relations (
                id INTEGER PRIMARY KEY,
                source_id INTEGER NOT NULL,
                target_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                file_id INTEGER NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}'
            );
            CREATE INDEX IF NOT EXISTS idx_relations_source ON relations(source_id);
            CREATE INDEX IF NOT EXISTS idx_relations_target ON relations(target_id);
            CREATE INDEX IF NOT EXISTS idx_relations_kind ON relations(kind);
            ",
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO codegraph_meta (key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )?;

        Ok(())
    }

    pub fn schema_version(&self) -> Result<u32, CoreError> {
        let v: String = self.conn.query_row(
            "SELECT value FROM codegraph_meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )?;
        v.parse().map_err(|_| CoreError::Internal("corrupt schema_version".into()))
    }

    fn insert_node_stmt(
        tx: &rusqlite::Transaction<'_>,
        node: &Node,
    ) -> Result<(), CoreError> {
        let metadata_json =
            serde_json::to_string(&node.metadata).map_err(|e| CoreError::Internal(e.to_string()))?;
        tx.execute(
            "INSERT INTO nodes (id, kind, file_id, name, start_line, start_col, end_line, end_col, start_byte, end_byte, version, scope_id, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(id) DO UPDATE SET
                metadata = excluded.metadata,
                version = excluded.version",
            params![
                node.id as i64,
                node.kind.as_str(),
                node.file_id,
                node.name,
                node.range.start_line,
                node.range.start_col,
                node.range.end_line,
                node.range.end_col,
                node.range.start_byte,
                node.range.end_byte,
                node.version,
                node.scope_id as i64,
                metadata_json,
            ],
        )?;
        Ok(())
    }

    fn insert_relation_stmt(
        tx: &rusqlite::Transaction<'_>,
        relation: &Relation,
    ) -> Result<(), CoreError> {
        // Ordering invariant (spec §3.3, §4.4): both endpoints must already exist.
        let source_exists: bool = tx.query_row(
            "SELECT 1 FROM nodes WHERE id = ?1",
            params![relation.source_id as i64],
            |_| Ok(true),
        ).optional()?.unwrap_or(false);
        let target_exists: bool = tx.query_row(
            "SELECT 1 FROM nodes WHERE id = ?1",
            params![relation.target_id as i64],
            |_| Ok(true),
        ).optional()?.unwrap_or(false);
        if !source_exists || !target_exists {
            return Err(CoreError::WriteFailure(format!(
                "relation {:?} {} -> {} references a node not yet persisted",
                relation.kind, relation.source_id, relation.target_id
            )));
        }

        let metadata_json =
            serde_json::to_string(&relation.metadata).map_err(|e| CoreError::Internal(e.to_string()))?;
        tx.execute(
            "INSERT INTO relations (id, source_id, target_id, kind, file_id, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                relation.id as i64,
                relation.source_id as i64,
                relation.target_id as i64,
                relation.kind.as_str(),
                relation.file_id,
                metadata_json,
            ],
        )?;
        Ok(())
    }

    fn row_to_node(row: &rusqlite::Row<'_>) -> rusqlite::Result<Node> {
        let kind_str: String = row.get("kind")?;
        let metadata_json: String = row.get("metadata")?;
        let metadata: Metadata = serde_json::from_str(&metadata_json).unwrap_or_default();
        Ok(Node {
            id: row.get::<_, i64>("id")? as u64,
            kind: parse_node_kind(&kind_str).unwrap_or(NodeKind::Expression),
            file_id: row.get("file_id")?,
            name: row.get("name")?,
            range: Range {
                start_line: row.get("start_line")?,
                start_col: row.get("start_col")?,
                end_line: row.get("end_line")?,
                end_col: row.get("end_col")?,
                start_byte: row.get("start_byte")?,
                end_byte: row.get("end_byte")?,
            },
            version: row.get("version")?,
            scope_id: row.get::<_, i64>("scope_id")? as u64,
            metadata,
        })
    }

    fn row_to_relation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Relation> {
        let kind_str: String = row.get("kind")?;
        let metadata_json: String = row.get("metadata")?;
        let metadata: Metadata = serde_json::from_str(&metadata_json).unwrap_or_default();
        Ok(Relation {
            id: row.get::<_, i64>("id")? as u64,
            source_id: row.get::<_, i64>("source_id")? as u64,
            target_id: row.get::<_, i64>("target_id")? as u64,
            kind: parse_relation_kind(&kind_str).unwrap_or(RelationKind::Uses),
            file_id: row.get("file_id")?,
            metadata,
        })
    }
}

fn parse_relation_kind(s: &str) -> Option<RelationKind> {
    Some(match s {
        "contains" => RelationKind::Contains,
        "calls_function" => RelationKind::CallsFunction,
        "uses" => RelationKind::Uses,
        "defines" => RelationKind::Defines,
        "inherits" => RelationKind::Inherits,
        "implements" => RelationKind::Implements,
        _ => return None,
    })
}

fn parse_node_kind(s: &str) -> Option<NodeKind> {
    Some(match s {
        "module_scope" => NodeKind::ModuleScope,
        "file_scope" => NodeKind::FileScope,
        "block" => NodeKind::Block,
        "variable" => NodeKind::Variable,
        "expression" => NodeKind::Expression,
        "conditional" => NodeKind::Conditional,
        "loop" => NodeKind::Loop,
        "function" => NodeKind::Function,
        "class" => NodeKind::Class,
        "field" => NodeKind::Field,
        "function_call" => NodeKind::FunctionCall,
        "import" => NodeKind::Import,
        _ => return None,
    })
}

impl GraphStore for SqliteGraphStore {
    fn create_node(&mut self, node: &Node) -> Result<(), CoreError> {
        let tx = self.conn.transaction()?;
        Self::insert_node_stmt(&tx, node)?;
        tx.commit()?;
        Ok(())
    }

    fn batch_create_nodes(&mut self, nodes: &[Node]) -> Result<(), CoreError> {
        let tx = self.conn.transaction()?;
        for node in nodes {
            Self::insert_node_stmt(&tx, node)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn create_relation(&mut self, relation: &Relation) -> Result<(), CoreError> {
        let tx = self.conn.transaction()?;
        Self::insert_relation_stmt(&tx, relation)?;
        tx.commit()?;
        Ok(())
    }

    fn batch_create_relations(&mut self, relations: &[Relation]) -> Result<(), CoreError> {
        let tx = self.conn.transaction()?;
        for relation in relations {
            Self::insert_relation_stmt(&tx, relation)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn update_node_metadata(
        &mut self,
        node_id: u64,
        file_id: u32,
        updates: Metadata,
    ) -> Result<(), CoreError> {
        let tx = self.conn.transaction()?;
        let existing: Option<String> = tx
            .query_row(
                "SELECT metadata FROM nodes WHERE id = ?1 AND file_id = ?2",
                params![node_id as i64, file_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(existing) = existing else {
            return Err(CoreError::Internal(format!("node {node_id} not found for metadata update")));
        };
        let mut merged: Metadata = serde_json::from_str(&existing).unwrap_or_default();
        for (k, v) in updates {
            merged.insert(k, v);
        }
        let merged_json = serde_json::to_string(&merged).map_err(|e| CoreError::Internal(e.to_string()))?;
        tx.execute(
            "UPDATE nodes SET metadata = ?1 WHERE id = ?2",
            params![merged_json, node_id as i64],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn find_file_scopes(&self, repo: &str, path_prefix: Option<&str>) -> Vec<Node> {
        let sql = "SELECT nodes.* FROM nodes
                    JOIN files ON files.file_id = nodes.file_id
                    WHERE nodes.kind = 'file_scope' AND files.repo = ?1
                      AND (?2 IS NULL OR files.relative_path LIKE ?2 || '%')";
        let mut stmt = match self.conn.prepare(sql) {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        stmt.query_map(params![repo, path_prefix], Self::row_to_node)
            .map(|rows| rows.filter_map(Result::ok).collect())
            .unwrap_or_default()
    }

    fn find_function_calls_in_file(&self, file_id: u32) -> Vec<(u64, Vec<Node>)> {
        let mut stmt = match self.conn.prepare(
            "SELECT * FROM nodes WHERE file_id = ?1 AND kind = 'function_call' ORDER BY start_byte",
        ) {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        let calls: Vec<Node> = stmt
            .query_map(params![file_id], Self::row_to_node)
            .map(|rows| rows.filter_map(Result::ok).collect())
            .unwrap_or_default();

        let functions = self.all_functions_in_file(file_id);
        let mut grouped: std::collections::BTreeMap<u64, Vec<Node>> = std::collections::BTreeMap::new();
        for call in calls {
            let container = functions
                .iter()
                .filter(|f| call.range.contained_in(&f.range))
                .min_by_key(|f| f.range.end_byte - f.range.start_byte)
                .map(|f| f.id)
                .unwrap_or(0);
            grouped.entry(container).or_default().push(call);
        }
        grouped.into_iter().collect()
    }

    fn find_classes_by_name_in_repo(&self, name: &str, repo: &str) -> Vec<Node> {
        let mut stmt = match self.conn.prepare(
            "SELECT nodes.* FROM nodes
             JOIN files ON files.file_id = nodes.file_id
             WHERE nodes.kind = 'class' AND nodes.name = ?1 AND files.repo = ?2",
        ) {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        stmt.query_map(params![name, repo], Self::row_to_node)
            .map(|rows| rows.filter_map(Result::ok).collect())
            .unwrap_or_default()
    }

    fn find_all_classes_in_file(&self, file_id: u32) -> Vec<Node> {
        let mut stmt = match self
            .conn
            .prepare("SELECT * FROM nodes WHERE file_id = ?1 AND kind = 'class'")
        {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        stmt.query_map(params![file_id], Self::row_to_node)
            .map(|rows| rows.filter_map(Result::ok).collect())
            .unwrap_or_default()
    }

    fn find_all_functions_in_file(&self, file_id: u32) -> Vec<Node> {
        self.all_functions_in_file(file_id)
    }

    fn find_constructor_calls_in_file(&self, file_id: u32) -> Vec<Node> {
        self.find_all_calls_in_file(file_id)
            .into_iter()
            .filter(|n| n.get_meta("is_constructor").and_then(|v| v.as_bool()).unwrap_or(false))
            .collect()
    }

    fn get_constructors_of_class(&self, class_id: u64) -> Vec<Node> {
        let mut stmt = match self.conn.prepare(
            "SELECT nodes.* FROM nodes
             JOIN relations ON relations.target_id = nodes.id
             WHERE relations.source_id = ?1 AND relations.kind = 'contains' AND nodes.kind = 'function'",
        ) {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        stmt.query_map(params![class_id as i64], Self::row_to_node)
            .map(|rows| {
                rows.filter_map(Result::ok)
                    .filter(|n| n.get_meta("is_constructor").and_then(|v| v.as_bool()).unwrap_or(false))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get_module_name(&self, file_id: u32) -> Option<String> {
        self.conn
            .query_row(
                "SELECT name FROM nodes WHERE file_id = ?1 AND kind = 'module_scope' LIMIT 1",
                params![file_id],
                |row| row.get(0),
            )
            .optional()
            .ok()
            .flatten()
    }

    fn get_file_path(&self, file_id: u32) -> Option<String> {
        self.conn
            .query_row("SELECT relative_path FROM files WHERE file_id = ?1", params![file_id], |row| row.get(0))
            .optional()
            .ok()
            .flatten()
    }

    fn find_functions_by_name(&self, file_id: u32, name: &str) -> Vec<Node> {
        let mut stmt = match self
            .conn
            .prepare("SELECT * FROM nodes WHERE file_id = ?1 AND kind = 'function' AND name = ?2")
        {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        stmt.query_map(params![file_id, name], Self::row_to_node)
            .map(|rows| rows.filter_map(Result::ok).collect())
            .unwrap_or_default()
    }

    fn find_file_by_path(&self, repo: &str, path: &str) -> Option<Node> {
        let file_id: u32 = self
            .conn
            .query_row(
                "SELECT file_id FROM files WHERE repo = ?1 AND relative_path = ?2",
                params![repo, path],
                |row| row.get(0),
            )
            .optional()
            .ok()
            .flatten()?;
        self.conn
            .query_row(
                "SELECT * FROM nodes WHERE file_id = ?1 AND kind = 'file_scope'",
                params![file_id],
                Self::row_to_node,
            )
            .optional()
            .ok()
            .flatten()
    }

    fn get_node_by_id(&self, id: u64) -> Option<Node> {
        self.conn
            .query_row("SELECT * FROM nodes WHERE id = ?1", params![id as i64], Self::row_to_node)
            .optional()
            .ok()
            .flatten()
    }

    fn relations_from(&self, source_id: u64) -> Vec<Relation> {
        let mut stmt = match self.conn.prepare("SELECT * FROM relations WHERE source_id = ?1") {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        stmt.query_map(params![source_id as i64], Self::row_to_relation)
            .map(|rows| rows.filter_map(Result::ok).collect())
            .unwrap_or_default()
    }
}

impl SqliteGraphStore {
    fn all_functions_in_file(&self, file_id: u32) -> Vec<Node> {
        let mut stmt = match self
            .conn
            .prepare("SELECT * FROM nodes WHERE file_id = ?1 AND kind = 'function'")
        {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        stmt.query_map(params![file_id], Self::row_to_node)
            .map(|rows| rows.filter_map(Result::ok).collect())
            .unwrap_or_default()
    }

    fn find_all_calls_in_file(&self, file_id: u32) -> Vec<Node> {
        let mut stmt = match self
            .conn
            .prepare("SELECT * FROM nodes WHERE file_id = ?1 AND kind = 'function_call'")
        {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        stmt.query_map(params![file_id], Self::row_to_node)
            .map(|rows| rows.filter_map(Result::ok).collect())
            .unwrap_or_default()
    }
}

impl FileVersionCatalog for SqliteGraphStore {
    fn get_or_create_file_id(
        &mut self,
        repo: &str,
        sha256: &str,
        relative_path: &str,
        _ephemeral: bool,
        _commit_id: Option<&str>,
    ) -> Result<(u32, u32), CoreError> {
        let tx = self.conn.transaction()?;
        let existing: Option<(u32, String, u32)> = tx
            .query_row(
                "SELECT file_id, content_hash, version FROM files WHERE repo = ?1 AND relative_path = ?2",
                params![repo, relative_path],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let result = match existing {
            Some((file_id, hash, version)) if hash == sha256 => (file_id, version),
            Some((file_id, _, version)) => {
                let new_version = version + 1;
                tx.execute(
                    "UPDATE files SET content_hash = ?1, version = ?2, status = 'pending' WHERE file_id = ?3",
                    params![sha256, new_version, file_id],
                )?;
                (file_id, new_version)
            }
            None => {
                tx.execute(
                    "INSERT INTO files (repo, relative_path, content_hash, version, status) VALUES (?1, ?2, ?3, 1, 'pending')",
                    params![repo, relative_path, sha256],
                )?;
                (tx.last_insert_rowid() as u32, 1)
            }
        };
        tx.commit()?;
        Ok(result)
    }

    fn update_status(&mut self, file_id: u32, status: FileStatus) -> Result<(), CoreError> {
        self.conn.execute(
            "UPDATE files SET status = ?1 WHERE file_id = ?2",
            params![status.as_str(), file_id],
        )?;
        Ok(())
    }

    fn drop_repo(&mut self, repo: &str) -> Result<(), CoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM nodes WHERE file_id IN (SELECT file_id FROM files WHERE repo = ?1)",
            params![repo],
        )?;
        tx.execute("DELETE FROM files WHERE repo = ?1", params![repo])?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileVersionCatalog;

    fn sample_node(id: u64, kind: NodeKind, scope_id: u64) -> Node {
        Node {
            id,
            kind,
            file_id: 1,
            name: Some("x".into()),
            range: Range { start_line: 0, start_col: 0, end_line: 1, end_col: 0, start_byte: 0, end_byte: 10 },
            version: 1,
            scope_id,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn schema_version_is_set_on_init() {
        let store = SqliteGraphStore::in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn create_node_then_relation_respects_ordering() {
        let mut store = SqliteGraphStore::in_memory().unwrap();
        let root = sample_node(1, NodeKind::FileScope, 0);
        let child = sample_node(2, NodeKind::Function, 1);
        store.create_node(&root).unwrap();
        store.create_node(&child).unwrap();

        let rel = Relation {
            id: 1,
            source_id: 1,
            target_id: 2,
            kind: RelationKind::Contains,
            file_id: 1,
            metadata: Metadata::new(),
        };
        store.create_relation(&rel).unwrap();
        assert_eq!(store.get_node_by_id(2).unwrap().id, 2);
    }

    #[test]
    fn relation_before_nodes_is_rejected() {
        let mut store = SqliteGraphStore::in_memory().unwrap();
        let rel = Relation {
            id: 1,
            source_id: 1,
            target_id: 2,
            kind: RelationKind::Contains,
            file_id: 1,
            metadata: Metadata::new(),
        };
        assert!(store.create_relation(&rel).is_err());
    }

    #[test]
    fn get_or_create_file_id_is_stable_for_same_content() {
        let mut store = SqliteGraphStore::in_memory().unwrap();
        let (id1, v1) = store.get_or_create_file_id("default", "abc123", "src/a.py", false, None).unwrap();
        let (id2, v2) = store.get_or_create_file_id("default", "abc123", "src/a.py", false, None).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(v1, v2);
    }

    #[test]
    fn get_or_create_file_id_bumps_version_on_new_content() {
        let mut store = SqliteGraphStore::in_memory().unwrap();
        let (id1, v1) = store.get_or_create_file_id("default", "abc123", "src/a.py", false, None).unwrap();
        let (id2, v2) = store.get_or_create_file_id("default", "def456", "src/a.py", false, None).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(v2, v1 + 1);
    }

    #[test]
    fn find_file_scopes_filters_by_repo_and_prefix() {
        let mut store = SqliteGraphStore::in_memory().unwrap();
        store.get_or_create_file_id("default", "h1", "src/a.py", false, None).unwrap();
        let mut scope = sample_node(1, NodeKind::FileScope, 0);
        scope.file_id = 1;
        store.create_node(&scope).unwrap();

        let found = store.find_file_scopes("default", Some("src"));
        assert_eq!(found.len(), 1);
        let not_found = store.find_file_scopes("default", Some("other"));
        assert!(not_found.is_empty());
    }
}
