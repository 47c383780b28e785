use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Node kinds in the code graph (spec §3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    ModuleScope,
    FileScope,
    Block,
    Variable,
    Expression,
    Conditional,
    Loop,
    Function,
    Class,
    Field,
    FunctionCall,
    Import,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::ModuleScope => "module_scope",
            NodeKind::FileScope => "file_scope",
            NodeKind::Block => "block",
            NodeKind::Variable => "variable",
            NodeKind::Expression => "expression",
            NodeKind::Conditional => "conditional",
            NodeKind::Loop => "loop",
            NodeKind::Function => "function",
            NodeKind::Class => "class",
            NodeKind::Field => "field",
            NodeKind::FunctionCall => "function_call",
            NodeKind::Import => "import",
        }
    }

}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relation kinds between graph nodes (spec §3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Contains,
    CallsFunction,
    Uses,
    Defines,
    Inherits,
    Implements,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Contains => "contains",
            RelationKind::CallsFunction => "calls_function",
            RelationKind::Uses => "uses",
            RelationKind::Defines => "defines",
            RelationKind::Inherits => "inherits",
            RelationKind::Implements => "implements",
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A byte/line/column range in the original source. Half-open, end-exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
    pub start_byte: u32,
    pub end_byte: u32,
}

impl Range {
    pub const ZERO: Range = Range {
        start_line: 0,
        start_col: 0,
        end_line: 0,
        end_col: 0,
        start_byte: 0,
        end_byte: 0,
    };

    /// Whether `self` is fully contained within `outer` (spec §3.2 invariant).
    pub fn contained_in(&self, outer: &Range) -> bool {
        self.start_byte >= outer.start_byte && self.end_byte <= outer.end_byte
    }
}

/// Tagged-variant metadata value (spec §9, replacing the source's `map<string, any>`).
///
/// Complex values (annotation lists, extends/implements lists) are pre-serialised
/// to JSON strings by the producer rather than nested further, per §4.4's
/// serialization note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    List(Vec<MetadataValue>),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[MetadataValue]> {
        match self {
            MetadataValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Str(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Str(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// A node in the code graph (spec §3.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: u64,
    pub kind: NodeKind,
    pub file_id: u32,
    pub name: Option<String>,
    pub range: Range,
    pub version: u32,
    /// Enclosing scope's node id. Zero only for `FileScope` roots (spec §3.2 invariant).
    pub scope_id: u64,
    pub metadata: Metadata,
}

impl Node {
    pub fn get_meta(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }

    pub fn set_meta(&mut self, key: &str, value: impl Into<MetadataValue>) {
        self.metadata.insert(key.to_string(), value.into());
    }
}

/// A directed, typed relation between two nodes (spec §3.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub id: u64,
    pub source_id: u64,
    pub target_id: u64,
    pub kind: RelationKind,
    pub file_id: u32,
    pub metadata: Metadata,
}

/// Per-file processing state (spec §4.5.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileState {
    Parsed,
    Translated,
    Postprocessed,
}

/// Error taxonomy for the ingest pipeline (spec §7). Kinds, not exhaustive
/// type-per-failure-site — callers match on the variant to apply §7's policy.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("cannot read {path}: {source}")]
    IoFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    ParseFailure { path: String, reason: String },

    #[error("translate failure in {path} at {range:?}: {reason}")]
    TranslateFailure {
        path: String,
        range: Option<Range>,
        reason: String,
    },

    #[error("graph store rejected a batch: {0}")]
    WriteFailure(String),

    #[error("repository configuration error: {0}")]
    ConfigError(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::Database(e.to_string())
    }
}
