use crate::types::{CoreError, Metadata, Node, Relation};

/// Graph store contract (spec §6). Owned by the persistence layer, consumed by
/// the writer and the post-processor.
///
/// This trait is the seam between the core pipeline and storage; a caller only
/// needs these operations to drive ingestion end to end.
pub trait GraphStore {
    fn create_node(&mut self, node: &Node) -> Result<(), CoreError>;
    fn batch_create_nodes(&mut self, nodes: &[Node]) -> Result<(), CoreError>;

    fn create_relation(&mut self, relation: &Relation) -> Result<(), CoreError>;
    fn batch_create_relations(&mut self, relations: &[Relation]) -> Result<(), CoreError>;

    fn update_node_metadata(
        &mut self,
        node_id: u64,
        file_id: u32,
        updates: Metadata,
    ) -> Result<(), CoreError>;

    /// All `FileScope` nodes in a repository, optionally filtered by a
    /// relative-path prefix.
    fn find_file_scopes(&self, repo: &str, path_prefix: Option<&str>) -> Vec<Node>;

    /// Unresolved call sites in a file, grouped by the id of their enclosing
    /// `Function` node (spec §4.5.1).
    fn find_function_calls_in_file(&self, file_id: u32) -> Vec<(u64, Vec<Node>)>;

    fn find_classes_by_name_in_repo(&self, name: &str, repo: &str) -> Vec<Node>;
    fn find_all_classes_in_file(&self, file_id: u32) -> Vec<Node>;
    fn find_all_functions_in_file(&self, file_id: u32) -> Vec<Node>;
    fn find_constructor_calls_in_file(&self, file_id: u32) -> Vec<Node>;
    fn get_constructors_of_class(&self, class_id: u64) -> Vec<Node>;
    fn get_module_name(&self, file_id: u32) -> Option<String>;
    fn get_file_path(&self, file_id: u32) -> Option<String>;
    fn find_functions_by_name(&self, file_id: u32, name: &str) -> Vec<Node>;
    fn find_file_by_path(&self, repo: &str, path: &str) -> Option<Node>;

    fn get_node_by_id(&self, id: u64) -> Option<Node>;

    /// Every relation with `source_id` as its source, any kind. Used by
    /// callers that need to confirm a specific edge landed (e.g. a
    /// `CALLS_FUNCTION` from a call site to its target), not just that the
    /// call site's `resolved` metadata flipped.
    fn relations_from(&self, source_id: u64) -> Vec<Relation>;
}

/// File-version catalog contract (spec §6). The walker's only dependency for
/// turning `(path, content hash)` into a stable `file_id`.
pub trait FileVersionCatalog {
    /// Returns the same `file_id` for the same `(repo, path, sha256)` across
    /// calls; advances the file's version when the hash changes for an
    /// existing path.
    fn get_or_create_file_id(
        &mut self,
        repo: &str,
        sha256: &str,
        relative_path: &str,
        ephemeral: bool,
        commit_id: Option<&str>,
    ) -> Result<(u32, u32), CoreError>;

    fn update_status(&mut self, file_id: u32, status: FileStatus) -> Result<(), CoreError>;

    fn drop_repo(&mut self, repo: &str) -> Result<(), CoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Pending,
    Done,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Done => "done",
            FileStatus::Failed => "failed",
        }
    }
}

/// One outgoing call dependency of a function, as reported by the external
/// symbol-resolution service (spec §6).
#[derive(Debug, Clone)]
pub struct FunctionDependency {
    pub name: String,
    pub call_site_ranges: Vec<crate::types::Range>,
    pub definition_location: Option<DefinitionLocation>,
    pub external: bool,
}

#[derive(Debug, Clone)]
pub struct DefinitionLocation {
    pub file_path: String,
    pub range: crate::types::Range,
}

/// Optional collaborator used only during post-processing (spec §9: "never
/// call it during translation — only during §4.5"). The core degrades
/// gracefully to unresolved calls when no implementation is wired in.
pub trait SymbolResolutionService {
    fn resolve_outgoing_calls(
        &self,
        function_file_path: &str,
        function_range: crate::types::Range,
    ) -> Vec<FunctionDependency>;
}

/// A no-op resolver: every call is left unresolved. Used when no external
/// symbol-resolution service is configured.
pub struct NullSymbolResolutionService;

impl SymbolResolutionService for NullSymbolResolutionService {
    fn resolve_outgoing_calls(
        &self,
        _function_file_path: &str,
        _function_range: crate::types::Range,
    ) -> Vec<FunctionDependency> {
        Vec::new()
    }
}
