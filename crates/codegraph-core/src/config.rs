//! Configuration loading for codegraph.
//!
//! Reads `.codegraph/config.json` and provides typed access to the operational
//! knobs the core leaves "configured" (spec §4.1, §4.4, §4.3.8). Falls back to
//! sensible defaults when the file is missing or incomplete, the same way the
//! ambient config file of the corpus this was adapted from does.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Supported languages (spec §6 language support matrix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    Python,
    Java,
    TypeScript,
    JavaScript,
    CSharp,
}

impl Language {
    /// Maps a file extension (without the leading dot, case-insensitive) to a
    /// language, per spec §6.
    pub fn from_extension(ext: &str) -> Option<Language> {
        match ext.to_ascii_lowercase().as_str() {
            "go" => Some(Language::Go),
            "py" | "pyw" => Some(Language::Python),
            "java" => Some(Language::Java),
            "ts" | "tsx" => Some(Language::TypeScript),
            "js" | "jsx" | "mjs" => Some(Language::JavaScript),
            "cs" => Some(Language::CSharp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Go => "go",
            Language::Python => "python",
            Language::Java => "java",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::CSharp => "csharp",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repository descriptor — configuration input to the walker (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    pub name: String,
    pub path: std::path::PathBuf,
    pub language: Language,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub skip_other_languages: bool,
}

impl RepositoryDescriptor {
    pub fn new(name: impl Into<String>, path: impl Into<std::path::PathBuf>, language: Language) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            language,
            disabled: false,
            skip_other_languages: false,
        }
    }
}

/// Batching knobs for the graph writer (spec §4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_node_batch_size")]
    pub node_batch_size: usize,
    #[serde(default = "default_relation_batch_size")]
    pub relation_batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            node_batch_size: default_node_batch_size(),
            relation_batch_size: default_relation_batch_size(),
        }
    }
}

fn default_node_batch_size() -> usize {
    50
}

fn default_relation_batch_size() -> usize {
    50
}

/// Chunking side-output knobs (spec §4.3.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_min_conditional_lines")]
    pub min_conditional_lines: u32,
    #[serde(default = "default_min_loop_lines")]
    pub min_loop_lines: u32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_conditional_lines: default_min_conditional_lines(),
            min_loop_lines: default_min_loop_lines(),
        }
    }
}

fn default_min_conditional_lines() -> u32 {
    5
}

fn default_min_loop_lines() -> u32 {
    5
}

fn default_max_concurrent_files() -> usize {
    6
}

fn default_gc_hint_interval() -> usize {
    500
}

/// Top-level operational configuration for the indexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerConfig {
    #[serde(default = "default_max_concurrent_files")]
    pub max_concurrent_files: usize,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default = "default_gc_hint_interval")]
    pub gc_hint_interval: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_files: default_max_concurrent_files(),
            batch: BatchConfig::default(),
            chunking: ChunkingConfig::default(),
            ignore_patterns: vec![],
            gc_hint_interval: default_gc_hint_interval(),
        }
    }
}

impl IndexerConfig {
    /// Load configuration from `.codegraph/config.json` inside the given
    /// directory. Returns defaults if the file doesn't exist or can't be
    /// parsed — a malformed config is a warning, not a fatal `ConfigError`.
    pub fn load(codegraph_dir: &Path) -> Self {
        let config_path = codegraph_dir.join("config.json");
        let content = match std::fs::read_to_string(&config_path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!(
                    "codegraph: warning: failed to parse {}: {}, using defaults",
                    config_path.display(),
                    e
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config() {
        let cfg = IndexerConfig::default();
        assert_eq!(cfg.max_concurrent_files, 6);
        assert_eq!(cfg.batch.node_batch_size, 50);
        assert!(!cfg.chunking.enabled);
    }

    #[test]
    fn test_language_from_extension_is_case_insensitive() {
        assert_eq!(Language::from_extension("TS"), Some(Language::TypeScript));
        assert_eq!(Language::from_extension("PyW"), Some(Language::Python));
        assert_eq!(Language::from_extension("rb"), None);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = IndexerConfig::load(dir.path());
        assert_eq!(cfg, IndexerConfig::default());
    }

    #[test]
    fn test_load_malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), "{not json").unwrap();
        let cfg = IndexerConfig::load(dir.path());
        assert_eq!(cfg, IndexerConfig::default());
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{"max_concurrent_files": 12}"#,
        )
        .unwrap();
        let cfg = IndexerConfig::load(dir.path());
        assert_eq!(cfg.max_concurrent_files, 12);
        assert_eq!(cfg.batch.node_batch_size, 50);
    }
}
