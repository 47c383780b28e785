//! Walker/Dispatcher (spec §4.1): enumerates a repository's source files,
//! deduplicates them against the file-version catalog by content hash, and
//! drives translation across a bounded worker pool. One `Dispatcher` is built
//! per ingest run and discarded afterwards — it holds no state of its own
//! beyond borrows of the id generator and writer (spec §9, "no module-level
//! singleton").

use std::path::{Path, PathBuf};

use codegraph_core::config::{IndexerConfig, Language, RepositoryDescriptor};
use codegraph_core::hash::content_hash;
use codegraph_core::id::IdGenerator;
use codegraph_core::store::{FileStatus, FileVersionCatalog, GraphStore};
use codegraph_core::types::CoreError;
use codegraph_core::writer::GraphWriter;
use ignore::WalkBuilder;
use rayon::prelude::*;

use crate::translator::translate_file;

/// Directories excluded regardless of `.gitignore` contents (spec §4.1).
const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    "node_modules", "vendor", ".git", "dist", "build", "target", "bin", "obj", ".venv", "__pycache__", ".tox",
];

/// Path suffixes excluded outright — lock files and pre-minified bundles
/// carry no structure worth indexing (spec §4.1).
const DEFAULT_EXCLUDE_SUFFIXES: &[&str] = &[
    ".lock", "-lock.json", "-lock.yaml", ".min.js", ".min.ts", ".min.tsx",
];

/// Extensions the walker never attempts to read as text (spec §4.1's
/// "binary detection" note — checked before the language match, since a
/// `.class` or `.so` file would otherwise just fail to parse instead of
/// being skipped cleanly).
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "ico", "pdf", "zip", "tar", "gz", "so", "dll", "dylib", "exe", "class",
    "jar", "woff", "woff2", "ttf", "wasm",
];

pub struct FileOutcome {
    pub path: PathBuf,
    pub file_id: u32,
    pub result: Result<(), CoreError>,
}

#[derive(Debug, Default)]
pub struct WalkSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: Vec<(PathBuf, String)>,
    /// `file_id`s that translated cleanly, in no particular order — the
    /// caller's post-processing stage (spec §4.5) runs over exactly these.
    pub succeeded_file_ids: Vec<u32>,
}

pub struct Dispatcher<'a, S: GraphStore + FileVersionCatalog> {
    repo: &'a RepositoryDescriptor,
    config: &'a IndexerConfig,
    writer: &'a GraphWriter<S>,
    ids: &'a IdGenerator,
}

impl<'a, S> Dispatcher<'a, S>
where
    S: GraphStore + FileVersionCatalog + Send,
{
    pub fn new(
        repo: &'a RepositoryDescriptor,
        config: &'a IndexerConfig,
        writer: &'a GraphWriter<S>,
        ids: &'a IdGenerator,
    ) -> Self {
        Self { repo, config, writer, ids }
    }

    /// Walk, dedup, and translate every recognised file (spec §4.1 end to end).
    /// Per-file failures are isolated (spec §7): one bad file never aborts the run.
    pub fn run(&self) -> WalkSummary {
        if self.repo.disabled {
            return WalkSummary::default();
        }

        let entries = self.discover_files();
        let outcomes = match rayon::ThreadPoolBuilder::new().num_threads(self.config.max_concurrent_files.max(1)).build() {
            Ok(pool) => pool.install(|| entries.into_par_iter().map(|path| self.process_one(&path)).collect::<Vec<_>>()),
            Err(e) => {
                eprintln!(
                    "codegraph: warning: failed to build a {}-thread pool ({e}), processing sequentially",
                    self.config.max_concurrent_files
                );
                entries.iter().map(|path| self.process_one(path)).collect()
            }
        };

        self.summarize(outcomes)
    }

    fn discover_files(&self) -> Vec<PathBuf> {
        let mut builder = WalkBuilder::new(&self.repo.path);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .add_custom_ignore_filename(".codegraphignore");

        let mut out = Vec::new();
        for result in builder.build() {
            let Ok(entry) = result else { continue };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.into_path();
            if self.is_excluded(&path) {
                continue;
            }
            if self.language_for(&path).is_some() {
                out.push(path);
            }
        }
        out
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if path.components().any(|c| DEFAULT_EXCLUDE_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref())) {
            return true;
        }
        let name = path.to_string_lossy();
        if DEFAULT_EXCLUDE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
            return true;
        }
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
                return true;
            }
        }
        self.config.ignore_patterns.iter().any(|pattern| name.contains(pattern.as_str()))
    }

    fn language_for(&self, path: &Path) -> Option<Language> {
        let ext = path.extension()?.to_str()?;
        let lang = Language::from_extension(ext)?;
        if self.repo.skip_other_languages && lang != self.repo.language {
            return None;
        }
        Some(lang)
    }

    fn process_one(&self, path: &Path) -> FileOutcome {
        let relative = path.strip_prefix(&self.repo.path).unwrap_or(path).to_string_lossy().replace('\\', "/");
        let language = match self.language_for(path) {
            Some(l) => l,
            None => return FileOutcome { path: path.to_path_buf(), file_id: 0, result: Ok(()) },
        };

        let content = match std::fs::read(path) {
            Ok(c) => c,
            Err(e) => {
                return FileOutcome {
                    path: path.to_path_buf(),
                    file_id: 0,
                    result: Err(CoreError::IoFailure { path: relative, source: e }),
                };
            }
        };

        let sha256 = content_hash(&content);
        let (file_id, version) =
            match self.writer.with_store_mut(|s| s.get_or_create_file_id(&self.repo.name, &sha256, &relative, false, None)) {
            Ok(pair) => pair,
            Err(e) => return FileOutcome { path: path.to_path_buf(), file_id: 0, result: Err(e) },
        };

        let result = translate_file(language, &relative, &content, file_id, version, self.ids, self.writer);

        let status = if result.is_ok() { FileStatus::Done } else { FileStatus::Failed };
        if let Err(e) = self.writer.with_store_mut(|s| s.update_status(file_id, status)) {
            eprintln!("codegraph: warning: failed to record status for file {file_id}: {e}");
        }

        FileOutcome { path: path.to_path_buf(), file_id, result }
    }

    fn summarize(&self, outcomes: Vec<FileOutcome>) -> WalkSummary {
        let mut summary = WalkSummary::default();
        for outcome in outcomes {
            if outcome.file_id == 0 && outcome.result.is_ok() {
                summary.skipped += 1;
                continue;
            }
            match outcome.result {
                Ok(()) => {
                    summary.succeeded += 1;
                    summary.succeeded_file_ids.push(outcome.file_id);
                }
                Err(e) => {
                    summary.failed += 1;
                    eprintln!("codegraph: warning: failed to index {}: {e}", outcome.path.display());
                    summary.failures.push((outcome.path, e.to_string()));
                }
            }
        }
        summary
    }
}

/// Optional head-mode content source (spec §6 "ephemeral"/"commit_id"
/// parameters on the file-version catalog): read a file's blob as committed
/// at a given ref rather than from the working tree, for indexing a
/// historical snapshot without a checkout. Not wired into [`Dispatcher::run`]
/// by default — callers that need historical indexing read content with this
/// and pass it through [`translate_file`] themselves.
#[cfg(feature = "vcs")]
pub fn read_blob_at_ref(repo_path: &Path, relative_path: &str, refname: &str) -> Option<Vec<u8>> {
    let repo = gix::discover(repo_path).ok()?;
    let reference = repo.find_reference(refname).ok()?;
    let commit = reference.into_fully_peeled_id().ok()?.object().ok()?.into_commit();
    let tree = commit.tree().ok()?;
    let entry = tree.lookup_entry_by_path(relative_path).ok()??;
    let blob = entry.object().ok()?.into_blob();
    Some(blob.data.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::sqlite::SqliteGraphStore;
    use std::fs;

    fn repo_descriptor(path: &Path) -> RepositoryDescriptor {
        RepositoryDescriptor::new("test-repo", path, Language::Python)
    }

    #[test]
    fn discovers_and_translates_recognised_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def f():\n    return 1\n").unwrap();
        fs::write(dir.path().join("README.md"), "# hi").unwrap();

        let repo = repo_descriptor(dir.path());
        let config = IndexerConfig::default();
        let writer = GraphWriter::new(SqliteGraphStore::in_memory().unwrap(), 50, 50);
        let ids = IdGenerator::new();

        let dispatcher = Dispatcher::new(&repo, &config, &writer, &ids);
        let summary = dispatcher.run();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn excludes_vendored_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("vendor")).unwrap();
        fs::write(dir.path().join("vendor/lib.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("main.py"), "x = 1\n").unwrap();

        let repo = repo_descriptor(dir.path());
        let config = IndexerConfig::default();
        let writer = GraphWriter::new(SqliteGraphStore::in_memory().unwrap(), 50, 50);
        let ids = IdGenerator::new();

        let dispatcher = Dispatcher::new(&repo, &config, &writer, &ids);
        let summary = dispatcher.run();

        assert_eq!(summary.succeeded, 1);
    }

    #[test]
    fn reingesting_unchanged_content_reuses_the_same_file_id() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();

        let repo = repo_descriptor(dir.path());
        let config = IndexerConfig::default();
        let writer = GraphWriter::new(SqliteGraphStore::in_memory().unwrap(), 50, 50);
        let ids = IdGenerator::new();
        let dispatcher = Dispatcher::new(&repo, &config, &writer, &ids);

        dispatcher.run();
        let second = dispatcher.run();
        assert_eq!(second.succeeded, 1);
    }
}
