//! Thin CLI driver for the codegraph indexer (SPEC_FULL.md §D). Wires
//! `codegraph-core`'s store/config and `codegraph-parsers`' walker into a
//! single `ingest` subcommand; all real work happens in the library crates.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use codegraph_core::config::{IndexerConfig, Language, RepositoryDescriptor};
use codegraph_core::id::IdGenerator;
use codegraph_core::sqlite::SqliteGraphStore;
use codegraph_core::store::NullSymbolResolutionService;
use codegraph_core::writer::GraphWriter;
use codegraph_parsers::postprocess::postprocess_file;
use codegraph_parsers::walker::Dispatcher;

#[derive(Parser)]
#[command(name = "codegraph", version, about = "Multi-language source code indexer producing a persistent code graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk a repository, translate recognised files, and persist the resulting graph.
    Ingest {
        /// Root directory of the repository to index.
        path: PathBuf,
        /// Force a single language instead of auto-detecting per file by extension.
        #[arg(long)]
        language: Option<String>,
        /// Skip files whose detected language differs from --language.
        #[arg(long)]
        skip_other_languages: bool,
        /// Path to the SQLite graph database (created if missing).
        #[arg(long, default_value = ".codegraph/graph.sqlite3")]
        db: PathBuf,
        /// Index the content at HEAD instead of the working tree (requires the "vcs" feature).
        #[arg(long)]
        head: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Ingest { path, language, skip_other_languages, db, head } => {
            run_ingest(path, language, skip_other_languages, db, head)
        }
    }
}

fn run_ingest(path: PathBuf, language: Option<String>, skip_other_languages: bool, db: PathBuf, head: bool) -> ExitCode {
    if head && cfg!(not(feature = "vcs")) {
        eprintln!("codegraph: error: --head requires codegraph-parsers built with the \"vcs\" feature");
        return ExitCode::FAILURE;
    }

    let language = match language.as_deref().map(parse_language) {
        Some(Some(l)) => l,
        Some(None) => {
            eprintln!("codegraph: error: unrecognised --language value");
            return ExitCode::FAILURE;
        }
        None => Language::Python,
    };

    let codegraph_dir = path.join(".codegraph");
    let config = IndexerConfig::load(&codegraph_dir);

    let mut repo = RepositoryDescriptor::new(
        path.file_name().and_then(|n| n.to_str()).unwrap_or("repo"),
        &path,
        language,
    );
    repo.skip_other_languages = skip_other_languages;

    if let Some(parent) = db.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("codegraph: error: cannot create {}: {e}", parent.display());
            return ExitCode::FAILURE;
        }
    }

    let store = match SqliteGraphStore::open(db.to_string_lossy().as_ref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("codegraph: error: cannot open {}: {e}", db.display());
            return ExitCode::FAILURE;
        }
    };

    let writer = GraphWriter::new(store, config.batch.node_batch_size, config.batch.relation_batch_size);
    let ids = IdGenerator::new();
    let dispatcher = Dispatcher::new(&repo, &config, &writer, &ids);
    let summary = dispatcher.run();

    let resolver = NullSymbolResolutionService;
    for file_id in &summary.succeeded_file_ids {
        writer.with_store_mut(|s| postprocess_file(s, &resolver, &repo.name, *file_id, &mut || ids.next_id()));
    }
    if let Err(e) = writer.flush(None) {
        eprintln!("codegraph: warning: final flush failed: {e}");
    }

    println!(
        "codegraph: ingested {} ({} succeeded, {} failed, {} skipped)",
        path.display(),
        summary.succeeded,
        summary.failed,
        summary.skipped
    );
    for (file, reason) in &summary.failures {
        eprintln!("codegraph:   failed: {} — {reason}", file.display());
    }

    if summary.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn parse_language(s: &str) -> Option<Language> {
    match s.to_ascii_lowercase().as_str() {
        "go" => Some(Language::Go),
        "python" | "py" => Some(Language::Python),
        "java" => Some(Language::Java),
        "typescript" | "ts" => Some(Language::TypeScript),
        "javascript" | "js" => Some(Language::JavaScript),
        "csharp" | "cs" | "c#" => Some(Language::CSharp),
        _ => None,
    }
}
