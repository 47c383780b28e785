//! Parsing, translation, and post-processing for codegraph.
//!
//! This crate turns source files into graph nodes and relations: the
//! [`walker`] discovers and dedups files, [`adapter`] wraps tree-sitter per
//! language, [`translator`] walks each file's syntax tree into the graph
//! model, and [`postprocess`] resolves the cross-file relations translation
//! alone can't see.
//!
//! Supported languages: Go, Python, Java, TypeScript, JavaScript, C#.

pub mod adapter;
pub mod postprocess;
pub mod translator;
pub mod walker;
