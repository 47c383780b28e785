//! Core types, graph storage, and configuration for codegraph.
//!
//! This crate provides the foundational data structures used across all
//! codegraph crates:
//! - [`types`] — graph nodes, relations, and the error taxonomy
//! - [`id`] — the process-wide node-id generator
//! - [`store`] — the [`store::GraphStore`] trait plus the external-collaborator
//!   traits (`FileVersionCatalog`, `SymbolResolutionService`)
//! - [`sqlite`] — SQLite-backed implementation of those traits
//! - [`writer`] — the buffered, ordering-preserving graph writer
//! - [`config`] — configuration loading and the repository descriptor
//! - [`hash`] — content hashing for dedup and chunk ids

pub mod config;
pub mod hash;
pub mod id;
pub mod sqlite;
pub mod store;
pub mod types;
pub mod writer;
