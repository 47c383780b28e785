//! Parser adapter (spec §4.2): wraps a language-specific tree-sitter grammar
//! and exposes the three operations the translator needs — enumerate named
//! children, look up a field by name, and the byte range of any node.
//!
//! Parsing is total: tree-sitter always returns a tree, with ERROR nodes in
//! place of anything it couldn't parse (spec §4.2 "Guarantees"). The
//! translator treats those as opaque and keeps walking.

use codegraph_core::config::Language;
use codegraph_core::types::Range;
use tree_sitter::{Node as TsNode, Parser, Tree};

pub struct ParserAdapter {
    parser: Parser,
}

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("tree-sitter failed to set language: {0}")]
    LanguageSetup(String),
    #[error("tree-sitter produced no tree for the given source")]
    NoTree,
}

impl ParserAdapter {
    pub fn for_language(language: Language) -> Result<Self, AdapterError> {
        let ts_language = language_for(language);
        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| AdapterError::LanguageSetup(e.to_string()))?;
        Ok(Self { parser })
    }

    pub fn parse(&mut self, source: &[u8]) -> Result<Tree, AdapterError> {
        self.parser.parse(source, None).ok_or(AdapterError::NoTree)
    }
}

fn language_for(language: Language) -> tree_sitter::Language {
    match language {
        Language::Go => tree_sitter_go::LANGUAGE.into(),
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::Java => tree_sitter_java::LANGUAGE.into(),
        Language::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
        Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Language::JavaScript => tree_sitter_typescript::LANGUAGE_TSX.into(),
    }
}

/// Byte/line/column range of a tree-sitter node, in the shape the graph model
/// wants (spec §3.2 `range`).
pub fn node_range(node: &TsNode) -> Range {
    let start = node.start_position();
    let end = node.end_position();
    Range {
        start_line: start.row as u32,
        start_col: start.column as u32,
        end_line: end.row as u32,
        end_col: end.column as u32,
        start_byte: node.start_byte() as u32,
        end_byte: node.end_byte() as u32,
    }
}

/// Named children, in source order (spec §4.2 "enumerate named children").
pub fn named_children<'a>(node: &TsNode<'a>) -> impl Iterator<Item = TsNode<'a>> + 'a {
    let mut cursor = node.walk();
    let children: Vec<TsNode> = node.named_children(&mut cursor).collect();
    children.into_iter()
}

/// Field lookup by name (spec §4.2 "look up a named-field child").
pub fn field<'a>(node: &TsNode<'a>, name: &str) -> Option<TsNode<'a>> {
    node.child_by_field_name(name)
}

pub fn text<'a>(node: &TsNode<'_>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// Find the first identifier-like named child, used when the primary field is
/// absent (spec §4.3.5).
pub fn first_identifier_like<'a>(node: &'a TsNode<'a>) -> Option<TsNode<'a>> {
    const IDENT_KINDS: &[&str] = &[
        "identifier",
        "simple_identifier",
        "field_identifier",
        "property_identifier",
        "scoped_identifier",
        "shorthand_property_identifier",
        "type_identifier",
    ];
    named_children(node).find(|c| IDENT_KINDS.contains(&c.kind()))
}
