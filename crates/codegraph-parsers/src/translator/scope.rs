//! Scope stack and symbol model (spec §4.3.1–4.3.2).
//!
//! The source this was distilled from models scopes and symbols as
//! cyclically-referencing objects (scope -> nodes -> scope). Per the design
//! note on cyclic references, this is an arena of `Scope`s addressed by index
//! rather than a graph of owned/borrowed pointers: the scope stack holds
//! indices into the arena, never references.

use std::collections::HashMap;

/// Index into a [`ScopeArena`]. Not to be confused with a graph [`Node`](codegraph_core::types::Node) id.
pub type ScopeIdx = usize;

#[derive(Debug, Clone)]
pub struct Symbol {
    /// The graph node id that defines this symbol.
    pub node_id: u64,
    /// Field-access children, e.g. `self.fields["name"]` for `receiver.name`.
    pub fields: HashMap<String, Symbol>,
}

impl Symbol {
    pub fn new(node_id: u64) -> Self {
        Self { node_id, fields: HashMap::new() }
    }
}

#[derive(Debug)]
pub struct Scope {
    /// The graph node id that owns this scope (a FileScope, Class, Function, Block, ...).
    pub owner_node_id: u64,
    pub parent: Option<ScopeIdx>,
    symbols: HashMap<String, Symbol>,
    /// Child node ids created before this scope was confirmed as their
    /// enclosing scope; transferred to the parent's set on pop if still
    /// unresolved (spec §4.3.1).
    not_yet_contained: Vec<u64>,
    /// Variable/field names referenced on the RHS of assignments in this
    /// scope, consumed when emitting USES edges (spec §4.3.6).
    rhs_references: Vec<String>,
}

impl Scope {
    fn new(owner_node_id: u64, parent: Option<ScopeIdx>) -> Self {
        Self {
            owner_node_id,
            parent,
            symbols: HashMap::new(),
            not_yet_contained: Vec::new(),
            rhs_references: Vec::new(),
        }
    }

    pub fn define(&mut self, name: impl Into<String>, symbol: Symbol) {
        self.symbols.insert(name.into(), symbol);
    }

    pub fn has_local(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn record_rhs_reference(&mut self, name: impl Into<String>) {
        self.rhs_references.push(name.into());
    }

    pub fn take_rhs_references(&mut self) -> Vec<String> {
        std::mem::take(&mut self.rhs_references)
    }

    pub fn mark_not_yet_contained(&mut self, node_id: u64) {
        self.not_yet_contained.push(node_id);
    }
}

/// An arena of scopes addressed by index, plus the live stack of indices
/// representing the translator's current lexical nesting (spec §9: "the scope
/// stack holds indices into the arena, never raw pointers").
pub struct ScopeStack {
    arena: Vec<Scope>,
    stack: Vec<ScopeIdx>,
}

#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    #[error("scope stack underflow: attempted to pop with no open scope")]
    Underflow,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self { arena: Vec::new(), stack: Vec::new() }
    }

    /// Push a new scope owned by `owner_node_id`. Spec §4.3.2: "add it to the
    /// parent scope's child set" — tracked implicitly via `parent` links; the
    /// not-yet-contained transfer happens on pop.
    pub fn push_scope(&mut self, owner_node_id: u64) -> ScopeIdx {
        let parent = self.stack.last().copied();
        let idx = self.arena.len();
        self.arena.push(Scope::new(owner_node_id, parent));
        self.stack.push(idx);
        idx
    }

    /// Finalise the top scope. Fails cleanly on underflow (spec §4.3.2,
    /// §8 boundary behaviour 11).
    pub fn pop_scope(&mut self) -> Result<ScopeIdx, ScopeError> {
        let idx = self.stack.pop().ok_or(ScopeError::Underflow)?;
        let parent = self.arena[idx].parent;
        let unresolved = std::mem::take(&mut self.arena[idx].not_yet_contained);
        if let Some(parent_idx) = parent {
            for node_id in unresolved {
                self.arena[parent_idx].mark_not_yet_contained(node_id);
            }
        }
        Ok(idx)
    }

    pub fn current(&self) -> Option<ScopeIdx> {
        self.stack.last().copied()
    }

    pub fn current_owner_node_id(&self) -> Option<u64> {
        self.current().map(|idx| self.arena[idx].owner_node_id)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn scope_mut(&mut self, idx: ScopeIdx) -> &mut Scope {
        &mut self.arena[idx]
    }

    pub fn scope(&self, idx: ScopeIdx) -> &Scope {
        &self.arena[idx]
    }

    pub fn define_in_current(&mut self, name: impl Into<String>, symbol: Symbol) {
        if let Some(idx) = self.current() {
            self.arena[idx].define(name, symbol);
        }
    }

    /// Walk the stack from top to bottom; return the first matching `Symbol`
    /// (spec §4.3.2 `resolve`). Shadowing is implicit in traversal order.
    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        for &idx in self.stack.iter().rev() {
            if let Some(sym) = self.arena[idx].symbols.get(name) {
                return Some(sym);
            }
        }
        None
    }

    /// Resolve a dotted chain `[a, b, c]` as `a.fields[b].fields[c]` (spec
    /// §4.3.2 `resolve_chain`). Any failed step yields `None`.
    pub fn resolve_chain(&self, chain: &[String]) -> Option<&Symbol> {
        let (head, rest) = chain.split_first()?;
        let mut current = self.resolve(head)?;
        for field in rest {
            current = current.fields.get(field)?;
        }
        Some(current)
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_honors_shadowing() {
        let mut stack = ScopeStack::new();
        stack.push_scope(1);
        stack.define_in_current("x", Symbol::new(100));
        stack.push_scope(2);
        stack.define_in_current("x", Symbol::new(200));

        assert_eq!(stack.resolve("x").unwrap().node_id, 200);
        stack.pop_scope().unwrap();
        assert_eq!(stack.resolve("x").unwrap().node_id, 100);
    }

    #[test]
    fn pop_on_empty_stack_errors() {
        let mut stack = ScopeStack::new();
        assert!(matches!(stack.pop_scope(), Err(ScopeError::Underflow)));
    }

    #[test]
    fn not_yet_contained_transfers_to_parent_on_pop() {
        let mut stack = ScopeStack::new();
        let outer = stack.push_scope(1);
        let _inner = stack.push_scope(2);
        stack.scope_mut(stack.current().unwrap()).mark_not_yet_contained(999);
        stack.pop_scope().unwrap();
        assert_eq!(stack.scope(outer).not_yet_contained, vec![999]);
    }

    #[test]
    fn resolve_chain_walks_fields() {
        let mut stack = ScopeStack::new();
        stack.push_scope(1);
        let mut receiver = Symbol::new(1);
        receiver.fields.insert("name".to_string(), Symbol::new(2));
        stack.define_in_current("self", receiver);

        let resolved = stack.resolve_chain(&["self".to_string(), "name".to_string()]);
        assert_eq!(resolved.unwrap().node_id, 2);
        assert!(stack.resolve_chain(&["self".to_string(), "missing".to_string()]).is_none());
    }
}
