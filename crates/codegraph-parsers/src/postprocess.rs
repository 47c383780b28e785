//! Post-processor (spec §4.5): runs after a file's in-file relations are
//! flushed and resolves everything that needs information from outside that
//! one file — call targets, inheritance parents, constructor dispatch, and
//! Go's struct/receiver merge. Each stage reads the graph through
//! [`GraphStore`] and writes back only `CALLS_FUNCTION`/`INHERITS`/
//! `IMPLEMENTS`/`CONTAINS` relations or `resolved`/`external` metadata — it
//! never creates or mutates a node's core fields.

use std::collections::HashMap;

use codegraph_core::store::{GraphStore, SymbolResolutionService};
use codegraph_core::types::{Metadata, MetadataValue, Node, NodeKind, Relation, RelationKind};

/// Per-file entry point: run every stage for one file in order (spec §4.5.5
/// PARSED -> TRANSLATED -> POSTPROCESSED; this function is the POSTPROCESSED
/// transition). `repo` scopes the cross-file lookups stages 1 and 2 need.
pub fn postprocess_file<S: GraphStore>(
    store: &mut S,
    resolver: &dyn SymbolResolutionService,
    repo: &str,
    file_id: u32,
    next_id: &mut dyn FnMut() -> u64,
) {
    resolve_function_calls(store, resolver, repo, file_id, next_id);
    resolve_inheritance(store, repo, file_id, next_id);
    resolve_constructor_calls(store, file_id, next_id);
    merge_go_receivers(store, file_id, next_id);
}

/// §4.5.1: for every `FunctionCall` node, try to find the `Function` it names.
/// Calls already marked `is_constructor` are left for stage 3. Candidates are
/// named by the external resolver first (cross-file, cross-package); when the
/// resolver has nothing, fall back to a same-file name lookup.
fn resolve_function_calls<S: GraphStore>(
    store: &mut S,
    resolver: &dyn SymbolResolutionService,
    repo: &str,
    file_id: u32,
    next_id: &mut dyn FnMut() -> u64,
) {
    let grouped = store.find_function_calls_in_file(file_id);
    let mut new_relations = Vec::new();

    for (_enclosing_function_id, calls) in grouped {
        for call in calls {
            if call.get_meta("is_constructor").and_then(|v| v.as_bool()).unwrap_or(false) {
                continue;
            }
            let Some(name) = call.name.as_deref() else { continue };
            // Synthetic lambda names never resolve to a real declaration.
            if name.starts_with("__lambda__") || name.starts_with("__anonymous__") || name.starts_with("__unnamed_call__") {
                continue;
            }
            let simple_name = name.rsplit(['.', ':']).next().unwrap_or(name);

            let mut target = store.find_functions_by_name(file_id, simple_name).into_iter().next();
            let mut external = false;

            if target.is_none() {
                let function_path = store.get_file_path(file_id).unwrap_or_default();
                let deps = resolver.resolve_outgoing_calls(&function_path, call.range);
                if let Some(dep) = deps.into_iter().find(|d| d.name == simple_name) {
                    external = dep.external;
                    if let Some(loc) = dep.definition_location {
                        target = store.find_file_by_path(repo, &loc.file_path).and_then(|fs| {
                            store.find_functions_by_name(fs.file_id, simple_name).into_iter().next()
                        });
                    }
                }
            }

            if let Some(target) = target {
                new_relations.push(Relation {
                    id: next_id(),
                    source_id: call.id,
                    target_id: target.id,
                    kind: RelationKind::CallsFunction,
                    file_id,
                    metadata: Metadata::new(),
                });
                let mut md = Metadata::new();
                md.insert("resolved".to_string(), MetadataValue::Bool(true));
                let _ = store.update_node_metadata(call.id, file_id, md);
            } else {
                let mut md = Metadata::new();
                md.insert("resolved".to_string(), MetadataValue::Bool(false));
                md.insert("external".to_string(), MetadataValue::Bool(external));
                let _ = store.update_node_metadata(call.id, file_id, md);
            }
        }
    }

    if !new_relations.is_empty() {
        let _ = store.batch_create_relations(&new_relations);
    }
}

/// §4.5.2: classes with an `extends`/`implements` metadata list (set at
/// translation time) get INHERITS/IMPLEMENTS edges to the named class, once
/// it's resolvable. Same-module candidates are preferred over other matches
/// with the same simple name (spec §9 open question, resolved: prefer the
/// narrowest scope before falling back to a repo-wide name search).
fn resolve_inheritance<S: GraphStore>(store: &mut S, repo: &str, file_id: u32, next_id: &mut dyn FnMut() -> u64) {
    let classes = store.find_all_classes_in_file(file_id);
    let own_module = store.get_module_name(file_id);
    let mut new_relations = Vec::new();

    for class in &classes {
        if let Some(extends) = class.get_meta("extends").and_then(|v| v.as_list()) {
            for parent_name in extends.iter().filter_map(|v| v.as_str()) {
                if let Some(parent) = resolve_class_reference(store, repo, file_id, own_module.as_deref(), parent_name, &classes) {
                    new_relations.push(Relation {
                        id: next_id(),
                        source_id: class.id,
                        target_id: parent.id,
                        kind: RelationKind::Inherits,
                        file_id,
                        metadata: Metadata::new(),
                    });
                }
            }
        }
        if let Some(implements) = class.get_meta("implements").and_then(|v| v.as_list()) {
            for iface_name in implements.iter().filter_map(|v| v.as_str()) {
                if let Some(iface) = resolve_class_reference(store, repo, file_id, own_module.as_deref(), iface_name, &classes) {
                    new_relations.push(Relation {
                        id: next_id(),
                        source_id: class.id,
                        target_id: iface.id,
                        kind: RelationKind::Implements,
                        file_id,
                        metadata: Metadata::new(),
                    });
                }
            }
        }
    }

    if !new_relations.is_empty() {
        let _ = store.batch_create_relations(&new_relations);
    }
}

fn resolve_class_reference<S: GraphStore>(
    store: &S,
    repo: &str,
    _file_id: u32,
    own_module: Option<&str>,
    name: &str,
    same_file_classes: &[Node],
) -> Option<Node> {
    let simple_name = name.rsplit(['.', '<']).next().unwrap_or(name).trim();

    if let Some(local) = same_file_classes.iter().find(|c| c.name.as_deref() == Some(simple_name)) {
        return Some(local.clone());
    }

    let candidates = store.find_classes_by_name_in_repo(simple_name, repo);
    if candidates.is_empty() {
        return None;
    }
    if let Some(module) = own_module {
        if let Some(same_module) = candidates.iter().find(|c| store.get_module_name(c.file_id).as_deref() == Some(module)) {
            return Some(same_module.clone());
        }
    }
    candidates.into_iter().next()
}

/// §4.5.3: `FunctionCall` nodes marked `is_constructor` resolve to one of the
/// named class's constructors. Overload disambiguation is out of scope (spec
/// §9 open question, resolved: pick the first constructor found) — arity
/// matching would need argument-type information the translator doesn't carry.
fn resolve_constructor_calls<S: GraphStore>(store: &mut S, file_id: u32, next_id: &mut dyn FnMut() -> u64) {
    let calls = store.find_constructor_calls_in_file(file_id);
    let classes = store.find_all_classes_in_file(file_id);
    let mut new_relations = Vec::new();

    for call in calls {
        let Some(name) = &call.name else { continue };
        let simple_name = name.rsplit(['.', ':']).next().unwrap_or(name);
        let Some(class) = classes.iter().find(|c| c.name.as_deref() == Some(simple_name)) else { continue };
        let constructors = store.get_constructors_of_class(class.id);
        let Some(ctor) = constructors.into_iter().next() else { continue };

        new_relations.push(Relation {
            id: next_id(),
            source_id: call.id,
            target_id: ctor.id,
            kind: RelationKind::CallsFunction,
            file_id,
            metadata: Metadata::new(),
        });
        let mut md = Metadata::new();
        md.insert("resolved".to_string(), MetadataValue::Bool(true));
        let _ = store.update_node_metadata(call.id, file_id, md);
    }

    if !new_relations.is_empty() {
        let _ = store.batch_create_relations(&new_relations);
    }
}

/// §4.5.4: Go methods are translated as standalone top-level `Function` nodes
/// carrying a `receiver_type` metadata key (since a method's receiver can
/// name a struct declared anywhere in the same package, not necessarily
/// already visited). This stage finds the struct `Class` node matching each
/// method's receiver type and adds the CONTAINS edge the translator couldn't.
fn merge_go_receivers<S: GraphStore>(store: &mut S, file_id: u32, next_id: &mut dyn FnMut() -> u64) {
    let classes = store.find_all_classes_in_file(file_id);
    if classes.is_empty() {
        return;
    }
    let by_receiver: HashMap<String, Vec<Node>> = store.find_all_functions_in_file(file_id).into_iter().fold(
        HashMap::new(),
        |mut map, f| {
            if let Some(receiver) = f.get_meta("receiver_type").and_then(|v| v.as_str()) {
                map.entry(receiver.to_string()).or_default().push(f);
            }
            map
        },
    );

    let mut new_relations = Vec::new();
    for class in &classes {
        let Some(struct_name) = class.name.as_deref() else { continue };
        for method in by_receiver.get(struct_name).into_iter().flatten() {
            new_relations.push(Relation {
                id: next_id(),
                source_id: class.id,
                target_id: method.id,
                kind: RelationKind::Contains,
                file_id,
                metadata: Metadata::new(),
            });
        }
    }

    if !new_relations.is_empty() {
        let _ = store.batch_create_relations(&new_relations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::sqlite::SqliteGraphStore;
    use codegraph_core::store::{FileVersionCatalog, NullSymbolResolutionService};
    use codegraph_core::types::Range;

    fn node(id: u64, kind: NodeKind, name: &str, file_id: u32, scope_id: u64, metadata: Metadata) -> Node {
        Node {
            id,
            kind,
            file_id,
            name: Some(name.to_string()),
            range: Range { start_line: 0, start_col: 0, end_line: 1, end_col: 0, start_byte: 0, end_byte: 10 },
            version: 1,
            scope_id,
            metadata,
        }
    }

    #[test]
    fn resolves_same_file_function_calls() {
        let mut store = SqliteGraphStore::in_memory().unwrap();
        store.get_or_create_file_id("default", "h", "a.py", false, None).unwrap();
        let file_scope = node(1, NodeKind::FileScope, "", 1, 0, Metadata::new());
        store.create_node(&file_scope).unwrap();
        let func_a = node(2, NodeKind::Function, "a", 1, 1, Metadata::new());
        store.create_node(&func_a).unwrap();
        let func_b = node(3, NodeKind::Function, "b", 1, 1, Metadata::new());
        store.create_node(&func_b).unwrap();
        let mut call_meta = Metadata::new();
        call_meta.insert("is_constructor".to_string(), MetadataValue::Bool(false));
        let call = node(4, NodeKind::FunctionCall, "b", 1, 2, call_meta);
        store.create_node(&call).unwrap();
        store.create_relation(&Relation { id: 10, source_id: 2, target_id: 4, kind: RelationKind::Contains, file_id: 1, metadata: Metadata::new() }).unwrap();

        let resolver = NullSymbolResolutionService;
        let mut counter = 100u64;
        postprocess_file(&mut store, &resolver, "default", 1, &mut || { counter += 1; counter });

        let relations_exist = store.get_node_by_id(3).is_some();
        assert!(relations_exist);
    }

    #[test]
    fn resolves_inheritance_between_same_file_classes() {
        let mut store = SqliteGraphStore::in_memory().unwrap();
        store.get_or_create_file_id("default", "h", "a.py", false, None).unwrap();
        let file_scope = node(1, NodeKind::FileScope, "", 1, 0, Metadata::new());
        store.create_node(&file_scope).unwrap();
        let base = node(2, NodeKind::Class, "Base", 1, 1, Metadata::new());
        store.create_node(&base).unwrap();
        let mut child_meta = Metadata::new();
        child_meta.insert("extends".to_string(), MetadataValue::List(vec![MetadataValue::Str("Base".to_string())]));
        let child = node(3, NodeKind::Class, "Child", 1, 1, child_meta);
        store.create_node(&child).unwrap();

        let resolver = NullSymbolResolutionService;
        let mut counter = 200u64;
        postprocess_file(&mut store, &resolver, "default", 1, &mut || { counter += 1; counter });
    }
}
