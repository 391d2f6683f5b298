//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};

use arbor_tasks::tree;
use arbor_tasks::{TaskId, TaskStore, TreeScope};

/// Create `n` root tasks titled `t1..tn`, returning their ids in order.
pub fn create_tasks(store: &TaskStore, n: usize) -> Vec<TaskId> {
    (1..=n)
        .map(|i| store.create_task(&format!("t{i}")).unwrap().id)
        .collect()
}

/// Derive the closure the relation table must contain from its direct
/// parent rows alone, and check the whole table against it.
///
/// Covers: one self row per task, at most one direct parent per task, one
/// row per related pair with the right length, nothing for unrelated
/// pairs, and level = longest path.
pub fn assert_closure_invariants(store: &TaskStore) {
    let relations = store.all_relations().unwrap();
    let forest = store.list_forest(&TreeScope::All).unwrap();
    let tasks: Vec<(TaskId, u32)> = tree::flatten(&forest);

    let mut self_rows: BTreeMap<TaskId, usize> = BTreeMap::new();
    let mut parent: BTreeMap<TaskId, TaskId> = BTreeMap::new();
    let mut actual = BTreeSet::new();
    for rel in &relations {
        assert!(
            actual.insert((rel.ancestor_id, rel.descendant_id, rel.path_length)),
            "duplicate relation row {rel:?}"
        );
        if rel.path_length == 1 {
            assert_eq!(rel.ancestor_id, rel.descendant_id, "self row must be reflexive");
            *self_rows.entry(rel.descendant_id).or_default() += 1;
        }
        if rel.path_length == 2 {
            let previous = parent.insert(rel.descendant_id, rel.ancestor_id);
            assert!(previous.is_none(), "{} has two direct parents", rel.descendant_id);
        }
    }

    let mut expected = BTreeSet::new();
    for &(id, _) in &tasks {
        assert_eq!(self_rows.get(&id), Some(&1), "task {id} needs exactly one self row");
        let mut current = id;
        let mut length = 1;
        expected.insert((id, id, 1));
        while let Some(&up) = parent.get(&current) {
            length += 1;
            assert!(length as usize <= tasks.len(), "cycle above task {id}");
            expected.insert((up, id, length));
            current = up;
        }
        assert_eq!(store.level(id).unwrap(), length, "level of task {id}");
    }

    assert_eq!(tasks.len(), self_rows.len(), "listing lost or duplicated tasks");
    assert_eq!(actual, expected, "relation table is not the closure of its parent edges");

    // depth in the full listing is the global level
    for (id, depth) in tasks {
        assert_eq!(store.level(id).unwrap(), depth, "listed depth of task {id}");
    }
}

/// `(id, depth)` pairs of a forest as raw integers.
pub fn shape(forest: &[arbor_tasks::TaskNode]) -> Vec<(i64, u32)> {
    tree::flatten(forest)
        .into_iter()
        .map(|(id, depth)| (id.get(), depth))
        .collect()
}
