mod common;

use molstate::core::params::Params;
use molstate::core::tree::error::TreeError;
use molstate::core::tree::node::NodeRef;
use molstate::core::tree::serial::SerializedTree;
use molstate::core::tree::tree::StateTree;
use molstate::engine::cell::CellStatus;
use molstate::engine::progress::{Progress, ProgressReporter};
use molstate::engine::state::State;
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

fn shape() -> impl Strategy<Value = Vec<usize>> {
    vec(0usize..64, 1..24)
}

/// A state over the common registry whose progress events land in the returned log.
fn recording_state() -> (State, Arc<Mutex<Vec<Progress>>>) {
    let log: Arc<Mutex<Vec<Progress>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let reporter = ProgressReporter::with_callback(Box::new(move |event: Progress| {
        sink.lock().unwrap().push(event);
    }));
    (State::new(common::registry()).with_reporter(reporter), log)
}

/// Checks one reconciliation pass: cells run one at a time, at most once each, and only
/// after their parent settled `Ok`, either earlier in the pass or before it.
fn parents_settle_first(state: &State, log: &[Progress]) -> Result<(), TestCaseError> {
    let mut finished: HashMap<NodeRef, CellStatus> = HashMap::new();
    let mut running: Option<&NodeRef> = None;
    for (i, event) in log.iter().enumerate() {
        match event {
            Progress::CellStart { node_ref } => {
                prop_assert!(running.is_none(), "{} started while another cell ran", node_ref);
                prop_assert!(!finished.contains_key(node_ref), "{} ran twice", node_ref);
                let parent = state
                    .tree()
                    .parent(node_ref)
                    .cloned()
                    .ok_or_else(|| TestCaseError::fail(format!("{node_ref} has no parent")))?;
                match finished.get(&parent) {
                    Some(status) => prop_assert_eq!(*status, CellStatus::Ok),
                    None => {
                        let runs_later = log[i..].iter().any(
                            |e| matches!(e, Progress::CellStart { node_ref } if *node_ref == parent),
                        );
                        prop_assert!(!runs_later, "{} ran before its parent {}", node_ref, parent);
                        prop_assert_eq!(state.status(&parent), Some(CellStatus::Ok));
                    }
                }
                running = Some(node_ref);
            }
            Progress::CellFinish { node_ref, status } => {
                prop_assert_eq!(running.take(), Some(node_ref));
                finished.insert(node_ref.clone(), *status);
            }
            _ => {}
        }
    }
    prop_assert!(running.is_none());
    Ok(())
}

proptest! {
    #[test]
    fn serialized_tree_round_trips(parents in shape(), hide in vec(any::<bool>(), 24)) {
        let mut state = common::grow(&parents, &[]);
        let mut b = state.build();
        for i in 0..parents.len() {
            if hide[i] {
                b.toggle_hidden(&format!("n{i}").into()).unwrap();
            }
        }
        state.update(b).unwrap();
        let tree = state.tree();

        let restored = StateTree::from_serializable(&tree.to_serializable()).unwrap();
        prop_assert!(restored.structurally_eq(tree));

        let text = tree.to_serializable().to_toml().unwrap();
        let parsed = SerializedTree::from_toml(&text).unwrap();
        let restored = StateTree::from_serializable(&parsed).unwrap();
        prop_assert!(restored.structurally_eq(tree));
    }

    #[test]
    fn reparenting_under_a_descendant_is_a_cycle(parents in shape(), node in 0usize..64, pick in 0usize..64) {
        let state = common::grow(&parents, &[]);
        let node_ref = NodeRef::from(format!("n{}", node % parents.len()));
        let subtree = state.tree().subtree_refs(&node_ref);
        let target = subtree[pick % subtree.len()].clone();

        let mut b = state.build();
        let result = b.reparent(&node_ref, &target);
        let is_cycle = matches!(result, Err(TreeError::Cycle { .. }));
        prop_assert!(is_cycle);
        prop_assert!(b.current().structurally_eq(state.tree()));
        prop_assert!(b.is_empty());
    }

    #[test]
    fn descendants_of_failed_cells_stay_pending(
        parents in shape(),
        failing in vec(proptest::bool::weighted(0.2), 24),
    ) {
        let state = common::grow(&parents, &failing);
        let tree = state.tree();
        for node in tree.pre_order() {
            let status = state.status(node.node_ref());
            let ancestors = tree.ancestors(node.node_ref());
            let blocked = ancestors
                .iter()
                .any(|a| state.status(a) != Some(CellStatus::Ok));
            if blocked {
                prop_assert_eq!(status, Some(CellStatus::Pending));
            } else {
                prop_assert!(status.is_some_and(CellStatus::is_terminal));
            }
        }
    }

    #[test]
    fn updating_params_leaves_other_nodes_untouched(parents in shape(), node in 0usize..64) {
        let mut state = common::grow(&parents, &[]);
        let target = NodeRef::from(format!("n{}", node % parents.len()));
        let before = state.tree().clone();

        let mut b = state.build();
        b.update_params(&target, Params::new().with("edited", true)).unwrap();
        state.update(b).unwrap();
        let after = state.tree();

        for old in before.pre_order() {
            let r = old.node_ref();
            let new = after.node(r).unwrap();
            prop_assert_eq!(before.child_list(r), after.child_list(r));
            prop_assert_eq!(old.parent(), new.parent());
            if r == &target {
                prop_assert!(new.version() > old.version());
            } else {
                prop_assert_eq!(old, new);
            }
        }
    }

    #[test]
    fn cells_are_computed_after_their_parents(
        parents in shape(),
        failing in vec(proptest::bool::weighted(0.2), 24),
        node in 0usize..64,
        fail in any::<bool>(),
    ) {
        let (state, log) = recording_state();
        let mut state = common::grow_into(state, &parents, &failing);
        let first = std::mem::take(&mut *log.lock().unwrap());
        prop_assert!(!first.is_empty());
        parents_settle_first(&state, &first)?;

        let target = NodeRef::from(format!("n{}", node % parents.len()));
        let mut b = state.build();
        b.update_params(&target, Params::new().with("fail", fail)).unwrap();
        state.update(b).unwrap();
        let second = std::mem::take(&mut *log.lock().unwrap());
        parents_settle_first(&state, &second)?;
    }
}
