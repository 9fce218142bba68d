mod common;

use molstate::core::objects::object::ObjectKind;
use molstate::core::params::Params;
use molstate::core::tree::node::NodeRef;
use molstate::engine::cell::CellStatus;
use molstate::engine::query::Query;
use molstate::engine::state::State;
use molstate::engine::transaction::StateHandle;
use molstate::workflows::hierarchy::{HierarchyView, Level};
use molstate::workflows::transforms::{
    MODEL_FROM_TRAJECTORY, PARSE_BGF, RAW_DATA, STRUCTURE_COMPONENT, STRUCTURE_FROM_MODEL,
    builtin_registry,
};
use std::sync::Arc;

struct Pipeline {
    handle: StateHandle,
    traj: NodeRef,
    model: NodeRef,
    structure: NodeRef,
}

fn pipeline(text: String) -> Pipeline {
    let handle = StateHandle::new(State::new(Arc::new(builtin_registry().unwrap())));
    let data = handle
        .apply_transform(&NodeRef::root(), RAW_DATA, Params::new().with("text", text))
        .unwrap();
    let traj = handle.apply_transform(&data, PARSE_BGF, Params::new()).unwrap();
    let model = handle
        .apply_transform(&traj, MODEL_FROM_TRAJECTORY, Params::new())
        .unwrap();
    let structure = handle
        .apply_transform(&model, STRUCTURE_FROM_MODEL, Params::new())
        .unwrap();
    Pipeline {
        handle,
        traj,
        model,
        structure,
    }
}

fn atom_count(handle: &StateHandle, node_ref: &NodeRef) -> Option<usize> {
    handle
        .read(|s| {
            s.object(node_ref)
                .and_then(|o| o.as_structure())
                .map(|st| st.atom_count())
        })
        .unwrap()
}

#[test]
fn bgf_text_flows_down_to_components() {
    let p = pipeline(common::bgf_text());
    let water = p
        .handle
        .apply_transform(&p.structure, STRUCTURE_COMPONENT, Params::new().with("preset", "water"))
        .unwrap();
    let polymer = p
        .handle
        .apply_transform(&p.structure, STRUCTURE_COMPONENT, Params::new().with("preset", "polymer"))
        .unwrap();

    assert_eq!(atom_count(&p.handle, &p.structure), Some(5));
    assert_eq!(atom_count(&p.handle, &water), Some(1));
    assert_eq!(atom_count(&p.handle, &polymer), Some(4));

    let components = p
        .handle
        .read(|s| {
            Query::root()
                .subtree()
                .of_object_kind(ObjectKind::Component)
                .select(s)
        })
        .unwrap();
    assert_eq!(components, vec![water, polymer]);
}

#[test]
fn broken_input_fails_locally_and_recovers() {
    let p = pipeline("not a bgf file".to_string());
    let status = |r: &NodeRef| p.handle.read(|s| s.status(r)).unwrap();
    assert_eq!(status(&p.traj), Some(CellStatus::Error));
    assert_eq!(status(&p.model), Some(CellStatus::Pending));
    assert_eq!(status(&p.structure), Some(CellStatus::Pending));

    let data = p
        .handle
        .read(|s| s.tree().parent(&p.traj).cloned())
        .unwrap()
        .unwrap();
    p.handle
        .update_params(&data, Params::new().with("text", common::bgf_text()))
        .unwrap();
    assert_eq!(status(&p.traj), Some(CellStatus::Ok));
    assert_eq!(status(&p.structure), Some(CellStatus::Ok));
}

#[test]
fn hierarchy_follows_edits_through_the_event_stream() {
    let p = pipeline(common::bgf_text());
    let events = p.handle.subscribe().unwrap();
    let mut view = p.handle.read(HierarchyView::for_state).unwrap();
    assert_eq!(view.current(Level::Model), &[p.model.clone()]);
    assert_eq!(view.current(Level::Structure), &[p.structure.clone()]);

    // A second frame does not steal the selection.
    let second = p
        .handle
        .apply_transform(&p.traj, MODEL_FROM_TRAJECTORY, Params::new().with("index", 1))
        .unwrap();
    p.handle
        .read(|s| view.handle_events(&events, s))
        .unwrap();
    assert_eq!(view.hierarchy().refs(Level::Model), vec![p.model.clone(), second.clone()]);
    assert_eq!(view.current(Level::Model), &[p.model.clone()]);

    // Removing the selected model falls back to the remaining one.
    p.handle.remove_subtree(&p.model).unwrap();
    p.handle
        .read(|s| view.handle_events(&events, s))
        .unwrap();
    assert_eq!(view.current(Level::Model), &[second]);
    assert!(view.current(Level::Structure).is_empty());
}
