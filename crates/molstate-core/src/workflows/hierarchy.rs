use crate::core::objects::object::ObjectKind;
use crate::core::tree::node::{NodeFlags, NodeRef};
use crate::engine::cell::Cell;
use crate::engine::config::SelectionPolicy;
use crate::engine::events::Subscription;
use crate::engine::state::State;
use std::collections::HashSet;
use tracing::{debug, instrument};

/// A level of the trajectory → model → structure → component projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Trajectory,
    Model,
    Structure,
    Component,
}

impl Level {
    pub const ALL: [Level; 4] = [
        Level::Trajectory,
        Level::Model,
        Level::Structure,
        Level::Component,
    ];

    pub fn of(kind: ObjectKind) -> Option<Self> {
        match kind {
            ObjectKind::Trajectory => Some(Level::Trajectory),
            ObjectKind::Model => Some(Level::Model),
            ObjectKind::Structure => Some(Level::Structure),
            ObjectKind::Component => Some(Level::Component),
            _ => None,
        }
    }

    /// The level whose selection scopes this level's candidates.
    pub fn owner(self) -> Option<Self> {
        match self {
            Level::Trajectory => None,
            Level::Model => Some(Level::Trajectory),
            Level::Structure => Some(Level::Model),
            Level::Component => Some(Level::Structure),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyEntry {
    pub node_ref: NodeRef,
    /// Nearest ancestor entry on the owning level.
    pub owner: Option<NodeRef>,
    pub label: String,
    pub flags: NodeFlags,
}

/// Typed projection of the settled cells of a [`State`], in tree pre-order per level.
///
/// Only cells with status `Ok` appear; a pending or failed node has no object to project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hierarchy {
    levels: [Vec<HierarchyEntry>; 4],
}

fn level_of(state: &State, node_ref: &NodeRef) -> Option<Level> {
    state
        .cell(node_ref)
        .filter(|cell| cell.is_ok())
        .and_then(Cell::object)
        .and_then(|object| Level::of(object.kind()))
}

impl Hierarchy {
    pub fn derive(state: &State) -> Self {
        let tree = state.tree();
        let mut hierarchy = Self::default();
        for node in tree.pre_order() {
            let node_ref = node.node_ref();
            let Some(level) = level_of(state, node_ref) else {
                continue;
            };
            let Some(object) = state.object(node_ref) else {
                continue;
            };
            let owner = level.owner().and_then(|up| {
                tree.ancestors(node_ref)
                    .into_iter()
                    .find(|a| level_of(state, a) == Some(up))
            });
            hierarchy.levels[level.index()].push(HierarchyEntry {
                node_ref: node_ref.clone(),
                owner,
                label: object.label().to_string(),
                flags: node.flags(),
            });
        }
        hierarchy
    }

    pub fn entries(&self, level: Level) -> &[HierarchyEntry] {
        &self.levels[level.index()]
    }

    pub fn refs(&self, level: Level) -> Vec<NodeRef> {
        self.entries(level)
            .iter()
            .map(|e| e.node_ref.clone())
            .collect()
    }

    pub fn entry(&self, node_ref: &NodeRef) -> Option<(Level, &HierarchyEntry)> {
        Level::ALL.into_iter().find_map(|level| {
            self.entries(level)
                .iter()
                .find(|e| &e.node_ref == node_ref)
                .map(|e| (level, e))
        })
    }

    pub fn len(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries of `level` owned by one of `owners`. The top level has no owner filter.
    pub fn candidates(&self, level: Level, owners: &[NodeRef]) -> Vec<NodeRef> {
        let entries = self.entries(level).iter();
        if level.owner().is_none() {
            return entries.map(|e| e.node_ref.clone()).collect();
        }
        entries
            .filter(|e| e.owner.as_ref().is_some_and(|o| owners.contains(o)))
            .map(|e| e.node_ref.clone())
            .collect()
    }

    /// `refs` together with every owner above them.
    fn with_owners(&self, refs: &[NodeRef]) -> HashSet<NodeRef> {
        let mut out = HashSet::new();
        for node_ref in refs {
            let mut next = Some(node_ref.clone());
            while let Some(current) = next.take() {
                if !out.insert(current.clone()) {
                    break;
                }
                next = self.entry(&current).and_then(|(_, e)| e.owner.clone());
            }
        }
        out
    }
}

/// Carries a selection over to a new candidate pool.
///
/// Pending refs present in the pool win outright. Otherwise every previously selected ref
/// still in the pool is kept; if none is, [`SelectionPolicy::NeverEmpty`] falls back to the
/// first candidate.
pub fn resync(
    previous: &[NodeRef],
    candidates: &[NodeRef],
    pending: &HashSet<NodeRef>,
    policy: SelectionPolicy,
) -> Vec<NodeRef> {
    let chosen: Vec<NodeRef> = candidates
        .iter()
        .filter(|c| pending.contains(*c))
        .cloned()
        .collect();
    if !chosen.is_empty() {
        return chosen;
    }

    let pool: HashSet<&NodeRef> = candidates.iter().collect();
    let mut seen = HashSet::new();
    let kept: Vec<NodeRef> = previous
        .iter()
        .filter(|r| pool.contains(r) && seen.insert(*r))
        .cloned()
        .collect();
    match (kept.is_empty(), policy, candidates.first()) {
        (true, SelectionPolicy::NeverEmpty, Some(first)) => vec![first.clone()],
        _ => kept,
    }
}

/// Derived hierarchy plus the "current" selection on each level.
///
/// The view is re-derived in full once per reconciliation batch. Lower levels draw their
/// candidates from the entries owned by the current selection one level up.
#[derive(Debug, Clone)]
pub struct HierarchyView {
    policy: SelectionPolicy,
    hierarchy: Hierarchy,
    selection: [Vec<NodeRef>; 4],
    pending: Option<Vec<NodeRef>>,
    synced_version: Option<u64>,
}

impl HierarchyView {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self {
            policy,
            hierarchy: Hierarchy::default(),
            selection: Default::default(),
            pending: None,
            synced_version: None,
        }
    }

    /// A view using the state's configured policy, synced to its current cells.
    pub fn for_state(state: &State) -> Self {
        let mut view = Self::new(state.config().selection_policy);
        view.sync(state);
        view
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn current(&self, level: Level) -> &[NodeRef] {
        &self.selection[level.index()]
    }

    pub fn synced_version(&self) -> Option<u64> {
        self.synced_version
    }

    /// Refs to make current on the next sync, e.g. nodes about to be created. Their owners
    /// become current too. The override is consumed by that sync whether or not the refs
    /// showed up.
    pub fn set_pending(&mut self, refs: impl IntoIterator<Item = NodeRef>) {
        self.pending = Some(refs.into_iter().collect());
    }

    pub fn pending(&self) -> Option<&[NodeRef]> {
        self.pending.as_deref()
    }

    /// Replaces the selection on `level` and re-derives the levels below it.
    pub fn select(&mut self, level: Level, refs: &[NodeRef]) {
        let known: HashSet<NodeRef> = self.hierarchy.refs(level).into_iter().collect();
        self.selection[level.index()] = refs
            .iter()
            .filter(|r| known.contains(*r))
            .cloned()
            .collect();
        self.resync_levels(level.index() + 1, &HashSet::new());
    }

    #[instrument(skip_all, name = "hierarchy_sync")]
    pub fn sync(&mut self, state: &State) {
        self.hierarchy = Hierarchy::derive(state);
        let pending = self
            .pending
            .take()
            .map(|refs| self.hierarchy.with_owners(&refs))
            .unwrap_or_default();
        self.resync_levels(0, &pending);
        self.synced_version = Some(state.tree().version());
        debug!(
            entries = self.hierarchy.len(),
            trajectories = self.current(Level::Trajectory).len(),
            models = self.current(Level::Model).len(),
            structures = self.current(Level::Structure).len(),
            "Hierarchy re-derived."
        );
    }

    /// Drains `subscription` and syncs once if a reconciliation batch completed.
    pub fn handle_events(&mut self, subscription: &Subscription, state: &State) -> bool {
        let batch_ended = subscription.drain().iter().any(|e| e.is_batch_end());
        if batch_ended {
            self.sync(state);
        }
        batch_ended
    }

    fn resync_levels(&mut self, from: usize, pending: &HashSet<NodeRef>) {
        for level in Level::ALL.into_iter().skip(from) {
            let owners = level
                .owner()
                .map(|up| self.selection[up.index()].clone())
                .unwrap_or_default();
            let candidates = self.hierarchy.candidates(level, &owners);
            self.selection[level.index()] = resync(
                &self.selection[level.index()],
                &candidates,
                pending,
                self.policy,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::bgf::test_support::two_frame_bgf;
    use crate::core::params::Params;
    use crate::engine::config::StateConfigBuilder;
    use crate::workflows::transforms::{
        MODEL_FROM_TRAJECTORY, PARSE_BGF, RAW_DATA, STRUCTURE_COMPONENT, STRUCTURE_FROM_MODEL,
        builtin_registry,
    };
    use proptest::prelude::*;
    use std::sync::Arc;

    fn refs(ids: &[&str]) -> Vec<NodeRef> {
        ids.iter().map(|id| NodeRef::from(*id)).collect()
    }

    /// root -> data -> traj -> m0 -> s0 -> water
    fn pipeline(policy: SelectionPolicy) -> State {
        let config = StateConfigBuilder::new()
            .selection_policy(policy)
            .build()
            .unwrap();
        let mut state = State::with_config(Arc::new(builtin_registry().unwrap()), config);
        let mut b = state.build();
        let root = NodeRef::root();
        b.apply_with_ref(&root, RAW_DATA, Params::new().with("text", two_frame_bgf()), "data")
            .unwrap();
        b.apply_with_ref(&"data".into(), PARSE_BGF, Params::new(), "traj")
            .unwrap();
        b.apply_with_ref(&"traj".into(), MODEL_FROM_TRAJECTORY, Params::new(), "m0")
            .unwrap();
        b.apply_with_ref(&"m0".into(), STRUCTURE_FROM_MODEL, Params::new(), "s0")
            .unwrap();
        b.apply_with_ref(
            &"s0".into(),
            STRUCTURE_COMPONENT,
            Params::new().with("preset", "water"),
            "water",
        )
        .unwrap();
        state.update(b).unwrap();
        state
    }

    fn add_second_model(state: &mut State) {
        let mut b = state.build();
        b.apply_with_ref(
            &"traj".into(),
            MODEL_FROM_TRAJECTORY,
            Params::new().with("index", 1),
            "m1",
        )
        .unwrap();
        b.apply_with_ref(&"m1".into(), STRUCTURE_FROM_MODEL, Params::new(), "s1")
            .unwrap();
        state.update(b).unwrap();
    }

    fn delete(state: &mut State, id: &str) {
        let mut b = state.build();
        b.delete(&id.into()).unwrap();
        state.update(b).unwrap();
    }

    #[test]
    fn derive_projects_each_level_with_owners() {
        let state = pipeline(SelectionPolicy::NeverEmpty);
        let hierarchy = Hierarchy::derive(&state);
        assert_eq!(hierarchy.refs(Level::Trajectory), refs(&["traj"]));
        assert_eq!(hierarchy.refs(Level::Model), refs(&["m0"]));
        assert_eq!(hierarchy.refs(Level::Component), refs(&["water"]));
        let (level, entry) = hierarchy.entry(&"s0".into()).unwrap();
        assert_eq!(level, Level::Structure);
        assert_eq!(entry.owner, Some(NodeRef::from("m0")));
        assert_eq!(hierarchy.entries(Level::Trajectory)[0].label, "small test system");
        assert_eq!(hierarchy.len(), 4);
    }

    #[test]
    fn failed_nodes_are_not_projected() {
        let mut state = pipeline(SelectionPolicy::NeverEmpty);
        let mut b = state.build();
        b.update_params(&"m0".into(), Params::new().with("index", 9))
            .unwrap();
        state.update(b).unwrap();
        let hierarchy = Hierarchy::derive(&state);
        assert_eq!(hierarchy.refs(Level::Trajectory), refs(&["traj"]));
        assert!(hierarchy.entries(Level::Model).is_empty());
        assert!(hierarchy.entries(Level::Structure).is_empty());
    }

    #[test]
    fn selection_carries_forward_across_edits() {
        let mut state = pipeline(SelectionPolicy::NeverEmpty);
        let mut view = HierarchyView::for_state(&state);
        assert_eq!(view.current(Level::Model), refs(&["m0"]));
        assert_eq!(view.current(Level::Component), refs(&["water"]));

        add_second_model(&mut state);
        view.sync(&state);
        assert_eq!(view.current(Level::Model), refs(&["m0"]));
        assert_eq!(view.current(Level::Structure), refs(&["s0"]));
    }

    #[test]
    fn removed_selection_falls_back_to_first_candidate() {
        let mut state = pipeline(SelectionPolicy::NeverEmpty);
        add_second_model(&mut state);
        let mut view = HierarchyView::for_state(&state);
        assert_eq!(view.current(Level::Model), refs(&["m0"]));

        delete(&mut state, "m0");
        view.sync(&state);
        assert_eq!(view.current(Level::Model), refs(&["m1"]));
        assert_eq!(view.current(Level::Structure), refs(&["s1"]));
        assert!(view.current(Level::Component).is_empty());
    }

    #[test]
    fn allow_empty_policy_keeps_selection_empty() {
        let mut state = pipeline(SelectionPolicy::AllowEmpty);
        add_second_model(&mut state);
        let mut view = HierarchyView::for_state(&state);
        // Nothing was selected before the first sync, so nothing is picked.
        assert!(view.current(Level::Trajectory).is_empty());
        assert!(view.current(Level::Model).is_empty());

        view.select(Level::Trajectory, &refs(&["traj"]));
        assert!(view.current(Level::Model).is_empty());
        view.select(Level::Model, &refs(&["m0"]));
        assert!(view.current(Level::Structure).is_empty());
        view.select(Level::Structure, &refs(&["s0"]));

        delete(&mut state, "m0");
        view.sync(&state);
        assert!(view.current(Level::Model).is_empty());
        assert!(view.current(Level::Structure).is_empty());
    }

    #[test]
    fn pending_override_wins_for_one_sync() {
        let mut state = pipeline(SelectionPolicy::NeverEmpty);
        let mut view = HierarchyView::for_state(&state);

        view.set_pending(refs(&["s1"]));
        add_second_model(&mut state);
        view.sync(&state);
        assert!(view.pending().is_none());
        assert_eq!(view.current(Level::Model), refs(&["m1"]));
        assert_eq!(view.current(Level::Structure), refs(&["s1"]));

        // The next cycle carries the override's result forward.
        view.sync(&state);
        assert_eq!(view.current(Level::Structure), refs(&["s1"]));
    }

    #[test]
    fn handle_events_syncs_once_per_batch() {
        let mut state = pipeline(SelectionPolicy::NeverEmpty);
        let mut view = HierarchyView::for_state(&state);
        let subscription = state.subscribe();
        assert!(!view.handle_events(&subscription, &state));

        add_second_model(&mut state);
        assert!(view.handle_events(&subscription, &state));
        assert_eq!(view.synced_version(), Some(state.tree().version()));
        assert_eq!(view.hierarchy().refs(Level::Model), refs(&["m0", "m1"]));
    }

    #[test]
    fn resync_prefers_pending_then_survivors() {
        let candidates = refs(&["a", "b", "c"]);
        let none = HashSet::new();
        let policy = SelectionPolicy::NeverEmpty;
        assert_eq!(resync(&refs(&["c", "x"]), &candidates, &none, policy), refs(&["c"]));
        assert_eq!(resync(&refs(&["x"]), &candidates, &none, policy), refs(&["a"]));
        let pending: HashSet<NodeRef> = refs(&["b"]).into_iter().collect();
        assert_eq!(resync(&refs(&["c"]), &candidates, &pending, policy), refs(&["b"]));
        assert!(resync(&refs(&["x"]), &[], &none, policy).is_empty());
    }

    proptest! {
        #[test]
        fn never_empty_selection_has_one_element_after_losing_all(
            pool in proptest::collection::vec("[a-f]{1,3}", 1..8),
            previous in proptest::collection::vec("[g-k]{1,3}", 0..5),
        ) {
            let candidates: Vec<NodeRef> = pool.into_iter().map(NodeRef::from).collect();
            let previous: Vec<NodeRef> = previous.into_iter().map(NodeRef::from).collect();
            let selection = resync(&previous, &candidates, &HashSet::new(), SelectionPolicy::NeverEmpty);
            prop_assert_eq!(selection, vec![candidates[0].clone()]);
        }
    }
}
