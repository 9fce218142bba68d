use super::cell::{Cell, CellId, CellStatus};
use super::config::StateConfig;
use super::error::StateError;
use super::events::{EventHub, StateEvent, Subscription};
use super::history::TreeHistory;
use super::progress::{Progress, ProgressReporter};
use super::transaction::{CancellationToken, Transaction, TransactionReport};
use crate::core::objects::object::StateObject;
use crate::core::params::Params;
use crate::core::transform::definition::{
    TransformDefinition, TransformError, TransformKind, UpdateContext, UpdateOutcome,
};
use crate::core::transform::registry::TransformRegistry;
use crate::core::tree::builder::{ChangeSummary, TreeBuilder};
use crate::core::tree::error::TreeError;
use crate::core::tree::node::{NodeRef, TreeNode};
use crate::core::tree::tree::StateTree;
use slotmap::SlotMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What one reconciliation did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub tree_version: u64,
    /// Nodes whose transform ran, in evaluation order.
    pub evaluated: Vec<NodeRef>,
    /// Every removed node, including descendants of removed subtrees.
    pub removed: Vec<NodeRef>,
    /// Nodes that ended up pending because an ancestor is not `Ok`.
    pub pending: Vec<NodeRef>,
    pub failed: Vec<NodeRef>,
    /// Nodes left pending by cancellation, to be retried by the next reconciliation.
    pub deferred: Vec<NodeRef>,
    pub cancelled: bool,
}

impl ReconcileReport {
    fn new(tree_version: u64) -> Self {
        Self {
            tree_version,
            ..Self::default()
        }
    }
}

/// Result of one transform run against a stale node.
enum Outcome {
    Unchanged,
    Replaced(StateObject),
    Recreated(StateObject),
    Applied(StateObject),
    Failed(TransformError),
}

fn checked(definition: &TransformDefinition, object: StateObject) -> Result<StateObject, TransformError> {
    if definition.produces(object.kind()) {
        Ok(object)
    } else {
        Err(TransformError::UnexpectedOutput {
            kind: definition.kind().clone(),
            found: object.kind(),
        })
    }
}

fn compute(
    definition: &TransformDefinition,
    node: &TreeNode,
    parent: &Arc<StateObject>,
    previous: Option<&Cell>,
) -> Outcome {
    let transformer = definition.transformer();
    let result = match previous.and_then(|c| Some((c.object()?, c.params(), c.input()))) {
        Some((previous, old_params, previous_parent)) => {
            let ctx = UpdateContext {
                parent,
                previous_parent,
                previous,
                old_params,
                new_params: node.params(),
            };
            match transformer.update(ctx) {
                Ok(UpdateOutcome::Unchanged) => return Outcome::Unchanged,
                Ok(UpdateOutcome::Updated(object)) => {
                    checked(definition, object).map(Outcome::Replaced)
                }
                Ok(UpdateOutcome::Recreate) => transformer
                    .apply(parent, node.params())
                    .and_then(|object| checked(definition, object))
                    .map(Outcome::Recreated),
                Err(e) => Err(e),
            }
        }
        None => transformer
            .apply(parent, node.params())
            .and_then(|object| checked(definition, object))
            .map(Outcome::Applied),
    };
    result.unwrap_or_else(Outcome::Failed)
}

/// The runtime graph: a [`StateTree`] bound to one live [`Cell`] per node.
///
/// All edits go through [`update`](Self::update), [`run`](Self::run) or
/// [`set_tree`](Self::set_tree). Each of them installs a new tree and reconciles the cells
/// against it, recomputing only stale cells, parents before children, and publishing one
/// event per cell transition followed by a [`StateEvent::Reconciled`] marker.
pub struct State {
    registry: Arc<TransformRegistry>,
    config: StateConfig,
    tree: StateTree,
    cells: SlotMap<CellId, Cell>,
    index: HashMap<NodeRef, CellId>,
    deferred: HashSet<NodeRef>,
    current: NodeRef,
    events: EventHub,
    history: TreeHistory,
    reporter: ProgressReporter,
}

impl State {
    pub fn new(registry: Arc<TransformRegistry>) -> Self {
        Self::with_config(registry, StateConfig::default())
    }

    pub fn with_config(registry: Arc<TransformRegistry>, config: StateConfig) -> Self {
        let tree = StateTree::new();
        let root_ref = tree.root_ref().clone();
        let mut cells = SlotMap::with_key();
        let id = cells.insert_with_key(|id| {
            let mut cell = Cell::pending(id, root_ref.clone(), TransformKind::root());
            cell.set_ok(Arc::new(StateObject::root()), Params::new(), 0);
            cell
        });
        let mut index = HashMap::new();
        index.insert(root_ref.clone(), id);

        Self {
            registry,
            history: TreeHistory::new(config.history_depth),
            config,
            tree,
            cells,
            index,
            deferred: HashSet::new(),
            current: root_ref,
            events: EventHub::new(),
            reporter: ProgressReporter::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: ProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn registry(&self) -> &Arc<TransformRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    pub fn tree(&self) -> &StateTree {
        &self.tree
    }

    /// A builder against the current tree.
    pub fn build(&self) -> TreeBuilder {
        TreeBuilder::new(&self.tree, Arc::clone(&self.registry))
    }

    pub fn subscribe(&mut self) -> Subscription {
        self.events.subscribe()
    }

    pub fn cell(&self, node_ref: &NodeRef) -> Option<&Cell> {
        self.index.get(node_ref).and_then(|id| self.cells.get(*id))
    }

    pub fn cell_by_id(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id)
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn status(&self, node_ref: &NodeRef) -> Option<CellStatus> {
        self.cell(node_ref).map(Cell::status)
    }

    /// The computed object of `node_ref`, present only when its cell is `Ok`.
    pub fn object(&self, node_ref: &NodeRef) -> Option<&Arc<StateObject>> {
        self.cell(node_ref).and_then(Cell::object)
    }

    /// Refs left pending by a cancelled reconciliation.
    pub fn deferred(&self) -> impl Iterator<Item = &NodeRef> {
        self.deferred.iter()
    }

    pub fn current(&self) -> &NodeRef {
        &self.current
    }

    pub fn set_current(&mut self, node_ref: &NodeRef) -> Result<(), StateError> {
        if !self.tree.contains(node_ref) {
            return Err(TreeError::UnknownRef(node_ref.clone()).into());
        }
        if &self.current != node_ref {
            self.current = node_ref.clone();
            self.events.publish(StateEvent::CurrentChanged {
                node_ref: node_ref.clone(),
            });
        }
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Commits `builder` and reconciles.
    pub fn update(&mut self, builder: TreeBuilder) -> Result<ReconcileReport, StateError> {
        self.update_with(builder, &CancellationToken::new())
    }

    /// Like [`update`](Self::update), checking `token` between cell evaluations.
    ///
    /// The builder must have been created against the current tree; a builder that raced
    /// with another commit is rejected with [`StateError::StaleBuilder`].
    pub fn update_with(
        &mut self,
        builder: TreeBuilder,
        token: &CancellationToken,
    ) -> Result<ReconcileReport, StateError> {
        let builder_version = builder.base().version();
        if builder_version != self.tree.version() {
            return Err(StateError::StaleBuilder {
                builder: builder_version,
                current: self.tree.version(),
            });
        }
        let (tree, summary) = builder.commit();
        let before = self.tree.clone();
        let report = self.install(tree, summary, token);
        self.record(before);
        Ok(report)
    }

    /// Runs a multi-step transaction.
    ///
    /// All steps are validated first; a structural error in any of them rejects the whole
    /// transaction and leaves the tree untouched. The steps are then committed and
    /// reconciled one after the other. If `token` is cancelled, the step in progress keeps
    /// the cells it already evaluated and later steps are not committed.
    #[instrument(skip_all, name = "transaction", fields(label = %transaction.label()))]
    pub fn run(
        &mut self,
        transaction: Transaction,
        token: &CancellationToken,
    ) -> Result<TransactionReport, StateError> {
        let (label, steps) = transaction.into_steps();

        let mut staged = Vec::with_capacity(steps.len());
        let mut base = self.tree.clone();
        for step in steps {
            let mut builder = TreeBuilder::new(&base, Arc::clone(&self.registry));
            step(&mut builder)?;
            let (tree, summary) = builder.commit();
            base = tree.clone();
            staged.push((tree, summary));
        }

        self.reporter.report(Progress::TransactionStart {
            steps: staged.len(),
        });
        let before = self.tree.clone();
        let mut report = TransactionReport {
            label,
            ..TransactionReport::default()
        };
        for (index, (tree, summary)) in staged.into_iter().enumerate() {
            if token.is_cancelled() {
                report.cancelled = true;
                break;
            }
            self.reporter.report(Progress::StepStart { index });
            let step_report = self.install(tree, summary, token);
            self.reporter.report(Progress::StepFinish);
            let cancelled = step_report.cancelled;
            report.steps.push(step_report);
            if cancelled {
                report.cancelled = true;
                break;
            }
        }
        self.record(before);
        self.reporter.report(Progress::TransactionFinish);

        info!(
            steps = report.steps.len(),
            cancelled = report.cancelled,
            tree_version = self.tree.version(),
            "Transaction finished."
        );
        Ok(report)
    }

    /// Installs an arbitrary tree, e.g. one loaded from its serialized form. The change
    /// summary is computed by diffing against the current tree.
    pub fn set_tree(&mut self, tree: StateTree) -> Result<ReconcileReport, StateError> {
        if tree.root_ref() != self.tree.root_ref() {
            return Err(TreeError::MissingRoot(self.tree.root_ref().clone()).into());
        }
        let summary = StateTree::diff(&self.tree, &tree);
        let before = self.tree.clone();
        let report = self.install(tree, summary, &CancellationToken::new());
        self.record(before);
        Ok(report)
    }

    /// Restores the previous tree and recomputes its cells. Returns `None` when there is
    /// nothing to undo.
    pub fn undo(&mut self) -> Option<ReconcileReport> {
        let previous = self.history.undo(&self.tree)?;
        let summary = StateTree::diff(&self.tree, &previous);
        Some(self.install(previous, summary, &CancellationToken::new()))
    }

    pub fn redo(&mut self) -> Option<ReconcileReport> {
        let next = self.history.redo(&self.tree)?;
        let summary = StateTree::diff(&self.tree, &next);
        Some(self.install(next, summary, &CancellationToken::new()))
    }

    fn record(&mut self, before: StateTree) {
        if before.version() != self.tree.version() {
            self.history.record(before);
        }
    }

    fn install(
        &mut self,
        tree: StateTree,
        summary: ChangeSummary,
        token: &CancellationToken,
    ) -> ReconcileReport {
        if summary.is_empty() && self.deferred.is_empty() {
            return ReconcileReport::new(self.tree.version());
        }
        info!(
            added = summary.added.len(),
            updated = summary.updated.len(),
            removed = summary.removed.len(),
            "Committing tree."
        );
        let previous = std::mem::replace(&mut self.tree, tree);
        self.reconcile(&previous, &summary, token)
    }

    #[instrument(skip_all, fields(tree_version = self.tree.version()))]
    fn reconcile(
        &mut self,
        previous: &StateTree,
        summary: &ChangeSummary,
        token: &CancellationToken,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::new(self.tree.version());

        for node_ref in &summary.removed {
            // Nodes moved out of the subtree in the same batch keep their cells.
            let mut subtree = previous.subtree_refs(node_ref);
            subtree.retain(|r| !self.tree.contains(r));
            for r in &subtree {
                if let Some(id) = self.index.remove(r) {
                    self.cells.remove(id);
                }
                self.deferred.remove(r);
            }
            debug!(node = %node_ref, count = subtree.len(), "Removed cells.");
            report.removed.extend(subtree.iter().cloned());
            self.events.publish(StateEvent::CellRemoved {
                node_ref: node_ref.clone(),
                parent_ref: previous.parent(node_ref).cloned(),
                subtree,
            });
        }

        if !self.tree.contains(&self.current) {
            let fallback = previous
                .ancestors(&self.current)
                .into_iter()
                .find(|r| self.tree.contains(r))
                .unwrap_or_else(|| self.tree.root_ref().clone());
            self.current = fallback.clone();
            self.events
                .publish(StateEvent::CurrentChanged { node_ref: fallback });
        }

        for node_ref in summary.decorated.iter().chain(&summary.updated) {
            let (Some(before), Some(after)) = (previous.node(node_ref), self.tree.node(node_ref))
            else {
                continue;
            };
            if before.flags() != after.flags() {
                self.events.publish(StateEvent::CellStateChanged {
                    node_ref: node_ref.clone(),
                    flags: after.flags(),
                });
            }
        }

        let seeds: HashSet<&NodeRef> = summary
            .added
            .iter()
            .chain(&summary.updated)
            .chain(&self.deferred)
            .collect();
        let ordered: Vec<NodeRef> = self
            .tree
            .pre_order()
            .into_iter()
            .map(TreeNode::node_ref)
            .filter(|r| seeds.contains(r))
            .cloned()
            .collect();
        self.deferred.clear();

        let mut visited: HashSet<NodeRef> = HashSet::new();
        let mut remaining = ordered.into_iter();
        let mut stack: Vec<NodeRef> = Vec::new();
        loop {
            let node_ref = match stack.pop() {
                Some(r) => r,
                None => match remaining.next() {
                    Some(r) => r,
                    None => break,
                },
            };
            if visited.contains(&node_ref) {
                continue;
            }
            if token.is_cancelled() {
                report.cancelled = true;
                for r in std::iter::once(node_ref).chain(stack.drain(..).rev()).chain(remaining.by_ref()) {
                    self.defer(&r, &mut visited, &mut report);
                }
                break;
            }
            visited.insert(node_ref.clone());
            if self.evaluate(&node_ref, &mut report) {
                let children: Vec<NodeRef> = self.tree.children(&node_ref).cloned().collect();
                stack.extend(children.into_iter().rev());
            }
        }

        info!(
            evaluated = report.evaluated.len(),
            removed = report.removed.len(),
            pending = report.pending.len(),
            failed = report.failed.len(),
            deferred = report.deferred.len(),
            "Reconciliation finished."
        );
        self.events.publish(StateEvent::Reconciled {
            tree_version: report.tree_version,
        });
        report
    }

    /// Evaluates one stale node. Returns `true` when its children have to be revisited.
    fn evaluate(&mut self, node_ref: &NodeRef, report: &mut ReconcileReport) -> bool {
        let Some(node) = self.tree.node(node_ref).cloned() else {
            return false;
        };
        let parent_object = node
            .parent()
            .and_then(|p| self.object(p))
            .cloned();
        let Some(parent_object) = parent_object else {
            return self.force_pending(&node, report);
        };

        if let Some(id) = self.index.get(node_ref).copied() {
            if self.cells.get(id).is_some_and(|c| c.kind() != node.kind()) {
                self.drop_cell(&node);
            }
        }

        let existing = self.index.get(node_ref).copied();
        let previous_status = existing.and_then(|id| self.cells.get(id)).map(Cell::status);
        let previous = existing.and_then(|id| self.cells.get(id)).cloned();

        self.reporter.report(Progress::CellStart {
            node_ref: node_ref.clone(),
        });
        if let Some(cell) = existing.and_then(|id| self.cells.get_mut(id)) {
            cell.set_processing();
        }

        let registry = Arc::clone(&self.registry);
        let outcome = match registry.lookup(node.kind()) {
            Ok(definition) => compute(
                definition,
                &node,
                &parent_object,
                previous.as_ref(),
            ),
            Err(e) => Outcome::Failed(TransformError::Failed(e.to_string())),
        };
        report.evaluated.push(node_ref.clone());

        let params = node.params().clone();
        let version = node.version();
        let revisit = match outcome {
            Outcome::Unchanged => {
                if let Some(cell) = existing.and_then(|id| self.cells.get_mut(id)) {
                    cell.refresh(params, version);
                }
                false
            }
            Outcome::Replaced(object) => {
                if let Some(cell) = existing.and_then(|id| self.cells.get_mut(id)) {
                    cell.set_ok(Arc::new(object), params, version);
                    let cell = cell.clone();
                    self.events.publish(StateEvent::CellUpdated {
                        node_ref: node_ref.clone(),
                        cell,
                    });
                }
                true
            }
            Outcome::Recreated(object) => {
                self.drop_cell(&node);
                let id = self.create_cell(&node);
                self.finish_new(id, &node, |cell| cell.set_ok(Arc::new(object), params, version));
                true
            }
            Outcome::Applied(object) => {
                self.settle(existing, previous_status, &node, |cell| {
                    cell.set_ok(Arc::new(object), params, version)
                });
                true
            }
            Outcome::Failed(error) => {
                warn!(node = %node_ref, kind = %node.kind(), error = %error, "Transform failed.");
                report.failed.push(node_ref.clone());
                self.settle(existing, previous_status, &node, |cell| {
                    cell.set_error(error.to_string(), params, version)
                });
                previous_status != Some(CellStatus::Error)
            }
        };

        if let Some(cell) = self.index.get(node_ref).and_then(|id| self.cells.get_mut(*id)) {
            cell.set_input(parent_object);
        }
        let status = self.status(node_ref).unwrap_or(CellStatus::Pending);
        debug!(node = %node_ref, status = %status, "Cell evaluated.");
        self.reporter.report(Progress::CellFinish {
            node_ref: node_ref.clone(),
            status,
        });
        revisit
    }

    /// Applies `f` to the existing cell (publishing a status change) or to a fresh cell
    /// (publishing its creation).
    fn settle(
        &mut self,
        existing: Option<CellId>,
        previous_status: Option<CellStatus>,
        node: &TreeNode,
        f: impl FnOnce(&mut Cell),
    ) {
        match (existing.and_then(|id| self.cells.get_mut(id)), previous_status) {
            (Some(cell), Some(previous)) => {
                f(cell);
                let cell = cell.clone();
                self.events.publish(StateEvent::CellStatusChanged {
                    node_ref: node.node_ref().clone(),
                    previous,
                    cell,
                });
            }
            _ => {
                let id = self.create_cell(node);
                self.finish_new(id, node, f);
            }
        }
    }

    fn create_cell(&mut self, node: &TreeNode) -> CellId {
        let node_ref = node.node_ref().clone();
        let kind = node.kind().clone();
        let id = self
            .cells
            .insert_with_key(|id| Cell::pending(id, node_ref.clone(), kind));
        self.index.insert(node_ref, id);
        id
    }

    fn finish_new(&mut self, id: CellId, node: &TreeNode, f: impl FnOnce(&mut Cell)) {
        if let Some(cell) = self.cells.get_mut(id) {
            f(cell);
            let cell = cell.clone();
            self.events.publish(StateEvent::CellCreated {
                node_ref: node.node_ref().clone(),
                parent_ref: node.parent().cloned(),
                cell,
            });
        }
    }

    /// Drops the cell of `node` alone; its descendants keep their cells.
    fn drop_cell(&mut self, node: &TreeNode) {
        if let Some(id) = self.index.remove(node.node_ref()) {
            self.cells.remove(id);
            self.events.publish(StateEvent::CellRemoved {
                node_ref: node.node_ref().clone(),
                parent_ref: node.parent().cloned(),
                subtree: vec![node.node_ref().clone()],
            });
        }
    }

    /// Forces the cell of `node` to pending. Returns `true` if anything changed.
    fn force_pending(&mut self, node: &TreeNode, report: &mut ReconcileReport) -> bool {
        match self.index.get(node.node_ref()).copied() {
            Some(id) => {
                let Some(cell) = self.cells.get_mut(id) else {
                    return false;
                };
                let previous = cell.status();
                if previous == CellStatus::Pending {
                    return false;
                }
                cell.set_pending();
                let cell = cell.clone();
                debug!(node = %node.node_ref(), "Cell forced to pending.");
                report.pending.push(node.node_ref().clone());
                self.events.publish(StateEvent::CellStatusChanged {
                    node_ref: node.node_ref().clone(),
                    previous,
                    cell,
                });
                true
            }
            None => {
                let id = self.create_cell(node);
                report.pending.push(node.node_ref().clone());
                self.finish_new(id, node, |_| {});
                true
            }
        }
    }

    /// Leaves `node_ref` and its subtree pending after a cancellation and remembers it for
    /// the next reconciliation.
    fn defer(&mut self, node_ref: &NodeRef, visited: &mut HashSet<NodeRef>, report: &mut ReconcileReport) {
        if visited.contains(node_ref) {
            return;
        }
        self.deferred.insert(node_ref.clone());
        report.deferred.push(node_ref.clone());
        for r in self.tree.subtree_refs(node_ref) {
            if !visited.insert(r.clone()) {
                continue;
            }
            if let Some(node) = self.tree.node(&r).cloned() {
                self.force_pending(&node, report);
            }
        }
    }
}
