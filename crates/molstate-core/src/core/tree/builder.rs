use super::error::TreeError;
use super::node::{NodeFlags, NodeRef, TreeNode};
use super::tree::StateTree;
use crate::core::params::Params;
use crate::core::transform::definition::TransformKind;
use crate::core::transform::registry::TransformRegistry;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

/// What a committed edit batch changed, relative to its base tree.
///
/// `removed` lists only the top-most removed nodes. A node that was added and then deleted
/// within the same batch appears nowhere; a node that was added and then edited appears
/// only in `added`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    pub added: Vec<NodeRef>,
    pub updated: Vec<NodeRef>,
    pub removed: Vec<NodeRef>,
    pub decorated: Vec<NodeRef>,
}

impl ChangeSummary {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.updated.is_empty()
            && self.removed.is_empty()
            && self.decorated.is_empty()
    }

    /// True when the batch changes anything that needs recomputation.
    pub fn touches_cells(&self) -> bool {
        !(self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty())
    }
}

/// One accepted edit of the script accumulated by a [`TreeBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    Apply {
        parent: NodeRef,
        node_ref: NodeRef,
        kind: TransformKind,
    },
    UpdateParams {
        node_ref: NodeRef,
    },
    Delete {
        node_ref: NodeRef,
    },
    Reparent {
        node_ref: NodeRef,
        new_parent: NodeRef,
    },
    SetFlags {
        node_ref: NodeRef,
        flags: NodeFlags,
    },
}

/// Produces a new [`StateTree`] from a base tree through a sequence of declarative edits.
///
/// Every edit is validated when it is issued and applied to a private working tree, so
/// later edits can target nodes created by earlier ones. A rejected edit leaves the working
/// tree as it was; dropping the builder discards the whole batch. The base tree is never
/// modified.
pub struct TreeBuilder {
    base: StateTree,
    working: StateTree,
    registry: Arc<TransformRegistry>,
    edits: Vec<Edit>,
    touched: Vec<NodeRef>,
    touched_set: HashSet<NodeRef>,
}

impl TreeBuilder {
    pub fn new(base: &StateTree, registry: Arc<TransformRegistry>) -> Self {
        Self {
            base: base.clone(),
            working: base.clone(),
            registry,
            edits: Vec::new(),
            touched: Vec::new(),
            touched_set: HashSet::new(),
        }
    }

    pub fn base(&self) -> &StateTree {
        &self.base
    }

    /// The tree as it would look if the batch were committed now.
    pub fn current(&self) -> &StateTree {
        &self.working
    }

    pub fn registry(&self) -> &Arc<TransformRegistry> {
        &self.registry
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Applies transform `kind` to the output of `parent`, creating a node with a freshly
    /// generated reference.
    pub fn apply(
        &mut self,
        parent: &NodeRef,
        kind: impl Into<TransformKind>,
        params: Params,
    ) -> Result<NodeRef, TreeError> {
        self.apply_transform(parent, kind.into(), params, None)
    }

    /// Like [`apply`](Self::apply), with a caller-chosen reference.
    pub fn apply_with_ref(
        &mut self,
        parent: &NodeRef,
        kind: impl Into<TransformKind>,
        params: Params,
        node_ref: impl Into<NodeRef>,
    ) -> Result<NodeRef, TreeError> {
        self.apply_transform(parent, kind.into(), params, Some(node_ref.into()))
    }

    pub fn apply_transform(
        &mut self,
        parent: &NodeRef,
        kind: TransformKind,
        params: Params,
        explicit_ref: Option<NodeRef>,
    ) -> Result<NodeRef, TreeError> {
        let parent_node = self
            .working
            .node(parent)
            .ok_or_else(|| TreeError::UnknownParent(parent.clone()))?;
        let definition = self.registry.lookup(&kind)?;

        let node_ref = match explicit_ref {
            Some(r) if self.is_taken(&r) => return Err(TreeError::DuplicateRef(r)),
            Some(r) => r,
            None => self.fresh_ref(),
        };

        let produced = self.registry.output_kinds_of(&parent_node.kind)?;
        if !definition.accepts_any(produced) {
            return Err(TreeError::TypeMismatch {
                kind,
                parent: parent.clone(),
                accepted: definition.input_kinds().to_vec(),
                produced: produced.to_vec(),
            });
        }

        let params = definition
            .prepare_params(params)
            .map_err(|reason| TreeError::InvalidParams {
                kind: kind.clone(),
                reason,
            })?;

        trace!(parent = %parent, node = %node_ref, kind = %kind, "Builder: apply.");
        self.working.insert_node(TreeNode {
            node_ref: node_ref.clone(),
            parent: Some(parent.clone()),
            kind: kind.clone(),
            params,
            version: 0,
            flags: NodeFlags::default(),
        });
        self.touch(&node_ref);
        self.edits.push(Edit::Apply {
            parent: parent.clone(),
            node_ref: node_ref.clone(),
            kind,
        });
        Ok(node_ref)
    }

    /// Replaces the parameters of an existing node and bumps its version.
    pub fn update_params(&mut self, node_ref: &NodeRef, params: Params) -> Result<(), TreeError> {
        let node = self.working.lookup(node_ref)?;
        if node.is_root() {
            return Err(TreeError::RootImmutable);
        }
        let definition = self.registry.lookup(&node.kind)?;
        let params = definition
            .prepare_params(params)
            .map_err(|reason| TreeError::InvalidParams {
                kind: node.kind.clone(),
                reason,
            })?;

        if let Some(node) = self.working.node_mut(node_ref) {
            node.params = params;
            node.version += 1;
        }
        trace!(node = %node_ref, "Builder: update params.");
        self.touch(node_ref);
        self.edits.push(Edit::UpdateParams {
            node_ref: node_ref.clone(),
        });
        Ok(())
    }

    /// Removes a node and its entire subtree. Deleting the root is a silent no-op.
    pub fn delete(&mut self, node_ref: &NodeRef) -> Result<(), TreeError> {
        let node = self.working.lookup(node_ref)?;
        if node.is_root() {
            return Ok(());
        }
        let removed = self.working.remove_subtree(node_ref);
        trace!(node = %node_ref, count = removed.len(), "Builder: delete subtree.");
        for r in &removed {
            self.touch(r);
        }
        self.edits.push(Edit::Delete {
            node_ref: node_ref.clone(),
        });
        Ok(())
    }

    /// Moves a node (with its subtree) under a new parent.
    pub fn reparent(&mut self, node_ref: &NodeRef, new_parent: &NodeRef) -> Result<(), TreeError> {
        let node = self.working.lookup(node_ref)?;
        if !self.working.contains(new_parent) {
            return Err(TreeError::UnknownParent(new_parent.clone()));
        }
        if self.working.is_ancestor_or_self(node_ref, new_parent) {
            return Err(TreeError::Cycle {
                node: node_ref.clone(),
                new_parent: new_parent.clone(),
            });
        }
        if node.parent.as_ref() == Some(new_parent) {
            return Ok(());
        }

        let definition = self.registry.lookup(&node.kind)?;
        let parent_kind = &self.working.lookup(new_parent)?.kind;
        let produced = self.registry.output_kinds_of(parent_kind)?;
        if !definition.accepts_any(produced) {
            return Err(TreeError::TypeMismatch {
                kind: node.kind.clone(),
                parent: new_parent.clone(),
                accepted: definition.input_kinds().to_vec(),
                produced: produced.to_vec(),
            });
        }

        self.working.move_node(node_ref, new_parent);
        if let Some(node) = self.working.node_mut(node_ref) {
            node.version += 1;
        }
        trace!(node = %node_ref, new_parent = %new_parent, "Builder: reparent.");
        self.touch(node_ref);
        self.edits.push(Edit::Reparent {
            node_ref: node_ref.clone(),
            new_parent: new_parent.clone(),
        });
        Ok(())
    }

    /// Replaces a node's presentation flags. Flags are never evaluated, so the version is
    /// left as it is.
    pub fn set_flags(&mut self, node_ref: &NodeRef, flags: NodeFlags) -> Result<(), TreeError> {
        self.working.lookup(node_ref)?;
        if let Some(node) = self.working.node_mut(node_ref) {
            node.flags = flags;
        }
        self.touch(node_ref);
        self.edits.push(Edit::SetFlags {
            node_ref: node_ref.clone(),
            flags,
        });
        Ok(())
    }

    pub fn toggle_hidden(&mut self, node_ref: &NodeRef) -> Result<(), TreeError> {
        let mut flags = self.working.lookup(node_ref)?.flags;
        flags.hidden = !flags.hidden;
        self.set_flags(node_ref, flags)
    }

    pub fn toggle_collapsed(&mut self, node_ref: &NodeRef) -> Result<(), TreeError> {
        let mut flags = self.working.lookup(node_ref)?.flags;
        flags.collapsed = !flags.collapsed;
        self.set_flags(node_ref, flags)
    }

    /// Materializes the new tree and the summary of what changed.
    pub fn commit(self) -> (StateTree, ChangeSummary) {
        let mut summary = ChangeSummary::default();
        for node_ref in &self.touched {
            match (self.base.node(node_ref), self.working.node(node_ref)) {
                (None, Some(_)) => summary.added.push(node_ref.clone()),
                (Some(before), None) => {
                    let parent_survives = before
                        .parent
                        .as_ref()
                        .is_some_and(|p| self.working.contains(p));
                    if parent_survives {
                        summary.removed.push(node_ref.clone());
                    }
                }
                (Some(before), Some(after)) => {
                    if before.version != after.version
                        || before.parent != after.parent
                        || before.params != after.params
                    {
                        summary.updated.push(node_ref.clone());
                    } else if before.flags != after.flags {
                        summary.decorated.push(node_ref.clone());
                    }
                }
                (None, None) => {}
            }
        }

        if summary.is_empty() {
            return (self.base, summary);
        }
        let mut tree = self.working;
        tree.restamp();
        (tree, summary)
    }

    fn touch(&mut self, node_ref: &NodeRef) {
        if self.touched_set.insert(node_ref.clone()) {
            self.touched.push(node_ref.clone());
        }
    }

    fn is_taken(&self, node_ref: &NodeRef) -> bool {
        self.working.contains(node_ref) || self.base.contains(node_ref)
    }

    fn fresh_ref(&self) -> NodeRef {
        loop {
            let candidate = NodeRef::generate();
            if !self.is_taken(&candidate) {
                return candidate;
            }
        }
    }
}
