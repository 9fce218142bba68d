use crate::core::params::Params;
use crate::core::transform::definition::TransformKind;
use crate::core::tree::node::NodeRef;
use crate::engine::error::StateError;
use crate::engine::transaction::{StateHandle, Transaction, TransactionReport};
use tracing::{info, instrument};

/// The command surface offered to user interfaces. Every edit command is submitted as one
/// transaction.
impl StateHandle {
    #[instrument(skip_all, name = "set_current_command", fields(node_ref = %node_ref))]
    pub fn set_current(&self, node_ref: &NodeRef) -> Result<(), StateError> {
        self.write(|state| state.set_current(node_ref))?
    }

    pub fn toggle_visibility(&self, node_ref: &NodeRef) -> Result<TransactionReport, StateError> {
        let target = node_ref.clone();
        self.submit(Transaction::single("toggle visibility", move |b| {
            b.toggle_hidden(&target)
        }))
    }

    pub fn toggle_expanded(&self, node_ref: &NodeRef) -> Result<TransactionReport, StateError> {
        let target = node_ref.clone();
        self.submit(Transaction::single("toggle expanded", move |b| {
            b.toggle_collapsed(&target)
        }))
    }

    #[instrument(skip_all, name = "remove_subtree_command", fields(node_ref = %node_ref))]
    pub fn remove_subtree(&self, node_ref: &NodeRef) -> Result<TransactionReport, StateError> {
        let target = node_ref.clone();
        self.submit(Transaction::single("remove subtree", move |b| {
            b.delete(&target)
        }))
    }

    /// Applies `kind` under `parent` and returns the reference of the new node.
    #[instrument(skip_all, name = "apply_transform_command", fields(parent = %parent))]
    pub fn apply_transform(
        &self,
        parent: &NodeRef,
        kind: impl Into<TransformKind>,
        params: Params,
    ) -> Result<NodeRef, StateError> {
        let kind = kind.into();
        let node_ref = NodeRef::generate();
        let (parent, new_ref) = (parent.clone(), node_ref.clone());
        let label = format!("apply {kind}");
        self.submit(Transaction::single(label, move |b| {
            b.apply_with_ref(&parent, kind, params, new_ref).map(|_| ())
        }))?;
        info!(node_ref = %node_ref, "Transform applied.");
        Ok(node_ref)
    }

    #[instrument(skip_all, name = "update_params_command", fields(node_ref = %node_ref))]
    pub fn update_params(
        &self,
        node_ref: &NodeRef,
        params: Params,
    ) -> Result<TransactionReport, StateError> {
        let target = node_ref.clone();
        self.submit(Transaction::single("update params", move |b| {
            b.update_params(&target, params)
        }))
    }
}
