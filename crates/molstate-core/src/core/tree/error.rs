use super::node::NodeRef;
use crate::core::objects::object::ObjectKind;
use crate::core::transform::definition::TransformKind;
use crate::core::transform::registry::RegistryError;
use thiserror::Error;

/// Structural errors. Any of these rejects the whole edit batch; the base tree is left
/// untouched and no reconciliation runs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TreeError {
    #[error("Parent node '{0}' does not exist")]
    UnknownParent(NodeRef),

    #[error("Node '{0}' does not exist")]
    UnknownRef(NodeRef),

    #[error("A node with reference '{0}' already exists")]
    DuplicateRef(NodeRef),

    #[error("Moving '{node}' under '{new_parent}' would create a cycle")]
    Cycle { node: NodeRef, new_parent: NodeRef },

    #[error(
        "Transform '{kind}' accepts {accepted:?} but parent '{parent}' produces {produced:?}"
    )]
    TypeMismatch {
        kind: TransformKind,
        parent: NodeRef,
        accepted: Vec<ObjectKind>,
        produced: Vec<ObjectKind>,
    },

    #[error("Invalid parameters for transform '{kind}': {reason}")]
    InvalidParams { kind: TransformKind, reason: String },

    #[error("The root node cannot be modified")]
    RootImmutable,

    #[error("Serialized tree has no record for root '{0}'")]
    MissingRoot(NodeRef),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
