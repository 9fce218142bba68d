use crate::core::objects::object::StateObject;
use crate::core::params::Params;
use crate::core::transform::definition::TransformKind;
use crate::core::tree::node::NodeRef;
use slotmap::new_key_type;
use std::fmt;
use std::sync::Arc;

new_key_type! {
    /// Identity of a live cell. A cell keeps its id across in-place updates; a recreated
    /// cell gets a new one.
    pub struct CellId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellStatus {
    /// Not evaluated, usually because an ancestor is not `Ok`.
    Pending,
    /// The transform is running.
    Processing,
    Ok,
    Error,
}

impl CellStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, CellStatus::Ok | CellStatus::Error)
    }
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CellStatus::Pending => "pending",
            CellStatus::Processing => "processing",
            CellStatus::Ok => "ok",
            CellStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// The runtime pairing of one tree node with its computed object.
///
/// The object is present when the status is `Ok` and kept while a re-run is `Processing`;
/// the error detail is present iff the status is `Error`.
/// `params`, `source_version` and `input` record the inputs of the last evaluation, so the
/// next update sees what the current object was computed from.
#[derive(Debug, Clone)]
pub struct Cell {
    id: CellId,
    node_ref: NodeRef,
    kind: TransformKind,
    status: CellStatus,
    object: Option<Arc<StateObject>>,
    error: Option<String>,
    params: Params,
    source_version: u64,
    input: Option<Arc<StateObject>>,
}

impl Cell {
    pub(crate) fn pending(id: CellId, node_ref: NodeRef, kind: TransformKind) -> Self {
        Self {
            id,
            node_ref,
            kind,
            status: CellStatus::Pending,
            object: None,
            error: None,
            params: Params::new(),
            source_version: 0,
            input: None,
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn node_ref(&self) -> &NodeRef {
        &self.node_ref
    }

    pub fn kind(&self) -> &TransformKind {
        &self.kind
    }

    pub fn status(&self) -> CellStatus {
        self.status
    }

    pub fn object(&self) -> Option<&Arc<StateObject>> {
        self.object.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Version of the tree node this cell was last evaluated against.
    pub fn source_version(&self) -> u64 {
        self.source_version
    }

    /// The parent object of the last evaluation.
    pub fn input(&self) -> Option<&Arc<StateObject>> {
        self.input.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.status == CellStatus::Ok
    }

    pub(crate) fn set_ok(&mut self, object: Arc<StateObject>, params: Params, version: u64) {
        self.status = CellStatus::Ok;
        self.object = Some(object);
        self.error = None;
        self.params = params;
        self.source_version = version;
    }

    /// Records an `Unchanged` outcome: the object stays, the inputs are refreshed.
    pub(crate) fn refresh(&mut self, params: Params, version: u64) {
        self.status = CellStatus::Ok;
        self.params = params;
        self.source_version = version;
    }

    pub(crate) fn set_error(&mut self, error: String, params: Params, version: u64) {
        self.status = CellStatus::Error;
        self.object = None;
        self.error = Some(error);
        self.params = params;
        self.source_version = version;
    }

    pub(crate) fn set_input(&mut self, parent: Arc<StateObject>) {
        self.input = Some(parent);
    }

    pub(crate) fn set_pending(&mut self) {
        self.status = CellStatus::Pending;
        self.object = None;
        self.error = None;
        self.input = None;
    }

    pub(crate) fn set_processing(&mut self) {
        self.status = CellStatus::Processing;
    }
}
