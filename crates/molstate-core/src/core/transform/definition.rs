use crate::core::objects::object::{ObjectKind, StateObject};
use crate::core::params::Params;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Kind identifier of the implicit root node. It is never registered.
pub const ROOT_KIND: &str = "root";

/// Unique identifier of a transform kind, e.g. `"parse-bgf"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransformKind(String);

impl TransformKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn root() -> Self {
        Self(ROOT_KIND.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_KIND
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TransformKind {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

impl From<String> for TransformKind {
    fn from(kind: String) -> Self {
        Self(kind)
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A computation error raised by a transform. It is captured into the failing cell and
/// never aborts reconciliation of unrelated subtrees.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    #[error("Transform failed: {0}")]
    Failed(String),

    #[error("Missing required parameter '{0}'")]
    MissingParam(&'static str),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParam { name: &'static str, reason: String },

    #[error("Unexpected input object of kind '{found}'")]
    UnexpectedInput { found: ObjectKind },

    #[error("Transform '{kind}' produced an object of kind '{found}', which it does not declare")]
    UnexpectedOutput {
        kind: TransformKind,
        found: ObjectKind,
    },
}

/// Result of re-running a transform against an object it produced earlier.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The previous object is still valid; it is kept as-is.
    Unchanged,
    /// The object is replaced in place; the cell keeps its identity.
    Updated(StateObject),
    /// The previous object cannot be updated; the cell is dropped and re-applied.
    Recreate,
}

/// Everything a transform sees when asked to update a previously computed object.
#[derive(Debug, Clone, Copy)]
pub struct UpdateContext<'a> {
    pub parent: &'a Arc<StateObject>,
    /// The parent object `previous` was computed from, if known.
    pub previous_parent: Option<&'a Arc<StateObject>>,
    pub previous: &'a Arc<StateObject>,
    pub old_params: &'a Params,
    pub new_params: &'a Params,
}

impl UpdateContext<'_> {
    pub fn params_changed(&self) -> bool {
        self.old_params != self.new_params
    }

    /// `true` unless the parent is the very object `previous` was computed from.
    pub fn parent_changed(&self) -> bool {
        self.previous_parent
            .is_none_or(|p| !Arc::ptr_eq(p, self.parent))
    }

    /// Neither the params nor the parent changed since `previous` was computed.
    pub fn inputs_unchanged(&self) -> bool {
        !self.params_changed() && !self.parent_changed()
    }
}

/// The computational side of a transform definition.
pub trait Transformer: Send + Sync {
    /// Produces a new object from the parent's object.
    fn apply(&self, parent: &Arc<StateObject>, params: &Params)
    -> Result<StateObject, TransformError>;

    /// Reconciles a previously produced object with new parameters or a new parent object.
    fn update(&self, _ctx: UpdateContext<'_>) -> Result<UpdateOutcome, TransformError> {
        Ok(UpdateOutcome::Recreate)
    }

    /// Structural parameter validation, run by the tree builder before an edit is accepted.
    fn validate(&self, _params: &Params) -> Result<(), String> {
        Ok(())
    }
}

/// Adapts a plain function into a [`Transformer`] that always recreates on update.
pub struct ApplyFn<F>(pub F);

impl<F> Transformer for ApplyFn<F>
where
    F: Fn(&Arc<StateObject>, &Params) -> Result<StateObject, TransformError> + Send + Sync,
{
    fn apply(
        &self,
        parent: &Arc<StateObject>,
        params: &Params,
    ) -> Result<StateObject, TransformError> {
        (self.0)(parent, params)
    }
}

/// A registered transform: its kind, declared input/output object kinds, default
/// parameters, and the transformer that computes it.
#[derive(Clone)]
pub struct TransformDefinition {
    kind: TransformKind,
    display_name: String,
    from: Vec<ObjectKind>,
    to: Vec<ObjectKind>,
    default_params: Params,
    transformer: Arc<dyn Transformer>,
}

impl fmt::Debug for TransformDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformDefinition")
            .field("kind", &self.kind)
            .field("display_name", &self.display_name)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("default_params", &self.default_params)
            .finish_non_exhaustive()
    }
}

impl TransformDefinition {
    pub fn new(
        kind: impl Into<TransformKind>,
        from: &[ObjectKind],
        to: &[ObjectKind],
        transformer: impl Transformer + 'static,
    ) -> Self {
        let kind = kind.into();
        Self {
            display_name: kind.to_string(),
            kind,
            from: from.to_vec(),
            to: to.to_vec(),
            default_params: Params::new(),
            transformer: Arc::new(transformer),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_default_params(mut self, params: Params) -> Self {
        self.default_params = params;
        self
    }

    pub fn kind(&self) -> &TransformKind {
        &self.kind
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn input_kinds(&self) -> &[ObjectKind] {
        &self.from
    }

    pub fn output_kinds(&self) -> &[ObjectKind] {
        &self.to
    }

    pub fn default_params(&self) -> &Params {
        &self.default_params
    }

    pub fn transformer(&self) -> &dyn Transformer {
        self.transformer.as_ref()
    }

    pub fn accepts(&self, input: ObjectKind) -> bool {
        self.from.contains(&input)
    }

    /// A transform may follow a parent if any kind the parent can produce is accepted.
    pub fn accepts_any(&self, parent_outputs: &[ObjectKind]) -> bool {
        parent_outputs.iter().any(|k| self.accepts(*k))
    }

    pub fn produces(&self, output: ObjectKind) -> bool {
        self.to.contains(&output)
    }

    /// Merges `params` over the defaults and runs the transformer's validation.
    pub fn prepare_params(&self, params: Params) -> Result<Params, String> {
        let params = params.merged_over(&self.default_params);
        self.transformer.validate(&params)?;
        Ok(params)
    }
}
