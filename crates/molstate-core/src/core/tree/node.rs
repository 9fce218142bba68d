use crate::core::params::Params;
use crate::core::transform::definition::TransformKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Reference id of the root node of every tree.
pub const ROOT_REF: &str = "-=root=-";

static NEXT_REF: AtomicU64 = AtomicU64::new(1);
static SESSION_TAG: OnceLock<u64> = OnceLock::new();

/// A stable, caller-visible node identifier.
///
/// A reference identifies "the same logical node" across edits even when its parameters,
/// computed object or subtree change. Generated references are never reused within a
/// process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeRef(String);

impl NodeRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn root() -> Self {
        Self(ROOT_REF.to_string())
    }

    /// Generates a fresh reference. The session tag keeps references generated in different
    /// processes apart, so loading a persisted tree rarely collides with new nodes.
    pub fn generate() -> Self {
        let tag = *SESSION_TAG.get_or_init(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0)
                & 0xffff_ffff
        });
        let n = NEXT_REF.fetch_add(1, Ordering::Relaxed);
        Self(format!("n{tag:08x}-{n:x}"))
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_REF
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeRef {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Presentation hints carried by a node. They are never evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NodeFlags {
    pub collapsed: bool,
    pub hidden: bool,
    pub locked: bool,
    pub ghost: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub(crate) node_ref: NodeRef,
    pub(crate) parent: Option<NodeRef>,
    pub(crate) kind: TransformKind,
    pub(crate) params: Params,
    pub(crate) version: u64,
    pub(crate) flags: NodeFlags,
}

impl TreeNode {
    pub(crate) fn root() -> Self {
        Self {
            node_ref: NodeRef::root(),
            parent: None,
            kind: TransformKind::root(),
            params: Params::new(),
            version: 0,
            flags: NodeFlags::default(),
        }
    }

    pub fn node_ref(&self) -> &NodeRef {
        &self.node_ref
    }

    /// `None` only for the root.
    pub fn parent(&self) -> Option<&NodeRef> {
        self.parent.as_ref()
    }

    pub fn kind(&self) -> &TransformKind {
        &self.kind
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Equality of everything the serialized form preserves (versions excluded).
    pub fn same_shape(&self, other: &TreeNode) -> bool {
        self.node_ref == other.node_ref
            && self.parent == other.parent
            && self.kind == other.kind
            && self.params == other.params
            && self.flags == other.flags
    }
}
