use super::error::TreeError;
use super::node::{NodeFlags, NodeRef, TreeNode};
use super::tree::StateTree;
use crate::core::params::Params;
use crate::core::transform::definition::TransformKind;
use im::{HashMap as PersistentMap, Vector};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerialError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("Failed to encode tree as TOML: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("Failed to decode tree from TOML: {0}")]
    Decode(#[from] toml::de::Error),
}

/// One node of a [`SerializedTree`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(rename = "ref")]
    pub node_ref: NodeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_ref: Option<NodeRef>,
    pub kind: TransformKind,
    #[serde(default)]
    pub flags: NodeFlags,
    #[serde(default)]
    pub params: Params,
}

/// The plain, persistable form of a [`StateTree`]: shape, transform kinds, parameters and
/// flags. Computed objects and node versions are not part of it.
///
/// Records are listed in pre-order, root first, so every parent precedes its children and
/// sibling order is the record order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedTree {
    pub root_ref: NodeRef,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
}

impl SerializedTree {
    pub fn to_toml(&self) -> Result<String, SerialError> {
        Ok(toml::to_string(self)?)
    }

    pub fn from_toml(input: &str) -> Result<Self, SerialError> {
        Ok(toml::from_str(input)?)
    }
}

impl StateTree {
    pub fn to_serializable(&self) -> SerializedTree {
        let nodes = self
            .pre_order()
            .into_iter()
            .map(|node| NodeRecord {
                node_ref: node.node_ref.clone(),
                parent_ref: node.parent.clone(),
                kind: node.kind.clone(),
                flags: node.flags,
                params: node.params.clone(),
            })
            .collect();
        SerializedTree {
            root_ref: self.root_ref().clone(),
            nodes,
        }
    }

    /// Rebuilds a tree from its serialized form. All node versions start at zero.
    ///
    /// Records may come in any order; children keep their relative record order. Fails on
    /// duplicate references, parents that do not exist, a missing root record and records
    /// that cannot reach the root.
    pub fn from_serializable(serialized: &SerializedTree) -> Result<StateTree, TreeError> {
        let root_ref = &serialized.root_ref;
        let mut records: HashMap<&NodeRef, &NodeRecord> = HashMap::new();
        for record in &serialized.nodes {
            if records.insert(&record.node_ref, record).is_some() {
                return Err(TreeError::DuplicateRef(record.node_ref.clone()));
            }
        }
        if !records.contains_key(root_ref) {
            return Err(TreeError::MissingRoot(root_ref.clone()));
        }

        let mut nodes = PersistentMap::new();
        let mut children: PersistentMap<NodeRef, Vector<NodeRef>> = PersistentMap::new();
        for record in &serialized.nodes {
            children.insert(record.node_ref.clone(), Vector::new());
        }

        for record in &serialized.nodes {
            let is_root = &record.node_ref == root_ref;
            // A parentless non-root record stays detached and fails the reachability check.
            let parent = match (&record.parent_ref, is_root) {
                (Some(parent), false) => {
                    if !records.contains_key(parent) {
                        return Err(TreeError::UnknownParent(parent.clone()));
                    }
                    if let Some(siblings) = children.get_mut(parent) {
                        siblings.push_back(record.node_ref.clone());
                    }
                    Some(parent.clone())
                }
                _ => None,
            };
            let kind = if is_root {
                TransformKind::root()
            } else {
                record.kind.clone()
            };
            nodes.insert(
                record.node_ref.clone(),
                TreeNode {
                    node_ref: record.node_ref.clone(),
                    parent,
                    kind,
                    params: record.params.clone(),
                    version: 0,
                    flags: record.flags,
                },
            );
        }

        let tree = StateTree::from_parts(root_ref.clone(), nodes, children);
        let reachable: HashSet<NodeRef> = tree.subtree_refs(root_ref).into_iter().collect();
        if let Some(orphan) = serialized
            .nodes
            .iter()
            .find(|record| !reachable.contains(&record.node_ref))
        {
            return Err(TreeError::Cycle {
                node: orphan.node_ref.clone(),
                new_parent: orphan.parent_ref.clone().unwrap_or_else(|| root_ref.clone()),
            });
        }
        Ok(tree)
    }
}
