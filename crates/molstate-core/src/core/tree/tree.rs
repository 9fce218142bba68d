use super::builder::ChangeSummary;
use super::error::TreeError;
use super::node::{NodeRef, TreeNode};
use im::{HashMap as PersistentMap, Vector};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TREE_VERSION: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_tree_version() -> u64 {
    NEXT_TREE_VERSION.fetch_add(1, Ordering::Relaxed)
}

/// Immutable shape of the state graph.
///
/// Invariants: exactly one root; every non-root node has exactly one parent; no cycles;
/// the node map and the child-list map have the same key set. Both maps are persistent,
/// so cloning a tree is O(1) and a committed edit shares every untouched entry with the
/// tree it was derived from.
#[derive(Debug, Clone)]
pub struct StateTree {
    root: NodeRef,
    nodes: PersistentMap<NodeRef, TreeNode>,
    children: PersistentMap<NodeRef, Vector<NodeRef>>,
    version: u64,
}

impl Default for StateTree {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTree {
    /// A tree holding only the root node.
    pub fn new() -> Self {
        let root = TreeNode::root();
        let root_ref = root.node_ref.clone();
        let mut nodes = PersistentMap::new();
        let mut children = PersistentMap::new();
        nodes.insert(root_ref.clone(), root);
        children.insert(root_ref.clone(), Vector::new());
        Self {
            root: root_ref,
            nodes,
            children,
            version: next_tree_version(),
        }
    }

    pub(crate) fn from_parts(
        root: NodeRef,
        nodes: PersistentMap<NodeRef, TreeNode>,
        children: PersistentMap<NodeRef, Vector<NodeRef>>,
    ) -> Self {
        Self {
            root,
            nodes,
            children,
            version: next_tree_version(),
        }
    }

    pub fn root_ref(&self) -> &NodeRef {
        &self.root
    }

    /// Process-unique stamp of this tree value. Every commit produces a new one.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // The root is always present.
        false
    }

    pub fn contains(&self, node_ref: &NodeRef) -> bool {
        self.nodes.contains_key(node_ref)
    }

    pub fn node(&self, node_ref: &NodeRef) -> Option<&TreeNode> {
        self.nodes.get(node_ref)
    }

    pub fn lookup(&self, node_ref: &NodeRef) -> Result<&TreeNode, TreeError> {
        self.nodes
            .get(node_ref)
            .ok_or_else(|| TreeError::UnknownRef(node_ref.clone()))
    }

    pub fn parent(&self, node_ref: &NodeRef) -> Option<&NodeRef> {
        self.nodes.get(node_ref)?.parent.as_ref()
    }

    /// Children in insertion order; empty for leaves and unknown references.
    pub fn children(&self, node_ref: &NodeRef) -> impl Iterator<Item = &NodeRef> + '_ {
        self.children.get(node_ref).into_iter().flat_map(|c| c.iter())
    }

    pub fn child_list(&self, node_ref: &NodeRef) -> Option<&Vector<NodeRef>> {
        self.children.get(node_ref)
    }

    pub fn child_count(&self, node_ref: &NodeRef) -> usize {
        self.children.get(node_ref).map_or(0, Vector::len)
    }

    /// Pre-order traversal of the subtree rooted at `node_ref`, including it.
    pub fn subtree_refs(&self, node_ref: &NodeRef) -> Vec<NodeRef> {
        let mut out = Vec::new();
        if !self.contains(node_ref) {
            return out;
        }
        let mut stack = vec![node_ref.clone()];
        while let Some(current) = stack.pop() {
            if let Some(children) = self.children.get(&current) {
                stack.extend(children.iter().rev().cloned());
            }
            out.push(current);
        }
        out
    }

    /// Every node of the tree in pre-order, starting at the root.
    pub fn pre_order(&self) -> Vec<&TreeNode> {
        self.subtree_refs(&self.root)
            .iter()
            .filter_map(|r| self.nodes.get(r))
            .collect()
    }

    /// Ancestors of `node_ref`, nearest first, ending with the root.
    pub fn ancestors(&self, node_ref: &NodeRef) -> Vec<NodeRef> {
        let mut out = Vec::new();
        let mut current = self.parent(node_ref);
        while let Some(parent) = current {
            out.push(parent.clone());
            current = self.parent(parent);
        }
        out
    }

    pub fn depth(&self, node_ref: &NodeRef) -> Option<usize> {
        self.contains(node_ref)
            .then(|| self.ancestors(node_ref).len())
    }

    pub fn is_ancestor_or_self(&self, ancestor: &NodeRef, node_ref: &NodeRef) -> bool {
        if ancestor == node_ref {
            return self.contains(node_ref);
        }
        let mut current = self.parent(node_ref);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent(parent);
        }
        false
    }

    /// Equality of shape, parameters and flags; versions are ignored.
    pub fn structurally_eq(&self, other: &StateTree) -> bool {
        if self.root != other.root || self.nodes.len() != other.nodes.len() {
            return false;
        }
        self.nodes.iter().all(|(r, node)| {
            other.nodes.get(r).is_some_and(|o| node.same_shape(o))
                && self.children.get(r) == other.children.get(r)
        })
    }

    /// Computes the change summary between two arbitrary trees.
    ///
    /// A node present in both is `updated` when its version, parameters, kind or parent
    /// differ, and `decorated` when only its flags do. `removed` lists only the top-most
    /// removed nodes; their removed descendants are implied.
    pub fn diff(old: &StateTree, new: &StateTree) -> ChangeSummary {
        let mut summary = ChangeSummary::default();
        for node in new.pre_order() {
            match old.node(&node.node_ref) {
                None => summary.added.push(node.node_ref.clone()),
                Some(previous) => {
                    if previous.version != node.version
                        || previous.parent != node.parent
                        || previous.kind != node.kind
                        || previous.params != node.params
                    {
                        summary.updated.push(node.node_ref.clone());
                    } else if previous.flags != node.flags {
                        summary.decorated.push(node.node_ref.clone());
                    }
                }
            }
        }
        for node in old.pre_order() {
            if new.contains(&node.node_ref) {
                continue;
            }
            let parent_survives = node.parent.as_ref().is_some_and(|p| new.contains(p));
            if parent_survives {
                summary.removed.push(node.node_ref.clone());
            }
        }
        summary
    }

    pub(crate) fn node_mut(&mut self, node_ref: &NodeRef) -> Option<&mut TreeNode> {
        self.nodes.get_mut(node_ref)
    }

    /// Inserts a new node as the last child of its parent. The parent must exist.
    pub(crate) fn insert_node(&mut self, node: TreeNode) {
        let node_ref = node.node_ref.clone();
        if let Some(parent) = &node.parent {
            if let Some(siblings) = self.children.get_mut(parent) {
                siblings.push_back(node_ref.clone());
            }
        }
        self.children.insert(node_ref.clone(), Vector::new());
        self.nodes.insert(node_ref, node);
    }

    /// Removes `node_ref` and its whole subtree, returning the removed references in
    /// pre-order.
    pub(crate) fn remove_subtree(&mut self, node_ref: &NodeRef) -> Vec<NodeRef> {
        let removed = self.subtree_refs(node_ref);
        if let Some(parent) = self.parent(node_ref).cloned() {
            self.detach(&parent, node_ref);
        }
        for r in &removed {
            self.nodes.remove(r);
            self.children.remove(r);
        }
        removed
    }

    /// Moves `node_ref` to the end of `new_parent`'s child list.
    pub(crate) fn move_node(&mut self, node_ref: &NodeRef, new_parent: &NodeRef) {
        if let Some(old_parent) = self.parent(node_ref).cloned() {
            self.detach(&old_parent, node_ref);
        }
        if let Some(siblings) = self.children.get_mut(new_parent) {
            siblings.push_back(node_ref.clone());
        }
        if let Some(node) = self.nodes.get_mut(node_ref) {
            node.parent = Some(new_parent.clone());
        }
    }

    fn detach(&mut self, parent: &NodeRef, child: &NodeRef) {
        if let Some(siblings) = self.children.get_mut(parent) {
            if let Some(index) = siblings.index_of(child) {
                siblings.remove(index);
            }
        }
    }

    pub(crate) fn restamp(&mut self) {
        self.version = next_tree_version();
    }
}
