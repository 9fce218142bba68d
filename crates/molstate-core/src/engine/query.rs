use super::cell::Cell;
use super::state::State;
use crate::core::objects::object::ObjectKind;
use crate::core::transform::definition::TransformKind;
use crate::core::tree::node::NodeRef;
use crate::core::tree::tree::StateTree;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Read access to live cells for query evaluation.
pub trait ProvidesCells {
    fn cell(&self, node_ref: &NodeRef) -> Option<&Cell>;
}

impl ProvidesCells for State {
    fn cell(&self, node_ref: &NodeRef) -> Option<&Cell> {
        State::cell(self, node_ref)
    }
}

pub type KindPredicate = Arc<dyn Fn(&TransformKind) -> bool + Send + Sync>;
pub type CellPredicate = Arc<dyn Fn(&NodeRef, Option<&Cell>) -> bool + Send + Sync>;

/// A composable selection over a tree and, optionally, its cells.
///
/// Every query evaluates to an ordered sequence of refs without duplicates. Unknown refs
/// and the parent of the root evaluate to nothing rather than to an error. Set operations
/// keep the order of their first operand.
#[derive(Clone)]
pub enum Query {
    ByRef(NodeRef),
    Root,
    Children(Box<Query>),
    Parent(Box<Query>),
    /// Ancestors of each input ref, nearest first.
    Ancestors(Box<Query>),
    /// Each input ref followed by its descendants in pre-order.
    Subtree(Box<Query>),
    OfKind(Box<Query>, KindPredicate),
    Filter(Box<Query>, CellPredicate),
    Union(Box<Query>, Box<Query>),
    Intersect(Box<Query>, Box<Query>),
    Subtract(Box<Query>, Box<Query>),
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::ByRef(r) => write!(f, "ByRef({r})"),
            Query::Root => f.write_str("Root"),
            Query::Children(q) => write!(f, "Children({q:?})"),
            Query::Parent(q) => write!(f, "Parent({q:?})"),
            Query::Ancestors(q) => write!(f, "Ancestors({q:?})"),
            Query::Subtree(q) => write!(f, "Subtree({q:?})"),
            Query::OfKind(q, _) => write!(f, "OfKind({q:?}, ..)"),
            Query::Filter(q, _) => write!(f, "Filter({q:?}, ..)"),
            Query::Union(a, b) => write!(f, "Union({a:?}, {b:?})"),
            Query::Intersect(a, b) => write!(f, "Intersect({a:?}, {b:?})"),
            Query::Subtract(a, b) => write!(f, "Subtract({a:?}, {b:?})"),
        }
    }
}

impl Query {
    pub fn by_ref(node_ref: impl Into<NodeRef>) -> Self {
        Query::ByRef(node_ref.into())
    }

    pub fn root() -> Self {
        Query::Root
    }

    pub fn children(self) -> Self {
        Query::Children(Box::new(self))
    }

    pub fn parent(self) -> Self {
        Query::Parent(Box::new(self))
    }

    pub fn ancestors(self) -> Self {
        Query::Ancestors(Box::new(self))
    }

    pub fn subtree(self) -> Self {
        Query::Subtree(Box::new(self))
    }

    pub fn of_kind(self, predicate: impl Fn(&TransformKind) -> bool + Send + Sync + 'static) -> Self {
        Query::OfKind(Box::new(self), Arc::new(predicate))
    }

    pub fn of_kind_named(self, kind: impl Into<TransformKind>) -> Self {
        let kind = kind.into();
        self.of_kind(move |k| *k == kind)
    }

    pub fn filter(
        self,
        predicate: impl Fn(&NodeRef, Option<&Cell>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Query::Filter(Box::new(self), Arc::new(predicate))
    }

    /// Keeps refs whose cell holds an object of kind `kind`.
    pub fn of_object_kind(self, kind: ObjectKind) -> Self {
        self.filter(move |_, cell| {
            cell.and_then(Cell::object)
                .is_some_and(|object| object.kind() == kind)
        })
    }

    pub fn union(self, other: Query) -> Self {
        Query::Union(Box::new(self), Box::new(other))
    }

    pub fn intersect(self, other: Query) -> Self {
        Query::Intersect(Box::new(self), Box::new(other))
    }

    pub fn subtract(self, other: Query) -> Self {
        Query::Subtract(Box::new(self), Box::new(other))
    }

    /// Evaluates against the tree alone; cell predicates see `None`.
    pub fn select_tree(&self, tree: &StateTree) -> Vec<NodeRef> {
        self.eval(tree, None)
    }

    pub fn select(&self, state: &State) -> Vec<NodeRef> {
        self.eval(state.tree(), Some(state))
    }

    pub fn eval(&self, tree: &StateTree, cells: Option<&dyn ProvidesCells>) -> Vec<NodeRef> {
        let refs = match self {
            Query::ByRef(r) => {
                if tree.contains(r) {
                    vec![r.clone()]
                } else {
                    Vec::new()
                }
            }
            Query::Root => vec![tree.root_ref().clone()],
            Query::Children(q) => q
                .eval(tree, cells)
                .iter()
                .flat_map(|r| tree.children(r).cloned().collect::<Vec<_>>())
                .collect(),
            Query::Parent(q) => q
                .eval(tree, cells)
                .iter()
                .filter_map(|r| tree.parent(r).cloned())
                .collect(),
            Query::Ancestors(q) => q
                .eval(tree, cells)
                .iter()
                .flat_map(|r| tree.ancestors(r))
                .collect(),
            Query::Subtree(q) => q
                .eval(tree, cells)
                .iter()
                .flat_map(|r| tree.subtree_refs(r))
                .collect(),
            Query::OfKind(q, predicate) => q
                .eval(tree, cells)
                .into_iter()
                .filter(|r| tree.node(r).is_some_and(|n| predicate(n.kind())))
                .collect(),
            Query::Filter(q, predicate) => q
                .eval(tree, cells)
                .into_iter()
                .filter(|r| predicate(r, cells.and_then(|c| c.cell(r))))
                .collect(),
            Query::Union(a, b) => {
                let mut out = a.eval(tree, cells);
                out.extend(b.eval(tree, cells));
                out
            }
            Query::Intersect(a, b) => {
                let keep: HashSet<NodeRef> = b.eval(tree, cells).into_iter().collect();
                a.eval(tree, cells)
                    .into_iter()
                    .filter(|r| keep.contains(r))
                    .collect()
            }
            Query::Subtract(a, b) => {
                let drop: HashSet<NodeRef> = b.eval(tree, cells).into_iter().collect();
                a.eval(tree, cells)
                    .into_iter()
                    .filter(|r| !drop.contains(r))
                    .collect()
            }
        };
        dedup_in_order(refs)
    }
}

fn dedup_in_order(refs: Vec<NodeRef>) -> Vec<NodeRef> {
    let mut seen = HashSet::with_capacity(refs.len());
    refs.into_iter().filter(|r| seen.insert(r.clone())).collect()
}
