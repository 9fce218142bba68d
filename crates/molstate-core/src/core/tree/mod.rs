//! # State Tree Module
//!
//! The immutable, persistent description of graph *shape*: which transform produced each
//! node, with which parameters, under which parent.
//!
//! ## Key Components
//!
//! - [`node`] - Stable node references, tree nodes and their presentation flags
//! - [`tree`] - The [`StateTree`](tree::StateTree) value with its pure queries and tree diff
//! - [`builder`] - The [`TreeBuilder`](builder::TreeBuilder) edit façade producing new trees
//!   and change summaries
//! - [`serial`] - The plain serialized form of a tree (shape and parameters only)
//! - [`error`] - Structural errors rejecting an edit before any computation runs
//!
//! Trees are never mutated once published. Every commit produces a new tree that shares all
//! untouched nodes and child lists with its predecessor through persistent maps, so keeping
//! an old tree around is enough to restore a previous shape.

pub mod builder;
pub mod error;
pub mod node;
pub mod serial;
pub mod tree;
