//! # Engine Module
//!
//! The stateful runtime of the graph: it binds a [`StateTree`](crate::core::tree::tree::StateTree)
//! to live computed cells and keeps them consistent as the tree evolves.
//!
//! ## Overview
//!
//! A caller builds an edit batch against the current tree, submits it to a
//! [`State`](state::State), and the state reconciles: removed subtrees drop their cells, and
//! exactly the stale cells are recomputed in dependency order. Computation errors stay local
//! to the failing cell, whose descendants are left pending until it recovers. Every cell
//! transition is published on a fan-out event stream.
//!
//! ## Architecture
//!
//! - **Runtime Graph** ([`state`]) - Cells, reconciliation, undo/redo and the current node
//! - **Cells** ([`cell`]) - Per-node status, computed object and error detail
//! - **Transactions** ([`transaction`]) - Multi-step edits, cancellation and the thread-safe
//!   [`StateHandle`](transaction::StateHandle)
//! - **Events** ([`events`]) - The published change stream and its subscriptions
//! - **Selection Queries** ([`query`]) - Composable node selection over a tree and its cells
//! - **History** ([`history`]) - Bounded undo/redo stacks of previous trees
//! - **Configuration** ([`config`]) - Runtime settings, loadable from TOML
//! - **Progress Monitoring** ([`progress`]) - Per-step and per-cell progress callbacks
//! - **Error Handling** ([`error`]) - Errors surfaced to submitters

pub mod cell;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod progress;
pub mod query;
pub mod state;
pub mod transaction;
