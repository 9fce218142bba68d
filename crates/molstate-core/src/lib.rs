//! # molstate Core Library
//!
//! A reactive, versioned state-transform graph. Every node of the graph is produced by
//! applying a named, parameterized transform to its parent's output; editing a node's
//! parameters or removing a subtree triggers a minimal, ordered recomputation of everything
//! downstream.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless, immutable models: the persistent `StateTree`
//!   and its `TreeBuilder`, the typed `StateObject` model, the `TransformRegistry`, and the
//!   ordered-set/segmentation utilities.
//!
//! - **[`engine`]: The Logic Core.** The stateful runtime. `State` binds a tree to live
//!   computed cells and reconciles them against every committed edit, publishing one event
//!   per cell transition. Transactions, cancellation, undo history and the selection query
//!   engine live here.
//!
//! - **[`workflows`]: The Public API.** Consumers of the runtime: the built-in molecular
//!   transforms, the derived trajectory/model/structure hierarchy view, and the command
//!   surface used by user interfaces.

pub mod core;
pub mod engine;
pub mod workflows;
