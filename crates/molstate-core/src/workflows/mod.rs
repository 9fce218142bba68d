//! # Workflows Module
//!
//! Consumers of the state runtime: the pieces a molecular viewer or pipeline front end
//! builds on.
//!
//! ## Overview
//!
//! The engine knows nothing about molecules. This layer supplies the built-in transforms
//! that turn BGF text into trajectories, models, structures and components, a typed view of
//! the resulting graph with a "current" selection that survives edits, and the commands a
//! user interface issues against a shared [`StateHandle`](crate::engine::transaction::StateHandle).
//!
//! ## Architecture
//!
//! - **Built-in Transforms** ([`transforms`]) - Raw data, BGF parsing, frame selection,
//!   structures and residue-level components, installed with
//!   [`register_builtins`](transforms::register_builtins)
//! - **Hierarchy View** ([`hierarchy`]) - Trajectory → model → structure → component
//!   projection re-derived once per reconciliation batch, with selection resynchronization
//! - **Commands** ([`commands`]) - `set_current`, `toggle_visibility`, `toggle_expanded`,
//!   `remove_subtree`, `apply_transform` and `update_params`, each submitted as one
//!   transaction

pub mod commands;
pub mod hierarchy;
pub mod transforms;
