//! # Core Module
//!
//! The stateless foundation of the state graph.
//!
//! ## Architecture
//!
//! - **Object Model** ([`objects`]) - Typed state objects and the molecular payloads they carry
//! - **Parameters** ([`params`]) - Plain structured parameter values attached to tree nodes
//! - **Transforms** ([`transform`]) - Transform definitions and the process-wide registry
//! - **Tree** ([`tree`]) - The immutable, structurally shared state tree and its builder
//! - **File I/O** ([`io`]) - Readers for the molecular text formats consumed by transforms
//! - **Utilities** ([`utils`]) - Ordered-set algebra and segmentation helpers

pub mod io;
pub mod objects;
pub mod params;
pub mod transform;
pub mod tree;
pub mod utils;
