//! # Transform Module
//!
//! Transforms are named, parameterized functions mapping one typed state object to another.
//!
//! - [`definition`] - The [`Transformer`](definition::Transformer) capability, transform
//!   definitions with declared input/output kinds, and computation errors
//! - [`registry`] - The append-only catalog of definitions, initialized once at startup
//!
//! Definitions are registered explicitly; nothing is seeded from static initializers.
//!
//! ```ignore
//! let mut registry = TransformRegistry::new();
//! registry.register(TransformDefinition::new(
//!     "parse-bgf",
//!     &[ObjectKind::Data],
//!     &[ObjectKind::Trajectory],
//!     ParseBgf,
//! ))?;
//! let registry = Arc::new(registry);
//! ```

pub mod definition;
pub mod registry;
