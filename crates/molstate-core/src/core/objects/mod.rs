//! # Object Model
//!
//! The typed "value" side of the state graph. A [`StateObject`](object::StateObject) is the
//! output of applying a transform: it carries a runtime type tag ([`ObjectKind`](object::ObjectKind)),
//! the tag's [`TypeClass`](object::TypeClass), a display label, and a payload drawn from a
//! closed set of tagged variants. Transforms pattern-match on the payload tag instead of
//! inspecting runtime types.
//!
//! - [`object`] - Object kinds, type classes and the state object itself
//! - [`molecule`] - Molecular payloads: models, trajectories, structures and components

pub mod molecule;
pub mod object;
