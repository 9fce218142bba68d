//! Stateless helpers over sorted integer collections.
//!
//! [`ordered_set`] implements set algebra on sorted, de-duplicated slices and half-open
//! intervals; [`segmentation`] projects such sets onto contiguous segments (for example the
//! atoms of each residue of a model).

pub mod ordered_set;
pub mod segmentation;
