//! Readers for molecular text formats consumed by the built-in transforms.

pub mod bgf;
