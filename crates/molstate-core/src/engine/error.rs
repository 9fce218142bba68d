use thiserror::Error;

use crate::core::tree::error::TreeError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("Structural error: {0}")]
    Tree(#[from] TreeError),

    #[error(
        "Builder was created against tree version {builder}, but the current tree is version {current}"
    )]
    StaleBuilder { builder: u64, current: u64 },

    #[error("State lock was poisoned by a panicking writer")]
    Poisoned,
}
