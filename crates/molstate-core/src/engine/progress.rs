use super::cell::CellStatus;
use crate::core::tree::node::NodeRef;

#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    TransactionStart { steps: usize },
    StepStart { index: usize },

    CellStart { node_ref: NodeRef },
    CellFinish { node_ref: NodeRef, status: CellStatus },

    StepFinish,
    TransactionFinish,
}

pub type ProgressCallback = Box<dyn Fn(Progress) + Send + Sync>;

#[derive(Default)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}
