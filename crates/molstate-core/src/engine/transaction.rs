use super::error::StateError;
use super::state::{ReconcileReport, State};
use crate::core::tree::builder::TreeBuilder;
use crate::core::tree::error::TreeError;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag checked by reconciliation between two cell evaluations.
///
/// Cancelling is not a rollback: cells evaluated before the check keep their new state, the
/// rest are left pending and retried by the next reconciliation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub type Step = Box<dyn FnOnce(&mut TreeBuilder) -> Result<(), TreeError> + Send>;

/// An ordered sequence of builder steps applied as one unit.
///
/// Every step is validated against the tree produced by the steps before it before anything
/// is committed, so a structural error anywhere rejects the whole transaction. Each step is
/// then committed and reconciled in turn.
pub struct Transaction {
    label: String,
    steps: Vec<Step>,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("label", &self.label)
            .field("steps", &self.steps.len())
            .finish()
    }
}

impl Transaction {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            steps: Vec::new(),
        }
    }

    /// A transaction with a single step.
    pub fn single<F>(label: impl Into<String>, step: F) -> Self
    where
        F: FnOnce(&mut TreeBuilder) -> Result<(), TreeError> + Send + 'static,
    {
        Self::new(label).then(step)
    }

    pub fn then<F>(mut self, step: F) -> Self
    where
        F: FnOnce(&mut TreeBuilder) -> Result<(), TreeError> + Send + 'static,
    {
        self.steps.push(Box::new(step));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) fn into_steps(self) -> (String, Vec<Step>) {
        (self.label, self.steps)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionReport {
    pub label: String,
    /// One report per committed step. Shorter than the transaction when it was cancelled.
    pub steps: Vec<ReconcileReport>,
    pub cancelled: bool,
}

impl TransactionReport {
    pub fn tree_version(&self) -> Option<u64> {
        self.steps.last().map(|s| s.tree_version)
    }
}

/// Clonable, thread-safe access to a [`State`].
///
/// Submitters are serialized on an internal lock, so every transaction runs against the
/// result of all transactions committed before it.
#[derive(Clone)]
pub struct StateHandle {
    inner: Arc<std::sync::Mutex<State>>,
}

impl StateHandle {
    pub fn new(state: State) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(state)),
        }
    }

    pub fn submit(&self, transaction: Transaction) -> Result<TransactionReport, StateError> {
        self.submit_with(transaction, &CancellationToken::new())
    }

    pub fn submit_with(
        &self,
        transaction: Transaction,
        token: &CancellationToken,
    ) -> Result<TransactionReport, StateError> {
        self.write(|state| state.run(transaction, token))?
    }

    /// Runs `f` with shared access to the state. Readers never observe a half-applied
    /// structural edit.
    pub fn read<R>(&self, f: impl FnOnce(&State) -> R) -> Result<R, StateError> {
        let guard = self.inner.lock().map_err(|_| StateError::Poisoned)?;
        Ok(f(&guard))
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut State) -> R) -> Result<R, StateError> {
        let mut guard = self.inner.lock().map_err(|_| StateError::Poisoned)?;
        Ok(f(&mut guard))
    }

    pub fn subscribe(&self) -> Result<super::events::Subscription, StateError> {
        self.write(State::subscribe)
    }
}
