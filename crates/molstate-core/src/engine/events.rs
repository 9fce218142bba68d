use super::cell::{Cell, CellStatus};
use crate::core::tree::node::{NodeFlags, NodeRef};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;
use tracing::warn;

/// A change published by a [`State`](super::state::State).
///
/// Cell events carry a snapshot of the cell after the transition, so a consumer never needs
/// to look the ref up again.
#[derive(Debug, Clone)]
pub enum StateEvent {
    CellCreated {
        node_ref: NodeRef,
        parent_ref: Option<NodeRef>,
        cell: Cell,
    },
    /// Emitted once per top-most removed node; `subtree` lists every removed ref in
    /// pre-order, starting with `node_ref`.
    CellRemoved {
        node_ref: NodeRef,
        parent_ref: Option<NodeRef>,
        subtree: Vec<NodeRef>,
    },
    /// The object was replaced in place; the cell kept its identity.
    CellUpdated { node_ref: NodeRef, cell: Cell },
    CellStatusChanged {
        node_ref: NodeRef,
        previous: CellStatus,
        cell: Cell,
    },
    /// Presentation flags changed; nothing was recomputed.
    CellStateChanged { node_ref: NodeRef, flags: NodeFlags },
    CurrentChanged { node_ref: NodeRef },
    /// Closes the batch of events produced by one reconciliation.
    Reconciled { tree_version: u64 },
}

impl StateEvent {
    pub fn node_ref(&self) -> Option<&NodeRef> {
        match self {
            StateEvent::CellCreated { node_ref, .. }
            | StateEvent::CellRemoved { node_ref, .. }
            | StateEvent::CellUpdated { node_ref, .. }
            | StateEvent::CellStatusChanged { node_ref, .. }
            | StateEvent::CellStateChanged { node_ref, .. }
            | StateEvent::CurrentChanged { node_ref } => Some(node_ref),
            StateEvent::Reconciled { .. } => None,
        }
    }

    pub fn is_batch_end(&self) -> bool {
        matches!(self, StateEvent::Reconciled { .. })
    }
}

/// Fan-out publisher with one unbounded channel per subscriber.
///
/// Publishing never blocks. A subscriber whose receiver was dropped is removed on the next
/// publish.
#[derive(Default)]
pub struct EventHub {
    subscribers: Vec<Sender<Arc<StateEvent>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Subscription {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.push(sender);
        Subscription { receiver }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn publish(&mut self, event: StateEvent) {
        if self.subscribers.is_empty() {
            return;
        }
        let event = Arc::new(event);
        let before = self.subscribers.len();
        self.subscribers
            .retain(|sender| sender.send(Arc::clone(&event)).is_ok());
        let dropped = before - self.subscribers.len();
        if dropped > 0 {
            warn!(dropped, "Dropped disconnected event subscribers.");
        }
    }
}

/// Receiving end of the event stream. Events arrive in publication order.
pub struct Subscription {
    receiver: Receiver<Arc<StateEvent>>,
}

impl Subscription {
    pub fn try_recv(&self) -> Option<Arc<StateEvent>> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Arc<StateEvent>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything published so far that has not been received yet.
    pub fn drain(&self) -> Vec<Arc<StateEvent>> {
        self.receiver.try_iter().collect()
    }

    /// Blocks until a whole reconciliation batch (up to and including its `Reconciled`
    /// marker) has arrived, or the timeout elapses between two events.
    pub fn next_batch(&self, timeout: Duration) -> Vec<Arc<StateEvent>> {
        let mut batch = Vec::new();
        while let Some(event) = self.recv_timeout(timeout) {
            let end = event.is_batch_end();
            batch.push(event);
            if end {
                break;
            }
        }
        batch
    }
}
