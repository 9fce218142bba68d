use crate::core::tree::tree::StateTree;
use std::collections::VecDeque;

/// Bounded undo/redo stacks of previously committed trees.
///
/// Trees share structure, so a snapshot costs little more than the nodes its commit touched.
/// Only shape and parameters are kept; restoring a tree recomputes its objects.
#[derive(Debug, Clone)]
pub struct TreeHistory {
    max_depth: usize,
    undo_stack: VecDeque<StateTree>,
    redo_stack: VecDeque<StateTree>,
}

impl TreeHistory {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
        }
    }

    /// Records the tree that a new commit replaced. Clears the redo branch.
    pub fn record(&mut self, previous: StateTree) {
        if self.max_depth == 0 {
            return;
        }
        self.redo_stack.clear();
        push_bounded(&mut self.undo_stack, previous, self.max_depth);
    }

    /// Pops the last recorded tree, remembering `current` for redo.
    pub fn undo(&mut self, current: &StateTree) -> Option<StateTree> {
        let previous = self.undo_stack.pop_back()?;
        push_bounded(&mut self.redo_stack, current.clone(), self.max_depth);
        Some(previous)
    }

    pub fn redo(&mut self, current: &StateTree) -> Option<StateTree> {
        let next = self.redo_stack.pop_back()?;
        push_bounded(&mut self.undo_stack, current.clone(), self.max_depth);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

fn push_bounded(stack: &mut VecDeque<StateTree>, tree: StateTree, max_depth: usize) {
    stack.push_back(tree);
    while stack.len() > max_depth {
        stack.pop_front();
    }
}
