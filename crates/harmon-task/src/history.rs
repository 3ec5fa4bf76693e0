//! Two-stack undo/redo history over review operations.

use serde::Serialize;

use harmon_model::Operation;

/// Command-pattern history: operations pushed by mutations, with undo
/// moving entries to the redo stack and any new mutation clearing it.
#[derive(Debug, Clone, Default)]
pub struct OperationHistory {
    undo: Vec<Operation>,
    redo: Vec<Operation>,
}

/// Serializable view of the history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryExport {
    /// Operations applied, oldest first.
    pub operations: Vec<Operation>,
    /// Operations undone and eligible for redo, most recent last.
    pub redo: Vec<Operation>,
}

impl OperationHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new operation, clearing the redo stack.
    pub fn push(&mut self, operation: Operation) {
        self.undo.push(operation);
        self.redo.clear();
    }

    /// Pops the most recent operation for inverse application.
    pub fn pop_undo(&mut self) -> Option<Operation> {
        let operation = self.undo.pop()?;
        self.redo.push(operation.clone());
        Some(operation)
    }

    /// Pops the most recently undone operation for forward replay.
    pub fn pop_redo(&mut self) -> Option<Operation> {
        let operation = self.redo.pop()?;
        self.undo.push(operation.clone());
        Some(operation)
    }

    /// Number of undoable operations.
    pub fn len(&self) -> usize {
        self.undo.len()
    }

    /// True when nothing can be undone.
    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    /// True when something can be redone.
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Serializable export of both stacks.
    pub fn export(&self) -> HistoryExport {
        HistoryExport {
            operations: self.undo.clone(),
            redo: self.redo.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use harmon_model::{Candidate, OperationKind};

    use super::*;

    fn op(kind: OperationKind) -> Operation {
        Operation::new(kind, Candidate::new("a", "b", 0.5, "fuzzy"))
    }

    #[test]
    fn push_clears_redo() {
        let mut history = OperationHistory::new();
        history.push(op(OperationKind::Accept));
        history.pop_undo().unwrap();
        assert!(history.can_redo());
        history.push(op(OperationKind::Reject));
        assert!(!history.can_redo());
    }

    #[test]
    fn undo_then_redo_moves_between_stacks() {
        let mut history = OperationHistory::new();
        history.push(op(OperationKind::Accept));
        let undone = history.pop_undo().unwrap();
        assert_eq!(undone.operation, OperationKind::Accept);
        assert!(history.is_empty());
        let redone = history.pop_redo().unwrap();
        assert_eq!(redone.operation, OperationKind::Accept);
        assert_eq!(history.len(), 1);
    }
}
