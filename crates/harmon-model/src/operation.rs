//! Review operations recorded in the undo/redo history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::candidate::Candidate;

/// Mutation verb applied to the candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Confirm a pair.
    Accept,
    /// Reject a pair.
    Reject,
    /// Set aside every candidate of a source column.
    Discard,
    /// Add candidates for a source column (typically agent-suggested).
    Append,
    /// Remove candidates for specific pairs.
    Prune,
}

impl OperationKind {
    /// Wire name of the verb.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Discard => "discard",
            Self::Append => "append",
            Self::Prune => "prune",
        }
    }
}

/// A recorded mutation with enough payload for deterministic forward
/// replay and inverse application.
///
/// `candidate` is captured with its pre-operation status; undo of
/// accept/reject restores that stored status rather than recomputing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// The verb.
    pub operation: OperationKind,
    /// When the operation was recorded.
    pub timestamp: DateTime<Utc>,
    /// The candidate the verb targeted, with its pre-operation status.
    pub candidate: Candidate,
    /// Additional candidates carried by append/prune.
    #[serde(default)]
    pub references: Vec<Candidate>,
    /// Set when the mutation originated from an automated agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_match_to_agent: Option<bool>,
}

impl Operation {
    /// Creates an operation with no references.
    pub fn new(operation: OperationKind, candidate: Candidate) -> Self {
        Self {
            operation,
            timestamp: Utc::now(),
            candidate,
            references: Vec::new(),
            is_match_to_agent: None,
        }
    }

    /// Creates an operation carrying reference candidates.
    pub fn with_references(
        operation: OperationKind,
        candidate: Candidate,
        references: Vec<Candidate>,
    ) -> Self {
        Self {
            operation,
            timestamp: Utc::now(),
            candidate,
            references,
            is_match_to_agent: None,
        }
    }
}
