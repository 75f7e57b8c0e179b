//! Work items - the unit of dispatch.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The remote operation a work item performs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    /// Schedule a new remote job for record `index`
    Create { index: u64 },
    /// Move an existing remote job to the canceled state
    Transition { id: String },
    /// Delete an existing remote job
    Remove { id: String },
}

impl Operation {
    /// The kind of operation, used for per-kind counters.
    pub fn kind(&self) -> OpKind {
        match self {
            Operation::Create { .. } => OpKind::Create,
            Operation::Transition { .. } => OpKind::Transition,
            Operation::Remove { .. } => OpKind::Remove,
        }
    }

    /// The opaque identifier of the item: the index or the remote id.
    pub fn key(&self) -> String {
        match self {
            Operation::Create { index } => index.to_string(),
            Operation::Transition { id } | Operation::Remove { id } => id.clone(),
        }
    }
}

/// Operation discriminant without the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Create,
    Transition,
    Remove,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OpKind::Create => "create",
            OpKind::Transition => "transition",
            OpKind::Remove => "remove",
        };
        f.write_str(s)
    }
}

/// Where a work item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    New,
    Retry,
}

/// A unit of dispatch. Immutable once created; retries produce a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub op: Operation,
    pub origin: Origin,
    /// Round epoch that produced the item (0 in bounded-counter mode)
    pub round: u64,
    /// 1 for the first attempt, incremented on every retry
    pub attempt: u32,
}

impl WorkItem {
    /// Create a new first-attempt item for round 0.
    pub fn new(op: Operation) -> Self {
        Self {
            op,
            origin: Origin::New,
            round: 0,
            attempt: 1,
        }
    }

    /// Shorthand for a bounded-mode create item.
    pub fn create(index: u64) -> Self {
        Self::new(Operation::Create { index })
    }

    /// Tag the item with a round epoch.
    pub fn in_round(mut self, round: u64) -> Self {
        self.round = round;
        self
    }

    /// The item to queue after this attempt failed.
    pub fn into_retry(self) -> Self {
        Self {
            origin: Origin::Retry,
            attempt: self.attempt.saturating_add(1),
            ..self
        }
    }

    /// Follow-up removal after a successful transition. Starts fresh.
    pub fn follow_up_removal(&self) -> Option<Self> {
        match &self.op {
            Operation::Transition { id } => Some(Self::new(Operation::Remove { id: id.clone() }).in_round(self.round)),
            _ => None,
        }
    }

    pub fn is_retry(&self) -> bool {
        self.origin == Origin::Retry
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}", self.op.kind(), self.op.key(), self.attempt)
    }
}
