//! Run outcome types.
//!
//! This module defines how a dispatch run ends.

/// Outcome of a dispatch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Completion predicate satisfied
    Complete,
    /// Shutdown requested before completion (Ctrl-C, caller cancellation)
    Interrupted,
}

impl RunOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, RunOutcome::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_outcome_variants() {
        assert_eq!(RunOutcome::Complete, RunOutcome::Complete);
        assert_ne!(RunOutcome::Complete, RunOutcome::Interrupted);
        assert!(RunOutcome::Complete.is_complete());
        assert!(!RunOutcome::Interrupted.is_complete());
    }

    #[test]
    fn test_run_outcome_debug() {
        assert_eq!(format!("{:?}", RunOutcome::Complete), "Complete");
        assert_eq!(format!("{:?}", RunOutcome::Interrupted), "Interrupted");
    }
}
