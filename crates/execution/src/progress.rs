//! Execution progress summary (§3).

use serde::{Deserialize, Serialize};

/// A snapshot of how far an execution has gotten.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Progress {
    /// Total nodes participating in the execution.
    pub total: usize,
    /// Nodes that reached `Completed`.
    pub completed: usize,
    /// Nodes that reached `Failed`.
    pub failed: usize,
    /// Nodes currently `Running` or `Retrying`.
    pub running: usize,
}

impl Progress {
    /// Build a progress summary from raw counts.
    #[must_use]
    pub fn new(total: usize, completed: usize, failed: usize, running: usize) -> Self {
        Self {
            total,
            completed,
            failed,
            running,
        }
    }

    /// Percentage of nodes that have reached a terminal state, 0-100.
    #[must_use]
    pub fn percent_complete(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let terminal = self.completed + self.failed;
        ((terminal * 100) / self.total) as u8
    }

    /// A short human-readable phase label for display.
    #[must_use]
    pub fn phase(&self) -> &'static str {
        if self.total == 0 {
            "empty"
        } else if self.completed + self.failed == self.total {
            "finished"
        } else if self.running > 0 {
            "running"
        } else {
            "pending"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_complete_rounds_down() {
        let progress = Progress::new(3, 1, 0, 1);
        assert_eq!(progress.percent_complete(), 33);
    }

    #[test]
    fn percent_complete_empty_is_zero() {
        assert_eq!(Progress::default().percent_complete(), 0);
    }

    #[test]
    fn phase_labels() {
        assert_eq!(Progress::new(0, 0, 0, 0).phase(), "empty");
        assert_eq!(Progress::new(2, 0, 0, 0).phase(), "pending");
        assert_eq!(Progress::new(2, 0, 0, 1).phase(), "running");
        assert_eq!(Progress::new(2, 1, 1, 0).phase(), "finished");
    }
}
