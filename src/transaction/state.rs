//! Transaction lifecycle states.

/// The possible states of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// The transaction can still read and write.
    Active,
    /// A Commit record was written and the changes are durable.
    Committed,
    /// Changes were undone and a Rollback record was written.
    RolledBack,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns true once the transaction has committed or rolled back.
    pub fn is_finished(&self) -> bool {
        !self.is_active()
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Committed => write!(f, "committed"),
            Self::RolledBack => write!(f, "rolled back"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TransactionState::Active.is_active());
        assert!(!TransactionState::Active.is_finished());
        assert!(TransactionState::Committed.is_finished());
        assert!(TransactionState::RolledBack.is_finished());
        assert_eq!(TransactionState::RolledBack.to_string(), "rolled back");
    }
}
