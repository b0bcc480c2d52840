//! Unit-of-Work State Definitions
//!
//! ```text
//! ACTIVE ──commit──▶ COMMITTED
//!    │
//!    └──rollback / failed commit──▶ ROLLED_BACK
//! ```
//!
//! Both outcomes are terminal. A commit that fails at the storage layer
//! lands in ROLLED_BACK, never in a partially applied state.

use std::fmt;

use crate::error::TransactionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitOfWorkState {
    /// Reads and writes allowed; nothing visible to other units of work
    Active,

    /// Terminal: every write became visible atomically
    Committed,

    /// Terminal: no write ever became visible
    RolledBack,
}

impl UnitOfWorkState {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitOfWorkState::Committed | UnitOfWorkState::RolledBack)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        *self == UnitOfWorkState::Active
    }

    /// Fail unless the unit of work can still run statements
    pub fn ensure_active(&self) -> Result<(), TransactionError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(TransactionError::Inactive(*self))
        }
    }

    /// Validate and perform a transition.
    ///
    /// Only `Active -> Committed` and `Active -> RolledBack` are legal.
    pub fn transition(&mut self, to: UnitOfWorkState) -> Result<(), TransactionError> {
        match (*self, to) {
            (UnitOfWorkState::Active, UnitOfWorkState::Committed)
            | (UnitOfWorkState::Active, UnitOfWorkState::RolledBack) => {
                *self = to;
                Ok(())
            }
            (from, to) => Err(TransactionError::InvalidTransition { from, to }),
        }
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitOfWorkState::Active => "ACTIVE",
            UnitOfWorkState::Committed => "COMMITTED",
            UnitOfWorkState::RolledBack => "ROLLED_BACK",
        }
    }
}

impl fmt::Display for UnitOfWorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(UnitOfWorkState::Committed.is_terminal());
        assert!(UnitOfWorkState::RolledBack.is_terminal());
        assert!(!UnitOfWorkState::Active.is_terminal());
    }

    #[test]
    fn test_legal_transitions() {
        let mut state = UnitOfWorkState::Active;
        state.transition(UnitOfWorkState::Committed).unwrap();
        assert_eq!(state, UnitOfWorkState::Committed);

        let mut state = UnitOfWorkState::Active;
        state.transition(UnitOfWorkState::RolledBack).unwrap();
        assert_eq!(state, UnitOfWorkState::RolledBack);
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        for terminal in [UnitOfWorkState::Committed, UnitOfWorkState::RolledBack] {
            for to in [
                UnitOfWorkState::Active,
                UnitOfWorkState::Committed,
                UnitOfWorkState::RolledBack,
            ] {
                let mut state = terminal;
                let err = state.transition(to).unwrap_err();
                assert_eq!(
                    err,
                    TransactionError::InvalidTransition { from: terminal, to }
                );
                assert_eq!(state, terminal, "failed transition must not change state");
            }
        }
    }

    #[test]
    fn test_active_cannot_reenter_active() {
        let mut state = UnitOfWorkState::Active;
        assert!(state.transition(UnitOfWorkState::Active).is_err());
    }

    #[test]
    fn test_ensure_active() {
        assert!(UnitOfWorkState::Active.ensure_active().is_ok());
        assert_eq!(
            UnitOfWorkState::Committed.ensure_active().unwrap_err(),
            TransactionError::Inactive(UnitOfWorkState::Committed)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(UnitOfWorkState::Active.to_string(), "ACTIVE");
        assert_eq!(UnitOfWorkState::RolledBack.to_string(), "ROLLED_BACK");
    }
}
