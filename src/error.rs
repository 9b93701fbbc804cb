use bigdecimal::BigDecimal;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{ActorId, TxStatus};
use crate::ports::{StorageError, StoreError};
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("amount must be between {min} and {max}, got {got}")]
    InvalidAmount { got: BigDecimal, min: u32, max: u32 },

    #[error("illegal transition: {event} while {status}")]
    InvalidTransition {
        status: TxStatus,
        event: &'static str,
    },

    #[error("actor {actor} already has an unresolved transaction {tx_id}")]
    ActiveTransactionConflict { actor: ActorId, tx_id: Uuid },

    /// A transition on this record is still awaiting the store; the caller
    /// double-submitted (e.g. a double click) and should just wait.
    #[error("a transition for transaction {0} is already in flight")]
    TransitionInFlight(Uuid),

    #[error("transaction {0} not found")]
    NotFound(Uuid),

    #[error("not signed in")]
    NotSignedIn,

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("persistence failure: {0}")]
    Persistence(StoreError),

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Persistence(err)
    }
}

impl AppError {
    /// Recoverable, user-correctable conditions that are surfaced before any
    /// persistence attempt and can simply be retried with different input.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::InvalidAmount { .. }
                | AppError::ActiveTransactionConflict { .. }
                | AppError::TransitionInFlight(_)
                | AppError::Validation(_)
        )
    }
}
