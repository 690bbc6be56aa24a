use thiserror::Error;

use crate::identity::Identity;
use crate::product::ProductId;

/// Why a ledger operation was rejected. A rejected operation changes nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("product {0} not found")]
    NotFound(ProductId),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} is already authorized")]
    AlreadyAuthorized(Identity),

    /// A snapshot or journal does not match what replaying it produces.
    #[error("invalid ledger state: {0}")]
    InvalidState(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
