use thiserror::Error;

use crate::store::StoreError;

/// Domain errors raised by wallet mutations and the read paths.
///
/// Validation failures carry the offending amount/bucket so callers can
/// render a precise message; nothing is silently clamped or coerced.
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("invalid transaction: {reason}")]
    InvalidTransaction { reason: String },

    #[error("insufficient balance in {wallet}: available {available}, requested {requested}")]
    InsufficientBalance {
        wallet: String,
        available: f64,
        requested: f64,
    },

    #[error("wallet not found for user {0}")]
    WalletNotFound(String),

    #[error("gold wallet not found for user {user} in realm {realm}")]
    GoldWalletNotFound { user: String, realm: String },

    #[error("realm {0} not found or inactive")]
    RealmNotFound(String),

    #[error("gold wallet for realm {realm} still holds {total} gold")]
    WalletHasBalance { realm: String, total: f64 },

    #[error("suspended gold cannot be withdrawn directly; it must go through conversion")]
    SuspendedGoldRestriction,

    #[error("conversion configuration error: {0}")]
    ConversionConfig(String),

    #[error("transaction {0} not found")]
    TransactionNotFound(String),

    #[error("transaction {id} is not pending approval (status: {status})")]
    TransactionNotPending { id: String, status: String },

    #[error("maintenance failure: {0}")]
    Processing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WalletError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        WalletError::InvalidTransaction {
            reason: reason.into(),
        }
    }
}
