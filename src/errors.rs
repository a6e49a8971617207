//! Unified error type for the pricing and entitlement engine.
//!
//! Every fallible operation in the crate returns [`Result`]. Validation failures are
//! reported as [`Error::InvalidArgument`] and are never clamped into range.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Any failure reported by the database layer.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Configuration could not be read or is inconsistent.
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Caller supplied a negative count, negative price, unknown enum value or empty field.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// What was rejected
        message: String,
    },

    /// No user row exists for the identifier.
    #[error("User not found: {id}")]
    UserNotFound {
        /// The identifier that was looked up
        id: String,
    },

    /// No moment row exists for the identifier.
    #[error("Moment not found: {id}")]
    MomentNotFound {
        /// The identifier that was looked up
        id: i64,
    },

    /// The discount offer is missing or no longer `active`.
    #[error("Discount offer {id} is not active")]
    DiscountNotActive {
        /// The offer identifier
        id: i64,
    },

    /// A referral for this (referrer, referred) pair already exists.
    #[error("Referral from '{referrer_id}' to '{referred_user_id}' already recorded")]
    DuplicateReferral {
        /// The referring user
        referrer_id: String,
        /// The referred user
        referred_user_id: String,
    },

    /// Credit redemption was decided but the credit was spent concurrently.
    #[error("No free premium credit available for user {user_id}")]
    NoCreditAvailable {
        /// The user whose credit was requested
        user_id: String,
    },

    /// Completed referrals could not be read; no credit value was written.
    #[error("Could not read completed referrals for '{referrer_id}': {source}")]
    StaleRead {
        /// The referrer whose bonus was being recomputed
        referrer_id: String,
        /// The underlying read failure
        #[source]
        source: sea_orm::DbErr,
    },

    /// The referral worker task has shut down.
    #[error("Referral worker is no longer running")]
    WorkerUnavailable,
}

impl Error {
    /// Shorthand for building an [`Error::InvalidArgument`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
