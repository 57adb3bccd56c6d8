//! Delivery error taxonomy with retry classification.
//!
//! Per-record failures never abort a batch; cycle-level failures abort one
//! cycle only. Everything is mirrored into the Event Log, so each variant
//! carries an HTTP-status-like outcome code for the audit row.

use thiserror::Error;

/// Result type for delivery operations.
pub type DeliveryResult<T> = std::result::Result<T, DeliveryError>;

/// Delivery errors with retry classification.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Network/5xx-equivalent failure - eligible for bounded retry.
    #[error("Transient transport failure (retry eligible): {0}")]
    TransientTransport(String),

    /// Explicit rejection by the Recipient (4xx-equivalent) - permanent
    /// for the current cycle, the record stays in its pre-send status.
    #[error("Recipient rejected the record (no retry): {0}")]
    RecipientRejected(String),

    /// The record or file referenced by an acknowledgement does not exist.
    #[error("Source record not found: {0}")]
    SourceNotFound(String),

    /// The record has no owning file yet (ack arrived before the commit).
    #[error("Source conflict, no owning file yet: {0}")]
    SourceConflict(String),

    /// The atomic commit did not complete. No partial state was left
    /// behind; the cycle is marked failed.
    #[error("Atomic commit failed: {0}")]
    CommitFailure(String),

    /// The record's payload could not be constructed from source data.
    /// Treated as a permanent per-record failure.
    #[error("Payload mapping failed: {0}")]
    MappingFailure(String),
}

impl DeliveryError {
    /// Whether the bounded-retry policy applies to this failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, DeliveryError::TransientTransport(_))
    }

    /// Outcome code mirrored into the Event Log and returned to the
    /// inbound caller. Mirrors the underlying failure, never invents
    /// new codes.
    pub fn outcome_code(&self) -> u16 {
        match self {
            DeliveryError::TransientTransport(_) => 503,
            DeliveryError::RecipientRejected(_) => 422,
            DeliveryError::SourceNotFound(_) => 404,
            DeliveryError::SourceConflict(_) => 409,
            DeliveryError::CommitFailure(_) => 500,
            DeliveryError::MappingFailure(_) => 400,
        }
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::TransientTransport(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::RecipientRejected(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::SourceNotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::SourceConflict(msg.into())
    }

    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::MappingFailure(msg.into())
    }
}
