use chrono::{DateTime, Utc};
use std::fmt;

/// Core errors: encoding, configuration and telemetry setup.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid hex encoding: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("telemetry setup failed: {0}")]
    Telemetry(String),
}

/// A relay request failed validation. Always terminal, never has side effects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("relay request expired at {0}")]
    Expired(DateTime<Utc>),
}

impl ValidationError {
    /// Caller-facing error code.
    pub fn code(&self) -> u16 {
        400
    }

    /// Caller-facing reason string.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingField("final_cltv_delta") => "ExpectedFinalCltvDeltaToRelayPayment",
            Self::MissingField("destination") => "ExpectedDestinationToRelayPayment",
            Self::MissingField("expires_at") => "ExpectedExpirationDateToRelayPayment",
            Self::MissingField("payment_hash") => "ExpectedPaymentHashToRelayPayment",
            Self::MissingField("outgoing_channel") => "ExpectedOutgoingChannelToRelayPayment",
            Self::MissingField("max_amount") => "ExpectedMaxAmountToRelayPayment",
            Self::MissingField("amount_to_forward") => "ExpectedAmountToRelayPayment",
            Self::MissingField("incoming_payments") => "ExpectedArrayOfIncomingPaymentsToRelay",
            Self::MissingField(_) => "ExpectedRequiredFieldToRelayPayment",
            Self::Expired(_) => "ExpectedUnexpiredRelayRequest",
        }
    }
}

/// Broad classification of a node collaborator failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeErrorKind {
    /// The node could not be reached or is not ready.
    Unavailable,
    /// The node refused the request synchronously (malformed input, policy).
    Rejected,
    /// The call did not complete in time.
    Timeout,
    /// The referenced object does not exist.
    NotFound,
    /// Anything else.
    Internal,
}

impl fmt::Display for NodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "unavailable"),
            Self::Rejected => write!(f, "rejected"),
            Self::Timeout => write!(f, "timeout"),
            Self::NotFound => write!(f, "not found"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Error returned by the payment-channel node collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("node call failed ({kind}): {message}")]
pub struct NodeError {
    pub kind: NodeErrorKind,
    pub message: String,
}

impl NodeError {
    pub fn new(kind: NodeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(NodeErrorKind::Unavailable, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(NodeErrorKind::Rejected, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(NodeErrorKind::Timeout, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(NodeErrorKind::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(NodeErrorKind::Internal, message)
    }
}
