use chrono::{DateTime, Utc};
use paidrelay_core::{NodeError, PaymentHash, PublicKey, ValidationError};

/// A timing-safety margin the relay would violate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimingViolation {
    #[error("incoming hold would last {blocks} blocks, more than the {max} block maximum")]
    HoldPeriodTooLong { blocks: i64, max: u32 },

    #[error("only {blocks} blocks left on the incoming hold, need at least {min}")]
    HoldTooShort { blocks: i64, min: u32 },

    #[error("hold outlives the outgoing route by {gap} blocks, need at least {min}")]
    CltvGapTooSmall { gap: i64, min: u32 },
}

/// Relay attempt errors.
///
/// Everything except `ForwardingFailed` and `DispatchRejected` happens before
/// any funds move.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("invalid relay request: {0}")]
    Validation(#[from] ValidationError),

    #[error("no route found to destination {0}")]
    NoRoute(PublicKey),

    #[error("route costs {cost} mtokens, above the {max_amount} mtokens ceiling")]
    FeeExceeded { cost: u64, max_amount: u64 },

    #[error("timing check failed: {0}")]
    Timing(#[from] TimingViolation),

    #[error("relay request expired at {0} before the payment was sent")]
    ExpiredBeforePayment(DateTime<Utc>),

    #[error("relay payment {0} failed")]
    ForwardingFailed(PaymentHash),

    #[error("node rejected relay payment dispatch: {0}")]
    DispatchRejected(NodeError),

    #[error("route probe failed: {0}")]
    Probe(NodeError),

    #[error("chain height lookup failed: {0}")]
    Height(NodeError),
}

impl RelayError {
    /// Caller-facing error code.
    pub fn code(&self) -> u16 {
        match self {
            Self::Validation(e) => e.code(),
            Self::ExpiredBeforePayment(_) => 400,
            _ => 503,
        }
    }

    /// Caller-facing reason string.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.reason(),
            Self::NoRoute(_) => "FailedToFindRouteToDestination",
            Self::FeeExceeded { .. } => "UnexpectedFeeToRouteToDestination",
            Self::Timing(TimingViolation::HoldPeriodTooLong { .. }) => {
                "BlockHoldingPeriodExceedsMaximum"
            }
            Self::Timing(TimingViolation::HoldTooShort { .. }) => {
                "ExpectedMoreCltvBlockDeltaRemaining"
            }
            Self::Timing(TimingViolation::CltvGapTooSmall { .. }) => {
                "ExpectedHigherCltvDeltaBetweenInvoiceAndRoute"
            }
            Self::ExpiredBeforePayment(_) => "ExpectedUnexpiredInvoiceToPayRelayPayment",
            Self::ForwardingFailed(_) => "FailedToPayRelayPayment",
            Self::DispatchRejected(_) => "RejectedRelayPaymentDispatch",
            Self::Probe(_) => "UnexpectedErrorProbingRoute",
            Self::Height(_) => "UnexpectedErrorGettingChainHeight",
        }
    }

    /// True when the error was raised after the outgoing payment was dispatched.
    pub fn is_post_dispatch(&self) -> bool {
        matches!(self, Self::ForwardingFailed(_) | Self::DispatchRejected(_))
    }
}

/// Sweep pass errors. Per-invoice failures are absorbed into the report instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SweepError {
    #[error("listing invoices failed: {0}")]
    ListInvoices(NodeError),

    #[error("chain height lookup failed: {0}")]
    Height(NodeError),
}
