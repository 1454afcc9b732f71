use paidrelay_core::{NodeError, PaymentHash, PaymentStatus, Preimage};
use std::fmt;
use uuid::Uuid;

/// Result of a node call whose failure must not fail the surrounding operation.
///
/// The error is kept so callers can see that something went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestEffort<T> {
    /// The call succeeded.
    Done(T),
    /// The call failed and the failure was absorbed.
    Absorbed(NodeError),
}

impl<T> BestEffort<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// The absorbed error, if the call failed.
    pub fn absorbed(&self) -> Option<&NodeError> {
        match self {
            Self::Done(_) => None,
            Self::Absorbed(e) => Some(e),
        }
    }
}

impl<T> From<Result<T, NodeError>> for BestEffort<T> {
    fn from(result: Result<T, NodeError>) -> Self {
        match result {
            Ok(value) => Self::Done(value),
            Err(e) => Self::Absorbed(e),
        }
    }
}

/// Why a relay attempt finished without settling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferReason {
    /// The node has no record of the outgoing payment yet.
    NoPaymentRecord,
    /// The outgoing payment is still in flight.
    PaymentPending,
    /// Looking the payment up failed.
    LookupFailed,
    /// The preimage is known but settling the hold failed.
    SettleFailed(NodeError),
}

impl fmt::Display for DeferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPaymentRecord => write!(f, "NoPaymentRecord"),
            Self::PaymentPending => write!(f, "PaymentPending"),
            Self::LookupFailed => write!(f, "LookupFailed"),
            Self::SettleFailed(_) => write!(f, "SettleFailed"),
        }
    }
}

/// How a relay attempt that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The incoming hold was settled with this preimage.
    Settled(Preimage),
    /// Nothing settled this round; the sweeper reconciles later.
    Deferred(DeferReason),
}

impl RelayOutcome {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Settled(_))
    }
}

/// Everything a successful relay attempt observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReport {
    /// Correlates log lines for this attempt.
    pub attempt_id: Uuid,
    pub payment_hash: PaymentHash,
    /// What the relay paid to forward, fees included, in millitokens.
    pub route_cost: u64,
    /// Result of sending the outgoing payment.
    pub dispatch: BestEffort<()>,
    /// Result of looking the outgoing payment up afterwards.
    pub lookup: BestEffort<Option<PaymentStatus>>,
    pub outcome: RelayOutcome,
}

/// What the sweeper did with one held invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepAction {
    /// Too close to timeout; a cancel was issued.
    Canceled(BestEffort<()>),
    /// A preimage was found; a settle was issued.
    Settled(BestEffort<()>),
    /// The outgoing payment has no preimage yet.
    AwaitingPreimage,
    /// Looking the outgoing payment up failed.
    LookupFailed(NodeError),
}

/// One swept invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceSweep {
    pub id: PaymentHash,
    pub blocks_remaining: i64,
    pub action: SweepAction,
}

/// Summary of one sweep pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Correlates log lines for this pass.
    pub sweep_id: Uuid,
    /// Chain height the pass used.
    pub height: u32,
    /// Invoices inside the age cutoff.
    pub scanned: usize,
    /// Held invoices skipped because their hold already timed out.
    pub expired: usize,
    /// Actions in invoice listing order.
    pub actions: Vec<InvoiceSweep>,
}

impl SweepReport {
    /// Number of cancels that went through.
    pub fn canceled(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(&a.action, SweepAction::Canceled(r) if r.is_done()))
            .count()
    }

    /// Number of settles that went through.
    pub fn settled(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(&a.action, SweepAction::Settled(r) if r.is_done()))
            .count()
    }

    /// Node errors absorbed during the pass.
    pub fn absorbed_errors(&self) -> Vec<&NodeError> {
        self.actions
            .iter()
            .filter_map(|a| match &a.action {
                SweepAction::Canceled(r) | SweepAction::Settled(r) => r.absorbed(),
                SweepAction::LookupFailed(e) => Some(e),
                SweepAction::AwaitingPreimage => None,
            })
            .collect()
    }
}
