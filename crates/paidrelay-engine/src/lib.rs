//! Paidrelay Engine
//!
//! The relay attempt engine, which forwards a held incoming payment and
//! settles it only once the forward produced a preimage, and the settlement
//! sweeper, which periodically cancels holds close to timeout and settles
//! holds whose forward has since succeeded. Includes an in-memory node for
//! tests and local simulation.

pub mod adapters;
pub mod error;
pub mod outcome;
pub mod prober;
pub mod relay;
pub mod sweeper;
pub mod task;

pub use adapters::InMemoryNode;
pub use error::{RelayError, SweepError, TimingViolation};
pub use outcome::{
    BestEffort, DeferReason, InvoiceSweep, RelayOutcome, RelayReport, SweepAction, SweepReport,
};
pub use prober::RouteProber;
pub use relay::{check_fee, check_timeout, RelayEngine, TimingMargins};
pub use sweeper::{plan, PlannedInvoice, SweepDecision, Sweeper};
pub use task::SweeperTask;
