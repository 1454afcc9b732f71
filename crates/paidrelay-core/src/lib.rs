//! Paidrelay Core
//!
//! Shared vocabulary for the relay engine: payment identifiers, relay
//! requests and their validation, probed routes, the block-height arithmetic
//! used for timing safety, the [`INode`] interface to the payment-channel
//! node, configuration and tracing setup.

pub mod blocks;
pub mod clock;
pub mod config;
pub mod error;
pub mod node;
pub mod request;
pub mod route;
pub mod telemetry;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use config::{DispatchErrorPolicy, EngineConfig, LoggingConfig, RelayConfig, SweeperConfig};
pub use error::{CoreError, NodeError, NodeErrorKind, ValidationError};
pub use node::{INode, InvoicePage, ListInvoicesRequest};
pub use request::{RelayRequest, ValidatedRelay};
pub use route::{HintHop, ProbeRequest, ProbedRoute, RouteHint, RouteHop};
pub use types::{
    BlockHeight, IncomingPayment, Invoice, MppIdentifier, PaymentHash, PaymentStatus, Preimage,
    PublicKey,
};
