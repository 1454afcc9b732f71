use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::NodeError;
use crate::route::{ProbeRequest, ProbedRoute};
use crate::types::{BlockHeight, Invoice, PaymentHash, PaymentStatus, Preimage};

/// Paging parameters for listing invoices, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListInvoicesRequest {
    /// Opaque token returned by the previous page.
    pub page_token: Option<String>,
    /// Maximum number of invoices to return.
    pub limit: Option<u32>,
}

/// One page of invoices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePage {
    pub invoices: Vec<Invoice>,
    /// Present when more invoices follow.
    pub next_page_token: Option<String>,
}

/// Payment-channel node interface.
///
/// Each implementation bridges the relay engine to a concrete node runtime.
/// The engine borrows the node for the length of one call and never caches
/// anything it returns. Settle and cancel are expected to be idempotent.
#[async_trait]
pub trait INode: Send + Sync {
    /// Current chain height.
    async fn current_height(&self) -> Result<BlockHeight, NodeError>;

    /// Find a route for the probe. `Ok(None)` means no path exists.
    async fn probe_route(&self, request: ProbeRequest) -> Result<Option<ProbedRoute>, NodeError>;

    /// Pay along exactly this route.
    async fn pay_via_route(
        &self,
        payment_hash: &PaymentHash,
        route: &ProbedRoute,
    ) -> Result<(), NodeError>;

    /// Look up an outgoing payment. `Ok(None)` means the node has no record yet.
    async fn get_payment(
        &self,
        payment_hash: &PaymentHash,
    ) -> Result<Option<PaymentStatus>, NodeError>;

    /// Settle the held invoice whose hash matches this preimage.
    async fn settle_held_invoice(&self, preimage: &Preimage) -> Result<(), NodeError>;

    /// Cancel a held invoice, returning its HTLCs to the payer.
    async fn cancel_held_invoice(&self, id: &PaymentHash) -> Result<(), NodeError>;

    /// List invoices, newest first.
    async fn list_invoices(&self, request: ListInvoicesRequest) -> Result<InvoicePage, NodeError>;
}
