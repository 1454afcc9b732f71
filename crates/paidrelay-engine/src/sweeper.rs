//! One reconciliation pass over the node's held invoices.
//!
//! Holds running out of runway are canceled; holds whose outgoing payment
//! has since produced a preimage are settled. Per-invoice failures are
//! absorbed, the next pass retries.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use paidrelay_core::blocks::blocks_until_hold_lost;
use chrono::{DateTime, Utc};
use paidrelay_core::{
    BlockHeight, Clock, INode, Invoice, ListInvoicesRequest, PaymentHash, PaymentStatus,
    SweeperConfig, SystemClock,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::SweepError;
use crate::outcome::{BestEffort, InvoiceSweep, SweepAction, SweepReport};

/// What to do with a held invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepDecision {
    Cancel,
    TrySettle,
}

/// A held invoice that still has runway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedInvoice {
    pub id: PaymentHash,
    pub blocks_remaining: i64,
    pub decision: SweepDecision,
}

/// Decide the fate of each held invoice at `height`.
///
/// Returns the plan plus the number of held invoices whose hold already
/// timed out; those are left to the node.
pub fn plan(
    invoices: &[Invoice],
    height: BlockHeight,
    cancel_threshold_blocks: u32,
) -> (Vec<PlannedInvoice>, usize) {
    let mut planned = Vec::new();
    let mut expired = 0;

    for invoice in invoices.iter().filter(|i| i.is_held()) {
        let Some(blocks_remaining) = blocks_until_hold_lost(&invoice.payments, height) else {
            continue;
        };
        if blocks_remaining <= 0 {
            expired += 1;
            continue;
        }

        let decision = if blocks_remaining < i64::from(cancel_threshold_blocks) {
            SweepDecision::Cancel
        } else {
            SweepDecision::TrySettle
        };
        planned.push(PlannedInvoice {
            id: invoice.id,
            blocks_remaining,
            decision,
        });
    }

    (planned, expired)
}

/// Reconciles held invoices against outgoing payments.
pub struct Sweeper {
    config: SweeperConfig,
    clock: Arc<dyn Clock>,
}

impl Sweeper {
    pub fn new(config: SweeperConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: SweeperConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &SweeperConfig {
        &self.config
    }

    /// Run one sweep pass.
    ///
    /// Fails only when listing invoices or fetching the height fails.
    pub async fn sweep(&self, node: &dyn INode) -> Result<SweepReport, SweepError> {
        let sweep_id = Uuid::now_v7();
        let span = tracing::info_span!("sweep", %sweep_id);
        self.run(node, sweep_id).instrument(span).await
    }

    async fn run(&self, node: &dyn INode, sweep_id: Uuid) -> Result<SweepReport, SweepError> {
        let invoices = self.recent_invoices(node).await?;
        let height = node.current_height().await.map_err(SweepError::Height)?;

        let (planned, expired) = plan(&invoices, height, self.config.cancel_threshold_blocks);
        tracing::debug!(
            scanned = invoices.len(),
            planned = planned.len(),
            expired,
            height,
            "sweep planned"
        );

        // At most `max_concurrency` invoices in flight, reported in listing order.
        let concurrency = self.config.max_concurrency.max(1) as usize;
        let actions: Vec<InvoiceSweep> = stream::iter(planned)
            .map(|p| Self::resolve(node, p))
            .buffered(concurrency)
            .collect()
            .await;

        let report = SweepReport {
            sweep_id,
            height,
            scanned: invoices.len(),
            expired,
            actions,
        };
        tracing::info!(
            scanned = report.scanned,
            canceled = report.canceled(),
            settled = report.settled(),
            absorbed_errors = report.absorbed_errors().len(),
            "sweep finished"
        );
        Ok(report)
    }

    /// Page through invoices, newest first, until one predates the age cutoff.
    ///
    /// Invoices older than the cutoff are dropped.
    async fn recent_invoices(&self, node: &dyn INode) -> Result<Vec<Invoice>, SweepError> {
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(self.config.invoice_max_age())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut invoices = Vec::new();
        let mut page_token = None;

        loop {
            let page = node
                .list_invoices(ListInvoicesRequest {
                    page_token: page_token.take(),
                    limit: Some(self.config.page_size),
                })
                .await
                .map_err(SweepError::ListInvoices)?;

            let page_len = page.invoices.len();
            let reached_cutoff = page.invoices.iter().any(|i| i.created_at < cutoff);
            invoices.extend(page.invoices.into_iter().filter(|i| i.created_at >= cutoff));

            match page.next_page_token {
                Some(next) if !reached_cutoff && page_len > 0 => page_token = Some(next),
                _ => break,
            }
        }

        Ok(invoices)
    }

    async fn resolve(node: &dyn INode, planned: PlannedInvoice) -> InvoiceSweep {
        let id = planned.id;
        let action = match planned.decision {
            SweepDecision::Cancel => {
                let result: BestEffort<()> = node.cancel_held_invoice(&id).await.into();
                match result.absorbed() {
                    Some(e) => tracing::warn!(invoice = %id, error = %e, "cancel failed"),
                    None => tracing::info!(
                        invoice = %id,
                        blocks_remaining = planned.blocks_remaining,
                        "canceled held invoice near timeout"
                    ),
                }
                SweepAction::Canceled(result)
            }
            SweepDecision::TrySettle => match node.get_payment(&id).await {
                Err(e) => {
                    tracing::warn!(invoice = %id, error = %e, "payment lookup failed");
                    SweepAction::LookupFailed(e)
                }
                Ok(Some(PaymentStatus {
                    preimage: Some(preimage),
                    ..
                })) => {
                    let result: BestEffort<()> = node.settle_held_invoice(&preimage).await.into();
                    match result.absorbed() {
                        Some(e) => tracing::warn!(invoice = %id, error = %e, "settle failed"),
                        None => tracing::info!(invoice = %id, "settled held invoice"),
                    }
                    SweepAction::Settled(result)
                }
                Ok(_) => SweepAction::AwaitingPreimage,
            },
        };

        InvoiceSweep {
            id,
            blocks_remaining: planned.blocks_remaining,
            action,
        }
    }
}
