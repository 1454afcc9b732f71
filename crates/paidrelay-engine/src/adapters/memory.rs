use async_trait::async_trait;
use dashmap::DashMap;
use paidrelay_core::{
    BlockHeight, INode, Invoice, InvoicePage, ListInvoicesRequest, NodeError, PaymentHash,
    PaymentStatus, Preimage, ProbeRequest, ProbedRoute,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// A call made against the in-memory node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCall {
    CurrentHeight,
    ProbeRoute(ProbeRequest),
    PayViaRoute(PaymentHash),
    GetPayment(PaymentHash),
    SettleHeldInvoice(PaymentHash),
    CancelHeldInvoice(PaymentHash),
    ListInvoices(ListInvoicesRequest),
}

/// Node operations, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CurrentHeight,
    ProbeRoute,
    PayViaRoute,
    GetPayment,
    SettleHeldInvoice,
    CancelHeldInvoice,
    ListInvoices,
}

impl NodeCall {
    pub fn operation(&self) -> Operation {
        match self {
            Self::CurrentHeight => Operation::CurrentHeight,
            Self::ProbeRoute(_) => Operation::ProbeRoute,
            Self::PayViaRoute(_) => Operation::PayViaRoute,
            Self::GetPayment(_) => Operation::GetPayment,
            Self::SettleHeldInvoice(_) => Operation::SettleHeldInvoice,
            Self::CancelHeldInvoice(_) => Operation::CancelHeldInvoice,
            Self::ListInvoices(_) => Operation::ListInvoices,
        }
    }
}

/// Resolution state of a hold invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceState {
    Open,
    Settled,
    Canceled,
}

#[derive(Debug, Clone)]
struct InvoiceRecord {
    invoice: Invoice,
    state: InvoiceState,
}

/// In-process payment-channel node.
///
/// Keeps invoices, outgoing payments and chain height in memory, records
/// every call and lets individual operations be made to fail. Settle and
/// cancel are idempotent like a real node's.
pub struct InMemoryNode {
    height: AtomicU32,
    /// Route returned by every probe.
    route: Mutex<Option<ProbedRoute>>,
    probe_delay: Mutex<Option<Duration>>,
    /// Payment status recorded when a payment is dispatched.
    pay_result: Mutex<Option<PaymentStatus>>,
    invoices: DashMap<PaymentHash, InvoiceRecord>,
    payments: DashMap<PaymentHash, PaymentStatus>,
    failures: DashMap<Operation, NodeError>,
    calls: Mutex<Vec<NodeCall>>,
}

impl InMemoryNode {
    /// Create a node at the given chain height with no invoices and no routes.
    pub fn new(height: BlockHeight) -> Self {
        Self {
            height: AtomicU32::new(height),
            route: Mutex::new(None),
            probe_delay: Mutex::new(None),
            pay_result: Mutex::new(None),
            invoices: DashMap::new(),
            payments: DashMap::new(),
            failures: DashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_height(&self, height: BlockHeight) {
        self.height.store(height, Ordering::SeqCst);
    }

    /// Route every subsequent probe finds; `None` means no path.
    pub fn set_route(&self, route: Option<ProbedRoute>) {
        *self.route.lock().unwrap_or_else(PoisonError::into_inner) = route;
    }

    /// Make probes take this long.
    pub fn set_probe_delay(&self, delay: Duration) {
        *self.probe_delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    /// Status recorded for a payment when it is dispatched.
    pub fn set_pay_result(&self, status: Option<PaymentStatus>) {
        *self.pay_result.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Set an outgoing payment's status directly.
    pub fn set_payment(&self, payment_hash: PaymentHash, status: PaymentStatus) {
        self.payments.insert(payment_hash, status);
    }

    /// Add an open invoice.
    pub fn add_invoice(&self, invoice: Invoice) {
        self.invoices.insert(
            invoice.id,
            InvoiceRecord {
                invoice,
                state: InvoiceState::Open,
            },
        );
    }

    pub fn invoice_state(&self, id: &PaymentHash) -> Option<InvoiceState> {
        self.invoices.get(id).map(|r| r.state)
    }

    /// Make every call to `operation` fail with `error` until cleared.
    pub fn fail(&self, operation: Operation, error: NodeError) {
        self.failures.insert(operation, error);
    }

    pub fn clear_failure(&self, operation: Operation) {
        self.failures.remove(&operation);
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<NodeCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls made to `operation`.
    pub fn call_count(&self, operation: Operation) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Record the call, then return the injected failure for it if any.
    fn enter(&self, call: NodeCall) -> Result<(), NodeError> {
        let operation = call.operation();
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        match self.failures.get(&operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn release_holds(record: &mut InvoiceRecord, state: InvoiceState) {
        record.state = state;
        for payment in &mut record.invoice.payments {
            payment.is_held = false;
        }
    }
}

impl Default for InMemoryNode {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl INode for InMemoryNode {
    async fn current_height(&self) -> Result<BlockHeight, NodeError> {
        self.enter(NodeCall::CurrentHeight)?;
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn probe_route(&self, request: ProbeRequest) -> Result<Option<ProbedRoute>, NodeError> {
        self.enter(NodeCall::ProbeRoute(request))?;
        let delay = *self.probe_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .route
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn pay_via_route(
        &self,
        payment_hash: &PaymentHash,
        route: &ProbedRoute,
    ) -> Result<(), NodeError> {
        self.enter(NodeCall::PayViaRoute(*payment_hash))?;
        let result = self
            .pay_result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(status) = result {
            self.payments.insert(*payment_hash, status);
        }
        tracing::debug!(
            payment_hash = %payment_hash,
            mtokens = route.mtokens,
            "in-memory node dispatched payment"
        );
        Ok(())
    }

    async fn get_payment(
        &self,
        payment_hash: &PaymentHash,
    ) -> Result<Option<PaymentStatus>, NodeError> {
        self.enter(NodeCall::GetPayment(*payment_hash))?;
        Ok(self.payments.get(payment_hash).map(|s| s.clone()))
    }

    async fn settle_held_invoice(&self, preimage: &Preimage) -> Result<(), NodeError> {
        let id = preimage.payment_hash();
        self.enter(NodeCall::SettleHeldInvoice(id))?;

        let mut record = self
            .invoices
            .get_mut(&id)
            .ok_or_else(|| NodeError::not_found(format!("no invoice for payment hash {id}")))?;

        match record.state {
            InvoiceState::Settled => Ok(()),
            InvoiceState::Canceled => Err(NodeError::rejected(format!(
                "invoice {id} is already canceled"
            ))),
            InvoiceState::Open => {
                Self::release_holds(&mut record, InvoiceState::Settled);
                tracing::info!(invoice = %id, "in-memory invoice settled");
                Ok(())
            }
        }
    }

    async fn cancel_held_invoice(&self, id: &PaymentHash) -> Result<(), NodeError> {
        self.enter(NodeCall::CancelHeldInvoice(*id))?;

        let mut record = self
            .invoices
            .get_mut(id)
            .ok_or_else(|| NodeError::not_found(format!("no invoice {id}")))?;

        match record.state {
            InvoiceState::Canceled => Ok(()),
            InvoiceState::Settled => Err(NodeError::rejected(format!(
                "invoice {id} is already settled"
            ))),
            InvoiceState::Open => {
                Self::release_holds(&mut record, InvoiceState::Canceled);
                tracing::info!(invoice = %id, "in-memory invoice canceled");
                Ok(())
            }
        }
    }

    async fn list_invoices(&self, request: ListInvoicesRequest) -> Result<InvoicePage, NodeError> {
        self.enter(NodeCall::ListInvoices(request.clone()))?;

        let offset = match &request.page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| NodeError::rejected(format!("bad page token {token}")))?,
            None => 0,
        };
        let limit = request.limit.map_or(usize::MAX, |l| l as usize);

        let mut invoices: Vec<Invoice> = self
            .invoices
            .iter()
            .map(|r| r.invoice.clone())
            .collect();
        invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let page: Vec<Invoice> = invoices.iter().skip(offset).take(limit).cloned().collect();
        let next = offset + page.len();
        let next_page_token = (next < invoices.len()).then(|| next.to_string());

        Ok(InvoicePage {
            invoices: page,
            next_page_token,
        })
    }
}
