//! The relay attempt pipeline.
//!
//! validate → probe → {fee check, height} → timing check → pay → recover
//! preimage → settle. Everything up to the timing check fails without side
//! effects. From the payment onward a local error never fails the attempt,
//! because the outgoing payment may still complete; only a conclusively
//! failed payment does.

use std::sync::Arc;

use paidrelay_core::blocks::{blocks_until, blocks_until_hold_lost};
use paidrelay_core::{
    BlockHeight, Clock, DispatchErrorPolicy, INode, IncomingPayment, NodeError, NodeErrorKind,
    PaymentStatus, ProbedRoute, RelayConfig, RelayRequest, SystemClock, ValidatedRelay,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{RelayError, TimingViolation};
use crate::outcome::{BestEffort, DeferReason, RelayOutcome, RelayReport};
use crate::prober::RouteProber;

/// Block margins computed by the timing check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingMargins {
    /// Blocks until the first held incoming shard times out.
    pub blocks_until_hold_lost: i64,
    /// Blocks until the outgoing HTLC times out.
    pub blocks_until_pay_timeout: i64,
}

impl TimingMargins {
    /// How many blocks the incoming hold outlives the outgoing HTLC.
    pub fn cltv_gap(&self) -> i64 {
        self.blocks_until_hold_lost - self.blocks_until_pay_timeout
    }
}

/// Require a route whose cost stays within the relay's ceiling.
pub fn check_fee(
    route: Option<ProbedRoute>,
    relay: &ValidatedRelay,
) -> Result<ProbedRoute, RelayError> {
    let route = route.ok_or(RelayError::NoRoute(relay.destination))?;
    if route.cost() > relay.max_amount {
        return Err(RelayError::FeeExceeded {
            cost: route.cost(),
            max_amount: relay.max_amount,
        });
    }
    Ok(route)
}

/// Check the hold runway and the gap between the hold and the outgoing route.
///
/// With nothing held there is no runway at all.
pub fn check_timeout(
    config: &RelayConfig,
    incoming: &[IncomingPayment],
    route: &ProbedRoute,
    height: BlockHeight,
) -> Result<TimingMargins, TimingViolation> {
    let blocks_until_hold_lost = blocks_until_hold_lost(incoming, height).unwrap_or(0);

    if blocks_until_hold_lost > i64::from(config.max_hold_blocks) {
        return Err(TimingViolation::HoldPeriodTooLong {
            blocks: blocks_until_hold_lost,
            max: config.max_hold_blocks,
        });
    }

    if blocks_until_hold_lost < i64::from(config.min_hold_blocks) {
        return Err(TimingViolation::HoldTooShort {
            blocks: blocks_until_hold_lost,
            min: config.min_hold_blocks,
        });
    }

    let margins = TimingMargins {
        blocks_until_hold_lost,
        blocks_until_pay_timeout: blocks_until(route.timeout_height, height),
    };

    if margins.cltv_gap() < i64::from(config.min_cltv_gap) {
        return Err(TimingViolation::CltvGapTooSmall {
            gap: margins.cltv_gap(),
            min: config.min_cltv_gap,
        });
    }

    Ok(margins)
}

/// Runs relay attempts.
pub struct RelayEngine {
    config: RelayConfig,
    prober: RouteProber,
    clock: Arc<dyn Clock>,
}

impl RelayEngine {
    /// Create an engine on the system clock.
    pub fn new(config: RelayConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RelayConfig, clock: Arc<dyn Clock>) -> Self {
        let prober = RouteProber::from_config(&config);
        Self {
            config,
            prober,
            clock,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Attempt one relay.
    ///
    /// `Ok` does not mean the hold was settled: check the report's outcome.
    /// A deferred attempt leaves the hold for the sweeper.
    pub async fn attempt(
        &self,
        node: &dyn INode,
        request: &RelayRequest,
    ) -> Result<RelayReport, RelayError> {
        let attempt_id = Uuid::now_v7();
        let relay = request.validate(self.clock.now()).map_err(|e| {
            tracing::debug!(%attempt_id, error = %e, "relay request rejected");
            RelayError::from(e)
        })?;

        let span = tracing::info_span!("relay", %attempt_id, payment_hash = %relay.payment_hash);
        let result = self.run(node, &relay, attempt_id).instrument(span.clone()).await;
        if let Err(ref e) = result {
            span.in_scope(|| {
                tracing::info!(
                    code = e.code(),
                    reason = e.reason(),
                    error = %e,
                    "relay attempt failed"
                )
            });
        }
        result
    }

    async fn run(
        &self,
        node: &dyn INode,
        relay: &ValidatedRelay,
        attempt_id: Uuid,
    ) -> Result<RelayReport, RelayError> {
        let probed = self
            .prober
            .probe(node, relay)
            .await
            .map_err(RelayError::Probe)?;

        // Fee check and height fetch only depend on the probe.
        let (route, height) = tokio::join!(
            async { check_fee(probed, relay) },
            node.current_height()
        );
        let route = route?;
        let height = height.map_err(RelayError::Height)?;

        let margins = check_timeout(&self.config, &relay.incoming_payments, &route, height)?;
        tracing::debug!(
            height,
            cost = route.cost(),
            blocks_until_hold_lost = margins.blocks_until_hold_lost,
            blocks_until_pay_timeout = margins.blocks_until_pay_timeout,
            "relay passed fee and timing checks"
        );

        // Probing can take a while.
        if relay.is_expired_at(self.clock.now()) {
            return Err(RelayError::ExpiredBeforePayment(relay.expires_at));
        }

        let dispatch: BestEffort<()> = node.pay_via_route(&relay.payment_hash, &route).await.into();
        let rejected = match &dispatch {
            BestEffort::Done(()) => {
                tracing::info!(
                    cost = route.cost(),
                    hops = route.hop_count(),
                    channel = route.first_channel(),
                    "relay payment dispatched"
                );
                false
            }
            BestEffort::Absorbed(e) => {
                tracing::warn!(error = %e, "relay payment dispatch failed, checking payment status");
                e.kind == NodeErrorKind::Rejected
                    && self.config.dispatch_error_policy == DispatchErrorPolicy::FailOnRejection
            }
        };

        let lookup: BestEffort<Option<PaymentStatus>> =
            node.get_payment(&relay.payment_hash).await.into();

        let recovered = match &lookup {
            BestEffort::Absorbed(e) => {
                tracing::warn!(error = %e, "relay payment lookup failed");
                Err(DeferReason::LookupFailed)
            }
            BestEffort::Done(Some(status)) if status.is_failed => {
                return Err(RelayError::ForwardingFailed(relay.payment_hash));
            }
            BestEffort::Done(None) if rejected => {
                // Rejected outright and never recorded: nothing left the node.
                let error = dispatch
                    .absorbed()
                    .cloned()
                    .unwrap_or_else(|| NodeError::rejected("payment dispatch rejected"));
                return Err(RelayError::DispatchRejected(error));
            }
            BestEffort::Done(None) => Err(DeferReason::NoPaymentRecord),
            BestEffort::Done(Some(PaymentStatus { preimage: None, .. })) => {
                Err(DeferReason::PaymentPending)
            }
            BestEffort::Done(Some(PaymentStatus {
                preimage: Some(preimage),
                ..
            })) => Ok(*preimage),
        };

        let outcome = match recovered {
            Err(reason) => {
                tracing::info!(%reason, "relay deferred, leaving hold for the sweeper");
                RelayOutcome::Deferred(reason)
            }
            Ok(preimage) => match node.settle_held_invoice(&preimage).await {
                Ok(()) => {
                    tracing::info!(cost = route.cost(), "relay settled");
                    RelayOutcome::Settled(preimage)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "settling relayed hold failed, sweeper will retry");
                    RelayOutcome::Deferred(DeferReason::SettleFailed(e))
                }
            },
        };

        Ok(RelayReport {
            attempt_id,
            payment_hash: relay.payment_hash,
            route_cost: route.cost(),
            dispatch,
            lookup,
            outcome,
        })
    }
}
