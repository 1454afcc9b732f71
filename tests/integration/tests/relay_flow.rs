//! Integration test: relay attempts end to end against the in-memory node.
//!
//! Covers the validation and safety gates that must stop an attempt before
//! any payment leaves, and the post-dispatch path that must never give up
//! on a payment that may still complete.

use std::sync::Arc;

use chrono::{Duration, Utc};
use paidrelay_core::{
    DispatchErrorPolicy, MppIdentifier, NodeError, PaymentStatus, Preimage, RelayConfig,
    RelayRequest, ValidationError,
};
use paidrelay_engine::adapters::{InMemoryNode, InvoiceState, NodeCall, Operation};
use paidrelay_engine::{
    BestEffort, DeferReason, RelayEngine, RelayError, RelayOutcome, TimingViolation,
};
use paidrelay_integration_tests::{hold_invoice, held, relay_request, route, SequenceClock};

/// Node at height 1000 with a hold invoice for `preimage` held until 1100
/// and a 100_500 route expiring at 1020.
fn ready_node(preimage: &Preimage) -> InMemoryNode {
    let node = InMemoryNode::new(1000);
    node.add_invoice(hold_invoice(preimage, 1100, Duration::minutes(1)));
    node.set_route(Some(route(100_500, 1020)));
    node
}

fn engine() -> RelayEngine {
    RelayEngine::new(RelayConfig::default())
}

// =========================================================================
// Gates before payment
// =========================================================================

#[tokio::test]
async fn test_missing_fields_make_no_node_calls() {
    let preimage = Preimage([1; 32]);
    let node = ready_node(&preimage);
    let complete = relay_request(&preimage, vec![held(1100)]);

    let mut without_destination = complete.clone();
    without_destination.destination = None;
    let mut without_amount = complete.clone();
    without_amount.amount_to_forward = None;
    let mut without_incoming = complete;
    without_incoming.incoming_payments = None;

    for request in [without_destination, without_amount, without_incoming] {
        let err = engine().attempt(&node, &request).await.unwrap_err();
        assert!(matches!(
            err,
            RelayError::Validation(ValidationError::MissingField(_))
        ));
        assert_eq!(err.code(), 400);
    }
    assert!(node.calls().is_empty());
}

#[tokio::test]
async fn test_expired_request_makes_no_node_calls() {
    let preimage = Preimage([2; 32]);
    let node = ready_node(&preimage);
    let mut request = relay_request(&preimage, vec![held(1100)]);
    request.expires_at = Some(Utc::now() - Duration::seconds(1));

    let err = engine().attempt(&node, &request).await.unwrap_err();

    assert_eq!(err.reason(), "ExpectedUnexpiredRelayRequest");
    assert!(node.calls().is_empty());
}

#[tokio::test]
async fn test_expiry_during_probe_stops_payment() {
    let preimage = Preimage([3; 32]);
    let node = ready_node(&preimage);
    let request = relay_request(&preimage, vec![held(1100)]);
    let expires_at = request.expires_at.unwrap();

    // Valid when checked, expired by the time the route is ready.
    let clock = SequenceClock::new([
        expires_at - Duration::minutes(1),
        expires_at + Duration::seconds(1),
    ]);
    let engine = RelayEngine::with_clock(RelayConfig::default(), Arc::new(clock));

    let err = engine.attempt(&node, &request).await.unwrap_err();

    assert_eq!(err, RelayError::ExpiredBeforePayment(expires_at));
    assert_eq!(err.code(), 400);
    assert_eq!(node.call_count(Operation::ProbeRoute), 1);
    assert_eq!(node.call_count(Operation::PayViaRoute), 0);
}

#[tokio::test]
async fn test_fee_above_ceiling_never_pays() {
    let preimage = Preimage([4; 32]);
    let node = ready_node(&preimage);
    node.set_route(Some(route(101_001, 1020)));

    let err = engine()
        .attempt(&node, &relay_request(&preimage, vec![held(1100)]))
        .await
        .unwrap_err();

    assert_eq!(err.reason(), "UnexpectedFeeToRouteToDestination");
    assert_eq!(err.code(), 503);
    assert_eq!(node.call_count(Operation::PayViaRoute), 0);
}

#[tokio::test]
async fn test_no_route_never_pays() {
    let preimage = Preimage([5; 32]);
    let node = ready_node(&preimage);
    node.set_route(None);

    let err = engine()
        .attempt(&node, &relay_request(&preimage, vec![held(1100)]))
        .await
        .unwrap_err();

    assert_eq!(err.reason(), "FailedToFindRouteToDestination");
    assert_eq!(node.call_count(Operation::PayViaRoute), 0);
}

#[tokio::test]
async fn test_earliest_held_timeout_below_floor() {
    let preimage = Preimage([6; 32]);
    let node = ready_node(&preimage);

    let err = engine()
        .attempt(&node, &relay_request(&preimage, vec![held(1000), held(1010)]))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RelayError::Timing(TimingViolation::HoldTooShort { blocks: 0, min: 50 })
    );
    assert_eq!(err.reason(), "ExpectedMoreCltvBlockDeltaRemaining");
    assert_eq!(node.call_count(Operation::PayViaRoute), 0);
}

#[tokio::test]
async fn test_hold_above_ceiling() {
    let preimage = Preimage([7; 32]);
    let node = ready_node(&preimage);

    let err = engine()
        .attempt(&node, &relay_request(&preimage, vec![held(3020)]))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RelayError::Timing(TimingViolation::HoldPeriodTooLong {
            blocks: 2020,
            max: 2016
        })
    );
    assert_eq!(err.reason(), "BlockHoldingPeriodExceedsMaximum");
    assert_eq!(node.call_count(Operation::PayViaRoute), 0);
}

#[tokio::test]
async fn test_cltv_gap_too_small() {
    let preimage = Preimage([8; 32]);
    let node = ready_node(&preimage);
    node.set_route(Some(route(100_500, 1040)));

    let err = engine()
        .attempt(&node, &relay_request(&preimage, vec![held(1100)]))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RelayError::Timing(TimingViolation::CltvGapTooSmall { gap: 60, min: 70 })
    );
    assert_eq!(err.reason(), "ExpectedHigherCltvDeltaBetweenInvoiceAndRoute");
    assert_eq!(node.call_count(Operation::PayViaRoute), 0);
}

// =========================================================================
// Payment and settlement
// =========================================================================

#[tokio::test]
async fn test_successful_relay_settles_hold() {
    let preimage = Preimage([9; 32]);
    let node = ready_node(&preimage);
    node.set_pay_result(Some(PaymentStatus::succeeded(preimage)));

    let report = engine()
        .attempt(&node, &relay_request(&preimage, vec![held(1100)]))
        .await
        .unwrap();

    assert_eq!(report.outcome, RelayOutcome::Settled(preimage));
    assert_eq!(report.route_cost, 100_500);
    assert!(report.dispatch.is_done());
    assert_eq!(
        node.invoice_state(&preimage.payment_hash()),
        Some(InvoiceState::Settled)
    );

    let ops: Vec<Operation> = node.calls().iter().map(NodeCall::operation).collect();
    let pay = ops.iter().position(|o| *o == Operation::PayViaRoute).unwrap();
    let lookup = ops.iter().position(|o| *o == Operation::GetPayment).unwrap();
    let settle = ops
        .iter()
        .position(|o| *o == Operation::SettleHeldInvoice)
        .unwrap();
    assert!(pay < lookup && lookup < settle);
}

#[tokio::test]
async fn test_pay_error_with_recovered_preimage_still_settles() {
    let preimage = Preimage([10; 32]);
    let node = ready_node(&preimage);
    node.fail(Operation::PayViaRoute, NodeError::timeout("stream closed"));
    // The payment went out anyway and has since succeeded.
    node.set_payment(preimage.payment_hash(), PaymentStatus::succeeded(preimage));

    let report = engine()
        .attempt(&node, &relay_request(&preimage, vec![held(1100)]))
        .await
        .unwrap();

    assert!(matches!(report.dispatch, BestEffort::Absorbed(_)));
    assert!(report.outcome.is_settled());
    assert_eq!(
        node.invoice_state(&preimage.payment_hash()),
        Some(InvoiceState::Settled)
    );
}

#[tokio::test]
async fn test_failed_payment_fails_and_never_settles() {
    let preimage = Preimage([11; 32]);
    let node = ready_node(&preimage);
    node.set_pay_result(Some(PaymentStatus::failed()));

    let err = engine()
        .attempt(&node, &relay_request(&preimage, vec![held(1100)]))
        .await
        .unwrap_err();

    assert_eq!(err, RelayError::ForwardingFailed(preimage.payment_hash()));
    assert_eq!(err.reason(), "FailedToPayRelayPayment");
    assert!(err.is_post_dispatch());
    assert_eq!(node.call_count(Operation::SettleHeldInvoice), 0);
    assert_eq!(node.call_count(Operation::CancelHeldInvoice), 0);
    assert_eq!(
        node.invoice_state(&preimage.payment_hash()),
        Some(InvoiceState::Open)
    );
}

#[tokio::test]
async fn test_pending_payment_defers_and_keeps_hold() {
    let preimage = Preimage([12; 32]);
    let node = ready_node(&preimage);
    node.set_pay_result(Some(PaymentStatus::pending()));

    let report = engine()
        .attempt(&node, &relay_request(&preimage, vec![held(1100)]))
        .await
        .unwrap();

    assert_eq!(report.outcome, RelayOutcome::Deferred(DeferReason::PaymentPending));
    assert_eq!(
        node.invoice_state(&preimage.payment_hash()),
        Some(InvoiceState::Open)
    );
}

#[tokio::test]
async fn test_lookup_error_defers() {
    let preimage = Preimage([13; 32]);
    let node = ready_node(&preimage);
    node.fail(Operation::GetPayment, NodeError::unavailable("restarting"));

    let report = engine()
        .attempt(&node, &relay_request(&preimage, vec![held(1100)]))
        .await
        .unwrap();

    assert!(report.lookup.absorbed().is_some());
    assert_eq!(report.outcome, RelayOutcome::Deferred(DeferReason::LookupFailed));
    assert_eq!(node.call_count(Operation::SettleHeldInvoice), 0);
}

#[tokio::test]
async fn test_rejected_dispatch_follows_policy() {
    let preimage = Preimage([14; 32]);
    let request = relay_request(&preimage, vec![held(1100)]);

    let node = ready_node(&preimage);
    node.fail(Operation::PayViaRoute, NodeError::rejected("insufficient balance"));
    let report = engine().attempt(&node, &request).await.unwrap();
    assert_eq!(
        report.outcome,
        RelayOutcome::Deferred(DeferReason::NoPaymentRecord)
    );

    let strict = RelayEngine::new(RelayConfig {
        dispatch_error_policy: DispatchErrorPolicy::FailOnRejection,
        ..RelayConfig::default()
    });
    let err = strict.attempt(&node, &request).await.unwrap_err();
    assert!(matches!(err, RelayError::DispatchRejected(_)));
    assert_eq!(err.reason(), "RejectedRelayPaymentDispatch");
    assert_eq!(
        node.invoice_state(&preimage.payment_hash()),
        Some(InvoiceState::Open)
    );
}

#[tokio::test]
async fn test_multi_part_relay_probes_with_total() {
    let preimage = Preimage([15; 32]);
    let node = ready_node(&preimage);
    node.set_pay_result(Some(PaymentStatus::succeeded(preimage)));
    let mut request = relay_request(&preimage, vec![held(1100), held(1120)]);
    request.mpp_identifier = Some(MppIdentifier([0xaa; 32]));

    let report = engine().attempt(&node, &request).await.unwrap();
    assert!(report.outcome.is_settled());

    let probe = node
        .calls()
        .into_iter()
        .find_map(|c| match c {
            NodeCall::ProbeRoute(probe) => Some(probe),
            _ => None,
        })
        .unwrap();
    assert_eq!(probe.total_mtokens, Some(100_000));
    assert_eq!(probe.mtokens, 100_000);
    assert_eq!(probe.final_cltv_delta, 46);
}

#[tokio::test]
async fn test_request_decoded_from_json_relays() {
    let preimage = Preimage([16; 32]);
    let node = ready_node(&preimage);
    node.set_pay_result(Some(PaymentStatus::succeeded(preimage)));

    let json = serde_json::to_string(&relay_request(&preimage, vec![held(1100)])).unwrap();
    let request: RelayRequest = serde_json::from_str(&json).unwrap();

    let report = engine().attempt(&node, &request).await.unwrap();
    assert_eq!(report.payment_hash, preimage.payment_hash());
    assert!(report.outcome.is_settled());
}
