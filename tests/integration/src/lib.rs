//! Fixtures shared by the end-to-end relay and sweep scenarios.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use paidrelay_core::{
    BlockHeight, Clock, IncomingPayment, Invoice, Preimage, ProbedRoute, PublicKey, RelayRequest,
    RouteHop,
};

/// Channel the relay forwards through in every scenario.
pub const OUTGOING_CHANNEL: &str = "700000x1x0";

/// Clock that returns scripted instants in order, then repeats the last one.
pub struct SequenceClock {
    instants: Mutex<VecDeque<DateTime<Utc>>>,
    last: Mutex<DateTime<Utc>>,
}

impl SequenceClock {
    pub fn new(instants: impl IntoIterator<Item = DateTime<Utc>>) -> Self {
        let instants: VecDeque<_> = instants.into_iter().collect();
        let last = instants.front().copied().unwrap_or_else(Utc::now);
        Self {
            instants: Mutex::new(instants),
            last: Mutex::new(last),
        }
    }
}

impl Clock for SequenceClock {
    fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let next = self
            .instants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(next) = next {
            *last = next;
        }
        *last
    }
}

pub fn held(timeout_height: BlockHeight) -> IncomingPayment {
    IncomingPayment {
        is_held: true,
        timeout_height,
    }
}

/// Single-hop route costing `cost` and expiring at `timeout_height`.
pub fn route(cost: u64, timeout_height: BlockHeight) -> ProbedRoute {
    ProbedRoute {
        hops: vec![RouteHop {
            channel: OUTGOING_CHANNEL.into(),
            public_key: destination(),
            forward_mtokens: cost,
            fee_mtokens: 0,
            timeout: timeout_height,
        }],
        mtokens: cost,
        fee_mtokens: 0,
        timeout_height,
    }
}

pub fn destination() -> PublicKey {
    PublicKey([3; 33])
}

/// A complete relay request for `preimage`'s hash, expiring an hour from now.
///
/// Forwards 100_000 with a 101_000 ceiling.
pub fn relay_request(preimage: &Preimage, incoming: Vec<IncomingPayment>) -> RelayRequest {
    RelayRequest {
        payment_hash: Some(preimage.payment_hash()),
        destination: Some(destination()),
        final_cltv_delta: Some(40),
        expires_at: Some(Utc::now() + Duration::hours(1)),
        amount_to_forward: Some(100_000),
        max_amount: Some(101_000),
        outgoing_channel: Some(OUTGOING_CHANNEL.into()),
        route_hints: Vec::new(),
        features: Vec::new(),
        mpp_identifier: None,
        incoming_payments: Some(incoming),
    }
}

/// A hold invoice for `preimage` created `age` ago, held until `timeout_height`.
pub fn hold_invoice(preimage: &Preimage, timeout_height: BlockHeight, age: Duration) -> Invoice {
    Invoice {
        id: preimage.payment_hash(),
        created_at: Utc::now() - age,
        payments: vec![held(timeout_height)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_clock_repeats_last_instant() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::minutes(5);
        let clock = SequenceClock::new([t0, t1]);
        assert_eq!(clock.now(), t0);
        assert_eq!(clock.now(), t1);
        assert_eq!(clock.now(), t1);
    }
}
