use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::route::RouteHint;
use crate::types::{IncomingPayment, MppIdentifier, PaymentHash, PublicKey};

/// A relay mandate as received from a caller.
///
/// Every field is optional so a request can be decoded before it is checked;
/// [`RelayRequest::validate`] turns it into a [`ValidatedRelay`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub payment_hash: Option<PaymentHash>,
    pub destination: Option<PublicKey>,
    pub final_cltv_delta: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Amount to deliver to the destination in millitokens.
    pub amount_to_forward: Option<u64>,
    /// Most the relay will spend on the forward, fees included.
    pub max_amount: Option<u64>,
    pub outgoing_channel: Option<String>,
    #[serde(default)]
    pub route_hints: Vec<RouteHint>,
    #[serde(default)]
    pub features: Vec<u16>,
    pub mpp_identifier: Option<MppIdentifier>,
    /// Shards of the incoming payment backing this relay.
    pub incoming_payments: Option<Vec<IncomingPayment>>,
}

/// A relay request that passed validation. Immutable for the rest of the attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRelay {
    pub payment_hash: PaymentHash,
    pub destination: PublicKey,
    pub final_cltv_delta: u32,
    pub expires_at: DateTime<Utc>,
    pub amount_to_forward: u64,
    pub max_amount: u64,
    pub outgoing_channel: String,
    pub route_hints: Vec<RouteHint>,
    pub features: Vec<u16>,
    pub mpp_identifier: Option<MppIdentifier>,
    pub incoming_payments: Vec<IncomingPayment>,
}

impl ValidatedRelay {
    /// Whether the relay deadline has passed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

fn required<T: Clone>(value: &Option<T>, field: &'static str) -> Result<T, ValidationError> {
    value.clone().ok_or(ValidationError::MissingField(field))
}

impl RelayRequest {
    /// Check that every required field is present and the deadline has not passed.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<ValidatedRelay, ValidationError> {
        let final_cltv_delta = required(&self.final_cltv_delta, "final_cltv_delta")?;
        let destination = required(&self.destination, "destination")?;
        let expires_at = required(&self.expires_at, "expires_at")?;
        let payment_hash = required(&self.payment_hash, "payment_hash")?;
        let outgoing_channel = required(&self.outgoing_channel, "outgoing_channel")?;
        let max_amount = required(&self.max_amount, "max_amount")?;
        let amount_to_forward = required(&self.amount_to_forward, "amount_to_forward")?;
        let incoming_payments = required(&self.incoming_payments, "incoming_payments")?;

        if now > expires_at {
            return Err(ValidationError::Expired(expires_at));
        }

        Ok(ValidatedRelay {
            payment_hash,
            destination,
            final_cltv_delta,
            expires_at,
            amount_to_forward,
            max_amount,
            outgoing_channel,
            route_hints: self.route_hints.clone(),
            features: self.features.clone(),
            mpp_identifier: self.mpp_identifier,
            incoming_payments,
        })
    }
}
