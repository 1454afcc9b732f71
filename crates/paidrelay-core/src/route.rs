use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{BlockHeight, PublicKey};

/// One hop of a caller-supplied partial route toward the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintHop {
    /// Node forwarding over `channel`.
    pub public_key: PublicKey,
    /// Short channel id, e.g. `700000x1x0`.
    pub channel: String,
    /// Base fee in millitokens.
    #[serde(default)]
    pub base_fee_mtokens: u64,
    /// Proportional fee in parts per million.
    #[serde(default)]
    pub fee_rate: u32,
    /// CLTV delta the hop requires.
    #[serde(default)]
    pub cltv_delta: u32,
}

/// A partial route hint (usually a private channel into the destination).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteHint {
    pub hops: Vec<HintHop>,
}

/// A hop of a fully probed route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteHop {
    /// Channel traversed by this hop.
    pub channel: String,
    /// Node receiving the HTLC at this hop.
    pub public_key: PublicKey,
    /// Amount forwarded out of this hop in millitokens.
    pub forward_mtokens: u64,
    /// Fee charged at this hop in millitokens.
    pub fee_mtokens: u64,
    /// Absolute timeout of the HTLC at this hop.
    pub timeout: BlockHeight,
}

/// A route found by probing, ready to be paid along.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbedRoute {
    /// Ordered hops from the relay toward the destination.
    pub hops: Vec<RouteHop>,
    /// Total amount the relay sends, fees included, in millitokens.
    pub mtokens: u64,
    /// Routing fees included in `mtokens`.
    pub fee_mtokens: u64,
    /// Absolute height at which the outgoing HTLC expires.
    pub timeout_height: BlockHeight,
}

impl ProbedRoute {
    /// What it costs the relay to pay along this route.
    pub fn cost(&self) -> u64 {
        self.mtokens
    }

    /// Number of hops.
    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    /// The channel the route leaves through.
    pub fn first_channel(&self) -> Option<&str> {
        self.hops.first().map(|h| h.channel.as_str())
    }
}

/// Parameters for a route probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub destination: PublicKey,
    /// Final CLTV delta including the relay's safety buffer.
    pub final_cltv_delta: u32,
    /// Destination feature bits.
    pub features: Vec<u16>,
    /// First hop must use this channel.
    pub outgoing_channel: String,
    /// Amount to deliver in millitokens.
    pub mtokens: u64,
    /// Total amount for a multi-part payment, when known.
    pub total_mtokens: Option<u64>,
    pub route_hints: Vec<RouteHint>,
    /// How long the node may search.
    pub probe_timeout: Duration,
}
