use paidrelay_core::{INode, NodeError, ProbeRequest, ProbedRoute, RelayConfig, ValidatedRelay};
use std::time::Duration;

/// Probes routes with the relay's safety parameters applied.
#[derive(Debug, Clone)]
pub struct RouteProber {
    cltv_delta_buffer: u32,
    probe_timeout: Duration,
}

impl RouteProber {
    pub fn new(cltv_delta_buffer: u32, probe_timeout: Duration) -> Self {
        Self {
            cltv_delta_buffer,
            probe_timeout,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.cltv_delta_buffer, config.probe_timeout())
    }

    /// Build the probe for a relay.
    ///
    /// The buffer covers the extra hop through the relay. A multi-part
    /// payment probes with the forwarded amount as the known total.
    pub fn probe_request(&self, relay: &ValidatedRelay) -> ProbeRequest {
        ProbeRequest {
            destination: relay.destination,
            final_cltv_delta: relay.final_cltv_delta.saturating_add(self.cltv_delta_buffer),
            features: relay.features.clone(),
            outgoing_channel: relay.outgoing_channel.clone(),
            mtokens: relay.amount_to_forward,
            total_mtokens: relay.mpp_identifier.map(|_| relay.amount_to_forward),
            route_hints: relay.route_hints.clone(),
            probe_timeout: self.probe_timeout,
        }
    }

    /// Probe for a route, giving up after the probe timeout.
    pub async fn probe(
        &self,
        node: &dyn INode,
        relay: &ValidatedRelay,
    ) -> Result<Option<ProbedRoute>, NodeError> {
        let request = self.probe_request(relay);
        tracing::debug!(
            payment_hash = %relay.payment_hash,
            final_cltv_delta = request.final_cltv_delta,
            mtokens = request.mtokens,
            "probing relay route"
        );

        match tokio::time::timeout(self.probe_timeout, node.probe_route(request)).await {
            Ok(result) => result,
            Err(_) => Err(NodeError::timeout(format!(
                "route probe did not finish within {}s",
                self.probe_timeout.as_secs()
            ))),
        }
    }
}
