//! Block-height arithmetic shared by the relay engine and the sweeper.

use crate::types::{BlockHeight, IncomingPayment};

/// Earliest timeout height among the held shards, if any shard is held.
pub fn earliest_held_timeout(payments: &[IncomingPayment]) -> Option<BlockHeight> {
    payments
        .iter()
        .filter(|p| p.is_held)
        .map(|p| p.timeout_height)
        .min()
}

/// Signed number of blocks from `current` until `timeout`.
///
/// Negative once the timeout has passed.
pub fn blocks_until(timeout: BlockHeight, current: BlockHeight) -> i64 {
    i64::from(timeout) - i64::from(current)
}

/// Blocks left before the first held shard times out.
///
/// `None` when nothing is held.
pub fn blocks_until_hold_lost(payments: &[IncomingPayment], current: BlockHeight) -> Option<i64> {
    earliest_held_timeout(payments).map(|timeout| blocks_until(timeout, current))
}
