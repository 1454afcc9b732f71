use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Chain height in blocks.
pub type BlockHeight = u32;

/// Fixed-size byte identifiers that travel as lowercase hex.
macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Borrow the raw bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Parse from a byte slice of exactly the right length.
            pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
                let arr: [u8; $len] = bytes.try_into().map_err(|_| CoreError::InvalidLength {
                    expected: $len,
                    actual: bytes.len(),
                })?;
                Ok(Self(arr))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_slice(&hex::decode(s)?)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&hex::encode(self.0))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_id!(
    /// SHA-256 of a payment preimage. Keys the incoming hold, the outgoing
    /// payment and the settlement.
    PaymentHash,
    32
);

hex_id!(
    /// The secret whose hash is the payment hash. Revealing it settles a hold.
    Preimage,
    32
);

hex_id!(
    /// Identifier shared by the shards of a multi-part payment.
    MppIdentifier,
    32
);

hex_id!(
    /// Compressed secp256k1 node public key.
    PublicKey,
    33
);

impl Preimage {
    /// The payment hash this preimage unlocks.
    pub fn payment_hash(&self) -> PaymentHash {
        PaymentHash(Sha256::digest(self.0).into())
    }
}

/// One HTLC shard backing an incoming payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingPayment {
    /// Whether the shard is currently held (accepted but unresolved).
    pub is_held: bool,
    /// Absolute height at which the shard times out.
    pub timeout_height: BlockHeight,
}

/// An invoice as listed by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// The invoice id is its payment hash.
    pub id: PaymentHash,
    /// When the invoice was created.
    pub created_at: DateTime<Utc>,
    /// HTLC shards paying this invoice.
    pub payments: Vec<IncomingPayment>,
}

impl Invoice {
    /// True when at least one shard is currently held.
    pub fn is_held(&self) -> bool {
        self.payments.iter().any(|p| p.is_held)
    }
}

/// Outgoing payment state as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatus {
    /// The payment conclusively failed.
    pub is_failed: bool,
    /// Present once the payment succeeded.
    pub preimage: Option<Preimage>,
}

impl PaymentStatus {
    pub fn pending() -> Self {
        Self {
            is_failed: false,
            preimage: None,
        }
    }

    pub fn failed() -> Self {
        Self {
            is_failed: true,
            preimage: None,
        }
    }

    pub fn succeeded(preimage: Preimage) -> Self {
        Self {
            is_failed: false,
            preimage: Some(preimage),
        }
    }
}
