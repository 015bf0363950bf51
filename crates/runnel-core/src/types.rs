//! Core protocol types: identities and sender operations.
//!
//! Amounts are `u128`, per-second rates `u128`, signed per-cycle deltas
//! `i128`, weights `u32`, timestamps `u64` seconds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte account identity.
///
/// Opaque to the engine: senders, receivers and proxies are all identified
/// by an `AccountId`. The all-zero identity is reserved as the weighted-list
/// sentinel and is rejected wherever a real participant is expected.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// The sentinel identity rooting every weighted receiver list.
    pub const ROOT: Self = Self([0u8; 32]);

    /// Create an AccountId from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse an AccountId from a 64-character hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether this is the reserved sentinel identity.
    pub fn is_root(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for AccountId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for AccountId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Balance adjustment requested by a sender update.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub enum BalanceDelta {
    /// Leave the balance unchanged.
    None,
    /// Move `amount` from the sender's external balance into the stream.
    TopUp(u128),
    /// Move `amount` from the stream back to the sender. Fails if more than
    /// the settled balance.
    Withdraw(u128),
}

/// One weight assignment in a sender update.
///
/// A weight of 0 detaches the target. Receiver and proxy weights share one
/// combined total when splitting the funding rate.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub enum WeightUpdate {
    /// Fund `to` directly at `rate * weight / total_weight` per second.
    Receiver { to: AccountId, weight: u32 },
    /// Fund the proxy `to`; its share is re-split across the proxy's own
    /// receiver set.
    Proxy { to: AccountId, weight: u32 },
}

impl WeightUpdate {
    /// The target identity of this update.
    pub fn to(&self) -> AccountId {
        match self {
            Self::Receiver { to, .. } | Self::Proxy { to, .. } => *to,
        }
    }

    /// The assigned weight.
    pub fn weight(&self) -> u32 {
        match self {
            Self::Receiver { weight, .. } | Self::Proxy { weight, .. } => *weight,
        }
    }
}
