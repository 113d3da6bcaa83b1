//! Core identifier types shared across the platform.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// Opaque identifier of a logical topology position (e.g. `gossip-3`).
///
/// Stable for the lifetime of a topology; which live instance it maps to is
/// the instance directory's concern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a node id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network address of one live instance, bound to exactly one [`NodeId`] at a
/// point in time.
///
/// Serialized as the usual `ip:port` string so addresses are readable in the
/// event stream and in instance files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceAddress(SocketAddr);

impl InstanceAddress {
    /// Wrap an already-resolved socket address.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    /// Parse an `ip:port` string.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::InvalidAddress`] if the string is not a valid
    /// socket address.
    pub fn parse(s: &str) -> Result<Self, ProtoError> {
        s.parse::<SocketAddr>()
            .map(Self)
            .map_err(|_| ProtoError::InvalidAddress(s.to_owned()))
    }

    /// The underlying socket address.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        self.0
    }
}

impl FromStr for InstanceAddress {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<SocketAddr> for InstanceAddress {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl TryFrom<String> for InstanceAddress {
    type Error = ProtoError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<InstanceAddress> for String {
    fn from(addr: InstanceAddress) -> Self {
        addr.0.to_string()
    }
}

impl fmt::Display for InstanceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current wall-clock time in nanoseconds since the Unix epoch.
///
/// Cross-instance latency math assumes synchronized clocks; that assumption
/// is stated, not enforced.
#[must_use]
pub fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or_default()
}
