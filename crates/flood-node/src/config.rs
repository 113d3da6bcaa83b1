//! Gossip node configuration.

use std::net::SocketAddr;
use std::time::Duration;

use flood_proto::InstanceAddress;

/// Configuration for one gossip instance.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address the RPC listener binds.
    pub listen_addr: SocketAddr,
    /// Address this instance advertises to peers. A gossip request whose
    /// `sender_id` equals this address is a self-initiate trigger.
    pub advertised_addr: InstanceAddress,
    /// Timeout for each outbound fan-out call.
    pub client_timeout: Duration,
    /// Maximum inbound requests handled concurrently.
    pub max_inflight: usize,
    /// Capacity of the seen-message cache.
    pub seen_capacity: usize,
    /// How long an accepted payload stays in the seen-message cache.
    pub seen_ttl: Duration,
}

impl NodeConfig {
    /// Build a config for an instance advertising the given address,
    /// listening on the same port on all interfaces.
    #[must_use]
    pub fn new(advertised_addr: InstanceAddress) -> Self {
        let mut listen_addr: SocketAddr = advertised_addr.socket_addr();
        listen_addr.set_ip(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));
        Self {
            listen_addr,
            advertised_addr,
            client_timeout: Duration::from_secs(5),
            max_inflight: 64,
            seen_capacity: 1024,
            seen_ttl: Duration::from_secs(600),
        }
    }

    /// Override the listen address.
    #[must_use]
    pub const fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    /// Override the outbound call timeout.
    #[must_use]
    pub const fn with_client_timeout(mut self, timeout: Duration) -> Self {
        self.client_timeout = timeout;
        self
    }

    /// Override the seen-cache capacity.
    #[must_use]
    pub const fn with_seen_capacity(mut self, capacity: usize) -> Self {
        self.seen_capacity = capacity;
        self
    }

    /// Override the seen-cache TTL.
    #[must_use]
    pub const fn with_seen_ttl(mut self, ttl: Duration) -> Self {
        self.seen_ttl = ttl;
        self
    }
}
