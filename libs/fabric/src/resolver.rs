use std::collections::HashMap;
use std::net::SocketAddr;

use switchboard_core::ChannelId;

use crate::config::FabricConfig;
use crate::endpoint::TransportKind;

/// Decides which transport serves a channel
///
/// Consulted once per `(channel, direction)`, when the endpoint is first
/// created. Closures `Fn(&ChannelId) -> TransportKind` implement it.
pub trait TransportResolver: Send + Sync {
    fn resolve(&self, channel: &ChannelId) -> TransportKind;
}

impl<F> TransportResolver for F
where
    F: Fn(&ChannelId) -> TransportKind + Send + Sync,
{
    fn resolve(&self, channel: &ChannelId) -> TransportKind {
        self(channel)
    }
}

/// Fixed routing table: listed channels go over the network, the rest
/// through in-process queues
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    routes: HashMap<ChannelId, SocketAddr>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, channel: ChannelId, address: SocketAddr) -> Self {
        self.routes.insert(channel, address);
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl From<&FabricConfig> for StaticResolver {
    fn from(config: &FabricConfig) -> Self {
        Self {
            routes: config
                .channels
                .iter()
                .map(|route| (route.channel.clone(), route.address))
                .collect(),
        }
    }
}

impl TransportResolver for StaticResolver {
    fn resolve(&self, channel: &ChannelId) -> TransportKind {
        match self.routes.get(channel) {
            Some(&address) => TransportKind::Network { address },
            None => TransportKind::Queue,
        }
    }
}
