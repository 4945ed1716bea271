use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::proto::NodeAddr;
use crate::transport::{ChannelProvider, ServiceStub};
use arc_swap::ArcSwap;
use captains_log::filter::LogFilter;
use std::sync::Arc;

/// The client's local view of cluster membership.
///
/// The member list is replaced wholesale on every update, never mutated in
/// place, so concurrent readers see either the old or the new list.
/// Populated once at construction; refreshed only when the caller asks
/// (there is no background refresh).
pub struct ClusterTopology {
    nodes: ArcSwap<Vec<NodeAddr>>,
}

impl ClusterTopology {
    pub fn new(nodes: Vec<NodeAddr>) -> Self {
        Self { nodes: ArcSwap::from_pointee(nodes) }
    }

    #[inline]
    pub fn snapshot(&self) -> Arc<Vec<NodeAddr>> {
        self.nodes.load_full()
    }

    /// The member every cluster-wide call is addressed to. Deterministic,
    /// not load-balanced: any member can serve those calls.
    #[inline]
    pub fn first(&self) -> Option<NodeAddr> {
        self.nodes.load().first().cloned()
    }

    pub fn replace(&self, nodes: Vec<NodeAddr>) {
        self.nodes.store(Arc::new(nodes));
    }
}

/// Ask the bootstrap addresses, in order, to describe the cluster. The first
/// address that answers wins. No retry budget: bootstrap runs once and the
/// addresses come from local configuration.
pub(crate) async fn bootstrap<P: ChannelProvider>(
    provider: &P, config: &ClientConfig, logger: &Arc<LogFilter>,
) -> Result<Vec<NodeAddr>, ClientError> {
    for url in config.bootstrap_urls.iter() {
        let stub = match provider.get(url) {
            Ok(stub) => stub,
            Err(e) => {
                logger_warn!(logger, "bootstrap: no channel to {}: {}", url, e);
                continue;
            }
        };
        match tokio::time::timeout(config.timeout.request_timeout, stub.describe_cluster()).await
        {
            Ok(Ok(resp)) => {
                logger_info!(
                    logger,
                    "bootstrap via {} found {} cluster members",
                    url,
                    resp.server_nodes.len()
                );
                return Ok(resp.server_nodes);
            }
            Ok(Err(status)) => {
                logger_warn!(logger, "bootstrap: describe cluster via {} failed: {}", url, status);
            }
            Err(_) => {
                logger_warn!(logger, "bootstrap: describe cluster via {} timed out", url);
            }
        }
    }
    Err(ClientError::Unreachable)
}
