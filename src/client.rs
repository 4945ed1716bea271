use crate::cluster::{self, ClusterTopology};
use crate::config::ClientConfig;
use crate::dispatch::Dispatch;
use crate::error::ClientError;
use crate::lookup::Locator;
use crate::producer::Producer;
use crate::proto::*;
use crate::transport::{ChannelProvider, ServiceStub};
use captains_log::filter::LogFilter;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Handle to one Rivulet cluster. Cheap to clone.
///
/// Construction bootstraps the topology and is fatal on failure; a client is
/// never half-initialized. Administrative calls go to an arbitrary cluster
/// member through the dispatch layer with no retry; resource-scoped calls
/// look the owner up first and then talk to it directly. Writes go through
/// [Producer]s obtained from [new_producer](Client::new_producer).
pub struct Client<P: ChannelProvider> {
    inner: Arc<ClientInner<P>>,
}

impl<P: ChannelProvider> Clone for Client<P> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

struct ClientInner<P: ChannelProvider> {
    config: ClientConfig,
    provider: Arc<P>,
    topology: Arc<ClusterTopology>,
    dispatch: Dispatch<P>,
    locator: Locator<P>,
    logger: Arc<LogFilter>,
}

impl<P: ChannelProvider> Client<P> {
    /// Bootstrap against `config.bootstrap_urls` and capture the current
    /// tokio runtime handle for the detached call styles.
    pub async fn connect(config: ClientConfig, provider: P) -> Result<Self, ClientError> {
        if config.bootstrap_urls.is_empty() {
            return Err(ClientError::Precondition(
                "at least one bootstrap url is required".into(),
            ));
        }
        let logger = Arc::new(LogFilter::new());
        let provider = Arc::new(provider);
        logger_info!(logger, "client init with bootstrap urls {:?}", config.bootstrap_urls);
        let nodes = cluster::bootstrap(provider.as_ref(), &config, &logger).await?;
        let topology = Arc::new(ClusterTopology::new(nodes));
        let dispatch = Dispatch::new(
            topology.clone(),
            provider.clone(),
            config.timeout.clone(),
            Handle::current(),
            logger.clone(),
        );
        let locator = Locator::new(dispatch.clone());
        Ok(Self {
            inner: Arc::new(ClientInner { config, provider, topology, dispatch, locator, logger }),
        })
    }

    #[inline]
    pub fn set_log_level(&self, level: log::Level) {
        self.inner.logger.set_level(level);
    }

    /// Release every transport handle. Idempotent; any call after the first
    /// close fails with [ClientError::Closed] instead of hanging.
    pub fn close(&self) {
        logger_info!(self.inner.logger, "client close");
        self.inner.provider.close();
    }

    /// Snapshot of the current member list.
    #[inline]
    pub fn cluster_members(&self) -> Arc<Vec<NodeAddr>> {
        self.inner.topology.snapshot()
    }

    #[inline]
    pub fn locator(&self) -> &Locator<P> {
        &self.inner.locator
    }

    #[inline]
    pub fn dispatch(&self) -> &Dispatch<P> {
        &self.inner.dispatch
    }

    /// Re-issue describe-cluster and swap the member list. Caller-driven
    /// only; the client never refreshes in the background.
    pub async fn refresh_cluster(&self) -> Result<(), ClientError> {
        let resp = self.describe_cluster().await?;
        logger_info!(
            self.inner.logger,
            "cluster membership updated, {} members",
            resp.server_nodes.len()
        );
        self.inner.topology.replace(resp.server_nodes);
        Ok(())
    }

    /// A resilient writer for one stream.
    pub fn new_producer(&self, stream_name: &str) -> Result<Producer<P>, ClientError> {
        if stream_name.is_empty() {
            return Err(ClientError::Precondition("stream name should not be empty".into()));
        }
        Ok(Producer::new(
            stream_name.to_string(),
            self.inner.locator.clone(),
            self.inner.config.append.clone(),
            self.inner.logger.clone(),
        ))
    }

    // ---- cluster-wide administrative calls (arbitrary member, no retry) ----

    pub async fn describe_cluster(&self) -> Result<DescribeClusterResponse, ClientError> {
        self.inner.dispatch.call(|stub| async move { stub.describe_cluster().await }).await
    }

    pub async fn create_stream(&self, stream: StreamSpec) -> Result<(), ClientError> {
        if stream.stream_name.is_empty() {
            return Err(ClientError::Precondition("stream name should not be empty".into()));
        }
        if !(1..=15).contains(&stream.replication_factor) {
            return Err(ClientError::Precondition(
                "replication factor should be within [1, 15]".into(),
            ));
        }
        if stream.shard_count < 1 {
            return Err(ClientError::Precondition("shard count should be at least 1".into()));
        }
        self.inner
            .dispatch
            .call(move |stub| async move { stub.create_stream(stream).await })
            .await
    }

    pub async fn delete_stream(&self, stream_name: &str, force: bool) -> Result<(), ClientError> {
        let req = DeleteStreamRequest { stream_name: stream_name.to_string(), force };
        self.inner.dispatch.call(move |stub| async move { stub.delete_stream(req).await }).await
    }

    pub async fn list_streams(&self) -> Result<Vec<StreamSpec>, ClientError> {
        self.inner.dispatch.call(|stub| async move { stub.list_streams().await }).await
    }

    pub async fn list_shards(&self, stream_name: &str) -> Result<Vec<Shard>, ClientError> {
        let req = ListShardsRequest { stream_name: stream_name.to_string() };
        self.inner.dispatch.call(move |stub| async move { stub.list_shards(req).await }).await
    }

    pub async fn create_subscription(&self, subscription: Subscription) -> Result<(), ClientError> {
        if subscription.subscription_id.is_empty() {
            return Err(ClientError::Precondition("subscription id should not be empty".into()));
        }
        if subscription.stream_name.is_empty() {
            return Err(ClientError::Precondition("stream name should not be empty".into()));
        }
        self.inner
            .dispatch
            .call(move |stub| async move { stub.create_subscription(subscription).await })
            .await
    }

    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>, ClientError> {
        self.inner.dispatch.call(|stub| async move { stub.list_subscriptions().await }).await
    }

    pub async fn create_query(&self, sql: &str) -> Result<Query, ClientError> {
        let req = CreateQueryRequest { sql: sql.to_string() };
        self.inner.dispatch.call(move |stub| async move { stub.create_query(req).await }).await
    }

    pub async fn get_query(&self, id: &str) -> Result<Query, ClientError> {
        let req = GetQueryRequest { id: id.to_string() };
        self.inner.dispatch.call(move |stub| async move { stub.get_query(req).await }).await
    }

    pub async fn list_queries(&self) -> Result<Vec<Query>, ClientError> {
        self.inner.dispatch.call(|stub| async move { stub.list_queries().await }).await
    }

    pub async fn delete_query(&self, id: &str) -> Result<(), ClientError> {
        let req = DeleteQueryRequest { id: id.to_string() };
        self.inner.dispatch.call(move |stub| async move { stub.delete_query(req).await }).await
    }

    pub async fn create_view(&self, sql: &str) -> Result<View, ClientError> {
        let req = CreateViewRequest { sql: sql.to_string() };
        self.inner.dispatch.call(move |stub| async move { stub.create_view(req).await }).await
    }

    pub async fn get_view(&self, view_id: &str) -> Result<View, ClientError> {
        let req = GetViewRequest { view_id: view_id.to_string() };
        self.inner.dispatch.call(move |stub| async move { stub.get_view(req).await }).await
    }

    pub async fn list_views(&self) -> Result<Vec<View>, ClientError> {
        self.inner.dispatch.call(|stub| async move { stub.list_views().await }).await
    }

    pub async fn delete_view(&self, view_id: &str) -> Result<(), ClientError> {
        let req = DeleteViewRequest { view_id: view_id.to_string() };
        self.inner.dispatch.call(move |stub| async move { stub.delete_view(req).await }).await
    }

    // ---- resource-scoped calls (lookup, then talk to the owner) ----

    pub async fn get_stream(&self, name: &str) -> Result<StreamSpec, ClientError> {
        let owner =
            self.inner.locator.lookup_resource(ResourceType::Stream, name).await?;
        let req = GetStreamRequest { name: name.to_string() };
        self.inner
            .dispatch
            .call_at(&owner, move |stub| async move { stub.get_stream(req).await })
            .await
    }

    pub async fn get_subscription(&self, subscription_id: &str) -> Result<Subscription, ClientError> {
        let owner = self.inner.locator.lookup_subscription(subscription_id).await?;
        let req = GetSubscriptionRequest { id: subscription_id.to_string() };
        self.inner
            .dispatch
            .call_at(&owner, move |stub| async move { stub.get_subscription(req).await })
            .await
    }

    pub async fn delete_subscription(
        &self, subscription_id: &str, force: bool,
    ) -> Result<(), ClientError> {
        let owner = self.inner.locator.lookup_subscription(subscription_id).await?;
        let req =
            DeleteSubscriptionRequest { subscription_id: subscription_id.to_string(), force };
        self.inner
            .dispatch
            .call_at(&owner, move |stub| async move { stub.delete_subscription(req).await })
            .await
    }

    pub async fn list_consumers(
        &self, subscription_id: &str,
    ) -> Result<Vec<ConsumerInfo>, ClientError> {
        let owner = self.inner.locator.lookup_subscription(subscription_id).await?;
        let req = ListConsumersRequest { subscription_id: subscription_id.to_string() };
        self.inner
            .dispatch
            .call_at(&owner, move |stub| async move { stub.list_consumers(req).await })
            .await
    }

    // ---- blocking variants ----
    //
    // Same semantics, parked on a plain thread. Must not be called from
    // async context; see Dispatch::call_blocking.

    pub fn describe_cluster_blocking(&self) -> Result<DescribeClusterResponse, ClientError> {
        let this = self.clone();
        self.inner.dispatch.block_on(async move { this.describe_cluster().await })
    }

    pub fn create_stream_blocking(&self, stream: StreamSpec) -> Result<(), ClientError> {
        let this = self.clone();
        self.inner.dispatch.block_on(async move { this.create_stream(stream).await })
    }

    pub fn delete_stream_blocking(&self, stream_name: &str, force: bool) -> Result<(), ClientError> {
        let this = self.clone();
        let stream_name = stream_name.to_string();
        self.inner.dispatch.block_on(async move { this.delete_stream(&stream_name, force).await })
    }

    pub fn list_streams_blocking(&self) -> Result<Vec<StreamSpec>, ClientError> {
        let this = self.clone();
        self.inner.dispatch.block_on(async move { this.list_streams().await })
    }

    pub fn list_shards_blocking(&self, stream_name: &str) -> Result<Vec<Shard>, ClientError> {
        let this = self.clone();
        let stream_name = stream_name.to_string();
        self.inner.dispatch.block_on(async move { this.list_shards(&stream_name).await })
    }

    pub fn create_subscription_blocking(
        &self, subscription: Subscription,
    ) -> Result<(), ClientError> {
        let this = self.clone();
        self.inner.dispatch.block_on(async move { this.create_subscription(subscription).await })
    }

    pub fn list_subscriptions_blocking(&self) -> Result<Vec<Subscription>, ClientError> {
        let this = self.clone();
        self.inner.dispatch.block_on(async move { this.list_subscriptions().await })
    }

    pub fn get_stream_blocking(&self, name: &str) -> Result<StreamSpec, ClientError> {
        let this = self.clone();
        let name = name.to_string();
        self.inner.dispatch.block_on(async move { this.get_stream(&name).await })
    }

    pub fn get_subscription_blocking(
        &self, subscription_id: &str,
    ) -> Result<Subscription, ClientError> {
        let this = self.clone();
        let id = subscription_id.to_string();
        self.inner.dispatch.block_on(async move { this.get_subscription(&id).await })
    }

    pub fn delete_subscription_blocking(
        &self, subscription_id: &str, force: bool,
    ) -> Result<(), ClientError> {
        let this = self.clone();
        let id = subscription_id.to_string();
        self.inner.dispatch.block_on(async move { this.delete_subscription(&id, force).await })
    }

    pub fn list_consumers_blocking(
        &self, subscription_id: &str,
    ) -> Result<Vec<ConsumerInfo>, ClientError> {
        let this = self.clone();
        let id = subscription_id.to_string();
        self.inner.dispatch.block_on(async move { this.list_consumers(&id).await })
    }
}
