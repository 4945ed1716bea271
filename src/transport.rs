//! The seam between this crate and the generated RPC stub.
//!
//! [ServiceStub] is what a connected channel looks like to the routing layer;
//! [ChannelProvider] owns the transport handles and their lifecycle. The
//! default [CachingChannelProvider] reuses one handle per address and is
//! parameterized by a [Connector], which is also the mocking point for tests.

use crate::error::{ClientError, RpcStatus};
use crate::proto::*;
use captains_log::filter::LogFilter;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// One method per RPC of the Rivulet service.
///
/// Implementations are expected to classify every transport failure into an
/// [RpcStatus]; the routing layer never sees raw transport errors.
pub trait ServiceStub: Send + Sync + 'static {
    fn describe_cluster(
        &self,
    ) -> impl Future<Output = Result<DescribeClusterResponse, RpcStatus>> + Send;

    fn lookup_stream(
        &self, req: LookupStreamRequest,
    ) -> impl Future<Output = Result<LookupResponse, RpcStatus>> + Send;

    fn lookup_subscription(
        &self, req: LookupSubscriptionRequest,
    ) -> impl Future<Output = Result<LookupResponse, RpcStatus>> + Send;

    fn lookup_resource(
        &self, req: LookupResourceRequest,
    ) -> impl Future<Output = Result<LookupResponse, RpcStatus>> + Send;

    fn append(
        &self, req: AppendRequest,
    ) -> impl Future<Output = Result<AppendResponse, RpcStatus>> + Send;

    fn create_stream(
        &self, req: StreamSpec,
    ) -> impl Future<Output = Result<(), RpcStatus>> + Send;

    fn delete_stream(
        &self, req: DeleteStreamRequest,
    ) -> impl Future<Output = Result<(), RpcStatus>> + Send;

    fn list_streams(&self) -> impl Future<Output = Result<Vec<StreamSpec>, RpcStatus>> + Send;

    fn get_stream(
        &self, req: GetStreamRequest,
    ) -> impl Future<Output = Result<StreamSpec, RpcStatus>> + Send;

    fn list_shards(
        &self, req: ListShardsRequest,
    ) -> impl Future<Output = Result<Vec<Shard>, RpcStatus>> + Send;

    fn create_subscription(
        &self, req: Subscription,
    ) -> impl Future<Output = Result<(), RpcStatus>> + Send;

    fn delete_subscription(
        &self, req: DeleteSubscriptionRequest,
    ) -> impl Future<Output = Result<(), RpcStatus>> + Send;

    fn list_subscriptions(
        &self,
    ) -> impl Future<Output = Result<Vec<Subscription>, RpcStatus>> + Send;

    fn get_subscription(
        &self, req: GetSubscriptionRequest,
    ) -> impl Future<Output = Result<Subscription, RpcStatus>> + Send;

    fn list_consumers(
        &self, req: ListConsumersRequest,
    ) -> impl Future<Output = Result<Vec<ConsumerInfo>, RpcStatus>> + Send;

    fn create_query(
        &self, req: CreateQueryRequest,
    ) -> impl Future<Output = Result<Query, RpcStatus>> + Send;

    fn get_query(
        &self, req: GetQueryRequest,
    ) -> impl Future<Output = Result<Query, RpcStatus>> + Send;

    fn list_queries(&self) -> impl Future<Output = Result<Vec<Query>, RpcStatus>> + Send;

    fn delete_query(
        &self, req: DeleteQueryRequest,
    ) -> impl Future<Output = Result<(), RpcStatus>> + Send;

    fn create_view(
        &self, req: CreateViewRequest,
    ) -> impl Future<Output = Result<View, RpcStatus>> + Send;

    fn get_view(&self, req: GetViewRequest)
    -> impl Future<Output = Result<View, RpcStatus>> + Send;

    fn list_views(&self) -> impl Future<Output = Result<Vec<View>, RpcStatus>> + Send;

    fn delete_view(
        &self, req: DeleteViewRequest,
    ) -> impl Future<Output = Result<(), RpcStatus>> + Send;
}

/// How to establish a stub to one address. Connection failures are reported
/// as [RpcStatus::Unavailable] (or whatever the transport classifies).
pub trait Connector: Send + Sync + 'static {
    type Stub: ServiceStub;

    fn connect(&self, addr: &str) -> Result<Self::Stub, RpcStatus>;
}

/// Owns every transport handle of a client.
///
/// Handles for the same address must be reused, and `close` must release
/// them exactly once; `get` after close fails deterministically.
pub trait ChannelProvider: Send + Sync + 'static {
    type Stub: ServiceStub;

    fn get(&self, addr: &str) -> Result<Arc<Self::Stub>, ClientError>;

    fn close(&self);
}

/// Default provider: one cached stub per `host:port`, created on first use.
pub struct CachingChannelProvider<C: Connector> {
    connector: C,
    channels: Mutex<HashMap<String, Arc<C::Stub>>>,
    closed: AtomicBool,
    logger: Arc<LogFilter>,
}

impl<C: Connector> CachingChannelProvider<C> {
    pub fn new(connector: C, logger: Arc<LogFilter>) -> Self {
        Self { connector, channels: Mutex::new(HashMap::new()), closed: AtomicBool::new(false), logger }
    }
}

impl<C: Connector> ChannelProvider for CachingChannelProvider<C> {
    type Stub = C::Stub;

    fn get(&self, addr: &str) -> Result<Arc<C::Stub>, ClientError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Closed);
        }
        let mut channels = self.channels.lock().expect("channels lock");
        if let Some(stub) = channels.get(addr) {
            return Ok(stub.clone());
        }
        let stub = Arc::new(self.connector.connect(addr)?);
        logger_debug!(self.logger, "channel provider connected to {}", addr);
        channels.insert(addr.to_string(), stub.clone());
        Ok(stub)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut channels = self.channels.lock().expect("channels lock");
        logger_info!(self.logger, "channel provider closed, releasing {} handles", channels.len());
        channels.clear();
    }
}
