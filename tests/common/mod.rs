//! Test harness: a scriptable in-process mock of the Rivulet RPC surface.

use captains_log::filter::LogFilter;
use captains_log::*;
use rivulet_client::proto::*;
use rivulet_client::transport::{CachingChannelProvider, Connector, ServiceStub};
use rivulet_client::{Client, ClientConfig, RpcStatus};
use rstest::*;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Runtime;

#[fixture]
pub fn runner() -> TestRunner {
    TestRunner::new()
}

pub struct TestRunner {
    rt: Runtime,
}

impl fmt::Debug for TestRunner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "")
    }
}

impl TestRunner {
    pub fn new() -> Self {
        recipe::raw_file_logger("/tmp/rivulet_test.log", Level::Trace).test().build().expect("log");
        Self {
            rt: tokio::runtime::Builder::new_multi_thread()
                .worker_threads(4)
                .enable_all()
                .build()
                .unwrap(),
        }
    }

    pub fn block_on<F: Future>(&self, f: F) -> F::Output {
        self.rt.block_on(f)
    }
}

/// Sentinel for "keep failing appends forever".
pub const FAIL_ALWAYS: usize = usize::MAX;

/// Shared state behind every mock stub; one instance models one cluster.
pub struct MockCluster {
    pub nodes: Vec<NodeAddr>,
    stream_owner: Mutex<HashMap<String, NodeAddr>>,
    sub_owner: Mutex<HashMap<String, NodeAddr>>,
    streams: Mutex<HashMap<String, StreamSpec>>,
    subscriptions: Mutex<HashMap<String, Subscription>>,
    /// How many more appends report unavailable ([FAIL_ALWAYS] = forever).
    append_fail_remaining: AtomicUsize,
    pub append_attempts: AtomicUsize,
    pub lookup_stream_calls: AtomicUsize,
    pub lookup_sub_calls: AtomicUsize,
    pub lookup_resource_calls: AtomicUsize,
    /// (serving address, request) per successful append.
    pub appended: Mutex<Vec<(String, AppendRequest)>>,
    /// Address that served each cluster-wide administrative call.
    pub admin_served_by: Mutex<Vec<String>>,
    /// Make appends stall, to exercise the deadline.
    pub append_delay: Mutex<Option<Duration>>,
    next_batch: AtomicU64,
    pub connects: AtomicUsize,
}

impl MockCluster {
    pub fn new(node_count: usize) -> Arc<Self> {
        let nodes =
            (0..node_count).map(|i| NodeAddr::new(format!("node{}", i), 6570)).collect();
        Arc::new(Self {
            nodes,
            stream_owner: Mutex::new(HashMap::new()),
            sub_owner: Mutex::new(HashMap::new()),
            streams: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
            append_fail_remaining: AtomicUsize::new(0),
            append_attempts: AtomicUsize::new(0),
            lookup_stream_calls: AtomicUsize::new(0),
            lookup_sub_calls: AtomicUsize::new(0),
            lookup_resource_calls: AtomicUsize::new(0),
            appended: Mutex::new(Vec::new()),
            admin_served_by: Mutex::new(Vec::new()),
            append_delay: Mutex::new(None),
            next_batch: AtomicU64::new(1),
            connects: AtomicUsize::new(0),
        })
    }

    pub fn bootstrap_urls(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.to_string()).collect()
    }

    pub fn set_stream_owner(&self, stream: &str, node: usize) {
        self.stream_owner
            .lock()
            .unwrap()
            .insert(stream.to_string(), self.nodes[node].clone());
    }

    pub fn set_sub_owner(&self, subscription: &str, node: usize) {
        self.sub_owner
            .lock()
            .unwrap()
            .insert(subscription.to_string(), self.nodes[node].clone());
    }

    pub fn fail_appends(&self, times: usize) {
        self.append_fail_remaining.store(times, Ordering::SeqCst);
    }

    pub fn set_append_delay(&self, d: Duration) {
        *self.append_delay.lock().unwrap() = Some(d);
    }

    fn should_fail_append(&self) -> bool {
        let remaining = self.append_fail_remaining.load(Ordering::SeqCst);
        if remaining == 0 {
            return false;
        }
        if remaining != FAIL_ALWAYS {
            self.append_fail_remaining.fetch_sub(1, Ordering::SeqCst);
        }
        true
    }
}

pub struct MockStub {
    addr: String,
    cluster: Arc<MockCluster>,
}

impl MockStub {
    fn serve_admin(&self) {
        self.cluster.admin_served_by.lock().unwrap().push(self.addr.clone());
    }
}

impl ServiceStub for MockStub {
    async fn describe_cluster(&self) -> Result<DescribeClusterResponse, RpcStatus> {
        self.serve_admin();
        Ok(DescribeClusterResponse {
            server_nodes: self.cluster.nodes.clone(),
            cluster_up_time: 1,
        })
    }

    async fn lookup_stream(&self, req: LookupStreamRequest) -> Result<LookupResponse, RpcStatus> {
        self.cluster.lookup_stream_calls.fetch_add(1, Ordering::SeqCst);
        match self.cluster.stream_owner.lock().unwrap().get(&req.stream_name) {
            Some(node) => Ok(LookupResponse { server_node: node.clone() }),
            None => Err(RpcStatus::NotFound),
        }
    }

    async fn lookup_subscription(
        &self, req: LookupSubscriptionRequest,
    ) -> Result<LookupResponse, RpcStatus> {
        self.cluster.lookup_sub_calls.fetch_add(1, Ordering::SeqCst);
        match self.cluster.sub_owner.lock().unwrap().get(&req.subscription_id) {
            Some(node) => Ok(LookupResponse { server_node: node.clone() }),
            None => Err(RpcStatus::NotFound),
        }
    }

    async fn lookup_resource(
        &self, req: LookupResourceRequest,
    ) -> Result<LookupResponse, RpcStatus> {
        self.cluster.lookup_resource_calls.fetch_add(1, Ordering::SeqCst);
        let owners = match req.res_type {
            ResourceType::Subscription => self.cluster.sub_owner.lock().unwrap(),
            _ => self.cluster.stream_owner.lock().unwrap(),
        };
        match owners.get(&req.res_id) {
            Some(node) => Ok(LookupResponse { server_node: node.clone() }),
            None => Err(RpcStatus::NotFound),
        }
    }

    async fn append(&self, req: AppendRequest) -> Result<AppendResponse, RpcStatus> {
        self.cluster.append_attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.cluster.append_delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if self.cluster.should_fail_append() {
            return Err(RpcStatus::Unavailable);
        }
        let batch_id = self.cluster.next_batch.fetch_add(1, Ordering::SeqCst);
        let record_ids = (0..req.records.len())
            .map(|i| RecordId { shard_id: 1, batch_id, batch_index: i as u32 })
            .collect();
        self.cluster.appended.lock().unwrap().push((self.addr.clone(), req));
        Ok(AppendResponse { record_ids })
    }

    async fn create_stream(&self, req: StreamSpec) -> Result<(), RpcStatus> {
        self.serve_admin();
        let mut streams = self.cluster.streams.lock().unwrap();
        if streams.contains_key(&req.stream_name) {
            return Err(RpcStatus::AlreadyExists);
        }
        streams.insert(req.stream_name.clone(), req);
        Ok(())
    }

    async fn delete_stream(&self, req: DeleteStreamRequest) -> Result<(), RpcStatus> {
        self.serve_admin();
        match self.cluster.streams.lock().unwrap().remove(&req.stream_name) {
            Some(_) => Ok(()),
            None if req.force => Ok(()),
            None => Err(RpcStatus::NotFound),
        }
    }

    async fn list_streams(&self) -> Result<Vec<StreamSpec>, RpcStatus> {
        self.serve_admin();
        Ok(self.cluster.streams.lock().unwrap().values().cloned().collect())
    }

    async fn get_stream(&self, req: GetStreamRequest) -> Result<StreamSpec, RpcStatus> {
        match self.cluster.streams.lock().unwrap().get(&req.name) {
            Some(s) => Ok(s.clone()),
            None => Err(RpcStatus::NotFound),
        }
    }

    async fn list_shards(&self, req: ListShardsRequest) -> Result<Vec<Shard>, RpcStatus> {
        self.serve_admin();
        Ok(vec![Shard {
            stream_name: req.stream_name,
            shard_id: 1,
            start_hash_range_key: "0".to_string(),
            end_hash_range_key: "f".repeat(32),
        }])
    }

    async fn create_subscription(&self, req: Subscription) -> Result<(), RpcStatus> {
        self.serve_admin();
        self.cluster
            .subscriptions
            .lock()
            .unwrap()
            .insert(req.subscription_id.clone(), req);
        Ok(())
    }

    async fn delete_subscription(&self, req: DeleteSubscriptionRequest) -> Result<(), RpcStatus> {
        match self.cluster.subscriptions.lock().unwrap().remove(&req.subscription_id) {
            Some(_) => Ok(()),
            None => Err(RpcStatus::NotFound),
        }
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, RpcStatus> {
        self.serve_admin();
        Ok(self.cluster.subscriptions.lock().unwrap().values().cloned().collect())
    }

    async fn get_subscription(&self, req: GetSubscriptionRequest) -> Result<Subscription, RpcStatus> {
        match self.cluster.subscriptions.lock().unwrap().get(&req.id) {
            Some(s) => Ok(s.clone()),
            None => Err(RpcStatus::NotFound),
        }
    }

    async fn list_consumers(
        &self, _req: ListConsumersRequest,
    ) -> Result<Vec<ConsumerInfo>, RpcStatus> {
        Ok(Vec::new())
    }

    async fn create_query(&self, req: CreateQueryRequest) -> Result<Query, RpcStatus> {
        self.serve_admin();
        Ok(Query { query_id: "q-1".to_string(), query_text: req.sql, status: "RUNNING".to_string(), created_time: 0 })
    }

    async fn get_query(&self, req: GetQueryRequest) -> Result<Query, RpcStatus> {
        self.serve_admin();
        Ok(Query { query_id: req.id, query_text: String::new(), status: "RUNNING".to_string(), created_time: 0 })
    }

    async fn list_queries(&self) -> Result<Vec<Query>, RpcStatus> {
        self.serve_admin();
        Ok(Vec::new())
    }

    async fn delete_query(&self, _req: DeleteQueryRequest) -> Result<(), RpcStatus> {
        self.serve_admin();
        Ok(())
    }

    async fn create_view(&self, req: CreateViewRequest) -> Result<View, RpcStatus> {
        self.serve_admin();
        Ok(View { view_id: "v-1".to_string(), sql: req.sql, status: "RUNNING".to_string(), created_time: 0 })
    }

    async fn get_view(&self, req: GetViewRequest) -> Result<View, RpcStatus> {
        self.serve_admin();
        Ok(View { view_id: req.view_id, sql: String::new(), status: "RUNNING".to_string(), created_time: 0 })
    }

    async fn list_views(&self) -> Result<Vec<View>, RpcStatus> {
        self.serve_admin();
        Ok(Vec::new())
    }

    async fn delete_view(&self, _req: DeleteViewRequest) -> Result<(), RpcStatus> {
        self.serve_admin();
        Ok(())
    }
}

pub struct MockConnector {
    cluster: Arc<MockCluster>,
}

impl Connector for MockConnector {
    type Stub = MockStub;

    fn connect(&self, addr: &str) -> Result<MockStub, RpcStatus> {
        if !self.cluster.nodes.iter().any(|n| n.to_string() == addr) {
            return Err(RpcStatus::Unavailable);
        }
        self.cluster.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockStub { addr: addr.to_string(), cluster: self.cluster.clone() })
    }
}

pub type MockClient = Client<CachingChannelProvider<MockConnector>>;

/// Short timeouts and a fast retry interval so tests stay quick.
pub fn test_config(cluster: &MockCluster) -> ClientConfig {
    let mut config = ClientConfig::new(cluster.bootstrap_urls());
    config.timeout.request_timeout = Duration::from_millis(500);
    config.append.retry_interval = Duration::from_millis(20);
    config
}

pub fn mock_provider(cluster: &Arc<MockCluster>) -> CachingChannelProvider<MockConnector> {
    CachingChannelProvider::new(
        MockConnector { cluster: cluster.clone() },
        Arc::new(LogFilter::new()),
    )
}

pub async fn try_connect(
    cluster: &Arc<MockCluster>, config: ClientConfig,
) -> Result<MockClient, rivulet_client::ClientError> {
    Client::connect(config, mock_provider(cluster)).await
}

pub async fn connect_client(cluster: &Arc<MockCluster>, config: ClientConfig) -> MockClient {
    try_connect(cluster, config).await.expect("connect")
}
