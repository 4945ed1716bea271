//! Message shapes exchanged with the Rivulet service.
//!
//! These mirror the RPC surface at the field level; the byte encoding is the
//! stub's business, not ours.

use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// Address of one cluster member. Immutable value; rendered as `host:port`
/// when used as a channel key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddr {
    pub host: String,
    pub port: u16,
}

impl NodeAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Identifier assigned by the server to one appended record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub shard_id: u64,
    pub batch_id: u64,
    pub batch_index: u32,
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.shard_id, self.batch_id, self.batch_index)
    }
}

/// One record to append; the payload is opaque to the client.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Record {
    pub payload: Vec<u8>,
}

impl Record {
    pub fn from_bytes(payload: impl Into<Vec<u8>>) -> Self {
        Self { payload: payload.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceType {
    Stream,
    Subscription,
    Shard,
    Query,
    View,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamSpec {
    pub stream_name: String,
    pub replication_factor: u32,
    pub shard_count: u32,
    /// How long consumed records stay readable, in seconds.
    pub backlog_duration: u32,
}

impl StreamSpec {
    /// A stream with the server-side defaults: single replica, single shard,
    /// one day of backlog.
    pub fn new(stream_name: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            replication_factor: 1,
            shard_count: 1,
            backlog_duration: 3600 * 24,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Shard {
    pub stream_name: String,
    pub shard_id: u64,
    pub start_hash_range_key: String,
    pub end_hash_range_key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_id: String,
    pub stream_name: String,
    pub ack_timeout_seconds: u32,
    pub max_unacked_records: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsumerInfo {
    pub name: String,
    pub uri: String,
    pub user_agent: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Query {
    pub query_id: String,
    pub query_text: String,
    pub status: String,
    pub created_time: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct View {
    pub view_id: String,
    pub sql: String,
    pub status: String,
    pub created_time: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DescribeClusterResponse {
    pub server_nodes: Vec<NodeAddr>,
    pub cluster_up_time: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LookupStreamRequest {
    pub stream_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LookupSubscriptionRequest {
    pub subscription_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LookupResourceRequest {
    pub res_type: ResourceType,
    pub res_id: String,
}

/// Shared response of the three lookup RPCs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LookupResponse {
    pub server_node: NodeAddr,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppendRequest {
    pub stream_name: String,
    pub records: Vec<Record>,
}

/// `record_ids` matches the order of [AppendRequest::records].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppendResponse {
    pub record_ids: Vec<RecordId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteStreamRequest {
    pub stream_name: String,
    pub force: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetStreamRequest {
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListShardsRequest {
    pub stream_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteSubscriptionRequest {
    pub subscription_id: String,
    pub force: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetSubscriptionRequest {
    pub id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListConsumersRequest {
    pub subscription_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateQueryRequest {
    pub sql: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetQueryRequest {
    pub id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteQueryRequest {
    pub id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateViewRequest {
    pub sql: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetViewRequest {
    pub view_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteViewRequest {
    pub view_id: String,
}
