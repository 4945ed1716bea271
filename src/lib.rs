//! # rivulet-client
//!
//! Client library for Rivulet, a partitioned, replicated streaming store.
//!
//! Every stream is split into shards and each shard (and each subscription)
//! is owned by exactly one server in the cluster at a time. This crate keeps
//! a local view of cluster membership, resolves which member currently owns
//! a resource, and retries appends across transient unavailability:
//!
//! - [Client]: bootstrap, administrative calls, producer factory.
//! - [Producer]: per-stream writer with a cached owner address and a bounded
//!   retry-with-re-resolution loop.
//! - [Dispatch]: issues a call against an arbitrary cluster member in one of
//!   three execution styles (cooperative, future-returning, blocking).
//! - [transport::ServiceStub]: the seam to the generated RPC stub. The wire
//!   protocol itself is not part of this crate; plug a stub in through a
//!   [transport::ChannelProvider].

#[macro_use]
extern crate captains_log;

pub mod config;
pub mod error;
pub mod proto;
pub mod transport;

mod client;
mod cluster;
mod dispatch;
mod lookup;
mod producer;

pub use client::Client;
pub use cluster::ClusterTopology;
pub use config::{AppendSetting, ClientConfig, TimeoutSetting};
pub use dispatch::{CallHandle, Dispatch};
pub use error::{ClientError, RpcStatus};
pub use lookup::Locator;
pub use producer::Producer;
pub use transport::{CachingChannelProvider, ChannelProvider, Connector, ServiceStub};
