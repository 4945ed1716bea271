//! The resilient writer.
//!
//! A producer keeps one cached address: the server that owned its stream the
//! last time we looked. Appends go straight to that address (writes are not
//! cluster-wide, so they bypass the dispatch layer's arbitrary-member pick).
//! When an append comes back `rpc_unavailable`, the cached address is
//! invalidated, the producer sleeps a fixed interval, re-resolves through the
//! locator and tries again, up to a bounded number of attempts. Any other
//! failure is terminal on the first occurrence.

use crate::config::AppendSetting;
use crate::dispatch::CallHandle;
use crate::error::{ClientError, RpcStatus};
use crate::lookup::Locator;
use crate::proto::*;
use crate::transport::{ChannelProvider, ServiceStub};
use arc_swap::ArcSwapOption;
use captains_log::filter::LogFilter;
use std::sync::Arc;

/// Per-stream writer. Cheap to clone; clones share the cached owner address.
///
/// Concurrent `append` calls are independent and may race on the cached
/// address cell; last write wins, which is safe because [NodeAddr] is an
/// immutable value. Retries within one call are sequential, never fanned out.
/// No ordering across concurrent appends is guaranteed; callers that need
/// FIFO must serialize their own calls.
pub struct Producer<P: ChannelProvider> {
    inner: Arc<ProducerInner<P>>,
}

impl<P: ChannelProvider> Clone for Producer<P> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

struct ProducerInner<P: ChannelProvider> {
    stream_name: String,
    owner: ArcSwapOption<NodeAddr>,
    locator: Locator<P>,
    append: AppendSetting,
    logger: Arc<LogFilter>,
}

impl<P: ChannelProvider> Producer<P> {
    pub(crate) fn new(
        stream_name: String, locator: Locator<P>, append: AppendSetting, logger: Arc<LogFilter>,
    ) -> Self {
        Self {
            inner: Arc::new(ProducerInner {
                stream_name,
                owner: ArcSwapOption::new(None),
                locator,
                append,
                logger,
            }),
        }
    }

    #[inline]
    pub fn stream_name(&self) -> &str {
        &self.inner.stream_name
    }

    /// Append a batch. On success the returned ids match the input order,
    /// one per record.
    pub async fn append(&self, records: Vec<Record>) -> Result<Vec<RecordId>, ClientError> {
        if records.is_empty() {
            return Err(ClientError::Precondition("append requires at least one record".into()));
        }
        self.inner.append_with_retry(records).await
    }

    /// One-record convenience over [append](Producer::append).
    pub async fn write(&self, record: Record) -> Result<RecordId, ClientError> {
        let ids = self.append(vec![record]).await?;
        ids.into_iter().next().ok_or(ClientError::Rpc(RpcStatus::Internal))
    }

    /// Future style: the write runs detached; join the handle for the id.
    pub fn write_detached(&self, record: Record) -> CallHandle<RecordId> {
        let this = self.clone();
        self.inner.locator.dispatch().spawn(async move { this.write(record).await })
    }

    /// Blocking style. Must not be called from async context.
    pub fn append_blocking(&self, records: Vec<Record>) -> Result<Vec<RecordId>, ClientError> {
        let this = self.clone();
        self.inner.locator.dispatch().block_on(async move { this.append(records).await })
    }
}

impl<P: ChannelProvider> ProducerInner<P> {
    /// Cached owner, or one fresh lookup. A failed lookup propagates as-is:
    /// only a failed append spends retry budget.
    async fn resolve_owner(&self) -> Result<Arc<NodeAddr>, ClientError> {
        if let Some(node) = self.owner.load_full() {
            return Ok(node);
        }
        let node = Arc::new(self.locator.lookup_stream(&self.stream_name).await?);
        logger_info!(self.logger, "producer[{}]: owner resolved to {}", self.stream_name, node);
        self.owner.store(Some(node.clone()));
        Ok(node)
    }

    async fn append_with_retry(&self, records: Vec<Record>) -> Result<Vec<RecordId>, ClientError> {
        let budget = self.append.retry_max_times.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let node = self.resolve_owner().await?;
            let req = AppendRequest {
                stream_name: self.stream_name.clone(),
                records: records.clone(),
            };
            match self
                .locator
                .dispatch()
                .call_at(&node, move |stub| async move { stub.append(req).await })
                .await
            {
                Ok(resp) => return Ok(resp.record_ids),
                Err(ClientError::Rpc(status)) if status.is_unavailable() => {
                    if attempt >= budget {
                        logger_warn!(
                            self.logger,
                            "producer[{}]: append to {} unavailable, giving up after {} attempts",
                            self.stream_name,
                            node,
                            attempt
                        );
                        return Err(ClientError::RetriesExhausted {
                            attempts: attempt,
                            source: status,
                        });
                    }
                    logger_warn!(
                        self.logger,
                        "producer[{}]: append to {} unavailable, retrying in {:?} ({} of {})",
                        self.stream_name,
                        node,
                        self.append.retry_interval,
                        attempt,
                        budget
                    );
                    self.owner.store(None);
                    tokio::time::sleep(self.append.retry_interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
