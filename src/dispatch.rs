use crate::cluster::ClusterTopology;
use crate::config::TimeoutSetting;
use crate::error::{ClientError, RpcStatus};
use crate::proto::NodeAddr;
use crate::transport::ChannelProvider;
use captains_log::filter::LogFilter;
use crossfire::AsyncRx;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Issues one RPC against the cluster.
///
/// The resolution logic is a single code path: pick the first member of the
/// current topology snapshot, get a channel, run the call under the request
/// deadline. The three public styles ([call](Dispatch::call),
/// [call_future](Dispatch::call_future), [call_blocking](Dispatch::call_blocking))
/// are thin adapters around it and differ only in how the caller waits.
///
/// This layer never retries; transport statuses are surfaced as
/// [ClientError::Rpc] for the caller to deal with.
pub struct Dispatch<P: ChannelProvider> {
    topology: Arc<ClusterTopology>,
    provider: Arc<P>,
    timeout: TimeoutSetting,
    rt: Handle,
    logger: Arc<LogFilter>,
}

impl<P: ChannelProvider> Clone for Dispatch<P> {
    fn clone(&self) -> Self {
        Self {
            topology: self.topology.clone(),
            provider: self.provider.clone(),
            timeout: self.timeout.clone(),
            rt: self.rt.clone(),
            logger: self.logger.clone(),
        }
    }
}

impl<P: ChannelProvider> Dispatch<P> {
    pub(crate) fn new(
        topology: Arc<ClusterTopology>, provider: Arc<P>, timeout: TimeoutSetting, rt: Handle,
        logger: Arc<LogFilter>,
    ) -> Self {
        Self { topology, provider, timeout, rt, logger }
    }

    /// Cooperative style: one suspension point inside the caller's task.
    pub async fn call<R, F, Fut>(&self, f: F) -> Result<R, ClientError>
    where
        F: FnOnce(Arc<P::Stub>) -> Fut,
        Fut: Future<Output = Result<R, RpcStatus>>,
    {
        let addr = self.topology.first().ok_or(ClientError::Unreachable)?;
        self.call_at(&addr, f).await
    }

    /// Run the call against an explicit address, still under the deadline.
    ///
    /// Used by the resource-scoped paths (producer, get-stream and the like)
    /// that must hit the owning server instead of an arbitrary member.
    pub async fn call_at<R, F, Fut>(&self, addr: &NodeAddr, f: F) -> Result<R, ClientError>
    where
        F: FnOnce(Arc<P::Stub>) -> Fut,
        Fut: Future<Output = Result<R, RpcStatus>>,
    {
        let stub = self.provider.get(&addr.to_string())?;
        match tokio::time::timeout(self.timeout.request_timeout, f(stub)).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(status)) => {
                logger_debug!(self.logger, "call to {} failed: {}", addr, status);
                Err(ClientError::Rpc(status))
            }
            Err(_) => {
                logger_debug!(self.logger, "call to {} exceeded deadline", addr);
                Err(ClientError::Rpc(RpcStatus::Timeout))
            }
        }
    }

    /// Future style: the call runs detached on the captured runtime; the
    /// returned handle completes with the result or the error.
    pub fn call_future<R, F, Fut>(&self, f: F) -> CallHandle<R>
    where
        F: FnOnce(Arc<P::Stub>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<R, RpcStatus>> + Send + 'static,
        R: Send + Unpin + 'static,
    {
        let this = self.clone();
        self.spawn(async move { this.call(f).await })
    }

    /// Blocking style: parks the calling thread until the call completes.
    ///
    /// Must NOT be invoked from async context; that would park a runtime
    /// worker. Debug builds assert this.
    pub fn call_blocking<R, F, Fut>(&self, f: F) -> Result<R, ClientError>
    where
        F: FnOnce(Arc<P::Stub>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<R, RpcStatus>> + Send + 'static,
        R: Send + Unpin + 'static,
    {
        let this = self.clone();
        self.block_on(async move { this.call(f).await })
    }

    /// Detach any client future onto the captured runtime handle.
    pub(crate) fn spawn<R>(
        &self, fut: impl Future<Output = Result<R, ClientError>> + Send + 'static,
    ) -> CallHandle<R>
    where
        R: Send + Unpin + 'static,
    {
        let (tx, rx) = crossfire::spsc::bounded_async::<Result<R, ClientError>>(1);
        self.rt.spawn(async move {
            let res = fut.await;
            let _ = tx.send(res).await;
        });
        CallHandle { rx }
    }

    /// Run any client future to completion from a plain thread.
    pub(crate) fn block_on<R>(
        &self, fut: impl Future<Output = Result<R, ClientError>> + Send + 'static,
    ) -> Result<R, ClientError>
    where
        R: Send + Unpin + 'static,
    {
        debug_assert!(
            Handle::try_current().is_err(),
            "blocking dispatch must not run inside async context"
        );
        let (tx, rx) =
            crossfire::spsc::bounded_tx_async_rx_blocking::<Result<R, ClientError>>(1);
        self.rt.spawn(async move {
            let res = fut.await;
            let _ = tx.send(res).await;
        });
        match rx.recv() {
            Ok(res) => res,
            Err(_) => Err(ClientError::Rpc(RpcStatus::Internal)),
        }
    }
}

/// Completion handle of [Dispatch::call_future].
pub struct CallHandle<R> {
    rx: AsyncRx<Result<R, ClientError>>,
}

impl<R: Send + Unpin + 'static> CallHandle<R> {
    pub async fn join(self) -> Result<R, ClientError> {
        match self.rx.recv().await {
            Ok(res) => res,
            // sender dropped without a result, e.g. runtime shut down
            Err(_) => Err(ClientError::Rpc(RpcStatus::Internal)),
        }
    }
}
