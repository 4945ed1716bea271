use crate::dispatch::Dispatch;
use crate::error::ClientError;
use crate::proto::*;
use crate::transport::{ChannelProvider, ServiceStub};

/// Asks any cluster member which server currently owns a resource.
///
/// Every call is a fresh lookup RPC through the dispatch layer; nothing is
/// cached here. The producer caches the address it gets back, nobody else
/// needs to.
pub struct Locator<P: ChannelProvider> {
    dispatch: Dispatch<P>,
}

impl<P: ChannelProvider> Clone for Locator<P> {
    fn clone(&self) -> Self {
        Self { dispatch: self.dispatch.clone() }
    }
}

impl<P: ChannelProvider> Locator<P> {
    pub(crate) fn new(dispatch: Dispatch<P>) -> Self {
        Self { dispatch }
    }

    #[inline]
    pub(crate) fn dispatch(&self) -> &Dispatch<P> {
        &self.dispatch
    }

    /// Which server owns the shard leadership of `stream_name`'s appends.
    pub async fn lookup_stream(&self, stream_name: &str) -> Result<NodeAddr, ClientError> {
        let req = LookupStreamRequest { stream_name: stream_name.to_string() };
        let resp = self
            .dispatch
            .call(move |stub| async move { stub.lookup_stream(req).await })
            .await?;
        Ok(resp.server_node)
    }

    /// Which server currently serves `subscription_id`.
    pub async fn lookup_subscription(
        &self, subscription_id: &str,
    ) -> Result<NodeAddr, ClientError> {
        let req = LookupSubscriptionRequest { subscription_id: subscription_id.to_string() };
        let resp = self
            .dispatch
            .call(move |stub| async move { stub.lookup_subscription(req).await })
            .await?;
        Ok(resp.server_node)
    }

    /// Generic ownership lookup for any named resource.
    pub async fn lookup_resource(
        &self, res_type: ResourceType, res_id: &str,
    ) -> Result<NodeAddr, ClientError> {
        let req = LookupResourceRequest { res_type, res_id: res_id.to_string() };
        let resp = self
            .dispatch
            .call(move |stub| async move { stub.lookup_resource(req).await })
            .await?;
        Ok(resp.server_node)
    }
}
