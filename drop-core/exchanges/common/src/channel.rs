use std::future::Future;

use thiserror::Error;

use crate::Frame;

/// Raised when a direct channel closes underneath an operation.
///
/// Wrapped into `anyhow::Error` by callers; use [`is_channel_closed`] to tell
/// it apart from other failures.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("direct channel closed")]
pub struct ChannelClosed;

/// Checks whether an error chain bottoms out in [`ChannelClosed`].
pub fn is_channel_closed(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<ChannelClosed>().is_some())
}

/// Ordered, reliable, message-oriented bidirectional channel between two
/// peers.
///
/// Implementations preserve message boundaries and order, and expose how
/// many bytes the local side has queued that the remote side has not yet
/// consumed. Transfer code never touches the transport directly.
pub trait DirectChannel: Send + Sync {
    /// Queues one frame for delivery. Never blocks on buffer space.
    fn send(&self, frame: Frame) -> Result<(), ChannelClosed>;

    /// Next frame from the remote side, `None` once the channel closed and
    /// nothing is left to deliver.
    fn recv(&self) -> impl Future<Output = Option<Frame>> + Send;

    /// Bytes queued locally and not yet drained.
    fn buffered_amount(&self) -> u64;

    /// Resolves once `buffered_amount() <= threshold`.
    ///
    /// Returns immediately when the condition already holds, so a drain
    /// that happens between a caller's check and this call is never missed.
    fn wait_buffered_at_most(
        &self,
        threshold: u64,
    ) -> impl Future<Output = Result<(), ChannelClosed>> + Send;

    fn is_open(&self) -> bool;

    /// Resolves once the channel is closed, from either side.
    fn closed(&self) -> impl Future<Output = ()> + Send;

    /// Closes both directions. Idempotent.
    fn close(&self);
}
