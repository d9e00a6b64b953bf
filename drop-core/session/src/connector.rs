use anyhow::Result;
use roomdropx_common::{DirectChannel, Payload};
use std::future::Future;
use tokio::sync::mpsc;

/// The connectivity-establishment transport of one endpoint.
///
/// It owns the meaning of every negotiation payload. The session only
/// decides when each step happens and relays what the transport produces.
pub trait PeerConnector: Send + Sync {
    type Channel: DirectChannel + 'static;

    /// Local candidates, as the transport discovers them. Handed out once.
    fn take_candidate_rx(&self) -> Option<mpsc::UnboundedReceiver<Payload>>;

    /// Initiator: produces the offer and starts gathering candidates.
    fn create_offer(&self) -> impl Future<Output = Result<Payload>> + Send;

    /// Responder: applies the remote offer and produces the answer.
    fn accept_offer(
        &self,
        offer: Payload,
    ) -> impl Future<Output = Result<Payload>> + Send;

    /// Initiator: applies the remote answer. Fails when it does not match
    /// the offer that was sent.
    fn accept_answer(
        &self,
        answer: Payload,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Applies a remote candidate. Only called once the remote description
    /// is in place.
    fn add_candidate(
        &self,
        candidate: Payload,
    ) -> impl Future<Output = Result<()>> + Send;

    /// The direct channel, once both descriptions are applied.
    fn open_channel(&self) -> impl Future<Output = Result<Self::Channel>> + Send;

    fn close(&self);
}
