//! Relay session registry, as seen from one endpoint.
//!
//! The relay pairs two endpoints in a room, optionally gated by a PIN,
//! forwards their negotiation messages to each other and reports arrivals
//! and departures. It never carries file data.

mod config;
mod memory;

use roomdropx_common::NegotiationMessage;
use std::future::Future;
use tokio::sync::mpsc;

use crate::RoomError;

pub use config::RelayConfig;
pub use memory::{MemoryRelay, MemoryRelayClient};

/// Asynchronous notification pushed by the relay.
#[derive(Clone, Debug, PartialEq)]
pub enum RelayEvent {
    PeerJoined,
    PeerLeft,
    Signal(NegotiationMessage),
    Error(RoomError),
}

/// Acknowledgement of a successful join.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinAck {
    pub code: String,
    /// Whether the other participant was already in the room.
    pub peer_already_present: bool,
}

/// One endpoint's connection to the relay.
///
/// Events arrive on the receiver handed out once by `take_event_rx`; the
/// stream ending means the relay connection is gone.
pub trait RelayClient: Send + Sync {
    fn take_event_rx(&self) -> Option<mpsc::UnboundedReceiver<RelayEvent>>;

    /// Creates a room, generating a code when `code` is `None` or blank.
    /// Returns the room code.
    fn create_room(
        &self,
        code: Option<&str>,
        pin: Option<&str>,
    ) -> impl Future<Output = Result<String, RoomError>> + Send;

    fn join_room(
        &self,
        code: &str,
        pin: Option<&str>,
    ) -> impl Future<Output = Result<JoinAck, RoomError>> + Send;

    /// Forwards a negotiation message to the other participant.
    fn signal(
        &self,
        message: NegotiationMessage,
    ) -> impl Future<Output = Result<(), RoomError>> + Send;

    fn leave(&self) -> impl Future<Output = ()> + Send;
}
