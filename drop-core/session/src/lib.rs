//! Session setup for room transfers.
//!
//! Two endpoints meet in a relay room, then establish a direct channel by
//! exchanging an offer, an answer and connectivity candidates through the
//! relay. This crate provides:
//! - `RelayClient` / `RelayEvent`: the relay as seen from one endpoint, and
//!   `MemoryRelay`, an in-process registry implementing it.
//! - `PeerConnector`: the connectivity transport that owns the negotiation
//!   payloads, and `LoopbackConnector`, an in-process implementation.
//! - `Negotiation`: the I/O-free state machine deciding when each
//!   negotiation step happens.
//! - `Session`: ties the three together for one endpoint and reports phase
//!   changes (`Idle`, `AwaitingPeer`, `Negotiating`, `Open`, `Closed`) to
//!   subscribers.
//!
//! Example (illustrative):
//! ```rust,ignore
//! let relay = MemoryRelay::new(RelayConfig::default());
//! let (left, right) = LoopbackConnector::pair();
//! let mut initiator = Session::new(relay.connect(), left);
//! let mut responder = Session::new(relay.connect(), right);
//!
//! let code = initiator.create_room(None, None).await?;
//! initiator.choose_role(Role::Initiator).await?;
//! responder.join_room(&code, None).await?;
//! responder.choose_role(Role::Responder).await?;
//!
//! let (a, b) = tokio::join!(initiator.negotiate(), responder.negotiate());
//! ```
//!
//! There is no negotiation timeout: a silent peer leaves the session in
//! `Negotiating` until the caller closes it.

mod connector;
mod error;
mod loopback;
mod negotiation;
mod phase;
mod relay;
mod session;

pub use connector::PeerConnector;
pub use error::{RoomError, SessionError};
pub use loopback::LoopbackConnector;
pub use negotiation::{Directive, Negotiation};
pub use phase::{Role, SessionPhase};
pub use relay::{
    JoinAck, MemoryRelay, MemoryRelayClient, RelayClient, RelayConfig,
    RelayEvent,
};
pub use session::{
    Session, SessionErrorEvent, SessionStatusEvent, SessionSubscriber,
};
