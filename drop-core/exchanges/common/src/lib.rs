//! Types shared by both ends of a room transfer.
//!
//! - [`frame`]: what crosses the direct channel once it is open (control
//!   frames as JSON text, file chunks as raw binary).
//! - [`negotiation`]: the offer/answer/candidate messages relayed while the
//!   channel is being established.
//! - [`channel`]: the `DirectChannel` seam the transfer engine is written
//!   against, plus the `ChannelClosed` marker error.
//! - [`memory`]: an in-process channel pair with real buffered-amount
//!   accounting, used by the loopback transport and tests.
//! - [`subscribers`]: the callback registry used by every event source.

pub mod channel;
pub mod frame;
pub mod memory;
pub mod negotiation;
pub mod subscribers;

pub use channel::{ChannelClosed, DirectChannel, is_channel_closed};
pub use frame::{ControlFrame, FileMeta, Frame};
pub use memory::MemoryChannel;
pub use negotiation::{NegotiationMessage, Payload};
pub use subscribers::Subscribers;

/// Reference size of a single binary chunk (1 MiB), used by the default
/// sender configuration.
pub const MAX_CHUNK_SIZE: u64 = 1024 * 1024;
/// Reference high watermark for outstanding channel bytes (8 MiB).
pub const HIGH_WATERMARK: u64 = 8 * 1024 * 1024;
/// Reference low watermark the channel must drain to before resuming (1 MiB).
pub const LOW_WATERMARK: u64 = 1024 * 1024;
