//! Receive-side library for room transfers.
//!
//! Rebuilds files from the frame stream of an open direct channel. It
//! exposes:
//! - `TransferState`: the per-file reconstruction state (current `meta`,
//!   bytes received so far, buffered chunks).
//! - `ReceivedData`: a completed file's chunks, handed over without being
//!   copied into one buffer.
//! - `ReceiveFilesHandler`: the frame-arrival handler driving that state and
//!   emitting progress, completion and abandonment events to subscribers.
//!
//! Typical flow:
//! 1. Create a `ReceiveFilesHandler` and subscribe to its events.
//! 2. Once the direct channel is open, call `receive_all` (until the channel
//!    closes) or `receive_next` (one completed file at a time).
//! 3. Persist each `ReceivedFile` as it is delivered.
//!
//! Malformed input never fails the transfer: a chunk without a preceding
//! `meta`, an `end` without a file in flight, undecodable control text and
//! a second `meta` before `end` are logged and the state machine carries on.
//! Only losing the channel while a file is in flight is an error.

mod receive_files;
mod state;

pub use receive_files::*;
pub use state::{AppendError, ReceivedData, TransferState};
