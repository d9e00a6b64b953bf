//! Minimal file model with a pluggable, thread-safe byte source.
//!
//! This crate provides:
//! - `Data`: a trait for thread-safe, consuming byte sources pulled one slice
//!   at a time.
//! - `File`: an identity, display name and optional MIME type wrapped around
//!   an `Arc<dyn Data>`.
//!
//! Example (illustrative):
//! ```rust,ignore
//! use std::sync::{Arc, Mutex};
//!
//! struct InMemoryData {
//!     buf: Vec<u8>,
//!     pos: Mutex<usize>,
//! }
//! impl roomdrop_entities::Data for InMemoryData {
//!     fn len(&self) -> u64 { self.buf.len() as u64 }
//!     fn read_chunk(&self, size: u64) -> Vec<u8> {
//!         let mut p = self.pos.lock().unwrap();
//!         let end = (*p + size as usize).min(self.buf.len());
//!         let out = self.buf[*p..end].to_vec();
//!         *p = end;
//!         out
//!     }
//! }
//!
//! let file = roomdrop_entities::File {
//!     id: "file-1".into(),
//!     name: "greeting.txt".into(),
//!     mime_type: Some("text/plain".into()),
//!     data: Arc::new(InMemoryData { buf: b"hello".to_vec(), pos: Mutex::new(0) }),
//! };
//! assert_eq!(file.len(), 5);
//! assert_eq!(file.data.read_chunk(2), b"he".to_vec());
//! ```

mod data;
mod file;

/// Re-export of the core byte source trait.
pub use data::Data;
/// Re-export of the file abstraction backed by `Data`.
pub use file::File;
