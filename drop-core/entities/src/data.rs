//! Byte-source abstraction for files offered to a peer.
//!
//! A `Data` implementor is pulled one slice at a time by the send loop, so a
//! file never has to be resident in memory as a whole. Typical implementors
//! wrap an open file handle or an in-memory buffer.
//!
//! All methods take `&self` and the trait is `Send + Sync`, so implementors
//! keep their read cursor behind interior mutability.

/// A thread-safe, sequential, consuming source of bytes.
///
/// Contract:
/// - `len()` is the declared total size in bytes and never changes.
/// - `read_chunk(size)` returns at most `size` bytes starting at the current
///   cursor and advances the cursor by the number of bytes returned. An empty
///   vector means end of data.
pub trait Data: Send + Sync {
    /// Declared total length of the data in bytes.
    fn len(&self) -> u64;

    /// Checks if the data is empty (length is 0).
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads up to `size` bytes from the current position.
    ///
    /// Calling with `size == 0` returns an empty vector.
    fn read_chunk(&self, size: u64) -> Vec<u8>;
}
