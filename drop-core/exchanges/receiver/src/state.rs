use roomdropx_common::FileMeta;
use std::{io, sync::Arc};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AppendError {
    #[error("chunk without meta")]
    NoFile,
    #[error("chunk would grow file to {attempted} bytes, declared {declared}")]
    Overflow { declared: u64, attempted: u64 },
}

/// Content of a completed file, kept as the chunks it arrived in.
///
/// Cloning shares the chunks. Nothing is copied into a contiguous buffer
/// unless [`ReceivedData::to_vec`] asks for it.
#[derive(Clone, Debug, Default)]
pub struct ReceivedData {
    chunks: Arc<[Vec<u8>]>,
    len: usize,
}

impl ReceivedData {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> {
        self.chunks.iter().map(Vec::as_slice)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.chunks.concat()
    }

    /// Writes the chunks in order.
    pub fn write_to<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        for chunk in self.chunks() {
            writer.write_all(chunk)?;
        }
        Ok(())
    }
}

/// Reconstruction state of the file currently being received.
///
/// `bytes_received` only grows while a file is in flight and never exceeds
/// `meta.size`. Every new `meta` starts over from an empty state.
#[derive(Debug, Default)]
pub struct TransferState {
    meta: Option<FileMeta>,
    bytes_received: u64,
    buffer: Vec<Vec<u8>>,
}

impl TransferState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn meta(&self) -> Option<&FileMeta> {
        self.meta.as_ref()
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Whether a file has been announced and not yet finished.
    pub fn is_in_flight(&self) -> bool {
        self.meta.is_some()
    }

    /// Starts a new file, handing back the one that was still in flight.
    pub fn begin(&mut self, meta: FileMeta) -> Option<(FileMeta, u64)> {
        let previous = self.reset();
        self.meta = Some(meta);
        previous
    }

    /// Buffers one chunk and returns the new byte count.
    pub fn append(&mut self, chunk: Vec<u8>) -> Result<u64, AppendError> {
        let Some(meta) = &self.meta else {
            return Err(AppendError::NoFile);
        };
        let next = self.bytes_received + chunk.len() as u64;
        if next > meta.size {
            return Err(AppendError::Overflow {
                declared: meta.size,
                attempted: next,
            });
        }
        self.bytes_received = next;
        self.buffer.push(chunk);
        Ok(next)
    }

    /// Hands over the buffered chunks of the finished file and clears
    /// state.
    pub fn finish(&mut self) -> Option<(FileMeta, ReceivedData)> {
        let meta = self.meta.take()?;
        let data = ReceivedData {
            chunks: std::mem::take(&mut self.buffer).into(),
            len: std::mem::take(&mut self.bytes_received) as usize,
        };
        Some((meta, data))
    }

    /// Drops whatever is in flight, returning its meta and byte count.
    pub fn reset(&mut self) -> Option<(FileMeta, u64)> {
        let meta = self.meta.take()?;
        let received = std::mem::take(&mut self.bytes_received);
        self.buffer.clear();
        Some((meta, received))
    }
}
