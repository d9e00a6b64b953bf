mod flow;
mod send_files;

use anyhow::{Result, bail};
use roomdrop_entities::Data;
use roomdropx_common::{HIGH_WATERMARK, LOW_WATERMARK, MAX_CHUNK_SIZE};
use std::sync::Arc;

pub use flow::FlowControl;
pub use send_files::*;

pub struct SenderFile {
    pub name: String,
    pub mime_type: Option<String>,
    pub data: Arc<dyn SenderFileData>,
}

/// Byte source of a file being sent.
///
/// `read_chunk` is called repeatedly and must return the next slice of at
/// most `size` bytes, or an empty vector once exhausted.
pub trait SenderFileData: Send + Sync {
    fn len(&self) -> u64;
    fn read_chunk(&self, size: u64) -> Vec<u8>;
}
struct SenderFileDataAdapter {
    inner: Arc<dyn SenderFileData>,
}
impl Data for SenderFileDataAdapter {
    fn len(&self) -> u64 {
        return self.inner.len();
    }

    fn read_chunk(&self, size: u64) -> Vec<u8> {
        return self.inner.read_chunk(size);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SenderConfig {
    pub chunk_size: u64,
    pub flow: FlowControl,
}
impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            chunk_size: MAX_CHUNK_SIZE,
            flow: FlowControl {
                high_watermark: HIGH_WATERMARK,
                low_watermark: LOW_WATERMARK,
            },
        }
    }
}
impl SenderConfig {
    pub fn high_performance() -> Self {
        Self {
            chunk_size: 4194304, // 4MB chunks
            flow: FlowControl {
                high_watermark: 16777216,
                low_watermark: 4194304,
            },
        }
    }

    pub fn balanced() -> Self {
        Self::default()
    }

    pub fn low_bandwidth() -> Self {
        Self {
            chunk_size: 65536, // 64KB chunks
            flow: FlowControl {
                high_watermark: 1048576,
                low_watermark: 262144,
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk size must be greater than zero");
        }
        if self.flow.low_watermark > self.flow.high_watermark {
            bail!(
                "low watermark ({}) must not exceed high watermark ({})",
                self.flow.low_watermark,
                self.flow.high_watermark
            );
        }
        Ok(())
    }
}
