use std::{fmt, sync::Arc};

use crate::Data;

/// A file queued for sending.
///
/// `name` and `mime_type` travel to the peer in the file's `meta` frame;
/// `id` only identifies the file locally.
#[derive(Clone)]
pub struct File {
    pub id: String,
    pub name: String,
    pub mime_type: Option<String>,
    pub data: Arc<dyn Data>,
}

impl File {
    /// Declared size, as announced to the peer.
    pub fn len(&self) -> u64 {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
