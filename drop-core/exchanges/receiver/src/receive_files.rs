use anyhow::{Context, Result};
use roomdropx_common::{
    ChannelClosed, ControlFrame, DirectChannel, FileMeta, Frame, Subscribers,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::state::{AppendError, ReceivedData, TransferState};

/// Observer of the receive side.
pub trait ReceiveFilesSubscriber: Send + Sync {
    fn get_id(&self) -> String;
    /// Progress of the file in flight, starting at 0 when its `meta` arrives.
    fn notify_receiving(&self, event: ReceiveFilesReceivingEvent);
    /// A file was completed by its `end` marker.
    fn notify_received(&self, event: ReceiveFilesReceivedEvent);
    /// A file in flight was discarded before its `end` marker.
    fn notify_abandoned(&self, event: ReceiveFilesAbandonedEvent);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiveFilesReceivingEvent {
    pub name: String,
    pub received: u64,
    pub total: u64,
}

#[derive(Clone, Debug)]
pub struct ReceiveFilesReceivedEvent {
    pub name: String,
    pub mime_type: Option<String>,
    pub total: u64,
    pub data: ReceivedData,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiveFilesAbandonedEvent {
    pub name: String,
    pub received: u64,
    pub total: u64,
    pub reason: AbandonReason,
}

/// Why an unfinished file was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbandonReason {
    /// A new `meta` arrived before the file's `end`.
    Superseded,
    /// The channel closed before the file's `end`.
    ChannelClosed,
    /// A chunk would have exceeded the declared size.
    Overflow,
}

/// A completed file, as assembled from its chunks.
#[derive(Clone, Debug)]
pub struct ReceivedFile {
    pub name: String,
    pub mime_type: Option<String>,
    /// Size announced in `meta`; may differ from `data.len()` when the
    /// sender's source came up short.
    pub declared_size: u64,
    pub data: ReceivedData,
}

/// Frame-arrival handler for a single direct channel.
///
/// Owned by the one task reading the channel; frames are processed strictly
/// in arrival order.
pub struct ReceiveFilesHandler {
    state: TransferState,
    received_files: usize,
    subscribers: Subscribers<dyn ReceiveFilesSubscriber>,
}

impl Default for ReceiveFilesHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveFilesHandler {
    pub fn new() -> Self {
        Self {
            state: TransferState::new(),
            received_files: 0,
            subscribers: Subscribers::new(),
        }
    }

    pub fn state(&self) -> &TransferState {
        &self.state
    }

    /// Number of files completed so far.
    pub fn received_files(&self) -> usize {
        self.received_files
    }

    pub fn subscribe(&self, subscriber: Arc<dyn ReceiveFilesSubscriber>) {
        self.subscribers
            .insert(subscriber.get_id(), subscriber);
    }

    pub fn unsubscribe(&self, subscriber: Arc<dyn ReceiveFilesSubscriber>) {
        self.subscribers.remove(&subscriber.get_id());
    }

    /// Applies one frame and returns the file it completed, if any.
    pub fn handle_frame(&mut self, frame: Frame) -> Option<ReceivedFile> {
        match frame {
            Frame::Binary(chunk) => {
                self.on_chunk(chunk);
                None
            }
            Frame::Text(text) => match ControlFrame::from_json(&text) {
                Ok(ControlFrame::Meta(meta)) => {
                    self.on_meta(meta);
                    None
                }
                Ok(ControlFrame::End) => self.on_end(),
                Err(e) => {
                    warn!("Ignoring undecodable control frame: {}", e);
                    None
                }
            },
        }
    }

    /// Reads frames until the next file completes.
    ///
    /// Returns `Ok(None)` once the channel closed between files. If it
    /// closes while a file is in flight, that file is reported abandoned and
    /// the error chain carries [`ChannelClosed`].
    pub async fn receive_next<C: DirectChannel>(
        &mut self,
        channel: &C,
    ) -> Result<Option<ReceivedFile>> {
        while let Some(frame) = channel.recv().await {
            if let Some(file) = self.handle_frame(frame) {
                return Ok(Some(file));
            }
        }
        match self.state.reset() {
            Some((meta, received)) => {
                self.abandon(&meta, received, AbandonReason::ChannelClosed);
                Err(ChannelClosed)
                    .with_context(|| format!("receiving {}", meta.name))
            }
            None => Ok(None),
        }
    }

    /// Receives until the channel closes, returning how many files
    /// completed. Completed files reach subscribers via `notify_received`.
    pub async fn receive_all<C: DirectChannel>(
        &mut self,
        channel: &C,
    ) -> Result<usize> {
        info!("Receiving files");
        let before = self.received_files;
        while self.receive_next(channel).await?.is_some() {}
        let count = self.received_files - before;
        info!("Channel closed after {} files", count);
        Ok(count)
    }

    fn on_meta(&mut self, meta: FileMeta) {
        debug!("Receiving {} ({} bytes)", meta.name, meta.size);
        let name = meta.name.clone();
        let total = meta.size;
        if let Some((previous, received)) = self.state.begin(meta) {
            self.abandon(&previous, received, AbandonReason::Superseded);
        }
        self.subscribers.for_each(|s| {
            s.notify_receiving(ReceiveFilesReceivingEvent {
                name: name.clone(),
                received: 0,
                total,
            });
        });
    }

    fn on_chunk(&mut self, chunk: Vec<u8>) {
        let len = chunk.len();
        match self.state.append(chunk) {
            Ok(received) => {
                let Some(meta) = self.state.meta() else {
                    return;
                };
                self.subscribers.for_each(|s| {
                    s.notify_receiving(ReceiveFilesReceivingEvent {
                        name: meta.name.clone(),
                        received,
                        total: meta.size,
                    });
                });
            }
            Err(AppendError::NoFile) => {
                warn!("Dropping {} byte chunk received without meta", len);
            }
            Err(e @ AppendError::Overflow { .. }) => {
                if let Some((meta, received)) = self.state.reset() {
                    warn!("Abandoning {}: {}", meta.name, e);
                    self.abandon(&meta, received, AbandonReason::Overflow);
                }
            }
        }
    }

    fn on_end(&mut self) -> Option<ReceivedFile> {
        let Some((meta, data)) = self.state.finish() else {
            warn!("Ignoring end without a file in flight");
            return None;
        };
        if data.len() as u64 != meta.size {
            warn!(
                "{} ended at {} bytes, declared {}",
                meta.name,
                data.len(),
                meta.size
            );
        }
        info!("Received {} ({} bytes)", meta.name, data.len());
        self.received_files += 1;
        self.subscribers.for_each(|s| {
            s.notify_received(ReceiveFilesReceivedEvent {
                name: meta.name.clone(),
                mime_type: meta.mime_type.clone(),
                total: meta.size,
                data: data.clone(),
            });
        });
        Some(ReceivedFile {
            name: meta.name,
            mime_type: meta.mime_type,
            declared_size: meta.size,
            data,
        })
    }

    fn abandon(&self, meta: &FileMeta, received: u64, reason: AbandonReason) {
        warn!(
            "Abandoned {} at {} of {} bytes ({:?})",
            meta.name, received, meta.size, reason
        );
        self.subscribers.for_each(|s| {
            s.notify_abandoned(ReceiveFilesAbandonedEvent {
                name: meta.name.clone(),
                received,
                total: meta.size,
                reason,
            });
        });
    }
}
