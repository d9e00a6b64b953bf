use anyhow::{Context, Result};
use roomdrop_entities::File;
use roomdropx_common::{
    ControlFrame, DirectChannel, FileMeta, Frame, Subscribers,
};
use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::{debug, info, warn};

use crate::SenderConfig;

pub trait SendFilesSubscriber: Send + Sync {
    fn get_id(&self) -> String;
    fn notify_sending(&self, event: SendFilesSendingEvent);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendFilesSendingEvent {
    pub name: String,
    pub sent: u64,
    pub total: u64,
}

pub struct SendFilesHandler {
    is_finished: AtomicBool,
    files: Vec<File>,
    config: SenderConfig,
    subscribers: Subscribers<dyn SendFilesSubscriber>,
}
impl Debug for SendFilesHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendFilesHandler")
            .field("is_finished", &self.is_finished)
            .field("files", &self.files)
            .field("config", &self.config)
            .finish()
    }
}
impl SendFilesHandler {
    pub fn new(files: Vec<File>) -> Self {
        Self::with_config(files, SenderConfig::default())
    }

    pub fn with_config(files: Vec<File>, config: SenderConfig) -> Self {
        Self {
            is_finished: AtomicBool::new(false),
            files,
            config,
            subscribers: Subscribers::new(),
        }
    }

    pub fn files(&self) -> &[File] {
        &self.files
    }

    pub fn is_finished(&self) -> bool {
        return self.is_finished.load(Ordering::Acquire);
    }

    pub fn subscribe(&self, subscriber: Arc<dyn SendFilesSubscriber>) {
        self.subscribers
            .insert(subscriber.get_id(), subscriber);
    }

    pub fn unsubscribe(&self, subscriber: Arc<dyn SendFilesSubscriber>) {
        self.subscribers.remove(&subscriber.get_id());
    }

    /// Streams every file over `channel`, one after the other.
    ///
    /// Each file goes out as `meta`, its chunks, then `end`; the next file
    /// starts only after the previous `end` was queued. Fails with
    /// [`roomdropx_common::ChannelClosed`] in the error chain if the channel
    /// closes before the last `end`.
    pub async fn send_all<C: DirectChannel>(&self, channel: &C) -> Result<()> {
        info!("Sending {} files", self.files.len());
        for file in &self.files {
            self.send_file(channel, file)
                .await
                .with_context(|| format!("sending {}", file.name))?;
        }
        self.is_finished.store(true, Ordering::Release);
        info!("All files sent");
        return Ok(());
    }

    async fn send_file<C: DirectChannel>(
        &self,
        channel: &C,
        file: &File,
    ) -> Result<()> {
        let total = file.len();
        let meta = ControlFrame::Meta(FileMeta {
            name: file.name.clone(),
            size: total,
            mime_type: file.mime_type.clone(),
        });
        channel.send(meta.to_frame()?)?;
        debug!("Sent meta for {} ({} bytes)", file.name, total);

        let mut sent = 0u64;
        while sent < total {
            let want = self.config.chunk_size.min(total - sent);
            let chunk = file.data.read_chunk(want);
            if chunk.is_empty() {
                warn!(
                    "Source of {} ended at {} of {} bytes",
                    file.name, sent, total
                );
                break;
            }
            self.config.flow.ready(channel).await?;
            sent += chunk.len() as u64;
            channel.send(Frame::Binary(chunk))?;
            self.subscribers.for_each(|s| {
                s.notify_sending(SendFilesSendingEvent {
                    name: file.name.clone(),
                    sent,
                    total,
                });
            });
        }

        channel.send(ControlFrame::End.to_frame()?)?;
        debug!("Sent end for {}", file.name);
        return Ok(());
    }
}
