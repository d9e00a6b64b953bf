mod handler;

use crate::{SenderConfig, SenderFile, SenderFileDataAdapter};
use anyhow::Result;
use chrono::{DateTime, Utc};
use roomdrop_entities::File;
use roomdropx_common::DirectChannel;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub use handler::{
    SendFilesHandler, SendFilesSendingEvent, SendFilesSubscriber,
};

pub struct SendFilesRequest {
    pub files: Vec<SenderFile>,
    pub config: SenderConfig,
}

/// A prepared outgoing batch, waiting for an open channel.
pub struct SendFilesBubble {
    handler: Arc<SendFilesHandler>,
    config: SenderConfig,
    created_at: DateTime<Utc>,
}
impl SendFilesBubble {
    pub fn new(handler: Arc<SendFilesHandler>, config: SenderConfig) -> Self {
        Self {
            handler,
            config,
            created_at: Utc::now(),
        }
    }

    pub fn get_config(&self) -> &SenderConfig {
        &self.config
    }

    pub fn get_created_at(&self) -> String {
        self.created_at.to_rfc3339()
    }

    pub fn get_file_names(&self) -> Vec<String> {
        self.handler
            .files()
            .iter()
            .map(|f| f.name.clone())
            .collect()
    }

    pub fn is_finished(&self) -> bool {
        self.handler.is_finished()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn SendFilesSubscriber>) {
        self.handler.subscribe(subscriber);
    }

    pub fn unsubscribe(&self, subscriber: Arc<dyn SendFilesSubscriber>) {
        self.handler.unsubscribe(subscriber);
    }

    /// Streams the batch over an open channel. See
    /// [`SendFilesHandler::send_all`].
    pub async fn send_all<C: DirectChannel>(&self, channel: &C) -> Result<()> {
        self.handler.send_all(channel).await
    }
}

pub fn send_files(request: SendFilesRequest) -> Result<SendFilesBubble> {
    request.config.validate()?;
    info!("Preparing transfer of {} files", request.files.len());
    debug!(
        "Sender config: chunk_size={}, high_watermark={}, low_watermark={}",
        request.config.chunk_size,
        request.config.flow.high_watermark,
        request.config.flow.low_watermark
    );

    let files = request
        .files
        .into_iter()
        .map(|f| File {
            id: Uuid::new_v4().to_string(),
            name: f.name,
            mime_type: f.mime_type,
            data: Arc::new(SenderFileDataAdapter { inner: f.data }),
        })
        .collect();
    let handler = Arc::new(SendFilesHandler::with_config(
        files,
        request.config.clone(),
    ));

    Ok(SendFilesBubble::new(handler, request.config))
}
