use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use roomdropx_receiver::{
    ReceiveFilesAbandonedEvent, ReceiveFilesReceivedEvent,
    ReceiveFilesReceivingEvent, ReceiveFilesSubscriber,
};
use roomdropx_sender::{SendFilesSendingEvent, SendFilesSubscriber};
use uuid::Uuid;

/// Per-file progress bars for both ends of a transfer.
pub struct TransferProgress {
    id: String,
    mp: MultiProgress,
    sending: Mutex<HashMap<String, ProgressBar>>,
    receiving: Mutex<HashMap<String, ProgressBar>>,
    abandoned: Mutex<Vec<String>>,
}

impl TransferProgress {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            mp: MultiProgress::new(),
            sending: Mutex::new(HashMap::new()),
            receiving: Mutex::new(HashMap::new()),
            abandoned: Mutex::new(Vec::new()),
        }
    }

    /// Names of files the receiving side dropped.
    pub fn abandoned(&self) -> Vec<String> {
        self.abandoned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
    }

    fn with_bar(
        &self,
        bars: &Mutex<HashMap<String, ProgressBar>>,
        name: &str,
        total: u64,
        label: &str,
        f: impl FnOnce(&ProgressBar),
    ) {
        let mut bars = bars.lock().unwrap_or_else(PoisonError::into_inner);
        let pb = bars.entry(name.to_string()).or_insert_with(|| {
            let pb = self.mp.add(ProgressBar::new(total));
            pb.set_style(Self::bar_style());
            pb.set_message(format!("{} {}", label, name));
            pb
        });
        f(pb);
    }
}

impl Default for TransferProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl SendFilesSubscriber for TransferProgress {
    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn notify_sending(&self, event: SendFilesSendingEvent) {
        self.with_bar(&self.sending, &event.name, event.total, "Sending", |pb| {
            pb.set_position(event.sent);
            if event.sent >= event.total {
                pb.finish_with_message(format!("[DONE] Sent {}", event.name));
            }
        });
    }
}

impl ReceiveFilesSubscriber for TransferProgress {
    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn notify_receiving(&self, event: ReceiveFilesReceivingEvent) {
        self.with_bar(
            &self.receiving,
            &event.name,
            event.total,
            "Receiving",
            |pb| pb.set_position(event.received),
        );
    }

    fn notify_received(&self, event: ReceiveFilesReceivedEvent) {
        self.with_bar(
            &self.receiving,
            &event.name,
            event.total,
            "Receiving",
            |pb| {
                pb.set_position(event.data.len() as u64);
                pb.finish_with_message(format!(
                    "[DONE] Received {}",
                    event.name
                ));
            },
        );
    }

    fn notify_abandoned(&self, event: ReceiveFilesAbandonedEvent) {
        self.with_bar(
            &self.receiving,
            &event.name,
            event.total,
            "Receiving",
            |pb| {
                pb.abandon_with_message(format!(
                    "[FAILED] {} after {} of {} bytes ({:?})",
                    event.name, event.received, event.total, event.reason
                ));
            },
        );
        self.abandoned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomdropx_receiver::AbandonReason;

    #[test]
    fn abandoned_files_are_recorded() {
        let progress = TransferProgress::new();
        progress.notify_receiving(ReceiveFilesReceivingEvent {
            name: "a.bin".into(),
            received: 0,
            total: 10,
        });

        progress.notify_abandoned(ReceiveFilesAbandonedEvent {
            name: "a.bin".into(),
            received: 4,
            total: 10,
            reason: AbandonReason::ChannelClosed,
        });

        assert_eq!(progress.abandoned(), vec!["a.bin".to_string()]);
    }
}
