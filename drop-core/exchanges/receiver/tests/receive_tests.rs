use roomdropx_common::{
    ControlFrame, DirectChannel, FileMeta, Frame, MemoryChannel,
    is_channel_closed,
};
use roomdropx_receiver::{
    AbandonReason, ReceiveFilesAbandonedEvent, ReceiveFilesHandler,
    ReceiveFilesReceivedEvent, ReceiveFilesReceivingEvent,
    ReceiveFilesSubscriber,
};
use roomdropx_sender::{
    SendFilesRequest, SenderConfig, SenderFile, SenderFileData, send_files,
};
use std::sync::{Arc, Mutex};

struct MockSenderFileData {
    data: Vec<u8>,
    position: Mutex<usize>,
}

impl SenderFileData for MockSenderFileData {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_chunk(&self, size: u64) -> Vec<u8> {
        let mut pos = self.position.lock().unwrap();
        let start = *pos;
        let end = std::cmp::min(start + size as usize, self.data.len());
        *pos = end;
        self.data[start..end].to_vec()
    }
}

fn create_test_file(name: &str, size: usize) -> SenderFile {
    SenderFile {
        name: name.to_string(),
        mime_type: None,
        data: Arc::new(MockSenderFileData {
            data: (0..size).map(|i| (i % 251) as u8).collect(),
            position: Mutex::new(0),
        }),
    }
}

#[derive(Default)]
struct Collector {
    received: Mutex<Vec<ReceiveFilesReceivedEvent>>,
    abandoned: Mutex<Vec<ReceiveFilesAbandonedEvent>>,
    progress: Mutex<Vec<ReceiveFilesReceivingEvent>>,
}

impl ReceiveFilesSubscriber for Collector {
    fn get_id(&self) -> String {
        "collector".to_string()
    }

    fn notify_receiving(&self, event: ReceiveFilesReceivingEvent) {
        self.progress.lock().unwrap().push(event);
    }

    fn notify_received(&self, event: ReceiveFilesReceivedEvent) {
        self.received.lock().unwrap().push(event);
    }

    fn notify_abandoned(&self, event: ReceiveFilesAbandonedEvent) {
        self.abandoned.lock().unwrap().push(event);
    }
}

#[tokio::test]
async fn test_three_mib_scenario_reconstructs_file() {
    let (sender_end, receiver_end) = MemoryChannel::pair();
    let collector = Arc::new(Collector::default());
    let mut handler = ReceiveFilesHandler::new();
    handler.subscribe(collector.clone());

    let receiving = tokio::spawn(async move {
        let count = handler.receive_all(&receiver_end).await.unwrap();
        (count, handler)
    });
    let bubble = send_files(SendFilesRequest {
        files: vec![create_test_file("x.bin", 3 * 1024 * 1024)],
        config: SenderConfig::balanced(),
    })
    .unwrap();
    bubble.send_all(&sender_end).await.unwrap();
    sender_end.close();

    let (count, handler) = receiving.await.unwrap();
    assert_eq!(count, 1);
    assert_eq!(handler.received_files(), 1);
    let received = collector.received.lock().unwrap();
    assert_eq!(received[0].name, "x.bin");
    assert_eq!(received[0].data.len(), 3 * 1024 * 1024);
    assert_eq!(received[0].data.to_vec()[1000], (1000 % 251) as u8);
    assert_eq!(received[0].data.chunks().count(), 3);
    let progress: Vec<u64> = collector
        .progress
        .lock()
        .unwrap()
        .iter()
        .map(|e| e.received)
        .collect();
    assert_eq!(
        progress,
        vec![0, 1024 * 1024, 2 * 1024 * 1024, 3 * 1024 * 1024]
    );
}

#[tokio::test]
async fn test_multiple_files_arrive_in_order() {
    let (sender_end, receiver_end) = MemoryChannel::pair();
    let bubble = send_files(SendFilesRequest {
        files: vec![
            create_test_file("one", 100),
            create_test_file("two", 0),
            create_test_file("three", 70_000),
        ],
        config: SenderConfig::low_bandwidth(),
    })
    .unwrap();
    bubble.send_all(&sender_end).await.unwrap();
    drop(sender_end);

    let mut handler = ReceiveFilesHandler::new();
    let mut names = Vec::new();
    while let Some(file) = handler.receive_next(&receiver_end).await.unwrap() {
        names.push((file.name, file.data.len()));
    }

    assert_eq!(
        names,
        vec![
            ("one".to_string(), 100),
            ("two".to_string(), 0),
            ("three".to_string(), 70_000),
        ]
    );
}

#[tokio::test]
async fn test_channel_loss_mid_file_is_reported() {
    let (sender_end, receiver_end) = MemoryChannel::pair();
    let collector = Arc::new(Collector::default());
    let mut handler = ReceiveFilesHandler::new();
    handler.subscribe(collector.clone());

    sender_end
        .send(
            ControlFrame::Meta(FileMeta {
                name: "cut.bin".to_string(),
                size: 10,
                mime_type: None,
            })
            .to_frame()
            .unwrap(),
        )
        .unwrap();
    sender_end.send(Frame::Binary(vec![0; 4])).unwrap();
    drop(sender_end);

    let err = handler.receive_all(&receiver_end).await.unwrap_err();

    assert!(is_channel_closed(&err));
    assert_eq!(
        *collector.abandoned.lock().unwrap(),
        vec![ReceiveFilesAbandonedEvent {
            name: "cut.bin".to_string(),
            received: 4,
            total: 10,
            reason: AbandonReason::ChannelClosed,
        }]
    );
    assert!(collector.received.lock().unwrap().is_empty());
}
