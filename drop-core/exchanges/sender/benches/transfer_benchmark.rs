use criterion::{
    BenchmarkId, Criterion, Throughput, black_box, criterion_group,
    criterion_main,
};
use rand::RngCore;
use roomdropx_common::{DirectChannel, MemoryChannel};
use roomdropx_sender::{
    SendFilesRequest, SenderConfig, SenderFile, SenderFileData, send_files,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

const BENCHMARK_TIME_LIMIT: Duration = Duration::from_secs(10);

struct BenchmarkSenderFileData {
    data: Arc<Vec<u8>>,
    position: Mutex<usize>,
}

impl SenderFileData for BenchmarkSenderFileData {
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

fn generate_test_data(size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size];
    rand::rng().fill_bytes(&mut data);
    data
}

/// Full send loop over an in-memory channel with a draining peer.
fn bench_send_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("send_all");
    group.measurement_time(BENCHMARK_TIME_LIMIT);
    group.sample_size(20);

    let file_sizes = vec![
        ("1MB", 1024 * 1024),
        ("16MB", 16 * 1024 * 1024),
    ];
    let configs = vec![
        ("low_bandwidth", SenderConfig::low_bandwidth()),
        ("balanced", SenderConfig::balanced()),
        ("high_performance", SenderConfig::high_performance()),
    ];
    let rt = tokio::runtime::Runtime::new().unwrap();

    for (size_name, size) in file_sizes {
        let data = Arc::new(generate_test_data(size));
        group.throughput(Throughput::Bytes(size as u64));

        for (config_name, config) in &configs {
            group.bench_with_input(
                BenchmarkId::new(*config_name, size_name),
                config,
                |b, config| {
                    b.to_async(&rt).iter(|| async {
                        let (channel, peer) = MemoryChannel::pair();
                        let reader = tokio::spawn(async move {
                            let mut received = 0usize;
                            while let Some(frame) = peer.recv().await {
                                received += frame.len();
                            }
                            received
                        });
                        let bubble = send_files(SendFilesRequest {
                            files: vec![SenderFile {
                                name: "bench.dat".to_string(),
                                mime_type: None,
                                data: Arc::new(BenchmarkSenderFileData {
                                    data: data.clone(),
                                    position: Mutex::new(0),
                                }),
                            }],
                            config: config.clone(),
                        })
                        .unwrap();

                        bubble.send_all(&channel).await.unwrap();
                        drop(channel);
                        black_box(reader.await.unwrap());
                    });
                },
            );
        }
    }

    group.finish();
}

/// Raw slicing cost of the byte source at different chunk sizes.
fn bench_data_reading(c: &mut Criterion) {
    let mut group = c.benchmark_group("data_reading");
    group.measurement_time(BENCHMARK_TIME_LIMIT);

    let data = Arc::new(generate_test_data(4 * 1024 * 1024));
    let chunk_sizes = vec![
        ("64KB", 64 * 1024u64),
        ("1MB", 1024 * 1024),
        ("4MB", 4 * 1024 * 1024),
    ];
    group.throughput(Throughput::Bytes(data.len() as u64));

    for (name, chunk_size) in chunk_sizes {
        group.bench_with_input(
            BenchmarkId::from_parameter(name),
            &chunk_size,
            |b, chunk_size| {
                b.iter(|| {
                    let source = BenchmarkSenderFileData {
                        data: data.clone(),
                        position: Mutex::new(0),
                    };
                    let mut total = 0;
                    loop {
                        let chunk = source.read_chunk(black_box(*chunk_size));
                        if chunk.is_empty() {
                            break;
                        }
                        total += chunk.len();
                    }
                    assert_eq!(total, data.len());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_send_all, bench_data_reading);
criterion_main!(benches);
