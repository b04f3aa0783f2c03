//! UDP ingest and monitor tests over loopback sockets.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use common::Harness;
use vidcat_core::config::Config;
use vidcat_stream::{EngineState, StreamIngestor, StreamMonitor};

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

/// Poll until `check` holds or two seconds pass.
async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test]
async fn datagrams_are_appended_to_buffer() {
    let h = Harness::new();
    h.engine.init().await.unwrap();
    let ingestor = StreamIngestor::bind(loopback(), Arc::clone(&h.engine), 1500)
        .await
        .unwrap();
    let addr = ingestor.local_addr().unwrap();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(ingestor.run(cancel.clone()));

    let sender = UdpSocket::bind(loopback()).await.unwrap();
    sender.send_to(&[0x47; 188], addr).await.unwrap();
    sender.send_to(&[0x47; 188], addr).await.unwrap();

    assert!(wait_for(|| h.buffer.size() == 376).await);
    assert_eq!(h.buffer.write_count(), 2);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn zero_datagram_size_is_rejected() {
    let h = Harness::new();
    let err = StreamIngestor::bind(loopback(), Arc::clone(&h.engine), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, vidcat_core::Error::InvalidArgument(_)));
}

#[tokio::test]
async fn monitor_segments_and_flushes_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.stream.uri = "udp://127.0.0.1:0".into();
    config.rollover.elapsed_secs = None;
    config.rollover.megabytes = Some(1);
    config.rollover.check_interval_ms = 20;
    config.output.segment_dir = dir.path().join("segments");
    config.output.filename_template = "test-%{count}".into();
    config.store.record_dir = dir.path().join("records");

    let monitor = StreamMonitor::from_config(&config).await.unwrap();
    let engine = Arc::clone(monitor.engine());
    assert_eq!(engine.state(), EngineState::Active);

    let sender = UdpSocket::bind(loopback()).await.unwrap();
    sender
        .send_to(&[0x47; 188], monitor.local_addr())
        .await
        .unwrap();
    assert!(wait_for(|| engine.buffer().size() == 188).await);

    monitor.shutdown().await;

    assert_eq!(engine.state(), EngineState::Terminated);
    let segment = std::fs::read(dir.path().join("segments").join("test-1.ts")).unwrap();
    assert_eq!(segment.len(), 188);
    let records = std::fs::read_dir(dir.path().join("records")).unwrap().count();
    assert_eq!(records, 2);
}
