//! Integration tests for the rollover engine lifecycle.

mod common;

use assert_matches::assert_matches;
use std::sync::Arc;
use std::time::Duration;

use common::{Harness, PluginMode, STREAM_URI};
use vidcat_core::{attributes, Error, RecordStore};
use vidcat_geo::{wkt_io, Geometry};
use vidcat_stream::{
    BufferStats, ElapsedTime, EngineState, RolloverOutcome, SegmentData, StaticFootprint,
};

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn init_starts_first_period() {
    let h = Harness::new();
    assert_eq!(h.engine.state(), EngineState::Created);

    h.engine.init().await.unwrap();
    h.engine.init().await.unwrap();

    assert_eq!(h.engine.state(), EngineState::Active);
    assert_eq!(h.events.all(), vec!["created:0"]);
}

#[tokio::test]
async fn not_ready_is_a_no_op() {
    let h = Harness::new();
    h.engine.init().await.unwrap();
    h.engine.ingest(b"abc");

    let outcome = h.engine.check_for_rollover().await.unwrap();

    assert_eq!(outcome, RolloverOutcome::NotReady);
    assert_eq!(h.events.count("ended"), 0);
    assert_eq!(h.buffer.size(), 3);
    assert!(h.segment_files().is_empty());
    assert!(h.store.inner.is_empty());
}

#[tokio::test]
async fn ready_buffer_rolls_over_once() {
    let h = Harness::new();
    h.engine.init().await.unwrap();
    h.engine.ingest(b"\x47\x00\x11\x10");
    h.engine.ingest(b"\x47\x00\x11\x11");

    let outcome = h.engine.check_for_rollover().await.unwrap();
    let summary = assert_matches!(outcome, RolloverOutcome::Committed(s) => s);
    assert_eq!(summary.period, 0);
    assert_eq!(summary.bytes, 8);
    assert_eq!(h.buffer.size(), 0);
    assert_eq!(h.events.all(), vec!["created:0", "ended:0", "created:1"]);
    assert_eq!(h.segment_files(), vec!["seg-1.ts"]);

    let again = h.engine.check_for_rollover().await.unwrap();
    assert_eq!(again, RolloverOutcome::NotReady);
    assert_eq!(h.events.count("ended"), 1);
    assert_eq!(h.segment_files().len(), 1);
}

#[tokio::test]
async fn empty_buffer_is_never_ready() {
    let h = Harness::with_condition(Box::new(|_: &BufferStats| true));
    h.engine.init().await.unwrap();

    assert_eq!(
        h.engine.check_for_rollover().await.unwrap(),
        RolloverOutcome::NotReady
    );
    assert_eq!(h.engine.flush().await.unwrap(), RolloverOutcome::NotReady);
}

#[tokio::test]
async fn elapsed_time_fires_without_new_data() {
    let h = Harness::with_condition(Box::new(ElapsedTime {
        threshold: Duration::from_secs(60),
    }));
    h.engine.init().await.unwrap();
    h.engine.ingest(b"x");

    h.clock.advance(Duration::from_secs(59));
    assert_eq!(
        h.engine.check_for_rollover().await.unwrap(),
        RolloverOutcome::NotReady
    );

    h.clock.advance(Duration::from_secs(1));
    assert_matches!(
        h.engine.check_for_rollover().await.unwrap(),
        RolloverOutcome::Committed(_)
    );
}

#[tokio::test]
async fn flush_ignores_condition() {
    let h = Harness::new();
    h.engine.init().await.unwrap();
    h.engine.ingest(b"abc");

    assert_matches!(h.engine.flush().await.unwrap(), RolloverOutcome::Committed(_));
    assert_eq!(h.segment_files(), vec!["seg-1.ts"]);
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[tokio::test]
async fn child_and_parent_records() {
    let h = Harness::new();
    h.engine.init().await.unwrap();
    h.engine.ingest(b"01234567");
    h.clock.advance(Duration::from_secs(10));

    let summary = assert_matches!(
        h.engine.check_for_rollover().await.unwrap(),
        RolloverOutcome::Committed(s) => s
    );

    let child = h.store.get(summary.child_id).await.unwrap().unwrap();
    assert_eq!(child.text(attributes::TITLE), Some("seg-1"));
    assert_eq!(
        child.text(attributes::RESOURCE_URI),
        Some(summary.artifact.uri().as_str())
    );
    assert_eq!(
        child.attribute(attributes::RESOURCE_SIZE).unwrap()[0].as_integer(),
        Some(8)
    );
    assert_eq!(
        child.text(attributes::MEDIA_TYPE),
        Some(attributes::MPEG_TS_MEDIA_TYPE)
    );
    let start = child.timestamp(attributes::TEMPORAL_START).unwrap();
    let end = child.timestamp(attributes::TEMPORAL_END).unwrap();
    assert_eq!((end - start).num_seconds(), 10);
    assert!(child.attribute(attributes::LOCATION).is_none());

    let parent = h.store.get(summary.parent_id).await.unwrap().unwrap();
    assert_eq!(parent.text(attributes::TITLE), Some("harbor"));
    assert_eq!(parent.text(attributes::RESOURCE_URI), Some(STREAM_URI));
    assert_eq!(
        parent.texts(attributes::DERIVED),
        vec![summary.child_id.to_string()]
    );
    assert_eq!(parent.timestamp(attributes::TEMPORAL_START), Some(start));
    assert_eq!(parent.timestamp(attributes::TEMPORAL_END), Some(end));
}

#[tokio::test]
async fn parent_accumulates_children() {
    let h = Harness::new();
    h.engine.init().await.unwrap();

    let mut children = Vec::new();
    let mut parents = Vec::new();
    for _ in 0..3 {
        h.engine.ingest(b"01234567");
        let summary = assert_matches!(
            h.engine.check_for_rollover().await.unwrap(),
            RolloverOutcome::Committed(s) => s
        );
        children.push(summary.child_id.to_string());
        parents.push(summary.parent_id);
    }

    assert!(parents.iter().all(|id| *id == parents[0]));
    let parent = h.store.get(parents[0]).await.unwrap().unwrap();
    assert_eq!(parent.texts(attributes::DERIVED), children);
    assert_eq!(h.store.inner.len(), 4);
    assert_eq!(h.segment_files(), vec!["seg-1.ts", "seg-2.ts", "seg-3.ts"]);
}

#[tokio::test]
async fn footprints_become_child_location() {
    let frames = StaticFootprint::new(vec![
        wkt_io::parse("POLYGON ((0 0, 2 1, 4 0, 4 4, 0 4, 0 0))").unwrap(),
        wkt_io::parse("POLYGON ((10 10, 11 10, 11 11, 10 11, 10 10))").unwrap(),
    ]);
    let h = Harness::with_footprint(Arc::new(frames));
    h.engine.init().await.unwrap();
    h.engine.ingest(b"01234567");

    let summary = assert_matches!(
        h.engine.check_for_rollover().await.unwrap(),
        RolloverOutcome::Committed(s) => s
    );

    let child = h.store.get(summary.child_id).await.unwrap().unwrap();
    let location = child.text(attributes::LOCATION).unwrap();
    assert!(location.starts_with("GEOMETRYCOLLECTION"));
    let members = wkt_io::leaves(wkt_io::parse(location).unwrap());
    assert_eq!(members.len(), 2);

    let parent = h.engine.parent().await.unwrap();
    assert!(parent.text(attributes::LOCATION).is_some());
}

#[tokio::test]
async fn empty_footprints_leave_location_unset() {
    let source = |_: &SegmentData| -> Vec<Geometry> { Vec::new() };
    let h = Harness::with_footprint(Arc::new(source));
    h.engine.init().await.unwrap();
    h.engine.ingest(b"01234567");

    let summary = assert_matches!(
        h.engine.check_for_rollover().await.unwrap(),
        RolloverOutcome::Committed(s) => s
    );
    let child = h.store.get(summary.child_id).await.unwrap().unwrap();
    assert!(child.attribute(attributes::LOCATION).is_none());
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn action_failure_keeps_buffer_and_retries() {
    let h = Harness::new();
    h.engine.init().await.unwrap();
    h.engine.ingest(b"01234567");
    h.action.fail_next(1);

    let outcome = h.engine.check_for_rollover().await.unwrap();
    assert_matches!(outcome, RolloverOutcome::Deferred { .. });
    assert_eq!(h.buffer.size(), 8);
    assert_eq!(h.events.count("ended"), 0);
    assert_eq!(h.engine.state(), EngineState::Active);

    h.engine.ingest(b"89");
    let summary = assert_matches!(
        h.engine.check_for_rollover().await.unwrap(),
        RolloverOutcome::Committed(s) => s
    );
    assert_eq!(summary.bytes, 10);
    assert_eq!(h.buffer.size(), 0);
}

#[tokio::test]
async fn child_create_failure_keeps_buffer() {
    let h = Harness::new();
    h.engine.init().await.unwrap();
    h.engine.ingest(b"01234567");
    h.store.fail_child_creates(1);

    let err = h.engine.check_for_rollover().await.unwrap_err();
    assert_matches!(err, Error::Store { .. });
    assert!(err.is_retryable());
    assert_eq!(h.buffer.size(), 8);
    assert_eq!(h.events.count("ended"), 0);
    assert!(h.segment_files().is_empty());

    let summary = match h.engine.check_for_rollover().await.unwrap() {
        RolloverOutcome::Committed(summary) => summary,
        other => panic!("expected a committed segment, got {other:?}"),
    };
    assert_eq!(h.buffer.size(), 0);

    let files = h.segment_files();
    assert_eq!(files.len(), 1);
    assert_eq!(
        summary.artifact.path.file_name().unwrap().to_string_lossy(),
        files[0]
    );
    assert_eq!(std::fs::read(&summary.artifact.path).unwrap(), b"01234567");
}

#[tokio::test]
async fn parent_failure_commits_segment_and_retries_parent() {
    let h = Harness::new();
    h.engine.init().await.unwrap();
    h.engine.ingest(b"01234567");
    h.store.fail_parent_writes(1);

    let err = h.engine.check_for_rollover().await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(h.buffer.size(), 0);
    assert_eq!(h.events.count("ended"), 1);
    assert!(h.engine.parent_is_dirty().await);
    assert_eq!(h.store.inner.len(), 1);

    assert_eq!(
        h.engine.check_for_rollover().await.unwrap(),
        RolloverOutcome::NotReady
    );
    assert!(!h.engine.parent_is_dirty().await);
    assert_eq!(h.store.inner.len(), 2);
}

#[tokio::test]
async fn plugin_errors_do_not_stop_rollover() {
    for mode in [PluginMode::Error, PluginMode::Panic] {
        let h = Harness::with_plugin_mode(mode);
        h.engine.init().await.unwrap();
        h.engine.ingest(b"01234567");

        assert_matches!(
            h.engine.check_for_rollover().await.unwrap(),
            RolloverOutcome::Committed(_)
        );
        assert_eq!(h.events.all(), vec!["created:0", "ended:0", "created:1"]);
        assert_eq!(h.buffer.size(), 0);

        h.engine.shutdown().await;
        assert_eq!(h.engine.state(), EngineState::Terminated);
        assert_eq!(h.events.count("shutdown"), 1);
    }
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_is_idempotent_and_terminal() {
    let h = Harness::new();
    h.engine.init().await.unwrap();

    h.engine.shutdown().await;
    h.engine.shutdown().await;

    assert_eq!(h.events.count("shutdown"), 1);
    assert_eq!(h.engine.state(), EngineState::Terminated);
    assert!(!h.engine.ingest(b"01234567"));
    assert_eq!(
        h.engine.check_for_rollover().await.unwrap(),
        RolloverOutcome::Terminated
    );
    assert!(h.engine.init().await.is_err());
}

#[tokio::test]
async fn shutdown_without_init_still_notifies() {
    let h = Harness::new();
    h.engine.shutdown().await;
    assert_eq!(h.events.all(), vec!["shutdown"]);
}

#[tokio::test]
async fn shutdown_waits_for_running_check() {
    let h = Harness::new();
    h.engine.init().await.unwrap();
    h.engine.ingest(b"01234567");

    let engine = Arc::clone(&h.engine);
    let check = tokio::spawn(async move { engine.check_for_rollover().await });
    h.engine.shutdown().await;
    let outcome = check.await.unwrap().unwrap();

    let events = h.events.all();
    assert_eq!(events.last().map(String::as_str), Some("shutdown"));
    match outcome {
        RolloverOutcome::Committed(_) => assert_eq!(h.events.count("ended"), 1),
        RolloverOutcome::Terminated => assert_eq!(h.events.count("ended"), 0),
        other => panic!("unexpected outcome {other:?}"),
    }
}
