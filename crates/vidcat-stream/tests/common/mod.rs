//! Shared harness for engine integration tests.
//!
//! Builds a [`RolloverEngine`] over a manual clock, a memory record store
//! that can be told to fail, an action that can be told to fail, and plugins
//! that log every call.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vidcat_core::{
    attributes, Error, ManualClock, MemoryRecordStore, Record, RecordId, RecordStore, Result,
};
use vidcat_stream::{
    ByteCount, FileRolloverAction, FootprintSource, PacketBuffer, RolloverAction,
    RolloverCondition, RolloverEngine, SegmentArtifact, SegmentData, StreamContext, StreamInfo,
    TemplateFilenameGenerator,
};

pub const STREAM_URI: &str = "udp://127.0.0.1:50000";

/// How the test plugins behave after logging the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginMode {
    Ok,
    Error,
    Panic,
}

/// Ordered log of plugin calls, e.g. `created:0`, `ended:0`, `shutdown`.
#[derive(Debug, Clone, Default)]
pub struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    fn push(&self, event: String) {
        self.0.lock().push(event);
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

/// File action that fails while `failures` is positive.
pub struct FlakyAction {
    inner: FileRolloverAction,
    failures: AtomicUsize,
}

impl FlakyAction {
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl RolloverAction for FlakyAction {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn finalize(&self, segment: &SegmentData, ctx: &StreamContext) -> Result<SegmentArtifact> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Io {
                source: std::io::Error::other("disk unavailable"),
            });
        }
        self.inner.finalize(segment, ctx).await
    }

    async fn discard(&self, artifact: &SegmentArtifact) -> Result<()> {
        self.inner.discard(artifact).await
    }
}

/// Memory store that can reject child creates and parent writes.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryRecordStore,
    child_failures: AtomicUsize,
    parent_failures: AtomicUsize,
}

impl FlakyStore {
    pub fn fail_child_creates(&self, n: usize) {
        self.child_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_parent_writes(&self, n: usize) {
        self.parent_failures.store(n, Ordering::SeqCst);
    }

    fn should_fail(&self, record: &Record) -> bool {
        let is_parent = record.text(attributes::RESOURCE_URI) == Some(STREAM_URI);
        let counter = if is_parent {
            &self.parent_failures
        } else {
            &self.child_failures
        };
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn create(&self, record: &Record) -> Result<()> {
        if self.should_fail(record) {
            return Err(Error::store("catalog unavailable"));
        }
        self.inner.create(record).await
    }

    async fn update(&self, record: &Record) -> Result<()> {
        if self.should_fail(record) {
            return Err(Error::store("catalog unavailable"));
        }
        self.inner.update(record).await
    }

    async fn get(&self, id: RecordId) -> Result<Option<Record>> {
        self.inner.get(id).await
    }
}

pub struct Harness {
    pub engine: Arc<RolloverEngine>,
    pub buffer: Arc<PacketBuffer>,
    pub clock: ManualClock,
    pub store: Arc<FlakyStore>,
    pub action: Arc<FlakyAction>,
    pub events: Events,
    pub dir: tempfile::TempDir,
}

impl Harness {
    /// Rolls over once 8 bytes are buffered.
    pub fn new() -> Self {
        Self::build(Box::new(ByteCount { threshold: 8 }), None, PluginMode::Ok)
    }

    pub fn with_condition(condition: Box<dyn RolloverCondition>) -> Self {
        Self::build(condition, None, PluginMode::Ok)
    }

    pub fn with_plugin_mode(mode: PluginMode) -> Self {
        Self::build(Box::new(ByteCount { threshold: 8 }), None, mode)
    }

    pub fn with_footprint(source: Arc<dyn FootprintSource>) -> Self {
        Self::build(Box::new(ByteCount { threshold: 8 }), Some(source), PluginMode::Ok)
    }

    fn build(
        condition: Box<dyn RolloverCondition>,
        footprint: Option<Arc<dyn FootprintSource>>,
        mode: PluginMode,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::default();
        let buffer = Arc::new(PacketBuffer::with_clock(Arc::new(clock.clone())));
        let store = Arc::new(FlakyStore::default());
        let action = Arc::new(FlakyAction {
            inner: FileRolloverAction::new(
                dir.path().join("segments"),
                "seg-%{count}",
                Arc::new(TemplateFilenameGenerator::new()),
            ),
            failures: AtomicUsize::new(0),
        });
        let events = Events::default();

        let mut engine = RolloverEngine::new(
            StreamInfo::new(STREAM_URI, "harbor"),
            Arc::clone(&buffer),
            condition,
            Arc::clone(&action) as Arc<dyn RolloverAction>,
            Arc::clone(&store) as Arc<dyn RecordStore>,
        )
        .with_clock(Arc::new(clock.clone()))
        .with_creation_plugin(plugin(events.clone(), "created", mode))
        .with_end_plugin(plugin(events.clone(), "ended", mode))
        .with_shutdown_plugin(plugin(events.clone(), "shutdown", mode));
        if let Some(source) = footprint {
            engine = engine.with_footprint_source(source);
        }

        Self {
            engine: Arc::new(engine),
            buffer,
            clock,
            store,
            action,
            events,
            dir,
        }
    }

    pub fn segment_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path().join("segments"))
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

fn plugin(
    events: Events,
    label: &'static str,
    mode: PluginMode,
) -> impl Fn(&StreamContext) -> Result<()> + Send + Sync + 'static {
    move |ctx: &StreamContext| {
        if label == "shutdown" {
            events.push(label.to_string());
        } else {
            events.push(format!("{label}:{}", ctx.period));
        }
        match mode {
            PluginMode::Ok => Ok(()),
            PluginMode::Error => Err(Error::plugin(label, "plugin refused")),
            PluginMode::Panic => panic!("{label} plugin bug"),
        }
    }
}
