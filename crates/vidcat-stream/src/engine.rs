//! The rollover engine: decides when the buffer becomes a segment and
//! catalogs it.
//!
//! One rollover runs as:
//!
//! 1. snapshot the buffer (under its lock)
//! 2. [`RolloverAction::finalize`] the snapshot (lock released)
//! 3. create the child record
//! 4. fold the child into the parent with the record updaters and persist it
//! 5. [`StreamEndPlugin`](crate::plugin::StreamEndPlugin) for the finished segment
//! 6. drop the snapshotted prefix from the buffer
//! 7. [`StreamCreationPlugin`](crate::plugin::StreamCreationPlugin) for the new period
//!
//! A failed action or child creation stops before step 6, so the same bytes
//! are offered again on the next check. A segment whose child record could
//! not be created is discarded first. Check cycles and shutdown are
//! serialized by one async mutex.

use geo::GeometryCollection;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use vidcat_core::{
    attributes, Clock, Error, Record, RecordId, RecordStore, Result, SystemClock,
};
use vidcat_geo::{Geometry, GeometryCollectionBuilder, GeometryOperator, OperatorChain};

use crate::action::RolloverAction;
use crate::buffer::{PacketBuffer, SegmentData};
use crate::condition::RolloverCondition;
use crate::context::{SegmentArtifact, StreamContext, StreamInfo};
use crate::footprint::FootprintSource;
use crate::plugin::{Plugins, StreamCreationPlugin, StreamEndPlugin, StreamShutdownPlugin};
use crate::updater::{RecordUpdater, UpdaterList};

/// Lifecycle state of a [`RolloverEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Built but not yet initialized.
    Created,
    /// Accepting data and checking for rollover.
    Active,
    /// A segment is being written and cataloged.
    Finalizing,
    /// Shut down. Absorbing.
    Terminated,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineState::Created => "created",
            EngineState::Active => "active",
            EngineState::Finalizing => "finalizing",
            EngineState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// What a committed rollover produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSummary {
    pub period: u64,
    pub bytes: usize,
    pub artifact: SegmentArtifact,
    pub child_id: RecordId,
    pub parent_id: RecordId,
}

/// Result of one [`RolloverEngine::check_for_rollover`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloverOutcome {
    /// The condition was not met, or the buffer is empty.
    NotReady,
    /// A segment was written, cataloged, and dropped from the buffer.
    Committed(SegmentSummary),
    /// The action failed. The buffer is untouched and the next check retries.
    Deferred { reason: String },
    /// The engine has been shut down.
    Terminated,
}

/// State owned by the check/shutdown cycle.
#[derive(Debug, Default)]
struct CycleState {
    parent: Option<Record>,
    /// The parent has been created in the store at least once.
    parent_stored: bool,
    /// The in-memory parent has changes the store has not accepted yet.
    parent_dirty: bool,
    shut_down: bool,
}

/// Drives rollover for one stream.
pub struct RolloverEngine {
    stream: StreamInfo,
    buffer: Arc<PacketBuffer>,
    condition: Box<dyn RolloverCondition>,
    action: Arc<dyn RolloverAction>,
    store: Arc<dyn RecordStore>,
    updater: Box<dyn RecordUpdater>,
    custom_updater: bool,
    operator: Arc<dyn GeometryOperator>,
    footprint: Option<Arc<dyn FootprintSource>>,
    clock: Arc<dyn Clock>,
    plugins: Plugins,
    state: Mutex<EngineState>,
    cycle: tokio::sync::Mutex<CycleState>,
}

impl RolloverEngine {
    pub fn new(
        stream: StreamInfo,
        buffer: Arc<PacketBuffer>,
        condition: Box<dyn RolloverCondition>,
        action: Arc<dyn RolloverAction>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        let operator: Arc<dyn GeometryOperator> = Arc::new(OperatorChain::footprint(None));
        Self {
            stream,
            buffer,
            condition,
            action,
            store,
            updater: Box::new(UpdaterList::parent_defaults(Arc::clone(&operator))),
            custom_updater: false,
            operator,
            footprint: None,
            clock: Arc::new(SystemClock),
            plugins: Plugins::default(),
            state: Mutex::new(EngineState::Created),
            cycle: tokio::sync::Mutex::new(CycleState::default()),
        }
    }

    /// Replace the parent updaters.
    pub fn with_updater(mut self, updater: impl RecordUpdater + 'static) -> Self {
        self.updater = Box::new(updater);
        self.custom_updater = true;
        self
    }

    /// Footprint post-processing for children, and for the parent unless a
    /// custom updater was set.
    pub fn with_operator(mut self, operator: Arc<dyn GeometryOperator>) -> Self {
        if !self.custom_updater {
            self.updater = Box::new(UpdaterList::parent_defaults(Arc::clone(&operator)));
        }
        self.operator = operator;
        self
    }

    pub fn with_footprint_source(mut self, source: Arc<dyn FootprintSource>) -> Self {
        self.footprint = Some(source);
        self
    }

    /// Clock used for record timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_creation_plugin(mut self, plugin: impl StreamCreationPlugin + 'static) -> Self {
        self.plugins.creation = Some(Arc::new(plugin));
        self
    }

    pub fn with_end_plugin(mut self, plugin: impl StreamEndPlugin + 'static) -> Self {
        self.plugins.end = Some(Arc::new(plugin));
        self
    }

    pub fn with_shutdown_plugin(mut self, plugin: impl StreamShutdownPlugin + 'static) -> Self {
        self.plugins.shutdown = Some(Arc::new(plugin));
        self
    }

    pub fn stream(&self) -> &StreamInfo {
        &self.stream
    }

    pub fn buffer(&self) -> &Arc<PacketBuffer> {
        &self.buffer
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    /// The current parent record, if a segment has been cataloged.
    pub async fn parent(&self) -> Option<Record> {
        self.cycle.lock().await.parent.clone()
    }

    /// Whether the parent has changes the store has not accepted.
    pub async fn parent_is_dirty(&self) -> bool {
        self.cycle.lock().await.parent_dirty
    }

    /// Start the first period.
    ///
    /// Calling it again while active does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rollover`] after shutdown.
    pub async fn init(&self) -> Result<()> {
        let cycle = self.cycle.lock().await;
        if cycle.shut_down {
            return Err(Error::rollover("init", "stream has been shut down"));
        }
        if self.state() != EngineState::Created {
            return Ok(());
        }

        self.set_state(EngineState::Active);
        let stats = self.buffer.stats();
        tracing::info!(stream = %self.stream.uri, title = %self.stream.title, "Stream started");
        self.plugins
            .on_create(&self.context(&cycle, stats.period, stats.period_start, None));
        Ok(())
    }

    /// Append received bytes to the buffer. Returns `false` after shutdown.
    pub fn ingest(&self, bytes: &[u8]) -> bool {
        if self.state() == EngineState::Terminated {
            tracing::debug!(bytes = bytes.len(), "Dropping data for a terminated stream");
            return false;
        }
        self.buffer.write(bytes);
        true
    }

    /// Evaluate the rollover condition and roll over when it holds.
    ///
    /// # Errors
    ///
    /// Record-store failures are returned as retryable [`Error::Store`]. If
    /// the child could not be created the buffer is kept; if only the
    /// parent could not be persisted the segment is committed and the parent
    /// is retried on the next check.
    pub async fn check_for_rollover(&self) -> Result<RolloverOutcome> {
        self.run_cycle(false).await
    }

    /// Roll over whatever is buffered, ignoring the condition.
    ///
    /// Used for the final segment at shutdown. An empty buffer is still a
    /// no-op.
    pub async fn flush(&self) -> Result<RolloverOutcome> {
        self.run_cycle(true).await
    }

    /// Stop the stream.
    ///
    /// Waits for an in-progress rollover, makes one last attempt to persist
    /// a dirty parent, and calls the shutdown plugin. Only the first call
    /// does anything.
    pub async fn shutdown(&self) {
        let mut cycle = self.cycle.lock().await;
        if cycle.shut_down {
            return;
        }
        cycle.shut_down = true;
        self.set_state(EngineState::Terminated);

        if cycle.parent_dirty {
            if let Err(e) = self.persist_parent(&mut cycle).await {
                tracing::error!(error = %e, "Parent record could not be persisted before shutdown");
            }
        }

        let stats = self.buffer.stats();
        if stats.size > 0 {
            tracing::warn!(bytes = stats.size, "Discarding unsegmented data at shutdown");
        }
        self.plugins
            .on_shutdown(&self.context(&cycle, stats.period, stats.period_start, None));
        tracing::info!(stream = %self.stream.uri, "Stream shut down");
    }

    async fn run_cycle(&self, force: bool) -> Result<RolloverOutcome> {
        let mut cycle = self.cycle.lock().await;
        if cycle.shut_down {
            return Ok(RolloverOutcome::Terminated);
        }

        if cycle.parent_dirty {
            match self.persist_parent(&mut cycle).await {
                Ok(()) => tracing::info!("Parent record persisted after earlier failure"),
                Err(e) => tracing::warn!(error = %e, "Parent record still not persisted"),
            }
        }

        let stats = self.buffer.stats();
        if stats.size == 0 || !(force || self.condition.is_rollover_ready(&stats)) {
            tracing::debug!(
                bytes = stats.size,
                writes = stats.writes,
                elapsed_ms = stats.elapsed.as_millis() as u64,
                "Rollover not ready"
            );
            return Ok(RolloverOutcome::NotReady);
        }

        self.set_state(EngineState::Finalizing);
        let result = self.roll_over(&mut cycle).await;
        self.set_state(EngineState::Active);
        result
    }

    async fn roll_over(&self, cycle: &mut CycleState) -> Result<RolloverOutcome> {
        let segment = self.buffer.snapshot();
        let ctx = self.context(cycle, segment.period, segment.period_start, None);

        let artifact = match self.action.finalize(&segment, &ctx).await {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::warn!(
                    action = self.action.name(),
                    period = segment.period,
                    error = %e,
                    "Rollover action failed; keeping buffer for retry"
                );
                return Ok(RolloverOutcome::Deferred {
                    reason: e.to_string(),
                });
            }
        };

        let child = self.child_record(&segment, &artifact);
        if let Err(e) = self.store.create(&child).await {
            tracing::warn!(
                path = %artifact.path.display(),
                error = %e,
                "Segment record could not be created; keeping buffer for retry"
            );
            if let Err(discard) = self.action.discard(&artifact).await {
                tracing::warn!(
                    path = %artifact.path.display(),
                    error = %discard,
                    "Uncataloged segment could not be removed"
                );
            }
            return Err(into_store_error(e));
        }

        let mut parent = cycle.parent.take().unwrap_or_else(|| self.new_parent());
        let parent_id = parent.id();
        self.updater.update(&mut parent, &child);
        cycle.parent = Some(parent);
        cycle.parent_dirty = true;
        let persisted = self.persist_parent(cycle).await;
        if let Err(e) = &persisted {
            tracing::warn!(error = %e, "Parent record update failed; will retry");
        }

        let mut end_ctx = self.context(cycle, segment.period, segment.period_start, None);
        end_ctx.segment = Some(artifact.clone());
        self.plugins.stream_ended(&end_ctx);

        self.buffer.reset(&segment);

        let next = self.buffer.stats();
        self.plugins
            .on_create(&self.context(cycle, next.period, next.period_start, None));

        tracing::info!(
            period = segment.period,
            bytes = segment.len(),
            path = %artifact.path.display(),
            child = %child.id(),
            "Segment committed"
        );

        persisted.map(|()| {
            RolloverOutcome::Committed(SegmentSummary {
                period: segment.period,
                bytes: segment.len(),
                artifact,
                child_id: child.id(),
                parent_id,
            })
        })
    }

    async fn persist_parent(&self, cycle: &mut CycleState) -> Result<()> {
        let Some(parent) = cycle.parent.as_ref() else {
            cycle.parent_dirty = false;
            return Ok(());
        };

        let result = if cycle.parent_stored {
            self.store.update(parent).await
        } else {
            self.store.create(parent).await
        };

        match result {
            Ok(()) => {
                cycle.parent_stored = true;
                cycle.parent_dirty = false;
                Ok(())
            }
            Err(e) => {
                cycle.parent_dirty = true;
                Err(into_store_error(e))
            }
        }
    }

    fn new_parent(&self) -> Record {
        let mut parent = Record::new();
        parent.set(attributes::TITLE, self.stream.title.as_str());
        parent.set(attributes::RESOURCE_URI, self.stream.uri.as_str());
        parent.set(attributes::MEDIA_TYPE, attributes::MPEG_TS_MEDIA_TYPE);
        parent.set(attributes::CREATED, self.clock.now());
        parent
    }

    fn child_record(&self, segment: &SegmentData, artifact: &SegmentArtifact) -> Record {
        let mut child = Record::new();
        child.set(attributes::TITLE, artifact.title());
        child.set(attributes::RESOURCE_URI, artifact.uri());
        child.set(
            attributes::RESOURCE_SIZE,
            i64::try_from(artifact.size).unwrap_or(i64::MAX),
        );
        child.set(attributes::MEDIA_TYPE, attributes::MPEG_TS_MEDIA_TYPE);
        child.set(attributes::CREATED, self.clock.now());
        child.set(attributes::TEMPORAL_START, segment.period_start);
        child.set(attributes::TEMPORAL_END, segment.period_end);
        if let Some(location) = self.footprint_wkt(segment) {
            child.set(attributes::LOCATION, location);
        }
        child
    }

    fn footprint_wkt(&self, segment: &SegmentData) -> Option<String> {
        let source = self.footprint.as_ref()?;
        let frames = source.footprints(segment);
        if frames.is_empty() {
            return None;
        }

        let combined = Geometry::GeometryCollection(GeometryCollection::new_from(frames));
        let footprint = self.operator.apply(Some(combined))?;
        let mut builder = GeometryCollectionBuilder::new();
        builder.add_geometry(footprint);
        let rendered = builder.render();
        (!rendered.is_empty()).then_some(rendered)
    }

    fn context(
        &self,
        cycle: &CycleState,
        period: u64,
        period_start: chrono::DateTime<chrono::Utc>,
        segment: Option<SegmentArtifact>,
    ) -> StreamContext {
        StreamContext {
            stream: self.stream.clone(),
            parent_id: cycle.parent.as_ref().map(Record::id),
            period,
            period_start,
            segment,
        }
    }

    fn set_state(&self, next: EngineState) {
        let mut state = self.state.lock();
        let current = *state;
        if current != next && current != EngineState::Terminated {
            tracing::debug!(from = %current, to = %next, "Engine state change");
            *state = next;
        }
    }
}

impl fmt::Debug for RolloverEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RolloverEngine")
            .field("stream", &self.stream)
            .field("state", &self.state())
            .field("action", &self.action.name())
            .field("updater", &self.updater.name())
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}

fn into_store_error(e: Error) -> Error {
    match e {
        Error::Store { .. } => e,
        other => Error::store(other),
    }
}
