//! # vidcat-stream
//!
//! Segments a live transport stream and catalogs each segment.
//!
//! Datagrams land in a [`PacketBuffer`]. A [`RolloverEngine`] checks a
//! [`RolloverCondition`] on every tick; when it holds, a [`RolloverAction`]
//! writes the buffered bytes as a segment file, a child record is created for
//! it, and the parent (whole-stream) record is updated. Lifecycle plugins
//! observe each period without being able to stall it.
//!
//! [`StreamMonitor`] runs the receive loop and the ticker for one stream.

pub mod action;
pub mod buffer;
pub mod condition;
pub mod context;
pub mod engine;
pub mod filename;
pub mod footprint;
pub mod ingest;
pub mod monitor;
pub mod plugin;
pub mod updater;

pub use action::{FileRolloverAction, RolloverAction};
pub use buffer::{BufferStats, PacketBuffer, SegmentData};
pub use condition::{AllOf, AnyOf, ByteCount, ElapsedTime, RolloverCondition, WriteCount};
pub use context::{SegmentArtifact, StreamContext, StreamInfo};
pub use engine::{EngineState, RolloverEngine, RolloverOutcome, SegmentSummary};
pub use filename::{FilenameGenerator, TemplateFilenameGenerator};
pub use footprint::{FootprintSource, StaticFootprint};
pub use ingest::StreamIngestor;
pub use monitor::StreamMonitor;
pub use plugin::{StreamCreationPlugin, StreamEndPlugin, StreamShutdownPlugin};
pub use updater::{
    DerivedAssociationUpdater, LocationUpdater, RecordUpdater, TemporalEndUpdater,
    TemporalStartUpdater, UpdaterList,
};
