//! The packet buffer shared by the ingest loop and the rollover check.
//!
//! One exclusive lock guards the bytes. A rollover copies the current content
//! out under the lock ([`PacketBuffer::snapshot`]), writes the artifact with
//! the lock released, and then drops exactly the copied prefix
//! ([`PacketBuffer::reset`]). Datagrams that arrive while the artifact is
//! being written stay in the buffer and open the next period.

use bytes::{Buf, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use vidcat_core::{Clock, SystemClock};

/// Read-only view of the buffer used by rollover conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    /// Bytes accumulated in the current period.
    pub size: usize,
    /// Number of writes in the current period.
    pub writes: u64,
    /// When the current period started.
    pub period_start: DateTime<Utc>,
    /// Time since the current period started.
    pub elapsed: Duration,
    /// Zero-based period counter, bumped by every reset.
    pub period: u64,
}

/// Bytes copied out of the buffer for one segment.
#[derive(Debug, Clone)]
pub struct SegmentData {
    pub bytes: Bytes,
    pub writes: u64,
    pub period: u64,
    pub period_start: DateTime<Utc>,
    /// When the snapshot was taken.
    pub period_end: DateTime<Utc>,
}

impl SegmentData {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

struct Inner {
    data: BytesMut,
    writes: u64,
    period: u64,
    period_start: DateTime<Utc>,
}

/// Append-only byte accumulator with an exclusive reset.
pub struct PacketBuffer {
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl PacketBuffer {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let period_start = clock.now();
        Self {
            clock,
            inner: Mutex::new(Inner {
                data: BytesMut::new(),
                writes: 0,
                period: 0,
                period_start,
            }),
        }
    }

    /// Append bytes to the tail of the current period.
    pub fn write(&self, bytes: &[u8]) {
        let mut inner = self.inner.lock();
        inner.data.extend_from_slice(bytes);
        inner.writes += 1;
    }

    pub fn size(&self) -> usize {
        self.inner.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn write_count(&self) -> u64 {
        self.inner.lock().writes
    }

    pub fn elapsed_since_reset(&self) -> Duration {
        let start = self.inner.lock().period_start;
        self.elapsed_from(start)
    }

    pub fn stats(&self) -> BufferStats {
        let inner = self.inner.lock();
        BufferStats {
            size: inner.data.len(),
            writes: inner.writes,
            period_start: inner.period_start,
            elapsed: self.elapsed_from(inner.period_start),
            period: inner.period,
        }
    }

    /// Copy the current period's content without removing it.
    pub fn snapshot(&self) -> SegmentData {
        let inner = self.inner.lock();
        SegmentData {
            bytes: Bytes::copy_from_slice(&inner.data),
            writes: inner.writes,
            period: inner.period,
            period_start: inner.period_start,
            period_end: self.clock.now(),
        }
    }

    /// Drop the bytes captured by `segment` and start a new period.
    ///
    /// Anything written after the snapshot was taken is kept and becomes the
    /// head of the new period. Returns `false` (and changes nothing) when the
    /// snapshot belongs to an earlier period.
    pub fn reset(&self, segment: &SegmentData) -> bool {
        let mut inner = self.inner.lock();
        if inner.period != segment.period {
            tracing::warn!(
                snapshot_period = segment.period,
                current_period = inner.period,
                "Ignoring reset with a stale snapshot"
            );
            return false;
        }

        let consumed = segment.bytes.len().min(inner.data.len());
        inner.data.advance(consumed);
        inner.writes = inner.writes.saturating_sub(segment.writes);
        inner.period += 1;
        inner.period_start = self.clock.now();
        true
    }

    fn elapsed_from(&self, start: DateTime<Utc>) -> Duration {
        (self.clock.now() - start).to_std().unwrap_or(Duration::ZERO)
    }
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PacketBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketBuffer")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
