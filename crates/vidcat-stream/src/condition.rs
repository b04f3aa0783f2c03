//! Rollover conditions: when to close the current segment.
//!
//! A condition only sees [`BufferStats`], never the bytes. The built-in
//! conditions cover elapsed time, byte count, and write count, and combine
//! with [`AnyOf`] / [`AllOf`]. Plain closures work too.

use std::time::Duration;

use vidcat_core::config::RolloverConfig;

use crate::buffer::BufferStats;

/// Decides whether the buffer is ready to become a segment.
pub trait RolloverCondition: Send + Sync {
    fn is_rollover_ready(&self, stats: &BufferStats) -> bool;
}

impl<F> RolloverCondition for F
where
    F: Fn(&BufferStats) -> bool + Send + Sync,
{
    fn is_rollover_ready(&self, stats: &BufferStats) -> bool {
        self(stats)
    }
}

/// Ready once the period has lasted at least `threshold`.
#[derive(Debug, Clone, Copy)]
pub struct ElapsedTime {
    pub threshold: Duration,
}

impl RolloverCondition for ElapsedTime {
    fn is_rollover_ready(&self, stats: &BufferStats) -> bool {
        stats.elapsed >= self.threshold
    }
}

/// Ready once at least `threshold` bytes are buffered.
#[derive(Debug, Clone, Copy)]
pub struct ByteCount {
    pub threshold: u64,
}

impl ByteCount {
    pub fn megabytes(mb: u64) -> Self {
        Self {
            threshold: mb.saturating_mul(1024 * 1024),
        }
    }
}

impl RolloverCondition for ByteCount {
    fn is_rollover_ready(&self, stats: &BufferStats) -> bool {
        stats.size as u64 >= self.threshold
    }
}

/// Ready once at least `threshold` writes happened in the period.
#[derive(Debug, Clone, Copy)]
pub struct WriteCount {
    pub threshold: u64,
}

impl RolloverCondition for WriteCount {
    fn is_rollover_ready(&self, stats: &BufferStats) -> bool {
        stats.writes >= self.threshold
    }
}

/// Ready when any inner condition is ready. Empty means never.
#[derive(Default)]
pub struct AnyOf(pub Vec<Box<dyn RolloverCondition>>);

impl RolloverCondition for AnyOf {
    fn is_rollover_ready(&self, stats: &BufferStats) -> bool {
        self.0.iter().any(|c| c.is_rollover_ready(stats))
    }
}

/// Ready when every inner condition is ready. Empty means never.
#[derive(Default)]
pub struct AllOf(pub Vec<Box<dyn RolloverCondition>>);

impl RolloverCondition for AllOf {
    fn is_rollover_ready(&self, stats: &BufferStats) -> bool {
        !self.0.is_empty() && self.0.iter().all(|c| c.is_rollover_ready(stats))
    }
}

/// Build the configured condition: the enabled thresholds combined with OR.
pub fn from_config(config: &RolloverConfig) -> Box<dyn RolloverCondition> {
    let mut conditions: Vec<Box<dyn RolloverCondition>> = Vec::new();
    if let Some(threshold) = config.elapsed() {
        conditions.push(Box::new(ElapsedTime { threshold }));
    }
    if let Some(threshold) = config.byte_threshold() {
        conditions.push(Box::new(ByteCount { threshold }));
    }
    Box::new(AnyOf(conditions))
}
