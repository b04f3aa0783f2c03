//! Lifecycle plugins.
//!
//! Each hook is a single-method trait, also implemented for closures. Hooks
//! are observers: [`invoke_isolated`] catches their errors and panics, logs
//! them, and lets the surrounding rollover or shutdown carry on.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use vidcat_core::Result;

use crate::context::StreamContext;

/// Called when a new period (segment) starts.
pub trait StreamCreationPlugin: Send + Sync {
    fn on_create(&self, ctx: &StreamContext) -> Result<()>;
}

/// Called when a segment has been finalized and cataloged.
pub trait StreamEndPlugin: Send + Sync {
    fn stream_ended(&self, ctx: &StreamContext) -> Result<()>;
}

/// Called once when the stream shuts down.
pub trait StreamShutdownPlugin: Send + Sync {
    fn on_shutdown(&self, ctx: &StreamContext) -> Result<()>;
}

impl<F> StreamCreationPlugin for F
where
    F: Fn(&StreamContext) -> Result<()> + Send + Sync,
{
    fn on_create(&self, ctx: &StreamContext) -> Result<()> {
        self(ctx)
    }
}

impl<F> StreamEndPlugin for F
where
    F: Fn(&StreamContext) -> Result<()> + Send + Sync,
{
    fn stream_ended(&self, ctx: &StreamContext) -> Result<()> {
        self(ctx)
    }
}

impl<F> StreamShutdownPlugin for F
where
    F: Fn(&StreamContext) -> Result<()> + Send + Sync,
{
    fn on_shutdown(&self, ctx: &StreamContext) -> Result<()> {
        self(ctx)
    }
}

/// The zero-or-one plugin per hook held by an engine.
#[derive(Clone, Default)]
pub struct Plugins {
    pub creation: Option<Arc<dyn StreamCreationPlugin>>,
    pub end: Option<Arc<dyn StreamEndPlugin>>,
    pub shutdown: Option<Arc<dyn StreamShutdownPlugin>>,
}

impl Plugins {
    pub fn on_create(&self, ctx: &StreamContext) {
        if let Some(plugin) = &self.creation {
            invoke_isolated("stream-creation", || plugin.on_create(ctx));
        }
    }

    pub fn stream_ended(&self, ctx: &StreamContext) {
        if let Some(plugin) = &self.end {
            invoke_isolated("stream-end", || plugin.stream_ended(ctx));
        }
    }

    pub fn on_shutdown(&self, ctx: &StreamContext) {
        if let Some(plugin) = &self.shutdown {
            invoke_isolated("stream-shutdown", || plugin.on_shutdown(ctx));
        }
    }
}

impl std::fmt::Debug for Plugins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugins")
            .field("creation", &self.creation.is_some())
            .field("end", &self.end.is_some())
            .field("shutdown", &self.shutdown.is_some())
            .finish()
    }
}

/// Run a hook, logging instead of propagating its failure.
///
/// Returns `true` when the hook completed without error.
pub fn invoke_isolated(hook: &str, call: impl FnOnce() -> Result<()>) -> bool {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::error!(hook, error = %e, "Plugin failed; continuing");
            false
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            tracing::error!(hook, panic = %message, "Plugin panicked; continuing");
            false
        }
    }
}
