//! Wires one stream together: the ingest loop, the rollover ticker, and the
//! engine they share.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use vidcat_core::config::Config;
use vidcat_core::{Error, JsonDirRecordStore, Result};
use vidcat_geo::OperatorChain;

use crate::action::FileRolloverAction;
use crate::buffer::PacketBuffer;
use crate::condition;
use crate::context::StreamInfo;
use crate::engine::{RolloverEngine, RolloverOutcome};
use crate::filename::TemplateFilenameGenerator;
use crate::ingest::StreamIngestor;

/// A running stream.
pub struct StreamMonitor {
    engine: Arc<RolloverEngine>,
    local_addr: SocketAddr,
    cancel: CancellationToken,
    ingest_handle: JoinHandle<()>,
    ticker_handle: JoinHandle<()>,
}

impl StreamMonitor {
    /// Initialize `engine`, bind the socket, and spawn both tasks.
    ///
    /// # Errors
    ///
    /// Fails on a zero check interval, or if the engine cannot be initialized
    /// or the socket cannot be bound.
    pub async fn start(
        engine: Arc<RolloverEngine>,
        addr: SocketAddr,
        max_datagram_size: usize,
        check_interval: Duration,
    ) -> Result<Self> {
        if check_interval.is_zero() {
            return Err(Error::invalid_argument("check interval must be positive"));
        }
        let ingestor = StreamIngestor::bind(addr, Arc::clone(&engine), max_datagram_size).await?;
        let local_addr = ingestor.local_addr()?;
        engine.init().await?;

        let cancel = CancellationToken::new();
        let ingest_handle = tokio::spawn(ingestor.run(cancel.clone()));
        let ticker_handle = tokio::spawn(run_ticker(
            Arc::clone(&engine),
            check_interval,
            cancel.clone(),
        ));

        Ok(Self {
            engine,
            local_addr,
            cancel,
            ingest_handle,
            ticker_handle,
        })
    }

    /// Build the whole stack from configuration and start it.
    ///
    /// Segments go to `output.segment_dir`, records to a JSON directory
    /// store at `store.record_dir`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.check()?;
        let addr = config.stream.socket_addr()?;
        let store = Arc::new(JsonDirRecordStore::open(&config.store.record_dir).await?);
        let action = Arc::new(FileRolloverAction::new(
            &config.output.segment_dir,
            &config.output.filename_template,
            Arc::new(TemplateFilenameGenerator::new()),
        ));

        let engine = RolloverEngine::new(
            StreamInfo::new(&config.stream.uri, &config.stream.title),
            Arc::new(PacketBuffer::new()),
            condition::from_config(&config.rollover),
            action,
            store,
        )
        .with_operator(Arc::new(OperatorChain::footprint(
            config.geometry.simplify_tolerance,
        )));

        Self::start(
            Arc::new(engine),
            addr,
            config.stream.max_datagram_size,
            config.rollover.check_interval(),
        )
        .await
    }

    pub fn engine(&self) -> &Arc<RolloverEngine> {
        &self.engine
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop both tasks, write out what is still buffered, and shut the
    /// engine down.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let (ingest, ticker) = tokio::join!(self.ingest_handle, self.ticker_handle);
        for (task, result) in [("ingest", ingest), ("ticker", ticker)] {
            if let Err(e) = result {
                tracing::error!(task, error = %e, "Stream task ended abnormally");
            }
        }

        match self.engine.flush().await {
            Ok(RolloverOutcome::Committed(summary)) => {
                tracing::info!(path = %summary.artifact.path.display(), "Final segment written");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Final segment could not be cataloged"),
        }
        self.engine.shutdown().await;
    }
}

impl std::fmt::Debug for StreamMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamMonitor")
            .field("engine", &self.engine)
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

/// Check for rollover on a fixed interval so time-based conditions fire
/// even when no data arrives.
async fn run_ticker(engine: Arc<RolloverEngine>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        match engine.check_for_rollover().await {
            Ok(RolloverOutcome::Terminated) => break,
            Ok(_) => {}
            Err(e) if e.is_retryable() => {
                tracing::warn!(error = %e, "Rollover check failed; retrying next tick");
            }
            Err(e) => tracing::error!(error = %e, "Rollover check failed"),
        }
    }

    tracing::debug!("Rollover ticker stopped");
}
