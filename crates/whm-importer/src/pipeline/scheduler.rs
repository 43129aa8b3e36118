//! Sweep scheduling
//!
//! Live mode repeats sweeps forever: `interval` after a clean sweep, an
//! exponential [`SweepBackoff`] after a failed one. Reinit mode waits
//! `reinit_delay`, then repeats a non-archiving sweep of the archive folder
//! until one succeeds. Both loops stop as soon as the token is cancelled.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use whm_common::SweepBackoff;

use super::importer::{Importer, SweepReport};
use super::traits::SourceHandle;
use crate::error::{ImportError, Result};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_REINIT_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    Live,
    Reinit,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub mode: ScheduleMode,
    pub interval: Duration,
    pub reinit_delay: Duration,
}

pub struct Scheduler<D, C> {
    importer: Arc<Importer<D, C>>,
    settings: SchedulerSettings,
    backoff: SweepBackoff,
}

impl<D, C> Scheduler<D, C>
where
    D: Send + Sync + 'static,
    C: SourceHandle,
{
    pub fn new(importer: Arc<Importer<D, C>>, settings: SchedulerSettings) -> Self {
        Self::with_backoff(importer, settings, SweepBackoff::default())
    }

    pub fn with_backoff(
        importer: Arc<Importer<D, C>>,
        settings: SchedulerSettings,
        backoff: SweepBackoff,
    ) -> Self {
        Self {
            importer,
            settings,
            backoff,
        }
    }

    fn live(&self) -> bool {
        self.settings.mode == ScheduleMode::Live
    }

    /// Runs exactly one sweep in the configured mode
    pub async fn run_single(&self, cancel: &CancellationToken) -> Result<SweepReport> {
        self.importer.run_once(self.live(), cancel).await
    }

    /// Runs until cancelled (live) or until one clean pass (reinit)
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<()> {
        match self.settings.mode {
            ScheduleMode::Reinit => self.run_reinit(cancel).await,
            ScheduleMode::Live => self.run_live(cancel).await,
        }
    }

    async fn run_reinit(&mut self, cancel: &CancellationToken) -> Result<()> {
        info!(delay_secs = self.settings.reinit_delay.as_secs(), "reinit enabled, delaying");
        if !sleep_or_cancel(self.settings.reinit_delay, cancel).await {
            return Ok(());
        }

        loop {
            match self.importer.run_once(false, cancel).await {
                Ok(report) => {
                    self.backoff.reset();
                    info!(
                        blocks = report.blocks,
                        elements = report.elements,
                        errors = report.errors,
                        "reinit completed"
                    );
                    return Ok(());
                },
                Err(ImportError::Cancelled) => return Ok(()),
                Err(err) => {
                    let delay = self.backoff.next_delay();
                    log_sweep_failure("reinit run error", &err, delay);
                    if !sleep_or_cancel(delay, cancel).await {
                        return Ok(());
                    }
                },
            }
        }
    }

    async fn run_live(&mut self, cancel: &CancellationToken) -> Result<()> {
        loop {
            let delay = match self.importer.run_once(true, cancel).await {
                Ok(_) => {
                    self.backoff.reset();
                    info!(interval_secs = self.settings.interval.as_secs(), "run completed, sleeping");
                    self.settings.interval
                },
                Err(ImportError::Cancelled) => return Ok(()),
                Err(err) => {
                    let delay = self.backoff.next_delay();
                    log_sweep_failure("run error", &err, delay);
                    delay
                },
            };

            if !sleep_or_cancel(delay, cancel).await {
                info!("Shutdown requested, scheduler stopped");
                return Ok(());
            }
        }
    }
}

fn log_sweep_failure(message: &str, err: &ImportError, delay: Duration) {
    error!(
        kind = %err.kind(),
        retryable = err.is_retryable(),
        backoff_ms = delay.as_millis() as u64,
        error = %err,
        "{message}"
    );
}

/// Sleeps for `delay`; returns false if cancelled first
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
