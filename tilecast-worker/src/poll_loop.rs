//! The worker's long-poll loop as an explicit state machine.
//!
//! ```text
//! Polling --no work------------> Polling
//! Polling --job----------------> Working --> Polling
//! Polling --transport failure--> Idle --retry_interval--> Polling
//! any     --cancel-------------> Cancelled
//! ```
//!
//! A "no work" answer loops straight back into `Polling`: the server's own
//! dispatch wait already throttles the loop. Handler failures and malformed
//! jobs are logged and polling continues immediately. Only transport
//! failures (network errors, unexpected statuses) pause for `retry_interval`.
//! Cancellation is checked before every poll and while idling, never in the
//! middle of a poll request or a running handler.

use std::time::Duration;

use tilecast_core::Job;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    error::{Result, WorkerError},
    ports::{JobHandler, JobSource, PollOutcome},
};

#[derive(Debug)]
pub enum PollState {
    Polling,
    Idle,
    Working(Job),
    Cancelled,
}

#[derive(Debug)]
pub struct PollLoop<S> {
    source: S,
    retry_interval: Duration,
}

impl<S: JobSource> PollLoop<S> {
    pub fn new(source: S, retry_interval: Duration) -> Self {
        Self {
            source,
            retry_interval,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Poll and handle jobs until `cancel` fires.
    ///
    /// Always ends with [`WorkerError::Cancelled`]; no other condition stops
    /// the loop.
    pub async fn subscribe<H>(&self, cancel: &CancellationToken, handler: &H) -> Result<()>
    where
        H: JobHandler + ?Sized,
    {
        let mut state = PollState::Polling;
        loop {
            state = match state {
                PollState::Cancelled => {
                    info!("poll loop cancelled");
                    return Err(WorkerError::Cancelled);
                }
                other => self.step(other, cancel, handler).await,
            };
        }
    }

    /// Run one transition.
    pub async fn step<H>(
        &self,
        state: PollState,
        cancel: &CancellationToken,
        handler: &H,
    ) -> PollState
    where
        H: JobHandler + ?Sized,
    {
        match state {
            PollState::Polling => {
                if cancel.is_cancelled() {
                    return PollState::Cancelled;
                }
                self.poll_once().await
            }
            PollState::Working(job) => {
                let tile = job.tile_name().to_string();
                match handler.handle(job).await {
                    Ok(()) => debug!(tile = %tile, "job handled"),
                    Err(err) => error!(tile = %tile, error = %err, "job handler failed"),
                }
                PollState::Polling
            }
            PollState::Idle => {
                debug!(retry_in = ?self.retry_interval, "waiting before the next poll");
                tokio::select! {
                    _ = cancel.cancelled() => PollState::Cancelled,
                    _ = tokio::time::sleep(self.retry_interval) => PollState::Polling,
                }
            }
            PollState::Cancelled => PollState::Cancelled,
        }
    }

    async fn poll_once(&self) -> PollState {
        match self.source.poll().await {
            Ok(PollOutcome::NoWork) => PollState::Polling,
            Ok(PollOutcome::Job(job)) => PollState::Working(job),
            Err(err) if err.is_transient() => {
                warn!(error = %err, retry_in = ?self.retry_interval, "poll failed");
                PollState::Idle
            }
            Err(err) => {
                error!(error = %err, "failed to read job");
                PollState::Polling
            }
        }
    }
}
