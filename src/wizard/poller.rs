//! Periodic status queries for a running processing job.
//!
//! Each poll owns two timers: the status query and a cosmetic progress
//! estimate. Both stop together through one cancellation token, either when
//! a terminal status is seen or when the session cancels the poll.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use crate::config::PollerConfig;
use crate::core::{JobHandle, JobOutput, JobStatus, PollError, WorkflowEngine};
use crate::utils::{retry_with_config, RetryConfig, RetryStrategy};
use super::output::parse_output;

/// Upper bound of the estimate while the job has not succeeded.
pub const ESTIMATE_CEILING: u8 = 95;

/// `min(95, round(elapsed / estimated * 100))`.
pub fn estimate_progress(elapsed: Duration, estimated: Duration) -> u8 {
    if estimated.is_zero() {
        return ESTIMATE_CEILING;
    }
    let percentage = (elapsed.as_secs_f64() / estimated.as_secs_f64() * 100.0).round();
    percentage.min(ESTIMATE_CEILING as f64) as u8
}

/// Message from a poll, tagged with the generation it was started under.
#[derive(Debug)]
pub struct PollEvent {
    pub generation: u64,
    pub message: PollMessage,
}

#[derive(Debug)]
pub enum PollMessage {
    Progress(u8),
    /// A non-terminal status
    Status(JobStatus),
    /// Sent once, after both timers are cancelled
    Finished {
        status: JobStatus,
        outcome: Result<JobOutput, PollError>,
    },
}

/// Cancels the poll's timers when dropped.
pub struct PollHandle {
    job: JobHandle,
    generation: u64,
    cancel: CancellationToken,
    status_task: JoinHandle<()>,
    progress_task: JoinHandle<()>,
}

impl PollHandle {
    pub fn job(&self) -> &JobHandle {
        &self.job
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits for both timers to exit.
    pub async fn stopped(&mut self) {
        let _ = (&mut self.status_task).await;
        let _ = (&mut self.progress_task).await;
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[derive(Clone)]
pub struct StatusPoller {
    engine: Arc<dyn WorkflowEngine>,
    config: PollerConfig,
    retry: Arc<RetryConfig<PollError>>,
}

impl StatusPoller {
    pub fn new(engine: Arc<dyn WorkflowEngine>, config: PollerConfig) -> Self {
        let retry = if config.status_retries == 0 {
            RetryConfig::never()
        } else {
            RetryConfig {
                max_attempts: config.status_retries + 1,
                strategy: RetryStrategy::Exponential {
                    initial: config.retry_delay,
                    multiplier: 2.0,
                    max_delay: config.poll_interval.max(config.retry_delay),
                },
                should_retry: Box::new(|err| matches!(err, PollError::Query(_))),
            }
        };

        Self {
            engine,
            config,
            retry: Arc::new(retry),
        }
    }

    /// Starts polling `job`. The first status query runs one poll interval
    /// after the call, never immediately.
    pub fn spawn(&self, job: JobHandle, generation: u64, events: mpsc::UnboundedSender<PollEvent>) -> PollHandle {
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let status_task = tokio::spawn(status_loop(
            self.engine.clone(),
            self.retry.clone(),
            job.clone(),
            generation,
            self.config.poll_interval,
            started,
            cancel.clone(),
            events.clone(),
        ));
        let progress_task = tokio::spawn(progress_loop(
            generation,
            self.config.progress_interval,
            self.config.estimated_duration,
            started,
            cancel.clone(),
            events,
        ));

        debug!(%job, generation, "Polling started");
        PollHandle {
            job,
            generation,
            cancel,
            status_task,
            progress_task,
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn status_loop(
    engine: Arc<dyn WorkflowEngine>,
    retry: Arc<RetryConfig<PollError>>,
    job: JobHandle,
    generation: u64,
    period: Duration,
    started: Instant,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<PollEvent>,
) {
    let mut ticker = interval_at(started + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = retry_with_config(&retry, || engine.status(&job)) => result,
        };
        if cancel.is_cancelled() {
            return;
        }

        let (status, outcome) = match result {
            Ok(report) if !report.status.is_terminal() => {
                debug!(%job, status = %report.status, "Job still in progress");
                let message = PollMessage::Status(report.status);
                if events.send(PollEvent { generation, message }).is_err() {
                    return;
                }
                continue;
            }
            Ok(report) if report.status == JobStatus::Succeeded => {
                info!(%job, "Job succeeded");
                (report.status, parse_output(report.output.as_deref()))
            }
            Ok(report) => {
                warn!(%job, status = %report.status, "Job did not succeed");
                (report.status, Err(PollError::Terminal(report.status)))
            }
            Err(err) => {
                warn!(%job, error = %err, "Status query failed");
                (JobStatus::Failed, Err(err))
            }
        };

        cancel.cancel();
        let _ = events.send(PollEvent {
            generation,
            message: PollMessage::Finished { status, outcome },
        });
        return;
    }
}

async fn progress_loop(
    generation: u64,
    period: Duration,
    estimated: Duration,
    started: Instant,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<PollEvent>,
) {
    let mut ticker = interval_at(started + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let percentage = estimate_progress(started.elapsed(), estimated);
        let message = PollMessage::Progress(percentage);
        if events.send(PollEvent { generation, message }).is_err() {
            return;
        }
    }
}
