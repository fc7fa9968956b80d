//! Job execution in an isolated worker thread.
//!
//! The owner hands a [`MergeConfig`] to [`start_job`] and gets a [`JobHandle`]
//! back. The worker loads both datasets itself, runs the orchestrator and
//! writes the output; the only link between the two sides is the three
//! channels in [`channel`].

pub mod channel;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use log::{error, info};

use crate::config::MergeConfig;
use crate::error::MergeError;
use crate::export::writer_for;
use crate::orchestrator::{MergeJob, MergeOrchestrator, MergeOutcome};
use crate::source::loader_for;
use channel::{
    ControlSignal, FailureKind, JobChannel, JobReport, JobState, LogEvent, OwnerEndpoint, ProgressEvent,
    ProgressMessage, WorkerEndpoint, job_channels,
};

/// Runs a whole job on the calling thread and sends the terminal report on the
/// progress channel. Returns the same report.
pub fn run_job(config: &MergeConfig, channel: &WorkerEndpoint) -> JobReport {
    let report = match execute(config, channel) {
        Ok(report) => report,
        Err(e) => JobReport::Failed {
            kind: e.kind(),
            reason: e.to_string(),
        },
    };
    channel.finish(report.clone());
    report
}

fn execute(config: &MergeConfig, channel: &WorkerEndpoint) -> Result<JobReport, MergeError> {
    let loaded = config
        .validate()
        .map_err(MergeError::from)
        .and_then(|_| load(config, channel));
    let job = match loaded {
        Ok(job) => job,
        Err(e) => {
            // orchestrator errors are logged by the orchestrator itself
            channel.log(LogEvent::error(format!("error: {}", e)));
            return Err(e);
        }
    };

    let mut orchestrator = MergeOrchestrator::new(job, config.engine.clone());
    match orchestrator.run(channel)? {
        MergeOutcome::Cancelled { processed } => Ok(JobReport::Cancelled { processed }),
        MergeOutcome::Completed { table, summary } => {
            let format = config.output_format();
            if let Err(e) = writer_for(format).write(&table, &summary, &config.output) {
                channel.log(LogEvent::error(format!(
                    "error: failed to write {}: {}",
                    config.output, e
                )));
                return Err(e.into());
            }
            channel.log(LogEvent::info(format!(
                "saved {} rows x {} columns to {} ({})",
                table.len(),
                table.columns().len(),
                config.output,
                format.as_str()
            )));
            Ok(JobReport::Completed {
                output: config.output.clone(),
                summary,
            })
        }
    }
}

fn load(config: &MergeConfig, channel: &WorkerEndpoint) -> Result<MergeJob, MergeError> {
    let first = loader_for(&config.file1, &config.import)?.load(&config.file1)?;
    let second = loader_for(&config.file2, &config.import)?.load(&config.file2)?;
    channel.log(LogEvent::info(format!(
        "loaded file 1: {} rows, {} columns | file 2: {} rows, {} columns",
        first.len(),
        first.columns().len(),
        second.len(),
        second.columns().len()
    )));
    Ok(MergeJob {
        first,
        second,
        pairs: config.match_pairs.clone(),
        columns: config.columns.clone(),
    })
}

/// Everything drained from the owner-side channels by one [`JobHandle::poll`].
#[derive(Debug, Default)]
pub struct JobPoll {
    pub progress: Vec<ProgressEvent>,
    pub logs: Vec<LogEvent>,
    pub finished: Option<JobReport>,
}

pub struct JobHandle {
    owner: OwnerEndpoint,
    worker: Option<JoinHandle<JobReport>>,
    report: Option<JobReport>,
    state: JobState,
}

/// Spawns the worker thread. Panics inside the worker are caught and reported
/// as a failed job.
pub fn start_job(config: MergeConfig) -> std::io::Result<JobHandle> {
    let (worker_end, owner) = job_channels();
    let worker = thread::Builder::new()
        .name("merge-worker".into())
        .spawn(move || {
            match catch_unwind(AssertUnwindSafe(|| run_job(&config, &worker_end))) {
                Ok(report) => report,
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    error!("merge worker panicked: {}", reason);
                    let report = JobReport::Failed {
                        kind: FailureKind::Runtime,
                        reason: format!("worker panicked: {}", reason),
                    };
                    worker_end.log(LogEvent::error(format!("error: {}", reason)));
                    worker_end.finish(report.clone());
                    report
                }
            }
        })?;
    info!("merge job started");
    Ok(JobHandle {
        owner,
        worker: Some(worker),
        report: None,
        state: JobState::Initializing,
    })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl JobHandle {
    pub fn progress_channel(&self) -> &Receiver<ProgressMessage> {
        &self.owner.progress_rx
    }

    pub fn log_channel(&self) -> &Receiver<LogEvent> {
        &self.owner.log_rx
    }

    /// Requests cooperative cancellation. Returns false when the worker is gone.
    pub fn cancel(&self) -> bool {
        self.owner.control_tx.send(ControlSignal::Cancel).is_ok()
    }

    /// Worker liveness.
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().is_none_or(|w| w.is_finished())
    }

    /// Terminal report, once it has been received by [`poll`](Self::poll).
    pub fn report(&self) -> Option<&JobReport> {
        self.report.as_ref()
    }

    /// Last state observed through [`poll`](Self::poll): `Initializing` until
    /// the first matching batch is reported, `Running` after that, then the
    /// terminal state of the report.
    pub fn state(&self) -> JobState {
        self.state
    }

    fn observe(&mut self, next: JobState) {
        if !self.state.is_terminal() {
            self.state = next;
        }
    }

    /// Drains both worker → owner channels without blocking.
    pub fn poll(&mut self) -> JobPoll {
        let mut out = JobPoll::default();
        out.logs.extend(self.owner.log_rx.try_iter());
        loop {
            match self.owner.progress_rx.try_recv() {
                Ok(ProgressMessage::Progress(p)) => {
                    if p.stage == "matching" {
                        self.observe(JobState::Running);
                    }
                    out.progress.push(p);
                }
                Ok(ProgressMessage::Finished(r)) => {
                    self.observe(r.state());
                    self.report = Some(r.clone());
                    out.finished = Some(r);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        // logs sent before the terminal report
        out.logs.extend(self.owner.log_rx.try_iter());
        out
    }

    /// Blocks until the worker exits and returns its terminal report.
    pub fn join(mut self) -> JobReport {
        let joined = match self.worker.take() {
            Some(w) => w.join().map_err(|p| panic_message(p.as_ref())),
            None => Err("worker already joined".to_string()),
        };
        match (joined, self.report.take()) {
            (Ok(report), _) => report,
            (Err(_), Some(report)) => report,
            (Err(reason), None) => JobReport::Failed {
                kind: FailureKind::Runtime,
                reason,
            },
        }
    }
}
