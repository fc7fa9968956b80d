//! One-directional channels between a merge worker and its owner.
//!
//! - progress: worker → owner, [`ProgressMessage`]
//! - log: worker → owner, [`LogEvent`]
//! - control: owner → worker, [`ControlSignal`]
//!
//! All three are unbounded `std::sync::mpsc` channels. The worker only polls
//! the control side at batch boundaries.

use std::cell::Cell;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

pub use crate::error::FailureKind;
use crate::orchestrator::summary::MergeSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub severity: Severity,
    pub message: String,
}

impl LogEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warn,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    pub processed: usize,
    pub total: usize,
    pub percent: f32,
    pub eta_secs: u64,
    pub stage: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Initializing,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Terminal report sent once on the progress channel.
#[derive(Debug, Clone)]
pub enum JobReport {
    Completed {
        output: String,
        summary: MergeSummary,
    },
    Cancelled {
        processed: usize,
    },
    Failed {
        kind: FailureKind,
        reason: String,
    },
}

impl JobReport {
    pub fn state(&self) -> JobState {
        match self {
            Self::Completed { .. } => JobState::Completed,
            Self::Cancelled { .. } => JobState::Cancelled,
            Self::Failed { .. } => JobState::Failed,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ProgressMessage {
    Progress(ProgressEvent),
    Finished(JobReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Cancel,
}

/// Worker-side view of the job channels.
pub trait JobChannel {
    fn progress(&self, event: ProgressEvent);
    fn log(&self, event: LogEvent);
    /// Polled at batch boundaries; once it returns true it keeps returning true.
    fn cancel_requested(&self) -> bool;
}

/// mpsc-backed worker endpoint. Send failures are ignored: an owner that
/// dropped its receivers is no longer listening.
pub struct WorkerEndpoint {
    progress_tx: Sender<ProgressMessage>,
    log_tx: Sender<LogEvent>,
    control_rx: Receiver<ControlSignal>,
    cancelled: Cell<bool>,
}

impl WorkerEndpoint {
    pub fn finish(&self, report: JobReport) {
        let _ = self.progress_tx.send(ProgressMessage::Finished(report));
    }
}

impl JobChannel for WorkerEndpoint {
    fn progress(&self, event: ProgressEvent) {
        let _ = self.progress_tx.send(ProgressMessage::Progress(event));
    }

    fn log(&self, event: LogEvent) {
        log::debug!(target: "table_merge::worker", "{}", event);
        let _ = self.log_tx.send(event);
    }

    fn cancel_requested(&self) -> bool {
        if self.cancelled.get() {
            return true;
        }
        match self.control_rx.try_recv() {
            Ok(ControlSignal::Cancel) => {
                self.cancelled.set(true);
                true
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
        }
    }
}

/// Owner-side ends of the channels.
pub struct OwnerEndpoint {
    pub progress_rx: Receiver<ProgressMessage>,
    pub log_rx: Receiver<LogEvent>,
    pub control_tx: Sender<ControlSignal>,
}

pub fn job_channels() -> (WorkerEndpoint, OwnerEndpoint) {
    let (progress_tx, progress_rx) = mpsc::channel();
    let (log_tx, log_rx) = mpsc::channel();
    let (control_tx, control_rx) = mpsc::channel();
    (
        WorkerEndpoint {
            progress_tx,
            log_tx,
            control_rx,
            cancelled: Cell::new(false),
        },
        OwnerEndpoint {
            progress_rx,
            log_rx,
            control_tx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_sticky() {
        let (worker, owner) = job_channels();
        assert!(!worker.cancel_requested());
        owner.control_tx.send(ControlSignal::Cancel).unwrap();
        assert!(worker.cancel_requested());
        assert!(worker.cancel_requested());
    }

    #[test]
    fn dropped_owner_does_not_cancel_or_panic() {
        let (worker, owner) = job_channels();
        drop(owner);
        worker.log(LogEvent::info("nobody listening"));
        worker.progress(ProgressEvent {
            processed: 1,
            total: 1,
            percent: 100.0,
            eta_secs: 0,
            stage: "matching",
        });
        assert!(!worker.cancel_requested());
    }

    #[test]
    fn events_arrive_in_order() {
        let (worker, owner) = job_channels();
        worker.log(LogEvent::info("a"));
        worker.log(LogEvent::warn("b"));
        worker.finish(JobReport::Cancelled { processed: 0 });
        let logs: Vec<LogEvent> = owner.log_rx.try_iter().collect();
        assert_eq!(logs, vec![LogEvent::info("a"), LogEvent::warn("b")]);
        match owner.progress_rx.try_recv().unwrap() {
            ProgressMessage::Finished(r) => assert_eq!(r.state(), JobState::Cancelled),
            other => panic!("unexpected {:?}", other),
        }
    }
}
