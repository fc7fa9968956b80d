//! Command line front end: argument parsing and status line formatting.

mod clap_parser;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::engine::JobPoll;
use crate::engine::channel::{FailureKind, JobReport, ProgressEvent, Severity};

pub use clap_parser::{Cli, Command, FormatOpt, InspectArgs, RunArgs, delimiter_byte};

/// Process exit code for a cancelled run.
pub const EXIT_CANCELLED: i32 = 130;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;

pub fn exit_code(report: &JobReport) -> i32 {
    match report {
        JobReport::Completed { .. } => 0,
        JobReport::Cancelled { .. } => EXIT_CANCELLED,
        JobReport::Failed {
            kind: FailureKind::Config,
            ..
        } => EXIT_CONFIG,
        JobReport::Failed {
            kind: FailureKind::Runtime,
            ..
        } => EXIT_FAILED,
    }
}

/// `mm:ss`; minutes keep growing past an hour.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn format_progress(elapsed: Duration, p: &ProgressEvent) -> String {
    let mut line = format!(
        "[{}] {} {}/{} ({:.1}%)",
        format_elapsed(elapsed),
        p.stage,
        p.processed,
        p.total,
        p.percent
    );
    if p.processed < p.total && p.eta_secs > 0 {
        line.push_str(&format!(" eta {}s", p.eta_secs));
    }
    line
}

/// One printable line; `to_stderr` is set for error events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub to_stderr: bool,
    pub text: String,
}

/// Log lines first, then progress lines, all stamped with `elapsed`.
pub fn status_lines(elapsed: Duration, update: &JobPoll) -> Vec<StatusLine> {
    let stamp = format_elapsed(elapsed);
    let logs = update.logs.iter().map(|e| StatusLine {
        to_stderr: e.severity == Severity::Error,
        text: format!("[{}] {}", stamp, e.message),
    });
    let progress = update.progress.iter().map(|p| StatusLine {
        to_stderr: false,
        text: format_progress(elapsed, p),
    });
    logs.chain(progress).collect()
}

/// Matching batches reported in `update`.
pub fn matching_batches(update: &JobPoll) -> usize {
    update
        .progress
        .iter()
        .filter(|p| p.stage == "matching")
        .count()
}

/// Decides when the owner sends `cancel`: on Ctrl-C, or after a fixed number
/// of matching batches. Fires at most once.
#[derive(Debug, Default)]
pub struct CancelTrigger {
    interrupted: Arc<AtomicBool>,
    after_batches: Option<usize>,
    fired: bool,
}

impl CancelTrigger {
    pub fn new(interrupted: Arc<AtomicBool>, after_batches: Option<usize>) -> Self {
        Self {
            interrupted,
            after_batches,
            fired: false,
        }
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// True exactly once, the first time a cancel condition holds.
    pub fn should_cancel(&mut self, batches_seen: usize) -> bool {
        if self.fired {
            return false;
        }
        let by_count = self.after_batches.is_some_and(|n| batches_seen >= n);
        self.fired = self.interrupted() || by_count;
        self.fired
    }
}

/// Routes Ctrl-C into a flag. A second Ctrl-C exits immediately with
/// [`EXIT_CANCELLED`].
pub fn install_interrupt_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        if handler_flag.swap(true, Ordering::SeqCst) {
            std::process::exit(EXIT_CANCELLED);
        }
    })?;
    Ok(flag)
}
