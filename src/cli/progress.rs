//! Pipeline progress on stderr.

use std::fmt;

use crossterm::style::Stylize;
use tokio::sync::watch;

use crate::pipeline::{PipelinePhase, Progress, UnitStatus};

/// One line worth reporting between two progress snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressLine {
    /// A file summary is ready.
    Analyzed {
        /// File path.
        path: String,
        /// Files analysed so far.
        completed: usize,
        /// Total files.
        total: usize,
    },
    /// A file could not be analysed.
    AnalysisFailed(String),
    /// Synthesis started.
    Generating,
}

impl fmt::Display for ProgressLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analyzed {
                path,
                completed,
                total,
            } => write!(f, "  {} [{completed}/{total}] {path}", "✓".green()),
            Self::AnalysisFailed(path) => write!(f, "  {} {path}", "✗".red()),
            Self::Generating => write!(f, "{}", "Generating commit message...".cyan()),
        }
    }
}

/// Lines describing what changed from `prev` to `next`.
///
/// Snapshots may be skipped by the watch channel, so the comparison is
/// over whole status vectors rather than single events.
pub fn progress_lines(prev: &Progress, next: &Progress, paths: &[String]) -> Vec<ProgressLine> {
    let mut lines = Vec::new();
    let mut completed = prev.completed;

    for (index, status) in next.statuses.iter().enumerate() {
        let before = prev.statuses.get(index).copied().unwrap_or(UnitStatus::Pending);
        if before == *status {
            continue;
        }
        let path = paths.get(index).cloned().unwrap_or_default();
        match status {
            UnitStatus::Done => {
                completed += 1;
                lines.push(ProgressLine::Analyzed {
                    path,
                    completed,
                    total: next.total,
                });
            }
            UnitStatus::Failed => lines.push(ProgressLine::AnalysisFailed(path)),
            UnitStatus::Pending | UnitStatus::Running | UnitStatus::Cancelled => {}
        }
    }

    if prev.phase != PipelinePhase::Generating && next.phase == PipelinePhase::Generating {
        lines.push(ProgressLine::Generating);
    }
    lines
}

/// Prints progress until the sender is dropped.
pub async fn render(mut progress: watch::Receiver<Progress>, paths: Vec<String>) {
    let mut shown = Progress::default();
    loop {
        let next = progress.borrow_and_update().clone();
        for line in progress_lines(&shown, &next, &paths) {
            eprintln!("{line}");
        }
        shown = next;

        if progress.changed().await.is_err() {
            break;
        }
    }
}
