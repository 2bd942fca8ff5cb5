//! Bounded admission of diff units with fail-fast semantics.
//!
//! [`SchedulerState`] performs no I/O. The controller feeds it completion
//! results one at a time and acts on the returned [`Transition`].

use std::num::NonZeroUsize;

use tracing::debug;

use crate::git::DiffUnit;

/// Analysis status of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    /// Waiting for a free slot.
    Pending,
    /// Analysis request in flight.
    Running,
    /// Summary available.
    Done,
    /// Analysis failed.
    Failed,
    /// Was running when the pipeline stopped; its result is discarded.
    Cancelled,
}

/// What the controller must do after a scheduler update.
#[derive(Debug, PartialEq, Eq)]
pub enum Transition<E> {
    /// Start analysis of these unit indices.
    Admit(Vec<usize>),
    /// Every unit has a summary. Reported once.
    AnalysisComplete,
    /// A unit failed; the pipeline must stop. Reported once.
    Fatal {
        /// Index of the failed unit.
        index: usize,
        /// The unit's error.
        error: E,
    },
    /// Nothing to do.
    Ignored,
}

/// Per-unit bookkeeping for one pipeline run.
#[derive(Debug)]
pub struct SchedulerState {
    units: Vec<DiffUnit>,
    statuses: Vec<UnitStatus>,
    summaries: Vec<Option<String>>,
    running: usize,
    completed: usize,
    concurrency_limit: NonZeroUsize,
    next_pending: usize,
    failed: bool,
    analysis_complete: bool,
}

impl SchedulerState {
    /// Creates the state with every unit pending.
    pub fn new(units: Vec<DiffUnit>, concurrency_limit: NonZeroUsize) -> Self {
        let total = units.len();
        Self {
            units,
            statuses: vec![UnitStatus::Pending; total],
            summaries: vec![None; total],
            running: 0,
            completed: 0,
            concurrency_limit,
            next_pending: 0,
            failed: false,
            analysis_complete: false,
        }
    }

    /// Admits the first `min(K, N)` units, or completes at once when there are none.
    pub fn start<E>(&mut self) -> Transition<E> {
        if self.units.is_empty() {
            return self.signal_complete();
        }
        Transition::Admit(self.admit())
    }

    /// Records the result of unit `index`.
    ///
    /// Results for units that are not running are ignored. After a fatal
    /// failure only the running count is updated.
    pub fn on_completion<E>(&mut self, index: usize, result: Result<String, E>) -> Transition<E> {
        if self.statuses.get(index) != Some(&UnitStatus::Running) {
            debug!(index, "Ignoring completion for a unit that is not running");
            return Transition::Ignored;
        }
        self.running -= 1;

        if self.failed {
            return Transition::Ignored;
        }

        match result {
            Err(error) => {
                self.statuses[index] = UnitStatus::Failed;
                self.failed = true;
                Transition::Fatal { index, error }
            }
            Ok(summary) => {
                self.statuses[index] = UnitStatus::Done;
                self.summaries[index] = Some(summary);
                self.completed += 1;

                if self.completed == self.units.len() {
                    self.signal_complete()
                } else {
                    let admitted = self.admit();
                    if admitted.is_empty() {
                        Transition::Ignored
                    } else {
                        Transition::Admit(admitted)
                    }
                }
            }
        }
    }

    /// Marks running units `Cancelled` and stops admitting.
    ///
    /// Pending units stay `Pending`. Returns the cancelled indices.
    pub fn cancel_running(&mut self) -> Vec<usize> {
        let cancelled: Vec<usize> = self
            .statuses
            .iter()
            .enumerate()
            .filter(|(_, status)| **status == UnitStatus::Running)
            .map(|(index, _)| index)
            .collect();
        for &index in &cancelled {
            self.statuses[index] = UnitStatus::Cancelled;
        }
        self.running = 0;
        self.next_pending = self.units.len();
        cancelled
    }

    fn admit(&mut self) -> Vec<usize> {
        let mut admitted = Vec::new();
        while self.running < self.concurrency_limit.get() && self.next_pending < self.units.len() {
            let index = self.next_pending;
            self.next_pending += 1;
            self.statuses[index] = UnitStatus::Running;
            self.running += 1;
            admitted.push(index);
        }
        if !admitted.is_empty() {
            debug!(?admitted, running = self.running, "Admitted units");
        }
        admitted
    }

    fn signal_complete<E>(&mut self) -> Transition<E> {
        if self.analysis_complete {
            return Transition::Ignored;
        }
        self.analysis_complete = true;
        Transition::AnalysisComplete
    }

    /// Units in diff order.
    pub fn units(&self) -> &[DiffUnit] {
        &self.units
    }

    /// Unit statuses, same order as [`units`](Self::units).
    pub fn statuses(&self) -> &[UnitStatus] {
        &self.statuses
    }

    /// `(unit, summary)` for every summarized unit, in diff order.
    pub fn summaries(&self) -> impl Iterator<Item = (&DiffUnit, &str)> {
        self.units
            .iter()
            .zip(&self.summaries)
            .filter_map(|(unit, summary)| summary.as_deref().map(|s| (unit, s)))
    }

    /// Units currently running.
    pub fn running(&self) -> usize {
        self.running
    }

    /// Units analysed successfully.
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Total number of units.
    pub fn total(&self) -> usize {
        self.units.len()
    }

    /// True once a unit has failed.
    pub fn is_failed(&self) -> bool {
        self.failed
    }
}
