//! Pipeline state machine and its async driver.
//!
//! [`PipelineMachine`] turns [`PipelineEvent`]s into [`Effect`]s without
//! touching the network. [`PipelineController`] executes those effects as
//! spawned generation tasks and joins their results on the driving task,
//! so all state lives in one place.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::aggregate::{build_commit_prompt, commit_system_prompt};
use super::scheduler::{SchedulerState, Transition, UnitStatus};
use crate::config::{LlmConfig, DEFAULT_MAX_CONCURRENCY};
use crate::git::DiffUnit;
use crate::llm::prompts::{file_analysis_prompt, Language, DEFAULT_FILE_SYSTEM_PROMPT};
use crate::llm::{ErrorKind, GenerationRequest, LlmError, TextGenerator};

/// Pipeline phase. Only `Analyzing → Generating` is non-terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Per-file summaries are being generated.
    #[default]
    Analyzing,
    /// The commit message is being synthesized.
    Generating,
    /// A message was produced.
    Done,
    /// A unit or the synthesis failed.
    Failed,
    /// The run was cancelled.
    Cancelled,
}

impl PipelinePhase {
    /// True for `Done`, `Failed` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

/// Snapshot published to observers after every transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    /// Current phase.
    pub phase: PipelinePhase,
    /// Status of each unit in diff order.
    ///
    /// Once the run fails or is cancelled no unit is left `Running`: units
    /// that were in flight become `Cancelled`, units never started stay
    /// `Pending`.
    pub statuses: Vec<UnitStatus>,
    /// Units analysed successfully.
    pub completed: usize,
    /// Total units.
    pub total: usize,
}

/// Why a pipeline run failed.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Analysis of one file failed.
    #[error("Failed to analyze {path}")]
    Unit {
        /// Path of the failed unit.
        path: String,
        /// Generation error.
        #[source]
        source: LlmError,
    },

    /// Commit message synthesis failed.
    #[error("Failed to generate commit message")]
    Aggregation(#[source] LlmError),
}

impl PipelineError {
    /// Kind of the underlying generation error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unit { source, .. } | Self::Aggregation(source) => source.kind(),
        }
    }
}

/// Final result of a run. Never a partial message.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// The generated commit message.
    Completed(String),
    /// The run failed.
    Failed(PipelineError),
    /// The run was cancelled.
    Cancelled,
}

/// Input to [`PipelineMachine::handle`].
#[derive(Debug)]
pub enum PipelineEvent {
    /// Analysis of unit `index` finished.
    UnitAnalyzed {
        /// Unit index.
        index: usize,
        /// Summary or error.
        result: Result<String, LlmError>,
    },
    /// The synthesis call finished.
    MessageGenerated(Result<String, LlmError>),
    /// The caller asked to stop.
    CancelRequested,
}

/// Work requested by the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Analyse unit `index` with `request`.
    Analyze {
        /// Unit index.
        index: usize,
        /// Analysis request.
        request: GenerationRequest,
    },
    /// Issue the synthesis request.
    Aggregate(GenerationRequest),
    /// Cancel every outstanding call.
    CancelOutstanding,
}

/// Model and prompt settings for a run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Model used for every call.
    pub model: String,
    /// Commit message language.
    pub language: Language,
    /// Maximum concurrent analyses.
    pub concurrency: NonZeroUsize,
    /// System prompt override for file analysis.
    pub file_analysis_prompt: Option<String>,
    /// System prompt override for synthesis.
    pub commit_prompt_override: Option<String>,
}

impl PipelineOptions {
    /// Options with default language, concurrency and prompts.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            language: Language::default(),
            concurrency: NonZeroUsize::new(DEFAULT_MAX_CONCURRENCY).unwrap_or(NonZeroUsize::MIN),
            file_analysis_prompt: None,
            commit_prompt_override: None,
        }
    }

    /// Options taken from resolved configuration.
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            language: config.language,
            concurrency: config.max_concurrency,
            file_analysis_prompt: config.file_analysis_prompt.clone(),
            commit_prompt_override: config.commit_prompt_override().map(str::to_string),
        }
    }
}

/// Pure pipeline state machine.
#[derive(Debug)]
pub struct PipelineMachine {
    phase: PipelinePhase,
    scheduler: SchedulerState,
    options: PipelineOptions,
    outcome: Option<PipelineOutcome>,
    started: bool,
}

impl PipelineMachine {
    /// Creates a machine in `Analyzing` with all units pending.
    pub fn new(units: Vec<DiffUnit>, options: PipelineOptions) -> Self {
        let scheduler = SchedulerState::new(units, options.concurrency);
        Self {
            phase: PipelinePhase::Analyzing,
            scheduler,
            options,
            outcome: None,
            started: false,
        }
    }

    /// Admits the first units. Subsequent calls do nothing.
    pub fn start(&mut self) -> Vec<Effect> {
        if self.started || self.phase.is_terminal() {
            return Vec::new();
        }
        self.started = true;
        let transition = self.scheduler.start();
        self.apply(transition)
    }

    /// Applies one event. Terminal phases accept nothing.
    pub fn handle(&mut self, event: PipelineEvent) -> Vec<Effect> {
        if self.phase.is_terminal() {
            debug!(phase = ?self.phase, ?event, "Ignoring event in terminal phase");
            return Vec::new();
        }

        match event {
            PipelineEvent::CancelRequested => self.cancel(),
            PipelineEvent::UnitAnalyzed { result: Err(err), .. } if err.is_cancelled() => {
                self.cancel()
            }
            PipelineEvent::UnitAnalyzed { index, result } => {
                if self.phase != PipelinePhase::Analyzing {
                    return Vec::new();
                }
                let transition = self.scheduler.on_completion(index, result);
                self.apply(transition)
            }
            PipelineEvent::MessageGenerated(_) if self.phase != PipelinePhase::Generating => {
                Vec::new()
            }
            PipelineEvent::MessageGenerated(Ok(message)) => {
                info!(len = message.len(), "Commit message generated");
                self.finish(PipelinePhase::Done, PipelineOutcome::Completed(message));
                Vec::new()
            }
            PipelineEvent::MessageGenerated(Err(err)) if err.is_cancelled() => self.cancel(),
            PipelineEvent::MessageGenerated(Err(err)) => {
                warn!(error = %err, "Commit message generation failed");
                self.finish(
                    PipelinePhase::Failed,
                    PipelineOutcome::Failed(PipelineError::Aggregation(err)),
                );
                Vec::new()
            }
        }
    }

    fn apply(&mut self, transition: Transition<LlmError>) -> Vec<Effect> {
        match transition {
            Transition::Admit(indices) => indices
                .into_iter()
                .map(|index| Effect::Analyze {
                    index,
                    request: self.analysis_request(index),
                })
                .collect(),
            Transition::AnalysisComplete => {
                info!(units = self.scheduler.total(), "File analysis complete");
                self.phase = PipelinePhase::Generating;
                vec![Effect::Aggregate(self.aggregation_request())]
            }
            Transition::Fatal { index, error } => {
                let path = self.scheduler.units()[index].path.clone();
                warn!(path = %path, error = %error, "File analysis failed");
                self.scheduler.cancel_running();
                self.finish(
                    PipelinePhase::Failed,
                    PipelineOutcome::Failed(PipelineError::Unit {
                        path,
                        source: error,
                    }),
                );
                vec![Effect::CancelOutstanding]
            }
            Transition::Ignored => Vec::new(),
        }
    }

    fn cancel(&mut self) -> Vec<Effect> {
        info!(phase = ?self.phase, "Pipeline cancelled");
        self.scheduler.cancel_running();
        self.finish(PipelinePhase::Cancelled, PipelineOutcome::Cancelled);
        vec![Effect::CancelOutstanding]
    }

    fn finish(&mut self, phase: PipelinePhase, outcome: PipelineOutcome) {
        self.phase = phase;
        self.outcome = Some(outcome);
    }

    fn analysis_request(&self, index: usize) -> GenerationRequest {
        let unit = &self.scheduler.units()[index];
        let system = self
            .options
            .file_analysis_prompt
            .as_deref()
            .unwrap_or(DEFAULT_FILE_SYSTEM_PROMPT);
        GenerationRequest::new(&self.options.model, file_analysis_prompt(unit))
            .with_system_prompt(system)
    }

    fn aggregation_request(&self) -> GenerationRequest {
        let entries = self
            .scheduler
            .summaries()
            .map(|(unit, summary)| (unit.path.as_str(), summary));
        let prompt = build_commit_prompt(entries, self.options.language);
        let system = commit_system_prompt(
            self.options.language,
            self.options.commit_prompt_override.as_deref(),
        );
        GenerationRequest::new(&self.options.model, prompt).with_system_prompt(system)
    }

    /// Current phase.
    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    /// Progress snapshot.
    pub fn progress(&self) -> Progress {
        Progress {
            phase: self.phase,
            statuses: self.scheduler.statuses().to_vec(),
            completed: self.scheduler.completed(),
            total: self.scheduler.total(),
        }
    }

    /// Takes the outcome once a terminal phase is reached.
    pub fn take_outcome(&mut self) -> Option<PipelineOutcome> {
        self.outcome.take()
    }
}

/// Runs a [`PipelineMachine`] against a [`TextGenerator`].
///
/// One controller drives one run; cancelling its token stops the run.
pub struct PipelineController {
    generator: Arc<dyn TextGenerator>,
    options: PipelineOptions,
    cancel: CancellationToken,
    progress: watch::Sender<Progress>,
}

impl PipelineController {
    /// Creates a controller.
    pub fn new(generator: Arc<dyn TextGenerator>, options: PipelineOptions) -> Self {
        let (progress, _) = watch::channel(Progress::default());
        Self {
            generator,
            options,
            cancel: CancellationToken::new(),
            progress,
        }
    }

    /// Token that cancels the run when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Receiver of progress snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    /// Analyses `units` and synthesizes a commit message.
    pub async fn run(&self, units: Vec<DiffUnit>) -> PipelineOutcome {
        info!(
            units = units.len(),
            concurrency = self.options.concurrency.get(),
            model = %self.options.model,
            "Starting commit message pipeline"
        );

        let mut machine = PipelineMachine::new(units, self.options.clone());
        let mut calls = InFlightCalls::default();
        let work = self.cancel.child_token();
        // Stragglers are cancelled whenever the run returns.
        let _work_guard = work.clone().drop_guard();

        let effects = machine.start();
        self.dispatch(effects, &mut calls, &work);
        self.progress.send_replace(machine.progress());

        loop {
            if let Some(outcome) = machine.take_outcome() {
                debug!(phase = ?machine.phase(), "Pipeline finished");
                return outcome;
            }

            let event = tokio::select! {
                biased;
                () = self.cancel.cancelled() => PipelineEvent::CancelRequested,
                Some(event) = calls.join_next() => event,
            };

            let effects = machine.handle(event);
            self.dispatch(effects, &mut calls, &work);
            self.progress.send_replace(machine.progress());
        }
    }

    fn dispatch(&self, effects: Vec<Effect>, calls: &mut InFlightCalls, work: &CancellationToken) {
        for effect in effects {
            match effect {
                Effect::Analyze { index, request } => {
                    self.spawn_call(calls, CallOrigin::Unit(index), request, work);
                }
                Effect::Aggregate(request) => {
                    self.spawn_call(calls, CallOrigin::Aggregate, request, work);
                }
                Effect::CancelOutstanding => work.cancel(),
            }
        }
    }

    fn spawn_call(
        &self,
        calls: &mut InFlightCalls,
        origin: CallOrigin,
        request: GenerationRequest,
        work: &CancellationToken,
    ) {
        let generator = Arc::clone(&self.generator);
        let token = work.child_token();

        let handle = calls.tasks.spawn(async move {
            let result = generator.generate(&request, &token).await;
            origin.into_event(result)
        });
        calls.origins.insert(handle.id(), origin);
    }
}

/// Which pipeline step a spawned call serves.
#[derive(Debug, Clone, Copy)]
enum CallOrigin {
    Unit(usize),
    Aggregate,
}

impl CallOrigin {
    fn into_event(self, result: Result<String, LlmError>) -> PipelineEvent {
        match self {
            Self::Unit(index) => PipelineEvent::UnitAnalyzed { index, result },
            Self::Aggregate => PipelineEvent::MessageGenerated(result),
        }
    }
}

/// Spawned generation calls of one run. Dropping it aborts them.
#[derive(Default)]
struct InFlightCalls {
    tasks: JoinSet<PipelineEvent>,
    origins: HashMap<task::Id, CallOrigin>,
}

impl InFlightCalls {
    /// Next finished call as an event; a panicked call becomes a failed one.
    ///
    /// Returns `None` when nothing is in flight.
    async fn join_next(&mut self) -> Option<PipelineEvent> {
        loop {
            match self.tasks.join_next_with_id().await? {
                Ok((id, event)) => {
                    self.origins.remove(&id);
                    return Some(event);
                }
                Err(err) => {
                    if let Some(origin) = self.origins.remove(&err.id()) {
                        warn!(?origin, error = %err, "Generation task failed");
                        return Some(origin.into_event(Err(LlmError::TaskFailed(err.to_string()))));
                    }
                }
            }
        }
    }
}
