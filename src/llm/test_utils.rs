//! Shared test utilities for the `llm` and `pipeline` modules.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::client::{GenerationRequest, TextGenerator};
use super::error::LlmError;

/// What a scripted call answers.
#[derive(Clone, Debug)]
pub(crate) enum Reply {
    /// Succeeds with the text.
    Text(String),
    /// Fails with [`LlmError::Provider`].
    Fail(String),
    /// Fails with [`LlmError::Cancelled`] without being cancelled.
    Cancelled,
    /// Never answers; returns [`LlmError::Cancelled`] once the token fires.
    Hang,
    /// Panics after the delay.
    Panic,
}

impl Reply {
    pub(crate) fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }

    fn into_result(self) -> Result<String, LlmError> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Fail(msg) => Err(LlmError::Provider(msg)),
            Self::Cancelled | Self::Hang => Err(LlmError::Cancelled),
            Self::Panic => panic!("scripted generator panic"),
        }
    }
}

struct Rule {
    needle: String,
    delay: Duration,
    reply: Reply,
}

/// Lifecycle event of one scripted call, labelled with the matched needle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum CallEvent {
    Started(String),
    Finished(String),
}

#[derive(Default)]
struct Recorder {
    requests: Mutex<Vec<GenerationRequest>>,
    events: Mutex<Vec<CallEvent>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Recorder {
    fn event(&self, event: CallEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Decrements the in-flight counter even when the call future is dropped.
struct InFlightGuard(Arc<Recorder>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Generator answering from a script of `(needle, delay, reply)` rules.
///
/// The first rule whose needle occurs in the user prompt answers the call;
/// unmatched prompts fail. Delays honour cancellation.
pub(crate) struct ScriptedGenerator {
    rules: Vec<Rule>,
    recorder: Arc<Recorder>,
}

impl ScriptedGenerator {
    pub(crate) fn new() -> Self {
        Self {
            rules: Vec::new(),
            recorder: Arc::new(Recorder::default()),
        }
    }

    /// Answers prompts containing `needle` immediately.
    pub(crate) fn on(self, needle: &str, reply: Reply) -> Self {
        self.on_delayed(needle, Duration::ZERO, reply)
    }

    /// Answers prompts containing `needle` after `delay`.
    pub(crate) fn on_delayed(mut self, needle: &str, delay: Duration, reply: Reply) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            delay,
            reply,
        });
        self
    }

    /// Shared handle for inspecting calls after the generator is moved.
    pub(crate) fn handle(&self) -> CallRecordHandle {
        CallRecordHandle {
            recorder: self.recorder.clone(),
        }
    }
}

/// Shared view of a [`ScriptedGenerator`]'s recorded calls.
#[derive(Clone)]
pub(crate) struct CallRecordHandle {
    recorder: Arc<Recorder>,
}

impl CallRecordHandle {
    /// All requests received, in arrival order.
    pub(crate) fn requests(&self) -> Vec<GenerationRequest> {
        self.recorder.requests.lock().unwrap().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.recorder.requests.lock().unwrap().len()
    }

    pub(crate) fn events(&self) -> Vec<CallEvent> {
        self.recorder.events.lock().unwrap().clone()
    }

    /// Highest number of calls observed running at the same time.
    pub(crate) fn max_in_flight(&self) -> usize {
        self.recorder.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.recorder.in_flight.load(Ordering::SeqCst)
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String, LlmError>> {
        Box::pin(async move {
            let recorder = self.recorder.clone();
            recorder.requests.lock().unwrap().push(request.clone());

            let Some(rule) = self
                .rules
                .iter()
                .find(|rule| request.prompt.contains(&rule.needle))
            else {
                return Err(LlmError::Provider("no scripted reply".to_string()));
            };

            let running = recorder.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            recorder.max_in_flight.fetch_max(running, Ordering::SeqCst);
            let _guard = InFlightGuard(recorder.clone());
            recorder.event(CallEvent::Started(rule.needle.clone()));

            if matches!(rule.reply, Reply::Hang) {
                cancel.cancelled().await;
                return Err(LlmError::Cancelled);
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(LlmError::Cancelled),
                () = tokio::time::sleep(rule.delay) => {}
            }

            recorder.event(CallEvent::Finished(rule.needle.clone()));
            rule.reply.clone().into_result()
        })
    }
}
