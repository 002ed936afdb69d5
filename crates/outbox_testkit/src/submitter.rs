//! A scripted submitter.
//!
//! Replies follow a queue of [`Step`]s, then repeat a fallback step. Every
//! request is recorded in call order.

use async_trait::async_trait;
use outbox_sync_engine::{RemoteState, SubmitOutcome, SubmitRequest, Submitter, SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum Step {
    /// Reply `Applied`.
    Apply,
    /// Fail with a retryable transport error.
    FailRetryable(String),
    /// Fail with a non-retryable transport error.
    FailFatal(String),
    /// Reply `Conflict` with this remote state.
    Conflict(RemoteState),
    /// Reply `Rejected`.
    Reject(String),
    /// Never reply.
    Hang,
}

/// A submitter that replays a script.
#[derive(Debug)]
pub struct ScriptedSubmitter {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    delay: Option<Duration>,
    calls: Mutex<Vec<SubmitRequest>>,
}

impl ScriptedSubmitter {
    /// Replies `steps` in order, then `fallback` forever.
    pub fn new(steps: impl IntoIterator<Item = Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into_iter().collect()),
            fallback,
            delay: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Replies `step` to every call.
    pub fn always(step: Step) -> Arc<Self> {
        Self::new([], step)
    }

    /// Like [`ScriptedSubmitter::always`], sleeping `delay` before each reply.
    pub fn slow(step: Step, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: step,
            delay: Some(delay),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Requests received, in call order.
    pub fn calls(&self) -> Vec<SubmitRequest> {
        self.calls.lock().clone()
    }

    /// Number of requests received.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn next_step(&self) -> Step {
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl Submitter for ScriptedSubmitter {
    async fn submit(&self, request: &SubmitRequest) -> SyncResult<SubmitOutcome> {
        self.calls.lock().push(request.clone());
        let step = self.next_step();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match step {
            Step::Apply => Ok(SubmitOutcome::Applied),
            Step::FailRetryable(message) => Err(SyncError::transport_retryable(message)),
            Step::FailFatal(message) => Err(SyncError::transport_fatal(message)),
            Step::Conflict(remote) => Ok(SubmitOutcome::Conflict(remote)),
            Step::Reject(reason) => Ok(SubmitOutcome::Rejected(reason)),
            Step::Hang => {
                std::future::pending::<()>().await;
                Ok(SubmitOutcome::Applied)
            }
        }
    }
}
