//! Upstream call orchestrator.
//!
//! DESIGN
//! ======
//! `run` is the only entry point that mutates pipeline state across awaits.
//! Each call starts a new run: the previous run's token is cancelled and the
//! run id is bumped. Every mutation after an await goes through `apply`,
//! which drops it unless the run is still the active one, so a superseded
//! run can never write into its successor's state.
//!
//! Error routing:
//!
//! | kind                   | surfaces as                               |
//! |------------------------|-------------------------------------------|
//! | `Cancelled`            | nothing                                   |
//! | `Transient`/`Upstream` | one assistant turn, stage `Failed`        |
//! | `Transform`/`Execution`| inline on the stage's slot, no turn       |
//! | `Runtime`              | inline on the slot, pipeline continues    |

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::retry::{RetryClassifier, TransientAllowList, with_retry};
use super::sanitize::clean;
use super::state::{CodeArtifact, PipelineState, PipelineView, SlotId};
use super::upstream::{Upstream, UpstreamRequest};
use super::{PipelineConfig, visualization_request};
use crate::error::{ClassifiedError, ErrorCode, ErrorKind};
use crate::prompts::SystemPrompts;
use crate::sandbox::boundary::{SlotEventError, SlotView};
use crate::sandbox::{CompiledUnit, SandboxCompiler};

struct ActiveRun {
    id: u64,
    cancel: CancellationToken,
}

pub struct Pipeline {
    upstream: Arc<dyn Upstream>,
    compiler: Arc<SandboxCompiler>,
    classifier: Arc<dyn RetryClassifier>,
    config: PipelineConfig,
    prompts: Arc<SystemPrompts>,
    active: Mutex<ActiveRun>,
    state: Mutex<PipelineState>,
}

impl Pipeline {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        compiler: Arc<SandboxCompiler>,
        config: PipelineConfig,
        prompts: Arc<SystemPrompts>,
    ) -> Self {
        Self {
            upstream,
            compiler,
            classifier: Arc::new(TransientAllowList),
            config,
            prompts,
            active: Mutex::new(ActiveRun { id: 0, cancel: CancellationToken::new() }),
            state: Mutex::new(PipelineState::new()),
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn RetryClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn view(&self) -> PipelineView {
        self.state.lock().view()
    }

    /// Route a UI event to one slot. A handler that throws is captured by
    /// the slot, so the caller gets the slot's error view rather than an error.
    ///
    /// # Errors
    ///
    /// `NotDisplaying` or `UnknownHandler` when there is nothing to deliver to.
    pub fn dispatch(
        &self,
        slot: SlotId,
        handler: &str,
        payload: &serde_json::Value,
    ) -> Result<SlotView, SlotEventError> {
        let mut state = self.state.lock();
        let boundary = state.slot_mut(slot);
        match boundary.dispatch(handler, payload) {
            Ok(()) | Err(SlotEventError::Runtime(_)) => Ok(boundary.view()),
            Err(err) => Err(err),
        }
    }

    /// Move one slot's timers forward by `ms`. A callback that throws is
    /// captured by the slot, as with [`Pipeline::dispatch`].
    ///
    /// # Errors
    ///
    /// `NotDisplaying` when the slot shows no component.
    pub fn advance(&self, slot: SlotId, ms: f64) -> Result<SlotView, SlotEventError> {
        let mut state = self.state.lock();
        let boundary = state.slot_mut(slot);
        match boundary.advance(ms) {
            Ok(fired) => {
                debug!(slot = slot.as_str(), fired, "advanced slot timers");
                Ok(boundary.view())
            }
            Err(SlotEventError::Runtime(_)) => Ok(boundary.view()),
            Err(err) => Err(err),
        }
    }

    /// Cancel any run in flight and unmount both slots, running effect
    /// cleanups and dropping pending timers.
    pub fn close(&self) {
        {
            let mut active = self.active.lock();
            active.cancel.cancel();
            active.id += 1;
        }
        let mut state = self.state.lock();
        state.slot_mut(SlotId::Primary).reset();
        state.slot_mut(SlotId::Secondary).reset();
    }

    /// Submit a prompt. Supersedes any run in flight.
    ///
    /// # Errors
    ///
    /// The error that ended the run. It has already been applied to the
    /// state; `Cancelled` means a newer run took over and nothing was applied.
    pub async fn run(&self, prompt: &str) -> Result<(), ClassifiedError> {
        let (run_id, cancel) = self.start_run(prompt);
        info!(run = run_id, prompt_len = prompt.len(), "pipeline run started");

        let result = self.run_stages(run_id, &cancel, prompt).await;
        match &result {
            Ok(()) => info!(run = run_id, "pipeline run complete"),
            Err(err) if err.is_cancelled() => debug!(run = run_id, "pipeline run superseded"),
            Err(err) if matches!(err.kind, ErrorKind::Transform | ErrorKind::Execution) => {
                info!(run = run_id, error = %err, "pipeline stopped on compile failure");
            }
            Err(err) => {
                warn!(run = run_id, code = err.error_code(), error = %err, "pipeline run failed");
                if self.apply(run_id, |state| state.fail(err)).is_err() {
                    return Err(ClassifiedError::cancelled());
                }
            }
        }
        result
    }

    fn start_run(&self, prompt: &str) -> (u64, CancellationToken) {
        let mut active = self.active.lock();
        active.cancel.cancel();
        active.id += 1;
        active.cancel = CancellationToken::new();
        self.state.lock().begin_run(prompt);
        (active.id, active.cancel.clone())
    }

    /// Mutate state on behalf of `run_id`, or report `Cancelled` if a newer
    /// run has started.
    fn apply<R>(&self, run_id: u64, f: impl FnOnce(&mut PipelineState) -> R) -> Result<R, ClassifiedError> {
        let active = self.active.lock();
        if active.id != run_id {
            return Err(ClassifiedError::cancelled());
        }
        let mut state = self.state.lock();
        Ok(f(&mut state))
    }

    async fn run_stages(&self, run_id: u64, cancel: &CancellationToken, prompt: &str) -> Result<(), ClassifiedError> {
        let raw = self
            .call(cancel, &self.prompts.component, prompt, self.config.component_max_tokens)
            .await?;
        let (artifact, unit) = self.compile_stage(run_id, SlotId::Primary, raw)?;
        let request = visualization_request(&artifact.cleaned);
        self.apply(run_id, |state| state.primary_ready(artifact, &unit))?;

        let raw = self
            .call(cancel, &self.prompts.visualization, &request, self.config.visualization_max_tokens)
            .await?;
        let (artifact, unit) = self.compile_stage(run_id, SlotId::Secondary, raw)?;
        self.apply(run_id, |state| state.secondary_ready(artifact, &unit))
    }

    async fn call(
        &self,
        cancel: &CancellationToken,
        system_prompt: &str,
        user_content: &str,
        max_output_tokens: u32,
    ) -> Result<String, ClassifiedError> {
        let upstream = &self.upstream;
        with_retry(&self.config.retry, self.classifier.as_ref(), cancel, |attempt| {
            debug!(attempt, max_output_tokens, "calling upstream");
            upstream.complete(UpstreamRequest { system_prompt, user_content, max_output_tokens })
        })
        .await
    }

    fn compile_stage(
        &self,
        run_id: u64,
        slot: SlotId,
        raw: String,
    ) -> Result<(CodeArtifact, CompiledUnit), ClassifiedError> {
        let cleaned = clean(&raw);
        self.apply(run_id, |state| state.slot_mut(slot).begin_compiling())?;

        match self.compiler.compile(&cleaned) {
            Ok(unit) => {
                debug!(run = run_id, slot = slot.as_str(), generation = unit.key.get(), "stage compiled");
                Ok((CodeArtifact { raw, cleaned }, unit))
            }
            Err(err) => {
                self.apply(run_id, |state| state.fail_inline(slot, err.clone()))?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
