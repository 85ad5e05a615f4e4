//! Render recovery boundary for one display slot.
//!
//! DESIGN
//! ======
//! A boundary hosts at most one mounted [`RenderSession`]. Anything thrown
//! while rendering, in an effect, in an event handler or in a timer callback
//! is captured as a `Runtime` error and replaces the slot's output with an error surface.
//! Nothing escapes to the other slot or the pipeline.
//!
//! Captured state is keyed by [`GenerationKey`]: rendering the unit that is
//! already mounted is a no-op that keeps whatever was captured, and a unit
//! with a new key discards the old session and error and mounts fresh, even
//! if its source text is identical.
//!
//! ```text
//! Empty ──► Compiling ──► Displaying ◄──► (event) ──► RuntimeFailed
//!                     ├─► TransformFailed
//!                     └─► ExecutionFailed
//! ```

use std::io;

use serde::Serialize;

use super::render::{DispatchError, RenderSession, VNode};
use super::value::Throw;
use super::{CompiledUnit, GenerationKey, on_sandbox_stack};
use crate::error::{ClassifiedError, ErrorCode, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Empty,
    Compiling,
    Displaying,
    TransformFailed,
    ExecutionFailed,
    RuntimeFailed,
}

/// Inline error shown in place of a slot's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorSurface {
    pub title: &'static str,
    pub message: String,
}

/// Serializable projection of a slot for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotView {
    pub state: SlotState,
    pub generation: Option<GenerationKey>,
    pub html: Option<String>,
    pub tree: Vec<VNode>,
    pub error: Option<ErrorSurface>,
    /// Timers waiting on [`RecoveryBoundary::advance`].
    pub pending_timers: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SlotEventError {
    #[error("slot is not displaying a component")]
    NotDisplaying,
    #[error("no handler `{0}` in the current render")]
    UnknownHandler(String),
    #[error("{0}")]
    Runtime(ClassifiedError),
}

impl ErrorCode for SlotEventError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotDisplaying => "E_SLOT_NOT_DISPLAYING",
            Self::UnknownHandler(_) => "E_UNKNOWN_HANDLER",
            Self::Runtime(err) => err.error_code(),
        }
    }
}

pub struct RecoveryBoundary {
    name: &'static str,
    key: Option<GenerationKey>,
    state: SlotState,
    session: Option<RenderSession>,
    error: Option<ClassifiedError>,
}

impl RecoveryBoundary {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self { name, key: None, state: SlotState::Empty, session: None, error: None }
    }

    #[must_use]
    pub fn state(&self) -> SlotState {
        self.state
    }

    #[must_use]
    pub fn key(&self) -> Option<GenerationKey> {
        self.key
    }

    #[must_use]
    pub fn error(&self) -> Option<&ClassifiedError> {
        self.error.as_ref()
    }

    /// Back to `Empty`, unmounting whatever is shown.
    pub fn reset(&mut self) {
        self.unmount();
        self.key = None;
        self.error = None;
        self.state = SlotState::Empty;
    }

    /// A compile for this slot is in flight.
    pub fn begin_compiling(&mut self) {
        self.reset();
        self.state = SlotState::Compiling;
    }

    /// Show a compile failure inline. Only `Transform` and `Execution` are
    /// compile failures; anything else is treated as `Execution`.
    pub fn fail_compile(&mut self, error: ClassifiedError) {
        self.unmount();
        self.key = None;
        self.state = match error.kind {
            ErrorKind::Transform => SlotState::TransformFailed,
            _ => SlotState::ExecutionFailed,
        };
        tracing::info!(slot = self.name, error = %error, "compile failed");
        self.error = Some(error);
    }

    /// Mount `unit` unless it is the unit already mounted.
    ///
    /// # Errors
    ///
    /// The captured `Runtime` error when the first render or its effects
    /// throw, or the error already captured for this generation.
    pub fn render(&mut self, unit: &CompiledUnit) -> Result<(), ClassifiedError> {
        if self.key == Some(unit.key) {
            return match &self.error {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            };
        }

        let mounted = on_sandbox_stack(|| self.mount_here(unit)).unwrap_or_else(|err| {
            self.key = Some(unit.key);
            Err(stack_error(&err))
        });
        match mounted {
            Ok(()) => {
                self.state = SlotState::Displaying;
                tracing::debug!(slot = self.name, generation = unit.key.get(), "mounted component");
                Ok(())
            }
            Err(thrown) => Err(self.capture(ClassifiedError::runtime(thrown.message()))),
        }
    }

    /// Route a UI event to a handler of the displayed component.
    ///
    /// # Errors
    ///
    /// `NotDisplaying` outside `Displaying`, `UnknownHandler` for stale ids,
    /// `Runtime` when the handler or the resulting re-render throws.
    pub fn dispatch(&mut self, handler: &str, payload: &serde_json::Value) -> Result<(), SlotEventError> {
        if self.state != SlotState::Displaying {
            return Err(SlotEventError::NotDisplaying);
        }
        let Some(session) = self.session.as_mut() else {
            return Err(SlotEventError::NotDisplaying);
        };
        let dispatched = on_sandbox_stack(|| session.dispatch(handler, payload))
            .unwrap_or_else(|err| Err(DispatchError::Thrown(stack_error(&err))));
        match dispatched {
            Ok(()) => Ok(()),
            Err(DispatchError::UnknownHandler(id)) => Err(SlotEventError::UnknownHandler(id)),
            Err(DispatchError::Thrown(thrown)) => {
                Err(SlotEventError::Runtime(self.capture(ClassifiedError::runtime(thrown.message()))))
            }
        }
    }

    /// Move the displayed component's virtual clock forward by `ms`,
    /// running the timers that come due. Returns how many callbacks ran.
    ///
    /// # Errors
    ///
    /// `NotDisplaying` outside `Displaying`, `Runtime` when a callback or the
    /// resulting re-render throws.
    pub fn advance(&mut self, ms: f64) -> Result<usize, SlotEventError> {
        if self.state != SlotState::Displaying {
            return Err(SlotEventError::NotDisplaying);
        }
        let Some(session) = self.session.as_mut() else {
            return Err(SlotEventError::NotDisplaying);
        };
        let advanced = on_sandbox_stack(|| session.advance(ms)).unwrap_or_else(|err| Err(stack_error(&err)));
        advanced.map_err(|thrown| SlotEventError::Runtime(self.capture(ClassifiedError::runtime(thrown.message()))))
    }

    #[must_use]
    pub fn view(&self) -> SlotView {
        let displaying = self.state == SlotState::Displaying;
        let session = self.session.as_ref().filter(|_| displaying);
        SlotView {
            state: self.state,
            generation: self.key,
            html: session.map(RenderSession::html),
            tree: session.map(|s| s.tree().to_vec()).unwrap_or_default(),
            error: self.error.as_ref().map(|error| ErrorSurface {
                title: match error.kind {
                    ErrorKind::Runtime => "Render Error",
                    _ => "Compilation Error",
                },
                message: error.to_string(),
            }),
            pending_timers: session.map_or(0, RenderSession::pending_timers),
        }
    }

    fn capture(&mut self, error: ClassifiedError) -> ClassifiedError {
        tracing::warn!(
            slot = self.name,
            generation = self.key.map(GenerationKey::get),
            error = %error,
            "captured render error"
        );
        self.state = SlotState::RuntimeFailed;
        self.error = Some(error.clone());
        error
    }

    fn mount_here(&mut self, unit: &CompiledUnit) -> Result<(), Throw> {
        self.unmount_here();
        self.key = Some(unit.key);
        self.error = None;

        let mut session = RenderSession::new(unit.component.clone(), unit.config.limits(), unit.config.max_rerenders)
            .with_timers(unit.timers.clone());
        let mounted = session.mount();
        self.session = Some(session);
        mounted
    }

    fn unmount(&mut self) {
        if self.session.is_none() {
            return;
        }
        if let Err(err) = on_sandbox_stack(|| self.unmount_here()) {
            tracing::error!(slot = self.name, error = %err, "failed to start sandbox thread; skipping effect cleanups");
            self.session = None;
        }
    }

    fn unmount_here(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.unmount();
        }
    }
}

fn stack_error(err: &io::Error) -> Throw {
    Throw::error("Error", format!("could not start sandbox: {err}"))
}

#[cfg(test)]
#[path = "boundary_test.rs"]
mod tests;
