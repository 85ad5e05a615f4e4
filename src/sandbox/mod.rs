//! Sandbox compiler: generated component source in, runnable unit out.
//!
//! DESIGN
//! ======
//! Compilation is two phases. `transpile` parses the extended dialect (JSX
//! plus a TypeScript annotation subset) and lowers it to plain
//! `React.createElement` calls. Instantiation then evaluates the lowered
//! program in a fresh scope chain:
//!
//! ```text
//! globals (Math, JSON, Array, ...)
//!   └── capabilities (React, useState, useEffect, useCallback, useMemo, useRef)
//!         └── module (the generated declarations)
//! ```
//!
//! and pulls `Component` out of the module scope. Every successful compile
//! gets the next [`GenerationKey`]; failed compiles consume none.
//!
//! Rendering and error containment live in [`render`] and [`boundary`].
//!
//! The parser, the evaluator and the renderer all recurse on the native
//! stack. Their nesting caps assume [`SANDBOX_STACK_SIZE`], so every entry
//! into generated code goes through [`on_sandbox_stack`].

pub mod ast;
pub mod boundary;
pub mod capabilities;
pub mod interp;
pub mod intrinsics;
pub mod lexer;
pub mod parse;
pub mod promise;
pub mod regexp;
pub mod render;
pub mod timers;
pub mod transpile;
pub mod value;

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use serde::Serialize;

use crate::config::env_parse;
use crate::error::ClassifiedError;
use interp::{Env, Interp, Limits};
use timers::TimerQueue;
use value::{Function, Value};

pub const DEFAULT_FUEL: u64 = 1_000_000;
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;
pub const DEFAULT_MAX_RERENDERS: usize = 25;

/// Stack reserved for each thread that walks generated code.
pub const SANDBOX_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Name generated code must bind its component to.
pub const COMPONENT_SYMBOL: &str = "Component";

const MISSING_COMPONENT: &str =
    "Component not found in generated code. Make sure the component is named \"Component\".";

/// Identity of one successful compilation. Strictly increasing per compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct GenerationKey(u64);

impl GenerationKey {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for GenerationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxConfig {
    pub fuel: u64,
    pub max_call_depth: usize,
    pub max_rerenders: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self { fuel: DEFAULT_FUEL, max_call_depth: DEFAULT_MAX_CALL_DEPTH, max_rerenders: DEFAULT_MAX_RERENDERS }
    }
}

impl SandboxConfig {
    /// Optional:
    /// - `SANDBOX_FUEL`: default 1 000 000
    /// - `SANDBOX_MAX_CALL_DEPTH`: default 256
    /// - `SANDBOX_MAX_RERENDERS`: default 25
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            fuel: env_parse("SANDBOX_FUEL", DEFAULT_FUEL),
            max_call_depth: env_parse("SANDBOX_MAX_CALL_DEPTH", DEFAULT_MAX_CALL_DEPTH),
            max_rerenders: env_parse("SANDBOX_MAX_RERENDERS", DEFAULT_MAX_RERENDERS),
        }
    }

    #[must_use]
    pub fn limits(&self) -> Limits {
        Limits { fuel: self.fuel, max_call_depth: self.max_call_depth }
    }
}

/// An instantiated component bound to its generation key.
#[derive(Clone)]
pub struct CompiledUnit {
    pub key: GenerationKey,
    pub component: Function,
    /// Lowered plain-dialect source.
    pub code: String,
    pub config: SandboxConfig,
    /// Timers the unit registered, shared with the session that renders it.
    pub timers: TimerQueue,
}

impl fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUnit").field("key", &self.key).field("code_len", &self.code.len()).finish()
    }
}

pub struct SandboxCompiler {
    config: SandboxConfig,
    next_key: AtomicU64,
}

impl SandboxCompiler {
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        Self { config, next_key: AtomicU64::new(1) }
    }

    #[must_use]
    pub fn config(&self) -> SandboxConfig {
        self.config
    }

    /// Transpile and instantiate cleaned component source.
    ///
    /// # Errors
    ///
    /// `Transform` when the source does not parse, `Execution` when the
    /// program throws at top level or leaves `Component` undefined.
    pub fn compile(&self, source: &str) -> Result<CompiledUnit, ClassifiedError> {
        on_sandbox_stack(|| self.compile_here(source)).unwrap_or_else(|err| {
            tracing::error!(error = %err, "failed to start sandbox thread");
            Err(ClassifiedError::execution(format!("could not start sandbox: {err}")))
        })
    }

    fn compile_here(&self, source: &str) -> Result<CompiledUnit, ClassifiedError> {
        let transpiled = transpile::transpile(source).map_err(|err| {
            tracing::debug!(error = %err, "generated source failed to transpile");
            ClassifiedError::transform(err.to_string())
        })?;

        let timers = TimerQueue::default();
        let globals = Env::root();
        intrinsics::install_globals(&globals, &timers);
        let capabilities = globals.child(true);
        capabilities::install(&capabilities);
        let module = capabilities.child(true);

        let mut interp = Interp::new(self.config.limits());
        interp.run_program(&transpiled.program, &module).map_err(|thrown| {
            tracing::debug!(error = %thrown.describe(), "generated program threw during instantiation");
            ClassifiedError::execution(thrown.message())
        })?;

        let component = match module.lookup_own(COMPONENT_SYMBOL) {
            Some(Value::Function(f)) => f,
            Some(other) => {
                return Err(ClassifiedError::execution(format!(
                    "\"{COMPONENT_SYMBOL}\" must be a function component, got {}",
                    other.type_of()
                )));
            }
            None => return Err(ClassifiedError::execution(MISSING_COMPONENT)),
        };

        let key = GenerationKey(self.next_key.fetch_add(1, Ordering::SeqCst));
        tracing::debug!(generation = key.get(), code_len = transpiled.code.len(), "compiled generated component");
        Ok(CompiledUnit { key, component, code: transpiled.code, config: self.config, timers })
    }
}

/// Run `f` on a scoped thread with [`SANDBOX_STACK_SIZE`] of stack, inside
/// the caller's tracing span. Panics in `f` resume on the caller.
///
/// # Errors
///
/// The thread could not be spawned; `f` has not run.
pub fn on_sandbox_stack<R: Send>(f: impl FnOnce() -> R + Send) -> io::Result<R> {
    let span = tracing::Span::current();
    thread::scope(|scope| {
        let handle = thread::Builder::new()
            .name("sandbox".into())
            .stack_size(SANDBOX_STACK_SIZE)
            .spawn_scoped(scope, move || span.in_scope(f))?;
        match handle.join() {
            Ok(out) => Ok(out),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    })
}

impl Default for SandboxCompiler {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
