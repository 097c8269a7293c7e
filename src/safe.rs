//! Panic-to-error boundary for user-supplied functions
//!
//! Every "safe" operation in this crate runs the caller's function inside a
//! recovery boundary. A panic raised by that function does not unwind past the
//! boundary: it is intercepted and turned into a [`PanicError`] value.
//!
//! - **[`recover`]** - runs an infallible closure, returning `Err(PanicError)` on panic.
//! - **[`safe_execute`]** - runs a fallible closure. Errors it returns normally pass
//!   through unchanged as [`SafeError::Failed`]; panics become [`SafeError::Panicked`].
//! - **[`safe_execute_traced`]** - same, but the error also carries a stack trace
//!   captured at the fault, capped at [`DEFAULT_TRACE_CAPACITY`] bytes.
//!
//! # Example
//!
//! ```
//! use slicekit::safe::{safe_execute, SafeError};
//!
//! let ok: Result<i32, SafeError<String>> = safe_execute(|| Ok(21 * 2));
//! assert_eq!(ok.unwrap(), 42);
//!
//! let failed = safe_execute(|| -> Result<i32, String> { panic!("boom") });
//! assert!(failed.unwrap_err().is_panic());
//! ```
//!
//! # How the boundary works
//!
//! A process-wide panic hook is installed the first time a boundary is entered.
//! While a boundary is active on the current thread, the hook stays silent (and
//! records a backtrace when the traced variant asked for one). Outside of any
//! boundary the hook forwards to whatever hook was installed before it, so
//! panics elsewhere in the program are reported as usual.
//!
//! The boundary itself is a guard value: the per-thread state it sets up is
//! restored when the guard drops, which happens on the normal path and on the
//! panic path alike.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use thiserror::Error;

/// Default cap, in bytes, on the stack trace kept by the traced variant
pub const DEFAULT_TRACE_CAPACITY: usize = 4096;

/// A panic intercepted at a recovery boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("encountered panic: {message}{}", trace_suffix(.trace))]
pub struct PanicError {
    message: String,
    trace: Option<String>,
}

fn trace_suffix(trace: &Option<String>) -> String {
    match trace {
        Some(trace) => format!("\nStack trace:\n{}", trace),
        None => String::new(),
    }
}

impl PanicError {
    /// The panic payload rendered as text
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The captured stack trace, if the boundary was asked to record one
    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }
}

/// Outcome of a fallible function run under a recovery boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SafeError<E> {
    /// The function returned this error itself
    #[error("{0}")]
    Failed(E),

    /// The function panicked
    #[error(transparent)]
    Panicked(#[from] PanicError),
}

impl<E> SafeError<E> {
    /// Returns true if this error came from an intercepted panic
    pub fn is_panic(&self) -> bool {
        matches!(self, SafeError::Panicked(_))
    }

    /// The intercepted panic, if any
    pub fn panic(&self) -> Option<&PanicError> {
        match self {
            SafeError::Panicked(err) => Some(err),
            SafeError::Failed(_) => None,
        }
    }

    /// The error returned by the function, if it did not panic
    pub fn into_failed(self) -> Option<E> {
        match self {
            SafeError::Failed(err) => Some(err),
            SafeError::Panicked(_) => None,
        }
    }

    /// Transform the function's own error, leaving panics untouched
    pub fn map_failed<F, O>(self, op: O) -> SafeError<F>
    where
        O: FnOnce(E) -> F,
    {
        match self {
            SafeError::Failed(err) => SafeError::Failed(op(err)),
            SafeError::Panicked(err) => SafeError::Panicked(err),
        }
    }
}

/// Configuration for a recovery boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverConfig {
    /// Whether to record a stack trace for intercepted panics
    /// Default: false
    pub capture_trace: bool,

    /// Maximum number of bytes of trace to keep
    /// Default: 4096
    pub trace_capacity: usize,
}

impl Default for RecoverConfig {
    fn default() -> Self {
        Self {
            capture_trace: false,
            trace_capacity: DEFAULT_TRACE_CAPACITY,
        }
    }
}

impl RecoverConfig {
    /// A boundary that records stack traces
    pub fn traced() -> Self {
        Self {
            capture_trace: true,
            ..Default::default()
        }
    }

    /// Set the trace capacity in bytes
    pub fn with_trace_capacity(mut self, trace_capacity: usize) -> Self {
        self.trace_capacity = trace_capacity;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Inactive,
    Plain,
    Traced,
}

thread_local! {
    static ACTIVE: Cell<Capture> = const { Cell::new(Capture::Inactive) };
    static LAST_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            // try_with: the hook may run while thread-locals are being torn down
            match ACTIVE.try_with(Cell::get).unwrap_or(Capture::Inactive) {
                Capture::Inactive => previous(info),
                Capture::Plain => {}
                Capture::Traced => {
                    let trace = Backtrace::force_capture().to_string();
                    let _ = LAST_TRACE.try_with(|slot| *slot.borrow_mut() = Some(trace));
                }
            }
        }));
    });
}

/// Scoped recovery state for the current thread
struct Boundary {
    previous: Capture,
}

impl Boundary {
    fn enter(capture: Capture) -> Self {
        install_hook();
        let previous = ACTIVE.with(|active| active.replace(capture));
        if capture == Capture::Traced {
            LAST_TRACE.with(|slot| slot.borrow_mut().take());
        }
        Self { previous }
    }

    fn take_trace(&self) -> Option<String> {
        LAST_TRACE
            .try_with(|slot| slot.borrow_mut().take())
            .ok()
            .flatten()
    }
}

impl Drop for Boundary {
    fn drop(&mut self) {
        let _ = ACTIVE.try_with(|active| active.set(self.previous));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Cut `trace` down to at most `capacity` bytes on a char boundary
fn truncate_trace(mut trace: String, capacity: usize) -> String {
    if trace.len() <= capacity {
        return trace;
    }
    let mut end = capacity;
    while !trace.is_char_boundary(end) {
        end -= 1;
    }
    trace.truncate(end);
    trace
}

/// Run `op` under a recovery boundary configured by `config`
///
/// The closure is wrapped in [`AssertUnwindSafe`]: if it panics after
/// partially mutating captured state, that state is observable afterwards.
pub fn recover_with<T, F>(config: &RecoverConfig, op: F) -> Result<T, PanicError>
where
    F: FnOnce() -> T,
{
    let capture = if config.capture_trace {
        Capture::Traced
    } else {
        Capture::Plain
    };
    let boundary = Boundary::enter(capture);

    match panic::catch_unwind(AssertUnwindSafe(op)) {
        Ok(value) => Ok(value),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            let trace = config.capture_trace.then(|| {
                // A panic re-raised with resume_unwind bypasses the hook
                let raw = boundary
                    .take_trace()
                    .unwrap_or_else(|| Backtrace::force_capture().to_string());
                truncate_trace(raw, config.trace_capacity)
            });
            Err(PanicError { message, trace })
        }
    }
}

/// Run `op`, converting a panic into a [`PanicError`] without a trace
pub fn recover<T, F>(op: F) -> Result<T, PanicError>
where
    F: FnOnce() -> T,
{
    recover_with(&RecoverConfig::default(), op)
}

/// Run a fallible `op` under a boundary configured by `config`
pub fn safe_execute_with<T, E, F>(config: &RecoverConfig, op: F) -> Result<T, SafeError<E>>
where
    F: FnOnce() -> Result<T, E>,
{
    recover_with(config, op)?.map_err(SafeError::Failed)
}

/// Run a fallible `op`, converting a panic into [`SafeError::Panicked`]
///
/// Errors returned by `op` itself come back unchanged as [`SafeError::Failed`].
pub fn safe_execute<T, E, F>(op: F) -> Result<T, SafeError<E>>
where
    F: FnOnce() -> Result<T, E>,
{
    safe_execute_with(&RecoverConfig::default(), op)
}

/// Like [`safe_execute`], but an intercepted panic also carries a stack trace
pub fn safe_execute_traced<T, E, F>(op: F) -> Result<T, SafeError<E>>
where
    F: FnOnce() -> Result<T, E>,
{
    safe_execute_with(&RecoverConfig::traced(), op)
}
