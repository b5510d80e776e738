//! # Interruptible Threads
//!
//! OS threads that can be asked to stop at their next interruption point.
//!
//! ## Design
//!
//! - Each spawned thread owns an [`InterruptSource`]; the thread body sees
//!   the matching token as its *current* token.
//! - [`sleep`] and [`interruption_point`] are the interruption points: once
//!   interruption is requested they fail with [`Interrupted`], which the
//!   body propagates with `?`.
//! - [`InterruptibleThread::join`] hands back the body's value, or reports
//!   interruption or a panic as a [`JoinError`].
//!
//! A spawned thread starts with an empty thread-local registry; nothing the
//! spawning thread stored is visible to it.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, debug_span};

use crate::interrupt::{InterruptSource, InterruptToken, Interrupted};

/// Unique identifier for a spawned thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrandId(pub u64);

impl StrandId {
    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StrandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Strand({})", self.0)
    }
}

/// Global strand ID counter.
static NEXT_STRAND_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a new unique strand ID.
pub(crate) fn next_strand_id() -> StrandId {
    StrandId(NEXT_STRAND_ID.fetch_add(1, Ordering::Relaxed))
}

/// Name prefix from the runtime configuration, or "strand".
pub(crate) fn configured_name_prefix() -> String {
    crate::runtime_config()
        .map(|c| c.thread.name_prefix.clone())
        .unwrap_or_else(|| "strand".to_string())
}

/// Stack size from the runtime configuration, if one was set.
pub(crate) fn configured_stack_size() -> Option<usize> {
    crate::runtime_config().and_then(|c| c.thread.stack_size)
}

thread_local! {
    static CURRENT_TOKEN: RefCell<Option<InterruptToken>> = const { RefCell::new(None) };
}

/// The calling thread's interrupt token.
///
/// Threads not created by [`spawn`] get a token that is never interrupted.
pub fn current_token() -> InterruptToken {
    CURRENT_TOKEN
        .try_with(|cell| cell.borrow().clone())
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Sleep for `duration`, failing early if the calling thread is interrupted.
///
/// Interruption requested before the call fails immediately.
pub fn sleep(duration: Duration) -> Result<(), Interrupted> {
    let token = current_token();
    token.check()?;
    if token.wait(duration) {
        token.check()
    } else {
        Ok(())
    }
}

/// Fail if interruption has been requested for the calling thread.
pub fn interruption_point() -> Result<(), Interrupted> {
    current_token().check()
}

/// Error returned when joining a thread that did not complete normally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    /// The body returned early from an interruption point.
    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    /// The body panicked.
    #[error("thread panicked: {0}")]
    Panicked(String),
}

impl JoinError {
    /// Whether the thread ended because it was interrupted.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, JoinError::Interrupted(_))
    }
}

/// Configuration for spawning a thread.
#[derive(Debug, Clone, Default)]
pub struct ThreadConfig {
    /// Optional thread name; generated from the configured prefix otherwise.
    pub name: Option<String>,
    /// Stack size in bytes; the configured default applies when unset.
    pub stack_size: Option<usize>,
}

impl ThreadConfig {
    /// Create a new thread config with a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Set the stack size.
    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Spawn `body` on a new interruptible thread.
    pub fn spawn<F, T>(self, body: F) -> io::Result<InterruptibleThread<T>>
    where
        F: FnOnce() -> Result<T, Interrupted> + Send + 'static,
        T: Send + 'static,
    {
        let id = next_strand_id();
        let name = self
            .name
            .unwrap_or_else(|| format!("{}-{}", configured_name_prefix(), id.as_u64()));
        if name.contains('\0') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "thread name must not contain NUL bytes",
            ));
        }

        let source = InterruptSource::new();
        let token = source.token();

        let mut builder = std::thread::Builder::new().name(name.clone());
        if let Some(size) = self.stack_size.or_else(configured_stack_size) {
            builder = builder.stack_size(size);
        }

        let handle = builder.spawn(move || {
            CURRENT_TOKEN.with(|cell| *cell.borrow_mut() = Some(token));
            let span = debug_span!("strand", id = %id);
            let _entered = span.enter();
            body()
        })?;

        debug!(strand = %id, name = %name, "spawned interruptible thread");
        Ok(InterruptibleThread {
            id,
            name,
            source,
            handle,
        })
    }
}

/// Spawn `body` on a new interruptible thread with default configuration.
pub fn spawn<F, T>(body: F) -> io::Result<InterruptibleThread<T>>
where
    F: FnOnce() -> Result<T, Interrupted> + Send + 'static,
    T: Send + 'static,
{
    ThreadConfig::default().spawn(body)
}

/// A handle to a spawned interruptible thread.
///
/// Dropping the handle without joining detaches the thread.
#[derive(Debug)]
pub struct InterruptibleThread<T> {
    id: StrandId,
    name: String,
    source: InterruptSource,
    handle: JoinHandle<Result<T, Interrupted>>,
}

impl<T> InterruptibleThread<T> {
    /// The thread's strand ID.
    pub fn id(&self) -> StrandId {
        self.id
    }

    /// The thread's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A token observing this thread's interruption state.
    pub fn token(&self) -> InterruptToken {
        self.source.token()
    }

    /// Request interruption.
    ///
    /// The thread notices at its next interruption point.
    pub fn interrupt(&self) {
        self.interrupt_with_reason(None);
    }

    /// Request interruption with a reason carried by the resulting error.
    pub fn interrupt_with_reason(&self, reason: Option<String>) {
        debug!(strand = %self.id, reason = ?reason, "interrupt requested");
        self.source.interrupt_with_reason(reason);
    }

    /// Whether the thread body has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the thread finishes.
    pub fn join(self) -> Result<T, JoinError> {
        let id = self.id;
        let outcome = match self.handle.join() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(interrupted)) => Err(JoinError::Interrupted(interrupted)),
            Err(payload) => Err(JoinError::Panicked(panic_message(payload.as_ref()))),
        };
        match &outcome {
            Ok(_) => debug!(strand = %id, "joined interruptible thread"),
            Err(err) => debug!(strand = %id, error = %err, "interruptible thread failed"),
        }
        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}
