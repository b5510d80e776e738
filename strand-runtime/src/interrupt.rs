//! Cooperative Interruption
//!
//! This module provides interruption sources and tokens for threads spawned
//! through [`crate::thread`].
//!
//! # Design
//!
//! Interruption is cooperative: requesting it only flips a flag and wakes
//! anyone waiting on the token. The interrupted thread observes the request
//! at its next interruption point, typically [`crate::thread::sleep`], which
//! then fails with [`Interrupted`].
//!
//! # Components
//!
//! - `InterruptToken`: A read-only token that can be checked or waited on
//! - `InterruptSource`: Creates a token and owns the ability to interrupt it
//!
//! # Example
//!
//! ```rust,ignore
//! use strand_runtime::interrupt::InterruptSource;
//! use std::time::Duration;
//!
//! let source = InterruptSource::new();
//! let token = source.token();
//!
//! std::thread::spawn(move || {
//!     while !token.wait(Duration::from_millis(100)) {
//!         // Do work...
//!     }
//! });
//!
//! source.interrupt();
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Counter for generating unique interrupt token IDs.
static TOKEN_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Shared state behind a source and its tokens.
#[derive(Debug)]
struct InterruptState {
    /// Whether interruption has been requested.
    interrupted: AtomicBool,
    /// Guards the wake-up handshake with waiters.
    notify: (Mutex<bool>, Condvar),
    /// Interruption reason (optional message).
    reason: Mutex<Option<String>>,
    /// Timestamp when interruption was requested.
    interrupted_at: Mutex<Option<Instant>>,
}

impl InterruptState {
    fn new() -> Self {
        Self {
            interrupted: AtomicBool::new(false),
            notify: (Mutex::new(false), Condvar::new()),
            reason: Mutex::new(None),
            interrupted_at: Mutex::new(None),
        }
    }
}

/// A token that can be checked or waited on for interruption.
///
/// Tokens are created by `InterruptSource` and are cheap to clone.
#[derive(Debug, Clone)]
pub struct InterruptToken {
    /// Unique token ID.
    id: u64,
    /// Shared interruption state.
    state: Arc<InterruptState>,
}

impl InterruptToken {
    fn new() -> Self {
        Self {
            id: TOKEN_ID_COUNTER.fetch_add(1, Ordering::SeqCst),
            state: Arc::new(InterruptState::new()),
        }
    }

    /// Get the token ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Check if interruption has been requested.
    pub fn is_interrupted(&self) -> bool {
        self.state.interrupted.load(Ordering::SeqCst)
    }

    /// Get the interruption reason, if any.
    pub fn reason(&self) -> Option<String> {
        self.state.reason.lock().clone()
    }

    /// Get the time when interruption was requested.
    pub fn interrupted_at(&self) -> Option<Instant> {
        *self.state.interrupted_at.lock()
    }

    /// Block until interruption is requested or `timeout` elapses.
    ///
    /// Returns true if interrupted, false if the full timeout elapsed.
    pub fn wait(&self, timeout: Duration) -> bool {
        // Fast path: already interrupted
        if self.is_interrupted() {
            return true;
        }

        let deadline = Instant::now().checked_add(timeout);
        let (lock, cvar) = &self.state.notify;
        let mut signalled = lock.lock();
        while !*signalled {
            match deadline {
                Some(deadline) => {
                    if cvar.wait_until(&mut signalled, deadline).timed_out() {
                        return *signalled || self.is_interrupted();
                    }
                }
                None => cvar.wait(&mut signalled),
            }
        }
        true
    }

    /// Check interruption and return an error if interrupted.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_interrupted() {
            Err(Interrupted {
                reason: self.reason(),
            })
        } else {
            Ok(())
        }
    }
}

/// A token that is never interrupted.
static NONE_TOKEN: OnceLock<InterruptToken> = OnceLock::new();

impl Default for InterruptToken {
    /// Returns a token that is never interrupted.
    fn default() -> Self {
        NONE_TOKEN.get_or_init(InterruptToken::new).clone()
    }
}

/// An interrupt source that creates and controls an interrupt token.
///
/// The source owns the ability to request interruption; tokens derived
/// from it can only observe it.
#[derive(Debug)]
pub struct InterruptSource {
    /// The token associated with this source.
    token: InterruptToken,
}

impl InterruptSource {
    /// Create a new interrupt source.
    pub fn new() -> Self {
        Self {
            token: InterruptToken::new(),
        }
    }

    /// Get a token from this source.
    pub fn token(&self) -> InterruptToken {
        self.token.clone()
    }

    /// Request interruption.
    pub fn interrupt(&self) {
        self.interrupt_with_reason(None);
    }

    /// Request interruption with a reason.
    ///
    /// The first request wins; later reasons are ignored.
    pub fn interrupt_with_reason(&self, reason: Option<String>) {
        let state = &self.token.state;

        // Reason and timestamp are recorded before the flag is published, so
        // anyone observing the flag also observes them.
        let mut stored_reason = state.reason.lock();
        if state.interrupted.load(Ordering::SeqCst) {
            return;
        }
        *stored_reason = reason;
        *state.interrupted_at.lock() = Some(Instant::now());
        state.interrupted.store(true, Ordering::SeqCst);
        drop(stored_reason);

        // Notify waiters
        let (lock, cvar) = &state.notify;
        let mut signalled = lock.lock();
        *signalled = true;
        cvar.notify_all();
    }

    /// Check if interruption has been requested.
    pub fn is_interrupted(&self) -> bool {
        self.token.is_interrupted()
    }
}

impl Default for InterruptSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Error returned by an interruption point after interruption was requested.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("thread interrupted{}", format_reason(.reason))]
pub struct Interrupted {
    /// The interruption reason, if provided.
    pub reason: Option<String>,
}

fn format_reason(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(": {}", reason),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_source_basic() {
        let source = InterruptSource::new();
        let token = source.token();

        assert!(!token.is_interrupted());
        source.interrupt();
        assert!(token.is_interrupted());
        assert!(source.is_interrupted());
    }

    #[test]
    fn test_interrupt_with_reason() {
        let source = InterruptSource::new();
        let token = source.token();

        source.interrupt_with_reason(Some("shutdown".into()));
        assert_eq!(token.reason(), Some("shutdown".into()));
        assert!(token.interrupted_at().is_some());

        // First reason wins
        source.interrupt_with_reason(Some("later".into()));
        assert_eq!(token.reason(), Some("shutdown".into()));
    }

    #[test]
    fn test_token_check() {
        let source = InterruptSource::new();
        let token = source.token();

        assert!(token.check().is_ok());
        source.interrupt();
        assert_eq!(token.check(), Err(Interrupted { reason: None }));
    }

    #[test]
    fn test_wait_immediate() {
        let source = InterruptSource::new();
        let token = source.token();

        source.interrupt();

        // Should return immediately since already interrupted
        assert!(token.wait(Duration::from_secs(1)));
    }

    #[test]
    fn test_wait_timeout() {
        let source = InterruptSource::new();
        let token = source.token();

        let started = Instant::now();
        assert!(!token.wait(Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_wakes_on_interrupt() {
        let source = InterruptSource::new();
        let token = source.token();

        let waiter = std::thread::spawn(move || {
            let started = Instant::now();
            let interrupted = token.wait(Duration::from_secs(30));
            (interrupted, started.elapsed())
        });

        std::thread::sleep(Duration::from_millis(20));
        source.interrupt();

        let (interrupted, elapsed) = waiter.join().unwrap();
        assert!(interrupted);
        assert!(elapsed < Duration::from_secs(30));
    }

    #[test]
    fn test_default_token() {
        let token = InterruptToken::default();
        assert!(!token.is_interrupted());
        assert_eq!(token.id(), InterruptToken::default().id());
    }

    #[test]
    fn test_token_clone() {
        let source = InterruptSource::new();
        let token1 = source.token();
        let token2 = token1.clone();
        assert_eq!(token1.id(), token2.id());

        source.interrupt();

        assert!(token1.is_interrupted());
        assert!(token2.is_interrupted());
    }

    #[test]
    fn test_interrupted_display() {
        let err = Interrupted { reason: None };
        assert_eq!(err.to_string(), "thread interrupted");

        let err = Interrupted {
            reason: Some("timeout".into()),
        };
        assert_eq!(err.to_string(), "thread interrupted: timeout");
    }
}
