//! # Strand Runtime Library
//!
//! The Strand runtime provides:
//!
//! - **Thread-Local Variables**: typed handles whose values are private to
//!   each OS thread and created lazily from `Default`
//! - **Per-Thread Registry**: the type-erased storage behind those handles,
//!   dropped automatically when its thread exits
//! - **Interruptible Threads**: spawn, cooperative interruption at sleep
//!   points, and join with interruption reported as an error
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       STRAND RUNTIME                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │ ThreadLocal  │─▶│  Registry    │─▶│    Slot      │           │
//! │  │  (local.rs)  │  │ (storage.rs) │  │  (slot.rs)   │           │
//! │  └──────────────┘  └──────────────┘  └──────────────┘           │
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐                             │
//! │  │   Threads    │─▶│  Interrupts  │                             │
//! │  │ (thread.rs)  │  │(interrupt.rs)│                             │
//! │  └──────────────┘  └──────────────┘                             │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use strand_runtime::{thread, ThreadLocal};
//!
//! static COUNTER: ThreadLocal<i32> = ThreadLocal::new();
//!
//! COUNTER.set(10)?;
//! let child = thread::spawn(|| {
//!     assert_eq!(COUNTER.get().unwrap(), 0);
//!     COUNTER.set(11).unwrap();
//!     Ok(COUNTER.get().unwrap())
//! })?;
//! assert_eq!(child.join()?, 11);
//! assert_eq!(COUNTER.get()?, 10);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod interrupt;
pub mod local;
pub mod log;
pub mod slot;
pub mod storage;
pub mod thread;

use std::sync::OnceLock;

// Re-exports
pub use config::{ConfigError, LogConfig, LogLevel, RuntimeConfig, RuntimeConfigBuilder};
pub use error::{LocalError, LocalResult};
pub use interrupt::{InterruptSource, InterruptToken, Interrupted};
pub use local::{LocalKey, ThreadLocal};
pub use slot::Slot;
pub use storage::LocalStorage;
pub use thread::{InterruptibleThread, JoinError, StrandId, ThreadConfig};

/// Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Global runtime configuration.
static RUNTIME_CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();

/// Install the runtime configuration and logging.
///
/// The first installed configuration wins; returns `false` if one was
/// already present.
pub fn init_with_runtime_config(config: RuntimeConfig) -> bool {
    log::init(&config.log);
    RUNTIME_CONFIG.set(config).is_ok()
}

/// Initialize the runtime from `STRAND_*` environment variables.
///
/// See [`RuntimeConfig::from_env`] for the supported variables.
pub fn init_from_env() -> bool {
    init_with_runtime_config(RuntimeConfig::from_env())
}

/// Get the current runtime configuration.
///
/// Returns `None` until [`init_with_runtime_config`] or [`init_from_env`]
/// has been called.
pub fn runtime_config() -> Option<&'static RuntimeConfig> {
    RUNTIME_CONFIG.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
