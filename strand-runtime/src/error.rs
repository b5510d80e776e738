//! Thread-Local Storage Errors
//!
//! Every fallible registry or handle operation returns [`LocalError`].
//! Errors propagate to the immediate caller; nothing in the registry retries.

use std::collections::TryReserveError;

use thiserror::Error;

/// Error returned by thread-local registry and handle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocalError {
    /// The registry could not grow to hold a new slot.
    #[error("failed to allocate thread-local slot: {0}")]
    AllocationFailure(#[from] TryReserveError),

    /// A slot was read back as a different type than it was created with.
    #[error("thread-local type mismatch: slot holds `{found}`, requested `{expected}`")]
    TypeMismatch {
        /// Type requested by the caller.
        expected: &'static str,
        /// Type recorded in the slot.
        found: &'static str,
    },

    /// The calling thread's registry is already borrowed by an enclosing accessor.
    #[error("thread-local storage is already borrowed on this thread")]
    Busy,

    /// The calling thread's registry has been torn down (thread is exiting).
    #[error("thread-local storage has been destroyed for this thread")]
    Destroyed,
}

impl LocalError {
    /// Build a type mismatch error for `T` against a recorded type name.
    pub(crate) fn mismatch<T: ?Sized>(found: &'static str) -> Self {
        LocalError::TypeMismatch {
            expected: std::any::type_name::<T>(),
            found,
        }
    }

    /// Whether this error reports a type mismatch.
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, LocalError::TypeMismatch { .. })
    }
}

/// Result alias for thread-local operations.
pub type LocalResult<T> = Result<T, LocalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_display() {
        let err = LocalError::mismatch::<String>("i32");
        assert!(err.is_type_mismatch());
        let message = err.to_string();
        assert!(message.starts_with("thread-local type mismatch: slot holds `i32`"));
        assert!(message.contains("String"));
    }

    #[test]
    fn test_allocation_failure_from_try_reserve() {
        let mut v: Vec<u64> = Vec::new();
        let reserve_err = v.try_reserve(usize::MAX).unwrap_err();
        let err: LocalError = reserve_err.into();
        assert!(matches!(err, LocalError::AllocationFailure(_)));
        assert!(err.to_string().starts_with("failed to allocate thread-local slot"));
    }

    #[test]
    fn test_busy_and_destroyed_display() {
        assert!(LocalError::Busy.to_string().contains("already borrowed"));
        assert!(LocalError::Destroyed.to_string().contains("destroyed"));
    }
}
