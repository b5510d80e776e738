//! Thread-Local Variables
//!
//! A [`ThreadLocal<T>`] is a typed handle whose identity, a [`LocalKey`],
//! indexes the calling thread's registry (see [`crate::storage`]). The
//! handle itself holds no value: every thread that reads or writes through
//! it sees its own copy, created from `T::default()` on first access.
//!
//! Handles are usually shared by reference across threads, either as a
//! `static` or captured by several thread closures.
//!
//! # Example
//!
//! ```rust,ignore
//! use strand_runtime::strand_local;
//!
//! strand_local! {
//!     static REQUEST_COUNT: u64;
//! }
//!
//! REQUEST_COUNT.set(3)?;
//! assert_eq!(REQUEST_COUNT.get()?, 3);
//!
//! std::thread::spawn(|| {
//!     // A new thread starts from the default.
//!     assert_eq!(REQUEST_COUNT.get().unwrap(), 0);
//! })
//! .join()
//! .unwrap();
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::LocalResult;
use crate::storage;

/// Sentinel stored in a handle whose key has not been assigned yet.
const UNASSIGNED: u64 = 0;

/// Unique key for a thread-local variable.
///
/// Keys come from a process-wide counter, start at 1 and are never reused,
/// so a key outlives any handle that used it without ever aliasing another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalKey(u64);

impl LocalKey {
    /// Generate a new unique key.
    pub fn new() -> Self {
        static NEXT_KEY: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw key value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for LocalKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Local({})", self.0)
    }
}

/// A thread-local variable.
///
/// The value is lazily initialized with `T::default()` the first time a
/// thread accesses it. Dropping the handle does not clear values already
/// stored by any thread; those are released when their thread exits.
pub struct ThreadLocal<T> {
    /// Key, assigned on first use for `const`-constructed handles.
    key: AtomicU64,
    /// Reserved propagation flag, see [`ThreadLocal::with_inherit`].
    inherit: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> ThreadLocal<T> {
    /// Create a new thread-local variable that does not inherit.
    ///
    /// This is `const` so handles can be declared as `static` items; the key
    /// is assigned on first use.
    pub const fn new() -> Self {
        Self::with_inherit(false)
    }

    /// Create a new thread-local variable with an explicit `inherit` flag.
    ///
    /// The flag is recorded but not acted upon: spawned threads always start
    /// from the default value. It is the hook for copying a parent's value
    /// into a child at spawn time.
    pub const fn with_inherit(inherit: bool) -> Self {
        Self {
            key: AtomicU64::new(UNASSIGNED),
            inherit,
            _marker: PhantomData,
        }
    }

    /// Create a handle with its key assigned immediately.
    pub fn new_keyed() -> Self {
        let local = Self::new();
        local.key.store(LocalKey::new().0, Ordering::Release);
        local
    }

    /// Key identifying this variable in every thread's registry.
    pub fn key(&self) -> LocalKey {
        let current = self.key.load(Ordering::Acquire);
        if current != UNASSIGNED {
            return LocalKey(current);
        }
        let fresh = LocalKey::new();
        match self
            .key
            .compare_exchange(UNASSIGNED, fresh.0, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => fresh,
            Err(existing) => LocalKey(existing),
        }
    }

    /// Whether the `inherit` flag was set at construction.
    pub fn inherits(&self) -> bool {
        self.inherit
    }

    /// Replace the calling thread's value.
    pub fn set(&self, value: T) -> LocalResult<()> {
        storage::set(self.key(), value)
    }

    /// Remove the calling thread's value.
    ///
    /// The next access on this thread starts again from `T::default()`.
    /// Returns whether a value was stored.
    pub fn remove(&self) -> LocalResult<bool> {
        storage::remove(self.key())
    }

    /// Remove and return the calling thread's value, if one was stored.
    pub fn take(&self) -> LocalResult<Option<T>> {
        storage::take(self.key())
    }

    /// Whether the calling thread currently holds a value.
    pub fn is_set(&self) -> LocalResult<bool> {
        storage::contains(self.key())
    }
}

impl<T: Default + 'static> ThreadLocal<T> {
    /// Borrow the calling thread's value, creating the default first.
    ///
    /// `f` may read other thread-locals that are already set on this thread.
    /// Anything that needs the registry mutably (a write, a remove, or the
    /// first access to another handle) returns
    /// [`LocalError::Busy`](crate::LocalError::Busy) from the inner call.
    pub fn with<F, R>(&self, f: F) -> LocalResult<R>
    where
        F: FnOnce(&T) -> R,
    {
        storage::with_or_create_default(self.key(), f)
    }

    /// Mutably borrow the calling thread's value, creating the default first.
    ///
    /// Any thread-local access from inside `f` returns
    /// [`LocalError::Busy`](crate::LocalError::Busy).
    pub fn with_mut<F, R>(&self, f: F) -> LocalResult<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        storage::get_or_create_default(self.key(), f)
    }

    /// Replace the calling thread's value and return the previous one.
    pub fn replace(&self, value: T) -> LocalResult<T> {
        self.with_mut(|current| std::mem::replace(current, value))
    }
}

impl<T: Clone + Default + 'static> ThreadLocal<T> {
    /// Get a copy of the calling thread's value.
    ///
    /// The first call on a thread returns `T::default()`, never a value set
    /// by another thread.
    pub fn get(&self) -> LocalResult<T> {
        self.with(T::clone)
    }
}

impl<T: 'static> Default for ThreadLocal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ThreadLocal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadLocal")
            .field("key", &self.key.load(Ordering::Acquire))
            .field("inherit", &self.inherit)
            .field("type_name", &std::any::type_name::<T>())
            .finish()
    }
}

/// Declare `static` thread-local variables.
///
/// Mirrors `std::thread_local!`, but each item is a [`ThreadLocal`] whose
/// values are created from `Default`.
///
/// # Example
///
/// ```rust,ignore
/// strand_local! {
///     static COUNTER: u32;
///     pub static NAME: String;
/// }
/// ```
#[macro_export]
macro_rules! strand_local {
    ($($(#[$attr:meta])* $vis:vis static $name:ident: $ty:ty;)*) => {
        $(
            $(#[$attr])*
            $vis static $name: $crate::local::ThreadLocal<$ty> =
                $crate::local::ThreadLocal::new();
        )*
    };
}
