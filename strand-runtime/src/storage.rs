//! Per-Thread Registry
//!
//! Each OS thread owns one [`LocalStorage`]: a map from [`LocalKey`] to
//! [`Slot`]. The map lives in a `std::thread_local!` cell, so it is created
//! empty the first time a thread touches it and dropped, together with every
//! slot it holds, when that thread exits. No other thread can reach it, so
//! it is never locked.
//!
//! The free functions in this module always operate on the calling thread's
//! registry; callers never name a thread.
//!
//! # Example
//!
//! ```rust,ignore
//! use strand_runtime::local::LocalKey;
//! use strand_runtime::storage;
//!
//! let key = LocalKey::new();
//! storage::set(key, 42u32)?;
//! assert_eq!(storage::get_cloned::<u32>(key)?, Some(42));
//! assert!(storage::remove(key)?);
//! ```

use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::trace;

use crate::error::{LocalError, LocalResult};
use crate::local::LocalKey;
use crate::slot::Slot;

/// Storage for thread-local values.
///
/// One instance exists per thread and holds every thread-local value that
/// thread has created.
#[derive(Debug, Default)]
pub struct LocalStorage {
    /// Map from key to slot.
    values: HashMap<LocalKey, Slot>,
}

impl LocalStorage {
    /// Create new empty storage.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Get the value for `key`, inserting `T::default()` if absent.
    pub fn get_or_create_default<T: Default + 'static>(
        &mut self,
        key: LocalKey,
    ) -> LocalResult<&mut T> {
        self.entry_or_insert::<T>(key, &mut None)?.downcast_mut::<T>()
    }

    /// Get a value by key.
    ///
    /// Returns `Ok(None)` when the key is absent.
    pub fn get<T: 'static>(&self, key: LocalKey) -> LocalResult<Option<&T>> {
        match self.values.get(&key) {
            Some(slot) => slot.downcast_ref::<T>().map(Some),
            None => Ok(None),
        }
    }

    /// Get a mutable value by key.
    pub fn get_mut<T: 'static>(&mut self, key: LocalKey) -> LocalResult<Option<&mut T>> {
        match self.values.get_mut(&key) {
            Some(slot) => slot.downcast_mut::<T>().map(Some),
            None => Ok(None),
        }
    }

    /// Replace or create the value for `key`.
    ///
    /// Any previous slot is dropped, whatever type it held.
    pub fn set<T: 'static>(&mut self, key: LocalKey, value: T) -> LocalResult<()> {
        self.replace_slot(key, Slot::create_from(value)).map(drop)
    }

    /// Remove the value for `key`. Returns whether an entry existed.
    pub fn remove(&mut self, key: LocalKey) -> bool {
        self.remove_slot(key).is_some()
    }

    /// Remove the value for `key` and return it.
    ///
    /// On a type mismatch the entry is left in place.
    pub fn take<T: 'static>(&mut self, key: LocalKey) -> LocalResult<Option<T>> {
        match self.values.get(&key) {
            None => return Ok(None),
            Some(slot) if !slot.holds::<T>() => {
                return Err(LocalError::mismatch::<T>(slot.type_name()));
            }
            Some(_) => {}
        }
        match self.remove_slot(key) {
            Some(slot) => slot.into_inner::<T>().map(Some),
            None => Ok(None),
        }
    }

    /// Check if a key exists.
    pub fn contains(&self, key: LocalKey) -> bool {
        self.values.contains_key(&key)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keys currently stored, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = LocalKey> + '_ {
        self.values.keys().copied()
    }

    /// Clear all values.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Slot for `key`, installing `pending` (or a fresh default) when vacant.
    ///
    /// `pending` is left untouched when the entry already exists, so the
    /// caller decides where the unused value is dropped.
    fn entry_or_insert<T: Default + 'static>(
        &mut self,
        key: LocalKey,
        pending: &mut Option<Slot>,
    ) -> LocalResult<&mut Slot> {
        self.values.try_reserve(1)?;
        Ok(match self.values.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let slot = pending.take().unwrap_or_else(Slot::create_default::<T>);
                entry.insert(created(key, slot))
            }
        })
    }

    /// Install `slot` under `key`, returning the slot it displaced.
    fn replace_slot(&mut self, key: LocalKey, slot: Slot) -> LocalResult<Option<Slot>> {
        self.values.try_reserve(1)?;
        Ok(self.values.insert(key, created(key, slot)))
    }

    fn remove_slot(&mut self, key: LocalKey) -> Option<Slot> {
        let removed = self.values.remove(&key);
        if let Some(slot) = &removed {
            trace!(key = %key, type_name = slot.type_name(), "removed thread-local slot");
        }
        removed
    }
}

fn created(key: LocalKey, slot: Slot) -> Slot {
    trace!(
        key = %key,
        type_name = slot.type_name(),
        address = ?slot.raw_address(),
        "stored thread-local slot"
    );
    slot
}

thread_local! {
    static THREAD_STORAGE: RefCell<LocalStorage> = RefCell::new(LocalStorage::new());
}

/// Run `f` with mutable access to the calling thread's registry.
///
/// Fails with [`LocalError::Busy`] when the registry is already borrowed by
/// an enclosing call on this thread, and with [`LocalError::Destroyed`] once
/// the thread's thread-locals are being torn down.
pub fn with_storage<F, R>(f: F) -> LocalResult<R>
where
    F: FnOnce(&mut LocalStorage) -> R,
{
    THREAD_STORAGE
        .try_with(|cell| {
            let mut storage = cell.try_borrow_mut().map_err(|_| LocalError::Busy)?;
            Ok(f(&mut *storage))
        })
        .map_err(|_| LocalError::Destroyed)?
}

/// Run `f` with shared access to the calling thread's registry.
///
/// Shared accesses nest: only an enclosing mutable access makes this fail
/// with [`LocalError::Busy`].
pub fn with_storage_ref<F, R>(f: F) -> LocalResult<R>
where
    F: FnOnce(&LocalStorage) -> R,
{
    THREAD_STORAGE
        .try_with(|cell| {
            let storage = cell.try_borrow().map_err(|_| LocalError::Busy)?;
            Ok(f(&storage))
        })
        .map_err(|_| LocalError::Destroyed)?
}

/// Default slot for `key`, built before any registry borrow is taken.
///
/// `None` when the calling thread already holds an entry. Building the value
/// outside the borrow lets a `Default` impl use other thread-locals.
fn pending_default<T: Default + 'static>(key: LocalKey) -> LocalResult<Option<Slot>> {
    if contains(key)? {
        Ok(None)
    } else {
        Ok(Some(Slot::create_default::<T>()))
    }
}

/// Run `f` on the value for `key`, creating `T::default()` first if absent.
///
/// `f` runs under the mutable registry borrow, so any thread-local access
/// from inside it fails with [`LocalError::Busy`].
pub fn get_or_create_default<T, F, R>(key: LocalKey, f: F) -> LocalResult<R>
where
    T: Default + 'static,
    F: FnOnce(&mut T) -> R,
{
    let mut pending = pending_default::<T>(key)?;
    let result = with_storage(|storage| -> LocalResult<R> {
        storage
            .entry_or_insert::<T>(key, &mut pending)?
            .downcast_mut::<T>()
            .map(f)
    });
    // A default that lost the race to a re-entrant insert is dropped here,
    // after the borrow ends.
    drop(pending);
    result?
}

/// Run `f` on a shared reference to the value for `key`, creating
/// `T::default()` first if absent.
///
/// Only the insertion of the default takes the registry mutably. `f` itself
/// runs under a shared borrow, so it may read other thread-locals that are
/// already set; writes from inside it fail with [`LocalError::Busy`].
pub fn with_or_create_default<T, F, R>(key: LocalKey, f: F) -> LocalResult<R>
where
    T: Default + 'static,
    F: FnOnce(&T) -> R,
{
    let mut pending = pending_default::<T>(key)?;
    if pending.is_some() {
        with_storage(|storage| storage.entry_or_insert::<T>(key, &mut pending).map(|_| ()))??;
    }
    // Nothing runs between the insert above and this read, so the entry is
    // present; `pending` is only dropped afterwards.
    let result = with_storage_ref(|storage| -> LocalResult<R> {
        match storage.get::<T>(key)? {
            Some(value) => Ok(f(value)),
            None => Ok(f(&T::default())),
        }
    });
    drop(pending);
    result?
}

/// Clone the value for `key` out of the calling thread's registry.
pub fn get_cloned<T: Clone + 'static>(key: LocalKey) -> LocalResult<Option<T>> {
    with_storage_ref(|storage| storage.get::<T>(key).map(|value| value.cloned()))?
}

/// Replace or create the value for `key` on the calling thread.
pub fn set<T: 'static>(key: LocalKey, value: T) -> LocalResult<()> {
    // The displaced slot is dropped after the borrow ends, so its destructor
    // may itself use thread-locals.
    let slot = Slot::create_from(value);
    let previous = with_storage(|storage| storage.replace_slot(key, slot))??;
    drop(previous);
    Ok(())
}

/// Remove the value for `key` on the calling thread.
///
/// Returns whether an entry existed. Once the thread's registry has been
/// torn down there is nothing left to remove, so this returns `Ok(false)`;
/// a re-entrant call still fails with [`LocalError::Busy`].
pub fn remove(key: LocalKey) -> LocalResult<bool> {
    let removed = match with_storage(|storage| storage.remove_slot(key)) {
        Ok(removed) => removed,
        Err(LocalError::Destroyed) => return Ok(false),
        Err(err) => return Err(err),
    };
    Ok(removed.is_some())
}

/// Remove the value for `key` on the calling thread and return it.
pub fn take<T: 'static>(key: LocalKey) -> LocalResult<Option<T>> {
    with_storage(|storage| storage.take::<T>(key))?
}

/// Whether the calling thread holds a value for `key`.
pub fn contains(key: LocalKey) -> LocalResult<bool> {
    with_storage_ref(|storage| storage.contains(key))
}

/// Number of values held by the calling thread.
pub fn len() -> LocalResult<usize> {
    with_storage_ref(LocalStorage::len)
}

/// Drop every value held by the calling thread.
pub fn clear() -> LocalResult<()> {
    let drained = with_storage(|storage| std::mem::take(&mut storage.values))?;
    drop(drained);
    Ok(())
}
