//! Typed Slots
//!
//! A [`Slot`] owns exactly one value behind `Box<dyn Any>` and records the
//! `TypeId` and type name it was created with. The registry stores slots of
//! many different types side by side; reading one back as the wrong type is
//! reported as [`LocalError::TypeMismatch`] instead of reinterpreting memory.

use std::any::{Any, TypeId};
use std::fmt;

use crate::error::{LocalError, LocalResult};

/// A type-erased holder for one thread-local value.
pub struct Slot {
    /// Type tag recorded at creation.
    type_id: TypeId,
    /// Human-readable name of the payload type, for diagnostics.
    type_name: &'static str,
    /// The payload.
    value: Box<dyn Any>,
}

impl Slot {
    /// Create a slot holding `T::default()`.
    ///
    /// A panic in `T::default` propagates to the caller.
    pub fn create_default<T: Default + 'static>() -> Self {
        Self::create_from(T::default())
    }

    /// Create a slot holding `value`.
    pub fn create_from<T: 'static>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Box::new(value),
        }
    }

    /// Untyped address of the payload.
    ///
    /// The address is stable for the lifetime of the slot. It is only an
    /// address; typed access goes through [`Slot::downcast_ref`].
    pub fn raw_address(&self) -> *const () {
        let payload: &dyn Any = &*self.value;
        payload as *const dyn Any as *const ()
    }

    /// Type tag recorded at creation.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Name of the payload type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the slot holds a `T`.
    pub fn holds<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Borrow the payload as `T`.
    pub fn downcast_ref<T: 'static>(&self) -> LocalResult<&T> {
        self.value
            .downcast_ref::<T>()
            .ok_or_else(|| LocalError::mismatch::<T>(self.type_name))
    }

    /// Mutably borrow the payload as `T`.
    pub fn downcast_mut<T: 'static>(&mut self) -> LocalResult<&mut T> {
        let found = self.type_name;
        self.value
            .downcast_mut::<T>()
            .ok_or_else(|| LocalError::mismatch::<T>(found))
    }

    /// Consume the slot and return the payload as `T`.
    pub fn into_inner<T: 'static>(self) -> LocalResult<T> {
        let found = self.type_name;
        self.value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| LocalError::mismatch::<T>(found))
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("type_name", &self.type_name)
            .field("address", &self.raw_address())
            .finish()
    }
}
