//! Lock helpers
//!
//! Producers and listeners guard their queues and endpoint slots with std
//! locks. A poisoned lock means a panic happened while it was held; these
//! helpers turn that into an ordinary error instead of propagating the panic.

use std::sync::{LockResult, RwLockReadGuard, RwLockWriteGuard};

/// Map a poisoned mutex lock into an application error
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use kinetic::core::sync::handle_mutex_poison;
/// use kinetic::stream::StreamError;
///
/// let mutex = Mutex::new(42);
/// let guard = handle_mutex_poison(mutex.lock(), |message| StreamError::Internal { message })
///     .unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_mutex_poison<T, E>(
    result: LockResult<T>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<T, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (mutex poisoned by a panicking holder): {:?}",
            poison_err
        ))
    })
}

/// Map a poisoned RwLock read into an application error
pub fn handle_rwlock_read<T, E>(
    result: LockResult<RwLockReadGuard<T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockReadGuard<T>, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (RwLock read poisoned by a panicking writer): {:?}",
            poison_err
        ))
    })
}

/// Map a poisoned RwLock write into an application error
pub fn handle_rwlock_write<T, E>(
    result: LockResult<RwLockWriteGuard<T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockWriteGuard<T>, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (RwLock write poisoned by a panicking holder): {:?}",
            poison_err
        ))
    })
}
