use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};


/// Acquire a lock, panicking if it was poisoned. A poisoned lock means a thread
/// panicked while holding the guard, and the protected data may be half-updated.
pub trait LockOrPanic<T> {
    fn lock_or_panic(&self) -> MutexGuard<'_, T>;
}

impl<T> LockOrPanic<T> for Mutex<T> {
    #[track_caller]
    fn lock_or_panic(&self) -> MutexGuard<'_, T> {
        match self.lock() {
            Ok(guard) => guard,
            Err(poisoned) => panic!("mutex was poisoned: {poisoned}"),
        }
    }
}

/// `RwLock` counterpart of [`LockOrPanic`].
pub trait RwLockOrPanic<T> {
    fn read_or_panic(&self) -> RwLockReadGuard<'_, T>;
    fn write_or_panic(&self) -> RwLockWriteGuard<'_, T>;
}

impl<T> RwLockOrPanic<T> for RwLock<T> {
    #[track_caller]
    fn read_or_panic(&self) -> RwLockReadGuard<'_, T> {
        match self.read() {
            Ok(guard) => guard,
            Err(poisoned) => panic!("rwlock was poisoned: {poisoned}"),
        }
    }

    #[track_caller]
    fn write_or_panic(&self) -> RwLockWriteGuard<'_, T> {
        match self.write() {
            Ok(guard) => guard,
            Err(poisoned) => panic!("rwlock was poisoned: {poisoned}"),
        }
    }
}
