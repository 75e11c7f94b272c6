use parking_lot::RwLock;
use std::sync::Arc;

/// A value replaced as a whole; readers hold an `Arc` to the version they loaded
pub type Swap<T> = Arc<RwLock<Arc<T>>>;

pub fn new_swap<T>(value: T) -> Swap<T> {
    Arc::new(RwLock::new(Arc::new(value)))
}

/// Current version; the lock is held only for the `Arc` clone
pub fn load<T>(swap: &Swap<T>) -> Arc<T> {
    swap.read().clone()
}

/// Publishes `value`, returning the new shared version
pub fn store<T>(swap: &Swap<T>, value: T) -> Arc<T> {
    let value = Arc::new(value);
    // the previous version is released outside the lock
    let previous = std::mem::replace(&mut *swap.write(), value.clone());
    drop(previous);
    value
}

/// Publishes `value` unless `keep_current(current, new)` holds under the
/// write lock. The new version is returned either way.
pub fn store_unless<T>(
    swap: &Swap<T>,
    value: T,
    keep_current: impl FnOnce(&T, &T) -> bool,
) -> Arc<T> {
    let value = Arc::new(value);
    let mut guard = swap.write();
    if keep_current(&guard, &value) {
        return value;
    }
    let previous = std::mem::replace(&mut *guard, value.clone());
    drop(guard);
    drop(previous);
    value
}
