use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A thread-safe, reference-counted resource container with read-write locking.
///
/// `MtResource` provides synchronized access to a value of type `T` that can be shared
/// across threads. It uses an `Arc<RwLock<T>>` internally. Chunks keep their block volume
/// in one of these. Mesh workers hold the read guard only long enough to copy the volume.
///
/// The lock does not poison: a worker that panics while holding a read guard leaves the
/// resource usable for everyone else.
///
/// # Examples
///
/// ## Sharing Between Threads
/// ```
/// # use std::thread;
/// use voxel_streaming::core::MtResource;
///
/// let counter = MtResource::new(0);
/// let counter_clone = counter.clone();
///
/// let handle = thread::spawn(move || {
///     *counter_clone.get_mut() += 1;
/// });
///
/// handle.join().unwrap();
/// assert_eq!(*counter.get(), 1);
/// ```
///
/// # Performance Considerations
/// - Read operations (`get()`) can occur concurrently
/// - Write operations (`get_mut()`) are exclusive and will block other operations
pub struct MtResource<T: Send + Sync> {
    resource: Arc<RwLock<T>>,
}

impl<T: Send + Sync> MtResource<T> {
    /// Creates a new `MtResource` containing the given value.
    pub fn new(resource: T) -> Self {
        Self {
            resource: Arc::new(RwLock::new(resource)),
        }
    }

    /// Returns a read-only guard that allows reading the contained value.
    pub fn get(&self) -> RwLockReadGuard<'_, T> {
        self.resource.read()
    }

    /// Returns a mutable guard that allows modifying the contained value.
    pub fn get_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.resource.write()
    }
}

impl<T: Send + Sync> Clone for MtResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MtResource;

    #[test]
    fn clones_share_the_same_value() {
        let a = MtResource::new(vec![1u8]);
        let b = a.clone();
        b.get_mut().push(2);
        assert_eq!(*a.get(), vec![1, 2]);
    }

    #[test]
    fn readers_share_while_no_writer_holds_the_lock() {
        let resource = MtResource::new(5);
        let first = resource.get();
        let second = resource.get();
        assert_eq!(*first + *second, 10);
    }
}
