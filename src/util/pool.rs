/*!
A simple locked free-list pool.

The thread-safe context hands each worker exclusive use of one pooled value
between acquire and release; this pool is the only synchronization on that
path. Values are created lazily and recycled on guard drop.
*/

use std::{
    ops::{Deref, DerefMut},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

/// A lazily-populated pool of `T`, optionally capped at a maximum number of
/// concurrently outstanding values.
///
/// ```
/// use librift::util::pool::Pool;
///
/// let pool = Pool::with_capacity(1, || Vec::<u32>::new());
/// let first = pool.get().unwrap();
/// assert!(pool.get().is_none());
/// drop(first);
/// assert!(pool.get().is_some());
/// ```
pub struct Pool<T> {
    create: Box<dyn Fn() -> T + Send + Sync>,
    free: Mutex<Vec<T>>,
    outstanding: AtomicUsize,
    capacity: Option<usize>,
}

impl<T: Send> Pool<T> {
    /// An uncapped pool.
    pub fn new(create: impl Fn() -> T + Send + Sync + 'static) -> Pool<T> {
        Pool {
            create: Box::new(create),
            free: Mutex::new(Vec::new()),
            outstanding: AtomicUsize::new(0),
            capacity: None,
        }
    }

    /// A pool refusing more than `capacity` concurrently outstanding values.
    pub fn with_capacity(capacity: usize, create: impl Fn() -> T + Send + Sync + 'static) -> Pool<T> {
        Pool {
            capacity: Some(capacity),
            ..Pool::new(create)
        }
    }

    /// Acquires a value, creating one if the free list is empty. Returns
    /// `None` when the pool is at capacity.
    pub fn get(&self) -> Option<PoolGuard<'_, T>> {
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cap) = self.capacity {
            if self.outstanding.load(Ordering::Relaxed) >= cap {
                return None;
            }
        }
        let value = free.pop().unwrap_or_else(|| (self.create)());
        self.outstanding.fetch_add(1, Ordering::Relaxed);
        drop(free);
        Some(PoolGuard {
            pool: self,
            value: Some(value),
        })
    }
}

impl<T> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("outstanding", &self.outstanding.load(Ordering::Relaxed))
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

/// Exclusive access to one pooled value; returns it to the pool on drop.
pub struct PoolGuard<'p, T: Send> {
    pool: &'p Pool<T>,
    value: Option<T>,
}

impl<T: Send> Deref for PoolGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value.as_ref().unwrap()
    }
}

impl<T: Send> DerefMut for PoolGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().unwrap()
    }
}

impl<T: Send> Drop for PoolGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            let mut free = self.pool.free.lock().unwrap_or_else(|e| e.into_inner());
            free.push(value);
            self.pool.outstanding.fetch_sub(1, Ordering::Relaxed);
        }
    }
}
