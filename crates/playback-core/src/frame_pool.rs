// crates/playback-core/src/frame_pool.rs
//
// Bounded carrier pools for decoded video/audio frames, hw-transfer buffers,
// scaler intermediates and output textures. Avoids per-frame allocation by
// recycling carriers between the worker and the foreground.
//
// Ownership is deliberately one-directional: a `PooledHandle<T>` holds a
// clone of the pool's `Arc`, never the other way round, so there is no
// reference cycle to break on drop.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

struct PoolInner<T> {
    free: VecDeque<T>,
    in_flight: usize,
    ceiling: usize,
}

/// A bounded pool of reusable `T` carriers.
pub struct FramePool<T> {
    inner: Arc<Mutex<PoolInner<T>>>,
    factory: Arc<dyn Fn() -> T + Send + Sync>,
}

impl<T> Clone for FramePool<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner), factory: Arc::clone(&self.factory) }
    }
}

impl<T: Send + 'static> FramePool<T> {
    pub fn new(ceiling: usize, factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PoolInner { free: VecDeque::new(), in_flight: 0, ceiling })),
            factory: Arc::new(factory),
        }
    }

    /// Take a carrier if the in-flight count is under the ceiling: a reused
    /// one from the free list, or a freshly allocated one. Returns `None`
    /// when at capacity — the caller (DecoderWorker) treats this as
    /// back-pressure and sleeps.
    pub fn take(&self) -> Option<PooledHandle<T>> {
        let mut guard = self.inner.lock().unwrap();
        if guard.in_flight >= guard.ceiling {
            return None;
        }
        let payload = guard.free.pop_front().unwrap_or_else(|| (self.factory)());
        guard.in_flight += 1;
        drop(guard);
        Some(PooledHandle { payload: Some(payload), pool: self.inner.clone() })
    }

    pub fn in_flight(&self) -> usize {
        self.inner.lock().unwrap().in_flight
    }

    pub fn ceiling(&self) -> usize {
        self.inner.lock().unwrap().ceiling
    }
}

/// A carrier handed out by a `FramePool`. Dereferences to `T`; returns the
/// payload to the pool's free list when the last share drops.
pub struct PooledHandle<T> {
    payload: Option<T>,
    pool: Arc<Mutex<PoolInner<T>>>,
}

impl<T> std::ops::Deref for PooledHandle<T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.payload.as_ref().expect("payload taken before drop")
    }
}

impl<T> std::ops::DerefMut for PooledHandle<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.payload.as_mut().expect("payload taken before drop")
    }
}

impl<T> Drop for PooledHandle<T> {
    fn drop(&mut self) {
        if let Some(payload) = self.payload.take() {
            let mut guard = self.pool.lock().unwrap();
            guard.in_flight = guard.in_flight.saturating_sub(1);
            guard.free.push_back(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn take_blocks_at_ceiling_and_reopens_on_drop() {
        let pool: FramePool<Vec<u8>> = FramePool::new(2, || vec![0u8; 4]);
        let a = pool.take().unwrap();
        let b = pool.take().unwrap();
        assert!(pool.take().is_none());
        assert_eq!(pool.in_flight(), 2);

        drop(a);
        assert_eq!(pool.in_flight(), 1);
        let c = pool.take().unwrap();
        assert_eq!(pool.in_flight(), 2);
        drop(b);
        drop(c);
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn recycled_carrier_keeps_no_reference_cycle() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let pool: FramePool<usize> = FramePool::new(1, move || {
            counter.fetch_add(1, Ordering::Relaxed);
            0
        });
        let h1 = pool.take().unwrap();
        drop(h1);
        let _h2 = pool.take().unwrap();
        // second take() reused the free-listed carrier instead of allocating.
        assert_eq!(created.load(Ordering::Relaxed), 1);
    }
}
