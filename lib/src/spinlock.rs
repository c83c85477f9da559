use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicI32, AtomicU16, AtomicU32, Ordering};

/// Spinning mutex with **ticket** admission for FIFO fairness: each
/// acquirer takes a monotonically-increasing ticket and spins until
/// `now_serving` matches, so threads acquire the lock in request order
/// and none starves under contention.
pub struct Mutex<T> {
    /// Next ticket to hand out. Wraps at `u16::MAX`; equality checks
    /// are wrap-safe.
    next_ticket: AtomicU16,
    /// Ticket currently holding the lock. Incremented on unlock.
    now_serving: AtomicU16,
    data: UnsafeCell<T>,
}

// SAFETY: Mutex provides exclusive access through ticket-lock
// acquisition, making it safe to share across threads.
unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
}

impl<T> Mutex<T> {
    #[inline]
    pub const fn new(data: T) -> Self {
        Self {
            next_ticket: AtomicU16::new(0),
            now_serving: AtomicU16::new(0),
            data: UnsafeCell::new(data),
        }
    }

    /// Check if the lock is currently held (or has waiters).
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.next_ticket.load(Ordering::Relaxed) != self.now_serving.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        let my_ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);

        // Spin until our ticket is served. The Acquire load makes the
        // previous holder's writes visible once we observe our turn.
        // Back off proportionally to queue distance to cut cache-line
        // traffic while waiting.
        loop {
            let serving = self.now_serving.load(Ordering::Acquire);
            if serving == my_ticket {
                break;
            }
            let distance = my_ticket.wrapping_sub(serving) as u32;
            for _ in 0..distance.min(64) {
                spin_loop();
            }
        }

        MutexGuard { mutex: self }
    }

    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        // Succeed only when the lock is free (next_ticket == now_serving)
        // and nobody grabs a ticket between our check and the CAS.
        let current = self.now_serving.load(Ordering::Relaxed);
        if self
            .next_ticket
            .compare_exchange(
                current,
                current.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
        {
            Some(MutexGuard { mutex: self })
        } else {
            None
        }
    }
}

impl<'a, T> Deref for MutexGuard<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<'a, T> DerefMut for MutexGuard<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<'a, T> Drop for MutexGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        // Hand the lock to the next waiter in FIFO order. Release makes
        // our writes visible to the next acquirer.
        self.mutex.now_serving.fetch_add(1, Ordering::Release);
    }
}

// =============================================================================
// RwLock - writer-preferring reader/writer lock
// =============================================================================

/// A **writer-preferring** reader-writer spin lock. Any number of
/// readers may hold it simultaneously; a writer gets exclusive access.
/// While a writer is queued, new readers yield, so a write-side caller
/// cannot starve under continuous read traffic.
pub struct RwLock<T> {
    /// State: 0 = unlocked, -1 = write-locked, >0 = number of readers
    state: AtomicI32,
    /// Writers waiting for access. When > 0, new readers yield.
    writer_waiting: AtomicU32,
    data: UnsafeCell<T>,
}

// SAFETY: RwLock synchronizes all access through the atomic state word,
// making it safe to share across threads.
unsafe impl<T: Send> Send for RwLock<T> {}
unsafe impl<T: Send + Sync> Sync for RwLock<T> {}

pub struct RwLockReadGuard<'a, T> {
    lock: &'a RwLock<T>,
}

pub struct RwLockWriteGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> RwLock<T> {
    #[inline]
    pub const fn new(data: T) -> Self {
        Self {
            state: AtomicI32::new(0),
            writer_waiting: AtomicU32::new(0),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquire shared access. Blocks while a writer holds the lock or
    /// is queued.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state >= 0 && self.writer_waiting.load(Ordering::Relaxed) == 0 {
                if self
                    .state
                    .compare_exchange_weak(state, state + 1, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
                {
                    return RwLockReadGuard { lock: self };
                }
            }
            spin_loop();
        }
    }

    /// Acquire exclusive access, signalling intent so new readers yield.
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.writer_waiting.fetch_add(1, Ordering::Relaxed);

        loop {
            if self
                .state
                .compare_exchange_weak(0, -1, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                self.writer_waiting.fetch_sub(1, Ordering::Relaxed);
                return RwLockWriteGuard { lock: self };
            }
            spin_loop();
        }
    }
}

impl<'a, T> Deref for RwLockReadGuard<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: read guard ensures no writer holds the lock
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> Drop for RwLockReadGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.state.fetch_sub(1, Ordering::Release);
    }
}

impl<'a, T> Deref for RwLockWriteGuard<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: write guard ensures exclusive access
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for RwLockWriteGuard<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: write guard ensures exclusive access
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for RwLockWriteGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.state.store(0, Ordering::Release);
    }
}
