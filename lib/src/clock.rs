//! Monotonic engine clock and sleep services.
//!
//! The embedder registers a nanosecond clock source and a sleep hook at
//! bring-up, in the same fashion as the log backend. Before the clock
//! is wired every accessor returns `0`, and sleeps return immediately.
//!
//! All functions are safe to call from any thread.

use core::sync::atomic::{AtomicPtr, Ordering};

/// Signature of a clock source: monotonic nanoseconds since an
/// arbitrary epoch.
pub type ClockSource = fn() -> u64;

/// Signature of a sleep hook: block the calling thread until the given
/// absolute monotonic time.
pub type SleepHook = fn(u64);

static SOURCE: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());
static SLEEP: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());

/// Register the monotonic clock source.
pub fn clock_register_source(source: ClockSource) {
    SOURCE.store(source as *mut (), Ordering::Release);
}

/// Register the sleep hook used by callers that block on absolute
/// wakeup targets.
pub fn clock_register_sleep(sleep: SleepHook) {
    SLEEP.store(sleep as *mut (), Ordering::Release);
}

/// Returns the monotonic clock value in nanoseconds.
///
/// Returns `0` until a source has been registered.
#[inline]
pub fn monotonic_ns() -> u64 {
    let ptr = SOURCE.load(Ordering::Acquire);
    if ptr.is_null() {
        return 0;
    }
    // SAFETY: only valid `ClockSource` fn pointers are ever stored.
    let source: ClockSource = unsafe { core::mem::transmute(ptr) };
    source()
}

/// System uptime in milliseconds; a convenience wrapper around
/// [`monotonic_ns`].
#[inline]
pub fn uptime_ms() -> u64 {
    monotonic_ns() / 1_000_000
}

/// Block the calling thread until the absolute monotonic time `target`.
///
/// A no-op until a sleep hook has been registered.
#[inline]
pub fn sleep_until_ns(target: u64) {
    let ptr = SLEEP.load(Ordering::Acquire);
    if ptr.is_null() {
        return;
    }
    // SAFETY: only valid `SleepHook` fn pointers are ever stored.
    let sleep: SleepHook = unsafe { core::mem::transmute(ptr) };
    sleep(target);
}
