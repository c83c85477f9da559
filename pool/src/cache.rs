//! Block-cache flush hook.
//!
//! The cache layer registers its flush entry point here at bring-up,
//! in the same fashion as the log backend. Flush requests made before
//! registration are dropped.

use core::sync::atomic::{AtomicPtr, Ordering};

/// Signature of the flush entry point. The flag asks the cache to
/// retry evictions that race with concurrent inserts; callers that must
/// not block pass `false`.
pub type CacheFlushFn = fn(bool);

static FLUSH_HOOK: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());

pub fn cache_register_flush(flush: CacheFlushFn) {
    FLUSH_HOOK.store(flush as *mut (), Ordering::Release);
}

/// Flush the block cache so subsequent reads go back through the I/O
/// pipeline.
pub fn cache_flush(retry: bool) {
    let ptr = FLUSH_HOOK.load(Ordering::Acquire);
    if ptr.is_null() {
        return;
    }
    // SAFETY: only valid `CacheFlushFn` fn pointers are ever stored.
    let flush: CacheFlushFn = unsafe { core::mem::transmute(ptr) };
    flush(retry);
}
