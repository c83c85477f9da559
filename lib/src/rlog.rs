//! Engine logging.
//!
//! All log output funnels through a single **backend** function pointer
//! registered by the embedder. Until a backend is registered, log lines
//! are discarded; the engine never assumes it owns a console.
//!
//! # Backend contract
//!
//! The backend receives the pre-formatted arguments for a single log
//! line and must:
//!
//! 1. Write the formatted text atomically (no interleaving from other
//!    threads).
//! 2. Append the trailing newline itself; callers never include one.

use core::fmt;
use core::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

// ---------------------------------------------------------------------------
// Log levels
// ---------------------------------------------------------------------------

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RlogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl RlogLevel {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => RlogLevel::Error,
            1 => RlogLevel::Warn,
            2 => RlogLevel::Info,
            _ => RlogLevel::Debug,
        }
    }
}

static CURRENT_LEVEL: AtomicU8 = AtomicU8::new(RlogLevel::Info as u8);

#[inline(always)]
fn is_enabled(level: RlogLevel) -> bool {
    level as u8 <= CURRENT_LEVEL.load(Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Backend dispatch
// ---------------------------------------------------------------------------

/// Signature of a log backend.
pub type RlogBackend = fn(fmt::Arguments<'_>);

/// Stored as a raw pointer; `null` means "no backend yet, discard".
static BACKEND: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());

/// Register the backend that receives all subsequent log lines.
/// Typically called once by the embedder at bring-up.
pub fn rlog_register_backend(backend: RlogBackend) {
    BACKEND.store(backend as *mut (), Ordering::Release);
}

pub fn rlog_set_level(level: RlogLevel) {
    CURRENT_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn rlog_get_level() -> RlogLevel {
    RlogLevel::from_raw(CURRENT_LEVEL.load(Ordering::Relaxed))
}

pub fn is_enabled_level(level: RlogLevel) -> bool {
    is_enabled(level)
}

/// Emit a formatted log line at the given level.
pub fn log_args(level: RlogLevel, args: fmt::Arguments<'_>) {
    if !is_enabled(level) {
        return;
    }
    let ptr = BACKEND.load(Ordering::Acquire);
    if ptr.is_null() {
        return;
    }
    // SAFETY: `rlog_register_backend` only stores valid `RlogBackend`
    // fn pointers, which have the same size as `*mut ()` on all
    // supported targets.
    let backend: RlogBackend = unsafe { core::mem::transmute(ptr) };
    backend(args);
}

// ---------------------------------------------------------------------------
// Macros
// ---------------------------------------------------------------------------

#[macro_export]
macro_rules! rlog_error {
    ($($arg:tt)*) => {
        $crate::rlog::log_args($crate::rlog::RlogLevel::Error, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! rlog_warn {
    ($($arg:tt)*) => {
        $crate::rlog::log_args($crate::rlog::RlogLevel::Warn, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! rlog_info {
    ($($arg:tt)*) => {
        $crate::rlog::log_args($crate::rlog::RlogLevel::Info, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! rlog_debug {
    ($($arg:tt)*) => {
        $crate::rlog::log_args($crate::rlog::RlogLevel::Debug, ::core::format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicUsize;

    static LINES: AtomicUsize = AtomicUsize::new(0);

    fn counting_backend(_args: fmt::Arguments<'_>) {
        LINES.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn test_level_filter_and_backend() {
        rlog_register_backend(counting_backend);
        rlog_set_level(RlogLevel::Warn);
        assert!(is_enabled_level(RlogLevel::Error));
        assert!(!is_enabled_level(RlogLevel::Info));

        let before = LINES.load(Ordering::Relaxed);
        crate::rlog_error!("boom {}", 1);
        crate::rlog_debug!("quiet");
        assert_eq!(LINES.load(Ordering::Relaxed), before + 1);

        rlog_set_level(RlogLevel::Info);
    }
}
