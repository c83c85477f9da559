#![no_std]

pub mod clock;
pub mod once_lock;
pub mod random;
pub mod rlog;
pub mod spinlock;

pub use clock::{monotonic_ns, sleep_until_ns, uptime_ms};
pub use once_lock::OnceLock;
pub use random::{random_in_range, random_next, random_reseed};
pub use rlog::{
    RlogLevel, rlog_get_level, rlog_register_backend, rlog_set_level,
};
pub use spinlock::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
