//! Fault injection for the storage pipeline.
//!
//! Operators register [`InjectRecord`]s describing which logical blocks
//! or devices should see synthetic faults. Records are kept as handlers
//! on a global list; each handler pins its pool so the pool cannot
//! leave the namespace while the fault exists. Device-level faults are
//! addressed by vdev guid instead of block position.
//!
//! The list is deliberately simple: only a few faults exist at any one
//! time, so a linear sweep under a shared lock is cheaper than anything
//! with more structure. Hot entry points short-circuit on an atomic
//! handler count before touching the lock at all.
//!
//! [`InjectRecord`]: riptide_abi::InjectRecord

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

mod data;
mod delay;
mod device;
mod lifecycle;
mod matcher;
mod range;
mod registry;

#[cfg(test)]
mod test_fixtures;

#[cfg(test)]
mod delay_tests;
#[cfg(test)]
mod lifecycle_tests;

pub use data::{decrypt_injection, fault_injection};
pub use delay::io_delay;
pub use device::{device_injection, device_injections, label_injection};
pub use lifecycle::{
    export_delay, ignored_writes, import_delay, panic_injection, spa_ignored_writes_check,
};
pub use registry::{
    HandlerId, ListedHandler, active_delay_handlers, active_handlers, clear_fault, inject_fault,
    inject_fini, inject_init, inject_list_next, injection_enabled,
};
