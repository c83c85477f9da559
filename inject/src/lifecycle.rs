//! Panic, ignored-writes, and pool-lifecycle delay handlers.

use alloc::sync::Arc;
use core::sync::atomic::Ordering;

use riptide_abi::{InjectCmd, ObjectType};
use riptide_lib::clock::{monotonic_ns, sleep_until_ns};
use riptide_lib::{random_in_range, rlog_error, rlog_info};
use riptide_pool::{Spa, Zio, ZioPipeline};

use crate::registry::{self, HandlerId};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Panic the host when a config change reaches the call site named by a
/// panic record. `tag` is the calling function's name.
pub fn panic_injection(spa: &Arc<Spa>, tag: &str, panic_type: ObjectType) {
    if !registry::injection_enabled() {
        return;
    }

    let handlers = registry::handlers();
    for handler in handlers.iter() {
        if handler.record.cmd != InjectCmd::Panic || !handler.targets_spa(spa) {
            continue;
        }

        if handler.record.object_type == panic_type && handler.record.func_str() == tag {
            handler.bump_match();
            handler.bump_inject();
            panic!("panic requested in function {}", tag);
        }
    }
}

/// Simulate hardware that ignores cache flushes: most of the time,
/// strip the device stages from a matching write so it is dropped after
/// its metadata bookkeeping.
///
/// The first match starts the drop window: wall-clock time for records
/// with a positive duration, the I/O's txg for a negative one.
pub fn ignored_writes(zio: &mut Zio) {
    if !registry::injection_enabled() {
        return;
    }

    let handlers = registry::handlers();
    for handler in handlers.iter() {
        if handler.record.cmd != InjectCmd::IgnoredWrites || !handler.targets_spa(&zio.spa) {
            continue;
        }

        handler.bump_match();

        if handler.window_start.load(Ordering::Relaxed) == 0 {
            let start = if handler.record.duration > 0 {
                monotonic_ns()
            } else {
                zio.txg
            };
            // Concurrent first matches race benignly; the first store
            // wins and later ones are dropped.
            let _ = handler.window_start.compare_exchange(
                0,
                start,
                Ordering::Relaxed,
                Ordering::Relaxed,
            );
        }

        // Have a "problem" writing 60% of the time.
        if random_in_range(100) < 60 {
            handler.bump_inject();
            zio.pipeline.remove(ZioPipeline::VDEV_IO_STAGES);
        }
        break;
    }
}

/// Post-condition check run at pool sync: the drop window of every
/// ignored-writes handler on this pool must not have been exceeded.
pub fn spa_ignored_writes_check(spa: &Arc<Spa>) {
    if !registry::injection_enabled() {
        return;
    }

    let handlers = registry::handlers();
    for handler in handlers.iter() {
        if handler.record.cmd != InjectCmd::IgnoredWrites || !handler.targets_spa(spa) {
            continue;
        }

        handler.bump_match();
        handler.bump_inject();

        let started = handler.window_start.load(Ordering::Relaxed);
        if started == 0 {
            continue;
        }

        let duration = handler.record.duration;
        if duration > 0 {
            let window_end = started + duration as u64 * NANOS_PER_SEC;
            if monotonic_ns() >= window_end {
                rlog_error!(
                    "ignored-writes window exceeded on pool {}",
                    spa.name()
                );
                panic!("writes ignored past the configured window");
            }
        } else {
            // Negative duration counts syncing txgs; subtracting it
            // extends the window forward.
            let window_end = started.wrapping_sub(duration as u64);
            if window_end < spa.syncing_txg() {
                rlog_error!(
                    "ignored-writes txg window exceeded on pool {}",
                    spa.name()
                );
                panic!("writes ignored past the configured txg window");
            }
        }
    }
}

fn pool_delay(spa: &Arc<Spa>, elapsed_ns: u64, cmd: InjectCmd) {
    let mut delay = 0u64;
    let mut id: HandlerId = 0;

    {
        let handlers = registry::handlers();
        for handler in handlers.iter() {
            if handler.record.cmd != cmd {
                continue;
            }

            if handler.pool_name() == spa.name() {
                handler.bump_match();
                let pause = handler.record.duration as u64 * NANOS_PER_SEC;
                if pause > elapsed_ns {
                    handler.bump_inject();
                    delay = pause - elapsed_ns;
                }
                id = handler.id();
                break;
            }
        }
    }

    // The sleep happens with no locks held.
    if delay > 0 {
        if cmd == InjectCmd::DelayImport {
            rlog_info!(
                "injecting {} sec delay into import of pool {}",
                delay / NANOS_PER_SEC,
                spa.name()
            );
        }
        sleep_until_ns(monotonic_ns() + delay);
    }

    // All done with this one-shot handler.
    if id != 0 {
        let _ = registry::clear_fault(id);
    }
}

/// Stall an in-progress pool import. `elapsed_ns` is how long the
/// import has already taken; the handler sleeps out the remainder of
/// its configured duration, then clears itself.
pub fn import_delay(spa: &Arc<Spa>, elapsed_ns: u64) {
    pool_delay(spa, elapsed_ns, InjectCmd::DelayImport);
}

/// Stall an in-progress pool export; one-shot, as [`import_delay`].
pub fn export_delay(spa: &Arc<Spa>, elapsed_ns: u64) {
    pool_delay(spa, elapsed_ns, InjectCmd::DelayExport);
}
