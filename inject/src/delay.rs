//! The delay engine.
//!
//! Each delay-io handler models `nlanes` independent service queues
//! with a constant per-request service time. A handler configured with
//! one lane and a 10ms timer completes one request per 10ms: pile more
//! requests on and their average latency rises above 10ms; trickle one
//! per interval and each sees exactly 10ms.
//!
//! An arriving I/O is assigned to the lane that becomes idle soonest
//! across *all* matching handlers, and its wakeup target is written
//! back so the lane is not reused before then. The pick-the-minimum
//! and claim-the-lane steps must be atomic as a group: two registry
//! readers could otherwise both pick the same lane and let a
//! single-lane handler run two requests at once. The dedicated delay
//! mutex below provides exactly that atomicity; the registry lock stays
//! shared so the rest of the fast path is not serialized.

use riptide_abi::InjectCmd;
use riptide_lib::clock::monotonic_ns;
use riptide_lib::Mutex;
use riptide_pool::Zio;

use crate::matcher;
use crate::registry;

static DELAY_MTX: Mutex<()> = Mutex::new(());

/// When should this I/O be released? Returns the absolute monotonic
/// wakeup target, or `None` when no delay applies. The caller sleeps
/// outside any lock.
pub fn io_delay(zio: &Zio) -> Option<u64> {
    // No delay handlers anywhere: skip the locks entirely.
    if registry::active_delay_handlers() == 0 {
        return None;
    }

    let vd = zio.vd.as_ref()?;

    let handlers = registry::handlers();
    let _lanes = DELAY_MTX.lock();

    let mut min_target: Option<(&registry::Handler, u64)> = None;

    for handler in handlers.iter() {
        let record = &handler.record;
        if record.cmd != InjectCmd::DelayIo {
            continue;
        }

        if vd.guid() != record.guid {
            continue;
        }

        if !matcher::match_iotype(zio, record.iotype) {
            continue;
        }

        // SAFETY: the delay mutex is held for the rest of this
        // function.
        let Some(lanes) = (unsafe { handler.lane_state() }) else {
            debug_assert!(false, "delay-io handler without lanes");
            continue;
        };
        debug_assert!(lanes.next < lanes.slots.len());

        handler.bump_match();

        if !matcher::freq_triggered(record.freq) {
            continue;
        }

        // The handler's round-robin cursor always names its earliest-
        // idle lane, so one slot per handler is enough to find the
        // global minimum. An idle lane completes the request a full
        // service time from now; a busy lane completes it a service
        // time after the lane drains.
        let idle = record.timer + monotonic_ns();
        let busy = record.timer + lanes.slots[lanes.next];
        let target = idle.max(busy);

        // The cursor is not advanced yet: a later handler may still
        // offer an earlier lane. The winner claims its lane below.
        match min_target {
            None => min_target = Some((handler, target)),
            Some((_, best)) if target < best => min_target = Some((handler, target)),
            Some(_) => {}
        }
    }

    let (winner, target) = min_target?;

    // SAFETY: the delay mutex is still held.
    if let Some(lanes) = unsafe { winner.lane_state() } {
        lanes.slots[lanes.next] = target;
        lanes.next = (lanes.next + 1) % lanes.slots.len();
    }
    winner.bump_inject();

    Some(target)
}

#[cfg(test)]
pub(crate) fn lane_cursor(id: crate::registry::HandlerId) -> Option<usize> {
    let handlers = registry::handlers();
    let _lanes = DELAY_MTX.lock();
    handlers.iter().find(|h| h.id() == id).and_then(|h| {
        // SAFETY: the delay mutex is held.
        unsafe { h.lane_state() }.map(|l| l.next)
    })
}

#[cfg(test)]
pub(crate) fn lane_slots(id: crate::registry::HandlerId) -> Option<alloc::vec::Vec<u64>> {
    let handlers = registry::handlers();
    let _lanes = DELAY_MTX.lock();
    handlers.iter().find(|h| h.id() == id).and_then(|h| {
        // SAFETY: the delay mutex is held.
        unsafe { h.lane_state() }.map(|l| l.slots.clone())
    })
}
