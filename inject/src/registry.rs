//! The handler registry.
//!
//! Registered handlers live in a single global list behind a
//! reader/writer lock: the fast-path entry points traverse it as
//! readers, registration and clearing modify it as writers. The
//! telemetry counters are atomics so traversals never need the writer
//! side. Lock order is namespace lock, then this lock, then the delay
//! mutex.

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use riptide_abi::{Errno, InjectCmd, InjectFlags, InjectRecord};
use riptide_lib::rlog_debug;
use riptide_lib::{RwLock, RwLockReadGuard};
use riptide_pool::{Spa, cache_flush, spa_inject_addref, spa_inject_delref, spa_namespace, spa_reset};

use crate::range;

/// Identifier of a registered handler; unique for the life of the
/// process.
pub type HandlerId = u32;

/// Lane schedule of a delay-io handler.
pub(crate) struct LaneState {
    /// Absolute time at which each lane next becomes idle.
    pub slots: Vec<u64>,
    /// Round-robin cursor. Because assignment advances it on every
    /// claim, it always points at the earliest-idle lane.
    pub next: usize,
}

/// A live, registered injection record plus its runtime state.
pub(crate) struct Handler {
    id: HandlerId,
    /// Pool pinned through an injection reference. `None` for
    /// import/export delays, which match by name instead.
    spa: Option<Arc<Spa>>,
    spa_name: Option<String>,
    pub(crate) record: InjectRecord,
    match_count: AtomicU64,
    inject_count: AtomicU64,
    /// Ignored-writes drop-window start, time- or txg-valued by the
    /// sign of the record's duration; 0 until the first match.
    pub(crate) window_start: AtomicU64,
    /// Present exactly for delay-io handlers.
    lanes: Option<UnsafeCell<LaneState>>,
}

// SAFETY: all fields are Sync except `lanes`, whose state is only ever
// accessed while holding the global delay mutex (delay.rs).
unsafe impl Sync for Handler {}

impl Handler {
    #[inline]
    pub(crate) fn id(&self) -> HandlerId {
        self.id
    }

    #[inline]
    pub(crate) fn bump_match(&self) {
        self.match_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn bump_inject(&self) {
        self.inject_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn counts(&self) -> (u64, u64) {
        (
            self.match_count.load(Ordering::Relaxed),
            self.inject_count.load(Ordering::Relaxed),
        )
    }

    /// Does this handler target the given pool instance?
    #[inline]
    pub(crate) fn targets_spa(&self, spa: &Arc<Spa>) -> bool {
        self.spa.as_ref().is_some_and(|s| Arc::ptr_eq(s, spa))
    }

    pub(crate) fn pool_name(&self) -> &str {
        self.spa
            .as_ref()
            .map(|s| s.name())
            .or(self.spa_name.as_deref())
            .unwrap_or_default()
    }

    /// Lane schedule access.
    ///
    /// # Safety
    ///
    /// The caller must hold the delay mutex for the whole lifetime of
    /// the returned reference.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn lane_state(&self) -> Option<&mut LaneState> {
        self.lanes.as_ref().map(|cell| unsafe { &mut *cell.get() })
    }
}

pub(crate) struct HandlerList {
    handlers: Vec<Handler>,
    next_id: HandlerId,
}

impl HandlerList {
    const fn new() -> Self {
        Self {
            handlers: Vec::new(),
            next_id: 1,
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Handler> {
        self.handlers.iter()
    }
}

static REGISTRY: RwLock<HandlerList> = RwLock::new(HandlerList::new());

/// Count of live handlers; the hot-path gate.
static ENABLED_COUNT: AtomicU32 = AtomicU32::new(0);

/// Count of live delay-io handlers; the delay fast-path gate.
static DELAY_COUNT: AtomicU32 = AtomicU32::new(0);

/// True when at least one handler is registered. Entry points with
/// nothing to scan return without taking any lock.
#[inline]
pub fn injection_enabled() -> bool {
    ENABLED_COUNT.load(Ordering::Relaxed) != 0
}

pub fn active_handlers() -> u32 {
    ENABLED_COUNT.load(Ordering::Relaxed)
}

pub fn active_delay_handlers() -> u32 {
    DELAY_COUNT.load(Ordering::Relaxed)
}

/// Acquire the registry for traversal.
pub(crate) fn handlers() -> RwLockReadGuard<'static, HandlerList> {
    REGISTRY.read()
}

/// Snapshot of a registered handler, as returned by
/// [`inject_list_next`].
#[derive(Debug, Clone)]
pub struct ListedHandler {
    pub id: HandlerId,
    pub pool: String,
    pub record: InjectRecord,
    pub match_count: u64,
    pub inject_count: u64,
}

/// Register a fault described by `record` against the named pool.
///
/// Returns the new handler's id, or `None` when the `NULL` flag asked
/// for validation and side effects only. Registration is all-or-
/// nothing: on error no handler is installed and no counter moves.
pub fn inject_fault(
    pool: &str,
    flags: InjectFlags,
    record: &InjectRecord,
) -> Result<Option<HandlerId>, Errno> {
    // Pool-wide metadata targets: unload the pool first so the next
    // load goes back through the pipeline and trips the fault.
    if flags.contains(InjectFlags::UNLOAD_SPA) {
        spa_reset(pool)?;
    }

    let mut record = record.clone();

    if record.cmd == InjectCmd::DelayIo {
        // Zero lanes or a zero service time makes no sense.
        if record.timer == 0 || record.nlanes == 0 {
            return Err(Errno::Invalid);
        }
        // The lane count sizes a per-handler allocation; cap it.
        if record.nlanes >= u16::MAX as u32 {
            return Err(Errno::Invalid);
        }
    }

    // Byte-offset ranges are translated into block ids up front.
    if flags.contains(InjectFlags::CALC_RANGE) {
        range::calculate_range(pool, &mut record)?;
    }

    let id = if flags.contains(InjectFlags::NULL) {
        None
    } else {
        Some(register(pool, record)?)
    };

    // Drop cached copies of the targeted data so reads are reissued
    // through the injection path rather than served from cache.
    if flags.contains(InjectFlags::FLUSH_ARC) {
        cache_flush(false);
    }

    Ok(id)
}

fn register(pool: &str, record: InjectRecord) -> Result<HandlerId, Errno> {
    let (spa, spa_name) = if record.cmd.is_pool_delay() {
        if record.duration <= 0 {
            return Err(Errno::Invalid);
        }
        // Only one import or export delay handler per pool.
        if pool_handler_exists(pool, record.cmd) {
            return Err(Errno::Exists);
        }

        let loaded = {
            let ns = spa_namespace().lock();
            ns.lookup(pool).is_some_and(|spa| spa.is_loaded())
        };
        if record.cmd == InjectCmd::DelayImport && loaded {
            return Err(Errno::Exists);
        }
        if record.cmd == InjectCmd::DelayExport && !loaded {
            return Err(Errno::NoEntity);
        }
        (None, Some(pool.to_string()))
    } else {
        // Pin the pool so it cannot leave the namespace while the
        // handler exists (it may still be unloaded).
        let spa = spa_inject_addref(pool).ok_or(Errno::NoEntity)?;
        (Some(spa), None)
    };

    // Size the lane array before taking the writer lock.
    let lanes = (record.cmd == InjectCmd::DelayIo).then(|| {
        UnsafeCell::new(LaneState {
            slots: vec![0; record.nlanes as usize],
            next: 0,
        })
    });

    let is_delay = record.cmd == InjectCmd::DelayIo;
    let id;
    {
        let mut list = REGISTRY.write();
        if is_delay {
            DELAY_COUNT.fetch_add(1, Ordering::Relaxed);
        }
        id = list.next_id;
        list.next_id += 1;
        list.handlers.push(Handler {
            id,
            spa,
            spa_name,
            record,
            match_count: AtomicU64::new(0),
            inject_count: AtomicU64::new(0),
            window_start: AtomicU64::new(0),
            lanes,
        });
        ENABLED_COUNT.fetch_add(1, Ordering::Relaxed);
    }

    rlog_debug!("registered fault handler {} for pool {}", id, pool);
    Ok(id)
}

/// Is an import/export delay already registered for this pool?
fn pool_handler_exists(name: &str, cmd: InjectCmd) -> bool {
    REGISTRY
        .read()
        .iter()
        .any(|h| h.record.cmd == cmd && h.pool_name() == name)
}

/// Return the first handler with an id greater than `*cursor` and
/// advance the cursor.
///
/// Ids are assigned in insertion order and insertion appends, so
/// repeated calls yield a stable ascending enumeration even while new
/// handlers arrive. The namespace lock is held so pool names stay
/// valid while copied out.
pub fn inject_list_next(cursor: &mut HandlerId) -> Option<ListedHandler> {
    let _ns = spa_namespace().lock();
    let list = handlers();

    let handler = list.iter().find(|h| h.id() > *cursor)?;
    *cursor = handler.id();
    let (match_count, inject_count) = handler.counts();
    Some(ListedHandler {
        id: handler.id(),
        pool: handler.pool_name().to_string(),
        record: handler.record.clone(),
        match_count,
        inject_count,
    })
}

/// Remove the handler with the given id.
pub fn clear_fault(id: HandlerId) -> Result<(), Errno> {
    let handler = {
        let mut list = REGISTRY.write();
        let idx = list
            .handlers
            .iter()
            .position(|h| h.id() == id)
            .ok_or(Errno::NoEntity)?;
        if list.handlers[idx].record.cmd == InjectCmd::DelayIo {
            debug_assert!(DELAY_COUNT.load(Ordering::Relaxed) > 0);
            DELAY_COUNT.fetch_sub(1, Ordering::Relaxed);
        }
        list.handlers.remove(idx)
    };

    // Release the pool pin outside the writer lock.
    if let Some(spa) = handler.spa.as_ref() {
        spa_inject_delref(spa);
    }
    ENABLED_COUNT.fetch_sub(1, Ordering::Relaxed);

    rlog_debug!("cleared fault handler {}", id);
    Ok(())
}

/// Bring up the subsystem. The registry is statically initialized, so
/// this only checks for a clean slate after a previous [`inject_fini`].
pub fn inject_init() {
    debug_assert!(REGISTRY.read().handlers.is_empty());
}

/// Tear down the subsystem, clearing any handlers still registered.
pub fn inject_fini() {
    let ids: Vec<HandlerId> = handlers().iter().map(|h| h.id()).collect();
    for id in ids {
        let _ = clear_fault(id);
    }
}
