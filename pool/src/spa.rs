//! Pool namespace.
//!
//! Every pool known to the process is tracked in a single table behind
//! the **namespace lock**. The namespace lock is the outermost lock of
//! the subsystem: callers that also take the injection registry lock
//! must take this one first.

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use riptide_abi::Errno;
use riptide_lib::rlog_debug;
use spin::Mutex;

use crate::objset::Dataset;
use crate::vdev::Vdev;

/// A storage pool.
///
/// Holds the top-level vdev array and the datasets the range translator
/// walks. Injection handlers pin a pool through its inject reference
/// count so it cannot leave the namespace while a fault targets it.
pub struct Spa {
    name: String,
    guid: u64,
    loaded: AtomicBool,
    inject_refs: AtomicU32,
    syncing_txg: AtomicU64,
    vdevs: Mutex<Vec<Arc<Vdev>>>,
    datasets: Mutex<Vec<Arc<Dataset>>>,
}

impl Spa {
    pub fn new(name: &str, guid: u64) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            guid,
            loaded: AtomicBool::new(true),
            inject_refs: AtomicU32::new(0),
            syncing_txg: AtomicU64::new(0),
            vdevs: Mutex::new(Vec::new()),
            datasets: Mutex::new(Vec::new()),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn guid(&self) -> u64 {
        self.guid
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub fn set_loaded(&self, loaded: bool) {
        self.loaded.store(loaded, Ordering::Release);
    }

    #[inline]
    pub fn syncing_txg(&self) -> u64 {
        self.syncing_txg.load(Ordering::Acquire)
    }

    pub fn set_syncing_txg(&self, txg: u64) {
        self.syncing_txg.store(txg, Ordering::Release);
    }

    #[inline]
    pub fn inject_refcount(&self) -> u32 {
        self.inject_refs.load(Ordering::Acquire)
    }

    /// Attach a top-level vdev.
    pub fn attach_vdev(&self, vd: Arc<Vdev>) {
        self.vdevs.lock().push(vd);
    }

    /// Look up a top-level vdev by its position in the pool.
    pub fn vdev_lookup_top(&self, vdev_id: u64) -> Option<Arc<Vdev>> {
        self.vdevs
            .lock()
            .iter()
            .find(|vd| vd.id() == vdev_id)
            .cloned()
    }

    /// Attach a dataset (object set).
    pub fn attach_dataset(&self, ds: Arc<Dataset>) {
        self.datasets.lock().push(ds);
    }

    /// Hold a dataset by object-set number.
    pub fn dataset_hold(&self, objset: u64) -> Result<Arc<Dataset>, Errno> {
        self.datasets
            .lock()
            .iter()
            .find(|ds| ds.objset() == objset)
            .cloned()
            .ok_or(Errno::NoEntity)
    }
}

/// The pool namespace table. Access it through [`spa_namespace`] and
/// hold the guard across any multi-step lookup.
pub struct SpaNamespace {
    pools: Vec<Arc<Spa>>,
}

impl SpaNamespace {
    const fn new() -> Self {
        Self { pools: Vec::new() }
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Spa>> {
        self.pools.iter().find(|spa| spa.name() == name).cloned()
    }

    /// Add a pool. Replaces nothing; duplicate names are the caller's
    /// bug.
    pub fn insert(&mut self, spa: Arc<Spa>) {
        debug_assert!(self.lookup(spa.name()).is_none());
        self.pools.push(spa);
    }

    /// Remove a pool by name. Fails while injection handlers still pin
    /// it.
    pub fn remove(&mut self, name: &str) -> Result<(), Errno> {
        let idx = self
            .pools
            .iter()
            .position(|spa| spa.name() == name)
            .ok_or(Errno::NoEntity)?;
        if self.pools[idx].inject_refcount() > 0 {
            return Err(Errno::Busy);
        }
        self.pools.remove(idx);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.pools.clear();
    }
}

static NAMESPACE: Mutex<SpaNamespace> = Mutex::new(SpaNamespace::new());

/// The global namespace lock. Outermost in the lock order.
pub fn spa_namespace() -> &'static Mutex<SpaNamespace> {
    &NAMESPACE
}

/// Pin a pool for fault injection. The reference keeps the pool in the
/// namespace (it may still be unloaded) until released with
/// [`spa_inject_delref`].
pub fn spa_inject_addref(name: &str) -> Option<Arc<Spa>> {
    let ns = NAMESPACE.lock();
    let spa = ns.lookup(name)?;
    spa.inject_refs.fetch_add(1, Ordering::AcqRel);
    Some(spa)
}

/// Release an injection reference taken by [`spa_inject_addref`].
pub fn spa_inject_delref(spa: &Arc<Spa>) {
    let prev = spa.inject_refs.fetch_sub(1, Ordering::AcqRel);
    debug_assert!(prev > 0);
}

/// Unload a pool so the next load goes back through the I/O pipeline
/// (and re-traps metadata faults).
pub fn spa_reset(name: &str) -> Result<(), Errno> {
    let ns = NAMESPACE.lock();
    let spa = ns.lookup(name).ok_or(Errno::NoEntity)?;
    spa.set_loaded(false);
    rlog_debug!("pool {} unloaded for reload", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addref_pins_and_delref_releases() {
        let spa = Spa::new("spa-test-pin", 77);
        spa_namespace().lock().insert(spa.clone());

        let held = spa_inject_addref("spa-test-pin").unwrap();
        assert_eq!(held.inject_refcount(), 1);
        assert_eq!(
            spa_namespace().lock().remove("spa-test-pin"),
            Err(Errno::Busy)
        );

        spa_inject_delref(&held);
        assert_eq!(spa_namespace().lock().remove("spa-test-pin"), Ok(()));
    }

    #[test]
    fn test_reset_marks_unloaded() {
        let spa = Spa::new("spa-test-reset", 78);
        spa_namespace().lock().insert(spa.clone());

        assert!(spa.is_loaded());
        spa_reset("spa-test-reset").unwrap();
        assert!(!spa.is_loaded());
        assert_eq!(spa_reset("spa-test-missing"), Err(Errno::NoEntity));

        spa_namespace().lock().remove("spa-test-reset").unwrap();
    }
}
