//! Shared fixtures for the engine test suites.
//!
//! Engine state is global (handler registry, clock services, RNG, pool
//! namespace), so every test that touches it holds an [`EngineFixture`],
//! which serializes the suites and resets the world: fake clock at
//! zero, recorded sleeps cleared, RNG reseeded, namespace and registry
//! emptied.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex as StdMutex, MutexGuard as StdMutexGuard};
use std::vec::Vec;

use riptide_abi::Zbookmark;
use riptide_lib::clock::{clock_register_sleep, clock_register_source};
use riptide_lib::random_reseed;
use riptide_pool::{Abd, Spa, Vdev, Zio, ZioChild, ZioType, spa_namespace};

use crate::{inject_fini, inject_init};

pub const TEST_SEED: u64 = 0x8af3_77c5_0d1e_4b29;

/// Physical size of every test vdev: large enough that the label and
/// allocatable regions are well separated.
pub const TEST_PSIZE: u64 = 64 * 1024 * 1024;

static ENGINE_LOCK: StdMutex<()> = StdMutex::new(());
static FAKE_NOW: AtomicU64 = AtomicU64::new(0);
static SLEEP_LOG: StdMutex<Vec<u64>> = StdMutex::new(Vec::new());

fn fake_clock() -> u64 {
    FAKE_NOW.load(Ordering::Relaxed)
}

/// Sleeping in tests records the request and jumps the fake clock to
/// the wakeup target.
fn fake_sleep(target: u64) {
    SLEEP_LOG
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(target);
    FAKE_NOW.fetch_max(target, Ordering::Relaxed);
}

/// RAII guard owning the engine's global state for one test.
pub struct EngineFixture {
    _guard: StdMutexGuard<'static, ()>,
}

impl EngineFixture {
    pub fn new() -> Self {
        let guard = ENGINE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clock_register_source(fake_clock);
        clock_register_sleep(fake_sleep);
        FAKE_NOW.store(0, Ordering::Relaxed);
        SLEEP_LOG.lock().unwrap_or_else(|e| e.into_inner()).clear();
        random_reseed(TEST_SEED);
        inject_fini();
        spa_namespace().lock().clear();
        inject_init();
        Self { _guard: guard }
    }

    pub fn now(&self) -> u64 {
        FAKE_NOW.load(Ordering::Relaxed)
    }

    pub fn advance(&self, ns: u64) {
        FAKE_NOW.fetch_add(ns, Ordering::Relaxed);
    }

    /// Wakeup targets passed to the sleep hook so far.
    pub fn sleeps(&self) -> Vec<u64> {
        SLEEP_LOG.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Drop for EngineFixture {
    fn drop(&mut self) {
        inject_fini();
        spa_namespace().lock().clear();
    }
}

/// A loaded pool registered in the namespace.
pub fn loaded_pool(name: &str) -> Arc<Spa> {
    let spa = Spa::new(name, 0x51a0_0000 + name.len() as u64);
    spa_namespace().lock().insert(spa.clone());
    spa
}

/// A leaf vdev attached to the pool's top level.
pub fn leaf_vdev(spa: &Arc<Spa>, guid: u64, id: u64) -> Arc<Vdev> {
    let vd = Arc::new(Vdev::new(guid, id, TEST_PSIZE, true));
    spa.attach_vdev(vd.clone());
    vd
}

/// A logical read positioned at the given bookmark.
pub fn logical_read(spa: &Arc<Spa>, objset: u64, object: u64, level: i64, blkid: u64) -> Zio {
    let mut zio = Zio::new(spa.clone(), ZioType::Read);
    zio.bookmark = Zbookmark::new(objset, object, level, blkid);
    zio.logical_bookmark = Some(zio.bookmark);
    zio
}

/// A physical read against a leaf device, with a zeroed payload.
pub fn device_read(spa: &Arc<Spa>, vd: &Arc<Vdev>, offset: u64, size: usize) -> Zio {
    let mut zio = Zio::new(spa.clone(), ZioType::Read);
    zio.vd = Some(vd.clone());
    zio.child_type = ZioChild::Vdev;
    zio.offset = offset;
    zio.size = size as u64;
    zio.abd = Abd::zeroed(size);
    zio
}
