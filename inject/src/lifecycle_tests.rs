use riptide_abi::{InjectCmd, InjectFlags, InjectRecord, ObjectType};
use riptide_pool::zio::{Zio, ZioPipeline, ZioType};
use riptide_pool::Spa;

use crate::test_fixtures::{EngineFixture, loaded_pool};
use crate::{
    export_delay, ignored_writes, import_delay, inject_fault, inject_list_next, panic_injection,
    spa_ignored_writes_check,
};

const SEC: u64 = 1_000_000_000;

fn panic_record(tag: &str) -> InjectRecord {
    let mut rec = InjectRecord {
        cmd: InjectCmd::Panic,
        ..InjectRecord::default()
    };
    rec.set_func(tag);
    rec
}

#[test]
#[should_panic(expected = "panic requested")]
fn test_panic_record_fires_at_tagged_site() {
    let _fx = EngineFixture::new();
    let spa = loaded_pool("tank");
    inject_fault("tank", InjectFlags::empty(), &panic_record("spa_vdev_attach"))
        .unwrap()
        .unwrap();

    panic_injection(&spa, "spa_vdev_attach", ObjectType::None);
}

#[test]
fn test_panic_record_ignores_other_sites() {
    let _fx = EngineFixture::new();
    let spa = loaded_pool("tank");
    inject_fault("tank", InjectFlags::empty(), &panic_record("spa_vdev_attach"))
        .unwrap()
        .unwrap();

    panic_injection(&spa, "spa_vdev_detach", ObjectType::None);
    panic_injection(&spa, "spa_vdev_attach", ObjectType::SpaceMap);
}

fn ignored_writes_record(duration: i64) -> InjectRecord {
    InjectRecord {
        cmd: InjectCmd::IgnoredWrites,
        duration,
        ..InjectRecord::default()
    }
}

fn pool_write(spa: &std::sync::Arc<Spa>, txg: u64) -> Zio {
    let mut zio = Zio::new(spa.clone(), ZioType::Write);
    zio.txg = txg;
    zio
}

#[test]
fn test_ignored_writes_strip_device_stages() {
    let _fx = EngineFixture::new();
    let spa = loaded_pool("tank");
    inject_fault("tank", InjectFlags::empty(), &ignored_writes_record(5))
        .unwrap()
        .unwrap();

    let mut dropped = 0;
    let mut kept = 0;
    for _ in 0..50 {
        let mut zio = pool_write(&spa, 10);
        ignored_writes(&mut zio);
        if zio.pipeline.contains(ZioPipeline::VDEV_IO_STAGES) {
            kept += 1;
        } else {
            dropped += 1;
        }
    }

    // The drop rate is ~60%; both outcomes must appear.
    assert!(dropped > 0, "no writes were dropped");
    assert!(kept > 0, "every write was dropped");

    let mut cursor = 0;
    let listed = inject_list_next(&mut cursor).unwrap();
    assert_eq!(listed.match_count, 50);
    assert_eq!(listed.inject_count, dropped as u64);
}

#[test]
fn test_ignored_writes_window_holds_within_duration() {
    let fx = EngineFixture::new();
    let spa = loaded_pool("tank");
    inject_fault("tank", InjectFlags::empty(), &ignored_writes_record(5))
        .unwrap()
        .unwrap();

    fx.advance(1 * SEC);
    let mut zio = pool_write(&spa, 10);
    ignored_writes(&mut zio);

    // 3 seconds into a 5 second window: fine.
    fx.advance(3 * SEC);
    spa_ignored_writes_check(&spa);
}

#[test]
#[should_panic(expected = "past the configured window")]
fn test_ignored_writes_window_expiry_trips_check() {
    let fx = EngineFixture::new();
    let spa = loaded_pool("tank");
    inject_fault("tank", InjectFlags::empty(), &ignored_writes_record(5))
        .unwrap()
        .unwrap();

    fx.advance(1 * SEC);
    let mut zio = pool_write(&spa, 10);
    ignored_writes(&mut zio);

    fx.advance(6 * SEC);
    spa_ignored_writes_check(&spa);
}

#[test]
fn test_ignored_writes_txg_window() {
    let _fx = EngineFixture::new();
    let spa = loaded_pool("tank");
    inject_fault("tank", InjectFlags::empty(), &ignored_writes_record(-3))
        .unwrap()
        .unwrap();

    let mut zio = pool_write(&spa, 10);
    ignored_writes(&mut zio);

    // Window runs through txg 13.
    spa.set_syncing_txg(12);
    spa_ignored_writes_check(&spa);
    spa.set_syncing_txg(13);
    spa_ignored_writes_check(&spa);
}

#[test]
#[should_panic(expected = "past the configured txg window")]
fn test_ignored_writes_txg_window_expiry_trips_check() {
    let _fx = EngineFixture::new();
    let spa = loaded_pool("tank");
    inject_fault("tank", InjectFlags::empty(), &ignored_writes_record(-3))
        .unwrap()
        .unwrap();

    let mut zio = pool_write(&spa, 10);
    ignored_writes(&mut zio);

    spa.set_syncing_txg(14);
    spa_ignored_writes_check(&spa);
}

fn import_delay_record(duration: i64) -> InjectRecord {
    InjectRecord {
        cmd: InjectCmd::DelayImport,
        duration,
        ..InjectRecord::default()
    }
}

#[test]
fn test_import_delay_sleeps_remainder_and_self_clears() {
    let fx = EngineFixture::new();
    // The pool is not in the namespace: it is still being imported.
    inject_fault("tank", InjectFlags::empty(), &import_delay_record(3))
        .unwrap()
        .unwrap();

    let spa = Spa::new("tank", 1);
    import_delay(&spa, 1 * SEC);

    // 1 second elapsed of a 3 second delay: sleep out the other 2.
    assert_eq!(fx.sleeps(), [2 * SEC]);
    assert_eq!(fx.now(), 2 * SEC);

    // One-shot: the handler cleared itself.
    let mut cursor = 0;
    assert!(inject_list_next(&mut cursor).is_none());

    // A second import pause finds nothing and sleeps not at all.
    import_delay(&spa, 1 * SEC);
    assert_eq!(fx.sleeps().len(), 1);
}

#[test]
fn test_import_delay_already_elapsed_does_not_sleep() {
    let fx = EngineFixture::new();
    inject_fault("tank", InjectFlags::empty(), &import_delay_record(3))
        .unwrap()
        .unwrap();

    let spa = Spa::new("tank", 1);
    import_delay(&spa, 5 * SEC);

    assert!(fx.sleeps().is_empty());

    // Even without sleeping, the one-shot is spent.
    let mut cursor = 0;
    assert!(inject_list_next(&mut cursor).is_none());
}

#[test]
fn test_export_delay_matches_by_pool_name() {
    let fx = EngineFixture::new();
    let spa = loaded_pool("tank");
    let other = loaded_pool("swamp");

    let rec = InjectRecord {
        cmd: InjectCmd::DelayExport,
        duration: 4,
        ..InjectRecord::default()
    };
    inject_fault("tank", InjectFlags::empty(), &rec)
        .unwrap()
        .unwrap();

    // The wrong pool leaves the handler armed.
    export_delay(&other, 0);
    assert!(fx.sleeps().is_empty());
    let mut cursor = 0;
    assert!(inject_list_next(&mut cursor).is_some());

    export_delay(&spa, 1 * SEC);
    assert_eq!(fx.sleeps(), [3 * SEC]);
    let mut cursor = 0;
    assert!(inject_list_next(&mut cursor).is_none());
}
