use riptide_abi::{InjectCmd, InjectFlags, InjectIoType, InjectRecord};
use riptide_pool::vdev::LABEL_START_SIZE;
use riptide_pool::zio::ZioType;

use crate::delay::{lane_cursor, lane_slots};
use crate::test_fixtures::{EngineFixture, device_read, leaf_vdev, loaded_pool};
use crate::{inject_fault, inject_list_next, io_delay};

const MS: u64 = 1_000_000;

fn delay_record(guid: u64, timer: u64, nlanes: u32) -> InjectRecord {
    InjectRecord {
        cmd: InjectCmd::DelayIo,
        guid,
        iotype: InjectIoType::All,
        timer,
        nlanes,
        ..InjectRecord::default()
    }
}

#[test]
fn test_two_lanes_queue_in_pairs() {
    let fx = EngineFixture::new();
    let spa = loaded_pool("tank");
    let vd = leaf_vdev(&spa, 0xcafe, 0);
    inject_fault("tank", InjectFlags::empty(), &delay_record(0xcafe, 10 * MS, 2))
        .unwrap()
        .unwrap();

    assert_eq!(fx.now(), 0);
    let targets: std::vec::Vec<u64> = (0..4)
        .map(|_| {
            let zio = device_read(&spa, &vd, LABEL_START_SIZE + 4096, 512);
            io_delay(&zio).unwrap()
        })
        .collect();

    assert_eq!(targets, [10 * MS, 10 * MS, 20 * MS, 20 * MS]);
}

#[test]
fn test_lane_isolation_at_capacity() {
    let _fx = EngineFixture::new();
    let spa = loaded_pool("tank");
    let vd = leaf_vdev(&spa, 0xcafe, 0);
    let lanes = 3;
    inject_fault(
        "tank",
        InjectFlags::empty(),
        &delay_record(0xcafe, 7 * MS, lanes),
    )
    .unwrap()
    .unwrap();

    for _ in 0..lanes {
        let zio = device_read(&spa, &vd, LABEL_START_SIZE + 4096, 512);
        assert_eq!(io_delay(&zio), Some(7 * MS));
    }

    // One past capacity queues behind the earliest lane.
    let zio = device_read(&spa, &vd, LABEL_START_SIZE + 4096, 512);
    assert_eq!(io_delay(&zio), Some(14 * MS));
}

#[test]
fn test_round_robin_cursor_wraps() {
    let _fx = EngineFixture::new();
    let spa = loaded_pool("tank");
    let vd = leaf_vdev(&spa, 0xcafe, 0);
    let id = inject_fault("tank", InjectFlags::empty(), &delay_record(0xcafe, 10 * MS, 2))
        .unwrap()
        .unwrap();

    for n in 1..=5u64 {
        let zio = device_read(&spa, &vd, LABEL_START_SIZE + 4096, 512);
        io_delay(&zio).unwrap();
        assert_eq!(lane_cursor(id), Some((n % 2) as usize));
    }
}

#[test]
fn test_lane_targets_never_regress() {
    let fx = EngineFixture::new();
    let spa = loaded_pool("tank");
    let vd = leaf_vdev(&spa, 0xcafe, 0);
    let id = inject_fault("tank", InjectFlags::empty(), &delay_record(0xcafe, 5 * MS, 2))
        .unwrap()
        .unwrap();

    let mut previous = lane_slots(id).unwrap();
    for step in 0..8 {
        let zio = device_read(&spa, &vd, LABEL_START_SIZE + 4096, 512);
        io_delay(&zio).unwrap();

        let current = lane_slots(id).unwrap();
        for (lane, (before, after)) in previous.iter().zip(current.iter()).enumerate() {
            assert!(
                after >= before,
                "lane {} regressed at step {}: {} -> {}",
                lane,
                step,
                before,
                after
            );
        }
        previous = current;

        if step % 3 == 0 {
            fx.advance(2 * MS);
        }
    }
}

#[test]
fn test_idle_lane_restarts_from_now() {
    let fx = EngineFixture::new();
    let spa = loaded_pool("tank");
    let vd = leaf_vdev(&spa, 0xcafe, 0);
    inject_fault("tank", InjectFlags::empty(), &delay_record(0xcafe, 10 * MS, 1))
        .unwrap()
        .unwrap();

    let zio = device_read(&spa, &vd, LABEL_START_SIZE + 4096, 512);
    assert_eq!(io_delay(&zio), Some(10 * MS));

    // Long after the lane drained, service restarts from the clock.
    fx.advance(100 * MS);
    let zio = device_read(&spa, &vd, LABEL_START_SIZE + 4096, 512);
    assert_eq!(io_delay(&zio), Some(110 * MS));
}

#[test]
fn test_earliest_handler_wins_and_claims_alone() {
    let _fx = EngineFixture::new();
    let spa = loaded_pool("tank");
    let vd = leaf_vdev(&spa, 0xcafe, 0);
    let slow = inject_fault("tank", InjectFlags::empty(), &delay_record(0xcafe, 10 * MS, 1))
        .unwrap()
        .unwrap();
    let fast = inject_fault("tank", InjectFlags::empty(), &delay_record(0xcafe, 4 * MS, 1))
        .unwrap()
        .unwrap();

    let zio = device_read(&spa, &vd, LABEL_START_SIZE + 4096, 512);
    assert_eq!(io_delay(&zio), Some(4 * MS));

    // Both handlers matched; only the winner injected or moved a lane.
    let mut cursor = 0;
    while let Some(listed) = inject_list_next(&mut cursor) {
        assert_eq!(listed.match_count, 1);
        if listed.id == fast {
            assert_eq!(listed.inject_count, 1);
        } else {
            assert_eq!(listed.id, slow);
            assert_eq!(listed.inject_count, 0);
        }
    }
    assert_eq!(lane_slots(slow).unwrap(), [0]);
    assert_eq!(lane_slots(fast).unwrap(), [4 * MS]);
}

#[test]
fn test_delay_filters_on_guid_and_iotype() {
    let _fx = EngineFixture::new();
    let spa = loaded_pool("tank");
    let vd = leaf_vdev(&spa, 0xcafe, 0);
    let other = leaf_vdev(&spa, 0xbeef, 1);

    let mut rec = delay_record(0xcafe, 10 * MS, 1);
    rec.iotype = InjectIoType::Write;
    inject_fault("tank", InjectFlags::empty(), &rec)
        .unwrap()
        .unwrap();

    // Wrong vdev.
    let zio = device_read(&spa, &other, LABEL_START_SIZE + 4096, 512);
    assert_eq!(io_delay(&zio), None);

    // Right vdev, wrong I/O type.
    let zio = device_read(&spa, &vd, LABEL_START_SIZE + 4096, 512);
    assert_eq!(io_delay(&zio), None);

    // Right vdev and type.
    let mut zio = device_read(&spa, &vd, LABEL_START_SIZE + 4096, 512);
    zio.io_type = ZioType::Write;
    assert_eq!(io_delay(&zio), Some(10 * MS));
}

#[test]
fn test_no_delay_handlers_short_circuits() {
    let _fx = EngineFixture::new();
    let spa = loaded_pool("tank");
    let vd = leaf_vdev(&spa, 0xcafe, 0);

    let zio = device_read(&spa, &vd, LABEL_START_SIZE + 4096, 512);
    assert_eq!(io_delay(&zio), None);
}
