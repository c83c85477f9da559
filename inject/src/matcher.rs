//! Record/I-O matching.
//!
//! Decides whether an in-flight I/O falls inside the slice of the
//! storage address space an injection record targets, and whether the
//! record's firing probability triggers this time around.

use alloc::sync::Arc;

use riptide_abi::inject::{InjectIoType, PERCENTAGE_MAX};
use riptide_abi::{Errno, META_DNODE_OBJECT, META_OBJSET, ObjectType, Zbookmark};
use riptide_lib::random_in_range;
use riptide_pool::vdev::LABEL_START_SIZE;
use riptide_pool::zio::{Zio, ZioChild, ZioFlags, ZioType};

use crate::registry::Handler;

/// Did the requested firing frequency trigger?
///
/// Zero means always. Values at or below 100 are legacy whole-percent
/// records; anything larger is scaled against [`PERCENTAGE_MAX`] for
/// finer-grained probabilities.
pub(crate) fn freq_triggered(freq: u32) -> bool {
    if freq == 0 {
        return true;
    }

    let maximum = if freq <= 100 { 100 } else { PERCENTAGE_MAX };
    random_in_range(maximum as u64) < freq as u64
}

/// Does the handler's record match an I/O at `zb`, and does it fire?
///
/// Matching the meta object set goes by block type rather than block
/// id, because meta-dnode block ids are not stable. Everything else is
/// an exact match on position, DVA eligibility, and the pipeline's
/// error. Bumps the handler's telemetry as a side effect.
pub(crate) fn match_handler(
    handler: &Handler,
    zb: &Zbookmark,
    object_type: ObjectType,
    dva: Option<u32>,
    error: Errno,
) -> bool {
    let record = &handler.record;

    let matched = if zb.objset == META_OBJSET
        && record.objset == META_OBJSET
        && record.object == META_DNODE_OBJECT
    {
        record.object_type == ObjectType::None || record.object_type == object_type
    } else {
        zb.objset == record.objset
            && zb.object == record.object
            && zb.level == record.level
            && zb.blkid >= record.start
            && zb.blkid <= record.end
            && (record.dvas == 0 || dva.is_some_and(|d| record.dvas & (1u64 << d) != 0))
            && record.error == Some(error)
    };

    if !matched {
        return false;
    }

    handler.bump_match();
    if !freq_triggered(record.freq) {
        return false;
    }

    handler.bump_inject();
    true
}

/// Which DVA copy is a physical vdev-child I/O reading?
///
/// Iterates the block pointer's copies in reverse index order and
/// compares each resolved `(vdev, offset)` against the in-flight I/O,
/// compensating for the label region on leaf devices. Reverse order
/// matters: an I/O that matches no copy must report `None`, not copy 0.
pub(crate) fn match_dva(zio: &Zio) -> Option<u32> {
    let bp = zio.bp.as_ref()?;
    let vd = zio.vd.as_ref()?;
    if zio.child_type != ZioChild::Vdev {
        return None;
    }

    for i in (0..bp.ndvas()).rev() {
        let dva = bp.dva(i);
        let mut offset = dva.offset;
        if vd.is_leaf() {
            offset += LABEL_START_SIZE;
        }

        let top = zio.spa.vdev_lookup_top(dva.vdev);
        if top.is_some_and(|t| Arc::ptr_eq(&t, vd)) && zio.offset == offset {
            return Some(i as u32);
        }
    }

    None
}

/// Does this I/O's type satisfy the record's iotype constraint?
///
/// Probe I/Os match only the probe iotype regardless of their own
/// type; `All` covers every standard type but never probes.
pub(crate) fn match_iotype(zio: &Zio, iotype: InjectIoType) -> bool {
    if zio.flags.contains(ZioFlags::PROBE) {
        return iotype == InjectIoType::Probe;
    }

    match iotype {
        InjectIoType::All => true,
        InjectIoType::Probe => false,
        InjectIoType::Read => zio.io_type == ZioType::Read,
        InjectIoType::Write => zio.io_type == ZioType::Write,
        InjectIoType::Free => zio.io_type == ZioType::Free,
        InjectIoType::Claim => zio.io_type == ZioType::Claim,
        InjectIoType::Flush => zio.io_type == ZioType::Flush,
    }
}
