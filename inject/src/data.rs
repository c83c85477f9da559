//! Logical data faults.
//!
//! Read-path entry points: decide whether an I/O carrying logical data
//! should fail with a synthetic errno.

use alloc::sync::Arc;

use riptide_abi::{Errno, InjectCmd, ObjectType, Zbookmark};
use riptide_pool::{Spa, Zio, ZioPriority, ZioType};

use crate::matcher;
use crate::registry;

/// Should this I/O return a synthetic failure? Returns the errno to
/// surface, if any.
pub fn fault_injection(zio: &Zio, error: Errno) -> Option<Errno> {
    if !registry::injection_enabled() {
        return None;
    }

    // Ignore I/O not associated with any logical data.
    let zb = zio.logical_bookmark.as_ref()?;

    // Only reads support data-fault injection.
    if zio.io_type != ZioType::Read {
        return None;
    }

    // A rebuild I/O has no checksum to verify.
    if zio.priority == ZioPriority::Rebuild && error == Errno::Checksum {
        return None;
    }

    let object_type = zio
        .bp
        .as_ref()
        .map_or(ObjectType::None, |bp| bp.object_type());
    let dva = matcher::match_dva(zio);

    let handlers = registry::handlers();
    for handler in handlers.iter() {
        if handler.record.cmd != InjectCmd::DataFault || !handler.targets_spa(&zio.spa) {
            continue;
        }

        if matcher::match_handler(handler, zb, object_type, dva, error) {
            return Some(error);
        }
    }

    None
}

/// Should this decryption fail? Decryption faults can fire from both
/// the cache and the I/O pipeline, so the caller passes the bookmark
/// explicitly.
pub fn decrypt_injection(
    spa: &Arc<Spa>,
    zb: &Zbookmark,
    object_type: ObjectType,
    error: Errno,
) -> Option<Errno> {
    if !registry::injection_enabled() {
        return None;
    }

    let handlers = registry::handlers();
    for handler in handlers.iter() {
        if handler.record.cmd != InjectCmd::DecryptFault || !handler.targets_spa(spa) {
            continue;
        }

        if matcher::match_handler(handler, zb, object_type, None, error) {
            return Some(error);
        }
    }

    None
}
