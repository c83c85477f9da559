//! Byte-range translation.
//!
//! Records registered with the calc-range flag carry byte offsets in
//! `start`/`end`; this walks pool → dataset → dnode and converts them
//! to block ids using the object's block-size geometry. Failure
//! propagates the underlying errno and the handler is never installed.

use riptide_abi::{Errno, InjectRecord};
use riptide_pool::blkptr::BLKPTR_SHIFT;
use riptide_pool::pool_hold;

pub(crate) fn calculate_range(pool: &str, record: &mut InjectRecord) -> Result<(), Errno> {
    let spa = pool_hold(pool)?;
    let ds = spa.dataset_hold(record.objset)?;
    let dn = ds.dnode_hold(record.object)?;

    // Translate the range into block ids. The full-device wildcard
    // range stays a wildcard.
    if record.start != 0 || record.end != u64::MAX {
        record.start >>= dn.datablkshift;
        record.end >>= dn.datablkshift;
    }

    if record.level > 0 {
        if record.level >= dn.nlevels as i64 {
            return Err(Errno::Domain);
        }

        if record.start != 0 || record.end != 0 {
            let shift = dn.indblkshift as u32 - BLKPTR_SHIFT;
            for _ in 0..record.level {
                record.start >>= shift;
                record.end >>= shift;
            }
        }
    }

    Ok(())
}
