//! Device and label faults.
//!
//! Whole-device errors addressed by vdev guid, plus faults against the
//! label regions at either end of a leaf device. `EILSEQ` records do
//! not fail the I/O at all; they flip a single bit in the returned data
//! and let checksum verification discover the damage.

use riptide_abi::{Errno, InjectCmd};
use riptide_lib::random_in_range;
use riptide_pool::vdev::{self, LABEL_END_SIZE, LABEL_START_SIZE};
use riptide_pool::{Vdev, VdevAux, Zio, ZioFlags, ZioType};

use crate::matcher;
use crate::registry;

/// Is the I/O part of a label read/update that a label fault targets?
///
/// The record's `[start, end]` range is relative to one label copy; it
/// is translated to the absolute region of whichever copy the I/O
/// touches.
pub fn label_injection(zio: &Zio, error: Errno) -> Option<Errno> {
    if !registry::injection_enabled() {
        return None;
    }

    let vd = zio.vd.as_ref()?;
    let offset = zio.offset;

    if offset >= LABEL_START_SIZE && offset < vd.psize() - LABEL_END_SIZE {
        return None;
    }

    let handlers = registry::handlers();
    for handler in handlers.iter() {
        if handler.record.cmd != InjectCmd::LabelFault {
            continue;
        }

        let Some(label) = vdev::label_number(vd.psize(), offset) else {
            continue;
        };
        let start = vdev::label_offset(vd.psize(), label, handler.record.start);
        let end = vdev::label_offset(vd.psize(), label, handler.record.end);

        if vd.guid() == handler.record.guid && offset >= start && offset <= end {
            handler.bump_match();
            handler.bump_inject();
            return Some(error);
        }
    }

    None
}

/// Flip one uniformly random bit in the I/O's data buffer; first
/// overlapping segment wins.
fn bitflip(zio: &mut Zio) {
    debug_assert_eq!(zio.io_type, ZioType::Read);

    let size = zio.size;
    zio.abd.iterate(0, size, |chunk| {
        let byte = random_in_range(chunk.len() as u64) as usize;
        let bit = random_in_range(8) as u8;
        chunk[byte] ^= 1 << bit;
        true // stop after the first flip
    });
}

fn device_injection_impl(
    vd: &Vdev,
    mut zio: Option<&mut Zio>,
    err1: Errno,
    err2: Option<Errno>,
) -> Option<Errno> {
    if !registry::injection_enabled() {
        return None;
    }

    // Skip faults in the labels unless this is a device open (no zio),
    // a flush (offset is meaningless), or a probe; probes must reach
    // their matching probe records.
    if let Some(z) = zio.as_deref() {
        if z.io_type != ZioType::Flush && !z.flags.contains(ZioFlags::PROBE) {
            let offset = z.offset;
            if offset < LABEL_START_SIZE || offset >= vd.psize() - LABEL_END_SIZE {
                return None;
            }
        }
    }

    let handlers = registry::handlers();
    for handler in handlers.iter() {
        let record = &handler.record;
        if record.cmd != InjectCmd::DeviceFault || vd.guid() != record.guid {
            continue;
        }

        // Failfast records leave already-struggling I/Os alone, and
        // never fail a bare open.
        if record.failfast
            && zio
                .as_deref()
                .is_none_or(|z| z.flags.intersects(ZioFlags::IO_RETRY | ZioFlags::TRYHARD))
        {
            continue;
        }

        if let Some(z) = zio.as_deref() {
            if !matcher::match_iotype(z, record.iotype) {
                continue;
            }
        }

        if record.error == Some(err1) || (err2.is_some() && record.error == err2) {
            handler.bump_match();

            if !matcher::freq_triggered(record.freq) {
                continue;
            }

            handler.bump_inject();

            // A failed open: pretend the device has gone away.
            if err1 == Errno::NoDevice {
                vd.set_aux(VdevAux::OpenFailed);
            }

            // Mark the I/O retried so downstream accounting and fault
            // telemetry see the failure.
            if !record.failfast {
                if let Some(z) = zio.as_deref_mut() {
                    z.flags |= ZioFlags::IO_RETRY;
                }
            }

            // EILSEQ: corrupt the data instead of failing the I/O.
            if record.error == Some(Errno::IllegalByteSequence) {
                if let Some(z) = zio.as_deref_mut() {
                    bitflip(z);
                }
                return None;
            }

            return record.error;
        }

        // A device marked gone surfaces EIO for I/Os that asked about
        // other errors, while still tripping the open path above.
        if record.error == Some(Errno::NoDevice) {
            handler.bump_match();
            handler.bump_inject();
            return Some(Errno::Io);
        }
    }

    None
}

/// Should I/O against this device fail with `error`? `zio` is absent
/// for device opens.
pub fn device_injection(vd: &Vdev, zio: Option<&mut Zio>, error: Errno) -> Option<Errno> {
    device_injection_impl(vd, zio, error, None)
}

/// As [`device_injection`], matching either of two candidate errors.
pub fn device_injections(
    vd: &Vdev,
    zio: Option<&mut Zio>,
    err1: Errno,
    err2: Errno,
) -> Option<Errno> {
    device_injection_impl(vd, zio, err1, Some(err2))
}
