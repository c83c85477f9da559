//! Declarative fault descriptions.
//!
//! An [`InjectRecord`] is built by the control plane and handed to the
//! engine at registration time. The engine treats every field as
//! read-only; runtime state (telemetry counters, lane schedules, drop
//! windows) lives with the registered handler, not the record.

use bitflags::bitflags;

use crate::block::ObjectType;
use crate::error::Errno;

/// Scale of the fine-grained frequency range. Frequencies at or below
/// 100 are whole percent; larger values are fractions of this maximum,
/// giving 0.01% resolution.
pub const PERCENTAGE_MAX: u32 = 10_000;

/// Byte length of the function-tag buffer carried by panic records.
pub const FUNC_NAME_LEN: usize = 64;

/// Which fault a record injects.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InjectCmd {
    /// Fail a logical data read with the configured errno
    #[default]
    DataFault = 0,
    /// Fail a decryption with the configured errno
    DecryptFault = 1,
    /// Fail an I/O inside a device label region
    LabelFault = 2,
    /// Fail (or corrupt) I/O against a whole device
    DeviceFault = 3,
    /// Add queueing latency to device I/O
    DelayIo = 4,
    /// Drop writes after metadata bookkeeping, simulating hardware that
    /// ignores cache flushes
    IgnoredWrites = 5,
    /// Panic the host at a tagged call site
    Panic = 6,
    /// Stall a pool import
    DelayImport = 7,
    /// Stall a pool export
    DelayExport = 8,
}

impl InjectCmd {
    /// Import and export delays match pools by name rather than holding
    /// a pool reference.
    #[inline]
    pub const fn is_pool_delay(self) -> bool {
        matches!(self, Self::DelayImport | Self::DelayExport)
    }
}

/// I/O types an injection record can target.
///
/// `All` covers every standard type; probe I/Os are matched only by
/// `Probe`, never by `All`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InjectIoType {
    #[default]
    Read = 0,
    Write = 1,
    Free = 2,
    Claim = 3,
    Flush = 4,
    Probe = 5,
    All = 6,
}

bitflags! {
    /// Registration-time behavior flags.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InjectFlags: u32 {
        /// Unload the target pool first so the next load re-traps
        /// metadata faults.
        const UNLOAD_SPA = 1 << 0;
        /// Record `start`/`end` are byte offsets; translate them into
        /// block ids through the target dnode's geometry.
        const CALC_RANGE = 1 << 1;
        /// Run validation and side effects only; do not install a
        /// handler.
        const NULL = 1 << 2;
        /// Flush the block cache so cached reads go back through the
        /// I/O pipeline (and the injection path).
        const FLUSH_ARC = 1 << 3;
    }
}

/// A declarative fault description.
///
/// Targeting fields select a slice of the storage address space; which
/// fields are consulted depends on `cmd`. Unused fields are left at
/// their defaults.
#[derive(Debug, Clone)]
pub struct InjectRecord {
    pub cmd: InjectCmd,
    /// Target object set (data and decrypt faults).
    pub objset: u64,
    /// Target object (data and decrypt faults).
    pub object: u64,
    /// Target indirection level.
    pub level: i64,
    /// First block id of the inclusive target range.
    pub start: u64,
    /// Last block id of the inclusive target range.
    pub end: u64,
    /// Bitmask of DVA copies eligible to fire; 0 means any copy.
    pub dvas: u64,
    /// Vdev guid (device, label, and delay-io faults).
    pub guid: u64,
    /// Function tag, NUL-padded (panic records). See [`Self::func_str`].
    pub func: [u8; FUNC_NAME_LEN],
    /// Block object type (meta-object-set targeting and panic sites).
    pub object_type: ObjectType,
    /// Which I/O types the record applies to.
    pub iotype: InjectIoType,
    /// Errno to inject; `None` never matches a pipeline error.
    pub error: Option<Errno>,
    /// Firing probability: 0 fires always; 1..=100 is whole percent;
    /// larger values are scaled by [`PERCENTAGE_MAX`].
    pub freq: u32,
    /// Skip I/Os that are already retrying (device faults).
    pub failfast: bool,
    /// Per-lane service time in nanoseconds (delay-io).
    pub timer: u64,
    /// Lane count of the queueing model (delay-io).
    pub nlanes: u32,
    /// Window length: seconds when positive, transaction groups when
    /// negative (ignored-writes and pool delays).
    pub duration: i64,
}

impl Default for InjectRecord {
    fn default() -> Self {
        Self {
            cmd: InjectCmd::default(),
            objset: 0,
            object: 0,
            level: 0,
            start: 0,
            end: 0,
            dvas: 0,
            guid: 0,
            func: [0; FUNC_NAME_LEN],
            object_type: ObjectType::None,
            iotype: InjectIoType::default(),
            error: None,
            freq: 0,
            failfast: false,
            timer: 0,
            nlanes: 0,
            duration: 0,
        }
    }
}

impl InjectRecord {
    /// The function tag as a string, up to the first NUL.
    pub fn func_str(&self) -> &str {
        let len = self
            .func
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.func.len());
        core::str::from_utf8(&self.func[..len]).unwrap_or("<invalid>")
    }

    /// Store a function tag, truncating to the buffer length.
    pub fn set_func(&mut self, tag: &str) {
        self.func = [0; FUNC_NAME_LEN];
        let n = tag.len().min(FUNC_NAME_LEN);
        self.func[..n].copy_from_slice(&tag.as_bytes()[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_func_tag_roundtrip() {
        let mut record = InjectRecord::default();
        record.set_func("spa_vdev_attach");
        assert_eq!(record.func_str(), "spa_vdev_attach");

        record.set_func("");
        assert_eq!(record.func_str(), "");
    }

    #[test]
    fn test_func_tag_truncates() {
        let mut record = InjectRecord::default();
        let long = [b'x'; 2 * FUNC_NAME_LEN];
        record.set_func(core::str::from_utf8(&long).unwrap());
        assert_eq!(record.func_str().len(), FUNC_NAME_LEN);
    }

    #[test]
    fn test_default_record_is_wildcardish() {
        let record = InjectRecord::default();
        assert_eq!(record.error, None);
        assert_eq!(record.freq, 0);
        assert_eq!(record.dvas, 0);
        assert!(!record.failfast);
    }
}
