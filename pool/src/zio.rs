//! The in-flight I/O model.
//!
//! Only the fields the fault-injection entry points consult are
//! modelled; the pipeline state machine itself lives with the I/O
//! scheduler.

use alloc::sync::Arc;

use bitflags::bitflags;
use riptide_abi::Zbookmark;

use crate::abd::Abd;
use crate::blkptr::BlockPointer;
use crate::spa::Spa;
use crate::vdev::Vdev;

/// Fundamental I/O operation types.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZioType {
    #[default]
    Null = 0,
    Read = 1,
    Write = 2,
    Free = 3,
    Claim = 4,
    Flush = 5,
    Trim = 6,
}

/// Scheduling class of an I/O.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZioPriority {
    #[default]
    SyncRead = 0,
    SyncWrite = 1,
    AsyncRead = 2,
    AsyncWrite = 3,
    Scrub = 4,
    /// Reads issued while reconstructing a replaced device; they carry
    /// no checksum to verify.
    Rebuild = 5,
}

/// Position of an I/O in the parent/child tree.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZioChild {
    #[default]
    Logical = 0,
    Gang = 1,
    Ddt = 2,
    Vdev = 3,
}

bitflags! {
    /// Per-I/O behavior flags.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ZioFlags: u32 {
        /// The I/O failed once and is being reissued.
        const IO_RETRY = 1 << 0;
        /// Last-resort reissue; exhaust every device before failing.
        const TRYHARD = 1 << 1;
        /// Health-check I/O probing a suspect device.
        const PROBE = 1 << 2;
        /// Read-ahead; failure is not reported to the application.
        const SPECULATIVE = 1 << 3;
    }
}

bitflags! {
    /// Pipeline stages still ahead of an I/O.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ZioPipeline: u32 {
        const OPEN = 1 << 0;
        const READY = 1 << 1;
        const VDEV_IO_START = 1 << 2;
        const VDEV_IO_DONE = 1 << 3;
        const VDEV_IO_ASSESS = 1 << 4;
        const CHECKSUM_VERIFY = 1 << 5;
        const DONE = 1 << 6;

        /// The stages that move bits to and from the device. Stripping
        /// these drops a write after its metadata bookkeeping.
        const VDEV_IO_STAGES = Self::VDEV_IO_START.bits()
            | Self::VDEV_IO_DONE.bits()
            | Self::VDEV_IO_ASSESS.bits();
    }
}

/// An in-flight I/O.
///
/// Fields are public: the pipeline owns the I/O exclusively while a
/// stage runs, and the injection entry points receive it by reference
/// from the running stage.
pub struct Zio {
    pub spa: Arc<Spa>,
    pub vd: Option<Arc<Vdev>>,
    pub io_type: ZioType,
    pub priority: ZioPriority,
    pub child_type: ZioChild,
    pub flags: ZioFlags,
    /// This I/O's own position.
    pub bookmark: Zbookmark,
    /// Bookmark of the logical ancestor; `None` when the I/O carries no
    /// logical data (e.g. pure vdev maintenance).
    pub logical_bookmark: Option<Zbookmark>,
    pub bp: Option<BlockPointer>,
    /// Device byte offset (physical I/Os).
    pub offset: u64,
    pub size: u64,
    /// Transaction group the I/O belongs to.
    pub txg: u64,
    pub pipeline: ZioPipeline,
    pub abd: Abd,
}

impl Zio {
    /// A bare I/O of the given type against a pool; callers fill in the
    /// rest.
    pub fn new(spa: Arc<Spa>, io_type: ZioType) -> Self {
        Self {
            spa,
            vd: None,
            io_type,
            priority: ZioPriority::default(),
            child_type: ZioChild::Logical,
            flags: ZioFlags::empty(),
            bookmark: Zbookmark::default(),
            logical_bookmark: None,
            bp: None,
            offset: 0,
            size: 0,
            txg: 0,
            pipeline: ZioPipeline::all(),
            abd: Abd::empty(),
        }
    }
}
