//! Error numbers surfaced across the engine boundary.
//!
//! The discriminants follow the conventional Unix assignments so that
//! control-plane tooling and telemetry report familiar codes. `Ecksum`
//! carries the engine's checksum-mismatch alias.

use core::fmt;

/// Errors returned across the engine boundary and injected into I/Os.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Errno {
    /// No such pool, dataset, object, or handler (ENOENT)
    NoEntity = 2,
    /// I/O error (EIO)
    Io = 5,
    /// Device not configured / gone away (ENXIO)
    NoDevice = 6,
    /// Resource busy (EBUSY)
    Busy = 16,
    /// Already exists (EEXIST)
    Exists = 17,
    /// Invalid argument (EINVAL)
    Invalid = 22,
    /// Argument out of domain (EDOM)
    Domain = 33,
    /// Illegal byte sequence; injected as a silent bit flip (EILSEQ)
    IllegalByteSequence = 84,
    /// Checksum mismatch surfaced by block verification (ECKSUM)
    Checksum = 52,
}

impl Errno {
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoEntity => write!(f, "no such entity"),
            Self::Io => write!(f, "I/O error"),
            Self::NoDevice => write!(f, "device not configured"),
            Self::Busy => write!(f, "resource busy"),
            Self::Exists => write!(f, "already exists"),
            Self::Invalid => write!(f, "invalid argument"),
            Self::Domain => write!(f, "argument out of domain"),
            Self::IllegalByteSequence => write!(f, "illegal byte sequence"),
            Self::Checksum => write!(f, "checksum mismatch"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_codes_are_conventional() {
        assert_eq!(Errno::NoEntity.as_i32(), 2);
        assert_eq!(Errno::Io.as_i32(), 5);
        assert_eq!(Errno::NoDevice.as_i32(), 6);
        assert_eq!(Errno::Invalid.as_i32(), 22);
        assert_eq!(Errno::Domain.as_i32(), 33);
    }
}
