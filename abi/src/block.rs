//! Block addressing shared between the engine and the control plane.

/// Object-set number of the pool-wide meta object set.
pub const META_OBJSET: u64 = 0;

/// Object number that addresses a dataset's meta dnode.
pub const META_DNODE_OBJECT: u64 = 0;

/// Logical position of a block: which object set, object, indirection
/// level, and block id an I/O addresses. Copied into every logical I/O
/// when it is issued.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Zbookmark {
    pub objset: u64,
    pub object: u64,
    pub level: i64,
    pub blkid: u64,
}

impl Zbookmark {
    pub const fn new(objset: u64, object: u64, level: i64, blkid: u64) -> Self {
        Self {
            objset,
            object,
            level,
            blkid,
        }
    }
}

/// On-disk object types.
///
/// Injection records use these to target meta-object-set blocks by type
/// rather than block id, because meta-dnode block ids are not stable
/// across pool loads.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectType {
    /// No type constraint / untyped block
    #[default]
    None = 0,
    /// Object directory
    ObjectDirectory = 1,
    /// Packed config nvlist
    PackedConfig = 2,
    /// Space map
    SpaceMap = 3,
    /// Intent log
    IntentLog = 4,
    /// Dnode block
    Dnode = 5,
    /// Object-set header
    Objset = 6,
    /// Plain file contents
    PlainFile = 7,
    /// Directory contents
    DirContents = 8,
    /// Master node
    MasterNode = 9,
    /// Pool history
    PoolHistory = 10,
}
