//! Dataset and dnode geometry.
//!
//! The range translator turns a byte range into block ids by walking
//! pool → dataset → dnode and reading the dnode's block-size geometry.
//! Holds are modelled as reference-counted handles; releasing a hold is
//! dropping it.

use alloc::sync::Arc;
use alloc::vec::Vec;

use riptide_abi::Errno;
use spin::Mutex;

use crate::spa::{Spa, spa_namespace};

/// Block-size geometry of one object.
#[derive(Debug, Clone, Copy)]
pub struct DnodeGeometry {
    /// log2 of the data block size.
    pub datablkshift: u8,
    /// log2 of the indirect block size.
    pub indblkshift: u8,
    /// Depth of the indirection tree, counting the data level.
    pub nlevels: u8,
}

/// An object set within a pool.
pub struct Dataset {
    objset: u64,
    dnodes: Mutex<Vec<(u64, DnodeGeometry)>>,
}

impl Dataset {
    pub fn new(objset: u64) -> Arc<Self> {
        Arc::new(Self {
            objset,
            dnodes: Mutex::new(Vec::new()),
        })
    }

    #[inline]
    pub fn objset(&self) -> u64 {
        self.objset
    }

    /// Record an object's geometry.
    pub fn insert_dnode(&self, object: u64, geometry: DnodeGeometry) {
        self.dnodes.lock().push((object, geometry));
    }

    /// Hold an object's dnode and read its geometry.
    pub fn dnode_hold(&self, object: u64) -> Result<DnodeGeometry, Errno> {
        self.dnodes
            .lock()
            .iter()
            .find(|(obj, _)| *obj == object)
            .map(|(_, geom)| *geom)
            .ok_or(Errno::NoEntity)
    }
}

/// Hold a pool by name for dataset traversal. The pool must be loaded.
pub fn pool_hold(name: &str) -> Result<Arc<Spa>, Errno> {
    let ns = spa_namespace().lock();
    let spa = ns.lookup(name).ok_or(Errno::NoEntity)?;
    if !spa.is_loaded() {
        return Err(Errno::NoEntity);
    }
    Ok(spa)
}
