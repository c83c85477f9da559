//! Storage substrate the fault injector targets: the pool namespace,
//! vdev tree and label geometry, the in-flight I/O model, block
//! pointers, segmented data buffers, and dataset/dnode geometry.
//!
//! Only the shapes the injection core consumes are modelled here; the
//! allocator, cache, and transaction machinery live elsewhere.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod abd;
pub mod blkptr;
pub mod cache;
pub mod objset;
pub mod spa;
pub mod vdev;
pub mod zio;

pub use abd::Abd;
pub use blkptr::{BLKPTR_SHIFT, BlockPointer, Dva};
pub use cache::{cache_flush, cache_register_flush};
pub use objset::{Dataset, DnodeGeometry, pool_hold};
pub use spa::{Spa, spa_inject_addref, spa_inject_delref, spa_namespace, spa_reset};
pub use vdev::{LABEL_END_SIZE, LABEL_START_SIZE, Vdev, VdevAux};
pub use zio::{Zio, ZioChild, ZioFlags, ZioPipeline, ZioPriority, ZioType};
