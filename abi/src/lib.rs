//! Riptide engine/control-plane shared types.
//!
//! This crate provides the canonical definitions for every type shared
//! between the storage engine and its control plane: injection records,
//! block addresses, and error numbers. Having a single source of truth
//! eliminates duplicate definitions and shape mismatches across the
//! boundary.
//!
//! All types here are plain values; nothing in this crate allocates or
//! takes a lock.

#![no_std]
#![forbid(unsafe_code)]

pub mod block;
pub mod error;
pub mod inject;

pub use block::{META_DNODE_OBJECT, META_OBJSET, ObjectType, Zbookmark};
pub use error::Errno;
pub use inject::{InjectCmd, InjectFlags, InjectIoType, InjectRecord, PERCENTAGE_MAX};
