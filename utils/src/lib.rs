//! Small `no_std` support library shared by the kernel and its helper
//! crates.
//!
//! This mirrors the role the teacher repository's own `utils` crate plays:
//! fallible-allocation-friendly collections, the kernel's `Errno`/`EResult`
//! vocabulary, and the intrusive-list building block used by the run queue,
//! sleep queue, event queues and the kernel heap's free list.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod arena_list;
pub mod bitset;
pub mod errno;

pub use alloc::{string::String, vec::Vec};

/// A path is just a UTF-8 string in this kernel; components are split on
/// `/` by [`crate::errno`] consumers such as the VFS walker.
pub type Path = str;
