/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! Mounted filesystem instances (spec.md §3's "Superblock").

use alloc::sync::Arc;

use crate::file::vfs::VNode;
use crate::sync::mutex::Mutex;

/// A mounted filesystem instance: {size, type tag, mount flags, id, mode,
/// times, root node}.
pub struct Superblock {
	pub size: u64,
	pub fs_type: &'static str,
	pub flags: u32,
	pub id: u32,
	pub mode: u16,
	/// Creation time, seconds since boot (this kernel has no RTC driver).
	pub ctime: u64,
	pub root: Arc<Mutex<VNode>>,
}
