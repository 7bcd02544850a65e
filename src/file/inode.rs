/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! VFS inodes: the {ino, uid, gid, size, mode, dirty} record of spec.md §3,
//! with filesystem-specific behavior ("create child", "get child by name",
//! byte-range read/write) left polymorphic per concrete filesystem.
//!
//! Grounded on the teacher's `file::inode`/`file::filesystem` split (a
//! plain metadata struct plus a trait object for filesystem-specific
//! operations), collapsed into one trait here since spec.md only ever asks
//! for a single concrete filesystem (devfs) alongside the in-memory root.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use utils::errno::EResult;

/// POSIX-style mode bits: high nibble is the type, low bits the permission
/// bits, matching the teacher's `file::perm` layout.
pub mod mode {
	pub const S_IFMT: u16 = 0xf000;
	pub const S_IFDIR: u16 = 0x4000;
	pub const S_IFREG: u16 = 0x8000;
	pub const S_IFCHR: u16 = 0x2000;
}

/// {ino, uid, gid, size, mode, dirty} plus the polymorphic behavior
/// concrete filesystems override (spec.md §3's "VFS inode").
pub trait Inode: Send + Sync {
	fn ino(&self) -> u64;
	fn uid(&self) -> u32;
	fn gid(&self) -> u32;
	fn size(&self) -> u64;
	fn mode(&self) -> u16;
	fn is_dirty(&self) -> bool;

	fn is_dir(&self) -> bool {
		self.mode() & mode::S_IFMT == mode::S_IFDIR
	}

	/// Reads up to `buf.len()` bytes starting at `offset`, returning the
	/// number of bytes actually read.
	fn read(&self, offset: u64, buf: &mut [u8]) -> EResult<usize>;

	/// Writes `buf` at `offset`, returning the number of bytes written.
	fn write(&self, offset: u64, buf: &[u8]) -> EResult<usize>;

	/// Looks up a child by name. Only meaningful on a directory inode.
	fn get_child(&self, _name: &str) -> EResult<Option<Arc<dyn Inode>>> {
		Ok(None)
	}

	/// Creates a new child inode under this one. Only meaningful on a
	/// directory inode.
	fn create_child(&self, _name: &str, _mode: u16) -> EResult<Arc<dyn Inode>> {
		Err(utils::errno!(EACCES))
	}

	/// Names of every directly-held child, for `readdir`.
	fn children(&self) -> EResult<Vec<String>> {
		Ok(Vec::new())
	}
}
