/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! Open files and per-process file-descriptor tables (spec.md §3's "a
//! file-descriptor table (sparse, capacity ≤ PROC_MAX_FDS=1024, with a
//! cached next-free index)").
//!
//! Grounded on the teacher's `file::fd`/`file::open_file` split (a
//! descriptor indexing into a shared, refcounted open-file description)
//! trimmed to what spec.md's syscall table actually needs: read, write,
//! seek, and close. No `dup`/`fcntl`/`O_CLOEXEC`, since those are out of
//! scope.

use alloc::sync::Arc;
use alloc::vec::Vec;

use utils::errno;
use utils::errno::EResult;

use crate::file::inode::mode;
use crate::file::vfs::VNode;
use crate::process::PROC_MAX_FDS;
use crate::sync::mutex::Mutex;

/// POSIX-style access-mode bits (spec.md §6's "Open flags use POSIX-style
/// ACCMODE").
pub mod oflag {
	pub const O_RDONLY: i32 = 0;
	pub const O_WRONLY: i32 = 1;
	pub const O_RDWR: i32 = 2;
	pub const O_ACCMODE: i32 = 3;
	pub const O_CREAT: i32 = 0x40;
}

/// An open handle into the VFS: node, open flags, mode, and current byte
/// position (spec.md §3's "File").
pub struct OpenFile {
	pub node: Arc<Mutex<VNode>>,
	pub flags: i32,
	pub mode: u16,
	pub pos: u64,
}

impl OpenFile {
	fn can_read(&self) -> bool {
		self.flags & oflag::O_ACCMODE != oflag::O_WRONLY
	}

	fn can_write(&self) -> bool {
		self.flags & oflag::O_ACCMODE != oflag::O_RDONLY
	}

	pub fn read(&mut self, buf: &mut [u8]) -> EResult<usize> {
		if !self.can_read() {
			return Err(errno!(EACCES));
		}
		let inode = self.node.lock().inode.clone();
		let n = inode.read(self.pos, buf)?;
		self.pos += n as u64;
		Ok(n)
	}

	pub fn write(&mut self, buf: &[u8]) -> EResult<usize> {
		if !self.can_write() {
			return Err(errno!(EACCES));
		}
		let inode = self.node.lock().inode.clone();
		let n = inode.write(self.pos, buf)?;
		self.pos += n as u64;
		Ok(n)
	}

	/// `lseek` (spec.md §6). Rejects non-regular files, matching spec.md
	/// §3's "seek on non-regular/non-block/non-symlink is rejected" (this
	/// kernel has only regular and character-device inodes).
	pub fn seek(&mut self, offset: i32, whence: i32) -> EResult<u64> {
		let node_mode = self.node.lock().inode.mode();
		if node_mode & mode::S_IFMT != mode::S_IFREG {
			return Err(errno!(ESPIPE));
		}
		let base: i64 = match whence {
			0 => 0,                                     // SEEK_SET
			1 => self.pos as i64,                        // SEEK_CUR
			2 => self.node.lock().inode.size() as i64,    // SEEK_END
			_ => return Err(errno!(EINVAL)),
		};
		let new_pos = base + offset as i64;
		if new_pos < 0 {
			return Err(errno!(EINVAL));
		}
		self.pos = new_pos as u64;
		Ok(self.pos)
	}
}

/// Opens `node` under `flags`/`mode`, rejecting a directory opened for
/// writing (spec.md §6's "EISDIR returned when opening a directory for
/// write").
pub fn open_file(node: Arc<Mutex<VNode>>, flags: i32, mode: u16) -> EResult<OpenFile> {
	let is_dir = node.lock().inode.is_dir();
	if is_dir && flags & oflag::O_ACCMODE != oflag::O_RDONLY {
		return Err(errno!(EISDIR));
	}
	Ok(OpenFile {
		node,
		flags,
		mode,
		pos: 0,
	})
}

/// A process's sparse fd table: `None` marks a closed slot, reused by the
/// next `open`.
pub struct FdTable {
	slots: Vec<Option<Arc<Mutex<OpenFile>>>>,
	next_free_hint: usize,
}

impl FdTable {
	pub fn new() -> Self {
		Self {
			slots: Vec::new(),
			next_free_hint: 0,
		}
	}

	/// Duplicates every open descriptor's reference for a forked process
	/// (spec.md §4.7's `clone` without `FILES`): descriptors are shared
	/// open files, not deep copies, matching POSIX `fork` semantics.
	pub fn fork(&self) -> Self {
		Self {
			slots: self.slots.clone(),
			next_free_hint: self.next_free_hint,
		}
	}

	/// Installs `file` at the lowest free descriptor, enforcing
	/// `PROC_MAX_FDS` (spec.md §7's EMFILE).
	pub fn install(&mut self, file: OpenFile) -> EResult<i32> {
		let handle = Arc::new(Mutex::new(file));
		for i in self.next_free_hint..self.slots.len() {
			if self.slots[i].is_none() {
				self.slots[i] = Some(handle);
				self.next_free_hint = i + 1;
				return Ok(i as i32);
			}
		}
		if self.slots.len() >= PROC_MAX_FDS {
			return Err(errno!(EMFILE));
		}
		self.slots.push(Some(handle));
		let fd = self.slots.len() - 1;
		self.next_free_hint = fd + 1;
		Ok(fd as i32)
	}

	pub fn get(&self, fd: i32) -> EResult<Arc<Mutex<OpenFile>>> {
		let fd = usize::try_from(fd).map_err(|_| errno!(EBADF))?;
		self.slots
			.get(fd)
			.and_then(|s| s.clone())
			.ok_or_else(|| errno!(EBADF))
	}

	pub fn close(&mut self, fd: i32) -> EResult<()> {
		let fdu = usize::try_from(fd).map_err(|_| errno!(EBADF))?;
		let slot = self.slots.get_mut(fdu).ok_or_else(|| errno!(EBADF))?;
		if slot.take().is_none() {
			return Err(errno!(EBADF));
		}
		self.next_free_hint = self.next_free_hint.min(fdu);
		Ok(())
	}
}

impl Default for FdTable {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::file::ramfs::RamInode;
	use crate::file::vfs::VNode;
	use alloc::string::String;

	fn dummy_file() -> OpenFile {
		let node = Arc::new(Mutex::new(VNode {
			inode: RamInode::new_file(1, alloc::vec![1, 2, 3]),
			name: String::new(),
			parent: alloc::sync::Weak::new(),
			mounts: Vec::new(),
			children: Vec::new(),
		}));
		open_file(node, oflag::O_RDWR, 0o644).unwrap()
	}

	#[test]
	fn install_reuses_lowest_closed_slot() {
		let mut t = FdTable::new();
		let a = t.install(dummy_file()).unwrap();
		let b = t.install(dummy_file()).unwrap();
		assert_eq!((a, b), (0, 1));
		t.close(a).unwrap();
		let c = t.install(dummy_file()).unwrap();
		assert_eq!(c, 0);
	}

	#[test]
	fn double_close_is_ebadf() {
		let mut t = FdTable::new();
		let fd = t.install(dummy_file()).unwrap();
		t.close(fd).unwrap();
		assert!(t.close(fd).is_err());
	}
}
