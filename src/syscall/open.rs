/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! `open(*path, flags, mode)` — syscall id 5 (spec.md §4.10, §6).

use alloc::string::String;
use alloc::vec::Vec;

use utils::errno;
use utils::errno::EResult;

use crate::file::fd::open_file;
use crate::file::vfs;
use crate::memory::user::{copy_from_user, UserPtr};
use crate::memory::vmem::PageDirectory;
use crate::process;
use crate::process::regs::SyscallRegs;

/// Longest path this kernel will read out of user space for `open`,
/// matching [`vfs::MAX_NAME_LEN`]'s per-component bound scaled up for a
/// handful of components.
const PATH_MAX: usize = 1024;

fn read_user_path(dir: &mut PageDirectory, ptr: usize) -> EResult<String> {
	let mut bytes = Vec::new();
	for i in 0..PATH_MAX {
		let mut byte = [0u8; 1];
		copy_from_user(dir, UserPtr::new(ptr + i), &mut byte)?;
		if byte[0] == 0 {
			return String::from_utf8(bytes).map_err(|_| errno!(EINVAL));
		}
		bytes.push(byte[0]);
	}
	Err(errno!(EINVAL))
}

pub fn call(regs: &SyscallRegs) -> isize {
	let path_ptr = regs.arg0 as usize;
	let flags = regs.arg1 as i32;
	let mode = regs.arg2 as u16;

	let path = match process::with_current_dir_mut(|dir| read_user_path(dir, path_ptr)) {
		Ok(p) => p,
		Err(e) => return e.as_retval(),
	};
	let node = match vfs::walk(&vfs::root(), &path) {
		Ok(n) => n,
		Err(e) => return e.as_retval(),
	};
	let file = match open_file(node, flags, mode) {
		Ok(f) => f,
		Err(e) => return e.as_retval(),
	};
	let proc = process::current().expect("open() with no current process");
	let fds = proc.lock().fds.clone();
	match fds.lock().install(file) {
		Ok(fd) => fd as isize,
		Err(e) => e.as_retval(),
	}
}
