/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! `write(fd, *buf, count)` — syscall id 8 (spec.md §6).

use alloc::vec;

use crate::memory::user::{copy_from_user, UserPtr};
use crate::process;
use crate::process::regs::SyscallRegs;

pub fn call(regs: &SyscallRegs) -> isize {
	let fd = regs.arg0 as i32;
	let buf_ptr = regs.arg1 as usize;
	let count = regs.arg2 as usize;

	let proc = process::current().expect("write() with no current process");
	let fds = proc.lock().fds.clone();
	let file = match fds.lock().get(fd) {
		Ok(f) => f,
		Err(e) => return e.as_retval(),
	};
	let mut kbuf = vec![0u8; count];
	if let Err(e) = process::with_current_dir_mut(|dir| copy_from_user(dir, UserPtr::new(buf_ptr), &mut kbuf)) {
		return e.as_retval();
	}
	match file.lock().write(&kbuf) {
		Ok(n) => n as isize,
		Err(e) => e.as_retval(),
	}
}
