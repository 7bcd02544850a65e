/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! `lseek(fd, *off, whence)` — syscall id 9 (spec.md §6): reads the
//! requested offset from user space, seeks, then writes the resulting
//! position back through the same pointer.

use crate::memory::user::{copy_from_user, copy_to_user, UserPtr};
use crate::process;
use crate::process::regs::SyscallRegs;

pub fn call(regs: &SyscallRegs) -> isize {
	let fd = regs.arg0 as i32;
	let off_ptr = regs.arg1 as usize;
	let whence = regs.arg2 as i32;

	let mut off_bytes = [0u8; 4];
	if let Err(e) =
		process::with_current_dir_mut(|dir| copy_from_user(dir, UserPtr::new(off_ptr), &mut off_bytes))
	{
		return e.as_retval();
	}
	let offset = i32::from_ne_bytes(off_bytes);

	let proc = process::current().expect("lseek() with no current process");
	let fds = proc.lock().fds.clone();
	let file = match fds.lock().get(fd) {
		Ok(f) => f,
		Err(e) => return e.as_retval(),
	};
	let new_pos = match file.lock().seek(offset, whence) {
		Ok(p) => p,
		Err(e) => return e.as_retval(),
	};

	let result_bytes = (new_pos as i32).to_ne_bytes();
	if let Err(e) =
		process::with_current_dir_mut(|dir| copy_to_user(dir, UserPtr::new(off_ptr), &result_bytes))
	{
		return e.as_retval();
	}
	0
}
