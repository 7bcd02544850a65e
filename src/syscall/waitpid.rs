/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! `waitpid(pid, *status, options)` — syscall id 3 (spec.md §4.8, §6).

use crate::memory::user::{copy_to_user, UserPtr};
use crate::process;
use crate::process::regs::SyscallRegs;

pub fn call(regs: &SyscallRegs) -> isize {
	let pid = regs.arg0 as i32;
	let status_ptr = regs.arg1 as usize;
	let options = regs.arg2 as i32;
	let (reaped_pid, status) = match process::waitpid(pid, options) {
		Ok(r) => r,
		Err(e) => return e.as_retval(),
	};
	if status_ptr != 0 {
		let bytes = status.to_ne_bytes();
		let result =
			process::with_current_dir_mut(|dir| copy_to_user(dir, UserPtr::new(status_ptr), &bytes));
		if let Err(e) = result {
			return e.as_retval();
		}
	}
	reaped_pid as isize
}
