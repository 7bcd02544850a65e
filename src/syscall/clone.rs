/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! `clone(flags)` — syscall id 1 (spec.md §4.7, §6).

use crate::process;
use crate::process::regs::SyscallRegs;

pub fn call(regs: &SyscallRegs) -> isize {
	match process::do_clone(regs.arg0) {
		Ok(pid) => pid as isize,
		Err(e) => e.as_retval(),
	}
}
