/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! `exit(status)` — syscall id 0 (spec.md §6). Never returns.

use crate::process;
use crate::process::regs::SyscallRegs;

pub fn call(regs: &SyscallRegs) -> isize {
	process::exit(regs.arg0 as i32);
}
