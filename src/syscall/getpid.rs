/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! `getpid()` — syscall id 2 (spec.md §6). Returns the process-wide `pid`,
//! not the per-thread `tid` [`crate::process::current_pid`] returns.

use crate::process;
use crate::process::regs::SyscallRegs;

pub fn call(_regs: &SyscallRegs) -> isize {
	let proc = process::current().expect("getpid() with no current process");
	let pid = proc.lock().pid;
	pid as isize
}
