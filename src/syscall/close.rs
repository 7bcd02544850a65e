/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! `close(fd)` — syscall id 6 (spec.md §6).

use crate::process;
use crate::process::regs::SyscallRegs;

pub fn call(regs: &SyscallRegs) -> isize {
	let fd = regs.arg0 as i32;
	let proc = process::current().expect("close() with no current process");
	let fds = proc.lock().fds.clone();
	match fds.lock().close(fd) {
		Ok(()) => 0,
		Err(e) => e.as_retval(),
	}
}
