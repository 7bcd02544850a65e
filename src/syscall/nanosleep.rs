/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! `nanosleep(ns_lo, ns_hi)` — syscall id 4 (spec.md §6): a 64-bit duration
//! split across two 32-bit argument registers.

use crate::process;
use crate::process::regs::SyscallRegs;

pub fn call(regs: &SyscallRegs) -> isize {
	let duration_ns = (regs.arg0 as u64) | ((regs.arg1 as u64) << 32);
	match process::nanosleep(duration_ns) {
		Ok(()) => 0,
		Err(e) => e.as_retval(),
	}
}
