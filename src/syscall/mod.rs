/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! The syscall gateway (spec.md §4.9, §6): the `{exit, clone, getpid,
//! waitpid, nanosleep, open, close, read, write, lseek, brk}` table, ids
//! 0 through 10, with `eax`=id and `ebx/ecx/edx/esi`=arg0..arg3 per the
//! fast-entry convention [`crate::process::regs::SyscallRegs`] already
//! assumes.
//!
//! Grounded on the teacher's `syscall` dispatch-by-id module, with the
//! id→handler table built by [`macros::syscall_table`] instead of a
//! hand-written `match` so the numeric id can never drift from its name.

pub mod brk;
pub mod clone;
pub mod close;
pub mod exit;
pub mod getpid;
pub mod lseek;
pub mod nanosleep;
pub mod open;
pub mod read;
pub mod waitpid;
pub mod write;

pub use utils::errno::Errno;

use crate::process::regs::SyscallRegs;

macros::syscall_table! {
	0 => exit,
	1 => clone,
	2 => getpid,
	3 => waitpid,
	4 => nanosleep,
	5 => open,
	6 => close,
	7 => read,
	8 => write,
	9 => lseek,
	10 => brk,
}
