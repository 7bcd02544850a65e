/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! Process and thread identifiers.
//!
//! spec.md §3 states tids are "unique and monotonically assigned" — unlike
//! the teacher's PID bitmap allocator (`process::pid::IDAllocator`, reused
//! on process death), Talon never recycles a tid. A 32-bit counter cannot
//! wrap in any boot session this kernel will run for, so a plain
//! `AtomicU32` fetch-add is the whole allocator.

use core::sync::atomic::{AtomicU32, Ordering};

/// A thread id. Globally unique, never reused.
pub type Tid = u32;
/// A process id. Equal to the tid of the thread that created the process,
/// except for threads cloned with `THREAD`, which share their parent's pid.
pub type Pid = u32;

/// Pid of the idle/boot context, never scheduled.
pub const IDLE_PID: Pid = 0;
/// Pid of `/sbin/init`, the reparenting target for orphaned children.
pub const INIT_PID: Pid = 1;

static NEXT_TID: AtomicU32 = AtomicU32::new(INIT_PID);

/// Allocates a new, never-before-used tid.
pub fn alloc_tid() -> Tid {
	NEXT_TID.fetch_add(1, Ordering::Relaxed)
}
