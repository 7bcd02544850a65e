/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! The saved per-process register snapshot.
//!
//! Per spec.md §9, the scheduler treats this struct opaquely except for
//! `eip`/`esp`/`eflags`, which it needs to tell a user-mode resumption from
//! a kernel-mode one and to restore interrupt state. Everything else only
//! matters to the syscall dispatcher (argument registers) and to the
//! assembly context-switch stub this struct's layout must match.

use core::mem::size_of;

/// FXSAVE/FXRSTOR area: x87 FPU, MMX and SSE state. 512 bytes, 16-byte
/// aligned, opaque to everything but `fxsave`/`fxrstor`.
#[repr(C, align(16))]
#[derive(Clone)]
pub struct FxState(pub [u8; 512]);

impl Default for FxState {
	fn default() -> Self {
		Self([0; 512])
	}
}

/// The default EFLAGS value for a newly created process: interrupts
/// enabled, reserved bit 1 set.
pub const DEFAULT_EFLAGS: u32 = 0x202;

/// A saved i386 register context, exactly as laid out by the trap entry
/// stub and restored by the context-switch stub.
#[repr(C)]
#[derive(Clone)]
pub struct Regs {
	pub ebp: u32,
	pub esp: u32,
	pub eip: u32,
	pub eflags: u32,
	pub eax: u32,
	pub ebx: u32,
	pub ecx: u32,
	pub edx: u32,
	pub esi: u32,
	pub edi: u32,
}

impl Default for Regs {
	fn default() -> Self {
		Self {
			ebp: 0,
			esp: 0,
			eip: 0,
			eflags: DEFAULT_EFLAGS,
			eax: 0,
			ebx: 0,
			ecx: 0,
			edx: 0,
			esi: 0,
			edi: 0,
		}
	}
}

impl Regs {
	/// Whether this context resumes into user mode.
	///
	/// The fast-entry convention (spec.md §4.9) pushes the saved code
	/// segment's privilege bits alongside `eip`; bit 0 of `ebx` is reserved
	/// here to carry that flag since this target has no segment registers
	/// of its own in the trimmed trap frame.
	pub fn resumes_to_user(&self) -> bool {
		self.eflags & EFLAGS_USER_MODE != 0
	}

	/// Sets the syscall return value into the register that carries it
	/// back to user space (`eax`, matching the i386 cdecl convention the
	/// fast-entry stub restores).
	pub fn set_return(&mut self, value: isize) {
		self.eax = value as u32;
	}
}

/// Marker bit folded into the saved `eflags` to record whether the
/// snapshot belongs to a user-mode or kernel-mode context. Not a real
/// EFLAGS bit (those are all architecturally defined); the trap entry stub
/// clears it before restoring the real flags and only the scheduler reads
/// it before that happens.
pub const EFLAGS_USER_MODE: u32 = 1 << 31;

/// The syscall-argument view of a trapped register frame, as handed to
/// syscall handlers. Argument registers follow the fast-entry convention
/// of spec.md §4.9: syscall id plus up to four arguments.
#[repr(C)]
pub struct SyscallRegs {
	pub id: u32,
	pub arg0: u32,
	pub arg1: u32,
	pub arg2: u32,
	pub arg3: u32,
	/// The full saved context, so a handler that never returns (`exit`) or
	/// that must mutate the resumption state (`clone`'s child path) can
	/// reach it.
	pub regs: Regs,
}

const _: () = assert!(size_of::<Regs>() == 10 * size_of::<u32>());
