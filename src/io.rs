/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! Typed port I/O and the handful of CPU-control primitives the rest of the
//! kernel is built on.
//!
//! Everything here is a thin, `#[inline(always)]` wrapper around a single
//! `in`/`out`/`cli`/`hlt` instruction. Higher layers never emit inline
//! assembly directly; they go through this module so there is exactly one
//! place that needs architecture-specific review.

use core::arch::asm;
use core::sync::atomic::{compiler_fence, Ordering};

/// Reads a byte from I/O port `port`.
#[inline(always)]
pub unsafe fn inb(port: u16) -> u8 {
	let value: u8;
	asm!("in al, dx", out("al") value, in("dx") port, options(nomem, nostack, preserves_flags));
	value
}

/// Writes a byte to I/O port `port`.
#[inline(always)]
pub unsafe fn outb(port: u16, value: u8) {
	asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags));
}

/// Reads a word from I/O port `port`.
#[inline(always)]
pub unsafe fn inw(port: u16) -> u16 {
	let value: u16;
	asm!("in ax, dx", out("ax") value, in("dx") port, options(nomem, nostack, preserves_flags));
	value
}

/// Writes a word to I/O port `port`.
#[inline(always)]
pub unsafe fn outw(port: u16, value: u16) {
	asm!("out dx, ax", in("dx") port, in("ax") value, options(nomem, nostack, preserves_flags));
}

/// Reads a dword from I/O port `port`.
#[inline(always)]
pub unsafe fn inl(port: u16) -> u32 {
	let value: u32;
	asm!("in eax, dx", out("eax") value, in("dx") port, options(nomem, nostack, preserves_flags));
	value
}

/// Writes a dword to I/O port `port`.
#[inline(always)]
pub unsafe fn outl(port: u16, value: u32) {
	asm!("out dx, eax", in("dx") port, in("eax") value, options(nomem, nostack, preserves_flags));
}

/// A short, architecturally-meaningless I/O port write used to burn a few
/// microseconds after reprogramming a device (PIT, PIC) that needs time to
/// settle between successive writes.
#[inline(always)]
pub unsafe fn io_wait() {
	outb(0x80, 0);
}

/// Disables maskable interrupts.
#[inline(always)]
pub fn cli() {
	unsafe {
		asm!("cli", options(nomem, nostack));
	}
}

/// Enables maskable interrupts.
#[inline(always)]
pub fn sti() {
	unsafe {
		asm!("sti", options(nomem, nostack));
	}
}

/// Halts the CPU until the next interrupt.
#[inline(always)]
pub fn hlt() {
	unsafe {
		asm!("hlt", options(nomem, nostack));
	}
}

/// A compiler barrier separating MMIO accesses that must not be reordered
/// relative to each other.
///
/// This is not a CPU memory fence: on this single-core, strongly-ordered
/// x86 target the compiler reordering freely is the only real hazard for
/// device register accesses performed through plain (non-`volatile`)
/// pointers; actual MMIO reads and writes additionally go through
/// `read_volatile`/`write_volatile`.
#[inline(always)]
pub fn mmio_barrier() {
	compiler_fence(Ordering::SeqCst);
}
