/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! The IDT: the table of interrupt/exception/syscall entry points, and its
//! construction at boot.
//!
//! Grounded on the teacher's `idt::{InterruptDescriptor,
//! InterruptDescriptorTable, ENTRIES_COUNT, SYSCALL_ENTRY, idt_load}`. The
//! teacher declares its entry stubs as `extern "C"` functions supplied by a
//! prebuilt assembly object (`irq0()`..`irq15()`, `error0()`..`error31()`,
//! `syscall()`); that object is not part of this crate's retrieval pack
//! (linked in by the teacher's `build.rs` from hand-written boot assembly,
//! an external collaborator per spec.md §1). [`handler`] supplies
//! equivalent entry points directly as `#[naked]` functions instead.

pub mod handler;
pub mod pic;

use core::mem::size_of;

/// Ring-0 interrupt gate, present.
const GATE_INTERRUPT_RING0: u8 = 0x8e;
/// Ring-3-callable (but ring-0-executing) trap gate, present — used only
/// for the syscall vector so `int 0x80` is valid from a lower privilege
/// level even though this kernel never actually runs code below ring 0.
const GATE_TRAP_RING3: u8 = 0xee;
/// Kernel code segment selector (index 1, GDT, ring 0) — set up by the
/// boot assembly before `kernel_main` runs.
const KERNEL_CS: u16 = 0x08;

/// The IDT vector used for `syscall` (spec.md §4.9).
pub const SYSCALL_ENTRY: usize = 0x80;
/// Total IDT entries: 32 CPU exceptions, 16 IRQs, and the syscall gate.
pub const ENTRIES_COUNT: usize = 0x81;

#[repr(C, packed)]
struct InterruptDescriptorTable {
	size: u16,
	offset: u32,
}

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct InterruptDescriptor {
	offset_lo: u16,
	selector: u16,
	zero: u8,
	flags: u8,
	offset_hi: u16,
}

impl InterruptDescriptor {
	const fn placeholder() -> Self {
		Self {
			offset_lo: 0,
			selector: 0,
			zero: 0,
			flags: 0,
			offset_hi: 0,
		}
	}

	fn new(address: usize, selector: u16, flags: u8) -> Self {
		Self {
			offset_lo: (address & 0xffff) as u16,
			selector,
			zero: 0,
			flags,
			offset_hi: ((address >> 16) & 0xffff) as u16,
		}
	}
}

static mut IDT_ENTRIES: [InterruptDescriptor; ENTRIES_COUNT] =
	[InterruptDescriptor::placeholder(); ENTRIES_COUNT];

unsafe fn idt_load(idt: *const InterruptDescriptorTable) {
	core::arch::asm!("lidt [{0}]", in(reg) idt, options(nostack, preserves_flags));
}

/// Builds and loads the IDT, then brings up the PIC (spec.md §4.9).
///
/// Must run once, with interrupts disabled, before [`crate::time::init`].
pub fn init() {
	crate::io::cli();
	pic::init();

	let mut entries = [InterruptDescriptor::placeholder(); ENTRIES_COUNT];
	for (vector, stub) in handler::ERROR_STUBS.iter().enumerate() {
		entries[vector] = InterruptDescriptor::new(*stub as usize, KERNEL_CS, GATE_INTERRUPT_RING0);
	}
	for (irq, stub) in handler::IRQ_STUBS.iter().enumerate() {
		entries[pic::IRQ0_VECTOR as usize + irq] =
			InterruptDescriptor::new(*stub as usize, KERNEL_CS, GATE_INTERRUPT_RING0);
	}
	entries[SYSCALL_ENTRY] =
		InterruptDescriptor::new(handler::syscall_stub as usize, KERNEL_CS, GATE_TRAP_RING3);

	unsafe {
		core::ptr::addr_of_mut!(IDT_ENTRIES).write(entries);
		let table = InterruptDescriptorTable {
			size: (size_of::<InterruptDescriptor>() * ENTRIES_COUNT - 1) as u16,
			offset: core::ptr::addr_of!(IDT_ENTRIES) as u32,
		};
		idt_load(&table);
	}
	crate::log_info!("idt: {} vectors loaded", ENTRIES_COUNT);
}
