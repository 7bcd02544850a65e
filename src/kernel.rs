/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 *
 * Talon is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * Talon is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
 * FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
 * details.
 *
 * You should have received a copy of the GNU General Public License along
 * with Talon. If not, see <https://www.gnu.org/licenses/>.
 */

//! Talon is a small monolithic 32-bit x86 kernel.
//!
//! This crate is built both as a `dylib`/`rlib` (linked into the `talon`
//! binary alongside the boot assembly and low-level C stubs) and exercised
//! directly by `#[cfg(test)]` unit tests for the pure-logic subsystems
//! (buddy allocator bitmap algebra, heap boundary tags, VFS path walking,
//! run-queue ordering) that do not require a booted machine.
//!
//! # Features
//!
//! - `strace`: traces every syscall entry/exit through the logger.
//! - `memtrace`: keeps a ring buffer of recent heap allocations for
//!   post-mortem dumps.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), no_main)]
#![feature(alloc_error_handler)]
#![feature(allocator_api)]
#![feature(naked_functions)]
#![feature(custom_test_frameworks)]
#![test_runner(crate::selftest::runner)]
#![reexport_test_harness_main = "kernel_selftest"]
#![allow(clippy::missing_safety_doc)]
#![allow(dead_code)]

extern crate alloc;

#[macro_use]
pub mod print;
#[macro_use]
pub mod logger;
#[macro_use]
pub mod panic;

pub mod device;
pub mod elf;
pub mod file;
pub mod idt;
pub mod io;
pub mod memory;
pub mod process;
pub mod selftest;
pub mod sync;
pub mod syscall;
pub mod time;

pub use utils;

/// The kernel's name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
/// Current kernel version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The path of the first user program, embedded in the kernel image and
/// loaded by [`elf`] onto the initial run queue.
const INIT_PATH: &str = "/sbin/init";

/// Entry point called by the boot assembly once paging, the GDT and the
/// initial stack are in place.
///
/// `mem_size` is the amount of physical RAM in bytes, as reported by the
/// boot protocol (multiboot2/E820 map parsing lives in the external boot
/// collaborator and is out of this crate's scope; only the resulting size
/// is passed in).
#[cfg_attr(not(test), no_mangle)]
pub extern "C" fn kernel_main(mem_size: usize) -> ! {
	print::init();
	log_info!("Booting {} kernel version {}", NAME, VERSION);

	memory::init(mem_size);
	idt::init();
	time::init();
	process::scheduler::init();
	file::vfs::init();
	device::storage::init();

	#[cfg(test)]
	kernel_selftest();

	log_info!("Loading init process from {}", INIT_PATH);
	match process::load_init(INIT_PATH) {
		Ok(()) => {}
		Err(e) => panic!("failed to load init process: {e}"),
	}

	process::scheduler::run();
}
