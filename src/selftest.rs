/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! Self-testing: unit tests that run inside the booted kernel itself.
//!
//! # Issues
//!
//! Since the kernel cannot reset itself between each test, this method of
//! testing is not as trustworthy as ordinary host-side unit tests: a test
//! might corrupt the environment for the next one, which could make it pass
//! even though it should not. Prefer ordinary `#[cfg(test)]` modules for
//! pure-logic subsystems (buddy bitmap algebra, heap boundary tags, VFS path
//! walking); reserve `#[test_case]` for things that genuinely need the
//! booted machine (paging, the scheduler tick, the block driver).

use core::any::type_name;
use core::sync::atomic::{AtomicBool, Ordering};

/// Whether self-testing is currently running.
static RUNNING: AtomicBool = AtomicBool::new(false);

/// Exits QEMU through the `isa-debug-exit` device instead of halting,
/// enabled by `Config.toml`'s `debug.qemu` flag.
#[cfg(config_debug_qemu)]
pub mod qemu {
	use crate::io;

	/// I/O port of the `isa-debug-exit` device.
	const EXIT_PORT: u16 = 0xf4;

	/// Exit code reported to the host for a passing run.
	pub const SUCCESS: u32 = 0x10;
	/// Exit code reported to the host for a failing run.
	pub const FAILURE: u32 = 0x11;

	/// Writes `status` to the exit port, terminating the emulator.
	pub fn exit(status: u32) {
		unsafe {
			io::outl(EXIT_PORT, status);
		}
	}
}

/// Trait for any testable feature.
pub trait Testable {
	/// Runs the corresponding test.
	fn run(&self);
}

impl<T> Testable for T
where
	T: Fn(),
{
	fn run(&self) {
		let name = type_name::<T>();
		crate::print!("test {name} ... ");
		self();
		crate::println!("ok");
	}
}

/// The test runner registered via `#![test_runner]`.
///
/// Runs every collected test, then halts the kernel.
pub fn runner(tests: &[&dyn Testable]) {
	crate::println!("Running {} selftests", tests.len());
	RUNNING.store(true, Ordering::Relaxed);
	for test in tests {
		test.run();
	}
	RUNNING.store(false, Ordering::Relaxed);
	crate::println!("No more tests to run");
	#[cfg(config_debug_qemu)]
	qemu::exit(qemu::SUCCESS);
}

/// Tells whether self-testing is currently running.
pub fn is_running() -> bool {
	RUNNING.load(Ordering::Relaxed)
}
