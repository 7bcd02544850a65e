/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! Spinlock: a mutual-exclusion primitive that busy-waits instead of
//! sleeping.
//!
//! Per spec.md §4.4, a simple test-and-set spinlock is the only correct
//! implementation available on this kernel's single-core target: there is no
//! scheduler to hand off to while spinning and nothing to gain from a
//! ticket lock or queued lock.
//!
//! Kernel code is not only preempted by other threads but also by
//! interrupts on the same core. `Spinlock<T, INT>` with `INT = false`
//! additionally disables interrupts for the duration of the critical
//! section, for data shared with an interrupt handler (the run queue, the
//! console writer).

use core::cell::UnsafeCell;
use core::fmt;
use core::hint;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use crate::io;

/// A mutual-exclusion primitive that spins rather than sleeps while
/// contended.
///
/// `INT` tells whether interrupts stay enabled while the lock is held.
/// Defaults to `true` (interrupts left alone); pass `false` for data also
/// touched from interrupt context.
pub struct Spinlock<T: ?Sized, const INT: bool = true> {
	locked: AtomicBool,
	data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send, const INT: bool> Sync for Spinlock<T, INT> {}

impl<T, const INT: bool> Spinlock<T, INT> {
	/// Creates a new spinlock wrapping `data`.
	pub const fn new(data: T) -> Self {
		Self {
			locked: AtomicBool::new(false),
			data: UnsafeCell::new(data),
		}
	}
}

impl<T: ?Sized, const INT: bool> Spinlock<T, INT> {
	/// Acquires the lock, spinning until it becomes available.
	pub fn lock(&self) -> SpinlockGuard<'_, T, INT> {
		let int_state = if !INT {
			let enabled = interrupts_enabled();
			io::cli();
			enabled
		} else {
			false
		};
		while self.locked.swap(true, Ordering::Acquire) {
			hint::spin_loop();
		}
		SpinlockGuard {
			lock: self,
			int_state,
		}
	}
}

/// Reads the current interrupt-enable flag out of `EFLAGS`.
#[cfg(target_arch = "x86")]
fn interrupts_enabled() -> bool {
	let flags: u32;
	unsafe {
		core::arch::asm!("pushfd", "pop {0}", out(reg) flags, options(nomem, preserves_flags));
	}
	flags & (1 << 9) != 0
}

#[cfg(not(target_arch = "x86"))]
fn interrupts_enabled() -> bool {
	false
}

/// RAII guard releasing a [`Spinlock`] when dropped.
pub struct SpinlockGuard<'a, T: ?Sized, const INT: bool> {
	lock: &'a Spinlock<T, INT>,
	int_state: bool,
}

impl<T: ?Sized, const INT: bool> Deref for SpinlockGuard<'_, T, INT> {
	type Target = T;

	fn deref(&self) -> &T {
		unsafe { &*self.lock.data.get() }
	}
}

impl<T: ?Sized, const INT: bool> DerefMut for SpinlockGuard<'_, T, INT> {
	fn deref_mut(&mut self) -> &mut T {
		unsafe { &mut *self.lock.data.get() }
	}
}

impl<T: ?Sized, const INT: bool> Drop for SpinlockGuard<'_, T, INT> {
	fn drop(&mut self) {
		self.lock.locked.store(false, Ordering::Release);
		if !INT && self.int_state {
			io::sti();
		}
	}
}

impl<T: ?Sized + fmt::Debug, const INT: bool> fmt::Debug for Spinlock<T, INT> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&*self.lock(), f)
	}
}

/// A [`Spinlock`] that disables interrupts while held, for state shared with
/// an interrupt handler.
pub type IntSpinlock<T> = Spinlock<T, false>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lock_unlock_roundtrip() {
		let lock = Spinlock::new(0u32);
		{
			let mut g = lock.lock();
			*g += 1;
		}
		assert_eq!(*lock.lock(), 1);
	}
}
