/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! Counting semaphore.
//!
//! Built the same way as [`crate::sync::mutex::Mutex`]: a count and FIFO
//! wait queues protected by an interrupt-disabling spinlock. A [`Mutex`] is
//! a semaphore with a max of 1 and at most one holder; `Semaphore` allows
//! any initial count and maximum (spec.md §4.4: "counter with configurable
//! max; `up` blocks on full, `down` blocks on empty, each wakes the
//! opposite condvar").
//!
//! Grounded on `examples/original_source/kernel/include/lib/semaphore.h`'s
//! `semaphore<Counter>`: a `maxval` ceiling, symmetric `up()`/`down()` each
//! blocking on their own condition and waking the other's, and
//! non-blocking `try_up()`/`try_down()` returning `-EBUSY` instead of
//! sleeping. The two wait queues stand in for the original's `notmax`/
//! `notmin` condvars — inlined the same way [`crate::sync::mutex`] inlines
//! its own wait queue rather than composing [`crate::sync::condvar::Condvar`],
//! which is built to pair with a [`crate::sync::mutex::Mutex`] guard, not a
//! bare spinlock-guarded count.
//!
//! [`Mutex`]: crate::sync::mutex::Mutex

use utils::arena_list::ArenaList;
use utils::errno;
use utils::errno::EResult;

use crate::process;
use crate::process::{scheduler, Pid, State};
use crate::sync::spinlock::IntSpinlock;

struct Inner {
	count: usize,
	/// Processes blocked in [`Semaphore::acquire`], woken when `count`
	/// rises above zero. Mirrors the original's `notmin` condvar.
	not_empty: ArenaList<Pid>,
	/// Processes blocked in [`Semaphore::release`], woken when `count`
	/// drops back below `max`. Mirrors the original's `notmax` condvar.
	not_full: ArenaList<Pid>,
}

/// A counting semaphore with a configurable ceiling.
pub struct Semaphore {
	max: usize,
	inner: IntSpinlock<Inner>,
}

impl Semaphore {
	/// Creates a new semaphore with the given initial count and maximum.
	pub const fn new(count: usize, max: usize) -> Self {
		Self {
			max,
			inner: IntSpinlock::new(Inner {
				count,
				not_empty: ArenaList::new(),
				not_full: ArenaList::new(),
			}),
		}
	}

	/// Decrements the count (`down`), sleeping (interruptibly) while it is
	/// zero.
	///
	/// Returns [`errno::EINTR`] if woken by a pending signal before a unit
	/// became available.
	pub fn acquire(&self) -> EResult<()> {
		let idx = {
			let mut inner = self.inner.lock();
			if inner.count > 0 {
				inner.count -= 1;
				let woken = inner.not_full.pop_front();
				drop(inner);
				if let Some(pid) = woken {
					process::wake(pid, State::IntSleeping as u8);
				}
				return Ok(());
			}
			let idx = inner.not_empty.push_back(process::current_pid());
			process::set_state(State::IntSleeping);
			idx
		};
		scheduler::schedule();
		self.inner.lock().not_empty.try_remove(idx);
		if process::has_pending_signal() {
			return Err(errno!(EINTR));
		}
		Ok(())
	}

	/// Decrements the count only if it is currently nonzero, never
	/// sleeping.
	///
	/// Returns [`errno::EBUSY`] instead of sleeping if the count is zero.
	pub fn try_acquire(&self) -> EResult<()> {
		let mut inner = self.inner.lock();
		if inner.count == 0 {
			return Err(errno!(EBUSY));
		}
		inner.count -= 1;
		let woken = inner.not_full.pop_front();
		drop(inner);
		if let Some(pid) = woken {
			process::wake(pid, State::IntSleeping as u8);
		}
		Ok(())
	}

	/// Increments the count (`up`), sleeping (interruptibly) while it is
	/// already at `max`.
	///
	/// Returns [`errno::EINTR`] if woken by a pending signal before room
	/// became available.
	pub fn release(&self) -> EResult<()> {
		let idx = {
			let mut inner = self.inner.lock();
			if inner.count < self.max {
				inner.count += 1;
				let woken = inner.not_empty.pop_front();
				drop(inner);
				if let Some(pid) = woken {
					process::wake(pid, State::IntSleeping as u8);
				}
				return Ok(());
			}
			let idx = inner.not_full.push_back(process::current_pid());
			process::set_state(State::IntSleeping);
			idx
		};
		scheduler::schedule();
		self.inner.lock().not_full.try_remove(idx);
		if process::has_pending_signal() {
			return Err(errno!(EINTR));
		}
		Ok(())
	}

	/// Increments the count only if it is currently below `max`, never
	/// sleeping.
	///
	/// Returns [`errno::EBUSY`] instead of sleeping if the count is already
	/// at `max`.
	pub fn try_release(&self) -> EResult<()> {
		let mut inner = self.inner.lock();
		if inner.count >= self.max {
			return Err(errno!(EBUSY));
		}
		inner.count += 1;
		let woken = inner.not_empty.pop_front();
		drop(inner);
		if let Some(pid) = woken {
			process::wake(pid, State::IntSleeping as u8);
		}
		Ok(())
	}
}
