/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! Sleeping mutual-exclusion primitive.
//!
//! Unlike [`crate::sync::spinlock::Spinlock`], a [`Mutex`] puts the waiting
//! process to sleep instead of burning CPU, at the cost of requiring the
//! scheduler to be up. Processes queue in FIFO order behind the lock
//! (spec.md §4.4): the wait queue is an [`ArenaList`] of waiting pids, and
//! release always wakes the longest-waiting one.
//!
//! Grounded on `examples/original_source/kernel/include/lib/mutex.h`'s
//! `lockproc`-tracking `mutex` class: the holder's pid is recorded on
//! acquire, `try_lock()` fails with [`errno::EBUSY`] instead of sleeping,
//! and `unlock()` returns [`errno::EACCES`] when called by anyone other
//! than the current holder (spec.md §4.4, error table spec.md §9).

use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};

use utils::arena_list::ArenaList;
use utils::errno;
use utils::errno::EResult;

use crate::process;
use crate::process::{scheduler, Pid, State};
use crate::sync::spinlock::IntSpinlock;

struct Queue {
	/// `Some(pid)` of the current holder, `None` if the mutex is free.
	owner: Option<Pid>,
	wait_queue: ArenaList<Pid>,
}

fn lock_slow<const INT: bool>(queue: &IntSpinlock<Queue>) -> EResult<()> {
	let idx = {
		let mut q = queue.lock();
		if q.owner.is_none() {
			q.owner = Some(process::current_pid());
			return Ok(());
		}
		let idx = q.wait_queue.push_back(process::current_pid());
		process::set_state(if INT {
			State::IntSleeping
		} else {
			State::Sleeping
		});
		idx
	};
	scheduler::schedule();
	// If we were woken by a direct pop (the common case) the index is
	// already gone; if we woke up early because of a pending signal, we are
	// still enqueued and must remove ourselves.
	queue.lock().wait_queue.try_remove(idx);
	if INT && process::has_pending_signal() {
		return Err(errno!(EINTR));
	}
	queue.lock().owner = Some(process::current_pid());
	Ok(())
}

/// Acquires the mutex only if it is currently free, never sleeping.
fn try_lock_slow(queue: &IntSpinlock<Queue>) -> EResult<()> {
	let mut q = queue.lock();
	if q.owner.is_some() {
		return Err(errno!(EBUSY));
	}
	q.owner = Some(process::current_pid());
	Ok(())
}

/// Releases the mutex, waking the longest-waiting process if any.
///
/// Returns [`errno::EACCES`] without releasing anything if the caller does
/// not currently hold the mutex.
fn unlock<const INT: bool>(queue: &IntSpinlock<Queue>) -> EResult<()> {
	let next = {
		let mut q = queue.lock();
		if q.owner != Some(process::current_pid()) {
			return Err(errno!(EACCES));
		}
		let next = q.wait_queue.pop_front();
		q.owner = next;
		next
	};
	if let Some(pid) = next {
		let mut mask = State::Sleeping as u8;
		if INT {
			mask |= State::IntSleeping as u8;
		}
		process::wake(pid, mask);
	}
	Ok(())
}

/// A sleeping mutex. `INT` tells whether waiting can be interrupted by a
/// signal, in which case [`Mutex::lock`] may return [`errno::EINTR`].
pub struct Mutex<T: ?Sized, const INT: bool = true> {
	queue: IntSpinlock<Queue>,
	data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send, const INT: bool> Sync for Mutex<T, INT> {}

impl<T, const INT: bool> Mutex<T, INT> {
	/// Creates a new mutex wrapping `data`.
	pub const fn new(data: T) -> Self {
		Self {
			queue: IntSpinlock::new(Queue {
				owner: None,
				wait_queue: ArenaList::new(),
			}),
			data: UnsafeCell::new(data),
		}
	}
}

impl<T: ?Sized, const INT: bool> Mutex<T, INT> {
	/// Releases the mutex, mirroring the ground truth's explicit
	/// `mutex::unlock()` rather than relying solely on [`MutexGuard`]'s
	/// `Drop`. Callable independently of holding a guard; returns
	/// [`errno::EACCES`] if the caller is not the current holder, without
	/// releasing anything.
	pub fn unlock(&self) -> EResult<()> {
		unlock::<INT>(&self.queue)
	}
}

impl<T: ?Sized> Mutex<T, true> {
	/// Acquires the mutex, sleeping (interruptibly) if it is already held.
	pub fn lock(&self) -> EResult<MutexGuard<'_, T, true>> {
		lock_slow::<true>(&self.queue)?;
		Ok(MutexGuard {
			mutex: self,
		})
	}

	/// Acquires the mutex only if it is currently free.
	///
	/// Returns [`errno::EBUSY`] instead of sleeping if it is already held.
	pub fn try_lock(&self) -> EResult<MutexGuard<'_, T, true>> {
		try_lock_slow(&self.queue)?;
		Ok(MutexGuard {
			mutex: self,
		})
	}
}

impl<T: ?Sized> Mutex<T, false> {
	/// Acquires the mutex, sleeping uninterruptibly if it is already held.
	pub fn lock(&self) -> MutexGuard<'_, T, false> {
		let _ = lock_slow::<false>(&self.queue);
		MutexGuard {
			mutex: self,
		}
	}

	/// Acquires the mutex only if it is currently free.
	///
	/// Returns [`errno::EBUSY`] instead of sleeping if it is already held.
	pub fn try_lock(&self) -> EResult<MutexGuard<'_, T, false>> {
		try_lock_slow(&self.queue)?;
		Ok(MutexGuard {
			mutex: self,
		})
	}
}

/// RAII guard releasing a [`Mutex`] when dropped.
pub struct MutexGuard<'a, T: ?Sized, const INT: bool> {
	pub(super) mutex: &'a Mutex<T, INT>,
}

impl<T: ?Sized, const INT: bool> Deref for MutexGuard<'_, T, INT> {
	type Target = T;

	fn deref(&self) -> &T {
		unsafe { &*self.mutex.data.get() }
	}
}

impl<T: ?Sized, const INT: bool> DerefMut for MutexGuard<'_, T, INT> {
	fn deref_mut(&mut self) -> &mut T {
		unsafe { &mut *self.mutex.data.get() }
	}
}

impl<T: ?Sized, const INT: bool> Drop for MutexGuard<'_, T, INT> {
	fn drop(&mut self) {
		// A live guard is only ever held by its own acquirer, so this can
		// only fail if something already released the mutex out from under
		// us through the explicit `Mutex::unlock`; nothing useful to do
		// with the error from `Drop`.
		let _ = unlock::<INT>(&self.mutex.queue);
	}
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Mutex<T, false> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&*self.lock(), f)
	}
}
