/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! The vruntime-based fair scheduler (spec.md §4.5).
//!
//! Grounded on the teacher's `process::scheduler` for the interrupt-driven
//! resume trick: an in-kernel "explicit" scheduling point
//! ([`schedule`]) does not itself perform a context switch — it raises
//! the same software interrupt the timer uses (`int 0x20`, mirroring the
//! teacher's `end_tick`'s `int 0x20`) and lets the IDT's ordinary
//! interrupt-return path resume this process later, exactly where
//! `schedule()` was called. This is what lets `sync::{mutex,condvar,
//! semaphore}` treat `schedule()` as a plain blocking call. The run queue
//! itself is reworked from the teacher's per-priority run queues into the
//! single `(vruntime, nice, tid)`-ordered tree spec.md §4.5 calls for,
//! backed by a `BTreeMap` rather than a hand-rolled balanced tree — `std`'s
//! ordered-map contract already gives O(log n) insert/min/erase, which is
//! all the spec's "balanced ordered tree" requirement asks for.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::{Pid, Process, State, Tid};
use crate::memory::vmem::SharedDirectory;
use crate::sync::spinlock::IntSpinlock;

/// A process's position in the run-queue tree: `(vruntime, nice, tid)`,
/// ordered exactly as spec.md §4.5 specifies ties broken by nice then tid.
pub type RunKey = (u64, i8, Tid);

/// Minimum wall-clock delta a tick must observe before preempting
/// (spec.md §4.5 step 2), in nanoseconds.
const SCHEDULE_MIN_DELTA_NS: u64 = 1_000_000;
/// Target scheduling latency the run queue is sliced across.
const SCHED_LATENCY_NS: u64 = 20_000_000;

static RUN_QUEUE: IntSpinlock<BTreeMap<RunKey, Arc<IntSpinlock<Process>>>> =
	IntSpinlock::new(BTreeMap::new());
static SLEEP_QUEUE: IntSpinlock<BTreeMap<(u64, Tid), Arc<IntSpinlock<Process>>>> =
	IntSpinlock::new(BTreeMap::new());
static MIN_VRUNTIME: AtomicU64 = AtomicU64::new(0);
static LAST_SCHED_NS: AtomicU64 = AtomicU64::new(0);
/// Cleared while the idle loop waits for a queue insertion to wake it
/// (spec.md §4.5 step 5).
static ONLINE: AtomicBool = AtomicBool::new(true);
static EXITING_DIR: IntSpinlock<Option<Arc<SharedDirectory>>> = IntSpinlock::new(None);

fn run_key(p: &Process) -> RunKey {
	(p.vruntime, p.nice, p.tid)
}

/// Brings the scheduler up: nothing to allocate eagerly, since both queues
/// start empty, but this gives boot a place to log from and mirrors
/// `memory::malloc::init`'s symmetry note.
pub fn init() {
	crate::log_info!("scheduler: run queue online");
}

/// The vruntime newly re-enqueued processes are normalized against
/// (spec.md §3: "upon re-enqueue it is offset by the global
/// `min_vruntime`").
pub fn min_vruntime() -> u64 {
	MIN_VRUNTIME.load(Ordering::Relaxed)
}

/// Inserts `proc` into the run queue, marking it READY and recording its
/// queue-membership key.
pub fn enqueue_ready(proc: Arc<IntSpinlock<Process>>) {
	let key = {
		let mut p = proc.lock();
		if p.vruntime < min_vruntime() {
			p.vruntime = min_vruntime();
		}
		p.state = State::Ready;
		let key = run_key(&p);
		p.run_key = Some(key);
		key
	};
	RUN_QUEUE.lock().insert(key, proc);
	ONLINE.store(true, Ordering::Release);
}

/// Erases `proc` from the run queue via its recorded key, if it is
/// currently on it. No-op otherwise (it may be sleeping, zombie, or
/// already running).
pub fn remove_from_run_queue(proc: &Arc<IntSpinlock<Process>>) {
	let key = proc.lock().run_key.take();
	if let Some(k) = key {
		RUN_QUEUE.lock().remove(&k);
	}
}

/// Inserts `proc` into the timed sleep queue, waking at `wakeup_ns`
/// (`nanosleep`, spec.md §4.5/§5).
pub fn sleep_until(proc: Arc<IntSpinlock<Process>>, wakeup_ns: u64) {
	let tid = proc.lock().tid;
	SLEEP_QUEUE.lock().insert((wakeup_ns, tid), proc);
}

/// Stashes an exiting process's directory handle so its teardown runs
/// after this process's kernel stack is no longer live (see
/// `process::exit`).
pub fn stash_exiting_directory(dir: Option<Arc<SharedDirectory>>) {
	*EXITING_DIR.lock() = dir;
}

/// Drops whatever directory handle `exit` last stashed, if any. Called
/// once execution has moved off the exiting process's own kernel stack.
fn drop_stashed_directory() {
	let dir = EXITING_DIR.lock().take();
	drop(dir);
}

/// Voluntarily gives up the CPU at an explicit suspension point
/// (`condvar::wait`, `nanosleep`, `waitpid`, `exit`) by raising the same
/// software interrupt the timer tick delivers. Returns once this process
/// is chosen again — from the caller's point of view, an ordinary
/// blocking call.
#[cfg(target_arch = "x86")]
pub fn schedule() {
	unsafe {
		core::arch::asm!("int 0x20", options(nomem, nostack));
	}
}

/// Host test builds have no IDT to re-enter; tests that reach `schedule`
/// exercise only the bookkeeping functions directly instead.
#[cfg(not(target_arch = "x86"))]
pub fn schedule() {}

/// Called by the timer IRQ (and by [`schedule`]'s synthetic interrupt)
/// with the interrupted context's saved registers and current monotonic
/// time. Performs the full scheduling step of spec.md §4.5 and resumes
/// whichever process is chosen next.
///
/// `from_tick` distinguishes a real timer interrupt (subject to the
/// minimum-delta preemption check) from an explicit `schedule()` call
/// (always switches).
pub fn on_interrupt(regs: &super::Regs, now_ns: u64, from_tick: bool) -> ! {
	drop_stashed_directory();
	if from_tick {
		drain_sleep_queue(now_ns);
	}
	let last = LAST_SCHED_NS.swap(now_ns, Ordering::AcqRel);
	let delta = now_ns.saturating_sub(last);
	if from_tick {
		let qsize = RUN_QUEUE.lock().len().max(1) as u64;
		let cur_latency = SCHED_LATENCY_NS / qsize;
		if delta < SCHEDULE_MIN_DELTA_NS.max(cur_latency) {
			crate::idt::handler::resume(regs);
		}
	}
	account_outgoing(regs, delta);
	let next = pick_next();
	let Some(next) = next else {
		idle_until_runnable();
		// Re-enter with a fresh clock reading; `idle_until_runnable`
		// only returns once something was enqueued.
		return on_interrupt(regs, crate::time::now_ns(), false);
	};
	dispatch(next)
}

/// Accounts elapsed runtime to whichever process was running, snapshots
/// its registers, and reinserts it into the run queue if it is still
/// READY (spec.md §4.5 steps 3-4).
fn account_outgoing(regs: &super::Regs, delta: u64) {
	let Some(cur) = super::current() else {
		return;
	};
	let still_ready = {
		let mut p = cur.lock();
		p.regs = regs.clone();
		p.vruntime += delta;
		matches!(p.state, State::Running | State::Ready)
	};
	if still_ready {
		enqueue_ready(cur);
	}
}

/// Moves every sleep-queue entry whose wakeup has arrived onto the run
/// queue (spec.md §4.5 step on tick, point 2).
fn drain_sleep_queue(now_ns: u64) {
	let mut queue = SLEEP_QUEUE.lock();
	let ready: alloc::vec::Vec<_> = queue
		.range(..=(now_ns, Tid::MAX))
		.map(|(k, _)| *k)
		.collect();
	let mut woken = alloc::vec::Vec::new();
	for key in ready {
		if let Some(p) = queue.remove(&key) {
			woken.push(p);
		}
	}
	drop(queue);
	for p in woken {
		enqueue_ready(p);
	}
}

/// Pops the run queue's minimum-key entry, if any, and records it as the
/// new `min_vruntime` (spec.md §4.5 step 6).
fn pick_next() -> Option<Arc<IntSpinlock<Process>>> {
	let mut queue = RUN_QUEUE.lock();
	let key = *queue.keys().next()?;
	let proc = queue.remove(&key)?;
	MIN_VRUNTIME.store(key.0, Ordering::Relaxed);
	Some(proc)
}

/// Clears the online flag and halts until a queue insertion sets it again
/// (spec.md §4.5 step 5).
fn idle_until_runnable() {
	ONLINE.store(false, Ordering::Release);
	while !ONLINE.load(Ordering::Acquire) {
		crate::io::sti();
		crate::io::hlt();
	}
}

/// Delivers one pending signal (if its default action is not to ignore
/// it, that means terminating the process instead of resuming it), sets
/// `CR0.TS` for lazy FPU restore, and resumes `next` (spec.md §4.5 steps
/// 7-9).
fn dispatch(next: Arc<IntSpinlock<Process>>) -> ! {
	let (tid, dir_phys, regs) = {
		let mut p = next.lock();
		p.state = State::Running;
		let sig = p.pending.take_lowest();
		if let Some(sig) = sig {
			if sig.default_action() == super::signal::DefaultAction::Terminate {
				let tid = p.tid;
				drop(p);
				super::set_current(tid);
				super::exit(128 + sig.number() as i32);
			}
		}
		let dir_phys = p
			.dir
			.as_ref()
			.expect("dispatch of an exiting process")
			.dir()
			.phys_addr();
		(p.tid, dir_phys, p.regs.clone())
	};
	super::set_current(tid);
	crate::idt::handler::set_fpu_lazy();
	crate::idt::handler::load_directory(dir_phys);
	crate::idt::handler::resume(&regs)
}

/// Runs the scheduler forever: the idle loop keeps retrying until the
/// first real interrupt dispatches a process. Only called once, from
/// `kernel_main`, after `process::load_init` has put the init process on
/// the run queue.
pub fn run() -> ! {
	crate::io::sti();
	loop {
		crate::io::hlt();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn run_key_orders_by_vruntime_then_nice_then_tid() {
		let a: RunKey = (10, 0, 5);
		let b: RunKey = (10, -1, 3);
		let c: RunKey = (10, -1, 1);
		assert!(b < a);
		assert!(c < b);
	}
}
