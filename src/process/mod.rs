/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! Processes: the data model of spec.md §3 and the clone/exit/wait
//! algorithms of §4.7/§4.8.
//!
//! Grounded on the teacher's `process::mod` (`Arc<IntMutex<Process>>` table,
//! `Process::current`/`get_by_tid`, first-child/next-sibling child list)
//! but trimmed to spec.md's exact field set — no process groups, ttys,
//! rusage, TLS, vfork or signal handlers, since those are out of scope
//! here. Each live process is a single `Arc<IntSpinlock<Process>>`; the
//! table below is the only thing that keeps it alive once created.

pub mod pid;
pub mod regs;
pub mod scheduler;
pub mod signal;

use alloc::collections::BTreeMap;
use alloc::sync::{Arc, Weak};
use core::ops::Range;

pub use pid::{Pid, Tid, IDLE_PID, INIT_PID};
pub use regs::Regs;
use scheduler::RunKey;
pub use signal::{PendingSignals, Signal};
use utils::errno;
use utils::errno::EResult;

use crate::file::FdTable;
use crate::memory::vmem::SharedDirectory;
use crate::memory::VirtAddr;
use crate::sync::mutex::Mutex;
use crate::sync::spinlock::IntSpinlock;

/// Upper bound on a process's open file descriptors (spec.md §3).
pub const PROC_MAX_FDS: usize = 1024;

pub const NICE_MIN: i8 = -20;
pub const NICE_MAX: i8 = 19;

/// Fixed user-stack size granted to every process, in pages.
pub const USER_STACK_PAGES: usize = 512;

/// A process's lifecycle state (spec.md §3).
///
/// Named and valued as bit flags (rather than a plain sequential
/// discriminant) so [`wake`] can take a small OR-of-states mask, matching
/// what `sync::{mutex,condvar,semaphore}` already build with
/// `State::X as u8 | State::Y as u8`.
///
/// spec.md's literal state names are `WAITING`/`WAITING_NOINTERRUPT`; this
/// enum instead follows the naming `sync` was written against before this
/// module existed: [`State::IntSleeping`] (interruptible — spec's WAITING)
/// and [`State::Sleeping`] (not interruptible — spec's
/// WAITING_NOINTERRUPT). The "Int" prefix means "interruptible", not
/// "interrupt handler".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
	Created = 1,
	Ready = 2,
	Running = 4,
	/// Spec's WAITING_NOINTERRUPT: a signal does not wake this process.
	Sleeping = 8,
	/// Spec's WAITING: a signal wakes this process and sets `interrupted`.
	IntSleeping = 16,
	Zombie = 32,
}

/// Bit flags folded into a single byte per spec.md §3's "bit flags
/// {in-user-mode, interrupted-from-wait}".
mod flags {
	pub const IN_USER_MODE: u8 = 1 << 0;
	pub const INTERRUPTED_FROM_WAIT: u8 = 1 << 1;
}

/// A process, identified by (tid, pid) per spec.md §3.
pub struct Process {
	pub tid: Tid,
	pub pid: Pid,
	pub uid: u32,
	pub state: State,
	pub regs: Regs,
	/// `None` only once `exit` has stashed it with the scheduler.
	pub dir: Option<Arc<SharedDirectory>>,
	pub nice: i8,
	/// Accumulated virtual runtime, nanoseconds.
	pub vruntime: u64,
	pub brk: Range<VirtAddr>,
	pub user_stack_bottom: VirtAddr,
	pub fds: Arc<Mutex<FdTable>>,
	pub pending: PendingSignals,
	parent: Option<Tid>,
	first_child: Option<Tid>,
	next_sibling: Option<Tid>,
	/// Snapshot of this process's run-queue key while it is enqueued, so
	/// the scheduler can erase it in O(log n) without a linear scan
	/// (spec.md §4.5's "queue membership tag and opaque handle").
	pub(crate) run_key: Option<RunKey>,
	pub exit_status: i32,
	/// 0 = not waiting, -1 = any child, else a specific pid.
	pub wait_pid: i32,
	bits: u8,
}

impl Process {
	pub fn is_in_user_mode(&self) -> bool {
		self.bits & flags::IN_USER_MODE != 0
	}

	pub fn set_in_user_mode(&mut self, v: bool) {
		if v {
			self.bits |= flags::IN_USER_MODE;
		} else {
			self.bits &= !flags::IN_USER_MODE;
		}
	}
}

static TABLE: IntSpinlock<BTreeMap<Tid, Arc<IntSpinlock<Process>>>> =
	IntSpinlock::new(BTreeMap::new());
static CURRENT: IntSpinlock<Option<Tid>> = IntSpinlock::new(None);

/// Looks up a live process by tid.
pub fn find_by_tid(tid: Tid) -> Option<Arc<IntSpinlock<Process>>> {
	TABLE.lock().get(&tid).cloned()
}

/// The currently running process, if any (none before the scheduler's
/// first dispatch).
pub fn current() -> Option<Arc<IntSpinlock<Process>>> {
	let tid = (*CURRENT.lock())?;
	find_by_tid(tid)
}

/// Records `tid` as the process now executing. Called only by the
/// scheduler at dispatch.
pub(crate) fn set_current(tid: Tid) {
	*CURRENT.lock() = Some(tid);
}

/// Per spec.md §3, `tid` is the only identifier guaranteed unique per
/// schedulable entity — `pid` is shared across `THREAD`-cloned siblings.
/// `sync::{mutex,condvar,semaphore}`'s wait queues call this `current_pid`
/// but need per-entity uniqueness, so this returns the tid: waking the
/// wrong sibling of a thread group would otherwise be possible.
pub fn current_pid() -> Pid {
	CURRENT.lock().expect("current_pid() with no current process")
}

/// Sets the current process's state. Used by `sync` primitives just
/// before invoking [`scheduler::schedule`] to go to sleep.
pub fn set_state(state: State) {
	let proc = current().expect("set_state() with no current process");
	proc.lock().state = state;
}

/// Whether the current process was interrupted out of its last sleep by a
/// delivered signal (spec.md §3's "interrupted-from-wait" bit),
/// clearing the flag as it is read.
pub fn has_pending_signal() -> bool {
	let proc = current().expect("has_pending_signal() with no current process");
	let mut p = proc.lock();
	let was = p.bits & flags::INTERRUPTED_FROM_WAIT != 0;
	p.bits &= !flags::INTERRUPTED_FROM_WAIT;
	was
}

/// Moves `tid` back to the run queue if its current state is one of the
/// bit-flags set in `mask`. A racy wake against a process already moved
/// elsewhere (e.g. reaped, or woken by a different path) is a silent
/// no-op, matching §4.4's "not themselves serialized against interrupts"
/// note.
pub fn wake(tid: Pid, mask: u8) {
	let Some(proc) = find_by_tid(tid) else {
		return;
	};
	{
		let mut p = proc.lock();
		if (p.state as u8) & mask == 0 {
			return;
		}
		p.state = State::Ready;
	}
	scheduler::enqueue_ready(proc);
}

/// Runs `f` with the current process's page directory, for syscall
/// handlers validating user pointers (spec.md §9).
///
/// Returns `EFAULT` if the directory is currently VM-shared with another
/// live thread — the same best-effort limitation `free_user_stack` already
/// accepts: exclusive access is required to hand out a `&mut
/// PageDirectory` this way. Threads created without `CLONE_VM` are
/// unaffected.
pub fn with_current_dir_mut<R>(
	f: impl FnOnce(&mut crate::memory::vmem::PageDirectory) -> EResult<R>,
) -> EResult<R> {
	let proc = current().expect("with_current_dir_mut() with no current process");
	let mut p = proc.lock();
	let dir = p.dir.as_mut().ok_or_else(|| errno!(EFAULT))?;
	let shared = Arc::get_mut(dir).ok_or_else(|| errno!(EFAULT))?;
	f(shared.dir_mut())
}

/// Sends `sig` to `tid` (spec.md §4.6). No-op if the target is gone,
/// ZOMBIE, or `sig` is `None` (signal number 0, the existence-check
/// convention).
pub fn tkill(tid: Tid, sig: Option<Signal>) {
	let Some(proc) = find_by_tid(tid) else {
		return;
	};
	let Some(sig) = sig else {
		return;
	};
	let mut p = proc.lock();
	if p.state == State::Zombie {
		return;
	}
	p.pending.raise(sig);
	if p.state == State::IntSleeping {
		p.bits |= flags::INTERRUPTED_FROM_WAIT;
		p.state = State::Ready;
		drop(p);
		scheduler::enqueue_ready(proc);
	}
}

/// Builds the very first process (pid/tid = [`INIT_PID`]) around an
/// already-prepared address space, user entry point and stack. Used once
/// by `elf`'s loader when bringing up `/sbin/init`.
pub fn spawn_init(
	dir: Arc<SharedDirectory>,
	entry: VirtAddr,
	stack_bottom: VirtAddr,
	brk_start: VirtAddr,
) -> Arc<IntSpinlock<Process>> {
	let tid = pid::alloc_tid();
	debug_assert_eq!(tid, INIT_PID);
	// `esp` starts one past the top of the mapped stack region (the usual
	// "one past the end" convention: the first `push` decrements before
	// writing, so it lands inside the last mapped page).
	let stack_top = stack_bottom + USER_STACK_PAGES * crate::memory::PAGE_SIZE;
	let mut regs = Regs::default();
	regs.eip = *entry as u32;
	regs.esp = *stack_top as u32;
	regs.eflags |= regs::EFLAGS_USER_MODE;
	let proc = Process {
		tid,
		pid: tid,
		uid: 0,
		state: State::Ready,
		regs,
		dir: Some(dir),
		nice: 0,
		vruntime: scheduler::min_vruntime(),
		brk: brk_start..brk_start,
		user_stack_bottom: stack_bottom,
		fds: Arc::new(Mutex::new(FdTable::new())),
		pending: PendingSignals::new(),
		parent: None,
		first_child: None,
		next_sibling: None,
		run_key: None,
		exit_status: 0,
		wait_pid: 0,
		bits: flags::IN_USER_MODE,
	};
	let arc = Arc::new(IntSpinlock::new(proc));
	TABLE.lock().insert(tid, arc.clone());
	scheduler::enqueue_ready(arc.clone());
	arc
}

/// Clone flag bits (spec.md §6).
pub mod clone_flags {
	pub const VM: u32 = 0x100;
	pub const FS: u32 = 0x200;
	pub const FILES: u32 = 0x400;
	pub const SIGHAND: u32 = 0x800;
	pub const PARENT: u32 = 0x1000;
	pub const THREAD: u32 = 0x2000;
	/// Mask selecting the low child-exit-signal byte.
	pub const SIGNAL_MASK: u32 = 0xff;
}

/// `clone(flags)` (spec.md §4.7). Returns the child's pid as seen by the
/// parent; the child's own saved register snapshot is pre-set to return 0
/// once it is first scheduled.
pub fn do_clone(flags: u32) -> EResult<Pid> {
	let parent_arc = current().expect("clone() with no current process");
	let tid = pid::alloc_tid();
	let (pid_val, dir, nice, brk, stack_bottom, fds, parent_tid, owner_tid, mut regs) = {
		let parent = parent_arc.lock();
		let pid_val = if flags & clone_flags::THREAD != 0 {
			parent.pid
		} else {
			tid
		};
		let vm_flags = if flags & clone_flags::VM != 0 {
			crate::memory::vmem::SHARE_VM
		} else {
			0
		};
		let dir = parent
			.dir
			.as_ref()
			.expect("clone() of an exiting process")
			.clone_shared(vm_flags)?;
		let fds = if flags & clone_flags::FILES != 0 {
			parent.fds.clone()
		} else {
			Arc::new(Mutex::new(parent.fds.lock().fork()))
		};
		let owner = if flags & clone_flags::PARENT != 0 {
			parent.parent.unwrap_or(parent.tid)
		} else {
			parent.tid
		};
		(
			pid_val,
			dir,
			parent.nice,
			parent.brk.clone(),
			parent.user_stack_bottom,
			fds,
			parent.tid,
			owner,
			parent.regs.clone(),
		)
	};
	// Child resumes with a return value of 0; the parent path returns the
	// pid computed above (spec.md §4.7 point 5).
	regs.set_return(0);
	let child = Process {
		tid,
		pid: pid_val,
		uid: parent_arc.lock().uid,
		state: State::Created,
		regs,
		dir: Some(dir),
		nice,
		vruntime: scheduler::min_vruntime(),
		brk,
		user_stack_bottom: stack_bottom,
		fds,
		pending: PendingSignals::new(),
		parent: Some(parent_tid),
		first_child: None,
		next_sibling: None,
		run_key: None,
		exit_status: 0,
		wait_pid: 0,
		bits: flags::IN_USER_MODE,
	};
	let child_arc = Arc::new(IntSpinlock::new(child));
	TABLE.lock().insert(tid, child_arc.clone());
	if let Some(owner_arc) = find_by_tid(owner_tid) {
		let mut owner = owner_arc.lock();
		child_arc.lock().next_sibling = owner.first_child;
		owner.first_child = Some(tid);
	}
	child_arc.lock().state = State::Ready;
	scheduler::enqueue_ready(child_arc);
	Ok(pid_val)
}

/// Reparents every non-ZOMBIE child of `owner` to init and releases every
/// already-ZOMBIE child outright (spec.md §4.8 point 1).
fn release_and_reparent_children(owner: &Arc<IntSpinlock<Process>>) {
	let mut child_tid = owner.lock().first_child.take();
	while let Some(tid) = child_tid {
		let Some(child_arc) = find_by_tid(tid) else {
			break;
		};
		let next = child_arc.lock().next_sibling;
		let is_zombie = child_arc.lock().state == State::Zombie;
		if is_zombie {
			TABLE.lock().remove(&tid);
		} else if let Some(init_arc) = find_by_tid(INIT_PID) {
			let mut init = init_arc.lock();
			let mut c = child_arc.lock();
			c.parent = Some(INIT_PID);
			c.next_sibling = init.first_child;
			init.first_child = Some(tid);
		}
		child_tid = next;
	}
}

/// Wakes `owner`'s parent if it is waiting on this child (spec.md §4.8
/// point 5).
fn wake_waiting_parent(owner: &Process) {
	let Some(parent_tid) = owner.parent else {
		return;
	};
	let Some(parent_arc) = find_by_tid(parent_tid) else {
		return;
	};
	let matches = {
		let p = parent_arc.lock();
		p.state == State::IntSleeping
			&& (p.wait_pid <= 0 || p.wait_pid as Pid == owner.pid)
	};
	if matches {
		wake(parent_tid, State::IntSleeping as u8);
	}
}

/// `exit(status)` (spec.md §4.8). Never returns.
pub fn exit(status: i32) -> ! {
	let cur_arc = current().expect("exit() with no current process");
	release_and_reparent_children(&cur_arc);
	let stack_bottom = cur_arc.lock().user_stack_bottom;
	// Stashed rather than dropped here: dropping now would run
	// `SharedDirectory::drop`'s `free_tables`/`free_kstack_tables` while
	// still executing on a kernel stack that lives inside those very
	// tables. The scheduler drops it only after switching off this
	// process's stack (the actual stack hop is the boot assembly's job,
	// out of this crate's scope). Taking it out of the process record
	// first means the local `dir` below is the sole strong reference,
	// so freeing the user stack through it can use an exclusive borrow.
	let mut dir = cur_arc.lock().dir.take();
	if let Some(d) = dir.as_mut() {
		free_user_stack(d, stack_bottom);
	}
	{
		let mut cur = cur_arc.lock();
		cur.exit_status = status;
		cur.state = State::Zombie;
	}
	scheduler::remove_from_run_queue(&cur_arc);
	wake_waiting_parent(&cur_arc.lock());
	scheduler::stash_exiting_directory(dir);
	scheduler::schedule();
	unreachable!("a ZOMBIE process was rescheduled");
}

/// Unmaps and frees every frame backing the user stack, best-effort: if
/// another thread in the same address space still holds a reference to
/// `dir`, the pages are left for that thread's own exit to release.
fn free_user_stack(dir: &mut Arc<SharedDirectory>, stack_bottom: VirtAddr) {
	let Some(shared) = Arc::get_mut(dir) else {
		return;
	};
	let d = shared.dir_mut();
	for i in 0..USER_STACK_PAGES {
		let vaddr = stack_bottom + i * crate::memory::PAGE_SIZE;
		if let Ok(Some(entry)) = d.get_page(vaddr, false, 0) {
			if *entry & crate::memory::vmem::FLAG_PRESENT != 0 {
				let phys = crate::memory::PhysAddr((*entry & !0xfff) as usize);
				*entry = 0;
				unsafe {
					crate::memory::buddy::free(phys);
				}
			}
		}
	}
}

/// `waitpid(pid, options)` (spec.md §4.8). `options` must be zero.
pub fn waitpid(pid: i32, options: i32) -> EResult<(Pid, i32)> {
	if options != 0 {
		return Err(errno!(EINVAL));
	}
	if pid < -1 {
		return Err(errno!(ECHILD));
	}
	let cur_arc = current().expect("waitpid() with no current process");
	loop {
		if let Some(reaped) = try_reap(&cur_arc, pid) {
			return Ok(reaped);
		}
		if cur_arc.lock().first_child.is_none() {
			return Err(errno!(ECHILD));
		}
		cur_arc.lock().wait_pid = pid;
		set_state(State::IntSleeping);
		scheduler::schedule();
		if has_pending_signal() {
			return Err(errno!(EINTR));
		}
	}
}

/// Looks for a ZOMBIE child of `owner` matching `pid` (spec.md §4.8's
/// `pid <= 0` wildcard rule) and reaps it if found.
fn try_reap(owner: &Arc<IntSpinlock<Process>>, pid: i32) -> Option<(Pid, i32)> {
	let mut prev: Option<Tid> = None;
	let mut cur = owner.lock().first_child;
	while let Some(tid) = cur {
		let child_arc = find_by_tid(tid)?;
		let (next, matches, zombie, cpid, status) = {
			let c = child_arc.lock();
			(
				c.next_sibling,
				pid <= 0 || c.pid as i32 == pid,
				c.state == State::Zombie,
				c.pid,
				c.exit_status,
			)
		};
		if matches && zombie {
			let mut p = owner.lock();
			match prev {
				Some(pt) => {
					if let Some(prev_arc) = find_by_tid(pt) {
						prev_arc.lock().next_sibling = next;
					}
				}
				None => p.first_child = next,
			}
			drop(p);
			TABLE.lock().remove(&tid);
			return Some((cpid, status));
		}
		prev = Some(tid);
		cur = next;
	}
	None
}

/// `nanosleep(duration_ns)` (spec.md §6). Blocks the current process on
/// the scheduler's timed sleep queue, waking early with `EINTR` if a
/// signal arrives first.
pub fn nanosleep(duration_ns: u64) -> EResult<()> {
	let cur_arc = current().expect("nanosleep() with no current process");
	let wake_at = crate::time::now_ns() + duration_ns;
	set_state(State::IntSleeping);
	scheduler::sleep_until(cur_arc, wake_at);
	scheduler::schedule();
	if has_pending_signal() {
		return Err(errno!(EINTR));
	}
	Ok(())
}

/// Loads `path` (spec.md's embedded `/sbin/init`) as the first process on
/// the run queue. Called once from `kernel_main`, before the scheduler's
/// first dispatch.
pub fn load_init(path: &str) -> EResult<()> {
	use crate::memory::vmem::{PageDirectory, FLAG_USER, FLAG_WRITE};

	let node = crate::file::vfs::walk(&crate::file::vfs::root(), path)?;
	let inode = node.lock().inode.clone();
	let size = inode.size() as usize;
	let mut data = alloc::vec![0u8; size];
	let mut off = 0;
	while off < data.len() {
		let n = inode.read(off as u64, &mut data[off..])?;
		if n == 0 {
			break;
		}
		off += n;
	}
	data.truncate(off);

	let mut dir = PageDirectory::new()?;
	let image = crate::elf::load(&data, &mut dir)?;

	let stack_bottom = VirtAddr(crate::memory::KERNEL_VIRTUAL_BASE - USER_STACK_PAGES * crate::memory::PAGE_SIZE);
	dir.alloc_pages(stack_bottom, USER_STACK_PAGES, FLAG_USER | FLAG_WRITE)?;

	let shared = SharedDirectory::new(dir);
	spawn_init(shared, image.entry, stack_bottom, image.brk_start);
	Ok(())
}
