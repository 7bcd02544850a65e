/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! The physical frame allocator: a buddy allocator over all usable RAM.
//!
//! Grounded on the teacher's `memory::buddy` (per-order free lists plus
//! per-order bitmaps, same split/coalesce shape) but scoped down to
//! spec.md §3/§4.1 exactly: one zone covering all of RAM and
//! `MAX_ORDER = 10`, not the teacher's three-zone (`USER`/`MMIO`/`KERNEL`)
//! `MAX_ORDER = 17` scheme — this kernel has no DMA/MMIO zone split to
//! honor.

use utils::bitset::Bitset;

use crate::memory::{PhysAddr, KERNEL_PHYS_BEGIN, PAGE_SIZE};
use crate::sync::spinlock::IntSpinlock;

/// The largest block order the allocator will hand out: `2^10` pages = 4
/// MiB.
pub const MAX_ORDER: u8 = 10;

const NONE: u32 = u32::MAX;

/// Per-frame bookkeeping. `order`/`prev`/`next` are meaningful only while
/// the frame is the head of a free block at that order; otherwise they are
/// stale and ignored.
#[derive(Clone, Copy)]
struct FrameMeta {
	order: u8,
	free: bool,
	prev: u32,
	next: u32,
}

impl Default for FrameMeta {
	fn default() -> Self {
		Self {
			order: 0,
			free: false,
			prev: NONE,
			next: NONE,
		}
	}
}

struct FreeList {
	head: u32,
}

struct State {
	/// Index of the first manageable frame (`KERNEL_PHYS_BEGIN / PAGE_SIZE`).
	base_frame: usize,
	meta: utils::Vec<FrameMeta>,
	free_lists: [FreeList; MAX_ORDER as usize + 1],
	/// `bitmaps[k]` has one bit per 2^k-aligned block at order `k`; set
	/// means "currently listed free at this order" (spec.md §4.1).
	bitmaps: [Bitset; MAX_ORDER as usize + 1],
	free_pages: usize,
}

static STATE: IntSpinlock<Option<State>> = IntSpinlock::new(None);

/// Initializes the allocator over `mem_size` bytes of physical RAM
/// starting at address 0 (the low `KERNEL_PHYS_BEGIN` bytes are reserved
/// for the kernel image and never handed out).
pub fn init(mem_size: usize) {
	let base_frame = KERNEL_PHYS_BEGIN / PAGE_SIZE;
	let total_frames = mem_size / PAGE_SIZE;
	let manageable = total_frames.saturating_sub(base_frame);
	let mut meta = utils::Vec::new();
	meta.resize(manageable, FrameMeta::default());
	let free_lists = core::array::from_fn(|_| FreeList { head: NONE });
	let bitmaps = core::array::from_fn(|k| Bitset::new(manageable.div_ceil(1 << k).max(1)));
	let mut state = State {
		base_frame,
		meta,
		free_lists,
		bitmaps,
		free_pages: 0,
	};
	// Carve the manageable region into the largest aligned blocks that fit,
	// from the top order down, and free each one.
	let mut frame = 0usize;
	while frame < manageable {
		let mut order = MAX_ORDER;
		while order > 0 {
			let block = 1usize << order;
			if frame % block == 0 && frame + block <= manageable {
				break;
			}
			order -= 1;
		}
		state.insert_free(frame, order);
		state.free_pages += 1 << order;
		frame += 1 << order;
	}
	*STATE.lock() = Some(state);
}

impl State {
	fn buddy_of(frame: usize, order: u8) -> usize {
		frame ^ (1 << order)
	}

	fn unlink(&mut self, frame: usize) {
		let (prev, next, order) = {
			let m = &self.meta[frame];
			(m.prev, m.next, m.order)
		};
		if prev == NONE {
			self.free_lists[order as usize].head = next;
		} else {
			self.meta[prev as usize].next = next;
		}
		if next != NONE {
			self.meta[next as usize].prev = prev;
		}
		self.meta[frame].free = false;
		self.bitmaps[order as usize].clear(frame >> order);
	}

	fn insert_free(&mut self, frame: usize, order: u8) {
		let old_head = self.free_lists[order as usize].head;
		self.meta[frame] = FrameMeta {
			order,
			free: true,
			prev: NONE,
			next: old_head,
		};
		if old_head != NONE {
			self.meta[old_head as usize].prev = frame as u32;
		}
		self.free_lists[order as usize].head = frame as u32;
		self.bitmaps[order as usize].set(frame >> order);
	}

	fn alloc(&mut self, order: u8) -> Option<usize> {
		let mut k = order;
		while k <= MAX_ORDER && self.free_lists[k as usize].head == NONE {
			k += 1;
		}
		if k > MAX_ORDER {
			return None;
		}
		let frame = self.free_lists[k as usize].head as usize;
		self.unlink(frame);
		// Split down to the requested order, freeing the unused buddy half
		// at each step.
		while k > order {
			k -= 1;
			let buddy = frame + (1 << k);
			self.insert_free(buddy, k);
		}
		self.meta[frame] = FrameMeta {
			order,
			free: false,
			prev: NONE,
			next: NONE,
		};
		self.free_pages -= 1 << order;
		Some(frame)
	}

	fn free(&mut self, mut frame: usize) {
		let mut order = self.meta[frame].order;
		self.free_pages += 1 << order;
		while order < MAX_ORDER {
			let buddy = Self::buddy_of(frame, order);
			if buddy >= self.meta.len() {
				break;
			}
			let is_buddy_free = self.meta[buddy].free && self.meta[buddy].order == order;
			if !is_buddy_free {
				break;
			}
			self.unlink(buddy);
			frame = frame.min(buddy);
			order += 1;
		}
		self.insert_free(frame, order);
	}
}

/// Allocates a free, aligned `2^order` block of physical frames.
///
/// Returns `None` if no block of that size is available; never panics on
/// exhaustion (spec.md §4.1).
pub fn alloc(order: u8) -> Option<PhysAddr> {
	debug_assert!(order <= MAX_ORDER);
	let mut guard = STATE.lock();
	let state = guard.as_mut().expect("buddy allocator not initialized");
	let frame = state.alloc(order)?;
	Some(PhysAddr((state.base_frame + frame) * PAGE_SIZE))
}

/// Frees a block previously returned by [`alloc`].
///
/// # Safety
///
/// `addr` must be the exact address returned by a live, not-yet-freed
/// `alloc` call.
pub unsafe fn free(addr: PhysAddr) {
	let mut guard = STATE.lock();
	let state = guard.as_mut().expect("buddy allocator not initialized");
	let frame = addr.page_index() - state.base_frame;
	state.free(frame);
}

/// Returns the number of free pages, for diagnostics and OOM heuristics.
pub fn free_pages() -> usize {
	STATE.lock().as_ref().map(|s| s.free_pages).unwrap_or(0)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn fresh(mem_size: usize) {
		init(mem_size);
	}

	#[test]
	fn alloc_free_roundtrip_restores_histogram() {
		fresh(KERNEL_PHYS_BEGIN + 16 * 1024 * 1024);
		let before = free_pages();
		let a = alloc(0).unwrap();
		let b = alloc(2).unwrap();
		unsafe {
			free(a);
			free(b);
		}
		assert_eq!(free_pages(), before);
	}

	#[test]
	fn split_then_coalesce_reunites_buddies() {
		fresh(KERNEL_PHYS_BEGIN + 16 * 1024 * 1024);
		let before = free_pages();
		// Force a split of a higher-order block by requesting order 0.
		let a = alloc(0).unwrap();
		unsafe {
			free(a);
		}
		assert_eq!(free_pages(), before);
	}

	#[test]
	fn exhaustion_returns_none_not_panic() {
		fresh(KERNEL_PHYS_BEGIN + PAGE_SIZE);
		assert!(alloc(0).is_some());
		assert!(alloc(0).is_none());
	}
}
