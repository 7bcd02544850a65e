/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! Growing and shrinking the kernel heap's virtual address range.
//!
//! The teacher's `memory::malloc::block` carves a fresh buddy-backed frame
//! per `Block`, sized to the allocation that triggered it. Talon's heap
//! lives in one contiguous, ever-growing kernel-virtual range instead —
//! closer to a classic `sbrk` — since spec.md §4.3 describes a single
//! `[heap_base, heap_end)` range rather than per-allocation frames, and
//! talks about releasing "aligned trailing pages" on free, which only
//! makes sense against one contiguous range.

use utils::errno::{EResult, Errno};

use crate::memory::vmem::{self, FLAG_PRESENT, FLAG_WRITE};
use crate::memory::{self, VirtAddr, PAGE_SIZE};

/// Base of the kernel heap's virtual range: 256 MiB into kernel space,
/// well clear of the identity-mapped RAM region and the kernel image.
pub const HEAP_BASE: VirtAddr = VirtAddr(memory::KERNEL_VIRTUAL_BASE + 0x1000_0000);

/// Upper bound the heap will never grow past: a further 512 MiB of
/// address space, generous for a kernel with no demand-paged user heap to
/// compete with.
const HEAP_LIMIT: VirtAddr = VirtAddr(HEAP_BASE.0 + 0x2000_0000);

const HEAP_FLAGS: vmem::Flags = FLAG_PRESENT | FLAG_WRITE;

/// Grows the heap from `heap_end` by enough whole pages to cover at least
/// `min_size` additional bytes, mapping fresh frames into kernel space.
/// Returns the new `heap_end`.
pub fn grow(heap_end: VirtAddr, min_size: usize) -> EResult<VirtAddr> {
	let n = min_size.div_ceil(PAGE_SIZE);
	let new_end = heap_end + n * PAGE_SIZE;
	if *new_end > *HEAP_LIMIT {
		return Err(Errno::ENOMEM);
	}
	vmem::alloc_kernel_pages(heap_end, n, HEAP_FLAGS)?;
	Ok(new_end)
}

/// Releases whole pages from the tail of the heap back to the frame
/// allocator, down to (but not below) `new_end`. `new_end` must already be
/// page-aligned and `>= HEAP_BASE`.
pub fn shrink(heap_end: VirtAddr, new_end: VirtAddr) {
	debug_assert_eq!(new_end.page_offset(), 0);
	debug_assert!(*new_end >= *HEAP_BASE);
	let n = (*heap_end - *new_end) / PAGE_SIZE;
	if n > 0 {
		vmem::free_kernel_pages(new_end, n);
	}
}
