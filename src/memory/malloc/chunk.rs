/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! Boundary-tag chunks: the header/footer pair bracketing every live block
//! of the kernel heap (spec.md §4.3).
//!
//! Grounded on the teacher's `memory::malloc::chunk` (split/coalesce shape,
//! `ALIGNMENT`, `as_free_chunk` pattern) but reworked to the header+footer
//! boundary-tag layout spec.md calls for instead of the teacher's
//! doubly-linked `Chunk`/`FreeChunk` pair with no footer. The free list here
//! is size-ordered rather than binned, per spec.md §4.3.

use core::mem::size_of;
use core::ptr::NonNull;

/// Required alignment for pointers returned to callers.
pub const ALIGNMENT: usize = 8;

/// Marks a header currently handed out to a caller.
const HEADER_MAGIC: u32 = 0x4845_4144;
/// Marks a header currently sitting in the free list — spec.md §4.3's
/// "distinct removed magic value" used to catch double-free: a second
/// `free()` on the same pointer finds this instead of [`HEADER_MAGIC`].
const HEADER_MAGIC_FREE: u32 = 0x4652_4545;
/// Marks a footer belonging to a live (allocated) header.
const FOOTER_MAGIC: u32 = 0x464f_4f54;
/// Marks a footer belonging to a free header.
const FOOTER_MAGIC_FREE: u32 = 0x4645_4f54;

/// The header prefixing every block, live or free.
#[repr(C, align(8))]
pub struct Header {
	magic: u32,
	/// Total size in bytes, header and footer included.
	size: usize,
	used: bool,
	/// Free-list links, size-ordered. Meaningless while `used`.
	prev: Option<NonNull<Header>>,
	next: Option<NonNull<Header>>,
}

/// The tag trailing every block, back-referencing its header so a
/// coalesce can find the left neighbour without a list walk.
#[repr(C)]
struct Footer {
	magic: u32,
	header: NonNull<Header>,
}

pub const HEADER_SIZE: usize = size_of::<Header>();
const FOOTER_SIZE: usize = size_of::<Footer>();
/// The smallest total block size worth keeping: tags plus a payload large
/// enough to still hold the free-list links once freed.
pub const MIN_BLOCK_SIZE: usize = HEADER_SIZE + FOOTER_SIZE + 8;

impl Header {
	/// Initializes a fresh, currently-free header covering `size` bytes
	/// (tags included) at `ptr`, and writes its footer.
	///
	/// # Safety
	///
	/// `ptr` must be valid, writable for `size` bytes, and aligned to
	/// [`HEADER_SIZE`]'s alignment.
	pub unsafe fn init(ptr: NonNull<Header>, size: usize) {
		debug_assert!(size >= MIN_BLOCK_SIZE);
		ptr.as_ptr().write(Header {
			magic: HEADER_MAGIC_FREE,
			size,
			used: false,
			prev: None,
			next: None,
		});
		Self::write_footer(ptr, FOOTER_MAGIC_FREE);
	}

	unsafe fn write_footer(ptr: NonNull<Header>, magic: u32) {
		let size = (*ptr.as_ptr()).size;
		let footer = (ptr.as_ptr() as *mut u8).add(size - FOOTER_SIZE) as *mut Footer;
		footer.write(Footer {
			magic,
			header: ptr,
		});
	}

	/// Recovers the header from a payload pointer previously returned by
	/// [`Self::payload`].
	///
	/// # Safety
	///
	/// `ptr` must be a payload pointer returned by a live allocation.
	pub unsafe fn from_payload(ptr: *mut u8) -> NonNull<Header> {
		let header = ptr.sub(Self::payload_offset()) as *mut Header;
		NonNull::new_unchecked(header)
	}

	/// Byte offset from a header's address to its payload, once rounded up
	/// to [`ALIGNMENT`].
	pub fn payload_offset() -> usize {
		HEADER_SIZE.next_multiple_of(ALIGNMENT)
	}

	/// The pointer returned to the caller for this (used) header.
	pub fn payload(this: NonNull<Header>) -> NonNull<u8> {
		unsafe { NonNull::new_unchecked((this.as_ptr() as *mut u8).add(Self::payload_offset())) }
	}

	pub fn size(this: NonNull<Header>) -> usize {
		unsafe { (*this.as_ptr()).size }
	}

	pub fn is_used(this: NonNull<Header>) -> bool {
		unsafe { (*this.as_ptr()).used }
	}

	/// Usable payload capacity of this block.
	pub fn payload_size(this: NonNull<Header>) -> usize {
		Self::size(this) - Self::payload_offset() - FOOTER_SIZE
	}

	/// Panics if this header or its footer have been corrupted. Always
	/// runs — heap corruption is unrecoverable (spec.md §7), not a
	/// debug-only concern.
	pub fn check(this: NonNull<Header>) {
		let h = unsafe { &*this.as_ptr() };
		let expect = if h.used {
			(HEADER_MAGIC, FOOTER_MAGIC)
		} else {
			(HEADER_MAGIC_FREE, FOOTER_MAGIC_FREE)
		};
		assert_eq!(h.magic, expect.0, "kernel heap: corrupt header");
		let footer = unsafe { &*Self::footer_ptr(this) };
		assert_eq!(footer.magic, expect.1, "kernel heap: corrupt footer");
		assert!(footer.header == this, "kernel heap: footer backref mismatch");
	}

	fn footer_ptr(this: NonNull<Header>) -> *const Footer {
		let size = Self::size(this);
		unsafe { (this.as_ptr() as *const u8).add(size - FOOTER_SIZE) as *const Footer }
	}

	/// Marks this header handed out to a caller.
	pub fn mark_used(this: NonNull<Header>) {
		unsafe {
			(*this.as_ptr()).used = true;
			(*this.as_ptr()).magic = HEADER_MAGIC;
		}
		unsafe { Self::write_footer(this, FOOTER_MAGIC) };
	}

	/// Marks this header free. Caller is responsible for free-list
	/// bookkeeping.
	pub fn mark_free(this: NonNull<Header>) {
		unsafe {
			(*this.as_ptr()).used = false;
			(*this.as_ptr()).magic = HEADER_MAGIC_FREE;
			(*this.as_ptr()).prev = None;
			(*this.as_ptr()).next = None;
		}
		unsafe { Self::write_footer(this, FOOTER_MAGIC_FREE) };
	}

	/// The address one byte past this block.
	pub fn end_addr(this: NonNull<Header>) -> usize {
		this.as_ptr() as usize + Self::size(this)
	}

	pub fn addr(this: NonNull<Header>) -> usize {
		this.as_ptr() as usize
	}

	fn set_size(this: NonNull<Header>, size: usize) {
		unsafe {
			(*this.as_ptr()).size = size;
		}
	}

	pub fn free_prev(this: NonNull<Header>) -> Option<NonNull<Header>> {
		unsafe { (*this.as_ptr()).prev }
	}

	pub fn free_next(this: NonNull<Header>) -> Option<NonNull<Header>> {
		unsafe { (*this.as_ptr()).next }
	}

	pub fn set_free_prev(this: NonNull<Header>, v: Option<NonNull<Header>>) {
		unsafe {
			(*this.as_ptr()).prev = v;
		}
	}

	pub fn set_free_next(this: NonNull<Header>, v: Option<NonNull<Header>>) {
		unsafe {
			(*this.as_ptr()).next = v;
		}
	}

	/// Splits `this` so that it covers only `new_size` bytes (tags
	/// included), returning a new free header for the remainder when the
	/// remainder is large enough to stand on its own.
	///
	/// `this` is left at `new_size` with the same `used` flag and magic it
	/// had; the caller re-tags it afterwards if needed.
	pub fn split(this: NonNull<Header>, new_size: usize) -> Option<NonNull<Header>> {
		let total = Self::size(this);
		let remainder = total - new_size;
		if remainder < MIN_BLOCK_SIZE {
			return None;
		}
		Self::set_size(this, new_size);
		unsafe { Self::write_footer(this, if Self::is_used(this) { FOOTER_MAGIC } else { FOOTER_MAGIC_FREE }) };
		let next_ptr = unsafe { NonNull::new_unchecked((this.as_ptr() as *mut u8).add(new_size) as *mut Header) };
		unsafe {
			Self::init(next_ptr, remainder);
		}
		Some(next_ptr)
	}

	/// Merges `this` with its immediate right neighbour, which must
	/// already be known free and unlinked from the free list. Returns the
	/// (unchanged) address of `this`, now covering both blocks.
	pub fn merge_right(this: NonNull<Header>, right: NonNull<Header>) {
		let new_size = Self::size(this) + Self::size(right);
		Self::set_size(this, new_size);
		let magic = if Self::is_used(this) {
			FOOTER_MAGIC
		} else {
			FOOTER_MAGIC_FREE
		};
		unsafe { Self::write_footer(this, magic) };
	}

	/// Reads the footer immediately preceding `this`, if `this` is not at
	/// `heap_base`, returning the left neighbour's header when that footer
	/// validates as free.
	///
	/// # Safety
	///
	/// `this`'s address must be `> heap_base`; the caller guarantees the
	/// bytes before `this` belong to the heap.
	pub unsafe fn left_free_neighbor(this: NonNull<Header>, heap_base: usize) -> Option<NonNull<Header>> {
		let this_addr = Self::addr(this);
		if this_addr < heap_base + FOOTER_SIZE {
			return None;
		}
		let footer = (this.as_ptr() as *const u8).sub(FOOTER_SIZE) as *const Footer;
		let footer = &*footer;
		if footer.magic != FOOTER_MAGIC_FREE {
			return None;
		}
		let left = footer.header;
		if Self::end_addr(left) != this_addr {
			return None;
		}
		Some(left)
	}

	/// The right neighbour's header, if `this` does not already reach
	/// `heap_end`.
	pub fn right_neighbor(this: NonNull<Header>, heap_end: usize) -> Option<NonNull<Header>> {
		let end = Self::end_addr(this);
		if end >= heap_end {
			return None;
		}
		Some(unsafe { NonNull::new_unchecked(end as *mut Header) })
	}
}
