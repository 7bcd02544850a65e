/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! The user-pointer validator.
//!
//! Per spec.md §9's open question, the original source's
//! `user_ptr::copy_from`/`copy_to` fall through without returning a
//! boolean on the success path; the intended contract — return success —
//! is expressed here the idiomatic way, as `EResult<()>` rather than a
//! `bool` callers could ignore.
//!
//! [`check_region`] takes the page directory to validate against as a
//! parameter rather than reaching for a "current process" global: this
//! keeps `memory` free of a dependency on `process`, and every call site
//! (the syscall dispatcher) already has the current directory in hand.

use utils::errno;
use utils::errno::EResult;

use crate::memory::vmem::{PageDirectory, FLAG_PRESENT, FLAG_USER, FLAG_WRITE};
use crate::memory::{VirtAddr, PAGE_SIZE};

/// An address supplied by user space, not yet known to be safe to touch.
///
/// Exposes only [`Self::get`]; there is no way to obtain the underlying
/// pointer without going through validation (spec.md §9).
#[derive(Clone, Copy)]
pub struct UserPtr {
	addr: VirtAddr,
}

impl UserPtr {
	/// Wraps a raw user-supplied address. Not yet validated.
	pub const fn new(addr: usize) -> Self {
		Self {
			addr: VirtAddr(addr),
		}
	}

	/// Validates that every page covering `[addr, addr+len)` is present,
	/// user-accessible, and (if `write`) writable in `dir`.
	pub fn check_region(dir: &mut PageDirectory, addr: VirtAddr, len: usize, write: bool) -> EResult<()> {
		if len == 0 {
			return Ok(());
		}
		let end = addr + len;
		let mut page = addr.page_align_down();
		while *page < *end {
			let entry = dir.get_page(page, false, 0)?.ok_or(errno!(EFAULT))?;
			let flags = *entry;
			if flags & FLAG_PRESENT == 0 || flags & FLAG_USER == 0 {
				return Err(errno!(EFAULT));
			}
			if write && flags & FLAG_WRITE == 0 {
				return Err(errno!(EFAULT));
			}
			page = page + PAGE_SIZE;
		}
		Ok(())
	}

	/// Validates this pointer as a `len`-byte region and returns the
	/// checked virtual address on success.
	pub fn get(&self, dir: &mut PageDirectory, len: usize, write: bool) -> EResult<VirtAddr> {
		Self::check_region(dir, self.addr, len, write)?;
		Ok(self.addr)
	}
}

/// Validates and copies `len` bytes from a user-space source into `dst`.
pub fn copy_from_user(dir: &mut PageDirectory, src: UserPtr, dst: &mut [u8]) -> EResult<()> {
	let addr = src.get(dir, dst.len(), false)?;
	unsafe {
		let ptr: *const u8 = addr.as_ptr();
		core::ptr::copy_nonoverlapping(ptr, dst.as_mut_ptr(), dst.len());
	}
	Ok(())
}

/// Validates and copies `src` into a user-space destination.
pub fn copy_to_user(dir: &mut PageDirectory, dst: UserPtr, src: &[u8]) -> EResult<()> {
	let addr = dst.get(dir, src.len(), true)?;
	unsafe {
		let ptr: *mut u8 = addr.as_mut_ptr();
		core::ptr::copy_nonoverlapping(src.as_ptr(), ptr, src.len());
	}
	Ok(())
}
