/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! Physical and virtual memory management.
//!
//! Userspace lives below [`KERNEL_VIRTUAL_BASE`]; everything above it is
//! kernel space, shared across every process's page directory except for
//! each process's own kernel-stack tables (spec.md §4.2).

pub mod buddy;
pub mod malloc;
pub mod user;
pub mod vmem;

use core::fmt;
use core::ops::{Add, Deref, DerefMut, Sub};

/// Size in bytes of a frame/page: this kernel only ever deals in 4 KiB
/// units.
pub const PAGE_SIZE: usize = 0x1000;

/// First physical address actually usable for frame allocation; below this
/// lives the kernel image loaded by the bootloader plus low memory the BIOS
/// reserves.
pub const KERNEL_PHYS_BEGIN: usize = 0x100000;

/// Virtual address splitting user space (below) from kernel space (above).
/// Matches the teacher's `PROCESS_END` on the 32-bit target.
pub const KERNEL_VIRTUAL_BASE: usize = 0xc000_0000;

/// A physical memory address.
#[repr(transparent)]
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PhysAddr(pub usize);

/// A virtual memory address.
#[repr(transparent)]
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct VirtAddr(pub usize);

macro_rules! addr_impl {
	($name:ident) => {
		impl $name {
			/// Returns the frame/page index this address falls in.
			pub const fn page_index(self) -> usize {
				self.0 / PAGE_SIZE
			}

			/// Rounds down to the start of the containing page.
			pub const fn page_align_down(self) -> Self {
				Self(self.0 & !(PAGE_SIZE - 1))
			}

			/// Rounds up to the start of the next page (or stays put if
			/// already aligned).
			pub fn page_align_up(self) -> Self {
				Self(self.0.next_multiple_of(PAGE_SIZE))
			}

			/// Byte offset within the containing page.
			pub const fn page_offset(self) -> usize {
				self.0 & (PAGE_SIZE - 1)
			}
		}

		impl Deref for $name {
			type Target = usize;

			fn deref(&self) -> &usize {
				&self.0
			}
		}

		impl DerefMut for $name {
			fn deref_mut(&mut self) -> &mut usize {
				&mut self.0
			}
		}

		impl Add<usize> for $name {
			type Output = Self;

			fn add(self, off: usize) -> Self {
				Self(self.0.wrapping_add(off))
			}
		}

		impl Sub<usize> for $name {
			type Output = Self;

			fn sub(self, off: usize) -> Self {
				Self(self.0.wrapping_sub(off))
			}
		}

		impl fmt::Debug for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}({:#010x})", stringify!($name), self.0)
			}
		}
	};
}

addr_impl!(PhysAddr);
addr_impl!(VirtAddr);

impl PhysAddr {
	/// Converts a physical address inside the identity-mapped kernel region
	/// to the virtual address the kernel sees it at.
	pub const fn kernel_to_virtual(self) -> VirtAddr {
		VirtAddr(self.0 + KERNEL_VIRTUAL_BASE)
	}
}

impl VirtAddr {
	/// Inverse of [`PhysAddr::kernel_to_virtual`]. Only valid for addresses
	/// inside the identity-mapped kernel region.
	pub const fn kernel_to_physical(self) -> PhysAddr {
		PhysAddr(self.0 - KERNEL_VIRTUAL_BASE)
	}

	/// Reinterprets the address as a raw pointer.
	///
	/// # Safety
	///
	/// The caller must know this address is actually mapped and aligned
	/// for `T`.
	pub const unsafe fn as_mut_ptr<T>(self) -> *mut T {
		self.0 as *mut T
	}

	/// Reinterprets the address as a raw const pointer.
	///
	/// # Safety
	///
	/// The caller must know this address is actually mapped and aligned
	/// for `T`.
	pub const unsafe fn as_ptr<T>(self) -> *const T {
		self.0 as *const T
	}
}

/// Brings up the frame allocator and kernel heap.
///
/// `mem_size` is the amount of usable physical RAM in bytes, as handed off
/// by the boot environment (spec.md §2: "boot code hands physical RAM size
/// to memory init").
pub fn init(mem_size: usize) {
	buddy::init(mem_size);
	malloc::init();
	crate::log_info!("memory: {} MiB usable", mem_size / (1024 * 1024));
}
