/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! i386 two-level paging: a page directory of 1024 entries, each pointing
//! to a page table of 1024 entries, each mapping one 4 KiB page.
//!
//! Kept close to the teacher's `memory::vmem::x86` bit layout
//! (`FLAG_PRESENT`/`FLAG_WRITE`/`FLAG_USER`/... at the same positions,
//! `ENTRIES_PER_TABLE = 1024`), but every table this kernel allocates is
//! reached through the permanent kernel identity map
//! ([`PhysAddr::kernel_to_virtual`]), so cross-address-space page copies in
//! [`PageDirectory::clone_dir`] read and write through that map directly
//! instead of the teacher's pair of dedicated scratch virtual pages —
//! there is no need to borrow a window into the target frame when every
//! frame already has one.

use alloc::boxed::Box;
use core::ops::Range;
use core::ptr::NonNull;

use utils::errno;
use utils::errno::EResult;

use crate::memory::vmem::SHARE_VM;
use crate::memory::{self, buddy, PhysAddr, VirtAddr, PAGE_SIZE};
use crate::sync::spinlock::IntSpinlock;

/// A raw page-table/directory entry.
pub type Entry = u32;
/// Directory/table entry flags, as passed to the contract methods.
pub type Flags = Entry;

pub const FLAG_PRESENT: Flags = 1 << 0;
pub const FLAG_WRITE: Flags = 1 << 1;
pub const FLAG_USER: Flags = 1 << 2;
pub const FLAG_WRITE_THROUGH: Flags = 1 << 3;
pub const FLAG_CACHE_DISABLE: Flags = 1 << 4;
pub const FLAG_ACCESSED: Flags = 1 << 5;
pub const FLAG_DIRTY: Flags = 1 << 6;
pub const FLAG_GLOBAL: Flags = 1 << 8;

const FLAGS_MASK: Entry = 0xfff;
const ADDR_MASK: Entry = !FLAGS_MASK;

/// Bits of the page-fault error code (spec.md §4.2).
pub const PAGE_FAULT_PRESENT: u32 = 1 << 0;
pub const PAGE_FAULT_WRITE: u32 = 1 << 1;
pub const PAGE_FAULT_USER: u32 = 1 << 2;
pub const PAGE_FAULT_RESERVED: u32 = 1 << 3;
pub const PAGE_FAULT_INSTRUCTION: u32 = 1 << 4;

pub const ENTRIES_PER_TABLE: usize = 1024;
/// Index of the first kernel-space table: `KERNEL_VIRTUAL_BASE / 4 MiB`.
pub const USERSPACE_TABLES: usize = memory::KERNEL_VIRTUAL_BASE / (PAGE_SIZE * ENTRIES_PER_TABLE);
/// The single table range reserved for each process's own kernel stack,
/// never aliased to the canonical kernel directory.
const KSTACK_TABLES: Range<usize> = (ENTRIES_PER_TABLE - 1)..ENTRIES_PER_TABLE;

const KERNEL_FLAGS: Flags = FLAG_PRESENT | FLAG_WRITE | FLAG_USER | FLAG_GLOBAL;

/// A hardware page table or page directory: 1024 raw entries, page-aligned
/// so its physical frame can be loaded straight into `CR3` or referenced by
/// a directory entry.
#[repr(C, align(4096))]
pub struct Table(pub [Entry; ENTRIES_PER_TABLE]);

#[derive(Clone, Copy)]
struct TableRef {
	phys: PhysAddr,
	ptr: NonNull<Table>,
}

fn table_mut(t: &TableRef) -> &mut Table {
	unsafe { &mut *t.ptr.as_ptr() }
}

fn table_ref(t: &TableRef) -> &Table {
	unsafe { &*t.ptr.as_ptr() }
}

fn table_index(vaddr: usize) -> usize {
	vaddr / (PAGE_SIZE * ENTRIES_PER_TABLE)
}

fn page_index(vaddr: usize) -> usize {
	(vaddr / PAGE_SIZE) % ENTRIES_PER_TABLE
}

fn alloc_table() -> EResult<TableRef> {
	let phys = buddy::alloc(0).ok_or(errno!(ENOMEM))?;
	let ptr: *mut Table = unsafe { phys.kernel_to_virtual().as_mut_ptr() };
	unsafe {
		ptr.write(Table([0; ENTRIES_PER_TABLE]));
	}
	Ok(TableRef {
		phys,
		ptr: NonNull::new(ptr).unwrap(),
	})
}

/// Frees a table's physical frame and every frame it maps. `kernel_owned`
/// tables are never user-backed so their entries are skipped — this is
/// only ever called on tables this directory exclusively owns.
fn free_table(t: &TableRef) {
	let table = table_ref(t);
	for &entry in table.0.iter() {
		if entry & FLAG_PRESENT != 0 {
			unsafe {
				buddy::free(PhysAddr((entry & ADDR_MASK) as usize));
			}
		}
	}
	unsafe {
		buddy::free(t.phys);
	}
}

/// Kernel-space tables shared by every directory, lazily allocated and
/// aliased into each new directory's kernel-high entries (spec.md §4.2).
static KERNEL_TABLES: IntSpinlock<[Option<TableRef>; ENTRIES_PER_TABLE - USERSPACE_TABLES]> =
	IntSpinlock::new([None; ENTRIES_PER_TABLE - USERSPACE_TABLES]);

fn kernel_table(index: usize) -> EResult<TableRef> {
	let slot = index - USERSPACE_TABLES;
	let mut tables = KERNEL_TABLES.lock();
	if let Some(t) = tables[slot] {
		return Ok(t);
	}
	let t = alloc_table()?;
	tables[slot] = Some(t);
	Ok(t)
}

/// Maps `n` fresh frames starting at `vstart` into the kernel-shared tables,
/// visible from every directory since kernel-high tables are aliased into
/// each one at creation (spec.md §4.2). Used by the kernel heap to grow
/// itself without going through any particular process's directory.
pub fn alloc_kernel_pages(vstart: VirtAddr, n: usize, flags: Flags) -> EResult<()> {
	for i in 0..n {
		let vaddr = vstart + i * PAGE_SIZE;
		let ti = table_index(*vaddr);
		let t = kernel_table(ti)?;
		let pi = page_index(*vaddr);
		let entry = &mut table_mut(&t).0[pi];
		if *entry & FLAG_PRESENT != 0 {
			continue;
		}
		let frame = buddy::alloc(0).ok_or(errno!(ENOMEM))?;
		*entry = (frame.0 as Entry & ADDR_MASK) | flags | FLAG_PRESENT;
	}
	Ok(())
}

/// Unmaps `n` pages starting at `vstart` from the kernel-shared tables and
/// releases their frames back to the buddy allocator. Counterpart to
/// [`alloc_kernel_pages`], used when the kernel heap gives trailing pages
/// back (spec.md §4.3).
pub fn free_kernel_pages(vstart: VirtAddr, n: usize) {
	for i in 0..n {
		let vaddr = vstart + i * PAGE_SIZE;
		let ti = table_index(*vaddr);
		let Ok(t) = kernel_table(ti) else {
			continue;
		};
		let pi = page_index(*vaddr);
		let entry = &mut table_mut(&t).0[pi];
		if *entry & FLAG_PRESENT == 0 {
			continue;
		}
		let phys = PhysAddr((*entry & ADDR_MASK) as usize);
		*entry = 0;
		unsafe {
			buddy::free(phys);
		}
	}
}

/// A per-process page directory: the hardware directory plus the parallel
/// table-pointer array spec.md §3 calls for.
pub struct PageDirectory {
	/// Physical frame of the hardware directory, loadable into `CR3`.
	phys: PhysAddr,
	hw: NonNull<Table>,
	tables: Box<[Option<TableRef>; ENTRIES_PER_TABLE]>,
}

unsafe impl Send for PageDirectory {}

impl PageDirectory {
	/// Builds an empty directory with every kernel-high table (outside the
	/// per-process kernel-stack range) aliased to the canonical set.
	pub fn new() -> EResult<Self> {
		let dir = alloc_table()?;
		let mut dir_obj = Self {
			phys: dir.phys,
			hw: dir.ptr,
			tables: Box::new([None; ENTRIES_PER_TABLE]),
		};
		for ti in USERSPACE_TABLES..ENTRIES_PER_TABLE {
			if KSTACK_TABLES.contains(&ti) {
				continue;
			}
			let t = kernel_table(ti)?;
			dir_obj.tables[ti] = Some(t);
			dir_obj.write_dir_entry(ti, t.phys, KERNEL_FLAGS);
		}
		Ok(dir_obj)
	}

	/// The physical address to load into `CR3` to activate this directory.
	pub fn phys_addr(&self) -> PhysAddr {
		self.phys
	}

	fn hw_mut(&mut self) -> &mut Table {
		unsafe { self.hw.as_mut() }
	}

	fn write_dir_entry(&mut self, ti: usize, table_phys: PhysAddr, flags: Flags) {
		self.hw_mut().0[ti] = (table_phys.0 as Entry & ADDR_MASK) | (flags & FLAGS_MASK);
	}

	/// Returns the page entry for `vaddr`, allocating a zeroed table first
	/// if needed and `make_table` is set (spec.md §4.2).
	pub fn get_page(
		&mut self,
		vaddr: VirtAddr,
		make_table: bool,
		dir_flags: Flags,
	) -> EResult<Option<&mut Entry>> {
		let ti = table_index(*vaddr);
		if self.tables[ti].is_none() {
			if !make_table {
				return Ok(None);
			}
			let t = alloc_table()?;
			self.tables[ti] = Some(t);
			self.write_dir_entry(ti, t.phys, dir_flags | FLAG_PRESENT);
		}
		let t = self.tables[ti].unwrap();
		let pi = page_index(*vaddr);
		Ok(Some(&mut table_mut(&t).0[pi]))
	}

	/// Installs `n` consecutive mappings starting at `vstart`, identity
	/// offset from `phys_base`.
	pub fn map_pages(
		&mut self,
		vstart: VirtAddr,
		phys_base: PhysAddr,
		n: usize,
		make_table: bool,
		flags: Flags,
	) -> EResult<()> {
		for i in 0..n {
			let vaddr = vstart + i * PAGE_SIZE;
			let phys = phys_base + i * PAGE_SIZE;
			let entry = self
				.get_page(vaddr, make_table, flags)?
				.ok_or(errno!(ENOMEM))?;
			*entry = (phys.0 as Entry & ADDR_MASK) | flags | FLAG_PRESENT;
		}
		Ok(())
	}

	/// Ensures every page covering `[vstart, vstart + n * PAGE_SIZE)` is
	/// present, allocating a frame for pages that are not already mapped;
	/// already-present pages keep their frame and only have flags updated.
	pub fn alloc_pages(&mut self, vstart: VirtAddr, n: usize, flags: Flags) -> EResult<()> {
		for i in 0..n {
			let vaddr = vstart + i * PAGE_SIZE;
			let entry = self.get_page(vaddr, true, flags)?.unwrap();
			if *entry & FLAG_PRESENT != 0 {
				*entry = (*entry & ADDR_MASK) | flags | FLAG_PRESENT;
			} else {
				let frame = buddy::alloc(0).ok_or(errno!(ENOMEM))?;
				*entry = (frame.0 as Entry & ADDR_MASK) | flags | FLAG_PRESENT;
			}
		}
		Ok(())
	}

	/// Builds a clone of this directory per spec.md §4.2: kernel-high
	/// tables stay aliased to the canonical set; per-process kernel-stack
	/// tables are left absent for the caller to populate; user tables are
	/// aliased if `flags` carries [`SHARE_VM`], otherwise deep-copied frame
	/// by frame.
	pub fn clone_dir(&self, flags: u32) -> EResult<Self> {
		let mut out = Self::new()?;
		for ti in 0..USERSPACE_TABLES {
			let Some(src) = self.tables[ti] else {
				continue;
			};
			if flags & SHARE_VM != 0 {
				out.tables[ti] = Some(src);
				out.write_dir_entry(ti, src.phys, self.hw_entry_flags(ti));
				continue;
			}
			let new_table = alloc_table()?;
			for pi in 0..ENTRIES_PER_TABLE {
				let entry = table_ref(&src).0[pi];
				if entry & FLAG_PRESENT == 0 {
					continue;
				}
				let src_phys = PhysAddr((entry & ADDR_MASK) as usize);
				let dst_phys = buddy::alloc(0).ok_or(errno!(ENOMEM))?;
				unsafe {
					let s: *const u8 = src_phys.kernel_to_virtual().as_ptr();
					let d: *mut u8 = dst_phys.kernel_to_virtual().as_mut_ptr();
					core::ptr::copy_nonoverlapping(s, d, PAGE_SIZE);
				}
				table_mut(&new_table).0[pi] = (dst_phys.0 as Entry & ADDR_MASK) | (entry & FLAGS_MASK);
			}
			out.tables[ti] = Some(new_table);
			out.write_dir_entry(ti, new_table.phys, self.hw_entry_flags(ti));
		}
		Ok(out)
	}

	fn hw_entry_flags(&self, ti: usize) -> Flags {
		unsafe { &*self.hw.as_ptr() }.0[ti] & FLAGS_MASK
	}

	/// Releases every table not equal to the corresponding table in
	/// `shared_vm_parent` (kernel-high and kernel-stack tables are never
	/// owned by this directory and are always skipped).
	pub fn free_tables(&mut self, shared_vm_parent: Option<&PageDirectory>) {
		for ti in 0..USERSPACE_TABLES {
			let Some(t) = self.tables[ti].take() else {
				continue;
			};
			let aliased = shared_vm_parent
				.and_then(|p| p.tables[ti])
				.is_some_and(|p| p.phys == t.phys);
			if !aliased {
				free_table(&t);
			}
		}
	}

	/// Frees this process's private kernel-stack tables. Must run on a
	/// stack outside the kernel-stack range (spec.md §4.2).
	pub fn free_kstack_tables(&mut self) {
		for ti in KSTACK_TABLES {
			if let Some(t) = self.tables[ti].take() {
				free_table(&t);
			}
		}
	}

	/// The table-index range reserved for this process's kernel stack,
	/// exposed so process setup can `alloc_pages` into it.
	pub fn kstack_table_range() -> Range<usize> {
		KSTACK_TABLES
	}
}

impl PartialEq for TableRef {
	fn eq(&self, other: &Self) -> bool {
		self.phys == other.phys
	}
}

/// Decoded page-fault error code bits (spec.md §4.2).
#[derive(Debug, Clone, Copy)]
pub struct PageFaultInfo {
	pub present: bool,
	pub write: bool,
	pub user: bool,
	pub reserved: bool,
	pub instruction_fetch: bool,
}

impl PageFaultInfo {
	pub fn decode(error_code: u32) -> Self {
		Self {
			present: error_code & PAGE_FAULT_PRESENT != 0,
			write: error_code & PAGE_FAULT_WRITE != 0,
			user: error_code & PAGE_FAULT_USER != 0,
			reserved: error_code & PAGE_FAULT_RESERVED != 0,
			instruction_fetch: error_code & PAGE_FAULT_INSTRUCTION != 0,
		}
	}
}
