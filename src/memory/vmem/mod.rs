/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! Virtual memory: per-process page directories.
//!
//! Simplified from the teacher's `memory::vmem`, which wraps directory
//! mutation in a rollback-able `VMemTransaction`. Nothing in spec.md §4.2
//! calls for transactional rollback — every contract method here either
//! fully succeeds or fails outright — so that layer is dropped; the
//! `get_page`/`map_pages`/`alloc_pages`/`clone`/`free_tables` contract
//! itself is kept intact.

pub mod x86;

use alloc::sync::Arc;

use utils::errno::EResult;

pub use x86::{
	alloc_kernel_pages, free_kernel_pages, Flags, PageDirectory, FLAG_PRESENT, FLAG_USER,
	FLAG_WRITE,
};

/// Flag passed to [`PageDirectory::clone_dir`]: alias rather than
/// deep-copy user tables outside the kernel-stack range (spec.md §4.2).
pub const SHARE_VM: u32 = 1;

/// A reference-counted page directory, with an optional backref to the
/// directory it was VM-share-cloned from.
///
/// spec.md §3: "its release drops only tables not shared with the parent,
/// then frees the directory" — the backref is what lets `free_tables` tell
/// an aliased table from an owned one.
pub struct SharedDirectory {
	dir: PageDirectory,
	vm_parent: Option<Arc<SharedDirectory>>,
}

impl SharedDirectory {
	/// Wraps a freshly built directory with no clone parent.
	pub fn new(dir: PageDirectory) -> Arc<Self> {
		Arc::new(Self {
			dir,
			vm_parent: None,
		})
	}

	/// Clones `self.dir` per spec.md §4.2's `clone` contract and wraps the
	/// result, recording `self` as the clone's VM-share parent when `flags`
	/// carries [`SHARE_VM`].
	pub fn clone_shared(self: &Arc<Self>, flags: u32) -> EResult<Arc<Self>> {
		let dir = self.dir.clone_dir(flags)?;
		let vm_parent = if flags & SHARE_VM != 0 {
			Some(self.clone())
		} else {
			None
		};
		Ok(Arc::new(Self { dir, vm_parent }))
	}

	pub fn dir(&self) -> &PageDirectory {
		&self.dir
	}

	pub fn dir_mut(&mut self) -> &mut PageDirectory {
		&mut self.dir
	}
}

impl Drop for SharedDirectory {
	fn drop(&mut self) {
		let parent = self.vm_parent.as_ref().map(|p| &p.dir);
		self.dir.free_tables(parent);
	}
}
