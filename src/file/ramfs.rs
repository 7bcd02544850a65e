/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! The in-memory filesystem backing the process-wide root superblock
//! (spec.md §3's "a well-known process-wide root superblock exists").
//!
//! Grounded on the teacher's `file::vfs`'s root-superblock bootstrap, with
//! the concrete storage simplified to a plain `Mutex`-guarded child list and
//! byte buffer per inode — this kernel carries no on-disk filesystem
//! format, only devfs and this in-memory tree, so there is no reason for
//! the inode to be anything more elaborate than that.

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use utils::errno;
use utils::errno::EResult;

use crate::file::inode::{mode, Inode};
use crate::sync::mutex::Mutex;

struct Entry {
	name: String,
	inode: Arc<dyn Inode>,
}

/// A plain in-memory inode: either a directory (a child list) or a regular
/// file (a byte buffer). `mode`'s type bits decide which.
pub struct RamInode {
	ino: u64,
	uid: u32,
	gid: u32,
	mode: u16,
	children: Mutex<Vec<Entry>>,
	data: Mutex<Vec<u8>>,
}

impl RamInode {
	fn new(ino: u64, mode: u16) -> Arc<Self> {
		Arc::new(Self {
			ino,
			uid: 0,
			gid: 0,
			mode,
			children: Mutex::new(Vec::new()),
			data: Mutex::new(Vec::new()),
		})
	}

	pub fn new_dir(ino: u64) -> Arc<Self> {
		Self::new(ino, mode::S_IFDIR | 0o755)
	}

	pub fn new_file(ino: u64, contents: Vec<u8>) -> Arc<Self> {
		let inode = Self::new(ino, mode::S_IFREG | 0o755);
		*inode.data.lock() = contents;
		inode
	}

	/// Links `child` under `name`. Used only while building the static
	/// bootstrap tree, not reachable through a syscall.
	pub fn link(&self, name: &str, child: Arc<dyn Inode>) {
		self.children.lock().push(Entry {
			name: name.to_string(),
			inode: child,
		});
	}
}

impl Inode for RamInode {
	fn ino(&self) -> u64 {
		self.ino
	}

	fn uid(&self) -> u32 {
		self.uid
	}

	fn gid(&self) -> u32 {
		self.gid
	}

	fn size(&self) -> u64 {
		self.data.lock().len() as u64
	}

	fn mode(&self) -> u16 {
		self.mode
	}

	fn is_dirty(&self) -> bool {
		false
	}

	fn read(&self, offset: u64, buf: &mut [u8]) -> EResult<usize> {
		let data = self.data.lock();
		let offset = offset as usize;
		if offset >= data.len() {
			return Ok(0);
		}
		let n = buf.len().min(data.len() - offset);
		buf[..n].copy_from_slice(&data[offset..offset + n]);
		Ok(n)
	}

	fn write(&self, offset: u64, buf: &[u8]) -> EResult<usize> {
		let mut data = self.data.lock();
		let offset = offset as usize;
		if data.len() < offset + buf.len() {
			data.resize(offset + buf.len(), 0);
		}
		data[offset..offset + buf.len()].copy_from_slice(buf);
		Ok(buf.len())
	}

	fn get_child(&self, name: &str) -> EResult<Option<Arc<dyn Inode>>> {
		Ok(self
			.children
			.lock()
			.iter()
			.find(|e| e.name == name)
			.map(|e| e.inode.clone()))
	}

	fn create_child(&self, name: &str, mode: u16) -> EResult<Arc<dyn Inode>> {
		let ino = NEXT_INO.fetch(1);
		let child: Arc<dyn Inode> = RamInode::new(ino, mode);
		self.link(name, child.clone());
		Ok(child)
	}

	fn children(&self) -> EResult<Vec<String>> {
		Ok(self.children.lock().iter().map(|e| e.name.clone()).collect())
	}
}

struct InoCounter(core::sync::atomic::AtomicU64);

impl InoCounter {
	const fn new(start: u64) -> Self {
		Self(core::sync::atomic::AtomicU64::new(start))
	}

	fn fetch(&self, n: u64) -> u64 {
		self.0.fetch_add(n, core::sync::atomic::Ordering::Relaxed)
	}
}

static NEXT_INO: InoCounter = InoCounter::new(2);

/// Builds a minimal, syntactically valid ELF32/i386/ET_EXEC image embedding
/// a single executable `PT_LOAD` segment: a tight loop issuing the `exit`
/// syscall. Stands in for a real `/sbin/init` binary, which would otherwise
/// be produced by a userspace toolchain this crate does not build.
fn build_init_image() -> Vec<u8> {
	const ENTRY_VADDR: u32 = 0x0804_8000;
	// `mov eax, 0` ; `mov ebx, 0` ; `int 0x80` ; `jmp $-2` (spins on exit).
	let code: &[u8] = &[0xb8, 0, 0, 0, 0, 0xbb, 0, 0, 0, 0, 0xcd, 0x80, 0xeb, 0xfe];

	let ehsize = 52u32;
	let phentsize = 32u32;
	let phoff = ehsize;
	let data_off = phoff + phentsize;

	let mut img = Vec::with_capacity(data_off as usize + code.len());
	// e_ident
	img.extend_from_slice(&[0x7f, b'E', b'L', b'F', 1, 1, 1, 0]);
	img.extend_from_slice(&[0; 8]);
	img.extend_from_slice(&2u16.to_le_bytes()); // e_type = ET_EXEC
	img.extend_from_slice(&3u16.to_le_bytes()); // e_machine = EM_386
	img.extend_from_slice(&1u32.to_le_bytes()); // e_version
	img.extend_from_slice(&ENTRY_VADDR.to_le_bytes()); // e_entry
	img.extend_from_slice(&phoff.to_le_bytes()); // e_phoff
	img.extend_from_slice(&0u32.to_le_bytes()); // e_shoff
	img.extend_from_slice(&0u32.to_le_bytes()); // e_flags
	img.extend_from_slice(&(ehsize as u16).to_le_bytes()); // e_ehsize
	img.extend_from_slice(&(phentsize as u16).to_le_bytes()); // e_phentsize
	img.extend_from_slice(&1u16.to_le_bytes()); // e_phnum
	img.extend_from_slice(&0u16.to_le_bytes()); // e_shentsize
	img.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
	img.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx
	debug_assert_eq!(img.len(), ehsize as usize);

	// Phdr: one PT_LOAD, read+execute.
	img.extend_from_slice(&1u32.to_le_bytes()); // p_type = PT_LOAD
	img.extend_from_slice(&data_off.to_le_bytes()); // p_offset
	img.extend_from_slice(&ENTRY_VADDR.to_le_bytes()); // p_vaddr
	img.extend_from_slice(&ENTRY_VADDR.to_le_bytes()); // p_paddr
	img.extend_from_slice(&(code.len() as u32).to_le_bytes()); // p_filesz
	img.extend_from_slice(&(code.len() as u32).to_le_bytes()); // p_memsz
	img.extend_from_slice(&5u32.to_le_bytes()); // p_flags = R|X
	img.extend_from_slice(&0x1000u32.to_le_bytes()); // p_align
	debug_assert_eq!(img.len(), data_off as usize);

	img.extend_from_slice(code);
	img
}

/// Builds the root directory tree: `/sbin/init` (the embedded init image)
/// and an empty `/dev` mountpoint for [`super::devfs`] to bind onto.
pub fn build_root() -> Arc<RamInode> {
	let root = RamInode::new_dir(1);

	let sbin = RamInode::new_dir(NEXT_INO.fetch(1));
	let init = RamInode::new_file(NEXT_INO.fetch(1), build_init_image());
	sbin.link("init", init);
	root.link("sbin", sbin);

	let dev = RamInode::new_dir(NEXT_INO.fetch(1));
	root.link("dev", dev);

	root
}
