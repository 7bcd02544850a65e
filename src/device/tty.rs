/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! The console TTY: `/dev/tty`'s keyboard-backed read and console-backed
//! write (spec.md §4.10's "external collaborators"), and the devfs
//! superblock that binds it into the VFS at `/dev`.
//!
//! Grounded on the teacher's `device::tty`/`tty::TTY` line-discipline
//! (buffered input, newline-terminated reads, echo) trimmed to exactly the
//! two operations spec.md asks for: no job control, no termios, no
//! terminal resizing.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use utils::errno::EResult;

use crate::file::inode::{mode, Inode};
use crate::file::superblock::Superblock;
use crate::file::vfs::VNode;
use crate::sync::condvar::Condvar;
use crate::sync::mutex::Mutex;

/// Bytes the keyboard driver has produced but no reader has consumed yet.
struct Input {
	buf: Vec<u8>,
}

struct TtyInode {
	ino: u64,
	input: Mutex<Input>,
	readable: Condvar,
}

static TTY: Mutex<Option<Arc<TtyInode>>> = Mutex::new(None);

fn tty() -> Arc<TtyInode> {
	TTY.lock()
		.get_or_insert_with(|| {
			Arc::new(TtyInode {
				ino: 1,
				input: Mutex::new(Input { buf: Vec::new() }),
				readable: Condvar::new(),
			})
		})
		.clone()
}

/// Called by the keyboard's IRQ handler (out of this crate's scope, per
/// spec.md §4.10) for every byte it decodes. Echoes the byte to the
/// console and wakes whichever reader is blocked on a full line.
pub fn push_input(byte: u8) {
	let t = tty();
	let mut guard = t.input.lock();
	guard.buf.push(byte);
	crate::print::put(byte);
	if byte == b'\n' || guard.buf.len() >= 4096 {
		t.readable.notify_all();
	}
}

impl Inode for TtyInode {
	fn ino(&self) -> u64 {
		self.ino
	}

	fn uid(&self) -> u32 {
		0
	}

	fn gid(&self) -> u32 {
		0
	}

	fn size(&self) -> u64 {
		0
	}

	fn mode(&self) -> u16 {
		mode::S_IFCHR | 0o666
	}

	fn is_dirty(&self) -> bool {
		false
	}

	/// Blocks until a full line (or a filled buffer) is available, per
	/// spec.md §4.10, then drains up to `buf.len()` bytes of it.
	fn read(&self, _offset: u64, buf: &mut [u8]) -> EResult<usize> {
		let mut guard = self.input.lock();
		loop {
			if guard.buf.contains(&b'\n') || guard.buf.len() >= 4096 {
				break;
			}
			guard = self.readable.wait(guard)?;
		}
		let n = buf.len().min(guard.buf.len());
		buf[..n].copy_from_slice(&guard.buf[..n]);
		guard.buf.drain(..n);
		Ok(n)
	}

	/// Forwards every byte straight to the console (spec.md §6's
	/// `console::put`).
	fn write(&self, _offset: u64, buf: &[u8]) -> EResult<usize> {
		for &b in buf {
			crate::print::put(b);
		}
		Ok(buf.len())
	}

	fn children(&self) -> EResult<Vec<String>> {
		Ok(Vec::new())
	}
}

/// PS/2 data port, read by the keyboard IRQ handler.
const PS2_DATA: u16 = 0x60;

/// Scan Code Set 1 make codes for the keys this console actually needs,
/// indexed by scan code. Break codes (bit 7 set) and unmapped keys are
/// dropped; there is no shift/caps state, matching spec.md §4.10's
/// "no job control, no termios" trim.
const SCANCODE_ASCII: [u8; 0x3a] = [
	0, 0, b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', b'-', b'=', 0x08, b'\t',
	b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'[', b']', b'\n', 0, b'a', b's',
	b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';', b'\'', b'`', 0, b'\\', b'z', b'x', b'c', b'v',
	b'b', b'n', b'm', b',', b'.', b'/', 0, b'*', 0, b' ',
];

/// Called from the IRQ1 entry path ([`crate::idt::handler`]) for every
/// keyboard interrupt. Reads the pending scan code and, for a recognized
/// make code, feeds the mapped byte into the tty's input buffer.
pub fn handle_keyboard_irq() {
	let scancode = unsafe { crate::io::inb(PS2_DATA) };
	if scancode & 0x80 != 0 {
		return; // break code, ignored
	}
	if let Some(&byte) = SCANCODE_ASCII.get(scancode as usize) {
		if byte != 0 {
			push_input(byte);
		}
	}
}

/// The devfs superblock bound onto `/dev` by `file::vfs::init`, whose root
/// directory holds just `/dev/tty`.
pub fn devfs_superblock() -> Arc<Superblock> {
	let root_inode: Arc<dyn Inode> = tty();
	let root = Arc::new(Mutex::new(VNode {
		inode: crate::file::ramfs::RamInode::new_dir(0),
		name: String::new(),
		parent: alloc::sync::Weak::new(),
		mounts: Vec::new(),
		children: Vec::new(),
	}));
	// `/dev/tty` is devfs's only entry; linked directly rather than through
	// a directory inode lookup since there is exactly one device here.
	root.lock().children.push(Arc::new(Mutex::new(VNode {
		inode: root_inode,
		name: "tty".into(),
		parent: Arc::downgrade(&root),
		mounts: Vec::new(),
		children: Vec::new(),
	})));
	Arc::new(Superblock {
		size: 0,
		fs_type: "devfs",
		flags: 0,
		id: 1,
		mode: mode::S_IFDIR | 0o755,
		ctime: 0,
		root,
	})
}
