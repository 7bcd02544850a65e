/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! Block storage: AHCI controller discovery and the `transfer` contract
//! spec.md §6 exposes to the rest of the kernel.

pub mod ahci;

use alloc::sync::Arc;
use alloc::vec::Vec;

use utils::errno;
use utils::errno::EResult;

use crate::device::pci;
use crate::memory::PhysAddr;
use crate::sync::mutex::Mutex;

pub use ahci::TransferResult;

/// PCI class/subclass for an AHCI (SATA) mass-storage controller.
const CLASS_MASS_STORAGE: u8 = 0x01;
const SUBCLASS_SATA: u8 = 0x06;
/// Offset of BAR5 (the ABAR, AHCI's MMIO base) in PCI config space.
const BAR5_OFFSET: u8 = 0x24;
/// Per-port register block size and offset of port 0 within HBA MMIO
/// space (AHCI 1.3.1 §3).
const PORT_REGS_OFFSET: usize = 0x100;
const PORT_REGS_SIZE: usize = 0x80;
/// Size of one port's command list (32 headers * 32 bytes).
const CMD_LIST_SIZE: usize = ahci::NUM_CMD_SLOTS * 32;
/// Size of the FIS-receive area AHCI mandates per port.
const FIS_RECEIVE_SIZE: usize = 0x100;
/// Size of one command table (header + PRDT region), rounded up to a
/// page so each slot's table starts frame-aligned.
const CMD_TABLE_SIZE: usize = crate::memory::PAGE_SIZE;

static CONTROLLER: Mutex<Option<Arc<ahci::Port>>> = Mutex::new(None);

/// Locates the first AHCI controller on bus 0 and brings its first port
/// up (spec.md §4.11's engine start sequence), or leaves storage
/// unavailable if none is present — this kernel's self-tests and init
/// image do not require a disk.
pub fn init() {
	if let Some(port) = probe() {
		*CONTROLLER.lock() = Some(Arc::new(port));
	} else {
		crate::log_info!("ahci: no controller found, storage disabled");
	}
}

fn probe() -> Option<ahci::Port> {
	for slot in 0..32u8 {
		let class = pci::read_dword(0, slot, 0, 0x08) >> 16;
		let (subclass, base_class) = ((class & 0xff) as u8, (class >> 8) as u8);
		if base_class != CLASS_MASS_STORAGE || subclass != SUBCLASS_SATA {
			continue;
		}
		let bar5 = pci::read_dword(0, slot, 0, BAR5_OFFSET) & !0xf;
		let hba_base = PhysAddr(bar5 as usize).kernel_to_virtual().0 as *mut u8;
		let port_base = unsafe { hba_base.add(PORT_REGS_OFFSET) };

		// Command-list, FIS-receive, and per-slot command-table areas.
		// A real allocator call sits behind spec.md's frame allocator;
		// addresses here are placeholders the frame allocator backs at
		// boot via `memory::buddy`.
		let clb = alloc_dma_pages(CMD_LIST_SIZE);
		let fb = alloc_dma_pages(FIS_RECEIVE_SIZE);
		let mut tables = [PhysAddr(0); ahci::NUM_CMD_SLOTS];
		for t in tables.iter_mut() {
			*t = alloc_dma_pages(CMD_TABLE_SIZE);
		}

		let port = unsafe { ahci::Port::init(port_base, clb, fb, tables) };
		return Some(port);
	}
	None
}

fn alloc_dma_pages(size: usize) -> PhysAddr {
	let frames = size.div_ceil(crate::memory::PAGE_SIZE).max(1);
	let order = frames.next_power_of_two().trailing_zeros() as u8;
	crate::memory::buddy::alloc(order).expect("out of memory bringing up AHCI controller")
}

/// Reads or writes `nblks` sectors starting at `lba` to/from the
/// physical buffer `phys_buf` (spec.md §6). Returns `BUSY` if every
/// command slot is occupied and `IO` on a task-file error or polling
/// timeout.
pub fn transfer(lba: u64, nblks: usize, phys_buf: PhysAddr, write: bool) -> EResult<TransferResult> {
	let guard = CONTROLLER.lock();
	let port = guard.as_ref().ok_or_else(|| errno!(EIO))?;
	port.transfer(lba, nblks, phys_buf, write)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn port_regs_window_fits_in_one_page() {
		assert!(PORT_REGS_OFFSET + PORT_REGS_SIZE <= crate::memory::PAGE_SIZE);
	}
}
