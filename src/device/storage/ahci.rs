/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! The AHCI-style block transfer protocol (spec.md §4.11).
//!
//! Grounded on `other_examples`' AHCI driver (`asterism-labs-hadron`'s
//! `ahci::{command,port}`) for the command-header/FIS/PRDT field layout —
//! the teacher carries only IDE/NVMe drivers, neither of which shares
//! AHCI's command-slot structure spec.md asks for. The port-register MMIO
//! access and PCI BAR discovery are simplified to a single statically
//! configured port, since multi-controller/multi-port enumeration is out
//! of spec.md's scope.

use core::ptr::{read_volatile, write_volatile};

use utils::errno;
use utils::errno::EResult;

use crate::memory::PhysAddr;

/// Command slots per port (spec.md §3).
pub const NUM_CMD_SLOTS: usize = 32;
/// Scatter/gather regions per command table (spec.md §3).
pub const NUM_PRDT_ENTRIES: usize = 8;
/// Bytes per sector (spec.md §3).
pub const SECTOR_SIZE: usize = 512;
/// Largest single PRDT transfer, in sectors: spec.md §4.11's
/// `(4 MiB - 1) / 512`.
pub const MAX_SECTORS: usize = (4 * 1024 * 1024 - 1) / SECTOR_SIZE;
/// Bound on task-file/command-issue polling loops (spec.md §4.11).
const MAX_CYCLES: u32 = 1 << 20;

/// Outcome of a block transfer attempt (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferResult {
	Ok,
	Busy,
	Io,
}

/// FIS Register — Host to Device (20 bytes), per AHCI 1.3.1 §5.2.2.1.
#[repr(C, packed)]
#[derive(Clone, Copy)]
struct FisRegH2d {
	fis_type: u8,
	pm_and_c: u8,
	command: u8,
	features_lo: u8,
	lba0: u8,
	lba1: u8,
	lba2: u8,
	device: u8,
	lba3: u8,
	lba4: u8,
	lba5: u8,
	features_hi: u8,
	count_lo: u8,
	count_hi: u8,
	icc: u8,
	control: u8,
	_reserved: [u8; 4],
}

const FIS_TYPE_REG_H2D: u8 = 0x27;
const FIS_H2D_COMMAND: u8 = 0x80;
const ATA_CMD_READ_DMA_EX: u8 = 0x25;
const ATA_CMD_WRITE_DMA_EX: u8 = 0x35;

/// One AHCI command header (spec.md §3's "command table of up to
/// NUM_PRDT_ENTRIES scatter/gather regions").
#[repr(C, packed)]
#[derive(Clone, Copy)]
struct CommandHeader {
	flags: u16,
	prdtl: u16,
	prdbc: u32,
	ctba: u32,
	ctbau: u32,
	_reserved: [u32; 4],
}

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct PrdtEntry {
	dba: u32,
	dbau: u32,
	_reserved: u32,
	/// Bits 21:0 = byte count - 1; bit 31 = interrupt on completion.
	dbc: u32,
}

#[repr(C)]
struct CommandTable {
	cfis: FisRegH2d,
	_pad: [u8; 0x80 - core::mem::size_of::<FisRegH2d>()],
	prdt: [PrdtEntry; NUM_PRDT_ENTRIES],
}

/// Memory-mapped port register block (AHCI 1.3.1 §3.3), accessed only
/// through `read_reg`/`write_reg`'s volatile ops.
struct PortRegs {
	base: *mut u8,
}

mod reg {
	pub const CLB: usize = 0x00;
	pub const FB: usize = 0x08;
	pub const IS: usize = 0x10;
	pub const CMD: usize = 0x18;
	pub const TFD: usize = 0x20;
	pub const SACT: usize = 0x34;
	pub const CI: usize = 0x38;
}

mod cmd_bit {
	pub const ST: u32 = 1 << 0;
	pub const FRE: u32 = 1 << 4;
	pub const FR: u32 = 1 << 14;
	pub const CR: u32 = 1 << 15;
}

mod tfd_bit {
	pub const BUSY: u32 = 1 << 7;
	pub const DRQ: u32 = 1 << 3;
}

/// Bit 30 of PxIS: "Task File Error Status" (spec.md §4.11's "int_status
/// bit 30 for transfer error").
const IS_TFES: u32 = 1 << 30;

impl PortRegs {
	unsafe fn read(&self, offset: usize) -> u32 {
		read_volatile(self.base.add(offset) as *const u32)
	}

	unsafe fn write(&self, offset: usize, value: u32) {
		write_volatile(self.base.add(offset) as *mut u32, value);
	}
}

/// A single AHCI port and the command-list/FIS-receive/command-table
/// memory it owns. `clb`/`fb`/`tables` are physical addresses the HBA's
/// DMA engine reads and writes directly.
pub struct Port {
	regs: PortRegs,
	tables: [PhysAddr; NUM_CMD_SLOTS],
}

impl Port {
	/// Wraps an already-allocated port at `mmio_base`, whose command-list
	/// and FIS-receive areas are backed by `clb`/`fb` and whose per-slot
	/// command tables are backed by `tables` (all physical, all zeroed by
	/// the caller). Runs the `stop_engine → program CLB/FB → start_engine`
	/// sequence spec.md §4.11 calls for.
	///
	/// # Safety
	///
	/// `mmio_base` must be a valid, kernel-mapped pointer to this port's
	/// register block; `clb`/`fb`/`tables` must stay valid and
	/// DMA-reachable for the port's lifetime.
	pub unsafe fn init(mmio_base: *mut u8, clb: PhysAddr, fb: PhysAddr, tables: [PhysAddr; NUM_CMD_SLOTS]) -> Self {
		let regs = PortRegs { base: mmio_base };
		stop_engine(&regs);
		regs.write(reg::CLB, *clb as u32);
		regs.write(reg::FB, *fb as u32);
		start_engine(&regs);
		Self { regs, tables }
	}

	/// Scans `(SACT | CI)` for a free slot (spec.md §4.11 point 1).
	fn alloc_slot(&self) -> EResult<usize> {
		let busy = unsafe { self.regs.read(reg::SACT) | self.regs.read(reg::CI) };
		for i in 0..NUM_CMD_SLOTS {
			if busy & (1 << i) == 0 {
				return Ok(i);
			}
		}
		Err(errno!(EBUSY))
	}

	/// Performs one `transfer` call (spec.md §6), splitting `nblks`
	/// sectors across as many command-slot issuances as needed.
	pub fn transfer(&self, lba: u64, nblks: usize, phys_buf: PhysAddr, write: bool) -> EResult<TransferResult> {
		let mut lba = lba;
		let mut remaining = nblks;
		let mut buf = phys_buf;
		while remaining > 0 {
			let slot = match self.alloc_slot() {
				Ok(s) => s,
				Err(_) => return Ok(TransferResult::Busy),
			};
			// One issuance covers at most NUM_PRDT_ENTRIES PRDTs, each up
			// to MAX_SECTORS (spec.md §4.11 point 3).
			let chunk_sectors = (MAX_SECTORS * NUM_PRDT_ENTRIES).min(remaining);
			let this_lba = lba;
			let this_buf = buf;
			match self.issue(slot, this_lba, chunk_sectors, this_buf, write)? {
				TransferResult::Ok => {}
				other => return Ok(other),
			}
			remaining -= chunk_sectors;
			lba += chunk_sectors as u64;
			buf = PhysAddr(*buf + chunk_sectors * SECTOR_SIZE);
		}
		Ok(TransferResult::Ok)
	}

	fn issue(&self, slot: usize, lba: u64, sectors: usize, buf: PhysAddr, write: bool) -> EResult<TransferResult> {
		let table_phys = self.tables[slot];
		let table = unsafe { &mut *(table_phys.kernel_to_virtual().as_mut_ptr::<CommandTable>()) };

		let mut remaining = sectors;
		let mut addr = buf;
		let mut prdt_count = 0;
		while remaining > 0 && prdt_count < NUM_PRDT_ENTRIES {
			let n = remaining.min(MAX_SECTORS);
			let last = remaining - n == 0 || prdt_count + 1 == NUM_PRDT_ENTRIES;
			table.prdt[prdt_count] = PrdtEntry {
				dba: *addr as u32,
				dbau: 0,
				_reserved: 0,
				dbc: ((n * SECTOR_SIZE - 1) as u32) | if last { 1 << 31 } else { 0 },
			};
			addr = PhysAddr(*addr + n * SECTOR_SIZE);
			remaining -= n;
			prdt_count += 1;
		}

		let fis = FisRegH2d {
			fis_type: FIS_TYPE_REG_H2D,
			pm_and_c: FIS_H2D_COMMAND,
			command: if write { ATA_CMD_WRITE_DMA_EX } else { ATA_CMD_READ_DMA_EX },
			features_lo: 0,
			lba0: lba as u8,
			lba1: (lba >> 8) as u8,
			lba2: (lba >> 16) as u8,
			device: 0xe0,
			lba3: (lba >> 24) as u8,
			lba4: (lba >> 32) as u8,
			lba5: (lba >> 40) as u8,
			features_hi: 0,
			count_lo: (sectors & 0xff) as u8,
			count_hi: ((sectors >> 8) & 0xff) as u8,
			icc: 0,
			control: 0,
			_reserved: [0; 4],
		};
		table.cfis = fis;

		// Command-FIS length in dwords = sizeof(FisRegH2d)/4 (spec.md
		// §4.11 point 2); bit 6 = write flag.
		let cfl = (core::mem::size_of::<FisRegH2d>() / 4) as u16;
		let header = CommandHeader {
			flags: cfl | if write { 1 << 6 } else { 0 },
			prdtl: prdt_count as u16,
			prdbc: 0,
			ctba: *table_phys as u32,
			ctbau: 0,
			_reserved: [0; 4],
		};
		unsafe {
			let hdr_ptr = self.command_header_ptr(slot);
			core::ptr::write_volatile(hdr_ptr, header);
		}

		if !poll_clear(tfd_bit::BUSY | tfd_bit::DRQ, || unsafe { self.regs.read(reg::TFD) }) {
			return Ok(TransferResult::Io);
		}

		unsafe {
			self.regs.write(reg::SACT, self.regs.read(reg::SACT) | (1 << slot));
			self.regs.write(reg::CI, self.regs.read(reg::CI) | (1 << slot));
		}

		let mut cycles = 0;
		loop {
			let ci = unsafe { self.regs.read(reg::CI) };
			if ci & (1 << slot) == 0 {
				break;
			}
			if unsafe { self.regs.read(reg::IS) } & IS_TFES != 0 {
				return Ok(TransferResult::Io);
			}
			cycles += 1;
			if cycles >= MAX_CYCLES {
				return Ok(TransferResult::Io);
			}
		}
		Ok(TransferResult::Ok)
	}

	/// # Safety
	///
	/// The command-list area must already be mapped into kernel space at
	/// the identity-mapped address `clb` was programmed with.
	unsafe fn command_header_ptr(&self, slot: usize) -> *mut CommandHeader {
		let clb = PhysAddr(self.regs.read(reg::CLB) as usize);
		(clb.kernel_to_virtual().as_mut_ptr::<CommandHeader>()).add(slot)
	}
}

fn poll_clear(mask: u32, read: impl Fn() -> u32) -> bool {
	for _ in 0..MAX_CYCLES {
		if read() & mask == 0 {
			return true;
		}
	}
	false
}

fn stop_engine(regs: &PortRegs) {
	unsafe {
		let mut cmd = regs.read(reg::CMD);
		cmd &= !cmd_bit::ST;
		regs.write(reg::CMD, cmd);
		poll_clear(cmd_bit::CR, || regs.read(reg::CMD));
		cmd = regs.read(reg::CMD) & !cmd_bit::FRE;
		regs.write(reg::CMD, cmd);
		poll_clear(cmd_bit::FR, || regs.read(reg::CMD));
	}
}

fn start_engine(regs: &PortRegs) {
	unsafe {
		for _ in 0..MAX_CYCLES {
			if regs.read(reg::CMD) & cmd_bit::CR == 0 {
				break;
			}
		}
		let mut cmd = regs.read(reg::CMD);
		cmd |= cmd_bit::FRE;
		regs.write(reg::CMD, cmd);
		cmd |= cmd_bit::ST;
		regs.write(reg::CMD, cmd);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn max_sectors_matches_spec_bound() {
		assert_eq!(MAX_SECTORS, (4 * 1024 * 1024 - 1) / 512);
	}
}
