/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! `brk(addr)` — syscall id 10 (spec.md §6). `addr == 0` queries the
//! current break without moving it; otherwise the break is grown (new
//! pages mapped read-write) or shrunk (pages unmapped and freed) to meet
//! the requested address, page-granular either way.

use crate::memory::vmem::{FLAG_PRESENT, FLAG_USER, FLAG_WRITE};
use crate::memory::{PhysAddr, VirtAddr, PAGE_SIZE};
use crate::process;
use crate::process::regs::SyscallRegs;

pub fn call(regs: &SyscallRegs) -> isize {
	let addr = regs.arg0 as usize;
	let proc = process::current().expect("brk() with no current process");
	let cur_end = proc.lock().brk.end;
	if addr == 0 {
		return cur_end.0 as isize;
	}

	let new_end = VirtAddr(addr);
	let result = process::with_current_dir_mut(|dir| {
		if new_end > cur_end {
			let old_page = cur_end.page_align_up();
			let new_page = new_end.page_align_up();
			let npages = (new_page.0 - old_page.0) / PAGE_SIZE;
			if npages > 0 {
				dir.alloc_pages(old_page, npages, FLAG_USER | FLAG_WRITE)?;
			}
		} else if new_end < cur_end {
			let new_page = new_end.page_align_up();
			let old_page = cur_end.page_align_up();
			let mut page = new_page;
			while page < old_page {
				if let Ok(Some(entry)) = dir.get_page(page, false, 0) {
					if *entry & FLAG_PRESENT != 0 {
						let phys = PhysAddr((*entry as usize) & !(PAGE_SIZE - 1));
						*entry = 0;
						unsafe {
							crate::memory::buddy::free(phys);
						}
					}
				}
				page = VirtAddr(page.0 + PAGE_SIZE);
			}
		}
		Ok(())
	});
	if let Err(e) = result {
		return e.as_retval();
	}
	proc.lock().brk.end = new_end;
	new_end.0 as isize
}
