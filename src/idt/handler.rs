/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! Interrupt entry/exit trampolines and the common trap dispatch.
//!
//! This kernel never sets up a TSS or ring transitions (spec.md §4.2/§9
//! frame paging and the initial stack as the boot assembly's job, and
//! `Regs::EFLAGS_USER_MODE` is explicitly a synthetic bookkeeping bit, not
//! a real privilege-level marker) — every trap is taken and returned from
//! at ring 0. That collapses the usual `iret`-with-privilege-change
//! machinery to a plain stack switch: [`resume`] lands on the target
//! process's own saved stack and `ret`s into it directly.
//!
//! Each vector's entry point is a `#[naked]` function (`core::arch::asm!`
//! only, no Rust prologue) rather than the teacher's externally linked
//! assembly object, since the real boot assembly this crate would share
//! that object with is out of the retrieval pack.

use core::arch::asm;
use core::mem::offset_of;

use crate::memory::PhysAddr;
use crate::process::regs::SyscallRegs;
use crate::process::Regs;

/// The raw register frame a trap stub leaves on the stack: general
/// registers (pushed last-to-first, so popped in reverse), the vector
/// number and CPU error code the stub supplies, then whatever the CPU
/// itself pushed (`eip`, `cs`, `eflags` — no privilege change here, so no
/// `esp`/`ss`).
#[repr(C)]
struct RawFrame {
	edi: u32,
	esi: u32,
	ebp: u32,
	ebx: u32,
	edx: u32,
	ecx: u32,
	eax: u32,
	vector: u32,
	error_code: u32,
	eip: u32,
	cs: u32,
	eflags: u32,
}

impl RawFrame {
	/// Converts the raw frame into a [`Regs`] snapshot. `esp` is
	/// reconstructed as the value the CPU's own `esp` held immediately
	/// before the trap — the address just past the hardware-pushed
	/// `eip`/`cs`/`eflags` triplet — since this target never pushes
	/// `esp`/`ss` itself.
	fn to_regs(&self) -> Regs {
		let original_esp = (core::ptr::addr_of!(self.eip) as usize) + 12;
		Regs {
			ebp: self.ebp,
			esp: original_esp as u32,
			eip: self.eip,
			eflags: self.eflags,
			eax: self.eax,
			ebx: self.ebx,
			ecx: self.ecx,
			edx: self.edx,
			esi: self.esi,
			edi: self.edi,
		}
	}
}

macro_rules! exception_stub {
	($name:ident, $vector:literal, no_error_code) => {
		#[naked]
		unsafe extern "C" fn $name() {
			asm!(
				"push 0",
				"push {v}",
				"jmp {common}",
				v = const $vector,
				common = sym common_stub,
				options(noreturn)
			)
		}
	};
	($name:ident, $vector:literal, has_error_code) => {
		#[naked]
		unsafe extern "C" fn $name() {
			asm!(
				"push {v}",
				"jmp {common}",
				v = const $vector,
				common = sym common_stub,
				options(noreturn)
			)
		}
	};
}

exception_stub!(error0, 0, no_error_code);
exception_stub!(error1, 1, no_error_code);
exception_stub!(error2, 2, no_error_code);
exception_stub!(error3, 3, no_error_code);
exception_stub!(error4, 4, no_error_code);
exception_stub!(error5, 5, no_error_code);
exception_stub!(error6, 6, no_error_code);
exception_stub!(error7, 7, no_error_code);
exception_stub!(error8, 8, has_error_code);
exception_stub!(error9, 9, no_error_code);
exception_stub!(error10, 10, has_error_code);
exception_stub!(error11, 11, has_error_code);
exception_stub!(error12, 12, has_error_code);
exception_stub!(error13, 13, has_error_code);
exception_stub!(error14, 14, has_error_code);
exception_stub!(error15, 15, no_error_code);
exception_stub!(error16, 16, no_error_code);
exception_stub!(error17, 17, has_error_code);
exception_stub!(error18, 18, no_error_code);
exception_stub!(error19, 19, no_error_code);
exception_stub!(error20, 20, no_error_code);
exception_stub!(error21, 21, no_error_code);
exception_stub!(error22, 22, no_error_code);
exception_stub!(error23, 23, no_error_code);
exception_stub!(error24, 24, no_error_code);
exception_stub!(error25, 25, no_error_code);
exception_stub!(error26, 26, no_error_code);
exception_stub!(error27, 27, no_error_code);
exception_stub!(error28, 28, no_error_code);
exception_stub!(error29, 29, no_error_code);
exception_stub!(error30, 30, has_error_code);
exception_stub!(error31, 31, no_error_code);

pub(crate) static ERROR_STUBS: [unsafe extern "C" fn(); 32] = [
	error0, error1, error2, error3, error4, error5, error6, error7, error8, error9, error10,
	error11, error12, error13, error14, error15, error16, error17, error18, error19, error20,
	error21, error22, error23, error24, error25, error26, error27, error28, error29, error30,
	error31,
];

macro_rules! irq_stub {
	($name:ident, $vector:literal) => {
		#[naked]
		unsafe extern "C" fn $name() {
			asm!(
				"push 0",
				"push {v}",
				"jmp {common}",
				v = const $vector,
				common = sym common_stub,
				options(noreturn)
			)
		}
	};
}

irq_stub!(irq0, 0x20);
irq_stub!(irq1, 0x21);
irq_stub!(irq2, 0x22);
irq_stub!(irq3, 0x23);
irq_stub!(irq4, 0x24);
irq_stub!(irq5, 0x25);
irq_stub!(irq6, 0x26);
irq_stub!(irq7, 0x27);
irq_stub!(irq8, 0x28);
irq_stub!(irq9, 0x29);
irq_stub!(irq10, 0x2a);
irq_stub!(irq11, 0x2b);
irq_stub!(irq12, 0x2c);
irq_stub!(irq13, 0x2d);
irq_stub!(irq14, 0x2e);
irq_stub!(irq15, 0x2f);

pub(crate) static IRQ_STUBS: [unsafe extern "C" fn(); 16] = [
	irq0, irq1, irq2, irq3, irq4, irq5, irq6, irq7, irq8, irq9, irq10, irq11, irq12, irq13, irq14,
	irq15,
];

#[naked]
pub(crate) unsafe extern "C" fn syscall_stub() {
	asm!(
		"push 0",
		"push {v}",
		"jmp {common}",
		v = const super::SYSCALL_ENTRY,
		common = sym common_stub,
		options(noreturn)
	)
}

/// Shared entry tail: saves every general register, calls [`trap_handler`]
/// with a pointer to the assembled [`RawFrame`], and falls through —
/// `trap_handler` never returns, every path ends in [`resume`].
#[naked]
unsafe extern "C" fn common_stub() -> ! {
	asm!(
		"push eax",
		"push ecx",
		"push edx",
		"push ebx",
		"push ebp",
		"push esi",
		"push edi",
		"push esp",
		"call {handler}",
		"ud2",
		handler = sym trap_handler,
		options(noreturn)
	)
}

extern "C" fn trap_handler(frame: *const RawFrame) -> ! {
	let frame = unsafe { &*frame };
	let regs = frame.to_regs();
	match frame.vector {
		v if v == super::pic::IRQ0_VECTOR as u32 => dispatch_timer_vector(&regs),
		v if (0x21..=0x2f).contains(&v) => dispatch_irq(&regs, (v - 0x20) as u8),
		v if v as usize == super::SYSCALL_ENTRY => dispatch_syscall(frame, &regs),
		14 => dispatch_page_fault(&regs, frame.error_code),
		v => panic!("unhandled CPU exception {v} at eip={:#010x}", regs.eip),
	}
}

/// Vector `0x20` serves two masters: the real timer IRQ0 and
/// `scheduler::schedule()`'s software `int 0x20`. The PIC's in-service
/// register tells them apart — a software `int` never reaches the 8259.
fn dispatch_timer_vector(regs: &Regs) -> ! {
	if super::pic::irq0_in_service() {
		let now_ns = crate::time::on_tick();
		super::pic::end_of_interrupt(0);
		crate::process::scheduler::on_interrupt(regs, now_ns, true)
	} else {
		crate::process::scheduler::on_interrupt(regs, crate::time::now_ns(), false)
	}
}

/// A device IRQ other than the timer: service it, acknowledge it, and
/// resume exactly where execution was interrupted (no scheduling point).
fn dispatch_irq(regs: &Regs, irq: u8) -> ! {
	if irq == 1 {
		crate::device::tty::handle_keyboard_irq();
	}
	super::pic::end_of_interrupt(irq);
	resume(regs)
}

/// The fast-entry syscall convention (spec.md §4.9): `eax` carries the
/// syscall id, `ebx`/`ecx`/`edx`/`esi` the first four arguments.
fn dispatch_syscall(frame: &RawFrame, regs: &Regs) -> ! {
	let call = SyscallRegs {
		id: frame.eax,
		arg0: frame.ebx,
		arg1: frame.ecx,
		arg2: frame.edx,
		arg3: frame.esi,
		regs: regs.clone(),
	};
	let ret = crate::syscall::dispatch(call.id, &call);
	let mut out = regs.clone();
	out.set_return(ret);
	resume(&out)
}

/// Page fault (vector 14, spec.md §4.2/§7): a kernel-mode fault is a
/// kernel bug and panics; a user-mode fault delivers `SIGSEGV` to the
/// current process and forces a reschedule, since the default action
/// (terminate) only takes effect at the next dispatch.
fn dispatch_page_fault(regs: &Regs, error_code: u32) -> ! {
	let info = crate::memory::vmem::x86::PageFaultInfo::decode(error_code);
	let fault_addr = read_cr2();
	if !info.user {
		panic!(
			"page fault in kernel mode at {:#010x} (eip={:#010x}, present={}, write={})",
			fault_addr, regs.eip, info.present, info.write
		);
	}
	let pid = crate::process::current_pid();
	crate::process::tkill(pid, Some(crate::process::Signal::SIGSEGV));
	crate::process::scheduler::on_interrupt(regs, crate::time::now_ns(), false)
}

fn read_cr2() -> u32 {
	let value: u32;
	unsafe {
		asm!("mov {0}, cr2", out(reg) value, options(nomem, nostack, preserves_flags));
	}
	value
}

const OFF_ESP: usize = offset_of!(Regs, esp);
const OFF_EIP: usize = offset_of!(Regs, eip);
const OFF_EFLAGS: usize = offset_of!(Regs, eflags);
const OFF_EAX: usize = offset_of!(Regs, eax);
const OFF_EBX: usize = offset_of!(Regs, ebx);
const OFF_ECX: usize = offset_of!(Regs, ecx);
const OFF_EDX: usize = offset_of!(Regs, edx);
const OFF_ESI: usize = offset_of!(Regs, esi);
const OFF_EDI: usize = offset_of!(Regs, edi);
const OFF_EBP: usize = offset_of!(Regs, ebp);

/// Resumes execution at `regs`, never returning.
///
/// Since this kernel stays in ring 0 throughout, "resuming" a context is
/// nothing more than restoring the general registers, switching to its
/// saved stack, and `ret`-ing into its saved `eip` — there is no privilege
/// change for `iret` to perform. `eflags` is restored on the *current*
/// stack before the switch; `ret`'s target is then pushed onto the
/// *destination* stack, exactly where that stack's own next instruction
/// address belongs.
#[naked]
pub extern "C" fn resume(regs: &Regs) -> ! {
	unsafe {
		asm!(
			"mov ebx, [esp + 4]",
			"mov eax, [ebx + {off_eflags}]",
			"push eax",
			"popfd",
			"mov eax, [ebx + {off_esp}]",
			"mov ecx, [ebx + {off_eip}]",
			"mov esp, eax",
			"push ecx",
			"mov eax, [ebx + {off_eax}]",
			"mov ecx, [ebx + {off_ecx}]",
			"mov edx, [ebx + {off_edx}]",
			"mov esi, [ebx + {off_esi}]",
			"mov edi, [ebx + {off_edi}]",
			"mov ebp, [ebx + {off_ebp}]",
			"mov ebx, [ebx + {off_ebx}]",
			"ret",
			off_eflags = const OFF_EFLAGS,
			off_esp = const OFF_ESP,
			off_eip = const OFF_EIP,
			off_eax = const OFF_EAX,
			off_ecx = const OFF_ECX,
			off_edx = const OFF_EDX,
			off_esi = const OFF_ESI,
			off_edi = const OFF_EDI,
			off_ebp = const OFF_EBP,
			off_ebx = const OFF_EBX,
			options(noreturn)
		)
	}
}

/// Sets `CR0.TS` so the next FPU instruction traps, letting the scheduler
/// defer `fxsave`/`fxrstor` until a process actually touches the FPU
/// (spec.md §4.5's "lazy FPU restore").
pub fn set_fpu_lazy() {
	unsafe {
		let mut cr0: u32;
		asm!("mov {0}, cr0", out(reg) cr0, options(nomem, nostack, preserves_flags));
		cr0 |= 1 << 3;
		asm!("mov cr0, {0}", in(reg) cr0, options(nomem, nostack, preserves_flags));
	}
}

/// Loads `phys` into `CR3`, activating its page directory.
pub fn load_directory(phys: PhysAddr) {
	unsafe {
		asm!("mov cr3, {0}", in(reg) *phys, options(nomem, nostack, preserves_flags));
	}
}
