//! The kernel's error vocabulary.
//!
//! Every fallible kernel-internal operation and every syscall handler
//! returns an [`EResult`]. At the syscall gateway the [`Errno`] is turned
//! into the negative integer the ABI in spec §6/§7 specifies.

use core::fmt;

/// Error codes returned across the syscall boundary and by internal
/// fallible operations.
///
/// Numeric values match the negative return convention: `-(Errno as isize)`
/// is what a syscall handler returns on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(isize)]
pub enum Errno {
	/// fd out of range or nulled.
	EBADF = 9,
	/// user pointer fails validation.
	EFAULT = 14,
	/// per-process fd table full.
	EMFILE = 24,
	/// mode mismatch, mutex unlock by non-owner.
	EACCES = 13,
	/// path walk failed.
	ENOENT = 2,
	/// directory opened for write.
	EISDIR = 21,
	/// whence unknown, waitpid options nonzero, bad ELF.
	EINVAL = 22,
	/// seek on non-seekable.
	ESPIPE = 29,
	/// contended try-lock, no free command slot.
	EBUSY = 16,
	/// device signaled transfer error or hung.
	EIO = 5,
	/// allocation failed.
	ENOMEM = 12,
	/// ELF header invalid.
	ENOEXEC = 8,
	/// blocking call woken by signal.
	EINTR = 4,
	/// waitpid found no matching child.
	ECHILD = 10,
	/// tkill target unknown.
	ESRCH = 3,
	/// no handler registered for this syscall id.
	ENOSYS = 38,
}

impl fmt::Display for Errno {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Self::EBADF => "bad file descriptor",
			Self::EFAULT => "bad address",
			Self::EMFILE => "too many open files",
			Self::EACCES => "permission denied",
			Self::ENOENT => "no such file or directory",
			Self::EISDIR => "is a directory",
			Self::EINVAL => "invalid argument",
			Self::ESPIPE => "illegal seek",
			Self::EBUSY => "device or resource busy",
			Self::EIO => "I/O error",
			Self::ENOMEM => "out of memory",
			Self::ENOEXEC => "exec format error",
			Self::EINTR => "interrupted system call",
			Self::ECHILD => "no child processes",
			Self::ESRCH => "no such process",
			Self::ENOSYS => "function not implemented",
		};
		f.write_str(s)
	}
}

impl Errno {
	/// Returns the value to be returned by a syscall handler on failure:
	/// the negated errno.
	pub const fn as_retval(self) -> isize {
		-(self as isize)
	}
}

/// Result alias used at every fallible kernel boundary.
pub type EResult<T> = Result<T, Errno>;

/// Builds an `Err(Errno::X)` value. Mirrors the teacher's `errno!(EFOO)`
/// usage throughout `vfs.rs`, `mutex.rs` and the syscall handlers.
#[macro_export]
macro_rules! errno {
	($variant:ident) => {
		$crate::errno::Errno::$variant
	};
}
