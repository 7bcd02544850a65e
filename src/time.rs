/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! Monotonic time: the PIT (Programmable Interval Timer) driving IRQ0, and
//! the nanosecond counter it advances (spec.md §4.5's `now_ns`, used by the
//! sleep queue and the scheduler's minimum-delta preemption check).
//!
//! Grounded on the teacher's `pit` module (port numbers, command byte
//! layout, `BASE_FREQUENCY`) with the frequency fixed at [`TICK_HZ`] rather
//! than left caller-configurable, since this kernel only ever needs one
//! fixed scheduling tick.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::io;

const CHANNEL_0: u16 = 0x40;
const COMMAND: u16 = 0x43;

const SELECT_CHANNEL_0: u8 = 0b00 << 6;
const ACCESS_LOBYTE_HIBYTE: u8 = 0b11 << 4;
/// Square wave generator, matching the teacher's `pit::MODE_3`.
const MODE_3: u8 = 0b011 << 1;

/// The PIT's own oscillator frequency; every divider is computed against it.
const BASE_FREQUENCY: u32 = 1_193_182;

/// The scheduling tick rate. 1000 Hz gives millisecond scheduling
/// resolution, matching spec.md §4.5's nanosleep granularity.
const TICK_HZ: u32 = 1000;
const NANOS_PER_TICK: u64 = 1_000_000_000 / TICK_HZ as u64;

static NOW_NS: AtomicU64 = AtomicU64::new(0);

/// Programs the PIT to fire IRQ0 at [`TICK_HZ`] and resets the monotonic
/// counter. Called once from `kernel_main`, before the scheduler's run
/// queue can hold anything.
pub fn init() {
	let divider = (BASE_FREQUENCY / TICK_HZ).min(0xffff) as u16;
	unsafe {
		io::outb(COMMAND, SELECT_CHANNEL_0 | ACCESS_LOBYTE_HIBYTE | MODE_3);
		io::outb(CHANNEL_0, (divider & 0xff) as u8);
		io::outb(CHANNEL_0, ((divider >> 8) & 0xff) as u8);
	}
	NOW_NS.store(0, Ordering::Relaxed);
	crate::log_info!("time: PIT programmed for {} Hz", TICK_HZ);
}

/// The current monotonic time since [`init`], in nanoseconds.
pub fn now_ns() -> u64 {
	NOW_NS.load(Ordering::Relaxed)
}

/// Advances the monotonic clock by one tick. Called only by the IRQ0
/// handler, once per timer interrupt, before it hands off to the
/// scheduler.
pub(crate) fn on_tick() -> u64 {
	NOW_NS.fetch_add(NANOS_PER_TICK, Ordering::Relaxed) + NANOS_PER_TICK
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn on_tick_advances_by_one_period() {
		NOW_NS.store(0, Ordering::Relaxed);
		let a = on_tick();
		let b = on_tick();
		assert_eq!(a, NANOS_PER_TICK);
		assert_eq!(b, 2 * NANOS_PER_TICK);
	}
}
