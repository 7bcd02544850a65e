/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! Synchronization primitives.
//!
//! [`spinlock`] busy-waits and is safe to use anywhere, including with
//! interrupts disabled and before the scheduler exists. [`mutex`],
//! [`condvar`] and [`semaphore`] put the current process to sleep instead of
//! spinning and therefore require the scheduler (spec.md §4.4) to already be
//! running.

pub mod condvar;
pub mod mutex;
pub mod semaphore;
pub mod spinlock;
