//! This module exists only to import symbols from the kernel, which is
//! compiled as a separate library crate so that it can also be linked into
//! host-side unit tests.

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(kernel::selftest::runner)]

extern crate kernel;
