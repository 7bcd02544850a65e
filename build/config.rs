/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! Reads `Config.toml` and turns its `[debug]` section into `cargo:rustc-cfg`
//! lines, the way the kernel reads compile-time options.

use serde::Deserialize;
use std::{fs, io};

/// The `[debug]` section of `Config.toml`.
#[derive(Deserialize, Default)]
struct ConfigDebug {
	/// Exits QEMU through the `isa-debug-exit` device after selftests
	/// instead of halting (`selftest::qemu`).
	#[serde(default)]
	qemu: bool,
	/// Runs the destructive storage self-test against whatever AHCI disk
	/// is attached. Overwrites data on that disk.
	#[serde(default)]
	storage_test: bool,
	/// Places a magic number in heap chunk headers/footers and checks it
	/// on every free/realloc (`memory::malloc::chunk`).
	#[serde(default)]
	malloc_check: bool,
}

/// The compile-time configuration.
#[derive(Deserialize, Default)]
pub struct Config {
	#[serde(default)]
	debug: ConfigDebug,
}

impl Config {
	/// Reads `Config.toml`, falling back to `default.Config.toml` if the
	/// former is absent so a fresh checkout still builds.
	pub fn read() -> io::Result<Self> {
		const FILE: &str = "Config.toml";
		const FILE_DEFAULT: &str = "default.Config.toml";

		println!("cargo:rerun-if-changed={FILE}");
		println!("cargo:rerun-if-changed={FILE_DEFAULT}");

		let contents = match fs::read_to_string(FILE) {
			Ok(s) => s,
			Err(e) if e.kind() == io::ErrorKind::NotFound => fs::read_to_string(FILE_DEFAULT)?,
			Err(e) => return Err(e),
		};
		toml::from_str(&contents).map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
	}

	/// Emits the `cargo:rustc-cfg` lines this configuration implies.
	pub fn set_cfg(&self, debug_profile: bool) {
		if self.debug.qemu {
			println!("cargo:rustc-cfg=config_debug_qemu");
		}
		if debug_profile && self.debug.storage_test {
			println!("cargo:rustc-cfg=config_debug_storage_test");
		}
		if self.debug.malloc_check {
			println!("cargo:rustc-cfg=config_debug_malloc_check");
		}
	}
}
