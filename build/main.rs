//! Build script: reads `Config.toml` and turns its debug flags into
//! `cargo:rustc-cfg` lines consumed by `selftest`, `memory::malloc` and
//! `device::storage`.
//!
//! Unlike the boot loader and the low-level entry stub — both external
//! collaborators this crate is built against but does not itself compile —
//! Talon has no C or assembly sources of its own, so this script's only job
//! is configuration, not compilation.

mod config;

use config::Config;
use std::{env, process::exit};

fn main() {
	let profile = env::var("PROFILE").unwrap_or_else(|_| "debug".into());
	let debug = profile == "debug";

	let config = Config::read().unwrap_or_else(|e| {
		eprintln!("failed to read build configuration: {e}");
		exit(1);
	});
	config.set_cfg(debug);
}
