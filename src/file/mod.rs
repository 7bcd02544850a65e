/*
 * Copyright 2026 Talon Contributors
 *
 * This file is part of Talon.
 */

//! The VFS: node graph, bind mounts, inodes, open files and fd tables
//! (spec.md §3, §4.10).

pub mod fd;
pub mod inode;
pub mod ramfs;
pub mod superblock;
pub mod vfs;

pub use fd::{FdTable, OpenFile};
