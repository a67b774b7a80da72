// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # Sylva
//!
//! A small Lisp system: reader, closure-converting bytecode compiler
//! and stack virtual machine on a two-pool garbage-collected heap.
//!
//! This crate provides:
//! - Tagged cell pool and relocatable vector arena with
//!   mark-and-sweep / mark-and-compact collection
//! - S-expression reader and printer over a process port table
//! - Macro expander that reenters the VM for user-defined rewriters
//! - Closure conversion and single-pass bytecode generation
//! - Accumulator/stack VM with tail calls and first-class catch tags
//! - Heap image save/restore and an interactive REPL
//!
//! All interpreter state lives in a single [`interp::Interp`] value;
//! there are no process-wide mutable statics.

pub mod bytecode;
pub mod cell;
pub mod compiler;
pub mod error;
pub mod expander;
pub mod heap;
pub mod image;
pub mod interp;
pub mod intrinsics;
pub mod ports;
pub mod reader;
pub mod repl;
pub mod symtab;
pub mod value;
pub mod vm;

pub use error::{Error, Result};
pub use interp::Interp;

/// Crate version, also embedded in heap images.
pub const VERSION: &str = "20260801";

/// Default heap image file.
pub const IMAGEFILE: &str = "sylva.image";

/// Default library source file.
pub const IMAGESRC: &str = "sylva.syl";

/// Cells in the node pool.
pub const NNODES: usize = 262144;

/// Words in the vector arena.
pub const NVCELLS: usize = 262144;

/// Entries in the port table.
pub const NPORTS: usize = 20;

/// Longest token (symbol, string, character name) the reader accepts.
pub const TOKLEN: usize = 80;

/// Growth increment for stacks, buffers and tables.
pub const CHUNKSIZE: usize = 1024;

/// Macro expansion depth limit.
pub const MXMAX: i32 = 2000;

/// Length of the global-reference trace ring.
pub const NTRACE: usize = 10;

/// Printer nesting limit.
pub const PRDEPTH: i32 = 1024;
