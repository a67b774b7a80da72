// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Interpreter errors.
//!
//! Every recoverable fault is an [`Error`] value and propagates with
//! `?` up to the VM instruction boundary (where an installed Lisp
//! handler may catch it) or to the REPL restart point. Fatal faults
//! (bootstrap allocation, image mismatch) terminate the process.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;

/// Interpreter error.
#[derive(Debug, Error)]
pub enum Error {
    /// A recoverable Lisp-level error: bad types, bad ranges, bad
    /// syntax, resource exhaustion. `detail` is the offending object,
    /// already rendered (the object itself may be reclaimed while the
    /// error unwinds).
    #[error("{msg}")]
    Lisp {
        /// Error message, e.g. `"car: expected pair"`.
        msg: String,
        /// Rendered offending object, if one was given.
        detail: Option<String>,
    },

    /// An unrecoverable host-level fault.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl Error {
    /// True for errors the REPL can recover from.
    #[must_use]
    pub const fn recoverable(&self) -> bool {
        matches!(self, Self::Lisp { .. })
    }
}
