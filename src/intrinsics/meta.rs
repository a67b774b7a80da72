// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Reflection and process primitives.

use crate::cell::{Cell, NIL, Tag, specialp};
use crate::error::Result;
use crate::interp::Interp;
use crate::NVCELLS;

impl Interp {
    /// `(gc)`: force a full collection; returns
    /// `(free-nodes free-words)`.
    pub(crate) fn b_gc(&mut self) -> Result<Cell> {
        self.gcv();
        let w = self.mkfix((NVCELLS - self.freevec) as i32)?;
        let n = self.cons(w, NIL)?;
        self.protect(n)?;
        let free = self.length(self.freelist);
        let f = self.mkfix(free)?;
        let rest = self.unprot(1)?;
        self.cons(f, rest)
    }

    /// `(gensym)`: a fresh uninterned symbol.
    pub(crate) fn gensym(&mut self) -> Result<Cell> {
        self.gensym_id += 1;
        let name = format!("G{}", self.gensym_id);
        self.mksym(name.as_bytes())
    }

    /// `(untag x)`: strip one representation layer: the payload of an
    /// atom, the bytecode of a closure, NIL for vectors.
    pub(crate) fn untag(&self, x: Cell) -> Cell {
        if specialp(x) {
            return x;
        }
        if self.tagof(x).contains(Tag::VECTOR) {
            return NIL;
        }
        if self.is_closure(x) {
            return self.cdr(self.cadddr(x));
        }
        self.cdr(x)
    }

    /// `(syscmd s)`: run a shell command, returning its exit status.
    pub(crate) fn syscmd(&mut self, x: Cell) -> Result<Cell> {
        let cmd = String::from_utf8_lossy(&self.string_copy(x)).into_owned();
        let status = std::process::Command::new("sh")
            .arg("-c")
            .arg(&cmd)
            .status();
        let code = match status {
            Ok(s) => s.code().unwrap_or(-1),
            Err(_) => -1,
        };
        self.mkfix(code)
    }
}
