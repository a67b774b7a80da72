// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! String primitives.
//!
//! Strings are byte vectors with a trailing NUL; comparisons are
//! byte-wise with case-insensitive variants, and all index arguments
//! are range-checked against the logical length.

use core::cmp::Ordering;

use crate::cell::{Cell, NIL, Tag};
use crate::error::Result;
use crate::interp::Interp;
use crate::value::printer::ntoa;

impl Interp {
    /// Compare two strings, byte-wise or case-folded. Strings of
    /// different lengths compare through their common prefix and the
    /// terminator, so a proper prefix sorts first.
    pub(crate) fn scomp(&self, x: Cell, y: Cell, ci: bool) -> Ordering {
        let kx = self.string_len(x);
        let ky = self.string_len(y);
        let k = if kx == ky { kx } else { 1 + kx.min(ky) };
        let bx = &self.string_bytes(x)[..k.min(kx)];
        let by = &self.string_bytes(y)[..k.min(ky)];
        if ci {
            let fold = |b: &[u8]| b.iter().map(u8::to_ascii_lowercase).collect::<Vec<u8>>();
            fold(bx).cmp(&fold(by))
        } else {
            bx.cmp(by)
        }
    }

    /// `(mkstr k c)`: a string of `k` copies of the fill character.
    pub(crate) fn b_mkstr(&mut self, x: Cell, a: Cell) -> Result<Cell> {
        if !self.is_fix(x) {
            return Err(self.expect("mkstr", "fixnum", x));
        }
        if !self.is_char(a) {
            return Err(self.expect("mkstr", "char", a));
        }
        let k = self.fixval(x);
        if k < 0 {
            return Err(self.error("mkstr: bad size", x));
        }
        let c = self.charval(a) as u8;
        let bytes = vec![c; k as usize];
        self.mkstr(&bytes)
    }

    /// `(sconc …)`: concatenate a list of strings.
    pub(crate) fn sconc(&mut self, x: Cell) -> Result<Cell> {
        let mut p = x;
        let mut bytes = Vec::new();
        while p != NIL {
            if !self.is_string(self.car(p)) {
                return Err(self.expect("sconc", "string", self.car(p)));
            }
            bytes.extend_from_slice(&self.string_copy(self.car(p)));
            p = self.cdr(p);
        }
        self.mkstr(&bytes)
    }

    pub(crate) fn sref(&mut self, s: Cell, n: Cell) -> Result<Cell> {
        if !self.is_string(s) {
            return Err(self.expect("sref", "string", s));
        }
        if !self.is_fix(n) {
            return Err(self.expect("sref", "fixnum", n));
        }
        let i = self.fixval(n);
        if i < 0 || i as usize >= self.string_len(s) - 1 {
            return Err(self.error("sref: index out of range", n));
        }
        self.mkchar(i32::from(self.string_byte(s, i as usize)))
    }

    pub(crate) fn sset(&mut self, s: Cell, n: Cell, r: Cell) -> Result<()> {
        if !self.is_string(s) {
            return Err(self.expect("sset", "string", s));
        }
        if self.is_const(s) {
            return Err(self.error("sset: immutable", s));
        }
        if !self.is_fix(n) {
            return Err(self.expect("sset", "fixnum", n));
        }
        if !self.is_char(r) {
            return Err(self.expect("sset", "char", r));
        }
        let i = self.fixval(n);
        if i < 0 || i as usize >= self.string_len(s) - 1 {
            return Err(self.error("sset: index out of range", n));
        }
        let c = self.charval(r) as u8;
        self.set_string_byte(s, i as usize, c);
        Ok(())
    }

    pub(crate) fn substr(&mut self, s: Cell, n0: Cell, n1: Cell) -> Result<Cell> {
        if !self.is_string(s) {
            return Err(self.expect("substr", "string", s));
        }
        if !self.is_fix(n0) {
            return Err(self.expect("substr", "fixnum", n0));
        }
        if !self.is_fix(n1) {
            return Err(self.expect("substr", "fixnum", n1));
        }
        let k0 = self.fixval(n0);
        let k1 = self.fixval(n1);
        if k0 < 0 || k1 < 0 || k0 > k1 || k1 as usize >= self.string_len(s) {
            let inner = self.cons(n1, NIL)?;
            let obj = self.cons(n0, inner)?;
            return Err(self.error("substr: invalid range", obj));
        }
        let bytes = self.string_bytes(s)[k0 as usize..k1 as usize].to_vec();
        self.mkstr(&bytes)
    }

    pub(crate) fn sfill(&mut self, x: Cell, a: Cell) -> Result<()> {
        if !self.is_string(x) {
            return Err(self.expect("sfill", "string", x));
        }
        if self.is_const(x) {
            return Err(self.error("sfill: immutable", x));
        }
        if !self.is_char(a) {
            return Err(self.expect("sfill", "char", a));
        }
        let c = self.charval(a) as u8;
        let k = self.string_len(x) - 1;
        for i in 0..k {
            self.set_string_byte(x, i, c);
        }
        Ok(())
    }

    /// `(liststr chars)`: a string from a list of characters.
    pub(crate) fn liststr(&mut self, x: Cell) -> Result<Cell> {
        let mut bytes = Vec::new();
        let mut n = x;
        while n != NIL {
            if self.is_atom(n) {
                return Err(self.error("liststr: dotted list", x));
            }
            if !self.is_char(self.car(n)) {
                return Err(self.expect("liststr", "char", self.car(n)));
            }
            bytes.push(self.charval(self.car(n)) as u8);
            n = self.cdr(n);
        }
        self.mkstr(&bytes)
    }

    /// `(strlist s)`: the characters of a string as a list.
    pub(crate) fn strlist(&mut self, x: Cell) -> Result<Cell> {
        let k = self.string_len(x) - 1;
        if k == 0 {
            return Ok(NIL);
        }
        let head = self.cons(NIL, NIL)?;
        self.protect(head)?;
        let mut a = head;
        for i in 0..k {
            let new = self.mkchar(i32::from(self.string_byte(x, i)))?;
            self.set_car(a, new);
            if i < k - 1 {
                let new = self.cons(NIL, NIL)?;
                self.set_cdr(a, new);
                a = new;
            }
        }
        self.unprot(1)
    }

    /// `(numstr n r)`: render a fixnum in radix `r`.
    pub(crate) fn numstr(&mut self, x: Cell, r: i32) -> Result<Cell> {
        if !(2..=36).contains(&r) {
            let obj = self.mkfix(r)?;
            return Err(self.error("numstr: bad radix", obj));
        }
        let s = ntoa(self.fixval(x), r);
        self.mkstr(s.as_bytes())
    }

    /// `(strnum s r)`: parse a fixnum in radix `r`; NIL when the
    /// string is not a number.
    pub(crate) fn strnum(&mut self, s: Cell, r: i32) -> Result<Cell> {
        if !(2..=36).contains(&r) {
            let obj = self.mkfix(r)?;
            return Err(self.error("strnum: bad radix", obj));
        }
        let bytes = self.string_copy(s);
        self.scanfix(&bytes, r, false)
    }

    /// `(symname y)`: the print name of a symbol, as an immutable
    /// string.
    pub(crate) fn b_symname(&mut self, x: Cell) -> Result<Cell> {
        let bytes = self.sym_copy(x);
        let n = self.mkstr(&bytes)?;
        if n != self.nullstr {
            self.tags[n as usize].insert(Tag::CONST);
        }
        Ok(n)
    }

    /// `(symbol s)`: the interned symbol with the string's name.
    pub(crate) fn b_symbol(&mut self, x: Cell) -> Result<Cell> {
        let bytes = self.string_copy(x);
        let y = self.findsym(&bytes)?;
        if y != NIL {
            return Ok(y);
        }
        let n = self.mksym(&bytes)?;
        self.intern(n)
    }
}
