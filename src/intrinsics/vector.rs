// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Vector primitives.

use crate::cell::{Cell, NIL, Tag};
use crate::error::Result;
use crate::interp::Interp;

impl Interp {
    /// `(mkvec k x)`: a vector of `k` copies of the fill value.
    pub(crate) fn b_mkvec(&mut self, x: Cell, a: Cell) -> Result<Cell> {
        if !self.is_fix(x) {
            return Err(self.expect("mkvec", "fixnum", x));
        }
        let k = self.fixval(x);
        if k < 0 {
            return Err(self.error("mkvec: bad size", x));
        }
        let n = self.mkvec(k as usize)?;
        for i in 0..k as usize {
            self.vec_set(n, i, a);
        }
        Ok(n)
    }

    /// `(vconc …)`: concatenate a list of vectors.
    pub(crate) fn vconc(&mut self, x: Cell) -> Result<Cell> {
        let mut k = 0;
        let mut p = x;
        while p != NIL {
            if !self.is_vector(self.car(p)) {
                return Err(self.expect("vconc", "vector", self.car(p)));
            }
            k += self.veclen(self.car(p));
            p = self.cdr(p);
        }
        let n = self.mkvec(k)?;
        let mut k = 0;
        let mut p = x;
        while p != NIL {
            let v = self.car(p);
            let m = self.veclen(v);
            for i in 0..m {
                let e = self.vec_ref(v, i);
                self.vec_set(n, k + i, e);
            }
            k += m;
            p = self.cdr(p);
        }
        Ok(n)
    }

    pub(crate) fn vref(&mut self, x: Cell, n: Cell) -> Result<Cell> {
        if !self.is_vector(x) {
            return Err(self.expect("vref", "vector", x));
        }
        if !self.is_fix(n) {
            return Err(self.expect("vref", "fixnum", n));
        }
        let i = self.fixval(n);
        if i < 0 || i as usize >= self.veclen(x) {
            return Err(self.error("vref: index out of range", n));
        }
        Ok(self.vec_ref(x, i as usize))
    }

    pub(crate) fn vfill(&mut self, x: Cell, a: Cell) -> Result<()> {
        if !self.is_vector(x) {
            return Err(self.expect("vfill", "vector", x));
        }
        if self.is_const(x) {
            return Err(self.error("vfill: immutable", x));
        }
        let k = self.veclen(x);
        for i in 0..k {
            self.vec_set(x, i, a);
        }
        Ok(())
    }

    pub(crate) fn vset(&mut self, v: Cell, n: Cell, r: Cell) -> Result<()> {
        if !self.is_vector(v) {
            return Err(self.expect("vset", "vector", v));
        }
        if self.is_const(v) {
            return Err(self.error("vset: immutable", v));
        }
        if !self.is_fix(n) {
            return Err(self.expect("vset", "fixnum", n));
        }
        let i = self.fixval(n);
        if i < 0 || i as usize >= self.veclen(v) {
            return Err(self.error("vset: index out of range", n));
        }
        self.vec_set(v, i as usize, r);
        Ok(())
    }

    pub(crate) fn subvec(&mut self, v: Cell, n0: Cell, n1: Cell) -> Result<Cell> {
        if !self.is_vector(v) {
            return Err(self.expect("subvec", "vector", v));
        }
        if !self.is_fix(n0) {
            return Err(self.expect("subvec", "fixnum", n0));
        }
        if !self.is_fix(n1) {
            return Err(self.expect("subvec", "fixnum", n1));
        }
        let k0 = self.fixval(n0);
        let k1 = self.fixval(n1);
        if k0 < 0 || k1 < 0 || k0 > k1 || k1 as usize > self.veclen(v) {
            let inner = self.cons(n1, NIL)?;
            let obj = self.cons(n0, inner)?;
            return Err(self.error("subvec: invalid range", obj));
        }
        let n = self.mkvec((k1 - k0) as usize)?;
        for (j, i) in (k0 as usize..k1 as usize).enumerate() {
            let e = self.vec_ref(v, i);
            self.vec_set(n, j, e);
        }
        Ok(n)
    }

    /// Build a vector from a list; vector literals come out
    /// immutable.
    pub(crate) fn listvec(&mut self, x: Cell, veclit: bool) -> Result<Cell> {
        let msg = if veclit {
            "vector literal contains a dot"
        } else {
            "listvec: dotted list"
        };
        let mut k = 0;
        let mut n = x;
        while n != NIL {
            if self.is_atom(n) {
                return Err(self.error(msg, x));
            }
            k += 1;
            n = self.cdr(n);
        }
        if k == 0 {
            return Ok(self.nullvec);
        }
        let v = self.mkvec(k)?;
        if veclit {
            self.tags[v as usize].insert(Tag::CONST);
        }
        let mut n = x;
        let mut i = 0;
        while n != NIL {
            let e = self.car(n);
            self.vec_set(v, i, e);
            i += 1;
            n = self.cdr(n);
        }
        Ok(v)
    }

    /// The elements of a vector as a list.
    pub(crate) fn veclist(&mut self, x: Cell) -> Result<Cell> {
        let k = self.veclen(x);
        if k == 0 {
            return Ok(NIL);
        }
        let head = self.cons(NIL, NIL)?;
        self.protect(head)?;
        let mut a = head;
        for i in 0..k {
            let e = self.vec_ref(x, i);
            self.set_car(a, e);
            if i < k - 1 {
                let new = self.cons(NIL, NIL)?;
                self.set_cdr(a, new);
                a = new;
            }
        }
        self.unprot(1)
    }
}
