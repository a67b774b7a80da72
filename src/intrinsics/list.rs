// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Variadic list concatenation.
//!
//! Both primitives take the list of argument lists the compiler
//! assembles on the stack. `conc` copies every list but the last;
//! `nconc` splices them destructively.

use crate::cell::{Cell, NIL};
use crate::error::Result;
use crate::interp::Interp;

impl Interp {
    /// `(conc …)`: append, copying all but the last list.
    pub(crate) fn lconc(&mut self, x: Cell) -> Result<Cell> {
        if self.cdr(x) == NIL {
            return Ok(self.car(x));
        }
        let head = self.cons(NIL, NIL)?;
        self.protect(head)?;
        let mut n = head;
        let mut k = 0;
        let mut p = x;
        while self.cdr(p) != NIL {
            if self.car(p) == NIL {
                p = self.cdr(p);
                continue;
            }
            let mut q = self.car(p);
            while q != NIL {
                if !self.is_pair(q) {
                    return Err(self.expect("conc", "list", self.car(p)));
                }
                if k != 0 {
                    let m = self.cons(NIL, NIL)?;
                    self.set_cdr(n, m);
                    n = m;
                }
                let e = self.car(q);
                self.set_car(n, e);
                k += 1;
                q = self.cdr(q);
            }
            p = self.cdr(p);
        }
        let m = self.unprot(1)?;
        if k == 0 {
            return Ok(self.car(p));
        }
        let last = self.car(p);
        self.set_cdr(n, last);
        Ok(m)
    }

    /// `(nconc …)`: append destructively.
    pub(crate) fn nlconc(&mut self, x: Cell) -> Result<Cell> {
        let mut x = x;
        while self.is_pair(self.cdr(x)) && self.car(x) == NIL {
            x = self.cdr(x);
        }
        if self.cdr(x) == NIL {
            return Ok(self.car(x));
        }
        let mut p = x;
        while self.cdr(p) != NIL {
            if self.car(p) == NIL {
                p = self.cdr(p);
                continue;
            }
            if self.is_const(self.car(p)) {
                return Err(self.error("nconc: immutable", self.car(p)));
            }
            let mut q = self.car(p);
            while self.cdr(q) != NIL {
                if !self.is_pair(q) {
                    return Err(self.expect("nconc", "list", self.car(p)));
                }
                q = self.cdr(q);
            }
            while self.is_pair(self.cdr(p)) && self.cadr(p) == NIL {
                p = self.cdr(p);
            }
            if self.cdr(p) == NIL {
                break;
            }
            let t = self.cadr(p);
            self.set_cdr(q, t);
            p = self.cdr(p);
        }
        Ok(self.car(x))
    }
}
