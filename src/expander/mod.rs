// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Macro expander.
//!
//! Walks a form top-down: `defun`/`defmac` sugar becomes `def`/`macro`
//! over a lambda (nested `def`s hoisted into a `labels` binding), and
//! a call whose head is in the macro table is rewritten by applying
//! the registered closure. That application reenters the evaluator,
//! so the VM registers are saved and restored around the nested run.

#[cfg(test)]
mod expander_test;

use crate::MXMAX;
use crate::cell::{Cell, NIL, UNDEF};
use crate::error::Result;
use crate::interp::Interp;

impl Interp {
    /// Register `f` as the expander for the symbol with id `id`.
    pub(crate) fn newmacro(&mut self, id: usize, f: Cell) -> Result<()> {
        if !self.is_closure(f) {
            return Err(self.expect("macro", "closure", f));
        }
        let name = self.vec_ref(self.symbols, id);
        let n = self.assq(name, self.macros);
        if n == NIL {
            let n = self.cons(name, f)?;
            self.macros = self.cons(n, self.macros)?;
        } else {
            self.set_cdr(n, f);
        }
        Ok(())
    }

    /// Expand every element of a list.
    fn mapexp(&mut self, x: Cell, r: bool) -> Result<Cell> {
        self.protect(x)?;
        self.protect(NIL)?;
        let mut n = NIL;
        let mut p = x;
        while self.is_pair(p) {
            let new = self.expand(self.car(p), r)?;
            n = self.cons(new, n)?;
            self.protected_set0(n);
            p = self.cdr(p);
        }
        if p != NIL {
            return Err(self.error("dotted list in program", x));
        }
        let n = self.unprot(1)?;
        let n = self.nreverse(n)?;
        self.unprot(1)?;
        Ok(n)
    }

    /// Pair up two lists.
    fn zip(&mut self, a: Cell, b: Cell) -> Result<Cell> {
        self.protect(NIL)?;
        let mut n = NIL;
        let mut a = a;
        let mut b = b;
        while a != NIL && b != NIL {
            let p = self.cons(self.car(a), self.car(b))?;
            n = self.cons(p, n)?;
            self.protected_set0(n);
            a = self.cdr(a);
            b = self.cdr(b);
        }
        let n = self.unprot(1)?;
        self.nreverse(n)
    }

    /// Hoist leading `def`/`defun` forms of a body into one `labels`
    /// binding so local definitions may be mutually recursive.
    fn expandbody(&mut self, x: Cell) -> Result<Cell> {
        self.protect(NIL)?; // vs
        self.protect(NIL)?; // as
        let mut vs = NIL;
        let mut asl = NIL;
        let mut x = x;
        while self.is_pair(x)
            && self.is_pair(self.car(x))
            && (self.caar(x) == self.syms.def || self.caar(x) == self.syms.defun)
        {
            if self.caar(x) == self.syms.def {
                let n = self.car(x);
                vs = self.cons(self.cadr(n), vs)?;
                self.protected_set1(vs);
                let n = self.cons(self.caddr(n), NIL)?;
                asl = self.cons(n, asl)?;
                self.protected_set0(asl);
            } else {
                let n = self.expanddef(self.car(x))?;
                self.protect(n)?;
                vs = self.cons(self.cadr(n), vs)?;
                self.protected_set2(vs);
                let n2 = self.cons(self.caddr(n), NIL)?;
                asl = self.cons(n2, asl)?;
                self.protected_set1(asl);
                self.unprot(1)?;
            }
            x = self.cdr(x);
        }
        if vs == NIL {
            self.unprot(2)?;
            return Ok(x);
        }
        asl = self.nreverse(asl)?;
        self.protected_set0(asl);
        vs = self.nreverse(vs)?;
        self.protected_set1(vs);
        let bind = self.zip(vs, asl)?;
        let n = self.cons(bind, x)?;
        let lb = self.syms.labels;
        let n = self.cons(lb, n)?;
        let n = self.cons(n, NIL)?;
        self.unprot(2)?;
        Ok(n)
    }

    /// Rewrite `(defun (name . formals) body…)` into
    /// `(def name (lambda formals body…))`; `defmac` likewise into
    /// `macro`.
    fn expanddef(&mut self, x: Cell) -> Result<Cell> {
        if !self.is_pair(self.cadr(x)) {
            let name = String::from_utf8_lossy(&self.sym_copy(self.car(x))).into_owned();
            return Err(self.error(&format!("{name}: expected signature"), self.cadr(x)));
        }
        let body = self.expandbody(self.cddr(x))?;
        let n = self.cons(self.cdadr(x), body)?;
        let lam = self.syms.lambda;
        let n = self.cons(lam, n)?;
        let n = self.cons(n, NIL)?;
        let n = self.cons(self.caadr(x), n)?;
        let head = if self.car(x) == self.syms.defun {
            self.syms.def
        } else {
            self.syms.macro_
        };
        self.cons(head, n)
    }

    /// Expand one form; with `r`, macro output is re-expanded until
    /// it is macro-free.
    pub(crate) fn expand(&mut self, x: Cell, r: bool) -> Result<Cell> {
        if self.mxlev < 0 || self.interrupted() {
            return Err(self.error("interrupted", UNDEF));
        }
        if self.mxlev > MXMAX {
            return Err(self.error("too many levels of macro expansion", UNDEF));
        }
        if self.is_atom(x) {
            return Ok(x);
        }
        if self.car(x) == self.syms.quote {
            return Ok(x);
        }
        self.mxlev += 1;
        if self.car(x) == self.syms.lambda {
            self.protect(x)?;
            let n = self.mapexp(self.cddr(x), r)?;
            let n = self.cons(self.cadr(x), n)?;
            let n = self.cons(self.car(x), n)?;
            self.unprot(1)?;
            self.mxlev -= 1;
            return Ok(n);
        }
        if self.car(x) == self.syms.defun || self.car(x) == self.syms.defmac {
            self.protect(x)?;
            let mut x = self.expanddef(x)?;
            self.protected_set0(x);
            x = self.expand(x, r)?;
            self.unprot(1)?;
            self.mxlev -= 1;
            return Ok(x);
        }
        let m = if self.is_symbol(self.car(x)) {
            self.assq(self.car(x), self.macros)
        } else {
            NIL
        };
        if m != NIL {
            self.protect(x)?;
            let n = self.cons(self.cdr(x), NIL)?;
            let q = self.syms.quote;
            let n = self.cons(q, n)?;
            let n = self.cons(n, NIL)?;
            let n = self.cons(self.cdr(m), n)?;
            let ap = self.syms.apply;
            let n = self.cons(ap, n)?;
            let mut x = self.eval(n, true)?;
            self.protected_set0(x);
            if r {
                x = self.expand(x, r)?;
            }
            self.unprot(1)?;
            self.mxlev -= 1;
            return Ok(x);
        }
        let x = self.mapexp(x, r)?;
        self.mxlev -= 1;
        Ok(x)
    }
}
