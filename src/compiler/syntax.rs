// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Syntax checker.
//!
//! Validates arity and shape of the special forms after macro
//! expansion and before closure conversion. Dotted lists are rejected
//! everywhere in program position except lambda formals.

use crate::cell::{Cell, NIL};
use crate::error::Result;
use crate::interp::Interp;

impl Interp {
    /// Check the argument count of a special or primitive form;
    /// `max < 0` means unbounded.
    pub(crate) fn ckargs(&mut self, x: Cell, min: i32, max: i32) -> Result<()> {
        let k = self.length(x) - 1;
        if k < min || (k > max && max >= 0) {
            let name = String::from_utf8_lossy(&self.sym_copy(self.car(x))).into_owned();
            return Err(self.error(&format!("{name}: wrong number of arguments"), x));
        }
        Ok(())
    }

    fn ckseq(&mut self, mut x: Cell, top: bool) -> Result<()> {
        while self.is_pair(x) {
            self.syncheck(self.car(x), top)?;
            x = self.cdr(x);
        }
        Ok(())
    }

    fn ckapply(&mut self, x: Cell) -> Result<()> {
        self.ckargs(x, 2, -1)
    }

    fn ckdef(&mut self, x: Cell, top: bool) -> Result<()> {
        self.ckargs(x, 2, 2)?;
        if !self.is_symbol(self.cadr(x)) {
            return Err(self.error("def: expected symbol", self.cadr(x)));
        }
        if !top {
            return Err(self.error("def: must be at top level", x));
        }
        self.syncheck(self.caddr(x), false)
    }

    fn ckif(&mut self, x: Cell) -> Result<()> {
        self.ckargs(x, 2, 3)?;
        self.ckseq(self.cdr(x), false)
    }

    fn ckifstar(&mut self, x: Cell) -> Result<()> {
        self.ckargs(x, 2, 2)?;
        self.ckseq(self.cdr(x), false)
    }

    /// True for a (possibly dotted) list of symbols.
    fn symlistp(&self, x: Cell) -> bool {
        let mut p = x;
        while self.is_pair(p) {
            if !self.is_symbol(self.car(p)) {
                return false;
            }
            p = self.cdr(p);
        }
        self.is_symbol(p) || p == NIL
    }

    fn uniqlistp(&self, mut x: Cell) -> bool {
        if x == NIL {
            return true;
        }
        while self.cdr(x) != NIL {
            if self.memq(self.car(x), self.cdr(x)) != NIL {
                return false;
            }
            x = self.cdr(x);
        }
        true
    }

    /// Flatten a (possibly dotted) formals list into a proper list.
    pub(crate) fn flatargs(&mut self, mut a: Cell) -> Result<Cell> {
        self.protect(NIL)?;
        let mut n = NIL;
        while self.is_pair(a) {
            n = self.cons(self.car(a), n)?;
            self.protected_set0(n);
            a = self.cdr(a);
        }
        if a != NIL {
            n = self.cons(a, n)?;
        }
        self.unprot(1)?;
        self.nreverse(n)
    }

    fn cklambda(&mut self, x: Cell) -> Result<()> {
        self.ckargs(x, 2, -1)?;
        if !self.symlistp(self.cadr(x)) {
            return Err(self.error("lambda: invalid formals", self.cadr(x)));
        }
        let fa = self.flatargs(self.cadr(x))?;
        if !self.uniqlistp(fa) {
            return Err(self.error("lambda: duplicate formal", self.cadr(x)));
        }
        self.ckseq(self.cddr(x), false)
    }

    fn ckmacro(&mut self, x: Cell, top: bool) -> Result<()> {
        self.ckargs(x, 2, 2)?;
        if !self.is_symbol(self.cadr(x)) {
            return Err(self.error("macro: expected symbol", self.cadr(x)));
        }
        if !top {
            return Err(self.error("macro: must be at top level", x));
        }
        self.syncheck(self.caddr(x), false)
    }

    fn ckquote(&mut self, x: Cell) -> Result<()> {
        self.ckargs(x, 1, 1)
    }

    fn cksetq(&mut self, x: Cell) -> Result<()> {
        self.ckargs(x, 2, 2)?;
        if !self.is_symbol(self.cadr(x)) {
            return Err(self.error("setq: expected symbol", self.cadr(x)));
        }
        self.ckseq(self.cddr(x), false)
    }

    /// Validate one form.
    pub(crate) fn syncheck(&mut self, x: Cell, top: bool) -> Result<()> {
        if self.is_atom(x) {
            return Ok(());
        }
        let mut p = x;
        while self.is_pair(p) {
            p = self.cdr(p);
        }
        if p != NIL {
            return Err(self.error("dotted list in program", x));
        }
        let h = self.car(x);
        if h == self.syms.apply {
            self.ckapply(x)
        } else if h == self.syms.def {
            self.ckdef(x, top)
        } else if h == self.syms.if_ {
            self.ckif(x)
        } else if h == self.syms.ifstar {
            self.ckifstar(x)
        } else if h == self.syms.lambda {
            self.cklambda(x)
        } else if h == self.syms.macro_ {
            self.ckmacro(x, top)
        } else if h == self.syms.prog {
            self.ckseq(self.cdr(x), top)
        } else if h == self.syms.quote {
            self.ckquote(x)
        } else if h == self.syms.setq {
            self.cksetq(x)
        } else {
            self.ckseq(x, top)
        }
    }
}
