// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Closure conversion.
//!
//! Rewrites syntax-checked forms into an intermediate form over three
//! marker symbols: `(%arg i)` for positional arguments, `(%ref i
//! name)` for environment references, and `(%closure formals envmap
//! body…)` for lambdas. The envmap lists `(source src dst name)`
//! copy instructions executed when the closure is built. Applications
//! of literal lambdas without assignment are lifted: captured
//! references become extra leading arguments and no environment is
//! allocated.

use crate::cell::{Cell, NIL, UNDEF};
use crate::error::Result;
use crate::interp::Interp;

impl Interp {
    /// Union of two symbol sets, preserving the order of `a` in
    /// front of `b`.
    fn set_union(&mut self, a: Cell, b: Cell) -> Result<Cell> {
        let mut a = self.reverse(a)?;
        self.protect(a)?;
        let mut n = b;
        self.protect(n)?;
        while self.is_pair(a) {
            if self.memq(self.car(a), b) == NIL {
                n = self.cons(self.car(a), n)?;
            }
            self.protected_set0(n);
            a = self.cdr(a);
        }
        if a != NIL && self.memq(a, b) == NIL {
            n = self.cons(a, n)?;
        }
        self.unprot(2)?;
        Ok(n)
    }

    /// Free variables of `x` that are not bound in `e`, not quoted,
    /// and not primitives.
    fn freevars(&mut self, x: Cell, e: Cell) -> Result<Cell> {
        let mut x = x;
        let mut e = e;
        let mut lam = false;
        if self.memq(x, e) != NIL {
            return Ok(NIL);
        } else if self.is_symbol(x) {
            return self.cons(x, NIL);
        } else if !self.is_pair(x) {
            return Ok(NIL);
        } else if self.car(x) == self.syms.quote {
            return Ok(NIL);
        } else if self.car(x) == self.syms.apply
            || self.car(x) == self.syms.prog
            || self.car(x) == self.syms.if_
            || self.car(x) == self.syms.ifstar
            || self.car(x) == self.syms.setq
        {
            x = self.cdr(x);
        } else if self.car(x) == self.syms.def || self.car(x) == self.syms.macro_ {
            x = self.cddr(x);
        } else if self.subrp(self.car(x)) {
            x = self.cdr(x);
        } else if self.car(x) == self.syms.lambda {
            self.protect(e)?;
            let a = self.flatargs(self.cadr(x))?;
            self.protect(a)?;
            let n = self.set_union(a, e)?;
            self.protect(n)?;
            e = n;
            x = self.cddr(x);
            lam = true;
        }
        self.protect(NIL)?;
        let mut u = NIL;
        while self.is_pair(x) {
            let n = self.freevars(self.car(x), e)?;
            self.protect(n)?;
            u = self.set_union(u, n)?;
            self.unprot(1)?;
            self.protected_set0(u);
            x = self.cdr(x);
        }
        let n = self.unprot(1)?;
        if lam {
            self.unprot(3)?;
        }
        Ok(n)
    }

    /// Build the envmap for a free-variable set: each entry names the
    /// copy source (`%arg` from the formals, `%ref` from the
    /// enclosing environment), source index, destination index and
    /// the variable.
    fn initmap(&mut self, fv: Cell, e: Cell, a: Cell) -> Result<Cell> {
        self.protect(NIL)?;
        let mut m = NIL;
        let mut fv = fv;
        let mut i = 0;
        while fv != NIL {
            let v = self.car(fv);
            let mut p = self.cons(v, NIL)?;
            self.protect(p)?;
            let n = self.mkfix(i)?;
            p = self.cons(n, p)?;
            self.protected_set0(p);
            if let Some(j) = self.posq(v, a) {
                let n = self.mkfix(j)?;
                p = self.cons(n, p)?;
                self.unprot(1)?;
                let ia = self.syms.i_a;
                p = self.cons(ia, p)?;
            } else if let Some(j) = self.posq(v, e) {
                let n = self.mkfix(j)?;
                p = self.cons(n, p)?;
                self.unprot(1)?;
                let ie = self.syms.i_e;
                p = self.cons(ie, p)?;
            } else {
                return Err(self.error("undefined symbol", v));
            }
            m = self.cons(p, m)?;
            self.protected_set0(m);
            i += 1;
            fv = self.cdr(fv);
        }
        let m = self.unprot(1)?;
        self.nreverse(m)
    }

    /// Append a fresh variable to the global variable list.
    fn newvar(&mut self, x: Cell) -> Result<()> {
        if self.memq(x, self.env) != NIL {
            return Ok(());
        }
        if self.envp == NIL {
            self.envp = self.lastpair(self.env);
        }
        let n = self.cons(x, NIL)?;
        let p = self.envp;
        self.set_cdr(p, n);
        self.envp = n;
        Ok(())
    }

    fn newvars(&mut self, mut x: Cell) -> Result<()> {
        while x != NIL {
            self.newvar(self.car(x))?;
            x = self.cdr(x);
        }
        Ok(())
    }

    /// Convert every element of a list.
    fn mapconv(&mut self, x: Cell, e: Cell, a: Cell) -> Result<Cell> {
        self.protect(NIL)?;
        let mut n = NIL;
        let mut x = x;
        while self.is_pair(x) {
            let new = self.cconv(self.car(x), e, a)?;
            n = self.cons(new, n)?;
            self.protected_set0(n);
            x = self.cdr(x);
        }
        let n = self.unprot(1)?;
        self.nreverse(n)
    }

    /// Convert a lambda into `(%closure formals envmap body…)`.
    fn lamconv(&mut self, x: Cell, e: Cell, a: Cell) -> Result<Cell> {
        let fv = self.freevars(x, NIL)?;
        self.protect(fv)?;
        self.newvars(fv)?;
        let args = self.flatargs(self.cadr(x))?;
        self.protect(args)?;
        let m = self.initmap(fv, e, a)?;
        self.protect(m)?;
        let mut cl = self.mapconv(self.cddr(x), fv, args)?;
        cl = self.cons(m, cl)?;
        cl = self.cons(self.cadr(x), cl)?;
        let ic = self.syms.i_closure;
        cl = self.cons(ic, cl)?;
        self.unprot(3)?;
        Ok(cl)
    }

    /// True when `x` occurs anywhere in `a`.
    fn contains(&self, a: Cell, x: Cell) -> bool {
        if a == x {
            return true;
        }
        self.is_pair(a) && (self.contains(self.car(a), x) || self.contains(self.cdr(a), x))
    }

    /// A literal-lambda application can be lifted when its body never
    /// assigns.
    fn liftable(&self, x: Cell) -> bool {
        !self.contains(x, self.syms.setq)
    }

    /// The variables an envmap copies out of the formals.
    fn liftnames(&mut self, m: Cell) -> Result<Cell> {
        self.protect(NIL)?;
        let mut a = NIL;
        let mut m = m;
        while m != NIL {
            if self.caar(m) == self.syms.i_a {
                let n = self.cadddr(self.car(m));
                a = self.cons(n, a)?;
                self.protected_set0(a);
            }
            m = self.cdr(m);
        }
        let a = self.unprot(1)?;
        self.nreverse(a)
    }

    /// `(%arg i)` references for the formal-sourced envmap entries,
    /// to be passed as extra call arguments.
    fn liftargs(&mut self, m: Cell) -> Result<Cell> {
        self.protect(NIL)?;
        let mut a = NIL;
        let mut m = m;
        while m != NIL {
            if self.caar(m) == self.syms.i_a {
                let mut n = self.cadr(self.car(m));
                n = self.cons(n, NIL)?;
                let ia = self.syms.i_arg;
                n = self.cons(ia, n)?;
                a = self.cons(n, a)?;
                self.protected_set0(a);
            }
            m = self.cdr(m);
        }
        let a = self.unprot(1)?;
        self.nreverse(a)
    }

    /// Lift `((lambda F B…) A…)`: captured formal references become
    /// leading arguments, so no environment is built.
    fn appconv(&mut self, x: Cell, e: Cell, a: Cell) -> Result<Cell> {
        let f = self.car(x);
        let fv = self.freevars(f, NIL)?;
        self.protect(fv)?;
        let fnargs = self.flatargs(self.cadr(f))?;
        self.protect(fnargs)?;
        self.newvars(fv)?;
        let m = self.initmap(fv, e, a)?;
        self.protect(m)?;
        let mut args = self.mapconv(self.cdr(x), e, a)?;
        self.protect(args)?;
        let n = self.liftargs(m)?;
        args = self.nconc2(n, args)?;
        self.protected_set0(args);
        let lv = self.liftnames(m)?;
        self.protect(lv)?;
        let vars = self.conc2(lv, self.cadr(f))?;
        self.protect(vars)?;
        let cv = self.set_union(lv, fnargs)?;
        self.protected_set1(cv);
        let mut f2 = self.mapconv(self.cddr(f), e, cv)?;
        f2 = self.cons(NIL, f2)?;
        f2 = self.cons(vars, f2)?;
        let ic = self.syms.i_closure;
        f2 = self.cons(ic, f2)?;
        self.unprot(6)?;
        self.cons(f2, args)
    }

    /// `def` at top level: extend the global variable list and
    /// rewrite into an assignment through its `%ref`.
    fn defconv(&mut self, x: Cell, e: Cell, a: Cell) -> Result<Cell> {
        self.newvar(self.cadr(x))?;
        let v = self.cconv(self.caddr(x), e, a)?;
        let n = self.cons(v, NIL)?;
        self.protect(n)?;
        let Some(pos) = self.posq(self.cadr(x), e) else {
            return Err(self.error("undefined symbol", self.cadr(x)));
        };
        let mut m = self.mkfix(pos)?;
        self.protect(m)?;
        let inner = self.cons(self.cadr(x), NIL)?;
        let inner = self.cons(m, inner)?;
        let ir = self.syms.i_ref;
        m = self.cons(ir, inner)?;
        self.unprot(2)?;
        let tail = self.cons(m, n)?;
        let sq = self.syms.setq;
        self.cons(sq, tail)
    }

    /// Convert one form.
    pub(crate) fn cconv(&mut self, x: Cell, e: Cell, a: Cell) -> Result<Cell> {
        if self.is_pair(x)
            && (self.car(x) == self.syms.apply
                || self.car(x) == self.syms.if_
                || self.car(x) == self.syms.ifstar
                || self.car(x) == self.syms.prog
                || self.car(x) == self.syms.setq
                || self.subrp(self.car(x)))
        {
            let n = self.mapconv(self.cdr(x), e, a)?;
            return self.cons(self.car(x), n);
        }
        if let Some(n) = self.posq(x, a) {
            let f = self.mkfix(n)?;
            let inner = self.cons(f, NIL)?;
            let ia = self.syms.i_arg;
            return self.cons(ia, inner);
        }
        if let Some(n) = self.posq(x, e) {
            let f = self.mkfix(n)?;
            self.tmp = f;
            let inner = self.cons(x, NIL)?;
            let inner = self.cons(f, inner)?;
            let ir = self.syms.i_ref;
            let n = self.cons(ir, inner)?;
            self.tmp = NIL;
            return Ok(n);
        }
        if self.is_symbol(x) {
            return Err(self.error("undefined symbol", x));
        }
        if self.is_atom(x) {
            return Ok(x);
        }
        if self.car(x) == self.syms.quote {
            return Ok(x);
        }
        if self.is_pair(self.car(x))
            && self.caar(x) == self.syms.lambda
            && self.liftable(self.car(x))
        {
            return self.appconv(x, e, a);
        }
        if self.car(x) == self.syms.lambda {
            return self.lamconv(x, e, a);
        }
        if self.car(x) == self.syms.def {
            return self.defconv(x, e, a);
        }
        if self.car(x) == self.syms.macro_ {
            let n = self.mapconv(self.cddr(x), e, a)?;
            let n = self.cons(self.cadr(x), n)?;
            return self.cons(self.car(x), n);
        }
        self.mapconv(x, e, a)
    }

    /// The variable (symbol) of each global binding, in order.
    fn carof(&mut self, a: Cell) -> Result<Cell> {
        self.protect(NIL)?;
        let mut n = NIL;
        let mut a = a;
        while a != NIL {
            n = self.cons(self.caar(a), n)?;
            self.protected_set0(n);
            a = self.cdr(a);
        }
        let n = self.unprot(1)?;
        self.nreverse(n)
    }

    /// Re-bind the (possibly grown) variable list against the old
    /// bindings; fresh variables get UNDEF boxes.
    fn zipenv(&mut self, vs: Cell, oe: Cell) -> Result<Cell> {
        self.protect(NIL)?;
        let mut n = NIL;
        let mut vs = vs;
        let mut oe = oe;
        while vs != NIL {
            let b = if oe == NIL {
                let inner = self.cons(UNDEF, NIL)?;
                self.cons(self.car(vs), inner)?
            } else {
                let b = self.car(oe);
                oe = self.cdr(oe);
                b
            };
            n = self.cons(b, n)?;
            self.protected_set0(n);
            vs = self.cdr(vs);
        }
        let n = self.unprot(1)?;
        self.nreverse(n)
    }

    /// Closure-convert a top-level form against the global
    /// environment, growing it as `def`s and free variables appear.
    pub(crate) fn clsconv(&mut self, x: Cell) -> Result<Cell> {
        self.env = self.carof(self.glob)?;
        self.envp = NIL;
        if self.env == NIL {
            self.env = self.cons(UNDEF, NIL)?;
        }
        let env = self.env;
        let n = self.cconv(x, env, NIL)?;
        self.protect(n)?;
        let env = self.env;
        self.glob = self.zipenv(env, self.glob)?;
        self.unprot(1)
    }
}
