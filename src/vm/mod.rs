// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The virtual machine.
//!
//! An accumulator machine over a growable stack vector on the managed
//! heap. Frames follow the calling convention of the compiler: boxed
//! arguments pushed right to left, the argument count, the saved
//! environment, the saved continuation `(ip . bytecode)`, and the
//! saved frame pointer. Tail calls rewrite the caller's frame in
//! place; `catch*` tags capture the five registers and `throw*`
//! restores them wholesale.

#[cfg(test)]
mod vm_test;

use crate::CHUNKSIZE;
use crate::bytecode::{ISIZE0, ISIZE1, ISIZE2, op};
use crate::cell::{Cell, EOFMARK, NIL, T_CATCHTAG, T_CLOSURE, T_INPORT, T_OUTPORT, TRUE, UNDEF};
use crate::error::{Error, Result};
use crate::interp::Interp;

impl Interp {
    // ----- stack -----

    /// Fresh empty runtime stack.
    pub(crate) fn initrts(&mut self) -> Result<()> {
        self.rts = NIL;
        self.rts = self.mkvec(CHUNKSIZE)?;
        self.sz = CHUNKSIZE as i32;
        self.sp = -1;
        self.fp = -1;
        Ok(())
    }

    #[inline]
    pub(crate) fn stackref(&self, n: i32) -> Cell {
        self.vec_ref(self.rts, n as usize)
    }

    #[inline]
    pub(crate) fn stackset(&mut self, n: i32, v: Cell) {
        let r = self.rts;
        self.vec_set(r, n as usize, v);
    }

    /// Ensure room for `k` more slots, reallocating the stack vector
    /// in CHUNKSIZE multiples. Slots are indices, so relocation is
    /// invisible to the rest of the machine.
    fn stkalloc(&mut self, k: i32) -> Result<()> {
        if self.sp + k >= self.sz {
            let k = if k >= CHUNKSIZE as i32 {
                let d = self.sp + k - self.sz;
                (CHUNKSIZE as i32) * (1 + d / CHUNKSIZE as i32)
            } else {
                CHUNKSIZE as i32
            };
            let n = self.mkvec((self.sz + k) as usize)?;
            for i in 0..=self.sp {
                let v = self.stackref(i);
                self.vec_set(n, i as usize, v);
            }
            self.sz += k;
            self.rts = n;
        }
        Ok(())
    }

    pub(crate) fn push(&mut self, x: Cell) -> Result<()> {
        self.tmp = x;
        self.stkalloc(1)?;
        self.tmp = NIL;
        self.sp += 1;
        self.stackset(self.sp, x);
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Result<Cell> {
        if self.sp < 0 {
            return Err(self.error("stack underflow", UNDEF));
        }
        self.sp -= 1;
        Ok(self.stackref(self.sp + 1))
    }

    // ----- frame accessors -----

    /// The i-th actual argument, counted from the top of the stack.
    #[inline]
    fn arg(&self, n: i32) -> Cell {
        self.boxref(self.stackref(self.sp - n))
    }

    /// The i-th argument box of the current frame.
    #[inline]
    fn argbox(&self, n: i32) -> Cell {
        self.stackref(self.fp - n)
    }

    /// The value in the i-th argument box of the current frame.
    #[inline]
    fn argref(&self, n: i32) -> Cell {
        self.boxref(self.argbox(n))
    }

    /// The i-th box of the current environment.
    #[inline]
    fn envbox(&self, n: usize) -> Cell {
        self.vec_ref(self.ep, n)
    }

    #[inline]
    fn clear(&mut self, n: i32) {
        self.sp -= n;
    }

    #[inline]
    fn skip(&mut self, n: usize) {
        self.ip += n;
    }

    // ----- closures and calls -----

    /// Build a closure over entry offset `i`, environment `e` and the
    /// current bytecode.
    fn closure(&mut self, i: usize, e: Cell) -> Result<Cell> {
        let c = self.cons(self.prog, NIL)?;
        let c = self.cons(e, c)?;
        self.protect(c)?;
        let f = self.mkfix(i as i32)?;
        let c = self.cons(f, c)?;
        self.unprot(1)?;
        self.mkatom(T_CLOSURE, c)
    }

    #[inline]
    fn closure_ip(&self, c: Cell) -> Cell {
        self.cadr(c)
    }

    #[inline]
    fn closure_env(&self, c: Cell) -> Cell {
        self.caddr(c)
    }

    #[inline]
    fn closure_prog(&self, c: Cell) -> Cell {
        self.cadddr(c)
    }

    /// Call the closure in the accumulator; returns the new
    /// instruction offset. The tail variant reuses the caller's
    /// frame instead of pushing a continuation.
    fn apply(&mut self, tail: bool) -> Result<usize> {
        if !self.is_closure(self.acc) {
            return Err(self.error("application of non-function", self.acc));
        }
        if tail {
            self.ep = self.closure_env(self.acc);
            self.prog = self.closure_prog(self.acc);
            let m = self.fixval(self.stackref(self.sp));
            let n = self.fixval(self.stackref(self.sp - m - 4));
            let pm = self.sp - m;
            let pn = self.sp - m - n - 4;
            if n == m {
                for i in 0..=m {
                    let v = self.stackref(pm + i);
                    self.stackset(pn + i, v);
                }
                self.fp = self.fixval(self.stackref(self.sp - m - 1));
                self.sp -= n + 2;
            } else {
                let e = self.stackref(self.sp - m - 3);
                let k = self.stackref(self.sp - m - 2);
                self.fp = self.fixval(self.stackref(self.sp - m - 1));
                for i in 0..=m {
                    let v = self.stackref(pm + i);
                    self.stackset(pn + i, v);
                }
                self.sp -= n + 2;
                self.stackset(self.sp - 1, e);
                self.stackset(self.sp, k);
            }
        } else {
            self.push(self.ep)?;
            let f = self.mkfix(self.ip as i32 + 1)?;
            let r = self.cons(f, self.prog)?;
            self.push(r)?;
            self.ep = self.closure_env(self.acc);
            self.prog = self.closure_prog(self.acc);
        }
        Ok(self.fixval(self.closure_ip(self.acc)) as usize)
    }

    fn conses(&self, mut n: Cell) -> i32 {
        let mut k = 0;
        while self.is_pair(n) {
            k += 1;
            n = self.cdr(n);
        }
        k
    }

    /// Spread the list on the stack top into boxed arguments, push
    /// the count, then apply.
    fn applis(&mut self, tail: bool) -> Result<usize> {
        let a = self.boxref(self.stackref(self.sp));
        if !self.is_pair(a) && a != NIL {
            return Err(self.error("apply: expected list", a));
        }
        let k = self.conses(a);
        self.stkalloc(k)?;
        self.sp += k;
        let mut i = self.sp - 1;
        let mut p = a;
        while p != NIL {
            if self.is_atom(p) {
                return Err(self.error("apply: dotted list", a));
            }
            let new = self.boxval(self.car(p))?;
            self.stackset(i, new);
            i -= 1;
            p = self.cdr(p);
        }
        let new = self.mkfix(k)?;
        self.stackset(self.sp, new);
        self.apply(tail)
    }

    /// Return from the current frame; restores the saved registers
    /// and pops the arguments.
    fn ret(&mut self) -> Result<usize> {
        self.fp = self.fixval(self.stackref(self.sp));
        let r = self.stackref(self.sp - 1);
        self.prog = self.cdr(r);
        self.ep = self.stackref(self.sp - 2);
        let n = self.fixval(self.stackref(self.sp - 3));
        self.sp -= n + 4;
        Ok(self.fixval(self.car(r)) as usize)
    }

    /// Variadic entry: collect the arguments beyond the fixed ones
    /// into a list bound to the rest parameter.
    fn entcol(&mut self, fix: i32) -> Result<()> {
        let na = self.fixval(self.stackref(self.sp - 2));
        if na < fix {
            return Err(self.error("too few arguments", UNDEF));
        }
        self.protect(NIL)?;
        let mut head = NIL;
        let mut last = NIL;
        let mut i = self.sp - fix - 3;
        for _ in 0..(na - fix) {
            let v = self.boxref(self.stackref(i));
            let x = self.cons(v, NIL)?;
            if head == NIL {
                head = x;
                self.protected_set0(head);
            } else {
                self.set_cdr(last, x);
            }
            last = x;
            i -= 1;
        }
        let a = self.unprot(1).map(|_| head)?;
        if na > fix {
            let new = self.boxval(a)?;
            self.stackset(self.sp - fix - 3, new);
        } else {
            self.push(NIL)?;
            let s = self.sp - na - 3;
            let d = self.sp - na - 2;
            for i in (0..=(na + 2)).rev() {
                let v = self.stackref(s + i);
                self.stackset(d + i, v);
            }
            let new = self.mkfix(1 + fix)?;
            self.stackset(self.sp - 2, new);
            let new = self.boxval(NIL)?;
            self.stackset(self.sp - fix - 3, new);
        }
        let f = self.mkfix(self.fp)?;
        self.push(f)?;
        self.fp = self.sp - 4;
        Ok(())
    }

    // ----- catch and throw -----

    /// Capture the machine state continuing after the following
    /// APPLY instruction.
    fn mkctag(&mut self) -> Result<Cell> {
        let mut n = self.cons(self.ep, self.prog)?;
        self.tmp = n;
        let f = self.mkfix(self.fp)?;
        n = self.cons(f, n)?;
        self.tmp = n;
        let f = self.mkfix(self.sp)?;
        n = self.cons(f, n)?;
        self.tmp = n;
        let f = self.mkfix(self.ip as i32 + 2)?;
        n = self.cons(f, n)?;
        self.tmp = NIL;
        self.mkatom(T_CATCHTAG, n)
    }

    /// Restore the state captured in a catch tag; the accumulator
    /// becomes the thrown value.
    pub(crate) fn throw(&mut self, ct: Cell, v: Cell) -> Result<usize> {
        if !self.is_ctag(ct) {
            return Err(self.expect("throw", "catch tag", ct));
        }
        let mut p = self.cdr(ct);
        let ip = self.fixval(self.car(p)) as usize;
        self.ip = ip;
        p = self.cdr(p);
        self.sp = self.fixval(self.car(p));
        p = self.cdr(p);
        self.fp = self.fixval(self.car(p));
        p = self.cdr(p);
        self.ep = self.car(p);
        self.prog = self.cdr(p);
        self.acc = v;
        Ok(ip)
    }

    /// Throw the current `*errval*` to an installed handler tag.
    fn throwerr(&mut self, ct: Cell) -> Result<usize> {
        let n = self.assq(self.syms.errval, self.glob);
        let v = if n == NIL { NIL } else { self.cadr(n) };
        self.throw(ct, v)
    }

    // ----- the fetch/decode/execute loop -----

    /// Run a bytecode program to completion. Recoverable errors are
    /// redirected to an installed `*errtag*` handler; anything else
    /// propagates to the caller.
    pub(crate) fn run(&mut self, x: Cell) -> Result<()> {
        self.acc = NIL;
        self.prog = x;
        self.ip = 0;
        self.running = true;
        while self.running {
            if self.interrupted() {
                self.running = false;
                break;
            }
            match self.step() {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) if e.recoverable() => {
                    let n = self.assq(self.syms.errtag, self.glob);
                    let handler = if n == NIL { NIL } else { self.cadr(n) };
                    if handler == NIL {
                        return Err(e);
                    }
                    let nv = self.assq(self.syms.errval, self.glob);
                    if nv != NIL && self.cadr(nv) == handler {
                        if let Error::Lisp { msg, .. } = &e {
                            let msg = msg.clone();
                            let s = self.mkstr(msg.as_bytes())?;
                            let ev = self.syms.errval;
                            self.bindset(ev, s);
                        }
                    }
                    self.ip = self.throwerr(handler)?;
                }
                Err(e) => return Err(e),
            }
        }
        Err(self.error("interrupted", UNDEF))
    }

    /// Execute one instruction. `Ok(true)` means HALT.
    #[allow(clippy::too_many_lines)] // one arm per opcode
    fn step(&mut self) -> Result<bool> {
        match self.ins() {
            op::APPLIS => {
                self.ip = self.applis(false)?;
            }
            op::APPLIST => {
                self.ip = self.applis(true)?;
            }
            op::TAILAPP => {
                self.ip = self.apply(true)?;
            }
            op::APPLY => {
                self.ip = self.apply(false)?;
            }
            op::QUOTE => {
                self.acc = self.vec_ref(self.obarray, self.op1());
                self.skip(ISIZE1);
            }
            op::ARG => {
                self.acc = self.argref(self.op1() as i32);
                self.skip(ISIZE1);
            }
            op::REF => {
                self.acc = self.boxref(self.envbox(self.op1()));
                if self.acc == UNDEF {
                    let y = self.vec_ref(self.symbols, self.op2());
                    return Err(self.error("undefined symbol", y));
                }
                if self.tp >= crate::NTRACE {
                    self.tp = 0;
                }
                self.trace[self.tp] = self.op2() as i32;
                self.tp += 1;
                self.skip(ISIZE2);
            }
            op::DROP => {
                self.sp -= 1;
                self.skip(ISIZE0);
            }
            op::POP => {
                self.acc = self.pop()?;
                self.skip(ISIZE0);
            }
            op::PUSH => {
                let b = self.boxval(self.acc)?;
                self.push(b)?;
                self.skip(ISIZE0);
            }
            op::PUSHTRUE => {
                self.push(TRUE)?;
                self.skip(ISIZE0);
            }
            op::PUSHVAL => {
                let f = self.mkfix(self.op1() as i32)?;
                self.push(f)?;
                self.skip(ISIZE1);
            }
            op::JMP => {
                self.ip = self.op1();
            }
            op::BRF => {
                if self.acc == NIL {
                    self.ip = self.op1();
                } else {
                    self.skip(ISIZE1);
                }
            }
            op::BRT => {
                if self.acc == NIL {
                    self.skip(ISIZE1);
                } else {
                    self.ip = self.op1();
                }
            }
            op::HALT => return Ok(true),
            op::CATCHSTAR => {
                let t = self.mkctag()?;
                let b = self.boxval(t)?;
                self.push(b)?;
                let f = self.mkfix(1)?;
                self.push(f)?;
                self.skip(ISIZE0);
            }
            op::THROWSTAR => {
                self.ip = self.throw(self.acc, self.arg(0))?;
            }
            op::MKENV => {
                self.acc = self.mkvec(self.op1())?;
                self.skip(ISIZE1);
            }
            op::PROPENV => {
                self.acc = self.ep;
                self.skip(ISIZE0);
            }
            op::CPARG => {
                let v = self.argbox(self.op1() as i32);
                let a = self.acc;
                self.vec_set(a, self.op2(), v);
                self.skip(ISIZE2);
            }
            op::CPREF => {
                let v = self.envbox(self.op1());
                let a = self.acc;
                self.vec_set(a, self.op2(), v);
                self.skip(ISIZE2);
            }
            op::CLOSURE => {
                self.acc = self.closure(self.op1(), self.acc)?;
                self.skip(ISIZE1);
            }
            op::ENTER => {
                if self.fixval(self.stackref(self.sp - 2)) != self.op1() as i32 {
                    return Err(self.error("wrong number of arguments", UNDEF));
                }
                let f = self.mkfix(self.fp)?;
                self.push(f)?;
                self.fp = self.sp - 4;
                self.skip(ISIZE1);
            }
            op::ENTCOL => {
                self.entcol(self.op1() as i32)?;
                self.skip(ISIZE1);
            }
            op::RETURN => {
                self.ip = self.ret()?;
            }
            op::SETARG => {
                let b = self.argbox(self.op1() as i32);
                self.boxset(b, self.acc);
                self.skip(ISIZE1);
            }
            op::SETREF => {
                let b = self.envbox(self.op1());
                self.boxset(b, self.acc);
                self.skip(ISIZE1);
            }
            op::MACRO => {
                self.newmacro(self.op1(), self.acc)?;
                self.skip(ISIZE1);
            }
            op::CMDLINE => {
                self.acc = self.argv;
                self.skip(ISIZE0);
            }
            op::QUIT => {
                std::process::exit(0);
            }
            op::OBTAB => {
                self.acc = self.obarray;
                self.skip(ISIZE0);
            }
            op::SYMTAB => {
                self.acc = self.symbols;
                self.skip(ISIZE0);
            }
            op::ERROR => {
                if !self.is_string(self.acc) {
                    return Err(self.expect("error", "string", self.acc));
                }
                let msg = String::from_utf8_lossy(&self.string_copy(self.acc)).into_owned();
                return Err(self.error(&msg, UNDEF));
            }
            op::ERROR2 => {
                if !self.is_string(self.acc) {
                    return Err(self.expect("error", "string", self.acc));
                }
                let msg = String::from_utf8_lossy(&self.string_copy(self.acc)).into_owned();
                let obj = self.arg(0);
                return Err(self.error(&msg, obj));
            }
            op::ERRPORT => {
                self.acc = self.mkport(self.errport as i32, T_OUTPORT)?;
                self.skip(ISIZE0);
            }
            op::INPORT => {
                self.acc = self.mkport(self.inport as i32, T_INPORT)?;
                self.skip(ISIZE0);
            }
            op::OUTPORT => {
                self.acc = self.mkport(self.outport as i32, T_OUTPORT)?;
                self.skip(ISIZE0);
            }
            op::GC => {
                self.acc = self.b_gc()?;
                self.skip(ISIZE0);
            }
            op::GENSYM => {
                self.acc = self.gensym()?;
                self.skip(ISIZE0);
            }
            op::ABS => {
                if !self.is_fix(self.acc) {
                    return Err(self.expect("abs", "fixnum", self.acc));
                }
                let v = self.fixval(self.acc);
                if v == i32::MIN {
                    return Err(self.error("abs: fixnum overflow", self.acc));
                }
                if v < 0 {
                    self.acc = self.mkfix(-v)?;
                }
                self.skip(ISIZE0);
            }
            op::ALPHAC => {
                if !self.is_char(self.acc) {
                    return Err(self.expect("alphac", "char", self.acc));
                }
                self.acc = bool_cell((self.charval(self.acc) as u8).is_ascii_alphabetic());
                self.skip(ISIZE0);
            }
            op::ATOM => {
                self.acc = bool_cell(!self.is_pair(self.acc));
                self.skip(ISIZE0);
            }
            op::CAR => {
                if !self.is_pair(self.acc) {
                    return Err(self.expect("car", "pair", self.acc));
                }
                self.acc = self.car(self.acc);
                self.skip(ISIZE0);
            }
            op::CDR => {
                if !self.is_pair(self.acc) {
                    return Err(self.expect("cdr", "pair", self.acc));
                }
                self.acc = self.cdr(self.acc);
                self.skip(ISIZE0);
            }
            op::CAAR => {
                if !self.is_pair(self.acc) || !self.is_pair(self.car(self.acc)) {
                    return Err(self.expect("caar", "nested pair", self.acc));
                }
                self.acc = self.caar(self.acc);
                self.skip(ISIZE0);
            }
            op::CADR => {
                if !self.is_pair(self.acc) || !self.is_pair(self.cdr(self.acc)) {
                    return Err(self.expect("cadr", "nested pair", self.acc));
                }
                self.acc = self.cadr(self.acc);
                self.skip(ISIZE0);
            }
            op::CDAR => {
                if !self.is_pair(self.acc) || !self.is_pair(self.car(self.acc)) {
                    return Err(self.expect("cdar", "nested pair", self.acc));
                }
                self.acc = self.cdar(self.acc);
                self.skip(ISIZE0);
            }
            op::CDDR => {
                if !self.is_pair(self.acc) || !self.is_pair(self.cdr(self.acc)) {
                    return Err(self.expect("cddr", "nested pair", self.acc));
                }
                self.acc = self.cddr(self.acc);
                self.skip(ISIZE0);
            }
            op::CHAR => {
                if !self.is_fix(self.acc) {
                    return Err(self.expect("char", "fixnum", self.acc));
                }
                let v = self.fixval(self.acc);
                if !(0..=255).contains(&v) {
                    return Err(self.error("char: value out of range", self.acc));
                }
                self.acc = self.mkchar(v)?;
                self.skip(ISIZE0);
            }
            op::CHARP => {
                self.acc = bool_cell(self.is_char(self.acc));
                self.skip(ISIZE0);
            }
            op::CHARVAL => {
                if !self.is_char(self.acc) {
                    return Err(self.expect("charval", "char", self.acc));
                }
                self.acc = self.mkfix(self.charval(self.acc))?;
                self.skip(ISIZE0);
            }
            op::CLOSE_PORT => {
                if !self.is_inport(self.acc) && !self.is_outport(self.acc) {
                    return Err(self.expect("close-port", "port", self.acc));
                }
                self.close_port(self.portno(self.acc));
                self.acc = NIL;
                self.skip(ISIZE0);
            }
            op::CONSTP => {
                self.acc = bool_cell(self.is_const(self.acc));
                self.skip(ISIZE0);
            }
            op::CTAGP => {
                self.acc = bool_cell(self.is_ctag(self.acc));
                self.skip(ISIZE0);
            }
            op::DELETE => {
                if !self.is_string(self.acc) {
                    return Err(self.expect("delete", "string", self.acc));
                }
                let path = String::from_utf8_lossy(&self.string_copy(self.acc)).into_owned();
                if std::fs::remove_file(&path).is_err() {
                    return Err(self.error("delete: cannot delete", self.acc));
                }
                self.acc = NIL;
                self.skip(ISIZE0);
            }
            op::DOWNCASE => {
                if !self.is_char(self.acc) {
                    return Err(self.expect("downcase", "char", self.acc));
                }
                self.acc = self.mkchar(i32::from((self.charval(self.acc) as u8).to_ascii_lowercase()))?;
                self.skip(ISIZE0);
            }
            op::DUMP_IMAGE => {
                if !self.is_string(self.acc) {
                    return Err(self.expect("dump-image", "string", self.acc));
                }
                self.dump_image(self.acc)?;
                self.acc = TRUE;
                self.skip(ISIZE0);
            }
            op::EOFP => {
                self.acc = bool_cell(self.acc == EOFMARK);
                self.skip(ISIZE0);
            }
            op::EVAL => {
                self.acc = self.eval(self.acc, true)?;
                self.skip(ISIZE0);
            }
            op::EXISTSP => {
                if !self.is_string(self.acc) {
                    return Err(self.expect("existsp", "string", self.acc));
                }
                self.acc = self.existsp_prim(self.acc);
                self.skip(ISIZE0);
            }
            op::FIXP => {
                self.acc = bool_cell(self.is_fix(self.acc));
                self.skip(ISIZE0);
            }
            op::FLUSH => {
                if !self.is_outport(self.acc) {
                    return Err(self.expect("flush", "outport", self.acc));
                }
                self.port_flush(self.portno(self.acc) as usize);
                self.skip(ISIZE0);
            }
            op::FORMAT => {
                self.acc = self.b_format(self.acc)?;
                self.skip(ISIZE0);
            }
            op::FUNP => {
                self.acc = bool_cell(self.is_closure(self.acc));
                self.skip(ISIZE0);
            }
            op::INPORTP => {
                self.acc = bool_cell(self.is_inport(self.acc));
                self.skip(ISIZE0);
            }
            op::LISTSTR => {
                if !self.is_list(self.acc) {
                    return Err(self.expect("liststr", "list", self.acc));
                }
                self.acc = self.liststr(self.acc)?;
                self.skip(ISIZE0);
            }
            op::LISTVEC => {
                if !self.is_list(self.acc) {
                    return Err(self.expect("listvec", "list", self.acc));
                }
                self.acc = self.listvec(self.acc, false)?;
                self.skip(ISIZE0);
            }
            op::LOAD => {
                let x = self.acc;
                self.b_load(x)?;
                self.acc = TRUE;
                self.skip(ISIZE0);
            }
            op::LOWERC => {
                if !self.is_char(self.acc) {
                    return Err(self.expect("lowerc", "char", self.acc));
                }
                self.acc = bool_cell((self.charval(self.acc) as u8).is_ascii_lowercase());
                self.skip(ISIZE0);
            }
            op::MX => {
                self.acc = self.expand(self.acc, true)?;
                self.skip(ISIZE0);
            }
            op::MX1 => {
                self.acc = self.expand(self.acc, false)?;
                self.skip(ISIZE0);
            }
            op::NEGATE => {
                if !self.is_fix(self.acc) {
                    return Err(self.expect("-", "fixnum", self.acc));
                }
                let v = self.fixval(self.acc);
                if v == i32::MIN {
                    return Err(self.error("-: fixnum overflow", self.acc));
                }
                self.acc = self.mkfix(-v)?;
                self.skip(ISIZE0);
            }
            op::NULL => {
                self.acc = bool_cell(self.acc == NIL);
                self.skip(ISIZE0);
            }
            op::NUMSTR => {
                if !self.is_fix(self.acc) {
                    return Err(self.expect("numstr", "fixnum", self.acc));
                }
                if !self.is_fix(self.arg(0)) {
                    return Err(self.expect("numstr", "fixnum", self.arg(0)));
                }
                let r = self.fixval(self.arg(0));
                self.acc = self.numstr(self.acc, r)?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::NUMERIC => {
                if !self.is_char(self.acc) {
                    return Err(self.expect("numeric", "char", self.acc));
                }
                self.acc = bool_cell((self.charval(self.acc) as u8).is_ascii_digit());
                self.skip(ISIZE0);
            }
            op::OPEN_INFILE => {
                if !self.is_string(self.acc) {
                    return Err(self.expect("open-infile", "string", self.acc));
                }
                self.acc = self.openfile(self.acc, 0)?;
                self.skip(ISIZE0);
            }
            op::OPEN_OUTFILE => {
                if !self.is_string(self.acc) {
                    return Err(self.expect("open-outfile", "string", self.acc));
                }
                let mode = if self.arg(0) == NIL { 1 } else { 2 };
                self.acc = self.openfile(self.acc, mode)?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::OUTPORTP => {
                self.acc = bool_cell(self.is_outport(self.acc));
                self.skip(ISIZE0);
            }
            op::PAIR => {
                self.acc = bool_cell(self.is_pair(self.acc));
                self.skip(ISIZE0);
            }
            op::PEEKC => {
                if !self.is_inport(self.acc) {
                    return Err(self.expect("peekc", "inport", self.acc));
                }
                self.acc = self.b_readc(self.portno(self.acc) as usize, true)?;
                self.skip(ISIZE0);
            }
            op::READ => {
                if !self.is_inport(self.acc) && !self.is_string(self.acc) {
                    return Err(self.expect("read", "inport", self.acc));
                }
                self.acc = self.b_read(self.acc)?;
                self.skip(ISIZE0);
            }
            op::READC => {
                if !self.is_inport(self.acc) {
                    return Err(self.expect("readc", "inport", self.acc));
                }
                self.acc = self.b_readc(self.portno(self.acc) as usize, false)?;
                self.skip(ISIZE0);
            }
            op::CONC => {
                self.acc = self.lconc(self.acc)?;
                self.skip(ISIZE0);
            }
            op::NCONC => {
                self.acc = self.nlconc(self.acc)?;
                self.skip(ISIZE0);
            }
            op::SCONC => {
                self.acc = self.sconc(self.acc)?;
                self.skip(ISIZE0);
            }
            op::SET_INPORT => {
                if !self.is_inport(self.acc) {
                    return Err(self.expect("set-inport", "inport", self.acc));
                }
                self.inport = self.portno(self.acc) as usize;
                self.skip(ISIZE0);
            }
            op::SET_OUTPORT => {
                if !self.is_outport(self.acc) {
                    return Err(self.expect("set-outport", "outport", self.acc));
                }
                self.outport = self.portno(self.acc) as usize;
                self.skip(ISIZE0);
            }
            op::SSIZE => {
                if !self.is_string(self.acc) {
                    return Err(self.expect("ssize", "string", self.acc));
                }
                self.acc = self.mkfix(self.string_len(self.acc) as i32 - 1)?;
                self.skip(ISIZE0);
            }
            op::STRNUM => {
                if !self.is_string(self.acc) {
                    return Err(self.expect("strnum", "string", self.acc));
                }
                if !self.is_fix(self.arg(0)) {
                    return Err(self.expect("strnum", "fixnum", self.arg(0)));
                }
                let r = self.fixval(self.arg(0));
                self.acc = self.strnum(self.acc, r)?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::SYMBOLP => {
                self.acc = bool_cell(self.is_symbol(self.acc));
                self.skip(ISIZE0);
            }
            op::SYMBOL => {
                if !self.is_string(self.acc) {
                    return Err(self.expect("symbol", "string", self.acc));
                }
                self.acc = self.b_symbol(self.acc)?;
                self.skip(ISIZE0);
            }
            op::SYMNAME => {
                if !self.is_symbol(self.acc) {
                    return Err(self.expect("symname", "symbol", self.acc));
                }
                self.acc = self.b_symname(self.acc)?;
                self.skip(ISIZE0);
            }
            op::STRINGP => {
                self.acc = bool_cell(self.is_string(self.acc));
                self.skip(ISIZE0);
            }
            op::STRLIST => {
                if !self.is_string(self.acc) {
                    return Err(self.expect("strlist", "string", self.acc));
                }
                self.acc = self.strlist(self.acc)?;
                self.skip(ISIZE0);
            }
            op::SYSCMD => {
                if !self.is_string(self.acc) {
                    return Err(self.expect("syscmd", "string", self.acc));
                }
                self.acc = self.syscmd(self.acc)?;
                self.skip(ISIZE0);
            }
            op::UNTAG => {
                self.acc = self.untag(self.acc);
                self.skip(ISIZE0);
            }
            op::UPCASE => {
                if !self.is_char(self.acc) {
                    return Err(self.expect("upcase", "char", self.acc));
                }
                self.acc = self.mkchar(i32::from((self.charval(self.acc) as u8).to_ascii_uppercase()))?;
                self.skip(ISIZE0);
            }
            op::UPPERC => {
                if !self.is_char(self.acc) {
                    return Err(self.expect("upperc", "char", self.acc));
                }
                self.acc = bool_cell((self.charval(self.acc) as u8).is_ascii_uppercase());
                self.skip(ISIZE0);
            }
            op::VCONC => {
                self.acc = self.vconc(self.acc)?;
                self.skip(ISIZE0);
            }
            op::VECLIST => {
                if !self.is_vector(self.acc) {
                    return Err(self.expect("veclist", "vector", self.acc));
                }
                self.acc = self.veclist(self.acc)?;
                self.skip(ISIZE0);
            }
            op::VECTORP => {
                self.acc = bool_cell(self.is_vector(self.acc));
                self.skip(ISIZE0);
            }
            op::VSIZE => {
                if !self.is_vector(self.acc) {
                    return Err(self.expect("vsize", "vector", self.acc));
                }
                self.acc = self.mkfix(self.veclen(self.acc) as i32)?;
                self.skip(ISIZE0);
            }
            op::WHITEC => {
                if !self.is_char(self.acc) {
                    return Err(self.expect("whitec", "char", self.acc));
                }
                let c = self.charval(self.acc) as u8;
                self.acc = bool_cell(matches!(c, b' ' | b'\t' | b'\n' | b'\r' | 0x0c));
                self.skip(ISIZE0);
            }
            op::BITOP => {
                self.acc = self.bitop(self.acc, self.arg(0), self.arg(1))?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::CLESS => {
                self.char_chain("c<", |p, n| p < n)?;
            }
            op::CLTEQ => {
                self.char_chain("c<=", |p, n| p <= n)?;
            }
            op::CEQUAL => {
                self.char_chain("c=", |p, n| p == n)?;
            }
            op::CGRTR => {
                self.char_chain("c>", |p, n| p > n)?;
            }
            op::CGTEQ => {
                self.char_chain("c>=", |p, n| p >= n)?;
            }
            op::CONS => {
                self.acc = self.cons(self.acc, self.arg(0))?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::DIV => {
                self.acc = self.b_div(self.acc, self.arg(0))?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::EQ => {
                self.acc = bool_cell(self.acc == self.arg(0));
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::EQUAL => {
                self.fix_chain("=", |p, n| p == n)?;
            }
            op::GRTR => {
                self.fix_chain(">", |p, n| p > n)?;
            }
            op::GTEQ => {
                self.fix_chain(">=", |p, n| p >= n)?;
            }
            op::LESS => {
                self.fix_chain("<", |p, n| p < n)?;
            }
            op::LTEQ => {
                self.fix_chain("<=", |p, n| p <= n)?;
            }
            op::MAX => {
                if !self.is_fix(self.acc) {
                    return Err(self.expect("max", "fixnum", self.acc));
                }
                if !self.is_fix(self.arg(0)) {
                    return Err(self.expect("max", "fixnum", self.arg(0)));
                }
                if self.fixval(self.arg(0)) > self.fixval(self.acc) {
                    self.acc = self.arg(0);
                }
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::MIN => {
                if !self.is_fix(self.acc) {
                    return Err(self.expect("min", "fixnum", self.acc));
                }
                if !self.is_fix(self.arg(0)) {
                    return Err(self.expect("min", "fixnum", self.arg(0)));
                }
                if self.fixval(self.arg(0)) < self.fixval(self.acc) {
                    self.acc = self.arg(0);
                }
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::MINUS => {
                self.acc = self.b_sub(self.acc, self.arg(0))?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::MKSTR => {
                self.acc = self.b_mkstr(self.acc, self.arg(0))?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::MKVEC => {
                self.acc = self.b_mkvec(self.acc, self.arg(0))?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::NRECONC => {
                if !self.is_list(self.acc) {
                    return Err(self.expect("nreconc", "list", self.acc));
                }
                if self.is_const(self.acc) {
                    return Err(self.error("nreconc: immutable", self.acc));
                }
                self.acc = self.nreconc(self.acc, self.arg(0))?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::PLUS => {
                self.acc = self.b_add(self.acc, self.arg(0))?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::PRIN => {
                if !self.is_outport(self.arg(0)) {
                    return Err(self.expect("prin", "outport", self.arg(0)));
                }
                let p = self.portno(self.arg(0)) as usize;
                let x = self.acc;
                self.b_prin(x, p, true)?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::PRINC => {
                if !self.is_outport(self.arg(0)) {
                    return Err(self.expect("princ", "outport", self.arg(0)));
                }
                let p = self.portno(self.arg(0)) as usize;
                let x = self.acc;
                self.b_prin(x, p, false)?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::RECONC => {
                if !self.is_list(self.acc) {
                    return Err(self.expect("reconc", "list", self.acc));
                }
                self.acc = self.reconc(self.acc, self.arg(0))?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::REM => {
                self.acc = self.b_rem(self.acc, self.arg(0))?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::RENAME => {
                self.b_rename(self.acc, self.arg(0))?;
                self.acc = NIL;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::SETCAR => {
                if !self.is_pair(self.acc) {
                    return Err(self.expect("setcar", "pair", self.acc));
                }
                if self.is_const(self.acc) {
                    return Err(self.error("setcar: immutable", self.acc));
                }
                let a = self.acc;
                let v = self.arg(0);
                self.set_car(a, v);
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::SETCDR => {
                if !self.is_pair(self.acc) {
                    return Err(self.expect("setcdr", "pair", self.acc));
                }
                if self.is_const(self.acc) {
                    return Err(self.error("setcdr: immutable", self.acc));
                }
                let a = self.acc;
                let v = self.arg(0);
                self.set_cdr(a, v);
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::SLESS => {
                self.acc = self.str_cmp2("s<", false, |o| o.is_lt())?;
            }
            op::SLTEQ => {
                self.acc = self.str_cmp2("s<=", false, |o| o.is_le())?;
            }
            op::SEQUAL => {
                self.acc = self.str_cmp2("s=", false, |o| o.is_eq())?;
            }
            op::SGRTR => {
                self.acc = self.str_cmp2("s>", false, |o| o.is_gt())?;
            }
            op::SGTEQ => {
                self.acc = self.str_cmp2("s>=", false, |o| o.is_ge())?;
            }
            op::SILESS => {
                self.acc = self.str_cmp2("si<", true, |o| o.is_lt())?;
            }
            op::SILTEQ => {
                self.acc = self.str_cmp2("si<=", true, |o| o.is_le())?;
            }
            op::SIEQUAL => {
                self.acc = self.str_cmp2("si=", true, |o| o.is_eq())?;
            }
            op::SIGRTR => {
                self.acc = self.str_cmp2("si>", true, |o| o.is_gt())?;
            }
            op::SIGTEQ => {
                self.acc = self.str_cmp2("si>=", true, |o| o.is_ge())?;
            }
            op::SFILL => {
                self.sfill(self.acc, self.arg(0))?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::SREF => {
                self.acc = self.sref(self.acc, self.arg(0))?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::SSET => {
                self.sset(self.acc, self.arg(0), self.arg(1))?;
                self.clear(2);
                self.skip(ISIZE0);
            }
            op::SUBSTR => {
                self.acc = self.substr(self.acc, self.arg(0), self.arg(1))?;
                self.clear(2);
                self.skip(ISIZE0);
            }
            op::SUBVEC => {
                self.acc = self.subvec(self.acc, self.arg(0), self.arg(1))?;
                self.clear(2);
                self.skip(ISIZE0);
            }
            op::TIMES => {
                self.acc = self.b_mul(self.acc, self.arg(0))?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::VFILL => {
                self.vfill(self.acc, self.arg(0))?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::VREF => {
                self.acc = self.vref(self.acc, self.arg(0))?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            op::VSET => {
                self.vset(self.acc, self.arg(0), self.arg(1))?;
                self.clear(2);
                self.skip(ISIZE0);
            }
            op::WRITEC => {
                if !self.is_char(self.acc) {
                    return Err(self.expect("writec", "char", self.acc));
                }
                if !self.is_outport(self.arg(0)) {
                    return Err(self.expect("writec", "outport", self.arg(0)));
                }
                let c = self.charval(self.acc) as u8;
                let p = self.portno(self.arg(0)) as usize;
                self.b_writec(c, p)?;
                self.clear(1);
                self.skip(ISIZE0);
            }
            o => {
                let f = self.mkfix(i32::from(o))?;
                return Err(self.error("illegal instruction", f));
            }
        }
        Ok(false)
    }

    /// One step of a fixnum comparison chain: the truth slot sits
    /// below the pushed previous value.
    fn fix_chain(&mut self, who: &str, rel: fn(i32, i32) -> bool) -> Result<()> {
        if !self.is_fix(self.acc) {
            return Err(self.expect(who, "fixnum", self.acc));
        }
        if !self.is_fix(self.arg(0)) {
            return Err(self.expect(who, "fixnum", self.arg(0)));
        }
        let prev = self.fixval(self.arg(0));
        let new = self.fixval(self.acc);
        if !rel(prev, new) {
            self.stackset(self.sp - 1, NIL);
        }
        self.clear(1);
        self.skip(ISIZE0);
        Ok(())
    }

    /// One step of a character comparison chain.
    fn char_chain(&mut self, who: &str, rel: fn(i32, i32) -> bool) -> Result<()> {
        if !self.is_char(self.acc) {
            return Err(self.expect(who, "char", self.acc));
        }
        if !self.is_char(self.arg(0)) {
            return Err(self.expect(who, "char", self.arg(0)));
        }
        let prev = self.charval(self.arg(0));
        let new = self.charval(self.acc);
        if !rel(prev, new) {
            self.stackset(self.sp - 1, NIL);
        }
        self.clear(1);
        self.skip(ISIZE0);
        Ok(())
    }

    /// Binary string comparison; the accumulator is the left operand.
    fn str_cmp2(
        &mut self,
        who: &str,
        ci: bool,
        rel: fn(core::cmp::Ordering) -> bool,
    ) -> Result<Cell> {
        if !self.is_string(self.acc) {
            return Err(self.expect(who, "string", self.acc));
        }
        if !self.is_string(self.arg(0)) {
            return Err(self.expect(who, "string", self.arg(0)));
        }
        let r = self.scomp(self.acc, self.arg(0), ci);
        self.clear(1);
        self.skip(ISIZE0);
        Ok(bool_cell(rel(r)))
    }
}

#[inline]
const fn bool_cell(b: bool) -> Cell {
    if b { TRUE } else { NIL }
}
