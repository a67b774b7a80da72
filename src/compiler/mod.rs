// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Bytecode compiler.
//!
//! [`Interp::compile`] turns one closure-converted top-level form into
//! a BYTECODE atom: a single pass over the form emits into a growing
//! byte buffer, with forward branches patched through a compile-time
//! stack of fixup offsets. Primitive calls compile to dedicated
//! opcodes selected through [`SUBR_TABLE`]; everything else becomes a
//! generic application.

pub mod cconv;
pub mod syntax;

#[cfg(test)]
mod compiler_test;

use crate::CHUNKSIZE;
use crate::bytecode::op;
use crate::cell::{Cell, NIL, T_BYTECODE, TRUE, UNDEF};
use crate::error::Result;
use crate::interp::Interp;

/// Argument shape of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubrKind {
    /// No arguments.
    Nullary,
    /// Exactly one argument.
    Unary,
    /// Exactly two arguments.
    Binary,
    /// Exactly three arguments.
    Ternary,
    /// Zero or one argument; defaults to the current input port.
    OptNullary,
    /// One or two arguments; the default depends on the primitive.
    OptUnary,
    /// Any number of arguments with an identity element.
    Variadic,
    /// One or more arguments, folded pairwise.
    Variadic1,
}

/// A primitive binding: its shape and its opcode.
#[derive(Debug, Clone, Copy)]
pub struct Subr {
    pub kind: SubrKind,
    pub op: u8,
}

/// The closed table of built-in primitives.
#[rustfmt::skip]
pub const SUBR_TABLE: &[(&str, SubrKind, u8)] = &[
    ("cmdline", SubrKind::Nullary, op::CMDLINE),
    ("errport", SubrKind::Nullary, op::ERRPORT),
    ("gc", SubrKind::Nullary, op::GC),
    ("gensym", SubrKind::Nullary, op::GENSYM),
    ("inport", SubrKind::Nullary, op::INPORT),
    ("obtab", SubrKind::Nullary, op::OBTAB),
    ("outport", SubrKind::Nullary, op::OUTPORT),
    ("quit", SubrKind::Nullary, op::QUIT),
    ("symtab", SubrKind::Nullary, op::SYMTAB),

    ("abs", SubrKind::Unary, op::ABS),
    ("alphac", SubrKind::Unary, op::ALPHAC),
    ("atom", SubrKind::Unary, op::ATOM),
    ("caar", SubrKind::Unary, op::CAAR),
    ("cadr", SubrKind::Unary, op::CADR),
    ("car", SubrKind::Unary, op::CAR),
    ("catch*", SubrKind::Unary, op::CATCHSTAR),
    ("cdar", SubrKind::Unary, op::CDAR),
    ("cddr", SubrKind::Unary, op::CDDR),
    ("cdr", SubrKind::Unary, op::CDR),
    ("char", SubrKind::Unary, op::CHAR),
    ("charp", SubrKind::Unary, op::CHARP),
    ("charval", SubrKind::Unary, op::CHARVAL),
    ("close-port", SubrKind::Unary, op::CLOSE_PORT),
    ("constp", SubrKind::Unary, op::CONSTP),
    ("ctagp", SubrKind::Unary, op::CTAGP),
    ("delete", SubrKind::Unary, op::DELETE),
    ("downcase", SubrKind::Unary, op::DOWNCASE),
    ("dump-image", SubrKind::Unary, op::DUMP_IMAGE),
    ("eofp", SubrKind::Unary, op::EOFP),
    ("eval", SubrKind::Unary, op::EVAL),
    ("existsp", SubrKind::Unary, op::EXISTSP),
    ("fixp", SubrKind::Unary, op::FIXP),
    ("flush", SubrKind::Unary, op::FLUSH),
    ("format", SubrKind::Unary, op::FORMAT),
    ("funp", SubrKind::Unary, op::FUNP),
    ("inportp", SubrKind::Unary, op::INPORTP),
    ("liststr", SubrKind::Unary, op::LISTSTR),
    ("listvec", SubrKind::Unary, op::LISTVEC),
    ("load", SubrKind::Unary, op::LOAD),
    ("lowerc", SubrKind::Unary, op::LOWERC),
    ("mx", SubrKind::Unary, op::MX),
    ("mx1", SubrKind::Unary, op::MX1),
    ("not", SubrKind::Unary, op::NULL),
    ("null", SubrKind::Unary, op::NULL),
    ("numeric", SubrKind::Unary, op::NUMERIC),
    ("open-infile", SubrKind::Unary, op::OPEN_INFILE),
    ("outportp", SubrKind::Unary, op::OUTPORTP),
    ("pair", SubrKind::Unary, op::PAIR),
    ("set-inport", SubrKind::Unary, op::SET_INPORT),
    ("set-outport", SubrKind::Unary, op::SET_OUTPORT),
    ("ssize", SubrKind::Unary, op::SSIZE),
    ("stringp", SubrKind::Unary, op::STRINGP),
    ("strlist", SubrKind::Unary, op::STRLIST),
    ("symbol", SubrKind::Unary, op::SYMBOL),
    ("symbolp", SubrKind::Unary, op::SYMBOLP),
    ("symname", SubrKind::Unary, op::SYMNAME),
    ("syscmd", SubrKind::Unary, op::SYSCMD),
    ("untag", SubrKind::Unary, op::UNTAG),
    ("upcase", SubrKind::Unary, op::UPCASE),
    ("upperc", SubrKind::Unary, op::UPPERC),
    ("veclist", SubrKind::Unary, op::VECLIST),
    ("vectorp", SubrKind::Unary, op::VECTORP),
    ("vsize", SubrKind::Unary, op::VSIZE),
    ("whitec", SubrKind::Unary, op::WHITEC),

    ("cons", SubrKind::Binary, op::CONS),
    ("div", SubrKind::Binary, op::DIV),
    ("eq", SubrKind::Binary, op::EQ),
    ("nreconc", SubrKind::Binary, op::NRECONC),
    ("reconc", SubrKind::Binary, op::RECONC),
    ("rem", SubrKind::Binary, op::REM),
    ("rename", SubrKind::Binary, op::RENAME),
    ("s<", SubrKind::Binary, op::SLESS),
    ("s<=", SubrKind::Binary, op::SLTEQ),
    ("s=", SubrKind::Binary, op::SEQUAL),
    ("s>", SubrKind::Binary, op::SGRTR),
    ("s>=", SubrKind::Binary, op::SGTEQ),
    ("setcar", SubrKind::Binary, op::SETCAR),
    ("setcdr", SubrKind::Binary, op::SETCDR),
    ("sfill", SubrKind::Binary, op::SFILL),
    ("si<", SubrKind::Binary, op::SILESS),
    ("si<=", SubrKind::Binary, op::SILTEQ),
    ("si=", SubrKind::Binary, op::SIEQUAL),
    ("si>", SubrKind::Binary, op::SIGRTR),
    ("si>=", SubrKind::Binary, op::SIGTEQ),
    ("sref", SubrKind::Binary, op::SREF),
    ("throw*", SubrKind::Binary, op::THROWSTAR),
    ("vfill", SubrKind::Binary, op::VFILL),
    ("vref", SubrKind::Binary, op::VREF),

    ("sset", SubrKind::Ternary, op::SSET),
    ("substr", SubrKind::Ternary, op::SUBSTR),
    ("subvec", SubrKind::Ternary, op::SUBVEC),
    ("vset", SubrKind::Ternary, op::VSET),

    ("peekc", SubrKind::OptNullary, op::PEEKC),
    ("read", SubrKind::OptNullary, op::READ),
    ("readc", SubrKind::OptNullary, op::READC),

    ("error", SubrKind::OptUnary, op::ERROR),
    ("mkstr", SubrKind::OptUnary, op::MKSTR),
    ("mkvec", SubrKind::OptUnary, op::MKVEC),
    ("numstr", SubrKind::OptUnary, op::NUMSTR),
    ("open-outfile", SubrKind::OptUnary, op::OPEN_OUTFILE),
    ("prin", SubrKind::OptUnary, op::PRIN),
    ("princ", SubrKind::OptUnary, op::PRINC),
    ("strnum", SubrKind::OptUnary, op::STRNUM),
    ("writec", SubrKind::OptUnary, op::WRITEC),

    ("*", SubrKind::Variadic, op::TIMES),
    ("+", SubrKind::Variadic, op::PLUS),
    ("conc", SubrKind::Variadic, op::CONC),
    ("nconc", SubrKind::Variadic, op::NCONC),
    ("sconc", SubrKind::Variadic, op::SCONC),
    ("vconc", SubrKind::Variadic, op::VCONC),

    ("bitop", SubrKind::Variadic1, op::BITOP),
    ("max", SubrKind::Variadic1, op::MAX),
    ("min", SubrKind::Variadic1, op::MIN),
    ("-", SubrKind::Variadic1, op::MINUS),
    ("<", SubrKind::Variadic1, op::LESS),
    ("<=", SubrKind::Variadic1, op::LTEQ),
    ("=", SubrKind::Variadic1, op::EQUAL),
    (">", SubrKind::Variadic1, op::GRTR),
    (">=", SubrKind::Variadic1, op::GTEQ),
    ("c<", SubrKind::Variadic1, op::CLESS),
    ("c<=", SubrKind::Variadic1, op::CLTEQ),
    ("c=", SubrKind::Variadic1, op::CEQUAL),
    ("c>", SubrKind::Variadic1, op::CGRTR),
    ("c>=", SubrKind::Variadic1, op::CGTEQ),
];

impl Interp {
    /// The primitive binding of a symbol, if any.
    pub(crate) fn subr_of(&self, x: Cell) -> Option<Subr> {
        self.subrs.get(&x).copied()
    }

    /// True when the symbol names a primitive.
    pub(crate) fn subrp(&self, x: Cell) -> bool {
        self.subrs.contains_key(&x)
    }

    // ----- emitter -----

    /// Append one byte to the emit buffer, growing it by CHUNKSIZE.
    fn emit(&mut self, x: u8) -> Result<()> {
        let buf = self.cdr(self.emitbuf);
        if self.here >= self.string_len(buf) {
            let k = self.string_len(buf);
            let n = self.mkstr_blank(CHUNKSIZE + k)?;
            for i in 0..k {
                let b = self.string_byte(self.cdr(self.emitbuf), i);
                self.set_string_byte(n, i, b);
            }
            let e = self.emitbuf;
            self.set_cdr(e, n);
        }
        let buf = self.cdr(self.emitbuf);
        self.set_string_byte(buf, self.here, x);
        self.here += 1;
        Ok(())
    }

    #[inline]
    fn emitop(&mut self, o: u8) -> Result<()> {
        self.emit(o)
    }

    /// Emit a 16-bit big-endian operand.
    fn emitarg(&mut self, i: usize) -> Result<()> {
        if i > 65535 {
            let obj = self.mkfix(i as i32)?;
            return Err(self.error("bytecode argument out of range", obj));
        }
        self.emit((i >> 8) as u8)?;
        self.emit((i & 255) as u8)
    }

    /// Emit a literal load: intern into the pool, emit `QUOTE idx`.
    fn emitq(&mut self, x: Cell) -> Result<()> {
        let i = self.obindex(x)?;
        let oa = self.obarray;
        self.vec_set(oa, i, x);
        self.emitop(op::QUOTE)?;
        self.emitarg(i)
    }

    /// Patch a previously emitted operand in place.
    fn patch(&mut self, a: usize, n: usize) -> Result<()> {
        if n > 65535 {
            let obj = self.mkfix(n as i32)?;
            return Err(self.error("bytecode argument out of range", obj));
        }
        let buf = self.cdr(self.emitbuf);
        self.set_string_byte(buf, a, (n >> 8) as u8);
        self.set_string_byte(buf, a + 1, (n & 255) as u8);
        Ok(())
    }

    // ----- compile-time stack -----

    fn cpushval(&mut self, x: usize) -> Result<()> {
        let n = self.mkfix(x as i32)?;
        self.cts = self.cons(n, self.cts)?;
        Ok(())
    }

    fn cpopval(&mut self) -> Result<usize> {
        if self.cts == NIL {
            return Err(self.error("compile stack underflow", UNDEF));
        }
        let n = self.car(self.cts);
        self.cts = self.cdr(self.cts);
        Ok(self.fixval(n) as usize)
    }

    fn cswap(&mut self) -> Result<()> {
        if self.cts == NIL || self.cdr(self.cts) == NIL {
            return Err(self.error("compile stack underflow", UNDEF));
        }
        let x = self.car(self.cts);
        let y = self.cadr(self.cts);
        let c = self.cts;
        self.set_car(c, y);
        let d = self.cdr(c);
        self.set_car(d, x);
        Ok(())
    }

    // ----- form compilers -----

    fn compprog(&mut self, x: Cell, t: bool) -> Result<()> {
        let mut x = self.cdr(x);
        if x == NIL {
            return self.emitq(NIL);
        }
        while self.cdr(x) != NIL {
            self.compexpr(self.car(x), false)?;
            x = self.cdr(x);
        }
        self.compexpr(self.car(x), t)
    }

    fn compsetq(&mut self, x: Cell) -> Result<()> {
        self.compexpr(self.caddr(x), false)?;
        if self.caadr(x) == self.syms.i_ref {
            self.emitop(op::SETREF)?;
            self.emitarg(self.fixval(self.cadadr(x)) as usize)
        } else if self.caadr(x) == self.syms.i_arg {
            self.emitop(op::SETARG)?;
            self.emitarg(self.fixval(self.cadadr(x)) as usize)
        } else {
            Err(self.error("setq: unknown location", x))
        }
    }

    fn compif(&mut self, x: Cell, t: bool, star: bool) -> Result<()> {
        self.compexpr(self.cadr(x), false)?;
        self.emitop(if star { op::BRT } else { op::BRF })?;
        self.cpushval(self.here)?;
        self.emitarg(0)?;
        self.compexpr(self.caddr(x), t)?;
        if self.cdddr(x) != NIL {
            self.emitop(op::JMP)?;
            self.cpushval(self.here)?;
            self.emitarg(0)?;
            self.cswap()?;
            let a = self.cpopval()?;
            self.patch(a, self.here)?;
            self.compexpr(self.cadddr(x), t)?;
        }
        let a = self.cpopval()?;
        self.patch(a, self.here)
    }

    /// Emit the copy instructions of an envmap.
    fn setupenv(&mut self, m: Cell) -> Result<()> {
        let mut m = m;
        while m != NIL {
            let src = self.caar(m);
            if src == self.syms.i_e {
                self.emitop(op::CPREF)?;
            } else if src == self.syms.i_a {
                self.emitop(op::CPARG)?;
            } else {
                return Err(self.error("closure: unknown location", m));
            }
            self.emitarg(self.fixval(self.cadr(self.car(m))) as usize)?;
            self.emitarg(self.fixval(self.caddr(self.car(m))) as usize)?;
            m = self.cdr(m);
        }
        Ok(())
    }

    fn dottedp(&self, mut x: Cell) -> bool {
        while self.is_pair(x) {
            x = self.cdr(x);
        }
        x != NIL
    }

    /// Compile a `%closure` form: jump over the body, entry with
    /// arity check, body, return; then the environment setup and the
    /// CLOSURE instruction at the creation site.
    fn compcls(&mut self, x: Cell) -> Result<()> {
        self.emitop(op::JMP)?;
        self.cpushval(self.here)?;
        self.emitarg(0)?;
        let a = self.here;
        let fa = self.flatargs(self.cadr(x))?;
        let na = self.length(fa) as usize;
        if self.dottedp(self.cadr(x)) {
            self.emitop(op::ENTCOL)?;
            self.emitarg(na - 1)?;
        } else {
            self.emitop(op::ENTER)?;
            self.emitarg(na)?;
        }
        let b = self.cons(self.syms.prog, self.cdddr(x))?;
        self.protect(b)?;
        self.compexpr(b, true)?;
        self.unprot(1)?;
        self.emitop(op::RETURN)?;
        let p = self.cpopval()?;
        self.patch(p, self.here)?;
        let m = self.caddr(x);
        if m != NIL {
            self.emitop(op::MKENV)?;
            self.emitarg(self.length(m) as usize)?;
            self.setupenv(m)?;
        } else {
            self.emitop(op::PROPENV)?;
        }
        self.emitop(op::CLOSURE)?;
        self.emitarg(a)
    }

    /// `(apply f a… xs)`: cons the fixed arguments onto the spread
    /// list left to right, then enter through the spreading opcode.
    fn compapply(&mut self, x: Cell, t: bool) -> Result<()> {
        let rev = self.reverse(self.cddr(x))?;
        self.protect(rev)?;
        self.compexpr(self.car(rev), false)?;
        let mut xs = self.cdr(rev);
        while xs != NIL {
            self.emitop(op::PUSH)?;
            self.compexpr(self.car(xs), false)?;
            self.emitop(op::CONS)?;
            xs = self.cdr(xs);
        }
        self.emitop(op::PUSH)?;
        self.unprot(1)?;
        self.compexpr(self.cadr(x), false)?;
        self.emitop(if t { op::APPLIST } else { op::APPLIS })
    }

    /// Generic application: arguments pushed right to left, count,
    /// function, APPLY or the tail variant.
    fn compapp(&mut self, x: Cell, t: bool) -> Result<()> {
        let rev = self.reverse(self.cdr(x))?;
        self.protect(rev)?;
        let mut xs = rev;
        while xs != NIL {
            self.compexpr(self.car(xs), false)?;
            self.emitop(op::PUSH)?;
            xs = self.cdr(xs);
        }
        self.unprot(1)?;
        self.emitop(op::PUSHVAL)?;
        self.emitarg(self.length(self.cdr(x)) as usize)?;
        self.compexpr(self.car(x), false)?;
        self.emitop(if t { op::TAILAPP } else { op::APPLY })
    }

    fn compsubr0(&mut self, x: Cell, o: u8) -> Result<()> {
        self.ckargs(x, 0, 0)?;
        self.emitop(o)
    }

    fn compsubr1(&mut self, x: Cell, o: u8) -> Result<()> {
        self.ckargs(x, 1, 1)?;
        self.compexpr(self.cadr(x), false)?;
        self.emitop(o)?;
        if o == op::CATCHSTAR {
            self.emitop(op::APPLY)?;
        }
        Ok(())
    }

    fn compsubr2(&mut self, x: Cell, o: u8) -> Result<()> {
        self.ckargs(x, 2, 2)?;
        self.compexpr(self.caddr(x), false)?;
        self.emitop(op::PUSH)?;
        self.compexpr(self.cadr(x), false)?;
        self.emitop(o)
    }

    fn compsubr3(&mut self, x: Cell, o: u8) -> Result<()> {
        self.ckargs(x, 3, 3)?;
        self.compexpr(self.cadddr(x), false)?;
        self.emitop(op::PUSH)?;
        self.compexpr(self.caddr(x), false)?;
        self.emitop(op::PUSH)?;
        self.compexpr(self.cadr(x), false)?;
        self.emitop(o)
    }

    fn composubr0(&mut self, x: Cell, o: u8) -> Result<()> {
        self.ckargs(x, 0, 1)?;
        if self.cdr(x) == NIL {
            self.emitop(op::INPORT)?;
        } else {
            self.compexpr(self.cadr(x), false)?;
        }
        self.emitop(o)
    }

    fn composubr1(&mut self, x: Cell, o: u8) -> Result<()> {
        self.ckargs(x, 1, 2)?;
        let mut o = o;
        if self.cddr(x) == NIL {
            match o {
                op::ERROR => {}
                op::MKSTR => {
                    let b = self.blank;
                    self.emitq(b)?;
                }
                op::MKVEC | op::OPEN_OUTFILE => self.emitq(NIL)?,
                op::NUMSTR | op::STRNUM => {
                    let t = self.ten;
                    self.emitq(t)?;
                }
                op::WRITEC | op::PRIN | op::PRINC => self.emitop(op::OUTPORT)?,
                _ => {}
            }
        } else {
            if o == op::ERROR {
                o = op::ERROR2;
            }
            self.compexpr(self.caddr(x), false)?;
        }
        self.emitop(op::PUSH)?;
        self.compexpr(self.cadr(x), false)?;
        self.emitop(o)
    }

    fn complsubr0(&mut self, x: Cell, o: u8) -> Result<()> {
        if self.cdr(x) == NIL {
            match o {
                op::PLUS => {
                    let z = self.zero;
                    self.emitq(z)
                }
                op::TIMES => {
                    let one = self.one;
                    self.emitq(one)
                }
                op::VCONC => {
                    let v = self.nullvec;
                    self.emitq(v)
                }
                op::SCONC => {
                    let s = self.nullstr;
                    self.emitq(s)
                }
                _ => self.emitq(NIL),
            }
        } else if self.cddr(x) == NIL {
            self.compexpr(self.cadr(x), false)
        } else if matches!(o, op::CONC | op::SCONC | op::VCONC | op::NCONC) {
            let rev = self.reverse(self.cdr(x))?;
            self.protect(rev)?;
            self.emitq(NIL)?;
            let mut xs = rev;
            while xs != NIL {
                self.emitop(op::PUSH)?;
                self.compexpr(self.car(xs), false)?;
                self.emitop(op::CONS)?;
                xs = self.cdr(xs);
            }
            self.unprot(1)?;
            self.emitop(o)
        } else {
            let mut xs = self.cdr(x);
            self.compexpr(self.car(xs), false)?;
            xs = self.cdr(xs);
            while xs != NIL {
                self.emitop(op::PUSH)?;
                self.compexpr(self.car(xs), false)?;
                self.emitop(o)?;
                xs = self.cdr(xs);
            }
            Ok(())
        }
    }

    /// `(bitop op a b …)` folds left over the operands with the
    /// operator word kept below them on the stack.
    fn compbitop(&mut self, x: Cell) -> Result<()> {
        if self.cddr(x) == NIL || self.cdddr(x) == NIL {
            return Err(self.error("bitop: too few arguments", self.cdr(x)));
        }
        self.compexpr(self.cadr(x), false)?;
        self.emitop(op::PUSH)?;
        let mut xs = self.cddr(x);
        self.compexpr(self.car(xs), false)?;
        xs = self.cdr(xs);
        while xs != NIL {
            self.emitop(op::PUSH)?;
            self.compexpr(self.car(xs), false)?;
            self.emitop(op::BITOP)?;
            xs = self.cdr(xs);
        }
        self.emitop(op::DROP)
    }

    fn complsubr1(&mut self, x: Cell, o: u8) -> Result<()> {
        self.ckargs(x, 1, -1)?;
        if o == op::BITOP {
            return self.compbitop(x);
        }
        if self.cddr(x) == NIL {
            if o == op::MIN || o == op::MAX {
                self.compexpr(self.cadr(x), false)
            } else if o == op::MINUS {
                self.compexpr(self.cadr(x), false)?;
                self.emitop(op::NEGATE)
            } else {
                self.emitq(TRUE)
            }
        } else {
            let chain = !matches!(o, op::MINUS | op::MIN | op::MAX);
            if chain {
                self.emitop(op::PUSHTRUE)?;
            }
            let mut xs = self.cdr(x);
            self.compexpr(self.car(xs), false)?;
            xs = self.cdr(xs);
            while xs != NIL {
                self.emitop(op::PUSH)?;
                self.compexpr(self.car(xs), false)?;
                self.emitop(o)?;
                xs = self.cdr(xs);
            }
            if chain {
                self.emitop(op::POP)?;
            }
            Ok(())
        }
    }

    /// Compile one expression; `t` marks tail position.
    pub(crate) fn compexpr(&mut self, x: Cell, t: bool) -> Result<()> {
        if self.is_atom(x) {
            return self.emitq(x);
        }
        let h = self.car(x);
        if h == self.syms.quote {
            return self.emitq(self.cadr(x));
        }
        if h == self.syms.i_arg {
            self.emitop(op::ARG)?;
            return self.emitarg(self.fixval(self.cadr(x)) as usize);
        }
        if h == self.syms.i_ref {
            self.emitop(op::REF)?;
            self.emitarg(self.fixval(self.cadr(x)) as usize)?;
            let y = self.htlookup(self.symhash, self.caddr(x));
            if y == UNDEF {
                return self.emitarg(0);
            }
            return self.emitarg(self.fixval(self.cdr(y)) as usize);
        }
        if h == self.syms.if_ {
            return self.compif(x, t, false);
        }
        if h == self.syms.ifstar {
            return self.compif(x, t, true);
        }
        if h == self.syms.i_closure {
            return self.compcls(x);
        }
        if h == self.syms.prog {
            return self.compprog(x, t);
        }
        if h == self.syms.setq {
            return self.compsetq(x);
        }
        if h == self.syms.apply {
            return self.compapply(x, t);
        }
        if h == self.syms.macro_ {
            self.compexpr(self.caddr(x), false)?;
            self.emitop(op::MACRO)?;
            let y = self.htlookup(self.symhash, self.cadr(x));
            if y == UNDEF {
                return Err(self.error("macro: unknown name", self.cadr(x)));
            }
            return self.emitarg(self.fixval(self.cdr(y)) as usize);
        }
        if let Some(subr) = self.subr_of(h) {
            return match subr.kind {
                SubrKind::Nullary => self.compsubr0(x, subr.op),
                SubrKind::Unary => self.compsubr1(x, subr.op),
                SubrKind::Binary => self.compsubr2(x, subr.op),
                SubrKind::Ternary => self.compsubr3(x, subr.op),
                SubrKind::OptNullary => self.composubr0(x, subr.op),
                SubrKind::OptUnary => self.composubr1(x, subr.op),
                SubrKind::Variadic => self.complsubr0(x, subr.op),
                SubrKind::Variadic1 => self.complsubr1(x, subr.op),
            };
        }
        self.compapp(x, t)
    }

    /// Copy the first `k` emitted bytes into a fresh bytecode string.
    fn subprog(&mut self, k: usize) -> Result<Cell> {
        let n = self.mkstr_blank(k)?;
        for i in 0..k {
            let b = self.string_byte(self.cdr(self.emitbuf), i);
            self.set_string_byte(n, i, b);
        }
        Ok(n)
    }

    /// Compile one top-level (closure-converted) form into a
    /// BYTECODE atom.
    pub(crate) fn compile(&mut self, x: Cell) -> Result<Cell> {
        let s = self.mkstr_blank(CHUNKSIZE)?;
        self.emitbuf = self.mkatom(T_BYTECODE, s)?;
        self.here = 0;
        self.cts = NIL;
        self.compexpr(x, false)?;
        self.emitop(op::HALT)?;
        let body = self.subprog(self.here)?;
        let n = self.mkatom(T_BYTECODE, body)?;
        self.emitbuf = NIL;
        Ok(n)
    }
}
