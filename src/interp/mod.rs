// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The interpreter value.
//!
//! [`Interp`] owns every piece of interpreter state: the node pool and
//! vector arena, the VM registers, the symbol table and literal pool,
//! the port table, and the compiler scratch state. Modules across the
//! crate contribute `impl Interp` blocks; this one defines the struct,
//! construction, the global environment, error raising and the
//! expand → check → convert → compile → run pipeline.

#[cfg(test)]
mod interp_test;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cell::{Cell, NIL, Tag, UNDEF};
use crate::compiler::Subr;
use crate::error::{Error, Result};
use crate::ports::Port;
use crate::reader::StrInput;
use crate::{CHUNKSIZE, NNODES, NPORTS, NTRACE, NVCELLS};

/// Literal-pool slot states (one byte per slot in the map string).
pub(crate) const OBFREE: u8 = 0;
pub(crate) const OBALLOC: u8 = 1;
pub(crate) const OBUSED: u8 = 2;

/// Interned symbols the interpreter refers to by name.
///
/// Resolved against the symbol table at startup and again after an
/// image restore (symbol cells differ between images).
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Syms {
    // closure-conversion markers
    pub i_a: Cell,
    pub i_e: Cell,
    pub i_arg: Cell,
    pub i_closure: Cell,
    pub i_ref: Cell,
    // special forms and reserved names
    pub apply: Cell,
    pub def: Cell,
    pub defmac: Cell,
    pub defun: Cell,
    pub errtag: Cell,
    pub errval: Cell,
    pub if_: Cell,
    pub ifstar: Cell,
    pub imagefile: Cell,
    pub labels: Cell,
    pub lambda: Cell,
    pub macro_: Cell,
    pub prog: Cell,
    pub quiet: Cell,
    pub quote: Cell,
    pub qquote: Cell,
    pub unquote: Cell,
    pub splice: Cell,
    pub starstar: Cell,
    pub setq: Cell,
    pub start: Cell,
    pub load: Cell,
}

/// The whole interpreter. One value, no global state.
pub struct Interp {
    // node pool
    pub(crate) cars: Vec<Cell>,
    pub(crate) cdrs: Vec<Cell>,
    pub(crate) tags: Vec<Tag>,
    pub(crate) freelist: Cell,

    // vector arena; `freevec` is the bump watermark in words
    pub(crate) arena: Vec<u8>,
    pub(crate) freevec: usize,

    // GC roots for values in flight
    pub(crate) protected: Cell,
    pub(crate) tmp: Cell,
    pub(crate) tmp_car: Cell,
    pub(crate) tmp_cdr: Cell,

    // shared immutable objects
    pub(crate) nullstr: Cell,
    pub(crate) nullvec: Cell,
    pub(crate) blank: Cell,
    pub(crate) zero: Cell,
    pub(crate) one: Cell,
    pub(crate) ten: Cell,

    // symbol table
    pub(crate) symbols: Cell,
    pub(crate) symhash: Cell,
    pub(crate) symptr: i32,

    // literal pool
    pub(crate) obhash: Cell,
    pub(crate) obarray: Cell,
    pub(crate) obmap: Cell,
    pub(crate) obptr: i32,

    // global environment and macro table
    pub(crate) glob: Cell,
    pub(crate) macros: Cell,

    // closure-conversion state
    pub(crate) env: Cell,
    pub(crate) envp: Cell,

    // code generator state
    pub(crate) emitbuf: Cell,
    pub(crate) here: usize,
    pub(crate) cts: Cell,

    // VM registers
    pub(crate) acc: Cell,
    pub(crate) prog: Cell,
    pub(crate) ip: usize,
    pub(crate) rts: Cell,
    pub(crate) sp: i32,
    pub(crate) fp: i32,
    pub(crate) sz: i32,
    pub(crate) e0: Cell,
    pub(crate) ep: Cell,
    pub(crate) running: bool,
    pub(crate) argv: Cell,

    // macro expander depth
    pub(crate) mxlev: i32,

    // reader state
    pub(crate) instr: Option<StrInput>,
    pub(crate) inlist: i32,
    pub(crate) quoting: i32,
    pub(crate) readerr: Option<String>,
    pub(crate) line: i32,
    pub(crate) files: Cell,

    // port table
    pub(crate) ports: Vec<Option<Port>>,
    pub(crate) port_flags: [Tag; NPORTS],
    pub(crate) inport: usize,
    pub(crate) outport: usize,
    pub(crate) errport: usize,

    // output capture (the `format` primitive, error rendering)
    pub(crate) hostcap: Option<Vec<u8>>,
    pub(crate) plimit: i32,

    // last global references, for error reports
    pub(crate) trace: [i32; NTRACE],
    pub(crate) tp: usize,

    // cooperative interrupt flag
    pub(crate) intr: Arc<AtomicBool>,

    pub(crate) gensym_id: i32,
    pub(crate) quiet: bool,

    // resolved special symbols and the primitive table
    pub(crate) syms: Syms,
    pub(crate) subrs: HashMap<Cell, Subr>,
}

impl Interp {
    /// Create a fully initialised interpreter: pools allocated, stdio
    /// ports open and locked, special symbols interned, primitive
    /// table resolved, well-known globals bound.
    ///
    /// # Errors
    ///
    /// Fails only if the pools cannot hold the bootstrap objects.
    pub fn new() -> Result<Self> {
        let mut it = Self {
            cars: vec![0; NNODES],
            cdrs: vec![0; NNODES],
            tags: vec![Tag::empty(); NNODES],
            freelist: NIL,
            arena: vec![0; NVCELLS * crate::cell::CELL_BYTES],
            freevec: 0,
            protected: NIL,
            tmp: NIL,
            tmp_car: NIL,
            tmp_cdr: NIL,
            nullstr: NIL,
            nullvec: NIL,
            blank: NIL,
            zero: NIL,
            one: NIL,
            ten: NIL,
            symbols: NIL,
            symhash: NIL,
            symptr: 0,
            obhash: NIL,
            obarray: NIL,
            obmap: NIL,
            obptr: 0,
            glob: NIL,
            macros: NIL,
            env: NIL,
            envp: NIL,
            emitbuf: NIL,
            here: 0,
            cts: NIL,
            acc: NIL,
            prog: NIL,
            ip: 0,
            rts: NIL,
            sp: -1,
            fp: -1,
            sz: 0,
            e0: NIL,
            ep: NIL,
            running: false,
            argv: NIL,
            mxlev: 0,
            instr: None,
            inlist: 0,
            quoting: 0,
            readerr: None,
            line: 1,
            files: NIL,
            ports: (0..NPORTS).map(|_| None).collect(),
            port_flags: [Tag::empty(); NPORTS],
            inport: 0,
            outport: 1,
            errport: 2,
            hostcap: None,
            plimit: 0,
            trace: [-1; NTRACE],
            tp: 0,
            intr: Arc::new(AtomicBool::new(false)),
            gensym_id: 0,
            quiet: false,
            syms: Syms::default(),
            subrs: HashMap::new(),
        };
        it.open_stdio();
        it.gcv();
        it.initrts()?;
        it.clrtrace();
        it.nullvec = it.newvec(crate::cell::T_VECTOR, 0)?;
        it.nullstr = it.newvec(crate::cell::T_STRING, 1)?;
        it.set_string_byte(it.nullstr, 0, 0);
        it.blank = it.mkchar(b' ' as i32)?;
        it.zero = it.mkfix(0)?;
        it.one = it.mkfix(1)?;
        it.ten = it.mkfix(10)?;
        it.symbols = it.mkvec(CHUNKSIZE)?;
        it.symhash = it.mkht(CHUNKSIZE as i32)?;
        it.obhash = it.mkht(CHUNKSIZE as i32)?;
        it.obarray = it.mkvec(CHUNKSIZE)?;
        it.obmap = it.mkstr_blank(CHUNKSIZE)?;
        for i in 0..CHUNKSIZE {
            it.set_string_byte(it.obmap, i, OBFREE);
        }
        // slot 0 of the symbol table doubles as the unknown-name
        // entry in trace reports
        it.symref(b"?")?;
        it.resolve_names()?;
        let (errtag, errval, imagefile, quiet, starstar, start) = (
            it.syms.errtag,
            it.syms.errval,
            it.syms.imagefile,
            it.syms.quiet,
            it.syms.starstar,
            it.syms.start,
        );
        it.bindnew(errtag, NIL)?;
        it.bindnew(errval, NIL)?;
        it.bindnew(imagefile, NIL)?;
        it.bindnew(quiet, NIL)?;
        it.bindnew(starstar, NIL)?;
        it.bindnew(start, NIL)?;
        Ok(it)
    }

    /// Re-resolve the special symbols and the primitive table from the
    /// symbol table. Run at startup and after an image restore.
    pub(crate) fn resolve_names(&mut self) -> Result<()> {
        self.syms = Syms {
            i_a: self.symref(b"a")?,
            i_e: self.symref(b"e")?,
            i_arg: self.symref(b"%arg")?,
            i_closure: self.symref(b"%closure")?,
            i_ref: self.symref(b"%ref")?,
            apply: self.symref(b"apply")?,
            def: self.symref(b"def")?,
            defmac: self.symref(b"defmac")?,
            defun: self.symref(b"defun")?,
            errtag: self.symref(b"*errtag*")?,
            errval: self.symref(b"*errval*")?,
            if_: self.symref(b"if")?,
            ifstar: self.symref(b"if*")?,
            imagefile: self.symref(b"*imagefile*")?,
            labels: self.symref(b"labels")?,
            lambda: self.symref(b"lambda")?,
            macro_: self.symref(b"macro")?,
            prog: self.symref(b"prog")?,
            quiet: self.symref(b"*quiet*")?,
            quote: self.symref(b"quote")?,
            qquote: self.symref(b"qquote")?,
            unquote: self.symref(b"unquote")?,
            splice: self.symref(b"splice")?,
            starstar: self.symref(b"**")?,
            setq: self.symref(b"setq")?,
            start: self.symref(b"start")?,
            load: self.symref(b"load")?,
        };
        self.subrs = HashMap::new();
        for &(name, kind, op) in crate::compiler::SUBR_TABLE {
            let y = self.symref(name.as_bytes())?;
            self.subrs.insert(y, Subr { kind, op });
        }
        Ok(())
    }

    /// A handle on the cooperative interrupt flag. Setting it stops
    /// the VM at the next instruction boundary and aborts reading and
    /// printing at their next safe point.
    #[must_use]
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.intr)
    }

    #[inline]
    pub(crate) fn interrupted(&self) -> bool {
        self.intr.load(Ordering::Relaxed)
    }

    pub(crate) fn clear_interrupt(&mut self) {
        self.intr.store(false, Ordering::Relaxed);
        self.mxlev = 0;
    }

    /// Quiet mode: no banner, no prompt, errors end the process.
    pub fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }

    #[must_use]
    pub const fn quiet(&self) -> bool {
        self.quiet
    }

    // ----- trace ring -----

    pub(crate) fn clrtrace(&mut self) {
        self.trace = [-1; NTRACE];
        self.tp = 0;
    }

    pub(crate) fn gottrace(&self) -> bool {
        self.trace.iter().any(|&t| t != -1)
    }

    // ----- error raising -----

    /// Build a recoverable error. The offending object is rendered
    /// immediately: it may be reclaimed while the error unwinds.
    pub(crate) fn error(&mut self, msg: &str, obj: Cell) -> Error {
        Error::Lisp {
            msg: msg.to_string(),
            detail: if obj == UNDEF {
                None
            } else {
                Some(self.render_limited(obj))
            },
        }
    }

    /// Type-error helper: `who: expected what`.
    pub(crate) fn expect(&mut self, who: &str, what: &str, got: Cell) -> Error {
        self.error(&format!("{who}: expected {what}"), got)
    }

    /// Render an object for an error report, capped at 100 bytes.
    fn render_limited(&mut self, obj: Cell) -> String {
        let saved_plimit = self.plimit;
        self.plimit = 100;
        let s = self.format_host(obj);
        let truncated = self.plimit == 1;
        self.plimit = saved_plimit;
        match s {
            Ok(mut s) => {
                if truncated {
                    s.push_str("...");
                }
                s
            }
            Err(_) => String::from("?"),
        }
    }

    /// Report an error on the error port: message, offending object,
    /// source position when loading, and the recent global references.
    pub fn report(&mut self, e: &Error) {
        let Error::Lisp { msg, detail } = e else {
            let _ = self.prints_err(&format!("*** {e}\n"));
            return;
        };
        let o = self.set_outport(self.errport);
        let _ = self.prints("*** error: ");
        let _ = self.prints(msg);
        if let Some(d) = detail {
            let _ = self.prints(": ");
            let _ = self.prints(d);
        }
        let _ = self.prints("\n");
        if self.files != NIL {
            let f = self.car(self.files);
            let name = self.string_copy(f);
            let _ = self.prints("*** file: ");
            let _ = self.blockwrite(&name);
            let _ = self.prints(", line: ");
            let line = self.line;
            let _ = self.prints(&line.to_string());
            let _ = self.prints("\n");
        }
        if self.gottrace() {
            let _ = self.prints("*** trace:");
            let mut i = self.tp;
            for _ in 0..NTRACE {
                if i >= NTRACE {
                    i = 0;
                }
                if self.trace[i] != -1 {
                    let y = self.vec_ref(self.symbols, self.trace[i] as usize);
                    let name = self.sym_copy(y);
                    let _ = self.prints(" ");
                    let _ = self.blockwrite(&name);
                }
                i += 1;
            }
            let _ = self.prints("\n");
        }
        self.set_outport(o);
    }

    fn prints_err(&mut self, s: &str) -> Result<()> {
        let o = self.set_outport(self.errport);
        let r = self.prints(s);
        self.set_outport(o);
        r
    }

    // ----- global environment -----

    /// Bind a fresh global: prepend `(sym value)` to the association
    /// list; the binding's tail pair is the variable's box.
    pub(crate) fn bindnew(&mut self, v: Cell, a: Cell) -> Result<()> {
        let n = self.cons(a, NIL)?;
        let n = self.cons(v, n)?;
        self.glob = self.cons(n, self.glob)?;
        Ok(())
    }

    /// First binding of `x` in the association list `a`, or NIL.
    pub(crate) fn assq(&self, x: Cell, mut a: Cell) -> Cell {
        while a != NIL {
            if self.caar(a) == x {
                return self.car(a);
            }
            a = self.cdr(a);
        }
        NIL
    }

    /// Assign through an existing global binding; no effect when the
    /// variable is unbound.
    pub(crate) fn bindset(&mut self, v: Cell, a: Cell) {
        let b = self.assq(v, self.glob);
        if b != NIL {
            let bx = self.cdr(b);
            self.set_car(bx, a);
        }
    }

    // ----- evaluator entry -----

    /// Save the VM registers on the protection stack around a
    /// reentrant evaluation (macro expansion, `load`, `eval`).
    pub(crate) fn begin_rec(&mut self) -> Result<()> {
        self.protect(self.prog)?;
        self.protect(self.ep)?;
        let n = self.mkfix(self.ip as i32)?;
        self.protect(n)?;
        let n = self.mkfix(self.sp)?;
        self.protect(n)?;
        let n = self.mkfix(self.fp)?;
        self.protect(n)?;
        Ok(())
    }

    /// Restore the registers saved by [`Self::begin_rec`].
    pub(crate) fn end_rec(&mut self) -> Result<()> {
        let n = self.unprot(1)?;
        self.fp = self.fixval(n);
        let n = self.unprot(1)?;
        self.sp = self.fixval(n);
        let n = self.unprot(1)?;
        self.ip = self.fixval(n) as usize;
        self.ep = self.unprot(1)?;
        self.prog = self.unprot(1)?;
        Ok(())
    }

    /// Evaluate one form: expand, syntax-check, closure-convert,
    /// compile, run. With `rec` the VM registers are saved and
    /// restored so the evaluator can be reentered mid-run.
    ///
    /// # Errors
    ///
    /// Any reader, compiler or runtime error of the form.
    pub fn eval(&mut self, x: Cell, rec: bool) -> Result<Cell> {
        self.tmp = x;
        if rec {
            self.begin_rec()?;
        }
        self.protect(x)?;
        self.tmp = NIL;
        let x = self.expand(x, true)?;
        self.protected_set0(x);
        self.syncheck(x, true)?;
        let x = self.clsconv(x)?;
        self.protected_set0(x);
        let x = self.compile(x)?;
        self.protected_set0(x);
        let x = self.interpret(x)?;
        self.unprot(1)?;
        if rec {
            self.end_rec()?;
        }
        Ok(x)
    }

    /// Build the initial environment vector from the global bindings
    /// and run a compiled program. The result is the accumulator.
    pub(crate) fn interpret(&mut self, x: Cell) -> Result<Cell> {
        let k = self.length(self.glob);
        self.e0 = self.mkvec(k as usize)?;
        let mut n = self.glob;
        let mut i = 0;
        while n != NIL {
            let b = self.cdar(n);
            self.vec_set(self.e0, i, b);
            i += 1;
            n = self.cdr(n);
        }
        self.ep = self.e0;
        self.run(x)?;
        Ok(self.acc)
    }

    /// Read and evaluate every form in `src`, returning the last
    /// result. Reader errors are raised, not returned as sentinels.
    ///
    /// # Errors
    ///
    /// Any reader, compiler or runtime error of any form in `src`.
    pub fn eval_str(&mut self, src: &str) -> Result<Cell> {
        let saved = self.instr.take();
        self.instr = Some(StrInput::new(src.as_bytes()));
        let mut result = NIL;
        loop {
            let x = match self.xread() {
                Ok(x) => x,
                Err(e) => {
                    self.instr = saved;
                    return Err(e);
                }
            };
            if let Some(msg) = self.readerr.take() {
                self.instr = saved;
                return Err(Error::Lisp { msg, detail: None });
            }
            if x == crate::cell::EOFMARK {
                break;
            }
            self.mxlev = 0;
            // reading is finished for this form; evaluation may read
            // on its own (e.g. `load`), so release the string input
            let pending = self.instr.take();
            let r = self.eval(x, false);
            self.instr = pending;
            match r {
                Ok(v) => result = v,
                Err(e) => {
                    self.instr = saved;
                    return Err(e);
                }
            }
        }
        self.instr = saved;
        Ok(result)
    }
}
