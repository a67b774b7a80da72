// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The read-eval-print loop and driver bindings.
//!
//! Each iteration starts from a clean slate: stdio restored, trace
//! ring and runtime stack reset, the error handler and protection
//! list cleared. The last result is bound to `**`.

#[cfg(test)]
mod repl_test;

use crate::cell::{Cell, EOFMARK, NIL, TRUE};
use crate::error::{Error, Result};
use crate::interp::Interp;

impl Interp {
    /// Run the interactive loop until end of input.
    pub fn repl(&mut self) {
        loop {
            self.reset_stdports();
            self.clrtrace();
            let _ = self.initrts();
            let errtag = self.syms.errtag;
            self.bindset(errtag, NIL);
            self.protected = NIL;
            self.running = false;
            self.clear_interrupt();
            if !self.quiet {
                let _ = self.prints("* ");
                let _ = self.flush();
            }
            let x = match self.xread() {
                Ok(x) => x,
                Err(e) => {
                    self.restart(&e);
                    continue;
                }
            };
            if x == EOFMARK && !self.interrupted() {
                break;
            }
            self.mxlev = 0;
            match self.eval(x, false) {
                Ok(v) => {
                    let ss = self.syms.starstar;
                    self.bindset(ss, v);
                    if let Err(e) = self.print(v) {
                        self.restart(&e);
                    }
                }
                Err(e) => self.restart(&e),
            }
        }
        if !self.quiet {
            let _ = self.nl();
        }
    }

    /// Report an error and either resume the loop or, in quiet mode
    /// or on a fatal fault, end the process.
    fn restart(&mut self, e: &Error) {
        self.report(e);
        if self.quiet || !e.recoverable() {
            std::process::exit(1);
        }
    }

    /// Bind the remaining command-line arguments to `(cmdline)`.
    ///
    /// # Errors
    ///
    /// Allocation failure only.
    pub fn bind_cmdline(&mut self, args: &[String]) -> Result<()> {
        self.argv = self.argvec(args)?;
        Ok(())
    }

    fn argvec(&mut self, args: &[String]) -> Result<Cell> {
        if args.is_empty() {
            return Ok(NIL);
        }
        let head = self.cons(NIL, NIL)?;
        self.protect(head)?;
        let mut a = head;
        for (i, s) in args.iter().enumerate() {
            let n = self.mkstr(s.as_bytes())?;
            self.set_car(a, n);
            if i + 1 < args.len() {
                let n = self.cons(NIL, NIL)?;
                self.set_cdr(a, n);
                a = n;
            }
        }
        self.unprot(1)
    }

    /// Mirror the quiet flag into the `*quiet*` global.
    pub fn bind_quiet_global(&mut self) {
        let q = self.syms.quiet;
        let v = if self.quiet { TRUE } else { NIL };
        self.bindset(q, v);
    }

    /// Record the restored image path in `*imagefile*`.
    ///
    /// # Errors
    ///
    /// Allocation failure only.
    pub fn bind_imagefile(&mut self, path: &str) -> Result<()> {
        let s = self.mkstr(path.as_bytes())?;
        let i = self.syms.imagefile;
        self.bindset(i, s);
        Ok(())
    }

    /// Invoke the `start` closure when one is bound.
    ///
    /// # Errors
    ///
    /// Whatever the start closure raises.
    pub fn run_start(&mut self) -> Result<()> {
        let n = self.assq(self.syms.start, self.glob);
        if n == NIL || !self.is_closure(self.cadr(n)) {
            return Ok(());
        }
        let call = self.cons(self.cadr(n), NIL)?;
        self.eval(call, false)?;
        Ok(())
    }
}
