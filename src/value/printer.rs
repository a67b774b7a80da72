// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Printer for Sylva values.
//!
//! `prin` writes the machine-readable form (strings quoted and
//! escaped, characters as `#\X`), `princ` the display form. Nesting
//! is capped by the print depth so cyclic structures terminate, and
//! a byte limit truncates error-report output.

#[cfg(test)]
#[path = "printer_test.rs"]
mod printer_test;

use crate::PRDEPTH;
use crate::cell::{Cell, EOFMARK, NIL, TRUE, UNDEF, specialp};
use crate::error::Result;
use crate::interp::Interp;

/// Render an integer in radix `r` (2..36).
pub(crate) fn ntoa(mut x: i32, r: i32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let neg = x < 0;
    let mut buf = Vec::new();
    while x != 0 || buf.is_empty() {
        buf.push(DIGITS[(x % r).unsigned_abs() as usize]);
        x /= r;
    }
    if neg {
        buf.push(b'-');
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

impl Interp {
    fn prchar(&mut self, sl: bool, x: Cell) -> Result<()> {
        let v = self.charval(x);
        if sl {
            self.prints("#\\")?;
            if v == 9 {
                self.prints("ht")
            } else if v == 10 {
                self.prints("nl")
            } else if v == i32::from(b' ') {
                self.prints("sp")
            } else if !(32..=126).contains(&v) {
                self.prints("\\")?;
                self.prints(&ntoa(v, 8))
            } else {
                self.writec(v as u8)
            }
        } else {
            self.writec(v as u8)
        }
    }

    fn prfix(&mut self, x: Cell) -> Result<()> {
        let v = self.fixval(x);
        self.prints(&ntoa(v, 10))
    }

    fn prstr(&mut self, sl: bool, x: Cell) -> Result<()> {
        if !sl {
            // display form: bytes up to the NUL
            let b = self.string_copy(x);
            let upto = b.iter().position(|&c| c == 0).unwrap_or(b.len());
            return self.blockwrite(&b[..upto]);
        }
        self.writec(b'"')?;
        let k = self.string_len(x) - 1;
        for i in 0..k {
            let c = self.string_byte(x, i);
            if c == b'"' {
                self.prints("\\\"")?;
            } else if c == b'\\' {
                self.prints("\\\\")?;
            } else if c == 10 {
                self.prints("\\n")?;
            } else if !(b' '..=126).contains(&c) {
                self.writec(b'\\')?;
                // pad so a following octal digit is not swallowed
                if i + 1 < k && (b'0'..=b'7').contains(&self.string_byte(x, i + 1)) {
                    if c < 100 {
                        self.writec(b'0')?;
                    }
                    if c < 10 {
                        self.writec(b'0')?;
                    }
                }
                self.prints(&ntoa(i32::from(c), 8))?;
            } else {
                self.writec(c)?;
            }
        }
        self.writec(b'"')
    }

    fn prlist(&mut self, sl: bool, mut x: Cell, d: i32) -> Result<()> {
        self.writec(b'(')?;
        while x != NIL && self.plimit != 1 {
            self.prex(sl, self.car(x), d + 1)?;
            x = self.cdr(x);
            if x != NIL {
                self.writec(b' ')?;
                if self.is_atom(x) {
                    self.prints(". ")?;
                    self.prex(sl, x, d + 1)?;
                    break;
                }
            }
        }
        self.writec(b')')
    }

    fn prvec(&mut self, sl: bool, x: Cell, d: i32) -> Result<()> {
        self.prints("#(")?;
        let k = self.veclen(x);
        for i in 0..k {
            let e = self.vec_ref(x, i);
            self.prex(sl, e, d + 1)?;
            if i < k - 1 {
                self.writec(b' ')?;
            }
        }
        self.writec(b')')
    }

    fn prport(&mut self, out: bool, x: Cell) -> Result<()> {
        self.prints("#<")?;
        self.prints(if out { "out" } else { "in" })?;
        self.prints("port ")?;
        let p = self.portno(x);
        self.prints(&ntoa(p, 10))?;
        self.prints(">")
    }

    fn quoted(&self, x: Cell, q: Cell) -> bool {
        self.car(x) == q && self.cdr(x) != NIL && self.cddr(x) == NIL
    }

    fn prquote(&mut self, sl: bool, x: Cell, d: i32) -> Result<()> {
        let h = self.car(x);
        if h == self.syms.quote {
            self.writec(b'\'')?;
        } else if h == self.syms.qquote {
            self.writec(b'@')?;
        } else if h == self.syms.unquote {
            self.writec(b',')?;
        } else if h == self.syms.splice {
            self.prints(",@")?;
        }
        self.prex(sl, self.cadr(x), d)
    }

    pub(crate) fn prex(&mut self, sl: bool, x: Cell, d: i32) -> Result<()> {
        if d > PRDEPTH {
            self.prints("\n")?;
            return Err(self.error("prin: nesting too deep", UNDEF));
        }
        if self.interrupted() {
            self.clear_interrupt();
            return Err(self.error("interrupted", UNDEF));
        }
        if x == NIL {
            self.prints("nil")
        } else if x == TRUE {
            self.prints("t")
        } else if x == EOFMARK {
            self.prints("#<eof>")
        } else if x == UNDEF {
            self.prints("#<undef>")
        } else if self.is_char(x) {
            self.prchar(sl, x)
        } else if self.is_fix(x) {
            self.prfix(x)
        } else if self.is_symbol(x) {
            let name = self.sym_copy(x);
            self.blockwrite(&name)
        } else if self.is_string(x) {
            self.prstr(sl, x)
        } else if self.is_vector(x) {
            self.prvec(sl, x, d)
        } else if self.is_closure(x) {
            self.prints("#<function>")
        } else if self.is_ctag(x) {
            self.prints("#<catch tag>")
        } else if self.is_inport(x) {
            self.prport(false, x)
        } else if self.is_outport(x) {
            self.prport(true, x)
        } else if specialp(x) {
            self.prints("#<special object ")?;
            self.prints(&ntoa(x, 10))?;
            self.prints(">")
        } else if self.is_atom(x) {
            self.prints("#<atom ")?;
            let c = self.car(x);
            self.prints(&ntoa(c, 10))?;
            self.prints(">")
        } else if self.quoted(x, self.syms.quote)
            || self.quoted(x, self.syms.qquote)
            || self.quoted(x, self.syms.unquote)
            || self.quoted(x, self.syms.splice)
        {
            self.prquote(sl, x, d)
        } else {
            self.prlist(sl, x, d)
        }
    }

    fn xprint(&mut self, sl: bool, x: Cell) -> Result<()> {
        self.prex(sl, x, 0)?;
        if self.plimit == 1 {
            self.plimit = 0;
            self.prints("...")?;
        }
        Ok(())
    }

    /// Print the machine-readable form.
    pub(crate) fn prin(&mut self, x: Cell) -> Result<()> {
        self.xprint(true, x)
    }

    /// Print the display form.
    pub(crate) fn princ(&mut self, x: Cell) -> Result<()> {
        self.xprint(false, x)
    }

    /// Print the machine-readable form followed by a newline.
    pub(crate) fn print(&mut self, x: Cell) -> Result<()> {
        self.prin(x)?;
        self.nl()
    }

    /// Render a value into a host string through the capture buffer.
    pub(crate) fn format_host(&mut self, x: Cell) -> Result<String> {
        let saved = self.hostcap.replace(Vec::new());
        let r = self.prex(true, x, 0);
        let buf = std::mem::replace(&mut self.hostcap, saved).unwrap_or_default();
        r?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
