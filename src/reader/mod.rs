// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Reader for Sylva source text.
//!
//! A recursive-descent S-expression parser over the current input
//! port or an in-memory string. Compound literals it produces are
//! immutable (CONST). When reading from a string, syntax errors set
//! the `readerr` sentinel instead of raising, so `(read "...")` can
//! report them as data.

#[cfg(test)]
mod reader_test;

use crate::cell::{Cell, DOT, EOFMARK, NIL, RPAREN, TRUE, Tag, UNDEF};
use crate::error::Result;
use crate::interp::Interp;
use crate::ports::EOF;
use crate::TOKLEN;

/// In-memory input source with one byte of pushback.
pub struct StrInput {
    bytes: Vec<u8>,
    pos: usize,
    rejected: Option<u8>,
}

impl StrInput {
    pub(crate) fn new(b: &[u8]) -> Self {
        Self {
            bytes: b.to_vec(),
            pos: 0,
            rejected: None,
        }
    }

    pub(crate) fn readc(&mut self) -> i32 {
        if let Some(r) = self.rejected.take() {
            return i32::from(r);
        }
        match self.bytes.get(self.pos) {
            None | Some(0) => EOF,
            Some(&b) => {
                self.pos += 1;
                i32::from(b)
            }
        }
    }

    pub(crate) fn rejectc(&mut self, c: i32) {
        if c >= 0 {
            self.rejected = Some(c as u8);
        }
    }
}

/// Characters that may appear in symbols and numbers.
fn symbolic(c: i32) -> bool {
    if c < 0 {
        return false;
    }
    let c = c as u8;
    c.is_ascii_alphanumeric() || b"!$%^&*-/_+=~.?<>:".contains(&c)
}

fn octalp(c: i32) -> bool {
    (b'0' as i32..=b'7' as i32).contains(&c)
}

/// Parse a NUL-free byte run as an octal value; -1 when it is not
/// entirely octal or exceeds 255.
fn octchar(s: &[u8]) -> i32 {
    if s.is_empty() || !octalp(i32::from(s[0])) {
        return -1;
    }
    let mut v: i32 = 0;
    for &b in s {
        if !octalp(i32::from(b)) {
            return -1;
        }
        v = 8 * v + (i32::from(b) - i32::from(b'0'));
        if v > 255 {
            return -1;
        }
    }
    v
}

/// Digit value in bases up to 36, or -1.
fn digit_value(c: i32) -> i32 {
    match c as u8 {
        b'0'..=b'9' => c - i32::from(b'0'),
        b'a'..=b'z' => c - i32::from(b'a') + 10,
        _ => -1,
    }
}

impl Interp {
    /// Record a reader error: raised when reading from a port, stored
    /// in the sentinel when reading from a string.
    fn rderror(&mut self, msg: &str, obj: Cell) -> Result<()> {
        if self.instr.is_none() {
            return Err(self.error(msg, obj));
        }
        if self.readerr.is_none() {
            self.readerr = Some(msg.to_string());
        }
        Ok(())
    }

    /// Read a `#\` character literal.
    fn rdchar(&mut self) -> Result<Cell> {
        let mut name = [0u8; TOKLEN];
        let mut c = self.readc()?;
        name[0] = c as u8;
        c = self.readc()?;
        let mut i = 1;
        while i < TOKLEN {
            if self.interrupted() || self.readerr.is_some() {
                return Ok(NIL);
            }
            if !(c >= 0 && (c as u8).is_ascii_alphanumeric()) {
                break;
            }
            name[i] = c as u8;
            c = self.readc()?;
            i += 1;
        }
        self.rejectc(c);
        if i == TOKLEN {
            let obj = self.mkstr(&name[..i])?;
            self.rderror("char name too long", obj)?;
            return Ok(NIL);
        }
        let tok = &name[..i];
        if tok.eq_ignore_ascii_case(b"ht") {
            return self.mkchar(9);
        }
        if tok.eq_ignore_ascii_case(b"nl") {
            return self.mkchar(10);
        }
        if tok.eq_ignore_ascii_case(b"sp") {
            return self.mkchar(i32::from(b' '));
        }
        let v = octchar(&name[1..i]);
        if name[0] == b'\\' && v >= 0 {
            return self.mkchar(v);
        }
        if i > 1 {
            let v = octchar(&name[..i]);
            if v >= 0 {
                return self.mkchar(v);
            }
        }
        if i != 1 {
            let obj = self.mkstr(&name[..i])?;
            self.rderror("bad character name", obj)?;
            return Ok(NIL);
        }
        self.mkchar(i32::from(name[0]))
    }

    /// Read the remainder of a list after `(`.
    fn rdlist(&mut self) -> Result<Cell> {
        const BADPAIR: &str = "malformed pair";

        self.inlist += 1;
        let mut n = self.xread2()?;
        if n == RPAREN {
            self.inlist -= 1;
            return Ok(NIL);
        }
        let mut p = NIL;
        let mut a = self.alloc(n, NIL, Tag::CONST)?;
        self.protect(a)?;
        while n != RPAREN {
            if self.interrupted() || self.readerr.is_some() {
                self.unprot(1)?;
                return Ok(NIL);
            }
            if n == EOFMARK {
                self.unprot(1)?;
                self.rderror("missing ')'", UNDEF)?;
                return Ok(NIL);
            }
            if n == DOT {
                if p == NIL {
                    self.unprot(1)?;
                    self.rderror(BADPAIR, UNDEF)?;
                    return Ok(NIL);
                }
                n = self.xread2()?;
                self.set_cdr(p, n);
                if n == RPAREN || self.xread2()? != RPAREN {
                    self.unprot(1)?;
                    self.rderror(BADPAIR, UNDEF)?;
                    return Ok(NIL);
                }
                self.inlist -= 1;
                return self.unprot(1);
            }
            self.set_car(a, n);
            p = a;
            n = self.xread2()?;
            if n != RPAREN {
                self.tmp = n;
                let new = self.alloc(NIL, NIL, Tag::CONST)?;
                self.tmp = NIL;
                self.set_cdr(a, new);
                a = new;
            }
        }
        self.inlist -= 1;
        self.unprot(1)
    }

    /// Read a `#( … )` vector literal.
    fn rdvec(&mut self) -> Result<Cell> {
        let l = self.rdlist()?;
        self.listvec(l, true)
    }

    /// Scan a token as a fixnum in radix `r`. NIL when the token is
    /// not a number in that radix; with `of` set, overflow is a
    /// reader error rather than a silent NIL.
    pub(crate) fn scanfix(&mut self, s: &[u8], r: i32, of: bool) -> Result<Cell> {
        let mut g: i32 = 1;
        let mut p = 0;
        if s.first() == Some(&b'+') {
            p = 1;
        } else if s.first() == Some(&b'-') {
            p = 1;
            g = -1;
        }
        let mut v: i32 = 0;
        while p < s.len() {
            let i = digit_value(i32::from(s[p].to_ascii_lowercase()));
            if i < 0 || i >= r {
                return Ok(NIL);
            }
            let scaled = v.checked_mul(r);
            let next = scaled.and_then(|w| if v < 0 { w.checked_sub(i) } else { w.checked_add(i) });
            match next {
                Some(w) => v = w,
                None => {
                    if !of {
                        return Ok(NIL);
                    }
                    let obj = self.mkstr(s)?;
                    self.rderror("fixnum too big", obj)?;
                    return Ok(NIL);
                }
            }
            p += 1;
            if g != 0 {
                v *= g;
                g = 0;
            }
        }
        if g != 0 {
            return Ok(NIL);
        }
        self.mkfix(v)
    }

    /// Read a symbol or a fixnum in radix `r`, starting at `c`.
    fn rdsymfix(&mut self, mut c: i32, r: i32, sym: bool) -> Result<Cell> {
        let mut name = [0u8; TOKLEN];
        let mut i = 0;
        while i < TOKLEN {
            if !symbolic(c) {
                break;
            }
            name[i] = (c as u8).to_ascii_lowercase();
            c = self.readc()?;
            i += 1;
        }
        self.rejectc(c);
        if i == TOKLEN {
            let obj = self.mkstr(&name[..i])?;
            self.rderror("symbol or fixnum too long", obj)?;
            return Ok(NIL);
        }
        let tok: Vec<u8> = name[..i].to_vec();
        let n = self.scanfix(&tok, r, true)?;
        if n != NIL {
            return Ok(n);
        }
        if !sym {
            let obj = self.mkstr(&tok)?;
            self.rderror("invalid digits after #radixR", obj)?;
            return Ok(NIL);
        }
        if tok == b"t" {
            return Ok(TRUE);
        }
        if tok == b"nil" {
            return Ok(NIL);
        }
        self.symref(&tok)
    }

    /// Read a `#NNrDDD` radix fixnum; `c` is the first radix digit.
    fn rdfix(&mut self, mut c: i32) -> Result<Cell> {
        let mut r: i32 = 0;
        while c >= 0 && (c as u8).is_ascii_digit() {
            r = r.saturating_mul(10).saturating_add(c - i32::from(b'0'));
            c = self.readc()?;
        }
        if c != i32::from(b'r') {
            self.rderror("'R' expected after #radix", UNDEF)?;
            return Ok(NIL);
        }
        if !(2..=36).contains(&r) {
            let obj = self.mkfix(r)?;
            self.rderror("bad radix in #radixR", obj)?;
            return Ok(NIL);
        }
        let c = self.readc()?;
        self.rdsymfix(c, r, false)
    }

    /// Read a string literal after the opening quote.
    fn rdstr(&mut self) -> Result<Cell> {
        let mut name = [0u8; TOKLEN];
        let mut c = self.readc()?;
        let mut u: i32 = 0;
        let mut i = 0;
        while i < TOKLEN {
            if self.interrupted() || self.readerr.is_some() {
                return Ok(NIL);
            }
            if c == i32::from(b'"') {
                break;
            }
            if c == i32::from(b'\n') {
                self.line += 1;
            }
            if c == EOF {
                self.rderror("EOF in string", UNDEF)?;
                return Ok(NIL);
            }
            if c == i32::from(b'\\') {
                c = self.readc()?;
                if c == i32::from(b'\\') || c == i32::from(b'"') {
                    // literal
                } else if c == i32::from(b't') {
                    c = i32::from(b'\t');
                } else if c == i32::from(b'n') {
                    c = i32::from(b'\n');
                } else if octalp(c) {
                    let mut v = 0;
                    let mut j = 0;
                    while j < 3 && octalp(c) {
                        v = v * 8 + c - i32::from(b'0');
                        c = self.readc()?;
                        j += 1;
                    }
                    self.rejectc(c);
                    if v > 255 {
                        let obj = self.mkfix(v)?;
                        self.rderror("invalid char", obj)?;
                        return Ok(NIL);
                    }
                    c = v;
                } else if u == 0 {
                    u = c;
                }
            }
            name[i] = c as u8;
            c = self.readc()?;
            i += 1;
        }
        if u != 0 {
            let obj = self.mkchar(u)?;
            self.rderror("unknown slash sequence", obj)?;
            return Ok(NIL);
        }
        if i >= TOKLEN {
            let obj = self.mkstr(&name[..i])?;
            self.rderror("string too long", obj)?;
            return Ok(NIL);
        }
        let n = self.mkstr(&name[..i])?;
        if n != self.nullstr {
            self.tags[n as usize].insert(Tag::CONST);
        }
        Ok(n)
    }

    /// Read `'x` as `(q x)`.
    fn rdquote(&mut self, q: Cell) -> Result<Cell> {
        self.quoting += 1;
        let n = self.xread2()?;
        self.quoting -= 1;
        let inner = self.cons(n, NIL)?;
        self.cons(q, inner)
    }

    /// Top-level `,X ARG` meta commands.
    fn meta(&mut self) -> Result<Cell> {
        let mut s = [0u8; 128];
        let cmd = i32::from((self.readc()? as u8).to_ascii_lowercase());
        let mut c = self.readc()?;
        while c == i32::from(b' ') {
            c = self.readc()?;
        }
        let mut i = 0;
        while c != i32::from(b'\n') && c != EOF {
            if i < s.len() - 6 {
                s[i] = c as u8;
                i += 1;
            }
            c = self.readc()?;
        }
        self.rejectc(c);
        let mut arg = s[..i].to_vec();
        if cmd == i32::from(b'l') {
            arg.extend_from_slice(b".syl");
        }
        let n = self.mkstr(&arg)?;
        let n = if i == 0 { NIL } else { self.cons(n, NIL)? };
        self.protect(n)?;
        let cmdsym = match cmd as u8 {
            b'c' => self.symref(b"syscmd")?,
            b'h' => self.symref(b"help")?,
            b'l' => self.syms.load,
            _ => {
                self.unprot(1)?;
                self.prints(",c = syscmd\n")?;
                self.prints(",h = help\n")?;
                self.prints(",l = load\n")?;
                return Ok(NIL);
            }
        };
        let n = self.unprot(1)?;
        self.cons(cmdsym, n)
    }

    /// Read one expression, reader-internal markers included.
    fn xread2(&mut self) -> Result<Cell> {
        let mut c = self.readc()?;
        loop {
            while c == i32::from(b' ')
                || c == i32::from(b'\t')
                || c == i32::from(b'\n')
                || c == i32::from(b'\r')
            {
                if self.interrupted() || self.readerr.is_some() {
                    return Ok(NIL);
                }
                if c == i32::from(b'\n') {
                    self.line += 1;
                }
                c = self.readc()?;
            }
            if c != i32::from(b';') {
                break;
            }
            while c != i32::from(b'\n') && c != EOF {
                c = self.readc()?;
            }
        }
        if self.interrupted() || self.readerr.is_some() {
            return Ok(NIL);
        }
        if c == EOF {
            return Ok(EOFMARK);
        }
        if c == i32::from(b'#') {
            let c = self.readc()?;
            if c == i32::from(b'\\') {
                return self.rdchar();
            }
            if c == i32::from(b'(') {
                return self.rdvec();
            }
            if c >= 0 && (c as u8).is_ascii_digit() {
                return self.rdfix(c);
            }
            let obj = self.mkchar(c)?;
            self.rderror("bad # syntax", obj)?;
            return Ok(NIL);
        }
        if c == i32::from(b'"') {
            return self.rdstr();
        }
        if c == i32::from(b'(') {
            return self.rdlist();
        }
        if c == i32::from(b')') {
            if self.inlist == 0 {
                self.rderror("unexpected ')'", UNDEF)?;
            }
            return Ok(RPAREN);
        }
        if c == i32::from(b'\'') {
            let q = self.syms.quote;
            return self.rdquote(q);
        }
        if c == i32::from(b'`') || c == i32::from(b'@') {
            let q = self.syms.qquote;
            return self.rdquote(q);
        }
        if c == i32::from(b',') {
            if self.inlist == 0 && self.quoting == 0 {
                return self.meta();
            }
            let c = self.readc()?;
            if c == i32::from(b'@') {
                let q = self.syms.splice;
                return self.rdquote(q);
            }
            self.rejectc(c);
            let q = self.syms.unquote;
            return self.rdquote(q);
        }
        if c == i32::from(b'.') {
            if self.inlist == 0 {
                self.rderror("unexpected '.'", UNDEF)?;
            }
            return Ok(DOT);
        }
        if symbolic(c) {
            return self.rdsymfix(c, 10, true);
        }
        let obj = self.mkfix(c)?;
        self.rderror("funny input character, code", obj)?;
        Ok(NIL)
    }

    /// Read one top-level expression from the current input.
    pub(crate) fn xread(&mut self) -> Result<Cell> {
        self.inlist = 0;
        self.quoting = 0;
        self.readerr = None;
        let x = self.xread2()?;
        if self.interrupted() {
            return Err(self.error("aborted", UNDEF));
        }
        Ok(x)
    }
}
