// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Fixnum arithmetic and the bit-operation primitive.
//!
//! All arithmetic is 32-bit with explicit overflow detection; the
//! accumulator holds the newest operand and `arg(0)` the folded one.

use crate::cell::{Cell, UNDEF};
use crate::error::Result;
use crate::interp::Interp;

impl Interp {
    fn fixover(&mut self, who: &str, x: Cell, y: Cell) -> Result<crate::error::Error> {
        let inner = self.cons(y, crate::cell::NIL)?;
        let obj = self.cons(x, inner)?;
        Ok(self.error(&format!("{who}: fixnum overflow"), obj))
    }

    /// `(+ …)` fold step.
    pub(crate) fn b_add(&mut self, x: Cell, y: Cell) -> Result<Cell> {
        if !self.is_fix(x) {
            return Err(self.expect("+", "fixnum", x));
        }
        if !self.is_fix(y) {
            return Err(self.expect("+", "fixnum", y));
        }
        match self.fixval(x).checked_add(self.fixval(y)) {
            Some(v) => self.mkfix(v),
            None => Err(self.fixover("+", x, y)?),
        }
    }

    /// `(- …)` fold step; computes `y - x` since the accumulator
    /// holds the newest operand.
    pub(crate) fn b_sub(&mut self, x: Cell, y: Cell) -> Result<Cell> {
        if !self.is_fix(x) {
            return Err(self.expect("-", "fixnum", x));
        }
        if !self.is_fix(y) {
            return Err(self.expect("-", "fixnum", y));
        }
        match self.fixval(y).checked_sub(self.fixval(x)) {
            Some(v) => self.mkfix(v),
            None => Err(self.fixover("-", y, x)?),
        }
    }

    /// `(* …)` fold step.
    pub(crate) fn b_mul(&mut self, x: Cell, y: Cell) -> Result<Cell> {
        if !self.is_fix(x) {
            return Err(self.expect("*", "fixnum", x));
        }
        if !self.is_fix(y) {
            return Err(self.expect("*", "fixnum", y));
        }
        let a = self.fixval(x);
        let b = self.fixval(y);
        if a == 0 || b == 0 {
            return Ok(self.zero);
        }
        if a == 1 {
            return Ok(y);
        }
        if b == 1 {
            return Ok(x);
        }
        match a.checked_mul(b) {
            Some(v) => self.mkfix(v),
            None => Err(self.fixover("*", x, y)?),
        }
    }

    /// Integer division truncating toward zero.
    pub(crate) fn b_div(&mut self, x: Cell, y: Cell) -> Result<Cell> {
        if !self.is_fix(x) {
            return Err(self.expect("div", "fixnum", x));
        }
        if !self.is_fix(y) {
            return Err(self.expect("div", "fixnum", y));
        }
        if self.fixval(y) == 0 {
            return Err(self.error("div: divide by zero", UNDEF));
        }
        match self.fixval(x).checked_div(self.fixval(y)) {
            Some(v) => self.mkfix(v),
            None => Err(self.fixover("div", x, y)?),
        }
    }

    /// Division remainder, sign of the dividend.
    pub(crate) fn b_rem(&mut self, x: Cell, y: Cell) -> Result<Cell> {
        if !self.is_fix(x) {
            return Err(self.expect("rem", "fixnum", x));
        }
        if !self.is_fix(y) {
            return Err(self.expect("rem", "fixnum", y));
        }
        if self.fixval(y) == 0 {
            return Err(self.error("rem: divide by zero", UNDEF));
        }
        match self.fixval(x).checked_rem(self.fixval(y)) {
            Some(v) => self.mkfix(v),
            None => Err(self.fixover("rem", x, y)?),
        }
    }

    /// `(bitop op a b …)` fold step over unsigned 32-bit words.
    /// The 19 operations cover the 16 two-variable boolean functions
    /// plus shift left, arithmetic shift right and logical shift
    /// right.
    pub(crate) fn bitop(&mut self, x: Cell, y: Cell, o: Cell) -> Result<Cell> {
        if !self.is_fix(o) {
            return Err(self.expect("bitop", "fixnum", o));
        }
        if !self.is_fix(x) {
            return Err(self.expect("bitop", "fixnum", x));
        }
        if !self.is_fix(y) {
            return Err(self.expect("bitop", "fixnum", y));
        }
        let op = self.fixval(o);
        let b = self.fixval(x) as u32;
        let a = self.fixval(y) as u32;
        let i = self.fixval(y);
        let r: u32 = match op {
            0 => 0,
            1 => a & b,
            2 => a & !b,
            3 => a,
            4 => !a & b,
            5 => b,
            6 => a ^ b,
            7 => a | b,
            8 => !(a | b),
            9 => !(a ^ b),
            10 => !b,
            11 => a | !b,
            12 => !a,
            13 => !a | b,
            14 => !(a & b),
            15 => !0,
            16 => a.checked_shl(b).unwrap_or(0),
            17 => i.checked_shr(b).unwrap_or(if i < 0 { -1 } else { 0 }) as u32,
            18 => a.checked_shr(b).unwrap_or(0),
            _ => return Err(self.error("bitop: invalid opcode", o)),
        };
        self.mkfix(r as Cell)
    }
}
