// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Symbol interning and the literal pool.
//!
//! Both tables live on the managed heap so they survive an image dump:
//! a hash table is a `(count . bucket-vector)` pair whose buckets hold
//! association-list chains. The symbol table proper is a dense vector
//! indexed by symbol id; the literal pool is a dense vector with a
//! parallel byte map of slot states (free / allocated / used).

#[cfg(test)]
mod symtab_test;

use crate::cell::{Cell, NIL, UNDEF, specialp};
use crate::error::Result;
use crate::interp::{Interp, OBALLOC, OBFREE};
use crate::CHUNKSIZE;

/// Bucket counts for in-heap hash tables.
fn htsize(n: i32) -> usize {
    for p in [47, 97, 199, 499, 997, 9973, 19997] {
        if n < p {
            return p as usize;
        }
    }
    39989
}

impl Interp {
    // ----- in-heap hash tables -----

    /// Allocate a hash table sized for `k` entries.
    pub(crate) fn mkht(&mut self, k: i32) -> Result<Cell> {
        let n = self.mkfix(0)?; // mutable entry count, not the shared zero
        self.protect(n)?;
        let v = self.mkvec(htsize(k))?;
        let n = self.cons(n, v)?;
        self.unprot(1)?;
        Ok(n)
    }

    fn htlen(&self, d: Cell) -> usize {
        self.veclen(self.cdr(d))
    }

    fn htelts(&self, d: Cell) -> i32 {
        self.fixval(self.car(d))
    }

    fn htslot(&self, d: Cell, h: usize) -> Cell {
        self.vec_ref(self.cdr(d), h)
    }

    fn set_htslot(&mut self, d: Cell, h: usize, v: Cell) {
        let t = self.cdr(d);
        self.vec_set(t, h, v);
    }

    /// Shift-xor hash over NUL-terminated bytes.
    fn strhash(bytes: &[u8], k: usize) -> usize {
        let mut h: u32 = 0xabcd;
        for &b in bytes {
            if b == 0 {
                break;
            }
            h = ((h << 5).wrapping_add(h)) ^ u32::from(b);
        }
        h as usize % k
    }

    /// Hash any hashable object into `k` buckets.
    fn obhash(&self, x: Cell, k: usize) -> usize {
        if specialp(x) {
            return x.unsigned_abs() as usize % k;
        }
        if self.is_symbol(x) || self.is_string(x) {
            return Self::strhash(self.string_bytes(x), k);
        }
        if self.is_fix(x) {
            return self.fixval(x).unsigned_abs() as usize % k;
        }
        if self.is_char(x) {
            return self.charval(x) as usize % k;
        }
        0
    }

    /// Structural equality for table keys: identity, or equal scalar
    /// payloads, or equal symbol/string bytes.
    pub(crate) fn obj_match(&self, a: Cell, b: Cell) -> bool {
        if a == b {
            return true;
        }
        if self.is_fix(a) && self.is_fix(b) {
            return self.fixval(a) == self.fixval(b);
        }
        if self.is_char(a) && self.is_char(b) {
            return self.charval(a) == self.charval(b);
        }
        if (self.is_symbol(a) && self.is_symbol(b)) || (self.is_string(a) && self.is_string(b)) {
            return self.string_bytes(a) == self.string_bytes(b);
        }
        false
    }

    /// Rehash into the next larger bucket count.
    fn htgrow(&mut self, d: Cell) -> Result<()> {
        let k = self.htlen(d);
        let nd = self.mkht(1 + k as i32)?;
        self.protect(nd)?;
        let nk = self.htlen(nd);
        for i in 0..k {
            let mut e = self.htslot(d, i);
            while e != NIL {
                let h = self.obhash(self.caar(e), nk);
                let n = self.cons(self.car(e), self.htslot(nd, h))?;
                self.set_htslot(nd, h, n);
                e = self.cdr(e);
            }
        }
        let t = self.cdr(nd);
        self.set_cdr(d, t);
        self.unprot(1)?;
        Ok(())
    }

    /// Find the `(key . value)` entry for `k`, or UNDEF.
    pub(crate) fn htlookup(&self, d: Cell, k: Cell) -> Cell {
        let h = self.obhash(k, self.htlen(d));
        let mut x = self.htslot(d, h);
        while x != NIL {
            if self.obj_match(self.caar(x), k) {
                return self.car(x);
            }
            x = self.cdr(x);
        }
        UNDEF
    }

    /// Add an entry; the key and value are rooted while the chain
    /// grows.
    pub(crate) fn htadd(&mut self, d: Cell, k: Cell, v: Cell) -> Result<()> {
        self.tmp = k;
        self.protect(v)?;
        self.protect(k)?;
        self.tmp = NIL;
        if self.htelts(d) >= self.htlen(d) as i32 {
            self.htgrow(d)?;
        }
        let h = self.obhash(k, self.htlen(d));
        let e = self.cons(k, v)?;
        let e = self.cons(e, self.htslot(d, h))?;
        self.set_htslot(d, h, e);
        let count = self.car(d);
        let c = self.fixval(count) + 1;
        let inner = self.cdr(count);
        self.set_car(inner, c);
        self.unprot(2)?;
        Ok(())
    }

    /// Remove the entry for `k`, if present.
    pub(crate) fn htrem(&mut self, d: Cell, k: Cell) {
        let h = self.obhash(k, self.htlen(d));
        let mut x = self.htslot(d, h);
        let mut prev = NIL;
        while x != NIL {
            if self.obj_match(self.caar(x), k) {
                let rest = self.cdr(x);
                if prev == NIL {
                    self.set_htslot(d, h, rest);
                } else {
                    self.set_cdr(prev, rest);
                }
                let count = self.car(d);
                let c = self.fixval(count) - 1;
                let inner = self.cdr(count);
                self.set_car(inner, c);
                return;
            }
            prev = x;
            x = self.cdr(x);
        }
    }

    // ----- symbol table -----

    /// Look up an interned symbol by name, or NIL.
    pub(crate) fn findsym(&mut self, s: &[u8]) -> Result<Cell> {
        let y = self.mksym(s)?;
        let e = self.htlookup(self.symhash, y);
        if e == UNDEF { Ok(NIL) } else { Ok(self.car(e)) }
    }

    /// Intern a fresh symbol node, assigning it the next id.
    pub(crate) fn intern(&mut self, y: Cell) -> Result<Cell> {
        self.protect(y)?;
        let id = self.mkfix(self.symptr)?;
        self.htadd(self.symhash, y, id)?;
        self.unprot(1)?;
        let k = self.veclen(self.symbols);
        if self.symptr as usize >= k {
            let n = self.mkvec(k + CHUNKSIZE)?;
            for i in 0..k {
                let v = self.vec_ref(self.symbols, i);
                self.vec_set(n, i, v);
            }
            self.symbols = n;
        }
        let sym = self.symbols;
        self.vec_set(sym, self.symptr as usize, y);
        self.symptr += 1;
        Ok(y)
    }

    /// The canonical symbol for a name, interning on first use.
    pub(crate) fn symref(&mut self, s: &[u8]) -> Result<Cell> {
        let y = self.findsym(s)?;
        if y != NIL {
            return Ok(y);
        }
        let new = self.mksym(s)?;
        self.intern(new)
    }

    // ----- literal pool -----

    /// Claim a free literal-pool slot, collecting and then growing
    /// the pool when none is left.
    ///
    /// # Errors
    ///
    /// When the pool has reached its 64Ki-slot ceiling and is full.
    pub(crate) fn obslot(&mut self) -> Result<usize> {
        for _ in 0..2 {
            let mut k = 0;
            for j in 0..2 {
                k = self.veclen(self.obarray);
                for _ in 0..k {
                    if self.string_byte(self.obmap, self.obptr as usize) == OBFREE {
                        let slot = self.obptr as usize;
                        self.set_string_byte(self.obmap, slot, OBALLOC);
                        return Ok(slot);
                    }
                    self.obptr += 1;
                    if self.obptr as usize >= k {
                        self.obptr = 0;
                    }
                }
                if j == 0 {
                    self.gc();
                }
            }
            if k + CHUNKSIZE >= 64 * 1024 {
                break;
            }
            let n = self.mkvec(k + CHUNKSIZE)?;
            for i in 0..k {
                let v = self.vec_ref(self.obarray, i);
                self.vec_set(n, i, v);
            }
            self.obarray = n;
            let n = self.mkstr_blank(k + CHUNKSIZE)?;
            for i in 0..k + CHUNKSIZE {
                self.set_string_byte(n, i, OBFREE);
            }
            for i in 0..k {
                let b = self.string_byte(self.obmap, i);
                self.set_string_byte(n, i, b);
            }
            self.obmap = n;
        }
        Err(self.error("out of object space", UNDEF))
    }

    /// The literal-pool index for `x`: immutable scalars dedupe
    /// through the hash, mutable compounds always get a fresh slot.
    pub(crate) fn obindex(&mut self, x: Cell) -> Result<usize> {
        if self.is_pair(x) || self.is_vector(x) || self.is_closure(x) {
            return self.obslot();
        }
        let n = self.htlookup(self.obhash, x);
        if n != UNDEF {
            let i = self.fixval(self.cdr(n)) as usize;
            if self.string_byte(self.obmap, i) != OBFREE
                && self.obj_match(x, self.vec_ref(self.obarray, i))
            {
                return Ok(i);
            }
            self.htrem(self.obhash, x);
        }
        let i = self.obslot()?;
        let v = self.mkfix(i as i32)?;
        let oh = self.obhash;
        self.htadd(oh, x, v)?;
        Ok(i)
    }
}
