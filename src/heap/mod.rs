// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The managed heap: node pool and vector arena.
//!
//! Nodes live in three parallel arrays (`car`, `cdr`, `tag`) and are
//! reclaimed by mark-and-sweep over a free list threaded through CDR.
//! Vector payloads live in a bump-allocated arena and are reclaimed by
//! mark-and-compact; each payload is preceded by a backlink word
//! naming the owning node and a size word holding the payload size in
//! bytes:
//!
//! ```text
//! arena:  … | backlink | size | payload (rounded to whole words) | …
//!                               ▲
//!                               └── the owner's CDR points here
//! ```
//!
//! Marking is iterative Deutsch-Schorr-Waite pointer reversal: parent
//! pointers are threaded through the cells themselves, so collection
//! needs no auxiliary space. Node states are encoded in (MARK, TRAV):
//! S0 = (0,0) unvisited, S1 = (1,1) CAR visited, S2 = (1,0) done.
//! Vectors keep their traversal index in the backlink word while they
//! are on the parent chain.

#[cfg(test)]
mod heap_test;

use crate::cell::{CELL_BYTES, Cell, NIL, T_BYTECODE, T_INPORT, T_OUTPORT, T_VECTOR, Tag, UNDEF, specialp};
use crate::error::Result;
use crate::interp::{Interp, OBALLOC, OBFREE, OBUSED};
use crate::{NNODES, NPORTS, NVCELLS};

/// Word offsets of the arena header relative to a raw vector start.
pub(crate) const RAW_VECLINK: usize = 0;
pub(crate) const RAW_VECSIZE: usize = 1;
pub(crate) const RAW_VECDATA: usize = 2;

/// Whole arena words needed for a payload of `k` bytes.
#[inline]
pub(crate) const fn vecsize(k: usize) -> usize {
    2 + k.div_ceil(CELL_BYTES)
}

impl Interp {
    // ----- arena word and byte access -----

    #[inline]
    pub(crate) fn vword(&self, w: usize) -> Cell {
        let o = w * CELL_BYTES;
        Cell::from_ne_bytes([
            self.arena[o],
            self.arena[o + 1],
            self.arena[o + 2],
            self.arena[o + 3],
        ])
    }

    #[inline]
    pub(crate) fn set_vword(&mut self, w: usize, v: Cell) {
        let o = w * CELL_BYTES;
        self.arena[o..o + CELL_BYTES].copy_from_slice(&v.to_ne_bytes());
    }

    /// Size word of a vector node: payload size in bytes.
    #[inline]
    pub(crate) fn string_len(&self, n: Cell) -> usize {
        self.vword(self.cdr(n) as usize - 1) as usize
    }

    #[inline]
    pub(crate) fn set_string_len(&mut self, n: Cell, k: usize) {
        let w = self.cdr(n) as usize - 1;
        self.set_vword(w, k as Cell);
    }

    #[inline]
    pub(crate) fn string_byte(&self, n: Cell, i: usize) -> u8 {
        self.arena[self.cdr(n) as usize * CELL_BYTES + i]
    }

    #[inline]
    pub(crate) fn set_string_byte(&mut self, n: Cell, i: usize, b: u8) {
        let o = self.cdr(n) as usize * CELL_BYTES;
        self.arena[o + i] = b;
    }

    /// Payload bytes of a string or symbol, including the trailing NUL.
    #[inline]
    pub(crate) fn string_bytes(&self, n: Cell) -> &[u8] {
        let o = self.cdr(n) as usize * CELL_BYTES;
        &self.arena[o..o + self.string_len(n)]
    }

    #[inline]
    pub(crate) fn string_bytes_mut(&mut self, n: Cell) -> &mut [u8] {
        let o = self.cdr(n) as usize * CELL_BYTES;
        let k = self.string_len(n);
        &mut self.arena[o..o + k]
    }

    /// Logical contents of a string (without the trailing NUL).
    pub(crate) fn string_copy(&self, n: Cell) -> Vec<u8> {
        let b = self.string_bytes(n);
        b[..b.len() - 1].to_vec()
    }

    /// Symbol name bytes (without the trailing NUL).
    pub(crate) fn sym_copy(&self, n: Cell) -> Vec<u8> {
        self.string_copy(n)
    }

    /// Payload length of a vector node, in words.
    #[inline]
    pub(crate) fn veclen(&self, n: Cell) -> usize {
        vecsize(self.string_len(n)) - 2
    }

    #[inline]
    pub(crate) fn vec_ref(&self, n: Cell, i: usize) -> Cell {
        self.vword(self.cdr(n) as usize + i)
    }

    #[inline]
    pub(crate) fn vec_set(&mut self, n: Cell, i: usize, v: Cell) {
        self.set_vword(self.cdr(n) as usize + i, v);
    }

    /// Backlink word of a vector node; doubles as the traversal index
    /// while the vector sits on the mark chain.
    #[inline]
    pub(crate) fn veclink(&self, n: Cell) -> Cell {
        self.vword(self.cdr(n) as usize - 2)
    }

    #[inline]
    pub(crate) fn set_veclink(&mut self, n: Cell, v: Cell) {
        let w = self.cdr(n) as usize - 2;
        self.set_vword(w, v);
    }

    // ----- literal pool marking -----

    /// Walk a bytecode string and flag every literal-pool slot it
    /// references as used. Advances by the fixed size of each opcode.
    fn marklit(&mut self, p: Cell) {
        use crate::bytecode::{ISIZE0, ISIZE1, ISIZE2, op};

        let k = self.string_len(p);
        let mut i = 0;
        while i < k {
            let o = self.string_byte(p, i);
            if o == op::QUOTE {
                let idx = self.fetcharg(p, i + 1);
                self.set_string_byte(self.obmap, idx, OBUSED);
                i += ISIZE1;
            } else if matches!(
                o,
                op::ARG
                    | op::PUSHVAL
                    | op::JMP
                    | op::BRF
                    | op::BRT
                    | op::CLOSURE
                    | op::MKENV
                    | op::ENTER
                    | op::ENTCOL
                    | op::SETARG
                    | op::SETREF
                    | op::MACRO
            ) {
                i += ISIZE1;
            } else if matches!(o, op::REF | op::CPARG | op::CPREF) {
                i += ISIZE2;
            } else {
                i += ISIZE0;
            }
        }
    }

    // ----- marking -----

    /// Mark every node reachable from `n`.
    pub(crate) fn mark(&mut self, mut n: Cell) {
        let mut parent = NIL;
        loop {
            if specialp(n) || self.tags[n as usize].contains(Tag::MARK) {
                if parent == NIL {
                    break;
                }
                if self.tags[parent as usize].contains(Tag::VECTOR) {
                    // parent is a vector in S1
                    let i = self.veclink(parent) as usize;
                    let base = self.cdr(parent) as usize;
                    if self.tags[parent as usize].contains(Tag::TRAV)
                        && i + 1 < self.veclen(parent)
                    {
                        // S1 --> S1: advance to the next slot
                        let x = self.vword(base + i + 1);
                        let t = self.vword(base + i);
                        self.set_vword(base + i + 1, t);
                        self.set_vword(base + i, n);
                        n = x;
                        self.set_veclink(parent, (i + 1) as Cell);
                    } else {
                        // S1 --> done: restore the last slot and the
                        // backlink, pop the parent
                        let x = parent;
                        parent = self.vword(base + i);
                        self.set_vword(base + i, n);
                        n = x;
                        self.set_veclink(n, n);
                    }
                } else if self.tags[parent as usize].contains(Tag::TRAV) {
                    // S1 --> S2: swap to the CDR side
                    let x = self.cdr(parent);
                    let c = self.car(parent);
                    self.set_cdr(parent, c);
                    self.set_car(parent, n);
                    self.tags[parent as usize].remove(Tag::TRAV);
                    n = x;
                } else {
                    // S2 --> done: restore CDR, pop the parent
                    let x = parent;
                    parent = self.cdr(x);
                    self.set_cdr(x, n);
                    n = x;
                }
            } else if self.tags[n as usize].contains(Tag::VECTOR) {
                // S0 --> S1
                self.tags[n as usize].insert(Tag::MARK);
                if self.car(n) == T_VECTOR && self.veclen(n) != 0 {
                    self.tags[n as usize].insert(Tag::TRAV);
                    self.set_veclink(n, 0);
                    let base = self.cdr(n) as usize;
                    let x = self.vword(base);
                    self.set_vword(base, parent);
                    parent = n;
                    n = x;
                } else {
                    self.set_veclink(n, n);
                }
            } else if self.tags[n as usize].contains(Tag::ATOM) {
                // S0 --> S2
                if self.cdr(n) != NIL {
                    if self.car(n) == T_BYTECODE {
                        let p = self.cdr(n);
                        self.marklit(p);
                    } else if self.car(n) == T_INPORT || self.car(n) == T_OUTPORT {
                        let p = self.portno(n) as usize;
                        self.port_flags[p].insert(Tag::USED);
                    }
                }
                let x = self.cdr(n);
                self.set_cdr(n, parent);
                parent = n;
                n = x;
                self.tags[parent as usize].insert(Tag::MARK);
            } else {
                // S0 --> S1 (pair)
                let x = self.car(n);
                self.set_car(n, parent);
                self.tags[n as usize].insert(Tag::MARK);
                parent = n;
                n = x;
                self.tags[parent as usize].insert(Tag::TRAV);
            }
        }
    }

    // ----- collection -----

    /// Mark-and-sweep over the node pool. Returns the number of nodes
    /// reclaimed. Also closes unreferenced ports and downgrades
    /// literal-pool slots.
    pub(crate) fn gc(&mut self) -> usize {
        for i in 0..NPORTS {
            if self.port_flags[i].contains(Tag::LOCK) || i == self.inport || i == self.outport {
                self.port_flags[i].insert(Tag::USED);
            } else {
                self.port_flags[i].remove(Tag::USED);
            }
        }
        // hide the unused stack capacity from the marker
        let saved_rts_len = if self.rts == NIL {
            0
        } else {
            let k = self.string_len(self.rts);
            self.set_string_len(self.rts, (1 + self.sp) as usize * CELL_BYTES);
            k
        };
        let roots = [
            self.protected,
            self.symbols,
            self.symhash,
            self.prog,
            self.env,
            self.obhash,
            self.obarray,
            self.obmap,
            self.cts,
            self.emitbuf,
            self.glob,
            self.macros,
            self.rts,
            self.acc,
            self.e0,
            self.ep,
            self.argv,
            self.tmp,
            self.tmp_car,
            self.tmp_cdr,
            self.files,
            self.nullvec,
            self.nullstr,
            self.blank,
            self.zero,
            self.one,
            self.ten,
        ];
        for r in roots {
            self.mark(r);
        }
        if self.rts != NIL {
            self.set_string_len(self.rts, saved_rts_len);
        }
        let mut k = 0;
        self.freelist = NIL;
        for i in 0..NNODES {
            if self.tags[i].contains(Tag::MARK) {
                self.tags[i].remove(Tag::MARK);
            } else {
                self.cdrs[i] = self.freelist;
                self.freelist = i as Cell;
                k += 1;
            }
        }
        for i in 0..NPORTS {
            if !self.port_flags[i].contains(Tag::USED) && self.ports[i].is_some() {
                self.ports[i] = None;
            }
        }
        if self.obarray != NIL && self.obmap != NIL {
            let n = self.veclen(self.obarray);
            for i in 0..n {
                if self.string_byte(self.obmap, i) == OBUSED {
                    self.set_string_byte(self.obmap, i, OBALLOC);
                } else {
                    self.set_string_byte(self.obmap, i, OBFREE);
                    self.vec_set(self.obarray, i, NIL);
                }
            }
        }
        log::debug!("GC: {k} nodes reclaimed");
        k
    }

    /// Allocate one node. Runs a collection when the free list is
    /// empty; the pending CAR and CDR are rooted through the
    /// temporary registers while it runs.
    ///
    /// # Errors
    ///
    /// When the pool is exhausted even after collection.
    pub(crate) fn alloc(&mut self, pcar: Cell, pcdr: Cell, ptag: Tag) -> Result<Cell> {
        if self.freelist == NIL {
            if (ptag - Tag::CONST).is_empty() {
                self.tmp_car = pcar;
            }
            if !ptag.contains(Tag::VECTOR) {
                self.tmp_cdr = pcdr;
            }
            self.gc();
            self.tmp_car = NIL;
            self.tmp_cdr = NIL;
            if self.freelist == NIL {
                return Err(self.error("out of nodes", UNDEF));
            }
        }
        let n = self.freelist;
        self.freelist = self.cdr(n);
        self.cars[n as usize] = pcar;
        self.cdrs[n as usize] = pcdr;
        self.tags[n as usize] = ptag;
        Ok(n)
    }

    /// Allocate a pair.
    #[inline]
    pub(crate) fn cons(&mut self, a: Cell, d: Cell) -> Result<Cell> {
        self.alloc(a, d, Tag::empty())
    }

    /// Allocate an atom; `a` is the type tag.
    #[inline]
    pub(crate) fn mkatom(&mut self, a: Cell, d: Cell) -> Result<Cell> {
        self.alloc(a, d, Tag::ATOM)
    }

    /// Clear the backlink word of every vector in the arena, live or
    /// dead. Re-marking restores the links of the live ones.
    fn unmark_vecs(&mut self) {
        let mut p = 0;
        while p < self.freevec {
            let link = p;
            let k = self.vword(p + RAW_VECSIZE) as usize;
            p += vecsize(k);
            self.set_vword(link, NIL);
        }
    }

    /// Compact the vector arena. Live vectors slide to the low
    /// watermark; each owner's CDR is rewritten as its payload moves.
    /// Returns the number of words reclaimed.
    pub(crate) fn gcv(&mut self) -> usize {
        self.unmark_vecs();
        self.gc(); // re-mark live vectors, restoring their backlinks
        let mut to = 0;
        let mut from = 0;
        while from < self.freevec {
            let v = self.vword(from + RAW_VECSIZE) as usize;
            let k = vecsize(v);
            if self.vword(from + RAW_VECLINK) != NIL {
                if to != from {
                    self.arena.copy_within(
                        from * CELL_BYTES..(from + k) * CELL_BYTES,
                        to * CELL_BYTES,
                    );
                    let owner = self.vword(to + RAW_VECLINK);
                    self.cdrs[owner as usize] = (to + RAW_VECDATA) as Cell;
                }
                to += k;
            }
            from += k;
        }
        let k = self.freevec - to;
        self.freevec = to;
        log::debug!("GCV: {k} words reclaimed");
        k
    }

    /// Allocate a vector node with a `size`-byte payload. The payload
    /// is not cleared.
    ///
    /// # Errors
    ///
    /// When the arena is exhausted even after compaction.
    pub(crate) fn newvec(&mut self, vtype: Cell, size: usize) -> Result<Cell> {
        let wsize = vecsize(size);
        if self.freevec + wsize >= NVCELLS {
            self.gcv();
            if self.freevec + wsize >= NVCELLS {
                return Err(self.error("out of vector space", UNDEF));
            }
        }
        let v = self.freevec;
        self.freevec += wsize;
        let n = self.alloc(vtype, (v + RAW_VECDATA) as Cell, Tag::VECTOR)?;
        self.set_vword(v + RAW_VECLINK, n);
        self.set_vword(v + RAW_VECSIZE, size as Cell);
        Ok(n)
    }

    // ----- protection stack -----

    /// Root a value for the duration of allocating operations.
    pub(crate) fn protect(&mut self, n: Cell) -> Result<()> {
        self.protected = self.cons(n, self.protected)?;
        Ok(())
    }

    /// Drop `k` protected values; returns the last one dropped.
    pub(crate) fn unprot(&mut self, k: usize) -> Result<Cell> {
        let mut n = NIL;
        for _ in 0..k {
            if self.protected == NIL {
                return Err(self.error("unprot: stack underflow", UNDEF));
            }
            n = self.car(self.protected);
            self.protected = self.cdr(self.protected);
        }
        Ok(n)
    }

    /// Replace the most recently protected value.
    pub(crate) fn protected_set0(&mut self, v: Cell) {
        let p = self.protected;
        self.set_car(p, v);
    }

    /// Replace the second most recently protected value.
    pub(crate) fn protected_set1(&mut self, v: Cell) {
        let p = self.cdr(self.protected);
        self.set_car(p, v);
    }

    /// Replace the third most recently protected value.
    pub(crate) fn protected_set2(&mut self, v: Cell) {
        let p = self.cddr(self.protected);
        self.set_car(p, v);
    }
}
