// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the node pool, the vector arena and the collector.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::NNODES;
use crate::cell::{NIL, Tag};
use crate::heap::{RAW_VECDATA, RAW_VECSIZE, vecsize};
use crate::interp::Interp;

fn it() -> Interp {
    Interp::new().unwrap()
}

#[test]
fn cons_sets_fields() {
    let mut it = it();
    let one = it.mkfix(1).unwrap();
    let n = it.cons(one, NIL).unwrap();
    assert!(it.is_pair(n));
    assert_eq!(it.car(n), one);
    assert_eq!(it.cdr(n), NIL);
}

#[test]
fn gc_leaves_no_transient_bits() {
    let mut it = it();
    for _ in 0..1000 {
        it.cons(NIL, NIL).unwrap();
    }
    it.gc();
    for i in 0..NNODES {
        assert!(!it.tags[i].intersects(Tag::MARK | Tag::TRAV), "node {i}");
    }
}

#[test]
fn gc_free_list_accounts_for_the_pool() {
    let mut it = it();
    let k = it.gc();
    assert_eq!(it.length(it.freelist) as usize, k);
    // everything unreferenced comes back
    for _ in 0..10_000 {
        it.cons(NIL, NIL).unwrap();
    }
    let k2 = it.gc();
    assert_eq!(k, k2);
}

#[test]
fn protected_values_survive_collection() {
    let mut it = it();
    let n = it.mkfix(12345).unwrap();
    it.protect(n).unwrap();
    it.gc();
    assert!(it.is_fix(n));
    assert_eq!(it.fixval(n), 12345);
    let back = it.unprot(1).unwrap();
    assert_eq!(back, n);
}

#[test]
fn unreferenced_churn_never_exhausts_the_pool() {
    let mut it = it();
    for _ in 0..10 * NNODES {
        it.cons(NIL, NIL).unwrap();
    }
}

#[test]
fn compaction_preserves_backlink_invariant() {
    let mut it = it();
    // create garbage strings interleaved with live ones
    let mut live = Vec::new();
    for i in 0..100 {
        let s = it.mkstr(format!("string number {i}").as_bytes()).unwrap();
        if i % 3 == 0 {
            it.protect(s).unwrap();
            live.push(s);
        }
    }
    it.gcv();
    // every surviving vector's backlink names an owner whose CDR
    // points right back at the payload
    let mut p = 0;
    while p < it.freevec {
        let link = it.vword(p);
        let size = it.vword(p + RAW_VECSIZE) as usize;
        assert_ne!(link, NIL);
        assert_eq!(it.cdr(link) as usize, p + RAW_VECDATA);
        p += vecsize(size);
    }
    for (i, s) in live.iter().enumerate() {
        let want = format!("string number {}", i * 3);
        assert_eq!(it.string_copy(*s), want.as_bytes());
    }
}

#[test]
fn compaction_reclaims_dead_vectors() {
    let mut it = it();
    let before = it.freevec;
    for _ in 0..50 {
        it.mkstr(b"transient transient transient").unwrap();
    }
    assert!(it.freevec > before);
    it.gcv();
    assert_eq!(it.freevec, before);
}

#[test]
fn marking_handles_cycles() {
    let mut it = it();
    let a = it.cons(NIL, NIL).unwrap();
    it.protect(a).unwrap();
    let b = it.cons(a, a).unwrap();
    it.set_car(a, b);
    it.set_cdr(a, b);
    it.gc();
    assert!(it.is_pair(a));
    assert!(it.is_pair(b));
    assert_eq!(it.car(a), b);
    it.unprot(1).unwrap();
}
