// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for interning and the literal pool.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::cell::{NIL, UNDEF};
use crate::interp::Interp;

fn it() -> Interp {
    Interp::new().unwrap()
}

#[test]
fn interning_returns_the_same_cell() {
    let mut it = it();
    let a = it.symref(b"foo").unwrap();
    let b = it.symref(b"foo").unwrap();
    assert_eq!(a, b);
    let c = it.symref(b"bar").unwrap();
    assert_ne!(a, c);
}

#[test]
fn findsym_misses_unknown_names() {
    let mut it = it();
    assert_eq!(it.findsym(b"never-interned").unwrap(), NIL);
    it.symref(b"now-interned").unwrap();
    assert_ne!(it.findsym(b"now-interned").unwrap(), NIL);
}

#[test]
fn symbol_table_grows_past_a_chunk() {
    let mut it = it();
    let mut cells = Vec::new();
    for i in 0..1100 {
        let name = format!("sym-{i}");
        cells.push(it.symref(name.as_bytes()).unwrap());
    }
    for (i, c) in cells.iter().enumerate() {
        let name = format!("sym-{i}");
        assert_eq!(it.symref(name.as_bytes()).unwrap(), *c);
    }
}

#[test]
fn hash_tables_add_lookup_remove() {
    let mut it = it();
    let d = it.mkht(10).unwrap();
    it.protect(d).unwrap();
    let k = it.mkfix(7).unwrap();
    let v = it.mkfix(99).unwrap();
    it.htadd(d, k, v).unwrap();
    let k2 = it.mkfix(7).unwrap();
    let e = it.htlookup(d, k2);
    assert_ne!(e, UNDEF);
    assert_eq!(it.fixval(it.cdr(e)), 99);
    it.htrem(d, k2);
    assert_eq!(it.htlookup(d, k2), UNDEF);
    it.unprot(1).unwrap();
}

#[test]
fn immutable_literals_share_pool_slots() {
    let mut it = it();
    let a = it.mkfix(42).unwrap();
    it.protect(a).unwrap();
    let b = it.mkfix(42).unwrap();
    it.protect(b).unwrap();
    let ia = it.obindex(a).unwrap();
    let oa = it.obarray;
    it.vec_set(oa, ia, a);
    let ib = it.obindex(b).unwrap();
    assert_eq!(ia, ib);
}

#[test]
fn mutable_literals_get_fresh_slots() {
    let mut it = it();
    let p = it.cons(NIL, NIL).unwrap();
    it.protect(p).unwrap();
    let ia = it.obindex(p).unwrap();
    let oa = it.obarray;
    it.vec_set(oa, ia, p);
    let ib = it.obindex(p).unwrap();
    assert_ne!(ia, ib);
    it.unprot(1).unwrap();
}

#[test]
fn obj_match_compares_payloads() {
    let mut it = it();
    let a = it.mkstr(b"abc").unwrap();
    let b = it.mkstr(b"abc").unwrap();
    assert_ne!(a, b);
    assert!(it.obj_match(a, b));
    let c = it.mkstr(b"abd").unwrap();
    assert!(!it.obj_match(a, c));
}
