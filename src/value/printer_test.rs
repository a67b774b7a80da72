// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the printer.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::cell::{Cell, EOFMARK, NIL, TRUE, UNDEF};
use crate::interp::Interp;

fn it() -> Interp {
    Interp::new().unwrap()
}

fn shown(it: &mut Interp, x: Cell) -> String {
    it.format_host(x).unwrap()
}

#[test]
fn prints_special_constants() {
    let mut it = it();
    assert_eq!(shown(&mut it, NIL), "nil");
    assert_eq!(shown(&mut it, TRUE), "t");
    assert_eq!(shown(&mut it, EOFMARK), "#<eof>");
    assert_eq!(shown(&mut it, UNDEF), "#<undef>");
}

#[test]
fn prints_characters_by_name() {
    let mut it = it();
    let c = it.mkchar(9).unwrap();
    assert_eq!(shown(&mut it, c), "#\\ht");
    let c = it.mkchar(10).unwrap();
    assert_eq!(shown(&mut it, c), "#\\nl");
    let c = it.mkchar(i32::from(b' ')).unwrap();
    assert_eq!(shown(&mut it, c), "#\\sp");
    let c = it.mkchar(i32::from(b'A')).unwrap();
    assert_eq!(shown(&mut it, c), "#\\A");
    let c = it.mkchar(1).unwrap();
    assert_eq!(shown(&mut it, c), "#\\\\1");
}

#[test]
fn escapes_strings_in_machine_form() {
    let mut it = it();
    let s = it.mkstr(b"a\"b\\c\nd").unwrap();
    assert_eq!(shown(&mut it, s), "\"a\\\"b\\\\c\\nd\"");
}

#[test]
fn pads_octal_escapes_before_digits() {
    let mut it = it();
    let s = it.mkstr(&[1, b'2']).unwrap();
    // without padding the 2 would extend the escape
    assert_eq!(shown(&mut it, s), "\"\\0012\"");
}

#[test]
fn display_form_is_unescaped() {
    let mut it = it();
    let s = it.mkstr(b"a\"b").unwrap();
    it.hostcap = Some(Vec::new());
    it.princ(s).unwrap();
    let got = it.hostcap.take().unwrap();
    assert_eq!(got, b"a\"b");
}

#[test]
fn prints_dotted_and_nested_lists() {
    let mut it = it();
    let two = it.mkfix(2).unwrap();
    let one = it.mkfix(1).unwrap();
    let p = it.cons(one, two).unwrap();
    assert_eq!(shown(&mut it, p), "(1 . 2)");
    let l = it.cons(p, NIL).unwrap();
    assert_eq!(shown(&mut it, l), "((1 . 2))");
}

#[test]
fn prints_vectors() {
    let mut it = it();
    let v = it.mkvec(2).unwrap();
    let one = it.mkfix(1).unwrap();
    it.vec_set(v, 0, one);
    assert_eq!(shown(&mut it, v), "#(1 nil)");
}

#[test]
fn quotation_sugar_prints_back() {
    let mut it = it();
    let x = it.symref(b"x").unwrap();
    let inner = it.cons(x, NIL).unwrap();
    let q = it.syms.quote;
    let n = it.cons(q, inner).unwrap();
    assert_eq!(shown(&mut it, n), "'x");
}

#[test]
fn deep_nesting_is_capped() {
    let mut it = it();
    let mut n = NIL;
    for _ in 0..3000 {
        it.protect(n).unwrap();
        let inner = it.cons(n, NIL).unwrap();
        it.unprot(1).unwrap();
        n = inner;
    }
    let e = it.format_host(n).unwrap_err();
    assert!(e.to_string().contains("nesting too deep"));
}

#[test]
fn cyclic_structures_terminate() {
    let mut it = it();
    let a = it.cons(NIL, NIL).unwrap();
    it.set_car(a, a);
    let e = it.format_host(a).unwrap_err();
    assert!(e.to_string().contains("nesting too deep"));
}
