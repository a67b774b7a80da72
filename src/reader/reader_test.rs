// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the reader.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;

use crate::cell::{Cell, EOFMARK, NIL, TRUE};
use crate::interp::Interp;
use crate::reader::StrInput;

fn it() -> Interp {
    Interp::new().unwrap()
}

fn read_str(it: &mut Interp, s: &str) -> Cell {
    it.instr = Some(StrInput::new(s.as_bytes()));
    let x = it.xread().unwrap();
    it.instr = None;
    assert!(it.readerr.is_none(), "reader error: {:?}", it.readerr);
    x
}

fn read_err(it: &mut Interp, s: &str) -> String {
    it.instr = Some(StrInput::new(s.as_bytes()));
    let _ = it.xread().unwrap();
    it.instr = None;
    it.readerr.take().expect("expected a reader error")
}

fn shown(it: &mut Interp, x: Cell) -> String {
    it.format_host(x).unwrap()
}

#[test]
fn reads_fixnums() {
    let mut it = it();
    let n = read_str(&mut it, "42");
    assert_eq!(it.fixval(n), 42);
    let n = read_str(&mut it, "-17");
    assert_eq!(it.fixval(n), -17);
    let n = read_str(&mut it, "+5");
    assert_eq!(it.fixval(n), 5);
    let n = read_str(&mut it, "-2147483648");
    assert_eq!(it.fixval(n), i32::MIN);
}

#[test]
fn reads_radix_fixnums() {
    let mut it = it();
    let n = read_str(&mut it, "#16rff");
    assert_eq!(it.fixval(n), 255);
    let n = read_str(&mut it, "#2r101");
    assert_eq!(it.fixval(n), 5);
    let n = read_str(&mut it, "#36rz");
    assert_eq!(it.fixval(n), 35);
    assert_eq!(read_err(&mut it, "#1r0"), "bad radix in #radixR");
    assert_eq!(read_err(&mut it, "#8r9"), "invalid digits after #radixR");
}

#[test]
fn reads_characters() {
    let mut it = it();
    for (src, want) in [
        ("#\\A", 65),
        ("#\\ht", 9),
        ("#\\nl", 10),
        ("#\\sp", 32),
        ("#\\101", 65),
        ("#\\\\101", 65),
        ("#\\7", i32::from(b'7')),
    ] {
        let n = read_str(&mut it, src);
        assert!(it.is_char(n), "{src}");
        assert_eq!(it.charval(n), want, "{src}");
    }
}

#[test]
fn reads_strings_with_escapes() {
    let mut it = it();
    let n = read_str(&mut it, r#""a\tb\nc\\d\"e\101""#);
    assert_eq!(it.string_copy(n), b"a\tb\nc\\d\"eA");
    assert!(it.is_const(n));
}

#[test]
fn reads_lists_and_dotted_pairs() {
    let mut it = it();
    let n = read_str(&mut it, "(1 2 3)");
    assert_eq!(it.length(n), 3);
    assert!(it.is_const(n));
    let n = read_str(&mut it, "(1 . 2)");
    assert_eq!(it.fixval(it.car(n)), 1);
    assert_eq!(it.fixval(it.cdr(n)), 2);
    let n = read_str(&mut it, "()");
    assert_eq!(n, NIL);
}

#[test]
fn rejects_malformed_pairs() {
    let mut it = it();
    assert_eq!(read_err(&mut it, "(1 ."), "malformed pair");
    assert_eq!(read_err(&mut it, "(. 2)"), "malformed pair");
    assert_eq!(read_err(&mut it, "(1 . 2 3)"), "malformed pair");
    assert_eq!(read_err(&mut it, "(1 2"), "missing ')'");
}

#[test]
fn reads_vector_literals() {
    let mut it = it();
    let n = read_str(&mut it, "#( 1 2 )");
    assert!(it.is_vector(n));
    assert!(it.is_const(n));
    assert_eq!(it.veclen(n), 2);
    assert_eq!(it.fixval(it.vec_ref(n, 0)), 1);
}

#[test]
fn reads_quotation_sugar() {
    let mut it = it();
    for (src, head) in [("'x", "quote"), ("@x", "qquote"), ("`x", "qquote")] {
        let n = read_str(&mut it, src);
        let h = it.symref(head.as_bytes()).unwrap();
        assert_eq!(it.car(n), h, "{src}");
    }
}

#[test]
fn unquote_inside_a_quoted_form() {
    let mut it = it();
    let n = read_str(&mut it, "@(a ,b ,@c)");
    assert_eq!(shown(&mut it, n), "@(a ,b ,@c)");
}

#[test]
fn symbols_fold_to_lower_case() {
    let mut it = it();
    let a = read_str(&mut it, "Foo");
    let b = read_str(&mut it, "FOO");
    let c = it.symref(b"foo").unwrap();
    assert_eq!(a, c);
    assert_eq!(b, c);
}

#[test]
fn t_and_nil_are_constants() {
    let mut it = it();
    assert_eq!(read_str(&mut it, "t"), TRUE);
    assert_eq!(read_str(&mut it, "nil"), NIL);
}

#[test]
fn comments_and_whitespace_are_skipped() {
    let mut it = it();
    let n = read_str(&mut it, "; a comment\n  \t 7");
    assert_eq!(it.fixval(n), 7);
    assert_eq!(read_str(&mut it, "; only a comment"), EOFMARK);
}

#[test]
fn oversized_fixnums_are_an_error() {
    let mut it = it();
    assert_eq!(read_err(&mut it, "99999999999999"), "fixnum too big");
}

#[test]
fn scenario_reader_example() {
    let mut it = it();
    let n = read_str(&mut it, "(#\\A #( 1 2 ) #16rFF)");
    assert_eq!(shown(&mut it, n), "(#\\A #(1 2) 255)");
}

proptest! {
    #[test]
    fn fixnum_print_read_roundtrip(v in any::<i32>()) {
        let mut it = it();
        let n = it.mkfix(v).unwrap();
        let s = shown(&mut it, n);
        let back = read_str(&mut it, &s);
        prop_assert!(it.is_fix(back));
        prop_assert_eq!(it.fixval(back), v);
    }

    #[test]
    fn string_print_read_roundtrip(s in "[ -~]{0,40}") {
        let mut it = it();
        let n = it.mkstr(s.as_bytes()).unwrap();
        it.protect(n).unwrap();
        let shown = shown(&mut it, n);
        let back = read_str(&mut it, &shown);
        prop_assert!(it.is_string(back));
        prop_assert_eq!(it.string_copy(back), s.as_bytes());
    }
}
