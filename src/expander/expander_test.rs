// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the macro expander.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::interp::Interp;

fn it() -> Interp {
    Interp::new().unwrap()
}

fn eval_shown(it: &mut Interp, src: &str) -> String {
    let x = it.eval_str(src).unwrap();
    it.format_host(x).unwrap()
}

#[test]
fn defun_becomes_def_over_lambda() {
    let mut it = it();
    let got = eval_shown(&mut it, "(mx1 '(defun (f x) x))");
    assert_eq!(got, "(def f (lambda (x) x))");
}

#[test]
fn defmac_becomes_macro_over_lambda() {
    let mut it = it();
    let got = eval_shown(&mut it, "(mx1 '(defmac (m x) x))");
    assert_eq!(got, "(macro m (lambda (x) x))");
}

#[test]
fn nested_defs_hoist_into_labels() {
    let mut it = it();
    let got = eval_shown(&mut it, "(mx1 '(defun (f x) (def y 1) (+ x y)))");
    assert_eq!(got, "(def f (lambda (x) (labels ((y 1)) (+ x y))))");
}

#[test]
fn quote_is_left_alone() {
    let mut it = it();
    let got = eval_shown(&mut it, "(mx '(quote (defun (f x) x)))");
    assert_eq!(got, "'(defun (f x) x)");
}

#[test]
fn macro_calls_run_their_expander() {
    let mut it = it();
    it.eval_str("(defmac (twice x) (cons '+ (cons x (cons x nil))))")
        .unwrap();
    let got = eval_shown(&mut it, "(mx1 '(twice 3))");
    assert_eq!(got, "(+ 3 3)");
    let x = it.eval_str("(twice 21)").unwrap();
    assert_eq!(it.fixval(x), 42);
}

#[test]
fn expansion_reaches_a_fixpoint() {
    let mut it = it();
    it.eval_str("(defmac (a x) (cons 'b (cons x nil)))").unwrap();
    it.eval_str("(defmac (b x) x)").unwrap();
    let got = eval_shown(&mut it, "(mx '(a 5))");
    assert_eq!(got, "5");
    let got = eval_shown(&mut it, "(mx1 '(a 5))");
    assert_eq!(got, "(b 5)");
}

#[test]
fn runaway_expansion_is_capped() {
    let mut it = it();
    it.eval_str("(defmac (loopy) '(loopy))").unwrap();
    let e = it.eval_str("(mx '(loopy))").unwrap_err();
    assert!(e.to_string().contains("too many levels"));
}

#[test]
fn redefining_a_macro_replaces_it() {
    let mut it = it();
    it.eval_str("(defmac (m) 1)").unwrap();
    it.eval_str("(defmac (m) 2)").unwrap();
    let x = it.eval_str("(m)").unwrap();
    assert_eq!(it.fixval(x), 2);
}
