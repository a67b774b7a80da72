// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the virtual machine: frames, tail calls, closures,
//! catch/throw and the stack discipline.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::CHUNKSIZE;
use crate::cell::NIL;
use crate::interp::Interp;

fn it() -> Interp {
    Interp::new().unwrap()
}

fn eval_fix(it: &mut Interp, src: &str) -> i32 {
    let x = it.eval_str(src).unwrap();
    assert!(it.is_fix(x), "expected fixnum from {src}");
    it.fixval(x)
}

fn eval_shown(it: &mut Interp, src: &str) -> String {
    let x = it.eval_str(src).unwrap();
    it.format_host(x).unwrap()
}

#[test]
fn the_stack_is_balanced_after_every_eval() {
    let mut it = it();
    let _ = it.eval_str("(+ 1 2)").unwrap();
    assert_eq!(it.sp, -1);
    assert_eq!(it.fp, -1);
    let _ = it.eval_str("(def f (lambda (x) (* x x))) (f 9)").unwrap();
    assert_eq!(it.sp, -1);
    assert_eq!(it.fp, -1);
}

#[test]
fn closures_apply_their_arguments() {
    let mut it = it();
    assert_eq!(eval_fix(&mut it, "((lambda (a b) (- a b)) 10 4)"), 6);
}

#[test]
fn wrong_argument_counts_are_rejected() {
    let mut it = it();
    it.eval_str("(def f (lambda (a b) a))").unwrap();
    let e = it.eval_str("(f 1)").unwrap_err();
    assert!(e.to_string().contains("wrong number of arguments"));
    let e = it.eval_str("(f 1 2 3)").unwrap_err();
    assert!(e.to_string().contains("wrong number of arguments"));
}

#[test]
fn variadic_functions_collect_a_rest_list() {
    let mut it = it();
    it.eval_str("(def f (lambda (a . r) r))").unwrap();
    assert_eq!(eval_shown(&mut it, "(f 1 2 3)"), "(2 3)");
    assert_eq!(eval_shown(&mut it, "(f 1)"), "nil");
    it.eval_str("(def l (lambda xs xs))").unwrap();
    assert_eq!(eval_shown(&mut it, "(l 1 2)"), "(1 2)");
}

#[test]
fn tail_calls_run_in_constant_stack() {
    let mut it = it();
    it.eval_str("(def loop (lambda (n) (if (= n 0) 'ok (loop (- n 1)))))")
        .unwrap();
    let x = it.eval_str("(loop 100000)").unwrap();
    let ok = it.symref(b"ok").unwrap();
    assert_eq!(x, ok);
    assert_eq!(it.sz, CHUNKSIZE as i32);
}

#[test]
fn mutual_tail_recursion_runs_in_constant_stack() {
    let mut it = it();
    it.eval_str("(def even? (lambda (n) (if (= n 0) t (odd? (- n 1)))))")
        .unwrap();
    it.eval_str("(def odd? (lambda (n) (if (= n 0) nil (even? (- n 1)))))")
        .unwrap();
    let x = it.eval_str("(even? 100001)").unwrap();
    assert_eq!(x, NIL);
    assert_eq!(it.sz, CHUNKSIZE as i32);
}

#[test]
fn tail_calls_with_different_arity() {
    let mut it = it();
    it.eval_str("(def g (lambda (a b c) (+ a (+ b c))))").unwrap();
    it.eval_str("(def f (lambda (n) (g n n n)))").unwrap();
    assert_eq!(eval_fix(&mut it, "(f 5)"), 15);
}

#[test]
fn apply_spreads_its_list() {
    let mut it = it();
    assert_eq!(
        eval_fix(&mut it, "(apply (lambda (a b) (- a b)) '(9 3))"),
        6
    );
    assert_eq!(
        eval_fix(&mut it, "(apply (lambda (a b c) (- a b c)) 10 '(3 2))"),
        5
    );
}

#[test]
fn argument_evaluation_is_right_to_left() {
    let mut it = it();
    it.eval_str("(def trace nil)").unwrap();
    it.eval_str("(def note (lambda (x) (prog (setq trace (cons x trace)) x)))")
        .unwrap();
    it.eval_str("((lambda (a b) a) (note 1) (note 2))").unwrap();
    // pushed right to left, so 1 was noted last
    assert_eq!(eval_shown(&mut it, "trace"), "(1 2)");
}

#[test]
fn setq_through_a_shared_box_is_visible() {
    let mut it = it();
    it.eval_str("(def mk (lambda (x) (lambda () (setq x (+ x 1)) x)))")
        .unwrap();
    it.eval_str("(def c (mk 0))").unwrap();
    it.eval_str("(c) (c)").unwrap();
    assert_eq!(eval_fix(&mut it, "(c)"), 3);
}

#[test]
fn closures_capture_distinct_boxes() {
    let mut it = it();
    it.eval_str("(def mk (lambda (x) (lambda () (setq x (+ x 1)) x)))")
        .unwrap();
    it.eval_str("(def a (mk 0)) (def b (mk 100))").unwrap();
    it.eval_str("(a) (a)").unwrap();
    assert_eq!(eval_fix(&mut it, "(b)"), 101);
    assert_eq!(eval_fix(&mut it, "(a)"), 3);
}

#[test]
fn catch_returns_the_thrown_value() {
    let mut it = it();
    assert_eq!(
        eval_fix(&mut it, "(catch* (lambda (k) (throw* k 42)))"),
        42
    );
    assert_eq!(eval_fix(&mut it, "(catch* (lambda (k) 42))"), 42);
    assert_eq!(
        eval_fix(&mut it, "(catch* (lambda (k) (+ 1 (throw* k 42))))"),
        42
    );
}

#[test]
fn throw_unwinds_nested_calls() {
    let mut it = it();
    it.eval_str("(def dig (lambda (k n) (if (= n 0) (throw* k 'found) (dig k (- n 1)))))")
        .unwrap();
    let got = eval_shown(&mut it, "(catch* (lambda (k) (dig k 50)))");
    assert_eq!(got, "found");
    assert_eq!(it.sp, -1);
}

#[test]
fn errors_reach_an_installed_handler() {
    let mut it = it();
    let got = eval_shown(
        &mut it,
        "(catch* (lambda (k)
           (setq *errtag* k)
           (setq *errval* k)
           (car 7)))",
    );
    assert_eq!(got, "\"car: expected pair\"");
}

#[test]
fn unhandled_errors_unwind_to_the_caller() {
    let mut it = it();
    let e = it.eval_str("(car 7)").unwrap_err();
    assert!(e.to_string().contains("car: expected pair"));
    let e = it.eval_str("(undefined-thing)").unwrap_err();
    assert!(e.to_string().contains("undefined symbol"));
}

#[test]
fn calling_a_non_function_is_an_error() {
    let mut it = it();
    it.eval_str("(def x 5)").unwrap();
    let e = it.eval_str("((if t x x) 1)").unwrap_err();
    assert!(e.to_string().contains("application of non-function"));
}

#[test]
fn the_stack_grows_transparently() {
    let mut it = it();
    // deep non-tail recursion forces several stack reallocations
    it.eval_str("(def sum (lambda (n) (if (= n 0) 0 (+ n (sum (- n 1))))))")
        .unwrap();
    assert_eq!(eval_fix(&mut it, "(sum 2000)"), 2_001_000);
    assert!(it.sz > CHUNKSIZE as i32);
}
