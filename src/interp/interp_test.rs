// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! End-to-end evaluation tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

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
fn basic_arithmetic() {
    let mut it = it();
    assert_eq!(eval_fix(&mut it, "(+ 1 2 3)"), 6);
    assert_eq!(eval_fix(&mut it, "(- 5)"), -5);
    assert_eq!(eval_fix(&mut it, "(- 5 2 1)"), 2);
}

#[test]
fn recursive_factorial() {
    let mut it = it();
    it.eval_str("(def fact (lambda (n) (if (= n 0) 1 (* n (fact (- n 1))))))")
        .unwrap();
    assert_eq!(eval_fix(&mut it, "(fact 10)"), 3_628_800);
}

#[test]
fn deep_tail_loop() {
    let mut it = it();
    it.eval_str("(def loop (lambda (n) (if (= n 0) 'ok (loop (- n 1)))))")
        .unwrap();
    assert_eq!(eval_shown(&mut it, "(loop 100000)"), "ok");
}

#[test]
fn user_macros_expand() {
    let mut it = it();
    it.eval_str("(def list (lambda xs xs))").unwrap();
    it.eval_str("(defmac (when c . b) (list 'if c (cons 'prog b)))")
        .unwrap();
    assert_eq!(eval_fix(&mut it, "(when t 1 2 3)"), 3);
    assert_eq!(it.eval_str("(when nil 1 2 3)").unwrap(), NIL);
}

#[test]
fn catch_and_throw() {
    let mut it = it();
    assert_eq!(
        eval_fix(&mut it, "(catch* (lambda (k) (+ 1 (throw* k 42))))"),
        42
    );
}

#[test]
fn mutation_through_a_closure() {
    let mut it = it();
    it.eval_str("(def mk (lambda (x) (lambda () (setq x (+ x 1)) x)))")
        .unwrap();
    it.eval_str("(def c (mk 0))").unwrap();
    it.eval_str("(c) (c)").unwrap();
    assert_eq!(eval_fix(&mut it, "(c)"), 3);
}

#[test]
fn reading_produces_structure() {
    let mut it = it();
    assert_eq!(
        eval_shown(&mut it, "(car (read \"(#\\\\A #( 1 2 ) #16rFF)\"))"),
        "(#\\A #(1 2) 255)"
    );
}

#[test]
fn quasiquote_reads_as_data() {
    let mut it = it();
    assert_eq!(eval_shown(&mut it, "(car (read \"@(a ,b)\"))"), "@(a ,b)");
}

#[test]
fn labels_locals_via_library_macro() {
    let mut it = it();
    // minimal labels rewriter, as the library defines it
    it.eval_str(
        "(def list (lambda xs xs))
         (def map1 (lambda (f l)
           (if (null l) nil (cons (f (car l)) (map1 f (cdr l))))))
         (defmac (labels binds . body)
           (cons (conc (list 'lambda (map1 car binds))
                       body)
                 (map1 cadr binds)))",
    )
    .unwrap();
    it.eval_str("(defun (f x) (def y 10) (+ x y))").unwrap();
    assert_eq!(eval_fix(&mut it, "(f 5)"), 15);
}

#[test]
fn last_value_feeds_the_next_form() {
    let mut it = it();
    assert_eq!(eval_fix(&mut it, "(def a 1) (def b 2) (+ a b)"), 3);
}

#[test]
fn evaluation_keeps_the_machine_clean() {
    let mut it = it();
    for _ in 0..50 {
        it.eval_str("(def f (lambda (x) (* x x))) (f 12)").unwrap();
        assert_eq!(it.sp, -1);
        assert_eq!(it.fp, -1);
        assert_eq!(it.protected, NIL);
    }
}

#[test]
fn global_redefinition_updates_the_box() {
    let mut it = it();
    it.eval_str("(def x 1)").unwrap();
    it.eval_str("(def get-x (lambda () x))").unwrap();
    it.eval_str("(def x 2)").unwrap();
    assert_eq!(eval_fix(&mut it, "(get-x)"), 2);
}

#[test]
fn setq_assigns_globals() {
    let mut it = it();
    it.eval_str("(def x 1)").unwrap();
    it.eval_str("(setq x 7)").unwrap();
    assert_eq!(eval_fix(&mut it, "x"), 7);
}

#[test]
fn interrupt_aborts_evaluation() {
    let mut it = it();
    let flag = it.interrupt_flag();
    flag.store(true, std::sync::atomic::Ordering::Relaxed);
    let e = it.eval_str("(+ 1 2)").unwrap_err();
    let msg = e.to_string();
    assert!(msg.contains("interrupt") || msg.contains("aborted"), "{msg}");
    it.clear_interrupt();
    assert_eq!(eval_fix(&mut it, "(+ 1 2)"), 3);
}

#[test]
fn trace_ring_records_global_references() {
    let mut it = it();
    it.eval_str("(def foo 1) (def bar 2)").unwrap();
    it.clrtrace();
    it.eval_str("(+ foo bar)").unwrap();
    assert!(it.gottrace());
}
