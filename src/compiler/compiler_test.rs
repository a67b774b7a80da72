// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the compiler pipeline: syntax checking, closure
//! conversion and code generation.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::cell::Cell;
use crate::interp::Interp;
use crate::reader::StrInput;

fn it() -> Interp {
    Interp::new().unwrap()
}

fn read_str(it: &mut Interp, s: &str) -> Cell {
    it.instr = Some(StrInput::new(s.as_bytes()));
    let x = it.xread().unwrap();
    it.instr = None;
    x
}

/// Run a form through the whole front end and return its
/// disassembly.
fn compiled(it: &mut Interp, src: &str) -> String {
    let x = read_str(it, src);
    it.protect(x).unwrap();
    let x = it.expand(x, true).unwrap();
    it.protected_set0(x);
    it.syncheck(x, true).unwrap();
    let x = it.clsconv(x).unwrap();
    it.protected_set0(x);
    let code = it.compile(x).unwrap();
    it.unprot(1).unwrap();
    it.disasm(code)
}

fn compile_error(it: &mut Interp, src: &str) -> String {
    let x = read_str(it, src);
    it.protect(x).unwrap();
    let r = it
        .expand(x, true)
        .and_then(|x| it.syncheck(x, true).map(|()| x))
        .and_then(|x| it.clsconv(x))
        .and_then(|x| it.compile(x));
    it.unprot(1).unwrap();
    r.unwrap_err().to_string()
}

#[test]
fn literals_load_through_the_pool() {
    let mut it = it();
    let text = compiled(&mut it, "42");
    assert!(text.starts_with("0000: quote"));
    assert!(text.contains("halt"));
}

#[test]
fn conditionals_branch_forward() {
    let mut it = it();
    let text = compiled(&mut it, "(if t 1 2)");
    assert!(text.contains("brf"));
    assert!(text.contains("jmp"));
    let text = compiled(&mut it, "(if* 1 2)");
    assert!(text.contains("brt"));
}

#[test]
fn lambdas_compile_to_closures() {
    let mut it = it();
    let text = compiled(&mut it, "(lambda (x) x)");
    assert!(text.contains("enter 1"));
    assert!(text.contains("arg 0"));
    assert!(text.contains("return"));
    assert!(text.contains("closure"));
    // no captures, no fresh environment
    assert!(text.contains("propenv"));
}

#[test]
fn dotted_formals_use_the_collecting_entry() {
    let mut it = it();
    let text = compiled(&mut it, "(lambda (a . rest) rest)");
    assert!(text.contains("entcol 1"));
}

#[test]
fn captured_variables_build_an_environment() {
    let mut it = it();
    let text = compiled(&mut it, "(def f (lambda (x) (lambda () x)))");
    assert!(text.contains("mkenv 1"));
    assert!(text.contains("cparg"));
}

#[test]
fn calls_in_tail_position_use_the_tail_opcodes() {
    let mut it = it();
    let text = compiled(&mut it, "(def f (lambda (g n) (g n)))");
    assert!(text.contains("tailapp"));
    assert!(!text.contains(" apply"));
    let text = compiled(&mut it, "(def f (lambda (g n) (g (g n))))");
    assert!(text.contains("tailapp"));
    assert!(text.contains("apply"));
}

#[test]
fn primitives_compile_to_dedicated_opcodes() {
    let mut it = it();
    let text = compiled(&mut it, "(cons 1 2)");
    assert!(text.contains("cons"));
    assert!(!text.contains("apply"));
    let text = compiled(&mut it, "(car '(1))");
    assert!(text.contains("car"));
}

#[test]
fn variadic_sums_fold_pairwise() {
    let mut it = it();
    let text = compiled(&mut it, "(+ 1 2 3)");
    assert_eq!(text.matches("+").count(), 2);
    // the identity element alone
    let text = compiled(&mut it, "(+)");
    assert!(text.starts_with("0000: quote"));
}

#[test]
fn comparison_chains_keep_a_truth_slot() {
    let mut it = it();
    let text = compiled(&mut it, "(< 1 2 3)");
    assert!(text.contains("pushtrue"));
    assert!(text.contains("pop"));
}

#[test]
fn catch_star_applies_its_thunk() {
    let mut it = it();
    let text = compiled(&mut it, "(catch* (lambda (k) k))");
    assert!(text.contains("catch*\napply") || text.contains("catch*"));
}

#[test]
fn optional_arguments_get_defaults() {
    let mut it = it();
    // one-argument prin defaults to the current output port
    let text = compiled(&mut it, "(prin 1)");
    assert!(text.contains("outport"));
}

#[test]
fn syntax_errors_are_rejected() {
    let mut it = it();
    assert!(compile_error(&mut it, "(quote)").contains("wrong number of arguments"));
    assert!(compile_error(&mut it, "(lambda (x x) x)").contains("duplicate formal"));
    assert!(compile_error(&mut it, "(lambda (1) 1)").contains("invalid formals"));
    assert!(compile_error(&mut it, "(if t)").contains("wrong number of arguments"));
    assert!(compile_error(&mut it, "(setq 1 2)").contains("setq: expected symbol"));
    assert!(compile_error(&mut it, "(lambda (x) (def g 1))").contains("must be at top level"));
}

#[test]
fn unknown_variables_are_rejected() {
    let mut it = it();
    assert!(compile_error(&mut it, "no-such-variable").contains("undefined symbol"));
}

#[test]
fn def_grows_the_global_environment() {
    let mut it = it();
    let before = it.length(it.glob);
    let _ = compiled(&mut it, "(def brand-new 1)");
    assert_eq!(it.length(it.glob), before + 1);
}
