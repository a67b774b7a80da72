// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the primitive surface, driven through the evaluator.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::cell::{NIL, TRUE};
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

fn eval_err(it: &mut Interp, src: &str) -> String {
    it.eval_str(src).unwrap_err().to_string()
}

#[test]
fn arithmetic_folds_and_identities() {
    let mut it = it();
    assert_eq!(eval_fix(&mut it, "(+ 1 2 3)"), 6);
    assert_eq!(eval_fix(&mut it, "(+)"), 0);
    assert_eq!(eval_fix(&mut it, "(*)"), 1);
    assert_eq!(eval_fix(&mut it, "(* 2 3 4)"), 24);
    assert_eq!(eval_fix(&mut it, "(- 5)"), -5);
    assert_eq!(eval_fix(&mut it, "(- 5 2 1)"), 2);
    assert_eq!(eval_fix(&mut it, "(div 7 2)"), 3);
    assert_eq!(eval_fix(&mut it, "(div -7 2)"), -3);
    assert_eq!(eval_fix(&mut it, "(rem 7 2)"), 1);
    assert_eq!(eval_fix(&mut it, "(rem -7 2)"), -1);
    assert_eq!(eval_fix(&mut it, "(max 3 1 4 1 5)"), 5);
    assert_eq!(eval_fix(&mut it, "(min 3 1 4)"), 1);
    assert_eq!(eval_fix(&mut it, "(abs -7)"), 7);
}

#[test]
fn arithmetic_faults() {
    let mut it = it();
    assert!(eval_err(&mut it, "(+ 2147483647 1)").contains("fixnum overflow"));
    assert!(eval_err(&mut it, "(div 1 0)").contains("divide by zero"));
    assert!(eval_err(&mut it, "(+ 1 'a)").contains("expected fixnum"));
    assert!(eval_err(&mut it, "(abs -2147483648)").contains("fixnum overflow"));
}

#[test]
fn comparison_chains() {
    let mut it = it();
    assert_eq!(it.eval_str("(< 1 2 3)").unwrap(), TRUE);
    assert_eq!(it.eval_str("(< 1 3 2)").unwrap(), NIL);
    assert_eq!(it.eval_str("(<= 1 1 2)").unwrap(), TRUE);
    assert_eq!(it.eval_str("(= 2 2 2)").unwrap(), TRUE);
    assert_eq!(it.eval_str("(> 3 2 1)").unwrap(), TRUE);
    assert_eq!(it.eval_str("(>= 3 3 1)").unwrap(), TRUE);
    assert_eq!(it.eval_str("(< 5)").unwrap(), TRUE);
    assert_eq!(it.eval_str("(c< #\\a #\\b)").unwrap(), TRUE);
    assert_eq!(it.eval_str("(c= #\\a #\\A)").unwrap(), NIL);
}

#[test]
fn predicates() {
    let mut it = it();
    assert_eq!(it.eval_str("(null nil)").unwrap(), TRUE);
    assert_eq!(it.eval_str("(not nil)").unwrap(), TRUE);
    assert_eq!(it.eval_str("(not 1)").unwrap(), NIL);
    assert_eq!(it.eval_str("(atom 'a)").unwrap(), TRUE);
    assert_eq!(it.eval_str("(atom '(1))").unwrap(), NIL);
    assert_eq!(it.eval_str("(pair '(1))").unwrap(), TRUE);
    assert_eq!(it.eval_str("(fixp 1)").unwrap(), TRUE);
    assert_eq!(it.eval_str("(charp #\\a)").unwrap(), TRUE);
    assert_eq!(it.eval_str("(stringp \"x\")").unwrap(), TRUE);
    assert_eq!(it.eval_str("(symbolp 'x)").unwrap(), TRUE);
    assert_eq!(it.eval_str("(vectorp #(1))").unwrap(), TRUE);
    assert_eq!(it.eval_str("(funp (lambda (x) x))").unwrap(), TRUE);
    assert_eq!(it.eval_str("(eofp (read \"\"))").unwrap(), NIL);
    assert_eq!(it.eval_str("(constp '(1 2))").unwrap(), TRUE);
    assert_eq!(it.eval_str("(constp (cons 1 2))").unwrap(), NIL);
}

#[test]
fn list_surgery() {
    let mut it = it();
    assert_eq!(eval_shown(&mut it, "(cons 1 2)"), "(1 . 2)");
    assert_eq!(eval_shown(&mut it, "(conc '(1 2) '(3) nil '(4))"), "(1 2 3 4)");
    assert_eq!(eval_shown(&mut it, "(conc)"), "nil");
    assert_eq!(
        eval_shown(&mut it, "(nconc (cons 1 nil) (cons 2 nil))"),
        "(1 2)"
    );
    assert_eq!(eval_shown(&mut it, "(reconc '(1 2 3) '(4))"), "(3 2 1 4)");
    assert_eq!(
        eval_shown(&mut it, "(nreconc (cons 1 (cons 2 nil)) nil)"),
        "(2 1)"
    );
    assert_eq!(eval_shown(&mut it, "(setcar (cons 1 2) 9)"), "(9 . 2)");
    assert_eq!(eval_shown(&mut it, "(setcdr (cons 1 2) 9)"), "(1 . 9)");
    assert!(eval_err(&mut it, "(setcar '(1) 9)").contains("immutable"));
    assert!(eval_err(&mut it, "(nconc '(1) '(2))").contains("immutable"));
}

#[test]
fn accessors_check_their_operands() {
    let mut it = it();
    assert_eq!(eval_fix(&mut it, "(car '(1 2))"), 1);
    assert_eq!(eval_shown(&mut it, "(cdr '(1 2))"), "(2)");
    assert_eq!(eval_fix(&mut it, "(caar '((3)))"), 3);
    assert_eq!(eval_fix(&mut it, "(cadr '(1 4))"), 4);
    assert!(eval_err(&mut it, "(car 1)").contains("expected pair"));
    assert!(eval_err(&mut it, "(caar '(1))").contains("nested pair"));
}

#[test]
fn string_primitives() {
    let mut it = it();
    assert_eq!(eval_shown(&mut it, "(sconc \"ab\" \"cd\")"), "\"abcd\"");
    assert_eq!(eval_shown(&mut it, "(sconc)"), "\"\"");
    assert_eq!(eval_fix(&mut it, "(ssize \"hello\")"), 5);
    assert_eq!(eval_shown(&mut it, "(sref \"abc\" 1)"), "#\\b");
    assert_eq!(eval_shown(&mut it, "(substr \"hello\" 1 3)"), "\"el\"");
    assert_eq!(eval_shown(&mut it, "(mkstr 3 #\\x)"), "\"xxx\"");
    assert_eq!(eval_shown(&mut it, "(mkstr 2)"), "\"  \"");
    assert_eq!(eval_shown(&mut it, "(liststr '(#\\h #\\i))"), "\"hi\"");
    assert_eq!(eval_shown(&mut it, "(strlist \"hi\")"), "(#\\h #\\i)");
    assert_eq!(
        eval_shown(&mut it, "(sfill (mkstr 3 #\\a) #\\z)"),
        "\"zzz\""
    );
    assert!(eval_err(&mut it, "(sref \"abc\" 3)").contains("out of range"));
    assert!(eval_err(&mut it, "(sset \"abc\" 0 #\\x)").contains("immutable"));
}

#[test]
fn string_comparisons() {
    let mut it = it();
    assert_eq!(it.eval_str("(s< \"abc\" \"abd\")").unwrap(), TRUE);
    assert_eq!(it.eval_str("(s< \"ab\" \"abc\")").unwrap(), TRUE);
    assert_eq!(it.eval_str("(s= \"abc\" \"abc\")").unwrap(), TRUE);
    assert_eq!(it.eval_str("(s= \"abc\" \"abd\")").unwrap(), NIL);
    assert_eq!(it.eval_str("(s> \"b\" \"a\")").unwrap(), TRUE);
    assert_eq!(it.eval_str("(si= \"ABC\" \"abc\")").unwrap(), TRUE);
    assert_eq!(it.eval_str("(si< \"ABC\" \"abd\")").unwrap(), TRUE);
}

#[test]
fn number_string_conversions() {
    let mut it = it();
    assert_eq!(eval_shown(&mut it, "(numstr 255)"), "\"255\"");
    assert_eq!(eval_shown(&mut it, "(numstr 255 16)"), "\"ff\"");
    assert_eq!(eval_fix(&mut it, "(strnum \"ff\" 16)"), 255);
    assert_eq!(eval_fix(&mut it, "(strnum \"-12\")"), -12);
    assert_eq!(it.eval_str("(strnum \"zz\")").unwrap(), NIL);
    assert!(eval_err(&mut it, "(numstr 1 99)").contains("bad radix"));
}

#[test]
fn vector_primitives() {
    let mut it = it();
    assert_eq!(eval_shown(&mut it, "(mkvec 2)"), "#(nil nil)");
    assert_eq!(eval_shown(&mut it, "(mkvec 2 7)"), "#(7 7)");
    assert_eq!(eval_fix(&mut it, "(vsize #(1 2 3))"), 3);
    assert_eq!(eval_fix(&mut it, "(vref #(5 6) 1)"), 6);
    assert_eq!(eval_shown(&mut it, "(vconc #(1) #(2 3))"), "#(1 2 3)");
    assert_eq!(eval_shown(&mut it, "(subvec #(1 2 3 4) 1 3)"), "#(2 3)");
    assert_eq!(eval_shown(&mut it, "(vset (mkvec 2) 0 9)"), "#(9 nil)");
    assert_eq!(eval_shown(&mut it, "(listvec '(1 2))"), "#(1 2)");
    assert_eq!(eval_shown(&mut it, "(veclist #(1 2))"), "(1 2)");
    assert!(eval_err(&mut it, "(vref #(1) 1)").contains("out of range"));
    assert!(eval_err(&mut it, "(vset #(1) 0 2)").contains("immutable"));
}

#[test]
fn bit_operations() {
    let mut it = it();
    assert_eq!(eval_fix(&mut it, "(bitop 1 12 10)"), 8);
    assert_eq!(eval_fix(&mut it, "(bitop 7 12 10)"), 14);
    assert_eq!(eval_fix(&mut it, "(bitop 6 12 10)"), 6);
    assert_eq!(eval_fix(&mut it, "(bitop 16 1 4)"), 16);
    assert_eq!(eval_fix(&mut it, "(bitop 18 16 2)"), 4);
    assert_eq!(eval_fix(&mut it, "(bitop 1 255 15 3)"), 3);
    assert!(eval_err(&mut it, "(bitop 99 1 1)").contains("invalid opcode"));
    assert!(eval_err(&mut it, "(bitop 1)").contains("too few arguments"));
}

#[test]
fn identity_and_equality() {
    let mut it = it();
    assert_eq!(it.eval_str("(eq 'a 'a)").unwrap(), TRUE);
    assert_eq!(it.eval_str("(eq 'a 'b)").unwrap(), NIL);
    assert_eq!(it.eval_str("(eq (cons 1 2) (cons 1 2))").unwrap(), NIL);
    // immutable literals share a pool slot
    assert_eq!(it.eval_str("(eq \"a\" \"a\")").unwrap(), TRUE);
}

#[test]
fn symbols_and_strings_convert() {
    let mut it = it();
    assert_eq!(eval_shown(&mut it, "(symname 'foo)"), "\"foo\"");
    assert_eq!(it.eval_str("(eq (symbol \"foo\") 'foo)").unwrap(), TRUE);
    assert_eq!(it.eval_str("(symbolp (gensym))").unwrap(), TRUE);
    // gensyms are not interned
    assert_eq!(
        it.eval_str("(eq (gensym) (symbol (symname (gensym))))").unwrap(),
        NIL
    );
}

#[test]
fn untag_exposes_representations() {
    let mut it = it();
    assert_eq!(it.eval_str("(untag nil)").unwrap(), NIL);
    assert_eq!(it.eval_str("(untag #(1))").unwrap(), NIL);
    // a fixnum untags to its payload atom
    assert_eq!(it.eval_str("(atom (untag 42))").unwrap(), TRUE);
    assert_eq!(it.eval_str("(fixp (untag 42))").unwrap(), NIL);
}

#[test]
fn reading_from_strings() {
    let mut it = it();
    assert_eq!(eval_shown(&mut it, "(read \"(1 2)\")"), "((1 2))");
    assert_eq!(eval_shown(&mut it, "(car (read \"7\"))"), "7");
    // a reader error comes back as the message string
    assert_eq!(eval_shown(&mut it, "(read \"(1\")"), "\"missing ')'\"");
}

#[test]
fn format_prints_to_a_string() {
    let mut it = it();
    assert_eq!(eval_shown(&mut it, "(format '(1 \"a\"))"), "\"(1 \\\"a\\\")\"");
    assert_eq!(eval_fix(&mut it, "(ssize (format 12345))"), 5);
}

#[test]
fn gc_reports_free_space() {
    let mut it = it();
    let got = it.eval_str("(gc)").unwrap();
    assert!(it.is_pair(got));
    assert!(it.is_fix(it.car(got)));
    assert!(it.is_fix(it.cadr(got)));
    assert!(it.fixval(it.car(got)) > 0);
}

#[test]
fn tables_are_exposed() {
    let mut it = it();
    assert_eq!(it.eval_str("(vectorp (symtab))").unwrap(), TRUE);
    assert_eq!(it.eval_str("(vectorp (obtab))").unwrap(), TRUE);
}

#[test]
fn file_primitives_roundtrip() {
    let mut it = it();
    let path = std::env::temp_dir().join(format!("sylva-intr-{}.tmp", std::process::id()));
    let path = path.to_string_lossy().into_owned();
    let src = format!(
        "(def p (open-outfile \"{path}\"))
         (prin '(1 2) p)
         (close-port p)
         (def q (open-infile \"{path}\"))
         (def x (read q))
         (close-port q)
         x"
    );
    let x = it.eval_str(&src).unwrap();
    assert_eq!(it.format_host(x).unwrap(), "(1 2)");
    assert_eq!(it.eval_str(&format!("(existsp \"{path}\")")).unwrap(), TRUE);
    it.eval_str(&format!("(delete \"{path}\")")).unwrap();
    assert_eq!(it.eval_str(&format!("(existsp \"{path}\")")).unwrap(), NIL);
}

#[test]
fn eval_evaluates_data() {
    let mut it = it();
    assert_eq!(eval_fix(&mut it, "(eval '(+ 1 2))"), 3);
    assert_eq!(eval_fix(&mut it, "(eval (cons '+ (cons 1 (cons 2 nil))))"), 3);
}
