// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the driver bindings.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::cell::{NIL, TRUE};
use crate::interp::Interp;

#[test]
fn cmdline_binds_a_string_list() {
    let mut it = Interp::new().unwrap();
    it.bind_cmdline(&[String::from("a"), String::from("bc")])
        .unwrap();
    let x = it.eval_str("(cmdline)").unwrap();
    assert_eq!(it.format_host(x).unwrap(), "(\"a\" \"bc\")");
}

#[test]
fn cmdline_defaults_to_nil() {
    let mut it = Interp::new().unwrap();
    let x = it.eval_str("(cmdline)").unwrap();
    assert_eq!(x, NIL);
}

#[test]
fn quiet_flag_is_mirrored() {
    let mut it = Interp::new().unwrap();
    it.set_quiet(true);
    it.bind_quiet_global();
    assert_eq!(it.eval_str("*quiet*").unwrap(), TRUE);
}

#[test]
fn start_is_optional() {
    let mut it = Interp::new().unwrap();
    it.run_start().unwrap();
}

#[test]
fn start_closure_runs() {
    let mut it = Interp::new().unwrap();
    it.eval_str("(def ran nil) (def start (lambda () (setq ran t)))")
        .unwrap();
    it.run_start().unwrap();
    assert_eq!(it.eval_str("ran").unwrap(), TRUE);
}

#[test]
fn loading_a_file_defines_its_forms() {
    let path = std::env::temp_dir().join(format!("sylva-load-{}.syl", std::process::id()));
    std::fs::write(&path, "(def from-file 7)\n(def doubled (+ from-file from-file))\n").unwrap();
    let mut it = Interp::new().unwrap();
    it.loadfile(&path.to_string_lossy()).unwrap();
    let x = it.eval_str("doubled").unwrap();
    assert_eq!(it.fixval(x), 14);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn load_errors_name_the_file_and_line() {
    let path = std::env::temp_dir().join(format!("sylva-badload-{}.syl", std::process::id()));
    std::fs::write(&path, "(def ok 1)\n(car 2)\n").unwrap();
    let mut it = Interp::new().unwrap();
    let e = it.loadfile(&path.to_string_lossy()).unwrap_err();
    assert!(e.to_string().contains("expected pair"));
    // the file stack still names the failing file for the report
    assert_ne!(it.files, NIL);
    let _ = std::fs::remove_file(&path);
}
