// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the bytecode format helpers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::{ISIZE0, ISIZE1, ISIZE2, isize_of, op, opname};
use crate::cell::T_BYTECODE;
use crate::interp::Interp;

#[test]
fn instruction_sizes() {
    assert_eq!(isize_of(op::HALT), ISIZE0);
    assert_eq!(isize_of(op::CAR), ISIZE0);
    assert_eq!(isize_of(op::QUOTE), ISIZE1);
    assert_eq!(isize_of(op::JMP), ISIZE1);
    assert_eq!(isize_of(op::ENTCOL), ISIZE1);
    assert_eq!(isize_of(op::REF), ISIZE2);
    assert_eq!(isize_of(op::CPARG), ISIZE2);
}

#[test]
fn opcode_names() {
    assert_eq!(opname(op::HALT), "halt");
    assert_eq!(opname(op::CAR), "car");
    assert_eq!(opname(op::CATCHSTAR), "catch*");
    assert_eq!(opname(op::PLUS), "+");
}

#[test]
fn operands_are_big_endian() {
    let mut it = Interp::new().unwrap();
    let s = it.mkstr(&[op::QUOTE, 0x12, 0x34, op::HALT]).unwrap();
    assert_eq!(it.fetcharg(s, 1), 0x1234);
}

#[test]
fn disassembles_a_stream() {
    let mut it = Interp::new().unwrap();
    let s = it
        .mkstr(&[op::QUOTE, 0, 7, op::BRF, 0, 9, op::HALT])
        .unwrap();
    it.protect(s).unwrap();
    let code = it.mkatom(T_BYTECODE, s).unwrap();
    let text = it.disasm(code);
    assert!(text.contains("quote 7"));
    assert!(text.contains("brf 9"));
    assert!(text.contains("halt"));
    it.unprot(1).unwrap();
}
