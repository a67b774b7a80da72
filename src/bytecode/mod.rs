// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Bytecode format.
//!
//! Instructions are byte streams held in BYTECODE atoms. Three sizes
//! exist: one byte (no operand), three bytes (one 16-bit big-endian
//! operand) and five bytes (two operands). The operand-carrying
//! control opcodes are listed in [`marklit`]'s size table; everything
//! else is a one-byte primitive.
//!
//! [`marklit`]: crate::interp::Interp

#[cfg(test)]
mod bytecode_test;

use crate::cell::Cell;
use crate::interp::Interp;

/// Instruction sizes in bytes by operand count.
pub const ISIZE0: usize = 1;
pub const ISIZE1: usize = 3;
pub const ISIZE2: usize = 5;

/// Bytecode opcodes.
pub mod op {
    /// Never emitted; catches runs off uninitialised buffers.
    pub const ILL: u8 = 0;
    /// Spread the list on the stack into arguments and call.
    pub const APPLIS: u8 = 1;
    /// Tail variant of `APPLIS`.
    pub const APPLIST: u8 = 2;
    /// Call the closure in the accumulator.
    pub const APPLY: u8 = 3;
    /// Tail-call the closure in the accumulator.
    pub const TAILAPP: u8 = 4;
    /// Load literal-pool slot `a` into the accumulator.
    pub const QUOTE: u8 = 5;
    /// Load argument `a` of the current frame.
    pub const ARG: u8 = 6;
    /// Load environment slot `a`; operand two names the symbol.
    pub const REF: u8 = 7;
    /// Push the boxed accumulator.
    pub const PUSH: u8 = 8;
    /// Push the true constant (comparison chains).
    pub const PUSHTRUE: u8 = 9;
    /// Push the fixnum operand (argument counts).
    pub const PUSHVAL: u8 = 10;
    /// Pop into the accumulator.
    pub const POP: u8 = 11;
    /// Drop the top of stack.
    pub const DROP: u8 = 12;
    /// Unconditional jump.
    pub const JMP: u8 = 13;
    /// Branch when the accumulator is NIL.
    pub const BRF: u8 = 14;
    /// Branch when the accumulator is not NIL.
    pub const BRT: u8 = 15;
    /// Stop the machine; the accumulator is the result.
    pub const HALT: u8 = 16;
    /// Capture the machine state in a catch tag and push it.
    pub const CATCHSTAR: u8 = 17;
    /// Restore the state of the catch tag in the accumulator.
    pub const THROWSTAR: u8 = 18;
    /// Make a closure of (operand entry, accumulator environment).
    pub const CLOSURE: u8 = 19;
    /// Make a fresh environment vector of `a` slots.
    pub const MKENV: u8 = 20;
    /// Reuse the current environment for the new closure.
    pub const PROPENV: u8 = 21;
    /// Copy environment slot into the new environment.
    pub const CPREF: u8 = 22;
    /// Copy an argument box into the new environment.
    pub const CPARG: u8 = 23;
    /// Enter a fixed-arity function: check count, set frame.
    pub const ENTER: u8 = 24;
    /// Enter a variadic function: collect the rest list.
    pub const ENTCOL: u8 = 25;
    /// Return to the caller's frame.
    pub const RETURN: u8 = 26;
    /// Assign the accumulator through argument box `a`.
    pub const SETARG: u8 = 27;
    /// Assign the accumulator through environment box `a`.
    pub const SETREF: u8 = 28;
    /// Register the accumulator as the macro named by symbol `a`.
    pub const MACRO: u8 = 29;

    // one opcode per built-in primitive
    pub const ABS: u8 = 30;
    pub const ALPHAC: u8 = 31;
    pub const ATOM: u8 = 32;
    pub const BITOP: u8 = 33;
    pub const CAAR: u8 = 34;
    pub const CADR: u8 = 35;
    pub const CAR: u8 = 36;
    pub const CDAR: u8 = 37;
    pub const CDDR: u8 = 38;
    pub const CDR: u8 = 39;
    pub const CEQUAL: u8 = 40;
    pub const CGRTR: u8 = 41;
    pub const CGTEQ: u8 = 42;
    pub const CHAR: u8 = 43;
    pub const CHARP: u8 = 44;
    pub const CHARVAL: u8 = 45;
    pub const CLESS: u8 = 46;
    pub const CLOSE_PORT: u8 = 47;
    pub const CLTEQ: u8 = 48;
    pub const CMDLINE: u8 = 49;
    pub const CONC: u8 = 50;
    pub const CONS: u8 = 51;
    pub const CONSTP: u8 = 52;
    pub const CTAGP: u8 = 53;
    pub const DELETE: u8 = 54;
    pub const DIV: u8 = 55;
    pub const DOWNCASE: u8 = 56;
    pub const DUMP_IMAGE: u8 = 57;
    pub const EOFP: u8 = 58;
    pub const EQ: u8 = 59;
    pub const EQUAL: u8 = 60;
    pub const ERROR: u8 = 61;
    pub const ERROR2: u8 = 62;
    pub const ERRPORT: u8 = 63;
    pub const EVAL: u8 = 64;
    pub const EXISTSP: u8 = 65;
    pub const FIXP: u8 = 66;
    pub const FLUSH: u8 = 67;
    pub const FORMAT: u8 = 68;
    pub const FUNP: u8 = 69;
    pub const GC: u8 = 70;
    pub const GENSYM: u8 = 71;
    pub const GRTR: u8 = 72;
    pub const GTEQ: u8 = 73;
    pub const INPORT: u8 = 74;
    pub const INPORTP: u8 = 75;
    pub const LESS: u8 = 76;
    pub const LISTSTR: u8 = 77;
    pub const LISTVEC: u8 = 78;
    pub const LOAD: u8 = 79;
    pub const LOWERC: u8 = 80;
    pub const LTEQ: u8 = 81;
    pub const MAX: u8 = 82;
    pub const MIN: u8 = 83;
    pub const MINUS: u8 = 84;
    pub const MKSTR: u8 = 85;
    pub const MKVEC: u8 = 86;
    pub const MX: u8 = 87;
    pub const MX1: u8 = 88;
    pub const NCONC: u8 = 89;
    pub const NEGATE: u8 = 90;
    pub const NRECONC: u8 = 91;
    pub const NULL: u8 = 92;
    pub const NUMERIC: u8 = 93;
    pub const NUMSTR: u8 = 94;
    pub const OBTAB: u8 = 95;
    pub const OPEN_INFILE: u8 = 96;
    pub const OPEN_OUTFILE: u8 = 97;
    pub const OUTPORT: u8 = 98;
    pub const OUTPORTP: u8 = 99;
    pub const PAIR: u8 = 100;
    pub const PEEKC: u8 = 101;
    pub const PLUS: u8 = 102;
    pub const PRIN: u8 = 103;
    pub const PRINC: u8 = 104;
    pub const QUIT: u8 = 105;
    pub const READ: u8 = 106;
    pub const READC: u8 = 107;
    pub const RECONC: u8 = 108;
    pub const REM: u8 = 109;
    pub const RENAME: u8 = 110;
    pub const SCONC: u8 = 111;
    pub const SEQUAL: u8 = 112;
    pub const SETCAR: u8 = 113;
    pub const SETCDR: u8 = 114;
    pub const SET_INPORT: u8 = 115;
    pub const SET_OUTPORT: u8 = 116;
    pub const SFILL: u8 = 117;
    pub const SGRTR: u8 = 118;
    pub const SGTEQ: u8 = 119;
    pub const SIEQUAL: u8 = 120;
    pub const SIGRTR: u8 = 121;
    pub const SIGTEQ: u8 = 122;
    pub const SILESS: u8 = 123;
    pub const SILTEQ: u8 = 124;
    pub const SLESS: u8 = 125;
    pub const SLTEQ: u8 = 126;
    pub const SREF: u8 = 127;
    pub const SSET: u8 = 128;
    pub const SSIZE: u8 = 129;
    pub const STRINGP: u8 = 130;
    pub const STRLIST: u8 = 131;
    pub const STRNUM: u8 = 132;
    pub const SUBSTR: u8 = 133;
    pub const SUBVEC: u8 = 134;
    pub const SYMBOL: u8 = 135;
    pub const SYMBOLP: u8 = 136;
    pub const SYMNAME: u8 = 137;
    pub const SYMTAB: u8 = 138;
    pub const SYSCMD: u8 = 139;
    pub const TIMES: u8 = 140;
    pub const UNTAG: u8 = 141;
    pub const UPCASE: u8 = 142;
    pub const UPPERC: u8 = 143;
    pub const VCONC: u8 = 144;
    pub const VECLIST: u8 = 145;
    pub const VECTORP: u8 = 146;
    pub const VFILL: u8 = 147;
    pub const VREF: u8 = 148;
    pub const VSET: u8 = 149;
    pub const VSIZE: u8 = 150;
    pub const WHITEC: u8 = 151;
    pub const WRITEC: u8 = 152;
}

/// Size in bytes of the instruction starting with `o`.
#[must_use]
pub fn isize_of(o: u8) -> usize {
    match o {
        op::QUOTE
        | op::ARG
        | op::PUSHVAL
        | op::JMP
        | op::BRF
        | op::BRT
        | op::CLOSURE
        | op::MKENV
        | op::ENTER
        | op::ENTCOL
        | op::SETARG
        | op::SETREF
        | op::MACRO => ISIZE1,
        op::REF | op::CPARG | op::CPREF => ISIZE2,
        _ => ISIZE0,
    }
}

/// Printable name of a control opcode, or the primitive's surface
/// name from the dispatch table.
#[must_use]
pub fn opname(o: u8) -> &'static str {
    match o {
        op::ILL => "ill",
        op::APPLIS => "applis",
        op::APPLIST => "applist",
        op::APPLY => "apply",
        op::TAILAPP => "tailapp",
        op::QUOTE => "quote",
        op::ARG => "arg",
        op::REF => "ref",
        op::PUSH => "push",
        op::PUSHTRUE => "pushtrue",
        op::PUSHVAL => "pushval",
        op::POP => "pop",
        op::DROP => "drop",
        op::JMP => "jmp",
        op::BRF => "brf",
        op::BRT => "brt",
        op::HALT => "halt",
        op::CATCHSTAR => "catch*",
        op::THROWSTAR => "throw*",
        op::CLOSURE => "closure",
        op::MKENV => "mkenv",
        op::PROPENV => "propenv",
        op::CPREF => "cpref",
        op::CPARG => "cparg",
        op::ENTER => "enter",
        op::ENTCOL => "entcol",
        op::RETURN => "return",
        op::SETARG => "setarg",
        op::SETREF => "setref",
        op::MACRO => "macro",
        op::ERROR2 => "error2",
        op::NEGATE => "negate",
        _ => crate::compiler::SUBR_TABLE
            .iter()
            .find(|&&(_, _, sop)| sop == o)
            .map_or("?", |&(name, _, _)| name),
    }
}

impl Interp {
    /// 16-bit big-endian operand at byte offset `i` of bytecode
    /// string `p`.
    #[inline]
    pub(crate) fn fetcharg(&self, p: Cell, i: usize) -> usize {
        (usize::from(self.string_byte(p, i)) << 8) | usize::from(self.string_byte(p, i + 1))
    }

    /// Current instruction byte.
    #[inline]
    pub(crate) fn ins(&self) -> u8 {
        self.string_byte(self.cdr(self.prog), self.ip)
    }

    /// First operand of the current instruction.
    #[inline]
    pub(crate) fn op1(&self) -> usize {
        self.fetcharg(self.cdr(self.prog), self.ip + 1)
    }

    /// Second operand of the current instruction.
    #[inline]
    pub(crate) fn op2(&self) -> usize {
        self.fetcharg(self.cdr(self.prog), self.ip + 3)
    }

    /// Disassemble a BYTECODE atom into one line per instruction.
    #[must_use]
    pub fn disasm(&self, code: Cell) -> String {
        use std::fmt::Write;

        let p = self.cdr(code);
        let k = self.string_len(p);
        let mut out = String::new();
        let mut i = 0;
        while i < k {
            let o = self.string_byte(p, i);
            let _ = write!(out, "{i:04}: {}", opname(o));
            match isize_of(o) {
                ISIZE1 => {
                    let _ = write!(out, " {}", self.fetcharg(p, i + 1));
                }
                ISIZE2 => {
                    let a = self.fetcharg(p, i + 1);
                    let b = self.fetcharg(p, i + 3);
                    let _ = write!(out, " {a} {b}");
                }
                _ => {}
            }
            out.push('\n');
            i += isize_of(o);
        }
        out
    }
}
