// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! File and port primitives, and program loading.

use std::fs::File;
use std::io::Write;

use crate::TOKLEN;
use crate::cell::{Cell, EOFMARK, NIL, T_INPORT, T_OUTPORT, TRUE};
use crate::error::Result;
use crate::interp::Interp;
use crate::ports::{EOF, PortKind};
use crate::reader::StrInput;

impl Interp {
    /// `(existsp path)`: TRUE when the file can be opened for
    /// reading.
    pub(crate) fn existsp_prim(&self, x: Cell) -> Cell {
        let path = String::from_utf8_lossy(&self.string_copy(x)).into_owned();
        if File::open(path).is_ok() { TRUE } else { NIL }
    }

    /// Open a file port: mode 0 reads, 1 writes, 2 appends.
    pub(crate) fn openfile(&mut self, x: Cell, mode: i32) -> Result<Cell> {
        let path = String::from_utf8_lossy(&self.string_copy(x)).into_owned();
        let p = match mode {
            0 => self.open_inport(&path),
            1 => self.open_outport(&path, false),
            _ => self.open_outport(&path, true),
        };
        let Some(p) = p else {
            if mode == 0 {
                return Err(self.error("open-infile: cannot open", x));
            }
            return Err(self.error("open-outfile: cannot open", x));
        };
        self.mkport(p as i32, if mode == 0 { T_INPORT } else { T_OUTPORT })
    }

    /// Read one character from a port, optionally peeking.
    pub(crate) fn b_readc(&mut self, p: usize, reject: bool) -> Result<Cell> {
        let pp = self.inport;
        if p != pp {
            self.set_inport(p);
        }
        let c = self.readc()?;
        if reject {
            self.rejectc(c);
        }
        if p != pp {
            self.set_inport(pp);
        }
        if c == EOF {
            return Ok(EOFMARK);
        }
        self.mkchar(c)
    }

    /// `(read [port-or-string])`. Reading from a string returns the
    /// form wrapped in a list, or the error message as a string.
    pub(crate) fn b_read(&mut self, ps: Cell) -> Result<Cell> {
        if self.is_string(ps) {
            let bytes = self.string_copy(ps);
            let saved = self.instr.replace(StrInput::new(&bytes));
            let n = self.xread();
            self.instr = saved;
            let n = n?;
            if let Some(msg) = self.readerr.take() {
                return self.mkstr(msg.as_bytes());
            }
            return self.cons(n, NIL);
        }
        let p = self.portno(ps) as usize;
        let pp = self.inport;
        if p != pp {
            self.set_inport(p);
        }
        let n = self.xread();
        if p != pp {
            self.set_inport(pp);
        }
        n
    }

    /// Print to a given port.
    pub(crate) fn b_prin(&mut self, x: Cell, p: usize, sl: bool) -> Result<()> {
        let pp = self.outport;
        if p != pp {
            self.set_outport(p);
        }
        let r = self.prex(sl, x, 0);
        if p != pp {
            self.set_outport(pp);
        }
        r
    }

    /// `(format x)`: print into a fresh string.
    pub(crate) fn b_format(&mut self, x: Cell) -> Result<Cell> {
        let s = self.format_host(x)?;
        self.mkstr(s.as_bytes())
    }

    /// Write one character to a given port.
    pub(crate) fn b_writec(&mut self, c: u8, p: usize) -> Result<()> {
        let pp = self.outport;
        if p != pp {
            self.set_outport(p);
        }
        let r = self.writec(c);
        if p != pp {
            self.set_outport(pp);
        }
        r
    }

    /// `(rename old new)`.
    pub(crate) fn b_rename(&mut self, old: Cell, new: Cell) -> Result<()> {
        if !self.is_string(old) {
            return Err(self.expect("rename", "string", old));
        }
        if !self.is_string(new) {
            return Err(self.expect("rename", "string", new));
        }
        let from = String::from_utf8_lossy(&self.string_copy(old)).into_owned();
        let to = String::from_utf8_lossy(&self.string_copy(new)).into_owned();
        if std::fs::rename(from, to).is_err() {
            let inner = self.cons(new, NIL)?;
            let obj = self.cons(old, inner)?;
            return Err(self.error("rename: cannot rename", obj));
        }
        Ok(())
    }

    /// Flush one output port by number.
    pub(crate) fn port_flush(&mut self, p: usize) {
        if let Some(port) = self.ports.get_mut(p).and_then(Option::as_mut) {
            match &mut port.kind {
                PortKind::Stdout => {
                    let _ = std::io::stdout().flush();
                }
                PortKind::Stderr => {
                    let _ = std::io::stderr().flush();
                }
                PortKind::OutFile(w) => {
                    let _ = w.flush();
                }
                _ => {}
            }
        }
    }

    /// Read and evaluate every form of a source file. The load port
    /// is locked against collection for the duration; the file name
    /// and line counter feed error reports.
    pub fn loadfile(&mut self, path: &str) -> Result<()> {
        let Some(ldport) = self.open_inport(path) else {
            let obj = self.mkstr(path.as_bytes())?;
            return Err(self.error("load: cannot open file", obj));
        };
        self.lock_port(ldport);
        let rdport = self.inport;
        let oline = self.line;
        let name = self.mkstr(path.as_bytes())?;
        self.files = self.cons(name, self.files)?;
        self.line = 1;
        log::debug!("loading {path}");
        self.begin_rec()?;
        loop {
            self.set_inport(ldport);
            let x = self.xread()?;
            self.set_inport(rdport);
            if x == EOFMARK {
                break;
            }
            self.eval(x, false)?;
        }
        self.end_rec()?;
        self.files = self.cdr(self.files);
        self.line = oline;
        self.close_port(ldport as i32);
        Ok(())
    }

    /// The `load` primitive.
    pub(crate) fn b_load(&mut self, x: Cell) -> Result<()> {
        if !self.is_string(x) {
            return Err(self.expect("load", "string", x));
        }
        if self.string_len(x) > TOKLEN {
            return Err(self.error("load: path too long", x));
        }
        let path = String::from_utf8_lossy(&self.string_copy(x)).into_owned();
        self.loadfile(&path)
    }
}
