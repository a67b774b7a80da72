// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The process port table and low-level byte I/O.
//!
//! Ports are small integers indexing a fixed table. Slots 0..2 are
//! stdio and stay locked; file ports are opened into free slots and
//! closed by the collector when no live port atom references them.
//! All interpreter output funnels through [`Interp::blockwrite`],
//! which also implements the print limit and the in-memory capture
//! used by `format` and error rendering.

#[cfg(test)]
mod ports_test;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};

use crate::NPORTS;
use crate::cell::{T_OUTPORT, Tag};
use crate::error::{Error, Result};
use crate::interp::Interp;

/// End-of-input marker returned by the byte readers.
pub(crate) const EOF: i32 = -1;

pub(crate) enum PortKind {
    Stdin,
    Stdout,
    Stderr,
    InFile(BufReader<File>),
    OutFile(BufWriter<File>),
}

/// One open port: a byte stream plus a one-byte pushback slot.
pub struct Port {
    pub(crate) kind: PortKind,
    pub(crate) pushback: Option<u8>,
}

impl Port {
    fn new(kind: PortKind) -> Self {
        Self {
            kind,
            pushback: None,
        }
    }
}

impl Interp {
    /// Install stdio in slots 0..2 and lock them.
    pub(crate) fn open_stdio(&mut self) {
        self.ports[0] = Some(Port::new(PortKind::Stdin));
        self.ports[1] = Some(Port::new(PortKind::Stdout));
        self.ports[2] = Some(Port::new(PortKind::Stderr));
        self.port_flags[0] = Tag::LOCK;
        self.port_flags[1] = Tag::LOCK;
        self.port_flags[2] = Tag::LOCK;
    }

    /// Read one byte from the current input source: the in-memory
    /// string when one is active, the current input port otherwise.
    pub(crate) fn readc(&mut self) -> Result<i32> {
        if let Some(s) = self.instr.as_mut() {
            return Ok(s.readc());
        }
        let p = self.inport;
        let Some(port) = self.ports[p].as_mut() else {
            return Err(Error::Fatal(String::from("readc: input port is not open")));
        };
        if let Some(b) = port.pushback.take() {
            return Ok(i32::from(b));
        }
        let mut buf = [0u8; 1];
        let n = match &mut port.kind {
            PortKind::Stdin => std::io::stdin().lock().read(&mut buf),
            PortKind::InFile(r) => r.read(&mut buf),
            _ => return Err(Error::Fatal(String::from("readc: not an input port"))),
        };
        match n {
            Ok(0) | Err(_) => Ok(EOF),
            Ok(_) => Ok(i32::from(buf[0])),
        }
    }

    /// Push one byte back onto the current input source.
    pub(crate) fn rejectc(&mut self, c: i32) {
        if let Some(s) = self.instr.as_mut() {
            s.rejectc(c);
        } else if c >= 0 {
            if let Some(port) = self.ports[self.inport].as_mut() {
                port.pushback = Some(c as u8);
            }
        }
    }

    /// Flush the current output port.
    pub(crate) fn flush(&mut self) -> Result<()> {
        let p = self.outport;
        let r = match self.ports[p].as_mut().map(|port| &mut port.kind) {
            Some(PortKind::Stdout) => std::io::stdout().flush(),
            Some(PortKind::Stderr) => std::io::stderr().flush(),
            Some(PortKind::OutFile(w)) => w.flush(),
            _ => Ok(()),
        };
        if r.is_err() {
            let obj = self.mkport(p as i32, T_OUTPORT)?;
            return Err(self.error("file write error, port", obj));
        }
        Ok(())
    }

    /// Write a block of bytes to the current output sink, honoring
    /// the print limit and the in-memory capture.
    pub(crate) fn blockwrite(&mut self, s: &[u8]) -> Result<()> {
        if self.plimit == 1 {
            return Ok(());
        }
        let k = s.len() as i32;
        if let Some(cap) = self.hostcap.as_mut() {
            cap.extend_from_slice(s);
            if self.plimit > 0 {
                self.plimit -= k;
                if self.plimit < 1 {
                    self.plimit = 1;
                }
            }
            return Ok(());
        }
        let p = self.outport;
        let Some(port) = self.ports[p].as_mut() else {
            return Err(Error::Fatal(String::from(
                "blockwrite: output port is not open",
            )));
        };
        let r = match &mut port.kind {
            PortKind::Stdout => std::io::stdout().write_all(s),
            PortKind::Stderr => std::io::stderr().write_all(s),
            PortKind::OutFile(w) => w.write_all(s),
            _ => return Err(Error::Fatal(String::from("blockwrite: not an output port"))),
        };
        if r.is_err() {
            let obj = self.mkport(p as i32, T_OUTPORT)?;
            return Err(self.error("file write error, port", obj));
        }
        if (p == 1 || p == 2) && s.last() == Some(&b'\n') {
            self.flush()?;
        }
        if self.plimit > 0 {
            self.plimit -= k;
            if self.plimit < 1 {
                self.plimit = 1;
            }
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn writec(&mut self, c: u8) -> Result<()> {
        self.blockwrite(&[c])
    }

    #[inline]
    pub(crate) fn prints(&mut self, s: &str) -> Result<()> {
        self.blockwrite(s.as_bytes())
    }

    #[inline]
    pub(crate) fn nl(&mut self) -> Result<()> {
        self.prints("\n")
    }

    /// Find a free port slot, collecting once if none is free.
    pub(crate) fn newport(&mut self) -> Option<usize> {
        for pass in 0..2 {
            for i in 0..NPORTS {
                if self.ports[i].is_none() {
                    return Some(i);
                }
            }
            if pass == 0 {
                self.gc();
            }
        }
        None
    }

    /// Open a file for reading; returns its port number.
    pub(crate) fn open_inport(&mut self, path: &str) -> Option<usize> {
        let i = self.newport()?;
        let f = File::open(path).ok()?;
        self.ports[i] = Some(Port::new(PortKind::InFile(BufReader::new(f))));
        self.port_flags[i] = Tag::empty();
        Some(i)
    }

    /// Open a file for writing (or appending); returns its port
    /// number.
    pub(crate) fn open_outport(&mut self, path: &str, append: bool) -> Option<usize> {
        let i = self.newport()?;
        let f = if append {
            File::options().append(true).create(true).open(path).ok()?
        } else {
            File::create(path).ok()?
        };
        self.ports[i] = Some(Port::new(PortKind::OutFile(BufWriter::new(f))));
        self.port_flags[i] = Tag::empty();
        Some(i)
    }

    /// Switch the current input port; returns the previous one.
    pub(crate) fn set_inport(&mut self, port: usize) -> usize {
        let p = self.inport;
        self.inport = port;
        p
    }

    /// Switch the current output port; returns the previous one.
    pub(crate) fn set_outport(&mut self, port: usize) -> usize {
        let p = self.outport;
        self.outport = port;
        p
    }

    /// Close a port and clear its flags. Closing stdio slots only
    /// clears the flags of empty slots.
    pub(crate) fn close_port(&mut self, port: i32) {
        if port < 0 || port as usize >= NPORTS {
            return;
        }
        self.ports[port as usize] = None;
        self.port_flags[port as usize] = Tag::empty();
    }

    /// Restore the stdio port assignment.
    pub(crate) fn reset_stdports(&mut self) {
        self.inport = 0;
        self.outport = 1;
        self.errport = 2;
    }

    pub(crate) fn lock_port(&mut self, port: usize) {
        if port < NPORTS {
            self.port_flags[port].insert(Tag::LOCK);
        }
    }

    pub(crate) fn unlock_port(&mut self, port: usize) {
        if port < NPORTS {
            self.port_flags[port].remove(Tag::LOCK);
        }
    }
}
