// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Heap image save and restore.
//!
//! An image is a 32-byte header (magic, version, cell size, byte
//! order probe, padding), the two pool sizes, the image root
//! variables, and the raw pools: both cell arrays, the tag bytes and
//! the vector arena. A restore validates every header field and the
//! pool sizes and refuses anything that does not match this build;
//! nothing is overwritten until validation is complete.

#[cfg(test)]
mod image_test;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};

use crate::cell::{CELL_BYTES, Cell, NIL, Tag};
use crate::error::{Error, Result};
use crate::interp::Interp;
use crate::{NNODES, NVCELLS, VERSION};

/// Image magic.
const MAGIC: &[u8; 5] = b"SYLVA";

/// Byte-order probe value; written in native order.
const BYTE_ORDER: Cell = 0x3132_3334;

fn write_cell(w: &mut impl Write, v: Cell) -> std::io::Result<()> {
    w.write_all(&v.to_ne_bytes())
}

fn read_cell(r: &mut impl Read) -> std::io::Result<Cell> {
    let mut b = [0u8; CELL_BYTES];
    r.read_exact(&mut b)?;
    Ok(Cell::from_ne_bytes(b))
}

impl Interp {
    fn imagevars(&self) -> [Cell; 11] {
        [
            self.freelist,
            self.freevec as Cell,
            self.symbols,
            self.symhash,
            self.symptr,
            self.rts,
            self.glob,
            self.macros,
            self.obhash,
            self.obarray,
            self.obmap,
        ]
    }

    fn set_imagevars(&mut self, v: [Cell; 11]) {
        self.freelist = v[0];
        self.freevec = v[1] as usize;
        self.symbols = v[2];
        self.symhash = v[3];
        self.symptr = v[4];
        self.rts = v[5];
        self.glob = v[6];
        self.macros = v[7];
        self.obhash = v[8];
        self.obarray = v[9];
        self.obmap = v[10];
    }

    /// Move an existing image aside, replacing its suffix with
    /// `.oimage`.
    fn saveimg(path: &str) {
        let base = path.rfind('.').map_or(path, |i| &path[..i]);
        let old = format!("{base}.oimage");
        let _ = std::fs::remove_file(&old);
        let _ = std::fs::rename(path, &old);
    }

    fn dumpimg(&self, path: &str) -> core::result::Result<(), &'static str> {
        Self::saveimg(path);
        let f = File::create(path).map_err(|_| "cannot create image file")?;
        let mut w = BufWriter::new(f);
        let fail = "image dump failed";
        let mut header = [b'_'; 32];
        header[..5].copy_from_slice(MAGIC);
        header[5..13].copy_from_slice(VERSION.as_bytes());
        header[13] = b'0' + CELL_BYTES as u8;
        header[14..18].copy_from_slice(&BYTE_ORDER.to_ne_bytes());
        w.write_all(&header).map_err(|_| fail)?;
        write_cell(&mut w, NNODES as Cell).map_err(|_| fail)?;
        write_cell(&mut w, NVCELLS as Cell).map_err(|_| fail)?;
        for v in self.imagevars() {
            write_cell(&mut w, v).map_err(|_| fail)?;
        }
        for &c in &self.cars {
            write_cell(&mut w, c).map_err(|_| fail)?;
        }
        for &c in &self.cdrs {
            write_cell(&mut w, c).map_err(|_| fail)?;
        }
        let tagbytes: Vec<u8> = self.tags.iter().map(|t| t.bits()).collect();
        w.write_all(&tagbytes).map_err(|_| fail)?;
        w.write_all(&self.arena).map_err(|_| fail)?;
        w.flush().map_err(|_| fail)?;
        Ok(())
    }

    /// The `dump-image` primitive: write the image and bind
    /// `*imagefile*` to its path.
    pub(crate) fn dump_image(&mut self, s: Cell) -> Result<()> {
        let path = String::from_utf8_lossy(&self.string_copy(s)).into_owned();
        if let Err(rc) = self.dumpimg(&path) {
            let _ = std::fs::remove_file(&path);
            return Err(self.error(rc, s));
        }
        log::debug!("image dumped to {path}");
        let imagefile = self.syms.imagefile;
        self.bindset(imagefile, s);
        Ok(())
    }

    /// Restore an image written by [`Self::dump_image`]. The current
    /// heap is replaced wholesale; the special symbols and the
    /// primitive table are re-resolved from the restored symbol
    /// table.
    ///
    /// # Errors
    ///
    /// A fatal error for any header, size or read mismatch; the
    /// interpreter must not be used after a failed restore.
    pub fn load_image(&mut self, path: &str) -> Result<()> {
        let f = File::open(path).map_err(|_| Error::Fatal(String::from("could not open file")))?;
        let mut r = BufReader::new(f);
        let mut header = [0u8; 32];
        r.read_exact(&mut header)
            .map_err(|_| Error::Fatal(String::from("image file read error")))?;
        if &header[..5] != MAGIC {
            return Err(Error::Fatal(String::from("image header match failed")));
        }
        if &header[5..13] != VERSION.as_bytes() {
            return Err(Error::Fatal(String::from("wrong image version")));
        }
        if header[13] != b'0' + CELL_BYTES as u8 {
            return Err(Error::Fatal(String::from("wrong cell size")));
        }
        if header[14..18] != BYTE_ORDER.to_ne_bytes() {
            return Err(Error::Fatal(String::from("wrong byte order")));
        }
        let readerr = || Error::Fatal(String::from("image file read error"));
        let image_nodes = read_cell(&mut r).map_err(|_| readerr())?;
        let image_vcells = read_cell(&mut r).map_err(|_| readerr())?;
        if image_nodes != NNODES as Cell {
            return Err(Error::Fatal(String::from("wrong node pool size")));
        }
        if image_vcells != NVCELLS as Cell {
            return Err(Error::Fatal(String::from("wrong vector pool size")));
        }
        let mut vars = [NIL; 11];
        for v in &mut vars {
            *v = read_cell(&mut r).map_err(|_| readerr())?;
        }
        let mut cars = vec![0 as Cell; NNODES];
        for c in &mut cars {
            *c = read_cell(&mut r).map_err(|_| readerr())?;
        }
        let mut cdrs = vec![0 as Cell; NNODES];
        for c in &mut cdrs {
            *c = read_cell(&mut r).map_err(|_| readerr())?;
        }
        let mut tagbytes = vec![0u8; NNODES];
        r.read_exact(&mut tagbytes).map_err(|_| readerr())?;
        let mut arena = vec![0u8; NVCELLS * CELL_BYTES];
        r.read_exact(&mut arena).map_err(|_| readerr())?;
        let mut probe = [0u8; 1];
        if r.read(&mut probe).map_err(|_| readerr())? != 0 {
            return Err(Error::Fatal(String::from("wrong file size")));
        }
        self.cars = cars;
        self.cdrs = cdrs;
        self.tags = tagbytes.into_iter().map(Tag::from_bits_retain).collect();
        self.arena = arena;
        self.set_imagevars(vars);
        // transient state does not survive an image boundary
        self.protected = NIL;
        self.tmp = NIL;
        self.tmp_car = NIL;
        self.tmp_cdr = NIL;
        self.env = NIL;
        self.envp = NIL;
        self.emitbuf = NIL;
        self.cts = NIL;
        self.acc = NIL;
        self.prog = NIL;
        self.e0 = NIL;
        self.ep = NIL;
        self.files = NIL;
        self.argv = NIL;
        self.nullvec = NIL;
        self.nullstr = NIL;
        self.blank = NIL;
        self.zero = NIL;
        self.one = NIL;
        self.ten = NIL;
        self.sp = -1;
        self.fp = -1;
        self.sz = self.veclen(self.rts) as i32;
        self.clrtrace();
        // the shared scalar handles belong to the old heap; rebuild
        // them inside the restored one
        self.nullvec = self.newvec(crate::cell::T_VECTOR, 0)?;
        self.nullstr = self.newvec(crate::cell::T_STRING, 1)?;
        self.set_string_byte(self.nullstr, 0, 0);
        self.blank = self.mkchar(i32::from(b' '))?;
        self.zero = self.mkfix(0)?;
        self.one = self.mkfix(1)?;
        self.ten = self.mkfix(10)?;
        self.resolve_names()?;
        log::debug!("image restored from {path}");
        Ok(())
    }
}
