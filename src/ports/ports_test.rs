// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the port table and byte I/O.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::cell::Tag;
use crate::interp::Interp;
use crate::ports::EOF;

fn it() -> Interp {
    Interp::new().unwrap()
}

fn tmpfile(name: &str) -> String {
    let dir = std::env::temp_dir();
    dir.join(format!("sylva-ports-{}-{name}", std::process::id()))
        .to_string_lossy()
        .into_owned()
}

#[test]
fn stdio_slots_are_locked() {
    let it = it();
    for i in 0..3 {
        assert!(it.ports[i].is_some());
        assert!(it.port_flags[i].contains(Tag::LOCK));
    }
}

#[test]
fn file_roundtrip_through_ports() {
    let mut it = it();
    let path = tmpfile("roundtrip");
    let p = it.open_outport(&path, false).unwrap();
    let old = it.set_outport(p);
    it.prints("hi!").unwrap();
    it.set_outport(old);
    it.close_port(p as i32);

    let p = it.open_inport(&path).unwrap();
    let old = it.set_inport(p);
    assert_eq!(it.readc().unwrap(), i32::from(b'h'));
    assert_eq!(it.readc().unwrap(), i32::from(b'i'));
    // pushback is one byte deep
    it.rejectc(i32::from(b'X'));
    assert_eq!(it.readc().unwrap(), i32::from(b'X'));
    assert_eq!(it.readc().unwrap(), i32::from(b'!'));
    assert_eq!(it.readc().unwrap(), EOF);
    it.set_inport(old);
    it.close_port(p as i32);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn collector_closes_unreferenced_ports() {
    let mut it = it();
    let path = tmpfile("gc-close");
    std::fs::write(&path, b"x").unwrap();
    let p = it.open_inport(&path).unwrap();
    assert!(it.ports[p].is_some());
    // no port atom references the slot, so a collection drops it
    it.gc();
    assert!(it.ports[p].is_none());
    let _ = std::fs::remove_file(&path);
}

#[test]
fn locked_ports_survive_collection() {
    let mut it = it();
    let path = tmpfile("gc-lock");
    std::fs::write(&path, b"x").unwrap();
    let p = it.open_inport(&path).unwrap();
    it.lock_port(p);
    it.gc();
    assert!(it.ports[p].is_some());
    it.unlock_port(p);
    it.gc();
    assert!(it.ports[p].is_none());
    let _ = std::fs::remove_file(&path);
}

#[test]
fn capture_obeys_the_print_limit() {
    let mut it = it();
    it.hostcap = Some(Vec::new());
    it.plimit = 5;
    it.prints("abcdefgh").unwrap();
    it.prints("never").unwrap();
    let got = it.hostcap.take().unwrap();
    assert_eq!(got, b"abcdefgh");
    assert_eq!(it.plimit, 1);
    it.plimit = 0;
}
