// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for heap image save and restore.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::interp::Interp;

fn tmpimage(name: &str) -> String {
    std::env::temp_dir()
        .join(format!("sylva-image-{}-{name}.image", std::process::id()))
        .to_string_lossy()
        .into_owned()
}

#[test]
fn globals_survive_an_image_boundary() {
    let path = tmpimage("globals");
    {
        let mut it = Interp::new().unwrap();
        it.eval_str("(def answer 42)").unwrap();
        it.eval_str("(def greet \"hello\")").unwrap();
        it.eval_str(&format!("(dump-image \"{path}\")")).unwrap();
    }
    let mut it = Interp::new().unwrap();
    it.load_image(&path).unwrap();
    let x = it.eval_str("answer").unwrap();
    assert_eq!(it.fixval(x), 42);
    let x = it.eval_str("greet").unwrap();
    assert_eq!(it.format_host(x).unwrap(), "\"hello\"");
    let _ = std::fs::remove_file(&path);
}

#[test]
fn functions_and_macros_survive_an_image_boundary() {
    let path = tmpimage("functions");
    {
        let mut it = Interp::new().unwrap();
        it.eval_str("(defun (double x) (* 2 x))").unwrap();
        it.eval_str("(defmac (twice x) (cons '+ (cons x (cons x nil))))")
            .unwrap();
        it.eval_str(&format!("(dump-image \"{path}\")")).unwrap();
    }
    let mut it = Interp::new().unwrap();
    it.load_image(&path).unwrap();
    let x = it.eval_str("(double 21)").unwrap();
    assert_eq!(it.fixval(x), 42);
    let x = it.eval_str("(twice 21)").unwrap();
    assert_eq!(it.fixval(x), 42);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn dump_binds_the_image_file() {
    let path = tmpimage("binds");
    let mut it = Interp::new().unwrap();
    it.eval_str(&format!("(dump-image \"{path}\")")).unwrap();
    let x = it.eval_str("*imagefile*").unwrap();
    assert_eq!(it.format_host(x).unwrap(), format!("\"{path}\""));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn an_existing_image_is_moved_aside() {
    let path = tmpimage("aside");
    let mut it = Interp::new().unwrap();
    it.eval_str(&format!("(dump-image \"{path}\")")).unwrap();
    it.eval_str(&format!("(dump-image \"{path}\")")).unwrap();
    let base = path.rfind('.').map_or(path.as_str(), |i| &path[..i]);
    let old = format!("{base}.oimage");
    assert!(std::path::Path::new(&old).exists());
    let _ = std::fs::remove_file(&path);
    let _ = std::fs::remove_file(&old);
}

#[test]
fn garbage_does_not_restore() {
    let path = tmpimage("garbage");
    std::fs::write(&path, b"not an image at all").unwrap();
    let mut it = Interp::new().unwrap();
    let e = it.load_image(&path).unwrap_err();
    assert!(!e.recoverable());
    let _ = std::fs::remove_file(&path);
}

#[test]
fn a_truncated_image_does_not_restore() {
    let path = tmpimage("truncated");
    {
        let mut it = Interp::new().unwrap();
        it.eval_str(&format!("(dump-image \"{path}\")")).unwrap();
    }
    let data = std::fs::read(&path).unwrap();
    std::fs::write(&path, &data[..data.len() / 2]).unwrap();
    let mut it = Interp::new().unwrap();
    assert!(it.load_image(&path).is_err());
    let _ = std::fs::remove_file(&path);
}
