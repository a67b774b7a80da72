// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The `sylva` command-line driver.
//!
//! Restores a heap image (or loads the library source on first run),
//! preloads program files, binds `(cmdline)`, invokes a `start`
//! closure when one is defined, and then either runs a script or
//! enters the REPL.

use std::path::Path;
use std::process::ExitCode;

use anyhow::anyhow;
use clap::Parser;

use sylva::{IMAGEFILE, IMAGESRC, Interp, VERSION};

#[derive(Parser)]
#[command(
    name = "sylva",
    about = "Sylva - a small Lisp system",
    after_help = "FILE runs a script with ARGS bound to (cmdline);\n\
                  `-- ARGS...` binds ARGS and enters the REPL."
)]
struct Args {
    /// Restore the heap image from this file; `-` starts from the
    /// library source instead
    #[arg(short = 'i', value_name = "FILE")]
    image: Option<String>,

    /// Load a program file before starting; may be repeated
    #[arg(short = 'l', value_name = "FILE")]
    load: Vec<String>,

    /// Quiet: no banner, no prompt, exit on errors
    #[arg(short = 'q')]
    quiet: bool,

    /// Print the terms of use and exit
    #[arg(short = 'L')]
    terms: bool,

    /// Script file and its arguments
    #[arg(value_name = "FILE [ARGS]...", trailing_var_arg = true)]
    rest: Vec<String>,
}

fn terms() {
    println!("\nSylva {VERSION} by Tobias Sarnowski\n");
    println!("This program is free software: you can redistribute it and/or");
    println!("modify it under the terms of the GNU General Public License");
    println!("as published by the Free Software Foundation, either version 3");
    println!("of the License, or (at your option) any later version.\n");
}

/// True when the trailing arguments came after a literal `--`, i.e.
/// there is no script to run.
fn after_dashdash(rest: &[String]) -> bool {
    let raw: Vec<String> = std::env::args().collect();
    raw.iter()
        .position(|a| a == "--")
        .is_some_and(|i| raw.len() - i - 1 == rest.len())
}

fn run(args: &Args) -> anyhow::Result<()> {
    let mut it = Interp::new().map_err(|e| anyhow!("{e}"))?;
    it.set_quiet(args.quiet);

    let imgfile = args.image.clone().unwrap_or_else(|| IMAGEFILE.to_string());
    if imgfile != "-" && Path::new(&imgfile).exists() {
        it.load_image(&imgfile).map_err(|e| anyhow!("{e}"))?;
        it.bind_imagefile(&imgfile).map_err(|e| anyhow!("{e}"))?;
    } else if args.image.is_some() && imgfile != "-" {
        return Err(anyhow!("cannot open image file"));
    } else if Path::new(IMAGESRC).exists() {
        if let Err(e) = it.loadfile(IMAGESRC) {
            it.report(&e);
            return Err(anyhow!("could not load library"));
        }
    }

    for f in &args.load {
        if let Err(e) = it.loadfile(f) {
            it.report(&e);
            return Err(anyhow!("could not load {f}"));
        }
    }
    it.bind_quiet_global();

    let dashdash = after_dashdash(&args.rest);
    let script = if dashdash {
        None
    } else {
        args.rest.first().cloned()
    };
    let cmdline: &[String] = if args.rest.is_empty() {
        &[]
    } else if dashdash {
        &args.rest
    } else {
        &args.rest[1..]
    };

    if !args.quiet && args.rest.is_empty() {
        println!("Sylva {VERSION}");
    }
    if !args.rest.is_empty() {
        it.bind_cmdline(cmdline).map_err(|e| anyhow!("{e}"))?;
    }
    if let Err(e) = it.run_start() {
        it.report(&e);
        return Err(anyhow!("start failed"));
    }
    if let Some(script) = script {
        if let Err(e) = it.loadfile(&script) {
            it.report(&e);
            return Err(anyhow!("could not load {script}"));
        }
        return Ok(());
    }
    it.repl();
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    if args.terms {
        terms();
        return ExitCode::SUCCESS;
    }
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("*** {e}");
            ExitCode::FAILURE
        }
    }
}
