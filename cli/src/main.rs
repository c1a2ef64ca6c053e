// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

//! # vnet CLI Entry Point
//!
//! Bootstraps logging and the terminal, then hands over to
//! [`commands::run`], which builds, tests and tears down one network per
//! requested datapath.
//!
//! This is also the error boundary: anything that propagates up is logged as
//! a critical failure and turned into a non-zero [`ExitCode`]. Missing
//! privileges, a missing namespace tool, an unreachable control network and
//! unparseable or anomalous ping output all end up here.

mod commands;
mod terminal;

use std::process::ExitCode;

use vnet_common::{config::Config, error};

use crate::{
    commands::{CommandLine, run},
    terminal::{print::Print, spinner},
};

fn main() -> ExitCode {
    let commands = CommandLine::parse_args();
    spinner::init_logging(&commands.level, commands.verbosity);

    let cfg = Config::from(&commands);

    let _ = Print::init(&cfg);
    Print::banner();

    let exit_code = match run::run(&commands, &cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Critical failure: {e:#}");
            ExitCode::FAILURE
        }
    };

    Print::end_of_program();

    exit_code
}
