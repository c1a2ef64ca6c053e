// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

//! # Command Line Interface Definitions
//!
//! The schema for everything the user can type after `vnet`.
//!
//! Execution lives in the submodules; this file only declares arguments and
//! translates them into the internal configuration types:
//!
//! * [`Config`]: terminal behaviour (banner, density, interactive mode).
//! * [`CommandLine::topology`]: the topology every datapath run is built from.

pub mod run;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use vnet_common::config::{Config, DatapathMode};
use vnet_common::models::topology::{StaticTopo, TopologyError, TreeTopo};

#[derive(Parser)]
#[command(name = "vnet")]
#[command(about = "Emulate a virtual network of hosts and switches on one machine.")]
pub struct CommandLine {
    /// Log level (error, warn, info, debug, trace)
    #[arg(value_name = "LEVEL", default_value = "info")]
    pub level: String,

    /// Datapath to test, repeatable (default: kernel then user)
    #[arg(short = 'd', long = "datapath", value_name = "MODE", action = ArgAction::Append)]
    pub datapaths: Vec<DatapathMode>,

    /// Depth of the generated tree topology (at least 1)
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    pub depth: u32,

    /// Fanout of every switch in the generated tree topology
    #[arg(long, default_value_t = 2)]
    pub fanout: u32,

    /// Load the topology from a TOML file instead of generating a tree
    #[arg(long = "topo", value_name = "FILE", conflicts_with_all = ["depth", "fanout"])]
    pub topo: Option<PathBuf>,

    /// Override controller parameters and node programs
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Open the interactive shell instead of running the ping test
    #[arg(short = 'i', long = "interactive")]
    pub interactive: bool,

    /// Keep logs and colors but hide the banner
    #[arg(long = "no-banner")]
    pub no_banner: bool,

    /// Reduce UI visual density (-q: plain log lines only)
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    /// Increase logging detail (-v: node command output)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbosity: u8,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Requested datapaths in order, kernel then user when none were given.
    pub fn datapaths(&self) -> Vec<DatapathMode> {
        if self.datapaths.is_empty() {
            return vec![DatapathMode::Kernel, DatapathMode::User];
        }
        self.datapaths.clone()
    }

    pub fn topology(&self) -> Result<StaticTopo, TopologyError> {
        match &self.topo {
            Some(path) => StaticTopo::load(path),
            None => Ok(TreeTopo::new(self.depth, self.fanout).into()),
        }
    }
}

impl From<&CommandLine> for Config {
    fn from(cmd: &CommandLine) -> Self {
        Self {
            no_banner: cmd.no_banner,
            quiet: cmd.quiet,
            interactive: cmd.interactive,
            disable_input: !std::io::stdin().is_terminal(),
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
