// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

//! Builds one network per requested datapath and either runs the full-mesh
//! ping test on it or hands it to the interactive shell.

use std::io;
use std::time::Instant;

use colored::*;
use tracing::info_span;
use vnet_common::config::{Config, ConfigFile, DatapathMode, NetworkConfig};
use vnet_common::models::topology::StaticTopo;
use vnet_common::utils::input::{InterruptSource, KeyboardInterrupts, NoInterrupts};
use vnet_common::{info, step, success};
use vnet_core::network::{self, Network, TestParams};
use vnet_core::shell;
use vnet_core::shell_node::LinuxNodeFactory;
use vnet_core::system::LinuxSystem;

use crate::commands::CommandLine;
use crate::terminal::print::{self, Print};
use crate::terminal::spinner::SpinnerGuard;
use crate::terminal::{colors, writer::CrlfWriter};

/// Loss figure of one datapath run. `None` when there was nobody to ping.
pub type DatapathResult = (DatapathMode, Option<u32>);

pub fn run(cmd: &CommandLine, cfg: &Config) -> anyhow::Result<()> {
    network::init(&LinuxSystem)?;

    let file = match &cmd.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            ConfigFile::load(path)?
        }
        None => ConfigFile::default(),
    };
    let topo = cmd.topology()?;
    let datapaths = cmd.datapaths();

    let names: Vec<String> = datapaths.iter().map(DatapathMode::to_string).collect();
    step!("Testing with {} datapath", names.join(" and "));

    let mut results: Vec<DatapathResult> = Vec::with_capacity(datapaths.len());
    for mode in datapaths {
        print::header(&format!("{mode} datapath"));
        let mut net = build(&topo, mode, &file)?;

        if cfg.interactive {
            interactive(&mut net, cfg)?;
            continue;
        }

        let loss = net.cycle(|net, _| net.ping_test(None, true), &TestParams::new())??;
        results.push((mode, loss));
    }

    if !cfg.interactive {
        Print::results(&results);
    }
    Ok(())
}

fn build(topo: &StaticTopo, mode: DatapathMode, file: &ConfigFile) -> anyhow::Result<Network> {
    let config = NetworkConfig::for_datapath(mode).with_file(file);
    let factory = LinuxNodeFactory::new(file.commands.clone());
    let mut net = Network::new(
        Box::new(topo.clone()),
        Box::new(factory),
        Box::new(LinuxSystem),
        config,
    );

    let started = Instant::now();
    {
        let _guard = run_spinner(mode, started);
        net.build()?;
    }
    success!(
        "Built {} network in {:.2}s",
        mode,
        started.elapsed().as_secs_f64()
    );
    Ok(net)
}

fn run_spinner(mode: DatapathMode, started: Instant) -> SpinnerGuard {
    let span = info_span!("build", indicatif.pb_show = true);
    let _enter = span.enter();

    SpinnerGuard::with_status(span.clone(), move || {
        let elapsed = format!("{:.1}s", started.elapsed().as_secs_f64()).bold();
        format!("Building {mode} network ({elapsed})...")
            .color(colors::TEXT_DEFAULT)
            .italic()
    })
}

fn interactive(net: &mut Network, cfg: &Config) -> anyhow::Result<()> {
    let interrupts: Box<dyn InterruptSource> = if cfg.disable_input {
        Box::new(NoInterrupts)
    } else {
        Box::new(KeyboardInterrupts::default())
    };

    let stdin = io::stdin();
    shell::interact(net, stdin.lock(), CrlfWriter::new(io::stdout()), interrupts)?;
    Ok(())
}
