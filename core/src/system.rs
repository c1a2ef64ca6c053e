// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::process::{Command, Output};

use anyhow::{Context, bail};
use nix::sys::resource::{Resource, setrlimit};

use vnet_common::debug;
use vnet_common::system::System;

const MAX_PROCESSES: (u64, u64) = (4096, 8192);
const MAX_OPEN_FILES: (u64, u64) = (16384, 16384);

/// Niceness applied to host shells so the datapath wins under load.
const HOST_NICENESS: &str = "+18";

/// iproute2-backed implementation of [`System`].
pub struct LinuxSystem;

impl System for LinuxSystem {
    fn is_privileged(&self) -> bool {
        is_root::is_root()
    }

    fn locate_namespace_tool(&self) -> Option<PathBuf> {
        let output = Command::new("sh")
            .args(["-c", "command -v unshare"])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!path.is_empty()).then(|| PathBuf::from(path))
    }

    fn fix_limits(&self) -> anyhow::Result<()> {
        setrlimit(Resource::RLIMIT_NPROC, MAX_PROCESSES.0, MAX_PROCESSES.1).context("raise RLIMIT_NPROC")?;
        setrlimit(Resource::RLIMIT_NOFILE, MAX_OPEN_FILES.0, MAX_OPEN_FILES.1)
            .context("raise RLIMIT_NOFILE")?;
        Ok(())
    }

    fn create_link_pair(&self, intf_a: &str, intf_b: &str) -> anyhow::Result<()> {
        // Stale pair from an earlier run; deleting one end removes both.
        let _ = run(&["ip", "link", "del", intf_a]);

        run_checked(&["ip", "link", "add", intf_a, "type", "veth", "peer", "name", intf_b])
            .with_context(|| format!("create veth pair {intf_a} <-> {intf_b}"))?;
        debug!("Created veth pair {intf_a} <-> {intf_b}");
        Ok(())
    }

    fn move_interface(&self, intf: &str, pid: u32) -> anyhow::Result<()> {
        let pid = pid.to_string();
        run_checked(&["ip", "link", "set", intf, "netns", &pid])
            .with_context(|| format!("move {intf} into netns of pid {pid}"))?;
        Ok(())
    }

    fn lower_priority(&self, pid: u32) -> anyhow::Result<()> {
        let pid = pid.to_string();
        run_checked(&["renice", HOST_NICENESS, "-p", &pid]).with_context(|| format!("renice pid {pid}"))?;
        Ok(())
    }
}

fn run(args: &[&str]) -> anyhow::Result<Output> {
    let (program, rest) = args.split_first().context("empty command")?;
    Command::new(program)
        .args(rest)
        .output()
        .with_context(|| format!("failed to spawn {program}"))
}

fn run_checked(args: &[&str]) -> anyhow::Result<Output> {
    let output = run(args)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("`{}` failed ({}): {}", args.join(" "), output.status, stderr.trim());
    }
    Ok(output)
}
