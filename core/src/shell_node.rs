// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

//! # Shell-Backed Nodes
//!
//! Every node is a long-lived `sh` reading commands from a pipe. Isolated
//! nodes start the shell through `unshare --net`, so the shell's pid names the
//! node's network namespace.
//!
//! ## Command framing
//! Each command is sent as
//!
//! ```text
//! { <cmd>
//! } 2>&1
//! printf '\177'
//! ```
//!
//! and a reader thread forwards stdout chunks through a channel. The `0x7f`
//! byte marks the end of the command's output.
//!
//! The shell traps `SIGINT` with a no-op handler: an interrupt sent to the
//! process group stops the foreground command and leaves the shell alive.

use std::io::{Read, Write};
use std::net::Ipv4Addr;
use std::os::unix::process::CommandExt;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use anyhow::{Context, bail};
use nix::sys::signal::{Signal, kill, killpg};
use nix::unistd::Pid;
use pnet::ipnetwork::Ipv4Network;
use vnet_common::config::NodeCommands;
use vnet_common::debug;

use crate::node::{CommandChunk, ControllerRef, Node, NodeFactory};

const SENTINEL: u8 = 0x7f;
const READ_CHUNK: usize = 4096;
const SYNC_POLL: Duration = Duration::from_millis(50);
const FAILURE_MARK: &str = "__vnet_command_failed__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Controller,
    KernelSwitch(u32),
    UserSwitch,
}

/// Values substituted into [`NodeCommands`] templates.
struct Placeholders {
    dp: String,
    name: String,
    intfs: String,
    controller: String,
}

impl Placeholders {
    fn render(&self, template: &str) -> String {
        template
            .replace("{dp}", &self.dp)
            .replace("{name}", &self.name)
            .replace("{intfs}", &self.intfs)
            .replace("{controller}", &self.controller)
    }
}

pub struct ShellNode {
    name: String,
    role: Role,
    in_namespace: bool,
    commands: Arc<NodeCommands>,
    child: Child,
    stdin: ChildStdin,
    output: mpsc::Receiver<Vec<u8>>,
    /// Bytes read but not yet returned by [`Node::poll`].
    pending: Vec<u8>,
    waiting: bool,
    daemons: Vec<u32>,
}

impl ShellNode {
    pub fn spawn(name: &str, role: Role, in_namespace: bool, commands: Arc<NodeCommands>) -> anyhow::Result<Self> {
        let mut cmd = if in_namespace {
            let mut cmd = Command::new("unshare");
            cmd.args(["--net", "sh"]);
            cmd
        } else {
            Command::new("sh")
        };
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .process_group(0);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn shell for {name}"))?;
        let stdin = child.stdin.take().context("shell stdin is not piped")?;
        let mut stdout = child.stdout.take().context("shell stdout is not piped")?;

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name(format!("{name}-reader"))
            .spawn(move || {
                let mut buf = [0u8; READ_CHUNK];
                loop {
                    match stdout.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if tx.send(buf[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                    }
                }
            })
            .context("failed to spawn output reader")?;

        let mut node = Self {
            name: name.to_string(),
            role,
            in_namespace,
            commands,
            child,
            stdin,
            output: rx,
            pending: Vec::new(),
            waiting: false,
            daemons: Vec::new(),
        };

        node.stdin.write_all(b"trap ':' INT\n")?;
        if in_namespace {
            node.run_checked("ip link set lo up")?;
        }
        debug!("Spawned {} (pid {})", node.name, node.child.id());
        Ok(node)
    }

    /// Like [`Node::run_sync`], but fails when `cmd` exits non-zero.
    pub fn run_checked(&mut self, cmd: &str) -> anyhow::Result<String> {
        let output = self.run_sync(&format!("{{ {cmd}\n}} || echo {FAILURE_MARK}"))?;
        if let Some(pos) = output.find(FAILURE_MARK) {
            bail!("`{cmd}` failed on {}: {}", self.name, output[..pos].trim());
        }
        Ok(output)
    }

    /// Starts `cmd` in the background, logging to the node's log file.
    fn daemon(&mut self, cmd: &str) -> anyhow::Result<()> {
        let log = self.commands.log_dir.join(format!("{}.log", self.name));
        let output = self.run_sync(&format!("{cmd} >> {} 2>&1 &\necho $!", log.display()))?;
        let pid = output
            .lines()
            .rev()
            .find_map(|line| line.trim().parse::<u32>().ok())
            .with_context(|| format!("no pid reported for `{cmd}` on {}", self.name))?;

        debug!("{}: `{cmd}` running as pid {pid}", self.name);
        self.daemons.push(pid);
        Ok(())
    }

    fn bring_up(&mut self, intfs: &[String]) -> anyhow::Result<()> {
        for intf in intfs {
            self.run_checked(&format!("ip link set {intf} up"))?;
        }
        Ok(())
    }

    fn placeholders(&self, intfs: &[String], controller: Option<&ControllerRef>) -> Placeholders {
        let dp = match self.role {
            Role::KernelSwitch(dp) => dp.to_string(),
            _ => String::new(),
        };
        Placeholders {
            dp,
            name: self.name.clone(),
            intfs: intfs.join(","),
            controller: controller
                .map_or(Ipv4Addr::LOCALHOST, |c| c.address)
                .to_string(),
        }
    }

    fn pgid(&self) -> Pid {
        Pid::from_raw(self.child.id() as i32)
    }
}

impl Node for ShellNode {
    fn pid(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn in_namespace(&self) -> bool {
        self.in_namespace
    }

    fn start(&mut self, intfs: &[String], controller: Option<&ControllerRef>) -> anyhow::Result<()> {
        let vars = self.placeholders(intfs, controller);
        let commands = Arc::clone(&self.commands);

        match self.role {
            Role::Host => {}
            Role::Controller => self.daemon(&vars.render(&commands.controller))?,
            Role::KernelSwitch(_) => {
                // `deldp` fails when the datapath does not exist yet.
                for template in &commands.kernel_datapath_add {
                    let output = self.run_sync(&vars.render(template))?;
                    if !output.trim().is_empty() {
                        debug!(verbosity = 1, "{}: {}", self.name, output.trim());
                    }
                }
                self.bring_up(intfs)?;
                self.daemon(&vars.render(&commands.kernel_switch))?;
            }
            Role::UserSwitch => {
                self.bring_up(intfs)?;
                self.daemon(&vars.render(&commands.user_datapath))?;
                self.daemon(&vars.render(&commands.user_switch))?;
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        for pid in self.daemons.drain(..) {
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                debug!("{}: pid {pid} already gone ({e})", self.name);
            }
        }
        if let Role::KernelSwitch(_) = self.role {
            let vars = self.placeholders(&[], None);
            let cmd = vars.render(&self.commands.kernel_datapath_del);
            if let Err(e) = self.run_sync(&cmd) {
                debug!("{}: {e}", self.name);
            }
        }
        self.terminate()
    }

    fn terminate(&mut self) -> anyhow::Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        if let Err(e) = killpg(self.pgid(), Signal::SIGKILL) {
            debug!("{}: killpg failed ({e}), killing the shell only", self.name);
            self.child.kill()?;
        }
        self.child.wait()?;
        self.waiting = false;
        self.pending.clear();
        Ok(())
    }

    fn assign_address(&mut self, intf: &str, net: Ipv4Network) -> anyhow::Result<()> {
        self.run_checked(&format!("ip addr add {net} dev {intf}"))?;
        self.run_checked(&format!("ip link set {intf} up"))?;
        Ok(())
    }

    fn add_host_route(&mut self, dest: Ipv4Addr, intf: &str) -> anyhow::Result<()> {
        self.run_checked(&format!("ip route add {dest}/32 dev {intf}"))?;
        Ok(())
    }

    fn set_default_route(&mut self, intf: &str) -> anyhow::Result<()> {
        self.run_checked(&format!("ip route add default dev {intf}"))?;
        Ok(())
    }

    fn is_interface_up(&mut self, intf: &str) -> anyhow::Result<bool> {
        let output = self.run_sync(&format!("ip -o link show dev {intf}"))?;
        Ok(link_flags_up(&output))
    }

    fn run_sync(&mut self, cmd: &str) -> anyhow::Result<String> {
        self.run_async(cmd)?;
        let mut output = String::new();
        loop {
            let chunk = self.poll(SYNC_POLL)?;
            output.push_str(&chunk.output);
            if chunk.done {
                return Ok(output);
            }
        }
    }

    fn run_async(&mut self, cmd: &str) -> anyhow::Result<()> {
        if self.waiting {
            bail!("{} is still running a command", self.name);
        }
        write!(self.stdin, "{{ {cmd}\n}} 2>&1\nprintf '\\177'\n")
            .and_then(|()| self.stdin.flush())
            .with_context(|| format!("{} shell is gone", self.name))?;
        self.waiting = true;
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> anyhow::Result<CommandChunk> {
        if !self.waiting {
            return Ok(CommandChunk {
                output: String::new(),
                done: true,
            });
        }
        if !self.pending.contains(&SENTINEL) {
            match self.output.recv_timeout(timeout) {
                Ok(bytes) => self.pending.extend_from_slice(&bytes),
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    self.waiting = false;
                    bail!("{} shell exited", self.name)
                }
            }
        }
        let chunk = take_output(&mut self.pending);
        if chunk.done {
            self.waiting = false;
        }
        Ok(chunk)
    }

    fn interrupt(&mut self) -> anyhow::Result<()> {
        killpg(self.pgid(), Signal::SIGINT).with_context(|| format!("interrupt {}", self.name))?;
        Ok(())
    }
}

impl Drop for ShellNode {
    fn drop(&mut self) {
        let _ = self.terminate();
    }
}

/// Removes the decodable part of `pending`: everything up to the sentinel,
/// or every complete UTF-8 sequence when the sentinel has not arrived yet.
/// Bytes past the sentinel and a trailing partial character stay behind.
fn take_output(pending: &mut Vec<u8>) -> CommandChunk {
    let (len, done) = match pending.iter().position(|&b| b == SENTINEL) {
        Some(pos) => (pos, true),
        None => (complete_prefix(pending), false),
    };
    let output = String::from_utf8_lossy(&pending[..len]).into_owned();
    pending.drain(..len + usize::from(done));
    CommandChunk { output, done }
}

/// Length of the longest prefix of `bytes` that does not end inside a
/// multibyte character. Invalid sequences count as complete.
fn complete_prefix(bytes: &[u8]) -> usize {
    match std::str::from_utf8(bytes) {
        Ok(_) => bytes.len(),
        Err(e) => match e.error_len() {
            None => e.valid_up_to(),
            Some(bad) => {
                let skip = e.valid_up_to() + bad;
                skip + complete_prefix(&bytes[skip..])
            }
        },
    }
}

/// Whether the flag list of `ip -o link show` contains `UP`.
fn link_flags_up(output: &str) -> bool {
    let flags = match (output.find('<'), output.find('>')) {
        (Some(start), Some(end)) if start < end => &output[start + 1..end],
        _ => return false,
    };
    flags.split(',').any(|flag| flag == "UP")
}

/// Builds [`ShellNode`]s for every role.
pub struct LinuxNodeFactory {
    commands: Arc<NodeCommands>,
}

impl LinuxNodeFactory {
    pub fn new(commands: NodeCommands) -> Self {
        Self {
            commands: Arc::new(commands),
        }
    }
}

impl NodeFactory for LinuxNodeFactory {
    fn controller(&mut self, name: &str, in_namespace: bool) -> anyhow::Result<Box<dyn Node>> {
        let node = ShellNode::spawn(name, Role::Controller, in_namespace, self.commands.clone())?;
        Ok(Box::new(node))
    }

    fn host(&mut self, name: &str) -> anyhow::Result<Box<dyn Node>> {
        let node = ShellNode::spawn(name, Role::Host, true, self.commands.clone())?;
        Ok(Box::new(node))
    }

    fn switch(&mut self, name: &str, datapath: Option<u32>, in_namespace: bool) -> anyhow::Result<Box<dyn Node>> {
        let role = datapath.map_or(Role::UserSwitch, Role::KernelSwitch);
        let node = ShellNode::spawn(name, role, in_namespace, self.commands.clone())?;
        Ok(Box::new(node))
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
