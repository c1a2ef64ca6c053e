// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

//! # Interactive Shell
//!
//! A line-oriented prompt over a running [`Network`]. Each line is resolved
//! once, in this order:
//!
//! 1. a [`Builtin`] (`help`, `nodes`, `net`, `sh`, `ping_all`, `ping_pair`),
//! 2. a node name followed by a command: the command runs on that node,
//! 3. `exit` / `quit`.
//!
//! Anything else is reported and the prompt comes back. Node commands stream
//! their output as it arrives; an interrupt typed meanwhile goes to the node,
//! not to the shell.

use std::io::{BufRead, Write};
use std::process::Command;
use std::time::Duration;

use thiserror::Error;
use vnet_common::utils::input::{InterruptSource, NoInterrupts};
use vnet_common::{debug, error, step};

use crate::error::NetworkError;
use crate::network::{Network, TestParams};
use crate::node::NodeId;

pub const PROMPT: &str = "vnet> ";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

const HELP: &str = "\
Documented commands:
  help, ?        show this text
  nodes          list all nodes
  net            list every switch and its peers
  sh CMD         run CMD in a local shell
  ping_all       ping between all hosts
  ping_pair      ping between the first two hosts
  exit, quit     leave the shell

Any other line starting with a node name runs the rest of the line on that
node. Node names in the command are replaced by their addresses:
  h3 ping -c1 h4
";

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("unknown node or command: < {0} >")]
    Unknown(String),

    #[error("ping_pair needs two hosts, the network has {0}")]
    NotEnoughHosts(usize),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Help,
    Nodes,
    Net,
    Sh,
    PingAll,
    PingPair,
}

impl Builtin {
    pub fn parse(word: &str) -> Option<Self> {
        match word {
            "help" | "?" => Some(Builtin::Help),
            "nodes" => Some(Builtin::Nodes),
            "net" => Some(Builtin::Net),
            "sh" => Some(Builtin::Sh),
            "ping_all" => Some(Builtin::PingAll),
            "ping_pair" => Some(Builtin::PingPair),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Exit,
}

pub struct Shell<'a, R, W> {
    net: &'a mut Network,
    input: R,
    out: W,
    interrupts: Box<dyn InterruptSource + 'a>,
}

impl<'a, R: BufRead, W: Write> Shell<'a, R, W> {
    pub fn new(net: &'a mut Network, input: R, out: W) -> Self {
        Self {
            net,
            input,
            out,
            interrupts: Box::new(NoInterrupts),
        }
    }

    pub fn with_interrupts(mut self, interrupts: Box<dyn InterruptSource + 'a>) -> Self {
        self.interrupts = interrupts;
        self
    }

    /// Reads and executes lines until end of input or `exit`.
    pub fn run(&mut self) -> Result<(), ShellError> {
        step!("Starting CLI");
        let mut line = String::new();
        loop {
            write!(self.out, "{PROMPT}")?;
            self.out.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.out)?;
                return Ok(());
            }
            match self.execute(&line) {
                Ok(Outcome::Exit) => return Ok(()),
                Ok(Outcome::Continue) => {}
                Err(e) => error!("{e}"),
            }
        }
    }

    /// Executes a single line.
    pub fn execute(&mut self, line: &str) -> Result<Outcome, ShellError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&first, args)) = words.split_first() else {
            return Ok(Outcome::Continue);
        };

        if let Some(builtin) = Builtin::parse(first) {
            self.builtin(builtin, args)?;
            return Ok(Outcome::Continue);
        }
        // A node name alone is not a command.
        if !args.is_empty()
            && let Some(id) = self.net.node_by_name(first)
        {
            self.run_on_node(id, args)?;
            return Ok(Outcome::Continue);
        }
        if matches!(first, "exit" | "quit") {
            return Ok(Outcome::Exit);
        }
        Err(ShellError::Unknown(first.to_string()))
    }

    fn builtin(&mut self, builtin: Builtin, args: &[&str]) -> Result<(), ShellError> {
        match builtin {
            Builtin::Help => write!(self.out, "{HELP}")?,
            Builtin::Nodes => {
                let names = self.net.node_names();
                if !names.is_empty() {
                    writeln!(self.out, "available nodes are:\n{}", names.join(" "))?;
                }
            }
            Builtin::Net => {
                for id in self.net.switches() {
                    let node = self.net.node(id);
                    let peers: Vec<&str> = node
                        .intfs()
                        .iter()
                        .filter_map(|intf| node.connection(intf))
                        .map(|(peer, _)| self.net.node(peer).name())
                        .collect();
                    writeln!(self.out, "{} <-> {}", node.name(), peers.join(" "))?;
                }
            }
            Builtin::Sh => self.local_shell(args)?,
            Builtin::PingAll => {
                self.net.ping_test(None, true)?;
            }
            Builtin::PingPair => {
                let hosts = self.hosts_by_dpid();
                if hosts.len() < 2 {
                    return Err(ShellError::NotEnoughHosts(hosts.len()));
                }
                self.net.ping_test(Some(&hosts[..2]), true)?;
            }
        }
        Ok(())
    }

    fn local_shell(&mut self, args: &[&str]) -> Result<(), ShellError> {
        if args.is_empty() {
            return Ok(());
        }
        let output = Command::new("sh").arg("-c").arg(args.join(" ")).output()?;
        self.out.write_all(&output.stdout)?;
        self.out.write_all(&output.stderr)?;
        self.out.flush()?;
        Ok(())
    }

    fn run_on_node(&mut self, id: NodeId, args: &[&str]) -> Result<(), ShellError> {
        let cmd = self.substitute(args);
        debug!("{}: running {cmd}", self.net.node(id).name());
        self.net.node_mut(id).run_async(&cmd)?;

        self.interrupts.arm();
        let result = self.stream_output(id);
        self.interrupts.disarm();
        result
    }

    fn stream_output(&mut self, id: NodeId) -> Result<(), ShellError> {
        loop {
            if self.interrupts.interrupted() {
                self.net.node_mut(id).interrupt()?;
            }
            let chunk = self.net.node_mut(id).poll(POLL_INTERVAL)?;
            if !chunk.output.is_empty() {
                self.out.write_all(chunk.output.as_bytes())?;
                self.out.flush()?;
            }
            if chunk.done {
                return Ok(());
            }
        }
    }

    /// Replaces every word naming a node with that node's address.
    pub fn substitute(&self, args: &[&str]) -> String {
        args.iter()
            .map(|word| {
                self.net
                    .node_by_name(word)
                    .and_then(|id| self.net.node(id).address())
                    .map_or_else(|| word.to_string(), |addr| addr.to_string())
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn hosts_by_dpid(&self) -> Vec<NodeId> {
        let mut hosts: Vec<_> = self
            .net
            .hosts()
            .into_iter()
            .filter_map(|id| self.net.node(id).dpid().map(|dpid| (dpid, id)))
            .collect();
        hosts.sort_unstable();
        hosts.into_iter().map(|(_, id)| id).collect()
    }
}

/// Starts the network, hands it to an interactive shell and stops it once the
/// shell exits.
pub fn interact<R: BufRead, W: Write>(
    net: &mut Network,
    input: R,
    out: W,
    interrupts: Box<dyn InterruptSource>,
) -> Result<(), ShellError> {
    net.cycle(
        |net, _| Shell::new(net, input, out).with_interrupts(interrupts).run(),
        &TestParams::new(),
    )?
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSystem, Harness};
    use std::cell::Cell;
    use std::rc::Rc;
    use vnet_common::config::DatapathMode;
    use vnet_common::models::topology::{Dpid, StaticTopo};

    fn built() -> Harness {
        let mut harness = Harness::tree(DatapathMode::Kernel);
        harness.net.build().unwrap();
        harness
    }

    fn run_script(net: &mut Network, script: &str) -> String {
        let mut out = Vec::new();
        Shell::new(net, script.as_bytes(), &mut out).run().unwrap();
        String::from_utf8(out).unwrap()
    }

    /// Fires once, on the first check after arming.
    struct OneInterrupt {
        armed: Rc<Cell<u32>>,
        fired: bool,
    }

    impl InterruptSource for OneInterrupt {
        fn arm(&mut self) {
            self.armed.set(self.armed.get() + 1);
        }

        fn interrupted(&mut self) -> bool {
            !std::mem::replace(&mut self.fired, true)
        }

        fn disarm(&mut self) {}
    }

    #[test]
    fn builtins_resolve_from_their_names() {
        assert_eq!(Builtin::parse("?"), Some(Builtin::Help));
        assert_eq!(Builtin::parse("ping_pair"), Some(Builtin::PingPair));
        assert_eq!(Builtin::parse("pingall"), None);
    }

    #[test]
    fn node_names_are_replaced_by_addresses() {
        let mut harness = built();
        let out = run_script(&mut harness.net, "h3 ping -c1 h4\n");

        assert!(harness.journal.contains("async h3 ping -c1 10.0.0.4"));
        assert!(out.contains("ping -c1 10.0.0.4: started"));
        assert!(out.contains("1 packets transmitted, 1 received"));
    }

    #[test]
    fn words_without_an_address_are_kept() {
        let mut harness = built();
        let shell = Shell::new(&mut harness.net, &b""[..], Vec::new());
        assert_eq!(shell.substitute(&["ping", "s1", "h7", "foo"]), "ping s1 10.0.0.7 foo");
    }

    #[test]
    fn blank_lines_do_nothing() {
        let mut harness = built();
        let before = harness.journal.entries().len();
        let mut shell = Shell::new(&mut harness.net, &b""[..], Vec::new());

        assert_eq!(shell.execute("").unwrap(), Outcome::Continue);
        assert_eq!(shell.execute("   \t \n").unwrap(), Outcome::Continue);
        assert_eq!(harness.journal.entries().len(), before);
    }

    #[test]
    fn unknown_commands_are_reported_and_the_loop_continues() {
        let mut harness = built();
        {
            let mut shell = Shell::new(&mut harness.net, &b""[..], Vec::new());
            assert!(matches!(
                shell.execute("frobnicate now"),
                Err(ShellError::Unknown(ref w)) if w == "frobnicate"
            ));
        }
        let out = run_script(&mut harness.net, "frobnicate\nnodes\n");
        assert!(out.contains("c0 h3 h4 h6 h7 s1 s2 s5"));
    }

    #[test]
    fn node_name_without_a_command_is_unknown() {
        let mut harness = built();
        let before = harness.journal.entries().len();
        {
            let mut shell = Shell::new(&mut harness.net, &b""[..], Vec::new());
            assert!(matches!(
                shell.execute("h3"),
                Err(ShellError::Unknown(ref w)) if w == "h3"
            ));
            assert!(matches!(shell.execute("  c0  \n"), Err(ShellError::Unknown(_))));
        }
        assert_eq!(harness.journal.entries().len(), before);
    }

    #[test]
    fn nodes_on_an_empty_network_prints_nothing() {
        let mut harness = Harness::with(StaticTopo::new(), DatapathMode::Kernel, FakeSystem::new());
        let mut out = Vec::new();
        let mut shell = Shell::new(&mut harness.net, &b""[..], &mut out);
        shell.execute("nodes").unwrap();
        drop(shell);
        assert!(out.is_empty());
    }

    #[test]
    fn exit_and_quit_end_the_loop() {
        let mut harness = built();
        let out = run_script(&mut harness.net, "exit\nnodes\n");
        assert!(!out.contains("available nodes"));

        let out = run_script(&mut harness.net, "quit\nnodes\n");
        assert!(!out.contains("available nodes"));
    }

    #[test]
    fn net_lists_switch_peers_in_interface_order() {
        let mut harness = built();
        let out = run_script(&mut harness.net, "net\n");
        assert!(out.contains("s1 <-> s2 s5\n"));
        assert!(out.contains("s2 <-> s1 h3 h4\n"));
    }

    #[test]
    fn ping_pair_uses_the_two_lowest_hosts() {
        let mut harness = built();
        run_script(&mut harness.net, "ping_pair\n");

        assert!(harness.journal.contains("run h3 ping -c1 10.0.0.4"));
        assert!(harness.journal.contains("run h4 ping -c1 10.0.0.3"));
        assert!(!harness.journal.contains("run h6"));
    }

    #[test]
    fn ping_pair_needs_two_hosts() {
        let mut topo = StaticTopo::new();
        topo.add_host(Dpid(1)).unwrap();
        topo.add_switch(Dpid(2)).unwrap();
        topo.add_link(Dpid(1), Dpid(2)).unwrap();
        let mut harness = Harness::with(topo, DatapathMode::Kernel, FakeSystem::new());
        harness.net.build().unwrap();

        let mut shell = Shell::new(&mut harness.net, &b""[..], Vec::new());
        assert!(matches!(
            shell.execute("ping_pair"),
            Err(ShellError::NotEnoughHosts(1))
        ));
    }

    #[test]
    fn ping_all_covers_every_host_pair() {
        let mut harness = built();
        run_script(&mut harness.net, "ping_all\n");
        assert_eq!(harness.journal.matching("run h").len(), 12);
    }

    #[test]
    fn interrupts_go_to_the_node() {
        let mut harness = built();
        let armed = Rc::new(Cell::new(0));
        let interrupts = OneInterrupt {
            armed: armed.clone(),
            fired: false,
        };

        let mut out = Vec::new();
        Shell::new(&mut harness.net, &b"h6 ping h7\nnodes\n"[..], &mut out)
            .with_interrupts(Box::new(interrupts))
            .run()
            .unwrap();

        assert!(harness.journal.contains("interrupt h6"));
        assert_eq!(armed.get(), 1);
        // The shell survives and keeps reading.
        assert!(String::from_utf8(out).unwrap().contains("available nodes"));
    }

    #[test]
    fn sh_runs_outside_the_network() {
        let mut harness = built();
        let out = run_script(&mut harness.net, "sh echo outside\n");
        assert!(out.contains("outside\n"));
        assert!(harness.journal.matching("async ").is_empty());
    }

    #[test]
    fn interact_wraps_the_shell_in_start_and_stop() {
        let mut harness = built();
        interact(&mut harness.net, &b"nodes\n"[..], Vec::new(), Box::new(NoInterrupts)).unwrap();

        let start = harness.journal.position("start c0").unwrap();
        let stop = harness.journal.position("stop c0").unwrap();
        assert!(start < stop);
    }
}
