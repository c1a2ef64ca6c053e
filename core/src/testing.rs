// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

//! In-memory stand-ins for the OS so the orchestrator can be tested without
//! root. Every double writes what it was asked to do into a shared
//! [`Journal`].

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::bail;
use pnet::ipnetwork::Ipv4Network;
use vnet_common::config::{DatapathMode, MIGRATE_ATTEMPTS, NetworkConfig};
use vnet_common::models::topology::{StaticTopo, TreeTopo};
use vnet_common::system::System;
use vnet_common::utils::timing::{RetryPolicy, WaitPolicy};

use crate::network::Network;
use crate::node::{CommandChunk, ControllerRef, Node, NodeFactory};

const PING_OK: &str = "1 packets transmitted, 1 received, 0% packet loss, time 0ms";

#[derive(Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Whether any entry starts with `prefix`.
    pub fn contains(&self, prefix: &str) -> bool {
        self.0.borrow().iter().any(|e| e.starts_with(prefix))
    }

    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.0
            .borrow()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.0.borrow().iter().position(|e| e.starts_with(prefix))
    }

    pub fn last_position(&self, prefix: &str) -> Option<usize> {
        self.0.borrow().iter().rposition(|e| e.starts_with(prefix))
    }
}

#[derive(Default)]
struct ScriptState {
    replies: HashMap<(String, String), String>,
    down: HashSet<(String, String)>,
    failing_stops: HashSet<String>,
}

/// Canned behaviour shared by every scripted node.
#[derive(Clone, Default)]
pub struct Script(Rc<RefCell<ScriptState>>);

impl Script {
    /// Output of `cmd` when run on `node`. Pings succeed unless told otherwise.
    pub fn reply(&self, node: &str, cmd: &str, output: &str) {
        self.0
            .borrow_mut()
            .replies
            .insert((node.to_string(), cmd.to_string()), output.to_string());
    }

    pub fn interface_down(&self, node: &str, intf: &str) {
        self.0
            .borrow_mut()
            .down
            .insert((node.to_string(), intf.to_string()));
    }

    pub fn fail_stop(&self, node: &str) {
        self.0.borrow_mut().failing_stops.insert(node.to_string());
    }

    fn reply_for(&self, node: &str, cmd: &str) -> String {
        let state = self.0.borrow();
        match state.replies.get(&(node.to_string(), cmd.to_string())) {
            Some(reply) => reply.clone(),
            None if cmd.starts_with("ping") => PING_OK.to_string(),
            None => String::new(),
        }
    }

    fn is_down(&self, node: &str, intf: &str) -> bool {
        self.0
            .borrow()
            .down
            .contains(&(node.to_string(), intf.to_string()))
    }

    fn stop_fails(&self, node: &str) -> bool {
        self.0.borrow().failing_stops.contains(node)
    }
}

pub struct ScriptedNode {
    name: String,
    in_namespace: bool,
    pid: u32,
    journal: Journal,
    script: Script,
    pending: VecDeque<CommandChunk>,
}

impl ScriptedNode {
    fn finish(&self, action: &str) -> anyhow::Result<()> {
        self.journal.record(format!("{action} {}", self.name));
        if self.script.stop_fails(&self.name) {
            bail!("{action} failed");
        }
        Ok(())
    }
}

impl Node for ScriptedNode {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn in_namespace(&self) -> bool {
        self.in_namespace
    }

    fn start(&mut self, intfs: &[String], controller: Option<&ControllerRef>) -> anyhow::Result<()> {
        let controller = controller.map_or_else(|| "-".to_string(), |c| c.address.to_string());
        self.journal.record(format!(
            "start {} [{}] controller={controller}",
            self.name,
            intfs.join(",")
        ));
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        self.finish("stop")
    }

    fn terminate(&mut self) -> anyhow::Result<()> {
        self.finish("terminate")
    }

    fn assign_address(&mut self, intf: &str, net: Ipv4Network) -> anyhow::Result<()> {
        self.journal.record(format!("addr {} {intf} {net}", self.name));
        Ok(())
    }

    fn add_host_route(&mut self, dest: Ipv4Addr, intf: &str) -> anyhow::Result<()> {
        self.journal.record(format!("route {} {dest} {intf}", self.name));
        Ok(())
    }

    fn set_default_route(&mut self, intf: &str) -> anyhow::Result<()> {
        self.journal.record(format!("default {} {intf}", self.name));
        Ok(())
    }

    fn is_interface_up(&mut self, intf: &str) -> anyhow::Result<bool> {
        Ok(!self.script.is_down(&self.name, intf))
    }

    fn run_sync(&mut self, cmd: &str) -> anyhow::Result<String> {
        self.journal.record(format!("run {} {cmd}", self.name));
        Ok(self.script.reply_for(&self.name, cmd))
    }

    /// Streams `started`, one empty poll, then the scripted reply.
    fn run_async(&mut self, cmd: &str) -> anyhow::Result<()> {
        self.journal.record(format!("async {} {cmd}", self.name));
        let reply = self.script.reply_for(&self.name, cmd);
        self.pending = VecDeque::from([
            CommandChunk {
                output: format!("{cmd}: started\n"),
                done: false,
            },
            CommandChunk::default(),
            CommandChunk {
                output: format!("{reply}\n"),
                done: true,
            },
        ]);
        Ok(())
    }

    fn poll(&mut self, _timeout: Duration) -> anyhow::Result<CommandChunk> {
        Ok(self.pending.pop_front().unwrap_or(CommandChunk {
            output: String::new(),
            done: true,
        }))
    }

    fn interrupt(&mut self) -> anyhow::Result<()> {
        self.journal.record(format!("interrupt {}", self.name));
        Ok(())
    }
}

pub struct RecordingFactory {
    journal: Journal,
    script: Script,
    next_pid: u32,
}

impl RecordingFactory {
    pub fn new(journal: Journal, script: Script) -> Self {
        Self {
            journal,
            script,
            next_pid: 1000,
        }
    }

    fn spawn(&mut self, name: &str, in_namespace: bool) -> Box<dyn Node> {
        self.journal.record(format!("create {name}"));
        self.next_pid += 1;
        Box::new(ScriptedNode {
            name: name.to_string(),
            in_namespace,
            pid: self.next_pid,
            journal: self.journal.clone(),
            script: self.script.clone(),
            pending: VecDeque::new(),
        })
    }
}

impl NodeFactory for RecordingFactory {
    fn controller(&mut self, name: &str, in_namespace: bool) -> anyhow::Result<Box<dyn Node>> {
        Ok(self.spawn(name, in_namespace))
    }

    fn host(&mut self, name: &str) -> anyhow::Result<Box<dyn Node>> {
        Ok(self.spawn(name, true))
    }

    fn switch(&mut self, name: &str, _datapath: Option<u32>, in_namespace: bool) -> anyhow::Result<Box<dyn Node>> {
        Ok(self.spawn(name, in_namespace))
    }
}

pub struct FakeSystem {
    journal: Journal,
    privileged: bool,
    namespace_tool: bool,
    limits_fail: bool,
    renice_fail: bool,
    /// Remaining move failures; `u32::MAX` never recovers.
    move_failures: Cell<u32>,
}

impl FakeSystem {
    pub fn new() -> Self {
        Self {
            journal: Journal::default(),
            privileged: true,
            namespace_tool: true,
            limits_fail: false,
            renice_fail: false,
            move_failures: Cell::new(0),
        }
    }

    pub fn unprivileged(mut self) -> Self {
        self.privileged = false;
        self
    }

    pub fn without_namespace_tool(mut self) -> Self {
        self.namespace_tool = false;
        self
    }

    pub fn with_failing_limits(mut self) -> Self {
        self.limits_fail = true;
        self
    }

    pub fn with_failing_renice(mut self) -> Self {
        self.renice_fail = true;
        self
    }

    pub fn failing_moves(self, count: u32) -> Self {
        self.move_failures.set(count);
        self
    }
}

impl System for FakeSystem {
    fn is_privileged(&self) -> bool {
        self.privileged
    }

    fn locate_namespace_tool(&self) -> Option<PathBuf> {
        self.namespace_tool.then(|| PathBuf::from("/usr/bin/unshare"))
    }

    fn fix_limits(&self) -> anyhow::Result<()> {
        if self.limits_fail {
            bail!("operation not permitted");
        }
        Ok(())
    }

    fn create_link_pair(&self, intf_a: &str, intf_b: &str) -> anyhow::Result<()> {
        self.journal.record(format!("link {intf_a} {intf_b}"));
        Ok(())
    }

    fn move_interface(&self, intf: &str, pid: u32) -> anyhow::Result<()> {
        let left = self.move_failures.get();
        if left > 0 {
            if left != u32::MAX {
                self.move_failures.set(left - 1);
            }
            self.journal.record(format!("move-failed {intf}"));
            bail!("{intf}: device or resource busy");
        }
        self.journal.record(format!("move {intf} {pid}"));
        Ok(())
    }

    fn lower_priority(&self, pid: u32) -> anyhow::Result<()> {
        self.journal.record(format!("renice {pid}"));
        if self.renice_fail {
            bail!("permission denied");
        }
        Ok(())
    }
}

/// A network over the test doubles, with fast retry and wait policies.
pub struct Harness {
    pub net: Network,
    pub journal: Journal,
    pub script: Script,
}

impl Harness {
    /// The default depth 2, fanout 2 tree.
    pub fn tree(mode: DatapathMode) -> Self {
        Self::with(TreeTopo::default().into(), mode, FakeSystem::new())
    }

    pub fn with(topo: StaticTopo, mode: DatapathMode, system: FakeSystem) -> Self {
        let journal = system.journal.clone();
        let script = Script::default();
        let factory = RecordingFactory::new(journal.clone(), script.clone());

        let mut config = NetworkConfig::for_datapath(mode);
        config.migrate = RetryPolicy::new(MIGRATE_ATTEMPTS, Duration::ZERO);
        config.link_wait = WaitPolicy::bounded(Duration::from_millis(1), Duration::from_millis(20));

        let net = Network::new(Box::new(topo), Box::new(factory), Box::new(system), config);
        Self {
            net,
            journal,
            script,
        }
    }
}
