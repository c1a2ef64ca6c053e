// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

//! # Live Nodes
//!
//! A [`NodeHandle`] is the orchestrator's record of one running node: its name,
//! its interfaces, the peer at the far end of each interface and the addresses
//! it was given. The process side (shell, daemons, namespace) sits behind the
//! [`Node`] trait so the orchestrator can be driven without touching the OS.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use pnet::ipnetwork::Ipv4Network;
use vnet_common::models::node::NodeKind;
use vnet_common::models::topology::Dpid;

use crate::error::NetworkError;

/// Index of a node in the network registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// Output produced by a running command since the last poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandChunk {
    pub output: String,
    /// The command finished and `output` holds its last bytes.
    pub done: bool,
}

/// What a switch needs to know about the controller it attaches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerRef {
    pub name: String,
    pub address: Ipv4Addr,
}

/// Process-level operations on a single node.
pub trait Node {
    /// Process whose namespace interfaces are moved into.
    fn pid(&self) -> Option<u32>;

    fn in_namespace(&self) -> bool;

    /// Launches the node's daemons. `intfs` are the data-plane interfaces.
    fn start(&mut self, intfs: &[String], controller: Option<&ControllerRef>) -> anyhow::Result<()>;

    /// Stops the daemons and the node's process.
    fn stop(&mut self) -> anyhow::Result<()>;

    /// Kills the node's process.
    fn terminate(&mut self) -> anyhow::Result<()>;

    fn assign_address(&mut self, intf: &str, net: Ipv4Network) -> anyhow::Result<()>;

    fn add_host_route(&mut self, dest: Ipv4Addr, intf: &str) -> anyhow::Result<()>;

    fn set_default_route(&mut self, intf: &str) -> anyhow::Result<()>;

    fn is_interface_up(&mut self, intf: &str) -> anyhow::Result<bool>;

    /// Runs `cmd` to completion and returns its combined output.
    fn run_sync(&mut self, cmd: &str) -> anyhow::Result<String>;

    /// Starts `cmd` without waiting; collect its output with [`Node::poll`].
    fn run_async(&mut self, cmd: &str) -> anyhow::Result<()>;

    /// Waits up to `timeout` for output of the command started by
    /// [`Node::run_async`].
    fn poll(&mut self, timeout: Duration) -> anyhow::Result<CommandChunk>;

    /// Interrupts the running command.
    fn interrupt(&mut self) -> anyhow::Result<()>;
}

/// Creates the process side of nodes.
pub trait NodeFactory {
    fn controller(&mut self, name: &str, in_namespace: bool) -> anyhow::Result<Box<dyn Node>>;

    /// Hosts always get their own namespace.
    fn host(&mut self, name: &str) -> anyhow::Result<Box<dyn Node>>;

    /// `datapath` is set for kernel datapath switches.
    fn switch(
        &mut self,
        name: &str,
        datapath: Option<u32>,
        in_namespace: bool,
    ) -> anyhow::Result<Box<dyn Node>>;
}

pub struct NodeHandle {
    name: String,
    kind: NodeKind,
    dpid: Option<Dpid>,
    datapath: Option<u32>,
    pub(crate) intfs: Vec<String>,
    pub(crate) connections: HashMap<String, (NodeId, String)>,
    addresses: Vec<(String, Ipv4Network)>,
    backend: Box<dyn Node>,
}

impl NodeHandle {
    pub(crate) fn new(name: String, kind: NodeKind, dpid: Option<Dpid>, backend: Box<dyn Node>) -> Self {
        Self {
            name,
            kind,
            dpid,
            datapath: None,
            intfs: Vec::new(),
            connections: HashMap::new(),
            addresses: Vec::new(),
            backend,
        }
    }

    pub(crate) fn with_datapath(mut self, datapath: Option<u32>) -> Self {
        self.datapath = datapath;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Topology identifier; `None` for the controller.
    pub fn dpid(&self) -> Option<Dpid> {
        self.dpid
    }

    /// Kernel datapath index, for switches in kernel mode.
    pub fn datapath(&self) -> Option<u32> {
        self.datapath
    }

    /// Interfaces in the order they were created.
    pub fn intfs(&self) -> &[String] {
        &self.intfs
    }

    /// Peer node and interface at the far end of `intf`.
    pub fn connection(&self, intf: &str) -> Option<(NodeId, &str)> {
        self.connections
            .get(intf)
            .map(|(peer, peer_intf)| (*peer, peer_intf.as_str()))
    }

    /// First address assigned to the node.
    pub fn address(&self) -> Option<Ipv4Addr> {
        self.addresses.first().map(|(_, net)| net.ip())
    }

    pub fn addresses(&self) -> &[(String, Ipv4Network)] {
        &self.addresses
    }

    pub fn pid(&self) -> Option<u32> {
        self.backend.pid()
    }

    pub fn in_namespace(&self) -> bool {
        self.backend.in_namespace()
    }

    pub fn start(&mut self, intfs: &[String], controller: Option<&ControllerRef>) -> Result<(), NetworkError> {
        let result = self.backend.start(intfs, controller);
        self.wrap(result)
    }

    pub fn stop(&mut self) -> Result<(), NetworkError> {
        let result = self.backend.stop();
        self.wrap(result)
    }

    pub fn terminate(&mut self) -> Result<(), NetworkError> {
        let result = self.backend.terminate();
        self.wrap(result)
    }

    pub fn assign_address(&mut self, intf: &str, net: Ipv4Network) -> Result<(), NetworkError> {
        let result = self.backend.assign_address(intf, net);
        self.wrap(result)?;
        self.addresses.push((intf.to_string(), net));
        Ok(())
    }

    pub fn add_host_route(&mut self, dest: Ipv4Addr, intf: &str) -> Result<(), NetworkError> {
        let result = self.backend.add_host_route(dest, intf);
        self.wrap(result)
    }

    pub fn set_default_route(&mut self, intf: &str) -> Result<(), NetworkError> {
        let result = self.backend.set_default_route(intf);
        self.wrap(result)
    }

    pub fn is_interface_up(&mut self, intf: &str) -> Result<bool, NetworkError> {
        let result = self.backend.is_interface_up(intf);
        self.wrap(result)
    }

    pub fn run_sync(&mut self, cmd: &str) -> Result<String, NetworkError> {
        let result = self.backend.run_sync(cmd);
        self.wrap(result)
    }

    pub fn run_async(&mut self, cmd: &str) -> Result<(), NetworkError> {
        let result = self.backend.run_async(cmd);
        self.wrap(result)
    }

    pub fn poll(&mut self, timeout: Duration) -> Result<CommandChunk, NetworkError> {
        let result = self.backend.poll(timeout);
        self.wrap(result)
    }

    pub fn interrupt(&mut self) -> Result<(), NetworkError> {
        let result = self.backend.interrupt();
        self.wrap(result)
    }

    fn wrap<T>(&self, result: anyhow::Result<T>) -> Result<T, NetworkError> {
        result.map_err(|source| NetworkError::Node {
            node: self.name.clone(),
            source,
        })
    }
}
