// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

//! # Network Orchestration
//!
//! A [`Network`] turns an abstract [`Topology`] into live nodes and links and
//! drives them through their lifecycle:
//!
//! ```text
//! Unbuilt --build--> Built --start--> Running --stop--> Stopped
//! ```
//!
//! ## Build Phases
//! 1. **Materialize**: controller, hosts (sorted by id), switches (sorted by
//!    id), then links (sorted by endpoint pair). Each link is a veth pair whose
//!    ends are moved into the namespaces of the nodes that need one.
//! 2. **Control network** (user datapath only): address the links between
//!    the controller and every switch and verify them with pings.
//! 3. **Hosts**: one address and a default route per host.
//!
//! Any failure aborts the build. Nodes created so far are torn down when the
//! network is dropped.

mod build;
mod control;
mod hosts;
mod lifecycle;

use std::collections::BTreeMap;

use vnet_common::config::NetworkConfig;
use vnet_common::models::node::NodeKind;
use vnet_common::models::topology::{Dpid, Topology};
use vnet_common::system::System;
use vnet_common::{debug, step, warn};

use crate::error::NetworkError;
use crate::node::{NodeFactory, NodeHandle, NodeId};

pub use lifecycle::TestParams;

const NAMESPACE_TOOL: &str = "unshare";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Unbuilt,
    Built,
    Running,
    Stopped,
}

impl NetworkState {
    fn as_str(&self) -> &'static str {
        match self {
            NetworkState::Unbuilt => "not built",
            NetworkState::Built => "built",
            NetworkState::Running => "running",
            NetworkState::Stopped => "stopped",
        }
    }
}

/// Checks the environment once before any network is built: privileges and
/// the namespace tool are mandatory, raised limits are best effort.
pub fn init(system: &dyn System) -> Result<(), NetworkError> {
    if !system.is_privileged() {
        return Err(NetworkError::NotPrivileged);
    }
    match system.locate_namespace_tool() {
        Some(path) => debug!("Namespace tool found at {}", path.display()),
        None => return Err(NetworkError::NamespaceToolMissing(NAMESPACE_TOOL)),
    }
    if let Err(e) = system.fix_limits() {
        warn!("Could not raise resource limits: {e}");
    }
    Ok(())
}

pub struct Network {
    topo: Box<dyn Topology>,
    factory: Box<dyn NodeFactory>,
    system: Box<dyn System>,
    config: NetworkConfig,
    nodes: Vec<NodeHandle>,
    by_dpid: BTreeMap<Dpid, NodeId>,
    controller: Option<NodeId>,
    next_datapath: u32,
    control_links: u16,
    state: NetworkState,
}

impl Network {
    pub fn new(
        topo: Box<dyn Topology>,
        factory: Box<dyn NodeFactory>,
        system: Box<dyn System>,
        config: NetworkConfig,
    ) -> Self {
        Self {
            topo,
            factory,
            system,
            config,
            nodes: Vec::new(),
            by_dpid: BTreeMap::new(),
            controller: None,
            next_datapath: 0,
            control_links: 0,
            state: NetworkState::Unbuilt,
        }
    }

    /// Creates every node and link and configures addressing.
    pub fn build(&mut self) -> Result<(), NetworkError> {
        self.expect_state("build", NetworkState::Unbuilt)?;

        self.materialize()?;
        if !self.config.is_kernel() {
            step!("Configuring control network");
            self.configure_control_network()?;
        }
        step!("Configuring hosts");
        self.configure_hosts()?;

        self.state = NetworkState::Built;
        Ok(())
    }

    pub fn state(&self) -> NetworkState {
        self.state
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn node(&self, id: NodeId) -> &NodeHandle {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut NodeHandle {
        &mut self.nodes[id.0]
    }

    pub fn node_id(&self, dpid: Dpid) -> Option<NodeId> {
        self.by_dpid.get(&dpid).copied()
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name() == name).map(NodeId)
    }

    pub fn controller(&self) -> Option<NodeId> {
        self.controller
    }

    /// Hosts in topology order.
    pub fn hosts(&self) -> Vec<NodeId> {
        self.ids_of(self.topo.hosts())
    }

    /// Switches in topology order.
    pub fn switches(&self) -> Vec<NodeId> {
        self.ids_of(self.topo.switches())
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeHandle)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Names of every live node, sorted.
    pub fn node_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.nodes.iter().map(NodeHandle::name).collect();
        names.sort_unstable();
        names
    }

    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|n| n.kind() == kind).count()
    }

    fn ids_of(&self, dpids: Vec<Dpid>) -> Vec<NodeId> {
        dpids.into_iter().filter_map(|d| self.node_id(d)).collect()
    }

    fn require(&self, dpid: Dpid) -> Result<NodeId, NetworkError> {
        self.node_id(dpid).ok_or(NetworkError::UnknownNode(dpid))
    }

    fn require_controller(&self) -> Result<NodeId, NetworkError> {
        self.controller.ok_or(NetworkError::NoController)
    }

    fn expect_state(&self, action: &'static str, expected: NetworkState) -> Result<(), NetworkError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(NetworkError::InvalidState {
                action,
                state: self.state.as_str(),
            })
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
