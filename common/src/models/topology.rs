// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

//! # Abstract Topology
//!
//! The graph a network is materialized from: hosts, switches and the links
//! between them, each node identified by a [`Dpid`].
//!
//! ## Key Concepts
//! * **Ports**: assigned when a link is added. Hosts are single-homed and use
//!   port `0`; switch ports count up from `1` (port `0` is kept free for the
//!   control link in user datapath mode).
//! * **Order**: [`Topology::hosts`] and [`Topology::switches`] return nodes in
//!   the order they were added. Callers that need a sorted walk sort the ids
//!   themselves.
//! * **Addresses**: default to `10.x.y.z`, built from the low bits of the id.

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::ip;

/// Identifier of a host or switch inside a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dpid(pub u64);

impl fmt::Display for Dpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// The view of a topology the orchestrator relies on.
pub trait Topology {
    fn hosts(&self) -> Vec<Dpid>;

    fn switches(&self) -> Vec<Dpid>;

    fn edges(&self) -> Vec<(Dpid, Dpid)>;

    /// Port numbers of `src` and `dst` on the link joining them.
    fn ports(&self, src: Dpid, dst: Dpid) -> Option<(u16, u16)>;

    /// Human-readable name, without the role prefix.
    fn name(&self, id: Dpid) -> Option<String>;

    fn ip(&self, id: Dpid) -> Option<Ipv4Addr>;
}

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("node {0} is defined twice")]
    DuplicateId(Dpid),

    #[error("link endpoint {0} is not a known node")]
    UnknownEndpoint(Dpid),

    #[error("host {0} already has a link (hosts are single-homed)")]
    HostAlreadyLinked(Dpid),

    #[error("link from {0} to itself")]
    SelfLoop(Dpid),

    #[error("failed to read topology file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid topology file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Host,
    Switch,
}

#[derive(Debug, Clone)]
struct TopoNode {
    role: Role,
    name: String,
    ip: Ipv4Addr,
    next_port: u16,
}

#[derive(Debug, Clone, Copy)]
struct TopoLink {
    src: Dpid,
    dst: Dpid,
    src_port: u16,
    dst_port: u16,
}

/// A topology described node by node and link by link.
#[derive(Debug, Clone, Default)]
pub struct StaticTopo {
    nodes: BTreeMap<Dpid, TopoNode>,
    hosts: Vec<Dpid>,
    switches: Vec<Dpid>,
    links: Vec<TopoLink>,
}

impl StaticTopo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_host(&mut self, id: Dpid) -> Result<Dpid, TopologyError> {
        self.add_node(id, Role::Host, None, None)
    }

    pub fn add_switch(&mut self, id: Dpid) -> Result<Dpid, TopologyError> {
        self.add_node(id, Role::Switch, None, None)
    }

    /// Adds a host with an explicit name and/or address.
    pub fn add_host_with(
        &mut self,
        id: Dpid,
        name: Option<String>,
        ip: Option<Ipv4Addr>,
    ) -> Result<Dpid, TopologyError> {
        self.add_node(id, Role::Host, name, ip)
    }

    pub fn add_switch_with(
        &mut self,
        id: Dpid,
        name: Option<String>,
        ip: Option<Ipv4Addr>,
    ) -> Result<Dpid, TopologyError> {
        self.add_node(id, Role::Switch, name, ip)
    }

    fn add_node(
        &mut self,
        id: Dpid,
        role: Role,
        name: Option<String>,
        ip: Option<Ipv4Addr>,
    ) -> Result<Dpid, TopologyError> {
        if self.nodes.contains_key(&id) {
            return Err(TopologyError::DuplicateId(id));
        }
        let node = TopoNode {
            role,
            name: name.unwrap_or_else(|| id.0.to_string()),
            ip: ip.unwrap_or_else(|| ip::ipv4_from_id(id.0)),
            next_port: match role {
                Role::Host => 0,
                Role::Switch => 1,
            },
        };
        self.nodes.insert(id, node);
        match role {
            Role::Host => self.hosts.push(id),
            Role::Switch => self.switches.push(id),
        }
        Ok(id)
    }

    /// Links two nodes and returns the ports allocated on each side.
    pub fn add_link(&mut self, src: Dpid, dst: Dpid) -> Result<(u16, u16), TopologyError> {
        if src == dst {
            return Err(TopologyError::SelfLoop(src));
        }
        for id in [src, dst] {
            let node = self.nodes.get(&id).ok_or(TopologyError::UnknownEndpoint(id))?;
            if node.role == Role::Host && self.links.iter().any(|l| l.src == id || l.dst == id) {
                return Err(TopologyError::HostAlreadyLinked(id));
            }
        }

        let src_port = self.take_port(src);
        let dst_port = self.take_port(dst);
        self.links.push(TopoLink {
            src,
            dst,
            src_port,
            dst_port,
        });
        Ok((src_port, dst_port))
    }

    fn take_port(&mut self, id: Dpid) -> u16 {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                let port = node.next_port;
                node.next_port += 1;
                port
            }
            None => 0,
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self, TopologyError> {
        let file: TopoFile = toml::from_str(raw)?;
        let mut topo = Self::new();
        for entry in file.hosts {
            topo.add_host_with(entry.id, entry.name, entry.ip)?;
        }
        for entry in file.switches {
            topo.add_switch_with(entry.id, entry.name, entry.ip)?;
        }
        for link in file.links {
            topo.add_link(link.src, link.dst)?;
        }
        Ok(topo)
    }

    pub fn load(path: &Path) -> Result<Self, TopologyError> {
        let raw = std::fs::read_to_string(path).map_err(|source| TopologyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }
}

impl Topology for StaticTopo {
    fn hosts(&self) -> Vec<Dpid> {
        self.hosts.clone()
    }

    fn switches(&self) -> Vec<Dpid> {
        self.switches.clone()
    }

    fn edges(&self) -> Vec<(Dpid, Dpid)> {
        self.links.iter().map(|l| (l.src, l.dst)).collect()
    }

    fn ports(&self, src: Dpid, dst: Dpid) -> Option<(u16, u16)> {
        self.links.iter().find_map(|l| {
            if l.src == src && l.dst == dst {
                Some((l.src_port, l.dst_port))
            } else if l.src == dst && l.dst == src {
                Some((l.dst_port, l.src_port))
            } else {
                None
            }
        })
    }

    fn name(&self, id: Dpid) -> Option<String> {
        self.nodes.get(&id).map(|n| n.name.clone())
    }

    fn ip(&self, id: Dpid) -> Option<Ipv4Addr> {
        self.nodes.get(&id).map(|n| n.ip)
    }
}

#[derive(Deserialize)]
struct TopoFile {
    #[serde(default)]
    hosts: Vec<NodeEntry>,
    #[serde(default)]
    switches: Vec<NodeEntry>,
    #[serde(default)]
    links: Vec<LinkEntry>,
}

#[derive(Deserialize)]
struct NodeEntry {
    id: Dpid,
    name: Option<String>,
    ip: Option<Ipv4Addr>,
}

#[derive(Deserialize)]
struct LinkEntry {
    src: Dpid,
    dst: Dpid,
}

/// A complete tree of switches with hosts at the leaves.
///
/// Ids are handed out depth-first starting at `1` for the root switch, so the
/// default tree (depth 2, fanout 2) is `s1 -> {s2 -> {h3, h4}, s5 -> {h6, h7}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeTopo {
    pub depth: u32,
    pub fanout: u32,
}

impl TreeTopo {
    pub fn new(depth: u32, fanout: u32) -> Self {
        Self { depth, fanout }
    }

    fn grow(&self, topo: &mut StaticTopo, next_id: &mut u64, depth: u32) -> Dpid {
        let id = Dpid(*next_id);
        *next_id += 1;

        // Ids are fresh and every child is new, so inserts cannot collide.
        if depth == 0 {
            let _ = topo.add_host(id);
            return id;
        }

        let _ = topo.add_switch(id);
        for _ in 0..self.fanout {
            let child = self.grow(topo, next_id, depth - 1);
            let _ = topo.add_link(id, child);
        }
        id
    }
}

impl Default for TreeTopo {
    fn default() -> Self {
        Self::new(2, 2)
    }
}

impl From<TreeTopo> for StaticTopo {
    fn from(tree: TreeTopo) -> Self {
        let mut topo = StaticTopo::new();
        let mut next_id = 1;
        tree.grow(&mut topo, &mut next_id, tree.depth);
        topo
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
