// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

use vnet_common::models::node::{CONTROLLER_NAME, NodeKind, intf_name};
use vnet_common::models::topology::Dpid;
use vnet_common::utils::ip::is_valid_intf_name;
use vnet_common::{debug, info, step};

use super::Network;
use crate::error::NetworkError;
use crate::node::{NodeHandle, NodeId};

impl Network {
    pub(super) fn materialize(&mut self) -> Result<(), NetworkError> {
        step!("Adding controller");
        self.add_controller()?;

        step!("Adding hosts");
        let mut hosts = self.topo.hosts();
        hosts.sort_unstable();
        let names = hosts
            .into_iter()
            .map(|dpid| self.add_host(dpid))
            .collect::<Result<Vec<_>, _>>()?;
        info!("{}", names.join(" "));

        step!("Adding switches");
        let mut switches = self.topo.switches();
        switches.sort_unstable();
        let names = switches
            .into_iter()
            .map(|dpid| self.add_switch(dpid))
            .collect::<Result<Vec<_>, _>>()?;
        info!("{}", names.join(" "));

        step!("Adding links");
        let mut edges = self.topo.edges();
        edges.sort_unstable();
        let names = edges
            .into_iter()
            .map(|(src, dst)| self.add_link(src, dst))
            .collect::<Result<Vec<_>, _>>()?;
        info!("{}", names.join(" "));

        Ok(())
    }

    fn add_controller(&mut self) -> Result<String, NetworkError> {
        let name = CONTROLLER_NAME.to_string();
        let backend = self
            .factory
            .controller(&name, self.config.in_namespace)
            .map_err(|source| NetworkError::Node {
                node: name.clone(),
                source,
            })?;
        let id = self.register(NodeHandle::new(name.clone(), NodeKind::Controller, None, backend));
        self.controller = Some(id);
        Ok(name)
    }

    fn add_host(&mut self, dpid: Dpid) -> Result<String, NetworkError> {
        let name = self.node_name(NodeKind::Host, dpid)?;
        let backend = self.factory.host(&name).map_err(|source| NetworkError::Node {
            node: name.clone(),
            source,
        })?;
        self.register(NodeHandle::new(name.clone(), NodeKind::Host, Some(dpid), backend));
        Ok(name)
    }

    fn add_switch(&mut self, dpid: Dpid) -> Result<String, NetworkError> {
        let name = self.node_name(NodeKind::Switch, dpid)?;
        let datapath = self.config.is_kernel().then(|| {
            let index = self.next_datapath;
            self.next_datapath += 1;
            index
        });

        let backend = self
            .factory
            .switch(&name, datapath, self.config.in_namespace)
            .map_err(|source| NetworkError::Node {
                node: name.clone(),
                source,
            })?;
        let handle = NodeHandle::new(name.clone(), NodeKind::Switch, Some(dpid), backend).with_datapath(datapath);
        let id = self.register(handle);

        // The controller link must be the switch's first interface.
        if !self.config.is_kernel() {
            let controller = self.require_controller()?;
            let port = self.control_links;
            self.control_links += 1;
            self.connect(controller, port, id, 0)?;
        }
        Ok(name)
    }

    fn add_link(&mut self, src: Dpid, dst: Dpid) -> Result<String, NetworkError> {
        let (src_port, dst_port) = self.topo.ports(src, dst).ok_or(NetworkError::UnknownPort { src, dst })?;
        let a = self.require(src)?;
        let b = self.require(dst)?;
        self.connect(a, src_port, b, dst_port)?;
        Ok(format!("({}, {})", self.node(a).name(), self.node(b).name()))
    }

    fn node_name(&self, kind: NodeKind, dpid: Dpid) -> Result<String, NetworkError> {
        if self.by_dpid.contains_key(&dpid) {
            return Err(NetworkError::DuplicateNode(dpid));
        }
        let topo_name = self.topo.name(dpid).ok_or(NetworkError::UnknownNode(dpid))?;
        Ok(kind.node_name(&topo_name))
    }

    fn register(&mut self, handle: NodeHandle) -> NodeId {
        let id = NodeId(self.nodes.len());
        if let Some(dpid) = handle.dpid() {
            self.by_dpid.insert(dpid, id);
        }
        self.nodes.push(handle);
        id
    }

    /// Creates the veth pair `a-eth<a_port> <-> b-eth<b_port>`, moves each end
    /// into its node and records the connection on both sides.
    fn connect(&mut self, a: NodeId, a_port: u16, b: NodeId, b_port: u16) -> Result<(), NetworkError> {
        let intf_a = intf_name(self.node(a).name(), a_port);
        let intf_b = intf_name(self.node(b).name(), b_port);
        for intf in [&intf_a, &intf_b] {
            if !is_valid_intf_name(intf) {
                return Err(NetworkError::InvalidInterfaceName(intf.clone()));
            }
        }

        self.system
            .create_link_pair(&intf_a, &intf_b)
            .map_err(|source| NetworkError::LinkCreation {
                intf_a: intf_a.clone(),
                intf_b: intf_b.clone(),
                source,
            })?;
        self.nodes[a.0].intfs.push(intf_a.clone());
        self.nodes[b.0].intfs.push(intf_b.clone());

        self.migrate(a, &intf_a)?;
        self.migrate(b, &intf_b)?;

        self.nodes[a.0]
            .connections
            .insert(intf_a.clone(), (b, intf_b.clone()));
        self.nodes[b.0].connections.insert(intf_b, (a, intf_a));
        Ok(())
    }

    fn migrate(&self, id: NodeId, intf: &str) -> Result<(), NetworkError> {
        let node = self.node(id);
        if !node.in_namespace() {
            return Ok(());
        }
        let pid = node.pid().ok_or_else(|| NetworkError::NoProcess(node.name().to_string()))?;

        let policy = self.config.migrate;
        policy
            .run(|attempt| {
                debug!("Moving {intf} into {} (attempt {attempt})", node.name());
                self.system.move_interface(intf, pid)
            })
            .map_err(|source| NetworkError::MigrationFailed {
                intf: intf.to_string(),
                node: node.name().to_string(),
                attempts: policy.attempts.max(1),
                source,
            })
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkState;
    use crate::testing::{FakeSystem, Harness};
    use proptest::prelude::*;
    use vnet_common::config::DatapathMode;
    use std::collections::HashSet;
    use vnet_common::models::topology::{StaticTopo, Topology, TreeTopo};

    fn names_of(net: &Network, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|&id| net.node(id).name().to_string()).collect()
    }

    #[test]
    fn kernel_datapaths_follow_switch_order() {
        let mut harness = Harness::tree(DatapathMode::Kernel);
        harness.net.build().unwrap();
        let net = &harness.net;

        let datapaths: Vec<_> = net
            .switches()
            .into_iter()
            .map(|id| net.node(id).datapath())
            .collect();
        assert_eq!(datapaths, [Some(0), Some(1), Some(2)]);
        assert_eq!(names_of(net, &net.switches()), ["s1", "s2", "s5"]);
    }

    #[test]
    fn user_switches_have_no_datapath_index() {
        let mut harness = Harness::tree(DatapathMode::User);
        harness.net.build().unwrap();
        let net = &harness.net;
        assert!(net.switches().into_iter().all(|id| net.node(id).datapath().is_none()));
    }

    #[test]
    fn user_mode_wires_the_controller_first() {
        let mut harness = Harness::tree(DatapathMode::User);
        harness.net.build().unwrap();
        let net = &harness.net;
        let controller = net.controller().unwrap();

        for (k, id) in net.switches().into_iter().enumerate() {
            let switch = net.node(id);
            let first = &switch.intfs()[0];
            assert_eq!(first, &format!("{}-eth0", switch.name()));

            let (peer, peer_intf) = switch.connection(first).unwrap();
            assert_eq!(peer, controller);
            assert_eq!(peer_intf, format!("c0-eth{k}"));
        }
        assert_eq!(net.node(controller).intfs(), ["c0-eth0", "c0-eth1", "c0-eth2"]);
    }

    #[test]
    fn kernel_mode_has_no_control_links() {
        let mut harness = Harness::tree(DatapathMode::Kernel);
        harness.net.build().unwrap();
        let controller = harness.net.controller().unwrap();
        assert!(harness.net.node(controller).intfs().is_empty());
    }

    #[test]
    fn only_isolated_nodes_receive_interfaces() {
        let mut harness = Harness::tree(DatapathMode::Kernel);
        harness.net.build().unwrap();

        assert!(harness.journal.contains("move h3-eth0"));
        assert!(!harness.journal.contains("move s2-eth1"));
        assert!(!harness.journal.contains("move s1-eth1"));
    }

    #[test]
    fn links_are_created_in_sorted_endpoint_order() {
        let mut harness = Harness::tree(DatapathMode::Kernel);
        harness.net.build().unwrap();

        assert_eq!(
            harness.journal.matching("link "),
            [
                "link s1-eth1 s2-eth3",
                "link s1-eth2 s5-eth3",
                "link s2-eth1 h3-eth0",
                "link s2-eth2 h4-eth0",
                "link s5-eth1 h6-eth0",
                "link s5-eth2 h7-eth0",
            ]
        );
    }

    #[test]
    fn nodes_are_created_controller_hosts_switches() {
        let mut harness = Harness::tree(DatapathMode::Kernel);
        harness.net.build().unwrap();
        assert_eq!(
            harness.journal.matching("create "),
            [
                "create c0", "create h3", "create h4", "create h6", "create h7", "create s1",
                "create s2", "create s5",
            ]
        );
    }

    #[test]
    fn migration_survives_transient_failures() {
        let system = FakeSystem::new().failing_moves(2);
        let mut harness = Harness::with(TreeTopo::default().into(), DatapathMode::Kernel, system);
        harness.net.build().unwrap();
        assert_eq!(harness.journal.matching("move-failed").len(), 2);
    }

    #[test]
    fn exhausted_migration_aborts_the_build() {
        let system = FakeSystem::new().failing_moves(u32::MAX);
        let mut harness = Harness::with(TreeTopo::default().into(), DatapathMode::Kernel, system);

        let err = harness.net.build().unwrap_err();
        assert!(matches!(
            err,
            NetworkError::MigrationFailed { ref intf, attempts: 3, .. } if intf == "h3-eth0"
        ));
        assert_eq!(harness.net.state(), NetworkState::Unbuilt);
        assert_eq!(harness.journal.matching("move-failed").len(), 3);
        // Nothing after the failing link.
        assert_eq!(harness.journal.matching("link ").len(), 3);
        assert!(harness.journal.matching("addr ").is_empty());
    }

    #[test]
    fn long_names_are_rejected_before_touching_the_system() {
        let mut topo = StaticTopo::new();
        topo.add_host_with(Dpid(1), Some("averyverylonghostname".into()), None)
            .unwrap();
        topo.add_switch(Dpid(2)).unwrap();
        topo.add_link(Dpid(1), Dpid(2)).unwrap();
        let mut harness = Harness::with(topo, DatapathMode::Kernel, FakeSystem::new());

        assert!(matches!(
            harness.net.build(),
            Err(NetworkError::InvalidInterfaceName(_))
        ));
        assert!(harness.journal.matching("link ").is_empty());
    }

    #[test]
    fn lone_host_without_links_has_no_interface() {
        let mut harness = Harness::with(TreeTopo::new(0, 2).into(), DatapathMode::Kernel, FakeSystem::new());
        assert!(matches!(
            harness.net.build(),
            Err(NetworkError::NoInterface(ref host)) if host == "h1"
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn connections_are_symmetric(depth in 1u32..3, fanout in 1u32..4, user in any::<bool>()) {
            let mode = if user { DatapathMode::User } else { DatapathMode::Kernel };
            let mut harness = Harness::with(TreeTopo::new(depth, fanout).into(), mode, FakeSystem::new());
            harness.net.build().unwrap();
            let net = &harness.net;

            for (id, node) in net.nodes() {
                for intf in node.intfs() {
                    let (peer, peer_intf) = node.connection(intf).unwrap();
                    let (back, back_intf) = net.node(peer).connection(peer_intf).unwrap();
                    prop_assert_eq!(back, id);
                    prop_assert_eq!(back_intf, intf.as_str());
                }
            }
        }

        #[test]
        fn every_link_yields_two_unique_interfaces(depth in 1u32..4, fanout in 1u32..4, user in any::<bool>()) {
            let topo: StaticTopo = TreeTopo::new(depth, fanout).into();
            let edges = topo.edges().len();
            let switches = topo.switches().len();
            let mode = if user { DatapathMode::User } else { DatapathMode::Kernel };
            let mut harness = Harness::with(topo, mode, FakeSystem::new());
            harness.net.build().unwrap();

            let names: Vec<&String> = harness.net.nodes().flat_map(|(_, node)| node.intfs()).collect();
            let unique: HashSet<&String> = names.iter().copied().collect();
            let control_links = if user { switches } else { 0 };

            prop_assert_eq!(names.len(), 2 * (edges + control_links));
            prop_assert_eq!(unique.len(), names.len());
        }
    }
}
