// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

#![cfg(test)]
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pnet::ipnetwork::Ipv4Network;
use vnet_common::config::NodeCommands;
use vnet_common::system::System;
use vnet_core::node::Node;
use vnet_core::ping::parse_ping;
use vnet_core::shell_node::{Role, ShellNode};
use vnet_core::system::LinuxSystem;

use crate::utils::{can_emulate, LinkGuard};

fn isolated(name: &str) -> ShellNode {
    ShellNode::spawn(name, Role::Host, true, Arc::new(NodeCommands::default()))
        .expect("failed to spawn isolated shell")
}

fn wait_up(node: &mut ShellNode, intf: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !node.is_interface_up(intf).unwrap() {
        assert!(Instant::now() < deadline, "{intf} never came up");
        thread::sleep(Duration::from_millis(50));
    }
}

#[test]
fn veth_end_moves_into_node_namespace() {
    if !can_emulate("veth_end_moves_into_node_namespace") {
        return;
    }
    let _guard = LinkGuard::new("vt1a-eth0");
    let system = LinuxSystem;
    let mut node = isolated("vt1b");

    system.create_link_pair("vt1a-eth0", "vt1b-eth0").unwrap();
    system.move_interface("vt1b-eth0", node.pid().unwrap()).unwrap();

    assert!(LinkGuard::exists_in_root("vt1a-eth0"));
    assert!(!LinkGuard::exists_in_root("vt1b-eth0"));

    let listing = node.run_sync("ip -o link show").unwrap();
    assert!(listing.contains("vt1b-eth0"), "namespace listing: {listing}");
    assert!(!listing.contains("vt1a-eth0"), "namespace listing: {listing}");
}

#[test]
fn stale_pair_is_replaced() {
    if !can_emulate("stale_pair_is_replaced") {
        return;
    }
    let _guard = LinkGuard::new("vt2a-eth0");
    let system = LinuxSystem;

    system.create_link_pair("vt2a-eth0", "vt2b-eth0").unwrap();
    system.create_link_pair("vt2a-eth0", "vt2b-eth0").unwrap();
    assert!(LinkGuard::exists_in_root("vt2b-eth0"));
}

#[test]
fn isolated_nodes_ping_over_a_veth_pair() {
    if !can_emulate("isolated_nodes_ping_over_a_veth_pair") {
        return;
    }
    let _guard = LinkGuard::new("vt3a-eth0");
    let system = LinuxSystem;
    let mut a = isolated("vt3a");
    let mut b = isolated("vt3b");

    system.create_link_pair("vt3a-eth0", "vt3b-eth0").unwrap();
    system.move_interface("vt3a-eth0", a.pid().unwrap()).unwrap();
    system.move_interface("vt3b-eth0", b.pid().unwrap()).unwrap();

    let net_a: Ipv4Network = "10.251.0.1/24".parse().unwrap();
    let net_b: Ipv4Network = "10.251.0.2/24".parse().unwrap();
    a.assign_address("vt3a-eth0", net_a).unwrap();
    b.assign_address("vt3b-eth0", net_b).unwrap();
    wait_up(&mut a, "vt3a-eth0");
    wait_up(&mut b, "vt3b-eth0");

    let output = a.run_sync("ping -c1 -W2 10.251.0.2").unwrap();
    let count = parse_ping(&output).unwrap();
    assert_eq!((count.sent, count.received), (1, 1), "ping output: {output}");
}

#[test]
fn namespace_dies_with_its_shell() {
    if !can_emulate("namespace_dies_with_its_shell") {
        return;
    }
    let _guard = LinkGuard::new("vt4a-eth0");
    let system = LinuxSystem;
    let mut node = isolated("vt4b");

    system.create_link_pair("vt4a-eth0", "vt4b-eth0").unwrap();
    system.move_interface("vt4b-eth0", node.pid().unwrap()).unwrap();
    node.terminate().unwrap();
    drop(node);

    // Namespace teardown runs asynchronously in the kernel.
    let deadline = Instant::now() + Duration::from_secs(5);
    while LinkGuard::exists_in_root("vt4a-eth0") {
        assert!(Instant::now() < deadline, "peer of a dead namespace survived");
        thread::sleep(Duration::from_millis(100));
    }
}

#[test]
fn host_shells_can_be_deprioritized() {
    if !can_emulate("host_shells_can_be_deprioritized") {
        return;
    }
    let mut node = isolated("vt5");
    LinuxSystem.lower_priority(node.pid().unwrap()).unwrap();

    let nice = node.run_sync("ps -o ni= -p $$").unwrap();
    assert_eq!(nice.trim(), "18");
}
