// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

#![cfg(test)]
use std::net::Ipv4Addr;

use vnet_common::config::{DatapathMode, NetworkConfig, NodeCommands};
use vnet_common::models::topology::{Dpid, StaticTopo};
use vnet_common::utils::input::NoInterrupts;
use vnet_core::network::{self, Network, NetworkState, TestParams};
use vnet_core::shell::interact;
use vnet_core::shell_node::LinuxNodeFactory;
use vnet_core::system::LinuxSystem;

use crate::utils::{can_emulate, LinkGuard};

/// Two hosts on a direct link. No switch programs are needed, and the
/// controller is a long sleep standing in for a real one.
fn pair_network(mode: DatapathMode) -> Network {
    let mut topo = StaticTopo::new();
    topo.add_host_with(Dpid(201), None, Some(Ipv4Addr::new(10, 252, 0, 201)))
        .unwrap();
    topo.add_host_with(Dpid(202), None, Some(Ipv4Addr::new(10, 252, 0, 202)))
        .unwrap();
    topo.add_link(Dpid(201), Dpid(202)).unwrap();

    let commands = NodeCommands {
        controller: "sleep 600".to_string(),
        ..NodeCommands::default()
    };

    Network::new(
        Box::new(topo),
        Box::new(LinuxNodeFactory::new(commands)),
        Box::new(LinuxSystem),
        NetworkConfig::for_datapath(mode),
    )
}

fn full_mesh_ping(mode: DatapathMode) {
    let _guard = LinkGuard::new("h201-eth0");
    network::init(&LinuxSystem).unwrap();

    let mut net = pair_network(mode);
    net.build().unwrap();
    assert_eq!(net.state(), NetworkState::Built);

    let loss = net
        .cycle(|net, _| net.ping_test(None, true), &TestParams::new())
        .unwrap()
        .unwrap();

    assert_eq!(loss, Some(0));
    assert_eq!(net.state(), NetworkState::Stopped);
}

#[test]
fn kernel_mode_hosts_reach_each_other() {
    if !can_emulate("kernel_mode_hosts_reach_each_other") {
        return;
    }
    full_mesh_ping(DatapathMode::Kernel);
}

#[test]
fn user_mode_hosts_reach_each_other() {
    if !can_emulate("user_mode_hosts_reach_each_other") {
        return;
    }
    full_mesh_ping(DatapathMode::User);
}

#[test]
fn shell_substitutes_node_names_on_a_live_network() {
    if !can_emulate("shell_substitutes_node_names_on_a_live_network") {
        return;
    }
    let _guard = LinkGuard::new("h201-eth0");
    let mut net = pair_network(DatapathMode::Kernel);
    net.build().unwrap();

    let mut out = Vec::new();
    interact(
        &mut net,
        &b"h201 ping -c1 -W2 h202\nexit\n"[..],
        &mut out,
        Box::new(NoInterrupts),
    )
    .unwrap();

    let out = String::from_utf8_lossy(&out);
    assert!(out.contains("10.252.0.202"), "shell output: {out}");
    assert!(out.contains("1 received"), "shell output: {out}");
}
