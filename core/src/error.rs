// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use thiserror::Error;
use vnet_common::config::ConfigError;
use vnet_common::models::topology::Dpid;

/// Everything that can abort building, running or measuring a network.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("root privileges are required to create namespaces and links")]
    NotPrivileged,

    #[error("namespace tool '{0}' was not found in PATH")]
    NamespaceToolMissing(&'static str),

    #[error("topology node {0} is not part of the network")]
    UnknownNode(Dpid),

    #[error("topology node {0} was added twice")]
    DuplicateNode(Dpid),

    #[error("no port numbers for link {src} <-> {dst}")]
    UnknownPort { src: Dpid, dst: Dpid },

    #[error("interface name '{0}' is not usable (at most 15 bytes, no spaces)")]
    InvalidInterfaceName(String),

    #[error("failed to create link {intf_a} <-> {intf_b}: {source}")]
    LinkCreation {
        intf_a: String,
        intf_b: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("could not move {intf} into {node} after {attempts} attempts: {source}")]
    MigrationFailed {
        intf: String,
        node: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("{0} has no running process to move interfaces into")]
    NoProcess(String),

    #[error("{0} has no interface")]
    NoInterface(String),

    #[error("{0} has no address to ping")]
    NoAddress(String),

    #[error("switch {0} is not connected to the controller on its first interface")]
    ControllerNotConnected(String),

    #[error("no controller in the network")]
    NoController,

    #[error("interface {intf} on {node} still down after {waited:?}")]
    InterfaceTimeout {
        node: String,
        intf: String,
        waited: Duration,
    },

    #[error("control network unreachable: {switch} <-> controller lost {loss}% of pings")]
    ControlNetworkUnreachable { switch: String, loss: u32 },

    #[error("could not parse ping output:\n{0}")]
    PingParse(String),

    #[error("{src} -> {dst}: received {received} replies for {sent} pings")]
    PingAnomaly {
        src: String,
        dst: String,
        sent: u64,
        received: u64,
    },

    #[error("cannot {action} a network that is {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    #[error("{node}: {source}")]
    Node {
        node: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
