// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

//! # Node Naming
//!
//! Live nodes are named after their role and the topology's human-readable
//! name: host `3` becomes `h3`, switch `1` becomes `s1`. The single controller
//! is always `c0`. Interfaces are `<node>-eth<port>`.

use std::fmt;

pub const CONTROLLER_NAME: &str = "c0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Host,
    Switch,
    Controller,
}

impl NodeKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            NodeKind::Host => "h",
            NodeKind::Switch => "s",
            NodeKind::Controller => "c",
        }
    }

    pub fn node_name(&self, topo_name: &str) -> String {
        format!("{}{}", self.prefix(), topo_name)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Host => write!(f, "host"),
            NodeKind::Switch => write!(f, "switch"),
            NodeKind::Controller => write!(f, "controller"),
        }
    }
}

pub fn intf_name(node_name: &str, port: u16) -> String {
    format!("{node_name}-eth{port}")
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
