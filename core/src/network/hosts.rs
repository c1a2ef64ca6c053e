// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

use vnet_common::{debug, info};

use super::Network;
use crate::error::NetworkError;

impl Network {
    /// Gives every host its topology address on its first interface and a
    /// default route out of it.
    pub(super) fn configure_hosts(&mut self) -> Result<(), NetworkError> {
        let params = self.config.controller;

        for dpid in self.topo.hosts() {
            let id = self.require(dpid)?;
            let ip = self.topo.ip(dpid).ok_or(NetworkError::UnknownNode(dpid))?;
            let net = params.network_for(ip)?;

            let host = &mut self.nodes[id.0];
            let intf = host
                .intfs()
                .first()
                .cloned()
                .ok_or_else(|| NetworkError::NoInterface(host.name().to_string()))?;

            host.assign_address(&intf, net)?;
            host.set_default_route(&intf)?;
            info!("{}: {} on {}", host.name(), net, intf);

            if let Some(pid) = host.pid()
                && let Err(e) = self.system.lower_priority(pid)
            {
                debug!("Could not renice {}: {e}", host.name());
            }
        }
        Ok(())
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
