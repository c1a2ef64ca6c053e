// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

use vnet_common::utils::timing::WaitOutcome;
use vnet_common::{info, step, success};

use super::Network;
use crate::error::NetworkError;
use crate::node::NodeId;

impl Network {
    /// Addresses the controller side and the switch side of every control
    /// link, then checks that each switch can reach the controller.
    pub(super) fn configure_control_network(&mut self) -> Result<(), NetworkError> {
        let controller = self.require_controller()?;
        let params = self.config.controller;
        let controller_net = params.network_for(params.ip)?;

        let mut control_links = Vec::new();
        for dpid in self.topo.switches() {
            let switch = self.require(dpid)?;
            let (switch_intf, controller_intf) = self.control_link(switch, controller)?;

            let switch_ip = self.topo.ip(dpid).ok_or(NetworkError::UnknownNode(dpid))?;
            let switch_net = params.network_for(switch_ip)?;

            self.nodes[controller.0].assign_address(&controller_intf, controller_net)?;
            self.nodes[switch.0].assign_address(&switch_intf, switch_net)?;
            self.nodes[controller.0].add_host_route(switch_ip, &controller_intf)?;
            self.nodes[switch.0].add_host_route(params.ip, &switch_intf)?;

            control_links.push((switch, switch_intf, controller_intf));
        }

        step!("Testing control network");
        for (switch, switch_intf, controller_intf) in control_links {
            self.wait_for_link(controller, &controller_intf)?;
            self.wait_for_link(switch, &switch_intf)?;

            let loss = self.ping_test(Some(&[switch, controller][..]), false)?;
            if let Some(loss) = loss
                && loss > 0
            {
                return Err(NetworkError::ControlNetworkUnreachable {
                    switch: self.node(switch).name().to_string(),
                    loss,
                });
            }
        }
        success!("Control network ready");
        Ok(())
    }

    /// The switch's first interface and the controller interface it leads to.
    fn control_link(&self, switch: NodeId, controller: NodeId) -> Result<(String, String), NetworkError> {
        let node = self.node(switch);
        let not_connected = || NetworkError::ControllerNotConnected(node.name().to_string());

        let intf = node.intfs().first().ok_or_else(not_connected)?;
        match node.connection(intf) {
            Some((peer, peer_intf)) if peer == controller => Ok((intf.clone(), peer_intf.to_string())),
            _ => Err(not_connected()),
        }
    }

    /// Polls `intf` until it reports up, within the configured wait policy.
    fn wait_for_link(&mut self, id: NodeId, intf: &str) -> Result<(), NetworkError> {
        let policy = self.config.link_wait;
        let node = &mut self.nodes[id.0];
        let name = node.name().to_string();

        let mut announced = false;
        let outcome = policy.wait_until(
            || node.is_interface_up(intf),
            || {
                if !announced {
                    info!("Waiting for {name}:{intf} to come up");
                    announced = true;
                }
            },
        )?;

        match outcome {
            WaitOutcome::Ready => Ok(()),
            WaitOutcome::TimedOut(waited) => Err(NetworkError::InterfaceTimeout {
                node: name,
                intf: intf.to_string(),
                waited,
            }),
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
