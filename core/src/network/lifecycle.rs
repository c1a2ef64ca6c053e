// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use vnet_common::{error, step, success};

use super::{Network, NetworkState};
use crate::error::NetworkError;
use crate::node::{ControllerRef, NodeId};

/// Free-form parameters handed to a test callback.
pub type TestParams = BTreeMap<String, String>;

impl Network {
    /// Starts the controller, then every switch in topology order.
    pub fn start(&mut self) -> Result<(), NetworkError> {
        self.expect_state("start", NetworkState::Built)?;

        step!("Starting controller");
        let controller = self.require_controller()?;
        self.nodes[controller.0].start(&[], None)?;

        let controller_ref = ControllerRef {
            name: self.node(controller).name().to_string(),
            address: if self.config.is_kernel() {
                Ipv4Addr::LOCALHOST
            } else {
                self.config.controller.ip
            },
        };

        let switches = self.switches();
        step!("Starting {} switches", switches.len());
        for id in switches {
            let intfs = self.data_intfs(id, controller);
            self.nodes[id.0].start(&intfs, Some(&controller_ref))?;
        }

        self.state = NetworkState::Running;
        success!("Network is running");
        Ok(())
    }

    /// Terminates hosts, then stops switches and the controller.
    ///
    /// Every node is asked to stop even when an earlier one fails; the first
    /// failure is returned.
    pub fn stop(&mut self) -> Result<(), NetworkError> {
        self.expect_state("stop", NetworkState::Running)?;
        let mut first_error = None;
        let mut record = |result: Result<(), NetworkError>| {
            if let Err(e) = result {
                error!("{e}");
                first_error.get_or_insert(e);
            }
        };

        let hosts = self.hosts();
        step!("Stopping {} hosts", hosts.len());
        for id in hosts {
            record(self.nodes[id.0].terminate());
        }

        let switches = self.switches();
        step!("Stopping {} switches", switches.len());
        for id in switches {
            record(self.nodes[id.0].stop());
        }

        step!("Stopping controller");
        if let Some(controller) = self.controller {
            record(self.nodes[controller.0].stop());
        }

        self.state = NetworkState::Stopped;
        match first_error {
            Some(e) => Err(e),
            None => {
                success!("Network stopped");
                Ok(())
            }
        }
    }

    /// Runs `test` against the running network.
    pub fn run<R, F>(&mut self, test: F, params: &TestParams) -> Result<R, NetworkError>
    where
        F: FnOnce(&mut Network, &TestParams) -> R,
    {
        self.expect_state("run a test on", NetworkState::Running)?;
        Ok(test(self, params))
    }

    /// Start, run `test`, stop. The network is stopped even if the test
    /// reports a failure through its return value.
    pub fn cycle<R, F>(&mut self, test: F, params: &TestParams) -> Result<R, NetworkError>
    where
        F: FnOnce(&mut Network, &TestParams) -> R,
    {
        self.start()?;
        let result = self.run(test, params)?;
        self.stop()?;
        Ok(result)
    }

    /// Interfaces of `switch` that carry data traffic.
    fn data_intfs(&self, switch: NodeId, controller: NodeId) -> Vec<String> {
        let node = self.node(switch);
        node.intfs()
            .iter()
            .filter(|intf| node.connection(intf).is_none_or(|(peer, _)| peer != controller))
            .cloned()
            .collect()
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
