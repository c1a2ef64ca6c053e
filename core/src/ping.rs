// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

//! # All-Pairs Ping
//!
//! Every node in the set pings every other node once, in order. Loss is the
//! truncated percentage of lost replies over all pings sent.

use std::sync::OnceLock;

use regex::Regex;
use vnet_common::{debug, error, info};

use crate::error::NetworkError;
use crate::network::Network;
use crate::node::NodeId;

static PING_SUMMARY: OnceLock<Regex> = OnceLock::new();

fn ping_summary() -> &'static Regex {
    PING_SUMMARY.get_or_init(|| {
        Regex::new(r"(\d+) packets transmitted, (\d+) received").expect("ping summary regex is valid")
    })
}

/// Packets sent and received by one ping invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingCount {
    pub sent: u64,
    pub received: u64,
}

impl PingCount {
    /// `None` when more replies came back than pings went out.
    pub fn lost(&self) -> Option<u64> {
        self.sent.checked_sub(self.received)
    }
}

/// Extracts the transmitted/received summary from ping output.
pub fn parse_ping(output: &str) -> Result<PingCount, NetworkError> {
    let caps = ping_summary()
        .captures(output)
        .ok_or_else(|| NetworkError::PingParse(output.to_string()))?;
    let number = |i: usize| {
        caps[i]
            .parse::<u64>()
            .map_err(|_| NetworkError::PingParse(output.to_string()))
    };
    Ok(PingCount {
        sent: number(1)?,
        received: number(2)?,
    })
}

/// `100 * lost / sent`, truncated. `None` when nothing was sent.
pub fn loss_percent(sent: u64, lost: u64) -> Option<u32> {
    if sent == 0 {
        return None;
    }
    let percent = lost.saturating_mul(100) / sent;
    Some(percent.min(100) as u32)
}

impl Network {
    /// Pings between every ordered pair of `nodes` (all hosts when `None`).
    ///
    /// Returns the loss percentage, or `None` when there was nobody to ping.
    pub fn ping_test(&mut self, nodes: Option<&[NodeId]>, verbose: bool) -> Result<Option<u32>, NetworkError> {
        let nodes = match nodes {
            Some(nodes) => nodes.to_vec(),
            None => self.hosts(),
        };

        if verbose {
            info!("Ping: testing ping reachability");
        }

        let mut sent = 0;
        let mut lost = 0;
        for &src in &nodes {
            let mut line = format!("{} ->", self.node(src).name());
            for &dst in &nodes {
                if src == dst {
                    continue;
                }
                let target = self.node(dst);
                let (dst_name, addr) = match target.address() {
                    Some(addr) => (target.name().to_string(), addr),
                    None => return Err(NetworkError::NoAddress(target.name().to_string())),
                };

                let output = self.node_mut(src).run_sync(&format!("ping -c1 {addr}"))?;
                let count = parse_ping(&output)?;
                let Some(dropped) = count.lost() else {
                    let src_name = self.node(src).name().to_string();
                    error!("Ping anomaly from {src_name} to {dst_name}:\n{output}");
                    if let Ok(routes) = self.node_mut(src).run_sync("ip route") {
                        debug!("{src_name} routes:\n{routes}");
                    }
                    return Err(NetworkError::PingAnomaly {
                        src: src_name,
                        dst: dst_name,
                        sent: count.sent,
                        received: count.received,
                    });
                };

                sent += count.sent;
                lost += dropped;
                if verbose {
                    line.push(' ');
                    line.push_str(if dropped == 0 { dst_name.as_str() } else { "X" });
                }
            }
            if verbose {
                info!("{line}");
            }
        }

        let loss = loss_percent(sent, lost);
        if let Some(loss) = loss
            && verbose
        {
            info!("Results: {loss}% packet loss ({lost}/{sent} lost)");
        }
        Ok(loss)
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
