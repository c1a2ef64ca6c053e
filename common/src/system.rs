// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

/// Defines the contract for the OS-level primitives the orchestrator needs.
///
/// Implementations shell out to iproute2 and friends on Linux; tests swap in
/// recording fakes.
pub trait System {
    /// Whether the current process may create namespaces and links.
    fn is_privileged(&self) -> bool;

    /// Path of the binary used to spawn nodes inside a fresh namespace.
    fn locate_namespace_tool(&self) -> Option<PathBuf>;

    /// Raises process and file descriptor limits for large networks.
    fn fix_limits(&self) -> anyhow::Result<()>;

    /// Creates a connected pair of virtual interfaces in the root namespace.
    fn create_link_pair(&self, intf_a: &str, intf_b: &str) -> anyhow::Result<()>;

    /// Moves `intf` into the network namespace of process `pid`.
    ///
    /// May fail transiently while the target process is still starting up.
    fn move_interface(&self, intf: &str, pid: u32) -> anyhow::Result<()>;

    /// Lowers the scheduling priority of `pid`.
    fn lower_priority(&self, pid: u32) -> anyhow::Result<()>;
}
