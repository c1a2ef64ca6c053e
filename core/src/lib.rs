// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

pub mod error;
pub mod network;
pub mod node;
pub mod ping;
pub mod shell;
pub mod shell_node;
pub mod system;

#[cfg(test)]
pub(crate) mod testing;
