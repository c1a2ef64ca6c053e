// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

use std::net::Ipv4Addr;

/// Data-plane address derived from a topology identifier: `10.x.y.z` with the
/// low 24 bits of `id`.
pub fn ipv4_from_id(id: u64) -> Ipv4Addr {
    let low = (id & 0x00ff_ffff) as u32;
    Ipv4Addr::from(0x0a00_0000 | low)
}

/// Linux caps interface names at 15 bytes (`IFNAMSIZ - 1`).
pub const MAX_INTF_NAME_LEN: usize = 15;

pub fn is_valid_intf_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_INTF_NAME_LEN
        && !name.contains(|c: char| c.is_whitespace() || c == '/' || c == ':')
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
