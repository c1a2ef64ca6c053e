// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

mod emulation;

#[cfg(target_os = "linux")]
pub mod utils {
    use std::process::Command;

    use vnet_common::system::System;
    use vnet_core::system::LinuxSystem;

    /// Whether this process may create links and namespaces.
    ///
    /// Privileged tests return early (and say so) when this is false.
    pub fn can_emulate(test: &str) -> bool {
        let system = LinuxSystem;
        let ready = system.is_privileged() && system.locate_namespace_tool().is_some();
        if !ready {
            eprintln!("Skipping {test}: requires root privileges and 'unshare'.");
        }
        ready
    }

    /// Deletes a root-namespace interface left over by an aborted run.
    pub struct LinkGuard {
        pub intf: String,
    }

    impl LinkGuard {
        pub fn new(intf: &str) -> Self {
            Self::cleanup(intf);
            Self {
                intf: intf.to_string(),
            }
        }

        pub fn exists_in_root(intf: &str) -> bool {
            Command::new("ip")
                .args(["link", "show", "dev", intf])
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
        }

        fn cleanup(intf: &str) {
            let _ = Command::new("ip").args(["link", "del", intf]).output();
        }
    }

    impl Drop for LinkGuard {
        fn drop(&mut self) {
            Self::cleanup(&self.intf);
        }
    }
}
