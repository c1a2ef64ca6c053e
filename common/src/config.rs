// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

//! # Runtime Configuration
//!
//! Two layers of configuration live here:
//!
//! * [`Config`]: terminal and UI behaviour, mapped from the command line.
//! * [`NetworkConfig`]: everything the orchestrator needs to materialize a
//!   network (datapath mode, namespace isolation, control-network addressing,
//!   wait policies and the programs run by switches and the controller).
//!
//! Defaults live in code. A TOML file ([`ConfigFile`]) may override the
//! controller parameters, the link wait timeout and the node programs.

use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use pnet::ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::timing::{RetryPolicy, WaitPolicy};

/// Attempts made to move an interface into a node namespace.
pub const MIGRATE_ATTEMPTS: u32 = 3;

/// Pause between two interface migration attempts.
pub const MIGRATE_DELAY: Duration = Duration::from_millis(10);

/// Interval between two "is the interface up" checks.
pub const LINK_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound on waiting for a control interface to come up.
pub const LINK_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid subnet size /{0} (must be between 1 and 32)")]
    InvalidSubnet(u8),

    #[error("unknown datapath mode '{0}' (expected 'kernel' or 'user')")]
    UnknownDatapath(String),
}

/// Terminal behaviour for the current run.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Skips the startup banner.
    pub no_banner: bool,

    /// Controls the visual density of the terminal output.
    ///
    /// # Levels
    /// * **0** (Default): banner, headers and the summary box.
    /// * **1**: plain log lines only.
    pub quiet: u8,

    /// Drops into the interactive shell instead of running the ping test.
    pub interactive: bool,

    /// Disables the keyboard watcher used to interrupt node commands.
    ///
    /// Set this when stdin is not a terminal (pipes, CI).
    pub disable_input: bool,
}

/// Where switch forwarding happens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatapathMode {
    /// Kernel datapaths, created per switch and named by a datapath index.
    /// Switches and the controller live in the root namespace.
    #[default]
    Kernel,
    /// User-space datapaths. Switches and the controller get their own
    /// namespaces and talk over a dedicated control network.
    User,
}

impl fmt::Display for DatapathMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatapathMode::Kernel => write!(f, "kernel"),
            DatapathMode::User => write!(f, "user"),
        }
    }
}

impl FromStr for DatapathMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kernel" => Ok(DatapathMode::Kernel),
            "user" => Ok(DatapathMode::User),
            other => Err(ConfigError::UnknownDatapath(other.to_string())),
        }
    }
}

/// Control-network addressing: the controller's address and the subnet size
/// used for every address the orchestrator assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerParams {
    pub ip: Ipv4Addr,
    pub subnet_bits: u8,
}

impl ControllerParams {
    pub fn new(ip: Ipv4Addr, subnet_bits: u8) -> Result<Self, ConfigError> {
        if subnet_bits == 0 || subnet_bits > 32 {
            return Err(ConfigError::InvalidSubnet(subnet_bits));
        }
        Ok(Self { ip, subnet_bits })
    }

    /// Wraps `ip` into a network using the configured subnet size.
    pub fn network_for(&self, ip: Ipv4Addr) -> Result<Ipv4Network, ConfigError> {
        Ipv4Network::new(ip, self.subnet_bits)
            .map_err(|_| ConfigError::InvalidSubnet(self.subnet_bits))
    }
}

impl Default for ControllerParams {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::new(10, 0, 123, 1),
            subnet_bits: 8,
        }
    }
}

/// Programs launched by controller and switch nodes.
///
/// Placeholders: `{dp}` datapath index, `{name}` node name, `{intfs}`
/// comma separated data interfaces, `{controller}` controller address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeCommands {
    pub controller: String,
    pub kernel_datapath_add: Vec<String>,
    pub kernel_datapath_del: String,
    pub kernel_switch: String,
    pub user_datapath: String,
    pub user_switch: String,
    pub log_dir: PathBuf,
}

impl Default for NodeCommands {
    fn default() -> Self {
        Self {
            controller: "controller -v ptcp:".to_string(),
            kernel_datapath_add: vec![
                "dpctl deldp nl:{dp}".to_string(),
                "dpctl adddp nl:{dp}".to_string(),
                "dpctl addif nl:{dp} {intfs}".to_string(),
            ],
            kernel_datapath_del: "dpctl deldp nl:{dp}".to_string(),
            kernel_switch: "ofprotocol nl:{dp} tcp:127.0.0.1 --fail=closed".to_string(),
            user_datapath: "ofdatapath -i {intfs} punix:/tmp/{name}".to_string(),
            user_switch: "ofprotocol unix:/tmp/{name} tcp:{controller} --fail=closed".to_string(),
            log_dir: PathBuf::from("/tmp"),
        }
    }
}

/// Everything needed to build one emulated network.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    pub datapath: DatapathMode,
    /// Gives switches and the controller their own namespace. Hosts are
    /// always isolated.
    pub in_namespace: bool,
    pub controller: ControllerParams,
    pub migrate: RetryPolicy,
    pub link_wait: WaitPolicy,
}

impl NetworkConfig {
    pub fn for_datapath(datapath: DatapathMode) -> Self {
        Self {
            datapath,
            in_namespace: datapath == DatapathMode::User,
            controller: ControllerParams::default(),
            migrate: RetryPolicy::new(MIGRATE_ATTEMPTS, MIGRATE_DELAY),
            link_wait: WaitPolicy::bounded(LINK_POLL_INTERVAL, LINK_WAIT_TIMEOUT),
        }
    }

    pub fn is_kernel(&self) -> bool {
        self.datapath == DatapathMode::Kernel
    }

    /// Applies the overrides found in a config file.
    pub fn with_file(mut self, file: &ConfigFile) -> Self {
        if let Some(params) = file.controller {
            self.controller = params;
        }
        if let Some(secs) = file.link_wait_timeout_secs {
            self.link_wait = WaitPolicy::bounded(self.link_wait.interval, Duration::from_secs(secs));
        }
        self
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::for_datapath(DatapathMode::default())
    }
}

/// On-disk configuration, every section optional.
///
/// ```toml
/// link_wait_timeout_secs = 10
///
/// [controller]
/// ip = "10.0.123.1"
/// subnet_bits = 8
///
/// [commands]
/// controller = "controller -v ptcp:6633"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub controller: Option<ControllerParams>,
    pub link_wait_timeout_secs: Option<u64>,
    pub commands: NodeCommands,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(params) = file.controller {
            ControllerParams::new(params.ip, params.subnet_bits)?;
        }
        Ok(file)
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
