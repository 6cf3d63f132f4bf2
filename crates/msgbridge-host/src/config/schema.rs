use std::path::PathBuf;

use serde::Deserialize;
use msgbridge_core::error::{MsgBridgeError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    pub version: u32,

    #[serde(default)]
    pub host: HostSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            version: 1,
            host: HostSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MsgBridgeError::UnsupportedVersion);
        }
        self.host.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostSection {
    /// Workspace folder exposed to handlers; none means no folder is open.
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,

    /// Longest inbound line accepted by stream channels.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,

    /// How long shutdown waits for in-flight handlers.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Poll period of the `.git/HEAD` watcher; 0 disables it.
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            workspace_root: None,
            max_message_bytes: default_max_message_bytes(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            watch_interval_ms: default_watch_interval_ms(),
        }
    }
}

impl HostSection {
    pub fn validate(&self) -> Result<()> {
        if !(1024..=16 * 1024 * 1024).contains(&self.max_message_bytes) {
            return Err(MsgBridgeError::Config(
                "host.max_message_bytes must be between 1024 and 16777216".into(),
            ));
        }
        if self.shutdown_grace_ms > 60_000 {
            return Err(MsgBridgeError::Config(
                "host.shutdown_grace_ms must be at most 60000".into(),
            ));
        }
        if self.watch_interval_ms != 0 && !(100..=60_000).contains(&self.watch_interval_ms) {
            return Err(MsgBridgeError::Config(
                "host.watch_interval_ms must be 0 or between 100 and 60000".into(),
            ));
        }
        if let Some(root) = &self.workspace_root {
            if root.as_os_str().is_empty() {
                return Err(MsgBridgeError::Config(
                    "host.workspace_root must not be empty".into(),
                ));
            }
        }
        Ok(())
    }
}

fn default_max_message_bytes() -> usize {
    1024 * 1024
}
fn default_shutdown_grace_ms() -> u64 {
    2000
}
fn default_watch_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl LoggingSection {
    pub fn validate(&self) -> Result<()> {
        if self.filter.trim().is_empty() {
            return Err(MsgBridgeError::Config("logging.filter must not be empty".into()));
        }
        Ok(())
    }
}

fn default_filter() -> String {
    "info".into()
}
