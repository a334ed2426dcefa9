use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::net::session_ids::{SESSION_ID_INITIAL, SESSION_ID_MAX};

pub const SETTINGS_FILE: &str = "sphere.yaml";
pub const BIND_ADDR_ENV: &str = "SPHERE_BIND_ADDR";
pub const LOG_ENV: &str = "SPHERE_LOG";
const USAGE: &str = "usage: sphere <data-root> [bind_addr]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Memory,
    Yaml,
}

/// Optional `<root>/sphere.yaml`. Missing keys fall back to the defaults
/// below; a timeout of 0 means wait forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub max_connections: usize,
    pub session_id_initial: u16,
    pub session_id_max: u16,
    pub login_timeout_secs: u64,
    pub screen_timeout_secs: u64,
    pub ingame_ack_timeout_secs: u64,
    pub poll_timeout_ms: u64,
    pub keepalive_short_secs: u64,
    pub keepalive_long_secs: u64,
    pub write_timeout_secs: u64,
    pub max_packet: usize,
    pub log_level: String,
    pub storage: StorageKind,
    pub roster_cache: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:25860".to_string(),
            max_connections: 512,
            session_id_initial: SESSION_ID_INITIAL,
            session_id_max: SESSION_ID_MAX,
            login_timeout_secs: 0,
            screen_timeout_secs: 0,
            ingame_ack_timeout_secs: 30,
            poll_timeout_ms: 250,
            keepalive_short_secs: 5,
            keepalive_long_secs: 30,
            write_timeout_secs: 10,
            max_packet: 4096,
            log_level: "info".to_string(),
            storage: StorageKind::Yaml,
            roster_cache: 256,
        }
    }
}

impl ServerSettings {
    pub fn load(root: &Path) -> Result<Self, ServerError> {
        let path = root.join(SETTINGS_FILE);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(ServerError::Config(format!(
                    "settings read failed for {}: {}",
                    path.display(),
                    err
                )))
            }
        };
        Self::parse(&data).map_err(|err| {
            ServerError::Config(format!("settings parse failed for {}: {}", path.display(), err))
        })
    }

    pub fn parse(data: &str) -> Result<Self, serde_yaml::Error> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(data)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.bind_addr.trim().is_empty() {
            problems.push("bind_addr must not be empty".to_string());
        }
        if self.max_connections == 0 {
            problems.push("max_connections must be at least 1".to_string());
        }
        if self.session_id_initial > self.session_id_max {
            problems.push(format!(
                "session_id_initial {:#06x} exceeds session_id_max {:#06x}",
                self.session_id_initial, self.session_id_max
            ));
        }
        if self.poll_timeout_ms == 0 {
            problems.push("poll_timeout_ms must be at least 1".to_string());
        }
        if self.keepalive_short_secs == 0 || self.keepalive_long_secs == 0 {
            problems.push("keepalive intervals must be at least 1 second".to_string());
        }
        if self.keepalive_short_secs > self.keepalive_long_secs {
            problems.push("keepalive_short_secs must not exceed keepalive_long_secs".to_string());
        }
        if self.max_packet < 64 {
            problems.push("max_packet must be at least 64 bytes".to_string());
        }
        problems
    }

    pub fn timings(&self) -> SessionTimings {
        SessionTimings {
            login: optional_secs(self.login_timeout_secs),
            screen: optional_secs(self.screen_timeout_secs),
            ingame_ack: optional_secs(self.ingame_ack_timeout_secs),
            poll: Duration::from_millis(self.poll_timeout_ms.max(1)),
            keepalive_short: Duration::from_secs(self.keepalive_short_secs.max(1)),
            keepalive_long: Duration::from_secs(self.keepalive_long_secs.max(1)),
            write: optional_secs(self.write_timeout_secs),
            max_packet: self.max_packet.max(64),
        }
    }
}

fn optional_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Per-connection timing derived from [`ServerSettings`]. `None` waits forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    pub login: Option<Duration>,
    pub screen: Option<Duration>,
    pub ingame_ack: Option<Duration>,
    pub poll: Duration,
    pub keepalive_short: Duration,
    pub keepalive_long: Duration,
    pub write: Option<Duration>,
    pub max_packet: usize,
}

impl Default for SessionTimings {
    fn default() -> Self {
        ServerSettings::default().timings()
    }
}

#[derive(Debug)]
pub struct AppConfig {
    pub root: PathBuf,
    pub settings: ServerSettings,
}

impl AppConfig {
    pub fn from_args(args: &[String]) -> Result<Self, ServerError> {
        if args.len() < 2 {
            return Err(ServerError::Config(USAGE.to_string()));
        }
        let root = Path::new(&args[1]).to_path_buf();
        let mut settings = ServerSettings::load(&root)?;

        if let Some(addr) = env_value(BIND_ADDR_ENV) {
            settings.bind_addr = addr;
        }
        if let Some(addr) = args.get(2) {
            settings.bind_addr = addr.clone();
        }
        if let Some(level) = env_value(LOG_ENV) {
            settings.log_level = level;
        }

        let problems = settings.validate();
        if !problems.is_empty() {
            return Err(ServerError::Config(problems.join("; ")));
        }
        Ok(Self { root, settings })
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
