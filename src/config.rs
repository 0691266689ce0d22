/*!
Server configuration.

Defaults are overlaid by an optional TOML file, then by the environment.
*/
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use anyhow::Context;
use chrono::Duration;
use serde::Deserialize;

pub const DATABASE_URL_ENV: &str = "ATTENDANCE_DATABASE_URL";
pub const MAX_SESSION_LIFETIME_DAYS: i64 = 365;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    database_url: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    session_lifetime_days: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct Cfg {
    pub database_url: String,
    pub addr: SocketAddr,
    pub session_lifetime_days: i64,
}

impl Default for Cfg {
    fn default() -> Self {
        Self {
            database_url: "sqlite://attendance.db".to_owned(),
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
            session_lifetime_days: 5,
        }
    }
}

impl Cfg {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Unable to load config file {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cf: ConfigFile = toml::from_str(contents)?;
        let mut c = Self::default();

        if let Some(s) = cf.database_url {
            c.database_url = s;
        }
        if let Some(s) = cf.host {
            c.addr.set_ip(
                s.parse()
                    .with_context(|| format!("Error parsing {:?} as IP address", &s))?,
            );
        }
        if let Some(n) = cf.port {
            c.addr.set_port(n);
        }
        if let Some(n) = cf.session_lifetime_days {
            if !(1..=MAX_SESSION_LIFETIME_DAYS).contains(&n) {
                anyhow::bail!(
                    "session_lifetime_days must be between 1 and {}, got {}",
                    MAX_SESSION_LIFETIME_DAYS,
                    n
                );
            }
            c.session_lifetime_days = n;
        }

        Ok(c)
    }

    /// Applies environment overrides on top of whatever was loaded.
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.database_url = url;
            }
        }
        self
    }

    pub fn session_lifetime(&self) -> Duration {
        Duration::days(self.session_lifetime_days)
    }
}
