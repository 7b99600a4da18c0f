//! Runtime configuration loaded from the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default Tor SOCKS port.
pub const DEFAULT_TOR_PROXY_PORT: u16 = 9050;

/// Default Tor control port.
pub const DEFAULT_TOR_CONTROL_PORT: u16 = 9051;

/// Renew the Tor circuit after this many attempts.
pub const DEFAULT_MAX_CIRCUIT_AGE: u32 = 10;

/// How long to wait after a renewal signal for the new circuit to establish.
pub const DEFAULT_CIRCUIT_SETTLE: Duration = Duration::from_secs(3);

/// Settings recognized by the acquisition layer.
///
/// Loaded once at process start; egress options are derived from these and
/// are immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Whether upstream authentication is configured. Gates static proxy
    /// usage entirely (Tor is independent of this).
    #[serde(default)]
    pub auth: bool,

    /// Static proxy URIs in `scheme://[user:pass@]host:port` form.
    #[serde(default)]
    pub proxies: Vec<String>,

    /// Route acquisition through Tor instead of static proxies.
    #[serde(default)]
    pub use_tor: bool,

    /// Tor SOCKS proxy host.
    #[serde(default = "default_tor_host")]
    pub tor_proxy_host: String,

    /// Tor SOCKS proxy port.
    #[serde(default = "default_tor_proxy_port")]
    pub tor_proxy_port: u16,

    /// Tor control port used for circuit renewal.
    #[serde(default = "default_tor_control_port")]
    pub tor_control_port: u16,

    /// Attempts allowed on a circuit before proactive renewal.
    #[serde(default = "default_max_circuit_age")]
    pub max_circuit_age: u32,

    /// Settle delay after a successful renewal signal.
    #[serde(default = "default_circuit_settle", with = "duration_secs")]
    pub circuit_settle: Duration,

    /// Directory for cached upstream credentials handed to the catalog client.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

fn default_tor_host() -> String {
    "127.0.0.1".to_string()
}

fn default_tor_proxy_port() -> u16 {
    DEFAULT_TOR_PROXY_PORT
}

fn default_tor_control_port() -> u16 {
    DEFAULT_TOR_CONTROL_PORT
}

fn default_max_circuit_age() -> u32 {
    DEFAULT_MAX_CIRCUIT_AGE
}

fn default_circuit_settle() -> Duration {
    DEFAULT_CIRCUIT_SETTLE
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("auth")
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auth: false,
            proxies: Vec::new(),
            use_tor: false,
            tor_proxy_host: default_tor_host(),
            tor_proxy_port: DEFAULT_TOR_PROXY_PORT,
            tor_control_port: DEFAULT_TOR_CONTROL_PORT,
            max_circuit_age: DEFAULT_MAX_CIRCUIT_AGE,
            circuit_settle: DEFAULT_CIRCUIT_SETTLE,
            cache_dir: default_cache_dir(),
        }
    }
}

impl Settings {
    /// Load settings from a `.env` file (if present) and the environment.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::default().with_env_overrides()
    }

    /// Apply environment variable overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("AUTH") {
            self.auth = is_truthy(&v);
        }

        // PROXIES is comma-separated; empty entries are skipped.
        if let Ok(list) = env::var("PROXIES") {
            self.proxies = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Ok(v) = env::var("USE_TOR") {
            self.use_tor = is_truthy(&v);
        }

        if let Ok(host) = env::var("TOR_PROXY_HOST") {
            if !host.is_empty() {
                self.tor_proxy_host = host;
            }
        }

        if let Ok(port) = env::var("TOR_PROXY_PORT") {
            if let Ok(port) = port.parse() {
                self.tor_proxy_port = port;
            }
        }

        if let Ok(port) = env::var("TOR_CONTROL_PORT") {
            if let Ok(port) = port.parse() {
                self.tor_control_port = port;
            }
        }

        if let Ok(dir) = env::var("CACHE_DIR") {
            if !dir.is_empty() {
                self.cache_dir = PathBuf::from(dir);
            }
        }

        self
    }
}

fn is_truthy(v: &str) -> bool {
    v == "1" || v.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_direct() {
        let settings = Settings::default();
        assert!(!settings.use_tor);
        assert!(!settings.auth);
        assert!(settings.proxies.is_empty());
        assert_eq!(settings.tor_proxy_port, 9050);
        assert_eq!(settings.tor_control_port, 9051);
    }

    #[test]
    fn truthy_values() {
        assert!(is_truthy("1"));
        assert!(is_truthy("true"));
        assert!(is_truthy("TRUE"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("yes"));
    }
}
