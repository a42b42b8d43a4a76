use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_PORT: u16 = 4320;
const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// HTTP listen port (default: 4320).
    port: Option<u16>,
    /// Bind address (default: "127.0.0.1"; use "0.0.0.0" for LAN access).
    bind_address: Option<String>,
    /// Backend API base URL (default: http://localhost:8000).
    backend_url: Option<String>,
    /// Log level filter string, e.g. "debug", "info,taskgate=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default, human-readable) | "json" (structured for log aggregators).
    log_format: Option<String>,
    /// Timeout for outbound backend calls in seconds. Absent or 0 means no
    /// timeout: the forwarder waits indefinitely and fails only on
    /// connection-level errors, which is the contract's default behavior.
    request_timeout_secs: Option<u64>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── GatewayConfig ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub log: String,
    /// Backend API base URL (TASKGATE_BACKEND_URL env var).
    /// The forwarder receives this as an explicit constructor argument.
    pub backend_url: String,
    /// Bind address for the HTTP server (default: "127.0.0.1").
    pub bind_address: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    /// Outbound backend call timeout. None = unbounded wait (the default).
    pub request_timeout: Option<std::time::Duration>,
}

impl GatewayConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
        backend_url: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let backend_url = backend_url
            .or(std::env::var("TASKGATE_BACKEND_URL")
                .ok()
                .filter(|s| !s.is_empty()))
            .or(toml.backend_url)
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        // A trailing slash would produce `//` when segments are appended.
        let backend_url = backend_url.trim_end_matches('/').to_string();

        let bind_address = bind_address
            .or(std::env::var("TASKGATE_BIND").ok().filter(|s| !s.is_empty()))
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let log_format = std::env::var("TASKGATE_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let request_timeout = toml
            .request_timeout_secs
            .filter(|&secs| secs > 0)
            .map(std::time::Duration::from_secs);

        Self {
            port,
            data_dir,
            log,
            backend_url,
            bind_address,
            log_format,
            request_timeout,
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/taskgate
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("taskgate");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/taskgate or ~/.local/share/taskgate
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("taskgate");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("taskgate");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\taskgate
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("taskgate");
        }
    }
    // Fallback
    PathBuf::from(".taskgate")
}
