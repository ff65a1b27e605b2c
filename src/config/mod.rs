use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_PORT: u16 = 4320;
const DEFAULT_SESSION_TTL_DAYS: i64 = 30;
const DEFAULT_ANALYTICS_WINDOW_DAYS: i64 = 30;
const DEFAULT_REFERRAL_LIMIT: i64 = 100;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// HTTP server port (default: 4320).
    port: Option<u16>,
    /// Bind address (default: "127.0.0.1"; use "0.0.0.0" for LAN access).
    bind_address: Option<String>,
    /// Log level filter string, e.g. "debug", "info,fincore=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default) | "json" (for log aggregators).
    log_format: Option<String>,
    /// External base URL used when building referral links.
    base_url: Option<String>,
    /// Fallback language tag when Accept-Language resolves nothing ("en"/"ha").
    default_lang: Option<String>,
    /// Email for the bootstrap admin account. No admin is created when unset.
    admin_email: Option<String>,
    /// Password for the bootstrap admin account.
    admin_password: Option<String>,
    /// Anonymous session lifetime in days, absolute from mint (default: 30).
    session_ttl_days: Option<i64>,
    /// Default admin-analytics window in days (default: 30).
    analytics_window_days: Option<i64>,
    /// Direct-referral fan-out cap per account (default: 100).
    referral_limit: Option<i64>,
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

// ─── ServiceConfig ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub bind_address: String,
    pub data_dir: PathBuf,
    pub log: String,
    /// "pretty" | "json".
    pub log_format: String,
    pub base_url: String,
    pub default_lang: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub session_ttl_days: i64,
    pub analytics_window_days: i64,
    pub referral_limit: i64,
}

impl ServiceConfig {
    /// Resolve the effective config from CLI overrides, `config.toml`, and
    /// built-in defaults, in that priority order.
    pub fn load(
        data_dir: PathBuf,
        port: Option<u16>,
        bind_address: Option<String>,
        log: Option<String>,
    ) -> Self {
        let toml_cfg = load_toml(&data_dir).unwrap_or_default();

        Self {
            port: port.or(toml_cfg.port).unwrap_or(DEFAULT_PORT),
            bind_address: bind_address
                .or(toml_cfg.bind_address)
                .unwrap_or_else(default_bind_address),
            log: log.or(toml_cfg.log).unwrap_or_else(|| "info".to_string()),
            log_format: toml_cfg.log_format.unwrap_or_else(|| "pretty".to_string()),
            base_url: toml_cfg
                .base_url
                .unwrap_or_else(|| format!("http://127.0.0.1:{DEFAULT_PORT}")),
            default_lang: toml_cfg.default_lang.unwrap_or_else(|| "en".to_string()),
            admin_email: toml_cfg.admin_email,
            admin_password: toml_cfg.admin_password,
            session_ttl_days: toml_cfg
                .session_ttl_days
                .unwrap_or(DEFAULT_SESSION_TTL_DAYS),
            analytics_window_days: toml_cfg
                .analytics_window_days
                .unwrap_or(DEFAULT_ANALYTICS_WINDOW_DAYS),
            referral_limit: toml_cfg.referral_limit.unwrap_or(DEFAULT_REFERRAL_LIMIT),
            data_dir,
        }
    }
}
