//! Shared client configuration types.
//!
//! The CLI reads/writes `threadline.toml` using these types. Environment
//! overrides are applied once, when a client is constructed; nothing re-reads
//! the environment afterwards.

use serde::{Deserialize, Serialize};

/// Canonical config file name.
pub const CONFIG_FILE_NAME: &str = "threadline.toml";

/// Env vars consulted (in order) for the API root.
pub const API_URL_ENV_VARS: &[&str] = &[
    "THREADLINE_API_URL",
    "LANGGRAPH_API_URL",
    "NEXT_PUBLIC_LANGGRAPH_API_URL",
];

/// Env vars consulted (in order) for the assistant/graph identifier.
pub const ASSISTANT_ID_ENV_VARS: &[&str] = &[
    "THREADLINE_ASSISTANT_ID",
    "LANGGRAPH_ASSISTANT_ID",
    "NEXT_PUBLIC_LANGGRAPH_ASSISTANT_ID",
];

pub const THEME_ENV_VAR: &str = "THREADLINE_THEME";

/// Top-level client configuration (persisted as `threadline.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub directory: DirectorySettings,
    #[serde(default)]
    pub render: RenderSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Explicit API root. Empty means `{origin}/api`.
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_assistant_id")]
    pub assistant_id: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            origin: default_origin(),
            assistant_id: default_assistant_id(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySettings {
    /// Periodic thread-list refresh. `0` disables the timer; thread switches
    /// still trigger refreshes.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            page_limit: default_page_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RenderSettings {
    #[serde(default)]
    pub theme: ThemePreference,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThemePreference {
    /// Follow the terminal (`COLORFGBG`), light when unknown.
    #[default]
    #[serde(alias = "system")]
    Auto,
    Light,
    Dark,
    /// Unknown/invalid values are normalized by compatibility fallbacks.
    #[serde(other)]
    Unknown,
}

impl ThemePreference {
    pub fn display(&self) -> &'static str {
        match self {
            Self::Auto => "Auto",
            Self::Light => "Light",
            Self::Dark => "Dark",
            Self::Unknown => "Unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" | "system" => Some(Self::Auto),
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    /// Whether the dark palette applies. `colorfgbg` is the terminal's
    /// `COLORFGBG` value (`"fg;bg"`); background colors 0-6 and 8 are dark.
    pub fn is_dark(&self, colorfgbg: Option<&str>) -> bool {
        match self {
            Self::Dark => true,
            Self::Light => false,
            Self::Auto | Self::Unknown => colorfgbg
                .and_then(|value| value.rsplit(';').next())
                .and_then(|bg| bg.trim().parse::<u8>().ok())
                .is_some_and(|bg| bg <= 6 || bg == 8),
        }
    }
}

impl ClientConfig {
    /// API root: explicit `server.url`, else the same-origin `/api` path.
    pub fn api_url(&self) -> String {
        let url = self.server.url.trim();
        if !url.is_empty() {
            return url.trim_end_matches('/').to_string();
        }
        format!("{}/api", self.server.origin.trim().trim_end_matches('/'))
    }

    /// Apply environment overrides via `lookup` (normally `std::env::var`).
    /// Returns true when any field was updated.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        let first_set = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        let mut changed = false;
        if let Some(url) = first_set(API_URL_ENV_VARS) {
            self.server.url = url;
            changed = true;
        }
        if let Some(id) = first_set(ASSISTANT_ID_ENV_VARS) {
            self.server.assistant_id = id;
            changed = true;
        }
        if let Some(theme) = first_set(&[THEME_ENV_VAR][..]).and_then(|v| ThemePreference::parse(&v)) {
            self.render.theme = theme;
            changed = true;
        }
        changed
    }
}

// ── Serde default functions ─────────────────────────────────────────────

fn default_origin() -> String {
    "http://localhost:3000".to_string()
}
fn default_assistant_id() -> String {
    "agent".to_string()
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    2
}
fn default_refresh_interval_secs() -> u64 {
    5
}
fn default_page_limit() -> u32 {
    100
}

/// Normalize values that deserialize but cannot be used as-is.
/// Returns true when any field was updated.
pub fn apply_compat_fallbacks(config: &mut ClientConfig) -> bool {
    let mut changed = false;

    if config.render.theme == ThemePreference::Unknown {
        config.render.theme = ThemePreference::Auto;
        changed = true;
    }

    if config.directory.page_limit == 0 {
        config.directory.page_limit = default_page_limit();
        changed = true;
    }

    if config.server.assistant_id.trim().is_empty() {
        config.server.assistant_id = default_assistant_id();
        changed = true;
    }

    if config.server.origin.trim().is_empty() {
        config.server.origin = default_origin();
        changed = true;
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn api_url_falls_back_to_same_origin_api_path() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.api_url(), "http://localhost:3000/api");

        let mut cfg = ClientConfig::default();
        cfg.server.origin = "https://chat.example.com/".to_string();
        assert_eq!(cfg.api_url(), "https://chat.example.com/api");
    }

    #[test]
    fn explicit_url_wins_over_origin() {
        let mut cfg = ClientConfig::default();
        cfg.server.url = "http://127.0.0.1:2024/".to_string();
        assert_eq!(cfg.api_url(), "http://127.0.0.1:2024");
    }

    #[test]
    fn env_overrides_follow_precedence() {
        let mut cfg = ClientConfig::default();
        let changed = cfg.apply_env_overrides(env(&[
            ("LANGGRAPH_API_URL", "http://lg:2024"),
            ("NEXT_PUBLIC_LANGGRAPH_API_URL", "http://ignored"),
            ("NEXT_PUBLIC_LANGGRAPH_ASSISTANT_ID", "sql-agent"),
            ("THREADLINE_THEME", "dark"),
        ]));
        assert!(changed);
        assert_eq!(cfg.server.url, "http://lg:2024");
        assert_eq!(cfg.server.assistant_id, "sql-agent");
        assert_eq!(cfg.render.theme, ThemePreference::Dark);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut cfg = ClientConfig::default();
        let changed = cfg.apply_env_overrides(env(&[("THREADLINE_API_URL", "  ")]));
        assert!(!changed);
        assert!(cfg.server.url.is_empty());
    }

    #[test]
    fn apply_compat_fallbacks_normalizes_unknown_theme_and_zero_limit() {
        let mut cfg: ClientConfig = toml::from_str(
            r#"
[render]
theme = "solarized"

[directory]
page_limit = 0
"#,
        )
        .expect("parse toml");
        assert_eq!(cfg.render.theme, ThemePreference::Unknown);

        let changed = apply_compat_fallbacks(&mut cfg);
        assert!(changed);
        assert_eq!(cfg.render.theme, ThemePreference::Auto);
        assert_eq!(cfg.directory.page_limit, 100);
    }

    #[test]
    fn apply_compat_fallbacks_is_noop_for_defaults() {
        let mut cfg = ClientConfig::default();
        assert!(!apply_compat_fallbacks(&mut cfg));
    }

    #[test]
    fn directory_defaults_are_stable() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.directory.refresh_interval_secs, 5);
        assert_eq!(cfg.directory.page_limit, 100);
        assert_eq!(cfg.server.max_retries, 2);
    }

    #[test]
    fn theme_alias_and_terminal_detection() {
        let cfg: ClientConfig = toml::from_str("[render]\ntheme = \"system\"\n").unwrap();
        assert_eq!(cfg.render.theme, ThemePreference::Auto);

        assert!(ThemePreference::Auto.is_dark(Some("15;0")));
        assert!(!ThemePreference::Auto.is_dark(Some("0;15")));
        assert!(!ThemePreference::Auto.is_dark(None));
        assert!(ThemePreference::Dark.is_dark(None));
    }
}
