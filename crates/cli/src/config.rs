use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use threadline_runtime_config::{CONFIG_FILE_NAME, ClientConfig, ThemePreference, apply_compat_fallbacks};

/// Get the config directory path (~/.config/threadline/)
pub fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home).join(".config").join("threadline"))
}

/// Canonical config file path.
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

fn read_config_doc(path: &Path) -> Result<toml::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    let doc = toml::from_str::<toml::Value>(&content)
        .with_context(|| format!("Failed to parse config at {}", path.display()))?;
    Ok(doc)
}

fn config_from_doc(doc: &toml::Value) -> ClientConfig {
    let mut config = doc.clone().try_into::<ClientConfig>().unwrap_or_else(|e| {
        tracing::warn!("Ignoring malformed config values: {e}");
        ClientConfig::default()
    });
    apply_compat_fallbacks(&mut config);
    config
}

/// Load config from `path`, returning defaults if the file does not exist.
pub fn load_config_from(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        return Ok(ClientConfig::default());
    }
    let doc = read_config_doc(path)?;
    Ok(config_from_doc(&doc))
}

pub fn save_config_to(path: &Path, config: &ClientConfig) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config dir at {}", dir.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config at {}", path.display()))?;
    Ok(())
}

/// Config as stored on disk, without environment overrides.
pub fn load_config() -> Result<ClientConfig> {
    load_config_from(&config_path()?)
}

/// Config used to build clients: the file plus environment overrides,
/// resolved once.
pub fn resolve_config() -> Result<ClientConfig> {
    let mut config = load_config()?;
    if config.apply_env_overrides(|name| std::env::var(name).ok()) {
        tracing::debug!("Applied environment overrides to config");
    }
    Ok(config)
}

/// Print current config.
pub fn show_config() -> Result<()> {
    let config = load_config()?;
    let path = config_path()?;
    println!("Config file: {}", path.display());
    println!();
    println!("[server]");
    println!(
        "  url                  = {}",
        if config.server.url.is_empty() {
            "(not set)"
        } else {
            config.server.url.as_str()
        }
    );
    println!("  origin               = {}", config.server.origin);
    println!("  assistant_id         = {}", config.server.assistant_id);
    println!("  connect_timeout_secs = {}", config.server.connect_timeout_secs);
    println!("  max_retries          = {}", config.server.max_retries);
    println!("  effective api url    = {}", config.api_url());
    println!();
    println!("[directory]");
    println!("  refresh_interval_secs = {}", config.directory.refresh_interval_secs);
    println!("  page_limit            = {}", config.directory.page_limit);
    println!();
    println!("[render]");
    println!("  theme = {}", config.render.theme.display());
    Ok(())
}

#[derive(Debug, Default)]
pub struct ConfigUpdate {
    pub url: Option<String>,
    pub origin: Option<String>,
    pub assistant_id: Option<String>,
    pub theme: Option<ThemePreference>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.origin.is_none()
            && self.assistant_id.is_none()
            && self.theme.is_none()
    }

    fn apply(self, config: &mut ClientConfig) {
        if let Some(url) = self.url {
            config.server.url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(origin) = self.origin {
            config.server.origin = origin;
        }
        if let Some(id) = self.assistant_id {
            config.server.assistant_id = id;
        }
        if let Some(theme) = self.theme {
            config.render.theme = theme;
        }
    }
}

/// Update config with provided values.
pub fn set_config(update: ConfigUpdate) -> Result<()> {
    let path = config_path()?;
    let mut config = load_config_from(&path)?;
    update.apply(&mut config);
    apply_compat_fallbacks(&mut config);
    save_config_to(&path, &config)?;
    println!("Configuration updated.");
    show_config()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config.server.assistant_id, "agent");
        assert_eq!(config.directory.refresh_interval_secs, 5);
    }

    #[test]
    fn save_then_load_keeps_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut config = ClientConfig::default();
        ConfigUpdate {
            url: Some("https://graph.example.com/".to_string()),
            assistant_id: Some("sql-agent".to_string()),
            theme: Some(ThemePreference::Dark),
            ..ConfigUpdate::default()
        }
        .apply(&mut config);
        save_config_to(&path, &config).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.server.url, "https://graph.example.com");
        assert_eq!(loaded.server.assistant_id, "sql-agent");
        assert_eq!(loaded.render.theme, ThemePreference::Dark);
        assert_eq!(loaded.api_url(), "https://graph.example.com");
    }

    #[test]
    fn unknown_theme_and_blank_fields_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "[server]\nassistant_id = \"\"\n\n[render]\ntheme = \"neon\"\n",
        )
        .unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.server.assistant_id, "agent");
        assert_eq!(loaded.render.theme, ThemePreference::Auto);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[server\n").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config"));
    }
}
