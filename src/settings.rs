use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetch::DEFAULT_FETCH_TIMEOUT;
use crate::vectorize::DEFAULT_PX_PER_FT;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const DEFAULT_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_BODY_LIMIT_MB: usize = 25;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_addr: String,
    pub body_limit_mb: usize,
    pub fetch_timeout: Duration,
    pub px_per_ft: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_ADDR.to_string(),
            body_limit_mb: DEFAULT_BODY_LIMIT_MB,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            px_per_ft: DEFAULT_PX_PER_FT,
        }
    }
}

impl Settings {
    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_mb.saturating_mul(1024 * 1024)
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    server: Option<ServerSettings>,
    fetch: Option<FetchSettings>,
    vectorize: Option<VectorizeSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
    body_limit_mb: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct FetchSettings {
    timeout_secs: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct VectorizeSettings {
    px_per_ft: Option<f64>,
}

/// Loads settings from the built-in defaults, the working directory, the
/// home settings directory and finally `extra_path`, later files winning.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    settings.merge(parse_settings(DEFAULT_SETTINGS_TOML, Path::new("<built-in>"))?);

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge(parse_settings(&content, &path)?);
        }
    }

    Ok(settings)
}

fn parse_settings(content: &str, path: &Path) -> Result<SettingsFile> {
    toml::from_str(content).with_context(|| format!("failed to parse settings: {}", path.display()))
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(server) = incoming.server {
            if let Some(addr) = server.addr {
                if !addr.trim().is_empty() {
                    self.server_addr = addr.trim().to_string();
                }
            }
            if let Some(limit) = server.body_limit_mb {
                if limit > 0 {
                    self.body_limit_mb = limit;
                }
            }
        }
        if let Some(fetch) = incoming.fetch {
            if let Some(secs) = fetch.timeout_secs {
                if secs.is_finite() && secs > 0.0 {
                    self.fetch_timeout = Duration::from_secs_f64(secs);
                }
            }
        }
        if let Some(vectorize) = incoming.vectorize {
            if let Some(scale) = vectorize.px_per_ft {
                if scale.is_finite() && scale > 0.0 {
                    self.px_per_ft = scale;
                }
            }
        }
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".floorplan-vectorizer"))
        }
    })
}
