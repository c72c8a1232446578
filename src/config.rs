//! Server configuration, read from the environment (and `.env`).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::generators::EngineSettings;

const DEFAULT_CHROME_EXECUTABLE: &str = "/usr/bin/google-chrome";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// How the headless browser is started. Chosen once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOptions {
    /// Let the driver locate Chrome and use its default sandbox.
    Default,
    /// Use a specific executable, optionally without the sandbox (containers).
    ExplicitPath {
        executable: PathBuf,
        no_sandbox: bool,
    },
}

impl LaunchOptions {
    /// Linux hosts run the system Chrome without the sandbox; other hosts use
    /// the driver defaults.
    pub fn for_host(os: &str, chrome_executable: impl Into<PathBuf>) -> Self {
        if os.eq_ignore_ascii_case("linux") {
            Self::ExplicitPath {
                executable: chrome_executable.into(),
                no_sandbox: true,
            }
        } else {
            Self::Default
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub assets_dir: PathBuf,
    pub logo_file: String,
    pub template_file: String,
    pub cache_template: bool,
    pub invoices_dir: PathBuf,
    pub persist_invoices: bool,
    pub launch: LaunchOptions,
    pub render_concurrency: usize,
    pub render_timeout: Duration,
    pub engine_ready_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let chrome = text("CHROME_EXECUTABLE", DEFAULT_CHROME_EXECUTABLE);

        Ok(Self {
            host: text("HOST", "0.0.0.0"),
            port: parse(&lookup, "PORT", 3000)?,
            assets_dir: PathBuf::from(text("ASSETS_DIR", "./assets")),
            logo_file: text("LOGO_FILE", "mdslogo.png"),
            template_file: text("TEMPLATE_FILE", "factura.hbs"),
            cache_template: parse_bool(&lookup, "CACHE_TEMPLATE", true)?,
            invoices_dir: PathBuf::from(text("INVOICES_DIR", "./invoices")),
            persist_invoices: parse_bool(&lookup, "PERSIST_INVOICES", true)?,
            launch: LaunchOptions::for_host(std::env::consts::OS, chrome),
            render_concurrency: parse(&lookup, "RENDER_CONCURRENCY", 4)?,
            render_timeout: Duration::from_secs(parse(&lookup, "RENDER_TIMEOUT_SECS", 30)?),
            engine_ready_timeout: Duration::from_secs(parse(
                &lookup,
                "ENGINE_READY_TIMEOUT_SECS",
                10,
            )?),
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_concurrent_renders: self.render_concurrency,
            render_timeout: self.render_timeout,
            ready_timeout: self.engine_ready_timeout,
        }
    }
}

fn parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn parse_bool<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value }),
        },
    }
}
