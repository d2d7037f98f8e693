//! Dev server configuration parsed from environment variables.
//!
//! Every setting has a default that reproduces the stock frontend setup:
//! port 3000, `@` aliased to `<root>/src`, `/api` proxied to
//! `http://localhost:8000` with origin rewriting, and jsdom as the test DOM.
//! Values that are present but malformed are errors rather than silently
//! falling back to the default.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use reqwest::Url;

use crate::alias::{DEFAULT_SYMBOL, PathAlias};
use crate::proxy::ProxyRule;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SOURCE_DIR: &str = "src";
pub const DEFAULT_ENTRY_MODULE: &str = "@/main";
pub const DEFAULT_PUBLIC_DIR: &str = "public";
pub const DEFAULT_PROXY_PREFIX: &str = "/api";
pub const DEFAULT_PROXY_TARGET: &str = "http://localhost:8000";
pub const DEFAULT_PROXY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TEST_SETUP_FILE: &str = "./src/setupTests.ts";

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: '{value}' is not a port number")]
    InvalidPort { var: &'static str, value: String },

    #[error("invalid {var}: '{value}' is not a positive number")]
    InvalidNumber { var: &'static str, value: String },

    #[error("invalid {var}: '{value}' is not a boolean")]
    InvalidBool { var: &'static str, value: String },

    #[error("invalid PROXY_TARGET '{value}': {reason}")]
    InvalidProxyTarget { value: String, reason: String },

    #[error("invalid PROXY_PREFIX '{0}': must start with '/' and name a path segment")]
    InvalidProxyPrefix(String),

    #[error("unknown TEST_ENVIRONMENT: {0} (expected 'jsdom', 'happy-dom' or 'node')")]
    UnknownTestEnvironment(String),

    #[error("invalid CORS origin '{0}'")]
    InvalidCorsOrigin(String),

    #[error("cannot determine project root: {0}")]
    ProjectRoot(#[from] std::io::Error),
}

// =============================================================================
// TEST RUNNER SETTINGS
// =============================================================================

/// DOM emulation mode handed to the test runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomEnvironment {
    Jsdom,
    HappyDom,
    Node,
}

impl DomEnvironment {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jsdom => "jsdom",
            Self::HappyDom => "happy-dom",
            Self::Node => "node",
        }
    }
}

impl std::str::FromStr for DomEnvironment {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "jsdom" => Ok(Self::Jsdom),
            "happy-dom" | "happy_dom" => Ok(Self::HappyDom),
            "node" => Ok(Self::Node),
            other => Err(ConfigError::UnknownTestEnvironment(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSettings {
    pub globals: bool,
    pub environment: DomEnvironment,
    pub setup_file: PathBuf,
}

impl TestSettings {
    /// Setup file resolved against the project root.
    #[must_use]
    pub fn setup_path(&self, root: &Path) -> PathBuf {
        let relative: PathBuf = self.setup_file.components().filter(|c| !matches!(c, Component::CurDir)).collect();
        root.join(relative)
    }
}

// =============================================================================
// DEV CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevConfig {
    pub host: String,
    pub port: u16,
    pub root: PathBuf,
    pub alias: PathAlias,
    /// Aliased specifier of the application entry module.
    pub entry: String,
    pub proxy: ProxyRule,
    pub test: TestSettings,
    pub public_dir: PathBuf,
    pub cors_origins: Vec<String>,
}

impl DevConfig {
    /// Build the config from process environment variables.
    ///
    /// Optional (all of them):
    /// - `HOST`, `PORT`: bind address, default `0.0.0.0:3000`
    /// - `PROJECT_ROOT`: default current directory
    /// - `ALIAS_SYMBOL`, `ALIAS_TARGET`: default `@` -> `<root>/src`
    /// - `ENTRY_MODULE`: default `@/main`
    /// - `PROXY_PREFIX`, `PROXY_TARGET`: default `/api` -> `http://localhost:8000`
    /// - `PROXY_CHANGE_ORIGIN` (default true), `PROXY_STRIP_PREFIX` (default false)
    /// - `PROXY_TIMEOUT_SECS`: default 30
    /// - `TEST_GLOBALS`, `TEST_ENVIRONMENT`, `TEST_SETUP_FILE`
    /// - `PUBLIC_DIR`: default `<root>/public`
    /// - `CORS_ORIGINS`: comma-separated list or JSON array
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is set but malformed, or if
    /// `PROJECT_ROOT` is unset and the current directory cannot be read.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config reading each variable through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`DevConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let root = match get("PROJECT_ROOT") {
            Some(raw) => PathBuf::from(raw),
            None => std::env::current_dir()?,
        };

        let host = get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidPort { var: "PORT", value: raw })?,
            None => DEFAULT_PORT,
        };

        let alias = PathAlias::new(
            get("ALIAS_SYMBOL").unwrap_or_else(|| DEFAULT_SYMBOL.to_string()),
            resolve_path(&root, get("ALIAS_TARGET").as_deref().unwrap_or(DEFAULT_SOURCE_DIR)),
        );
        let entry = get("ENTRY_MODULE").unwrap_or_else(|| DEFAULT_ENTRY_MODULE.to_string());

        let timeout_secs = match get("PROXY_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => return Err(ConfigError::InvalidNumber { var: "PROXY_TIMEOUT_SECS", value: raw }),
            },
            None => DEFAULT_PROXY_TIMEOUT_SECS,
        };
        let proxy = ProxyRule {
            prefix: parse_prefix(get("PROXY_PREFIX").as_deref().unwrap_or(DEFAULT_PROXY_PREFIX))?,
            target: parse_target(get("PROXY_TARGET").as_deref().unwrap_or(DEFAULT_PROXY_TARGET))?,
            change_origin: parse_bool("PROXY_CHANGE_ORIGIN", get("PROXY_CHANGE_ORIGIN"), true)?,
            strip_prefix: parse_bool("PROXY_STRIP_PREFIX", get("PROXY_STRIP_PREFIX"), false)?,
            timeout: Duration::from_secs(timeout_secs),
        };

        let test = TestSettings {
            globals: parse_bool("TEST_GLOBALS", get("TEST_GLOBALS"), true)?,
            environment: match get("TEST_ENVIRONMENT") {
                Some(raw) => raw.parse()?,
                None => DomEnvironment::Jsdom,
            },
            setup_file: PathBuf::from(get("TEST_SETUP_FILE").unwrap_or_else(|| DEFAULT_TEST_SETUP_FILE.to_string())),
        };

        let public_dir = resolve_path(&root, get("PUBLIC_DIR").as_deref().unwrap_or(DEFAULT_PUBLIC_DIR));
        let cors_origins = match get("CORS_ORIGINS") {
            Some(raw) => parse_cors_origins(&raw)?,
            None => Vec::new(),
        };

        Ok(Self { host, port, root, alias, entry, proxy, test, public_dir, cors_origins })
    }

    #[must_use]
    pub fn bind_addr(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

fn resolve_path(root: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() { path.to_path_buf() } else { root.join(path) }
}

/// Same truthy/falsy vocabulary as the rest of the env parsing, but a value
/// outside it is an error.
fn parse_bool(var: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool { var, value: raw }),
    }
}

fn parse_prefix(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim_end_matches('/');
    if !trimmed.starts_with('/') || trimmed.len() < 2 {
        return Err(ConfigError::InvalidProxyPrefix(raw.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Parse the proxy target and reduce it to its origin.
fn parse_target(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidProxyTarget { value: raw.to_string(), reason: reason.to_string() };

    let mut url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    url.set_path("");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Accepts `a,b,c` or a JSON array of strings.
fn parse_cors_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    let origins: Vec<String> = if raw.starts_with('[') {
        serde_json::from_str(raw).map_err(|_| ConfigError::InvalidCorsOrigin(raw.to_string()))?
    } else {
        raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
    };

    origins
        .into_iter()
        .map(|origin| -> Result<String, ConfigError> {
            let url = Url::parse(&origin).map_err(|_| ConfigError::InvalidCorsOrigin(origin.clone()))?;
            if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
                return Err(ConfigError::InvalidCorsOrigin(origin));
            }
            Ok(url.origin().ascii_serialization())
        })
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
