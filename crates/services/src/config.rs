use crate::error::ConfigError;

pub const DEFAULT_DB_URL: &str = "sqlite://progress.sqlite3";
pub const DEFAULT_CACHE_URL: &str = "sqlite://progress-cache.sqlite3";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Database backing the remote document store and auth service.
    pub db_url: String,
    /// Database backing the client's local cache.
    pub cache_url: String,
    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DB_URL.to_owned(),
            cache_url: DEFAULT_CACHE_URL.to_owned(),
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var              | Default                           |
    /// |----------------------|-----------------------------------|
    /// | `PROGRESS_DB_URL`    | `sqlite://progress.sqlite3`       |
    /// | `PROGRESS_CACHE_URL` | `sqlite://progress-cache.sqlite3` |
    /// | `HOST`               | `127.0.0.1`                       |
    /// | `PORT`               | `3000`                            |
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an empty or unparsable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an empty or unparsable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            db_url: non_empty("PROGRESS_DB_URL", lookup("PROGRESS_DB_URL"))?
                .unwrap_or(defaults.db_url),
            cache_url: non_empty("PROGRESS_CACHE_URL", lookup("PROGRESS_CACHE_URL"))?
                .unwrap_or(defaults.cache_url),
            host: non_empty("HOST", lookup("HOST"))?.unwrap_or(defaults.host),
            port: match non_empty("PORT", lookup("PORT"))? {
                Some(raw) => parse_port("PORT", &raw)?,
                None => defaults.port,
            },
        })
    }

    /// Bind address for the HTTP server.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty(name: &'static str, value: Option<String>) -> Result<Option<String>, ConfigError> {
    match value {
        Some(raw) if raw.trim().is_empty() => Err(ConfigError::Empty { name }),
        Some(raw) => Ok(Some(raw.trim().to_owned())),
        None => Ok(None),
    }
}

/// Parse a port number supplied through `name`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidPort` if `raw` is not a number in `1..=65535`.
pub fn parse_port(name: &'static str, raw: &str) -> Result<u16, ConfigError> {
    match raw.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort {
            name,
            raw: raw.to_owned(),
        }),
    }
}
