use crate::constants::{
    DEFAULT_CONFIG_FILE, DEFAULT_DB_MAX_CONNECTIONS, DEFAULT_HOST, DEFAULT_JWT_SECRET_KEY,
    DEFAULT_PORT, DEFAULT_SECRET_KEY, DEFAULT_TOKEN_LIFETIME, DEVELOPMENT_DATABASE_URL,
    PRODUCTION_DATABASE_URL, TESTING_DATABASE_URL, TESTING_TOKEN_LIFETIME,
};
use serde_json::Value;
use std::env;
use std::fmt;
use std::fs;
use std::time::Duration;

/// Deployment mode selected by `FLASK_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    Development,
    Testing,
    Production,
}

impl Profile {
    /// Map an environment indicator onto a profile.
    ///
    /// `"default"`, any unrecognized value, and an absent indicator all select
    /// [`Profile::Development`]. Matching is exact and case-sensitive.
    pub fn from_indicator(indicator: Option<&str>) -> Profile {
        match indicator {
            Some("development") | Some("default") => Profile::Development,
            Some("testing") => Profile::Testing,
            Some("production") => Profile::Production,
            _ => Profile::Development,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Profile::Development => "development",
            Profile::Testing => "testing",
            Profile::Production => "production",
        }
    }

    pub fn token_lifetime(self) -> Duration {
        match self {
            Profile::Testing => TESTING_TOKEN_LIFETIME,
            Profile::Development | Profile::Production => DEFAULT_TOKEN_LIFETIME,
        }
    }

    pub fn debug_enabled(self) -> bool {
        !matches!(self, Profile::Production)
    }

    fn fallback_database_url(self) -> &'static str {
        match self {
            Profile::Development => DEVELOPMENT_DATABASE_URL,
            Profile::Testing => TESTING_DATABASE_URL,
            Profile::Production => PRODUCTION_DATABASE_URL,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Settings for one deployment mode. Built once at startup, read-only after.
#[derive(Clone, PartialEq, Eq)]
pub struct ConfigProfile {
    pub profile: Profile,
    pub secret_key: String,
    pub token_signing_key: String,
    pub token_lifetime: Duration,
    pub database_url: String,
    pub debug_enabled: bool,
    pub testing: bool,
    /// Always false: per-statement tracking in the persistence layer stays off.
    pub track_mutations: bool,
}

impl ConfigProfile {
    /// Names of the secret variables still holding their development literal.
    pub fn defaulted_secrets(&self) -> Vec<&'static str> {
        let mut defaulted = Vec::new();
        if self.secret_key == DEFAULT_SECRET_KEY {
            defaulted.push("SECRET_KEY");
        }
        if self.token_signing_key == DEFAULT_JWT_SECRET_KEY {
            defaulted.push("JWT_SECRET_KEY");
        }
        defaulted
    }

    pub fn uses_in_memory_store(&self) -> bool {
        self.database_url.starts_with("sqlite:") && self.database_url.contains(":memory:")
    }
}

impl fmt::Debug for ConfigProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigProfile")
            .field("profile", &self.profile)
            .field("secret_key", &"<redacted>")
            .field("token_signing_key", &"<redacted>")
            .field("token_lifetime", &self.token_lifetime)
            .field("database_url", &redact_database_url(&self.database_url))
            .field("debug_enabled", &self.debug_enabled)
            .field("testing", &self.testing)
            .field("track_mutations", &self.track_mutations)
            .finish()
    }
}

/// Mask the password component of a database locator for logging.
pub fn redact_database_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("****"));
            }
            parsed.to_string()
        }
        Err(_) if !raw.contains('@') => raw.to_string(),
        Err(_) => "<redacted>".to_string(),
    }
}

/// Resolve a profile against the process environment.
pub fn resolve(indicator: Option<&str>) -> ConfigProfile {
    resolve_with(indicator, &|key| env::var(key).ok())
}

/// Resolve a profile against an explicit environment snapshot.
///
/// Never fails. `SECRET_KEY`, `JWT_SECRET_KEY` and `DATABASE_URL` each fall
/// back to their own literal when unset or empty. The testing profile ignores
/// `DATABASE_URL` and always uses the in-memory store.
pub fn resolve_with(indicator: Option<&str>, lookup: &dyn Fn(&str) -> Option<String>) -> ConfigProfile {
    let profile = Profile::from_indicator(indicator);
    let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

    let database_url = match profile {
        Profile::Testing => TESTING_DATABASE_URL.to_string(),
        Profile::Development | Profile::Production => var("DATABASE_URL")
            .unwrap_or_else(|| profile.fallback_database_url().to_string()),
    };

    ConfigProfile {
        profile,
        secret_key: var("SECRET_KEY").unwrap_or_else(|| DEFAULT_SECRET_KEY.to_string()),
        token_signing_key: var("JWT_SECRET_KEY")
            .unwrap_or_else(|| DEFAULT_JWT_SECRET_KEY.to_string()),
        token_lifetime: profile.token_lifetime(),
        database_url,
        debug_enabled: profile.debug_enabled(),
        testing: profile == Profile::Testing,
        track_mutations: false,
    }
}

/// Everything the binary needs to start: the resolved profile plus server settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub profile: ConfigProfile,
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub db_max_connections: u32,
}

impl Settings {
    /// Settings for an explicit profile with every server value at its default.
    pub fn for_profile(profile: ConfigProfile) -> Settings {
        Settings {
            debug: profile.debug_enabled,
            profile,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Load configuration from a JSON config file (if present) and environment variables.
/// Environment variables take precedence over config file values.
///
/// Config file path is read from `CONFIG_FILE` env var (default: `config.json`).
pub fn load_config() -> Settings {
    let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    let file_values = read_config_file(&config_path);
    load_config_with(&|key| env::var(key).ok(), &file_values)
}

fn read_config_file(path: &str) -> Value {
    fs::read_to_string(path)
        .ok()
        .and_then(|contents| serde_json::from_str(&contents).ok())
        .unwrap_or(Value::Null)
}

/// Layer an environment snapshot over parsed config-file values.
pub fn load_config_with(env_lookup: &dyn Fn(&str) -> Option<String>, file_values: &Value) -> Settings {
    let lookup = |key: &str| -> Option<String> {
        env_lookup(key)
            .filter(|v| !v.is_empty())
            .or_else(|| from_file(file_values, key))
    };

    let indicator = lookup("FLASK_ENV");
    let profile = resolve_with(indicator.as_deref(), &lookup);

    let host = lookup("FLASK_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = lookup("FLASK_PORT")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let debug = lookup("FLASK_DEBUG")
        .map(|v| parse_flag(&v))
        .unwrap_or(profile.debug_enabled);

    let db_max_connections = lookup("DB_MAX_CONNECTIONS")
        .and_then(|v| v.parse().ok())
        .filter(|n: &u32| *n > 0)
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);

    Settings {
        profile,
        host,
        port,
        debug,
        db_max_connections,
    }
}

/// `FLASK_HOST` is read from the `host` key, `SECRET_KEY` from `secret_key`.
fn file_key(var: &str) -> String {
    var.strip_prefix("FLASK_").unwrap_or(var).to_ascii_lowercase()
}

fn from_file(file_values: &Value, var: &str) -> Option<String> {
    match file_values.get(file_key(var).as_str())? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value, "True" | "true" | "1")
}
