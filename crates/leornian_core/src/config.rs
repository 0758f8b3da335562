//! Runtime settings loaded from `LEOR_*` environment variables.
//!
//! # Responsibility
//! - Provide typed settings with defaults for local development.
//! - Reject malformed values instead of silently falling back.
//!
//! # Invariants
//! - `site_url` never ends with `/`.
//! - `log_dir` is absolute (required by [`crate::logging::init_logging`]).

use crate::logging::default_log_level;
use crate::model::user::validate_email;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_SITE_URL: &str = "http://localhost:8000";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_FROM_EMAIL: &str = "webmaster@localhost";
const DEFAULT_SERVER_EMAIL: &str = "root@localhost";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid { key, value, reason } => {
                write!(f, "invalid value `{value}` for {key}: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Captcha provider keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptchaSettings {
    pub site_key: String,
    pub secret_key: String,
}

/// Outgoing mail addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    /// Sender for mail addressed to users.
    pub default_from_email: String,
    /// Sender for mail addressed to admins.
    pub server_email: String,
    /// Admin recipient addresses.
    pub admins: Vec<String>,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            default_from_email: DEFAULT_FROM_EMAIL.to_string(),
            server_email: DEFAULT_SERVER_EMAIL.to_string(),
            admins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub db_path: PathBuf,
    pub log_level: String,
    pub log_dir: PathBuf,
    /// Absolute site origin used to build links in mail and API resources.
    pub site_url: String,
    pub captcha: CaptchaSettings,
    pub mail: MailSettings,
    pub bind_addr: SocketAddr,
    pub registration_open: bool,
}

impl Settings {
    /// Loads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings through `lookup`; unset and blank keys use defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let log_dir = match get("LEOR_LOG_DIR") {
            Some(value) => {
                let path = PathBuf::from(&value);
                if !path.is_absolute() {
                    return Err(ConfigError::Invalid {
                        key: "LEOR_LOG_DIR",
                        value,
                        reason: "must be an absolute path".to_string(),
                    });
                }
                path
            }
            None => std::env::temp_dir().join("leornian-logs"),
        };

        let bind_addr_raw = get("LEOR_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr_raw
            .parse::<SocketAddr>()
            .map_err(|err| ConfigError::Invalid {
                key: "LEOR_BIND_ADDR",
                value: bind_addr_raw.clone(),
                reason: err.to_string(),
            })?;

        let registration_open = match get("LEOR_REG_OPEN") {
            Some(value) => parse_bool("LEOR_REG_OPEN", value)?,
            None => false,
        };

        let admins = match get("LEOR_ADMINS") {
            Some(value) => parse_admins(&value)?,
            None => Vec::new(),
        };

        Ok(Self {
            db_path: get("LEOR_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("leornian.sqlite3")),
            log_level: get("LEOR_LOG_LEVEL").unwrap_or_else(|| default_log_level().to_string()),
            log_dir,
            site_url: get("LEOR_SITE_URL")
                .unwrap_or_else(|| DEFAULT_SITE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            captcha: CaptchaSettings {
                site_key: get("LEOR_CAPTCHA_SITE_KEY").unwrap_or_default(),
                secret_key: get("LEOR_CAPTCHA_SECRET_KEY").unwrap_or_default(),
            },
            mail: MailSettings {
                default_from_email: get("LEOR_DEFAULT_FROM_EMAIL")
                    .unwrap_or_else(|| DEFAULT_FROM_EMAIL.to_string()),
                server_email: get("LEOR_SERVER_EMAIL")
                    .unwrap_or_else(|| DEFAULT_SERVER_EMAIL.to_string()),
                admins,
            },
            bind_addr,
            registration_open,
        })
    }

    /// Joins `path` onto the site origin.
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{path}", self.site_url)
    }
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value,
            reason: "expected a boolean".to_string(),
        }),
    }
}

/// Parses a comma-separated list of `addr` or `Name <addr>` entries.
fn parse_admins(value: &str) -> Result<Vec<String>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let address = match (entry.rfind('<'), entry.rfind('>')) {
                (Some(start), Some(end)) if start < end => entry[start + 1..end].trim(),
                _ => entry,
            };
            validate_email("LEOR_ADMINS", address).map_err(|err| ConfigError::Invalid {
                key: "LEOR_ADMINS",
                value: entry.to_string(),
                reason: err.message,
            })?;
            Ok(address.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, Settings};
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = settings_from(&[]).expect("defaults should load");
        assert_eq!(settings.site_url, "http://localhost:8000");
        assert_eq!(settings.bind_addr.port(), 8000);
        assert!(!settings.registration_open);
        assert!(settings.mail.admins.is_empty());
        assert!(settings.log_dir.is_absolute());
    }

    #[test]
    fn parses_admins_and_trims_site_url() {
        let settings = settings_from(&[
            ("LEOR_ADMINS", "Mary Admin <mary@example.com>, ops@example.com"),
            ("LEOR_SITE_URL", "https://leornian.example/"),
            ("LEOR_REG_OPEN", "True"),
        ])
        .expect("settings should load");
        assert_eq!(
            settings.mail.admins,
            vec!["mary@example.com".to_string(), "ops@example.com".to_string()]
        );
        assert_eq!(settings.site_url, "https://leornian.example");
        assert_eq!(
            settings.absolute_url("/ABC/"),
            "https://leornian.example/ABC/"
        );
        assert!(settings.registration_open);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(settings_from(&[("LEOR_BIND_ADDR", "nowhere")]).is_err());
        assert!(settings_from(&[("LEOR_REG_OPEN", "maybe")]).is_err());
        assert!(settings_from(&[("LEOR_LOG_DIR", "relative/logs")]).is_err());
        assert!(settings_from(&[("LEOR_ADMINS", "not-an-address")]).is_err());
    }
}
