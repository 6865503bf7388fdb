//! Configuration types, built from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::intake::flow::FlowConfig;
use crate::intake::model::Locale;
use crate::llm::{LlmBackend, LlmConfig};

/// Which conversation surface `/api/chat` exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceMode {
    /// Reply with `Echo: <message>`.
    Echo,
    /// Free-form LLM replies, no structured flow.
    Assistant,
    /// Structured branching intake questionnaire.
    Intake,
}

impl FromStr for ServiceMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "echo" => Ok(Self::Echo),
            "assistant" | "ai" => Ok(Self::Assistant),
            "intake" => Ok(Self::Intake),
            other => Err(ConfigError::InvalidValue {
                key: "INTAKE_MODE".to_string(),
                message: format!("unknown mode '{other}' (expected echo, assistant or intake)"),
            }),
        }
    }
}

impl std::fmt::Display for ServiceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Echo => write!(f, "echo"),
            Self::Assistant => write!(f, "assistant"),
            Self::Intake => write!(f, "intake"),
        }
    }
}

/// Admin credentials. The password is only ever held as a SHA-256 digest
/// or a secret string that is hashed before comparison.
#[derive(Debug, Clone)]
pub enum AdminPassword {
    Plain(SecretString),
    Sha256Hex(String),
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub username: String,
    pub password: AdminPassword,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub mode: ServiceMode,
    pub db_path: PathBuf,
    /// Sessions idle longer than this are evicted.
    pub session_ttl: Duration,
    pub sweep_interval: Duration,
    pub request_timeout: Duration,
    pub flow: FlowConfig,
    /// `None` disables the admin routes.
    pub admin: Option<AdminConfig>,
    /// `None` when no LLM key is configured; assistant mode then answers
    /// with the fallback reply.
    pub llm: Option<LlmConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            mode: ServiceMode::Intake,
            db_path: PathBuf::from("./data/intake.db"),
            session_ttl: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(15),
            flow: FlowConfig::default(),
            admin: None,
            llm: None,
        }
    }
}

impl ServiceConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Unset keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = parse_or(&lookup, "PORT", defaults.port)?;
        let mode = match lookup("INTAKE_MODE") {
            Some(v) => v.parse()?,
            None => defaults.mode,
        };
        let db_path = lookup("INTAKE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let session_ttl = Duration::from_secs(parse_or(
            &lookup,
            "INTAKE_SESSION_TTL_SECS",
            defaults.session_ttl.as_secs(),
        )?);
        let sweep_interval = Duration::from_secs(parse_or(
            &lookup,
            "INTAKE_SWEEP_INTERVAL_SECS",
            defaults.sweep_interval.as_secs(),
        )?);
        let request_timeout = Duration::from_secs(parse_or(
            &lookup,
            "INTAKE_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        )?);
        if sweep_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "INTAKE_SWEEP_INTERVAL_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let default_locale = match lookup("INTAKE_DEFAULT_LOCALE") {
            Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "INTAKE_DEFAULT_LOCALE".to_string(),
                message: format!("unknown locale '{v}' (expected en or ar)"),
            })?,
            None => Locale::En,
        };
        let flow = FlowConfig {
            default_locale,
            bilingual: parse_bool(&lookup, "INTAKE_BILINGUAL", defaults.flow.bilingual)?,
            extended_identity: parse_bool(
                &lookup,
                "INTAKE_EXTENDED_IDENTITY",
                defaults.flow.extended_identity,
            )?,
        };

        let admin = match lookup("ADMIN_USERNAME") {
            Some(username) if !username.trim().is_empty() => {
                let password = if let Some(hash) = lookup("ADMIN_PASSWORD_SHA256") {
                    AdminPassword::Sha256Hex(hash.trim().to_ascii_lowercase())
                } else if let Some(plain) = lookup("ADMIN_PASSWORD") {
                    AdminPassword::Plain(SecretString::from(plain))
                } else {
                    return Err(ConfigError::MissingEnvVar(
                        "ADMIN_PASSWORD or ADMIN_PASSWORD_SHA256".to_string(),
                    ));
                };
                Some(AdminConfig {
                    username: username.trim().to_string(),
                    password,
                })
            }
            _ => None,
        };

        let llm = match lookup("LLM_API_KEY") {
            Some(key) if !key.trim().is_empty() => {
                let backend = match lookup("LLM_BACKEND").as_deref().map(str::trim) {
                    None | Some("anthropic") => LlmBackend::Anthropic,
                    Some("openai") => LlmBackend::OpenAi,
                    Some(other) => {
                        return Err(ConfigError::InvalidValue {
                            key: "LLM_BACKEND".to_string(),
                            message: format!("unknown backend '{other}'"),
                        });
                    }
                };
                Some(LlmConfig {
                    backend,
                    api_key: SecretString::from(key),
                    model: lookup("LLM_MODEL")
                        .unwrap_or_else(|| backend.default_model().to_string()),
                })
            }
            _ => None,
        };

        Ok(Self {
            port,
            mode,
            db_path,
            session_ttl,
            sweep_interval,
            request_timeout,
            flow,
            admin,
            llm,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected a boolean, got '{v}'"),
            }),
        },
    }
}
