//! Configuration loading.
//!
//! Values come from an optional TOML file (`config/tasklinx.toml` or
//! `--config`) and the process environment (after `.env` is loaded);
//! environment variables win.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use tasklinx_adapters::calendar::CALENDAR_BASE_URL;
use tasklinx_adapters::gmail::GMAIL_BASE_URL;
use tasklinx_auth::{GoogleEndpoints, GoogleOAuthSettings};
use tasklinx_llm::LlmClientConfig;
use tasklinx_llm::client::OPENAI_BASE_URL;
use tasklinx_web::WebConfig;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config/tasklinx.toml";

/// Keys the service cannot start without.
pub const REQUIRED_KEYS: [&str; 4] = [
    "GOOGLE_CLIENT_ID",
    "GOOGLE_CLIENT_SECRET",
    "OPENAI_API_KEY",
    "SECRET_KEY",
];

/// Keys with defaults.
pub const OPTIONAL_KEYS: [&str; 6] = [
    "FRONTEND_URL",
    "OPENAI_MODEL",
    "OPENAI_BASE_URL",
    "TASKLINX_DATA_DIR",
    "TASKLINX_BIND",
    "TASKLINX_PORT",
];

const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const DEFAULT_MODEL: &str = "gpt-4";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_BIND: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;

// ---------------------------------------------------------------------------
// File layout
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub llm: LlmSection,
    pub google: GoogleSection,
    pub storage: StorageSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub frontend_url: Option<String>,
    pub secret_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmSection {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GoogleSection {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub auth_url: Option<String>,
    pub token_url: Option<String>,
    pub userinfo_url: Option<String>,
    pub gmail_base_url: Option<String>,
    pub calendar_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    pub data_dir: Option<PathBuf>,
}

impl FileConfig {
    /// The file value for an environment key name.
    fn value_for(&self, key: &str) -> Option<String> {
        match key {
            "GOOGLE_CLIENT_ID" => self.google.client_id.clone(),
            "GOOGLE_CLIENT_SECRET" => self.google.client_secret.clone(),
            "OPENAI_API_KEY" => self.llm.api_key.clone(),
            "SECRET_KEY" => self.server.secret_key.clone(),
            "FRONTEND_URL" => self.server.frontend_url.clone(),
            "OPENAI_MODEL" => self.llm.model.clone(),
            "OPENAI_BASE_URL" => self.llm.base_url.clone(),
            "TASKLINX_DATA_DIR" => self
                .storage
                .data_dir
                .as_ref()
                .map(|p| p.display().to_string()),
            "TASKLINX_BIND" => self.server.bind.clone(),
            "TASKLINX_PORT" => self.server.port.map(|p| p.to_string()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// The file and environment values before validation.
#[derive(Debug, Default)]
pub struct Sources {
    pub file: FileConfig,
    pub file_path: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl Sources {
    /// Load `.env`, read the config file and snapshot the environment.
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn gather(path: Option<&Path>) -> Result<Self> {
        if let Ok(dotenv) = dotenvy::dotenv() {
            tracing::debug!(path = %dotenv.display(), "loaded .env");
        }

        let (file, file_path) = match path {
            Some(p) => (read_file(p)?, Some(p.to_path_buf())),
            None => {
                let p = Path::new(DEFAULT_CONFIG_PATH);
                if p.exists() {
                    (read_file(p)?, Some(p.to_path_buf()))
                } else {
                    (FileConfig::default(), None)
                }
            }
        };

        let env = REQUIRED_KEYS
            .iter()
            .chain(OPTIONAL_KEYS.iter())
            .filter_map(|k| std::env::var(k).ok().map(|v| (k.to_string(), v)))
            .collect();

        Ok(Self {
            file,
            file_path,
            env,
        })
    }

    /// Environment first, then file. Blank values count as unset.
    pub fn get(&self, key: &str) -> Option<String> {
        self.env
            .get(key)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.file.value_for(key))
            .filter(|v| !v.trim().is_empty())
    }

    /// Whether each known key is set, without revealing values.
    pub fn report(&self) -> Vec<(&'static str, bool)> {
        REQUIRED_KEYS
            .iter()
            .chain(OPTIONAL_KEYS.iter())
            .map(|k| (*k, self.get(k).is_some()))
            .collect()
    }

    /// Directory holding `tasklinx.db`.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(
            self.get("TASKLINX_DATA_DIR")
                .unwrap_or_else(|| DEFAULT_DATA_DIR.into()),
        )
    }

    /// Validate and produce the runtime configuration.
    ///
    /// Every missing required key is named in the error.
    pub fn resolve(&self) -> Result<Config> {
        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|k| self.get(k).is_none())
            .collect();
        if !missing.is_empty() {
            bail!("missing required configuration: {}", missing.join(", "));
        }
        let required = |key: &str| self.get(key).unwrap_or_default();

        let port = match self.get("TASKLINX_PORT") {
            Some(p) => p
                .trim()
                .parse::<u16>()
                .with_context(|| format!("TASKLINX_PORT is not a valid port: {p}"))?,
            None => DEFAULT_PORT,
        };
        let frontend_url = self
            .get("FRONTEND_URL")
            .unwrap_or_else(|| DEFAULT_FRONTEND_URL.into())
            .trim_end_matches('/')
            .to_string();

        let google = &self.file.google;
        let defaults = GoogleEndpoints::default();
        let endpoints = GoogleEndpoints {
            auth_url: google.auth_url.clone().unwrap_or(defaults.auth_url),
            token_url: google.token_url.clone().unwrap_or(defaults.token_url),
            userinfo_url: google.userinfo_url.clone().unwrap_or(defaults.userinfo_url),
        };

        Ok(Config {
            web: WebConfig {
                bind_addr: self.get("TASKLINX_BIND").unwrap_or_else(|| DEFAULT_BIND.into()),
                port,
                frontend_url: frontend_url.clone(),
            },
            data_dir: self.data_dir(),
            secret_key: required("SECRET_KEY"),
            google: GoogleOAuthSettings {
                client_id: required("GOOGLE_CLIENT_ID"),
                client_secret: required("GOOGLE_CLIENT_SECRET"),
                redirect_uri: format!("{frontend_url}/auth/callback"),
                endpoints,
            },
            gmail_base_url: google
                .gmail_base_url
                .clone()
                .unwrap_or_else(|| GMAIL_BASE_URL.into()),
            calendar_base_url: google
                .calendar_base_url
                .clone()
                .unwrap_or_else(|| CALENDAR_BASE_URL.into()),
            llm: LlmClientConfig::openai_compatible(
                required("OPENAI_API_KEY"),
                self.get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
                self.get("OPENAI_BASE_URL")
                    .unwrap_or_else(|| OPENAI_BASE_URL.into()),
            ),
        })
    }
}

fn read_file(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("invalid config file {}", path.display()))
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Everything the service needs at startup.
pub struct Config {
    pub web: WebConfig,
    pub data_dir: PathBuf,
    pub secret_key: String,
    pub google: GoogleOAuthSettings,
    pub gmail_base_url: String,
    pub calendar_base_url: String,
    pub llm: LlmClientConfig,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Sources::gather(path)?.resolve()
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("tasklinx.db")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
