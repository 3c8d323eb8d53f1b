// src/config.rs

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "google-ads.yaml";
pub const DEFAULT_API_VERSION: &str = "v17";
pub const DEFAULT_ENDPOINT: &str = "https://googleads.googleapis.com/";
const ENV_PREFIX: &str = "GOOGLE_ADS_";

/// Connection settings, read from `google-ads.yaml` and `GOOGLE_ADS_*` env vars.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AdsConfig {
    #[serde(default)]
    pub developer_token: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub login_customer_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub initial_backoff_ms: u64,
}

/// How requests get their bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    AccessToken(String),
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}
fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    500
}

// yaml files carry the id as either `123-456-7890` or a bare number
fn de_opt_id<'de, D>(d: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Num(u64),
    }
    Ok(Option::<Raw>::deserialize(d)?.map(|r| match r {
        Raw::Text(s) => normalize_customer_id(&s),
        Raw::Num(n) => n.to_string(),
    }))
}

/// `123-456-7890` → `1234567890`
pub fn normalize_customer_id(id: &str) -> String {
    id.trim().replace('-', "")
}

impl Default for AdsConfig {
    fn default() -> Self {
        Self {
            developer_token: String::new(),
            login_customer_id: None,
            client_id: None,
            client_secret: None,
            refresh_token: None,
            access_token: None,
            api_version: default_api_version(),
            endpoint: default_endpoint(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_backoff_ms(),
        }
    }
}

impl AdsConfig {
    /// Load from `path`, or from `./google-ads.yaml` / `$HOME/google-ads.yaml`
    /// when no path is given. Env vars win over file values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_locations().into_iter().find(|p| p.is_file()),
        };
        let mut cfg = match file {
            Some(p) => {
                debug!(path = %p.display(), "reading config");
                Self::from_yaml_file(&p)?
            }
            None => Self::default(),
        };
        cfg.apply_env(|key| env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Override fields from `GOOGLE_ADS_<FIELD>` variables as seen by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |field: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, field.to_uppercase())).filter(|v| !v.is_empty())
        };
        if let Some(v) = get("developer_token") {
            self.developer_token = v;
        }
        if let Some(v) = get("login_customer_id") {
            self.login_customer_id = Some(normalize_customer_id(&v));
        }
        if let Some(v) = get("client_id") {
            self.client_id = Some(v);
        }
        if let Some(v) = get("client_secret") {
            self.client_secret = Some(v);
        }
        if let Some(v) = get("refresh_token") {
            self.refresh_token = Some(v);
        }
        if let Some(v) = get("access_token") {
            self.access_token = Some(v);
        }
        if let Some(v) = get("api_version") {
            self.api_version = v;
        }
        if let Some(v) = get("endpoint") {
            self.endpoint = v;
        }
        if let Some(v) = get("max_retries") {
            self.max_retries = v
                .trim()
                .parse::<u32>()
                .with_context(|| format!("{}MAX_RETRIES={} is not a number", ENV_PREFIX, v))?;
        }
        if let Some(v) = get("initial_backoff_ms") {
            self.initial_backoff_ms = v.trim().parse::<u64>().with_context(|| {
                format!("{}INITIAL_BACKOFF_MS={} is not a number", ENV_PREFIX, v)
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.developer_token.is_empty() {
            bail!("developer_token is required");
        }
        self.auth().map(|_| ())
    }

    pub fn auth(&self) -> Result<Auth> {
        if let Some(token) = &self.access_token {
            return Ok(Auth::AccessToken(token.clone()));
        }
        match (&self.client_id, &self.client_secret, &self.refresh_token) {
            (Some(id), Some(secret), Some(refresh)) => Ok(Auth::RefreshToken {
                client_id: id.clone(),
                client_secret: secret.clone(),
                refresh_token: refresh.clone(),
            }),
            _ => bail!("either access_token or client_id, client_secret and refresh_token are required"),
        }
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];
    if let Some(home) = env::var_os("HOME") {
        paths.push(PathBuf::from(home).join(DEFAULT_CONFIG_FILE));
    }
    paths
}
