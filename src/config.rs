//! User configuration
//!
//! Stored as JSON under the platform config directory
//! (`~/.config/drugmatch/config.json` on Linux). Missing fields take their
//! defaults, so older files keep loading.
//!
//! Service keys resolve in this order: environment variable, then the stored
//! value. `Settings` is the validated view the pipeline runs on; durations are
//! converted and counts clamped to at least one.

use crate::error::{DrugMatchError, Result};
use drugmatch_common::LocalNameDictionary;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const SERVICE_KEY_ENV: &str = "MFDS_SERVICE_KEY";
pub const OPENFDA_KEY_ENV: &str = "OPENFDA_API_KEY";

const OPENFDA_BASE_URL: &str = "https://api.fda.gov/drug";
const MFDS_DETAIL_URL: &str =
    "https://apis.data.go.kr/1471000/DrugPrdtPrmsnInfoService06/getDrugPrdtPrmsnDtlInq05";
const MFDS_LIST_URL: &str =
    "https://apis.data.go.kr/1471000/DrbEasyDrugInfoService/getDrbEasyDrugList";

/// Persisted user configuration (~/.config/drugmatch/config.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mfds_service_key: Option<String>,
    pub openfda_api_key: Option<String>,
    pub openfda_base_url: String,
    pub mfds_detail_url: String,
    pub mfds_list_url: String,
    pub timeout_seconds: u64,
    pub enrich_batch_size: usize,
    pub enrich_batch_delay_ms: u64,
    pub endpoint_delay_ms: u64,
    pub row_delay_ms: u64,
    pub fallback_delay_ms: u64,
    pub retry_attempts: u32,
    pub openfda_backoff_ms: u64,
    pub mfds_backoff_ms: u64,
    pub page_size: u32,
    pub max_pages: u32,
    /// Optional dictionary overlay merged over the built-in table
    pub dictionary_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mfds_service_key: None,
            openfda_api_key: None,
            openfda_base_url: OPENFDA_BASE_URL.into(),
            mfds_detail_url: MFDS_DETAIL_URL.into(),
            mfds_list_url: MFDS_LIST_URL.into(),
            timeout_seconds: 10,
            enrich_batch_size: 5,
            enrich_batch_delay_ms: 500,
            endpoint_delay_ms: 200,
            row_delay_ms: 50,
            fallback_delay_ms: 300,
            retry_attempts: 3,
            openfda_backoff_ms: 800,
            mfds_backoff_ms: 1000,
            page_size: 100,
            max_pages: 10,
            dictionary_path: None,
        }
    }
}

/// Runtime knobs handed to the registry clients and the pipeline
#[derive(Debug, Clone)]
pub struct Settings {
    pub openfda_base_url: String,
    pub openfda_api_key: Option<String>,
    pub mfds_detail_url: String,
    pub mfds_list_url: String,
    pub mfds_service_key: String,
    pub timeout: Duration,
    pub enrich_batch_size: usize,
    pub enrich_batch_delay: Duration,
    pub endpoint_delay: Duration,
    pub row_delay: Duration,
    pub fallback_delay: Duration,
    pub retry_attempts: u32,
    pub openfda_backoff: Duration,
    pub mfds_backoff: Duration,
    pub page_size: u32,
    pub max_pages: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Config::default().settings_with_key(String::new())
    }
}

impl Settings {
    /// Same endpoints and limits with every pause set to zero.
    pub fn without_delays(self) -> Self {
        Self {
            enrich_batch_delay: Duration::ZERO,
            endpoint_delay: Duration::ZERO,
            row_delay: Duration::ZERO,
            fallback_delay: Duration::ZERO,
            openfda_backoff: Duration::ZERO,
            mfds_backoff: Duration::ZERO,
            ..self
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .ok_or_else(|| DrugMatchError::Config("Home directory not found".into()))?;
        Ok(config_dir.join("drugmatch").join("config.json"))
    }

    /// Service key for the domestic registry (environment wins over the file)
    pub fn get_service_key(&self) -> Result<String> {
        if let Ok(key) = std::env::var(SERVICE_KEY_ENV) {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }

        self.mfds_service_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(DrugMatchError::MissingServiceKey)
    }

    pub fn get_openfda_key(&self) -> Option<String> {
        std::env::var(OPENFDA_KEY_ENV)
            .ok()
            .or_else(|| self.openfda_api_key.clone())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn set_service_key(&mut self, key: String) -> Result<()> {
        self.mfds_service_key = Some(key);
        self.save()
    }

    pub fn set_openfda_key(&mut self, key: String) -> Result<()> {
        self.openfda_api_key = Some(key);
        self.save()
    }

    /// Built-in dictionary plus the configured overlay, if any
    pub fn load_dictionary(&self) -> Result<LocalNameDictionary> {
        match &self.dictionary_path {
            Some(path) if path.exists() => Ok(LocalNameDictionary::from_file(path)?),
            Some(path) => Err(DrugMatchError::FileNotFound(path.display().to_string())),
            None => Ok(LocalNameDictionary::builtin()),
        }
    }

    /// Runtime settings; fails when no service key is available.
    pub fn settings(&self) -> Result<Settings> {
        let key = self.get_service_key()?;
        Ok(self.settings_with_key(key))
    }

    fn settings_with_key(&self, mfds_service_key: String) -> Settings {
        Settings {
            openfda_base_url: self.openfda_base_url.clone(),
            openfda_api_key: self.get_openfda_key(),
            mfds_detail_url: self.mfds_detail_url.clone(),
            mfds_list_url: self.mfds_list_url.clone(),
            mfds_service_key,
            timeout: Duration::from_secs(self.timeout_seconds.max(1)),
            enrich_batch_size: self.enrich_batch_size.max(1),
            enrich_batch_delay: Duration::from_millis(self.enrich_batch_delay_ms),
            endpoint_delay: Duration::from_millis(self.endpoint_delay_ms),
            row_delay: Duration::from_millis(self.row_delay_ms),
            fallback_delay: Duration::from_millis(self.fallback_delay_ms),
            retry_attempts: self.retry_attempts.max(1),
            openfda_backoff: Duration::from_millis(self.openfda_backoff_ms),
            mfds_backoff: Duration::from_millis(self.mfds_backoff_ms),
            page_size: self.page_size.max(1),
            max_pages: self.max_pages.max(1),
        }
    }
}
