//! Settings, client and widget configuration

use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Language the simplification step assumes as its baseline
pub const PIVOT_LANGUAGE: &str = "en";

pub const DEFAULT_CLOUD_API_BASE: &str = "http://localhost:8000";
pub const DEFAULT_LOCAL_ENDPOINT: &str
  = "http://localhost:11434/api/generate";
pub const DEFAULT_LOCAL_MODEL: &str = "gemma:4b";

/// Which LLM integration a trigger talks to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig
{   /// Hosted simplification service, authenticated by key
    Cloud
    {   #[serde(default = "default_api_base")]
        api_base: String
      , #[serde(default)]
        api_key: String
    }
  , /// Local model server
    Local
    {   #[serde(default = "default_local_endpoint")]
        endpoint: String
      , #[serde(default = "default_local_model")]
        model: String
    }
}

fn default_api_base() -> String
{   DEFAULT_CLOUD_API_BASE.to_string()
}

fn default_local_endpoint() -> String
{   DEFAULT_LOCAL_ENDPOINT.to_string()
}

fn default_local_model() -> String
{   DEFAULT_LOCAL_MODEL.to_string()
}

impl BackendConfig
{   /// Cloud backend at the default address
    pub fn cloud(api_key: impl Into<String>) -> Self
    {   BackendConfig::Cloud
        {   api_base: default_api_base()
          , api_key: api_key.into()
        }
    }

    /// Local backend with the default model
    pub fn local(endpoint: impl Into<String>) -> Self
    {   BackendConfig::Local
        {   endpoint: endpoint.into()
          , model: default_local_model()
        }
    }

    /// Fails when a required credential or endpoint is absent
    pub fn validate(&self) -> Result<(), crate::error::Error>
    {   match self
        {   BackendConfig::Cloud { api_base, api_key } => {
              if api_key.trim().is_empty()
              {   return Err(crate::error::Error::MissingConfiguration(
                    "API key not set".to_string()
                  ));
              }
              if api_base.trim().is_empty()
              {   return Err(crate::error::Error::MissingConfiguration(
                    "API base URL not set".to_string()
                  ));
              }
              Ok(())
            }
          , BackendConfig::Local { endpoint, model } => {
              if endpoint.trim().is_empty()
              {   return Err(crate::error::Error::MissingConfiguration(
                    "Local model endpoint not set".to_string()
                  ));
              }
              if model.trim().is_empty()
              {   return Err(crate::error::Error::MissingConfiguration(
                    "Local model name not set".to_string()
                  ));
              }
              Ok(())
            }
        }
    }

    pub fn is_local(&self) -> bool
    {   matches!(self, BackendConfig::Local { .. })
    }
}

/// User settings, snapshotted once per trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings
{   /// Preferred output language (ISO 639-1)
    #[serde(default = "default_language")]
    pub default_language: String
  , #[serde(default = "default_backend")]
    pub backend: BackendConfig
}

fn default_language() -> String
{   PIVOT_LANGUAGE.to_string()
}

fn default_backend() -> BackendConfig
{   BackendConfig::cloud("")
}

impl Default for Settings
{   fn default() -> Self
    {   Settings
        {   default_language: default_language()
          , backend: default_backend()
        }
    }
}

/// LLM client transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig
{   /// Request timeout in seconds
    pub timeout_secs: u64
  , /// Sampling temperature for the local backend
    pub temperature: f32
  , /// Response length limit for the local backend
    pub num_predict: u32
}

impl ClientConfig
{   pub fn timeout(&self) -> Duration
    {   Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ClientConfig
{   fn default() -> Self
    {   ClientConfig
        {   timeout_secs: 60
          , temperature: 0.3
          , num_predict: 200
        }
    }
}

/// Floating widget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig
{   /// Seconds without interaction before the widget is removed
    pub inactivity_timeout_secs: u64
}

impl WidgetConfig
{   pub fn inactivity_timeout(&self) -> Duration
    {   Duration::from_secs(self.inactivity_timeout_secs)
    }
}

impl Default for WidgetConfig
{   fn default() -> Self
    {   WidgetConfig
        {   inactivity_timeout_secs: 30
        }
    }
}

/// Settings source: optional JSON file plus change notification.
/// Every save replaces the settings wholesale; readers take a
/// snapshot per trigger.
pub struct SettingsStore
{   path: Option<PathBuf>
  , tx: watch::Sender<Settings>
}

impl SettingsStore
{   /// In-memory store, nothing persisted
    pub fn new(settings: Settings) -> Self
    {   let (tx, _rx) = watch::channel(settings);
        SettingsStore
        {   path: None
          , tx
        }
    }

    /// Load from a JSON file; a missing file yields defaults
    pub fn load(path: impl Into<PathBuf>)
      -> Result<Self, crate::error::Error>
    {   let path = path.into();
        let settings = if path.exists()
        {   let text = std::fs::read_to_string(&path)?;
            let settings: Settings = serde_json::from_str(&text)?;
            info!("Loaded settings from {}", path.display());
            settings
        } else
        {   warn!(
              "Settings file {} not found, using defaults",
              path.display()
            );
            Settings::default()
        };
        let (tx, _rx) = watch::channel(settings);
        Ok(SettingsStore
        {   path: Some(path)
          , tx
        })
    }

    /// Current settings, cloned
    pub fn snapshot(&self) -> Settings
    {   self.tx.borrow().clone()
    }

    /// Receiver that observes every later save
    pub fn subscribe(&self) -> watch::Receiver<Settings>
    {   self.tx.subscribe()
    }

    /// Replace the settings, notify listeners, then persist when
    /// file-backed. A failed write leaves the new value in effect.
    pub async fn save(&self, settings: Settings)
      -> Result<(), crate::error::Error>
    {   debug!(
          "Settings updated: language={}, local={}",
          settings.default_language,
          settings.backend.is_local()
        );
        let text = serde_json::to_string_pretty(&settings)?;
        self.tx.send_replace(settings);
        if let Some(path) = &self.path
        {   tokio::fs::write(path, text).await?;
            debug!("Settings written to {}", path.display());
        }
        Ok(())
    }
}
