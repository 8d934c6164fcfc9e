//! Device configuration

use serde::Deserialize;
use std::collections::HashMap;

use crate::io::{WriteMode, DEFAULT_CAPACITY, MAX_CAPACITY};

/// Errors produced while building a `DeviceConfig`
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("initial capacity {initial} outside 1..={max}")]
    CapacityOutOfBounds { initial: usize, max: usize },

    #[error("max capacity {0} outside 1..=8192")]
    MaxCapacityOutOfBounds(usize),

    #[error("failed to read config: {0}")]
    Read(String),

    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Startup parameters of a `Device`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Name used in log output
    pub name: String,
    /// Capacity allocated at startup
    pub initial_capacity: usize,
    /// Ceiling for `set_buffer_size`
    pub max_capacity: usize,
    /// Write mode at startup
    pub mode: WriteMode,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "chardeviceEnhanced".to_string(),
            initial_capacity: DEFAULT_CAPACITY,
            max_capacity: MAX_CAPACITY,
            mode: WriteMode::Overwrite,
        }
    }
}

impl DeviceConfig {
    /// Create a new configuration with custom name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the capacity allocated at startup
    #[must_use]
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Set the resize ceiling
    #[must_use]
    pub fn with_max_capacity(mut self, capacity: usize) -> Self {
        self.max_capacity = capacity;
        self
    }

    /// Set the startup write mode
    #[must_use]
    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Check the capacities against each other and the hard ceiling
    ///
    /// # Errors
    /// Returns the first violated bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_capacity == 0 || self.max_capacity > MAX_CAPACITY {
            return Err(ConfigError::MaxCapacityOutOfBounds(self.max_capacity));
        }
        if self.initial_capacity == 0 || self.initial_capacity > self.max_capacity {
            return Err(ConfigError::CapacityOutOfBounds {
                initial: self.initial_capacity,
                max: self.max_capacity,
            });
        }
        Ok(())
    }

    /// Build from `DEVBUF_*` environment variables, defaults for unset ones
    ///
    /// # Errors
    /// `InvalidValue` for unparsable values, or a validation error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().filter(|(k, _)| k.starts_with("DEVBUF_")))
    }

    /// Build from explicit `(key, value)` pairs using the `DEVBUF_*` names
    ///
    /// # Errors
    /// Same as [`DeviceConfig::from_env`].
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let mut config = Self::default();
        if let Some(name) = vars.get("DEVBUF_NAME") {
            config.name.clone_from(name);
        }
        if let Some(value) = vars.get("DEVBUF_CAPACITY") {
            config.initial_capacity = parse_size("DEVBUF_CAPACITY", value)?;
        }
        if let Some(value) = vars.get("DEVBUF_MAX_CAPACITY") {
            config.max_capacity = parse_size("DEVBUF_MAX_CAPACITY", value)?;
        }
        if let Some(value) = vars.get("DEVBUF_MODE") {
            config.mode = parse_mode(value)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON object; missing fields take their defaults
    ///
    /// # Errors
    /// `Read` on I/O failure, `Json` on malformed input, or a validation error.
    pub fn from_json_reader(mut reader: impl std::io::Read) -> Result<Self, ConfigError> {
        let mut buffer = Vec::new();
        reader
            .read_to_end(&mut buffer)
            .map_err(|e| ConfigError::Read(e.to_string()))?;
        let config: Self = serde_json::from_slice(&buffer)?;
        config.validate()?;
        Ok(config)
    }
}

fn parse_size(key: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}

fn parse_mode(value: &str) -> Result<WriteMode, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "overwrite" => Ok(WriteMode::Overwrite),
        "append" => Ok(WriteMode::Append),
        _ => Err(ConfigError::InvalidValue {
            key: "DEVBUF_MODE".to_string(),
            value: value.to_string(),
        }),
    }
}
