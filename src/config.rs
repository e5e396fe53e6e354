//! Agent configuration.
//!
//! Agents are configured with a whitespace-separated list of `key=value`
//! tokens, e.g. `alpha=0.1 load=weights.bin save=weights.bin seed=1234`.
//! The string is parsed once into an [`AgentConfig`]; numeric keys are
//! validated eagerly so a bad value fails at construction, not at first use.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::pattern::FeatureScheme;

/// Default TD learning rate.
pub const DEFAULT_ALPHA: f32 = 0.1;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A property was queried that was never set
    #[error("Missing configuration key: {0}")]
    MissingKey(String),

    /// A recognized key carried a value of the wrong shape
    #[error("Invalid value for '{key}': {value}")]
    InvalidValue {
        /// Offending key
        key: String,
        /// Raw value as given
        value: String,
    },
}

/// Typed agent configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentConfig {
    /// Display name
    pub name: String,
    /// Role in the match (`player` or `environment`)
    pub role: String,
    /// TD learning rate
    pub alpha: f32,
    /// Weight file read at construction
    pub load: Option<PathBuf>,
    /// Weight file written when the agent is persisted
    pub save: Option<PathBuf>,
    /// Weight initialization mode; any value allocates four empty tables
    pub init: Option<String>,
    /// RNG seed; `None` seeds from the OS
    pub seed: Option<u64>,
    /// Feature key scheme
    pub features: FeatureScheme,
    /// Alternative tuple layout (CSV)
    pub tuples: Option<PathBuf>,
    extra: BTreeMap<String, String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "unknown".to_string(),
            role: "unknown".to_string(),
            alpha: DEFAULT_ALPHA,
            load: None,
            save: None,
            init: None,
            seed: None,
            features: FeatureScheme::default(),
            tuples: None,
            extra: BTreeMap::new(),
        }
    }
}

impl AgentConfig {
    /// Parse a `key=value` argument string.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` if `alpha`, `seed` or `features` cannot
    /// be parsed.
    ///
    /// # Examples
    ///
    /// ```
    /// use tritile::config::AgentConfig;
    ///
    /// let config = AgentConfig::parse("alpha=0.05 seed=7 note=x").unwrap();
    /// assert_eq!(config.alpha, 0.05);
    /// assert_eq!(config.seed, Some(7));
    /// assert_eq!(config.property("note").unwrap(), "x");
    /// ```
    pub fn parse(args: &str) -> Result<Self, ConfigError> {
        Self::with_defaults("", args)
    }

    /// Parse `defaults` followed by `args`; later tokens override earlier ones.
    pub fn with_defaults(defaults: &str, args: &str) -> Result<Self, ConfigError> {
        let mut raw = BTreeMap::new();
        for token in defaults.split_whitespace().chain(args.split_whitespace()) {
            let (key, value) = token.split_once('=').unwrap_or((token, ""));
            raw.insert(key.to_string(), value.to_string());
        }

        let mut config = AgentConfig::default();
        for (key, value) in raw {
            match key.as_str() {
                "name" => config.name = value,
                "role" => config.role = value,
                "alpha" => config.alpha = parse_value(&key, &value)?,
                "load" => config.load = Some(PathBuf::from(value)),
                "save" => config.save = Some(PathBuf::from(value)),
                "init" => config.init = Some(value),
                "seed" => config.seed = Some(parse_seed(&key, &value)?),
                "features" => {
                    config.features = value.parse().map_err(|_| ConfigError::InvalidValue {
                        key: key.clone(),
                        value: value.clone(),
                    })?
                }
                "tuples" => config.tuples = Some(PathBuf::from(value)),
                _ => {
                    config.extra.insert(key, value);
                }
            }
        }
        Ok(config)
    }

    /// Raw string value of any key, recognized or not.
    ///
    /// # Errors
    ///
    /// `ConfigError::MissingKey` if the key was never set.
    pub fn property(&self, key: &str) -> Result<String, ConfigError> {
        let value = match key {
            "name" => Some(self.name.clone()),
            "role" => Some(self.role.clone()),
            "alpha" => Some(self.alpha.to_string()),
            "load" => self.load.as_ref().map(|p| p.display().to_string()),
            "save" => self.save.as_ref().map(|p| p.display().to_string()),
            "init" => self.init.clone(),
            "seed" => self.seed.map(|s| s.to_string()),
            "features" => Some(self.features.to_string()),
            "tuples" => self.tuples.as_ref().map(|p| p.display().to_string()),
            other => self.extra.get(other).cloned(),
        };
        value.ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    /// Set a key after construction, with the same parsing as [`AgentConfig::parse`].
    pub fn notify(&mut self, message: &str) -> Result<(), ConfigError> {
        let mut merged = Self::parse(message)?;
        let (key, _) = message.split_once('=').unwrap_or((message, ""));
        match key {
            "name" => self.name = merged.name,
            "role" => self.role = merged.role,
            "alpha" => self.alpha = merged.alpha,
            "load" => self.load = merged.load,
            "save" => self.save = merged.save,
            "init" => self.init = merged.init,
            "seed" => self.seed = merged.seed,
            "features" => self.features = merged.features,
            "tuples" => self.tuples = merged.tuples,
            _ => self.extra.append(&mut merged.extra),
        }
        Ok(())
    }
}

fn parse_value(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Seeds are accepted as integers or, for compatibility with older
/// command lines, as decimal numbers truncated toward zero.
fn parse_seed(key: &str, value: &str) -> Result<u64, ConfigError> {
    if let Ok(seed) = value.parse::<u64>() {
        return Ok(seed);
    }
    match value.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 => Ok(f as u64),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
