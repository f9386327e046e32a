//! # Channel Configuration
//!
//! Loaded once at startup, usually as a section of the host's TOML file:
//!
//! ```toml
//! initial_capacity = 256
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{EventError, EventResult};

/// Default number of event slots pre-allocated per sequence.
pub const DEFAULT_INITIAL_CAPACITY: usize = 128;

/// Configuration shared by every channel created from it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelConfig {
    /// Slots pre-allocated for each of the four sequences of a channel.
    pub initial_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

impl ChannelConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// Missing keys take their default value.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidConfig`] if the text is not valid TOML,
    /// contains unknown keys, or fails [`validate`](Self::validate).
    pub fn from_toml_str(text: &str) -> EventResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| EventError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidConfig`] if `initial_capacity` is zero.
    pub fn validate(&self) -> EventResult<()> {
        if self.initial_capacity == 0 {
            return Err(EventError::InvalidConfig(
                "initial_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(ChannelConfig::default().initial_capacity, 128);
    }

    #[test]
    fn test_parse_toml() {
        let config = ChannelConfig::from_toml_str("initial_capacity = 512").unwrap();
        assert_eq!(config.initial_capacity, 512);

        let config = ChannelConfig::from_toml_str("").unwrap();
        assert_eq!(config, ChannelConfig::default());
    }

    #[test]
    fn test_rejects_zero_and_unknown_keys() {
        assert!(matches!(
            ChannelConfig::from_toml_str("initial_capacity = 0"),
            Err(EventError::InvalidConfig(_))
        ));
        assert!(ChannelConfig::from_toml_str("capacity = 4").is_err());
    }
}
