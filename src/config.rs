//! Game configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config and
//! a file only needs to name what it overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::dice::{Blink, Rgb};

/// Hard upper bound on local players.
pub const MAX_PLAYERS: usize = 4;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Tunables for one game session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GameConfig {
    /// Rerolls allowed after the initial roll.
    #[serde(default = "default_max_rerolls")]
    pub max_rerolls: u8,

    /// Quiet period after a roll completes before stable events may start a
    /// reroll. Dice still settling report spurious stable faces.
    #[serde(default = "default_reroll_cooldown_ms")]
    pub reroll_cooldown_ms: u64,

    /// How often dice still owed a roll are blinked.
    #[serde(default = "default_led_flash_interval_ms")]
    pub led_flash_interval_ms: u64,

    /// Toggle period for the missing-die slot display.
    #[serde(default = "default_missing_blink_interval_ms")]
    pub missing_blink_interval_ms: u64,

    #[serde(default = "default_owed_roll_led_color")]
    pub owed_roll_led_color: u32,

    #[serde(default = "default_owed_roll_led_on_ms")]
    pub owed_roll_led_on_ms: u32,

    #[serde(default = "default_owed_roll_led_off_ms")]
    pub owed_roll_led_off_ms: u32,

    #[serde(default = "default_max_players")]
    pub max_players: usize,
}

fn default_max_rerolls() -> u8 {
    2
}

fn default_reroll_cooldown_ms() -> u64 {
    1500
}

fn default_led_flash_interval_ms() -> u64 {
    2200
}

fn default_missing_blink_interval_ms() -> u64 {
    550
}

fn default_owed_roll_led_color() -> u32 {
    0xFFE300
}

fn default_owed_roll_led_on_ms() -> u32 {
    120
}

fn default_owed_roll_led_off_ms() -> u32 {
    120
}

fn default_max_players() -> usize {
    MAX_PLAYERS
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_rerolls: default_max_rerolls(),
            reroll_cooldown_ms: default_reroll_cooldown_ms(),
            led_flash_interval_ms: default_led_flash_interval_ms(),
            missing_blink_interval_ms: default_missing_blink_interval_ms(),
            owed_roll_led_color: default_owed_roll_led_color(),
            owed_roll_led_on_ms: default_owed_roll_led_on_ms(),
            owed_roll_led_off_ms: default_owed_roll_led_off_ms(),
            max_players: default_max_players(),
        }
    }
}

impl GameConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_players == 0 || self.max_players > MAX_PLAYERS {
            return Err(ConfigError::Invalid(format!(
                "max_players must be 1..={MAX_PLAYERS}, got {}",
                self.max_players
            )));
        }
        if self.max_rerolls == 0 {
            return Err(ConfigError::Invalid("max_rerolls must be at least 1".into()));
        }
        if self.led_flash_interval_ms == 0 || self.missing_blink_interval_ms == 0 {
            return Err(ConfigError::Invalid("timer intervals must be non-zero".into()));
        }
        Ok(())
    }

    pub fn reroll_cooldown(&self) -> Duration {
        Duration::from_millis(self.reroll_cooldown_ms)
    }

    pub fn led_flash_interval(&self) -> Duration {
        Duration::from_millis(self.led_flash_interval_ms)
    }

    pub fn missing_blink_interval(&self) -> Duration {
        Duration::from_millis(self.missing_blink_interval_ms)
    }

    /// Single blink sent to each die still owed a roll.
    pub fn owed_roll_blink(&self) -> Blink {
        Blink {
            color: Rgb(self.owed_roll_led_color),
            on_ms: self.owed_roll_led_on_ms,
            off_ms: self.owed_roll_led_off_ms,
            count: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = GameConfig::from_json_str("{}").unwrap();
        assert_eq!(config, GameConfig::default());
        assert_eq!(config.max_rerolls, 2);
        assert_eq!(config.reroll_cooldown(), Duration::from_millis(1500));
    }

    #[test]
    fn test_partial_override() {
        let config =
            GameConfig::from_json_str(r#"{"max_rerolls": 3, "reroll_cooldown_ms": 0}"#).unwrap();
        assert_eq!(config.max_rerolls, 3);
        assert_eq!(config.reroll_cooldown(), Duration::ZERO);
        assert_eq!(config.max_players, MAX_PLAYERS);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            GameConfig::from_json_str(r#"{"max_players": 5}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GameConfig::from_json_str(r#"{"max_rerolls": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GameConfig::from_json_str("not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = GameConfig::load("/definitely/not/here.json");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_owed_roll_blink() {
        let blink = GameConfig::default().owed_roll_blink();
        assert_eq!(blink.color, Rgb(0xFFE300));
        assert_eq!(blink.count, 1);
        assert_eq!(blink.on_ms, 120);
    }
}
