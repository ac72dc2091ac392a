//! Playback settings, loaded from YAML.
//!
//! ```yaml
//! lookahead: 4.0        # seconds a note is visible before it sounds
//! velocity: 100
//! register-low: 36      # playable window for performer parts
//! register-high: 60
//! default-tempo: 80     # used when the score has no tempo marking
//! tempo-step: 4         # BPM added or removed per tempo key press
//! frame-rate: 100       # player steps per second
//! ```
//!
//! Every key is optional.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::WaterfallError;
use crate::parser::{ParseOptions, DEFAULT_TEMPO};
use crate::pitch::Register;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PlaybackConfig {
    pub lookahead: f64,
    pub velocity: u8,
    pub register_low: i32,
    pub register_high: i32,
    pub default_tempo: f64,
    pub tempo_step: f64,
    pub frame_rate: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            lookahead: 4.0,
            velocity: 100,
            register_low: Register::PLAYABLE.low,
            register_high: Register::PLAYABLE.high,
            default_tempo: DEFAULT_TEMPO,
            tempo_step: 4.0,
            frame_rate: 100,
        }
    }
}

impl PlaybackConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self, WaterfallError> {
        // An empty document deserializes as unit, not as an empty map
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: PlaybackConfig = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, WaterfallError> {
        let source = fs::read_to_string(path)?;
        Self::from_yaml_str(&source)
    }

    pub fn validate(&self) -> Result<(), WaterfallError> {
        if self.register().span() < 11 {
            return Err(WaterfallError::Config(format!(
                "register {}..{} must span at least 11 semitones",
                self.register_low, self.register_high
            )));
        }
        if !(self.lookahead > 0.0) {
            return Err(WaterfallError::Config(format!(
                "lookahead must be positive, got {}",
                self.lookahead
            )));
        }
        if self.velocity > 127 {
            return Err(WaterfallError::Config(format!(
                "velocity must be at most 127, got {}",
                self.velocity
            )));
        }
        if !(self.default_tempo > 0.0) {
            return Err(WaterfallError::DegenerateTempo(self.default_tempo));
        }
        if self.frame_rate == 0 {
            return Err(WaterfallError::Config("frame rate must be positive".to_string()));
        }
        Ok(())
    }

    pub fn register(&self) -> Register {
        Register::new(self.register_low, self.register_high)
    }

    pub fn parse_options(&self, tempo: Option<f64>) -> ParseOptions {
        ParseOptions {
            default_tempo: self.default_tempo,
            tempo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlaybackConfig::default();
        assert_eq!(config.lookahead, 4.0);
        assert_eq!(config.velocity, 100);
        assert_eq!(config.register(), Register::PLAYABLE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml() {
        let config = PlaybackConfig::from_yaml_str("lookahead: 2.5\nvelocity: 90\n").unwrap();
        assert_eq!(config.lookahead, 2.5);
        assert_eq!(config.velocity, 90);
        assert_eq!(config.tempo_step, 4.0);
    }

    #[test]
    fn test_empty_yaml() {
        let config = PlaybackConfig::from_yaml_str("").unwrap();
        assert_eq!(config, PlaybackConfig::default());
    }

    #[test]
    fn test_narrow_register_rejected() {
        let result = PlaybackConfig::from_yaml_str("register-low: 40\nregister-high: 45\n");
        assert!(matches!(result, Err(WaterfallError::Config(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = PlaybackConfig::from_yaml_str("speed: 3\n");
        assert!(matches!(result, Err(WaterfallError::Yaml(_))));
    }

    #[test]
    fn test_bad_velocity_rejected() {
        let result = PlaybackConfig::from_yaml_str("velocity: 200\n");
        assert!(matches!(result, Err(WaterfallError::Config(_))));
    }
}
