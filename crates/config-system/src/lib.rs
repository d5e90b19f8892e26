//! Configuration system for Hybrid Charts
//! Resolves device-class presets, sanitizes thresholds, and applies
//! session-persisted runtime overrides.

pub mod device;
pub mod session;
pub mod validation;

pub use device::{DeviceCapabilities, DeviceClass};
pub use session::{MemorySessionStore, SessionStore, THRESHOLDS_SESSION_KEY};
pub use validation::ConfigValidator;

use shared_types::{HybridChartsConfig, HybridChartsError, ThresholdConfig, Tier};
use thiserror::Error;

/// Errors local to configuration handling.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<ConfigError> for HybridChartsError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::Validation(message) => HybridChartsError::InvalidConfig {
                message,
                field: None,
            },
            ConfigError::Serialization(message) => HybridChartsError::SessionStore { message },
        }
    }
}

/// Resolves the effective engine configuration once at construction.
///
/// Resolution order: caller config, then device-class defaults when
/// `auto_detect` is set, then session overrides, each pass re-sanitized.
/// Repair warnings accumulate for the engine to surface as warning events.
pub struct ConfigManager {
    config: HybridChartsConfig,
    device_class: DeviceClass,
    capabilities: DeviceCapabilities,
    warnings: Vec<String>,
}

impl ConfigManager {
    pub fn new(mut config: HybridChartsConfig, capabilities: DeviceCapabilities) -> Self {
        let device_class = DeviceClass::detect(&capabilities);

        if config.thresholds.auto_detect {
            let preset = device_class.thresholds();
            config.thresholds = ThresholdConfig {
                force_tier: config.thresholds.force_tier,
                auto_detect: true,
                ..preset
            };
        }

        let warnings = ConfigValidator::sanitize(&mut config);

        Self {
            config,
            device_class,
            capabilities,
            warnings,
        }
    }

    /// Overlay a session-persisted threshold override, if one exists.
    pub fn with_session_overrides(mut self, store: &dyn SessionStore) -> Self {
        if let Some(overrides) = session::load_overrides(store) {
            let repairs = self.overlay_thresholds(overrides);
            self.warnings.extend(repairs);
        }
        self
    }

    /// Apply a runtime threshold override, optionally persisting it.
    /// Returns the repair warnings produced while sanitizing.
    pub fn apply_override(
        &mut self,
        thresholds: ThresholdConfig,
        store: Option<&mut dyn SessionStore>,
    ) -> Vec<String> {
        let warnings = self.overlay_thresholds(thresholds);
        if let Some(store) = store {
            if let Err(error) = session::save_overrides(store, &self.config.thresholds) {
                log::warn!("failed to persist threshold override: {error}");
            }
        }
        warnings
    }

    fn overlay_thresholds(&mut self, mut thresholds: ThresholdConfig) -> Vec<String> {
        let warnings = ConfigValidator::sanitize_thresholds(&mut thresholds);
        for warning in &warnings {
            log::warn!("{warning}");
        }
        self.config.thresholds = thresholds;
        warnings
    }

    pub fn config(&self) -> &HybridChartsConfig {
        &self.config
    }

    pub fn device_class(&self) -> DeviceClass {
        self.device_class
    }

    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// Warnings accumulated so far; draining hands them to the caller.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    pub fn supports(&self, tier: Tier) -> bool {
        self.capabilities.supports(tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_detect_applies_class_preset() {
        let caps = DeviceCapabilities {
            is_mobile: true,
            ..DeviceCapabilities::default()
        };
        let manager = ConfigManager::new(HybridChartsConfig::default(), caps);
        assert_eq!(manager.device_class(), DeviceClass::Mobile);
        assert_eq!(manager.config().thresholds.vec_to_ras, 2_000);
    }

    #[test]
    fn test_auto_detect_off_keeps_caller_values() {
        let mut config = HybridChartsConfig::default();
        config.thresholds.auto_detect = false;
        config.thresholds.vec_to_ras = 7_777;
        config.thresholds.ras_to_accel = 77_777;

        let manager = ConfigManager::new(config, DeviceCapabilities::default());
        assert_eq!(manager.config().thresholds.vec_to_ras, 7_777);
    }

    #[test]
    fn test_session_override_round_trip() {
        let mut store = MemorySessionStore::new();
        let mut manager =
            ConfigManager::new(HybridChartsConfig::default(), DeviceCapabilities::default());

        let override_thresholds = ThresholdConfig {
            vec_to_ras: 9_000,
            ras_to_accel: 90_000,
            ..ThresholdConfig::default()
        };
        manager.apply_override(override_thresholds, Some(&mut store));

        // A fresh manager picks the override back up.
        let restored =
            ConfigManager::new(HybridChartsConfig::default(), DeviceCapabilities::default())
                .with_session_overrides(&store);
        assert_eq!(restored.config().thresholds.vec_to_ras, 9_000);
    }

    #[test]
    fn test_override_is_sanitized() {
        let mut manager =
            ConfigManager::new(HybridChartsConfig::default(), DeviceCapabilities::default());
        let warnings = manager.apply_override(
            ThresholdConfig {
                vec_to_ras: 6_000,
                ras_to_accel: 10,
                ..ThresholdConfig::default()
            },
            None,
        );
        assert!(!warnings.is_empty());
        assert_eq!(manager.config().thresholds.ras_to_accel, 6_000);
    }
}
