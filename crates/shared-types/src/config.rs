//! Engine configuration types
//!
//! Mirrors the runtime's option groups: tier thresholds, frame budgets,
//! downsampler tuning, interaction timing, and accessibility hints.

use crate::Tier;
use serde::{Deserialize, Serialize};

/// Absolute-count and density tier boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Point count at which vector rendering hands over to raster.
    pub vec_to_ras: usize,
    /// Point count at which raster rendering hands over to accelerated.
    pub ras_to_accel: usize,
    /// Density floor for vector rendering, points per inner pixel.
    pub ppp_vec: f64,
    /// Density at which raster is preferred.
    pub ppp_ras: f64,
    /// Density at which accelerated is preferred.
    pub ppp_accel: f64,
    /// Overrides automatic selection when the tier's surface is registered
    /// and the device supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_tier: Option<Tier>,
    /// Apply device-class defaults at engine construction.
    pub auto_detect: bool,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            vec_to_ras: 5_000,
            ras_to_accel: 50_000,
            ppp_vec: 0.5,
            ppp_ras: 5.0,
            ppp_accel: 50.0,
            force_tier: None,
            auto_detect: true,
        }
    }
}

/// Frame budgets and the degradation policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerfConfig {
    pub target_frame_time_ms: f64,
    /// Frames slower than this are counted as dropped.
    pub max_frame_time_ms: f64,
    pub auto_degrade: bool,
    /// Consecutive dropped frames before stepping down one tier.
    pub degrade_frame_threshold: u32,
    /// Capacity of the frame-metric ring.
    pub metrics_capacity: usize,
}

impl Default for PerfConfig {
    fn default() -> Self {
        Self {
            target_frame_time_ms: 16.67,
            max_frame_time_ms: 33.33,
            auto_degrade: true,
            degrade_frame_threshold: 10,
            metrics_capacity: 60,
        }
    }
}

/// Statistical outlier detection method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    ZScore,
    Iqr,
    Mad,
}

/// Downsampler tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodConfig {
    /// Snap bucket widths to the nice time ladder.
    pub temporal_bucketing: bool,
    /// Let the min/max envelope drive representative selection.
    pub envelope: bool,
    /// Detect and preserve statistical outliers.
    pub outlier_preserve: bool,
    /// Double the target when refining a zoom window.
    pub zoom_refine: bool,
    pub outlier_method: OutlierMethod,
    pub outlier_threshold: f64,
    /// Cap on preserved outliers as a percentage of the input size.
    pub max_outlier_percent: f64,
    /// Bucket target per series; defaults to the viewport's inner pixel width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_points: Option<usize>,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            temporal_bucketing: true,
            envelope: true,
            outlier_preserve: true,
            zoom_refine: true,
            outlier_method: OutlierMethod::ZScore,
            outlier_threshold: 3.0,
            max_outlier_percent: 10.0,
            target_points: None,
        }
    }
}

/// Interaction timing and radii.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InteractionConfig {
    pub hover_radius: f64,
    pub selection_radius: f64,
    pub hover_debounce_ms: f64,
    pub zoom_debounce_ms: f64,
    pub double_click_ms: f64,
    pub keyboard_nav: bool,
    /// Wrap arrow-key navigation at series ends.
    pub wrap_navigation: bool,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            hover_radius: 10.0,
            selection_radius: 15.0,
            hover_debounce_ms: 16.0,
            zoom_debounce_ms: 50.0,
            double_click_ms: 300.0,
            keyboard_nav: true,
            wrap_navigation: false,
        }
    }
}

/// Reduced-motion preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReducedMotion {
    Auto,
    Always,
    Never,
}

/// Rendering hints for assistive clients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccessibilityConfig {
    pub reduced_motion: ReducedMotion,
    pub high_contrast: bool,
}

impl Default for AccessibilityConfig {
    fn default() -> Self {
        Self {
            reduced_motion: ReducedMotion::Auto,
            high_contrast: false,
        }
    }
}

/// Overall Hybrid Charts configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridChartsConfig {
    pub thresholds: ThresholdConfig,
    pub perf: PerfConfig,
    pub lod: LodConfig,
    pub interaction: InteractionConfig,
    pub accessibility: AccessibilityConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_match_default_class() {
        let thresholds = ThresholdConfig::default();
        assert_eq!(thresholds.vec_to_ras, 5_000);
        assert_eq!(thresholds.ras_to_accel, 50_000);
        assert_eq!(thresholds.ppp_ras, 5.0);
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = HybridChartsConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: HybridChartsConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_outlier_method_names() {
        assert_eq!(
            serde_json::to_string(&OutlierMethod::ZScore).unwrap(),
            "\"zscore\""
        );
        assert_eq!(serde_json::to_string(&OutlierMethod::Iqr).unwrap(), "\"iqr\"");
        assert_eq!(serde_json::to_string(&OutlierMethod::Mad).unwrap(), "\"mad\"");
    }
}
