//! Configuration validation
//!
//! Invalid values are clamped rather than rejected: the engine must come up
//! with something renderable, so every repair is reported as a warning the
//! engine forwards as a warning event.

use shared_types::{HybridChartsConfig, LodConfig, PerfConfig, ThresholdConfig};

/// Lower bound for the vector-to-raster handover.
pub const MIN_VEC_TO_RAS: usize = 100;

/// Configuration sanitizer with per-group checks.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Sanitize a complete configuration, returning repair warnings.
    pub fn sanitize(config: &mut HybridChartsConfig) -> Vec<String> {
        let mut warnings = Vec::new();
        warnings.extend(Self::sanitize_thresholds(&mut config.thresholds));
        warnings.extend(Self::sanitize_perf(&mut config.perf));
        warnings.extend(Self::sanitize_lod(&mut config.lod));
        for warning in &warnings {
            log::warn!("{warning}");
        }
        warnings
    }

    /// Clamp tier thresholds into their valid ranges.
    pub fn sanitize_thresholds(thresholds: &mut ThresholdConfig) -> Vec<String> {
        let mut warnings = Vec::new();

        if thresholds.vec_to_ras < MIN_VEC_TO_RAS {
            warnings.push(format!(
                "vec_to_ras {} below minimum {}, clamped",
                thresholds.vec_to_ras, MIN_VEC_TO_RAS
            ));
            thresholds.vec_to_ras = MIN_VEC_TO_RAS;
        }

        if thresholds.ras_to_accel < thresholds.vec_to_ras {
            warnings.push(format!(
                "ras_to_accel {} below vec_to_ras {}, clamped",
                thresholds.ras_to_accel, thresholds.vec_to_ras
            ));
            thresholds.ras_to_accel = thresholds.vec_to_ras;
        }

        let defaults = ThresholdConfig::default();
        for (value, default, name) in [
            (&mut thresholds.ppp_vec, defaults.ppp_vec, "ppp_vec"),
            (&mut thresholds.ppp_ras, defaults.ppp_ras, "ppp_ras"),
            (&mut thresholds.ppp_accel, defaults.ppp_accel, "ppp_accel"),
        ] {
            if !value.is_finite() || *value <= 0.0 {
                warnings.push(format!("{name} {value} is not a positive number, reset"));
                *value = default;
            }
        }

        if thresholds.ppp_accel < thresholds.ppp_ras {
            warnings.push(format!(
                "ppp_accel {} below ppp_ras {}, clamped",
                thresholds.ppp_accel, thresholds.ppp_ras
            ));
            thresholds.ppp_accel = thresholds.ppp_ras;
        }

        warnings
    }

    /// Clamp frame budgets and the degradation policy.
    pub fn sanitize_perf(perf: &mut PerfConfig) -> Vec<String> {
        let mut warnings = Vec::new();
        let defaults = PerfConfig::default();

        if !perf.target_frame_time_ms.is_finite() || perf.target_frame_time_ms <= 0.0 {
            warnings.push(format!(
                "target_frame_time_ms {} is not a positive budget, reset",
                perf.target_frame_time_ms
            ));
            perf.target_frame_time_ms = defaults.target_frame_time_ms;
        }

        if !perf.max_frame_time_ms.is_finite() || perf.max_frame_time_ms <= 0.0 {
            warnings.push(format!(
                "max_frame_time_ms {} is not a positive budget, reset",
                perf.max_frame_time_ms
            ));
            perf.max_frame_time_ms = defaults.max_frame_time_ms;
        }

        if perf.max_frame_time_ms < perf.target_frame_time_ms {
            warnings.push(format!(
                "max_frame_time_ms {} below target {}, clamped",
                perf.max_frame_time_ms, perf.target_frame_time_ms
            ));
            perf.max_frame_time_ms = perf.target_frame_time_ms;
        }

        if perf.degrade_frame_threshold == 0 {
            warnings.push("degrade_frame_threshold 0 would degrade instantly, reset".to_string());
            perf.degrade_frame_threshold = defaults.degrade_frame_threshold;
        }

        if perf.metrics_capacity == 0 {
            warnings.push("metrics_capacity 0 is unusable, reset".to_string());
            perf.metrics_capacity = defaults.metrics_capacity;
        }

        warnings
    }

    /// Clamp outlier tuning.
    pub fn sanitize_lod(lod: &mut LodConfig) -> Vec<String> {
        let mut warnings = Vec::new();
        let defaults = LodConfig::default();

        if !lod.outlier_threshold.is_finite() || lod.outlier_threshold <= 0.0 {
            warnings.push(format!(
                "outlier_threshold {} is not a positive number, reset",
                lod.outlier_threshold
            ));
            lod.outlier_threshold = defaults.outlier_threshold;
        }

        if !lod.max_outlier_percent.is_finite() || !(0.0..=100.0).contains(&lod.max_outlier_percent)
        {
            warnings.push(format!(
                "max_outlier_percent {} outside 0..=100, clamped",
                lod.max_outlier_percent
            ));
            lod.max_outlier_percent = lod.max_outlier_percent.clamp(0.0, 100.0);
            if !lod.max_outlier_percent.is_finite() {
                lod.max_outlier_percent = defaults.max_outlier_percent;
            }
        }

        warnings
    }
}
