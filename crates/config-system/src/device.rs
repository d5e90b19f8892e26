//! Device-class detection for threshold defaults

use serde::{Deserialize, Serialize};
use shared_types::{ThresholdConfig, Tier};

/// Hardware profile supplied by the runtime.
///
/// The engine never probes hardware itself; the embedding runtime reports
/// what it knows and detection runs once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub cpu_cores: usize,
    pub memory_mb: u64,
    pub is_mobile: bool,
    pub supports_raster: bool,
    pub supports_accelerated: bool,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            cpu_cores: 4,
            memory_mb: 4096,
            is_mobile: false,
            supports_raster: true,
            supports_accelerated: true,
        }
    }
}

impl DeviceCapabilities {
    /// Whether this device can host the given tier. Vector is always available.
    pub fn supports(&self, tier: Tier) -> bool {
        match tier {
            Tier::Vector => true,
            Tier::Raster => self.supports_raster,
            Tier::Accelerated => self.supports_accelerated,
        }
    }
}

/// Coarse device class carrying a tier-threshold preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceClass {
    Default,
    Mobile,
    LowPower,
    HighPerf,
}

impl DeviceClass {
    /// Classify hardware. Mobile wins over core/memory heuristics.
    pub fn detect(caps: &DeviceCapabilities) -> Self {
        if caps.is_mobile {
            DeviceClass::Mobile
        } else if caps.cpu_cores <= 2 || caps.memory_mb < 2048 {
            DeviceClass::LowPower
        } else if caps.cpu_cores >= 8 && caps.memory_mb >= 8192 {
            DeviceClass::HighPerf
        } else {
            DeviceClass::Default
        }
    }

    /// Threshold preset for this class.
    pub fn thresholds(self) -> ThresholdConfig {
        let (vec_to_ras, ras_to_accel, ppp_vec, ppp_ras, ppp_accel) = match self {
            DeviceClass::Default => (5_000, 50_000, 0.5, 5.0, 50.0),
            DeviceClass::Mobile => (2_000, 20_000, 0.3, 3.0, 30.0),
            DeviceClass::LowPower => (3_000, 30_000, 0.4, 4.0, 40.0),
            DeviceClass::HighPerf => (10_000, 100_000, 1.0, 10.0, 100.0),
        };
        ThresholdConfig {
            vec_to_ras,
            ras_to_accel,
            ppp_vec,
            ppp_ras,
            ppp_accel,
            ..ThresholdConfig::default()
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceClass::Default => "default",
            DeviceClass::Mobile => "mobile",
            DeviceClass::LowPower => "low-power",
            DeviceClass::HighPerf => "high-perf",
        }
    }
}
