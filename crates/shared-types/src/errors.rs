//! Common error types used across all Hybrid Charts crates

use crate::Tier;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base error type for all Hybrid Charts operations.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum HybridChartsError {
    // Configuration errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        message: String,
        field: Option<String>,
    },

    // Capability errors
    #[error("Tier {tier} is unsupported on this device")]
    UnsupportedTier { tier: Tier },

    #[error("No surface registered for tier {tier}")]
    MissingSurface { tier: Tier },

    // Surface lifecycle errors
    #[error("A surface is already registered for tier {tier}")]
    DuplicateSurface { tier: Tier },

    #[error("Surface lifecycle violation: {message}")]
    SurfaceLifecycle { message: String },

    #[error("Surface initialization failed: {message}")]
    SurfaceInit { message: String },

    #[error("Render failed on tier {tier}: {message}")]
    Render { tier: Tier, message: String },

    #[error("No surfaces registered")]
    NoSurfaces,

    // Persistence errors
    #[error("Session store error: {message}")]
    SessionStore { message: String },
}

/// Result type alias for Hybrid Charts operations.
pub type Result<T> = std::result::Result<T, HybridChartsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error = HybridChartsError::MissingSurface {
            tier: Tier::Accelerated,
        };
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("MissingSurface"));
        assert!(json.contains("accelerated"));
    }

    #[test]
    fn test_error_display() {
        let error = HybridChartsError::Render {
            tier: Tier::Raster,
            message: "context lost".to_string(),
        };
        assert_eq!(error.to_string(), "Render failed on tier raster: context lost");
    }
}
