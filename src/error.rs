//! Unified error handling for the voyage-analytics library.
//!
//! Missing fields in track data are not errors: they are skipped per statistic.
//! This type covers the genuine faults at the crate's edges, namely malformed
//! JSON handed over by a collaborator and invalid configuration values.

use thiserror::Error;

/// Unified error type for voyage-analytics operations.
#[derive(Debug, Error)]
pub enum VoyageError {
    /// Input JSON could not be decoded into the expected record shape
    #[error("Failed to parse {what}: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// A configuration value is out of range
    #[error("Invalid configuration '{field}': {message}")]
    InvalidConfig { field: &'static str, message: String },
    /// Voyage has too few usable points for the requested operation
    #[error("Voyage '{voyage_id}' has {point_count} usable points, minimum {minimum_required} required")]
    InsufficientPoints {
        voyage_id: String,
        point_count: usize,
        minimum_required: usize,
    },
}

/// Result type alias for voyage-analytics operations.
pub type Result<T> = std::result::Result<T, VoyageError>;

/// Extension trait for converting Option to VoyageError.
pub trait OptionExt<T> {
    /// Convert Option to Result with insufficient points error.
    fn ok_or_insufficient_points(
        self,
        voyage_id: &str,
        point_count: usize,
        minimum: usize,
    ) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_insufficient_points(
        self,
        voyage_id: &str,
        point_count: usize,
        minimum: usize,
    ) -> Result<T> {
        self.ok_or_else(|| VoyageError::InsufficientPoints {
            voyage_id: voyage_id.to_string(),
            point_count,
            minimum_required: minimum,
        })
    }
}

/// Reject a config value that is not finite or not strictly positive.
pub(crate) fn ensure_positive(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(VoyageError::InvalidConfig {
            field,
            message: format!("expected a positive finite number, got {}", value),
        })
    }
}
