use serde::{Deserialize, Serialize};
use weft_types::constants::{
    BYTES_PER_MB, CAPACITY_DECAY, DEFAULT_CAPACITY_THRESHOLD, DEFAULT_MAX_BLOCK_SIZE_MB,
    DEFAULT_MIN_BLOCK_SIZE_MB,
};

use crate::error::WeaveError;

/// Bounds and threshold for the adaptive block-size ceiling, in MB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    pub min_size: f64,
    pub max_size: f64,
    /// Scale-up threshold τ on the pending/confirmed ratio.
    pub threshold: f64,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_BLOCK_SIZE_MB,
            max_size: DEFAULT_MAX_BLOCK_SIZE_MB,
            threshold: DEFAULT_CAPACITY_THRESHOLD,
        }
    }
}

impl CapacityConfig {
    pub fn validate(&self) -> Result<(), WeaveError> {
        let finite = self.min_size.is_finite()
            && self.max_size.is_finite()
            && self.threshold.is_finite();
        if !finite {
            return Err(WeaveError::InvalidConfig {
                reason: "capacity bounds and threshold must be finite".to_string(),
            });
        }
        if self.min_size <= 0.0 {
            return Err(WeaveError::InvalidConfig {
                reason: format!("min_size must be positive, got {}", self.min_size),
            });
        }
        if self.min_size > self.max_size {
            return Err(WeaveError::InvalidConfig {
                reason: format!(
                    "min_size {} exceeds max_size {}",
                    self.min_size, self.max_size
                ),
            });
        }
        if self.threshold <= 0.0 {
            return Err(WeaveError::InvalidConfig {
                reason: format!("threshold must be positive, got {}", self.threshold),
            });
        }
        Ok(())
    }
}

/// Adjusts the block-size ceiling from the ratio of pending to confirmed
/// transactions.
///
/// Above the threshold the ceiling grows multiplicatively by `1 + ratio`;
/// below it the ceiling decays by 10%. The ceiling never leaves
/// `[min_size, max_size]`.
#[derive(Debug, Clone)]
pub struct CapacityController {
    current_size: f64,
    config: CapacityConfig,
}

impl Default for CapacityController {
    fn default() -> Self {
        Self {
            current_size: DEFAULT_MIN_BLOCK_SIZE_MB,
            config: CapacityConfig::default(),
        }
    }
}

impl CapacityController {
    /// Create a controller starting at `min_size`.
    pub fn new(config: CapacityConfig) -> Result<Self, WeaveError> {
        config.validate()?;
        Ok(Self {
            current_size: config.min_size,
            config,
        })
    }

    /// The current ceiling in MB, unrounded.
    pub fn current_size(&self) -> f64 {
        self.current_size
    }

    pub fn config(&self) -> &CapacityConfig {
        &self.config
    }

    /// Recompute the ceiling. Returns the new size rounded to two decimals.
    pub fn update(&mut self, pending: u64, confirmed: u64) -> Result<f64, WeaveError> {
        if confirmed == 0 {
            return Err(WeaveError::DivisionUndefined);
        }
        let ratio = pending as f64 / confirmed as f64;
        let previous = self.current_size;
        self.current_size = if ratio >= self.config.threshold {
            (self.current_size * (1.0 + ratio)).min(self.config.max_size)
        } else {
            (self.current_size * CAPACITY_DECAY).max(self.config.min_size)
        };

        if self.current_size != previous {
            tracing::info!(
                pending,
                confirmed,
                ratio,
                size_mb = round2(self.current_size),
                "block capacity adjusted"
            );
        } else {
            tracing::debug!(pending, confirmed, ratio, "block capacity unchanged");
        }
        Ok(round2(self.current_size))
    }

    /// Like [`update`](Self::update), but treats `confirmed == 0` as no
    /// signal and holds the current size.
    pub fn update_or_hold(&mut self, pending: u64, confirmed: u64) -> f64 {
        match self.update(pending, confirmed) {
            Ok(size) => size,
            Err(_) => round2(self.current_size),
        }
    }

    /// The current ceiling in bytes.
    pub fn byte_limit(&self) -> usize {
        (self.current_size * BYTES_PER_MB) as usize
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
