//! Pipeline configuration

use std::path::Path;

use cropscan_algorithms::statistics::ReduceParams;
use cropscan_core::catalog::DEFAULT_MAX_CLOUD_COVER;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Tunables for one pipeline run.
///
/// Loaded from JSON with every field optional; missing fields take the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Window width in days
    pub step_days: u32,
    /// Scenes must have cloud cover strictly below this percentage
    pub max_cloud_cover: f64,
    /// Region sampling interval in metres
    pub scale: f64,
    /// Cap on region samples per reduction
    pub max_pixels: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let reduce = ReduceParams::default();
        Self {
            step_days: 5,
            max_cloud_cover: DEFAULT_MAX_CLOUD_COVER,
            scale: reduce.scale,
            max_pixels: reduce.max_pixels,
        }
    }
}

impl PipelineConfig {
    /// Read and validate a JSON config file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            PipelineError::Config(format!("cannot parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.step_days == 0 {
            return Err(PipelineError::Config("step_days must be at least 1".into()));
        }
        if !(self.max_cloud_cover > 0.0 && self.max_cloud_cover <= 100.0) {
            return Err(PipelineError::Config(format!(
                "max_cloud_cover must be in (0, 100], got {}",
                self.max_cloud_cover
            )));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(PipelineError::Config(format!(
                "scale must be a positive number of metres, got {}",
                self.scale
            )));
        }
        if self.max_pixels == 0 {
            return Err(PipelineError::Config("max_pixels must be at least 1".into()));
        }
        Ok(())
    }

    pub fn reduce_params(&self) -> ReduceParams {
        ReduceParams {
            scale: self.scale,
            max_pixels: self.max_pixels,
        }
    }
}
