//! Viewer configuration, read from JSON.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewerError};
use crate::layout::LayoutParams;
use crate::normalize::NormalizationPolicy;
use crate::view::Domain;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Wall-clock time between playback ticks.
    pub playback_interval_ms: u64,
    pub layout: LayoutParams,
    pub normalization: NormalizationPolicy,
    /// Domain selected after every load.
    pub initial_domain: Domain,
    /// Run per-coil transforms and per-view rendering on the rayon pool.
    pub parallel: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            playback_interval_ms: 100,
            layout: LayoutParams::default(),
            normalization: NormalizationPolicy::PerImage,
            initial_domain: Domain::KSpace,
            parallel: true,
        }
    }
}

impl ViewerConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: ViewerConfig =
            serde_json::from_str(text).map_err(|e| ViewerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| ViewerError::Config(format!("failed to read {:?}: {}", path, e)))?;
        Self::from_json_str(&text)
    }

    pub fn playback_interval(&self) -> Duration {
        Duration::from_millis(self.playback_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.playback_interval_ms == 0 {
            return Err(ViewerError::Config(
                "playback_interval_ms must be positive".into(),
            ));
        }
        if let NormalizationPolicy::Fixed { max } = self.normalization {
            if !(max.is_finite() && max > 0.0) {
                return Err(ViewerError::Config(format!(
                    "fixed normalization max must be a positive number, got {}",
                    max
                )));
            }
        }
        Ok(())
    }
}
