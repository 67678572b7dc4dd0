//! Pipeline configuration.
//!
//! Defaults follow the usual instruction-editing setup: a cheap batched
//! correspondence phase at the start of training, then per-image edits.

use std::path::Path;

use retouch_match::MatchOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collab::EditParams;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be positive")]
    ZeroRate { name: &'static str },

    #[error("{name} must be at least 1")]
    ZeroCount { name: &'static str },

    #[error("Noise bounds must satisfy 0 <= lower < upper <= 1, got [{lower}, {upper}]")]
    InvalidBounds { lower: f32, upper: f32 },

    #[error("{name} must be finite, got {value}")]
    NonFiniteGuidance { name: &'static str, value: f32 },

    #[error("Cursor covers {range} images but the training batch has {slots} slots")]
    CursorRange { range: usize, slots: usize },

    #[error("Training batch has {training} slots but the original batch has {original}")]
    SlotMismatch { training: usize, original: usize },

    #[error("Invalid correspondence settings: {0}")]
    Correspondence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Numeric precision the diffusion editor runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecisionMode {
    #[default]
    Full,
    Half,
}

/// Settings for the batched correspondence edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrespondenceConfig {
    /// Query points per side of the tracking grid
    pub grid_size: usize,
    /// Query points per tracker call
    pub point_batch_size: usize,
    /// Batch elements per tracker call
    pub frame_batch_size: usize,
    /// Refinement iterations requested from the tracker
    pub tracker_iterations: usize,
    /// Frames per latent group; 0 puts the whole batch in one group
    pub group_size: usize,
    /// Image-to-latent downscale factor of the diffusion model
    pub latent_downscale: usize,
}

impl Default for CorrespondenceConfig {
    fn default() -> Self {
        Self {
            grid_size: 64,
            point_batch_size: 256,
            frame_batch_size: 8,
            tracker_iterations: 6,
            group_size: 0,
            latent_downscale: 8,
        }
    }
}

impl CorrespondenceConfig {
    /// Matcher options for a sequence resampled to `(height, width)`.
    pub fn match_options(&self, height: usize, width: usize) -> MatchOptions {
        MatchOptions::new(height, width)
            .with_grid_size(self.grid_size)
            .with_batch_sizes(self.point_batch_size, self.frame_batch_size)
            .with_iterations(self.tracker_iterations)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.latent_downscale == 0 {
            return Err(ConfigError::Correspondence(
                "latent_downscale must be positive".into(),
            ));
        }
        if self.group_size == 1 {
            return Err(ConfigError::Correspondence(
                "group_size of 1 cannot chain groups; use 0 or at least 2".into(),
            ));
        }
        // Resolution is only known per batch; check the rest with a placeholder.
        self.match_options(64, 64)
            .validate()
            .map_err(|e| ConfigError::Correspondence(e.to_string()))
    }
}

/// Configuration for [`EditPipeline`](crate::pipeline::EditPipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    /// Edit instruction
    pub prompt: String,
    /// Text guidance scale
    pub guidance_scale: f32,
    /// Image guidance scale
    pub image_guidance_scale: f32,
    /// Steps between single-image edits
    pub slow_edit_rate: u64,
    /// Steps between batched correspondence edits
    pub fast_edit_rate: u64,
    /// Steps after the first call during which batched edits are used
    pub fast_mode_duration_steps: u64,
    /// Images edited per single-image edit
    pub slow_edit_count: usize,
    /// Images edited per batched edit
    pub fast_edit_count: usize,
    /// Denoising steps per edit
    pub diffusion_steps: usize,
    /// Lower bound of the noise level used for editing
    pub lower_bound: f32,
    /// Upper bound of the noise level used for editing
    pub upper_bound: f32,
    /// Device for the diffusion editor; `None` shares the pipeline device
    pub editor_device_override: Option<String>,
    pub editor_precision_mode: PrecisionMode,
    pub correspondence: CorrespondenceConfig,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            prompt: "don't change the image".to_string(),
            guidance_scale: 7.5,
            image_guidance_scale: 1.5,
            slow_edit_rate: 10,
            fast_edit_rate: 200,
            fast_mode_duration_steps: 600,
            slow_edit_count: 1,
            fast_edit_count: 4,
            diffusion_steps: 20,
            lower_bound: 0.02,
            upper_bound: 0.98,
            editor_device_override: None,
            editor_precision_mode: PrecisionMode::Full,
            correspondence: CorrespondenceConfig::default(),
        }
    }
}

impl EditConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slow_edit_rate == 0 {
            return Err(ConfigError::ZeroRate {
                name: "slow_edit_rate",
            });
        }
        if self.fast_edit_rate == 0 {
            return Err(ConfigError::ZeroRate {
                name: "fast_edit_rate",
            });
        }
        if self.slow_edit_count == 0 {
            return Err(ConfigError::ZeroCount {
                name: "slow_edit_count",
            });
        }
        if self.fast_edit_count == 0 {
            return Err(ConfigError::ZeroCount {
                name: "fast_edit_count",
            });
        }
        if self.diffusion_steps == 0 {
            return Err(ConfigError::ZeroCount {
                name: "diffusion_steps",
            });
        }
        let bounds_ok = self.lower_bound >= 0.0
            && self.upper_bound <= 1.0
            && self.lower_bound < self.upper_bound;
        if !bounds_ok {
            return Err(ConfigError::InvalidBounds {
                lower: self.lower_bound,
                upper: self.upper_bound,
            });
        }
        check_guidance("guidance_scale", self.guidance_scale)?;
        check_guidance("image_guidance_scale", self.image_guidance_scale)?;
        self.correspondence.validate()
    }

    /// Editor parameters for single-image edits.
    pub fn slow_params(&self) -> EditParams {
        EditParams {
            guidance_scale: self.guidance_scale,
            image_guidance_scale: self.image_guidance_scale,
            diffusion_steps: self.diffusion_steps,
            lower_bound: self.lower_bound,
            upper_bound: self.upper_bound,
        }
    }

    /// Editor parameters for batched edits.
    ///
    /// Text guidance is doubled to make up for the weaker per-frame
    /// conditioning of a joint edit.
    pub fn fast_params(&self) -> EditParams {
        EditParams {
            guidance_scale: self.guidance_scale * 2.0,
            ..self.slow_params()
        }
    }
}

pub(crate) fn check_guidance(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NonFiniteGuidance { name, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EditConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fast_params().guidance_scale, 15.0);
        assert_eq!(config.slow_params().guidance_scale, 7.5);
    }

    #[test]
    fn test_zero_rates_rejected() {
        let config = EditConfig {
            slow_edit_rate: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroRate { name: "slow_edit_rate" })
        ));

        let config = EditConfig {
            fast_edit_rate: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroRate { name: "fast_edit_rate" })
        ));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let config = EditConfig {
            lower_bound: 0.9,
            upper_bound: 0.1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EditConfig::from_json_str(
            r#"{ "prompt": "turn him into a clown", "fast_edit_rate": 50,
                 "editor_precision_mode": "half",
                 "correspondence": { "grid_size": 16 } }"#,
        )
        .unwrap();
        assert_eq!(config.prompt, "turn him into a clown");
        assert_eq!(config.fast_edit_rate, 50);
        assert_eq!(config.slow_edit_rate, 10);
        assert_eq!(config.editor_precision_mode, PrecisionMode::Half);
        assert_eq!(config.correspondence.grid_size, 16);
        assert_eq!(config.correspondence.point_batch_size, 256);
    }

    #[test]
    fn test_invalid_json_config_rejected() {
        assert!(matches!(
            EditConfig::from_json_str(r#"{ "slow_edit_rate": 0 }"#),
            Err(ConfigError::ZeroRate { .. })
        ));
        assert!(matches!(
            EditConfig::from_json_str("{ not json"),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            EditConfig::from_json_str(r#"{ "correspondence": { "group_size": 1 } }"#),
            Err(ConfigError::Correspondence(_))
        ));
    }
}
