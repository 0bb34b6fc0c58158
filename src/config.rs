use crate::error::EngineError;

pub const DEFAULT_TEXTURE_WIDTH: u32 = 2048;
pub const DEFAULT_DEPTH_BUCKETS: u32 = 256 * 256;
pub const DEFAULT_RESORT_EPSILON: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Texels per texture row. Each splat occupies two texels.
    pub texture_width: u32,
    /// Counting-sort bucket count.
    pub depth_buckets: u32,
    /// A view whose forward axis is within this distance (`1 - dot`) of the
    /// last sorted one, over an unchanged store, is not re-sorted.
    pub resort_epsilon: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            texture_width: DEFAULT_TEXTURE_WIDTH,
            depth_buckets: DEFAULT_DEPTH_BUCKETS,
            resort_epsilon: DEFAULT_RESORT_EPSILON,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.texture_width < 2 || !self.texture_width.is_power_of_two() {
            return Err(EngineError::InvalidConfig(format!(
                "texture width must be a power of two >= 2, got {}",
                self.texture_width
            )));
        }
        if self.depth_buckets < 2 || !self.depth_buckets.is_power_of_two() {
            return Err(EngineError::InvalidConfig(format!(
                "depth bucket count must be a power of two >= 2, got {}",
                self.depth_buckets
            )));
        }
        if !self.resort_epsilon.is_finite() || self.resort_epsilon < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "resort epsilon must be finite and non-negative, got {}",
                self.resort_epsilon
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_power_of_two_sizes() {
        let config = EngineConfig {
            texture_width: 1000,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));

        let config = EngineConfig {
            depth_buckets: 1,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_negative_epsilon() {
        let config = EngineConfig {
            resort_epsilon: -0.5,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
