//! Tracker configuration

use crate::histogram::HistogramShape;

/// Invalid tracker configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("update period must be positive, got {0}")]
    NonPositivePeriod(f32),
    #[error("update period jitter must be non-negative, got {0}")]
    NegativeJitter(f32),
    #[error("hitch threshold must be positive, got {0}")]
    NonPositiveThreshold(f64),
}

/// Knobs for the player-experience trackers
///
/// Every field has a default, so a config file only needs the fields it
/// changes:
///
/// ```
/// use rollupstats::tracking::TrackerConfig;
///
/// let config: TrackerConfig =
///     serde_json::from_str(r#"{ "update_to_server_period": 5.0 }"#).unwrap();
/// assert_eq!(config.update_to_server_period, 5.0);
/// assert_eq!(config.required_samples_for_hitch_detection, 1000);
/// config.validate().unwrap();
/// ```
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Seconds between frame-time publishes from a client
    pub update_to_server_period: f32,
    /// Each period is drawn uniformly from `period ± jitter`
    pub update_period_jitter: f32,
    /// Lower bound for a jittered period
    pub min_update_period: f32,
    /// Lifetime frame samples needed before hitch detection starts
    pub required_samples_for_hitch_detection: u32,
    /// Standard deviations above the mean for a frame to count as a hitch
    pub hitch_detection_threshold: f64,
    pub record_net_corrections: bool,
    /// Shape of every ping accumulator, in milliseconds
    pub ping_shape: HistogramShape,
    /// Shape of every frame-time accumulator, in milliseconds
    pub frame_time_shape: HistogramShape,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            update_to_server_period: 10.0,
            update_period_jitter: 0.5,
            min_update_period: 1.0,
            required_samples_for_hitch_detection: 1000,
            hitch_detection_threshold: 2.0,
            record_net_corrections: true,
            ping_shape: HistogramShape::default(),
            frame_time_shape: HistogramShape::default(),
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.update_to_server_period > 0.0) {
            return Err(ConfigError::NonPositivePeriod(self.update_to_server_period));
        }
        if !(self.update_period_jitter >= 0.0) {
            return Err(ConfigError::NegativeJitter(self.update_period_jitter));
        }
        if !(self.hitch_detection_threshold > 0.0) {
            return Err(ConfigError::NonPositiveThreshold(
                self.hitch_detection_threshold,
            ));
        }
        Ok(())
    }
}
