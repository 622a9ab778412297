//! # Vehicle geometry configuration
//!
//! Every setting the core needs is carried in one [`VehicleGeometryConfig`] value, loaded from a
//! TOML parameter file and handed to the core at configuration time or with an explicit
//! geometry-changed notification. Nothing reads settings mid-tick.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Internal
use crate::section::MAX_SECTIONS;
use util::params;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Highest supported fix update rate.
pub const MAX_FIX_RATE_HZ: u32 = 50;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Complete configuration of the vehicle, implement and fix handling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleGeometryConfig {
    pub vehicle: VehicleParams,
    pub tool: ToolParams,
    pub fix: FixParams,
}

/// Geometry of the tractor itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleParams {
    /// Distance the antenna sits forward of the pivot (rear axle).
    ///
    /// Units: meters
    pub antenna_pivot_m: f64,

    /// Lateral offset of the antenna from the centreline, positive to the
    /// right.
    ///
    /// Units: meters
    #[serde(default)]
    pub antenna_offset_m: f64,

    /// Distance from the pivot to the implement reference point along the
    /// heading, negative when the hitch is behind the pivot.
    ///
    /// Units: meters
    pub hitch_length_m: f64,
}

/// Implement (tool) settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolParams {
    /// Section boundary positions from left to right, relative to the
    /// centreline (negative to the left). N sections need N+1 boundaries.
    ///
    /// Units: meters
    pub section_boundaries_m: Vec<f64>,

    /// Lateral shift applied to every boundary, positive to the right.
    ///
    /// Units: meters
    #[serde(default)]
    pub tool_offset_m: f64,

    /// Look-ahead used to time the onset of application. Multiplied by the
    /// speed in km/h to give the number of ticks before a section turns on.
    pub look_ahead: f64,

    /// Minimum time a section stays on after its last on request.
    ///
    /// Units: seconds
    pub turn_off_delay_s: f64,

    /// Margin added to the fix rate to bound the on timer.
    ///
    /// Units: ticks
    #[serde(default = "default_on_timer_margin_ticks")]
    pub on_timer_margin_ticks: u32,

    /// Which sections contribute to the applied area.
    #[serde(default)]
    pub coverage_source: CoverageSource,

    /// Length of the section polygons ahead of the implement reference point.
    ///
    /// Units: meters
    #[serde(default = "default_look_ahead_strip_m")]
    pub look_ahead_strip_m: f64,
}

/// Fix handling settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixParams {
    /// Rate at which fixes arrive, which is also the control loop rate.
    ///
    /// Units: Hz
    pub fix_rate_hz: u32,

    /// Below this step between fixes the previous heading is kept.
    ///
    /// Units: meters
    pub min_fix_step_dist_m: f64,

    /// Lowest accepted GGA quality indicator.
    #[serde(default = "default_min_fix_quality")]
    pub min_fix_quality: u8,

    /// Steps longer than this are treated as discontinuities and contribute
    /// no area.
    ///
    /// Units: meters
    #[serde(default = "default_max_fix_jump_m")]
    pub max_fix_jump_m: f64,

    /// Weight (0 to 1) given to the IMU heading when one is provided.
    #[serde(default)]
    pub imu_fusion_weight: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The convention deciding which sections count towards the applied area.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CoverageSource {
    /// Each individual section contributes its own width.
    Individual,

    /// Only the synthetic full-width section contributes.
    FullWidth,
}

/// Errors in the configuration, surfaced synchronously at configuration time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Inconsistent implement geometry: {0}")]
    InconsistentGeometry(String),

    #[error("Invalid value for parameter {name}: {value}")]
    InvalidParam {
        name: &'static str,
        value: f64,
    },

    #[error("Could not load the configuration: {0}")]
    Load(params::LoadError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for CoverageSource {
    fn default() -> Self {
        CoverageSource::Individual
    }
}

impl VehicleGeometryConfig {
    /// Load the configuration from a file in the parameters directory.
    pub fn load(param_file_path: &str) -> Result<Self, ConfigError> {
        let config: Self = params::load(param_file_path).map_err(ConfigError::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration from an explicit path.
    pub fn load_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = params::load_path(path).map_err(ConfigError::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Number of real sections described by the boundaries.
    pub fn num_sections(&self) -> usize {
        self.tool.section_boundaries_m.len().saturating_sub(1)
    }

    /// Number of ticks a section is held on after its last on request.
    pub fn turn_off_delay_ticks(&self) -> u32 {
        let ticks = (self.fix.fix_rate_hz as f64 * self.tool.turn_off_delay_s).round();
        if ticks >= u32::MAX as f64 {
            u32::MAX
        }
        else {
            ticks as u32
        }
    }

    /// Upper bound of the on timer.
    pub fn max_on_timer_ticks(&self) -> u32 {
        self.fix.fix_rate_hz.saturating_add(self.tool.on_timer_margin_ticks)
    }

    /// Check the configuration for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bounds = &self.tool.section_boundaries_m;

        if bounds.len() < 2 || bounds.len() > MAX_SECTIONS + 1 {
            return Err(ConfigError::InconsistentGeometry(format!(
                "expected between 2 and {} section boundaries (1 to {} sections), found {}",
                MAX_SECTIONS + 1,
                MAX_SECTIONS,
                bounds.len()
            )));
        }

        if let Some(b) = bounds.iter().find(|b| !b.is_finite()) {
            return Err(ConfigError::InconsistentGeometry(format!(
                "section boundary {} is not finite",
                b
            )));
        }

        for (i, pair) in bounds.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(ConfigError::InconsistentGeometry(format!(
                    "section {} has a right boundary ({} m) not right of its left boundary ({} m)",
                    i, pair[1], pair[0]
                )));
            }
        }

        check_finite("vehicle.antenna_pivot_m", self.vehicle.antenna_pivot_m)?;
        check_finite("vehicle.antenna_offset_m", self.vehicle.antenna_offset_m)?;
        check_finite("vehicle.hitch_length_m", self.vehicle.hitch_length_m)?;
        check_finite("tool.tool_offset_m", self.tool.tool_offset_m)?;
        check_non_negative("tool.look_ahead", self.tool.look_ahead)?;
        check_non_negative("tool.turn_off_delay_s", self.tool.turn_off_delay_s)?;
        check_non_negative("tool.look_ahead_strip_m", self.tool.look_ahead_strip_m)?;
        check_non_negative("fix.min_fix_step_dist_m", self.fix.min_fix_step_dist_m)?;

        if self.fix.fix_rate_hz == 0 || self.fix.fix_rate_hz > MAX_FIX_RATE_HZ {
            return Err(ConfigError::InvalidParam {
                name: "fix.fix_rate_hz",
                value: self.fix.fix_rate_hz as f64,
            });
        }

        if self.fix.min_fix_quality > 8 {
            return Err(ConfigError::InvalidParam {
                name: "fix.min_fix_quality",
                value: self.fix.min_fix_quality as f64,
            });
        }

        if !(self.fix.max_fix_jump_m > 0.0) || !self.fix.max_fix_jump_m.is_finite() {
            return Err(ConfigError::InvalidParam {
                name: "fix.max_fix_jump_m",
                value: self.fix.max_fix_jump_m,
            });
        }

        if !(0.0..=1.0).contains(&self.fix.imu_fusion_weight) {
            return Err(ConfigError::InvalidParam {
                name: "fix.imu_fusion_weight",
                value: self.fix.imu_fusion_weight,
            });
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn check_finite(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    }
    else {
        Err(ConfigError::InvalidParam { name, value })
    }
}

fn check_non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    }
    else {
        Err(ConfigError::InvalidParam { name, value })
    }
}

fn default_on_timer_margin_ticks() -> u32 {
    3
}

fn default_look_ahead_strip_m() -> f64 {
    1.0
}

fn default_min_fix_quality() -> u8 {
    1
}

fn default_max_fix_jump_m() -> f64 {
    10.0
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// A four section, 10 Hz configuration used throughout the crate's tests.
    pub(crate) fn test_config() -> VehicleGeometryConfig {
        VehicleGeometryConfig {
            vehicle: VehicleParams {
                antenna_pivot_m: 0.0,
                antenna_offset_m: 0.0,
                hitch_length_m: 0.0,
            },
            tool: ToolParams {
                section_boundaries_m: vec![-4.0, -2.0, 0.0, 2.0, 4.0],
                tool_offset_m: 0.0,
                look_ahead: 2.0,
                turn_off_delay_s: 1.0,
                on_timer_margin_ticks: 3,
                coverage_source: CoverageSource::Individual,
                look_ahead_strip_m: 1.0,
            },
            fix: FixParams {
                fix_rate_hz: 10,
                min_fix_step_dist_m: 0.5,
                min_fix_quality: 1,
                max_fix_jump_m: 10.0,
                imu_fusion_weight: 0.0,
            },
        }
    }

    #[test]
    fn test_parse_toml() {
        let config: VehicleGeometryConfig = params::from_str(
            r#"
            [vehicle]
            antenna_pivot_m = 1.5
            hitch_length_m = -1.8

            [tool]
            section_boundaries_m = [-3.0, -1.0, 1.0, 3.0]
            look_ahead = 1.0
            turn_off_delay_s = 0.5

            [fix]
            fix_rate_hz = 5
            min_fix_step_dist_m = 1.0
            "#,
        ).unwrap();

        assert_eq!(config.num_sections(), 3);
        assert_eq!(config.tool.on_timer_margin_ticks, 3);
        assert_eq!(config.tool.coverage_source, CoverageSource::Individual);
        assert_eq!(config.fix.min_fix_quality, 1);
        assert_eq!(config.turn_off_delay_ticks(), 3);
        assert_eq!(config.max_on_timer_ticks(), 8);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_geometry() {
        let mut config = test_config();
        config.validate().unwrap();

        config.tool.section_boundaries_m = vec![0.0];
        assert!(matches!(config.validate(), Err(ConfigError::InconsistentGeometry(_))));

        config.tool.section_boundaries_m = (0..11).map(|i| i as f64).collect();
        assert!(matches!(config.validate(), Err(ConfigError::InconsistentGeometry(_))));

        config.tool.section_boundaries_m = vec![-1.0, 1.0, 0.5];
        assert!(matches!(config.validate(), Err(ConfigError::InconsistentGeometry(_))));

        config.tool.section_boundaries_m = vec![-1.0, f64::NAN];
        assert!(matches!(config.validate(), Err(ConfigError::InconsistentGeometry(_))));
    }

    #[test]
    fn test_validate_params() {
        let mut config = test_config();
        config.fix.fix_rate_hz = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParam { name: "fix.fix_rate_hz", .. })
        ));

        let mut config = test_config();
        config.tool.turn_off_delay_s = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParam { name: "tool.turn_off_delay_s", .. })
        ));

        let mut config = test_config();
        config.fix.imu_fusion_weight = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_derived_ticks() {
        let mut config = test_config();
        assert_eq!(config.turn_off_delay_ticks(), 10);
        assert_eq!(config.max_on_timer_ticks(), 13);

        config.tool.turn_off_delay_s = 0.25;
        assert_eq!(config.turn_off_delay_ticks(), 3);
    }
}
