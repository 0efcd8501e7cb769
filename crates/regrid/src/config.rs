//! Configuration for interpolation methods.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use point_search::{DistanceWeighting, Pick, DEFAULT_EXACT_MATCH_EPSILON};
use regrid_common::{BoundingBox, RegridError, RegridResult};

use crate::error::yaml_error;
use crate::method::MethodKind;

/// Parameters of an interpolation method.
///
/// Only the fields relevant to the chosen method are used; the rest keep
/// their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodConfig {
    /// Interpolation method.
    pub method: MethodKind,

    /// Neighbour selection for `k-nearest` (see [`Pick::NAMES`]).
    pub pick: String,

    /// Number of neighbours.
    pub nclosest: usize,

    /// Search radius in metres, for distance-based picks.
    pub distance: f64,

    /// Distance weighting for `k-nearest` (see [`DistanceWeighting::NAMES`]).
    pub distance_weighting: String,

    /// Exponent of inverse distance weighting.
    pub inverse_distance_power: f64,

    /// Squared chord distance under which a neighbour counts as coincident.
    pub exact_match_epsilon: f64,

    /// Restrict the input to the output's bounding box before searching.
    pub crop_input_to_output: bool,

    /// Margin in degrees added around the output box when cropping the input.
    pub crop_margin: f64,

    /// Area `north/west/south/east` to restrict the interpolation to.
    pub cropping: Option<String>,

    /// Matrix file for `matrix-import`.
    pub matrix_file: Option<PathBuf>,
}

impl Default for MethodConfig {
    fn default() -> Self {
        Self {
            method: MethodKind::KNearest,
            pick: "nclosest".to_string(),
            nclosest: 4,
            distance: 100_000.0,
            distance_weighting: "inverse-distance-weighting".to_string(),
            inverse_distance_power: 2.0,
            exact_match_epsilon: DEFAULT_EXACT_MATCH_EPSILON,
            crop_input_to_output: false,
            crop_margin: 2.0,
            cropping: None,
            matrix_file: None,
        }
    }
}

impl MethodConfig {
    /// Configuration for `method` with default parameters.
    pub fn for_method(method: MethodKind) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("REGRID_METHOD") {
            match val.parse() {
                Ok(method) => config.method = method,
                Err(e) => warn!(error = %e, "Ignoring REGRID_METHOD"),
            }
        }

        if let Ok(val) = std::env::var("REGRID_NCLOSEST") {
            if let Ok(n) = val.parse() {
                config.nclosest = n;
            }
        }

        if let Ok(val) = std::env::var("REGRID_DISTANCE") {
            if let Ok(d) = val.parse() {
                config.distance = d;
            }
        }

        if let Ok(val) = std::env::var("REGRID_CROP_INPUT") {
            config.crop_input_to_output = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Parse YAML, filling unspecified fields with defaults.
    pub fn from_yaml_str(yaml: &str) -> RegridResult<Self> {
        serde_yaml::from_str(yaml).map_err(yaml_error)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> RegridResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.nclosest == 0 {
            return Err("nclosest must be > 0".to_string());
        }

        if !(self.crop_margin.is_finite() && self.crop_margin >= 0.0) {
            return Err("crop_margin must be >= 0".to_string());
        }

        if self.method == MethodKind::MatrixImport && self.matrix_file.is_none() {
            return Err("matrix-import requires matrix_file".to_string());
        }

        self.pick().map_err(|e| e.to_string())?;
        self.distance_weighting().map_err(|e| e.to_string())?;
        self.cropping_area().map_err(|e| e.to_string())?;

        Ok(())
    }

    /// The neighbour selection described by `pick`, `nclosest` and `distance`.
    pub fn pick(&self) -> RegridResult<Pick> {
        Pick::from_name(&self.pick, self.nclosest, self.distance)
    }

    /// The weighting described by `distance_weighting` and its parameters.
    pub fn distance_weighting(&self) -> RegridResult<DistanceWeighting> {
        let weighting = match DistanceWeighting::from_name(&self.distance_weighting)? {
            DistanceWeighting::InverseDistanceWeighting { .. } => {
                DistanceWeighting::InverseDistanceWeighting {
                    power: self.inverse_distance_power,
                    epsilon: self.exact_match_epsilon,
                }
            }
            other => other,
        };
        weighting.validate()?;
        Ok(weighting)
    }

    pub fn cropping_area(&self) -> RegridResult<Option<BoundingBox>> {
        self.cropping
            .as_deref()
            .map(|area| BoundingBox::from_area_string(area).map_err(RegridError::from))
            .transpose()
    }
}
