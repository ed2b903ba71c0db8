//! The scalar environmental field the rovers measure.
//!
//! The field is an external collaborator to the kernel: the adaptive sampler
//! only ever calls `sample` with integer-rounded world coordinates and the
//! result must be deterministic, so repeated runs measure identical values.

use serde::Deserialize;

/// Deterministic map from a grid position to the measured scalar.
pub trait FieldSampler {
    fn sample(&self, x: i64, y: i64) -> f64;
}

/// Where the field's peak sits along one axis of the map extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldAnchor {
    Low,
    Middle,
    High,
}

impl FieldAnchor {
    fn fraction(self) -> f64 {
        match self {
            FieldAnchor::Low => 0.25,
            FieldAnchor::Middle => 0.5,
            FieldAnchor::High => 0.75,
        }
    }
}

/// Configuration of the bivariate Gaussian metric distribution.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldConfig {
    /// Peak position along easting.
    pub mean_easting: FieldAnchor,
    /// Peak position along northing.
    pub mean_northing: FieldAnchor,
    /// Standard deviation as a fraction of the map extent per axis.
    pub sigma_fraction: f64,
    /// Field value at the peak.
    pub amplitude: f64,
    /// Field value far from the peak. Nonzero so measurement ratios stay defined.
    pub baseline: f64,
}

/// A bivariate Gaussian bump over the map extent.
pub struct GaussianField {
    mean_x: f64,
    mean_y: f64,
    sigma_x: f64,
    sigma_y: f64,
    amplitude: f64,
    baseline: f64,
}

impl GaussianField {
    /// Place the field over the world extent `[x_min, x_max] × [y_min, y_max]`.
    pub fn new(config: &FieldConfig, x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        let x_extent = x_max - x_min;
        let y_extent = y_max - y_min;
        GaussianField {
            mean_x: x_min + config.mean_easting.fraction() * x_extent,
            mean_y: y_min + config.mean_northing.fraction() * y_extent,
            sigma_x: config.sigma_fraction * x_extent,
            sigma_y: config.sigma_fraction * y_extent,
            amplitude: config.amplitude,
            baseline: config.baseline,
        }
    }
}

impl FieldSampler for GaussianField {
    fn sample(&self, x: i64, y: i64) -> f64 {
        let dx = (x as f64 - self.mean_x) / self.sigma_x;
        let dy = (y as f64 - self.mean_y) / self.sigma_y;
        self.baseline + self.amplitude * (-0.5 * (dx * dx + dy * dy)).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> GaussianField {
        let config = FieldConfig {
            mean_easting: FieldAnchor::Middle,
            mean_northing: FieldAnchor::High,
            sigma_fraction: 0.2,
            amplitude: 100.0,
            baseline: 1.0,
        };
        GaussianField::new(&config, 0.0, 1000.0, 0.0, 1000.0)
    }

    #[test]
    fn peaks_at_the_configured_anchor() {
        let f = field();
        let at_peak = f.sample(500, 750);
        assert!((at_peak - 101.0).abs() < 1e-9);
        assert!(f.sample(0, 0) < at_peak);
        assert!(f.sample(900, 100) < at_peak);
    }

    #[test]
    fn deterministic_for_equal_coordinates() {
        let f = field();
        assert_eq!(f.sample(123, 456), f.sample(123, 456));
    }

    #[test]
    fn decays_monotonically_northward_from_peak() {
        let f = field();
        let mut prev = f.sample(500, 750);
        for y in [800, 850, 900, 950] {
            let v = f.sample(500, y);
            assert!(v < prev);
            prev = v;
        }
    }
}
