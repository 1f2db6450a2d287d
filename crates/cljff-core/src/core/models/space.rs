use crate::core::forcefield::error::ConfigError;
use nalgebra::{Point3, Vector3};

/// An orthorhombic periodic simulation cell.
///
/// The reciprocal edge lengths are cached at construction so that the
/// minimum-image convention can be applied without divisions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicBox {
    dimensions: Vector3<f64>,
    inv_dimensions: Vector3<f64>,
}

impl PeriodicBox {
    /// Creates a periodic cell with the given edge lengths.
    ///
    /// # Arguments
    ///
    /// * `dimensions` - Edge lengths along x, y and z in Angstroms.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBox`] if any edge is not positive and finite.
    pub fn new(dimensions: Vector3<f64>) -> Result<Self, ConfigError> {
        if dimensions.iter().any(|d| !d.is_finite() || *d <= 0.0) {
            return Err(ConfigError::InvalidBox([
                dimensions.x,
                dimensions.y,
                dimensions.z,
            ]));
        }
        Ok(Self {
            dimensions,
            inv_dimensions: dimensions.map(|d| 1.0 / d),
        })
    }

    /// Creates a cubic periodic cell with edge length `length`.
    pub fn cubic(length: f64) -> Result<Self, ConfigError> {
        Self::new(Vector3::repeat(length))
    }

    pub fn dimensions(&self) -> &Vector3<f64> {
        &self.dimensions
    }

    /// Half of the shortest edge, the largest cutoff the minimum-image convention supports.
    pub fn half_min_edge(&self) -> f64 {
        0.5 * self.dimensions.min()
    }

    /// Maps a separation vector onto its nearest periodic image.
    #[inline]
    pub fn min_image(&self, delta: Vector3<f64>) -> Vector3<f64> {
        let shifts = delta.component_mul(&self.inv_dimensions).map(f64::round);
        delta - self.dimensions.component_mul(&shifts)
    }

    /// Wraps a position into the primary cell `[0, L)` on every axis.
    pub fn wrap(&self, position: &Point3<f64>) -> Point3<f64> {
        let shifts = position
            .coords
            .component_mul(&self.inv_dimensions)
            .map(f64::floor);
        Point3::from(position.coords - self.dimensions.component_mul(&shifts))
    }
}

/// The geometry in which pair distances are measured.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Space {
    /// Infinite, non-periodic space.
    #[default]
    Vacuum,
    /// Orthorhombic periodic boundary conditions.
    Periodic(PeriodicBox),
}

impl Space {
    pub fn is_periodic(&self) -> bool {
        matches!(self, Space::Periodic(_))
    }

    /// Returns the cell dimensions when the space is periodic.
    pub fn dimensions(&self) -> Option<Vector3<f64>> {
        match self {
            Space::Vacuum => None,
            Space::Periodic(cell) => Some(*cell.dimensions()),
        }
    }

    /// Applies the minimum-image convention (identity in vacuum).
    #[inline]
    pub fn min_image(&self, delta: Vector3<f64>) -> Vector3<f64> {
        match self {
            Space::Vacuum => delta,
            Space::Periodic(cell) => cell.min_image(delta),
        }
    }

    /// Distance between two points, using the nearest periodic image when periodic.
    #[inline]
    pub fn distance(&self, p: &Point3<f64>, q: &Point3<f64>) -> f64 {
        self.min_image(p - q).norm()
    }

    /// Checks that `cutoff` can be honoured by this space.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CutoffExceedsBox`] when the cutoff is longer than half
    /// the shortest periodic edge, since pairs would then see more than one image.
    pub fn validate_cutoff(&self, cutoff: f64) -> Result<(), ConfigError> {
        match self {
            Space::Vacuum => Ok(()),
            Space::Periodic(cell) => {
                let half_edge = cell.half_min_edge();
                if cutoff > half_edge {
                    Err(ConfigError::CutoffExceedsBox { cutoff, half_edge })
                } else {
                    Ok(())
                }
            }
        }
    }
}
