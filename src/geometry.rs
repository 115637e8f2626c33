//! Flat-sky map geometry.

use crate::units::Angle;

/// Geometry of a square flat-sky map: angular side length and pixels per side.
///
/// Two geometries compare equal iff both the angle and the pixel count are
/// equal; the estimation cache uses this to decide whether its derived grids
/// are still valid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// Angular size of the (square) field of view.
    pub angle: Angle,
    /// Number of pixels per side.
    pub npixel: usize,
}

impl Geometry {
    pub fn new(angle: Angle, npixel: usize) -> Self {
        Self { angle, npixel }
    }

    /// Pixel resolution in radians per pixel.
    pub fn resolution(&self) -> f64 {
        self.angle.radians() / self.npixel as f64
    }

    /// Map shape as a 2D dimension tuple.
    pub fn shape(&self) -> (usize, usize) {
        (self.npixel, self.npixel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn resolution_is_angle_over_npixel() {
        let geom = Geometry::new(Angle::from_degrees(1.6), 128);
        assert_relative_eq!(geom.resolution(), 1.6_f64.to_radians() / 128.0);
    }

    #[test]
    fn equality_is_by_value() {
        let a = Geometry::new(Angle::from_degrees(2.0), 64);
        let b = Geometry::new(Angle::from_degrees(2.0), 64);
        let c = Geometry::new(Angle::from_degrees(2.0), 128);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
