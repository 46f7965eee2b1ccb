//! World positions

/// 3D world position in game units
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position3D {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn origin() -> Self {
        Self::default()
    }

    /// Euclidean distance to another position
    pub fn distance(&self, other: &Position3D) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Whether every component is finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_distance_axis_aligned() {
        let a = Position3D::origin();
        let b = Position3D::new(3.0, 4.0, 0.0);
        assert_eq!(a.distance(&b), 5.0);
    }

    proptest! {
        #[test]
        fn prop_distance_is_symmetric(
            ax in -1000.0f32..1000.0, ay in -1000.0f32..1000.0, az in -1000.0f32..1000.0,
            bx in -1000.0f32..1000.0, by in -1000.0f32..1000.0, bz in -1000.0f32..1000.0,
        ) {
            let a = Position3D::new(ax, ay, az);
            let b = Position3D::new(bx, by, bz);
            prop_assert_eq!(a.distance(&b), b.distance(&a));
            prop_assert!(a.distance(&b) >= 0.0);
        }
    }
}
