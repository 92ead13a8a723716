//! Axis-aligned bounding boxes

use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box in map units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Smallest box enclosing every point
    pub fn enclosing<I: IntoIterator<Item = (f64, f64)>>(points: I) -> Self {
        let mut b = Self::new(f64::MAX, f64::MAX, f64::MIN, f64::MIN);
        for (x, y) in points {
            b.min_x = b.min_x.min(x);
            b.min_y = b.min_y.min(y);
            b.max_x = b.max_x.max(x);
            b.max_y = b.max_y.max(y);
        }
        b
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Check if two bboxes intersect.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Grow every side by `margin`
    pub fn expand(&self, margin: f64) -> Self {
        Self::new(
            self.min_x - margin,
            self.min_y - margin,
            self.max_x + margin,
            self.max_y + margin,
        )
    }

    /// `[west, south, east, north]`, the order STAC search expects
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enclosing_points() {
        let b = BBox::enclosing([(3.0, -1.0), (-2.0, 4.0), (0.0, 0.0)]);
        assert_eq!(b, BBox::new(-2.0, -1.0, 3.0, 4.0));
        assert_eq!(b.width(), 5.0);
        assert_eq!(b.height(), 5.0);
    }

    #[test]
    fn intersection() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&BBox::new(5.0, 5.0, 15.0, 15.0)));
        assert!(!a.intersects(&BBox::new(10.0, 0.0, 20.0, 10.0)));
    }
}
