use crate::EPS;
use anyhow::{bail, Result};
use geo::{coord, Intersects, Rect};
use nalgebra::Point2;

/// Bounding box in the format (x, y, width, height), (x, y) is the top-left corner
///
#[derive(Clone, Default, Debug, Copy)]
pub struct BoundingBox {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl BoundingBox {
    /// Constructor
    ///
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn center(&self) -> Point2<f32> {
        Point2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Radius of the circle surrounding the box
    ///
    pub fn get_radius(&self) -> f32 {
        let hw = self.width / 2.0_f32;
        let hh = self.height / 2.0_f32;
        (hw * hw + hh * hh).sqrt()
    }

    /// The box has a positive area and finite coordinates
    ///
    pub fn is_valid(&self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }

    /// Fails for boxes that cannot take part in the geometry computations
    ///
    pub fn ensure_valid(&self) -> Result<()> {
        if !self.is_valid() {
            bail!("degenerate bounding box {:?}", self);
        }
        Ok(())
    }

    /// Checks that the point is inside the box or on its border
    ///
    pub fn contains(&self, p: &Point2<f32>) -> bool {
        Rect::from(self).intersects(&coord! { x: p.x, y: p.y })
    }

    /// Distance between the centers measured in the sum of the surrounding circles radii
    ///
    pub fn relative_distance(l: &BoundingBox, r: &BoundingBox) -> f32 {
        let max_distance = l.get_radius() + r.get_radius();
        let d = nalgebra::distance(&l.center(), &r.center());
        if max_distance < EPS {
            f32::MAX
        } else {
            d / max_distance
        }
    }

    pub fn intersection(l: &BoundingBox, r: &BoundingBox) -> f64 {
        let (ax0, ay0, ax1, ay1) = (l.x, l.y, l.x + l.width, l.y + l.height);
        let (bx0, by0, bx1, by1) = (r.x, r.y, r.x + r.width, r.y + r.height);

        let (x1, y1) = (ax0.max(bx0), ay0.max(by0));
        let (x2, y2) = (ax1.min(bx1), ay1.min(by1));

        let int_width = x2 - x1;
        let int_height = y2 - y1;

        if int_width > 0.0 && int_height > 0.0 {
            (int_width * int_height) as f64
        } else {
            0.0_f64
        }
    }

    pub fn iou(l: &BoundingBox, r: &BoundingBox) -> f32 {
        let intersection = BoundingBox::intersection(l, r);
        let union = (l.area() + r.area()) as f64 - intersection;
        if union <= 0.0 {
            0.0
        } else {
            (intersection / union) as f32
        }
    }

    /// Allows comparing bboxes
    ///
    pub fn almost_same(&self, other: &Self, eps: f32) -> bool {
        (self.x - other.x).abs() < eps
            && (self.y - other.y).abs() < eps
            && (self.width - other.width).abs() < eps
            && (self.height - other.height).abs() < eps
    }
}

impl From<&BoundingBox> for Rect<f32> {
    fn from(b: &BoundingBox) -> Self {
        Rect::new(
            coord! { x: b.x, y: b.y },
            coord! { x: b.x + b.width, y: b.y + b.height },
        )
    }
}

impl PartialEq<Self> for BoundingBox {
    fn eq(&self, other: &Self) -> bool {
        self.almost_same(other, EPS)
    }
}

#[cfg(test)]
mod tests {
    use crate::utils::bbox::BoundingBox;
    use crate::EPS;
    use nalgebra::Point2;

    #[test]
    fn test_iou() {
        let bb1 = BoundingBox::new(-1.0, -1.0, 2.0, 2.0);
        let bb2 = BoundingBox::new(-0.9, -0.9, 2.0, 2.0);
        let bb3 = BoundingBox::new(1.0, 1.0, 3.0, 3.0);

        assert!(BoundingBox::iou(&bb1, &bb1) > 0.999);
        assert!(BoundingBox::iou(&bb2, &bb2) > 0.999);
        assert!(BoundingBox::iou(&bb1, &bb2) > 0.8);
        assert!(BoundingBox::iou(&bb1, &bb3) < 0.001);
        assert!(BoundingBox::iou(&bb2, &bb3) < 0.001);
    }

    #[test]
    fn test_contains() {
        let bb = BoundingBox::new(10.0, 20.0, 5.0, 10.0);
        assert!(bb.contains(&Point2::new(12.0, 25.0)));
        assert!(bb.contains(&Point2::new(10.0, 20.0)));
        assert!(!bb.contains(&Point2::new(9.0, 25.0)));
        assert!(!bb.contains(&Point2::new(12.0, 31.0)));
    }

    #[test]
    fn test_relative_distance() {
        let bb1 = BoundingBox::new(0.0, 0.0, 6.0, 8.0);
        let bb2 = BoundingBox::new(10.0, 0.0, 6.0, 8.0);
        // radius is 5 for both boxes, centers are 10 apart
        assert!((BoundingBox::relative_distance(&bb1, &bb2) - 1.0).abs() < EPS);
        assert!(BoundingBox::relative_distance(&bb1, &bb1).abs() < EPS);
    }

    #[test]
    fn test_validity() {
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).ensure_valid().is_ok());
        assert!(BoundingBox::new(0.0, 0.0, 0.0, 1.0).ensure_valid().is_err());
        assert!(BoundingBox::new(0.0, 0.0, 1.0, -1.0).ensure_valid().is_err());
        assert!(BoundingBox::new(f32::NAN, 0.0, 1.0, 1.0)
            .ensure_valid()
            .is_err());
    }
}
