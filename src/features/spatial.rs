use crate::utils::bbox::BoundingBox;
use anyhow::Result;

/// Geometry of two boxes, independent of the image content
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialTerms {
    /// center distance normalized by the mean box height
    pub distance: f32,
    pub iou: f32,
    /// `|ln(h1 / h2)|`
    pub height_ratio: f32,
}

impl SpatialTerms {
    pub fn new(box1: &BoundingBox, box2: &BoundingBox) -> Result<Self> {
        box1.ensure_valid()?;
        box2.ensure_valid()?;
        let mean_height = (box1.height() + box2.height()) / 2.0;
        Ok(Self {
            distance: nalgebra::distance(&box1.center(), &box2.center()) / mean_height,
            iou: BoundingBox::iou(box1, box2),
            height_ratio: (box1.height() / box2.height()).ln().abs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::features::spatial::SpatialTerms;
    use crate::utils::bbox::BoundingBox;
    use crate::EPS;

    #[test]
    fn terms() {
        let b1 = BoundingBox::new(0.0, 0.0, 10.0, 20.0);
        let t = SpatialTerms::new(&b1, &b1).unwrap();
        assert!(t.distance.abs() < EPS);
        assert!((t.iou - 1.0).abs() < EPS);
        assert!(t.height_ratio.abs() < EPS);

        let b2 = BoundingBox::new(30.0, 40.0, 20.0, 40.0);
        let t = SpatialTerms::new(&b1, &b2).unwrap();
        // centers (5, 10) and (40, 60)
        let d = (35.0f32 * 35.0 + 50.0 * 50.0).sqrt() / 30.0;
        assert!((t.distance - d).abs() < EPS);
        assert!(t.iou.abs() < EPS);
        assert!((t.height_ratio - 2.0f32.ln()).abs() < EPS);

        let t2 = SpatialTerms::new(&b2, &b1).unwrap();
        assert!((t.height_ratio - t2.height_ratio).abs() < EPS);
    }

    #[test]
    fn degenerate() {
        let b1 = BoundingBox::new(0.0, 0.0, 10.0, 20.0);
        let b2 = BoundingBox::new(0.0, 0.0, 10.0, 0.0);
        assert!(SpatialTerms::new(&b1, &b2).is_err());
        assert!(SpatialTerms::new(&b2, &b1).is_err());
    }
}
