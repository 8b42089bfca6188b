use crate::utils::bbox::BoundingBox;
use crate::Errors;
use itertools::Itertools;
use ndarray::ArrayView2;

/// Number of columns in a detection matrix: frame, x, y, w, h, score
pub const DETECTION_COLUMNS: usize = 6;

/// Single object detection on a video frame
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// 1-based frame number
    pub frame: u32,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

impl Detection {
    pub fn new(frame: u32, bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            frame,
            bbox,
            confidence,
        }
    }

    /// Frame gap between two detections
    ///
    pub fn delta(&self, other: &Detection) -> u32 {
        self.frame.abs_diff(other.frame)
    }
}

/// Detections of a video in input order. Indices into the collection are the detection ids
/// used in the edge files.
///
#[derive(Debug, Clone, Default)]
pub struct Detections {
    items: Vec<Detection>,
}

impl Detections {
    pub fn new(items: Vec<Detection>) -> Self {
        Self { items }
    }

    /// Builds detections from a `(n, 6)` matrix `[frame, x, y, w, h, score]`
    ///
    pub fn from_array(dt: ArrayView2<f32>) -> Result<Self, Errors> {
        if dt.ncols() != DETECTION_COLUMNS {
            return Err(Errors::DetectionShape(dt.shape().to_vec()));
        }
        let items = dt
            .rows()
            .into_iter()
            .enumerate()
            .map(|(index, row)| {
                let frame = row[0];
                if !frame.is_finite() || frame < 1.0 || frame.fract() != 0.0 {
                    return Err(Errors::InvalidFrameNumber { index, frame });
                }
                Ok(Detection::new(
                    frame as u32,
                    BoundingBox::new(row[1], row[2], row[3], row[4]),
                    row[5],
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Detection> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Detection] {
        &self.items
    }

    /// Returns `true` when the detections never go back in time
    ///
    pub fn is_frame_ordered(&self) -> bool {
        self.items
            .iter()
            .tuple_windows()
            .all(|(prev, next)| prev.frame <= next.frame)
    }

    /// The highest frame number referenced by the detections
    ///
    pub fn max_frame(&self) -> Option<u32> {
        self.items.iter().map(|d| d.frame).max()
    }
}

impl std::ops::Index<usize> for Detections {
    type Output = Detection;

    fn index(&self, index: usize) -> &Self::Output {
        &self.items[index]
    }
}

impl FromIterator<Detection> for Detections {
    fn from_iter<T: IntoIterator<Item = Detection>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::detection::{Detection, Detections};
    use crate::utils::bbox::BoundingBox;
    use crate::Errors;
    use ndarray::{array, Array2};

    #[test]
    fn from_array() {
        let dt = array![
            [1.0f32, 10.0, 20.0, 5.0, 10.0, 0.9],
            [2.0, 11.0, 21.0, 5.0, 10.0, 0.8],
        ];
        let detections = Detections::from_array(dt.view()).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[1].frame, 2);
        assert_eq!(
            detections[1].bbox,
            BoundingBox::new(11.0, 21.0, 5.0, 10.0)
        );
        assert!((detections[0].confidence - 0.9).abs() < crate::EPS);
        assert_eq!(detections.max_frame(), Some(2));
    }

    #[test]
    fn from_array_wrong_shape() {
        let dt = Array2::<f32>::zeros((3, 5));
        assert!(matches!(
            Detections::from_array(dt.view()),
            Err(Errors::DetectionShape(s)) if s == vec![3, 5]
        ));
    }

    #[test]
    fn from_array_bad_frame() {
        let dt = array![
            [1.0f32, 10.0, 20.0, 5.0, 10.0, 0.9],
            [0.0, 11.0, 21.0, 5.0, 10.0, 0.8],
        ];
        assert!(matches!(
            Detections::from_array(dt.view()),
            Err(Errors::InvalidFrameNumber { index: 1, .. })
        ));
    }

    #[test]
    fn frame_ordering() {
        let b = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let ordered: Detections = [1, 1, 2, 5]
            .into_iter()
            .map(|f| Detection::new(f, b, 1.0))
            .collect();
        assert!(ordered.is_frame_ordered());

        let unordered: Detections = [1, 3, 2]
            .into_iter()
            .map(|f| Detection::new(f, b, 1.0))
            .collect();
        assert!(!unordered.is_frame_ordered());
        assert!(Detections::default().is_frame_ordered());
    }

    #[test]
    fn delta() {
        let b = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let d1 = Detection::new(7, b, 1.0);
        let d2 = Detection::new(3, b, 1.0);
        assert_eq!(d1.delta(&d2), 4);
        assert_eq!(d2.delta(&d1), 4);
    }
}
