use crate::detection::Detections;
use crate::Errors;
use ndarray::{s, Array3, ArrayView3, ArrayView4, Axis};

/// Number of color channels expected in the frames
pub const CHANNELS: usize = 3;

/// Read-only view of the video frames `(frames, height, width, 3)`.
///
/// Frames are addressed by 1-based frame numbers, the same numbering the detections use.
///
#[derive(Debug, Clone, Copy)]
pub struct FrameStack<'a> {
    frames: ArrayView4<'a, u8>,
}

impl<'a> FrameStack<'a> {
    pub fn new(frames: ArrayView4<'a, u8>) -> Result<Self, Errors> {
        if frames.shape()[3] != CHANNELS {
            return Err(Errors::FrameStackShape(frames.shape().to_vec()));
        }
        Ok(Self { frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn height(&self) -> usize {
        self.frames.shape()[1]
    }

    pub fn width(&self) -> usize {
        self.frames.shape()[2]
    }

    /// Image for the 1-based frame number
    ///
    pub fn frame(&self, frame: u32) -> Result<ArrayView3<'a, u8>, Errors> {
        if frame == 0 || frame as usize > self.len() {
            return Err(Errors::FrameOutOfRange {
                frame,
                frames: self.len(),
            });
        }
        Ok(self.frames.index_axis_move(Axis(0), frame as usize - 1))
    }

    /// Ensures that every detection refers to an existing frame
    ///
    pub fn check_detections(&self, detections: &Detections) -> Result<(), Errors> {
        match detections.max_frame() {
            Some(frame) if frame as usize > self.len() => Err(Errors::FrameOutOfRange {
                frame,
                frames: self.len(),
            }),
            _ => Ok(()),
        }
    }
}

/// Cuts the region `(x, y, w, h)` out of the image, clipped to the image borders.
///
/// Returns `None` when the region does not cover a single pixel of the image.
///
pub fn crop(image: &ArrayView3<u8>, x: f32, y: f32, w: f32, h: f32) -> Option<Array3<u8>> {
    let (height, width) = (image.shape()[0] as f32, image.shape()[1] as f32);
    let x0 = x.floor().max(0.0);
    let y0 = y.floor().max(0.0);
    let x1 = (x + w).ceil().min(width);
    let y1 = (y + h).ceil().min(height);
    if !(x1 > x0 && y1 > y0) {
        return None;
    }
    let (x0, y0, x1, y1) = (x0 as usize, y0 as usize, x1 as usize, y1 as usize);
    Some(image.slice(s![y0..y1, x0..x1, ..]).to_owned())
}

#[cfg(test)]
mod tests {
    use crate::detection::{Detection, Detections};
    use crate::frames::{crop, FrameStack};
    use crate::utils::bbox::BoundingBox;
    use crate::Errors;
    use ndarray::Array4;

    fn video() -> Array4<u8> {
        let mut x = Array4::<u8>::zeros((3, 4, 6, 3));
        for f in 0..3 {
            x.slice_mut(ndarray::s![f, .., .., ..]).fill(f as u8 + 1);
        }
        x
    }

    #[test]
    fn frame_access() {
        let x = video();
        let stack = FrameStack::new(x.view()).unwrap();
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.height(), 4);
        assert_eq!(stack.width(), 6);
        assert_eq!(stack.frame(1).unwrap()[[0, 0, 0]], 1);
        assert_eq!(stack.frame(3).unwrap()[[3, 5, 2]], 3);
        assert!(matches!(
            stack.frame(0),
            Err(Errors::FrameOutOfRange { frame: 0, frames: 3 })
        ));
        assert!(stack.frame(4).is_err());
    }

    #[test]
    fn wrong_channels() {
        let x = Array4::<u8>::zeros((1, 2, 2, 1));
        assert!(matches!(
            FrameStack::new(x.view()),
            Err(Errors::FrameStackShape(_))
        ));
    }

    #[test]
    fn detections_out_of_range() {
        let x = video();
        let stack = FrameStack::new(x.view()).unwrap();
        let b = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let ok: Detections = [1, 3].into_iter().map(|f| Detection::new(f, b, 1.0)).collect();
        assert!(stack.check_detections(&ok).is_ok());
        let bad: Detections = [1, 4].into_iter().map(|f| Detection::new(f, b, 1.0)).collect();
        assert!(stack.check_detections(&bad).is_err());
    }

    #[test]
    fn crops() {
        let x = video();
        let stack = FrameStack::new(x.view()).unwrap();
        let image = stack.frame(2).unwrap();

        let c = crop(&image, 1.0, 1.0, 2.0, 2.0).unwrap();
        assert_eq!(c.shape(), &[2, 2, 3]);
        assert!(c.iter().all(|v| *v == 2));

        let c = crop(&image, -2.0, -2.0, 4.0, 4.0).unwrap();
        assert_eq!(c.shape(), &[2, 2, 3]);

        assert!(crop(&image, 10.0, 1.0, 2.0, 2.0).is_none());
        assert!(crop(&image, 1.0, 1.0, 0.0, 2.0).is_none());
    }
}
