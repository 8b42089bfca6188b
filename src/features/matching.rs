use crate::utils::bbox::BoundingBox;
use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use lru::LruCache;
use nalgebra::Point2;
use ndarray::ArrayView3;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Point correspondence between two frames
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointMatch {
    /// point on the first frame
    pub source: Point2<f32>,
    /// corresponding point on the second frame
    pub target: Point2<f32>,
    pub score: f32,
}

impl PointMatch {
    pub fn new(source: Point2<f32>, target: Point2<f32>, score: f32) -> Self {
        Self {
            source,
            target,
            score,
        }
    }

    pub fn swapped(&self) -> Self {
        Self {
            source: self.target,
            target: self.source,
            score: self.score,
        }
    }
}

/// Two frames of a video for which the correspondences are requested
///
#[derive(Debug, Clone, Copy)]
pub struct FramePair<'a> {
    pub video_name: &'a str,
    pub frame1: u32,
    pub frame2: u32,
    pub image1: ArrayView3<'a, u8>,
    pub image2: ArrayView3<'a, u8>,
}

/// Dense matching between two frames (deep matching, optical flow, ...)
///
pub trait PointMatcher: Send + Sync {
    fn correspondences(&self, pair: &FramePair) -> Result<Arc<Vec<PointMatch>>>;
}

/// Motion consistency of two boxes measured with the point correspondences
///
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionTerms {
    /// matches inside both boxes divided by matches inside either box
    pub iou: f32,
    /// share of the first box matches that land inside the second box
    pub transfer: f32,
}

impl MotionTerms {
    pub fn from_matches(matches: &[PointMatch], box1: &BoundingBox, box2: &BoundingBox) -> Self {
        let mut in1 = 0_usize;
        let mut in2 = 0_usize;
        let mut both = 0_usize;
        for m in matches {
            let s = box1.contains(&m.source);
            let t = box2.contains(&m.target);
            in1 += usize::from(s);
            in2 += usize::from(t);
            both += usize::from(s && t);
        }
        let union = in1 + in2 - both;
        Self {
            iou: if union == 0 {
                0.0
            } else {
                both as f32 / union as f32
            },
            transfer: if in1 == 0 {
                0.0
            } else {
                both as f32 / in1 as f32
            },
        }
    }

    /// Both boxes are on the same frame, so every pixel corresponds to itself
    ///
    pub fn identity(box1: &BoundingBox, box2: &BoundingBox) -> Self {
        let area1 = box1.area();
        Self {
            iou: BoundingBox::iou(box1, box2),
            transfer: if area1 > 0.0 {
                (BoundingBox::intersection(box1, box2) / area1 as f64) as f32
            } else {
                0.0
            },
        }
    }
}

/// Parses deep matching output: one `x1 y1 x2 y2 score index` line per match
///
pub fn parse_matches(text: &str) -> Result<Vec<PointMatch>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(lineno, line)| {
            let values = line
                .split_whitespace()
                .map(str::parse::<f32>)
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("line {}: {:?}", lineno + 1, line))?;
            if values.len() < 5 {
                bail!(
                    "line {}: expected `x1 y1 x2 y2 score [index]`, got {:?}",
                    lineno + 1,
                    line
                );
            }
            Ok(PointMatch::new(
                Point2::new(values[0], values[1]),
                Point2::new(values[2], values[3]),
                values[4],
            ))
        })
        .collect()
}

/// Default number of frame pairs kept in memory by [MatchDirectory](MatchDirectory)
pub const DEFAULT_MATCH_CACHE_CAPACITY: usize = 256;

/// Precomputed correspondences stored as `<root>/<video>/<frame1:06>_<frame2:06>.txt` files.
///
/// A pair requested in the reverse order is read from the swapped file.
///
pub struct MatchDirectory {
    root: PathBuf,
    cache: Mutex<LruCache<(String, u32, u32), Arc<Vec<PointMatch>>>>,
}

impl MatchDirectory {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self::with_capacity(root, DEFAULT_MATCH_CACHE_CAPACITY)
    }

    pub fn with_capacity<P: AsRef<Path>>(root: P, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or(NonZeroUsize::new(DEFAULT_MATCH_CACHE_CAPACITY).unwrap());
        Self {
            root: root.as_ref().to_path_buf(),
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn file_name(&self, video_name: &str, frame1: u32, frame2: u32) -> PathBuf {
        self.root
            .join(video_name)
            .join(format!("{:06}_{:06}.txt", frame1, frame2))
    }

    fn load(&self, video_name: &str, frame1: u32, frame2: u32) -> Result<Vec<PointMatch>> {
        let direct = self.file_name(video_name, frame1, frame2);
        if direct.is_file() {
            let text = fs::read_to_string(&direct)
                .with_context(|| format!("unable to read {:?}", direct))?;
            return parse_matches(&text).with_context(|| format!("malformed {:?}", direct));
        }
        let reverse = self.file_name(video_name, frame2, frame1);
        if reverse.is_file() {
            let text = fs::read_to_string(&reverse)
                .with_context(|| format!("unable to read {:?}", reverse))?;
            let matches =
                parse_matches(&text).with_context(|| format!("malformed {:?}", reverse))?;
            return Ok(matches.iter().map(PointMatch::swapped).collect());
        }
        Err(anyhow!(
            "no matches for frames {} -> {} of {} ({:?})",
            frame1,
            frame2,
            video_name,
            direct
        ))
    }
}

impl PointMatcher for MatchDirectory {
    fn correspondences(&self, pair: &FramePair) -> Result<Arc<Vec<PointMatch>>> {
        let key = (pair.video_name.to_string(), pair.frame1, pair.frame2);
        if let Some(m) = self.cache.lock().unwrap().get(&key) {
            return Ok(m.clone());
        }
        let matches = Arc::new(self.load(pair.video_name, pair.frame1, pair.frame2)?);
        debug!(
            "Loaded {} matches for frames {} -> {} of {}",
            matches.len(),
            pair.frame1,
            pair.frame2,
            pair.video_name
        );
        self.cache.lock().unwrap().put(key, matches.clone());
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use crate::features::matching::{
        parse_matches, FramePair, MatchDirectory, MotionTerms, PointMatch, PointMatcher,
    };
    use crate::utils::bbox::BoundingBox;
    use crate::EPS;
    use nalgebra::Point2;
    use ndarray::Array3;
    use std::fs;

    fn m(x1: f32, y1: f32, x2: f32, y2: f32) -> PointMatch {
        PointMatch::new(Point2::new(x1, y1), Point2::new(x2, y2), 1.0)
    }

    #[test]
    fn motion_terms() {
        let box1 = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let box2 = BoundingBox::new(5.0, 0.0, 10.0, 10.0);
        let matches = vec![
            // moved along with the object
            m(1.0, 1.0, 6.0, 1.0),
            m(2.0, 2.0, 7.0, 2.0),
            // left the second box
            m(3.0, 3.0, 30.0, 3.0),
            // unrelated point landing in the second box
            m(50.0, 50.0, 12.0, 5.0),
            // unrelated entirely
            m(50.0, 50.0, 60.0, 60.0),
        ];
        let t = MotionTerms::from_matches(&matches, &box1, &box2);
        assert!((t.iou - 2.0 / 4.0).abs() < EPS);
        assert!((t.transfer - 2.0 / 3.0).abs() < EPS);

        let t = MotionTerms::from_matches(&[], &box1, &box2);
        assert_eq!(t, MotionTerms::default());
    }

    #[test]
    fn identity_terms() {
        let box1 = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let t = MotionTerms::identity(&box1, &box1);
        assert!((t.iou - 1.0).abs() < EPS);
        assert!((t.transfer - 1.0).abs() < EPS);

        let box2 = BoundingBox::new(5.0, 0.0, 10.0, 10.0);
        let t = MotionTerms::identity(&box1, &box2);
        assert!((t.transfer - 0.5).abs() < EPS);
    }

    #[test]
    fn parsing() {
        let matches = parse_matches("1 2 3 4 0.5 7\n\n10 20 30 40 1.5 8\n").unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[1].source, Point2::new(10.0, 20.0));
        assert_eq!(matches[1].target, Point2::new(30.0, 40.0));
        assert!((matches[0].score - 0.5).abs() < EPS);

        assert!(parse_matches("1 2 3").is_err());
        assert!(parse_matches("1 2 x 4 5 6").is_err());
    }

    #[test]
    fn directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = MatchDirectory::new(dir.path());
        let path = store.file_name("video", 1, 3);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "1 2 3 4 0.9 0\n").unwrap();

        let image = Array3::<u8>::zeros((4, 4, 3));
        let pair = |frame1, frame2| FramePair {
            video_name: "video",
            frame1,
            frame2,
            image1: image.view(),
            image2: image.view(),
        };

        let direct = store.correspondences(&pair(1, 3)).unwrap();
        assert_eq!(direct[0].source, Point2::new(1.0, 2.0));

        let reverse = store.correspondences(&pair(3, 1)).unwrap();
        assert_eq!(reverse[0].source, Point2::new(3.0, 4.0));
        assert_eq!(reverse[0].target, Point2::new(1.0, 2.0));

        // served from memory once loaded
        fs::remove_file(&path).unwrap();
        assert!(store.correspondences(&pair(1, 3)).is_ok());
        assert!(store.correspondences(&pair(1, 2)).is_err());
    }
}
