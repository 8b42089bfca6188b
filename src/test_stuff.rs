use crate::detection::{Detection, Detections};
use crate::features::matching::{FramePair, PointMatch, PointMatcher};
use crate::features::reid::ReIdentifier;
use crate::utils::bbox::BoundingBox;
use crate::utils::embedding::{Embedding, FromVec};
use anyhow::{bail, Result};
use nalgebra::Point2;
use ndarray::{Array4, ArrayView3, Axis};
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Random detections with boxes inside a 48x48 frame, in random frame order
///
pub fn random_detections(n: usize, frames: u32, seed: u64) -> Detections {
    let mut rng = StdRng::seed_from_u64(seed);
    let frame = Uniform::new_inclusive(1, frames.max(1));
    let pos = Uniform::new(0.0f32, 30.0);
    let width = Uniform::new(4.0f32, 12.0);
    let height = Uniform::new(8.0f32, 16.0);
    let confidence = Uniform::new(0.3f32, 1.0);
    (0..n)
        .map(|_| {
            Detection::new(
                rng.sample(&frame),
                BoundingBox::new(
                    rng.sample(&pos),
                    rng.sample(&pos),
                    rng.sample(&width),
                    rng.sample(&height),
                ),
                rng.sample(&confidence),
            )
        })
        .collect()
}

/// Deterministic `(frames, height, width, 3)` video whose texture drifts along the frames
///
pub fn synthetic_video(frames: usize, height: usize, width: usize) -> Array4<u8> {
    Array4::from_shape_fn((frames, height, width, 3), |(t, y, x, c)| {
        ((x + 2 * y + 3 * t + 50 * c) % 200 + 30) as u8
    })
}

/// Re-identification stub: mean color of the crop
///
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanColorReId;

impl ReIdentifier for MeanColorReId {
    fn embed(&self, crop: ArrayView3<u8>) -> Result<Embedding> {
        let pixels = (crop.shape()[0] * crop.shape()[1]) as f32;
        if pixels == 0.0 {
            bail!("empty crop");
        }
        let mut v = vec![1.0];
        for channel in crop.axis_iter(Axis(2)) {
            v.push(channel.iter().map(|p| *p as f32).sum::<f32>() / pixels / 255.0);
        }
        Ok(Embedding::from_vec(v))
    }
}

/// [MeanColorReId](MeanColorReId) that counts the calls
///
#[derive(Debug, Default)]
pub struct CountingReId {
    calls: AtomicUsize,
}

impl CountingReId {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReIdentifier for CountingReId {
    fn embed(&self, crop: ArrayView3<u8>) -> Result<Embedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        MeanColorReId.embed(crop)
    }
}

/// Matcher stub: every pixel of the first frame moves by `(dx, dy)` per frame
///
#[derive(Debug, Clone, Copy)]
pub struct TranslationMatcher {
    dx: f32,
    dy: f32,
}

impl TranslationMatcher {
    pub fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy }
    }
}

impl PointMatcher for TranslationMatcher {
    fn correspondences(&self, pair: &FramePair) -> Result<Arc<Vec<PointMatch>>> {
        let gap = pair.frame2 as f32 - pair.frame1 as f32;
        let (height, width) = (pair.image1.shape()[0], pair.image1.shape()[1]);
        let mut matches = Vec::with_capacity(height * width);
        for y in 0..height {
            for x in 0..width {
                let source = Point2::new(x as f32, y as f32);
                let target = Point2::new(source.x + self.dx * gap, source.y + self.dy * gap);
                matches.push(PointMatch::new(source, target, 1.0));
            }
        }
        Ok(Arc::new(matches))
    }
}

/// Matcher stub that always fails
///
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingMatcher;

impl PointMatcher for FailingMatcher {
    fn correspondences(&self, pair: &FramePair) -> Result<Arc<Vec<PointMatch>>> {
        bail!("no matches for {} -> {}", pair.frame1, pair.frame2)
    }
}

/// Matcher stub failing for one frame pair (in either order) only
///
#[derive(Debug, Clone, Copy)]
pub struct SelectiveMatcher {
    frames: (u32, u32),
    inner: TranslationMatcher,
}

impl SelectiveMatcher {
    pub fn new(frame1: u32, frame2: u32) -> Self {
        Self {
            frames: (frame1, frame2),
            inner: TranslationMatcher::new(1.0, 0.0),
        }
    }
}

impl PointMatcher for SelectiveMatcher {
    fn correspondences(&self, pair: &FramePair) -> Result<Arc<Vec<PointMatch>>> {
        let key = (pair.frame1, pair.frame2);
        if key == self.frames || (key.1, key.0) == self.frames {
            bail!("matching failed for {} -> {}", pair.frame1, pair.frame2);
        }
        self.inner.correspondences(pair)
    }
}

/// Parses an edge file with the given field separator
///
pub fn read_edges(path: &Path, separator: char) -> Vec<(usize, usize, f32)> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| {
            let fields = line.split(separator).collect::<Vec<_>>();
            assert_eq!(fields.len(), 3, "malformed edge line {:?}", line);
            (
                fields[0].parse().unwrap(),
                fields[1].parse().unwrap(),
                fields[2].parse().unwrap(),
            )
        })
        .collect()
}

/// Writes an executable `/bin/sh` script
///
#[cfg(unix)]
pub fn shell_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(test)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
