/// Point correspondences between frames and the motion terms computed from them
pub mod matching;

/// Appearance embeddings and their bounded memo
pub mod reid;

/// Box geometry terms
pub mod spatial;

use crate::cost::WeightTable;
use crate::detection::{Detection, Detections};
use crate::distance::cosine;
use crate::frames::FrameStack;
use crate::lookup::CandidatePair;
use crate::utils::bbox::BoundingBox;
use crate::utils::embedding::Embedding;
use crate::Errors;
use anyhow::{anyhow, Result};
use itertools::Itertools;
use matching::{FramePair, MotionTerms, PointMatcher};
use ndarray::ArrayView3;
use rayon::prelude::*;
use rayon::ThreadPool;
use reid::{embed_region, EmbeddingCache, ReIdentifier};
use spatial::SpatialTerms;
use std::collections::HashMap;
use std::sync::Arc;

/// Length of the pairwise feature vector
pub const FEATURE_LEN: usize = 8;

/// Pairwise features, in order:
/// * `0` - bias, always `1.0`;
/// * `1` - the lowest of the two detection confidences;
/// * `2` - center distance normalized by the mean box height;
/// * `3` - IoU of the boxes;
/// * `4` - absolute log ratio of the box heights;
/// * `5` - IoU of the correspondences falling into the boxes;
/// * `6` - share of the first box correspondences landing in the second box;
/// * `7` - cosine similarity of the appearance embeddings.
///
pub type FeatureVector = [f32; FEATURE_LEN];

/// Pair with its features and cost
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPair {
    pub pair: CandidatePair,
    pub features: FeatureVector,
    pub cost: f32,
}

/// Pair whose features could not be computed
///
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPair {
    pub pair: CandidatePair,
    pub frame1: u32,
    pub frame2: u32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Scored(ScoredPair),
    Skipped(SkippedPair),
}

/// Pairwise feature extractor.
///
/// Combines box geometry, motion consistency from the point correspondences and the
/// appearance similarity from the re-identification model. When an [EmbeddingCache](EmbeddingCache)
/// is attached, embeddings of detections with known ids are memoized in it.
///
pub struct PairwiseFeatures {
    reid: Arc<dyn ReIdentifier>,
    matcher: Arc<dyn PointMatcher>,
    cache: Option<Arc<EmbeddingCache>>,
    pool: Option<Arc<ThreadPool>>,
}

impl PairwiseFeatures {
    pub fn new(reid: Arc<dyn ReIdentifier>, matcher: Arc<dyn PointMatcher>) -> Self {
        Self {
            reid,
            matcher,
            cache: None,
            pool: None,
        }
    }

    /// Memoizes embeddings by detection id
    ///
    pub fn memoized(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Spreads batch computations over `threads` workers. `1` keeps everything on the caller thread.
    ///
    pub fn threads(mut self, threads: usize) -> Result<Self, Errors> {
        self.pool = if threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| Errors::WorkerPool(e.to_string()))?;
            Some(Arc::new(pool))
        } else {
            None
        };
        Ok(self)
    }

    pub fn cache(&self) -> Option<&EmbeddingCache> {
        self.cache.as_deref()
    }

    fn map_ordered<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(|| items.par_iter().map(&f).collect()),
            None => items.iter().map(&f).collect(),
        }
    }

    fn embedding(
        &self,
        id: Option<usize>,
        image: &ArrayView3<u8>,
        bbox: &BoundingBox,
    ) -> Result<Arc<Embedding>> {
        match (id, &self.cache) {
            (Some(id), Some(cache)) => {
                cache.get_or_try_insert(id, || embed_region(self.reid.as_ref(), image, bbox))
            }
            _ => Ok(Arc::new(embed_region(self.reid.as_ref(), image, bbox)?)),
        }
    }

    fn motion(
        &self,
        pair: &FramePair,
        box1: &BoundingBox,
        box2: &BoundingBox,
    ) -> Result<MotionTerms> {
        if pair.frame1 == pair.frame2 {
            return Ok(MotionTerms::identity(box1, box2));
        }
        let matches = self.matcher.correspondences(pair)?;
        Ok(MotionTerms::from_matches(&matches, box1, box2))
    }

    /// Puts the terms into the feature vector layout
    ///
    pub fn assemble(
        conf1: f32,
        conf2: f32,
        spatial: &SpatialTerms,
        motion: &MotionTerms,
        similarity: f32,
    ) -> FeatureVector {
        [
            1.0,
            conf1.min(conf2),
            spatial.distance,
            spatial.iou,
            spatial.height_ratio,
            motion.iou,
            motion.transfer,
            similarity,
        ]
    }

    /// Features of a single pair. `id1` and `id2` enable the embedding memo.
    ///
    #[allow(clippy::too_many_arguments)]
    pub fn extract(
        &self,
        video_name: &str,
        image1: ArrayView3<u8>,
        image2: ArrayView3<u8>,
        frame1: u32,
        frame2: u32,
        box1: &BoundingBox,
        box2: &BoundingBox,
        conf1: f32,
        conf2: f32,
        id1: Option<usize>,
        id2: Option<usize>,
    ) -> Result<FeatureVector> {
        let spatial = SpatialTerms::new(box1, box2)?;
        let pair = FramePair {
            video_name,
            frame1,
            frame2,
            image1: image1.reborrow(),
            image2: image2.reborrow(),
        };
        let motion = self.motion(&pair, box1, box2)?;
        let e1 = self.embedding(id1, &image1, box1)?;
        let e2 = self.embedding(id2, &image2, box2)?;
        Ok(Self::assemble(
            conf1,
            conf2,
            &spatial,
            &motion,
            cosine(&e1, &e2),
        ))
    }

    /// Features of the detections `i` and `j`, using the detection indices as memo ids
    ///
    pub fn extract_detections(
        &self,
        video_name: &str,
        detections: &Detections,
        frames: &FrameStack,
        i: usize,
        j: usize,
    ) -> Result<FeatureVector> {
        let (d1, d2) = (&detections[i], &detections[j]);
        self.extract(
            video_name,
            frames.frame(d1.frame)?,
            frames.frame(d2.frame)?,
            d1.frame,
            d2.frame,
            &d1.bbox,
            &d2.bbox,
            d1.confidence,
            d2.confidence,
            Some(i),
            Some(j),
        )
    }

    fn batch_pair(
        &self,
        video_name: &str,
        d1: &Detection,
        d2: &Detection,
        frames: &FrameStack,
        e1: Option<&Result<Arc<Embedding>, String>>,
        e2: Option<&Result<Arc<Embedding>, String>>,
    ) -> Result<FeatureVector> {
        let spatial = SpatialTerms::new(&d1.bbox, &d2.bbox)?;
        let pair = FramePair {
            video_name,
            frame1: d1.frame,
            frame2: d2.frame,
            image1: frames.frame(d1.frame)?.reborrow(),
            image2: frames.frame(d2.frame)?.reborrow(),
        };
        let motion = self.motion(&pair, &d1.bbox, &d2.bbox)?;
        let similarity = match (e1, e2) {
            (Some(Ok(e1)), Some(Ok(e2))) => cosine(e1, e2),
            (Some(Err(e)), _) | (_, Some(Err(e))) => return Err(anyhow!("embedding failed: {}", e)),
            _ => return Err(anyhow!("embedding is missing")),
        };
        Ok(Self::assemble(
            d1.confidence,
            d2.confidence,
            &spatial,
            &motion,
            similarity,
        ))
    }

    /// Scores a batch of candidate pairs.
    ///
    /// Every detection of the batch is embedded once and the embedding is shared by all of
    /// its pairs. The outcomes are returned in the order of `pairs`; pairs whose features
    /// cannot be computed are reported as [Skipped](PairOutcome::Skipped).
    ///
    pub fn score_batch(
        &self,
        video_name: &str,
        pairs: &[CandidatePair],
        detections: &Detections,
        frames: &FrameStack,
        weights: &WeightTable,
    ) -> Vec<PairOutcome> {
        let ids = pairs
            .iter()
            .flat_map(|p| [p.i, p.j])
            .sorted_unstable()
            .dedup()
            .collect::<Vec<_>>();

        let embeddings = self.map_ordered(&ids, |id| {
            let d = &detections[*id];
            frames
                .frame(d.frame)
                .map_err(anyhow::Error::from)
                .and_then(|image| self.embedding(Some(*id), &image, &d.bbox))
                .map_err(|e| format!("{:#}", e))
        });
        let embeddings = ids
            .into_iter()
            .zip(embeddings)
            .collect::<HashMap<_, _>>();

        self.map_ordered(pairs, |p| {
            let (d1, d2) = (&detections[p.i], &detections[p.j]);
            match self.batch_pair(
                video_name,
                d1,
                d2,
                frames,
                embeddings.get(&p.i),
                embeddings.get(&p.j),
            ) {
                Ok(features) => PairOutcome::Scored(ScoredPair {
                    pair: *p,
                    features,
                    cost: weights.cost(&features, p.delta),
                }),
                Err(e) => PairOutcome::Skipped(SkippedPair {
                    pair: *p,
                    frame1: d1.frame,
                    frame2: d2.frame,
                    reason: format!("{:#}", e),
                }),
            }
        })
    }
}
