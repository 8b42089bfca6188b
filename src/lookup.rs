/// Proximity constraints for candidate pairs
pub mod spatio_temporal_constraints;

use crate::detection::Detections;
use crate::utils::bbox::BoundingBox;
use spatio_temporal_constraints::SpatioTemporalConstraints;
use std::collections::BTreeMap;

/// Pair of detections that may be linked by an edge
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidatePair {
    pub i: usize,
    pub j: usize,
    /// frame gap between the detections
    pub delta: u32,
}

/// Frame-keyed lookup of detections.
///
/// Detections are grouped by frame number so that pair enumeration only visits the frames
/// within `dmax` of each detection instead of scanning every pair of detections.
///
#[derive(Debug, Clone)]
pub struct SpatialIndex<'a> {
    detections: &'a Detections,
    by_frame: BTreeMap<u32, Vec<usize>>,
    constraints: SpatioTemporalConstraints,
}

impl<'a> SpatialIndex<'a> {
    pub fn new(detections: &'a Detections) -> Self {
        let mut by_frame: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (index, d) in detections.iter().enumerate() {
            by_frame.entry(d.frame).or_default().push(index);
        }
        Self {
            detections,
            by_frame,
            constraints: SpatioTemporalConstraints::default(),
        }
    }

    /// Drops pairs whose boxes are too far from each other for their frame gap
    ///
    pub fn with_constraints(mut self, constraints: SpatioTemporalConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn detections(&self) -> &'a Detections {
        self.detections
    }

    /// Detection indices of a frame, in input order
    ///
    pub fn frame_detections(&self, frame: u32) -> &[usize] {
        self.by_frame.get(&frame).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of frames with at least one detection
    ///
    pub fn frames_count(&self) -> usize {
        self.by_frame.len()
    }

    /// Candidate pairs of the detection `i`: every `j > i` with frame gap below `dmax`,
    /// in ascending `j` order
    ///
    pub fn pairs_for(&self, i: usize, dmax: u32) -> Vec<CandidatePair> {
        if dmax == 0 {
            return vec![];
        }
        let left = &self.detections[i];
        let first = left.frame.saturating_sub(dmax - 1);
        let last = left.frame.saturating_add(dmax - 1);

        let mut pairs = self
            .by_frame
            .range(first..=last)
            .flat_map(|(_, indices)| indices.iter().copied())
            .filter(|j| *j > i)
            .filter_map(|j| {
                let right = &self.detections[j];
                let delta = left.delta(right);
                if self.constraints.is_empty()
                    || self.constraints.validate(
                        delta,
                        BoundingBox::relative_distance(&left.bbox, &right.bbox),
                    )
                {
                    Some(CandidatePair { i, j, delta })
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();
        pairs.sort_unstable_by_key(|p| p.j);
        pairs
    }

    /// Candidate pairs lazily, ordered by ascending `i` then ascending `j`
    ///
    pub fn pairs(&self, dmax: u32) -> impl Iterator<Item = CandidatePair> + '_ {
        (0..self.detections.len()).flat_map(move |i| self.pairs_for(i, dmax))
    }

    /// All candidate pairs `(i, j)`, `i < j`, with frame gap strictly below `dmax`
    ///
    pub fn get_all_pairs(&self, dmax: u32) -> Vec<CandidatePair> {
        self.pairs(dmax).collect()
    }
}
