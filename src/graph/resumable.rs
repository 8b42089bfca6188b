use crate::cost::{EdgeKind, WeightTable};
use crate::detection::Detections;
use crate::features::{PairOutcome, PairwiseFeatures, FEATURE_LEN};
use crate::frames::FrameStack;
use crate::graph::checkpoint::{CheckpointKey, CheckpointStore};
use crate::graph::{
    validate_dmax, write_config, BuildReport, BuilderOptions, EdgeWriter, GraphFiles,
};
use crate::lookup::CandidatePair;
use crate::utils::bbox::BoundingBox;
use crate::Errors;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Graph builder that walks the detections one by one and saves a checkpoint after each of
/// them, so an interrupted run continues where it stopped.
///
/// For every detection `i` the pairs `(i, j)`, `j > i`, with a frame gap below `dmax` are
/// scored. When the detections are frame-ordered the scan of `j` stops at the first
/// detection that is too far; otherwise such detections are skipped one by one.
///
/// The edges are kept in memory and written to `<data_root>/graph_generator/<video>/`
/// as `i;j;cost` lines when the last detection is processed.
///
pub struct ResumableGraphBuilder {
    data_root: PathBuf,
    video_name: String,
    dmax: u32,
    features: PairwiseFeatures,
    options: BuilderOptions,
}

impl ResumableGraphBuilder {
    pub fn new<P: AsRef<Path>>(
        data_root: P,
        video_name: &str,
        dmax: u32,
        features: PairwiseFeatures,
    ) -> Result<Self, Errors> {
        validate_dmax(dmax)?;
        Ok(Self {
            data_root: data_root.as_ref().to_path_buf(),
            video_name: video_name.to_string(),
            dmax,
            features,
            options: BuilderOptions::default(),
        })
    }

    pub fn with_options(mut self, options: BuilderOptions) -> Result<Self, Errors> {
        options.classifier(self.dmax)?;
        self.options = options;
        Ok(self)
    }

    pub fn directory(&self) -> PathBuf {
        self.data_root
            .join("graph_generator")
            .join(&self.video_name)
    }

    pub fn get_file_names(&self) -> GraphFiles {
        GraphFiles::in_dir(self.directory())
    }

    pub fn checkpoints(&self) -> CheckpointStore {
        CheckpointStore::new(self.directory())
    }

    fn pairs_of(&self, i: usize, detections: &Detections, ordered: bool) -> Vec<CandidatePair> {
        let left = &detections[i];
        let mut pairs = Vec::new();
        for j in i + 1..detections.len() {
            let right = &detections[j];
            let delta = left.delta(right);
            if delta >= self.dmax {
                if ordered {
                    break;
                }
                continue;
            }
            if let Some(constraints) = self.options.get_constraints() {
                if !constraints.is_empty()
                    && !constraints.validate(
                        delta,
                        BoundingBox::relative_distance(&left.bbox, &right.bbox),
                    )
                {
                    continue;
                }
            }
            pairs.push(CandidatePair { i, j, delta });
        }
        pairs
    }

    /// Builds the graph, continuing from the newest checkpoint if there is one
    ///
    pub fn build(
        &self,
        detections: &Detections,
        frames: &FrameStack,
        weights: &WeightTable,
    ) -> Result<BuildReport, Errors> {
        self.build_through(detections, frames, weights, usize::MAX)
    }

    /// Processes the detections up to `last` (inclusive) and stops. The final files are
    /// written only when every detection has been processed.
    ///
    /// The pair and skip counters of the report cover this run only, the edge counters
    /// include the edges restored from the checkpoint.
    ///
    pub fn build_through(
        &self,
        detections: &Detections,
        frames: &FrameStack,
        weights: &WeightTable,
        last: usize,
    ) -> Result<BuildReport, Errors> {
        if weights.rows() < self.dmax as usize {
            return Err(Errors::WeightTableShape {
                dmax: self.dmax,
                len: FEATURE_LEN,
                shape: vec![weights.rows(), FEATURE_LEN],
            });
        }
        frames.check_detections(detections)?;
        let classifier = self.options.classifier(self.dmax)?;

        let n = detections.len();
        let store = self.checkpoints();
        let key = CheckpointKey::new(detections, self.dmax, classifier.lifted_start());
        let (start, mut edges, mut lifted_edges, resumed_from) =
            match store.load(&key)? {
                Some(cp) => {
                    info!(
                        "Resuming graph of {} after detection {} with {} edges and {} lifted edges",
                        self.video_name,
                        cp.index,
                        cp.edges.len(),
                        cp.lifted_edges.len()
                    );
                    (cp.index + 1, cp.edges, cp.lifted_edges, Some(cp.index))
                }
                None => (0, Vec::new(), Vec::new(), None),
            };
        fs::create_dir_all(self.directory())?;

        let ordered = detections.is_frame_ordered();
        if !ordered {
            debug!("Detections of {} are not frame-ordered", self.video_name);
        }

        let mut report = BuildReport {
            resumed_from,
            ..Default::default()
        };
        let end = n.min(last.saturating_add(1));
        for i in start..end {
            let pairs = self.pairs_of(i, detections, ordered);
            report.pairs += pairs.len();
            let outcomes = self
                .features
                .score_batch(&self.video_name, &pairs, detections, frames, weights);
            for outcome in outcomes {
                match outcome {
                    PairOutcome::Scored(s) => {
                        let edge = classifier.classify(s.pair.i, s.pair.j, s.pair.delta, s.cost);
                        match edge.kind {
                            EdgeKind::Normal => edges.push(edge),
                            EdgeKind::Lifted => lifted_edges.push(edge),
                        }
                    }
                    PairOutcome::Skipped(s) => {
                        warn!(
                            "Pair ({}, {}) skipped, frames {} -> {}, delta {}: {}",
                            s.pair.i, s.pair.j, s.frame1, s.frame2, s.pair.delta, s.reason
                        );
                        report.skipped += 1;
                    }
                }
            }
            store.save(i, &key, &edges, &lifted_edges)?;
            debug!("Detection {} of {} done, {} pairs", i, n, pairs.len());
        }
        report.edges = edges.len();
        report.lifted_edges = lifted_edges.len();

        if end < n {
            info!(
                "Graph of {} stopped after detection {} of {}",
                self.video_name,
                end.saturating_sub(1),
                n
            );
            return Ok(report);
        }

        let files = self.get_file_names();
        let mut writer = EdgeWriter::create(&files.edges, ';', Some(6))?;
        for e in &edges {
            writer.write(e)?;
        }
        let mut writer = EdgeWriter::create(&files.lifted_edges, ';', Some(6))?;
        for e in &lifted_edges {
            writer.write(e)?;
        }
        write_config(&files.config, n)?;
        info!(
            "Graph of {} is written to {:?}: {} edges, {} lifted edges",
            self.video_name,
            self.directory(),
            edges.len(),
            lifted_edges.len()
        );
        report.complete = true;
        Ok(report)
    }
}
