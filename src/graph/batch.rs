use crate::cost::{EdgeKind, WeightTable};
use crate::detection::Detections;
use crate::features::{PairOutcome, PairwiseFeatures};
use crate::frames::FrameStack;
use crate::graph::{
    validate_dmax, write_config, BuildReport, BuilderOptions, EdgeWriter, GraphFiles,
};
use crate::lookup::SpatialIndex;
use crate::Errors;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Number of candidate pairs scored together by default
pub const DEFAULT_BATCH_SIZE: usize = 700;

/// Graph builder that scores the candidate pairs in batches and streams every edge to disk
/// as soon as its batch is scored.
///
/// The files are placed in `<data_root>/BATCH_GG_<video>_dmax_<dmax>/`. Each line is
/// `i j cost`. A build interrupted after any batch leaves complete lines only, a subset of
/// the edges of a full build. There is no resume: every build starts from scratch.
///
pub struct BatchGraphBuilder {
    data_root: PathBuf,
    video_name: String,
    dmax: u32,
    features: PairwiseFeatures,
    options: BuilderOptions,
}

impl BatchGraphBuilder {
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

    pub fn dmax(&self) -> u32 {
        self.dmax
    }

    pub fn directory(&self) -> PathBuf {
        self.data_root
            .join(format!("BATCH_GG_{}_dmax_{}", self.video_name, self.dmax))
    }

    pub fn get_file_names(&self) -> GraphFiles {
        GraphFiles::in_dir(self.directory())
    }

    /// Builds the graph files, overwriting the previous ones
    ///
    pub fn build(
        &self,
        detections: &Detections,
        frames: &FrameStack,
        weights: &WeightTable,
        batch_size: usize,
    ) -> Result<BuildReport, Errors> {
        if batch_size == 0 {
            return Err(Errors::ZeroBatchSize);
        }
        if weights.rows() < self.dmax as usize {
            return Err(Errors::WeightTableShape {
                dmax: self.dmax,
                len: crate::features::FEATURE_LEN,
                shape: vec![weights.rows(), crate::features::FEATURE_LEN],
            });
        }
        frames.check_detections(detections)?;
        let classifier = self.options.classifier(self.dmax)?;

        let mut index = SpatialIndex::new(detections);
        if let Some(constraints) = self.options.get_constraints() {
            index = index.with_constraints(constraints.clone());
        }
        let pairs = index.get_all_pairs(self.dmax);

        fs::create_dir_all(self.directory())?;
        let files = self.get_file_names();
        let mut edges = EdgeWriter::create(&files.edges, ' ', None)?;
        let mut lifted_edges = EdgeWriter::create(&files.lifted_edges, ' ', None)?;
        write_config(&files.config, detections.len())?;

        let mut report = BuildReport {
            pairs: pairs.len(),
            ..Default::default()
        };
        info!(
            "Building graph of {} with {} detections, {} candidate pairs, dmax {}, lifted edges from {}",
            self.video_name,
            detections.len(),
            pairs.len(),
            self.dmax,
            classifier.lifted_start()
        );

        for (batch_no, batch) in pairs.chunks(batch_size).enumerate() {
            let started = Instant::now();
            let start = batch_no * batch_size;
            let outcomes = self
                .features
                .score_batch(&self.video_name, batch, detections, frames, weights);
            for outcome in outcomes {
                match outcome {
                    PairOutcome::Scored(s) => {
                        let edge = classifier.classify(s.pair.i, s.pair.j, s.pair.delta, s.cost);
                        match edge.kind {
                            EdgeKind::Normal => {
                                edges.write(&edge)?;
                                report.edges += 1;
                            }
                            EdgeKind::Lifted => {
                                lifted_edges.write(&edge)?;
                                report.lifted_edges += 1;
                            }
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
            info!(
                "Finished batch {} .. {}, total pairs: {}, elapsed: {:?}",
                start,
                start + batch.len(),
                pairs.len(),
                started.elapsed()
            );
        }
        report.complete = true;
        Ok(report)
    }
}
