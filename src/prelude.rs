pub use crate::cost::{Edge, EdgeClassifier, EdgeKind, WeightTable};
pub use crate::detection::{Detection, Detections};
pub use crate::features::matching::{FramePair, MatchDirectory, PointMatch, PointMatcher};
pub use crate::features::reid::{EmbeddingCache, ReIdentifier};
pub use crate::features::{FeatureVector, PairOutcome, PairwiseFeatures, FEATURE_LEN};
pub use crate::frames::FrameStack;
pub use crate::graph::batch::{BatchGraphBuilder, DEFAULT_BATCH_SIZE};
pub use crate::graph::resumable::ResumableGraphBuilder;
pub use crate::graph::{BuildReport, BuilderOptions, GraphFiles};
pub use crate::lookup::spatio_temporal_constraints::SpatioTemporalConstraints;
pub use crate::lookup::{CandidatePair, SpatialIndex};
pub use crate::pipeline::{execute, Collaborators, ExecutionReport};
pub use crate::settings::Settings;
pub use crate::solver::GraphSolver;
pub use crate::utils::bbox::BoundingBox;
pub use crate::utils::embedding::Embedding;
pub use crate::Errors;
