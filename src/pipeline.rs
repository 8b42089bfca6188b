use crate::cost::WeightTable;
use crate::detection::Detections;
use crate::features::matching::{MatchDirectory, PointMatcher};
use crate::features::reid::{EmbeddingCache, ReIdentifier, DEFAULT_EMBEDDING_CACHE_CAPACITY};
use crate::features::{PairwiseFeatures, FEATURE_LEN};
use crate::frames::FrameStack;
use crate::graph::batch::BatchGraphBuilder;
use crate::graph::{validate_dmax, BuildReport, GraphFiles};
use crate::settings::Settings;
use crate::solver::SolverOutput;
use crate::Errors;
use log::info;
use ndarray::{ArrayView2, ArrayView4};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Models and parameters used by [execute](execute)
///
pub struct Collaborators {
    reid: Arc<dyn ReIdentifier>,
    matcher: Option<Arc<dyn PointMatcher>>,
    weights: Option<WeightTable>,
    threads: usize,
    cache_capacity: usize,
}

impl Collaborators {
    /// Precomputed correspondences from `<data_root>/deep_matching`, weights from
    /// `<data_root>/weights_dmax_<dmax>.npy`, one worker per core
    ///
    pub fn new(reid: Arc<dyn ReIdentifier>) -> Self {
        Self {
            reid,
            matcher: None,
            weights: None,
            threads: num_cpus::get(),
            cache_capacity: DEFAULT_EMBEDDING_CACHE_CAPACITY,
        }
    }

    pub fn matcher(mut self, matcher: Arc<dyn PointMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn weights(mut self, weights: WeightTable) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }
}

/// Default location of the weight table for `dmax`
///
pub fn default_weights_file(data_root: &Path, dmax: u32) -> PathBuf {
    data_root.join(format!("weights_dmax_{}.npy", dmax))
}

/// Result of a complete run
///
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub build: BuildReport,
    pub files: GraphFiles,
    pub solver: SolverOutput,
}

/// Builds the graph of a video and runs the solver on it.
///
/// # Parameters
/// * `video_folder` - folder with the video frames;
/// * `x` - the frames, `(frames, height, width, 3)`;
/// * `dt` - the detections, `(n, 6)` rows `[frame, x, y, w, h, score]`, 1-based frames;
/// * `video_name` - name used for the output locations;
/// * `dmax` - largest frame gap (exclusive) between linked detections, `1..=100`;
/// * `settings_file` - JSON [Settings](Settings);
/// * `batch_size` - pairs scored together, usually [DEFAULT_BATCH_SIZE](crate::graph::batch::DEFAULT_BATCH_SIZE).
///
/// Every argument and the settings are checked before anything is written. The solver
/// output goes to `<data_root>/output.txt`.
///
#[allow(clippy::too_many_arguments)]
pub fn execute(
    video_folder: &Path,
    x: ArrayView4<u8>,
    dt: ArrayView2<f32>,
    video_name: &str,
    dmax: u32,
    settings_file: &Path,
    batch_size: usize,
    collaborators: Collaborators,
) -> Result<ExecutionReport, Errors> {
    validate_dmax(dmax)?;
    let frames = FrameStack::new(x)?;
    let detections = Detections::from_array(dt)?;
    if !video_folder.is_dir() {
        return Err(Errors::MissingPath(video_folder.to_path_buf()));
    }
    if !settings_file.is_file() {
        return Err(Errors::MissingPath(settings_file.to_path_buf()));
    }
    if batch_size == 0 {
        return Err(Errors::ZeroBatchSize);
    }
    frames.check_detections(&detections)?;

    let settings = Settings::load(settings_file)?;
    settings.validate()?;

    let Collaborators {
        reid,
        matcher,
        weights,
        threads,
        cache_capacity,
    } = collaborators;
    let weights = match weights {
        Some(w) => w,
        None => WeightTable::load_npy(default_weights_file(&settings.data_root, dmax), dmax)?,
    };
    if weights.rows() < dmax as usize {
        return Err(Errors::WeightTableShape {
            dmax,
            len: FEATURE_LEN,
            shape: vec![weights.rows(), FEATURE_LEN],
        });
    }

    fs::create_dir_all(&settings.data_root)?;
    info!(
        "Tracking {} from {:?}: {} detections on {} frames, dmax {}",
        video_name,
        video_folder,
        detections.len(),
        frames.len(),
        dmax
    );

    let matcher: Arc<dyn PointMatcher> = match matcher {
        Some(m) => m,
        None => Arc::new(MatchDirectory::new(settings.matches_dir())),
    };
    let features = PairwiseFeatures::new(reid, matcher)
        .memoized(Arc::new(EmbeddingCache::new(cache_capacity)))
        .threads(threads)?;

    let builder = BatchGraphBuilder::new(&settings.data_root, video_name, dmax, features)?;
    let build = builder.build(&detections, &frames, &weights, batch_size)?;
    let files = builder.get_file_names();

    let solver = settings.solver().solve(&files, &settings.output_file())?;
    Ok(ExecutionReport {
        build,
        files,
        solver,
    })
}
