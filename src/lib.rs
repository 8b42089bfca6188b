/// Detections and the frame-ordering checks performed on them
pub mod detection;

/// Distance and similarity functions for appearance embeddings
pub mod distance;

/// Pairwise feature extraction (spatial, motion, appearance)
pub mod features;

/// Frame stack access by 1-based frame numbers
pub mod frames;

/// Edge file writers: the batch builder and the resumable builder
pub mod graph;

/// Candidate pair enumeration
pub mod lookup;

/// Linear cost model and edge classification
pub mod cost;

/// End-to-end execution: settings, graph building and solver invocation
pub mod pipeline;

pub mod prelude;

/// Settings file loading
pub mod settings;

/// External graph solver invocation
pub mod solver;

/// Stub collaborators and synthetic data generators
pub mod test_stuff;

/// Bounding boxes and embedding helpers
pub mod utils;

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Errors {
    #[error("dmax must be in 1..=100, got {0}.")]
    DmaxOutOfRange(u32),
    #[error("Frame stack must have shape (frames, height, width, 3), got {0:?}.")]
    FrameStackShape(Vec<usize>),
    #[error("Detections must have shape (n, 6) [frame, x, y, w, h, score], got {0:?}.")]
    DetectionShape(Vec<usize>),
    #[error("Detection {index} has invalid frame number {frame}.")]
    InvalidFrameNumber { index: usize, frame: f32 },
    #[error("Frame {frame} is outside of the frame stack with {frames} frames.")]
    FrameOutOfRange { frame: u32, frames: usize },
    #[error("Weight table must have at least {dmax} rows of length {len}, got {shape:?}.")]
    WeightTableShape {
        dmax: u32,
        len: usize,
        shape: Vec<usize>,
    },
    #[error("Weight table {path:?} cannot be read: {reason}")]
    Weights { path: PathBuf, reason: String },
    #[error("Lifted edge start {lifted_start} must be smaller than dmax {dmax}.")]
    LiftedStartOutOfRange { lifted_start: u32, dmax: u32 },
    #[error("Batch size must be positive.")]
    ZeroBatchSize,
    #[error("Required path {0:?} does not exist.")]
    MissingPath(PathBuf),
    #[error("Required binary {0:?} does not exist.")]
    MissingBinary(PathBuf),
    #[error("Settings file {path:?} is malformed: {reason}")]
    MalformedSettings { path: PathBuf, reason: String },
    #[error("Checkpoint {path:?} cannot be used: {reason}")]
    Checkpoint { path: PathBuf, reason: String },
    #[error("Graph solver exited with {status}.")]
    SolverFailed { status: ExitStatus, stdout: String },
    #[error("Graph solver did not finish within {timeout:?}.")]
    SolverTimedOut { timeout: Duration },
    #[error("Worker pool cannot be created: {0}")]
    WorkerPool(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub(crate) const EPS: f32 = 0.00001;
