/// Batched graph builder writing the edges as they are scored
pub mod batch;

/// Checkpoint manifest and `.npy` backups of the resumable builder
pub mod checkpoint;

/// Checkpointed graph builder working detection by detection
pub mod resumable;

use crate::cost::{Edge, EdgeClassifier};
use crate::lookup::spatio_temporal_constraints::SpatioTemporalConstraints;
use crate::Errors;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Largest frame gap accepted by the builders
pub const MAX_DMAX: u32 = 100;

pub const EDGES_FILE: &str = "edges.txt";
pub const LIFTED_EDGES_FILE: &str = "lifted_edges.txt";
pub const CONFIG_FILE: &str = "config.txt";

pub fn validate_dmax(dmax: u32) -> Result<(), Errors> {
    if dmax == 0 || dmax > MAX_DMAX {
        return Err(Errors::DmaxOutOfRange(dmax));
    }
    Ok(())
}

/// Paths of the files handed over to the graph solver
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphFiles {
    pub edges: PathBuf,
    pub lifted_edges: PathBuf,
    pub config: PathBuf,
}

impl GraphFiles {
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            edges: dir.join(EDGES_FILE),
            lifted_edges: dir.join(LIFTED_EDGES_FILE),
            config: dir.join(CONFIG_FILE),
        }
    }

    pub fn exist(&self) -> bool {
        self.edges.is_file() && self.lifted_edges.is_file() && self.config.is_file()
    }
}

/// Options shared by the builders
///
#[derive(Debug, Clone, Default)]
pub struct BuilderOptions {
    lifted_start: Option<u32>,
    constraints: Option<SpatioTemporalConstraints>,
}

impl BuilderOptions {
    /// Frame gap from which the edges become lifted, `floor(dmax / 2)` when not set
    ///
    pub fn lifted_start(mut self, lifted_start: u32) -> Self {
        self.lifted_start = Some(lifted_start);
        self
    }

    /// Proximity pruning of the candidate pairs
    ///
    pub fn constraints(mut self, constraints: SpatioTemporalConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    pub fn get_constraints(&self) -> Option<&SpatioTemporalConstraints> {
        self.constraints.as_ref()
    }

    pub fn classifier(&self, dmax: u32) -> Result<EdgeClassifier, Errors> {
        match self.lifted_start {
            Some(lifted_start) => EdgeClassifier::with_lifted_start(dmax, lifted_start),
            None => Ok(EdgeClassifier::new(dmax)),
        }
    }
}

/// Counters of a finished (or interrupted) build
///
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// candidate pairs visited
    pub pairs: usize,
    pub edges: usize,
    pub lifted_edges: usize,
    /// pairs whose features failed
    pub skipped: usize,
    /// outer index the run continued after, if it was resumed
    pub resumed_from: Option<usize>,
    /// the final files are written
    pub complete: bool,
}

/// Line oriented edge file writer. Every line is flushed as soon as it is written, so the
/// file always holds complete lines only.
///
pub(crate) struct EdgeWriter {
    writer: BufWriter<File>,
    separator: char,
    precision: Option<usize>,
}

impl EdgeWriter {
    /// Truncates or creates the file
    ///
    pub fn create(path: &Path, separator: char, precision: Option<usize>) -> Result<Self, Errors> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
            separator,
            precision,
        })
    }

    pub fn write(&mut self, edge: &Edge) -> Result<(), Errors> {
        let s = self.separator;
        match self.precision {
            Some(p) => writeln!(self.writer, "{}{s}{}{s}{:.p$}", edge.i, edge.j, edge.cost)?,
            None => writeln!(self.writer, "{}{s}{}{s}{}", edge.i, edge.j, edge.cost)?,
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes the config file: the number of detections
///
pub(crate) fn write_config(path: &Path, detections: usize) -> Result<(), Errors> {
    fs::write(path, format!("{}\n", detections))?;
    Ok(())
}
