use crate::graph::GraphFiles;
use crate::Errors;
use crossbeam::channel::{bounded, RecvTimeoutError};
use log::{debug, info, warn};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Time the solver may run when no timeout is configured
pub const DEFAULT_SOLVER_TIMEOUT: Duration = Duration::from_secs(24 * 3600);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Finished solver run
///
#[derive(Debug, Clone)]
pub struct SolverOutput {
    pub status: ExitStatus,
    /// captured standard output
    pub stdout: String,
    /// assignment file passed to the solver
    pub output: PathBuf,
    pub elapsed: Duration,
}

/// External combinatorial solver started as
/// `<binary> <edge_file> <lifted_edge_file> <config_file> <output_file>`.
///
/// Exit status `0` means the assignment file was produced.
///
#[derive(Debug, Clone)]
pub struct GraphSolver {
    binary: PathBuf,
    timeout: Duration,
}

impl GraphSolver {
    pub fn new<P: AsRef<Path>>(binary: P) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
            timeout: DEFAULT_SOLVER_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Runs the solver and waits for it. When the timeout expires the process is killed.
    ///
    pub fn solve(&self, files: &GraphFiles, output: &Path) -> Result<SolverOutput, Errors> {
        if !self.binary.is_file() {
            return Err(Errors::MissingBinary(self.binary.clone()));
        }
        info!(
            "Running graph solver {:?} on {:?}, output: {:?}",
            self.binary, files.edges, output
        );
        let started = Instant::now();
        let mut child = Command::new(&self.binary)
            .arg(&files.edges)
            .arg(&files.lifted_edges)
            .arg(&files.config)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()?;

        let (tx, rx) = bounded(1);
        let reader = child.stdout.take().map(|mut stdout| {
            thread::spawn(move || {
                let mut buf = String::new();
                let res = stdout.read_to_string(&mut buf).map(|_| buf);
                let _ = tx.send(res);
            })
        });

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                warn!(
                    "Graph solver {:?} did not finish within {:?}, killing it",
                    self.binary, self.timeout
                );
                let _ = child.kill();
                let _ = child.wait();
                return Err(Errors::SolverTimedOut {
                    timeout: self.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        // a process started by the solver may keep the pipe open after the solver exits
        let stdout = match rx.recv_timeout(self.timeout.saturating_sub(started.elapsed())) {
            Ok(res) => res?,
            Err(RecvTimeoutError::Disconnected) => String::new(),
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Output of graph solver {:?} was not closed within {:?}",
                    self.binary, self.timeout
                );
                return Err(Errors::SolverTimedOut {
                    timeout: self.timeout,
                });
            }
        };
        if let Some(reader) = reader {
            let _ = reader.join();
        }
        debug!("Graph solver output:\n{}", stdout);

        if !status.success() {
            return Err(Errors::SolverFailed { status, stdout });
        }
        let elapsed = started.elapsed();
        info!("Graph solver finished in {:?}", elapsed);
        Ok(SolverOutput {
            status,
            stdout,
            output: output.to_path_buf(),
            elapsed,
        })
    }
}
