use crate::solver::{GraphSolver, DEFAULT_SOLVER_TIMEOUT};
use crate::Errors;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the solver assignment file inside the data root
pub const OUTPUT_FILE: &str = "output.txt";

/// Directory inside the data root holding the precomputed deep matching output
pub const MATCHES_DIR: &str = "deep_matching";

/// Installation settings, a JSON object:
///
/// ```json
/// {
///     "data_root": "/data/tracking",
///     "deepmatch": "/opt/deepmatching/deepmatching-static",
///     "graph_solver": "/opt/solver/lifted-multicut",
///     "solver_timeout_secs": 3600
/// }
/// ```
///
/// `solver_timeout_secs` is optional.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub data_root: PathBuf,
    pub deepmatch: PathBuf,
    pub graph_solver: PathBuf,
    #[serde(default)]
    pub solver_timeout_secs: Option<u64>,
}

impl Settings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Errors> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Errors::MissingPath(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| Errors::MalformedSettings {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Both binaries must exist
    ///
    pub fn validate(&self) -> Result<(), Errors> {
        for binary in [&self.deepmatch, &self.graph_solver] {
            if !binary.is_file() {
                return Err(Errors::MissingBinary(binary.clone()));
            }
        }
        Ok(())
    }

    pub fn solver_timeout(&self) -> Duration {
        self.solver_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SOLVER_TIMEOUT)
    }

    pub fn solver(&self) -> GraphSolver {
        GraphSolver::new(&self.graph_solver).timeout(self.solver_timeout())
    }

    pub fn output_file(&self) -> PathBuf {
        self.data_root.join(OUTPUT_FILE)
    }

    pub fn matches_dir(&self) -> PathBuf {
        self.data_root.join(MATCHES_DIR)
    }
}

#[cfg(test)]
mod tests {
    use crate::settings::Settings;
    use crate::solver::DEFAULT_SOLVER_TIMEOUT;
    use crate::Errors;
    use std::fs;
    use std::time::Duration;

    #[test]
    fn load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.txt");
        fs::write(
            &path,
            r#"{"data_root": "/tmp/root", "deepmatch": "/bin/dm", "graph_solver": "/bin/gs"}"#,
        )
        .unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.data_root.to_str(), Some("/tmp/root"));
        assert_eq!(settings.solver_timeout(), DEFAULT_SOLVER_TIMEOUT);
        assert_eq!(settings.output_file().to_str(), Some("/tmp/root/output.txt"));

        fs::write(
            &path,
            r#"{"data_root": "r", "deepmatch": "d", "graph_solver": "g", "solver_timeout_secs": 5}"#,
        )
        .unwrap();
        assert_eq!(
            Settings::load(&path).unwrap().solver_timeout(),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.txt");
        fs::write(&path, r#"{"data_root": "/tmp/root", "graph_solver": "/bin/gs"}"#).unwrap();
        match Settings::load(&path) {
            Err(Errors::MalformedSettings { reason, .. }) => assert!(reason.contains("deepmatch")),
            other => panic!("unexpected result {:?}", other),
        }
        assert!(matches!(
            Settings::load(dir.path().join("none.txt")),
            Err(Errors::MissingPath(_))
        ));
    }

    #[test]
    fn validate() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("bin");
        fs::write(&binary, "").unwrap();
        let mut settings = Settings {
            data_root: dir.path().join("root"),
            deepmatch: binary.clone(),
            graph_solver: binary,
            solver_timeout_secs: None,
        };
        assert!(settings.validate().is_ok());
        settings.deepmatch = dir.path().join("missing");
        assert!(matches!(
            settings.validate(),
            Err(Errors::MissingBinary(p)) if p == dir.path().join("missing")
        ));
    }
}
