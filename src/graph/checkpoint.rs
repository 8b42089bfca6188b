use crate::cost::{Edge, EdgeKind};
use crate::detection::Detections;
use crate::Errors;
use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "checkpoint.json";

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Inputs a checkpoint was made for. A build continues from a checkpoint only when
/// every field matches.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointKey {
    pub detections: usize,
    /// FNV-1a over the frames, boxes and confidences
    pub fingerprint: u64,
    pub dmax: u32,
    pub lifted_start: u32,
}

impl CheckpointKey {
    pub fn new(detections: &Detections, dmax: u32, lifted_start: u32) -> Self {
        let fingerprint = detections
            .iter()
            .flat_map(|d| {
                [
                    d.frame,
                    d.bbox.x().to_bits(),
                    d.bbox.y().to_bits(),
                    d.bbox.width().to_bits(),
                    d.bbox.height().to_bits(),
                    d.confidence.to_bits(),
                ]
            })
            .flat_map(u32::to_le_bytes)
            .fold(FNV_OFFSET, |h, b| (h ^ b as u64).wrapping_mul(FNV_PRIME));
        Self {
            detections: detections.len(),
            fingerprint,
            dmax,
            lifted_start,
        }
    }
}

/// Last completed outer index and the backups holding the edges accumulated up to it
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub index: usize,
    #[serde(flatten)]
    pub key: CheckpointKey,
    pub edges: String,
    pub lifted_edges: String,
}

/// Restored state of an interrupted build
///
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub index: usize,
    pub edges: Vec<Edge>,
    pub lifted_edges: Vec<Edge>,
}

/// Backup directory of the resumable builder.
///
/// Edges are saved as `(N, 3)` `f64` arrays `[i, j, cost]` in `edges_<index>.npy` and
/// `lifted_edges_<index>.npy`. The manifest is replaced atomically after the arrays are
/// written, so it never points to a partial backup.
///
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn edges_file(index: usize) -> String {
        format!("edges_{:06}.npy", index)
    }

    pub fn lifted_edges_file(index: usize) -> String {
        format!("lifted_edges_{:06}.npy", index)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    fn is_backup(name: &str) -> bool {
        (name.starts_with("edges_") || name.starts_with("lifted_edges_")) && name.ends_with(".npy")
    }

    fn error(path: &Path, reason: impl ToString) -> Errors {
        Errors::Checkpoint {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn manifest(&self) -> Result<Option<Manifest>, Errors> {
        let path = self.manifest_path();
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| Self::error(&path, e))
    }

    fn write_edges(path: &Path, edges: &[Edge]) -> Result<(), Errors> {
        let data = edges
            .iter()
            .flat_map(|e| [e.i as f64, e.j as f64, e.cost as f64])
            .collect::<Vec<_>>();
        let array =
            Array2::from_shape_vec((edges.len(), 3), data).map_err(|e| Self::error(path, e))?;
        ndarray_npy::write_npy(path, &array).map_err(|e| Self::error(path, e))
    }

    fn read_edges(path: &Path, kind: EdgeKind) -> Result<Vec<Edge>, Errors> {
        let array: Array2<f64> = ndarray_npy::read_npy(path).map_err(|e| Self::error(path, e))?;
        if array.ncols() != 3 {
            return Err(Self::error(
                path,
                format!("expected (N, 3) array, got {:?}", array.shape()),
            ));
        }
        Ok(array
            .rows()
            .into_iter()
            .map(|r| Edge {
                i: r[0] as usize,
                j: r[1] as usize,
                cost: r[2] as f32,
                kind,
            })
            .collect())
    }

    /// Saves the edges accumulated up to `index`, then removes every other backup
    ///
    pub fn save(
        &self,
        index: usize,
        key: &CheckpointKey,
        edges: &[Edge],
        lifted_edges: &[Edge],
    ) -> Result<(), Errors> {
        fs::create_dir_all(&self.dir)?;
        let manifest = Manifest {
            index,
            key: *key,
            edges: Self::edges_file(index),
            lifted_edges: Self::lifted_edges_file(index),
        };
        Self::write_edges(&self.dir.join(&manifest.edges), edges)?;
        Self::write_edges(&self.dir.join(&manifest.lifted_edges), lifted_edges)?;

        let path = self.manifest_path();
        let tmp = path.with_extension("json.tmp");
        let text = serde_json::to_string_pretty(&manifest).map_err(|e| Self::error(&path, e))?;
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &path)?;

        // also catches backups left behind by a run interrupted right after the rename
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if Self::is_backup(&name)
                && name != manifest.edges.as_str()
                && name != manifest.lifted_edges.as_str()
                && entry.file_type()?.is_file()
            {
                fs::remove_file(entry.path())?;
            }
        }
        debug!("Checkpoint {} saved in {:?}", index, self.dir);
        Ok(())
    }

    /// Restores the newest checkpoint. Checkpoints made for other detections, `dmax` or
    /// lifted start are rejected.
    ///
    pub fn load(&self, key: &CheckpointKey) -> Result<Option<Checkpoint>, Errors> {
        let manifest = match self.manifest()? {
            Some(m) => m,
            None => return Ok(None),
        };
        let path = self.manifest_path();
        if manifest.key != *key {
            return Err(Self::error(
                &path,
                format!("made for {:?}, requested {:?}", manifest.key, key),
            ));
        }
        if manifest.index >= key.detections {
            return Err(Self::error(
                &path,
                format!("index {} is out of range", manifest.index),
            ));
        }
        Ok(Some(Checkpoint {
            index: manifest.index,
            edges: Self::read_edges(&self.dir.join(&manifest.edges), EdgeKind::Normal)?,
            lifted_edges: Self::read_edges(
                &self.dir.join(&manifest.lifted_edges),
                EdgeKind::Lifted,
            )?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::cost::{Edge, EdgeKind};
    use crate::graph::checkpoint::{CheckpointKey, CheckpointStore};
    use crate::test_stuff::random_detections;
    use crate::Errors;
    use std::fs;

    fn edge(i: usize, j: usize, cost: f32, kind: EdgeKind) -> Edge {
        Edge { i, j, cost, kind }
    }

    fn key(detections: usize, dmax: u32) -> CheckpointKey {
        CheckpointKey {
            detections,
            fingerprint: 7,
            dmax,
            lifted_start: dmax / 2,
        }
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert!(store.load(&key(10, 4)).unwrap().is_none());

        let edges = vec![
            edge(0, 1, -1.5, EdgeKind::Normal),
            edge(1, 2, 0.25, EdgeKind::Normal),
        ];
        let lifted = vec![edge(0, 2, 0.0, EdgeKind::Lifted)];
        store.save(0, &key(10, 4), &edges[..1], &[]).unwrap();
        store.save(1, &key(10, 4), &edges, &lifted).unwrap();

        let cp = store.load(&key(10, 4)).unwrap().unwrap();
        assert_eq!(cp.index, 1);
        assert_eq!(cp.edges, edges);
        assert_eq!(cp.lifted_edges, lifted);

        // only the newest backups remain
        assert!(!dir.path().join(CheckpointStore::edges_file(0)).exists());
        assert!(!dir.path().join(CheckpointStore::lifted_edges_file(0)).exists());
        assert!(dir.path().join(CheckpointStore::edges_file(1)).exists());
        assert!(!store.manifest_path().with_extension("json.tmp").exists());
    }

    #[test]
    fn leftover_backups_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.save(0, &key(5, 4), &[], &[]).unwrap();
        store.save(1, &key(5, 4), &[], &[]).unwrap();
        // backups of an earlier index next to a newer manifest
        for name in [CheckpointStore::edges_file(0), CheckpointStore::lifted_edges_file(0)] {
            fs::copy(
                dir.path().join(CheckpointStore::edges_file(1)),
                dir.path().join(name),
            )
            .unwrap();
        }
        fs::write(dir.path().join("edges.txt"), "").unwrap();

        store.save(2, &key(5, 4), &[], &[]).unwrap();
        let mut names = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect::<Vec<_>>();
        names.sort();
        assert_eq!(
            names,
            vec![
                "checkpoint.json".to_string(),
                CheckpointStore::edges_file(2),
                "edges.txt".to_string(),
                CheckpointStore::lifted_edges_file(2),
            ]
        );
    }

    #[test]
    fn index_zero_is_restored() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.save(0, &key(3, 2), &[], &[]).unwrap();
        let cp = store.load(&key(3, 2)).unwrap().unwrap();
        assert_eq!(cp.index, 0);
        assert!(cp.edges.is_empty());
    }

    #[test]
    fn foreign_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.save(2, &key(3, 4), &[], &[]).unwrap();
        assert!(matches!(store.load(&key(4, 4)), Err(Errors::Checkpoint { .. })));
        assert!(matches!(store.load(&key(3, 5)), Err(Errors::Checkpoint { .. })));
        let other_start = CheckpointKey {
            lifted_start: 1,
            ..key(3, 4)
        };
        assert!(matches!(store.load(&other_start), Err(Errors::Checkpoint { .. })));
        let other_detections = CheckpointKey {
            fingerprint: 8,
            ..key(3, 4)
        };
        assert!(matches!(
            store.load(&other_detections),
            Err(Errors::Checkpoint { .. })
        ));
        assert!(store.load(&key(3, 4)).unwrap().is_some());
    }

    #[test]
    fn fingerprint() {
        let a = random_detections(20, 8, 1);
        let b = random_detections(20, 8, 2);
        assert_eq!(CheckpointKey::new(&a, 4, 2), CheckpointKey::new(&a.clone(), 4, 2));
        assert_ne!(
            CheckpointKey::new(&a, 4, 2).fingerprint,
            CheckpointKey::new(&b, 4, 2).fingerprint
        );
        assert_eq!(CheckpointKey::new(&a, 4, 2).detections, 20);
    }

    #[test]
    fn malformed_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        fs::write(store.manifest_path(), "{ not json").unwrap();
        assert!(matches!(store.load(&key(3, 2)), Err(Errors::Checkpoint { .. })));
    }
}
