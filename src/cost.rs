use crate::features::{FeatureVector, FEATURE_LEN};
use crate::Errors;
use ndarray::{Array2, ArrayView1};
use std::path::Path;

/// Frame-gap indexed weights of the linear cost model.
///
/// Row `delta` holds the weights applied to the feature vector of a pair whose frame gap is
/// `delta`. The table is calibrated elsewhere and read-only while the graph is built.
///
#[derive(Debug, Clone)]
pub struct WeightTable {
    weights: Array2<f32>,
}

impl WeightTable {
    /// Wraps a `(rows, FEATURE_LEN)` matrix; at least `dmax` rows are required
    ///
    pub fn new(weights: Array2<f32>, dmax: u32) -> Result<Self, Errors> {
        if weights.ncols() != FEATURE_LEN || weights.nrows() < dmax as usize {
            return Err(Errors::WeightTableShape {
                dmax,
                len: FEATURE_LEN,
                shape: weights.shape().to_vec(),
            });
        }
        Ok(Self { weights })
    }

    /// Loads the table from a `.npy` file holding a 2D `f32` matrix
    ///
    pub fn load_npy<P: AsRef<Path>>(path: P, dmax: u32) -> Result<Self, Errors> {
        let path = path.as_ref();
        let weights: Array2<f32> =
            ndarray_npy::read_npy(path).map_err(|e| Errors::Weights {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Self::new(weights, dmax)
    }

    /// Frame gaps covered by the table
    ///
    pub fn rows(&self) -> usize {
        self.weights.nrows()
    }

    pub fn row(&self, delta: u32) -> ArrayView1<f32> {
        self.weights.row(delta as usize)
    }

    /// `-(W[delta] . features)`
    ///
    pub fn cost(&self, features: &FeatureVector, delta: u32) -> f32 {
        let dot: f32 = self
            .row(delta)
            .iter()
            .zip(features.iter())
            .map(|(w, f)| w * f)
            .sum();
        -dot
    }
}

/// Kind of the edge between two detections
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Short range edge, the cost may attract or repel
    Normal,
    /// Long range edge, the cost only attracts
    Lifted,
}

/// Scored edge between the detections `i` and `j`
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub i: usize,
    pub j: usize,
    pub cost: f32,
    pub kind: EdgeKind,
}

/// Splits scored pairs into normal and lifted edges by frame gap.
///
/// Pairs with a gap below `lifted_start` are normal edges and keep their cost. The rest are
/// lifted edges, their negative costs are raised to `0.0`.
///
#[derive(Debug, Clone, Copy)]
pub struct EdgeClassifier {
    lifted_start: u32,
}

impl EdgeClassifier {
    /// Lifted edges start at `floor(dmax / 2)`
    ///
    pub fn new(dmax: u32) -> Self {
        Self {
            lifted_start: dmax / 2,
        }
    }

    /// Overrides the gap from which edges become lifted; it must stay below `dmax`
    ///
    pub fn with_lifted_start(dmax: u32, lifted_start: u32) -> Result<Self, Errors> {
        if lifted_start >= dmax {
            return Err(Errors::LiftedStartOutOfRange { lifted_start, dmax });
        }
        Ok(Self { lifted_start })
    }

    pub fn lifted_start(&self) -> u32 {
        self.lifted_start
    }

    pub fn kind(&self, delta: u32) -> EdgeKind {
        if delta < self.lifted_start {
            EdgeKind::Normal
        } else {
            EdgeKind::Lifted
        }
    }

    pub fn classify(&self, i: usize, j: usize, delta: u32, cost: f32) -> Edge {
        let kind = self.kind(delta);
        let cost = match kind {
            EdgeKind::Normal => cost,
            EdgeKind::Lifted => cost.max(0.0),
        };
        Edge { i, j, cost, kind }
    }
}

#[cfg(test)]
mod tests {
    use crate::cost::{EdgeClassifier, EdgeKind, WeightTable};
    use crate::features::FEATURE_LEN;
    use crate::Errors;
    use crate::EPS;
    use ndarray::Array2;

    #[test]
    fn cost_is_negated_dot_product() {
        let mut w = Array2::<f32>::zeros((3, FEATURE_LEN));
        w[[2, 0]] = 1.0;
        w[[2, 7]] = 2.0;
        let table = WeightTable::new(w, 3).unwrap();
        let mut f = [0.0; FEATURE_LEN];
        f[0] = 1.0;
        f[7] = 0.5;
        assert!((table.cost(&f, 2) + 2.0).abs() < EPS);
        assert!(table.cost(&f, 1).abs() < EPS);
    }

    #[test]
    fn table_shape() {
        assert!(matches!(
            WeightTable::new(Array2::zeros((2, FEATURE_LEN)), 3),
            Err(Errors::WeightTableShape { dmax: 3, .. })
        ));
        assert!(WeightTable::new(Array2::zeros((3, FEATURE_LEN - 1)), 3).is_err());
        assert_eq!(
            WeightTable::new(Array2::zeros((5, FEATURE_LEN)), 3)
                .unwrap()
                .rows(),
            5
        );
    }

    #[test]
    fn load_npy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.npy");
        let w = Array2::<f32>::from_elem((4, FEATURE_LEN), 0.25);
        ndarray_npy::write_npy(&path, &w).unwrap();
        let table = WeightTable::load_npy(&path, 4).unwrap();
        assert!((table.row(3)[1] - 0.25).abs() < EPS);
        assert!(matches!(
            WeightTable::load_npy(dir.path().join("missing.npy"), 4),
            Err(Errors::Weights { .. })
        ));
    }

    #[test]
    fn classification_boundary() {
        let c = EdgeClassifier::new(4);
        assert_eq!(c.lifted_start(), 2);
        assert_eq!(c.kind(1), EdgeKind::Normal);
        assert_eq!(c.kind(2), EdgeKind::Lifted);
        assert_eq!(c.kind(3), EdgeKind::Lifted);

        let c = EdgeClassifier::new(5);
        assert_eq!(c.kind(1), EdgeKind::Normal);
        assert_eq!(c.kind(2), EdgeKind::Lifted);
    }

    #[test]
    fn lifted_cost_floor() {
        let c = EdgeClassifier::new(10);
        let e = c.classify(0, 1, 2, -3.0);
        assert_eq!(e.kind, EdgeKind::Normal);
        assert_eq!(e.cost, -3.0);

        let e = c.classify(0, 1, 7, -3.0);
        assert_eq!(e.kind, EdgeKind::Lifted);
        assert_eq!(e.cost, 0.0);

        let e = c.classify(0, 1, 7, 1.5);
        assert_eq!(e.cost, 1.5);
    }

    #[test]
    fn lifted_start_override() {
        assert_eq!(
            EdgeClassifier::with_lifted_start(10, 3)
                .unwrap()
                .kind(3),
            EdgeKind::Lifted
        );
        assert!(matches!(
            EdgeClassifier::with_lifted_start(10, 10),
            Err(Errors::LiftedStartOutOfRange { .. })
        ));
    }
}
