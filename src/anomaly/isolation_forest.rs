//! Isolation forest: anomalies are the rows random axis-aligned cuts isolate
//! in few steps.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::OutlierDetector;
use crate::error::{Error, Result};
use crate::parsing::check_features;

const EULER_GAMMA: f64 = 0.577_215_664_9;

/// Rows drawn per tree when the training set is large enough
const MAX_SAMPLES: usize = 256;

/// Expected share of outliers in the training data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Contamination {
    /// Fixed offset of -0.5, as in the original isolation forest paper
    Auto,
    Fraction(f64),
}

#[derive(Debug, Clone)]
enum Node {
    External {
        size: usize,
    },
    Internal {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(
        points: &ArrayView2<f64>,
        rows: Vec<usize>,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> IsolationTree {
        let mut tree = IsolationTree { nodes: vec![] };
        tree.grow_node(points, rows, 0, max_depth, rng);
        tree
    }

    fn grow_node(
        &mut self,
        points: &ArrayView2<f64>,
        rows: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::External { size: rows.len() });

        if depth >= max_depth || rows.len() <= 1 {
            return id;
        }

        // Random feature among those that still vary in this node
        let mut features: Vec<usize> = (0..points.ncols()).collect();
        features.shuffle(rng);
        let cut = features.into_iter().find_map(|feature| {
            let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                let v = points[[r, feature]];
                (lo.min(v), hi.max(v))
            });
            (hi > lo).then_some((feature, lo, hi))
        });

        let (feature, lo, hi) = match cut {
            Some(cut) => cut,
            None => return id,
        };

        let threshold = rng.gen_range(lo..hi);
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| points[[r, feature]] < threshold);

        let left = self.grow_node(points, left_rows, depth + 1, max_depth, rng);
        let right = self.grow_node(points, right_rows, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Internal {
            feature,
            threshold,
            left,
            right,
        };

        id
    }

    /// Depth reached by `row`, plus the expected remaining depth of the leaf it lands in
    fn path_length(&self, row: &ArrayView1<f64>) -> f64 {
        let mut id = 0;
        let mut depth = 0.0;

        loop {
            match &self.nodes[id] {
                Node::External { size } => return depth + average_path_length(*size),
                Node::Internal {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Average path length of an unsuccessful binary search tree lookup among `n` points
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolation percentile, `q` in [0, 100]
fn percentile(values: &Array1<f64>, q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

#[derive(Debug, Clone)]
pub struct IsolationForest {
    pub n_estimators: usize,
    pub contamination: Contamination,
    pub seed: u64,
    trees: Vec<IsolationTree>,
    sample_size: usize,
    offset: f64,
    n_features: usize,
}

impl IsolationForest {
    pub fn new(n_estimators: usize, contamination: Contamination, seed: u64) -> IsolationForest {
        IsolationForest {
            n_estimators,
            contamination,
            seed,
            trees: vec![],
            sample_size: 0,
            offset: -0.5,
            n_features: 0,
        }
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        IsolationForest::new(100, Contamination::Auto, 0)
    }
}

impl OutlierDetector for IsolationForest {
    fn fit(&mut self, inputs: &ArrayView2<f64>) -> Result<()> {
        if inputs.nrows() == 0 {
            return Err(Error::dataset("cannot fit an isolation forest on zero rows"));
        }
        if self.n_estimators == 0 {
            return Err(Error::invalid_parameter("n_estimators must be positive"));
        }
        if let Contamination::Fraction(f) = self.contamination {
            if !(f > 0.0 && f <= 0.5) {
                return Err(Error::invalid_parameter(format!(
                    "contamination must lie in (0, 0.5], got {}",
                    f
                )));
            }
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let sample_size = inputs.nrows().min(MAX_SAMPLES);
        let max_depth = (sample_size.max(2) as f64).log2().ceil() as usize;

        self.trees = (0..self.n_estimators)
            .map(|_| {
                let rows = index::sample(&mut rng, inputs.nrows(), sample_size).into_vec();
                IsolationTree::grow(inputs, rows, max_depth, &mut rng)
            })
            .collect();
        self.sample_size = sample_size;
        self.n_features = inputs.ncols();

        self.offset = match self.contamination {
            Contamination::Auto => -0.5,
            Contamination::Fraction(f) => percentile(&self.score_samples(inputs)?, 100.0 * f),
        };

        tracing::debug!(
            trees = self.trees.len(),
            sample_size,
            max_depth,
            offset = self.offset,
            "Fitted isolation forest"
        );

        Ok(())
    }

    /// Opposite of the anomaly score `2^(-E[h(x)] / c(psi))`
    fn score_samples(&self, inputs: &ArrayView2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(Error::NotFitted("IsolationForest"));
        }
        check_features(inputs, self.n_features)?;

        let normaliser = average_path_length(self.sample_size).max(f64::EPSILON);
        Ok(inputs
            .axis_iter(Axis(0))
            .map(|row| {
                let total: f64 = self.trees.iter().map(|t| t.path_length(&row)).sum();
                let mean_depth = total / self.trees.len() as f64;
                -(2f64.powf(-mean_depth / normaliser))
            })
            .collect())
    }

    fn decision_function(&self, inputs: &ArrayView2<f64>) -> Result<Array1<f64>> {
        Ok(self.score_samples(inputs)? - self.offset)
    }

    fn name(&self) -> &'static str {
        "IsolationForest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{OUTLIER, INLIER};
    use crate::parsing::synthetic::make_blobs;
    use ndarray::{arr1, arr2, concatenate};

    fn cloud_with_outliers() -> ndarray::Array2<f64> {
        let blob = make_blobs(200, &arr2(&[[0.0, 0.0]]), 1.0, 3).unwrap().data;
        let far = arr2(&[[12.0, 12.0], [-11.0, 9.0], [10.0, -13.0]]);
        concatenate(Axis(0), &[blob.view(), far.view()]).unwrap()
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let expected = 2.0 * (255f64.ln() + EULER_GAMMA) - 2.0 * 255.0 / 256.0;
        assert!((average_path_length(256) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = arr1(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
        assert!((percentile(&values, 50.0) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_far_points_score_lowest() {
        let data = cloud_with_outliers();
        let mut forest = IsolationForest::default();
        forest.fit(&data.view()).unwrap();

        let scores = forest.score_samples(&data.view()).unwrap();
        let worst_inlier = scores.slice(ndarray::s![..200]).fold(f64::INFINITY, |a, &b| a.min(b));
        for &outlier in scores.slice(ndarray::s![200..]).iter() {
            assert!(outlier < worst_inlier);
        }
        assert!(scores.iter().all(|&s| (-1.0..=0.0).contains(&s)));
    }

    #[test]
    fn test_contamination_fraction_sets_offset() {
        let data = cloud_with_outliers();
        let mut forest = IsolationForest::new(100, Contamination::Fraction(0.1), 1);
        forest.fit(&data.view()).unwrap();

        let predictions = forest.predict(&data.view()).unwrap();
        let flagged = predictions.iter().filter(|&&p| p == OUTLIER).count();
        // Roughly ten percent of the rows fall below the offset
        assert!((15..=25).contains(&flagged), "flagged {}", flagged);
        assert!(predictions.slice(ndarray::s![200..]).iter().all(|&p| p == OUTLIER));
        assert!(predictions.iter().any(|&p| p == INLIER));
    }

    #[test]
    fn test_deterministic_and_requires_fit() {
        let data = cloud_with_outliers();
        let unfitted = IsolationForest::default();
        assert!(matches!(unfitted.score_samples(&data.view()), Err(Error::NotFitted(_))));

        let mut a = IsolationForest::new(20, Contamination::Auto, 5);
        let mut b = IsolationForest::new(20, Contamination::Auto, 5);
        a.fit(&data.view()).unwrap();
        b.fit(&data.view()).unwrap();
        assert_eq!(a.score_samples(&data.view()).unwrap(), b.score_samples(&data.view()).unwrap());
    }

    #[test]
    fn test_rejects_bad_contamination() {
        let data = cloud_with_outliers();
        let mut forest = IsolationForest::new(10, Contamination::Fraction(0.9), 0);
        assert!(matches!(forest.fit(&data.view()), Err(Error::InvalidParameter(_))));
    }
}
