//! CART decision tree with weighted Gini impurity.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::{check_fit_input, Model};
use crate::error::{Error, Result};
use crate::parsing::{check_features, Dataset};

/// Values closer than this are treated as equal when placing thresholds
const FEATURE_THRESHOLD: f64 = 1e-7;

/// How many features each split may look at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    All,
    Sqrt,
    Log2,
    Count(usize),
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let m = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::Count(m) => m,
        };

        m.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        distribution: Array1<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Best split found for one node
struct Candidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub seed: u64,
    nodes: Vec<Node>,
    n_classes: usize,
    n_features: usize,
}

impl Default for DecisionTree {
    fn default() -> Self {
        DecisionTree::new(None, MaxFeatures::All, 0)
    }
}

impl DecisionTree {
    pub fn new(max_depth: Option<usize>, max_features: MaxFeatures, seed: u64) -> DecisionTree {
        DecisionTree {
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features,
            seed,
            nodes: vec![],
            n_classes: 0,
            n_features: 0,
        }
    }

    /// A depth-one tree, the usual weak learner for boosting
    pub fn stump(seed: u64) -> DecisionTree {
        DecisionTree::new(Some(1), MaxFeatures::All, seed)
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }

        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Grow the tree on rows with positive weight. Probabilities get `n_classes` columns
    /// even if some labels are absent from this particular sample.
    pub fn fit_weighted(
        &mut self,
        data: &ArrayView2<f64>,
        target: &Array1<usize>,
        sample_weight: &Array1<f64>,
        n_classes: usize,
    ) -> Result<()> {
        if data.nrows() != target.len() || target.len() != sample_weight.len() {
            return Err(Error::shape(format!(
                "{} rows, {} labels and {} weights",
                data.nrows(),
                target.len(),
                sample_weight.len()
            )));
        }
        if let Some(label) = target.iter().find(|&&y| y >= n_classes) {
            return Err(Error::invalid_parameter(format!(
                "label {} outside of {} classes",
                label, n_classes
            )));
        }
        if self.min_samples_leaf == 0 || self.min_samples_split < 2 {
            return Err(Error::invalid_parameter(
                "min_samples_leaf must be >= 1 and min_samples_split >= 2",
            ));
        }

        let mut indices: Vec<usize> =
            (0..target.len()).filter(|&i| sample_weight[i] > 0.0).collect();
        if indices.is_empty() {
            return Err(Error::training("no rows with positive weight"));
        }

        let rng = StdRng::seed_from_u64(self.seed);
        let mut builder = Builder {
            tree: &*self,
            data,
            target,
            weights: sample_weight,
            n_classes,
            rng,
            nodes: vec![],
        };
        builder.grow(&mut indices, 0);

        let nodes = builder.nodes;
        self.nodes = nodes;
        self.n_classes = n_classes;
        self.n_features = data.ncols();

        tracing::trace!(nodes = self.nodes.len(), depth = self.depth(), "Grew decision tree");

        Ok(())
    }

    fn leaf_for(&self, row: &ArrayView1<f64>) -> &Array1<f64> {
        let mut id = 0;

        loop {
            match &self.nodes[id] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

struct Builder<'a, 'v> {
    tree: &'a DecisionTree,
    data: &'a ArrayView2<'v, f64>,
    target: &'a Array1<usize>,
    weights: &'a Array1<f64>,
    n_classes: usize,
    rng: StdRng,
    nodes: Vec<Node>,
}

impl<'a, 'v> Builder<'a, 'v> {
    fn distribution(&self, indices: &[usize]) -> Array1<f64> {
        let mut dist = Array1::zeros(self.n_classes);

        for &i in indices {
            dist[self.target[i]] += self.weights[i];
        }

        dist
    }

    /// Returns the id of the node grown for `indices`
    fn grow(&mut self, indices: &mut [usize], depth: usize) -> usize {
        let dist = self.distribution(indices);
        let total = dist.sum();
        let pure = dist.iter().filter(|&&w| w > 0.0).count() <= 1;

        let stop = pure
            || self.tree.max_depth.map_or(false, |max| depth >= max)
            || indices.len() < self.tree.min_samples_split
            || indices.len() < 2 * self.tree.min_samples_leaf;

        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: &dist / total,
        });

        if stop {
            return id;
        }

        // A split with zero impurity decrease is still taken, so XOR-like layouts can be grown
        let candidate = match self.best_split(indices) {
            Some(c) => c,
            None => return id,
        };

        // Partition in place: rows going left first
        let mut boundary = 0;
        for pos in 0..indices.len() {
            if self.data[[indices[pos], candidate.feature]] <= candidate.threshold {
                indices.swap(pos, boundary);
                boundary += 1;
            }
        }

        let (left_rows, right_rows) = indices.split_at_mut(boundary);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);

        self.nodes[id] = Node::Split {
            feature: candidate.feature,
            threshold: candidate.threshold,
            left,
            right,
        };

        id
    }

    /// Scan candidate features in random order until `max_features` non-constant
    /// ones have been evaluated. The score is sum(w_c^2)/w over both children,
    /// which is maximal where the weighted Gini impurity is minimal.
    fn best_split(&mut self, indices: &[usize]) -> Option<Candidate> {
        let n_features = self.data.ncols();
        let budget = self.tree.max_features.resolve(n_features);
        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(&mut self.rng);

        let mut best: Option<Candidate> = None;
        let mut visited = 0;
        let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(indices.len());
        let min_leaf = self.tree.min_samples_leaf;

        for feature in features {
            if visited >= budget {
                break;
            }

            sorted.clear();
            sorted.extend(indices.iter().map(|&i| (self.data[[i, feature]], i)));
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            if sorted[sorted.len() - 1].0 <= sorted[0].0 + FEATURE_THRESHOLD {
                continue;
            }
            visited += 1;

            let mut right = self.distribution(indices);
            let mut left = Array1::<f64>::zeros(self.n_classes);
            let mut left_weight = 0.0;
            let total: f64 = right.sum();

            for pos in 0..sorted.len() - 1 {
                let (value, row) = sorted[pos];
                let w = self.weights[row];
                left[self.target[row]] += w;
                right[self.target[row]] -= w;
                left_weight += w;

                let next = sorted[pos + 1].0;
                if next <= value + FEATURE_THRESHOLD {
                    continue;
                }
                if pos + 1 < min_leaf || sorted.len() - pos - 1 < min_leaf {
                    continue;
                }

                let right_weight = total - left_weight;
                if left_weight <= 0.0 || right_weight <= 0.0 {
                    continue;
                }

                let score = left.iter().map(|w| w * w).sum::<f64>() / left_weight
                    + right.iter().map(|w| w * w).sum::<f64>() / right_weight;

                if best.as_ref().map_or(true, |b| score > b.score) {
                    let mut threshold = (value + next) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(Candidate {
                        feature,
                        threshold,
                        score,
                    });
                }
            }
        }

        best
    }
}

impl Model for DecisionTree {
    fn fit(&mut self, dataset: &Dataset) -> Result<()> {
        check_fit_input(dataset)?;
        let weights = Array1::ones(dataset.len());

        self.fit_weighted(&dataset.data.view(), &dataset.target, &weights, dataset.n_classes())
    }

    fn predict_proba(&self, inputs: &ArrayView2<f64>) -> Result<Array2<f64>> {
        if self.nodes.is_empty() {
            return Err(Error::NotFitted("DecisionTree"));
        }
        check_features(inputs, self.n_features)?;

        let mut proba = Array2::<f64>::zeros((inputs.nrows(), self.n_classes));
        for (mut out, row) in proba.axis_iter_mut(Axis(0)).zip(inputs.axis_iter(Axis(0))) {
            out.assign(self.leaf_for(&row));
        }

        Ok(proba)
    }

    fn name(&self) -> &'static str {
        "DecisionTree"
    }

    fn unfitted(&self) -> Box<dyn Model> {
        Box::new(DecisionTree {
            nodes: vec![],
            n_classes: 0,
            n_features: 0,
            ..self.clone()
        })
    }
}
