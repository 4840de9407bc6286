//! Bootstrap-aggregated tree ensembles: random forests and plain bagging.

use ndarray::{Array1, Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::tree::{DecisionTree, MaxFeatures};
use super::{check_fit_input, resolve_weights, ClassWeight, Model};
use crate::error::{Error, Result};
use crate::parsing::Dataset;

/// How many times each row was drawn, with replacement, in a sample of size n
fn bootstrap_counts<R: Rng>(n: usize, rng: &mut R) -> Array1<f64> {
    let mut counts = Array1::zeros(n);

    for _ in 0..n {
        counts[rng.gen_range(0..n)] += 1.0;
    }

    counts
}

/// Grow `n_estimators` copies of `template`, each on its own bootstrap sample and seed
fn grow_trees(
    template: &DecisionTree,
    n_estimators: usize,
    bootstrap: bool,
    class_weight: &Option<ClassWeight>,
    seed: u64,
    dataset: &Dataset,
) -> Result<Vec<DecisionTree>> {
    check_fit_input(dataset)?;
    if n_estimators == 0 {
        return Err(Error::invalid_parameter("n_estimators must be at least 1"));
    }

    let n_classes = dataset.n_classes();
    let base_weights = resolve_weights(class_weight, &dataset.target)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut trees = Vec::with_capacity(n_estimators);

    for _ in 0..n_estimators {
        let tree_seed: u64 = rng.gen();
        let mut tree = template.clone();
        tree.seed = tree_seed;

        let weights = if bootstrap {
            let mut sample_rng = StdRng::seed_from_u64(tree_seed);
            &base_weights * &bootstrap_counts(dataset.len(), &mut sample_rng)
        } else {
            base_weights.clone()
        };

        // A bootstrap sample can miss every weighted row only in degenerate inputs
        if weights.iter().all(|&w| w <= 0.0) {
            continue;
        }

        tree.fit_weighted(&dataset.data.view(), &dataset.target, &weights, n_classes)?;
        trees.push(tree);
    }

    if trees.is_empty() {
        return Err(Error::training("every bootstrap sample was empty"));
    }

    Ok(trees)
}

/// Average of the members' class probabilities
fn average_proba(
    trees: &[DecisionTree],
    inputs: &ArrayView2<f64>,
    n_classes: usize,
) -> Result<Array2<f64>> {
    let mut total = Array2::<f64>::zeros((inputs.nrows(), n_classes));

    for tree in trees {
        total += &tree.predict_proba(inputs)?;
    }

    Ok(total / trees.len() as f64)
}

/// Random forest: bootstrap samples plus a random feature subset at every split
#[derive(Debug, Clone)]
pub struct RandomForest {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub max_features: MaxFeatures,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
    pub class_weight: Option<ClassWeight>,
    pub seed: u64,
    trees: Vec<DecisionTree>,
    n_classes: usize,
}

impl RandomForest {
    pub fn new(n_estimators: usize, seed: u64) -> RandomForest {
        RandomForest {
            n_estimators,
            max_depth: None,
            max_features: MaxFeatures::Sqrt,
            min_samples_leaf: 1,
            bootstrap: true,
            class_weight: None,
            seed,
            trees: vec![],
            n_classes: 0,
        }
    }

    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> RandomForest {
        self.class_weight = Some(class_weight);
        self
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

impl Default for RandomForest {
    fn default() -> Self {
        RandomForest::new(100, 0)
    }
}

impl Model for RandomForest {
    fn fit(&mut self, dataset: &Dataset) -> Result<()> {
        let mut template = DecisionTree::new(self.max_depth, self.max_features, self.seed);
        template.min_samples_leaf = self.min_samples_leaf;

        self.trees = grow_trees(
            &template,
            self.n_estimators,
            self.bootstrap,
            &self.class_weight,
            self.seed,
            dataset,
        )?;
        self.n_classes = dataset.n_classes();

        tracing::debug!(trees = self.trees.len(), rows = dataset.len(), "Fitted random forest");

        Ok(())
    }

    fn predict_proba(&self, inputs: &ArrayView2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(Error::NotFitted("RandomForest"));
        }

        average_proba(&self.trees, inputs, self.n_classes)
    }

    fn name(&self) -> &'static str {
        "RandomForest"
    }

    fn unfitted(&self) -> Box<dyn Model> {
        Box::new(RandomForest {
            trees: vec![],
            n_classes: 0,
            ..self.clone()
        })
    }
}

/// Bagging of full decision trees: every split sees every feature
#[derive(Debug, Clone)]
pub struct Bagging {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub seed: u64,
    trees: Vec<DecisionTree>,
    n_classes: usize,
}

impl Bagging {
    pub fn new(n_estimators: usize, seed: u64) -> Bagging {
        Bagging {
            n_estimators,
            max_depth: None,
            seed,
            trees: vec![],
            n_classes: 0,
        }
    }
}

impl Default for Bagging {
    fn default() -> Self {
        Bagging::new(10, 0)
    }
}

impl Model for Bagging {
    fn fit(&mut self, dataset: &Dataset) -> Result<()> {
        let template = DecisionTree::new(self.max_depth, MaxFeatures::All, self.seed);

        self.trees = grow_trees(&template, self.n_estimators, true, &None, self.seed, dataset)?;
        self.n_classes = dataset.n_classes();

        tracing::debug!(trees = self.trees.len(), rows = dataset.len(), "Fitted bagging ensemble");

        Ok(())
    }

    fn predict_proba(&self, inputs: &ArrayView2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(Error::NotFitted("Bagging"));
        }

        average_proba(&self.trees, inputs, self.n_classes)
    }

    fn name(&self) -> &'static str {
        "Bagging"
    }

    fn unfitted(&self) -> Box<dyn Model> {
        Box::new(Bagging {
            trees: vec![],
            n_classes: 0,
            ..self.clone()
        })
    }
}
