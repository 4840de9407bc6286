use ndarray::{Array1, Array2, ArrayView2, Axis};

use super::tree::DecisionTree;
use super::{check_fit_input, Model};
use crate::error::{Error, Result};
use crate::parsing::Dataset;

/// Multi-class AdaBoost (SAMME) over decision stumps
#[derive(Debug, Clone)]
pub struct AdaBoost {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub seed: u64,
    learners: Vec<(DecisionTree, f64)>, // Each learner holds a stump and its vote weight
    n_classes: usize,
}

impl AdaBoost {
    pub fn new(n_estimators: usize, learning_rate: f64, seed: u64) -> AdaBoost {
        AdaBoost {
            n_estimators,
            learning_rate,
            seed,
            learners: vec![],
            n_classes: 0,
        }
    }

    pub fn n_learners(&self) -> usize {
        self.learners.len()
    }
}

impl Default for AdaBoost {
    fn default() -> Self {
        AdaBoost::new(50, 1.0, 0)
    }
}

impl Model for AdaBoost {
    fn fit(&mut self, dataset: &Dataset) -> Result<()> {
        check_fit_input(dataset)?;
        if self.n_estimators == 0 || self.learning_rate <= 0.0 {
            return Err(Error::invalid_parameter(
                "n_estimators and learning_rate must be positive",
            ));
        }

        let n_classes = dataset.n_classes().max(2);
        let n = dataset.len();
        let mut sample_weights = Array1::from_elem(n, 1.0 / n as f64);
        let mut learners = vec![];
        let data = dataset.data.view();

        for round in 0..self.n_estimators {
            let mut stump = DecisionTree::stump(self.seed.wrapping_add(round as u64));
            stump.fit_weighted(&data, &dataset.target, &sample_weights, n_classes)?;

            let predictions = stump.predict(&data)?;
            let incorrect: Array1<f64> = predictions
                .iter()
                .zip(dataset.target.iter())
                .map(|(p, t)| if p != t { 1.0 } else { 0.0 })
                .collect();
            let error = (&sample_weights * &incorrect).sum() / sample_weights.sum();

            if error <= 0.0 {
                // A perfect learner decides alone
                learners.push((stump, 1.0));
                tracing::debug!(round, "AdaBoost stopped on a perfect fit");
                break;
            }

            if error >= 1.0 - 1.0 / n_classes as f64 {
                tracing::warn!(round, error, "AdaBoost learner no better than chance, stopping");
                if learners.is_empty() {
                    return Err(Error::training(
                        "first boosting round is no better than random guessing",
                    ));
                }
                break;
            }

            let alpha = self.learning_rate
                * (((1.0 - error) / error).ln() + ((n_classes - 1) as f64).ln());

            // Boost the misclassified rows and renormalise
            sample_weights *= &incorrect.mapv(|miss| (alpha * miss).exp());
            let total = sample_weights.sum();
            sample_weights /= total;

            learners.push((stump, alpha));
        }

        tracing::debug!(learners = learners.len(), "Fitted AdaBoost");

        self.learners = learners;
        self.n_classes = n_classes;

        Ok(())
    }

    /// Normalised weighted votes of the learners
    fn predict_proba(&self, inputs: &ArrayView2<f64>) -> Result<Array2<f64>> {
        if self.learners.is_empty() {
            return Err(Error::NotFitted("AdaBoost"));
        }

        let mut votes = Array2::<f64>::zeros((inputs.nrows(), self.n_classes));
        for (stump, alpha) in &self.learners {
            let labels = stump.predict(inputs)?;
            for (mut row, &label) in votes.axis_iter_mut(Axis(0)).zip(labels.iter()) {
                row[label] += alpha;
            }
        }

        let total: f64 = self.learners.iter().map(|(_, alpha)| alpha).sum();
        Ok(votes / total)
    }

    fn name(&self) -> &'static str {
        "AdaBoost"
    }

    fn unfitted(&self) -> Box<dyn Model> {
        Box::new(AdaBoost::new(self.n_estimators, self.learning_rate, self.seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::accuracy;
    use crate::parsing::split::train_test_split;
    use crate::parsing::synthetic::{make_classification, ClassificationParams};
    use ndarray::{arr1, arr2};

    #[test]
    fn test_boosting_beats_single_stump() {
        let dataset = make_classification(&ClassificationParams {
            n_samples: 600,
            n_clusters_per_class: 1,
            random_state: 42,
            ..Default::default()
        })
        .unwrap();
        let (train, test) = train_test_split(&dataset, 0.2, 42, false).unwrap();

        let mut stump = DecisionTree::stump(0);
        stump.fit(&train).unwrap();
        let stump_pred = stump.predict(&test.data.view()).unwrap();
        let stump_score = accuracy(&test.target, &stump_pred).unwrap();

        let mut boosted = AdaBoost::new(50, 1.0, 0);
        boosted.fit(&train).unwrap();
        let boosted_pred = boosted.predict(&test.data.view()).unwrap();
        let boosted_score = accuracy(&test.target, &boosted_pred).unwrap();

        assert!(boosted_score + 0.02 >= stump_score, "{} < {}", boosted_score, stump_score);
        assert!(boosted_score > 0.8);
    }

    #[test]
    fn test_perfect_stump_stops_early() {
        let dataset =
            Dataset::new(arr2(&[[0.0], [1.0], [2.0], [3.0]]), arr1(&[0, 0, 1, 1])).unwrap();
        let mut model = AdaBoost::default();
        model.fit(&dataset).unwrap();

        assert_eq!(model.n_learners(), 1);
        assert_eq!(model.predict(&dataset.data.view()).unwrap(), dataset.target);
    }

    #[test]
    fn test_useless_features_fail_first_round() {
        // Identical rows with balanced labels: every stump has error 0.5
        let dataset =
            Dataset::new(arr2(&[[1.0], [1.0], [1.0], [1.0]]), arr1(&[0, 1, 0, 1])).unwrap();
        let mut model = AdaBoost::default();
        assert!(matches!(model.fit(&dataset), Err(Error::Training(_))));
    }

    #[test]
    fn test_predict_before_fit() {
        let model = AdaBoost::default();
        assert!(model.predict_proba(&arr2(&[[0.0]]).view()).is_err());
    }
}
