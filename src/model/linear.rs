use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use super::{check_fit_input, resolve_weights, ClassWeight, Model};
use crate::error::{Error, Result};
use crate::parsing::{check_features, Dataset};
use crate::preprocessing::StandardScaler;

/// Multinomial logistic regression trained with full-batch gradient descent
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    pub c: f64, // Inverse L2 regularisation strength
    pub learning_rate: f64,
    pub max_iter: usize,
    pub tol: f64, // Early stopping once the loss improves by less than this
    pub class_weight: Option<ClassWeight>,
    layer: Option<(Array2<f64>, Array1<f64>)>, // Weight matrix and bias vector
    scaler: StandardScaler,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        LogisticRegression::new(1.0, 0.5, 500, 1e-6)
    }
}

impl LogisticRegression {
    /// Construct a new model according to the specified hyperparams
    pub fn new(c: f64, learning_rate: f64, max_iter: usize, tol: f64) -> LogisticRegression {
        LogisticRegression {
            c,
            learning_rate,
            max_iter,
            tol,
            class_weight: None,
            layer: None,
            scaler: StandardScaler::new(),
        }
    }

    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> LogisticRegression {
        self.class_weight = Some(class_weight);
        self
    }

    /// Learned coefficients, one column per class
    pub fn coefficients(&self) -> Option<&Array2<f64>> {
        self.layer.as_ref().map(|(w, _)| w)
    }

    // Softmax probabilities of already scaled inputs
    fn forward(&self, inputs: &ArrayView2<f64>, layer: &(Array2<f64>, Array1<f64>)) -> Array2<f64> {
        let scores = inputs.dot(&layer.0) + &layer.1;
        let mut predictions = Array2::zeros(scores.raw_dim());

        for (mut out, row) in predictions.axis_iter_mut(Axis(0)).zip(scores.axis_iter(Axis(0))) {
            out.assign(&softmax(row));
        }

        predictions
    }

    /// Calculate the gradients of the weighted loss and perform a GD step
    fn backward_and_update(
        &self,
        layer: &mut (Array2<f64>, Array1<f64>),
        inputs: &ArrayView2<f64>,
        predictions: Array2<f64>,
        target: &Array2<f64>,
        sample_weights: &Array1<f64>,
    ) {
        // Gradient of the loss WRT the scores, each row scaled by its (normalised) weight
        let grad = (predictions - target) * &sample_weights.view().insert_axis(Axis(1));

        let weight_grad = inputs.t().dot(&grad) + &layer.0 / (self.c * inputs.nrows() as f64);
        let bias_grad = grad.sum_axis(Axis(0));

        layer.0 = &layer.0 - self.learning_rate * weight_grad;
        layer.1 = &layer.1 - self.learning_rate * bias_grad;
    }

    fn loss(
        &self,
        layer: &(Array2<f64>, Array1<f64>),
        predictions: &Array2<f64>,
        target: &Array2<f64>,
        sample_weights: &Array1<f64>,
        n: usize,
    ) -> f64 {
        let penalty = layer.0.mapv(|w| w * w).sum() / (2.0 * self.c * n as f64);

        cross_entropy(predictions, target.view(), sample_weights) + penalty
    }
}

impl Model for LogisticRegression {
    /// Fit the model to the dataset
    fn fit(&mut self, dataset: &Dataset) -> Result<()> {
        check_fit_input(dataset)?;
        if self.c <= 0.0 || self.learning_rate <= 0.0 {
            return Err(Error::invalid_parameter("C and learning_rate must be positive"));
        }

        let n_classes = dataset.n_classes().max(2);
        let inputs = self.scaler.fit_transform(&dataset.data.view())?;
        let target = one_hot(&dataset.target, n_classes);

        let mut sample_weights = resolve_weights(&self.class_weight, &dataset.target)?;
        let total = sample_weights.sum();
        if total <= 0.0 {
            return Err(Error::training("sample weights sum to zero"));
        }
        sample_weights /= total;

        let mut layer = (
            Array2::zeros((dataset.n_features(), n_classes)),
            Array1::zeros(n_classes),
        );
        let mut previous_loss = f64::INFINITY;

        for iteration in 0..self.max_iter {
            let predictions = self.forward(&inputs.view(), &layer);
            let loss = self.loss(&layer, &predictions, &target, &sample_weights, inputs.nrows());

            if (previous_loss - loss).abs() < self.tol {
                tracing::debug!(iteration, loss, "LogisticRegression converged");
                break;
            }
            previous_loss = loss;

            self.backward_and_update(
                &mut layer,
                &inputs.view(),
                predictions,
                &target,
                &sample_weights,
            );
        }

        self.layer = Some(layer);

        Ok(())
    }

    /// Predict the probabities for a set of instances - each instance is a row in "inputs"
    fn predict_proba(&self, inputs: &ArrayView2<f64>) -> Result<Array2<f64>> {
        let layer = self.layer.as_ref().ok_or(Error::NotFitted("LogisticRegression"))?;
        check_features(inputs, layer.0.nrows())?;
        let scaled = self.scaler.transform(inputs)?;

        Ok(self.forward(&scaled.view(), layer))
    }

    fn name(&self) -> &'static str {
        "LogisticRegression"
    }

    fn unfitted(&self) -> Box<dyn Model> {
        Box::new(LogisticRegression {
            layer: None,
            scaler: StandardScaler::new(),
            ..self.clone()
        })
    }
}

/// Construct one-hot encoding for the labels
fn one_hot(labels: &Array1<usize>, n_classes: usize) -> Array2<f64> {
    let mut target = Array2::zeros((labels.len(), n_classes));

    for (mut row, &label) in target.axis_iter_mut(Axis(0)).zip(labels.iter()) {
        row[label] = 1f64;
    }

    target
}

/// Softmax function - Convert scores into a probability distribution
fn softmax(scores: ArrayView1<f64>) -> Array1<f64> {
    let max = scores.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    // We use a numerical trick where we shift the elements by the max, because otherwise
    // We would have to compute the exp of very large values which wraps to NaN
    let shift_scores = scores.map(|x| (x - max).exp());
    let sum: f64 = shift_scores.sum();

    shift_scores / sum
}

/// Weighted cross-entropy loss; the weights are expected to sum to one
fn cross_entropy(
    predictions: &Array2<f64>,
    target: ArrayView2<f64>,
    sample_weights: &Array1<f64>,
) -> f64 {
    let total: f64 = predictions
        .axis_iter(Axis(0))
        .zip(target.axis_iter(Axis(0)))
        .zip(sample_weights.iter())
        .map(|((actual_row, target_row), w)| {
            w * target_row.dot(&actual_row.map(|x| x.max(1e-15).ln()))
        })
        .sum();

    -total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::accuracy;
    use crate::parsing::synthetic::make_blobs;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(arr1(&[1000.0, 1000.0, 0.0]).view());
        assert!((probs.sum() - 1.0).abs() < 1e-12);
        assert!((probs[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_forward_rows_are_distributions() {
        let model = LogisticRegression::default();
        let layer = (arr2(&[[1.0, -1.0, 0.0], [0.0, 2.0, 0.0]]), arr1(&[0.0, 0.0, 0.0]));
        let inputs = arr2(&[[0.0, 0.0], [3.0, -1.0], [-2.0, 4.0], [500.0, 0.0]]);

        let predictions = model.forward(&inputs.view(), &layer);
        assert_eq!(predictions.dim(), (4, 3));
        for row in predictions.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        assert!(predictions.row(0).iter().all(|&p| (p - 1.0 / 3.0).abs() < 1e-12));
        assert!((predictions[[3, 0]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_one_hot() {
        let encoded = one_hot(&arr1(&[1, 0]), 3);
        assert_eq!(encoded, arr2(&[[0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]));
    }

    #[test]
    fn test_separates_blobs() {
        let centers = arr2(&[[-3.0, 0.0], [3.0, 0.0]]);
        let dataset = make_blobs(100, &centers, 1.0, 5).unwrap();

        let mut model = LogisticRegression::default();
        model.fit(&dataset).unwrap();
        let predictions = model.predict(&dataset.data.view()).unwrap();

        assert!(accuracy(&dataset.target, &predictions).unwrap() > 0.95);
        let proba = model.predict_proba(&dataset.data.view()).unwrap();
        for row in proba.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_three_classes() {
        let centers = arr2(&[[0.0, 5.0], [5.0, -5.0], [-5.0, -5.0]]);
        let dataset = make_blobs(60, &centers, 1.0, 8).unwrap();

        let mut model = LogisticRegression::default();
        model.fit(&dataset).unwrap();
        let predictions = model.predict(&dataset.data.view()).unwrap();
        assert!(accuracy(&dataset.target, &predictions).unwrap() > 0.95);
    }

    #[test]
    fn test_class_weight_moves_boundary() {
        // Overlapping classes: up-weighting class 1 must predict it more often
        let centers = arr2(&[[0.0], [1.0]]);
        let dataset = make_blobs(200, &centers, 1.5, 3).unwrap();

        let mut plain = LogisticRegression::default();
        plain.fit(&dataset).unwrap();
        let map = [(1usize, 10.0)].into_iter().collect();
        let mut weighted =
            LogisticRegression::default().with_class_weight(ClassWeight::Custom(map));
        weighted.fit(&dataset).unwrap();

        let count_ones = |m: &LogisticRegression| {
            m.predict(&dataset.data.view()).unwrap().iter().filter(|&&y| y == 1).count()
        };
        assert!(count_ones(&weighted) > count_ones(&plain));
    }

    #[test]
    fn test_predict_before_fit_and_wrong_width() {
        let model = LogisticRegression::default();
        assert!(matches!(
            model.predict(&arr2(&[[1.0]]).view()),
            Err(Error::NotFitted(_))
        ));

        let dataset = make_blobs(10, &arr2(&[[0.0, 0.0], [5.0, 5.0]]), 1.0, 0).unwrap();
        let mut model = LogisticRegression::default();
        model.fit(&dataset).unwrap();
        assert!(matches!(
            model.predict(&arr2(&[[1.0]]).view()),
            Err(Error::Shape(_))
        ));
    }

    #[test]
    fn test_unfitted_copy_keeps_hyperparams() {
        let model = LogisticRegression::new(0.5, 0.1, 10, 1e-3);
        let copy = model.unfitted();
        assert_eq!(copy.name(), "LogisticRegression");
        assert!(copy.predict_proba(&arr2(&[[1.0]]).view()).is_err());
    }
}
