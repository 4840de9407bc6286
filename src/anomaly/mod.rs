//! Unsupervised outlier detectors, used to flag minority rows as anomalies.

use ndarray::{Array1, ArrayView2};

use crate::error::Result;

pub mod isolation_forest;
pub mod one_class_svm;

pub use isolation_forest::{Contamination, IsolationForest};
pub use one_class_svm::{Gamma, OneClassSvm};

pub const INLIER: i8 = 1;
pub const OUTLIER: i8 = -1;

pub trait OutlierDetector {
    fn fit(&mut self, inputs: &ArrayView2<f64>) -> Result<()>;

    /// Normality score per row, higher means more normal
    fn score_samples(&self, inputs: &ArrayView2<f64>) -> Result<Array1<f64>>;

    /// Score shifted by the learned offset, negative means outlier
    fn decision_function(&self, inputs: &ArrayView2<f64>) -> Result<Array1<f64>>;

    fn predict(&self, inputs: &ArrayView2<f64>) -> Result<Array1<i8>> {
        Ok(self
            .decision_function(inputs)?
            .mapv(|d| if d < 0.0 { OUTLIER } else { INLIER }))
    }

    fn name(&self) -> &'static str;
}

/// Turn +1/-1 detector output into class labels
pub fn to_class_labels(
    predictions: &Array1<i8>,
    outlier_class: usize,
    inlier_class: usize,
) -> Array1<usize> {
    predictions.mapv(|p| if p == OUTLIER { outlier_class } else { inlier_class })
}
