use ndarray::{Array1, Array2, ArrayView2, Axis};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::parsing::Dataset;

pub mod boosting;
pub mod forest;
pub mod knn;
pub mod linear;
pub mod stacking;
pub mod tree;

pub trait Model {
    fn fit(&mut self, dataset: &Dataset) -> Result<()>;

    /// Class probabilities for a set of instances - each instance is a row in "inputs"
    fn predict_proba(&self, inputs: &ArrayView2<f64>) -> Result<Array2<f64>>;

    /// Most probable label per row, lowest label on ties
    fn predict(&self, inputs: &ArrayView2<f64>) -> Result<Array1<usize>> {
        Ok(argmax_rows(&self.predict_proba(inputs)?))
    }

    fn name(&self) -> &'static str;

    /// A copy with the same hyperparameters and no fitted state
    fn unfitted(&self) -> Box<dyn Model>;
}

pub(crate) fn argmax_rows(scores: &Array2<f64>) -> Array1<usize> {
    scores
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |best, (idx, &p)| {
                    if p > best.1 {
                        (idx, p)
                    } else {
                        best
                    }
                })
                .0
        })
        .collect()
}

/// Per-class multipliers applied to sample weights while fitting
#[derive(Debug, Clone, PartialEq)]
pub enum ClassWeight {
    /// n_samples / (n_classes * count(class))
    Balanced,
    /// Explicit weight per label. Labels missing from the map get 1.0.
    Custom(BTreeMap<usize, f64>),
}

impl ClassWeight {
    /// Map every label to its own row count in `target`.
    ///
    /// This mirrors `dict(zip(unique(y), bincount(y)))`: the majority class
    /// gets the largest weight, which is the opposite of re-balancing.
    pub fn from_counts(target: &Array1<usize>) -> ClassWeight {
        let mut counts = BTreeMap::new();

        for &label in target.iter() {
            *counts.entry(label).or_insert(0.0) += 1.0;
        }

        ClassWeight::Custom(counts)
    }

    /// Per-sample weights for `target`
    pub fn sample_weights(&self, target: &Array1<usize>) -> Result<Array1<f64>> {
        match self {
            ClassWeight::Balanced => {
                let n_classes = target.iter().max().map_or(0, |m| m + 1);
                let mut counts = vec![0usize; n_classes];
                for &label in target.iter() {
                    counts[label] += 1;
                }
                let present = counts.iter().filter(|&&c| c > 0).count() as f64;

                Ok(target
                    .iter()
                    .map(|&label| target.len() as f64 / (present * counts[label] as f64))
                    .collect())
            }
            ClassWeight::Custom(map) => {
                if map.values().any(|w| !w.is_finite() || *w < 0.0) {
                    return Err(Error::invalid_parameter(
                        "class weights must be finite and non-negative",
                    ));
                }

                Ok(target
                    .iter()
                    .map(|label| map.get(label).copied().unwrap_or(1.0))
                    .collect())
            }
        }
    }
}

/// Resolve optional class weights into per-sample weights (all ones when absent)
pub(crate) fn resolve_weights(
    class_weight: &Option<ClassWeight>,
    target: &Array1<usize>,
) -> Result<Array1<f64>> {
    match class_weight {
        Some(cw) => cw.sample_weights(target),
        None => Ok(Array1::ones(target.len())),
    }
}

/// Widen probability columns to `n_classes`, for members fitted on a subset of labels
pub(crate) fn pad_columns(proba: Array2<f64>, n_classes: usize) -> Array2<f64> {
    if proba.ncols() >= n_classes {
        return proba;
    }

    let mut padded = Array2::zeros((proba.nrows(), n_classes));
    padded
        .slice_mut(ndarray::s![.., ..proba.ncols()])
        .assign(&proba);

    padded
}

pub(crate) fn check_fit_input(dataset: &Dataset) -> Result<()> {
    if dataset.is_empty() {
        return Err(Error::dataset("cannot fit on an empty dataset"));
    }
    if dataset.n_features() == 0 {
        return Err(Error::dataset("cannot fit on a dataset without features"));
    }

    Ok(())
}
