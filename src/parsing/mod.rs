use ndarray::{concatenate, Array1, Array2, ArrayView2, Axis};

use crate::error::{Error, Result};

pub mod labeled_csv;
pub mod split;
pub mod synthetic;

/// A feature matrix paired with one integer class label per row
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub data: Array2<f64>,
    pub target: Array1<usize>,
}

impl Dataset {
    pub fn new(data: Array2<f64>, target: Array1<usize>) -> Result<Dataset> {
        if data.nrows() != target.len() {
            return Err(Error::shape(format!(
                "{} feature rows but {} labels",
                data.nrows(),
                target.len()
            )));
        }

        Ok(Dataset { data, target })
    }

    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    /// Number of classes, assuming labels are 0..k
    pub fn n_classes(&self) -> usize {
        self.target.iter().max().map_or(0, |max| max + 1)
    }

    /// Number of rows per label, indexed by label
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes()];

        for &label in self.target.iter() {
            counts[label] += 1;
        }

        counts
    }

    /// Label with the fewest rows among the labels that occur
    pub fn minority_class(&self) -> Option<usize> {
        self.class_counts()
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .min_by_key(|(_, &count)| count)
            .map(|(label, _)| label)
    }

    /// Label with the most rows
    pub fn majority_class(&self) -> Option<usize> {
        // max_by_key keeps the last maximum, so reverse to favour the lowest label on ties
        self.class_counts()
            .iter()
            .enumerate()
            .rev()
            .max_by_key(|(_, &count)| count)
            .map(|(label, _)| label)
    }

    /// Row indices holding the given label, in dataset order
    pub fn indices_of(&self, label: usize) -> Vec<usize> {
        self.target
            .iter()
            .enumerate()
            .filter(|(_, &y)| y == label)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Build a new dataset out of the given rows (repeats allowed)
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            data: self.data.select(Axis(0), indices),
            target: self.target.select(Axis(0), indices),
        }
    }

    /// Append rows of `other` below this dataset
    pub fn concat(&self, other: &Dataset) -> Result<Dataset> {
        if self.n_features() != other.n_features() {
            return Err(Error::shape(format!(
                "cannot stack {} features onto {} features",
                other.n_features(),
                self.n_features()
            )));
        }

        Ok(Dataset {
            data: concatenate(Axis(0), &[self.data.view(), other.data.view()])
                .map_err(|e| Error::shape(e.to_string()))?,
            target: concatenate(Axis(0), &[self.target.view(), other.target.view()])
                .map_err(|e| Error::shape(e.to_string()))?,
        })
    }
}

/// Check that `inputs` has the number of columns an estimator was fitted on
pub(crate) fn check_features(inputs: &ArrayView2<f64>, expected: usize) -> Result<()> {
    if inputs.ncols() != expected {
        return Err(Error::shape(format!(
            "expected {} features, got {}",
            expected,
            inputs.ncols()
        )));
    }

    Ok(())
}
