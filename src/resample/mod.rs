//! Resampling transformers that re-balance a training set.
//!
//! Every resampler returns a new dataset with the same feature columns as its
//! input. Over-samplers add rows, under-samplers and cleaners remove rows.

use crate::error::{Error, Result};
use crate::parsing::Dataset;

pub mod cluster_centroids;
pub mod random;
pub mod smote;
pub mod tomek;

pub use cluster_centroids::ClusterCentroids;
pub use random::{RandomOverSampler, RandomUnderSampler};
pub use smote::{Adasyn, Smote};
pub use tomek::TomekLinks;

pub trait Resampler {
    fn fit_resample(&self, dataset: &Dataset) -> Result<Dataset>;

    fn name(&self) -> &'static str;
}

/// Desired class distribution after resampling
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SamplingStrategy {
    /// Match the majority (over-sampling) or the minority (under-sampling)
    #[default]
    Auto,
    /// Binary problems only: minority / majority ratio after resampling
    Ratio(f64),
}

fn binary_extremes(dataset: &Dataset) -> Result<(usize, usize)> {
    let counts = dataset.class_counts();
    if counts.iter().filter(|&&c| c > 0).count() < 2 {
        return Err(Error::resampling("need at least two classes to resample"));
    }

    match (dataset.minority_class(), dataset.majority_class()) {
        (Some(minority), Some(majority)) => Ok((minority, majority)),
        _ => Err(Error::resampling("cannot resample an empty dataset")),
    }
}

fn check_ratio(ratio: f64, dataset: &Dataset) -> Result<()> {
    let present = dataset.class_counts().iter().filter(|&&c| c > 0).count();
    if present != 2 {
        return Err(Error::invalid_parameter(
            "a sampling ratio is only defined for binary problems",
        ));
    }
    if !(ratio > 0.0 && ratio <= 1.0) {
        return Err(Error::invalid_parameter(format!(
            "sampling ratio must lie in (0, 1], got {}",
            ratio
        )));
    }

    Ok(())
}

/// Target row count per class to grow towards: (label, wanted) for every class that needs rows
pub(crate) fn over_sampling_targets(
    dataset: &Dataset,
    strategy: SamplingStrategy,
) -> Result<Vec<(usize, usize)>> {
    let (minority, majority) = binary_extremes(dataset)?;
    let counts = dataset.class_counts();

    match strategy {
        SamplingStrategy::Auto => Ok(counts
            .iter()
            .enumerate()
            .filter(|(label, &count)| *label != majority && count > 0 && count < counts[majority])
            .map(|(label, _)| (label, counts[majority]))
            .collect()),
        SamplingStrategy::Ratio(ratio) => {
            check_ratio(ratio, dataset)?;
            let wanted = (ratio * counts[majority] as f64).round() as usize;
            if wanted < counts[minority] {
                return Err(Error::invalid_parameter(format!(
                    "ratio {} would remove minority rows when over-sampling",
                    ratio
                )));
            }

            Ok(vec![(minority, wanted)])
        }
    }
}

/// Target row count per class to shrink towards: (label, wanted) for every class that loses rows
pub(crate) fn under_sampling_targets(
    dataset: &Dataset,
    strategy: SamplingStrategy,
) -> Result<Vec<(usize, usize)>> {
    let (minority, majority) = binary_extremes(dataset)?;
    let counts = dataset.class_counts();

    match strategy {
        SamplingStrategy::Auto => Ok(counts
            .iter()
            .enumerate()
            .filter(|(label, &count)| *label != minority && count > counts[minority])
            .map(|(label, _)| (label, counts[minority]))
            .collect()),
        SamplingStrategy::Ratio(ratio) => {
            check_ratio(ratio, dataset)?;
            let wanted = (counts[minority] as f64 / ratio).round() as usize;
            if wanted > counts[majority] {
                return Err(Error::invalid_parameter(format!(
                    "ratio {} would add majority rows when under-sampling",
                    ratio
                )));
            }

            Ok(vec![(majority, wanted)])
        }
    }
}

/// Labels a cleaning method may remove rows from: everything but the minority
pub(crate) fn cleaning_targets(dataset: &Dataset) -> Result<Vec<usize>> {
    let (minority, _) = binary_extremes(dataset)?;

    Ok((0..dataset.n_classes()).filter(|&label| label != minority).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array2};

    fn counts(labels: &[usize]) -> Dataset {
        Dataset::new(Array2::zeros((labels.len(), 1)), arr1(labels)).unwrap()
    }

    #[test]
    fn test_over_sampling_auto_targets_majority_count() {
        let dataset = counts(&[0, 0, 0, 0, 1, 2, 2]);
        let targets = over_sampling_targets(&dataset, SamplingStrategy::Auto).unwrap();
        assert_eq!(targets, vec![(1, 4), (2, 4)]);
    }

    #[test]
    fn test_under_sampling_auto_targets_minority_count() {
        let dataset = counts(&[0, 0, 0, 0, 1, 2, 2]);
        let targets = under_sampling_targets(&dataset, SamplingStrategy::Auto).unwrap();
        assert_eq!(targets, vec![(0, 1), (2, 1)]);
    }

    #[test]
    fn test_ratio_targets() {
        let dataset = counts(&[0, 0, 0, 0, 0, 0, 0, 0, 1, 1]);
        assert_eq!(
            over_sampling_targets(&dataset, SamplingStrategy::Ratio(0.5)).unwrap(),
            vec![(1, 4)]
        );
        assert_eq!(
            under_sampling_targets(&dataset, SamplingStrategy::Ratio(0.5)).unwrap(),
            vec![(0, 4)]
        );
    }

    #[test]
    fn test_ratio_rejected_for_multiclass_and_bad_values() {
        let multi = counts(&[0, 0, 1, 2]);
        assert!(over_sampling_targets(&multi, SamplingStrategy::Ratio(0.5)).is_err());

        let binary = counts(&[0, 0, 0, 1]);
        assert!(over_sampling_targets(&binary, SamplingStrategy::Ratio(1.5)).is_err());
        // 0.1 * 3 rounds to 0, below the single minority row
        assert!(over_sampling_targets(&binary, SamplingStrategy::Ratio(0.1)).is_err());
    }

    #[test]
    fn test_single_class_cannot_be_resampled() {
        let dataset = counts(&[1, 1, 1]);
        assert!(matches!(
            over_sampling_targets(&dataset, SamplingStrategy::Auto),
            Err(Error::Resampling(_))
        ));
    }

    #[test]
    fn test_cleaning_targets_skip_minority() {
        let dataset = counts(&[0, 0, 0, 1, 2, 2]);
        assert_eq!(cleaning_targets(&dataset).unwrap(), vec![0, 2]);
    }
}
