//! Train/test partitioning and cross-validation folds.

use super::Dataset;
use crate::error::{Error, Result};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Split a dataset into disjoint train and test subsets.
///
/// `ceil(test_size * n)` rows go to the test side. With `stratify`, each class
/// contributes to the test side in proportion to its size.
pub fn train_test_split(
    dataset: &Dataset,
    test_size: f64,
    seed: u64,
    stratify: bool,
) -> Result<(Dataset, Dataset)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(Error::invalid_parameter(format!(
            "test_size must lie in (0, 1), got {}",
            test_size
        )));
    }

    let n = dataset.len();
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(Error::invalid_parameter(format!(
            "test_size {} leaves an empty side for {} rows",
            test_size, n
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);

    let (train, test) = if stratify {
        stratified_indices(dataset, n_test, &mut rng)
    } else {
        let mut permutation: Vec<usize> = (0..n).collect();
        permutation.shuffle(&mut rng);
        let train = permutation.split_off(n_test);
        (train, permutation)
    };

    tracing::debug!(train = train.len(), test = test.len(), stratify, "Split dataset");

    Ok((dataset.select(&train), dataset.select(&test)))
}

fn stratified_indices(
    dataset: &Dataset,
    n_test: usize,
    rng: &mut StdRng,
) -> (Vec<usize>, Vec<usize>) {
    let n = dataset.len() as f64;
    let mut train = vec![];
    let mut test = vec![];
    let mut allocated = 0;
    let counts = dataset.class_counts();

    for (label, &count) in counts.iter().enumerate() {
        let mut members = dataset.indices_of(label);
        members.shuffle(rng);

        // The last class absorbs the rounding so the test side has exactly n_test rows
        let share = if label + 1 == counts.len() {
            n_test.saturating_sub(allocated).min(count)
        } else {
            ((count as f64 * n_test as f64 / n).round() as usize).min(count)
        };
        allocated += share;

        let rest = members.split_off(share);
        test.extend(members);
        train.extend(rest);
    }

    train.shuffle(rng);
    test.shuffle(rng);

    (train, test)
}

/// Deterministic stratified k-fold split: members of each class are dealt to
/// the folds round-robin, in dataset order. Returns (train, validation) indices.
pub fn stratified_k_fold(
    target: &Array1<usize>,
    k: usize,
) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
    if k < 2 || k > target.len() {
        return Err(Error::invalid_parameter(format!(
            "need 2 <= k <= {} folds, got {}",
            target.len(),
            k
        )));
    }

    let n_classes = target.iter().max().map_or(0, |m| m + 1);
    let mut fold_of = vec![0; target.len()];
    // Each class starts where the previous one stopped, keeping fold sizes even
    let mut next_fold = 0;

    for label in 0..n_classes {
        for (idx, _) in target.iter().enumerate().filter(|(_, &y)| y == label) {
            fold_of[idx] = next_fold;
            next_fold = (next_fold + 1) % k;
        }
    }

    Ok((0..k)
        .map(|fold| {
            let (validation, train): (Vec<usize>, Vec<usize>) =
                (0..target.len()).partition(|&idx| fold_of[idx] == fold);
            (train, validation)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::synthetic::{make_classification, ClassificationParams};
    use ndarray::{arr1, Array2};

    fn dataset() -> Dataset {
        make_classification(&ClassificationParams {
            n_samples: 1000,
            weights: Some(vec![0.9, 0.1]),
            random_state: 42,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_split_sizes() {
        let (train, test) = train_test_split(&dataset(), 0.2, 42, false).unwrap();
        assert_eq!(train.len(), 800);
        assert_eq!(test.len(), 200);
        assert_eq!(train.n_features(), 20);
    }

    #[test]
    fn test_split_rounds_test_side_up() {
        let small = Dataset::new(Array2::zeros((11, 1)), Array1::zeros(11)).unwrap();
        let (train, test) = train_test_split(&small, 0.25, 0, false).unwrap();
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 8);
    }

    #[test]
    fn test_split_is_deterministic() {
        let data = dataset();
        let first = train_test_split(&data, 0.2, 42, false).unwrap();
        let second = train_test_split(&data, 0.2, 42, false).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_split_rows_are_disjoint() {
        // Tag each row with its index so membership can be checked
        let n = 50;
        let data = Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
        let tagged = Dataset::new(data, Array1::zeros(n)).unwrap();
        let (train, test) = train_test_split(&tagged, 0.3, 9, false).unwrap();

        let mut seen: Vec<usize> = train
            .data
            .iter()
            .chain(test.data.iter())
            .map(|x| *x as usize)
            .collect();
        seen.sort();
        assert_eq!(seen, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn test_stratified_keeps_proportions() {
        let data = dataset();
        let (train, test) = train_test_split(&data, 0.2, 1, true).unwrap();
        let total = data.class_counts();
        let in_test = test.class_counts();

        assert_eq!(test.len(), 200);
        assert_eq!(train.len() + test.len(), 1000);
        let expected = total[1] as f64 * 0.2;
        assert!((in_test[1] as f64 - expected).abs() <= 1.0);
    }

    #[test]
    fn test_rejects_bad_test_size() {
        assert!(train_test_split(&dataset(), 0.0, 0, false).is_err());
        assert!(train_test_split(&dataset(), 1.0, 0, false).is_err());
    }

    #[test]
    fn test_stratified_k_fold_covers_every_row_once() {
        let target = arr1(&[0, 0, 0, 0, 1, 1, 0, 1, 0, 0]);
        let folds = stratified_k_fold(&target, 3).unwrap();
        assert_eq!(folds.len(), 3);

        let mut validation: Vec<usize> = folds.iter().flat_map(|(_, v)| v.clone()).collect();
        validation.sort();
        assert_eq!(validation, (0..10).collect::<Vec<_>>());

        for (train, valid) in &folds {
            assert_eq!(train.len() + valid.len(), 10);
            // Every fold sees at least one minority row on the training side
            assert!(train.iter().any(|&i| target[i] == 1));
        }
    }

    #[test]
    fn test_stratified_k_fold_rejects_bad_k() {
        let target = arr1(&[0, 1]);
        assert!(stratified_k_fold(&target, 1).is_err());
        assert!(stratified_k_fold(&target, 3).is_err());
    }
}
