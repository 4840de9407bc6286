//! Classification metrics computed from true and predicted labels.

use ndarray::{Array1, Array2};
use serde::Serialize;

use crate::error::{Error, Result};

fn check_lengths(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(Error::shape(format!(
            "{} true labels but {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(Error::shape("cannot score an empty prediction set"));
    }

    Ok(())
}

/// Fraction of predictions equal to the true label, always within [0, 1]
pub fn accuracy(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;

    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();

    Ok(correct as f64 / y_true.len() as f64)
}

/// Rows are true labels, columns are predicted labels
pub fn confusion_matrix(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Result<Array2<usize>> {
    check_lengths(y_true, y_pred)?;

    let n_classes = y_true.iter().chain(y_pred.iter()).max().map_or(0, |m| m + 1);
    let mut matrix = Array2::zeros((n_classes, n_classes));

    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        matrix[[t, p]] += 1;
    }

    Ok(matrix)
}

/// Per-class scores, as in a classification report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassScores {
    pub label: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Precision, recall and F1 for every label. Undefined ratios are reported as 0.
pub fn precision_recall_f1(
    y_true: &Array1<usize>,
    y_pred: &Array1<usize>,
) -> Result<Vec<ClassScores>> {
    let matrix = confusion_matrix(y_true, y_pred)?;

    Ok((0..matrix.nrows())
        .map(|label| {
            let tp = matrix[[label, label]];
            let predicted = matrix.column(label).sum();
            let support = matrix.row(label).sum();
            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let f1_score = if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            };

            ClassScores {
                label,
                precision,
                recall,
                f1_score,
                support,
            }
        })
        .collect())
}

/// Mean recall over the labels present in `y_true`
pub fn balanced_accuracy(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Result<f64> {
    let scores = precision_recall_f1(y_true, y_pred)?;
    let present: Vec<&ClassScores> = scores.iter().filter(|s| s.support > 0).collect();

    Ok(present.iter().map(|s| s.recall).sum::<f64>() / present.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_accuracy() {
        let y_true = arr1(&[0, 0, 1, 1]);
        let y_pred = arr1(&[0, 1, 1, 1]);
        assert_eq!(accuracy(&y_true, &y_pred).unwrap(), 0.75);
    }

    #[test]
    fn test_accuracy_length_mismatch() {
        let result = accuracy(&arr1(&[0, 1]), &arr1(&[0]));
        assert!(matches!(result, Err(Error::Shape(_))));
        assert!(accuracy(&arr1(&[]), &arr1(&[])).is_err());
    }

    #[test]
    fn test_confusion_matrix() {
        let y_true = arr1(&[0, 0, 1, 2]);
        let y_pred = arr1(&[0, 1, 1, 0]);
        let matrix = confusion_matrix(&y_true, &y_pred).unwrap();
        assert_eq!(matrix, arr2(&[[1, 1, 0], [0, 1, 0], [1, 0, 0]]));
    }

    #[test]
    fn test_precision_recall_f1() {
        let y_true = arr1(&[0, 0, 0, 1]);
        let y_pred = arr1(&[0, 0, 1, 1]);
        let scores = precision_recall_f1(&y_true, &y_pred).unwrap();

        assert_eq!(scores[0].support, 3);
        assert_eq!(scores[0].precision, 1.0);
        assert!((scores[0].recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(scores[1].precision, 0.5);
        assert_eq!(scores[1].recall, 1.0);
        assert!((scores[1].f1_score - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_majority_guess_has_high_accuracy_but_half_balanced_accuracy() {
        let y_true = arr1(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        let y_pred = Array1::zeros(10);

        assert_eq!(accuracy(&y_true, &y_pred).unwrap(), 0.9);
        assert_eq!(balanced_accuracy(&y_true, &y_pred).unwrap(), 0.5);
    }
}
