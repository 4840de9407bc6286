use ndarray::{Array2, ArrayView2, Axis};

use super::{check_fit_input, Model};
use crate::error::{Error, Result};
use crate::neighbors::k_nearest;
use crate::parsing::{check_features, Dataset};

/// k-nearest-neighbours classifier with uniform votes
#[derive(Debug, Clone)]
pub struct KNearestNeighbors {
    pub n_neighbors: usize,
    training: Option<Dataset>,
    n_classes: usize,
}

impl KNearestNeighbors {
    pub fn new(n_neighbors: usize) -> KNearestNeighbors {
        KNearestNeighbors {
            n_neighbors,
            training: None,
            n_classes: 0,
        }
    }
}

impl Default for KNearestNeighbors {
    fn default() -> Self {
        KNearestNeighbors::new(5)
    }
}

impl Model for KNearestNeighbors {
    /// Lazy learner: fitting only stores the training rows
    fn fit(&mut self, dataset: &Dataset) -> Result<()> {
        check_fit_input(dataset)?;
        if self.n_neighbors == 0 || self.n_neighbors > dataset.len() {
            return Err(Error::invalid_parameter(format!(
                "n_neighbors = {} needs 1..={} training rows",
                self.n_neighbors,
                dataset.len()
            )));
        }

        self.n_classes = dataset.n_classes();
        self.training = Some(dataset.clone());

        Ok(())
    }

    /// Fraction of the neighbours voting for each class
    fn predict_proba(&self, inputs: &ArrayView2<f64>) -> Result<Array2<f64>> {
        let training = self.training.as_ref().ok_or(Error::NotFitted("KNearestNeighbors"))?;
        check_features(inputs, training.n_features())?;

        let points = training.data.view();
        let mut proba = Array2::<f64>::zeros((inputs.nrows(), self.n_classes));

        for (mut out, row) in proba.axis_iter_mut(Axis(0)).zip(inputs.axis_iter(Axis(0))) {
            for idx in k_nearest(&points, &row, self.n_neighbors, None) {
                out[training.target[idx]] += 1.0 / self.n_neighbors as f64;
            }
        }

        Ok(proba)
    }

    fn name(&self) -> &'static str {
        "KNearestNeighbors"
    }

    fn unfitted(&self) -> Box<dyn Model> {
        Box::new(KNearestNeighbors::new(self.n_neighbors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    fn line() -> Dataset {
        Dataset::new(
            arr2(&[[0.0], [1.0], [2.0], [10.0], [11.0], [12.0]]),
            arr1(&[0, 0, 0, 1, 1, 1]),
        )
        .unwrap()
    }

    #[test]
    fn test_votes_of_neighbours() {
        let mut knn = KNearestNeighbors::new(3);
        knn.fit(&line()).unwrap();

        let proba = knn.predict_proba(&arr2(&[[0.5], [11.5], [6.6]]).view()).unwrap();
        assert_eq!(proba.row(0).to_vec(), vec![1.0, 0.0]);
        assert_eq!(proba.row(1).to_vec(), vec![0.0, 1.0]);
        // 6.6 is closest to 10, 11 and then 2
        assert!((proba[[2, 1]] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_predict_labels() {
        let mut knn = KNearestNeighbors::new(1);
        knn.fit(&line()).unwrap();
        assert_eq!(knn.predict(&arr2(&[[1.4], [9.0]]).view()).unwrap(), arr1(&[0, 1]));
    }

    #[test]
    fn test_rejects_too_many_neighbours() {
        let mut knn = KNearestNeighbors::new(7);
        assert!(matches!(knn.fit(&line()), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_predict_before_fit() {
        let knn = KNearestNeighbors::default();
        assert!(matches!(
            knn.predict(&arr2(&[[0.0]]).view()),
            Err(Error::NotFitted(_))
        ));
    }
}
