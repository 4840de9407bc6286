use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::error::{Error, Result};
use crate::parsing::check_features;

/// Standard scaling: (x - mean) / std, with statistics learned on the training set
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl StandardScaler {
    pub fn new() -> StandardScaler {
        StandardScaler::default()
    }

    pub fn fit(&mut self, features: &ArrayView2<f64>) -> Result<&mut Self> {
        let mean = features
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::dataset("cannot fit a scaler on an empty matrix"))?;
        let std = features.std_axis(Axis(0), 0.0);

        self.mean = Some(mean);
        self.scale = Some(std);

        Ok(self)
    }

    /// Constant columns (std == 0) are set to 0.0
    pub fn transform(&self, features: &ArrayView2<f64>) -> Result<Array2<f64>> {
        let (mean, scale) = match (&self.mean, &self.scale) {
            (Some(mean), Some(scale)) => (mean, scale),
            _ => return Err(Error::NotFitted("StandardScaler")),
        };
        check_features(features, mean.len())?;

        let mut scaled = features.to_owned();
        for (col_idx, mut column) in scaled.axis_iter_mut(Axis(1)).enumerate() {
            let std = scale[col_idx];
            if std.abs() < f64::EPSILON {
                column.fill(0.0);
            } else {
                column.mapv_inplace(|x| (x - mean[col_idx]) / std);
            }
        }

        Ok(scaled)
    }

    pub fn fit_transform(&mut self, features: &ArrayView2<f64>) -> Result<Array2<f64>> {
        self.fit(features)?.transform(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_standard_scale_normal() {
        let features = arr2(&[[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]]);
        let scaled = StandardScaler::new().fit_transform(&features.view()).unwrap();

        for col in scaled.axis_iter(Axis(1)) {
            assert!(col.mean().unwrap().abs() < 1e-10);
            assert!((col.std(0.0) - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_standard_scale_constant_column() {
        let features = arr2(&[[5.0, 10.0], [5.0, 20.0], [5.0, 30.0]]);
        let scaled = StandardScaler::new().fit_transform(&features.view()).unwrap();

        assert_eq!(scaled[[0, 0]], 0.0);
        assert_eq!(scaled[[1, 0]], 0.0);
        assert_eq!(scaled[[2, 0]], 0.0);
    }

    #[test]
    fn test_transform_uses_training_statistics() {
        let train = arr2(&[[0.0], [2.0]]);
        let mut scaler = StandardScaler::new();
        scaler.fit(&train.view()).unwrap();

        let scaled = scaler.transform(&arr2(&[[4.0]]).view()).unwrap();
        assert!((scaled[[0, 0]] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_transform_requires_fit_and_matching_width() {
        let scaler = StandardScaler::new();
        assert!(matches!(
            scaler.transform(&arr2(&[[1.0]]).view()),
            Err(Error::NotFitted(_))
        ));

        let mut scaler = StandardScaler::new();
        scaler.fit(&arr2(&[[1.0, 2.0]]).view()).unwrap();
        assert!(matches!(
            scaler.transform(&arr2(&[[1.0]]).view()),
            Err(Error::Shape(_))
        ));
    }
}
