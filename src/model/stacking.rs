use ndarray::{s, Array2, ArrayView2, Axis};

use super::linear::LogisticRegression;
use super::{check_fit_input, pad_columns, Model};
use crate::error::{Error, Result};
use crate::parsing::split::stratified_k_fold;
use crate::parsing::Dataset;

/// Stacked generalisation: a final estimator learns from the base estimators'
/// out-of-fold class probabilities
pub struct Stacking {
    pub estimators: Vec<Box<dyn Model>>,
    pub final_estimator: Box<dyn Model>,
    pub cv: usize,
    n_classes: usize,
    fitted: bool,
}

impl Stacking {
    pub fn new(estimators: Vec<Box<dyn Model>>) -> Stacking {
        Stacking {
            estimators,
            final_estimator: Box::new(LogisticRegression::default()),
            cv: 5,
            n_classes: 0,
            fitted: false,
        }
    }

    pub fn with_final_estimator(mut self, final_estimator: Box<dyn Model>) -> Stacking {
        self.final_estimator = final_estimator;
        self
    }

    /// Probability columns each base estimator contributes. Binary problems keep
    /// only the positive class, as the other column is redundant.
    fn block_width(&self) -> usize {
        if self.n_classes == 2 {
            1
        } else {
            self.n_classes
        }
    }

    fn write_block(
        &self,
        meta: &mut Array2<f64>,
        rows: &[usize],
        block: usize,
        proba: Array2<f64>,
    ) {
        let width = self.block_width();
        let proba = pad_columns(proba, self.n_classes);
        let first = self.n_classes - width;

        for (src, &dst) in proba.axis_iter(Axis(0)).zip(rows) {
            meta.slice_mut(s![dst, block * width..(block + 1) * width])
                .assign(&src.slice(s![first..]));
        }
    }

    fn meta_features(&self, inputs: &ArrayView2<f64>) -> Result<Array2<f64>> {
        let mut meta = Array2::zeros((inputs.nrows(), self.estimators.len() * self.block_width()));
        let rows: Vec<usize> = (0..inputs.nrows()).collect();

        for (block, estimator) in self.estimators.iter().enumerate() {
            self.write_block(&mut meta, &rows, block, estimator.predict_proba(inputs)?);
        }

        Ok(meta)
    }
}

impl Model for Stacking {
    fn fit(&mut self, dataset: &Dataset) -> Result<()> {
        check_fit_input(dataset)?;
        if self.estimators.is_empty() {
            return Err(Error::invalid_parameter("stacking needs at least one base estimator"));
        }

        self.n_classes = dataset.n_classes().max(2);
        let folds = stratified_k_fold(&dataset.target, self.cv)?;
        let mut meta = Array2::zeros((dataset.len(), self.estimators.len() * self.block_width()));

        for block in 0..self.estimators.len() {
            for (train_rows, valid_rows) in &folds {
                let mut member = self.estimators[block].unfitted();
                member.fit(&dataset.select(train_rows))?;

                let valid = dataset.select(valid_rows);
                let proba = member.predict_proba(&valid.data.view())?;
                self.write_block(&mut meta, valid_rows, block, proba);
            }

            self.estimators[block].fit(dataset)?;
            tracing::debug!(
                estimator = self.estimators[block].name(),
                folds = folds.len(),
                "Stacked base estimator"
            );
        }

        let meta_dataset = Dataset::new(meta, dataset.target.clone())?;
        self.final_estimator.fit(&meta_dataset)?;
        self.fitted = true;

        Ok(())
    }

    fn predict_proba(&self, inputs: &ArrayView2<f64>) -> Result<Array2<f64>> {
        if !self.fitted {
            return Err(Error::NotFitted("Stacking"));
        }

        let meta = self.meta_features(inputs)?;
        self.final_estimator.predict_proba(&meta.view())
    }

    fn name(&self) -> &'static str {
        "Stacking"
    }

    fn unfitted(&self) -> Box<dyn Model> {
        Box::new(Stacking {
            estimators: self.estimators.iter().map(|e| e.unfitted()).collect(),
            final_estimator: self.final_estimator.unfitted(),
            cv: self.cv,
            n_classes: 0,
            fitted: false,
        })
    }
}
