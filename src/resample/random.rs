use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use super::{over_sampling_targets, under_sampling_targets, Resampler, SamplingStrategy};
use crate::error::Result;
use crate::parsing::Dataset;

/// Drop random rows of the larger classes, without replacement
#[derive(Debug, Clone, Default)]
pub struct RandomUnderSampler {
    pub strategy: SamplingStrategy,
    pub seed: u64,
}

impl RandomUnderSampler {
    pub fn new(seed: u64) -> RandomUnderSampler {
        RandomUnderSampler {
            strategy: SamplingStrategy::Auto,
            seed,
        }
    }
}

impl Resampler for RandomUnderSampler {
    fn fit_resample(&self, dataset: &Dataset) -> Result<Dataset> {
        let targets = under_sampling_targets(dataset, self.strategy)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut keep = vec![];

        // Rows are grouped by class in label order
        for label in 0..dataset.n_classes() {
            let members = dataset.indices_of(label);

            match targets.iter().find(|(l, _)| *l == label) {
                Some(&(_, wanted)) => {
                    let mut picked = index::sample(&mut rng, members.len(), wanted).into_vec();
                    picked.sort_unstable();
                    keep.extend(picked.into_iter().map(|i| members[i]));
                }
                None => keep.extend(members),
            }
        }

        tracing::debug!(before = dataset.len(), after = keep.len(), "Random under-sampling");

        Ok(dataset.select(&keep))
    }

    fn name(&self) -> &'static str {
        "RandomUnderSampler"
    }
}

/// Duplicate random rows of the smaller classes, with replacement
#[derive(Debug, Clone, Default)]
pub struct RandomOverSampler {
    pub strategy: SamplingStrategy,
    pub seed: u64,
}

impl RandomOverSampler {
    pub fn new(seed: u64) -> RandomOverSampler {
        RandomOverSampler {
            strategy: SamplingStrategy::Auto,
            seed,
        }
    }
}

impl Resampler for RandomOverSampler {
    fn fit_resample(&self, dataset: &Dataset) -> Result<Dataset> {
        let targets = over_sampling_targets(dataset, self.strategy)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut rows: Vec<usize> = (0..dataset.len()).collect();

        for (label, wanted) in targets {
            let members = dataset.indices_of(label);
            let extra = wanted.saturating_sub(members.len());
            rows.extend((0..extra).map(|_| members[rng.gen_range(0..members.len())]));
        }

        tracing::debug!(before = dataset.len(), after = rows.len(), "Random over-sampling");

        Ok(dataset.select(&rows))
    }

    fn name(&self) -> &'static str {
        "RandomOverSampler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::synthetic::{make_classification, ClassificationParams};

    fn imbalanced() -> Dataset {
        make_classification(&ClassificationParams {
            n_samples: 300,
            weights: Some(vec![0.9, 0.1]),
            random_state: 5,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_under_sampling_balances_to_minority() {
        let dataset = imbalanced();
        let minority = dataset.class_counts()[1];
        let resampled = RandomUnderSampler::new(0).fit_resample(&dataset).unwrap();

        assert_eq!(resampled.class_counts(), vec![minority, minority]);
        assert_eq!(resampled.n_features(), dataset.n_features());
    }

    #[test]
    fn test_under_sampling_keeps_original_rows() {
        let dataset = imbalanced();
        let resampled = RandomUnderSampler::new(3).fit_resample(&dataset).unwrap();

        for row in resampled.data.rows() {
            assert!(dataset.data.rows().into_iter().any(|r| r == row));
        }
    }

    #[test]
    fn test_over_sampling_balances_to_majority() {
        let dataset = imbalanced();
        let majority = dataset.class_counts()[0];
        let resampled = RandomOverSampler::new(0).fit_resample(&dataset).unwrap();

        assert_eq!(resampled.class_counts(), vec![majority, majority]);
        // The original rows come first, untouched
        assert_eq!(resampled.select(&(0..dataset.len()).collect::<Vec<_>>()), dataset);
    }

    #[test]
    fn test_ratio_strategy() {
        let dataset = imbalanced();
        let majority = dataset.class_counts()[0];
        let sampler = RandomOverSampler {
            strategy: SamplingStrategy::Ratio(0.5),
            seed: 1,
        };
        let resampled = sampler.fit_resample(&dataset).unwrap();

        let expected = (0.5 * majority as f64).round() as usize;
        assert_eq!(resampled.class_counts()[1], expected);
    }

    #[test]
    fn test_same_seed_same_sample() {
        let dataset = imbalanced();
        let a = RandomUnderSampler::new(9).fit_resample(&dataset).unwrap();
        let b = RandomUnderSampler::new(9).fit_resample(&dataset).unwrap();
        assert_eq!(a, b);
    }
}
