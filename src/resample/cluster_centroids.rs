use ndarray::Array1;

use super::{under_sampling_targets, Resampler, SamplingStrategy};
use crate::cluster::KMeans;
use crate::error::Result;
use crate::parsing::Dataset;

/// Under-samples by replacing each larger class with the centroids of a
/// k-means fit on its rows
#[derive(Debug, Clone, Default)]
pub struct ClusterCentroids {
    pub strategy: SamplingStrategy,
    pub seed: u64,
}

impl ClusterCentroids {
    pub fn new(seed: u64) -> ClusterCentroids {
        ClusterCentroids {
            strategy: SamplingStrategy::Auto,
            seed,
        }
    }
}

impl Resampler for ClusterCentroids {
    fn fit_resample(&self, dataset: &Dataset) -> Result<Dataset> {
        let targets = under_sampling_targets(dataset, self.strategy)?;
        let mut blocks: Vec<Dataset> = vec![];

        for label in 0..dataset.n_classes() {
            let class = dataset.select(&dataset.indices_of(label));
            if class.is_empty() {
                continue;
            }

            match targets.iter().find(|(l, _)| *l == label) {
                Some(&(_, wanted)) => {
                    let mut kmeans = KMeans::new(wanted, self.seed);
                    let centroids = kmeans.fit(&class.data.view())?.clone();
                    tracing::debug!(label, from = class.len(), to = wanted, "Cluster centroids");
                    blocks.push(Dataset::new(centroids, Array1::from_elem(wanted, label))?);
                }
                None => blocks.push(class),
            }
        }

        let mut blocks = blocks.into_iter();
        let first = match blocks.next() {
            Some(first) => first,
            None => return Ok(dataset.clone()),
        };

        blocks.try_fold(first, |acc, block| acc.concat(&block))
    }

    fn name(&self) -> &'static str {
        "ClusterCentroids"
    }
}
