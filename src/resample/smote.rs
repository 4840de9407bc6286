use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{over_sampling_targets, Resampler, SamplingStrategy};
use crate::error::{Error, Result};
use crate::neighbors::{k_nearest, self_neighbourhoods};
use crate::parsing::Dataset;

/// Synthetic Minority Over-sampling TEchnique.
///
/// New rows are drawn on the segment between a class member and one of its
/// `k_neighbors` nearest neighbours of the same class.
#[derive(Debug, Clone)]
pub struct Smote {
    pub k_neighbors: usize,
    pub strategy: SamplingStrategy,
    pub seed: u64,
}

impl Smote {
    pub fn new(k_neighbors: usize, seed: u64) -> Smote {
        Smote {
            k_neighbors,
            strategy: SamplingStrategy::Auto,
            seed,
        }
    }
}

impl Default for Smote {
    fn default() -> Self {
        Smote::new(5, 0)
    }
}

impl Resampler for Smote {
    fn fit_resample(&self, dataset: &Dataset) -> Result<Dataset> {
        check_neighbours(self.k_neighbors)?;
        let targets = over_sampling_targets(dataset, self.strategy)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut resampled = dataset.clone();

        for (label, wanted) in targets {
            let class = dataset.select(&dataset.indices_of(label));
            let n_new = wanted.saturating_sub(class.len());
            if class.len() < 2 {
                return Err(Error::resampling(format!(
                    "class {} needs at least 2 rows to interpolate between",
                    label
                )));
            }

            // Small classes use every other member as a neighbour
            let k = self.k_neighbors.min(class.len() - 1);
            let points = class.data.view();
            let hoods = self_neighbourhoods(&points, k)?;

            let seeds: Vec<usize> = (0..n_new).map(|_| rng.gen_range(0..class.len())).collect();
            let synthetic = interpolate(&points, &hoods, &seeds, &mut rng);

            tracing::debug!(label, generated = n_new, "SMOTE");
            let generated = Dataset::new(synthetic, Array1::from_elem(n_new, label))?;
            resampled = resampled.concat(&generated)?;
        }

        Ok(resampled)
    }

    fn name(&self) -> &'static str {
        "SMOTE"
    }
}

/// ADAptive SYNthetic sampling.
///
/// Works like SMOTE but spends more of the new rows on class members whose
/// neighbourhood in the full dataset is dominated by other classes.
#[derive(Debug, Clone)]
pub struct Adasyn {
    pub n_neighbors: usize,
    pub strategy: SamplingStrategy,
    pub seed: u64,
}

impl Adasyn {
    pub fn new(n_neighbors: usize, seed: u64) -> Adasyn {
        Adasyn {
            n_neighbors,
            strategy: SamplingStrategy::Auto,
            seed,
        }
    }
}

impl Default for Adasyn {
    fn default() -> Self {
        Adasyn::new(5, 0)
    }
}

impl Resampler for Adasyn {
    fn fit_resample(&self, dataset: &Dataset) -> Result<Dataset> {
        check_neighbours(self.n_neighbors)?;
        let targets = over_sampling_targets(dataset, self.strategy)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut resampled = dataset.clone();
        let all_points = dataset.data.view();

        if dataset.len() <= self.n_neighbors {
            return Err(Error::invalid_parameter(format!(
                "{} neighbours requested but only {} samples available",
                self.n_neighbors,
                dataset.len()
            )));
        }

        for (label, wanted) in targets {
            let members = dataset.indices_of(label);
            let n_new = wanted.saturating_sub(members.len());

            // Share of foreign neighbours around each member
            let hardness: Vec<f64> = members
                .iter()
                .map(|&idx| {
                    let row = dataset.data.row(idx);
                    let hood = k_nearest(&all_points, &row, self.n_neighbors, Some(idx));
                    let foreign = hood.iter().filter(|&&n| dataset.target[n] != label).count();
                    foreign as f64 / self.n_neighbors as f64
                })
                .collect();

            let total: f64 = hardness.iter().sum();
            if total == 0.0 {
                return Err(Error::resampling(format!(
                    "no neighbour of class {} belongs to another class, \
                     ADASYN has nothing to adapt to",
                    label
                )));
            }

            let seeds: Vec<usize> = hardness
                .iter()
                .enumerate()
                .flat_map(|(i, h)| {
                    let count = (h / total * n_new as f64).round() as usize;
                    std::iter::repeat(i).take(count)
                })
                .collect();

            let class = dataset.select(&members);
            let points = class.data.view();
            let k = self.n_neighbors.min(class.len().saturating_sub(1)).max(1);
            let hoods = self_neighbourhoods(&points, k)?;
            let synthetic = interpolate(&points, &hoods, &seeds, &mut rng);

            tracing::debug!(label, generated = seeds.len(), "ADASYN");
            let generated = Dataset::new(synthetic, Array1::from_elem(seeds.len(), label))?;
            resampled = resampled.concat(&generated)?;
        }

        Ok(resampled)
    }

    fn name(&self) -> &'static str {
        "ADASYN"
    }
}

fn check_neighbours(k: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::invalid_parameter("the number of neighbours must be positive"));
    }

    Ok(())
}

/// One synthetic row per entry of `seeds`: a random point between the seed row
/// and a random member of its neighbourhood
fn interpolate(
    points: &ArrayView2<f64>,
    hoods: &[Vec<usize>],
    seeds: &[usize],
    rng: &mut StdRng,
) -> Array2<f64> {
    let mut synthetic = Array2::zeros((seeds.len(), points.ncols()));

    for (mut out, &seed) in synthetic.axis_iter_mut(Axis(0)).zip(seeds) {
        let hood = &hoods[seed];
        let neighbour = hood[rng.gen_range(0..hood.len())];
        let gap: f64 = rng.gen();

        let base = points.row(seed);
        out.assign(&(&base + &((&points.row(neighbour) - &base) * gap)));
    }

    synthetic
}
