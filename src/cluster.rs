//! K-means clustering with k-means++ seeding.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::neighbors::squared_distance;

pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub seed: u64,
    pub centroids: Option<Array2<f64>>,
}

impl KMeans {
    pub fn new(n_clusters: usize, seed: u64) -> KMeans {
        KMeans {
            n_clusters,
            max_iter: 300,
            tol: 1e-4,
            seed,
            centroids: None,
        }
    }

    /// Run Lloyd's algorithm and store the final centroids
    pub fn fit(&mut self, points: &ArrayView2<f64>) -> Result<&Array2<f64>> {
        if self.n_clusters == 0 || self.n_clusters > points.nrows() {
            return Err(Error::invalid_parameter(format!(
                "cannot form {} clusters from {} points",
                self.n_clusters,
                points.nrows()
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = plus_plus_init(points, self.n_clusters, &mut rng);
        // Shift threshold relative to the data spread, as an absolute tol would depend on scale
        let threshold = self.tol * mean_variance(points);

        for iteration in 0..self.max_iter {
            let labels = assign(points, &centroids);
            let updated = recompute(points, &labels, &centroids);
            let shift: f64 = centroids
                .axis_iter(Axis(0))
                .zip(updated.axis_iter(Axis(0)))
                .map(|(old, new)| squared_distance(&old, &new))
                .sum();

            centroids = updated;

            if shift <= threshold {
                tracing::debug!(iteration, shift, "KMeans converged");
                break;
            }
        }

        Ok(&*self.centroids.insert(centroids))
    }

    /// Index of the closest centroid for each row
    pub fn predict(&self, points: &ArrayView2<f64>) -> Result<Array1<usize>> {
        let centroids = self.centroids.as_ref().ok_or(Error::NotFitted("KMeans"))?;

        Ok(assign(points, centroids))
    }
}

fn mean_variance(points: &ArrayView2<f64>) -> f64 {
    points.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0)
}

fn closest(row: &ndarray::ArrayView1<f64>, centroids: &Array2<f64>) -> (usize, f64) {
    centroids
        .axis_iter(Axis(0))
        .enumerate()
        .map(|(idx, c)| (idx, squared_distance(row, &c)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or((0, 0.0))
}

fn assign(points: &ArrayView2<f64>, centroids: &Array2<f64>) -> Array1<usize> {
    points
        .axis_iter(Axis(0))
        .map(|row| closest(&row, centroids).0)
        .collect()
}

/// Mean of each cluster. An empty cluster is moved to the point farthest from its centroid.
fn recompute(
    points: &ArrayView2<f64>,
    labels: &Array1<usize>,
    previous: &Array2<f64>,
) -> Array2<f64> {
    let mut sums = Array2::<f64>::zeros(previous.raw_dim());
    let mut counts = vec![0usize; previous.nrows()];

    for (row, &label) in points.axis_iter(Axis(0)).zip(labels.iter()) {
        let mut sum = sums.row_mut(label);
        sum += &row;
        counts[label] += 1;
    }

    let mut taken = vec![];
    for (cluster, &count) in counts.iter().enumerate() {
        if count > 0 {
            let mut centroid = sums.row_mut(cluster);
            centroid /= count as f64;
            continue;
        }

        let farthest = points
            .axis_iter(Axis(0))
            .enumerate()
            .filter(|(idx, _)| !taken.contains(idx))
            .map(|(idx, row)| (idx, squared_distance(&row, &previous.row(labels[idx]))))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(idx, _)| idx)
            .unwrap_or(0);

        taken.push(farthest);
        sums.row_mut(cluster).assign(&points.row(farthest));
    }

    sums
}

/// k-means++: each new centre is drawn with probability proportional to its
/// squared distance from the centres chosen so far
fn plus_plus_init(points: &ArrayView2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let mut centroids = Array2::<f64>::zeros((k, points.ncols()));
    let first = rng.gen_range(0..points.nrows());
    centroids.row_mut(0).assign(&points.row(first));

    let mut distances: Vec<f64> = points
        .axis_iter(Axis(0))
        .map(|row| squared_distance(&row, &points.row(first)))
        .collect();

    for c in 1..k {
        let next = match WeightedIndex::new(&distances) {
            Ok(dist) => dist.sample(rng),
            // Every remaining point sits on a centre already
            Err(_) => rng.gen_range(0..points.nrows()),
        };
        centroids.row_mut(c).assign(&points.row(next));

        for (d, row) in distances.iter_mut().zip(points.axis_iter(Axis(0))) {
            *d = d.min(squared_distance(&row, &points.row(next)));
        }
    }

    centroids
}
