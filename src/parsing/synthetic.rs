//! Seeded generators for toy classification problems.

use super::Dataset;
use crate::error::{Error, Result};
use ndarray::{s, Array, Array1, Array2, Axis};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Parameters of `make_classification`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationParams {
    pub n_samples: usize,
    pub n_features: usize,
    pub n_informative: usize,
    pub n_redundant: usize,
    pub n_classes: usize,
    pub n_clusters_per_class: usize,
    /// Class proportions. May omit the last class, which then takes the remainder.
    pub weights: Option<Vec<f64>>,
    /// Fraction of labels reassigned at random
    pub flip_y: f64,
    pub class_sep: f64,
    pub random_state: u64,
}

impl Default for ClassificationParams {
    fn default() -> Self {
        Self {
            n_samples: 100,
            n_features: 20,
            n_informative: 2,
            n_redundant: 2,
            n_classes: 2,
            n_clusters_per_class: 2,
            weights: None,
            flip_y: 0.01,
            class_sep: 1.0,
            random_state: 0,
        }
    }
}

/// Draw one sample from N(0, 1) with the Box-Muller transform
pub(crate) fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // gen() is in [0, 1); flip it so the log argument is never zero
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();

    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn normal_matrix<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> Array2<f64> {
    Array::zeros((rows, cols)).map(|_: &f64| standard_normal(rng))
}

fn uniform_matrix<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> Array2<f64> {
    let distribution = Uniform::new(-1.0, 1.0);

    Array::zeros((rows, cols)).map(|_: &f64| distribution.sample(rng))
}

/// Pick `n_vertices` distinct corners of the `dimensions`-dimensional unit hypercube
fn hypercube_vertices<R: Rng>(n_vertices: usize, dimensions: usize, rng: &mut R) -> Array2<f64> {
    let corners = 1usize << dimensions;
    let mut vertices = Array::zeros((n_vertices, dimensions));

    for (row, corner) in index::sample(rng, corners, n_vertices).into_iter().enumerate() {
        for bit in 0..dimensions {
            vertices[[row, bit]] = ((corner >> bit) & 1) as f64;
        }
    }

    vertices
}

fn class_weights(params: &ClassificationParams) -> Result<Vec<f64>> {
    let k = params.n_classes;

    let weights = match &params.weights {
        None => vec![1.0 / k as f64; k],
        Some(w) if w.len() == k => w.clone(),
        Some(w) if w.len() + 1 == k => {
            let mut w = w.clone();
            w.push(1.0 - w.iter().sum::<f64>());
            w
        }
        Some(w) => {
            return Err(Error::invalid_parameter(format!(
                "{} weights given for {} classes",
                w.len(),
                k
            )))
        }
    };

    if weights.iter().any(|w| *w < 0.0) {
        return Err(Error::invalid_parameter("class weights must be non-negative"));
    }

    Ok(weights)
}

/// Generate a random n-class classification problem.
///
/// Each class is made of `n_clusters_per_class` Gaussian clusters placed on the
/// vertices of a hypercube in the informative subspace. Redundant features are
/// random linear combinations of the informative ones and the remaining columns
/// are pure noise. Rows and columns are shuffled.
pub fn make_classification(params: &ClassificationParams) -> Result<Dataset> {
    let n_useful = params.n_informative + params.n_redundant;
    if n_useful > params.n_features {
        return Err(Error::invalid_parameter(format!(
            "n_informative + n_redundant ({}) must not exceed n_features ({})",
            n_useful, params.n_features
        )));
    }
    if params.n_classes < 2 || params.n_clusters_per_class == 0 || params.n_samples == 0 {
        return Err(Error::invalid_parameter(
            "need at least 2 classes, 1 cluster per class and 1 sample",
        ));
    }

    let n_clusters = params.n_classes * params.n_clusters_per_class;
    if params.n_informative >= usize::BITS as usize || n_clusters > 1 << params.n_informative {
        return Err(Error::invalid_parameter(format!(
            "n_classes * n_clusters_per_class ({}) must not exceed 2^n_informative",
            n_clusters
        )));
    }

    let weights = class_weights(params)?;
    let mut rng = StdRng::seed_from_u64(params.random_state);

    // Rows per cluster, with the rounding remainder handed out round-robin
    let mut per_cluster: Vec<usize> = (0..n_clusters)
        .map(|k| {
            (params.n_samples as f64 * weights[k % params.n_classes]
                / params.n_clusters_per_class as f64) as usize
        })
        .collect();
    let assigned: usize = per_cluster.iter().sum();
    if assigned > params.n_samples {
        return Err(Error::invalid_parameter("class weights sum to more than 1"));
    }
    for i in 0..params.n_samples.saturating_sub(assigned) {
        per_cluster[i % n_clusters] += 1;
    }

    let centroids = hypercube_vertices(n_clusters, params.n_informative, &mut rng)
        * (2.0 * params.class_sep)
        - params.class_sep;

    let mut data = Array2::<f64>::zeros((params.n_samples, params.n_features));
    let mut target = Array1::<usize>::zeros(params.n_samples);
    data.slice_mut(s![.., ..params.n_informative])
        .assign(&normal_matrix(params.n_samples, params.n_informative, &mut rng));

    let mut start = 0;
    for (k, centroid) in centroids.axis_iter(Axis(0)).enumerate() {
        let stop = start + per_cluster[k];
        target.slice_mut(s![start..stop]).fill(k % params.n_classes);

        // Introduce random covariance, then move the cluster onto its vertex
        let covariance = uniform_matrix(params.n_informative, params.n_informative, &mut rng);
        let cluster =
            data.slice(s![start..stop, ..params.n_informative]).dot(&covariance) + &centroid;
        data.slice_mut(s![start..stop, ..params.n_informative]).assign(&cluster);

        start = stop;
    }

    if params.n_redundant > 0 {
        let mixing = uniform_matrix(params.n_informative, params.n_redundant, &mut rng);
        let redundant = data.slice(s![.., ..params.n_informative]).dot(&mixing);
        data.slice_mut(s![.., params.n_informative..n_useful]).assign(&redundant);
    }

    let n_noise = params.n_features - n_useful;
    if n_noise > 0 {
        data.slice_mut(s![.., n_useful..])
            .assign(&normal_matrix(params.n_samples, n_noise, &mut rng));
    }

    if params.flip_y > 0.0 {
        for label in target.iter_mut() {
            if rng.gen::<f64>() < params.flip_y {
                *label = rng.gen_range(0..params.n_classes);
            }
        }
    }

    let mut rows: Vec<usize> = (0..params.n_samples).collect();
    rows.shuffle(&mut rng);
    let mut columns: Vec<usize> = (0..params.n_features).collect();
    columns.shuffle(&mut rng);

    let data = data.select(Axis(0), &rows).select(Axis(1), &columns);
    let target = target.select(Axis(0), &rows);

    tracing::debug!(
        samples = params.n_samples,
        features = params.n_features,
        clusters = n_clusters,
        "Generated classification problem"
    );

    Dataset::new(data, target)
}

/// Generate isotropic Gaussian blobs, one label per centre
pub fn make_blobs(
    samples_per_center: usize,
    centers: &Array2<f64>,
    std_dev: f64,
    random_state: u64,
) -> Result<Dataset> {
    if std_dev < 0.0 {
        return Err(Error::invalid_parameter("std_dev must be non-negative"));
    }

    let mut rng = StdRng::seed_from_u64(random_state);
    let n_samples = samples_per_center * centers.nrows();
    let mut data = Array2::<f64>::zeros((n_samples, centers.ncols()));
    let mut target = Array1::<usize>::zeros(n_samples);

    for (label, center) in centers.axis_iter(Axis(0)).enumerate() {
        for i in 0..samples_per_center {
            let row = label * samples_per_center + i;
            target[row] = label;
            for (j, c) in center.iter().enumerate() {
                data[[row, j]] = c + std_dev * standard_normal(&mut rng);
            }
        }
    }

    Dataset::new(data, target)
}
