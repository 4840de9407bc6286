//! Brute-force nearest neighbour search.

use ndarray::{ArrayView1, ArrayView2, Axis};

use crate::error::{Error, Result};

/// Squared Euclidean distance between two rows
pub fn squared_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Indices of the `k` rows of `points` closest to `query`, nearest first.
///
/// Equal distances are ordered by row index. `exclude` drops one row from the
/// candidates, which is how a point is kept out of its own neighbourhood.
pub fn k_nearest(
    points: &ArrayView2<f64>,
    query: &ArrayView1<f64>,
    k: usize,
    exclude: Option<usize>,
) -> Vec<usize> {
    let mut candidates: Vec<(f64, usize)> = points
        .axis_iter(Axis(0))
        .enumerate()
        .filter(|(idx, _)| Some(*idx) != exclude)
        .map(|(idx, row)| (squared_distance(&row, query), idx))
        .collect();

    let k = k.min(candidates.len());
    if k == 0 {
        return vec![];
    }

    candidates.select_nth_unstable_by(k - 1, |a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    candidates.truncate(k);
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    candidates.into_iter().map(|(_, idx)| idx).collect()
}

/// Neighbourhoods of every row of `points` within `points` itself, excluding the row
pub fn self_neighbourhoods(points: &ArrayView2<f64>, k: usize) -> Result<Vec<Vec<usize>>> {
    if points.nrows() <= k {
        return Err(Error::invalid_parameter(format!(
            "{} neighbours requested but only {} samples available",
            k,
            points.nrows()
        )));
    }

    Ok(points
        .axis_iter(Axis(0))
        .enumerate()
        .map(|(idx, row)| k_nearest(points, &row, k, Some(idx)))
        .collect())
}
