use super::{cleaning_targets, Resampler};
use crate::error::Result;
use crate::neighbors::self_neighbourhoods;
use crate::parsing::Dataset;

/// Removes the non-minority member of every Tomek link.
///
/// Two rows form a link when they carry different labels and each one is the
/// other's nearest neighbour.
#[derive(Debug, Clone, Default)]
pub struct TomekLinks;

impl TomekLinks {
    pub fn new() -> TomekLinks {
        TomekLinks
    }

    /// Flags, per row, whether the row takes part in a link
    pub fn links(dataset: &Dataset) -> Result<Vec<bool>> {
        let nearest: Vec<usize> = self_neighbourhoods(&dataset.data.view(), 1)?
            .into_iter()
            .map(|hood| hood[0])
            .collect();

        Ok((0..dataset.len())
            .map(|i| {
                let j = nearest[i];
                dataset.target[i] != dataset.target[j] && nearest[j] == i
            })
            .collect())
    }
}

impl Resampler for TomekLinks {
    fn fit_resample(&self, dataset: &Dataset) -> Result<Dataset> {
        let removable = cleaning_targets(dataset)?;
        let links = TomekLinks::links(dataset)?;

        let keep: Vec<usize> = (0..dataset.len())
            .filter(|&i| !(links[i] && removable.contains(&dataset.target[i])))
            .collect();

        tracing::debug!(removed = dataset.len() - keep.len(), "Tomek links");

        Ok(dataset.select(&keep))
    }

    fn name(&self) -> &'static str {
        "TomekLinks"
    }
}
