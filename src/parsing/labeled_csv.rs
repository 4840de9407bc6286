use super::Dataset;
use crate::error::{Error, Result};
use ndarray::{Array, Array1, ArrayView};
use std::path::Path;

/// Where the class label sits in each record
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq)]
pub enum LabelColumn {
    /// Records look like <label>,<x1>,<x2>,...
    First,
    /// Records look like <x1>,<x2>,...,<label>
    #[default]
    Last,
}

/// Parse a numeric field, reporting the (1-based, header included) line on failure
fn parse_field(field: &str, line: u64) -> Result<f64> {
    field
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::dataset(format!("line {}: '{}' is not a number", line, field)))
}

/// Labels must be non-negative integers, but files often store them as 1.0
fn parse_label(field: &str, line: u64) -> Result<usize> {
    let value = parse_field(field, line)?;

    if value < 0.0 || value.fract() != 0.0 || value >= usize::MAX as f64 {
        return Err(Error::dataset(format!(
            "line {}: label '{}' is not a non-negative integer",
            line, field
        )));
    }

    Ok(value as usize)
}

/// Map raw labels onto `0..k` in ascending order. Returns the dense targets and
/// the raw label behind each dense index.
fn densify(raw: &[usize]) -> (Array1<usize>, Vec<usize>) {
    let mut classes = raw.to_vec();
    classes.sort_unstable();
    classes.dedup();

    let target = raw
        .iter()
        .map(|label| classes.binary_search(label).unwrap_or_default())
        .collect();

    (target, classes)
}

/// Read a labeled dataset from any CSV source. The first row is a header and is skipped.
///
/// Labels are renumbered `0..k` in ascending order; the second value holds the
/// label found in the file for each class index.
pub fn read_labeled<R: std::io::Read>(
    source: R,
    label_column: LabelColumn,
) -> Result<(Dataset, Vec<usize>)> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(source);
    let mut data = None;
    let mut labels = vec![];

    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());

        if record.len() < 2 {
            return Err(Error::dataset(format!(
                "line {}: need at least one feature and a label",
                line
            )));
        }

        let (label_field, feature_fields) = match label_column {
            LabelColumn::First => (&record[0], (1..record.len()).collect::<Vec<_>>()),
            LabelColumn::Last => (
                &record[record.len() - 1],
                (0..record.len() - 1).collect::<Vec<_>>(),
            ),
        };

        let features = feature_fields
            .into_iter()
            .map(|idx| parse_field(&record[idx], line))
            .collect::<Result<Vec<f64>>>()?;

        let matrix = data.get_or_insert_with(|| Array::zeros((0, features.len())));
        matrix
            .push_row(ArrayView::from(&features))
            .map_err(|_| {
                Error::dataset(format!(
                    "line {}: expected {} features, found {}",
                    line,
                    matrix.ncols(),
                    features.len()
                ))
            })?;

        labels.push(parse_label(label_field, line)?);
    }

    let data = data.ok_or_else(|| Error::dataset("no records found"))?;
    let (target, classes) = densify(&labels);

    Ok((Dataset::new(data, target)?, classes))
}

/// Like `read_labeled`, dropping the raw labels
pub fn read_dataset<R: std::io::Read>(source: R, label_column: LabelColumn) -> Result<Dataset> {
    read_labeled(source, label_column).map(|(dataset, _)| dataset)
}

/// Load a labeled CSV file from disk, with the raw label of each class index
pub fn load_labeled(path: &Path, label_column: LabelColumn) -> Result<(Dataset, Vec<usize>)> {
    let file = std::fs::File::open(path)?;
    let (dataset, classes) = read_labeled(file, label_column)?;

    tracing::debug!(
        path = %path.display(),
        rows = dataset.len(),
        features = dataset.n_features(),
        classes = classes.len(),
        "Loaded labeled CSV"
    );

    Ok((dataset, classes))
}

/// Load a labeled CSV file from disk
pub fn load_dataset(path: &Path, label_column: LabelColumn) -> Result<Dataset> {
    load_labeled(path, label_column).map(|(dataset, _)| dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;
    use std::io::Write;

    #[test]
    fn test_read_label_last() {
        let content = "a,b,label\n0.5,1.0,0\n1.5,2.0,1\n";
        let dataset = read_dataset(content.as_bytes(), LabelColumn::Last).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.n_features(), 2);
        assert_eq!(dataset.target, arr1(&[0, 1]));
        assert_eq!(dataset.data[[1, 0]], 1.5);
    }

    #[test]
    fn test_read_label_first_with_float_labels() {
        let content = "label,x\n1.0,3.0\n0,4.0\n";
        let dataset = read_dataset(content.as_bytes(), LabelColumn::First).unwrap();

        assert_eq!(dataset.target, arr1(&[1, 0]));
        assert_eq!(dataset.data[[0, 0]], 3.0);
    }

    #[test]
    fn test_huge_label_becomes_class_one() {
        let content = "a,b,label\n0.0,1.0,0\n1.0,0.0,100000000000000\n2.0,0.0,0\n";
        let (dataset, classes) = read_labeled(content.as_bytes(), LabelColumn::Last).unwrap();

        assert_eq!(dataset.target, arr1(&[0, 1, 0]));
        assert_eq!(dataset.n_classes(), 2);
        assert_eq!(dataset.class_counts(), vec![2, 1]);
        assert_eq!(classes, vec![0, 100_000_000_000_000]);
    }

    #[test]
    fn test_sparse_labels_are_renumbered_in_order() {
        let content = "x,y\n1.0,7\n2.0,3\n3.0,7\n4.0,3.0\n";
        let (dataset, classes) = read_labeled(content.as_bytes(), LabelColumn::Last).unwrap();

        assert_eq!(dataset.target, arr1(&[1, 0, 1, 0]));
        assert_eq!(classes, vec![3, 7]);
        assert_eq!(
            read_dataset(content.as_bytes(), LabelColumn::Last).unwrap(),
            dataset
        );
    }

    #[test]
    fn test_rejects_label_beyond_integer_range() {
        let content = "x,y\n1.0,1e30\n";
        assert!(matches!(
            read_dataset(content.as_bytes(), LabelColumn::Last),
            Err(Error::Dataset(_))
        ));
    }

    #[test]
    fn test_rejects_non_numeric_feature() {
        let content = "x,y\nabc,0\n";
        let err = read_dataset(content.as_bytes(), LabelColumn::Last).unwrap_err();
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_rejects_fractional_label() {
        let content = "x,y\n1.0,0.5\n";
        assert!(read_dataset(content.as_bytes(), LabelColumn::Last).is_err());
    }

    #[test]
    fn test_rejects_empty_file() {
        let content = "x,y\n";
        assert!(matches!(
            read_dataset(content.as_bytes(), LabelColumn::Last),
            Err(Error::Dataset(_))
        ));
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "f0,f1,f2,y").unwrap();
        writeln!(file, "1,2,3,1").unwrap();
        writeln!(file, "4,5,6,0").unwrap();

        let dataset = load_dataset(file.path(), LabelColumn::Last).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.n_features(), 3);

        let (_, classes) = load_labeled(file.path(), LabelColumn::Last).unwrap();
        assert_eq!(classes, vec![0, 1]);
    }
}
