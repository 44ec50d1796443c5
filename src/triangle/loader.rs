//! Load loss triangles from long-format CSV
//!
//! Expected columns: `origin,development,value`, one row per observed cell.
//! Axis labels keep the order in which they first appear; cells with no row
//! are left unobserved.

use super::Triangle;
use crate::error::{ModelError, Result};
use csv::Reader;
use ndarray::Array2;
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

/// Raw CSV row
#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    origin: String,
    development: String,
    value: f64,
}

/// Load a triangle from a CSV file
pub fn load_triangle<P: AsRef<Path>>(path: P) -> Result<Triangle> {
    let reader = Reader::from_path(path)?;
    collect_rows(reader)
}

/// Load a triangle from any reader (e.g., string buffer)
pub fn load_triangle_from_reader<R: Read>(reader: R) -> Result<Triangle> {
    collect_rows(Reader::from_reader(reader))
}

fn collect_rows<R: Read>(mut reader: Reader<R>) -> Result<Triangle> {
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: CsvRow = result?;
        rows.push(row);
    }

    let mut origin = Axis::default();
    let mut development = Axis::default();
    let cells = rows
        .into_iter()
        .map(|row| {
            let o = origin.index_of(&row.origin);
            let d = development.index_of(&row.development);
            (o, d, row)
        })
        .collect::<Vec<_>>();

    let mut values = Array2::from_elem((origin.labels.len(), development.labels.len()), f64::NAN);
    let mut seen = HashSet::new();
    for (o, d, row) in cells {
        if !seen.insert((o, d)) {
            return Err(ModelError::AxisMismatch(format!(
                "cell [{}, {}] appears more than once",
                row.origin, row.development
            )));
        }
        values[[o, d]] = row.value;
    }

    Ok(Triangle {
        origin_period: origin.labels,
        development_period: development.labels,
        values,
    })
}

/// Labels in order of first appearance
#[derive(Default)]
struct Axis {
    labels: Vec<String>,
    index: HashMap<String, usize>,
}

impl Axis {
    fn index_of(&mut self, label: &str) -> usize {
        if let Some(&i) = self.index.get(label) {
            return i;
        }
        let i = self.labels.len();
        self.labels.push(label.to_string());
        self.index.insert(label.to_string(), i);
        i
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORTED: &str = "origin,development,value
2019,12,100
2019,24,150
2020,12,120
2020,24,180
2021,12,90
";

    #[test]
    fn test_load_from_reader() {
        let tri = load_triangle_from_reader(REPORTED.as_bytes()).unwrap();
        assert_eq!(tri.origin_period, vec!["2019", "2020", "2021"]);
        assert_eq!(tri.development_period, vec!["12", "24"]);
        assert_eq!(tri.values[[1, 1]], 180.0);
        assert!(tri.values[[2, 1]].is_nan());
        assert_eq!(tri.observed_cells(), 5);
    }

    #[test]
    fn test_rows_in_any_order() {
        let csv = "origin,development,value
2020,24,180
2019,12,100
2020,12,120
2019,24,150
";
        let tri = load_triangle_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(tri.origin_period, vec!["2020", "2019"]);
        assert_eq!(tri.development_period, vec!["24", "12"]);
        assert_eq!(tri.values[[0, 0]], 180.0);
        assert_eq!(tri.values[[0, 1]], 120.0);
        assert_eq!(tri.values[[1, 0]], 150.0);
        assert_eq!(tri.values[[1, 1]], 100.0);
    }

    #[test]
    fn test_duplicate_cell_rejected() {
        let csv = "origin,development,value\n2019,12,100\n2019,12,101\n";
        assert!(matches!(
            load_triangle_from_reader(csv.as_bytes()),
            Err(ModelError::AxisMismatch(_))
        ));
    }

    #[test]
    fn test_bad_value_is_csv_error() {
        let csv = "origin,development,value\n2019,12,abc\n";
        assert!(matches!(
            load_triangle_from_reader(csv.as_bytes()),
            Err(ModelError::Csv(_))
        ));
    }

    #[test]
    fn test_load_sample_triangles() {
        let reported = load_triangle("data/reported.csv").expect("Failed to load reported triangle");
        let paid = load_triangle("data/paid.csv").expect("Failed to load paid triangle");
        assert_eq!(reported.values.dim(), (3, 3));
        assert_eq!(reported.observed_cells(), 6);
        assert_eq!(paid.origin_period, reported.origin_period);
        assert_eq!(paid.values[[0, 2]], 160.0);
    }

    #[test]
    fn test_missing_file() {
        assert!(load_triangle("does/not/exist.csv").is_err());
    }
}
