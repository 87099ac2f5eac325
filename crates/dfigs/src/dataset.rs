//! CSV dataset loading
//!
//! Numeric columns, last column is the target. Empty, `NA` and `nan`
//! cells are read as missing values.

use ndarray::Array2;
use std::path::Path;

use crate::errors::{FigsError, Result};

/// Feature matrix with missing values as NaN, plus targets
#[derive(Clone, Debug)]
pub struct Dataset {
    pub features: Array2<f64>,
    pub targets: Vec<f64>,
}

fn parse_cell(cell: &str, line: usize, column: usize) -> Result<f64> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("na") || cell.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>().map_err(|_| {
        FigsError::Dataset(format!("line {}, column {}: invalid number {:?}", line, column, cell))
    })
}

fn parse_rows(content: &str) -> Result<(Vec<Vec<f64>>, usize)> {
    let mut rows = Vec::new();
    let mut width = 0;

    for (line_idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split(',').map(|s| s.trim()).collect();
        if width == 0 {
            width = parts.len();
        } else if parts.len() != width {
            return Err(FigsError::Dataset(format!(
                "line {}: expected {} columns, got {}",
                line_idx + 1,
                width,
                parts.len()
            )));
        }

        let row = parts
            .iter()
            .enumerate()
            .map(|(i, part)| parse_cell(part, line_idx + 1, i + 1))
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }

    Ok((rows, width))
}

fn to_matrix(rows: Vec<Vec<f64>>, width: usize) -> Result<Array2<f64>> {
    let n = rows.len();
    Array2::from_shape_vec((n, width), rows.into_iter().flatten().collect())
        .map_err(|err| FigsError::Dataset(err.to_string()))
}

impl Dataset {
    /// Load a dataset; expected format `feature1,feature2,...,target`
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let (mut rows, width) = parse_rows(&content)?;

        if rows.is_empty() {
            return Err(FigsError::EmptyDataset);
        }
        if width < 2 {
            return Err(FigsError::Dataset(
                "expected at least one feature column and a target column".to_string(),
            ));
        }

        let mut targets = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter_mut().enumerate() {
            let target = row.pop().unwrap_or(f64::NAN);
            if target.is_nan() {
                return Err(FigsError::Dataset(format!("row {}: missing target", i + 1)));
            }
            targets.push(target);
        }

        Ok(Self {
            features: to_matrix(rows, width - 1)?,
            targets,
        })
    }

    /// Load phase columns only (no target column)
    pub fn phase_from_csv<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let (rows, width) = parse_rows(&content)?;
        if rows.is_empty() {
            return Err(FigsError::EmptyDataset);
        }
        to_matrix(rows, width)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn feature_count(&self) -> usize {
        self.features.ncols()
    }

    /// `(min, max, missing)` per feature, ignoring missing values for the range
    pub fn feature_stats(&self) -> Vec<(f64, f64, usize)> {
        self.features
            .columns()
            .into_iter()
            .map(|column| {
                column.iter().fold((f64::INFINITY, f64::NEG_INFINITY, 0), |(lo, hi, missing), &v| {
                    if v.is_nan() {
                        (lo, hi, missing + 1)
                    } else {
                        (lo.min(v), hi.max(v), missing)
                    }
                })
            })
            .collect()
    }
}
