//! Ordered feature phases
//!
//! Columns arrive in phases. A sample may only have new-phase data if
//! every earlier-phase value for that sample is present.

use ndarray::{concatenate, Array2, ArrayView1, ArrayView2, Axis};
use tracing::warn;

use crate::errors::{FigsError, Result};

fn row_complete(row: ArrayView1<f64>) -> bool {
    row.iter().all(|v| !v.is_nan())
}

fn row_has_value(row: ArrayView1<f64>) -> bool {
    row.iter().any(|v| !v.is_nan())
}

/// Reject `new_phase` if any sample has a missing value in `existing` and
/// a present value in `new_phase`. The whole call fails on the first
/// violating sample.
pub fn check_phase(existing: ArrayView2<f64>, new_phase: ArrayView2<f64>) -> Result<()> {
    if existing.nrows() != new_phase.nrows() {
        return Err(FigsError::ShapeMismatch {
            what: "phase rows",
            expected: existing.nrows(),
            actual: new_phase.nrows(),
        });
    }

    let violation = existing
        .rows()
        .into_iter()
        .zip(new_phase.rows())
        .position(|(old, new)| !row_complete(old) && row_has_value(new));

    match violation {
        Some(sample) => {
            warn!(sample, "Rejected phase: data present where an earlier phase is missing");
            Err(FigsError::PhaseOrder { sample })
        }
        None => Ok(()),
    }
}

/// Keep only the samples whose new-phase row has no missing value
pub fn restrict_to_complete(idxs: &[usize], new_phase: ArrayView2<f64>) -> Vec<usize> {
    idxs.iter()
        .copied()
        .filter(|&i| row_complete(new_phase.row(i)))
        .collect()
}

/// Feature columns grouped into ordered phases
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseStore {
    data: Array2<f64>,
    /// Exclusive end column of each phase
    boundaries: Vec<usize>,
}

impl PhaseStore {
    /// A store whose first phase is `initial`
    pub fn new(initial: ArrayView2<f64>) -> Self {
        Self {
            data: initial.to_owned(),
            boundaries: vec![initial.ncols()],
        }
    }

    pub fn data(&self) -> ArrayView2<f64> {
        self.data.view()
    }

    pub fn n_phases(&self) -> usize {
        self.boundaries.len()
    }

    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    /// Columns of phase `k`
    pub fn phase(&self, k: usize) -> Option<ArrayView2<f64>> {
        let end = *self.boundaries.get(k)?;
        let start = if k == 0 { 0 } else { self.boundaries[k - 1] };
        Some(self.data.slice(ndarray::s![.., start..end]))
    }

    /// Validate and append a phase. Nothing changes if validation fails.
    pub fn push_phase(&mut self, new_phase: ArrayView2<f64>) -> Result<()> {
        check_phase(self.data.view(), new_phase)?;
        let rows = self.data.nrows();
        let new_phase = new_phase.to_owned();
        let data = concatenate(Axis(1), &[self.data.view(), new_phase.view()]).map_err(|_| {
            FigsError::ShapeMismatch {
                what: "phase rows",
                expected: rows,
                actual: new_phase.nrows(),
            }
        })?;
        self.boundaries.push(data.ncols());
        self.data = data;
        Ok(())
    }
}
