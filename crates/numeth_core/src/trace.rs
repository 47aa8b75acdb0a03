//! Per-iteration traces and the advisories attached to results.

use serde::Serialize;
use std::fmt;

/// One table cell of a trace row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
    Integer(i64),
    Value(f64),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Integer(v) => write!(f, "{v}"),
            Cell::Value(v) => write!(f, "{v}"),
        }
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Cell::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Value(value)
    }
}

/// A row with a fixed column layout.
pub trait TraceRow {
    /// Column names, in display order.
    fn headers(&self) -> Vec<String>;
    /// Cell values, one per header.
    fn cells(&self) -> Vec<Cell>;
}

pub(crate) const PREALLOCATED_ROWS: usize = 4096;

/// Ordered, append-only sequence of rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Trace<R> {
    rows: Vec<R>,
}

impl<R> Default for Trace<R> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<R> Trace<R> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reserves room for at most [`PREALLOCATED_ROWS`]; longer traces grow on push.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity.min(PREALLOCATED_ROWS)),
        }
    }

    pub(crate) fn push(&mut self, row: R) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.rows.iter()
    }

    pub fn last(&self) -> Option<&R> {
        self.rows.last()
    }

    pub fn into_rows(self) -> Vec<R> {
        self.rows
    }
}

impl<'a, R> IntoIterator for &'a Trace<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Non-blocking observations about a run, for the caller to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "advisory", rename_all = "snake_case")]
pub enum Advisory {
    /// Estimated |g'(x0)| >= 1; fixed-point iteration may not converge.
    ConvergenceRate { derivative: f64 },
    /// |g'(x0)| could not be estimated.
    ConvergenceEstimateUnavailable,
    /// Rows whose diagonal is smaller than the sum of the off-diagonal magnitudes.
    NotDiagonallyDominant { rows: Vec<usize> },
    /// Simpson 3/8 rounded the number of subintervals up to a multiple of 3.
    PartitionAdjusted { requested: usize, used: usize },
    /// The evaluation coordinate lies outside the sampled range of an axis.
    Extrapolation {
        axis: usize,
        value: f64,
        min: f64,
        max: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_beyond_i64_saturate() {
        assert_eq!(Cell::from(7usize), Cell::Integer(7));
        match Cell::from(usize::MAX) {
            Cell::Integer(v) => assert!(v > 0),
            other => panic!("expected an integer cell, got {other:?}"),
        }
    }

    #[test]
    fn preallocation_is_capped() {
        let trace: Trace<f64> = Trace::with_capacity(usize::MAX);
        assert!(trace.is_empty());
        assert!(trace.rows.capacity() >= PREALLOCATED_ROWS);
    }
}
