//! Jacobi iteration for dense square systems A·x = b.

use crate::error::{ensure_finite, ConfigError, Failure, NumericIssue};
use crate::trace::{Advisory, Cell, Trace, TraceRow};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JacobiSettings {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for JacobiSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            max_iterations: 50,
        }
    }
}

/// A validated square system; immutable for the duration of a solve.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    a: DMatrix<f64>,
    b: DVector<f64>,
}

impl LinearSystem {
    pub fn new(a: DMatrix<f64>, b: DVector<f64>) -> Result<Self, ConfigError> {
        let n = a.nrows();
        if n == 0 {
            return Err(ConfigError::EmptySystem);
        }
        if a.ncols() != n {
            return Err(ConfigError::RowLength {
                row: 0,
                expected: n,
                found: a.ncols(),
            });
        }
        if b.len() != n {
            return Err(ConfigError::VectorLength {
                expected: n,
                found: b.len(),
            });
        }
        for (idx, &value) in a.iter().chain(b.iter()).enumerate() {
            if !value.is_finite() {
                let parameter = if idx < n * n {
                    format!("A[{}][{}]", idx % n, idx / n)
                } else {
                    format!("b[{}]", idx - n * n)
                };
                return Err(ConfigError::NonFinite { parameter, value });
            }
        }
        Ok(Self { a, b })
    }

    /// Builds the system from row-major rows of A and the vector b.
    pub fn from_rows(rows: &[Vec<f64>], b: &[f64]) -> Result<Self, ConfigError> {
        let n = rows.len();
        if n == 0 {
            return Err(ConfigError::EmptySystem);
        }
        for (row, values) in rows.iter().enumerate() {
            if values.len() != n {
                return Err(ConfigError::RowLength {
                    row,
                    expected: n,
                    found: values.len(),
                });
            }
        }
        let a = DMatrix::from_row_iterator(n, n, rows.iter().flatten().copied());
        Self::new(a, DVector::from_column_slice(b))
    }

    pub fn dimension(&self) -> usize {
        self.b.len()
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn rhs(&self) -> &DVector<f64> {
        &self.b
    }

    /// Rows where |A[i][i]| < Σ_{j≠i} |A[i][j]|.
    pub fn non_dominant_rows(&self) -> Vec<usize> {
        (0..self.dimension())
            .filter(|&i| {
                let off_diagonal: f64 = (0..self.dimension())
                    .filter(|&j| j != i)
                    .map(|j| self.a[(i, j)].abs())
                    .sum();
                self.a[(i, i)].abs() < off_diagonal
            })
            .collect()
    }

    /// ‖b − A·x‖∞
    pub fn residual_norm(&self, x: &DVector<f64>) -> f64 {
        (&self.b - &self.a * x).amax()
    }
}

/// One sweep: `iter, x1..xn, error`, where x is the new iterate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JacobiRow {
    pub iteration: usize,
    pub x: Vec<f64>,
    pub error: f64,
}

impl TraceRow for JacobiRow {
    fn headers(&self) -> Vec<String> {
        let mut headers = vec!["iter".to_string()];
        headers.extend((1..=self.x.len()).map(|i| format!("x{i}")));
        headers.push("error".to_string());
        headers
    }

    fn cells(&self) -> Vec<Cell> {
        let mut cells = vec![Cell::from(self.iteration)];
        cells.extend(self.x.iter().map(|&v| Cell::from(v)));
        cells.push(self.error.into());
        cells
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JacobiSolution {
    pub x: Vec<f64>,
    pub iterations: usize,
    pub error: f64,
    pub residual: f64,
    pub diagonally_dominant: bool,
    pub advisories: Vec<Advisory>,
    pub trace: Trace<JacobiRow>,
}

/// Solves A·x = b by Jacobi iteration from x = 0.
///
/// Every component of a sweep is computed from the previous iterate only.
/// Converges when ‖x_new − x‖∞ < tolerance.
pub fn solve_jacobi(
    system: &LinearSystem,
    settings: JacobiSettings,
) -> Result<JacobiSolution, Failure<JacobiRow, Vec<f64>>> {
    ensure_finite(&[("tolerance", settings.tolerance)])?;
    if settings.tolerance < 0.0 {
        return Err(ConfigError::NegativeTolerance {
            value: settings.tolerance,
        }
        .into());
    }

    let n = system.dimension();
    let a = system.matrix();
    let b = system.rhs();

    let mut advisories = Vec::new();
    let non_dominant = system.non_dominant_rows();
    let diagonally_dominant = non_dominant.is_empty();
    if !diagonally_dominant {
        warn!("matrix is not diagonally dominant (rows {non_dominant:?}); Jacobi may not converge");
        advisories.push(Advisory::NotDiagonallyDominant { rows: non_dominant });
    }

    let mut trace = Trace::with_capacity(settings.max_iterations);
    let mut x = DVector::<f64>::zeros(n);
    let mut x_new = DVector::<f64>::zeros(n);

    for k in 0..settings.max_iterations {
        for i in 0..n {
            let diagonal = a[(i, i)];
            if diagonal == 0.0 {
                return Err(Failure::numeric(k, NumericIssue::ZeroDiagonal { row: i }, trace));
            }
            let sum: f64 = (0..n).filter(|&j| j != i).map(|j| a[(i, j)] * x[j]).sum();
            let value = (b[i] - sum) / diagonal;
            if !value.is_finite() {
                let cause = NumericIssue::NonFinite {
                    quantity: format!("x{}", i + 1),
                };
                return Err(Failure::numeric(k, cause, trace));
            }
            x_new[i] = value;
        }

        let error = (&x_new - &x).amax();
        trace.push(JacobiRow {
            iteration: k,
            x: x_new.iter().copied().collect(),
            error,
        });

        if error < settings.tolerance {
            debug!("jacobi converged after {} iterations", k + 1);
            return Ok(JacobiSolution {
                residual: system.residual_norm(&x_new),
                x: x_new.iter().copied().collect(),
                iterations: k + 1,
                error,
                diagonally_dominant,
                advisories,
                trace,
            });
        }

        std::mem::swap(&mut x, &mut x_new);
    }

    warn!(
        "jacobi did not converge in {} iterations",
        settings.max_iterations
    );
    Err(Failure::NotConverged {
        iterations: settings.max_iterations,
        residual: system.residual_norm(&x),
        last: x.iter().copied().collect(),
        trace,
    })
}
