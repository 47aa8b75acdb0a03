//! Tensor-product Lagrange interpolation over 1, 2 or 3 axes.
//!
//! For axes x (and y, z) with samples x_i, the basis is the product of the
//! one-dimensional Lagrange polynomials
//!
//! ```text
//! L_i(x) = Π_{j≠i} (x − x_j) / (x_i − x_j)
//! ```
//!
//! so a 2D value is Σ_iy Σ_ix Z[iy][ix]·L_iy(y)·L_ix(x). Points outside the
//! sampled range are extrapolated, never rejected.

use crate::error::{ensure_finite, ConfigError, Failure, NumericIssue};
use crate::trace::{Advisory, Cell, Trace, TraceRow};
use log::warn;
use serde::{Deserialize, Serialize};

const AXIS_NAMES: [&str; 3] = ["x", "y", "z"];

/// Sample coordinates per axis plus the sampled values.
///
/// `axes[0]` is x, `axes[1]` y, `axes[2]` z. Values are stored with x
/// varying fastest: index `(iz·ny + iy)·nx + ix`, i.e. shape (nz, ny, nx).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GridSamples")]
pub struct Grid {
    axes: Vec<Vec<f64>>,
    values: Vec<f64>,
}

/// Unchecked serialized form; deserialization goes through [`Grid::new`].
#[derive(Deserialize)]
struct GridSamples {
    axes: Vec<Vec<f64>>,
    values: Vec<f64>,
}

impl TryFrom<GridSamples> for Grid {
    type Error = ConfigError;

    fn try_from(samples: GridSamples) -> Result<Self, Self::Error> {
        Grid::new(samples.axes, samples.values)
    }
}

impl Grid {
    pub fn new(axes: Vec<Vec<f64>>, values: Vec<f64>) -> Result<Self, ConfigError> {
        if !(1..=3).contains(&axes.len()) {
            return Err(ConfigError::Dimensionality { found: axes.len() });
        }
        for (axis, nodes) in axes.iter().enumerate() {
            if nodes.is_empty() {
                return Err(ConfigError::EmptyAxis { axis });
            }
            for (i, &node) in nodes.iter().enumerate() {
                let parameter = format!("{}[{i}]", AXIS_NAMES[axis]);
                ensure_finite(&[(parameter.as_str(), node)])?;
            }
        }
        let expected = axes
            .iter()
            .try_fold(1usize, |acc, nodes| acc.checked_mul(nodes.len()))
            .unwrap_or(usize::MAX);
        if values.len() != expected {
            return Err(ConfigError::GridShape {
                expected,
                found: values.len(),
            });
        }
        for (i, &value) in values.iter().enumerate() {
            let parameter = format!("value[{i}]");
            ensure_finite(&[(parameter.as_str(), value)])?;
        }
        Ok(Self { axes, values })
    }

    /// 1D samples (x_i, z_i).
    pub fn line(x: &[f64], z: &[f64]) -> Result<Self, ConfigError> {
        Self::new(vec![x.to_vec()], z.to_vec())
    }

    /// 2D samples with `z[iy][ix]`.
    pub fn surface(x: &[f64], y: &[f64], z: &[Vec<f64>]) -> Result<Self, ConfigError> {
        if z.len() != y.len() {
            return Err(ConfigError::GridShape {
                expected: x.len() * y.len(),
                found: z.iter().map(Vec::len).sum(),
            });
        }
        for (row, values) in z.iter().enumerate() {
            if values.len() != x.len() {
                return Err(ConfigError::RowLength {
                    row,
                    expected: x.len(),
                    found: values.len(),
                });
            }
        }
        Self::new(vec![x.to_vec(), y.to_vec()], z.concat())
    }

    /// 3D samples with `w[iz][iy][ix]`.
    pub fn volume(
        x: &[f64],
        y: &[f64],
        z: &[f64],
        w: &[Vec<Vec<f64>>],
    ) -> Result<Self, ConfigError> {
        let found: usize = w.iter().flatten().map(Vec::len).sum();
        if w.len() != z.len() || w.iter().any(|layer| layer.len() != y.len()) {
            return Err(ConfigError::GridShape {
                expected: x.len() * y.len() * z.len(),
                found,
            });
        }
        for (row, values) in w.iter().flatten().enumerate() {
            if values.len() != x.len() {
                return Err(ConfigError::RowLength {
                    row,
                    expected: x.len(),
                    found: values.len(),
                });
            }
        }
        let values = w.iter().flatten().flatten().copied().collect();
        Self::new(vec![x.to_vec(), y.to_vec(), z.to_vec()], values)
    }

    pub fn dimension(&self) -> usize {
        self.axes.len()
    }

    pub fn axis(&self, axis: usize) -> &[f64] {
        &self.axes[axis]
    }

    /// Sample value at per-axis indices `(ix, iy, iz)` (unused trailing indices ignored).
    fn value(&self, index: &[usize]) -> f64 {
        let flat = index
            .iter()
            .zip(&self.axes)
            .rev()
            .fold(0, |acc, (&i, nodes)| acc * nodes.len() + i);
        self.values[flat]
    }
}

/// One term of the tensor-product sum.
///
/// Columns run from the outermost axis inwards:
/// 1D `i, x_i, z_i, L_i, z_i*L_i`;
/// 2D `iy, ix, y, x, z, L_y, L_x, contribution`;
/// 3D `iz, iy, ix, z, y, x, w, L_z, L_y, L_x, contribution`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LagrangeRow {
    pub indices: Vec<usize>,
    pub coordinates: Vec<f64>,
    pub sample: f64,
    pub basis: Vec<f64>,
    pub contribution: f64,
}

impl TraceRow for LagrangeRow {
    fn headers(&self) -> Vec<String> {
        let dim = self.indices.len();
        if dim == 1 {
            return ["i", "x_i", "z_i", "L_i", "z_i*L_i"]
                .iter()
                .map(|h| h.to_string())
                .collect();
        }
        let axes: Vec<&str> = AXIS_NAMES[..dim].iter().rev().copied().collect();
        let mut headers: Vec<String> = axes.iter().map(|a| format!("i{a}")).collect();
        headers.extend(axes.iter().map(|a| a.to_string()));
        headers.push(if dim == 2 { "z" } else { "w" }.to_string());
        headers.extend(axes.iter().map(|a| format!("L_{a}")));
        headers.push("contribution".to_string());
        headers
    }

    fn cells(&self) -> Vec<Cell> {
        let mut cells: Vec<Cell> = self.indices.iter().map(|&i| Cell::from(i)).collect();
        cells.extend(self.coordinates.iter().map(|&v| Cell::from(v)));
        cells.push(self.sample.into());
        cells.extend(self.basis.iter().map(|&v| Cell::from(v)));
        cells.push(self.contribution.into());
        cells
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interpolation {
    pub value: f64,
    /// Basis values per axis, `bases[axis][i] = L_i(point[axis])`.
    pub bases: Vec<Vec<f64>>,
    pub extrapolated: bool,
    pub advisories: Vec<Advisory>,
    pub trace: Trace<LagrangeRow>,
}

/// Every L_i(x) for one axis.
pub fn lagrange_basis(axis: usize, nodes: &[f64], x: f64) -> Result<Vec<f64>, NumericIssue> {
    let mut basis = Vec::with_capacity(nodes.len());
    for (i, &xi) in nodes.iter().enumerate() {
        let mut li = 1.0;
        for (j, &xj) in nodes.iter().enumerate() {
            if i == j {
                continue;
            }
            let denominator = xi - xj;
            if denominator == 0.0 {
                return Err(NumericIssue::CoincidentNodes {
                    axis,
                    first: i.min(j),
                    second: i.max(j),
                });
            }
            li *= (x - xj) / denominator;
        }
        basis.push(li);
    }
    Ok(basis)
}

/// Evaluates the interpolant at `point` (`[x]`, `[x, y]` or `[x, y, z]`).
pub fn interpolate(grid: &Grid, point: &[f64]) -> Result<Interpolation, Failure<LagrangeRow>> {
    let dim = grid.dimension();
    if point.len() != dim {
        return Err(ConfigError::PointDimension {
            expected: dim,
            found: point.len(),
        }
        .into());
    }
    for (axis, &coordinate) in point.iter().enumerate() {
        ensure_finite(&[(AXIS_NAMES[axis], coordinate)])?;
    }

    let mut advisories = Vec::new();
    let mut bases = Vec::with_capacity(dim);
    for (axis, &coordinate) in point.iter().enumerate() {
        let nodes = grid.axis(axis);
        let min = nodes.iter().copied().fold(f64::INFINITY, f64::min);
        let max = nodes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if coordinate < min || coordinate > max {
            warn!(
                "{} = {coordinate} lies outside [{min}, {max}]; extrapolating",
                AXIS_NAMES[axis]
            );
            advisories.push(Advisory::Extrapolation {
                axis,
                value: coordinate,
                min,
                max,
            });
        }
        match lagrange_basis(axis, nodes, coordinate) {
            Ok(basis) => bases.push(basis),
            Err(cause) => return Err(Failure::numeric(0, cause, Trace::new())),
        }
    }

    let term_count: usize = bases.iter().map(Vec::len).product();
    let mut trace = Trace::with_capacity(term_count);
    let mut value = 0.0;
    // Outermost axis first: (iz, iy, ix) with ix varying fastest.
    let mut index = vec![0usize; dim];
    for _ in 0..term_count {
        let sample = grid.value(&index);
        let factors: Vec<f64> = (0..dim).rev().map(|axis| bases[axis][index[axis]]).collect();
        let contribution = factors.iter().fold(sample, |acc, l| acc * l);
        value += contribution;
        trace.push(LagrangeRow {
            indices: index.iter().rev().copied().collect(),
            coordinates: (0..dim)
                .rev()
                .map(|axis| grid.axis(axis)[index[axis]])
                .collect(),
            sample,
            basis: factors,
            contribution,
        });
        advance(&mut index, grid);
    }

    Ok(Interpolation {
        value,
        bases,
        extrapolated: !advisories.is_empty(),
        advisories,
        trace,
    })
}

/// Odometer increment with axis 0 (x) as the fastest digit.
fn advance(index: &mut [usize], grid: &Grid) {
    for (axis, i) in index.iter_mut().enumerate() {
        *i += 1;
        if *i < grid.axis(axis).len() {
            return;
        }
        *i = 0;
    }
}
