//! Tagged outcomes shared by every method.
//!
//! A method either returns its success payload or a [`Failure`]. Failures
//! detected after the first iteration always carry the trace produced so far.

use crate::equation_engine::EvalError;
use crate::trace::Trace;
use serde::Serialize;
use thiserror::Error;

/// Malformed input, detected before any iteration starts.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "config", rename_all = "snake_case")]
pub enum ConfigError {
    #[error("system has zero dimension")]
    EmptySystem,
    #[error("row {row} has {found} entries, expected {expected}")]
    RowLength {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("vector has {found} entries, expected {expected}")]
    VectorLength { expected: usize, found: usize },
    #[error("only 1, 2 or 3 independent variables are supported, got {found}")]
    Dimensionality { found: usize },
    #[error("axis {axis} has no sample coordinates")]
    EmptyAxis { axis: usize },
    #[error("grid holds {found} values, expected {expected} from the axis sample counts")]
    GridShape { expected: usize, found: usize },
    #[error("evaluation point has {found} coordinates, grid has {expected} axes")]
    PointDimension { expected: usize, found: usize },
    #[error("{equations} equations but {initial} initial values")]
    EquationCount { equations: usize, initial: usize },
    #[error("{parameter} must be finite, got {value}")]
    NonFinite { parameter: String, value: f64 },
    #[error("tolerance must be non-negative, got {value}")]
    NegativeTolerance { value: f64 },
    #[error("number of subintervals must be positive")]
    EmptyPartition,
    #[error("step size must be non-zero")]
    ZeroStep,
    #[error("{count} steps exceed the addressable range")]
    TooManySteps { count: f64 },
    #[error("invalid expression `{expression}`: {reason}")]
    InvalidExpression { expression: String, reason: EvalError },
}

/// Returns [`ConfigError::NonFinite`] for the first non-finite parameter.
pub(crate) fn ensure_finite(parameters: &[(&str, f64)]) -> Result<(), ConfigError> {
    for &(parameter, value) in parameters {
        if !value.is_finite() {
            return Err(ConfigError::NonFinite {
                parameter: parameter.to_string(),
                value,
            });
        }
    }
    Ok(())
}

/// Why an iteration could not continue.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum NumericIssue {
    #[error(transparent)]
    Evaluation(EvalError),
    #[error("derivative estimate is zero")]
    ZeroDerivative,
    #[error("zero diagonal entry in row {row}")]
    ZeroDiagonal { row: usize },
    #[error("axis {axis} has coincident sample coordinates at {first} and {second}")]
    CoincidentNodes {
        axis: usize,
        first: usize,
        second: usize,
    },
    #[error("{quantity} is not finite")]
    NonFinite { quantity: String },
}

impl From<EvalError> for NumericIssue {
    fn from(err: EvalError) -> Self {
        NumericIssue::Evaluation(err)
    }
}

/// Every way a method can stop short of a success payload.
///
/// `R` is the trace row type, `V` the iterate type reported on exhaustion.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Failure<R, V = f64> {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("numeric failure at iteration {index}: {cause}")]
    Numeric {
        index: usize,
        cause: NumericIssue,
        trace: Trace<R>,
    },
    #[error("diverged at iteration {index}: |x| = {value:e} exceeds {bound:e}")]
    Divergence {
        index: usize,
        value: f64,
        bound: f64,
        trace: Trace<R>,
    },
    #[error("did not converge in {iterations} iterations (residual {residual:e})")]
    NotConverged {
        iterations: usize,
        last: V,
        residual: f64,
        trace: Trace<R>,
    },
}

impl<R, V> Failure<R, V> {
    pub(crate) fn numeric(index: usize, cause: impl Into<NumericIssue>, trace: Trace<R>) -> Self {
        Failure::Numeric {
            index,
            cause: cause.into(),
            trace,
        }
    }

    /// The rows produced before the method stopped; empty for configuration errors.
    pub fn trace(&self) -> Option<&Trace<R>> {
        match self {
            Failure::Configuration(_) => None,
            Failure::Numeric { trace, .. }
            | Failure::Divergence { trace, .. }
            | Failure::NotConverged { trace, .. } => Some(trace),
        }
    }
}
