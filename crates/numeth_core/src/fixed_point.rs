//! Fixed-point iteration x_{k+1} = g(x_k) for f(x) = 0.
//!
//! g is derived from f by one of two strategies:
//! - `Alpha`: g(x) = x + α·f(x)
//! - `Newton`: g(x) = x − f(x)/f'(x), with f' from a central difference.

use crate::equation_engine::Bindings;
use crate::error::{ensure_finite, ConfigError, Failure, NumericIssue};
use crate::trace::{Advisory, Cell, Trace, TraceRow};
use crate::traits::Evaluator;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Step used for f'(x) in the Newton strategy.
pub const NEWTON_STEP: f64 = 1e-8;
/// Step used for the advisory |g'(x0)| estimate.
pub const RATE_ESTIMATE_STEP: f64 = 1e-6;
/// |x| beyond which the iteration is declared divergent.
pub const DIVERGENCE_BOUND: f64 = 1e10;

const VARIABLE: &str = "x";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum FixedPointStrategy {
    Alpha { alpha: f64 },
    Newton,
}

impl FixedPointStrategy {
    /// Human-readable form of the derived iteration function.
    pub fn describe(&self) -> String {
        match self {
            FixedPointStrategy::Alpha { alpha } => format!("g(x) = x + {alpha}*f(x)"),
            FixedPointStrategy::Newton => "g(x) = x - f(x)/f'(x)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedPointSettings {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for FixedPointSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            max_iterations: 50,
        }
    }
}

/// One iteration: `iter, x, f(x), g(x), error`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FixedPointRow {
    pub iteration: usize,
    pub x: f64,
    pub fx: f64,
    pub gx: f64,
    pub error: f64,
}

impl TraceRow for FixedPointRow {
    fn headers(&self) -> Vec<String> {
        ["iter", "x", "f(x)", "g(x)", "error"]
            .iter()
            .map(|h| h.to_string())
            .collect()
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.iteration.into(),
            self.x.into(),
            self.fx.into(),
            self.gx.into(),
            self.error.into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixedPointSolution {
    pub root: f64,
    /// f(root); NaN if f could not be evaluated there.
    pub residual: f64,
    pub iterations: usize,
    pub error: f64,
    pub iteration_function: String,
    /// Estimated |g'(x0)|, when it could be computed.
    pub rate_estimate: Option<f64>,
    pub advisories: Vec<Advisory>,
    pub trace: Trace<FixedPointRow>,
}

/// f and the derived g, evaluated through an [`Evaluator`].
struct IterationFunction<'a, E: Evaluator> {
    evaluator: &'a E,
    expression: &'a str,
    strategy: FixedPointStrategy,
    bindings: Bindings,
}

impl<'a, E: Evaluator> IterationFunction<'a, E> {
    fn new(evaluator: &'a E, expression: &'a str, strategy: FixedPointStrategy) -> Self {
        Self {
            evaluator,
            expression,
            strategy,
            bindings: Bindings::new().with(VARIABLE, 0.0),
        }
    }

    fn f(&mut self, x: f64) -> Result<f64, NumericIssue> {
        self.bindings.set(VARIABLE, x);
        let value = self.evaluator.evaluate(self.expression, &self.bindings)?;
        finite(value, "f(x)")
    }

    /// g(x), given fx = f(x).
    fn g(&mut self, x: f64, fx: f64) -> Result<f64, NumericIssue> {
        let gx = match self.strategy {
            FixedPointStrategy::Alpha { alpha } => x + alpha * fx,
            FixedPointStrategy::Newton => {
                let h = NEWTON_STEP;
                let derivative = (self.f(x + h)? - self.f(x - h)?) / (2.0 * h);
                if derivative == 0.0 {
                    return Err(NumericIssue::ZeroDerivative);
                }
                x - fx / derivative
            }
        };
        finite(gx, "g(x)")
    }

    fn g_at(&mut self, x: f64) -> Result<f64, NumericIssue> {
        let fx = self.f(x)?;
        self.g(x, fx)
    }

    fn rate_estimate(&mut self, x0: f64) -> Result<f64, NumericIssue> {
        let h = RATE_ESTIMATE_STEP;
        let slope = (self.g_at(x0 + h)? - self.g_at(x0 - h)?) / (2.0 * h);
        finite(slope.abs(), "g'(x0)")
    }
}

fn finite(value: f64, quantity: &str) -> Result<f64, NumericIssue> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(NumericIssue::NonFinite {
            quantity: quantity.to_string(),
        })
    }
}

/// Runs fixed-point iteration on f(x) = `expression` from `x0`.
///
/// Converges when |g(x) − x| < tolerance (strict), returning the new
/// iterate. Stops with `Divergence` once |g(x)| > [`DIVERGENCE_BOUND`].
pub fn solve_fixed_point<E: Evaluator>(
    evaluator: &E,
    expression: &str,
    strategy: FixedPointStrategy,
    x0: f64,
    settings: FixedPointSettings,
) -> Result<FixedPointSolution, Failure<FixedPointRow>> {
    ensure_finite(&[("x0", x0), ("tolerance", settings.tolerance)])?;
    if let FixedPointStrategy::Alpha { alpha } = strategy {
        ensure_finite(&[("alpha", alpha)])?;
    }
    if settings.tolerance < 0.0 {
        return Err(ConfigError::NegativeTolerance {
            value: settings.tolerance,
        }
        .into());
    }

    let mut function = IterationFunction::new(evaluator, expression, strategy);

    let mut advisories = Vec::new();
    let rate_estimate = match function.rate_estimate(x0) {
        Ok(rate) => {
            if rate >= 1.0 {
                warn!("|g'(x0)| ≈ {rate:.6} >= 1, fixed-point iteration may not converge");
                advisories.push(Advisory::ConvergenceRate { derivative: rate });
            } else {
                debug!("|g'(x0)| ≈ {rate:.6} < 1, convergence expected");
            }
            Some(rate)
        }
        Err(err) => {
            warn!("could not estimate |g'(x0)|: {err}");
            advisories.push(Advisory::ConvergenceEstimateUnavailable);
            None
        }
    };

    let mut trace = Trace::with_capacity(settings.max_iterations);
    let mut x = x0;
    for i in 0..settings.max_iterations {
        let step = function
            .f(x)
            .and_then(|fx| function.g(x, fx).map(|gx| (fx, gx)));
        let (fx, x_new) = match step {
            Ok(values) => values,
            Err(cause) => return Err(Failure::numeric(i, cause, trace)),
        };
        let error = (x_new - x).abs();
        trace.push(FixedPointRow {
            iteration: i,
            x,
            fx,
            gx: x_new,
            error,
        });

        if error < settings.tolerance {
            let residual = function.f(x_new).unwrap_or_else(|err| {
                warn!("could not evaluate f at the root: {err}");
                f64::NAN
            });
            debug!("fixed point converged to {x_new} after {} iterations", i + 1);
            return Ok(FixedPointSolution {
                root: x_new,
                residual,
                iterations: i + 1,
                error,
                iteration_function: strategy.describe(),
                rate_estimate,
                advisories,
                trace,
            });
        }

        if x_new.abs() > DIVERGENCE_BOUND {
            warn!("fixed point diverged at iteration {i}: |x| = {:e}", x_new.abs());
            return Err(Failure::Divergence {
                index: i,
                value: x_new,
                bound: DIVERGENCE_BOUND,
                trace,
            });
        }

        x = x_new;
    }

    let residual = function.f(x).unwrap_or(f64::NAN);
    warn!(
        "fixed point did not converge in {} iterations",
        settings.max_iterations
    );
    Err(Failure::NotConverged {
        iterations: settings.max_iterations,
        last: x,
        residual,
        trace,
    })
}
