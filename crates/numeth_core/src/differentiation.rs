//! Central-difference estimate of f''(x0).

use crate::equation_engine::Bindings;
use crate::error::{ensure_finite, ConfigError, Failure, NumericIssue};
use crate::trace::{Cell, Trace, TraceRow};
use crate::traits::Evaluator;
use log::debug;
use serde::Serialize;

const VARIABLE: &str = "x";

/// One stencil point: `offset, x, f(x)` with offset in {-1, 0, +1}.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StencilRow {
    pub offset: i64,
    pub x: f64,
    pub fx: f64,
}

impl TraceRow for StencilRow {
    fn headers(&self) -> Vec<String> {
        vec!["offset".to_string(), "x".to_string(), "f(x)".to_string()]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![Cell::Integer(self.offset), self.x.into(), self.fx.into()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecondDerivative {
    pub value: f64,
    pub step: f64,
    pub trace: Trace<StencilRow>,
}

/// (f(x0+h) − 2·f(x0) + f(x0−h)) / h².
///
/// The stencil is evaluated at x0−h, x0, x0+h in that order.
pub fn second_derivative<E: Evaluator>(
    evaluator: &E,
    expression: &str,
    x0: f64,
    h: f64,
) -> Result<SecondDerivative, Failure<StencilRow>> {
    ensure_finite(&[("x0", x0), ("h", h)])?;
    if h == 0.0 {
        return Err(ConfigError::ZeroStep.into());
    }

    let mut bindings = Bindings::new().with(VARIABLE, x0);
    let mut trace = Trace::with_capacity(3);
    for (index, offset) in [-1_i64, 0, 1].into_iter().enumerate() {
        let x = x0 + offset as f64 * h;
        bindings.set(VARIABLE, x);
        let fx = match evaluator.evaluate(expression, &bindings) {
            Ok(fx) => fx,
            Err(err) => return Err(Failure::numeric(index, err, trace)),
        };
        trace.push(StencilRow { offset, x, fx });
    }

    let [below, center, above] = [0, 1, 2].map(|i| trace.rows()[i].fx);
    let value = (above - 2.0 * center + below) / (h * h);
    if !value.is_finite() {
        return Err(Failure::numeric(
            3,
            NumericIssue::NonFinite {
                quantity: "f''(x0)".to_string(),
            },
            trace,
        ));
    }
    debug!("f''({x0}) ≈ {value} with h = {h}");

    Ok(SecondDerivative {
        value,
        step: h,
        trace,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equation_engine::{EvalError, ExpressionEngine};
    use approx::assert_abs_diff_eq;

    #[test]
    fn exact_for_quadratics() {
        let result = second_derivative(&ExpressionEngine, "3*x^2 - x + 4", 1.5, 0.5).expect("ok");
        assert_abs_diff_eq!(result.value, 6.0, epsilon = 1e-12);
    }

    #[test]
    fn approximates_smooth_functions() {
        let result = second_derivative(&ExpressionEngine, "sin(x)", 1.0, 1e-4).expect("ok");
        assert_abs_diff_eq!(result.value, -(1.0_f64.sin()), epsilon = 1e-5);
    }

    #[test]
    fn trace_holds_the_three_stencil_points_in_order() {
        let result = second_derivative(&ExpressionEngine, "x^3", 2.0, 1.0).expect("ok");
        let rows = result.trace.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows.iter().map(|row| row.offset).collect::<Vec<_>>(),
            vec![-1, 0, 1]
        );
        assert_eq!(
            rows.iter().map(|row| row.fx).collect::<Vec<_>>(),
            vec![1.0, 8.0, 27.0]
        );
        assert_eq!(result.value, 12.0);
        assert_eq!(rows[0].headers(), vec!["offset", "x", "f(x)"]);
    }

    #[test]
    fn zero_step_is_rejected() {
        assert!(matches!(
            second_derivative(&ExpressionEngine, "x", 0.0, 0.0),
            Err(Failure::Configuration(ConfigError::ZeroStep))
        ));
    }

    #[test]
    fn domain_error_reports_the_failing_point() {
        let failure = second_derivative(&ExpressionEngine, "sqrt(x)", 0.0, 0.1).expect_err("domain");
        match failure {
            Failure::Numeric { index, cause, trace } => {
                assert_eq!(index, 0);
                assert!(matches!(
                    cause,
                    NumericIssue::Evaluation(EvalError::Domain { .. })
                ));
                assert!(trace.is_empty());
            }
            other => panic!("expected numeric failure, got {other:?}"),
        }
    }
}
