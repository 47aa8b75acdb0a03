//! Request payloads accepted from the front end and the responses sent back.
//!
//! Every request has a `Default` holding the sample problem the front end
//! pre-fills its form with. Expressions are validated before any method
//! runs, so a typo surfaces as a configuration error with no trace.

use numeth_core::differentiation::{second_derivative, SecondDerivative, StencilRow};
use numeth_core::fixed_point::{
    solve_fixed_point, FixedPointRow, FixedPointSettings, FixedPointSolution, FixedPointStrategy,
};
use numeth_core::interpolation::{interpolate, Grid, Interpolation, LagrangeRow};
use numeth_core::jacobi::{solve_jacobi, JacobiRow, JacobiSettings, JacobiSolution, LinearSystem};
use numeth_core::ode::{
    integrate_euler_system, integrate_rk2, EulerRow, OdeSettings, Rk2Row, ScalarTrajectory,
    SystemTrajectory,
};
use numeth_core::quadrature::{integrate_simpson38, SimpsonIntegral, SimpsonRow, SimpsonSettings};
use numeth_core::{Bindings, ConfigError, ExpressionEngine, Failure};
use serde::{Deserialize, Serialize};

/// What the front end receives: the success payload or the tagged failure,
/// each with the trace computed so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T, R, V = f64> {
    Ok { result: T },
    Failed { message: String, failure: Failure<R, V> },
}

impl<T, R, V> Response<T, R, V> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok { .. })
    }
}

impl<T, R, V> From<Result<T, Failure<R, V>>> for Response<T, R, V> {
    fn from(outcome: Result<T, Failure<R, V>>) -> Self {
        match outcome {
            Ok(result) => Response::Ok { result },
            Err(failure) => Response::Failed {
                message: failure.to_string(),
                failure,
            },
        }
    }
}

fn validate(expression: &str, bindings: &Bindings) -> Result<(), ConfigError> {
    ExpressionEngine
        .validate(expression, bindings)
        .map_err(|reason| ConfigError::InvalidExpression {
            expression: expression.to_string(),
            reason,
        })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootRequest {
    pub expression: String,
    pub strategy: FixedPointStrategy,
    pub x0: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for RootRequest {
    fn default() -> Self {
        let settings = FixedPointSettings::default();
        Self {
            expression: "x**2 - 2*x - 3".to_string(),
            strategy: FixedPointStrategy::Alpha { alpha: -0.1 },
            x0: 1.0,
            tolerance: settings.tolerance,
            max_iterations: settings.max_iterations,
        }
    }
}

impl RootRequest {
    pub fn solve(&self) -> Result<FixedPointSolution, Failure<FixedPointRow>> {
        validate(&self.expression, &Bindings::new().with("x", self.x0))?;
        solve_fixed_point(
            &ExpressionEngine,
            &self.expression,
            self.strategy,
            self.x0,
            FixedPointSettings {
                tolerance: self.tolerance,
                max_iterations: self.max_iterations,
            },
        )
    }

    pub fn run(&self) -> Response<FixedPointSolution, FixedPointRow> {
        self.solve().into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JacobiRequest {
    /// Row-major coefficient matrix.
    pub matrix: Vec<Vec<f64>>,
    pub rhs: Vec<f64>,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for JacobiRequest {
    fn default() -> Self {
        let settings = JacobiSettings::default();
        Self {
            matrix: vec![
                vec![4.0, 1.0, 0.0],
                vec![1.0, 4.0, 1.0],
                vec![0.0, 1.0, 4.0],
            ],
            rhs: vec![6.0, 6.0, 6.0],
            tolerance: settings.tolerance,
            max_iterations: settings.max_iterations,
        }
    }
}

impl JacobiRequest {
    pub fn solve(&self) -> Result<JacobiSolution, Failure<JacobiRow, Vec<f64>>> {
        let system = LinearSystem::from_rows(&self.matrix, &self.rhs)?;
        solve_jacobi(
            &system,
            JacobiSettings {
                tolerance: self.tolerance,
                max_iterations: self.max_iterations,
            },
        )
    }

    pub fn run(&self) -> Response<JacobiSolution, JacobiRow, Vec<f64>> {
        self.solve().into()
    }
}

/// Sample values nested one level per axis, outermost axis first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Samples {
    Line(Vec<f64>),
    Surface(Vec<Vec<f64>>),
    Volume(Vec<Vec<Vec<f64>>>),
}

impl Samples {
    fn count(&self) -> usize {
        match self {
            Samples::Line(z) => z.len(),
            Samples::Surface(z) => z.iter().map(Vec::len).sum(),
            Samples::Volume(w) => w.iter().flatten().map(Vec::len).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationRequest {
    /// Sample coordinates for x, then y, then z.
    pub axes: Vec<Vec<f64>>,
    pub values: Samples,
    pub point: Vec<f64>,
}

impl Default for InterpolationRequest {
    fn default() -> Self {
        let x: Vec<f64> = (0..4).map(f64::from).collect();
        let z = x.iter().map(|v| v * v).collect();
        Self {
            axes: vec![x],
            values: Samples::Line(z),
            point: vec![1.5],
        }
    }
}

impl InterpolationRequest {
    pub fn grid(&self) -> Result<Grid, ConfigError> {
        match (self.axes.as_slice(), &self.values) {
            ([x], Samples::Line(z)) => Grid::line(x, z),
            ([x, y], Samples::Surface(z)) => Grid::surface(x, y, z),
            ([x, y, z], Samples::Volume(w)) => Grid::volume(x, y, z, w),
            (axes, _) if !(1..=3).contains(&axes.len()) => {
                Err(ConfigError::Dimensionality { found: axes.len() })
            }
            (axes, values) => Err(ConfigError::GridShape {
                expected: axes.iter().map(Vec::len).product(),
                found: values.count(),
            }),
        }
    }

    pub fn solve(&self) -> Result<Interpolation, Failure<LagrangeRow>> {
        let grid = self.grid()?;
        interpolate(&grid, &self.point)
    }

    pub fn run(&self) -> Response<Interpolation, LagrangeRow> {
        self.solve().into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpsonRequest {
    pub expression: String,
    pub a: f64,
    pub b: f64,
    pub subintervals: usize,
}

impl Default for SimpsonRequest {
    fn default() -> Self {
        Self {
            expression: "x**2".to_string(),
            a: 0.0,
            b: 1.0,
            subintervals: SimpsonSettings::default().subintervals,
        }
    }
}

impl SimpsonRequest {
    pub fn solve(&self) -> Result<SimpsonIntegral, Failure<SimpsonRow>> {
        validate(&self.expression, &Bindings::new().with("x", self.a))?;
        integrate_simpson38(
            &ExpressionEngine,
            &self.expression,
            self.a,
            self.b,
            SimpsonSettings {
                subintervals: self.subintervals,
            },
        )
    }

    pub fn run(&self) -> Response<SimpsonIntegral, SimpsonRow> {
        self.solve().into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivativeRequest {
    pub expression: String,
    pub x0: f64,
    pub h: f64,
}

impl Default for DerivativeRequest {
    fn default() -> Self {
        Self {
            expression: "x**3".to_string(),
            x0: 1.0,
            h: 0.01,
        }
    }
}

impl DerivativeRequest {
    pub fn solve(&self) -> Result<SecondDerivative, Failure<StencilRow>> {
        validate(&self.expression, &Bindings::new().with("x", self.x0))?;
        second_derivative(&ExpressionEngine, &self.expression, self.x0, self.h)
    }

    pub fn run(&self) -> Response<SecondDerivative, StencilRow> {
        self.solve().into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rk2Request {
    /// Right-hand side f(t, y).
    pub expression: String,
    pub y0: f64,
    pub t0: f64,
    pub tf: f64,
    pub h: f64,
}

impl Default for Rk2Request {
    fn default() -> Self {
        Self {
            expression: "-2*y".to_string(),
            y0: 1.0,
            t0: 0.0,
            tf: 2.0,
            h: 0.1,
        }
    }
}

impl Rk2Request {
    pub fn solve(&self) -> Result<ScalarTrajectory, Failure<Rk2Row>> {
        let bindings = Bindings::new().with("t", self.t0).with("y", self.y0);
        validate(&self.expression, &bindings)?;
        integrate_rk2(
            &ExpressionEngine,
            &self.expression,
            self.y0,
            OdeSettings {
                t0: self.t0,
                tf: self.tf,
                step: self.h,
            },
        )
    }

    pub fn run(&self) -> Response<ScalarTrajectory, Rk2Row> {
        self.solve().into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EulerRequest {
    /// `equations[j]` is y[j]' in terms of `t` and `y[0]..y[m-1]`.
    pub equations: Vec<String>,
    pub y0: Vec<f64>,
    pub t0: f64,
    pub tf: f64,
    pub h: f64,
}

impl Default for EulerRequest {
    fn default() -> Self {
        Self {
            equations: vec!["y[1]".to_string(), "-y[0]".to_string()],
            y0: vec![1.0, 0.0],
            t0: 0.0,
            tf: 10.0,
            h: 0.01,
        }
    }
}

impl EulerRequest {
    pub fn solve(&self) -> Result<SystemTrajectory, Failure<EulerRow>> {
        let bindings = Bindings::new().with("t", self.t0).with_array("y", &self.y0);
        for equation in &self.equations {
            validate(equation, &bindings)?;
        }
        integrate_euler_system(
            &ExpressionEngine,
            &self.equations,
            &self.y0,
            OdeSettings {
                t0: self.t0,
                tf: self.tf,
                step: self.h,
            },
        )
    }

    pub fn run(&self) -> Response<SystemTrajectory, EulerRow> {
        self.solve().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use numeth_core::equation_engine::EvalError;

    #[test]
    fn default_requests_all_succeed() {
        assert!(RootRequest::default().run().is_ok());
        assert!(JacobiRequest::default().run().is_ok());
        assert!(InterpolationRequest::default().run().is_ok());
        assert!(SimpsonRequest::default().run().is_ok());
        assert!(DerivativeRequest::default().run().is_ok());
        assert!(Rk2Request::default().run().is_ok());
        assert!(EulerRequest::default().run().is_ok());
    }

    #[test]
    fn default_interpolation_evaluates_the_parabola() {
        let result = InterpolationRequest::default().solve().expect("interpolates");
        assert!((result.value - 2.25).abs() < 1e-12);
    }

    #[test]
    fn unknown_variable_fails_before_iterating() {
        let request = RootRequest {
            expression: "x^2 - q".to_string(),
            ..RootRequest::default()
        };
        match request.run() {
            Response::Failed { failure, message } => {
                assert_eq!(
                    failure,
                    Failure::Configuration(ConfigError::InvalidExpression {
                        expression: "x^2 - q".to_string(),
                        reason: EvalError::UnknownVariable {
                            name: "q".to_string()
                        },
                    })
                );
                assert!(message.contains("x^2 - q"));
                assert!(failure.trace().is_none());
            }
            Response::Ok { .. } => panic!("expected failure"),
        }
    }

    #[test]
    fn malformed_system_equation_is_a_configuration_error() {
        let request = EulerRequest {
            equations: vec!["y[1] +".to_string(), "-y[0]".to_string()],
            ..EulerRequest::default()
        };
        assert!(matches!(
            request.solve(),
            Err(Failure::Configuration(ConfigError::InvalidExpression { .. }))
        ));
    }

    #[test]
    fn interpolation_nesting_must_match_the_axes() {
        let request = InterpolationRequest {
            axes: vec![vec![0.0, 1.0], vec![0.0, 1.0]],
            values: Samples::Line(vec![1.0, 2.0, 3.0, 4.0]),
            point: vec![0.5, 0.5],
        };
        assert_eq!(
            request.grid(),
            Err(ConfigError::GridShape {
                expected: 4,
                found: 4
            })
        );

        let request = InterpolationRequest {
            axes: vec![],
            ..InterpolationRequest::default()
        };
        assert_eq!(request.grid(), Err(ConfigError::Dimensionality { found: 0 }));
    }

    #[test]
    fn surface_request_builds_a_two_dimensional_grid() {
        let request = InterpolationRequest {
            axes: vec![vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 2.0]],
            values: Samples::Surface(vec![
                vec![0.0, 1.0, 2.0],
                vec![1.0, 2.0, 3.0],
                vec![2.0, 3.0, 4.0],
            ]),
            point: vec![0.5, 0.5],
        };
        let result = request.solve().expect("interpolates");
        assert!((result.value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn jacobi_shape_errors_pass_through() {
        let request = JacobiRequest {
            rhs: vec![1.0, 2.0],
            ..JacobiRequest::default()
        };
        assert!(matches!(
            request.run(),
            Response::Failed {
                failure: Failure::Configuration(ConfigError::VectorLength { .. }),
                ..
            }
        ));
    }

    #[test]
    fn derivative_of_the_default_cubic() {
        let result = DerivativeRequest::default().solve().expect("ok");
        // f'' = 6x for x^3, exact up to round-off
        assert!((result.value - 6.0).abs() < 1e-6);
    }
}
