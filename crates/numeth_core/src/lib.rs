//! The `numeth_core` crate provides the numerical methods behind the Numeth front end.
//! Every method takes plain numeric parameters plus expression strings and returns
//! either a success payload or a tagged [`error::Failure`], both carrying the trace
//! of rows computed along the way.
//!
//! Key components:
//! - **Traits**: `Evaluator` (expression capability), `DynamicalSystem` (ODE right-hand sides), `Steppable` (solvers).
//! - **Equation Engine**: A sandboxed parser and bytecode VM implementing `Evaluator`.
//! - **Methods**: fixed-point roots, Jacobi, tensor-product Lagrange, Simpson 3/8, central second differences, RK2 and Euler.
//! - **Reporting**: traces, advisories, fixed-width tables and CSV export.

pub mod differentiation;
pub mod equation_engine;
pub mod error;
pub mod fixed_point;
pub mod interpolation;
pub mod jacobi;
pub mod ode;
pub mod quadrature;
pub mod report;
pub mod solvers;
pub mod trace;
pub mod traits;

pub use equation_engine::{Bindings, EvalError, ExpressionEngine};
pub use error::{ConfigError, Failure, NumericIssue};
pub use trace::{Advisory, Trace, TraceRow};
pub use traits::Evaluator;
