use crate::equation_engine::{Bindings, EvalError};

/// The capability every method is written against: turn an expression and a
/// set of variable bindings into a number.
///
/// Implementations may fail on malformed input, unknown names, domain errors
/// or overflow. The expression is handed over on every call; callers never
/// hold on to a compiled form.
pub trait Evaluator {
    fn evaluate(&self, expression: &str, bindings: &Bindings) -> Result<f64, EvalError>;
}

impl<F> Evaluator for F
where
    F: Fn(&str, &Bindings) -> Result<f64, EvalError>,
{
    fn evaluate(&self, expression: &str, bindings: &Bindings) -> Result<f64, EvalError> {
        self(expression, bindings)
    }
}

/// Represents the right-hand side of a first-order ODE system y' = f(t, y).
pub trait DynamicalSystem {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// t: current time
    /// y: current state
    /// out: buffer to write dy/dt
    fn apply(&self, t: f64, y: &[f64], out: &mut [f64]) -> Result<(), EvalError>;
}

/// A trait for solvers that can step a system forward.
pub trait Steppable {
    /// Performs one step of size dt.
    /// t: current time (updated after step)
    /// state: current state (updated after step)
    /// dt: step size
    ///
    /// On error neither `t` nor `state` is modified.
    fn step(
        &mut self,
        system: &impl DynamicalSystem,
        t: &mut f64,
        state: &mut [f64],
        dt: f64,
    ) -> Result<(), EvalError>;
}
