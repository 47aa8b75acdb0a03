//! Fixed-step integration of y' = f(t, y).
//!
//! Both integrators take `n = floor((tf − t0) / h)` steps and produce a
//! trajectory of `n + 1` states starting at `(t0, y0)`. A non-positive step
//! or an empty interval yields the initial state alone.

use crate::equation_engine::{Bindings, EvalError};
use crate::error::{ensure_finite, ConfigError, Failure, NumericIssue};
use crate::solvers::{ForwardEuler, Rk2Midpoint};
use crate::trace::{Cell, Trace, TraceRow, PREALLOCATED_ROWS};
use crate::traits::{DynamicalSystem, Evaluator, Steppable};
use log::debug;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OdeSettings {
    pub t0: f64,
    pub tf: f64,
    pub step: f64,
}

impl OdeSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure_finite(&[("t0", self.t0), ("tf", self.tf), ("h", self.step)])
    }
}

/// `floor((tf − t0) / h)`, or 0 when `h <= 0` or `tf <= t0`.
///
/// A ratio that overflows or does not fit a `usize` is rejected.
pub fn step_count(t0: f64, tf: f64, h: f64) -> Result<usize, ConfigError> {
    if h <= 0.0 {
        return Ok(0);
    }
    let n = ((tf - t0) / h).floor();
    if !n.is_finite() || n >= usize::MAX as f64 {
        return Err(ConfigError::TooManySteps { count: n });
    }
    if n >= 1.0 {
        Ok(n as usize)
    } else {
        Ok(0)
    }
}

fn preallocated(n: usize) -> usize {
    n.saturating_add(1).min(PREALLOCATED_ROWS)
}

/// y' = f(t, y) for a single unknown; the expression sees `t` and `y`.
pub struct ScalarEquation<'a, E: Evaluator> {
    evaluator: &'a E,
    expression: &'a str,
    bindings: RefCell<Bindings>,
}

impl<'a, E: Evaluator> ScalarEquation<'a, E> {
    pub fn new(evaluator: &'a E, expression: &'a str) -> Self {
        Self {
            evaluator,
            expression,
            bindings: RefCell::new(Bindings::new().with("t", 0.0).with("y", 0.0)),
        }
    }
}

impl<E: Evaluator> DynamicalSystem for ScalarEquation<'_, E> {
    fn dimension(&self) -> usize {
        1
    }

    fn apply(&self, t: f64, y: &[f64], out: &mut [f64]) -> Result<(), EvalError> {
        let mut bindings = self.bindings.borrow_mut();
        bindings.set("t", t);
        bindings.set("y", y[0]);
        out[0] = self.evaluator.evaluate(self.expression, &bindings)?;
        Ok(())
    }
}

/// One expression per component; each sees `t` and the whole vector `y`
/// through `y[0]`, `y[1]`, ...
pub struct EquationSystem<'a, E: Evaluator> {
    evaluator: &'a E,
    equations: &'a [String],
    bindings: RefCell<Bindings>,
}

impl<'a, E: Evaluator> EquationSystem<'a, E> {
    pub fn new(evaluator: &'a E, equations: &'a [String]) -> Self {
        Self {
            evaluator,
            equations,
            bindings: RefCell::new(Bindings::new().with("t", 0.0).with_array("y", &[])),
        }
    }
}

impl<E: Evaluator> DynamicalSystem for EquationSystem<'_, E> {
    fn dimension(&self) -> usize {
        self.equations.len()
    }

    fn apply(&self, t: f64, y: &[f64], out: &mut [f64]) -> Result<(), EvalError> {
        let mut bindings = self.bindings.borrow_mut();
        bindings.set("t", t);
        bindings.set_array("y", y);
        for (slot, equation) in out.iter_mut().zip(self.equations) {
            *slot = self.evaluator.evaluate(equation, &bindings)?;
        }
        Ok(())
    }
}

/// One RK2 step: `step, t, y, k1, k2`, with (t, y) the state after the step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rk2Row {
    pub step: usize,
    pub t: f64,
    pub y: f64,
    pub k1: f64,
    pub k2: f64,
}

impl TraceRow for Rk2Row {
    fn headers(&self) -> Vec<String> {
        ["step", "t", "y", "k1", "k2"]
            .iter()
            .map(|h| h.to_string())
            .collect()
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.step.into(),
            self.t.into(),
            self.y.into(),
            self.k1.into(),
            self.k2.into(),
        ]
    }
}

/// One Euler step: `step, t, y[0]..y[m-1]`, the state after the step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EulerRow {
    pub step: usize,
    pub t: f64,
    pub y: Vec<f64>,
}

impl TraceRow for EulerRow {
    fn headers(&self) -> Vec<String> {
        let mut headers = vec!["step".to_string(), "t".to_string()];
        headers.extend((0..self.y.len()).map(|j| format!("y[{j}]")));
        headers
    }

    fn cells(&self) -> Vec<Cell> {
        let mut cells = vec![self.step.into(), self.t.into()];
        cells.extend(self.y.iter().map(|&v| Cell::from(v)));
        cells
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalarTrajectory {
    pub t: Vec<f64>,
    pub y: Vec<f64>,
    pub steps: usize,
    pub trace: Trace<Rk2Row>,
}

impl ScalarTrajectory {
    pub fn final_state(&self) -> (f64, f64) {
        (self.t[self.steps], self.y[self.steps])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemTrajectory {
    pub t: Vec<f64>,
    /// `states[i][j]` is component j at `t[i]`.
    pub states: Vec<Vec<f64>>,
    pub steps: usize,
    pub trace: Trace<EulerRow>,
}

impl SystemTrajectory {
    pub fn dimension(&self) -> usize {
        self.states[0].len()
    }

    pub fn final_state(&self) -> &[f64] {
        &self.states[self.steps]
    }

    /// The time series of component `j`.
    pub fn component(&self, j: usize) -> Option<Vec<f64>> {
        (j < self.dimension()).then(|| self.states.iter().map(|state| state[j]).collect())
    }

    /// `(y[i], y[j])` pairs along the trajectory, for phase portraits.
    pub fn phase(&self, i: usize, j: usize) -> Option<Vec<(f64, f64)>> {
        let dim = self.dimension();
        (i < dim && j < dim).then(|| {
            self.states
                .iter()
                .map(|state| (state[i], state[j]))
                .collect()
        })
    }
}

fn finite_state<R>(state: &[f64], step: usize, trace: Trace<R>) -> Result<Trace<R>, Failure<R>> {
    if state.iter().all(|v| v.is_finite()) {
        Ok(trace)
    } else {
        Err(Failure::numeric(
            step,
            NumericIssue::NonFinite {
                quantity: "y".to_string(),
            },
            trace,
        ))
    }
}

/// Integrates y' = `expression` with the explicit midpoint rule.
pub fn integrate_rk2<E: Evaluator>(
    evaluator: &E,
    expression: &str,
    y0: f64,
    settings: OdeSettings,
) -> Result<ScalarTrajectory, Failure<Rk2Row>> {
    settings.validate()?;
    ensure_finite(&[("y0", y0)])?;

    let n = step_count(settings.t0, settings.tf, settings.step)?;
    let system = ScalarEquation::new(evaluator, expression);
    let mut solver = Rk2Midpoint::new(system.dimension());

    let mut times = Vec::with_capacity(preallocated(n));
    let mut values = Vec::with_capacity(preallocated(n));
    let mut trace = Trace::with_capacity(n);
    let mut t = settings.t0;
    let mut state = [y0];
    times.push(t);
    values.push(y0);

    for i in 0..n {
        if let Err(err) = solver.step(&system, &mut t, &mut state, settings.step) {
            return Err(Failure::numeric(i, err, trace));
        }
        let (k1, k2) = solver.stages();
        trace.push(Rk2Row {
            step: i + 1,
            t,
            y: state[0],
            k1: k1[0],
            k2: k2[0],
        });
        trace = finite_state(&state, i, trace)?;
        times.push(t);
        values.push(state[0]);
    }
    debug!("rk2 finished {n} steps at t = {t}, y = {}", state[0]);

    Ok(ScalarTrajectory {
        t: times,
        y: values,
        steps: n,
        trace,
    })
}

/// Integrates y' = f(t, y) for the vector y with forward Euler.
///
/// `equations[j]` is the right-hand side of component j.
pub fn integrate_euler_system<E: Evaluator>(
    evaluator: &E,
    equations: &[String],
    y0: &[f64],
    settings: OdeSettings,
) -> Result<SystemTrajectory, Failure<EulerRow>> {
    settings.validate()?;
    if equations.is_empty() {
        return Err(ConfigError::EmptySystem.into());
    }
    if equations.len() != y0.len() {
        return Err(ConfigError::EquationCount {
            equations: equations.len(),
            initial: y0.len(),
        }
        .into());
    }
    for (j, &value) in y0.iter().enumerate() {
        let parameter = format!("y0[{j}]");
        ensure_finite(&[(parameter.as_str(), value)])?;
    }

    let n = step_count(settings.t0, settings.tf, settings.step)?;
    let system = EquationSystem::new(evaluator, equations);
    let mut solver = ForwardEuler::new(system.dimension());

    let mut times = Vec::with_capacity(preallocated(n));
    let mut states = Vec::with_capacity(preallocated(n));
    let mut trace = Trace::with_capacity(n);
    let mut t = settings.t0;
    let mut state = y0.to_vec();
    times.push(t);
    states.push(state.clone());

    for i in 0..n {
        if let Err(err) = solver.step(&system, &mut t, &mut state, settings.step) {
            return Err(Failure::numeric(i, err, trace));
        }
        trace.push(EulerRow {
            step: i + 1,
            t,
            y: state.clone(),
        });
        trace = finite_state(&state, i, trace)?;
        times.push(t);
        states.push(state.clone());
    }
    debug!("euler finished {n} steps of a {}-equation system at t = {t}", y0.len());

    Ok(SystemTrajectory {
        t: times,
        states,
        steps: n,
        trace,
    })
}
