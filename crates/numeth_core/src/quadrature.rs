//! Composite Simpson 3/8 rule.

use crate::equation_engine::Bindings;
use crate::error::{ensure_finite, ConfigError, Failure, NumericIssue};
use crate::trace::{Advisory, Cell, Trace, TraceRow};
use crate::traits::Evaluator;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

const VARIABLE: &str = "x";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimpsonSettings {
    /// Requested number of subintervals; rounded up to a multiple of 3.
    pub subintervals: usize,
}

impl Default for SimpsonSettings {
    fn default() -> Self {
        Self { subintervals: 9 }
    }
}

/// One node: `i, x_i, f(x_i), weight`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimpsonRow {
    pub index: usize,
    pub x: f64,
    pub fx: f64,
    pub weight: f64,
}

impl TraceRow for SimpsonRow {
    fn headers(&self) -> Vec<String> {
        ["i", "x_i", "f(x_i)", "weight"]
            .iter()
            .map(|h| h.to_string())
            .collect()
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            self.index.into(),
            self.x.into(),
            self.fx.into(),
            self.weight.into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpsonIntegral {
    pub value: f64,
    /// Number of subintervals actually used.
    pub subintervals: usize,
    pub step: f64,
    pub advisories: Vec<Advisory>,
    pub trace: Trace<SimpsonRow>,
}

/// Rounds `n` up to the nearest multiple of 3.
pub fn adjusted_partition(n: usize) -> usize {
    n.div_ceil(3) * 3
}

fn weight(i: usize, n: usize) -> f64 {
    if i == 0 || i == n {
        1.0
    } else if i % 3 == 0 {
        2.0
    } else {
        3.0
    }
}

/// Integrates f(x) = `expression` over [a, b].
///
/// Nodes are evaluated from `a` towards `b`; an evaluation failure at node
/// `i` reports index `i` with the rows of the earlier nodes.
pub fn integrate_simpson38<E: Evaluator>(
    evaluator: &E,
    expression: &str,
    a: f64,
    b: f64,
    settings: SimpsonSettings,
) -> Result<SimpsonIntegral, Failure<SimpsonRow>> {
    ensure_finite(&[("a", a), ("b", b)])?;
    let requested = settings.subintervals;
    if requested == 0 {
        return Err(ConfigError::EmptyPartition.into());
    }

    let n = adjusted_partition(requested);
    let mut advisories = Vec::new();
    if n != requested {
        warn!("simpson 3/8 needs a multiple of 3 subintervals, using {n} instead of {requested}");
        advisories.push(Advisory::PartitionAdjusted {
            requested,
            used: n,
        });
    }

    let h = (b - a) / n as f64;
    let mut bindings = Bindings::new().with(VARIABLE, a);
    let mut trace = Trace::with_capacity(n.saturating_add(1));
    let mut sum = 0.0;
    for i in 0..=n {
        let x = if i == n { b } else { a + i as f64 * h };
        bindings.set(VARIABLE, x);
        let fx = match evaluator.evaluate(expression, &bindings) {
            Ok(fx) => fx,
            Err(err) => return Err(Failure::numeric(i, err, trace)),
        };
        let w = weight(i, n);
        sum += w * fx;
        trace.push(SimpsonRow {
            index: i,
            x,
            fx,
            weight: w,
        });
    }

    let value = 3.0 * h / 8.0 * sum;
    if !value.is_finite() {
        return Err(Failure::numeric(
            n,
            NumericIssue::NonFinite {
                quantity: "integral".to_string(),
            },
            trace,
        ));
    }
    debug!("simpson 3/8 over [{a}, {b}] with n = {n}: {value}");

    Ok(SimpsonIntegral {
        value,
        subintervals: n,
        step: h,
        advisories,
        trace,
    })
}
