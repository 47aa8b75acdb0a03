use crate::equation_engine::EvalError;
use crate::traits::{DynamicalSystem, Steppable};

/// Explicit midpoint Runge-Kutta (2nd order) solver.
pub struct Rk2Midpoint {
    k1: Vec<f64>,
    k2: Vec<f64>,
    tmp: Vec<f64>,
}

impl Rk2Midpoint {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![0.0; dim],
            k2: vec![0.0; dim],
            tmp: vec![0.0; dim],
        }
    }

    /// Slopes (k1, k2) computed by the last call to `step`.
    pub fn stages(&self) -> (&[f64], &[f64]) {
        (&self.k1, &self.k2)
    }
}

impl Steppable for Rk2Midpoint {
    fn step(
        &mut self,
        system: &impl DynamicalSystem,
        t: &mut f64,
        state: &mut [f64],
        dt: f64,
    ) -> Result<(), EvalError> {
        let t0 = *t;
        let half = 0.5 * dt;

        // k1 = f(t, y)
        system.apply(t0, state, &mut self.k1)?;

        // k2 = f(t + dt/2, y + dt*k1/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + half * self.k1[i];
        }
        system.apply(t0 + half, &self.tmp, &mut self.k2)?;

        // y_next = y + dt*k2
        for i in 0..state.len() {
            state[i] += dt * self.k2[i];
        }

        *t = t0 + dt;
        Ok(())
    }
}

/// Forward Euler: every component advances from the same derivative vector.
pub struct ForwardEuler {
    slope: Vec<f64>,
}

impl ForwardEuler {
    pub fn new(dim: usize) -> Self {
        Self {
            slope: vec![0.0; dim],
        }
    }

    /// f(t, y) computed by the last call to `step`.
    pub fn slope(&self) -> &[f64] {
        &self.slope
    }
}

impl Steppable for ForwardEuler {
    fn step(
        &mut self,
        system: &impl DynamicalSystem,
        t: &mut f64,
        state: &mut [f64],
        dt: f64,
    ) -> Result<(), EvalError> {
        system.apply(*t, state, &mut self.slope)?;

        for (y, dy) in state.iter_mut().zip(&self.slope) {
            *y += dt * dy;
        }

        *t += dt;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// y' = -2y
    struct Decay;

    impl DynamicalSystem for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, y: &[f64], out: &mut [f64]) -> Result<(), EvalError> {
            out[0] = -2.0 * y[0];
            Ok(())
        }
    }

    /// Harmonic oscillator y0' = y1, y1' = -y0.
    struct Oscillator;

    impl DynamicalSystem for Oscillator {
        fn dimension(&self) -> usize {
            2
        }

        fn apply(&self, _t: f64, y: &[f64], out: &mut [f64]) -> Result<(), EvalError> {
            out[0] = y[1];
            out[1] = -y[0];
            Ok(())
        }
    }

    /// Fails once t reaches 1.
    struct Cutoff;

    impl DynamicalSystem for Cutoff {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, t: f64, _y: &[f64], out: &mut [f64]) -> Result<(), EvalError> {
            if t >= 1.0 {
                return Err(EvalError::Overflow);
            }
            out[0] = 1.0;
            Ok(())
        }
    }

    #[test]
    fn rk2_step_matches_the_midpoint_formula() {
        let mut solver = Rk2Midpoint::new(1);
        let mut t = 0.0;
        let mut y = [1.0];
        solver.step(&Decay, &mut t, &mut y, 0.1).expect("step");
        // k1 = -2, y_mid = 0.9, k2 = -1.8, y = 1 - 0.18
        assert_relative_eq!(y[0], 0.82, epsilon = 1e-15);
        assert_relative_eq!(t, 0.1);
        let (k1, k2) = solver.stages();
        assert_relative_eq!(k1[0], -2.0);
        assert_relative_eq!(k2[0], -1.8, epsilon = 1e-15);
    }

    #[test]
    fn euler_updates_components_simultaneously() {
        let mut solver = ForwardEuler::new(2);
        let mut t = 0.0;
        let mut y = [1.0, 0.0];
        solver.step(&Oscillator, &mut t, &mut y, 0.5).expect("step");
        // y1 uses the old y0, not the freshly updated one.
        assert_eq!(y, [1.0, -0.5]);
        assert_eq!(solver.slope(), &[0.0, -1.0]);
        assert_eq!(t, 0.5);
    }

    #[test]
    fn failed_step_leaves_time_and_state_alone() {
        let mut solver = Rk2Midpoint::new(1);
        let mut t = 0.95;
        let mut y = [3.0];
        // the midpoint stage lands past t = 1
        let err = solver.step(&Cutoff, &mut t, &mut y, 0.2).expect_err("cutoff");
        assert_eq!(err, EvalError::Overflow);
        assert_eq!(t, 0.95);
        assert_eq!(y, [3.0]);

        let mut euler = ForwardEuler::new(1);
        let mut t = 1.0;
        assert!(euler.step(&Cutoff, &mut t, &mut y, 0.1).is_err());
        assert_eq!(t, 1.0);
        assert_eq!(y, [3.0]);
    }
}
