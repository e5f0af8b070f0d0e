//! Cumulative demand curves.
//!
//! A workload's *density* is the number of operations per second it wants to issue at a given
//! point in time. The scheduler does not work with the density directly, but with its integral:
//! the cumulative number of operations that should have been started since the workload began.
//!
//! The [`DemandFunction`] in this module sums a set of sinusoidal densities
//!
//! ```text
//! D_i(x) = A_i/2 * (1 + sin(F_i * x + S_i) - (1 - P))
//! ```
//!
//! where `P` is the *support* coefficient shared by all components. Its closed-form integral is
//!
//! ```text
//! W(t) = Sum(A_i/2 * P) * t - Sum(A_i/2 / F_i * cos(F_i * t + S_i)) - W(0)
//! ```
//!
//! The support controls how much of each cycle produces work:
//!
//! - `P = 1`: a plain sinusoidal load that never drops below zero.
//! - `P` in `(0, 1)`: sporadic bursts; the cumulative demand still grows in the long run.
//! - `P <= 0`: the cumulative demand never grows in the long run.
//! - `P >= 2`: the density is never positive, no work is produced.
//! - `P > 1`: the load never drops below `(P - 1) * A/2`.

use std::f64::consts::TAU;
use std::fmt;

/// A cumulative demand curve.
///
/// Implementations return the number of operations that should have been started after
/// `elapsed` seconds. The value may be fractional or negative; the scheduler only ever acts on
/// whole operations above what it has already issued.
pub trait Demand: fmt::Debug + Send + Sync {
    /// Returns the cumulative demand after `elapsed` seconds.
    fn due(&self, elapsed: f64) -> f64;
}

/// A single sinusoidal load component.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SineComponent {
    amplitude: f64,
    angular_frequency: f64,
    phase_shift: f64,
    /// `amplitude / 2 / angular_frequency`, reused on every evaluation.
    half_amplitude_per_frequency: f64,
}

impl SineComponent {
    /// Creates a component from its peak load, angular frequency and phase shift in radians.
    ///
    /// # Panics
    ///
    /// Panics if `angular_frequency` is not strictly positive.
    pub fn new(amplitude: f64, angular_frequency: f64, phase_shift: f64) -> Self {
        assert!(
            angular_frequency > 0.0,
            "angular frequency must be positive, got {angular_frequency}"
        );

        Self {
            amplitude,
            angular_frequency,
            phase_shift,
            half_amplitude_per_frequency: amplitude / 2.0 / angular_frequency,
        }
    }

    /// Creates a component from a period in seconds and a phase shift given as a fraction of a
    /// full cycle.
    pub fn from_period(amplitude: f64, period: f64, shift: f64) -> Self {
        Self::new(amplitude, TAU / period, shift * TAU)
    }

    /// The peak load of this component.
    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    /// The angular frequency in radians per second.
    pub fn angular_frequency(&self) -> f64 {
        self.angular_frequency
    }

    /// The phase shift in radians.
    pub fn phase_shift(&self) -> f64 {
        self.phase_shift
    }

    /// The length of one cycle in seconds.
    pub fn period(&self) -> f64 {
        TAU / self.angular_frequency
    }
}

/// A demand curve built from a sum of [`SineComponent`]s.
///
/// The function is normalized so that `due(0.0)` is exactly zero.
#[derive(Clone, Debug, PartialEq)]
pub struct DemandFunction {
    components: Vec<SineComponent>,
    support: f64,
    /// `Sum(A_i/2 * P)`, the slope of the linear term.
    slope: f64,
    /// The raw value at `t = 0`, subtracted from every evaluation.
    baseline: f64,
}

impl DemandFunction {
    /// Creates a demand function from its components and support coefficient.
    pub fn new(components: Vec<SineComponent>, support: f64) -> Self {
        let slope = components
            .iter()
            .map(|component| component.amplitude / 2.0 * support)
            .sum();

        let mut function = Self {
            components,
            support,
            slope,
            baseline: 0.0,
        };
        function.baseline = function.evaluate(0.0);
        function
    }

    /// Returns `true` if the linear term and the baseline are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.slope.is_finite() && self.baseline.is_finite()
    }

    /// Evaluates the cumulative demand after `elapsed` seconds.
    pub fn evaluate(&self, elapsed: f64) -> f64 {
        let mut total = self.slope * elapsed;
        for component in &self.components {
            total -= component.half_amplitude_per_frequency
                * (component.angular_frequency * elapsed + component.phase_shift).cos();
        }
        total - self.baseline
    }

    /// Evaluates the load density, the derivative of [`evaluate`](Self::evaluate).
    pub fn density(&self, elapsed: f64) -> f64 {
        self.components
            .iter()
            .map(|component| {
                let angle = component.angular_frequency * elapsed + component.phase_shift;
                component.amplitude / 2.0 * (angle.sin() + self.support)
            })
            .sum()
    }

    /// The sinusoidal components of this function.
    pub fn components(&self) -> &[SineComponent] {
        &self.components
    }

    /// The support coefficient shared by all components.
    pub fn support(&self) -> f64 {
        self.support
    }
}

impl Demand for DemandFunction {
    fn due(&self, elapsed: f64) -> f64 {
        self.evaluate(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DemandFunction {
        DemandFunction::new(
            vec![
                SineComponent::from_period(800.0, 45.0, 0.3),
                SineComponent::from_period(550.0, 31.0, 0.9),
                SineComponent::from_period(120.0, 7.5, 0.0),
            ],
            1.0,
        )
    }

    #[test]
    fn zero_at_start() {
        for support in [0.0, 0.3, 1.0, 1.2, 2.5] {
            let function = DemandFunction::new(sample().components.clone(), support);
            assert_eq!(function.evaluate(0.0), 0.0, "support {support}");
        }

        let empty = DemandFunction::new(vec![], 1.0);
        assert_eq!(empty.evaluate(0.0), 0.0);
        assert_eq!(empty.evaluate(100.0), 0.0);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let function = sample();
        for t in [0.5, 13.0, 271.25, 10_000.0] {
            assert_eq!(function.evaluate(t), function.evaluate(t));
        }
    }

    #[test]
    fn closed_form_quarter_period() {
        // cnt=1 amp=100 period=62.83 shift=0 supp=1
        let function =
            DemandFunction::new(vec![SineComponent::from_period(100.0, 62.83, 0.0)], 1.0);

        let f = TAU / 62.83;
        let half = 100.0 / 2.0;
        let t = 15.71;
        let expected = half * t - half / f * (f * t).cos() + half / f;

        assert!((function.evaluate(t) - expected).abs() < 1e-6);
    }

    #[test]
    fn full_support_never_decreases() {
        let function = sample();
        let mut previous = function.evaluate(0.0);
        for step in 1..=2_000 {
            let current = function.evaluate(step as f64 * 0.1);
            assert!(current >= previous - 1e-9, "decreased at step {step}");
            previous = current;
        }
    }

    #[test]
    fn full_support_grows_over_each_period() {
        let function =
            DemandFunction::new(vec![SineComponent::from_period(300.0, 20.0, 0.4)], 1.0);
        for cycle in 0..10 {
            let start = cycle as f64 * 20.0;
            let growth = function.evaluate(start + 20.0) - function.evaluate(start);
            assert!((growth - 150.0 * 20.0).abs() < 1e-6);
        }
    }

    #[test]
    fn zero_support_does_not_grow() {
        let function = DemandFunction::new(sample().components.clone(), 0.0);
        let bound: f64 = function
            .components()
            .iter()
            .map(|c| c.amplitude() / c.angular_frequency())
            .sum();

        for step in 0..5_000 {
            let value = function.evaluate(step as f64 * 0.7);
            assert!(value <= bound + 1e-9);
            assert!(value >= -bound - 1e-9);
        }
    }

    #[test]
    fn negative_support_trends_downwards() {
        let function =
            DemandFunction::new(vec![SineComponent::from_period(100.0, 10.0, 0.0)], -0.5);
        let samples: Vec<_> = (1..=8)
            .map(|cycle| function.evaluate(cycle as f64 * 10.0))
            .collect();

        for pair in samples.windows(2) {
            assert!(pair[1] < pair[0]);
        }
    }

    #[test]
    fn density_matches_slope() {
        let function = sample();
        let h = 1e-4;
        for t in [1.0, 17.5, 99.0] {
            let numeric = (function.evaluate(t + h) - function.evaluate(t - h)) / (2.0 * h);
            assert!((numeric - function.density(t)).abs() < 1e-3);
        }
    }

    #[test]
    #[should_panic(expected = "angular frequency must be positive")]
    fn rejects_zero_frequency() {
        SineComponent::new(1.0, 0.0, 0.0);
    }
}
