//! Outcome policy deciding whether a simulated dispense succeeds.

use dispense_core::DispenseAttempt;
use rand::Rng;

/// Decides the outcome of one dispense once the dispenser finishes.
///
/// Implement this trait to replace the random fault model, e.g. with a
/// fixed outcome in tests.
pub trait DispenseOutcome: Send + Sync + 'static {
    fn succeeds(&self, attempt: &DispenseAttempt) -> bool;
}

/// Succeeds with a fixed probability.
#[derive(Debug, Clone, Copy)]
pub struct RandomOutcome {
    probability: f64,
}

impl RandomOutcome {
    /// Out-of-range probabilities are clamped; NaN never succeeds.
    pub fn new(probability: f64) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self { probability }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl DispenseOutcome for RandomOutcome {
    fn succeeds(&self, _attempt: &DispenseAttempt) -> bool {
        rand::thread_rng().gen_bool(self.probability)
    }
}

/// Always yields the same outcome.
#[derive(Debug, Clone, Copy)]
pub struct FixedOutcome(pub bool);

impl FixedOutcome {
    pub fn success() -> Self {
        Self(true)
    }

    pub fn failure() -> Self {
        Self(false)
    }
}

impl DispenseOutcome for FixedOutcome {
    fn succeeds(&self, _attempt: &DispenseAttempt) -> bool {
        self.0
    }
}

/// A simple function-based outcome policy.
pub struct FnOutcome<F>
where
    F: Fn(&DispenseAttempt) -> bool + Send + Sync + 'static,
{
    decide: F,
}

impl<F> FnOutcome<F>
where
    F: Fn(&DispenseAttempt) -> bool + Send + Sync + 'static,
{
    pub fn new(decide: F) -> Self {
        Self { decide }
    }
}

impl<F> DispenseOutcome for FnOutcome<F>
where
    F: Fn(&DispenseAttempt) -> bool + Send + Sync + 'static,
{
    fn succeeds(&self, attempt: &DispenseAttempt) -> bool {
        (self.decide)(attempt)
    }
}
