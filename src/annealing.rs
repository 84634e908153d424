//! Simulated-annealing acceptance with geometric cooling.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Accepts a candidate whenever its cost beats the reference minus a
/// temperature-scaled random slack: `cost < ref - T * ln(U(0, 1))`.
pub struct SimulatedAnnealing {
    temperature: f64,
    factor: f64,
}

impl SimulatedAnnealing {
    /// Cooling from `initial_temperature` down to `final_temperature` over
    /// `max_iterations` steps.
    pub fn new(initial_temperature: f64, final_temperature: f64, max_iterations: usize) -> Self {
        let period = max_iterations.max(1) as f64;
        SimulatedAnnealing {
            temperature: initial_temperature,
            factor: (final_temperature / initial_temperature).powf(1.0 / period),
        }
    }

    pub fn accept(&self, reference_cost: f64, candidate_cost: f64, rng: &mut ChaCha8Rng) -> bool {
        let u: f64 = rng.gen_range(0.0..1.0);
        candidate_cost < reference_cost - self.temperature * u.ln()
    }

    pub fn decrease_temperature(&mut self) {
        self.temperature *= self.factor;
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }
}
