//! IRT engine seam.
//!
//! Choosing the most informative item and estimating ability are delegated to
//! an [`IrtEngine`]. The session only feeds it item parameters and outcomes.
//! Two small reference engines are provided for simulation and tests.

use serde::{Deserialize, Serialize};

use crate::item::Item;

/// Per-item parameter tuple passed to ability updates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zeta {
    /// Discrimination.
    pub a: f64,
    /// Difficulty.
    pub b: f64,
    /// Guessing.
    pub c: f64,
    /// Upper asymptote.
    pub d: f64,
}

impl Zeta {
    /// Parameters of a normed item. Unnormed items have none. Non-finite
    /// a, c or d fall back to their defaults so theta stays finite.
    pub fn from_item(item: &Item) -> Option<Self> {
        let irt = item.irt.sanitized();
        Some(Self {
            a: irt.discrimination,
            b: irt.difficulty?,
            c: irt.guessing,
            d: irt.upper,
        })
    }

    /// Probability of a correct response at `theta` under the 4PL model.
    pub fn probability(&self, theta: f64) -> f64 {
        self.c + (self.d - self.c) / (1.0 + (-self.a * (theta - self.b)).exp())
    }

    /// Fisher information of the item at `theta`.
    pub fn information(&self, theta: f64) -> f64 {
        let p = self.probability(theta);
        let spread = self.d - self.c;
        if spread <= 0.0 || p <= 0.0 || p >= 1.0 {
            return 0.0;
        }
        self.a.powi(2) * (p - self.c).powi(2) * (self.d - p).powi(2)
            / (spread.powi(2) * p * (1.0 - p))
    }
}

/// External item selection and ability estimation.
pub trait IrtEngine: Send {
    /// Pick the index of the next item among `pool`, or `None` to stop.
    fn select_next(&mut self, pool: &[Item]) -> Option<usize>;

    /// Update the ability estimate with one scored response.
    fn update_ability(&mut self, zeta: Zeta, correct: bool);

    /// Current ability estimate.
    fn theta(&self) -> f64;
}

const THETA_BOUND: f64 = 6.0;

/// Stochastic-approximation ability estimate with a decaying step.
#[derive(Debug, Clone)]
struct StepwiseAbility {
    theta: f64,
    step: f64,
    updates: u32,
}

impl StepwiseAbility {
    fn new(theta: f64, step: f64) -> Self {
        Self {
            theta,
            step,
            updates: 0,
        }
    }

    fn update(&mut self, zeta: Zeta, correct: bool) {
        let observed = if correct { 1.0 } else { 0.0 };
        let expected = zeta.probability(self.theta);
        let gain = self.step / f64::from(self.updates + 1).sqrt();
        let next = self.theta + gain * zeta.a * (observed - expected);
        if !next.is_finite() {
            return;
        }
        self.theta = next.clamp(-THETA_BOUND, THETA_BOUND);
        self.updates += 1;
    }
}

/// Presents items in pool order.
#[derive(Debug, Clone)]
pub struct SequentialEngine {
    ability: StepwiseAbility,
}

impl SequentialEngine {
    pub fn new() -> Self {
        Self::with_start(0.0, 1.0)
    }

    pub fn with_start(theta: f64, step: f64) -> Self {
        Self {
            ability: StepwiseAbility::new(theta, step),
        }
    }
}

impl Default for SequentialEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IrtEngine for SequentialEngine {
    fn select_next(&mut self, pool: &[Item]) -> Option<usize> {
        (!pool.is_empty()).then_some(0)
    }

    fn update_ability(&mut self, zeta: Zeta, correct: bool) {
        self.ability.update(zeta, correct);
    }

    fn theta(&self) -> f64 {
        self.ability.theta
    }
}

/// Picks the normed item with the most information at the current theta.
/// Unnormed items are only chosen once no normed item remains.
#[derive(Debug, Clone)]
pub struct MaxInformationEngine {
    ability: StepwiseAbility,
}

impl MaxInformationEngine {
    pub fn new() -> Self {
        Self::with_start(0.0, 1.0)
    }

    pub fn with_start(theta: f64, step: f64) -> Self {
        Self {
            ability: StepwiseAbility::new(theta, step),
        }
    }
}

impl Default for MaxInformationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IrtEngine for MaxInformationEngine {
    fn select_next(&mut self, pool: &[Item]) -> Option<usize> {
        let theta = self.ability.theta;
        pool.iter()
            .enumerate()
            .filter_map(|(idx, item)| Zeta::from_item(item).map(|z| (idx, z.information(theta))))
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(idx, _)| idx)
            .or_else(|| (!pool.is_empty()).then_some(0))
    }

    fn update_ability(&mut self, zeta: Zeta, correct: bool) {
        self.ability.update(zeta, correct);
    }

    fn theta(&self) -> f64 {
        self.ability.theta
    }
}
