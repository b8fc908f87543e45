//! Random draw helpers over an externally owned [`Rng`].
//!
//! The simulator owns the single seeded generator; everything here is a pure
//! function of it, which keeps runs replayable from the seed alone.

use core::f64::consts::PI;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

/// Draw from N(0, deviation) via Box-Muller.
pub fn normal(rng: &mut impl Rng, deviation: f64) -> f64 {
    // Shift both uniforms into (0, 1] so the logarithm stays finite.
    let a = 1.0 - rng.gen::<f64>();
    let r = 1.0 - rng.gen::<f64>();
    (2.0 * PI * a).cos() * (-2.0 * r.ln()).sqrt() * deviation
}

/// Normal deviation that yields a lognormal with the requested relative
/// deviation. Calibrated empirically; only valid for coefficients in [1, 15).
fn log_normal_deviation(relative_deviation: f64) -> f64 {
    debug_assert!((1.0..15.0).contains(&relative_deviation));
    let x = relative_deviation.ln() / 2.48_f64.ln();
    (x + 1.0).ln() / 2.48_f64.ln()
}

/// Lognormal multiplier around 1 with the given relative deviation.
pub fn log_normal(rng: &mut impl Rng, relative_deviation: f64) -> f64 {
    normal(rng, log_normal_deviation(relative_deviation)).exp()
}

/// Lognormal multiplier that only ever inflates: `exp(|N(0, d)|) >= 1`.
/// Used for latency and interval jitter, where delays can stretch but
/// never beat the base value.
pub fn pessimistic_log_normal(rng: &mut impl Rng, relative_deviation: f64) -> f64 {
    normal(rng, log_normal_deviation(relative_deviation))
        .abs()
        .exp()
}

/// Pick an index with probability proportional to its weight.
/// All weights must be positive.
pub fn choose_weighted<I>(rng: &mut impl Rng, weights: I) -> usize
where
    I: IntoIterator<Item = f64>,
{
    let dist = WeightedIndex::new(weights).expect("weights must be positive");
    dist.sample(rng)
}
