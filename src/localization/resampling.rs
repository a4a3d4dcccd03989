use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// How a weighted particle set is redrawn.
///
/// Every scheme returns as many indices as there are weights. When the weights
/// carry no information (all zero, or not finite) each particle is kept once,
/// starting from a random offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResamplingScheme {
    /// Resampling wheel: random start, steps of 2 * U[0, max weight)
    #[default]
    Wheel,
    /// Independent draws against the cumulative weights
    Multinomial,
    /// Low variance: one random offset then fixed steps of total / n
    Systematic,
}

impl ResamplingScheme {
    /// Indices of the particles to copy into the new set.
    pub fn resample(&self, weights: &[f64], rng: &mut dyn RngCore) -> Vec<usize> {
        let n = weights.len();
        if n == 0 {
            return Vec::new();
        }
        if is_degenerate(weights) {
            log::warn!("degenerate weights, falling back to uniform resampling");
            let start = rng.gen_range(0..n);
            return (0..n).map(|i| (start + i) % n).collect();
        }
        match self {
            ResamplingScheme::Wheel => wheel(weights, rng),
            ResamplingScheme::Multinomial => multinomial(weights, rng),
            ResamplingScheme::Systematic => systematic(weights, rng),
        }
    }
}

/// No positive weight to sample from, or a weight the arithmetic cannot handle.
fn is_degenerate(weights: &[f64]) -> bool {
    let mut total = 0.0;
    for &w in weights {
        if !w.is_finite() || w < 0.0 {
            return true;
        }
        total += w;
    }
    !(total > 0.0 && total.is_finite())
}

fn wheel(weights: &[f64], rng: &mut dyn RngCore) -> Vec<usize> {
    let n = weights.len();
    let max_weight = weights.iter().copied().fold(0.0, f64::max);
    let mut index = rng.gen_range(0..n);
    let mut beta = 0.0;
    (0..n)
        .map(|_| {
            beta += 2.0 * rng.gen_range(0.0..max_weight);
            // `>=` also steps over zero weights when beta is exactly 0
            while beta >= weights[index] {
                beta -= weights[index];
                index = (index + 1) % n;
            }
            index
        })
        .collect()
}

/// Index of the last particle that can be drawn at all.
fn last_positive(weights: &[f64]) -> usize {
    weights
        .iter()
        .rposition(|&w| w > 0.0)
        .unwrap_or(weights.len() - 1)
}

fn multinomial(weights: &[f64], rng: &mut dyn RngCore) -> Vec<usize> {
    let n = weights.len();
    let last = last_positive(weights);
    let mut weight_tot = 0.0;
    let cum_weight: Vec<f64> = weights
        .iter()
        .map(|w| {
            weight_tot += w;
            weight_tot
        })
        .collect();

    (0..n)
        .map(|_| {
            let rng_nb = rng.gen::<f64>() * weight_tot;
            // rounding can leave rng_nb at the very end of the table
            cum_weight.partition_point(|&c| c <= rng_nb).min(last)
        })
        .collect()
}

fn systematic(weights: &[f64], rng: &mut dyn RngCore) -> Vec<usize> {
    let n = weights.len();
    let last = last_positive(weights);
    let step = weights.iter().sum::<f64>() / n as f64;
    let mut draw = rng.gen::<f64>() * step;
    let mut index = 0;
    let mut cum_weight = weights[0];
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        while cum_weight <= draw && index < last {
            index += 1;
            cum_weight += weights[index];
        }
        out.push(index);
        draw += step;
    }
    out
}
