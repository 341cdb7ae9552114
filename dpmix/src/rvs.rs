use rand::Rng;
use rv::misc::LogSumExp;

/// Inverse-CDF categorical draw against a single uniform `u` in `[0, 1)`.
///
/// Returns the first index whose cumulative weight meets or exceeds `u * sum(weights)`, or
/// `None` when the weights carry no mass (all zero, or not finite).
#[must_use]
pub fn categorical_inverse_cdf(weights: &[f64], u: f64) -> Option<usize> {
    let total: f64 = weights.iter().sum();
    if !(total > 0.0 && total.is_finite()) {
        return None;
    }

    let target = u * total;
    let mut cumulative = 0.0;
    let mut last_positive = None;
    for (i, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        cumulative += w;
        last_positive = Some(i);
        if cumulative >= target {
            return last_positive;
        }
    }
    // Rounding can leave the running sum a hair short of the target.
    last_positive
}

/// Draw an index proportionally to `exp(ln_weights)`, falling back to a uniform draw over
/// all indices when every weight vanishes.
///
/// Weights are normalised in log space before exponentiating so that tiny likelihoods do not
/// underflow to a spurious all-zero vector. `NaN` weights count as zero. The second value
/// reports whether the uniform fallback was taken.
///
/// # Panics
/// If `ln_weights` is empty.
pub fn ln_pflip_or_uniform<R: Rng>(ln_weights: &[f64], rng: &mut R) -> (usize, bool) {
    assert!(!ln_weights.is_empty(), "need at least one candidate");

    let ln_total = ln_weights
        .iter()
        .copied()
        .filter(|w| !w.is_nan())
        .logsumexp();

    let u: f64 = rng.random();
    if ln_total.is_finite() {
        let weights: Vec<f64> = ln_weights
            .iter()
            .map(|w| if w.is_nan() { 0.0 } else { (w - ln_total).exp() })
            .collect();
        if let Some(index) = categorical_inverse_cdf(&weights, u) {
            return (index, false);
        }
    }

    (rng.random_range(0..ln_weights.len()), true)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::{categorical_inverse_cdf, ln_pflip_or_uniform};

    #[test]
    fn first_candidate_meeting_target() {
        let weights = [1.0, 1.0, 2.0];

        assert_eq!(categorical_inverse_cdf(&weights, 0.0), Some(0));
        assert_eq!(categorical_inverse_cdf(&weights, 0.25), Some(0));
        assert_eq!(categorical_inverse_cdf(&weights, 0.2500001), Some(1));
        assert_eq!(categorical_inverse_cdf(&weights, 0.5), Some(1));
        assert_eq!(categorical_inverse_cdf(&weights, 0.99), Some(2));
    }

    #[test]
    fn zero_weights_are_never_chosen() {
        let weights = [0.0, 3.0, 0.0];
        assert_eq!(categorical_inverse_cdf(&weights, 0.0), Some(1));
        assert_eq!(categorical_inverse_cdf(&weights, 0.999_999), Some(1));
    }

    #[test]
    fn no_mass_is_none() {
        assert_eq!(categorical_inverse_cdf(&[0.0, 0.0], 0.3), None);
        assert_eq!(categorical_inverse_cdf(&[], 0.3), None);
        assert_eq!(categorical_inverse_cdf(&[f64::INFINITY, 1.0], 0.3), None);
    }

    /// The probability of selecting a candidate is the length of its slice of the unit
    /// interval, which does not depend on where in the enumeration the candidate sits.
    #[test]
    fn selection_probability_independent_of_order() {
        let weights = [0.5, 3.0, 1.5, 0.0, 2.0];
        let total: f64 = weights.iter().sum();
        let orders: [[usize; 5]; 4] = [
            [0, 1, 2, 3, 4],
            [4, 3, 2, 1, 0],
            [2, 0, 4, 1, 3],
            [3, 4, 1, 0, 2],
        ];

        const GRID: usize = 100_000;
        for order in orders {
            let permuted: Vec<f64> = order.iter().map(|&i| weights[i]).collect();
            let mut hits = [0_usize; 5];
            for step in 0..GRID {
                let u = (step as f64 + 0.5) / GRID as f64;
                let pick = categorical_inverse_cdf(&permuted, u).unwrap();
                hits[order[pick]] += 1;
            }

            for (candidate, &w) in weights.iter().enumerate() {
                assert::close(hits[candidate] as f64 / GRID as f64, w / total, 1E-4);
            }
        }
    }

    #[test]
    fn tiny_ln_weights_do_not_underflow() {
        let mut rng = SmallRng::seed_from_u64(0xABCD);
        let ln_weights = [-2000.0, -1000.0, -2000.0];

        for _ in 0..100 {
            let (index, fallback) = ln_pflip_or_uniform(&ln_weights, &mut rng);
            assert_eq!(index, 1);
            assert!(!fallback);
        }
    }

    #[test]
    fn ln_weights_select_proportionally() {
        let mut rng = SmallRng::seed_from_u64(0x5EED);
        let ln_weights = [1.0_f64.ln(), f64::NAN, 3.0_f64.ln(), f64::NEG_INFINITY];
        let mut hits = [0_usize; 4];

        let n = 40_000;
        for _ in 0..n {
            let (index, fallback) = ln_pflip_or_uniform(&ln_weights, &mut rng);
            assert!(!fallback);
            hits[index] += 1;
        }

        assert_eq!(hits[1], 0);
        assert_eq!(hits[3], 0);
        assert::close(hits[0] as f64 / n as f64, 0.25, 0.02);
    }

    #[test]
    fn vanishing_ln_weights_fall_back_to_uniform() {
        let mut rng = SmallRng::seed_from_u64(0xF00D);
        let ln_weights = [f64::NEG_INFINITY; 4];
        let mut hits = [0_usize; 4];

        let n = 40_000;
        for _ in 0..n {
            let (index, fallback) = ln_pflip_or_uniform(&ln_weights, &mut rng);
            assert!(fallback);
            hits[index] += 1;
        }

        for h in hits {
            assert::close(h as f64 / n as f64, 0.25, 0.02);
        }
    }
}
