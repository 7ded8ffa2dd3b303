//! One-dimensional root finding and minimisation.
//!
//! Used to invert the extended incomplete gamma function when its shape
//! parameter is not positive and no closed-form inverse is available.

// ---------------------------------------------------------------------------
// Bracketing inverse
// ---------------------------------------------------------------------------

/// Upper end of the search range of [`invert_decreasing`].
const MAX_UPPER: f64 = 1e6;

/// Bisection steps in log space; enough to pin `ln x` to ~1e-13.
const BISECTION_STEPS: u32 = 200;

/// Invert a strictly decreasing function on `[lower, ∞)`.
///
/// Finds `x >= lower` with `f(x) = target` by expanding an upper bracket
/// geometrically and bisecting in `ln x`. Returns NaN when the target is
/// not finite, when `f(lower) < target`, or when no upper bracket below
/// [`MAX_UPPER`] exists.
pub fn invert_decreasing(f: impl Fn(f64) -> f64, target: f64, lower: f64) -> f64 {
    if !target.is_finite() || !(lower > 0.0) {
        return f64::NAN;
    }
    let f_lower = f(lower);
    if f_lower.is_nan() || f_lower < target {
        return f64::NAN;
    }

    let mut upper = (2.0 * lower).max(1.0);
    loop {
        let value = f(upper);
        if value.is_nan() {
            return f64::NAN;
        }
        if value <= target {
            break;
        }
        upper *= 2.0;
        if upper > MAX_UPPER {
            return f64::NAN;
        }
    }

    let mut lo = lower.ln();
    let mut hi = upper.ln();
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        let value = f(mid.exp());
        if value.is_nan() {
            return f64::NAN;
        }
        if value > target {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= 1e-14 * hi.abs().max(1.0) {
            break;
        }
    }
    (0.5 * (lo + hi)).exp()
}

// ---------------------------------------------------------------------------
// Nelder–Mead
// ---------------------------------------------------------------------------

/// Settings of the one-dimensional Nelder–Mead search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMead {
    /// Convergence tolerance on both the simplex width and its value spread.
    pub tolerance: f64,
    /// Maximum number of iterations.
    pub max_iterations: u32,
    /// Relative size of the initial simplex step.
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 200,
            initial_step: 0.05,
        }
    }
}

impl NelderMead {
    /// Minimise `f` starting from `x0`. NaN objective values count as +∞.
    pub fn minimize(&self, f: impl Fn(f64) -> f64, x0: f64) -> f64 {
        let objective = |x: f64| {
            let value = f(x);
            if value.is_nan() { f64::INFINITY } else { value }
        };

        let step = if x0 == 0.0 {
            0.000_25
        } else {
            self.initial_step * x0
        };
        // (point, value) with best first.
        let mut best = (x0, objective(x0));
        let mut worst = (x0 + step, objective(x0 + step));
        if worst.1 < best.1 {
            core::mem::swap(&mut best, &mut worst);
        }

        for _ in 0..self.max_iterations {
            if (worst.0 - best.0).abs() <= self.tolerance
                && (worst.1 - best.1).abs() <= self.tolerance
            {
                break;
            }

            // With two vertices the centroid is the best point.
            let reflected = best.0 + (best.0 - worst.0);
            let f_reflected = objective(reflected);

            if f_reflected < best.1 {
                let expanded = best.0 + 2.0 * (best.0 - worst.0);
                let f_expanded = objective(expanded);
                worst = if f_expanded < f_reflected {
                    (expanded, f_expanded)
                } else {
                    (reflected, f_reflected)
                };
            } else {
                // Reflection is not better than the best vertex: contract.
                let contracted = if f_reflected < worst.1 {
                    best.0 + 0.5 * (reflected - best.0)
                } else {
                    best.0 + 0.5 * (worst.0 - best.0)
                };
                let f_contracted = objective(contracted);
                if f_contracted < worst.1.min(f_reflected) {
                    worst = (contracted, f_contracted);
                } else {
                    let shrunk = best.0 + 0.5 * (worst.0 - best.0);
                    worst = (shrunk, objective(shrunk));
                }
            }

            if worst.1 < best.1 {
                core::mem::swap(&mut best, &mut worst);
            }
        }
        best.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverts_decreasing_function() {
        let f = |x: f64| (-x).exp();
        let x = invert_decreasing(f, 0.1, 0.01);
        assert!((x - 10_f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn inversion_fails_without_bracket() {
        let f = |x: f64| 1.0 / x;
        // f(lower) is below the target.
        assert!(invert_decreasing(f, 5.0, 1.0).is_nan());
        // f never reaches a target of 0 below the search limit.
        assert!(invert_decreasing(f, 0.0, 1.0).is_nan());
        assert!(invert_decreasing(f, f64::NAN, 1.0).is_nan());
    }

    #[test]
    fn nelder_mead_finds_parabola_minimum() {
        let x = NelderMead::default().minimize(|x| (x - 3.2).powi(2), 1.0);
        assert!((x - 3.2).abs() < 1e-3);
    }

    #[test]
    fn nelder_mead_treats_nan_as_infinite() {
        let f = |x: f64| if x < 0.0 { f64::NAN } else { (x.sqrt() - 0.5).powi(2) };
        let x = NelderMead::default().minimize(f, 1.0);
        assert!((x - 0.25).abs() < 1e-2);
    }
}
