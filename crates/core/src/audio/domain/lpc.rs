//! Linear-prediction analysis of a single windowed frame.
//!
//! Coefficient vectors follow the convention `A(z) = a[0] + a[1] z^-1 + ... + a[p] z^-p`
//! with `a[0] = 1`; the prediction residual is `e = A(z) x` and the
//! vocal-tract model is the all-pole filter `1 / A(z)`. Read as a polynomial
//! in `z` the same vector lists coefficients from the highest power down, so
//! its roots are the poles of the synthesis filter.

use rustfft::num_complex::Complex;

/// Frames whose zero-lag autocorrelation is below this are treated as silence.
pub const SILENCE_ENERGY: f64 = 1e-12;

/// White-noise correction added to the zero-lag autocorrelation to keep
/// strongly tonal frames well conditioned.
const LAG_ZERO_REGULARIZATION: f64 = 1e-4;

const MAX_ROOT_ITERATIONS: usize = 500;
const ROOT_TOLERANCE: f64 = 1e-14;

/// One analysis frame and its prediction model.
///
/// Created per frame, consumed to resynthesize that frame, then dropped.
#[derive(Debug, Clone)]
pub struct LpcFrame {
    samples: Vec<f64>,
    coefficients: Vec<f64>,
}

impl LpcFrame {
    /// Fit an order-`order` predictor to an already windowed frame.
    /// Returns `None` for silent frames, which have no meaningful envelope.
    pub fn analyze(samples: &[f64], order: usize) -> Option<Self> {
        let mut r = autocorrelation(samples, order);
        if r[0] < SILENCE_ENERGY {
            return None;
        }
        r[0] *= 1.0 + LAG_ZERO_REGULARIZATION;
        let (coefficients, _) = levinson_durbin(&r, order);
        Some(Self {
            samples: samples.to_vec(),
            coefficients,
        })
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Poles of the synthesis filter `1 / A(z)`.
    pub fn poles(&self) -> Vec<Complex<f64>> {
        polynomial_roots(&self.coefficients)
    }

    /// Excitation left after removing the modelled envelope.
    pub fn residual(&self) -> Vec<f64> {
        fir_filter(&self.coefficients, &self.samples)
    }

    /// Drive the all-pole filter `1 / A'(z)` with this frame's residual.
    /// With `A' = A` this returns the original frame.
    pub fn resynthesize(&self, coefficients: &[f64]) -> Vec<f64> {
        all_pole_filter(coefficients, &self.residual())
    }
}

/// Autocorrelation of `x` for lags `0..=order`.
pub fn autocorrelation(x: &[f64], order: usize) -> Vec<f64> {
    let n = x.len();
    (0..=order)
        .map(|lag| {
            if lag >= n {
                return 0.0;
            }
            x[..n - lag]
                .iter()
                .zip(&x[lag..])
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect()
}

/// Levinson-Durbin recursion: given autocorrelation values, compute LPC coefficients.
/// Returns (coefficients of length order+1 with a[0]=1, prediction_error).
pub fn levinson_durbin(r: &[f64], order: usize) -> (Vec<f64>, f64) {
    let mut a = vec![0.0; order + 1];
    let mut a_prev = vec![0.0; order + 1];
    a[0] = 1.0;
    a_prev[0] = 1.0;

    let mut error = r[0];
    if error.abs() < 1e-30 {
        return (a, error);
    }

    for i in 1..=order {
        let mut lambda = 0.0;
        for j in 0..i {
            lambda -= a_prev[j] * r[i - j];
        }
        lambda /= error;

        // |k| < 1 keeps every pole inside the unit circle
        lambda = lambda.clamp(-0.999, 0.999);

        for j in 0..=i {
            a[j] = a_prev[j] + lambda * a_prev[i - j];
        }

        error *= 1.0 - lambda * lambda;
        a_prev[..=i].copy_from_slice(&a[..=i]);
        if error.abs() < 1e-30 {
            break;
        }
    }

    (a, error)
}

/// Roots of the polynomial `c[0] z^n + c[1] z^(n-1) + ... + c[n]`
/// (Aberth-Ehrlich iteration).
pub fn polynomial_roots(coefficients: &[f64]) -> Vec<Complex<f64>> {
    let lead = match coefficients.iter().position(|c| *c != 0.0) {
        Some(idx) => idx,
        None => return Vec::new(),
    };
    let mut monic: Vec<f64> = coefficients[lead..]
        .iter()
        .map(|c| c / coefficients[lead])
        .collect();

    // Trailing zeros are exact roots at the origin.
    let mut roots = Vec::new();
    while monic.len() > 1 && monic[monic.len() - 1] == 0.0 {
        monic.pop();
        roots.push(Complex::new(0.0, 0.0));
    }

    let degree = monic.len() - 1;
    if degree == 0 {
        return roots;
    }

    // Geometric mean of the root moduli is |c[n]|^(1/n).
    let radius = monic[degree].abs().powf(1.0 / degree as f64).clamp(1e-3, 1e3);
    let mut estimates: Vec<Complex<f64>> = (0..degree)
        .map(|k| {
            let angle = 2.0 * std::f64::consts::PI * k as f64 / degree as f64 + 0.4;
            Complex::from_polar(radius, angle)
        })
        .collect();

    for _ in 0..MAX_ROOT_ITERATIONS {
        let mut max_step = 0.0f64;
        for i in 0..degree {
            let z = estimates[i];
            let (p, dp) = evaluate_with_derivative(&monic, z);
            if p.norm() == 0.0 || dp.norm() == 0.0 {
                continue;
            }
            let newton = p / dp;
            let repulsion: Complex<f64> = estimates
                .iter()
                .enumerate()
                .filter(|&(j, other)| j != i && (z - other).norm() > 1e-300)
                .map(|(_, other)| (z - other).inv())
                .sum();
            let step = newton / (Complex::new(1.0, 0.0) - newton * repulsion);
            if !step.re.is_finite() || !step.im.is_finite() {
                continue;
            }
            estimates[i] = z - step;
            max_step = max_step.max(step.norm() / z.norm().max(1.0));
        }
        if max_step < ROOT_TOLERANCE {
            break;
        }
    }

    roots.extend(estimates);
    roots
}

/// Horner evaluation of a polynomial and its derivative at `z`.
fn evaluate_with_derivative(coefficients: &[f64], z: Complex<f64>) -> (Complex<f64>, Complex<f64>) {
    let mut p = Complex::new(0.0, 0.0);
    let mut dp = Complex::new(0.0, 0.0);
    for &c in coefficients {
        dp = dp * z + p;
        p = p * z + c;
    }
    (p, dp)
}

/// Monic polynomial `prod (z - root)`, coefficients from the highest power down.
pub fn polynomial_from_roots(roots: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let mut poly = vec![Complex::new(1.0, 0.0)];
    for &root in roots {
        let mut next = vec![Complex::new(0.0, 0.0); poly.len() + 1];
        for (k, &c) in poly.iter().enumerate() {
            next[k] += c;
            next[k + 1] -= root * c;
        }
        poly = next;
    }
    poly
}

/// FIR filter `y[n] = sum_k b[k] x[n-k]` with zero initial state.
pub fn fir_filter(b: &[f64], x: &[f64]) -> Vec<f64> {
    (0..x.len())
        .map(|n| {
            b.iter()
                .enumerate()
                .take(n + 1)
                .map(|(k, &bk)| bk * x[n - k])
                .sum()
        })
        .collect()
}

/// All-pole filter `y[n] = (x[n] - sum_{k>=1} a[k] y[n-k]) / a[0]` with zero initial state.
pub fn all_pole_filter(a: &[f64], x: &[f64]) -> Vec<f64> {
    let mut y = vec![0.0f64; x.len()];
    for n in 0..x.len() {
        let mut acc = x[n];
        for k in 1..a.len().min(n + 1) {
            acc -= a[k] * y[n - k];
        }
        y[n] = acc / a[0];
    }
    y
}

/// Magnitude of `1 / A(e^jw)` at `num_bins` points spanning 0..pi.
pub fn spectral_envelope(a: &[f64], num_bins: usize) -> Vec<f64> {
    (0..num_bins)
        .map(|k| {
            let omega = std::f64::consts::PI * k as f64 / num_bins as f64;
            let mut re = 0.0;
            let mut im = 0.0;
            for (i, &coeff) in a.iter().enumerate() {
                re += coeff * (omega * i as f64).cos();
                im -= coeff * (omega * i as f64).sin();
            }
            let mag_sq = re * re + im * im;
            if mag_sq > 1e-30 {
                1.0 / mag_sq.sqrt()
            } else {
                1e15
            }
        })
        .collect()
}
