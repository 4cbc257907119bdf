//! One-dimensional interpolants over strictly increasing knots.
//!
//! Both interpolants return NaN outside `[x[0], x[n-1]]`; they never
//! extrapolate.

use crate::config::InterpKind;
use crate::error::{AnalysisError, AnalysisResult};

/// Piecewise interpolant built once per object and evaluated on the grid.
#[derive(Debug, Clone)]
pub enum Interpolant {
    Linear { x: Vec<f64>, y: Vec<f64> },
    Cubic(CubicSpline),
}

impl Interpolant {
    /// `x` must be strictly increasing and the same length as `y`.
    pub fn new(kind: InterpKind, x: Vec<f64>, y: Vec<f64>) -> AnalysisResult<Self> {
        if x.len() != y.len() {
            return Err(AnalysisError::invalid(
                "samples",
                format!("{} phases but {} magnitudes", x.len(), y.len()),
            ));
        }
        if x.len() < kind.min_points() {
            return Err(AnalysisError::InsufficientData {
                required: kind.min_points(),
                actual: x.len(),
            });
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(AnalysisError::invalid(
                "samples",
                "phases must be strictly increasing",
            ));
        }
        match kind {
            InterpKind::Linear | InterpKind::Slinear => Ok(Interpolant::Linear { x, y }),
            InterpKind::Cubic => Ok(Interpolant::Cubic(CubicSpline::not_a_knot(x, y)?)),
        }
    }

    pub fn eval(&self, xi: f64) -> f64 {
        match self {
            Interpolant::Linear { x, y } => {
                let Some(idx) = find_interval(x, xi) else {
                    return f64::NAN;
                };
                let t = (xi - x[idx]) / (x[idx + 1] - x[idx]);
                y[idx] + t * (y[idx + 1] - y[idx])
            }
            Interpolant::Cubic(spline) => spline.eval(xi),
        }
    }
}

/// Interval `i` with `x[i] <= xi <= x[i+1]`, or `None` outside the knots.
fn find_interval(x: &[f64], xi: f64) -> Option<usize> {
    let n = x.len();
    if n < 2 || !(xi >= x[0] && xi <= x[n - 1]) {
        return None;
    }
    let upper = x.partition_point(|&v| v <= xi);
    Some(upper.saturating_sub(1).min(n - 2))
}

// ---------------------------------------------------------------------------
// Cubic spline
// ---------------------------------------------------------------------------

/// Cubic spline stored as knot values and second derivatives `m`.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    m: Vec<f64>,
}

impl CubicSpline {
    /// Not-a-knot spline: the third derivative is continuous at `x[1]` and
    /// `x[n-2]`. With exactly four knots this is the interpolating cubic.
    pub fn not_a_knot(x: Vec<f64>, y: Vec<f64>) -> AnalysisResult<Self> {
        let n = x.len();
        if n < 4 {
            return Err(AnalysisError::InsufficientData {
                required: 4,
                actual: n,
            });
        }
        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let slope: Vec<f64> = (0..n - 1).map(|i| (y[i + 1] - y[i]) / h[i]).collect();

        // Unknowns m[1..=n-2]; m[0] and m[n-1] are eliminated with the
        // not-a-knot conditions, which keeps the system tridiagonal.
        let size = n - 2;
        let mut lower = vec![0.0; size];
        let mut diag = vec![0.0; size];
        let mut upper = vec![0.0; size];
        let mut rhs = vec![0.0; size];
        for k in 0..size {
            let i = k + 1;
            lower[k] = h[i - 1];
            diag[k] = 2.0 * (h[i - 1] + h[i]);
            upper[k] = h[i];
            rhs[k] = 6.0 * (slope[i] - slope[i - 1]);
        }

        let (h0, h1) = (h[0], h[1]);
        diag[0] = (h0 + h1) * (h0 + 2.0 * h1);
        upper[0] = (h1 - h0) * (h1 + h0);
        rhs[0] *= h1;

        let (ha, hb) = (h[n - 2], h[n - 3]);
        let last = size - 1;
        lower[last] = (hb - ha) * (hb + ha);
        diag[last] = (ha + hb) * (2.0 * hb + ha);
        rhs[last] *= hb;

        let inner = solve_tridiagonal(&lower, &diag, &upper, &rhs)?;

        let mut m = Vec::with_capacity(n);
        m.push(((h0 + h1) * inner[0] - h0 * inner[1]) / h1);
        m.extend_from_slice(&inner);
        m.push(((ha + hb) * inner[last] - ha * inner[last - 1]) / hb);

        Ok(Self { x, y, m })
    }

    pub fn eval(&self, xi: f64) -> f64 {
        let Some(i) = find_interval(&self.x, xi) else {
            return f64::NAN;
        };
        let (x0, x1) = (self.x[i], self.x[i + 1]);
        let (y0, y1) = (self.y[i], self.y[i + 1]);
        let (m0, m1) = (self.m[i], self.m[i + 1]);
        let h = x1 - x0;
        let a = x1 - xi;
        let b = xi - x0;
        m0 * a.powi(3) / (6.0 * h)
            + m1 * b.powi(3) / (6.0 * h)
            + (y0 / h - m0 * h / 6.0) * a
            + (y1 / h - m1 * h / 6.0) * b
    }
}

/// Thomas algorithm. `lower[0]` and `upper[n-1]` are ignored.
fn solve_tridiagonal(
    lower: &[f64],
    diag: &[f64],
    upper: &[f64],
    rhs: &[f64],
) -> AnalysisResult<Vec<f64>> {
    let n = diag.len();
    let mut c_prime = vec![0.0; n];
    let mut d_prime = vec![0.0; n];

    let singular = || AnalysisError::invalid("samples", "singular spline system");

    if diag[0].abs() < 1e-14 {
        return Err(singular());
    }
    c_prime[0] = upper[0] / diag[0];
    d_prime[0] = rhs[0] / diag[0];

    for i in 1..n {
        let denom = diag[i] - lower[i] * c_prime[i - 1];
        if denom.abs() < 1e-14 {
            return Err(singular());
        }
        if i < n - 1 {
            c_prime[i] = upper[i] / denom;
        }
        d_prime[i] = (rhs[i] - lower[i] * d_prime[i - 1]) / denom;
    }

    let mut x = vec![0.0; n];
    x[n - 1] = d_prime[n - 1];
    for i in (0..n - 1).rev() {
        x[i] = d_prime[i] - c_prime[i] * x[i + 1];
    }
    Ok(x)
}
