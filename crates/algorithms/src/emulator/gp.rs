//! Gaussian-process regression with robust range estimation
//!
//! Model for k outputs observed at n design points x₁…xₙ ∈ ℝᵖ:
//! ```text
//! yⱼ(x) = βⱼ + Zⱼ(x),   Cov(Zⱼ(x), Zⱼ(x')) = σⱼ² · R(x, x')
//! R(x, x') = Π_l  m₅/₂(|x_l − x'_l| / γ_l)
//! m₅/₂(d) = (1 + √5·d + 5d²/3) · exp(−√5·d)
//! ```
//! All outputs share the correlation ranges γ; means βⱼ and variances σⱼ²
//! are per output. Inputs are rescaled to the unit cube of the training
//! design before any distance is taken.
//!
//! The ranges maximise the marginal posterior with βⱼ and σⱼ² integrated
//! out under a reference prior, times the jointly robust prior on 1/γ:
//! ```text
//! ln p(γ | Y) = −k/2·ln|R| − k/2·ln(1ᵀR⁻¹1) − (n−1)/2·Σⱼ ln Sⱼ²
//!               + a·ln t − b·t,     t = Σ_l C/γ_l
//! Sⱼ² = (yⱼ − βⱼ1)ᵀ R⁻¹ (yⱼ − βⱼ1),   C = n^(−1/p),   b = C·(a + p)
//! ```
//! The optimum is located by a log-spaced grid search, cyclic coordinate
//! sweeps and a final multiplicative refinement.
//!
//! Predictions follow the Student-t predictive distribution with n−1
//! degrees of freedom, so the 95 % bounds are `mean ± t₀.₉₇₅ · sd`.
//!
//! Reference:
//! Gu, M., Wang, X., Berger, J.O. (2018). Robust Gaussian stochastic
//! process emulation. Annals of Statistics 46(6A).
//! Gu, M., Berger, J.O. (2016). Parallel partial Gaussian process
//! emulation for computer models with massive output. Annals of Applied
//! Statistics 10(3).

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

use flowuq_core::{Error, Result};

use super::linalg::Cholesky;
use crate::maybe_rayon::*;

/// Parameters for fitting a [`GaussianProcess`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpParams {
    /// Added to the diagonal of the correlation matrix (default 1e-8)
    pub nugget: f64,
    /// Smallest range searched, in unit-scaled input space (default 0.02)
    pub min_range: f64,
    /// Largest range searched (default 20)
    pub max_range: f64,
    /// Log-spaced candidates per dimension (default 20)
    pub grid_size: usize,
    /// Coordinate sweeps over all dimensions (default 2)
    pub sweeps: usize,
    /// Multiplicative refinement rounds after the grid (default 4)
    pub refinements: usize,
    /// Exponent `a` of the jointly robust prior (default 0.2)
    pub prior_shape: f64,
    /// Two-sided level of the prediction interval (default 0.95)
    pub confidence: f64,
}

impl Default for GpParams {
    fn default() -> Self {
        Self {
            nugget: 1e-8,
            min_range: 0.02,
            max_range: 20.0,
            grid_size: 20,
            sweeps: 2,
            refinements: 4,
            prior_shape: 0.2,
            confidence: 0.95,
        }
    }
}

impl GpParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.nugget >= 0.0) || !self.nugget.is_finite() {
            return Err(Error::invalid("nugget", self.nugget, "must be finite and non-negative"));
        }
        if !(self.min_range > 0.0) || !(self.max_range >= self.min_range) || !self.max_range.is_finite() {
            return Err(Error::invalid(
                "range",
                format!("{}..{}", self.min_range, self.max_range),
                "range bounds must satisfy 0 < min_range <= max_range",
            ));
        }
        if self.grid_size == 0 {
            return Err(Error::invalid("grid_size", 0, "at least one candidate is required"));
        }
        if !(self.prior_shape > 0.0) {
            return Err(Error::invalid("prior_shape", self.prior_shape, "must be positive"));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(Error::invalid("confidence", self.confidence, "must lie in (0, 1)"));
        }
        Ok(())
    }
}

/// Matérn 5/2 correlation at distance `d` for range `gamma`
#[inline]
fn matern52(d: f64, gamma: f64) -> f64 {
    let s = 5.0_f64.sqrt() * d / gamma;
    (1.0 + s + s * s / 3.0) * (-s).exp()
}

fn student_t_quantile(dof: f64, confidence: f64) -> Result<f64> {
    let dist = StudentsT::new(0.0, 1.0, dof)
        .map_err(|e| Error::Algorithm(format!("Student-t with {dof} degrees of freedom: {e}")))?;
    Ok(dist.inverse_cdf(0.5 + confidence / 2.0))
}

/// Predictions for m rows and k outputs
#[derive(Debug, Clone)]
pub struct GpPrediction {
    /// Predictive mean (m × k)
    pub mean: Array2<f64>,
    /// Lower bound of the prediction interval (m × k)
    pub lower: Array2<f64>,
    /// Upper bound of the prediction interval (m × k)
    pub upper: Array2<f64>,
    /// Predictive standard deviation (m × k)
    pub sd: Array2<f64>,
}

impl GpPrediction {
    fn assemble(rows: Vec<(Array1<f64>, Array1<f64>)>, outputs: usize, t: f64) -> Self {
        let m = rows.len();
        let mut mean = Array2::zeros((m, outputs));
        let mut sd = Array2::zeros((m, outputs));
        for (i, (mu, s)) in rows.into_iter().enumerate() {
            mean.row_mut(i).assign(&mu);
            sd.row_mut(i).assign(&s);
        }
        let half = &sd * t;
        Self {
            lower: &mean - &half,
            upper: &mean + &half,
            mean,
            sd,
        }
    }

    /// Number of predicted rows
    pub fn rows(&self) -> usize {
        self.mean.nrows()
    }

    /// Number of outputs
    pub fn outputs(&self) -> usize {
        self.mean.ncols()
    }
}

/// Quantities derived from one correlation matrix and response.
#[derive(Debug, Clone)]
struct Conditioned {
    chol: Cholesky,
    r_inv_one: Array1<f64>,
    one_r_inv_one: f64,
    beta: Array1<f64>,
    /// R⁻¹(Y − 1βᵀ), n × k
    weights: Array2<f64>,
    sigma2: Array1<f64>,
}

impl Conditioned {
    fn new(corr: &Array2<f64>, response: ArrayView2<'_, f64>) -> Result<Self> {
        let n = corr.nrows();
        let chol = Cholesky::decompose(corr)?;
        let r_inv_one = chol.solve(Array1::ones(n).view());
        let one_r_inv_one = r_inv_one.sum();
        let r_inv_y = chol.solve_mat(response);

        let beta = r_inv_y.sum_axis(Axis(0)) / one_r_inv_one;
        let weights = &r_inv_y
            - &r_inv_one
                .view()
                .insert_axis(Axis(1))
                .dot(&beta.view().insert_axis(Axis(0)));

        let centred = &response - &beta.view().insert_axis(Axis(0));
        let dof = (n - 1) as f64;
        let sigma2 = (&centred * &weights)
            .sum_axis(Axis(0))
            .mapv(|s2| s2.max(0.0) / dof);

        Ok(Self {
            chol,
            r_inv_one,
            one_r_inv_one,
            beta,
            weights,
            sigma2,
        })
    }

    /// Mean and standard deviation at a point with cross-correlations `cross`.
    fn predict(&self, cross: &Array1<f64>) -> (Array1<f64>, Array1<f64>) {
        let mean = &self.beta + &self.weights.t().dot(cross);
        let z = self.chol.forward(cross.view());
        let u = self.r_inv_one.dot(cross);
        let c = (1.0 - z.dot(&z) + (1.0 - u).powi(2) / self.one_r_inv_one).max(0.0);
        let sd = self.sigma2.mapv(|s2| (s2 * c).sqrt());
        (mean, sd)
    }
}

/// Marginal posterior of the correlation ranges.
struct Objective<'a> {
    /// Per-dimension |x_il − x_jl| in scaled units
    distances: Vec<Array2<f64>>,
    response: ArrayView2<'a, f64>,
    nugget: f64,
    prior_shape: f64,
}

impl Objective<'_> {
    fn correlation(&self, ranges: &Array1<f64>) -> Array2<f64> {
        let n = self.response.nrows();
        let mut corr = Array2::ones((n, n));
        for (dist, &gamma) in self.distances.iter().zip(ranges.iter()) {
            Zip::from(&mut corr)
                .and(dist)
                .for_each(|c, &d| *c *= matern52(d, gamma));
        }
        for i in 0..n {
            corr[[i, i]] += self.nugget;
        }
        corr
    }

    fn log_prior(&self, ranges: &Array1<f64>) -> f64 {
        let n = self.response.nrows() as f64;
        let p = ranges.len() as f64;
        let scale = n.powf(-1.0 / p);
        let rate = scale * (self.prior_shape + p);
        let t: f64 = ranges.iter().map(|g| scale / g).sum();
        self.prior_shape * t.ln() - rate * t
    }

    /// `None` when the correlation matrix cannot be factorised.
    fn log_posterior(&self, ranges: &Array1<f64>) -> Option<f64> {
        let (n, k) = self.response.dim();
        let chol = Cholesky::decompose(&self.correlation(ranges)).ok()?;

        let u = chol.forward(Array1::ones(n).view());
        let one_r_inv_one = u.dot(&u);
        let z = chol.forward_mat(self.response);

        let sum_log_s2: f64 = z
            .columns()
            .into_iter()
            .map(|zj| {
                let a = u.dot(&zj);
                let s2 = zj.dot(&zj) - a * a / one_r_inv_one;
                s2.max(f64::MIN_POSITIVE).ln()
            })
            .sum();

        let k = k as f64;
        let value = -0.5 * k * chol.log_det() - 0.5 * k * one_r_inv_one.ln()
            - 0.5 * (n - 1) as f64 * sum_log_s2
            + self.log_prior(ranges);
        value.is_finite().then_some(value)
    }
}

fn log_grid(min: f64, max: f64, size: usize) -> Vec<f64> {
    if size == 1 || min == max {
        return vec![(min * max).sqrt()];
    }
    let (lo, hi) = (min.ln(), max.ln());
    (0..size)
        .map(|i| (lo + (hi - lo) * i as f64 / (size - 1) as f64).exp())
        .collect()
}

fn search_ranges(objective: &Objective<'_>, dims: usize, params: &GpParams) -> Result<(Array1<f64>, f64)> {
    let grid = log_grid(params.min_range, params.max_range, params.grid_size);

    let mut best = Array1::from_elem(dims, grid[grid.len() / 2]);
    let mut best_value = f64::NEG_INFINITY;
    let consider = |candidate: Array1<f64>, best: &mut Array1<f64>, best_value: &mut f64| {
        if let Some(v) = objective.log_posterior(&candidate)
            && v > *best_value
        {
            *best_value = v;
            *best = candidate;
        }
    };

    // Isotropic start, then per-dimension sweeps
    for &g in &grid {
        consider(Array1::from_elem(dims, g), &mut best, &mut best_value);
    }
    for _ in 0..params.sweeps {
        for l in 0..dims {
            for &g in &grid {
                let mut candidate = best.clone();
                candidate[l] = g;
                consider(candidate, &mut best, &mut best_value);
            }
        }
    }

    let mut step = if grid.len() > 1 { (grid[1] / grid[0]).sqrt() } else { 2.0 };
    for _ in 0..params.refinements {
        for l in 0..dims {
            for factor in [1.0 / step, step] {
                let mut candidate = best.clone();
                candidate[l] = (candidate[l] * factor).clamp(params.min_range, params.max_range);
                consider(candidate, &mut best, &mut best_value);
            }
        }
        step = step.sqrt();
    }

    if !best_value.is_finite() {
        return Err(Error::Algorithm(
            "no correlation range gave a positive-definite correlation matrix".into(),
        ));
    }
    Ok((best, best_value))
}

/// A fitted Gaussian process for one or more outputs
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    x_min: Array1<f64>,
    x_span: Array1<f64>,
    /// Scaled training inputs (n × p)
    inputs: Array2<f64>,
    /// Training outputs (n × k)
    response: Array2<f64>,
    ranges: Array1<f64>,
    /// Training correlation matrix including the nugget
    corr: Array2<f64>,
    confidence: f64,
    log_posterior: f64,
    fitted: Conditioned,
}

impl GaussianProcess {
    /// Fit to `response` (n × k) observed at `design` (n × p).
    ///
    /// # Errors
    /// - [`Error::DimensionMismatch`] if the row counts differ
    /// - [`Error::InvalidParameter`] for non-finite data or bad `params`
    /// - [`Error::Algorithm`] for fewer than 2 runs or if no admissible
    ///   ranges are found
    pub fn fit(
        design: ArrayView2<'_, f64>,
        response: ArrayView2<'_, f64>,
        params: &GpParams,
    ) -> Result<Self> {
        params.validate()?;
        let (n, p) = design.dim();
        let k = response.ncols();
        if response.nrows() != n {
            return Err(Error::DimensionMismatch {
                what: "response rows",
                expected: n,
                actual: response.nrows(),
            });
        }
        if n < 2 {
            return Err(Error::Algorithm(
                "Gaussian process requires at least 2 design rows".into(),
            ));
        }
        if p == 0 || k == 0 {
            return Err(Error::invalid(
                "design",
                format!("{n}x{p} inputs, {k} outputs"),
                "at least one input and one output column are required",
            ));
        }
        if design.iter().chain(response.iter()).any(|v| !v.is_finite()) {
            return Err(Error::invalid("training data", "NaN/inf", "values must be finite"));
        }

        let x_min = design.fold_axis(Axis(0), f64::INFINITY, |a, &b| a.min(b));
        let x_max = design.fold_axis(Axis(0), f64::NEG_INFINITY, |a, &b| a.max(b));
        let x_span = (&x_max - &x_min).mapv(|s| if s > 0.0 { s } else { 1.0 });
        let inputs = (&design - &x_min.view().insert_axis(Axis(0))) / &x_span.view().insert_axis(Axis(0));

        let distances = inputs
            .columns()
            .into_iter()
            .map(|col| Array2::from_shape_fn((n, n), |(i, j)| (col[i] - col[j]).abs()))
            .collect();
        let objective = Objective {
            distances,
            response,
            nugget: params.nugget,
            prior_shape: params.prior_shape,
        };

        let (ranges, log_posterior) = search_ranges(&objective, p, params)?;
        let corr = objective.correlation(&ranges);
        let fitted = Conditioned::new(&corr, response)?;

        tracing::debug!(
            runs = n,
            inputs = p,
            outputs = k,
            ranges = ?ranges.to_vec(),
            log_posterior,
            "fitted Gaussian process"
        );

        Ok(Self {
            x_min,
            x_span,
            inputs,
            response: response.to_owned(),
            ranges,
            corr,
            confidence: params.confidence,
            log_posterior,
            fitted,
        })
    }

    /// Number of training runs
    pub fn runs(&self) -> usize {
        self.inputs.nrows()
    }

    /// Number of input dimensions
    pub fn input_dim(&self) -> usize {
        self.inputs.ncols()
    }

    /// Number of outputs
    pub fn output_dim(&self) -> usize {
        self.response.ncols()
    }

    /// Estimated correlation ranges (unit-scaled input space)
    pub fn ranges(&self) -> &Array1<f64> {
        &self.ranges
    }

    /// Estimated constant means, one per output
    pub fn beta(&self) -> &Array1<f64> {
        &self.fitted.beta
    }

    /// Estimated variances, one per output
    pub fn sigma2(&self) -> &Array1<f64> {
        &self.fitted.sigma2
    }

    pub fn log_posterior(&self) -> f64 {
        self.log_posterior
    }

    fn cross_correlation(&self, point: ArrayView1<'_, f64>) -> Array1<f64> {
        let scaled = (&point - &self.x_min) / &self.x_span;
        self.inputs
            .outer_iter()
            .map(|xi| {
                xi.iter()
                    .zip(scaled.iter())
                    .zip(self.ranges.iter())
                    .map(|((&a, &b), &g)| matern52((a - b).abs(), g))
                    .product()
            })
            .collect()
    }

    /// Predict at the rows of `design` (m × p).
    pub fn predict(&self, design: ArrayView2<'_, f64>) -> Result<GpPrediction> {
        if design.ncols() != self.input_dim() {
            return Err(Error::DimensionMismatch {
                what: "design columns",
                expected: self.input_dim(),
                actual: design.ncols(),
            });
        }
        let t = student_t_quantile((self.runs() - 1) as f64, self.confidence)?;

        let rows: Vec<_> = (0..design.nrows())
            .into_par_iter()
            .map(|i| self.fitted.predict(&self.cross_correlation(design.row(i))))
            .collect();
        Ok(GpPrediction::assemble(rows, self.output_dim(), t))
    }

    /// Leave-one-out predictions at every training run.
    ///
    /// Ranges stay at their fitted values; means and variances are
    /// re-estimated without the held-out run.
    pub fn leave_one_out(&self) -> Result<GpPrediction> {
        let n = self.runs();
        if n < 3 {
            return Err(Error::Algorithm(
                "leave-one-out requires at least 3 training runs".into(),
            ));
        }
        let t = student_t_quantile((n - 2) as f64, self.confidence)?;

        let rows = (0..n)
            .into_par_iter()
            .map(|i| {
                let keep: Vec<usize> = (0..n).filter(|&j| j != i).collect();
                let corr = self.corr.select(Axis(0), &keep).select(Axis(1), &keep);
                let response = self.response.select(Axis(0), &keep);
                let fold = Conditioned::new(&corr, response.view())?;
                let cross = self.corr.row(i).select(Axis(0), &keep);
                Ok(fold.predict(&cross))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(GpPrediction::assemble(rows, self.output_dim(), t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array;
    use std::f64::consts::PI;

    fn sine_data(n: usize) -> (Array2<f64>, Array2<f64>) {
        let x = Array::linspace(0.0, 1.0, n).insert_axis(Axis(1));
        let y = x.mapv(|v| (2.0 * PI * v).sin());
        (x, y)
    }

    #[test]
    fn test_interpolates_training_points() {
        let (x, y) = sine_data(8);
        let gp = GaussianProcess::fit(x.view(), y.view(), &GpParams::default()).unwrap();
        let pred = gp.predict(x.view()).unwrap();
        for i in 0..8 {
            assert_relative_eq!(pred.mean[[i, 0]], y[[i, 0]], epsilon = 1e-3);
            assert!(pred.sd[[i, 0]] < 1e-2);
        }
    }

    #[test]
    fn test_predicts_between_points() {
        let (x, y) = sine_data(12);
        let gp = GaussianProcess::fit(x.view(), y.view(), &GpParams::default()).unwrap();
        let new = Array::linspace(0.05, 0.95, 7).insert_axis(Axis(1));
        let pred = gp.predict(new.view()).unwrap();
        for i in 0..7 {
            let truth = (2.0 * PI * new[[i, 0]]).sin();
            assert_relative_eq!(pred.mean[[i, 0]], truth, epsilon = 0.05);
            assert!(pred.lower[[i, 0]] <= pred.mean[[i, 0]]);
            assert!(pred.upper[[i, 0]] >= pred.mean[[i, 0]]);
            assert!(pred.sd[[i, 0]] >= 0.0);
        }
    }

    #[test]
    fn test_shared_ranges_are_linear_in_outputs() {
        let (x, y) = sine_data(10);
        let mut both = Array2::zeros((10, 2));
        both.column_mut(0).assign(&y.column(0));
        both.column_mut(1).assign(&y.column(0).mapv(|v| 3.0 * v + 2.0));
        let gp = GaussianProcess::fit(x.view(), both.view(), &GpParams::default()).unwrap();

        let new = Array::linspace(0.0, 1.0, 5).insert_axis(Axis(1));
        let pred = gp.predict(new.view()).unwrap();
        assert_eq!(pred.mean.dim(), (5, 2));
        for i in 0..5 {
            assert_relative_eq!(pred.mean[[i, 1]], 3.0 * pred.mean[[i, 0]] + 2.0, epsilon = 1e-6);
            assert_relative_eq!(pred.sd[[i, 1]], 3.0 * pred.sd[[i, 0]], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_constant_response() {
        let x = Array::linspace(0.0, 1.0, 6).insert_axis(Axis(1));
        let y = Array2::from_elem((6, 1), 4.2);
        let gp = GaussianProcess::fit(x.view(), y.view(), &GpParams::default()).unwrap();
        let pred = gp.predict(Array2::from_elem((2, 1), 0.37).view()).unwrap();
        assert_relative_eq!(pred.mean[[0, 0]], 4.2, epsilon = 1e-4);
        assert!(pred.sd[[0, 0]] < 1e-3);
    }

    #[test]
    fn test_leave_one_out_smooth_function() {
        let (x, y) = sine_data(15);
        let gp = GaussianProcess::fit(x.view(), y.view(), &GpParams::default()).unwrap();
        let loo = gp.leave_one_out().unwrap();
        assert_eq!(loo.mean.dim(), (15, 1));
        // interior points are well predicted from their neighbours
        for i in 2..13 {
            assert_relative_eq!(loo.mean[[i, 0]], y[[i, 0]], epsilon = 0.1);
        }
    }

    #[test]
    fn test_dimension_checks() {
        let (x, y) = sine_data(6);
        let gp = GaussianProcess::fit(x.view(), y.view(), &GpParams::default()).unwrap();
        assert!(matches!(
            gp.predict(Array2::zeros((3, 2)).view()),
            Err(Error::DimensionMismatch { what: "design columns", .. })
        ));
        assert!(GaussianProcess::fit(x.view(), Array2::zeros((5, 1)).view(), &GpParams::default())
            .is_err());
        let one = Array2::zeros((1, 1));
        assert!(GaussianProcess::fit(one.view(), one.view(), &GpParams::default()).is_err());
    }

    #[test]
    fn test_leave_one_out_needs_three_runs() {
        let (x, y) = sine_data(2);
        let gp = GaussianProcess::fit(x.view(), y.view(), &GpParams::default()).unwrap();
        assert!(gp.leave_one_out().is_err());
    }

    #[test]
    fn test_params_validation() {
        let bad = GpParams {
            confidence: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = GpParams {
            min_range: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        assert!(GpParams::default().validate().is_ok());
    }

    #[test]
    fn test_matern_kernel() {
        assert_relative_eq!(matern52(0.0, 1.0), 1.0);
        assert!(matern52(0.5, 1.0) > matern52(1.0, 1.0));
        assert!(matern52(0.5, 10.0) > matern52(0.5, 1.0));
    }
}
