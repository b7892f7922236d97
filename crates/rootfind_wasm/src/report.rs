//! Builds the payload each form renders from its raw text fields.

use anyhow::Result;
use rootfind_core::convergence::{analyze_convergence, ConvergenceAnalysis};
use rootfind_core::input::{parse_integer, parse_real};
use rootfind_core::methods::{
    run_bisection, run_fixed_point, run_newton, run_secant, BisectionRecord, FixedPointRecord,
    NewtonRecord, SecantRecord,
};
use rootfind_core::table::{headers, rows, summary, TableRow};
use rootfind_core::{IterationSettings, MethodResult, Precision, SetupError, Status};
use serde::Serialize;
use tracing::debug;

/// Records, terminal status and the preformatted table for one run.
#[derive(Debug, Clone, Serialize)]
pub struct MethodReport<R> {
    pub records: Vec<R>,
    pub status: Status,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub message: String,
}

impl<R: TableRow> MethodReport<R> {
    fn build(result: MethodResult<R>, precision: &Precision) -> Self {
        let message = summary(&result, precision);
        Self {
            headers: headers::<R>(),
            rows: rows(&result.records, precision),
            records: result.records,
            status: result.status,
            message,
        }
    }
}

/// Tolerance, iteration cap and decimals as typed into a form.
#[derive(Debug, Clone, Copy)]
pub struct FormSettings<'a> {
    pub tolerance: &'a str,
    pub max_iterations: &'a str,
    pub decimals: &'a str,
}

impl FormSettings<'_> {
    fn iteration_settings(&self) -> Result<IterationSettings> {
        let tolerance = read_real(self.tolerance, "tolerance")?;
        let max_iterations = read_iterations(self.max_iterations)?;
        Ok(IterationSettings::new(tolerance, max_iterations))
    }

    fn precision(&self) -> Precision {
        Precision::parse(self.decimals)
    }
}

fn read_real(text: &str, name: &str) -> Result<f64, SetupError> {
    parse_real(text).ok_or_else(|| SetupError::NonFiniteParameter {
        name: name.to_string(),
    })
}

fn read_iterations(text: &str) -> Result<usize, SetupError> {
    let count = parse_integer(text).ok_or_else(|| SetupError::NonFiniteParameter {
        name: "max_iterations".to_string(),
    })?;
    usize::try_from(count).map_err(|_| SetupError::ZeroIterations)
}

pub fn bisection_report(
    expression: &str,
    a: &str,
    b: &str,
    form: FormSettings<'_>,
) -> Result<MethodReport<BisectionRecord>> {
    let a = read_real(a, "a")?;
    let b = read_real(b, "b")?;
    let settings = form.iteration_settings()?;
    let result = run_bisection(expression, a, b, settings)?;
    debug!(iterations = result.iterations(), "bisection report ready");
    Ok(MethodReport::build(result, &form.precision()))
}

pub fn fixed_point_report(
    expression: &str,
    x0: &str,
    form: FormSettings<'_>,
) -> Result<MethodReport<FixedPointRecord>> {
    let x0 = read_real(x0, "x0")?;
    let settings = form.iteration_settings()?;
    let result = run_fixed_point(expression, x0, settings)?;
    debug!(iterations = result.iterations(), "fixed-point report ready");
    Ok(MethodReport::build(result, &form.precision()))
}

/// `g'(x0)` for the fixed-point form. An unreadable `x0` still yields the
/// derivative text, just without a value.
pub fn convergence_report(expression: &str, x0: &str) -> ConvergenceAnalysis {
    analyze_convergence(expression, parse_real(x0).unwrap_or(f64::NAN))
}

pub fn newton_report(
    expression: &str,
    derivative: &str,
    x0: &str,
    form: FormSettings<'_>,
) -> Result<MethodReport<NewtonRecord>> {
    let x0 = read_real(x0, "x0")?;
    let settings = form.iteration_settings()?;
    let precision = form.precision();
    let result = run_newton(expression, derivative, x0, settings, precision)?;
    debug!(iterations = result.iterations(), "newton report ready");
    Ok(MethodReport::build(result, &precision))
}

pub fn secant_report(
    expression: &str,
    x_prev: &str,
    x_curr: &str,
    form: FormSettings<'_>,
) -> Result<MethodReport<SecantRecord>> {
    let x_prev = read_real(x_prev, "x_prev")?;
    let x_curr = read_real(x_curr, "x_curr")?;
    let settings = form.iteration_settings()?;
    let result = run_secant(expression, x_prev, x_curr, settings)?;
    debug!(iterations = result.iterations(), "secant report ready");
    Ok(MethodReport::build(result, &form.precision()))
}
