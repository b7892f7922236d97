//! Iterative root-finding methods and the types they share.
//!
//! Every method follows the same shape: validate inputs, compile the
//! expression(s), then run a loop bounded by `max_iterations` that appends one
//! record per step. Problems found before the loop starts are returned as
//! `Err(SetupError)`. Once iterating, the outcome is always a `MethodResult`
//! whose `status` says how the loop ended, and any records produced before a
//! failure are kept.

pub mod bisection;
pub mod fixed_point;
pub mod newton;
pub mod secant;

pub use bisection::{run_bisection, BisectionProblem, BisectionRecord};
pub use fixed_point::{run_fixed_point, FixedPointProblem, FixedPointRecord};
pub use newton::{run_newton, NewtonProblem, NewtonRecord};
pub use secant::{run_secant, SecantProblem, SecantRecord};

use crate::equation_engine::{try_compile, CompiledFn, EvalError, ParseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Stopping parameters shared by all methods.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationSettings {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl IterationSettings {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }
}

/// Problems detected before the first iteration. The loop never starts.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum SetupError {
    #[error("an expression for {role} is required")]
    EmptyExpression { role: String },
    #[error("{name} must be a finite number")]
    NonFiniteParameter { name: String },
    #[error("the interval requires a < b (got a = {a}, b = {b})")]
    InvalidInterval { a: f64, b: f64 },
    #[error("the tolerance must be positive (got {tolerance})")]
    NonPositiveTolerance { tolerance: f64 },
    #[error("the number of iterations must be greater than zero")]
    ZeroIterations,
    #[error("could not interpret {role}: {reason}")]
    Compile { role: String, reason: ParseError },
    #[error("could not evaluate f(x) at {endpoint} = {at}; check that the interval lies in the domain of the function")]
    EndpointEvaluation { endpoint: String, at: f64 },
    #[error("f(a) = {fa} and f(b) = {fb} have the same sign; bisection needs a sign change on [a, b]")]
    NoSignChange { fa: f64, fb: f64 },
}

/// Conditions that stop a running loop before convergence.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum IterationFailure {
    #[error("iteration {iteration}: could not evaluate {quantity} at x = {at} ({reason})")]
    Evaluation {
        iteration: usize,
        quantity: String,
        at: f64,
        reason: EvalError,
    },
    #[error("iteration {iteration}: f'(x) = 0 at x = {at}; Newton's method cannot continue (division by zero)")]
    ZeroDerivative { iteration: usize, at: f64 },
    #[error("iteration {iteration}: f(x_n) - f(x_n-1) = 0; the secant method cannot continue (division by zero)")]
    ZeroDenominator {
        iteration: usize,
        x_prev: f64,
        x_curr: f64,
    },
}

/// How an iteration loop ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    Converged { estimate: f64 },
    MaxIterationsReached,
    Failed { reason: IterationFailure },
}

/// Ordered iteration records plus the terminal status of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResult<R> {
    pub records: Vec<R>,
    pub status: Status,
}

impl<R> MethodResult<R> {
    pub fn is_converged(&self) -> bool {
        matches!(self.status, Status::Converged { .. })
    }

    pub fn estimate(&self) -> Option<f64> {
        match self.status {
            Status::Converged { estimate } => Some(estimate),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&IterationFailure> {
        match &self.status {
            Status::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn iterations(&self) -> usize {
        self.records.len()
    }

    pub fn last(&self) -> Option<&R> {
        self.records.last()
    }
}

pub(crate) fn require_expression(text: &str, role: &str) -> Result<(), SetupError> {
    if text.trim().is_empty() {
        return Err(SetupError::EmptyExpression {
            role: role.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn require_finite(params: &[(&str, f64)]) -> Result<(), SetupError> {
    for &(name, value) in params {
        if !value.is_finite() {
            return Err(SetupError::NonFiniteParameter {
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

pub(crate) fn check_settings(settings: &IterationSettings) -> Result<(), SetupError> {
    require_finite(&[("tolerance", settings.tolerance)])?;
    if settings.tolerance <= 0.0 {
        return Err(SetupError::NonPositiveTolerance {
            tolerance: settings.tolerance,
        });
    }
    if settings.max_iterations == 0 {
        return Err(SetupError::ZeroIterations);
    }
    Ok(())
}

pub(crate) fn compile_role(text: &str, role: &str) -> Result<CompiledFn, SetupError> {
    try_compile(text).map_err(|reason| SetupError::Compile {
        role: role.to_string(),
        reason,
    })
}

pub(crate) fn evaluation_failure(
    iteration: usize,
    quantity: &str,
    at: f64,
    reason: EvalError,
) -> Status {
    Status::Failed {
        reason: IterationFailure::Evaluation {
            iteration,
            quantity: quantity.to_string(),
            at,
            reason,
        },
    }
}

pub(crate) fn finish<R>(method: &str, records: Vec<R>, status: Status) -> MethodResult<R> {
    debug!(method, iterations = records.len(), ?status, "iteration loop finished");
    MethodResult { records, status }
}
