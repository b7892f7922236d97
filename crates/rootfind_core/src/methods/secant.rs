use super::{
    check_settings, compile_role, evaluation_failure, finish, require_expression, require_finite,
    IterationFailure, IterationSettings, MethodResult, SetupError, Status,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecantRecord {
    pub n: usize,
    pub x_prev: f64,
    pub x_curr: f64,
    pub x_next: f64,
    pub error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecantProblem {
    pub expression: String,
    pub x_prev: f64,
    pub x_curr: f64,
    pub settings: IterationSettings,
}

impl Default for SecantProblem {
    fn default() -> Self {
        Self {
            expression: "3*ln(x-1)+2*cos(x-1)".to_string(),
            x_prev: 1.1,
            x_curr: 2.0,
            settings: IterationSettings::new(0.001, 23),
        }
    }
}

impl SecantProblem {
    pub fn solve(&self) -> Result<MethodResult<SecantRecord>, SetupError> {
        run_secant(&self.expression, self.x_prev, self.x_curr, self.settings)
    }
}

/// Secant method over the window `(x_prev, x_curr)`.
pub fn run_secant(
    expression: &str,
    x_prev: f64,
    x_curr: f64,
    settings: IterationSettings,
) -> Result<MethodResult<SecantRecord>, SetupError> {
    require_expression(expression, "f(x)")?;
    require_finite(&[
        ("x_prev", x_prev),
        ("x_curr", x_curr),
        ("tolerance", settings.tolerance),
    ])?;
    check_settings(&settings)?;
    let f = compile_role(expression, "f(x)")?;

    debug!(expression = f.source(), x_prev, x_curr, ?settings, "starting secant method");

    let mut x_prev = x_prev;
    let mut x_curr = x_curr;
    let mut records = Vec::new();

    for n in 1..=settings.max_iterations {
        let f_prev = match f.evaluate(x_prev) {
            Ok(value) => value,
            Err(reason) => {
                return Ok(finish("secant", records, evaluation_failure(n, "f(x)", x_prev, reason)));
            }
        };
        let f_curr = match f.evaluate(x_curr) {
            Ok(value) => value,
            Err(reason) => {
                return Ok(finish("secant", records, evaluation_failure(n, "f(x)", x_curr, reason)));
            }
        };

        let denom = f_curr - f_prev;
        if denom == 0.0 {
            let status = Status::Failed {
                reason: IterationFailure::ZeroDenominator {
                    iteration: n,
                    x_prev,
                    x_curr,
                },
            };
            return Ok(finish("secant", records, status));
        }

        let x_next = x_curr - f_curr * (x_curr - x_prev) / denom;
        let error = (x_next - x_curr).abs();
        records.push(SecantRecord {
            n,
            x_prev,
            x_curr,
            x_next,
            error,
        });
        trace!(n, x_prev, x_curr, x_next, error, "secant step");

        if error < settings.tolerance {
            return Ok(finish(
                "secant",
                records,
                Status::Converged { estimate: x_next },
            ));
        }
        x_prev = x_curr;
        x_curr = x_next;
    }

    Ok(finish("secant", records, Status::MaxIterationsReached))
}
