use super::{
    check_settings, compile_role, evaluation_failure, finish, require_expression, require_finite,
    IterationFailure, IterationSettings, MethodResult, SetupError, Status,
};
use crate::precision::Precision;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewtonRecord {
    pub n: usize,
    pub xn: f64,
    pub fxn: f64,
    pub dfxn: f64,
    pub x_next: f64,
    pub error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewtonProblem {
    pub expression: String,
    pub derivative: String,
    pub x0: f64,
    pub settings: IterationSettings,
    pub precision: Precision,
}

impl Default for NewtonProblem {
    fn default() -> Self {
        Self {
            expression: "1-cos(x)".to_string(),
            derivative: "sin(x)".to_string(),
            x0: 0.1,
            settings: IterationSettings::new(0.001, 15),
            precision: Precision::new(5),
        }
    }
}

impl NewtonProblem {
    pub fn solve(&self) -> Result<MethodResult<NewtonRecord>, SetupError> {
        run_newton(
            &self.expression,
            &self.derivative,
            self.x0,
            self.settings,
            self.precision,
        )
    }
}

/// Newton-Raphson with fixed-precision arithmetic.
///
/// `x0`, `f(xn)`, `f'(xn)`, `x_{n+1}` and the error are all rounded to
/// `precision` digits as they are produced, and the rounded `x_{n+1}` feeds
/// the next step. The zero-derivative check runs on the rounded value.
pub fn run_newton(
    expression: &str,
    derivative: &str,
    x0: f64,
    settings: IterationSettings,
    precision: Precision,
) -> Result<MethodResult<NewtonRecord>, SetupError> {
    require_expression(expression, "f(x)")?;
    require_expression(derivative, "f'(x)")?;
    require_finite(&[("x0", x0), ("tolerance", settings.tolerance)])?;
    check_settings(&settings)?;
    let x0 = precision.round(x0);
    let f = compile_role(expression, "f(x)")?;
    let df = compile_role(derivative, "f'(x)")?;

    debug!(
        expression = f.source(),
        derivative = df.source(),
        x0,
        decimals = precision.decimals(),
        ?settings,
        "starting Newton-Raphson"
    );

    let mut xn = x0;
    let mut records = Vec::new();

    for n in 1..=settings.max_iterations {
        let fx_raw = match f.evaluate(xn) {
            Ok(value) => value,
            Err(reason) => {
                return Ok(finish("newton", records, evaluation_failure(n, "f(x)", xn, reason)));
            }
        };
        let dfx_raw = match df.evaluate(xn) {
            Ok(value) => value,
            Err(reason) => {
                return Ok(finish("newton", records, evaluation_failure(n, "f'(x)", xn, reason)));
            }
        };

        let fxn = precision.round(fx_raw);
        let dfxn = precision.round(dfx_raw);
        if dfxn == 0.0 {
            let status = Status::Failed {
                reason: IterationFailure::ZeroDerivative { iteration: n, at: xn },
            };
            return Ok(finish("newton", records, status));
        }

        let x_next = precision.round(xn - fxn / dfxn);
        let error = precision.round((x_next - xn).abs());
        records.push(NewtonRecord {
            n,
            xn,
            fxn,
            dfxn,
            x_next,
            error,
        });
        trace!(n, xn, fxn, dfxn, x_next, error, "newton step");

        if error < settings.tolerance {
            return Ok(finish(
                "newton",
                records,
                Status::Converged { estimate: x_next },
            ));
        }
        xn = x_next;
    }

    Ok(finish("newton", records, Status::MaxIterationsReached))
}
