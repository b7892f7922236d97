use super::{
    check_settings, compile_role, evaluation_failure, finish, require_expression, require_finite,
    IterationSettings, MethodResult, SetupError, Status,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// One bisection step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BisectionRecord {
    pub n: usize,
    pub a: f64,
    pub b: f64,
    pub p: f64,
    pub fa: f64,
    pub fb: f64,
    pub fp: f64,
    pub fa_fp: f64,
    /// Half-width of the bracket, `(b - a) / 2`.
    pub error: f64,
}

/// Inputs for a bisection run. `Default` is the form's starting example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BisectionProblem {
    pub expression: String,
    pub a: f64,
    pub b: f64,
    pub settings: IterationSettings,
}

impl Default for BisectionProblem {
    fn default() -> Self {
        Self {
            expression: "3*log(x-1)+2*cos(x-1)".to_string(),
            a: 1.4,
            b: 2.0,
            settings: IterationSettings::new(0.02, 25),
        }
    }
}

impl BisectionProblem {
    pub fn solve(&self) -> Result<MethodResult<BisectionRecord>, SetupError> {
        run_bisection(&self.expression, self.a, self.b, self.settings)
    }
}

/// Bisection on `[a, b]`.
///
/// Requires a sign change (or a root at an endpoint) on the initial bracket.
/// Each step halves the bracket, keeping the half where `f(a) * f(p) < 0`
/// and otherwise moving `a` up to the midpoint. Stops when `f(p)` is exactly
/// zero or the half-width drops below the tolerance.
pub fn run_bisection(
    expression: &str,
    a: f64,
    b: f64,
    settings: IterationSettings,
) -> Result<MethodResult<BisectionRecord>, SetupError> {
    require_expression(expression, "f(x)")?;
    require_finite(&[("a", a), ("b", b), ("tolerance", settings.tolerance)])?;
    if a >= b {
        return Err(SetupError::InvalidInterval { a, b });
    }
    check_settings(&settings)?;
    let f = compile_role(expression, "f(x)")?;

    let fa = f
        .evaluate(a)
        .map_err(|_| SetupError::EndpointEvaluation {
            endpoint: "a".to_string(),
            at: a,
        })?;
    let fb = f
        .evaluate(b)
        .map_err(|_| SetupError::EndpointEvaluation {
            endpoint: "b".to_string(),
            at: b,
        })?;
    if fa * fb > 0.0 {
        return Err(SetupError::NoSignChange { fa, fb });
    }

    debug!(expression = f.source(), a, b, ?settings, "starting bisection");

    let mut a = a;
    let mut b = b;
    let mut records = Vec::new();

    for n in 1..=settings.max_iterations {
        let p = (a + b) / 2.0;
        let fp = f.evaluate(p);
        let fa = f.value(a);
        let fb = f.value(b);
        let fp_value = fp.as_ref().copied().unwrap_or(f64::NAN);
        let fa_fp = fa * fp_value;
        let error = (b - a) / 2.0;

        records.push(BisectionRecord {
            n,
            a,
            b,
            p,
            fa,
            fb,
            fp: fp_value,
            fa_fp,
            error,
        });
        trace!(n, a, b, p, fp = fp_value, error, "bisection step");

        if let Err(reason) = fp {
            return Ok(finish(
                "bisection",
                records,
                evaluation_failure(n, "f(p)", p, reason),
            ));
        }

        if fp_value.abs() == 0.0 || error < settings.tolerance {
            return Ok(finish(
                "bisection",
                records,
                Status::Converged { estimate: p },
            ));
        }

        if fa_fp < 0.0 {
            b = p;
        } else {
            a = p;
        }
    }

    Ok(finish("bisection", records, Status::MaxIterationsReached))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equation_engine::EvalError;
    use crate::methods::IterationFailure;

    fn settings(tolerance: f64, max_iterations: usize) -> IterationSettings {
        IterationSettings::new(tolerance, max_iterations)
    }

    #[test]
    fn converges_on_cubic() {
        let result = run_bisection("x^3 - x - 1", 1.0, 2.0, settings(0.001, 30)).expect("setup");
        let estimate = result.estimate().expect("should converge");
        assert!((estimate - 1.3247).abs() < 2e-3, "estimate {estimate}");
        let last = result.last().expect("records");
        assert!(last.error < 0.001);
        assert_eq!(last.p, estimate);
    }

    #[test]
    fn rejects_interval_without_sign_change() {
        let err = run_bisection("x^2+1", -1.0, 1.0, settings(0.001, 30)).unwrap_err();
        assert_eq!(err, SetupError::NoSignChange { fa: 2.0, fb: 2.0 });
    }

    #[test]
    fn validates_inputs_in_order() {
        let s = settings(0.001, 10);
        assert!(matches!(
            run_bisection("  ", 1.0, 2.0, s),
            Err(SetupError::EmptyExpression { .. })
        ));
        assert!(matches!(
            run_bisection("x", f64::NAN, 2.0, s),
            Err(SetupError::NonFiniteParameter { .. })
        ));
        assert!(matches!(
            run_bisection("x", 2.0, 2.0, s),
            Err(SetupError::InvalidInterval { .. })
        ));
        assert!(matches!(
            run_bisection("x", 1.0, 2.0, settings(0.0, 10)),
            Err(SetupError::NonPositiveTolerance { .. })
        ));
        assert!(matches!(
            run_bisection("x", 1.0, 2.0, settings(0.1, 0)),
            Err(SetupError::ZeroIterations)
        ));
        assert!(matches!(
            run_bisection("x +", 1.0, 2.0, s),
            Err(SetupError::Compile { .. })
        ));
        assert!(matches!(
            run_bisection("log(x)", -1.0, 2.0, s),
            Err(SetupError::EndpointEvaluation { .. })
        ));
    }

    #[test]
    fn error_is_half_width_and_halves_each_step() {
        let result = run_bisection("x^3 - x - 1", 1.0, 2.0, settings(1e-9, 12)).expect("setup");
        assert_eq!(result.status, Status::MaxIterationsReached);
        assert_eq!(result.records.len(), 12);
        for pair in result.records.windows(2) {
            assert_eq!(pair[1].error, pair[0].error / 2.0);
        }
        for record in &result.records {
            assert_eq!(record.error, (record.b - record.a) / 2.0);
        }
    }

    #[test]
    fn bracket_keeps_sign_change() {
        let f = crate::equation_engine::compile("x^3 - x - 1").expect("compile");
        let result = run_bisection("x^3 - x - 1", 1.0, 2.0, settings(1e-6, 40)).expect("setup");
        for record in &result.records {
            assert!(f.value(record.a) * f.value(record.b) <= 0.0);
        }
        assert!(result.records.len() <= 40);
        for (i, record) in result.records.iter().enumerate() {
            assert_eq!(record.n, i + 1);
        }
    }

    #[test]
    fn root_at_midpoint_stops_immediately() {
        let result = run_bisection("x", -1.0, 1.0, settings(1e-9, 10)).expect("setup");
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.status, Status::Converged { estimate: 0.0 });
    }

    #[test]
    fn zero_product_moves_bracket_right() {
        // f(a) = 0 passes the sign check, but a zero product is not negative,
        // so every step replaces `a` and the bracket walks towards `b`.
        let result = run_bisection("x - 1", 1.0, 3.0, settings(1e-3, 50)).expect("setup");
        assert_eq!(result.records[0].fa_fp, 0.0);
        assert_eq!(result.records[1].a, 2.0);
        let estimate = result.estimate().expect("should converge");
        assert!(estimate > 2.99, "estimate {estimate}");
    }

    #[test]
    fn failed_evaluation_keeps_partial_record() {
        // The pole at x = 0 sits on the first midpoint.
        let result = run_bisection("1/x", -1.0, 1.0, settings(1e-3, 10)).expect("setup");
        assert_eq!(result.records.len(), 1);
        assert!(result.records[0].fp.is_nan());
        assert_eq!(
            result.failure(),
            Some(&IterationFailure::Evaluation {
                iteration: 1,
                quantity: "f(p)".to_string(),
                at: 0.0,
                reason: EvalError::NonFinite(f64::INFINITY),
            })
        );
    }

    #[test]
    fn identical_inputs_give_identical_results() {
        let first = run_bisection("cos(x) - x", 0.0, 1.0, settings(1e-5, 40)).expect("setup");
        let second = run_bisection("cos(x) - x", 0.0, 1.0, settings(1e-5, 40)).expect("setup");
        assert_eq!(first, second);
    }

    #[test]
    fn default_problem_converges() {
        let result = BisectionProblem::default().solve().expect("setup");
        assert!(result.is_converged());
        assert!(result.last().expect("records").error < 0.02);
    }
}
