use super::{
    check_settings, compile_role, evaluation_failure, finish, require_expression, require_finite,
    IterationSettings, MethodResult, SetupError, Status,
};
use crate::convergence::{analyze_convergence, ConvergenceAnalysis};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedPointRecord {
    pub n: usize,
    pub xn: f64,
    pub gxn: f64,
    /// `|g(xn) - xn|`
    pub error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedPointProblem {
    pub expression: String,
    pub x0: f64,
    pub settings: IterationSettings,
}

impl Default for FixedPointProblem {
    fn default() -> Self {
        Self {
            expression: "(sin(x)+2*cos(x))/2".to_string(),
            x0: 0.6,
            settings: IterationSettings::new(0.003, 10),
        }
    }
}

impl FixedPointProblem {
    pub fn solve(&self) -> Result<MethodResult<FixedPointRecord>, SetupError> {
        run_fixed_point(&self.expression, self.x0, self.settings)
    }

    pub fn diagnostics(&self) -> ConvergenceAnalysis {
        analyze_convergence(&self.expression, self.x0)
    }
}

/// Fixed-point iteration `x_{n+1} = g(x_n)`.
pub fn run_fixed_point(
    expression: &str,
    x0: f64,
    settings: IterationSettings,
) -> Result<MethodResult<FixedPointRecord>, SetupError> {
    require_expression(expression, "g(x)")?;
    require_finite(&[("x0", x0), ("tolerance", settings.tolerance)])?;
    check_settings(&settings)?;
    let g = compile_role(expression, "g(x)")?;

    debug!(expression = g.source(), x0, ?settings, "starting fixed-point iteration");

    let mut xn = x0;
    let mut records = Vec::new();

    for n in 1..=settings.max_iterations {
        let gxn = match g.evaluate(xn) {
            Ok(value) => value,
            Err(reason) => {
                return Ok(finish(
                    "fixed_point",
                    records,
                    evaluation_failure(n, "g(x)", xn, reason),
                ));
            }
        };
        let error = (gxn - xn).abs();
        records.push(FixedPointRecord { n, xn, gxn, error });
        trace!(n, xn, gxn, error, "fixed-point step");

        if error < settings.tolerance {
            return Ok(finish(
                "fixed_point",
                records,
                Status::Converged { estimate: gxn },
            ));
        }
        xn = gxn;
    }

    Ok(finish("fixed_point", records, Status::MaxIterationsReached))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::IterationFailure;

    #[test]
    fn converges_to_dottie_number() {
        let result =
            run_fixed_point("cos(x)", 0.5, IterationSettings::new(1e-4, 50)).expect("setup");
        let estimate = result.estimate().expect("should converge");
        assert!((estimate - 0.7391).abs() < 1e-3, "estimate {estimate}");
        assert!(result.last().expect("records").error < 1e-4);
        assert!(result.records.len() <= 50);
    }

    #[test]
    fn each_step_feeds_the_next() {
        let result =
            run_fixed_point("cos(x)", 0.5, IterationSettings::new(1e-4, 50)).expect("setup");
        assert_eq!(result.records[0].xn, 0.5);
        for pair in result.records.windows(2) {
            assert_eq!(pair[1].xn, pair[0].gxn);
        }
    }

    #[test]
    fn repeated_runs_are_identical() {
        let problem = FixedPointProblem::default();
        assert_eq!(problem.solve(), problem.solve());
    }

    #[test]
    fn divergent_map_hits_iteration_limit() {
        let result = run_fixed_point("2*x + 1", 1.0, IterationSettings::new(1e-6, 8)).expect("setup");
        assert_eq!(result.status, Status::MaxIterationsReached);
        assert_eq!(result.records.len(), 8);
    }

    #[test]
    fn evaluation_failure_stops_without_record() {
        // sqrt(x) - 1 leaves the domain on the second step.
        let result =
            run_fixed_point("sqrt(x) - 1", 0.25, IterationSettings::new(1e-6, 10)).expect("setup");
        assert_eq!(result.records.len(), 1);
        assert!(matches!(
            result.failure(),
            Some(IterationFailure::Evaluation { iteration: 2, .. })
        ));
    }

    #[test]
    fn validates_inputs() {
        let s = IterationSettings::new(1e-3, 10);
        assert!(matches!(
            run_fixed_point("", 0.5, s),
            Err(SetupError::EmptyExpression { .. })
        ));
        assert!(matches!(
            run_fixed_point("cos(x)", f64::INFINITY, s),
            Err(SetupError::NonFiniteParameter { .. })
        ));
        assert!(matches!(
            run_fixed_point("cos(x)", 0.5, IterationSettings::new(-1.0, 10)),
            Err(SetupError::NonPositiveTolerance { .. })
        ));
        assert!(matches!(
            run_fixed_point("cos(", 0.5, s),
            Err(SetupError::Compile { .. })
        ));
    }

    #[test]
    fn default_problem_converges_with_diagnostics() {
        let problem = FixedPointProblem::default();
        let result = problem.solve().expect("setup");
        assert!(result.is_converged());
        let analysis = problem.diagnostics();
        assert!(analysis.value_at_x0.expect("value").abs() < 1.0);
    }
}
