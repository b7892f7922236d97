//! Local convergence heuristic for fixed-point iteration.
//!
//! `x = g(x)` converges near a fixed point when `|g'(x)| < 1` there. The
//! analysis differentiates `g` symbolically and checks the derivative at the
//! initial guess. It is advisory and never changes how an iteration runs.

use crate::equation_engine::{try_compile, CompiledFn, VARIABLE};
use crate::symbolic::derivative;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    LikelyConvergent,
    LikelyDivergent,
    Unavailable,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Verdict::LikelyConvergent => "|g'(x0)| < 1: the iteration is likely to converge",
            Verdict::LikelyDivergent => {
                "|g'(x0)| >= 1: the iteration is likely to diverge; consider a different g(x) or x0"
            }
            Verdict::Unavailable => "g'(x0) is unavailable",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceAnalysis {
    /// `g'(x)` as text, or `None` when `g` could not be differentiated.
    pub derivative: Option<String>,
    pub value_at_x0: Option<f64>,
    pub verdict: Verdict,
}

impl ConvergenceAnalysis {
    fn unavailable() -> Self {
        Self {
            derivative: None,
            value_at_x0: None,
            verdict: Verdict::Unavailable,
        }
    }
}

/// Differentiates `g` and evaluates `g'(x0)`.
pub fn analyze_convergence(g: &str, x0: f64) -> ConvergenceAnalysis {
    let Ok(compiled) = try_compile(g) else {
        return ConvergenceAnalysis::unavailable();
    };
    let dg = match derivative(compiled.expr(), VARIABLE) {
        Ok(dg) => dg,
        Err(err) => {
            debug!(expression = compiled.source(), %err, "no derivative for g(x)");
            return ConvergenceAnalysis::unavailable();
        }
    };

    let text = dg.to_string();
    let value_at_x0 = if x0.is_finite() {
        CompiledFn::from_expr(dg).evaluate(x0).ok()
    } else {
        None
    };
    let verdict = match value_at_x0 {
        Some(value) if value.abs() < 1.0 => Verdict::LikelyConvergent,
        Some(_) => Verdict::LikelyDivergent,
        None => Verdict::Unavailable,
    };

    ConvergenceAnalysis {
        derivative: Some(text),
        value_at_x0,
        verdict,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_is_locally_contracting_at_half() {
        let analysis = analyze_convergence("cos(x)", 0.5);
        assert_eq!(analysis.derivative.as_deref(), Some("-sin(x)"));
        let value = analysis.value_at_x0.expect("value");
        assert!((value.abs() - 0.479).abs() < 1e-3, "value {value}");
        assert_eq!(analysis.verdict, Verdict::LikelyConvergent);
    }

    #[test]
    fn steep_map_is_flagged_divergent() {
        let analysis = analyze_convergence("x^2", 3.0);
        assert_eq!(analysis.derivative.as_deref(), Some("2 * x"));
        assert_eq!(analysis.value_at_x0, Some(6.0));
        assert_eq!(analysis.verdict, Verdict::LikelyDivergent);
    }

    #[test]
    fn unparsable_or_empty_input_is_unavailable() {
        for g in ["", "   ", "cos(", "foo(x)"] {
            let analysis = analyze_convergence(g, 0.5);
            assert_eq!(analysis.derivative, None, "input {g:?}");
            assert_eq!(analysis.verdict, Verdict::Unavailable);
        }
    }

    #[test]
    fn derivative_outside_domain_has_no_value() {
        let analysis = analyze_convergence("sqrt(x)", -1.0);
        assert_eq!(analysis.derivative.as_deref(), Some("1 / (2 * sqrt(x))"));
        assert_eq!(analysis.value_at_x0, None);
        assert_eq!(analysis.verdict, Verdict::Unavailable);

        let analysis = analyze_convergence("sin(x)", f64::NAN);
        assert_eq!(analysis.derivative.as_deref(), Some("cos(x)"));
        assert_eq!(analysis.value_at_x0, None);
    }

    #[test]
    fn aliases_are_normalized_before_differentiation() {
        let analysis = analyze_convergence("sen(x)", 0.0);
        assert_eq!(analysis.derivative.as_deref(), Some("cos(x)"));
        assert_eq!(analysis.value_at_x0, Some(1.0));
        assert_eq!(analysis.verdict, Verdict::LikelyDivergent);
    }
}
