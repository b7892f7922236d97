//! `wasm_bindgen` entry points, one per form.
//!
//! Each takes the form fields as text and returns the serialized
//! `MethodReport`, or the setup error message as a string.

use crate::report::{
    bisection_report, convergence_report, fixed_point_report, newton_report, secant_report,
    FormSettings,
};
use serde::Serialize;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

fn respond<T: Serialize>(report: anyhow::Result<T>) -> Result<JsValue, JsValue> {
    let report = report.map_err(|e| JsValue::from_str(&format!("{e:#}")))?;
    to_value(&report).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[wasm_bindgen]
pub fn run_bisection(
    expression: &str,
    a: &str,
    b: &str,
    tolerance: &str,
    max_iterations: &str,
    decimals: &str,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let form = FormSettings {
        tolerance,
        max_iterations,
        decimals,
    };
    respond(bisection_report(expression, a, b, form))
}

#[wasm_bindgen]
pub fn run_fixed_point(
    expression: &str,
    x0: &str,
    tolerance: &str,
    max_iterations: &str,
    decimals: &str,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let form = FormSettings {
        tolerance,
        max_iterations,
        decimals,
    };
    respond(fixed_point_report(expression, x0, form))
}

/// Derivative of `g` and its value at `x0`; never fails on bad input.
#[wasm_bindgen]
pub fn analyze_convergence(expression: &str, x0: &str) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    respond(Ok(convergence_report(expression, x0)))
}

#[wasm_bindgen]
pub fn run_newton(
    expression: &str,
    derivative: &str,
    x0: &str,
    tolerance: &str,
    max_iterations: &str,
    decimals: &str,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let form = FormSettings {
        tolerance,
        max_iterations,
        decimals,
    };
    respond(newton_report(expression, derivative, x0, form))
}

#[wasm_bindgen]
pub fn run_secant(
    expression: &str,
    x_prev: &str,
    x_curr: &str,
    tolerance: &str,
    max_iterations: &str,
    decimals: &str,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let form = FormSettings {
        tolerance,
        max_iterations,
        decimals,
    };
    respond(secant_report(expression, x_prev, x_curr, form))
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::{analyze_convergence, run_bisection, run_newton, run_secant};
    use wasm_bindgen_test::wasm_bindgen_test;

    fn error_text(result: Result<wasm_bindgen::JsValue, wasm_bindgen::JsValue>) -> String {
        result
            .err()
            .and_then(|err| err.as_string())
            .unwrap_or_default()
    }

    #[wasm_bindgen_test]
    fn bisection_rejects_reversed_interval() {
        let message = error_text(run_bisection("x", "2", "1", "0.1", "10", "4"));
        assert!(message.contains("a < b"));
    }

    #[wasm_bindgen_test]
    fn newton_reports_missing_derivative() {
        let message = error_text(run_newton("x^2", "", "1", "0.001", "10", "5"));
        assert!(message.contains("f'(x)"));
    }

    #[wasm_bindgen_test]
    fn secant_failure_still_serializes() {
        let value = run_secant("x^2 - 4", "-1", "1", "1e-6", "10", "6").expect("report");
        assert!(value.is_object());
    }

    #[wasm_bindgen_test]
    fn analysis_serializes_for_any_input() {
        assert!(analyze_convergence("", "").expect("analysis").is_object());
    }
}
