pub mod methods;
pub mod report;

pub use methods::{analyze_convergence, run_bisection, run_fixed_point, run_newton, run_secant};
pub use report::MethodReport;
