pub mod convergence;
pub mod equation_engine;
pub mod input;
pub mod methods;
pub mod precision;
/// The `rootfind_core` crate implements the numerical side of the root-finding forms.
///
/// Key components:
/// - **Equation Engine**: parser and bytecode VM for user-typed functions of `x`.
/// - **Methods**: bisection, fixed-point, Newton-Raphson and secant loops that record every step.
/// - **Symbolic**: derivative of a parsed expression, used by the fixed-point convergence check.
/// - **Precision**: decimal formatting and the rounding Newton's method applies mid-loop.
/// - **Table**: row/summary rendering of iteration records.
pub mod symbolic;
pub mod table;

pub use methods::{IterationFailure, IterationSettings, MethodResult, SetupError, Status};
pub use precision::Precision;
