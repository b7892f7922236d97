//! Symbolic differentiation and simplification over the `Expr` tree.

use crate::equation_engine::{BinaryOp, Expr, Function};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum DerivativeError {
    #[error("no differentiation rule for function '{0}'")]
    UnsupportedFunction(String),
    #[error("cannot differentiate '{name}' with respect to an argument that depends on the variable")]
    VariableParameter { name: String },
}

fn num(value: f64) -> Expr {
    Expr::Number(value)
}

fn add(a: Expr, b: Expr) -> Expr {
    Expr::binary(a, BinaryOp::Add, b)
}

fn sub(a: Expr, b: Expr) -> Expr {
    Expr::binary(a, BinaryOp::Sub, b)
}

fn mul(a: Expr, b: Expr) -> Expr {
    Expr::binary(a, BinaryOp::Mul, b)
}

fn div(a: Expr, b: Expr) -> Expr {
    Expr::binary(a, BinaryOp::Div, b)
}

fn pow(a: Expr, b: Expr) -> Expr {
    Expr::binary(a, BinaryOp::Pow, b)
}

fn neg(a: Expr) -> Expr {
    Expr::Neg(Box::new(a))
}

fn call(name: &str, arg: Expr) -> Expr {
    Expr::call(name, vec![arg])
}

/// Differentiates `expr` with respect to `var`, then simplifies the result.
pub fn derivative(expr: &Expr, var: &str) -> Result<Expr, DerivativeError> {
    Ok(simplify(&differentiate(expr, var)?))
}

/// Raw derivative of `expr` with respect to `var`. Symbols other than `var`
/// are treated as constants.
pub fn differentiate(expr: &Expr, var: &str) -> Result<Expr, DerivativeError> {
    match expr {
        Expr::Number(_) => Ok(num(0.0)),
        Expr::Variable(name) => Ok(num(if name == var { 1.0 } else { 0.0 })),
        Expr::Neg(inner) => Ok(neg(differentiate(inner, var)?)),
        Expr::Binary(u, op, v) => {
            let u = u.as_ref();
            let v = v.as_ref();
            match op {
                BinaryOp::Add => Ok(add(differentiate(u, var)?, differentiate(v, var)?)),
                BinaryOp::Sub => Ok(sub(differentiate(u, var)?, differentiate(v, var)?)),
                // (u v)' = u' v + u v'
                BinaryOp::Mul => Ok(add(
                    mul(differentiate(u, var)?, v.clone()),
                    mul(u.clone(), differentiate(v, var)?),
                )),
                BinaryOp::Div => {
                    let du = differentiate(u, var)?;
                    if !v.depends_on(var) {
                        return Ok(div(du, v.clone()));
                    }
                    // (u / v)' = (u' v - u v') / v^2
                    let dv = differentiate(v, var)?;
                    Ok(div(
                        sub(mul(du, v.clone()), mul(u.clone(), dv)),
                        pow(v.clone(), num(2.0)),
                    ))
                }
                BinaryOp::Pow => differentiate_power(u, v, var),
            }
        }
        Expr::Call(name, args) => differentiate_call(name, args, var),
    }
}

fn differentiate_power(base: &Expr, exponent: &Expr, var: &str) -> Result<Expr, DerivativeError> {
    let base_varies = base.depends_on(var);
    let exponent_varies = exponent.depends_on(var);
    match (base_varies, exponent_varies) {
        (false, false) => Ok(num(0.0)),
        // (u^n)' = n u^(n-1) u'
        (true, false) => Ok(mul(
            mul(
                exponent.clone(),
                pow(base.clone(), sub(exponent.clone(), num(1.0))),
            ),
            differentiate(base, var)?,
        )),
        // (a^v)' = a^v log(a) v'
        (false, true) => Ok(mul(
            mul(pow(base.clone(), exponent.clone()), call("log", base.clone())),
            differentiate(exponent, var)?,
        )),
        // (u^v)' = u^v (v' log(u) + v u' / u)
        (true, true) => {
            let du = differentiate(base, var)?;
            let dv = differentiate(exponent, var)?;
            Ok(mul(
                pow(base.clone(), exponent.clone()),
                add(
                    mul(dv, call("log", base.clone())),
                    div(mul(exponent.clone(), du), base.clone()),
                ),
            ))
        }
    }
}

fn differentiate_call(name: &str, args: &[Expr], var: &str) -> Result<Expr, DerivativeError> {
    let func = Function::lookup(name, args.len())
        .map_err(|_| DerivativeError::UnsupportedFunction(name.to_string()))?;

    if func.arity() == 2 {
        let (a, b) = (&args[0], &args[1]);
        return match func {
            Function::Pow => differentiate_power(a, b, var),
            Function::LogBase => {
                differentiate(&div(call("log", a.clone()), call("log", b.clone())), var)
            }
            Function::NthRoot => {
                if b.depends_on(var) {
                    return Err(DerivativeError::VariableParameter {
                        name: name.to_string(),
                    });
                }
                // nthRoot(u, n)' = nthRoot(u, n) / (n u) u'
                let root = Expr::call("nthRoot", vec![a.clone(), b.clone()]);
                Ok(mul(
                    div(root, mul(b.clone(), a.clone())),
                    differentiate(a, var)?,
                ))
            }
            _ => Err(DerivativeError::UnsupportedFunction(name.to_string())),
        };
    }

    let u = &args[0];
    let du = differentiate(u, var)?;
    let outer = match func {
        Function::Sin => call("cos", u.clone()),
        Function::Cos => neg(call("sin", u.clone())),
        Function::Tan => pow(call("sec", u.clone()), num(2.0)),
        Function::Sec => mul(call("sec", u.clone()), call("tan", u.clone())),
        Function::Csc => neg(mul(call("csc", u.clone()), call("cot", u.clone()))),
        Function::Cot => neg(pow(call("csc", u.clone()), num(2.0))),
        Function::Asin => div(
            num(1.0),
            call("sqrt", sub(num(1.0), pow(u.clone(), num(2.0)))),
        ),
        Function::Acos => neg(div(
            num(1.0),
            call("sqrt", sub(num(1.0), pow(u.clone(), num(2.0)))),
        )),
        Function::Atan => div(num(1.0), add(num(1.0), pow(u.clone(), num(2.0)))),
        Function::Sinh => call("cosh", u.clone()),
        Function::Cosh => call("sinh", u.clone()),
        Function::Tanh => div(num(1.0), pow(call("cosh", u.clone()), num(2.0))),
        Function::Exp => call("exp", u.clone()),
        Function::Log => div(num(1.0), u.clone()),
        Function::Log10 => div(num(1.0), mul(u.clone(), call("log", num(10.0)))),
        Function::Log2 => div(num(1.0), mul(u.clone(), call("log", num(2.0)))),
        Function::Sqrt => div(num(1.0), mul(num(2.0), call("sqrt", u.clone()))),
        Function::Cbrt => div(
            num(1.0),
            mul(num(3.0), pow(call("cbrt", u.clone()), num(2.0))),
        ),
        Function::Abs => div(call("abs", u.clone()), u.clone()),
        Function::LogBase | Function::Pow | Function::NthRoot => {
            return Err(DerivativeError::UnsupportedFunction(name.to_string()))
        }
    };
    // Chain rule
    Ok(mul(outer, du))
}

fn is_num(expr: &Expr, value: f64) -> bool {
    matches!(expr, Expr::Number(n) if *n == value)
}

/// Folds constants and removes additive/multiplicative identities.
pub fn simplify(expr: &Expr) -> Expr {
    match expr {
        Expr::Number(_) | Expr::Variable(_) => expr.clone(),
        Expr::Neg(inner) => match simplify(inner) {
            Expr::Number(n) => num(-n),
            Expr::Neg(x) => *x,
            other => neg(other),
        },
        Expr::Call(name, args) => Expr::Call(name.clone(), args.iter().map(simplify).collect()),
        Expr::Binary(a, op, b) => {
            let sa = simplify(a);
            let sb = simplify(b);
            match op {
                BinaryOp::Add => match (sa, sb) {
                    (Expr::Number(x), Expr::Number(y)) => num(x + y),
                    (l, r) if is_num(&l, 0.0) => r,
                    (l, r) if is_num(&r, 0.0) => l,
                    (l, Expr::Neg(r)) => sub(l, *r),
                    (l, Expr::Number(y)) if y < 0.0 => sub(l, num(-y)),
                    (l, r) => add(l, r),
                },
                BinaryOp::Sub => match (sa, sb) {
                    (Expr::Number(x), Expr::Number(y)) => num(x - y),
                    (l, r) if is_num(&r, 0.0) => l,
                    (l, r) if is_num(&l, 0.0) => simplify(&neg(r)),
                    (l, Expr::Neg(r)) => add(l, *r),
                    (l, r) => sub(l, r),
                },
                BinaryOp::Mul => match (sa, sb) {
                    (Expr::Number(x), Expr::Number(y)) => num(x * y),
                    (l, r) if is_num(&l, 0.0) || is_num(&r, 0.0) => num(0.0),
                    (l, r) if is_num(&l, 1.0) => r,
                    (l, r) if is_num(&r, 1.0) => l,
                    (l, r) if is_num(&l, -1.0) => simplify(&neg(r)),
                    (l, r) if is_num(&r, -1.0) => simplify(&neg(l)),
                    (Expr::Neg(l), Expr::Neg(r)) => mul(*l, *r),
                    (Expr::Neg(l), r) => neg(mul(*l, r)),
                    (l, Expr::Neg(r)) => neg(mul(l, *r)),
                    // Keep numeric coefficients in front: `x * 3` → `3 * x`.
                    (l, r @ Expr::Number(_)) => mul(r, l),
                    (l, r) => mul(l, r),
                },
                BinaryOp::Div => match (sa, sb) {
                    (Expr::Number(x), Expr::Number(y)) if y != 0.0 => num(x / y),
                    (l, r) if is_num(&l, 0.0) && !is_num(&r, 0.0) => num(0.0),
                    (l, r) if is_num(&r, 1.0) => l,
                    (Expr::Neg(l), r) => neg(div(*l, r)),
                    (l, r) => div(l, r),
                },
                BinaryOp::Pow => match (sa, sb) {
                    (Expr::Number(x), Expr::Number(y)) => num(x.powf(y)),
                    (_, r) if is_num(&r, 0.0) => num(1.0),
                    (l, r) if is_num(&r, 1.0) => l,
                    (l, _) if is_num(&l, 1.0) => num(1.0),
                    (l, r) => pow(l, r),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equation_engine::{parse, CompiledFn, VARIABLE};

    fn derivative_text(input: &str) -> String {
        let expr = parse(input).expect("parse");
        derivative(&expr, VARIABLE).expect("derivative").to_string()
    }

    fn check_numerically(input: &str, points: &[f64]) {
        let expr = parse(input).expect("parse");
        let f = CompiledFn::from_expr(expr.clone());
        let df = CompiledFn::from_expr(derivative(&expr, VARIABLE).expect("derivative"));
        let h = 1e-6;
        for &x in points {
            let numeric = (f.value(x + h) - f.value(x - h)) / (2.0 * h);
            let symbolic = df.value(x);
            assert!(
                (numeric - symbolic).abs() < 1e-5 * (1.0 + symbolic.abs()),
                "{input} at {x}: numeric {numeric}, symbolic {symbolic}"
            );
        }
    }

    #[test]
    fn derivative_of_cos_is_negative_sin() {
        assert_eq!(derivative_text("cos(x)"), "-sin(x)");
    }

    #[test]
    fn derivative_of_cubic_polynomial() {
        assert_eq!(derivative_text("x^3 - x - 1"), "3 * x ^ 2 - 1");
    }

    #[test]
    fn derivative_of_quotient_by_constant() {
        assert_eq!(
            derivative_text("(sin(x) + 2*cos(x))/2"),
            "(cos(x) - 2 * sin(x)) / 2"
        );
    }

    #[test]
    fn other_symbols_are_constants() {
        assert_eq!(derivative_text("a*x + b"), "a");
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let cases = [
            ("x^3 - x - 1", vec![-1.5, 0.3, 2.0]),
            ("3*log(x-1)+2*cos(x-1)", vec![1.5, 1.8, 2.4]),
            ("exp(-x) * sin(2*x)", vec![-0.5, 0.7, 1.9]),
            ("x^x", vec![0.5, 1.2, 2.5]),
            ("2^x", vec![-1.0, 0.0, 3.0]),
            ("tan(x) + atan(x)", vec![-0.4, 0.2, 1.1]),
            ("sqrt(x) / (1 + x^2)", vec![0.3, 1.0, 4.0]),
            ("log(x, 2) + log10(x) + cbrt(x)", vec![0.5, 2.0, 7.0]),
            ("abs(x - 1) + asin(x / 4) + cosh(x)", vec![-0.6, 0.4, 2.0]),
            ("nthRoot(x, 3) + pow(x, 2)", vec![0.5, 2.0]),
        ];
        for (input, points) in cases {
            check_numerically(input, &points);
        }
    }

    #[test]
    fn unknown_function_has_no_derivative() {
        let expr = parse("foo(x) + x").expect("parse");
        assert_eq!(
            derivative(&expr, VARIABLE),
            Err(DerivativeError::UnsupportedFunction("foo".to_string()))
        );
    }

    #[test]
    fn simplify_folds_constants() {
        let expr = parse("0*x + 1*(2+3) - 0").expect("parse");
        assert_eq!(simplify(&expr), Expr::Number(5.0));
    }
}
