use serde::{Deserialize, Serialize};
use std::f64::consts;
use std::fmt;
use thiserror::Error;

/// Name of the single free variable every expression is compiled over.
pub const VARIABLE: &str = "x";

/// Errors raised while turning user text into an `Expr`.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ParseError {
    #[error("expression is empty")]
    Empty,
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    #[error("unexpected token {0}")]
    UnexpectedToken(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expected ')'")]
    ExpectedClosingParen,
}

/// Errors raised while evaluating compiled bytecode.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum EvalError {
    #[error("undefined symbol '{0}'")]
    UndefinedSymbol(String),
    #[error("undefined function '{0}'")]
    UndefinedFunction(String),
    #[error("function '{name}' expects {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("result is not a finite number ({0})")]
    NonFinite(f64),
    #[error("malformed bytecode")]
    Malformed,
}

/// Built-in functions understood by the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Sec,
    Csc,
    Cot,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Log,
    LogBase,
    Log10,
    Log2,
    Sqrt,
    Cbrt,
    Abs,
    Pow,
    NthRoot,
}

impl Function {
    /// Resolves a call by name and argument count.
    /// `log` is overloaded: one argument is the natural log, two take an explicit base.
    pub fn lookup(name: &str, arity: usize) -> Result<Self, EvalError> {
        let func = match (name, arity) {
            ("log", 2) => return Ok(Function::LogBase),
            ("sin", _) => Function::Sin,
            ("cos", _) => Function::Cos,
            ("tan", _) => Function::Tan,
            ("sec", _) => Function::Sec,
            ("csc", _) => Function::Csc,
            ("cot", _) => Function::Cot,
            ("asin", _) => Function::Asin,
            ("acos", _) => Function::Acos,
            ("atan", _) => Function::Atan,
            ("sinh", _) => Function::Sinh,
            ("cosh", _) => Function::Cosh,
            ("tanh", _) => Function::Tanh,
            ("exp", _) => Function::Exp,
            ("log", _) => Function::Log,
            ("log10", _) => Function::Log10,
            ("log2", _) => Function::Log2,
            ("sqrt", _) => Function::Sqrt,
            ("cbrt", _) => Function::Cbrt,
            ("abs", _) => Function::Abs,
            ("pow", _) => Function::Pow,
            ("nthRoot", _) => Function::NthRoot,
            _ => return Err(EvalError::UndefinedFunction(name.to_string())),
        };
        if func.arity() != arity {
            return Err(EvalError::Arity {
                name: name.to_string(),
                expected: func.arity(),
                found: arity,
            });
        }
        Ok(func)
    }

    pub fn arity(self) -> usize {
        match self {
            Function::LogBase | Function::Pow | Function::NthRoot => 2,
            _ => 1,
        }
    }

    fn apply_unary(self, a: f64) -> f64 {
        match self {
            Function::Sin => a.sin(),
            Function::Cos => a.cos(),
            Function::Tan => a.tan(),
            Function::Sec => 1.0 / a.cos(),
            Function::Csc => 1.0 / a.sin(),
            Function::Cot => 1.0 / a.tan(),
            Function::Asin => a.asin(),
            Function::Acos => a.acos(),
            Function::Atan => a.atan(),
            Function::Sinh => a.sinh(),
            Function::Cosh => a.cosh(),
            Function::Tanh => a.tanh(),
            Function::Exp => a.exp(),
            Function::Log => a.ln(),
            Function::Log10 => a.log10(),
            Function::Log2 => a.log2(),
            Function::Sqrt => a.sqrt(),
            Function::Cbrt => a.cbrt(),
            Function::Abs => a.abs(),
            Function::LogBase | Function::Pow | Function::NthRoot => f64::NAN,
        }
    }

    fn apply_binary(self, a: f64, b: f64) -> f64 {
        match self {
            Function::LogBase => a.ln() / b.ln(),
            Function::Pow => a.powf(b),
            Function::NthRoot => nth_root(a, b),
            _ => f64::NAN,
        }
    }
}

/// Real n-th root. Negative radicands only have a real root for odd integer `n`.
fn nth_root(a: f64, n: f64) -> f64 {
    if n == 0.0 {
        return f64::NAN;
    }
    if a >= 0.0 {
        return a.powf(1.0 / n);
    }
    let is_odd_integer = n.fract() == 0.0 && (n as i64) % 2 != 0;
    if is_odd_integer {
        -(-a).powf(1.0 / n)
    } else {
        f64::NAN
    }
}

fn named_constant(name: &str) -> Option<f64> {
    match name {
        "pi" | "PI" => Some(consts::PI),
        "e" | "E" => Some(consts::E),
        "tau" => Some(consts::TAU),
        "phi" => Some(1.618_033_988_749_895),
        _ => None,
    }
}

/// OpCodes for the stack-based virtual machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant onto the stack.
    LoadConst(f64),
    /// Pushes the value of the free variable.
    LoadVar,
    /// Aborts evaluation with `Bytecode::failures[idx]`.
    Fail(usize),
    /// Pops (b, a), pushes a + b.
    Add,
    /// Pops (b, a), pushes a - b.
    Sub,
    /// Pops (b, a), pushes a * b.
    Mul,
    /// Pops (b, a), pushes a / b.
    Div,
    /// Pops (b, a), pushes a ^ b.
    Pow,
    /// Pops a, pushes -a.
    Neg,
    /// Pops `func.arity()` arguments, pushes the call result.
    Call(Function),
}

/// A compiled sequence of operations.
///
/// Symbols that could not be resolved at compile time are kept in `failures`
/// and reported when the bytecode runs, so an expression such as `x + y`
/// compiles but never evaluates.
#[derive(Debug, Clone, Default)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
    pub failures: Vec<EvalError>,
}

impl Bytecode {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Stack-based virtual machine.
///
/// The VM is stateless; `execute` receives the bytecode, the value of the free
/// variable and a scratch stack.
#[derive(Debug)]
pub struct VM;

impl VM {
    pub fn execute(bytecode: &Bytecode, x: f64, stack: &mut Vec<f64>) -> Result<f64, EvalError> {
        stack.clear();

        for op in &bytecode.ops {
            match *op {
                OpCode::LoadConst(val) => stack.push(val),
                OpCode::LoadVar => stack.push(x),
                OpCode::Fail(idx) => {
                    return Err(bytecode
                        .failures
                        .get(idx)
                        .cloned()
                        .unwrap_or(EvalError::Malformed));
                }
                OpCode::Add => binary(stack, |a, b| a + b)?,
                OpCode::Sub => binary(stack, |a, b| a - b)?,
                OpCode::Mul => binary(stack, |a, b| a * b)?,
                OpCode::Div => binary(stack, |a, b| a / b)?,
                OpCode::Pow => binary(stack, f64::powf)?,
                OpCode::Neg => {
                    let a = pop(stack)?;
                    stack.push(-a);
                }
                OpCode::Call(func) => {
                    if func.arity() == 2 {
                        binary(stack, |a, b| func.apply_binary(a, b))?;
                    } else {
                        let a = pop(stack)?;
                        stack.push(func.apply_unary(a));
                    }
                }
            }
        }

        let result = pop(stack)?;
        if !stack.is_empty() {
            return Err(EvalError::Malformed);
        }
        Ok(result)
    }
}

fn pop(stack: &mut Vec<f64>) -> Result<f64, EvalError> {
    stack.pop().ok_or(EvalError::Malformed)
}

fn binary(stack: &mut Vec<f64>, op: impl Fn(f64, f64) -> f64) -> Result<(), EvalError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    stack.push(op(a, b));
    Ok(())
}

// --- AST & Compiler ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
            BinaryOp::Pow => '^',
        }
    }

    fn opcode(self) -> OpCode {
        match self {
            BinaryOp::Add => OpCode::Add,
            BinaryOp::Sub => OpCode::Sub,
            BinaryOp::Mul => OpCode::Mul,
            BinaryOp::Div => OpCode::Div,
            BinaryOp::Pow => OpCode::Pow,
        }
    }
}

/// Abstract syntax tree for expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Neg(Box<Expr>),
    Call(String, Vec<Expr>),
}

impl Expr {
    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary(Box::new(left), op, Box::new(right))
    }

    pub fn call(name: &str, args: Vec<Expr>) -> Self {
        Expr::Call(name.to_string(), args)
    }

    /// True when `name` appears anywhere in the tree.
    pub fn depends_on(&self, name: &str) -> bool {
        match self {
            Expr::Number(_) => false,
            Expr::Variable(v) => v == name,
            Expr::Binary(left, _, right) => left.depends_on(name) || right.depends_on(name),
            Expr::Neg(inner) => inner.depends_on(name),
            Expr::Call(_, args) => args.iter().any(|arg| arg.depends_on(name)),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary(_, BinaryOp::Add | BinaryOp::Sub, _) => 1,
            Expr::Binary(_, BinaryOp::Mul | BinaryOp::Div, _) => 2,
            Expr::Neg(_) => 3,
            Expr::Number(n) if n.is_sign_negative() => 3,
            Expr::Binary(_, BinaryOp::Pow, _) => 4,
            _ => 5,
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, parens: bool) -> fmt::Result {
    if parens {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Variable(name) => write!(f, "{name}"),
            Expr::Neg(inner) => {
                write!(f, "-")?;
                write_operand(f, inner, inner.precedence() <= 3)
            }
            Expr::Binary(left, op, right) => {
                let prec = self.precedence();
                let (left_parens, right_parens) = match op {
                    BinaryOp::Add | BinaryOp::Mul => {
                        (left.precedence() < prec, right.precedence() < prec)
                    }
                    BinaryOp::Sub | BinaryOp::Div => {
                        (left.precedence() < prec, right.precedence() <= prec)
                    }
                    BinaryOp::Pow => (left.precedence() <= prec, right.precedence() < prec),
                };
                write_operand(f, left, left_parens)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right, right_parens)
            }
            Expr::Call(name, args) => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Compiles an AST (`Expr`) into `Bytecode` over a single free variable.
#[derive(Debug)]
pub struct Compiler {
    pub variable: String,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(VARIABLE)
    }
}

impl Compiler {
    pub fn new(variable: &str) -> Self {
        Self {
            variable: variable.to_string(),
        }
    }

    pub fn compile(&self, expr: &Expr) -> Bytecode {
        let mut bytecode = Bytecode::new();
        self.compile_recursive(expr, &mut bytecode);
        bytecode
    }

    fn compile_recursive(&self, expr: &Expr, code: &mut Bytecode) {
        match expr {
            Expr::Number(n) => code.ops.push(OpCode::LoadConst(*n)),
            Expr::Variable(name) => {
                if *name == self.variable {
                    code.ops.push(OpCode::LoadVar);
                } else if let Some(value) = named_constant(name) {
                    code.ops.push(OpCode::LoadConst(value));
                } else {
                    push_failure(code, EvalError::UndefinedSymbol(name.clone()));
                }
            }
            Expr::Binary(left, op, right) => {
                self.compile_recursive(left, code);
                self.compile_recursive(right, code);
                code.ops.push(op.opcode());
            }
            Expr::Neg(operand) => {
                self.compile_recursive(operand, code);
                code.ops.push(OpCode::Neg);
            }
            Expr::Call(name, args) => match Function::lookup(name, args.len()) {
                Ok(func) => {
                    for arg in args {
                        self.compile_recursive(arg, code);
                    }
                    code.ops.push(OpCode::Call(func));
                }
                Err(err) => push_failure(code, err),
            },
        }
    }
}

fn push_failure(code: &mut Bytecode, err: EvalError) {
    code.ops.push(OpCode::Fail(code.failures.len()));
    code.failures.push(err);
}

// --- Normalization ---

/// Rewrites the user-facing aliases `ln` → `log` and `sen` → `sin`.
///
/// Substitution is case-insensitive and ignores word boundaries, so an
/// identifier that merely contains one of the aliases is rewritten as well.
pub fn normalize(input: &str) -> String {
    let logs = replace_ignore_ascii_case(input, "ln", "log");
    replace_ignore_ascii_case(&logs, "sen", "sin")
}

fn replace_ignore_ascii_case(haystack: &str, needle: &str, replacement: &str) -> String {
    let bytes = haystack.as_bytes();
    let pattern = needle.as_bytes();
    let mut out = String::with_capacity(haystack.len());
    let mut last = 0;
    let mut i = 0;
    while i + pattern.len() <= bytes.len() {
        if bytes[i..i + pattern.len()].eq_ignore_ascii_case(pattern) {
            out.push_str(&haystack[last..i]);
            out.push_str(replacement);
            i += pattern.len();
            last = i;
        } else {
            i += 1;
        }
    }
    out.push_str(&haystack[last..]);
    out
}

// --- Parser ---

/// Parses a string expression into an AST.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expression()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ParseError::UnexpectedToken(token.describe())),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Comma,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("'{n}'"),
            Token::Identifier(name) => format!("'{name}'"),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Caret => "'^'".to_string(),
            Token::Comma => "','".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut literal = String::new();
            let mut seen_dot = false;
            while let Some(&(_, d)) = chars.peek() {
                if d.is_ascii_digit() || (d == '.' && !seen_dot) {
                    seen_dot |= d == '.';
                    literal.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            // Exponent part only when a digit follows, so `2e` stays `2 * e`.
            let mut lookahead = chars.clone();
            if let Some((_, 'e' | 'E')) = lookahead.next() {
                let mut exponent = String::from("e");
                if let Some(&(_, sign @ ('+' | '-'))) = lookahead.peek() {
                    exponent.push(sign);
                    lookahead.next();
                }
                if matches!(lookahead.peek(), Some((_, d)) if d.is_ascii_digit()) {
                    while let Some(&(_, d)) = lookahead.peek() {
                        if !d.is_ascii_digit() {
                            break;
                        }
                        exponent.push(d);
                        lookahead.next();
                    }
                    literal.push_str(&exponent);
                    chars = lookahead;
                }
            }
            let value = literal
                .parse::<f64>()
                .map_err(|_| ParseError::InvalidNumber(literal.clone()))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Identifier(ident));
        } else {
            let token = match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '^' => Token::Caret,
                ',' => Token::Comma,
                '(' => Token::LParen,
                ')' => Token::RParen,
                _ => return Err(ParseError::UnexpectedChar { ch: c, pos }),
            };
            tokens.push(token);
            chars.next();
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_closing(&mut self) -> Result<(), ParseError> {
        match self.consume() {
            Some(Token::RParen) => Ok(()),
            _ => Err(ParseError::ExpectedClosingParen),
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_term()
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_factor()?;

        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.consume();
            let right = self.parse_factor()?;
            left = Expr::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.peek() {
                Some(Token::Star) => {
                    self.consume();
                    BinaryOp::Mul
                }
                Some(Token::Slash) => {
                    self.consume();
                    BinaryOp::Div
                }
                // Implicit multiplication: `2x`, `3(x+1)`, `(x-1)(x+1)`.
                Some(Token::Identifier(_)) | Some(Token::LParen) => BinaryOp::Mul,
                _ => break,
            };
            let right = self.parse_unary()?;
            left = Expr::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.consume();
                let expr = self.parse_unary()?;
                Ok(Expr::Neg(Box::new(expr)))
            }
            Some(Token::Plus) => {
                self.consume();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            // Right associative; the exponent may carry its own sign.
            let exponent = self.parse_unary()?;
            return Ok(Expr::binary(base, BinaryOp::Pow, exponent));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume();
                    let args = self.parse_arguments()?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                self.expect_closing()?;
                Ok(expr)
            }
            Some(token) => Err(ParseError::UnexpectedToken(token.describe())),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if let Some(Token::RParen) = self.peek() {
            self.consume();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            match self.consume() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err(ParseError::ExpectedClosingParen),
            }
        }
    }
}

// --- Compiled functions ---

/// A user expression compiled to bytecode, callable as `R → R`.
///
/// Each call to `evaluate` uses its own scratch stack, so a `CompiledFn` can
/// be shared freely between concurrent callers.
#[derive(Debug, Clone)]
pub struct CompiledFn {
    source: String,
    expr: Expr,
    bytecode: Bytecode,
}

impl CompiledFn {
    /// Compiles an already parsed expression.
    pub fn from_expr(expr: Expr) -> Self {
        let bytecode = Compiler::default().compile(&expr);
        Self {
            source: expr.to_string(),
            expr,
            bytecode,
        }
    }

    /// The normalized text this function was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluates at `x`. Undefined symbols and non-finite results are errors.
    pub fn evaluate(&self, x: f64) -> Result<f64, EvalError> {
        let mut stack = Vec::with_capacity(16);
        let value = VM::execute(&self.bytecode, x, &mut stack)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvalError::NonFinite(value))
        }
    }

    /// Evaluates at `x`, collapsing every failure to `NaN`.
    pub fn value(&self, x: f64) -> f64 {
        self.evaluate(x).unwrap_or(f64::NAN)
    }
}

/// Normalizes and compiles `input`, reporting why compilation failed.
pub fn try_compile(input: &str) -> Result<CompiledFn, ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    let normalized = normalize(trimmed);
    let expr = parse(&normalized)?;
    let bytecode = Compiler::default().compile(&expr);
    Ok(CompiledFn {
        source: normalized,
        expr,
        bytecode,
    })
}

/// Normalizes and compiles `input`; `None` for empty or malformed text.
pub fn compile(input: &str) -> Option<CompiledFn> {
    try_compile(input).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(input: &str, x: f64) -> f64 {
        compile(input)
            .expect("expression should compile")
            .evaluate(x)
            .expect("expression should evaluate")
    }

    #[test]
    fn evaluates_polynomial() {
        assert!((eval("x^3 - x - 1", 2.0) - 5.0).abs() < 1e-12);
        assert!((eval("3*x^2 + 2*x - 7", -1.0) + 6.0).abs() < 1e-12);
    }

    #[test]
    fn power_is_right_associative_and_binds_tighter_than_negation() {
        assert!((eval("2^3^2", 0.0) - 512.0).abs() < 1e-9);
        assert!((eval("-x^2", 3.0) + 9.0).abs() < 1e-12);
        assert!((eval("2^-1", 0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn implicit_multiplication() {
        assert!((eval("2x", 3.0) - 6.0).abs() < 1e-12);
        assert!((eval("3(x+1)", 1.0) - 6.0).abs() < 1e-12);
        assert!((eval("(x-1)(x+1)", 3.0) - 8.0).abs() < 1e-12);
        assert!((eval("2 sin(x)", std::f64::consts::FRAC_PI_2) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn scientific_notation_and_constants() {
        assert!((eval("1.5e-3 * x", 1000.0) - 1.5).abs() < 1e-12);
        assert!((eval("2e", 0.0) - 2.0 * consts::E).abs() < 1e-12);
        assert!((eval("cos(pi)", 0.0) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn normalizes_ln_and_sen_aliases() {
        assert!((eval("ln(x)", consts::E) - 1.0).abs() < 1e-12);
        assert!((eval("LN(x)", consts::E) - 1.0).abs() < 1e-12);
        assert!((eval("sen(x)", consts::FRAC_PI_2) - 1.0).abs() < 1e-12);
        assert_eq!(normalize("3*Ln(x-1)+2*SEN(x)"), "3*log(x-1)+2*sin(x)");
    }

    #[test]
    fn normalization_is_not_boundary_aware() {
        assert_eq!(normalize("kiln"), "kilog");
        assert_eq!(normalize("sensor"), "sinsor");
        assert_eq!(normalize("linear"), "linear");
    }

    #[test]
    fn two_argument_functions() {
        assert!((eval("log(8, 2)", 0.0) - 3.0).abs() < 1e-12);
        assert!((eval("pow(x, 3)", 2.0) - 8.0).abs() < 1e-12);
        assert!((eval("nthRoot(x, 3)", -8.0) + 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_and_malformed_input_does_not_compile() {
        assert!(compile("").is_none());
        assert!(compile("   ").is_none());
        assert!(compile("1 +").is_none());
        assert!(compile("(x + 1").is_none());
        assert!(compile("x $ 2").is_none());
        assert!(compile("x )").is_none());
        assert_eq!(try_compile(" ").unwrap_err(), ParseError::Empty);
    }

    #[test]
    fn unknown_symbols_compile_but_fail_to_evaluate() {
        let f = compile("x + y").expect("unknown symbols still compile");
        assert_eq!(
            f.evaluate(1.0),
            Err(EvalError::UndefinedSymbol("y".to_string()))
        );
        assert!(f.value(1.0).is_nan());

        let g = compile("foo(x)").expect("unknown functions still compile");
        assert_eq!(
            g.evaluate(1.0),
            Err(EvalError::UndefinedFunction("foo".to_string()))
        );

        let h = compile("sin(x, 2)").expect("arity is checked at evaluation");
        assert!(matches!(h.evaluate(1.0), Err(EvalError::Arity { .. })));
    }

    #[test]
    fn domain_errors_and_infinities_are_reported() {
        let f = compile("log(x)").expect("compile");
        assert!(matches!(f.evaluate(-1.0), Err(EvalError::NonFinite(_))));
        assert!(matches!(f.evaluate(0.0), Err(EvalError::NonFinite(_))));
        let g = compile("1/x").expect("compile");
        assert!(g.value(0.0).is_nan());
        let h = compile("sqrt(x)").expect("compile");
        assert!(h.value(-4.0).is_nan());
    }

    #[test]
    fn display_round_trips_through_parser() {
        let inputs = ["x^3 - x - 1", "-(x + 1)^2", "(sin(x) + 2*cos(x))/2", "x - (1 - x)"];
        for input in inputs {
            let expr = parse(input).expect("parse");
            let reparsed = parse(&expr.to_string()).expect("reparse");
            for x in [-1.3, 0.4, 2.0] {
                let a = CompiledFn::from_expr(expr.clone()).value(x);
                let b = CompiledFn::from_expr(reparsed.clone()).value(x);
                assert!((a - b).abs() < 1e-12, "{input} vs {}", expr);
            }
        }
    }

    #[test]
    fn compiled_functions_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CompiledFn>();
    }
}
