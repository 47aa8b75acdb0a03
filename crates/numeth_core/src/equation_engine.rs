use crate::traits::Evaluator;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while parsing, compiling or executing an expression.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvalError {
    #[error("parse error at position {position}: {message}")]
    Parse { position: usize, message: String },
    #[error("unknown variable `{name}`")]
    UnknownVariable { name: String },
    #[error("unknown function `{name}`")]
    UnknownFunction { name: String },
    #[error("index {index} is out of range for `{name}` (length {len})")]
    IndexOutOfRange { name: String, index: usize, len: usize },
    #[error("index into `{name}` must be a non-negative integer, got {value}")]
    InvalidIndex { name: String, value: f64 },
    #[error("division by zero")]
    DivisionByZero,
    #[error("math domain error: {function}({argument})")]
    Domain { function: String, argument: f64 },
    #[error("arithmetic overflow (non-finite value)")]
    Overflow,
    #[error("malformed bytecode: stack underflow")]
    StackUnderflow,
}

/// Built-in single-argument functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Ln,
    Log10,
    Sqrt,
    Abs,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        let function = match name {
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "asin" => Function::Asin,
            "acos" => Function::Acos,
            "atan" => Function::Atan,
            "sinh" => Function::Sinh,
            "cosh" => Function::Cosh,
            "tanh" => Function::Tanh,
            "exp" => Function::Exp,
            "ln" | "log" => Function::Ln,
            "log10" => Function::Log10,
            "sqrt" => Function::Sqrt,
            "abs" => Function::Abs,
            _ => return None,
        };
        Some(function)
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Asin => "asin",
            Function::Acos => "acos",
            Function::Atan => "atan",
            Function::Sinh => "sinh",
            Function::Cosh => "cosh",
            Function::Tanh => "tanh",
            Function::Exp => "exp",
            Function::Ln => "ln",
            Function::Log10 => "log10",
            Function::Sqrt => "sqrt",
            Function::Abs => "abs",
        }
    }

    fn apply(self, a: f64) -> Result<f64, EvalError> {
        let domain = |ok: bool| {
            if ok {
                Ok(())
            } else {
                Err(EvalError::Domain {
                    function: self.name().to_string(),
                    argument: a,
                })
            }
        };
        let value = match self {
            Function::Sin => a.sin(),
            Function::Cos => a.cos(),
            Function::Tan => a.tan(),
            Function::Asin => {
                domain((-1.0..=1.0).contains(&a))?;
                a.asin()
            }
            Function::Acos => {
                domain((-1.0..=1.0).contains(&a))?;
                a.acos()
            }
            Function::Atan => a.atan(),
            Function::Sinh => a.sinh(),
            Function::Cosh => a.cosh(),
            Function::Tanh => a.tanh(),
            Function::Exp => a.exp(),
            Function::Ln => {
                domain(a > 0.0)?;
                a.ln()
            }
            Function::Log10 => {
                domain(a > 0.0)?;
                a.log10()
            }
            Function::Sqrt => {
                domain(a >= 0.0)?;
                a.sqrt()
            }
            Function::Abs => a.abs(),
        };
        Ok(value)
    }
}

/// OpCodes for the Stack-based Virtual Machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant value onto the stack.
    LoadConst(f64),
    /// Pushes the value of a scalar binding (by slot) onto the stack.
    LoadVar(usize),
    /// Pops an index (i), pushes element i of an array binding (by slot).
    LoadIndexed(usize),
    /// Pops top two values (b, a), pushes (a + b).
    Add,
    /// Pops top two values (b, a), pushes (a - b).
    Sub,
    /// Pops top two values (b, a), pushes (a * b).
    Mul,
    /// Pops top two values (b, a), pushes (a / b).
    Div,
    /// Pops top two values (b, a), pushes (a ^ b).
    Pow,
    /// Pops top value (a), pushes -a.
    Neg,
    /// Pops top value (a), pushes f(a).
    Call(Function),
}

/// Represents a compiled sequence of operations.
#[derive(Debug, Clone, Default)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

impl Bytecode {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }
}

/// Name → value bindings an expression is evaluated against.
///
/// Scalars (`x`, `t`, `y`) and arrays (`y` in `y[0]`) live in separate
/// namespaces, so a system can bind both `t` and the vector `y`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    scalars: Vec<(String, f64)>,
    arrays: Vec<(String, Vec<f64>)>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Bindings::set`].
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.set(name, value);
        self
    }

    /// Builder form of [`Bindings::set_array`].
    pub fn with_array(mut self, name: &str, values: &[f64]) -> Self {
        self.set_array(name, values);
        self
    }

    /// Binds (or rebinds) a scalar.
    pub fn set(&mut self, name: &str, value: f64) {
        match self.scalars.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.scalars.push((name.to_string(), value)),
        }
    }

    /// Binds (or rebinds) an array, reusing the existing allocation.
    pub fn set_array(&mut self, name: &str, values: &[f64]) {
        match self.arrays.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => {
                slot.1.clear();
                slot.1.extend_from_slice(values);
            }
            None => self.arrays.push((name.to_string(), values.to_vec())),
        }
    }

    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.scalar_slot(name).map(|slot| self.scalars[slot].1)
    }

    pub fn array(&self, name: &str) -> Option<&[f64]> {
        self.array_slot(name).map(|slot| self.arrays[slot].1.as_slice())
    }

    fn scalar_slot(&self, name: &str) -> Option<usize> {
        self.scalars.iter().position(|(n, _)| n == name)
    }

    fn array_slot(&self, name: &str) -> Option<usize> {
        self.arrays.iter().position(|(n, _)| n == name)
    }
}

/// Stack-based Virtual Machine for evaluating expressions.
///
/// The VM is stateless; `execute` takes all necessary context:
/// - `bytecode`: Instructions to run.
/// - `bindings`: The bindings the bytecode was compiled against (read-only).
/// - `stack`: A mutable buffer for intermediate computations.
///
/// Every intermediate value is checked, so a result is always finite.
pub struct VM;

impl VM {
    pub fn execute(
        bytecode: &Bytecode,
        bindings: &Bindings,
        stack: &mut Vec<f64>,
    ) -> Result<f64, EvalError> {
        stack.clear();

        for op in &bytecode.ops {
            let value = match *op {
                OpCode::LoadConst(val) => val,
                OpCode::LoadVar(slot) => bindings
                    .scalars
                    .get(slot)
                    .map(|(_, v)| *v)
                    .ok_or(EvalError::StackUnderflow)?,
                OpCode::LoadIndexed(slot) => {
                    let raw = pop(stack)?;
                    let (name, values) =
                        bindings.arrays.get(slot).ok_or(EvalError::StackUnderflow)?;
                    let index = array_index(name, raw)?;
                    *values.get(index).ok_or_else(|| EvalError::IndexOutOfRange {
                        name: name.clone(),
                        index,
                        len: values.len(),
                    })?
                }
                OpCode::Add => {
                    let b = pop(stack)?;
                    let a = pop(stack)?;
                    a + b
                }
                OpCode::Sub => {
                    let b = pop(stack)?;
                    let a = pop(stack)?;
                    a - b
                }
                OpCode::Mul => {
                    let b = pop(stack)?;
                    let a = pop(stack)?;
                    a * b
                }
                OpCode::Div => {
                    let b = pop(stack)?;
                    let a = pop(stack)?;
                    if b == 0.0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    a / b
                }
                OpCode::Pow => {
                    let b = pop(stack)?;
                    let a = pop(stack)?;
                    power(a, b)?
                }
                OpCode::Neg => -pop(stack)?,
                OpCode::Call(function) => {
                    let a = pop(stack)?;
                    function.apply(a)?
                }
            };
            if !value.is_finite() {
                return Err(EvalError::Overflow);
            }
            stack.push(value);
        }

        let result = pop(stack)?;
        if stack.is_empty() {
            Ok(result)
        } else {
            Err(EvalError::StackUnderflow)
        }
    }
}

fn pop(stack: &mut Vec<f64>) -> Result<f64, EvalError> {
    stack.pop().ok_or(EvalError::StackUnderflow)
}

fn power(a: f64, b: f64) -> Result<f64, EvalError> {
    if a == 0.0 && b < 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    if a < 0.0 && b.fract() != 0.0 {
        return Err(EvalError::Domain {
            function: "pow".to_string(),
            argument: a,
        });
    }
    Ok(a.powf(b))
}

fn array_index(name: &str, raw: f64) -> Result<usize, EvalError> {
    if raw < 0.0 || raw.fract() != 0.0 || raw > usize::MAX as f64 {
        return Err(EvalError::InvalidIndex {
            name: name.to_string(),
            value: raw,
        });
    }
    Ok(raw as usize)
}

// --- AST & Compiler ---

/// Abstract Syntax Tree nodes for expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Index(String, Box<Expr>),
    Binary(Box<Expr>, char, Box<Expr>), // char is operator +, -, *, /, ^
    Unary(char, Box<Expr>),            // -
    Call(String, Box<Expr>),           // functions like sin(x)
}

/// Compiles an AST (`Expr`) into `Bytecode`.
/// Resolves variable names to binding slots; `pi` and `e` fall back to
/// constants when no binding of that name exists.
pub struct Compiler {
    pub var_map: HashMap<String, usize>,
    pub array_map: HashMap<String, usize>,
}

impl Compiler {
    pub fn new(bindings: &Bindings) -> Self {
        let var_map = bindings
            .scalars
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), i))
            .collect();
        let array_map = bindings
            .arrays
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), i))
            .collect();
        Self { var_map, array_map }
    }

    pub fn compile(&self, expr: &Expr) -> Result<Bytecode, EvalError> {
        let mut ops = Vec::new();
        self.compile_recursive(expr, &mut ops)?;
        Ok(Bytecode { ops })
    }

    fn compile_recursive(&self, expr: &Expr, ops: &mut Vec<OpCode>) -> Result<(), EvalError> {
        match expr {
            Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
            Expr::Variable(name) => {
                if let Some(&slot) = self.var_map.get(name) {
                    ops.push(OpCode::LoadVar(slot));
                } else if name == "pi" {
                    ops.push(OpCode::LoadConst(std::f64::consts::PI));
                } else if name == "e" {
                    ops.push(OpCode::LoadConst(std::f64::consts::E));
                } else {
                    return Err(EvalError::UnknownVariable { name: name.clone() });
                }
            }
            Expr::Index(name, index) => {
                let slot = *self
                    .array_map
                    .get(name)
                    .ok_or_else(|| EvalError::UnknownVariable { name: name.clone() })?;
                self.compile_recursive(index, ops)?;
                ops.push(OpCode::LoadIndexed(slot));
            }
            Expr::Binary(left, op, right) => {
                self.compile_recursive(left, ops)?;
                self.compile_recursive(right, ops)?;
                let code = match op {
                    '+' => OpCode::Add,
                    '-' => OpCode::Sub,
                    '*' => OpCode::Mul,
                    '/' => OpCode::Div,
                    '^' => OpCode::Pow,
                    other => {
                        return Err(EvalError::Parse {
                            position: 0,
                            message: format!("unknown binary operator '{other}'"),
                        })
                    }
                };
                ops.push(code);
            }
            Expr::Unary(op, operand) => {
                self.compile_recursive(operand, ops)?;
                match op {
                    '-' => ops.push(OpCode::Neg),
                    '+' => {}
                    other => {
                        return Err(EvalError::Parse {
                            position: 0,
                            message: format!("unknown unary operator '{other}'"),
                        })
                    }
                }
            }
            Expr::Call(func, arg) => {
                let function = Function::from_name(func)
                    .ok_or_else(|| EvalError::UnknownFunction { name: func.clone() })?;
                self.compile_recursive(arg, ops)?;
                ops.push(OpCode::Call(function));
            }
        }
        Ok(())
    }
}

// --- Parser ---

/// Deepest nesting of parentheses, calls and signs the parser accepts.
pub const MAX_NESTING: usize = 256;
/// Longest token stream the parser accepts; bounds the depth of operator chains.
pub const MAX_TOKENS: usize = 4096;

/// Parses a string expression into an AST.
pub fn parse(input: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(input)?;
    if let Some(&(position, _)) = tokens.get(MAX_TOKENS) {
        return Err(EvalError::Parse {
            position,
            message: format!("expression exceeds {MAX_TOKENS} tokens"),
        });
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
        depth: 0,
    };
    let expr = parser.parse_expression()?;
    match parser.peek() {
        None => Ok(expr),
        Some(_) => Err(parser.error("unexpected trailing input")),
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
    LParen,
    RParen,
    LBracket,
    RBracket,
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut num_str = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    num_str.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            // Exponent part: only consumed when digits follow.
            if let Some(&(_, 'e' | 'E')) = chars.peek() {
                let mut lookahead = chars.clone();
                lookahead.next();
                let mut exponent = String::from("e");
                if let Some(&(_, sign @ ('+' | '-'))) = lookahead.peek() {
                    exponent.push(sign);
                    lookahead.next();
                }
                if matches!(lookahead.peek(), Some((_, d)) if d.is_ascii_digit()) {
                    while let Some(&(_, d)) = lookahead.peek() {
                        if d.is_ascii_digit() {
                            exponent.push(d);
                            lookahead.next();
                        } else {
                            break;
                        }
                    }
                    num_str.push_str(&exponent);
                    chars = lookahead;
                }
            }
            let value = num_str.parse::<f64>().map_err(|_| EvalError::Parse {
                position: pos,
                message: format!("invalid number '{num_str}'"),
            })?;
            tokens.push((pos, Token::Number(value)));
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
            tokens.push((pos, Token::Identifier(ident)));
        } else {
            chars.next();
            let token = match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => {
                    if let Some(&(_, '*')) = chars.peek() {
                        chars.next();
                        Token::Caret
                    } else {
                        Token::Star
                    }
                }
                '/' => Token::Slash,
                '^' => Token::Caret,
                '(' => Token::LParen,
                ')' => Token::RParen,
                '[' => Token::LBracket,
                ']' => Token::RBracket,
                other => {
                    return Err(EvalError::Parse {
                        position: pos,
                        message: format!("unexpected character '{other}'"),
                    })
                }
            };
            tokens.push((pos, token));
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(p, _)| *p)
            .unwrap_or(self.end)
    }

    fn error(&self, message: &str) -> EvalError {
        EvalError::Parse {
            position: self.position(),
            message: message.to_string(),
        }
    }

    fn expect(&mut self, expected: Token, message: &str) -> Result<(), EvalError> {
        if self.peek() == Some(&expected) {
            self.consume();
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, EvalError> {
        self.parse_term()
    }

    fn parse_term(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_factor()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Plus => '+',
                Token::Minus => '-',
                _ => break,
            };
            self.consume();
            let right = self.parse_factor()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_unary()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Star => '*',
                Token::Slash => '/',
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    // Every recursive path passes through here.
    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("expression is nested too deeply"));
        }
        self.depth += 1;
        let expr = self.parse_signed();
        self.depth -= 1;
        expr
    }

    fn parse_signed(&mut self) -> Result<Expr, EvalError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.consume();
                let expr = self.parse_unary()?;
                Ok(Expr::Unary('-', Box::new(expr)))
            }
            Some(Token::Plus) => {
                self.consume();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    // Right-associative; the exponent may carry its own sign (2^-1).
    fn parse_power(&mut self) -> Result<Expr, EvalError> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(Box::new(base), '^', Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        let position = self.position();
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => match self.peek() {
                Some(Token::LParen) => {
                    self.consume();
                    let arg = self.parse_expression()?;
                    self.expect(Token::RParen, "expected ')'")?;
                    Ok(Expr::Call(name, Box::new(arg)))
                }
                Some(Token::LBracket) => {
                    self.consume();
                    let index = self.parse_expression()?;
                    self.expect(Token::RBracket, "expected ']'")?;
                    Ok(Expr::Index(name, Box::new(index)))
                }
                _ => Ok(Expr::Variable(name)),
            },
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                self.expect(Token::RParen, "expected ')'")?;
                Ok(expr)
            }
            Some(_) => Err(EvalError::Parse {
                position,
                message: "unexpected token".to_string(),
            }),
            None => Err(EvalError::Parse {
                position,
                message: "unexpected end of input".to_string(),
            }),
        }
    }
}

// --- ExpressionEngine ---

/// The sandboxed [`Evaluator`]: tokenize, parse, compile and run on the VM.
///
/// Nothing is cached between calls; every evaluation starts from the text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionEngine;

impl ExpressionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Parses and compiles `expression` against the names in `bindings`
    /// without running it.
    pub fn validate(&self, expression: &str, bindings: &Bindings) -> Result<(), EvalError> {
        let expr = parse(expression)?;
        Compiler::new(bindings).compile(&expr).map(|_| ())
    }
}

impl Evaluator for ExpressionEngine {
    fn evaluate(&self, expression: &str, bindings: &Bindings) -> Result<f64, EvalError> {
        let expr = parse(expression)?;
        let bytecode = Compiler::new(bindings).compile(&expr)?;
        let mut stack = Vec::with_capacity(16);
        VM::execute(&bytecode, bindings, &mut stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn eval(expression: &str, bindings: &Bindings) -> Result<f64, EvalError> {
        ExpressionEngine.evaluate(expression, bindings)
    }

    #[test]
    fn evaluates_polynomial_with_both_power_spellings() {
        let bindings = Bindings::new().with("x", 3.0);
        assert_eq!(eval("x**2 - 2*x - 3", &bindings), Ok(0.0));
        assert_eq!(eval("x^2 - 2*x - 3", &bindings), Ok(0.0));
    }

    #[test]
    fn power_is_right_associative_and_binds_tighter_than_negation() {
        let bindings = Bindings::new().with("x", 2.0);
        assert_eq!(eval("2^3^2", &bindings), Ok(512.0));
        assert_eq!(eval("-x^2", &bindings), Ok(-4.0));
        assert_eq!(eval("2^-1", &bindings), Ok(0.5));
    }

    #[test]
    fn parses_scientific_notation() {
        let bindings = Bindings::new();
        assert_eq!(eval("1e-3 * 2", &bindings), Ok(0.002));
        assert_eq!(eval("2.5E+2", &bindings), Ok(250.0));
        assert_eq!(eval(".5 + 2.", &bindings), Ok(2.5));
    }

    #[test]
    fn constants_and_functions() {
        let bindings = Bindings::new().with("x", 1.0);
        assert_relative_eq!(eval("sin(pi/2)", &bindings).unwrap(), 1.0);
        assert_relative_eq!(eval("log(e)", &bindings).unwrap(), 1.0);
        assert_relative_eq!(eval("sqrt(abs(-16))", &bindings).unwrap(), 4.0);
        assert_abs_diff_eq!(eval("exp(x) - e", &bindings).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn binding_shadows_constant() {
        let bindings = Bindings::new().with("e", 2.0);
        assert_eq!(eval("e * 3", &bindings), Ok(6.0));
    }

    #[test]
    fn indexed_array_lookup() {
        let bindings = Bindings::new()
            .with("t", 0.5)
            .with_array("y", &[1.0, -2.0, 4.0]);
        assert_eq!(eval("y[1] + y[0]*t", &bindings), Ok(-1.5));
        assert_eq!(eval("y[1+1]", &bindings), Ok(4.0));
    }

    #[test]
    fn index_errors_are_reported() {
        let bindings = Bindings::new().with_array("y", &[1.0, 2.0]);
        assert_eq!(
            eval("y[2]", &bindings),
            Err(EvalError::IndexOutOfRange {
                name: "y".to_string(),
                index: 2,
                len: 2
            })
        );
        assert!(matches!(
            eval("y[0.5]", &bindings),
            Err(EvalError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn unknown_names_fail_to_compile() {
        let bindings = Bindings::new().with("x", 1.0);
        assert_eq!(
            eval("x + missing", &bindings),
            Err(EvalError::UnknownVariable {
                name: "missing".to_string()
            })
        );
        assert_eq!(
            eval("gamma(x)", &bindings),
            Err(EvalError::UnknownFunction {
                name: "gamma".to_string()
            })
        );
    }

    #[test]
    fn arithmetic_failures() {
        let bindings = Bindings::new().with("x", 0.0);
        assert_eq!(eval("1/x", &bindings), Err(EvalError::DivisionByZero));
        assert_eq!(eval("x^-1", &bindings), Err(EvalError::DivisionByZero));
        assert!(matches!(eval("sqrt(x-1)", &bindings), Err(EvalError::Domain { .. })));
        assert!(matches!(eval("log(x)", &bindings), Err(EvalError::Domain { .. })));
        assert!(matches!(eval("(-8)^(1/3)", &bindings), Err(EvalError::Domain { .. })));
        assert_eq!(eval("exp(1000)", &bindings), Err(EvalError::Overflow));
    }

    #[test]
    fn malformed_input_is_a_parse_error() {
        let bindings = Bindings::new().with("x", 1.0);
        for bad in ["", "x +", "(x", "x ) 1", "2 $ 3", "sin(x", "y[1"] {
            assert!(
                matches!(eval(bad, &bindings), Err(EvalError::Parse { .. })),
                "expected parse error for {bad:?}"
            );
        }
    }

    #[test]
    fn runaway_nesting_is_a_parse_error() {
        let bindings = Bindings::new().with("x", 2.0);
        let nested = |depth: usize| format!("{}x{}", "(".repeat(depth), ")".repeat(depth));

        assert_eq!(eval(&nested(100), &bindings), Ok(2.0));
        assert!(matches!(
            eval(&nested(MAX_NESTING + 1), &bindings),
            Err(EvalError::Parse { .. })
        ));
        assert!(matches!(
            eval(&nested(200_000), &bindings),
            Err(EvalError::Parse { .. })
        ));
        assert!(matches!(
            eval(&format!("{}x", "-".repeat(1000)), &bindings),
            Err(EvalError::Parse { .. })
        ));
    }

    #[test]
    fn token_limit_bounds_operator_chains() {
        let bindings = Bindings::new().with("x", 1.0);
        let sum = |terms: usize| vec!["x"; terms].join("+");

        assert_eq!(eval(&sum(1000), &bindings), Ok(1000.0));
        match eval(&sum(MAX_TOKENS), &bindings) {
            Err(EvalError::Parse { message, .. }) => assert!(message.contains("tokens")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn validate_checks_names_without_executing() {
        let engine = ExpressionEngine::new();
        let bindings = Bindings::new().with("x", 0.0);
        assert!(engine.validate("1/x", &bindings).is_ok());
        assert!(engine.validate("1/z", &bindings).is_err());
    }

    #[test]
    fn rebinding_replaces_values() {
        let mut bindings = Bindings::new().with("x", 1.0).with_array("y", &[1.0]);
        bindings.set("x", 5.0);
        bindings.set_array("y", &[7.0, 8.0]);
        assert_eq!(bindings.scalar("x"), Some(5.0));
        assert_eq!(bindings.array("y"), Some(&[7.0, 8.0][..]));
        assert_eq!(eval("x + y[1]", &bindings), Ok(13.0));
    }
}
