//! Operator architecture
//!
//! Operators turn the argument of a `${op:arg}` expression into a value.
//! The tree-aware operators (`var`, `cfg`) are evaluated by the config
//! resolver itself; everything that only needs its argument text lives in
//! a [`ResolverRegistry`]: the environment lookup and the arithmetic set.
//! Names missing from both are not errors; the expression stays literal.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::coerce;
use crate::error::{Error, Result};
use crate::value::Value;

/// Context provided to operators during evaluation
#[derive(Debug, Clone)]
pub struct ResolverContext {
    /// The path in the config where this evaluation is happening
    pub config_path: String,
}

impl ResolverContext {
    pub fn new(config_path: impl Into<String>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }
}

/// Trait for operator implementations
pub trait Operator: Send + Sync {
    /// Evaluate an expression
    ///
    /// `args` are already resolved: nested expressions have been replaced by
    /// their text. When [`Operator::splits_arguments`] is true there is one
    /// entry per top-level comma-separated operand, trimmed.
    fn evaluate(&self, args: &[String], ctx: &ResolverContext) -> Result<Value>;

    /// Name used in `${name:...}`
    fn name(&self) -> &str;

    /// Whether the raw argument is split on top-level commas before resolution
    fn splits_arguments(&self) -> bool {
        true
    }
}

/// A simple function-based operator
pub struct FnOperator<F>
where
    F: Fn(&[String], &ResolverContext) -> Result<Value> + Send + Sync,
{
    name: String,
    splits: bool,
    func: F,
}

impl<F> FnOperator<F>
where
    F: Fn(&[String], &ResolverContext) -> Result<Value> + Send + Sync,
{
    /// Operator receiving comma-separated operands
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            splits: true,
            func,
        }
    }

    /// Operator receiving its whole argument as one string
    pub fn unsplit(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            splits: false,
            func,
        }
    }
}

impl<F> Operator for FnOperator<F>
where
    F: Fn(&[String], &ResolverContext) -> Result<Value> + Send + Sync,
{
    fn evaluate(&self, args: &[String], ctx: &ResolverContext) -> Result<Value> {
        (self.func)(args, ctx)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn splits_arguments(&self) -> bool {
        self.splits
    }
}

/// Registry of available operators
#[derive(Clone)]
pub struct ResolverRegistry {
    operators: HashMap<String, Arc<dyn Operator>>,
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.operators.keys().collect();
        names.sort();
        f.debug_struct("ResolverRegistry")
            .field("operators", &names)
            .finish()
    }
}

impl ResolverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            operators: HashMap::new(),
        }
    }

    /// Create a registry with `env` and the arithmetic operators
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FnOperator::unsplit("env", env_operator)));
        for op in ArithmeticOp::ALL {
            registry.register(Arc::new(op));
        }
        registry
    }

    /// Register an operator, replacing any existing one with the same name
    pub fn register(&mut self, operator: Arc<dyn Operator>) {
        self.operators
            .insert(operator.name().to_string(), operator);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Operator>> {
        self.operators.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }
}

/// Environment lookup
///
/// The argument is expanded as `$NAME` against the process environment.
/// An undefined name expands to itself, so `${env:NOPE}` yields `$NOPE`.
fn env_operator(args: &[String], _ctx: &ResolverContext) -> Result<Value> {
    let name = args.first().map(|s| s.trim()).unwrap_or_default();
    Ok(Value::String(expand_vars(&format!("${}", name))))
}

/// Shell-style `$NAME` / `${NAME}` expansion; undefined names are left as written
pub fn expand_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(dollar) = rest.find('$') {
        out.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(close) => (&braced[..close], close + 2),
                None => ("", 0),
            }
        } else {
            let len = after
                .bytes()
                .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
                .count();
            (&after[..len], len)
        };

        if consumed == 0 {
            out.push('$');
            rest = after;
            continue;
        }

        match std::env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => {
                out.push('$');
                out.push_str(&after[..consumed]);
            }
        }
        rest = &after[consumed..];
    }

    out.push_str(rest);
    out
}

/// A numeric operand or result
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Read an operand the same way the coercion pass reads a leaf
    pub fn parse(text: &str) -> Option<Self> {
        match coerce::coerce_str(text)? {
            Value::Integer(i) => Some(Number::Int(i)),
            Value::Float(f) => Some(Number::Float(f)),
            _ => None,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Number::Int(i) => i == 0,
            Number::Float(f) => f == 0.0,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(n) => write!(f, "{:?}", n),
        }
    }
}

/// The arithmetic operators, each a left fold over its operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    TrueDiv,
    FloorDiv,
    Mod,
    Pow,
}

impl ArithmeticOp {
    pub const ALL: [ArithmeticOp; 8] = [
        ArithmeticOp::Add,
        ArithmeticOp::Sub,
        ArithmeticOp::Mul,
        ArithmeticOp::Div,
        ArithmeticOp::TrueDiv,
        ArithmeticOp::FloorDiv,
        ArithmeticOp::Mod,
        ArithmeticOp::Pow,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "add",
            ArithmeticOp::Sub => "sub",
            ArithmeticOp::Mul => "mul",
            ArithmeticOp::Div => "div",
            ArithmeticOp::TrueDiv => "truediv",
            ArithmeticOp::FloorDiv => "floordiv",
            ArithmeticOp::Mod => "mod",
            ArithmeticOp::Pow => "pow",
        }
    }

    /// Left-fold the operator across `operands`
    pub fn fold(self, operands: &[String]) -> Result<Number> {
        let mut numbers = operands.iter().map(|text| {
            Number::parse(text).ok_or_else(|| {
                Error::arithmetic(self.as_str(), format!("operand '{}' is not numeric", text))
            })
        });

        let first = numbers
            .next()
            .ok_or_else(|| Error::arithmetic(self.as_str(), "no operands"))??;
        numbers.try_fold(first, |acc, next| {
            self.apply(acc, next?)
                .map_err(|message| Error::arithmetic(self.as_str(), message))
        })
    }

    /// Apply the operator to two numbers
    pub fn apply(self, a: Number, b: Number) -> std::result::Result<Number, String> {
        use Number::{Float, Int};

        let overflow = || format!("integer overflow evaluating {} {} {}", a, self.symbol(), b);

        match self {
            ArithmeticOp::Div | ArithmeticOp::TrueDiv | ArithmeticOp::FloorDiv | ArithmeticOp::Mod
                if b.is_zero() =>
            {
                Err("division by zero".to_string())
            }
            ArithmeticOp::Add => match (a, b) {
                (Int(x), Int(y)) => x.checked_add(y).map(Int).ok_or_else(overflow),
                _ => Ok(Float(a.as_f64() + b.as_f64())),
            },
            ArithmeticOp::Sub => match (a, b) {
                (Int(x), Int(y)) => x.checked_sub(y).map(Int).ok_or_else(overflow),
                _ => Ok(Float(a.as_f64() - b.as_f64())),
            },
            ArithmeticOp::Mul => match (a, b) {
                (Int(x), Int(y)) => x.checked_mul(y).map(Int).ok_or_else(overflow),
                _ => Ok(Float(a.as_f64() * b.as_f64())),
            },
            ArithmeticOp::Div | ArithmeticOp::TrueDiv => Ok(Float(a.as_f64() / b.as_f64())),
            ArithmeticOp::FloorDiv => match (a, b) {
                (Int(x), Int(y)) => {
                    let q = x.checked_div(y).ok_or_else(overflow)?;
                    let adjust = x % y != 0 && ((x < 0) != (y < 0));
                    Ok(Int(if adjust { q - 1 } else { q }))
                }
                _ => Ok(Float((a.as_f64() / b.as_f64()).floor())),
            },
            ArithmeticOp::Mod => match (a, b) {
                (Int(x), Int(y)) => {
                    let r = x.checked_rem(y).ok_or_else(overflow)?;
                    Ok(Int(if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r }))
                }
                _ => {
                    let (x, y) = (a.as_f64(), b.as_f64());
                    let r = x % y;
                    Ok(Float(if r != 0.0 && ((r < 0.0) != (y < 0.0)) { r + y } else { r }))
                }
            },
            ArithmeticOp::Pow => {
                if a.is_zero() && b.as_f64() < 0.0 {
                    return Err("zero cannot be raised to a negative power".to_string());
                }
                match (a, b) {
                    (Int(x), Int(y)) if y >= 0 => {
                        let exp = u32::try_from(y).map_err(|_| overflow())?;
                        x.checked_pow(exp).map(Int).ok_or_else(overflow)
                    }
                    _ => {
                        let result = a.as_f64().powf(b.as_f64());
                        if result.is_finite() {
                            Ok(Float(result))
                        } else {
                            Err(format!("{} ** {} is not a finite real number", a, b))
                        }
                    }
                }
            }
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div | ArithmeticOp::TrueDiv => "/",
            ArithmeticOp::FloorDiv => "//",
            ArithmeticOp::Mod => "%",
            ArithmeticOp::Pow => "**",
        }
    }
}

impl Operator for ArithmeticOp {
    fn evaluate(&self, args: &[String], ctx: &ResolverContext) -> Result<Value> {
        let result = self
            .fold(args)
            .map_err(|e| e.or_path(&ctx.config_path))?;
        log::trace!("{}({}) = {}", self.as_str(), args.join(", "), result);
        Ok(Value::String(result.to_string()))
    }

    fn name(&self) -> &str {
        self.as_str()
    }
}
