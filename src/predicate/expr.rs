//! Expression predicates.
//!
//! `Expr` is a small expression tree over vertex attributes. Its `Display`
//! rendering is the canonical cache key: fully parenthesized, with literals
//! rendered type-exactly (`1` and `1.0` differ), so two trees share a key
//! only if they are structurally identical.
//!
//! Parameters (`Expr::param`) make templates: `bind` replaces a parameter by
//! a literal, so `id > $x` bound to 4 and to 9 are two distinct queries.
//!
//! ```text
//! (Expr::attr("id") % 2).equals(0)   →   ((v.id % 2) == 0)
//! Expr::attr("id").gt(Expr::param("x")).bind("x", 9)   →   (v.id > 9)
//! ```
//!
//! Evaluation uses three-valued logic. A missing attribute is NULL, NULL
//! propagates through comparisons and arithmetic, and a NULL predicate
//! result excludes the vertex. Type mismatches, overflow and division by
//! zero are errors.

use std::collections::BTreeSet;
use std::fmt;
use std::ops;

use serde::{Deserialize, Serialize};

use crate::model::{Value, Vertex};
use crate::{Error, Result};

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    StartsWith,
    EndsWith,
    Contains,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::StartsWith => "starts_with",
            BinaryOp::EndsWith => "ends_with",
            BinaryOp::Contains => "contains",
        }
    }
}

/// Expression over a single vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Value),
    /// Attribute of the vertex under test.
    Attr(String),
    /// Named placeholder, replaced by `bind`.
    Param(String),
    Not(Box<Expr>),
    /// String conversion (`text(v.id)`).
    ToText(Box<Expr>),
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
}

// ============================================================================
// Construction
// ============================================================================

impl Expr {
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn attr(name: impl Into<String>) -> Self {
        Expr::Attr(name.into())
    }

    pub fn param(name: impl Into<String>) -> Self {
        Expr::Param(name.into())
    }

    pub fn binary(op: BinaryOp, lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Expr::Binary { op, lhs: Box::new(lhs.into()), rhs: Box::new(rhs.into()) }
    }

    pub fn equals(self, rhs: impl Into<Expr>) -> Self { Self::binary(BinaryOp::Eq, self, rhs) }
    pub fn not_equals(self, rhs: impl Into<Expr>) -> Self { Self::binary(BinaryOp::Ne, self, rhs) }
    pub fn lt(self, rhs: impl Into<Expr>) -> Self { Self::binary(BinaryOp::Lt, self, rhs) }
    pub fn le(self, rhs: impl Into<Expr>) -> Self { Self::binary(BinaryOp::Le, self, rhs) }
    pub fn gt(self, rhs: impl Into<Expr>) -> Self { Self::binary(BinaryOp::Gt, self, rhs) }
    pub fn ge(self, rhs: impl Into<Expr>) -> Self { Self::binary(BinaryOp::Ge, self, rhs) }
    pub fn and(self, rhs: impl Into<Expr>) -> Self { Self::binary(BinaryOp::And, self, rhs) }
    pub fn or(self, rhs: impl Into<Expr>) -> Self { Self::binary(BinaryOp::Or, self, rhs) }
    pub fn starts_with(self, rhs: impl Into<Expr>) -> Self { Self::binary(BinaryOp::StartsWith, self, rhs) }
    pub fn ends_with(self, rhs: impl Into<Expr>) -> Self { Self::binary(BinaryOp::EndsWith, self, rhs) }
    pub fn contains(self, rhs: impl Into<Expr>) -> Self { Self::binary(BinaryOp::Contains, self, rhs) }

    pub fn to_text(self) -> Self {
        Expr::ToText(Box::new(self))
    }
}

macro_rules! literal_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Expr {
            fn from(v: $t) -> Self { Expr::Literal(Value::from(v)) }
        })*
    };
}

literal_from!(bool, i32, i64, u32, f64, String, &str);

impl From<Value> for Expr {
    fn from(v: Value) -> Self { Expr::Literal(v) }
}

macro_rules! binary_operator {
    ($($tr:ident :: $method:ident => $op:ident),*) => {
        $(impl<R: Into<Expr>> ops::$tr<R> for Expr {
            type Output = Expr;
            fn $method(self, rhs: R) -> Expr { Expr::binary(BinaryOp::$op, self, rhs) }
        })*
    };
}

binary_operator!(Add::add => Add, Sub::sub => Sub, Mul::mul => Mul, Div::div => Div, Rem::rem => Rem);

impl ops::Not for Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

// ============================================================================
// Parameters
// ============================================================================

impl Expr {
    /// Replace every occurrence of parameter `name` with a literal.
    pub fn bind(self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.bind_value(name, &value)
    }

    fn bind_value(self, name: &str, value: &Value) -> Self {
        match self {
            Expr::Param(p) if p == name => Expr::Literal(value.clone()),
            Expr::Not(inner) => Expr::Not(Box::new(inner.bind_value(name, value))),
            Expr::ToText(inner) => Expr::ToText(Box::new(inner.bind_value(name, value))),
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op,
                lhs: Box::new(lhs.bind_value(name, value)),
                rhs: Box::new(rhs.bind_value(name, value)),
            },
            other => other,
        }
    }

    /// Names of all parameters still unbound.
    pub fn params(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_params(&mut out);
        out
    }

    fn collect_params(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Param(p) => { out.insert(p.clone()); }
            Expr::Not(inner) | Expr::ToText(inner) => inner.collect_params(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_params(out);
                rhs.collect_params(out);
            }
            Expr::Literal(_) | Expr::Attr(_) => {}
        }
    }
}

// ============================================================================
// Evaluation
// ============================================================================

impl Expr {
    /// Evaluate against a vertex and interpret the result as a filter
    /// decision: true passes, false or NULL excludes.
    pub fn matches<V: Vertex>(&self, vertex: &V) -> Result<bool> {
        match self.eval(vertex)? {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(Error::type_error("BOOLEAN", &other)),
        }
    }

    pub fn eval<V: Vertex>(&self, vertex: &V) -> Result<Value> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Attr(name) => Ok(vertex.attribute(name).unwrap_or(Value::Null)),
            Expr::Param(name) => Err(Error::UnboundParameter(name.clone())),
            Expr::Not(inner) => match inner.eval(vertex)? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                Value::Null => Ok(Value::Null),
                other => Err(Error::type_error("BOOLEAN", &other)),
            },
            Expr::ToText(inner) => Ok(match inner.eval(vertex)? {
                Value::Null => Value::Null,
                Value::String(s) => Value::String(s),
                other => Value::String(other.to_string()),
            }),
            Expr::Binary { op: BinaryOp::And, lhs, rhs } => {
                let l = logical_operand(lhs.eval(vertex)?)?;
                if l == Some(false) {
                    return Ok(Value::Bool(false));
                }
                let r = logical_operand(rhs.eval(vertex)?)?;
                Ok(match (l, r) {
                    (_, Some(false)) => Value::Bool(false),
                    (Some(true), Some(true)) => Value::Bool(true),
                    _ => Value::Null,
                })
            }
            Expr::Binary { op: BinaryOp::Or, lhs, rhs } => {
                let l = logical_operand(lhs.eval(vertex)?)?;
                if l == Some(true) {
                    return Ok(Value::Bool(true));
                }
                let r = logical_operand(rhs.eval(vertex)?)?;
                Ok(match (l, r) {
                    (_, Some(true)) => Value::Bool(true),
                    (Some(false), Some(false)) => Value::Bool(false),
                    _ => Value::Null,
                })
            }
            Expr::Binary { op, lhs, rhs } => {
                let l = lhs.eval(vertex)?;
                let r = rhs.eval(vertex)?;
                apply(*op, l, r)
            }
        }
    }
}

fn logical_operand(v: Value) -> Result<Option<bool>> {
    match v {
        Value::Bool(b) => Ok(Some(b)),
        Value::Null => Ok(None),
        other => Err(Error::type_error("BOOLEAN", &other)),
    }
}

fn apply(op: BinaryOp, l: Value, r: Value) -> Result<Value> {
    use std::cmp::Ordering;

    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    match op {
        BinaryOp::Eq => Ok(l.loose_eq(&r).map_or(Value::Null, Value::Bool)),
        BinaryOp::Ne => Ok(l.loose_eq(&r).map_or(Value::Null, |eq| Value::Bool(!eq))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let Some(ord) = l.compare(&r) else {
                // NaN compares as unknown; anything else is a type mismatch.
                if l.is_numeric() && r.is_numeric() {
                    return Ok(Value::Null);
                }
                return Err(Error::Incomparable {
                    left: l.type_name().to_string(),
                    right: r.type_name().to_string(),
                });
            };
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, l, r)
        }
        BinaryOp::StartsWith | BinaryOp::EndsWith => match (&l, &r) {
            (Value::String(a), Value::String(b)) => Ok(Value::Bool(if op == BinaryOp::StartsWith {
                a.starts_with(b.as_str())
            } else {
                a.ends_with(b.as_str())
            })),
            (Value::String(_), other) => Err(Error::type_error("STRING", other)),
            (other, _) => Err(Error::type_error("STRING", other)),
        },
        BinaryOp::Contains => match (&l, &r) {
            (Value::String(a), Value::String(b)) => Ok(Value::Bool(a.contains(b.as_str()))),
            (Value::List(items), needle) => Ok(Value::Bool(
                items.iter().any(|item| item.loose_eq(needle) == Some(true)),
            )),
            (Value::String(_), other) => Err(Error::type_error("STRING", other)),
            (other, _) => Err(Error::type_error("STRING or LIST", other)),
        },
        BinaryOp::And | BinaryOp::Or => unreachable!("logical operators are evaluated lazily"),
    }
}

fn arithmetic(op: BinaryOp, l: Value, r: Value) -> Result<Value> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => {
            let out = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div | BinaryOp::Rem if b == 0 => {
                    return Err(Error::Arithmetic(format!("{a} {} 0", op.symbol())));
                }
                BinaryOp::Div => a.checked_div(b),
                _ => a.checked_rem(b),
            };
            out.map(Value::Int).ok_or_else(|| {
                Error::Arithmetic(format!("integer overflow in {a} {} {b}", op.symbol()))
            })
        }
        (Value::String(a), Value::String(b)) if op == BinaryOp::Add => Ok(Value::String(a + &b)),
        (l, r) => {
            let (Some(a), Some(b)) = (l.as_float(), r.as_float()) else {
                let culprit = if l.is_numeric() { r } else { l };
                return Err(Error::type_error("number", &culprit));
            };
            Ok(Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            }))
        }
    }
}

// ============================================================================
// Canonical rendering
// ============================================================================

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        // `{:?}` always shows a fraction or exponent, keeping floats apart from ints.
        Value::Float(v) => write!(f, "{v:?}"),
        Value::String(s) => write!(f, "{s:?}"),
        Value::Bytes(b) => write!(f, "bytes{b:?}"),
        Value::List(items) => {
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 { write!(f, ", ")?; }
                write_literal(f, item)?;
            }
            write!(f, "]")
        }
        Value::Map(m) => {
            let mut entries: Vec<_> = m.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            write!(f, "{{")?;
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 { write!(f, ", ")?; }
                write!(f, "{k:?}: ")?;
                write_literal(f, v)?;
            }
            write!(f, "}}")
        }
        other => write!(f, "{other}"),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => write_literal(f, v),
            Expr::Attr(name) if is_identifier(name) => write!(f, "v.{name}"),
            Expr::Attr(name) => write!(f, "v[{name:?}]"),
            Expr::Param(name) if is_identifier(name) => write!(f, "${name}"),
            Expr::Param(name) => write!(f, "$[{name:?}]"),
            Expr::Not(inner) => write!(f, "(!{inner})"),
            Expr::ToText(inner) => write!(f, "text({inner})"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
        }
    }
}
