//! Expression evaluation with dependency capture.
//!
//! [`evaluate`] walks an [`Expr`] against a [`Scope`] and produces both a
//! value and the set of keypaths the value was derived from. The deps map
//! is what makes re-render precise: a binding re-evaluates only when one
//! of its recorded keypaths changes.
//!
//! # Invariants
//!
//! - Every scope resolution is recorded in `deps`, hits and misses alike.
//!   A miss records the requested keypath against `Undefined` so a later
//!   write to that keypath still invalidates the binding.
//! - `&&`, `||`, and `?:` record only the branch actually taken. The
//!   untaken branch contributes no deps.
//! - A member chain resolves as one joined keypath through a single scope
//!   lookup; only computed segments evaluate sub-expressions.
//!
//! # Failure Modes
//!
//! | Operation | Degenerate input | Behavior |
//! |---|---|---|
//! | `Call` | callee is not a function | `EvalError::NotCallable` |
//! | arithmetic | non-numeric operand | `NaN` propagates |
//! | comparison | `NaN` operand | comparison is `false` |

use std::fmt;

use weft_core::value::format_number;
use weft_core::{keypath, DepsMap, Lookup, Value};

use crate::ast::{BinaryOp, Expr, UnaryOp};

/// Resolution environment for identifiers and member chains.
///
/// Implementations decide how a keypath maps to data: a render context
/// walks its scope chain, a flat scope indexes a single value.
pub trait Scope {
    fn get(&self, keypath: &str) -> Lookup;
}

/// A value together with the keypaths it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluated {
    pub value: Value,
    pub deps: DepsMap,
}

impl Evaluated {
    fn pure(value: Value) -> Evaluated {
        Evaluated {
            value,
            deps: DepsMap::new(),
        }
    }

    fn absorb(&mut self, other: Evaluated) -> Value {
        self.deps.extend(other.deps);
        other.value
    }
}

/// Evaluation failure.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// A call target resolved to something that is not a function.
    NotCallable { callee: String },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::NotCallable { callee } => {
                write!(f, "`{callee}` is not callable")
            }
        }
    }
}

impl std::error::Error for EvalError {}

/// Evaluate `node` against `scope`, capturing deps along the way.
pub fn evaluate(node: &Expr, scope: &dyn Scope) -> Result<Evaluated, EvalError> {
    match node {
        Expr::Literal { value, .. } => Ok(Evaluated::pure(value.clone())),
        Expr::Identifier { name } => Ok(record(scope.get(name))),
        Expr::Array { elements } => {
            let mut out = Evaluated::pure(Value::Undefined);
            let mut items = Vec::with_capacity(elements.len());
            for element in elements {
                let item = evaluate(element, scope)?;
                items.push(out.absorb(item));
            }
            out.value = Value::Array(items);
            Ok(out)
        }
        Expr::Unary { operator, arg } => {
            let mut inner = evaluate(arg, scope)?;
            inner.value = apply_unary(*operator, &inner.value);
            Ok(inner)
        }
        Expr::Binary {
            left,
            operator,
            right,
        } => evaluate_binary(left, *operator, right, scope),
        Expr::Ternary {
            test,
            consequent,
            alternate,
        } => {
            let mut out = evaluate(test, scope)?;
            let branch = if out.value.truthy() {
                consequent
            } else {
                alternate
            };
            let taken = evaluate(branch, scope)?;
            out.value = out.absorb(taken);
            Ok(out)
        }
        Expr::Member { .. } => evaluate_member(node, scope),
        Expr::Call { callee, args } => {
            let mut out = evaluate(callee, scope)?;
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                let arg = evaluate(arg, scope)?;
                values.push(out.absorb(arg));
            }
            match out.value.as_function() {
                Some(f) => {
                    out.value = f.call(&values);
                    Ok(out)
                }
                None => Err(EvalError::NotCallable {
                    callee: callee.to_source(),
                }),
            }
        }
    }
}

fn record(lookup: Lookup) -> Evaluated {
    let value = lookup.value();
    let mut deps = DepsMap::new();
    deps.insert(lookup.keypath().to_string(), value.clone());
    Evaluated { value, deps }
}

/// `&&` and `||` short-circuit and yield the deciding operand's value.
/// Only the evaluated side contributes deps.
fn evaluate_binary(
    left: &Expr,
    operator: BinaryOp,
    right: &Expr,
    scope: &dyn Scope,
) -> Result<Evaluated, EvalError> {
    let mut out = evaluate(left, scope)?;
    match operator {
        BinaryOp::Or => {
            if !out.value.truthy() {
                let rhs = evaluate(right, scope)?;
                out.value = out.absorb(rhs);
            }
            Ok(out)
        }
        BinaryOp::And => {
            if out.value.truthy() {
                let rhs = evaluate(right, scope)?;
                out.value = out.absorb(rhs);
            }
            Ok(out)
        }
        _ => {
            let rhs = evaluate(right, scope)?;
            let right_value = out.absorb(rhs);
            out.value = apply_binary(operator, &out.value, &right_value);
            Ok(out)
        }
    }
}

/// Flatten the chain, stringify each segment into a keypath key, and
/// resolve the joined path through one scope lookup.
fn evaluate_member(node: &Expr, scope: &dyn Scope) -> Result<Evaluated, EvalError> {
    let parts = node.flatten_member();
    let mut deps = DepsMap::new();
    let mut keys: Vec<String> = Vec::with_capacity(parts.len());
    for (index, part) in parts.iter().enumerate() {
        match part {
            Expr::Identifier { name } if index == 0 => keys.push(name.clone()),
            Expr::Literal { value, .. } => keys.push(segment_key(value)),
            computed => {
                let inner = evaluate(computed, scope)?;
                deps.extend(inner.deps);
                keys.push(segment_key(&inner.value));
            }
        }
    }
    let joined = keypath::stringify(&keys);
    let lookup = scope.get(&joined);
    let value = lookup.value();
    deps.insert(lookup.keypath().to_string(), value.clone());
    Ok(Evaluated { value, deps })
}

fn segment_key(value: &Value) -> String {
    match value {
        Value::Number(n) => format_number(*n),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn apply_unary(operator: UnaryOp, value: &Value) -> Value {
    match operator {
        UnaryOp::Plus => Value::Number(value.to_number()),
        UnaryOp::Minus => Value::Number(-value.to_number()),
        UnaryOp::Not => Value::Bool(!value.truthy()),
        UnaryOp::BitNot => Value::Number(f64::from(!to_int32(value))),
        UnaryOp::ToBool => Value::Bool(value.truthy()),
    }
}

fn apply_binary(operator: BinaryOp, left: &Value, right: &Value) -> Value {
    match operator {
        BinaryOp::Add => {
            if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                let mut out = concat_text(left);
                out.push_str(&concat_text(right));
                Value::String(out)
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Mod => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::LooseEq => Value::Bool(left.loose_eq(right)),
        BinaryOp::LooseNe => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_eq(right)),
        BinaryOp::StrictNe => Value::Bool(!left.strict_eq(right)),
        BinaryOp::Lt => compare(left, right, |o| o == std::cmp::Ordering::Less),
        BinaryOp::Lte => compare(left, right, |o| o != std::cmp::Ordering::Greater),
        BinaryOp::Gt => compare(left, right, |o| o == std::cmp::Ordering::Greater),
        BinaryOp::Gte => compare(left, right, |o| o != std::cmp::Ordering::Less),
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit ops handled by caller"),
    }
}

/// Ordered comparison: two strings compare lexicographically, anything
/// else compares numerically. `NaN` makes every comparison false.
fn compare(left: &Value, right: &Value, pick: fn(std::cmp::Ordering) -> bool) -> Value {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return Value::Bool(pick(a.as_str().cmp(b.as_str())));
    }
    match left.to_number().partial_cmp(&right.to_number()) {
        Some(ordering) => Value::Bool(pick(ordering)),
        None => Value::Bool(false),
    }
}

/// Text form for `+` concatenation. Primitives spell themselves out;
/// containers fall back to their display form.
fn concat_text(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 32-bit truncation for `~`: non-finite maps to 0, the rest wraps
/// modulo 2^32 into signed range.
fn to_int32(value: &Value) -> i32 {
    let n = value.to_number();
    if !n.is_finite() {
        return 0;
    }
    let wrapped = n.trunc().rem_euclid(4_294_967_296.0);
    if wrapped >= 2_147_483_648.0 {
        (wrapped - 4_294_967_296.0) as i32
    } else {
        wrapped as i32
    }
}
