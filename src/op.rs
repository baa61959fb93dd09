//! Operator dispatch over [`Value`] (`spec.md` §4.1).
//!
//! One entry point per arity (`apply_unary`, `apply_binary`); both take
//! already-popped operands (reference resolution is the caller's job, via
//! [`crate::value::Value::is_ref`] plus an `Env` lookup) and return a fresh
//! `Value` rather than mutating in place, mirroring the teacher's
//! `vm::exec::arithmetic` which computes a `result` and leaves stack
//! placement to the caller.

use crate::error::ErrorKind;
use crate::value::{Data, Value};
use num_rational::BigRational;
use num_traits::Zero;
use std::cmp::Ordering;

/// The closed operator set of `spec.md` §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OpKind {
    Add,
    Subtract,
    Multiply,
    Divide,
    IntegerDivide,
    Modulus,
    Negate,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
}

impl OpKind {
    pub fn is_unary(self) -> bool {
        matches!(self, OpKind::Negate | OpKind::Not)
    }

    fn is_relational(self) -> bool {
        matches!(
            self,
            OpKind::Eq | OpKind::Ne | OpKind::Lt | OpKind::Le | OpKind::Gt | OpKind::Ge
        )
    }
}

/// Apply a binary operator to two already-dereferenced operands
/// (`spec.md` §4.1: "pop right then left; each is dereferenced if it is a
/// `ref`"). Relational operators yield `bool`; everything else yields a
/// value of the operands' shared kind (or `rat` for the `int / int`
/// special case).
pub fn apply_binary(op: OpKind, left: Value, right: Value) -> Result<Value, ErrorKind> {
    use Data::*;
    match (op, left.data, right.data) {
        // `spec.md` §4.1: "the special-case DIVIDE of two int values":
        // exact rational quotient when the divisor is non-zero.
        (OpKind::Divide, Int(a), Int(b)) => {
            if b.is_zero() {
                Err(ErrorKind::DivisionByZero)
            } else {
                Ok(Value::rat(BigRational::new(a, b)))
            }
        }

        (op, Int(a), Int(b)) => int_op(op, a, b),
        (op, Rat(a), Rat(b)) => rat_op(op, a, b),
        (op, Float(a), Float(b)) => float_op(op, a, b),
        (op, Str(a), Str(b)) => string_op(op, a, b),
        (op, Bool(a), Bool(b)) => bool_op(op, a, b),

        (_, l, r) => Err(ErrorKind::TypeMismatch { left: l.kind_label(), right: r.kind_label() }),
    }
}

/// Apply a unary operator to one already-dereferenced operand
/// (`spec.md` §4.1).
pub fn apply_unary(op: OpKind, operand: Value) -> Result<Value, ErrorKind> {
    use Data::*;
    match (op, operand.data) {
        (OpKind::Negate, Int(a)) => Ok(Value::int(-a)),
        (OpKind::Negate, Rat(a)) => Ok(Value::rat(-a)),
        (OpKind::Negate, Float(a)) => Ok(Value::float(-a)),
        (OpKind::Not, Bool(a)) => Ok(Value::bool(!a)),
        (_, other) => Err(ErrorKind::TypeMismatch { left: other.kind_label(), right: other.kind_label() }),
    }
}

fn int_op(op: OpKind, a: num_bigint::BigInt, b: num_bigint::BigInt) -> Result<Value, ErrorKind> {
    match op {
        OpKind::Add => Ok(Value::int(a + b)),
        OpKind::Subtract => Ok(Value::int(a - b)),
        OpKind::Multiply => Ok(Value::int(a * b)),
        OpKind::IntegerDivide => {
            if b.is_zero() {
                Err(ErrorKind::DivisionByZero)
            } else {
                Ok(Value::int(a / b))
            }
        }
        OpKind::Modulus => {
            if b.is_zero() {
                Err(ErrorKind::DivisionByZero)
            } else {
                Ok(Value::int(a % b))
            }
        }
        op if op.is_relational() => Ok(Value::bool(compare(op, a.cmp(&b))?)),
        _ => Err(ErrorKind::TypeMismatch { left: "int", right: "int" }),
    }
}

fn rat_op(op: OpKind, a: BigRational, b: BigRational) -> Result<Value, ErrorKind> {
    match op {
        OpKind::Add => Ok(Value::rat(a + b)),
        OpKind::Subtract => Ok(Value::rat(a - b)),
        OpKind::Multiply => Ok(Value::rat(a * b)),
        OpKind::Divide => {
            if b.is_zero() {
                Err(ErrorKind::DivisionByZero)
            } else {
                Ok(Value::rat(a / b))
            }
        }
        op if op.is_relational() => Ok(Value::bool(compare(op, a.cmp(&b))?)),
        _ => Err(ErrorKind::TypeMismatch { left: "rat", right: "rat" }),
    }
}

fn float_op(op: OpKind, a: f64, b: f64) -> Result<Value, ErrorKind> {
    match op {
        OpKind::Add => Ok(Value::float(a + b)),
        OpKind::Subtract => Ok(Value::float(a - b)),
        OpKind::Multiply => Ok(Value::float(a * b)),
        OpKind::Divide => Ok(Value::float(a / b)),
        op if op.is_relational() => {
            let ord = a.partial_cmp(&b).ok_or(ErrorKind::TypeMismatch { left: "float", right: "float" })?;
            Ok(Value::bool(compare(op, ord)?))
        }
        _ => Err(ErrorKind::TypeMismatch { left: "float", right: "float" }),
    }
}

fn string_op(op: OpKind, a: String, b: String) -> Result<Value, ErrorKind> {
    match op {
        OpKind::Add => Ok(Value::str(a + &b)),
        op if op.is_relational() => Ok(Value::bool(compare(op, a.cmp(&b))?)),
        _ => Err(ErrorKind::TypeMismatch { left: "string", right: "string" }),
    }
}

fn bool_op(op: OpKind, a: bool, b: bool) -> Result<Value, ErrorKind> {
    match op {
        OpKind::And => Ok(Value::bool(a && b)),
        OpKind::Or => Ok(Value::bool(a || b)),
        OpKind::Eq => Ok(Value::bool(a == b)),
        OpKind::Ne => Ok(Value::bool(a != b)),
        _ => Err(ErrorKind::TypeMismatch { left: "bool", right: "bool" }),
    }
}

fn compare(op: OpKind, ord: Ordering) -> Result<bool, ErrorKind> {
    Ok(match op {
        OpKind::Eq => ord == Ordering::Equal,
        OpKind::Ne => ord != Ordering::Equal,
        OpKind::Lt => ord == Ordering::Less,
        OpKind::Le => ord != Ordering::Greater,
        OpKind::Gt => ord == Ordering::Greater,
        OpKind::Ge => ord != Ordering::Less,
        _ => return Err(ErrorKind::InternalInvariant("compare called with a non-relational op".into())),
    })
}
