//! Closed error catalog for the GSM virtual machine.
//!
//! Every recoverable failure mode the VM can produce is represented here as
//! a variant of [`ErrorKind`]; the conversion to a user-visible message goes
//! through `Display`, mirroring the hand-rolled `VmError` of the teacher VM
//! rather than pulling in `thiserror` for a type this small and this close
//! to the value system.

use std::fmt;

/// The closed set of error kinds a VM operation can report (`spec.md` §7).
///
/// `Serialize`-only (no `Deserialize`): a host embedding the VM may want
/// to log a structured error record (e.g. via `log`'s `kv` support or a
/// JSON error sink), but reconstructing an `ErrorKind` from serialized
/// data makes no sense (some variants borrow `&'static str`, which
/// doesn't round-trip).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum ErrorKind {
    StackUnderflow,
    TypeMismatch { left: &'static str, right: &'static str },
    DivisionByZero,
    IndexError { index: i64, len: usize },
    UndefinedRef(String),
    SubNotSupported(String),
    SubRefOnNonStructured(String),
    NoLValue,
    UnknownFunction(String),
    UnknownParam { func: String, param: String },
    AmbiguousParam { func: String, param: String },
    NoOverloadMatch(String),
    MissingParam { func: String, param: String },
    HandlerFailure(String),
    NonBoolBranch,
    InternalInvariant(String),
}

impl ErrorKind {
    /// `InternalInvariant` is the one kind that, under a strict config,
    /// aborts the process instead of degrading to a pushed `err` value
    /// (`spec.md` §7).
    pub fn is_internal_invariant(&self) -> bool {
        matches!(self, ErrorKind::InternalInvariant(_))
    }

    /// Render the message that would be reported to the error sink.
    /// Never empty: an "already reported, suppress" `err` value is a
    /// property of [`crate::value::Value::Err`], not of `ErrorKind`.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackUnderflow => write!(f, "stack underflow"),
            Self::TypeMismatch { left, right } => {
                write!(f, "type mismatch: {} and {}", left, right)
            }
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::IndexError { index, len } => {
                write!(f, "index {} out of range for list of length {}", index, len)
            }
            Self::UndefinedRef(name) => write!(f, "undefined reference: {}", name),
            Self::SubNotSupported(name) => {
                write!(f, "value bound to `{}` does not support sub-variables", name)
            }
            Self::SubRefOnNonStructured(name) => {
                write!(f, "`{}` is not a structured opaque value", name)
            }
            Self::NoLValue => write!(f, "left-hand side is not assignable"),
            Self::UnknownFunction(name) => write!(f, "unknown function: {}", name),
            Self::UnknownParam { func, param } => {
                write!(f, "{}: unknown parameter `{}`", func, param)
            }
            Self::AmbiguousParam { func, param } => {
                write!(f, "{}: ambiguous parameter name `{}`", func, param)
            }
            Self::NoOverloadMatch(func) => {
                write!(f, "{}: no overload matches the bound argument types", func)
            }
            Self::MissingParam { func, param } => {
                write!(f, "{}: missing required parameter `{}`", func, param)
            }
            Self::HandlerFailure(func) => write!(f, "{}: handler returned no value", func),
            Self::NonBoolBranch => write!(f, "branch condition is not a bool"),
            Self::InternalInvariant(msg) => write!(f, "internal invariant violated: {}", msg),
        }
    }
}

impl std::error::Error for ErrorKind {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn division_by_zero_message_is_non_empty() {
        assert_eq!(ErrorKind::DivisionByZero.message(), "division by zero");
    }

    #[test]
    fn internal_invariant_is_flagged() {
        assert!(ErrorKind::InternalInvariant("bad".into()).is_internal_invariant());
        assert!(!ErrorKind::StackUnderflow.is_internal_invariant());
    }

    #[test]
    fn type_mismatch_names_both_kinds() {
        let e = ErrorKind::TypeMismatch { left: "int", right: "string" };
        assert_eq!(e.to_string(), "type mismatch: int and string");
    }
}
