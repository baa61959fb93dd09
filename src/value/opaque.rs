//! Host-registered opaque domain objects (`spec.md` §3: "an open set of
//! `opaque-<T>` kinds for host-registered domain objects, of which some
//! ... declare that they admit sub-variables").
//!
//! The VM core never names a concrete opaque type; a host (the
//! game-theory library, in the system this language was distilled from)
//! implements this trait for its own node/profile/solver handles and
//! registers instances through [`crate::value::Value::opaque_of`].

use crate::error::ErrorKind;
use crate::value::Value;
use std::fmt;

/// A string-keyed inner mapping a "structured" opaque value exposes
/// (`spec.md` §3, §4.3). Implement this for opaque kinds that support
/// `name.sub` reference forms; leave it unimplemented (the default)
/// otherwise.
pub trait SubVariables: fmt::Debug {
    fn get_sub(&self, name: &str) -> Option<Value>;
    fn set_sub(&mut self, name: &str, value: Value) -> Result<(), ErrorKind>;
}

/// A host-registered domain object held as a [`crate::value::Data::Opaque`].
pub trait OpaqueValue: fmt::Debug {
    /// The tag surfaced through `ValueKind::Opaque(name)` and error
    /// messages; stable per concrete Rust type.
    fn type_name(&self) -> &'static str;

    /// Canonical textual rendering for `OUTPUT`/`Dump` (`spec.md` §6).
    /// No universal default makes sense across arbitrary host objects,
    /// so implementors must supply one.
    fn render(&self) -> String;

    /// `Some(self)` for opaque kinds that admit sub-variables
    /// (`spec.md` §3, "structured" opaque kinds); `None` otherwise.
    fn sub_variables(&self) -> Option<&dyn SubVariables> {
        None
    }

    fn sub_variables_mut(&mut self) -> Option<&mut dyn SubVariables> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Counter(i64);

    impl OpaqueValue for Counter {
        fn type_name(&self) -> &'static str {
            "counter"
        }

        fn render(&self) -> String {
            format!("Counter({})", self.0)
        }
    }

    #[test]
    fn plain_opaque_has_no_sub_variables() {
        let c = Counter(3);
        assert!(c.sub_variables().is_none());
        assert_eq!(c.render(), "Counter(3)");
        assert_eq!(c.type_name(), "counter");
    }
}
