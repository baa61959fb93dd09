//! The binding table: identifier -> owned [`Value`], with sub-variable
//! delegation to structured opaque values (`spec.md` §4.3).

use crate::error::ErrorKind;
use crate::value::{Data, Value};
use std::collections::HashMap;

/// Mapping from identifier to owned value. Insertion order is irrelevant
/// (`spec.md` §3).
#[derive(Debug, Default)]
pub struct Env {
    bindings: HashMap<String, Value>,
}

impl Env {
    pub fn new() -> Self {
        Self { bindings: HashMap::new() }
    }

    /// Take ownership of `value`, replacing any prior binding.
    pub fn define(&mut self, name: &str, value: Value) {
        self.bindings.insert(name.to_string(), value);
    }

    /// Borrow the bound value, if any.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// Drop the binding; a no-op if undefined.
    pub fn remove(&mut self, name: &str) {
        self.bindings.remove(name);
    }

    /// `Lookup(name, sub)` (`spec.md` §4.3): delegate to the bound
    /// value's sub-variable mapping if it supports one.
    pub fn lookup_sub(&self, name: &str, sub: &str) -> Result<Value, ErrorKind> {
        match self.bindings.get(name) {
            None => Err(ErrorKind::UndefinedRef(name.to_string())),
            Some(value) => match &value.data {
                Data::Opaque(o) => {
                    let borrowed = o.borrow();
                    match borrowed.sub_variables() {
                        Some(subs) => subs
                            .get_sub(sub)
                            .ok_or_else(|| ErrorKind::SubRefOnNonStructured(name.to_string())),
                        None => Err(ErrorKind::SubNotSupported(name.to_string())),
                    }
                }
                _ => Err(ErrorKind::SubNotSupported(name.to_string())),
            },
        }
    }

    /// `Assign(name, sub, v)` (`spec.md` §4.3): delegate to the bound
    /// value's sub-variable mapping.
    pub fn assign_sub(&mut self, name: &str, sub: &str, v: Value) -> Result<(), ErrorKind> {
        match self.bindings.get_mut(name) {
            None => Err(ErrorKind::UndefinedRef(name.to_string())),
            Some(value) => match &mut value.data {
                Data::Opaque(o) => {
                    let mut borrowed = o.borrow_mut();
                    match borrowed.sub_variables_mut() {
                        Some(subs) => subs.set_sub(sub, v),
                        None => Err(ErrorKind::SubNotSupported(name.to_string())),
                    }
                }
                _ => Err(ErrorKind::SubNotSupported(name.to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_then_lookup_round_trips() {
        let mut env = Env::new();
        env.define("x", Value::int(5));
        assert_eq!(env.lookup("x").unwrap().as_int().unwrap(), &num_bigint::BigInt::from(5));
    }

    #[test]
    fn lookup_copies_value_mutation_does_not_affect_binding() {
        // `spec.md` §8 property 6: looking up a binding yields a value
        // whose later mutation (here, re-binding through a fresh clone)
        // never reaches back into the table except via a further Define.
        let mut env = Env::new();
        env.define("x", Value::int(5));
        let mut looked_up = env.lookup("x").unwrap().clone();
        looked_up = Value::int(num_bigint::BigInt::from(999));
        let _ = looked_up;
        assert_eq!(env.lookup("x").unwrap().as_int().unwrap(), &num_bigint::BigInt::from(5));
    }

    #[test]
    fn remove_is_noop_on_undefined() {
        let mut env = Env::new();
        env.remove("missing");
        assert!(env.lookup("missing").is_none());
    }

    #[test]
    fn sub_lookup_on_plain_value_is_unsupported() {
        let mut env = Env::new();
        env.define("x", Value::int(5));
        assert_eq!(
            env.lookup_sub("x", "field").unwrap_err(),
            ErrorKind::SubNotSupported("x".to_string())
        );
    }

    #[test]
    fn sub_lookup_on_undefined_name_is_undefined_ref() {
        let env = Env::new();
        assert_eq!(
            env.lookup_sub("ghost", "field").unwrap_err(),
            ErrorKind::UndefinedRef("ghost".to_string())
        );
    }
}
