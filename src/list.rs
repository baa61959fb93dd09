//! List construction and shadow-subscript semantics (`spec.md` §4.2).
//!
//! A list is an ordered, shared, mutable sequence of [`Value`]
//! (`ListHandle = Rc<RefCell<Vec<Value>>>`). Subscripting a list does not
//! hand back the element itself; it hands back a *shadow* — an
//! independent copy carrying a `shadow_of` back-reference to the slot it
//! came from, so that assigning through the shadow later mutates that
//! slot (`spec.md` §4.2, §8 property 5, scenario D).

use crate::error::ErrorKind;
use crate::value::{ListHandle, Value};
use num_traits::ToPrimitive;
use std::cell::RefCell;
use std::rc::Rc;

/// Build a new list from already-resolved elements, in the order given
/// (`spec.md` §4.2: "the first-pushed element is first in the list").
pub fn construct(elements: Vec<Value>) -> ListHandle {
    Rc::new(RefCell::new(elements))
}

/// External surface indices are 1-based (`spec.md` §3).
pub fn subscript(list: &ListHandle, one_based_index: &num_bigint::BigInt) -> Result<Value, ErrorKind> {
    let len = list.borrow().len();
    let idx = match one_based_index_to_usize(one_based_index, len) {
        Some(i) => i,
        None => {
            return Err(ErrorKind::IndexError {
                index: bigint_to_i64_lossy(one_based_index),
                len,
            })
        }
    };
    let element = list.borrow()[idx].clone().without_shadow();
    Ok(element.as_shadow(Rc::clone(list), idx))
}

/// Overwrite the slot a shadow refers to with a fresh, shadow-free copy
/// of `new_value`, and return that same copy (`spec.md` §4.2: "`Assign`
/// ... replaces that slot's value with a copy of the right-hand value,
/// and pushes the right-hand value's copy").
pub fn assign_through_shadow(list: &ListHandle, index: usize, new_value: Value) -> Value {
    let stored = new_value.without_shadow();
    let result = stored.clone();
    list.borrow_mut()[index] = stored;
    result
}

fn one_based_index_to_usize(index: &num_bigint::BigInt, len: usize) -> Option<usize> {
    let i = index.to_i64()?;
    if i < 1 || (i as usize) > len {
        None
    } else {
        Some((i - 1) as usize)
    }
}

fn bigint_to_i64_lossy(v: &num_bigint::BigInt) -> i64 {
    v.to_i64().unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscript_is_one_based() {
        let list = construct(vec![Value::int(10), Value::int(20), Value::int(30)]);
        let first = subscript(&list, &num_bigint::BigInt::from(1)).unwrap();
        assert_eq!(first.as_int().unwrap(), &num_bigint::BigInt::from(10));
    }

    #[test]
    fn subscript_out_of_range_is_index_error() {
        let list = construct(vec![Value::int(1)]);
        let err = subscript(&list, &num_bigint::BigInt::from(2)).unwrap_err();
        assert_eq!(err, ErrorKind::IndexError { index: 2, len: 1 });
    }

    #[test]
    fn assigning_through_shadow_mutates_origin_slot() {
        let list = construct(vec![Value::int(1), Value::int(2), Value::int(3)]);
        let shadow = subscript(&list, &num_bigint::BigInt::from(2)).unwrap();
        let shadow_of = shadow.shadow_of.clone().unwrap();
        assign_through_shadow(&shadow_of.list, shadow_of.index, Value::int(99));
        let values: Vec<i64> = list
            .borrow()
            .iter()
            .map(|v| v.as_int().unwrap().to_i64().unwrap())
            .collect();
        assert_eq!(values, vec![1, 99, 3]);
    }

    #[test]
    fn shadow_destruction_never_touches_origin() {
        let list = construct(vec![Value::int(7)]);
        let shadow = subscript(&list, &num_bigint::BigInt::from(1)).unwrap();
        drop(shadow);
        assert_eq!(list.borrow()[0].as_int().unwrap(), &num_bigint::BigInt::from(7));
    }
}
