//! Function registry and the overload-resolving call accumulator
//! (`spec.md` §4.4).
//!
//! A [`FuncRegistry`] holds one [`FuncDescriptor`] per registered name; each
//! descriptor lists one or more [`Overload`]s. A [`CallFrame`] is the
//! per-in-flight-call accumulator: it narrows the viable overload set as
//! each `Bind*` fixes a parameter slot (`spec.md` §4.4, §9: "represent as
//! an immutable table indexed by the parameter-type tuple; narrow
//! incrementally").

use crate::error::ErrorKind;
use crate::value::{ListHandle, RefName, Value, ValueKind};
use std::collections::HashMap;
use std::rc::Rc;

/// How a declared overload parameter is passed (`spec.md` §3, Function
/// descriptor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    ByValue,
    ByRef,
}

/// The declared acceptable type for a parameter; `Any` matches every
/// kind (used by functions that accept heterogeneous arguments, e.g. a
/// generic `Print`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Any,
    Exact(ValueKindTag),
}

/// A `'static`-friendly mirror of [`ValueKind`] for use in declared
/// signatures (opaque kinds are matched by name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKindTag {
    Bool,
    Int,
    Rat,
    Float,
    Str,
    List,
    Stream,
    Ref,
    Err,
    Opaque(&'static str),
}

impl ParamType {
    fn matches(&self, kind: &ValueKind) -> bool {
        match self {
            ParamType::Any => true,
            ParamType::Exact(tag) => tag.matches(kind),
        }
    }
}

impl ValueKindTag {
    fn matches(&self, kind: &ValueKind) -> bool {
        match (self, kind) {
            (ValueKindTag::Bool, ValueKind::Bool) => true,
            (ValueKindTag::Int, ValueKind::Int) => true,
            (ValueKindTag::Rat, ValueKind::Rat) => true,
            (ValueKindTag::Float, ValueKind::Float) => true,
            (ValueKindTag::Str, ValueKind::Str) => true,
            (ValueKindTag::List, ValueKind::List) => true,
            (ValueKindTag::Stream, ValueKind::Stream) => true,
            (ValueKindTag::Ref, ValueKind::Ref) => true,
            (ValueKindTag::Err, ValueKind::Err) => true,
            (ValueKindTag::Opaque(a), ValueKind::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

/// One declared parameter of an [`Overload`].
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub type_spec: ParamType,
    pub default: Option<Value>,
    pub pass_mode: PassMode,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, type_spec: ParamType, pass_mode: PassMode) -> Self {
        Self { name: name.into(), type_spec, default: None, pass_mode }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// A native handler: takes the bound, ordered parameter array (mutable so
/// by-reference parameters can be written through) and returns the call's
/// result, or `None` to signal "handler produced no value" (`spec.md`
/// §4.4: "push the return ... or an err placeholder if the handler
/// returned null").
pub type Handler = Rc<dyn Fn(&mut [Value]) -> Option<Value>>;

#[derive(Clone)]
pub struct Overload {
    pub params: Vec<ParamSpec>,
    pub handler: Handler,
}

impl std::fmt::Debug for Overload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overload").field("params", &self.params).finish()
    }
}

/// A function name plus its declared overloads (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct FuncDescriptor {
    pub name: String,
    pub overloads: Vec<Overload>,
}

/// The set of registered functions the `CALL` subsystem dispatches
/// against. Populated by the embedder via `Vm::add_function`
/// (`spec.md` §6).
#[derive(Debug, Default)]
pub struct FuncRegistry {
    functions: HashMap<String, FuncDescriptor>,
}

impl FuncRegistry {
    pub fn new() -> Self {
        Self { functions: HashMap::new() }
    }

    pub fn add_function(&mut self, descriptor: FuncDescriptor) {
        self.functions.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&FuncDescriptor> {
        self.functions.get(name)
    }
}

/// A key identifying which declared parameter a binding targets — by
/// position (sequential, default) or by declared name (`Bind<name>`,
/// `spec.md` §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
enum ParamKey {
    Positional(usize),
    Named(String),
}

/// One bound parameter slot: the value plus, for by-reference binding,
/// enough to write the handler's output back (`spec.md` §3, Call
/// accumulator).
#[derive(Debug, Clone)]
pub struct BoundParam {
    pub value: Option<Value>,
    pub original_ref: Option<RefName>,
    pub shadow_of: Option<(ListHandle, usize)>,
}

/// The per-in-flight-call accumulator (`spec.md` §3, §4.4).
#[derive(Debug)]
pub struct CallFrame {
    func_name: String,
    overloads: Vec<Overload>,
    bound: Vec<(ParamKey, BoundParam)>,
    next_positional: usize,
    pending_name: Option<String>,
    sticky_error: bool,
}

/// What the driver must do after `Call` finalises a by-reference
/// parameter's (possibly mutated) output slot (`spec.md` §4.4).
pub enum Writeback {
    Binding(RefName, Value),
    ListSlot(ListHandle, usize, Value),
}

impl CallFrame {
    pub fn new(func_name: &str, descriptor: &FuncDescriptor) -> Self {
        Self {
            func_name: func_name.to_string(),
            overloads: descriptor.overloads.clone(),
            bound: Vec::new(),
            next_positional: 0,
            pending_name: None,
            sticky_error: false,
        }
    }

    pub fn is_sticky(&self) -> bool {
        self.sticky_error
    }

    /// `SetCurrentParam(name)` (`spec.md` §4.4): point the cursor at a
    /// declared parameter name. Fatal if no viable overload declares it,
    /// or if viable overloads disagree on its pass-mode (ambiguous: the
    /// caller cannot know whether to keep a reference for writeback).
    pub fn set_current_param(&mut self, name: &str) -> Result<(), ErrorKind> {
        let viable = self.viable_overloads();
        let matches: Vec<&ParamSpec> =
            viable.iter().filter_map(|ov| ov.params.iter().find(|p| p.name == name)).collect();
        if matches.is_empty() {
            return Err(ErrorKind::UnknownParam { func: self.func_name.clone(), param: name.to_string() });
        }
        let first_mode = matches[0].pass_mode;
        if matches.iter().any(|p| p.pass_mode != first_mode) {
            return Err(ErrorKind::AmbiguousParam { func: self.func_name.clone(), param: name.to_string() });
        }
        self.pending_name = Some(name.to_string());
        Ok(())
    }

    /// Bind the current parameter (positional unless `set_current_param`
    /// was just called) and narrow the viable overload set.
    pub fn bind(&mut self, bound: BoundParam) {
        let key = match self.pending_name.take() {
            Some(name) => ParamKey::Named(name),
            None => {
                let k = ParamKey::Positional(self.next_positional);
                self.next_positional += 1;
                k
            }
        };
        self.bound.push((key, bound));
        if self.viable_overloads().is_empty() {
            self.sticky_error = true;
        }
    }

    /// Overloads still consistent with every binding recorded so far.
    fn viable_overloads(&self) -> Vec<&Overload> {
        self.overloads.iter().filter(|ov| self.overload_matches(ov)).collect()
    }

    fn overload_matches(&self, ov: &Overload) -> bool {
        let mut used = vec![false; ov.params.len()];
        for (key, bound) in &self.bound {
            let idx = match key {
                ParamKey::Positional(i) => *i,
                ParamKey::Named(name) => match ov.params.iter().position(|p| &p.name == name) {
                    Some(i) => i,
                    None => return false,
                },
            };
            if idx >= ov.params.len() || used[idx] {
                return false;
            }
            used[idx] = true;
            if let Some(v) = &bound.value {
                if !ov.params[idx].type_spec.matches(&v.kind()) {
                    return false;
                }
            }
        }
        true
    }

    /// `Call` (`spec.md` §4.4): finalise the call. Returns the pushed
    /// result, the writebacks the driver must perform for by-reference
    /// parameters, and — when the handler returned `None` — the
    /// [`ErrorKind::HandlerFailure`] the driver must report to the error
    /// sink before pushing the placeholder (`spec.md` §7; ground truth
    /// `GSM::CallFunction` in `original_source/sources/gsm.cc` reports
    /// before pushing `Error_Portion`).
    pub fn finalize(mut self) -> Result<(Value, Vec<Writeback>, Option<ErrorKind>), ErrorKind> {
        if self.sticky_error {
            return Err(ErrorKind::NoOverloadMatch(self.func_name.clone()));
        }
        let viable_idx: Vec<usize> =
            (0..self.overloads.len()).filter(|&i| self.overload_matches(&self.overloads[i])).collect();
        let chosen_idx = match viable_idx.as_slice() {
            [only] => *only,
            _ => return Err(ErrorKind::NoOverloadMatch(self.func_name.clone())),
        };
        let overload = self.overloads.remove(chosen_idx);

        let mut slots: Vec<Value> = Vec::with_capacity(overload.params.len());
        let mut writeback_targets: Vec<Option<(Option<RefName>, Option<(ListHandle, usize)>)>> =
            Vec::with_capacity(overload.params.len());

        for (i, param) in overload.params.iter().enumerate() {
            let bound = self.take_binding_for(i, &param.name);
            match bound {
                Some(b) => {
                    let value = match b.value {
                        Some(v) => v,
                        None => {
                            return Err(ErrorKind::MissingParam {
                                func: self.func_name.clone(),
                                param: param.name.clone(),
                            })
                        }
                    };
                    writeback_targets.push(Some((b.original_ref, b.shadow_of)));
                    slots.push(value);
                }
                None => match &param.default {
                    Some(default) => {
                        writeback_targets.push(None);
                        slots.push(default.clone());
                    }
                    None => {
                        return Err(ErrorKind::MissingParam {
                            func: self.func_name.clone(),
                            param: param.name.clone(),
                        })
                    }
                },
            }
        }

        let result = (overload.handler)(&mut slots);

        let mut writebacks = Vec::new();
        for (idx, (param, target)) in overload.params.iter().zip(writeback_targets.into_iter()).enumerate() {
            if param.pass_mode != PassMode::ByRef {
                continue;
            }
            let output = slots[idx].clone();
            match target {
                Some((Some(r), _)) => writebacks.push(Writeback::Binding(r, output)),
                Some((None, Some((list, index)))) => writebacks.push(Writeback::ListSlot(list, index, output)),
                Some((None, None)) => {
                    return Err(ErrorKind::HandlerFailure(format!(
                        "{}: by-reference parameter `{}` has no writeback target",
                        self.func_name, param.name
                    )))
                }
                None => {}
            }
        }

        let handler_error = if result.is_none() {
            Some(ErrorKind::HandlerFailure(self.func_name.clone()))
        } else {
            None
        };
        let pushed = result.unwrap_or_else(|| Value::err(ErrorKind::HandlerFailure(self.func_name.clone()).message()));
        Ok((pushed, writebacks, handler_error))
    }

    fn take_binding_for(&mut self, position: usize, name: &str) -> Option<BoundParam> {
        let found = self.bound.iter().position(|(key, _)| match key {
            ParamKey::Positional(p) => *p == position,
            ParamKey::Named(n) => n == name,
        })?;
        Some(self.bound.remove(found).1)
    }
}
