//! The interpreter driver: a program-counter loop executing an
//! instruction list against the operand stack, binding table, operator
//! dispatch and call subsystem (`spec.md` §4.5, §6).

use crate::env::Env;
use crate::error::ErrorKind;
use crate::func::{BoundParam, CallFrame, FuncDescriptor, FuncRegistry, Writeback};
use crate::instr::Instr;
use crate::list;
use crate::op::{self, OpKind};
use crate::stack::Stack;
use crate::value::{Data, Value};
use log::{debug, trace, warn};
use std::io::Write as IoWrite;

/// The three terminal states `Execute` can report (`spec.md` §6:
/// "Terminal status codes: SUCCESS=0, FAIL=1, QUIT=2").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success = 0,
    Fail = 1,
    Quit = 2,
}

/// Construction-time configuration for a [`Vm`] (`SPEC_FULL.md` §2: "no
/// hidden singletons" — the embedder owns this value). `Serialize` /
/// `Deserialize` so an embedder can load it from a session config file,
/// the same ambient need `serde` serves elsewhere in this lineage's
/// bytecode/session tooling.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VmConfig {
    /// Initial operand-stack capacity.
    pub initial_stack_capacity: usize,
    /// When set, an `InternalInvariant` violation panics instead of
    /// degrading to `Status::Fail` (`spec.md` §7).
    pub strict_internal_invariants: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self { initial_stack_capacity: 64, strict_internal_invariants: cfg!(debug_assertions) }
    }
}

/// The stack-based command interpreter (`spec.md` §2, §6). Owns exactly
/// one operand stack, one binding table, one call-frame stack and one
/// program counter, matching the single-threaded, non-suspending model
/// of `spec.md` §5.
pub struct Vm {
    config: VmConfig,
    stack: Stack,
    env: Env,
    functions: FuncRegistry,
    call_frames: Vec<CallFrame>,
    output: Box<dyn IoWrite>,
    errors: Box<dyn IoWrite>,
}

impl Vm {
    pub fn new(config: VmConfig, output: Box<dyn IoWrite>, errors: Box<dyn IoWrite>) -> Self {
        let capacity = config.initial_stack_capacity;
        Self {
            config,
            stack: Stack::with_capacity(capacity),
            env: Env::new(),
            functions: FuncRegistry::new(),
            call_frames: Vec::new(),
            output,
            errors,
        }
    }

    // -- embedding surface: pushes (`spec.md` §6) --------------------

    pub fn push_bool(&mut self, b: bool) {
        self.stack.push(Value::bool(b));
    }

    pub fn push_int(&mut self, v: impl Into<num_bigint::BigInt>) {
        self.stack.push(Value::int(v));
    }

    pub fn push_rat(&mut self, v: num_rational::BigRational) {
        self.stack.push(Value::rat(v));
    }

    pub fn push_float(&mut self, v: f64) {
        self.stack.push(Value::float(v));
    }

    pub fn push_str(&mut self, v: impl Into<String>) {
        self.stack.push(Value::str(v));
    }

    pub fn push_reference(&mut self, name: impl Into<String>, sub: impl Into<String>) {
        self.stack.push(Value::reference(name, sub));
    }

    pub fn push_stream_sink(&mut self, sink: crate::value::StreamHandle) {
        self.stack.push(Value::stream(sink));
    }

    /// `PushList(n)` / the `LIST(n)` instruction (`spec.md` §4.2): pop `n`
    /// values and assemble them in reverse-pop order so the first-pushed
    /// element ends up first in the list.
    pub fn push_list(&mut self, n: usize) -> Result<(), ErrorKind> {
        let mut popped = Vec::with_capacity(n);
        for _ in 0..n {
            popped.push(self.stack.pop()?);
        }
        popped.reverse();
        let mut resolved = Vec::with_capacity(popped.len());
        for v in popped {
            resolved.push(self.resolve_if_ref(v)?);
        }
        let handle = list::construct(resolved);
        self.stack.push(Value::list(handle));
        Ok(())
    }

    pub fn add_function(&mut self, descriptor: FuncDescriptor) {
        self.functions.add_function(descriptor);
    }

    // -- embedding surface: core operations ---------------------------

    /// Resolve a `ref` value against the binding table; non-`ref` values
    /// pass through unchanged. Undefined names are reported (`spec.md`
    /// §4.1: "undefined reference -> err propagates").
    fn resolve_if_ref(&mut self, value: Value) -> Result<Value, ErrorKind> {
        match &value.data {
            Data::Ref(r) if !r.has_sub() => match self.env.lookup(&r.name) {
                Some(v) => Ok(v.clone()),
                None => Err(ErrorKind::UndefinedRef(r.name.clone())),
            },
            Data::Ref(r) => self.env.lookup_sub(&r.name, &r.sub),
            _ => Ok(value),
        }
    }

    /// Soft resolve: undefined name yields `None` rather than an error
    /// (`spec.md` §4.4 `BindRef`, and `SPEC_FULL.md`'s resolved Open
    /// Question: one soft resolve in `BindRef`, hard failure deferred to
    /// `Call`'s writeback step).
    fn resolve_if_ref_soft(&mut self, value: &Value) -> Option<Value> {
        match &value.data {
            Data::Ref(r) if !r.has_sub() => self.env.lookup(&r.name).cloned(),
            Data::Ref(r) => self.env.lookup_sub(&r.name, &r.sub).ok(),
            _ => Some(value.clone()),
        }
    }

    pub fn assign(&mut self) -> Result<(), ErrorKind> {
        let rhs = self.stack.pop()?;
        let lhs = self.stack.pop()?;
        match &lhs.data {
            Data::Ref(r) if !r.has_sub() => {
                self.env.define(&r.name, rhs.clone().without_shadow());
                self.stack.push(rhs);
                Ok(())
            }
            Data::Ref(r) => {
                self.env.assign_sub(&r.name, &r.sub, rhs.clone().without_shadow())?;
                self.stack.push(rhs);
                Ok(())
            }
            _ if lhs.shadow_of.is_some() => {
                let shadow = lhs.shadow_of.as_ref().expect("checked is_some above");
                let result = list::assign_through_shadow(&shadow.list, shadow.index, rhs);
                self.stack.push(result);
                Ok(())
            }
            _ => Err(ErrorKind::NoLValue),
        }
    }

    pub fn unassign(&mut self) -> Result<(), ErrorKind> {
        let lhs = self.stack.pop()?;
        match &lhs.data {
            Data::Ref(r) if !r.has_sub() => {
                self.env.remove(&r.name);
                Ok(())
            }
            Data::Ref(r) => {
                // `spec.md` §4.3: sub-variable removal delegates the same
                // way assignment does; there is no separate host hook for
                // "unset a sub-variable", so removal is a no-op write of
                // an error sentinel through the same channel.
                self.env.assign_sub(&r.name, &r.sub, Value::suppressed_err())?;
                Ok(())
            }
            _ if lhs.shadow_of.is_some() => {
                let shadow = lhs.shadow_of.as_ref().expect("checked is_some above");
                list::assign_through_shadow(&shadow.list, shadow.index, Value::suppressed_err());
                Ok(())
            }
            _ => Err(ErrorKind::NoLValue),
        }
    }

    pub fn op(&mut self, kind: OpKind) -> Result<(), ErrorKind> {
        if kind.is_unary() {
            let operand = self.stack.pop()?;
            let operand = self.resolve_if_ref(operand)?;
            if operand.is_err() {
                self.stack.push(operand);
                return Ok(());
            }
            match op::apply_unary(kind, operand) {
                Ok(result) => {
                    self.stack.push(result);
                    Ok(())
                }
                Err(e) => {
                    // Reporting happens once, centrally, in `run()`'s
                    // error handling -- not here too.
                    self.stack.push(Value::suppressed_err());
                    Err(e)
                }
            }
        } else {
            let right = self.stack.pop()?;
            let left = self.stack.pop()?;
            let right = self.resolve_if_ref(right)?;
            let left = self.resolve_if_ref(left)?;
            if left.is_err() || right.is_err() {
                self.stack.push(Value::suppressed_err());
                return Ok(());
            }
            match op::apply_binary(kind, left, right) {
                Ok(result) => {
                    self.stack.push(result);
                    Ok(())
                }
                Err(e) => {
                    self.stack.push(Value::suppressed_err());
                    Err(e)
                }
            }
        }
    }

    /// `list[i]` subscript (`spec.md` §4.2).
    pub fn subscript(&mut self) -> Result<(), ErrorKind> {
        let index = self.stack.pop()?;
        let index = self.resolve_if_ref(index)?;
        let index = match index.as_int() {
            Some(i) => i.clone(),
            None => return Err(ErrorKind::TypeMismatch { left: "int", right: index.kind().label() }),
        };
        let top = self.stack.pop()?;
        let list_handle = match &top.data {
            Data::Ref(_) => {
                let resolved = self.resolve_if_ref(top)?;
                match resolved.as_list() {
                    Some(l) => l.clone(),
                    None => return Err(ErrorKind::TypeMismatch { left: "list", right: resolved.kind().label() }),
                }
            }
            Data::List(l) => l.clone(),
            other => return Err(ErrorKind::TypeMismatch { left: "list", right: other.kind_label() }),
        };
        let shadow = list::subscript(&list_handle, &index)?;
        self.stack.push(shadow);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Value, ErrorKind> {
        self.stack.pop()
    }

    /// `OUTPUT` (`spec.md` §6): render the top of stack and pop it
    /// (`original_source/sources/gsm.cc`'s `GSM::Output` pops after
    /// printing — see `SPEC_FULL.md` §6).
    pub fn output(&mut self) -> Result<(), ErrorKind> {
        let top = self.stack.pop()?;
        let rendered = top.render();
        let _ = writeln!(self.output, "{}", rendered);
        Ok(())
    }

    /// Non-destructive peek-and-print of the whole stack, top to bottom
    /// (`SPEC_FULL.md` §6's recorded deviation from the original's
    /// destructive `Dump`).
    pub fn dump(&mut self) {
        for value in self.stack.iter_top_down() {
            let _ = writeln!(self.output, "{}", value.render());
        }
    }

    /// Release every stacked value, in reverse (top-first) order
    /// (`spec.md` §5: "the driver's shutdown contract guarantees all
    /// stacked and bound values are released in reverse order").
    pub fn flush(&mut self) {
        self.stack.flush();
    }

    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn max_depth(&self) -> usize {
        self.stack.max_depth()
    }

    // -- embedding surface: call subsystem (`spec.md` §4.4) ------------

    pub fn init_call(&mut self, name: &str) -> Result<(), ErrorKind> {
        let descriptor = self.functions.get(name).ok_or_else(|| ErrorKind::UnknownFunction(name.to_string()))?;
        self.call_frames.push(CallFrame::new(name, descriptor));
        Ok(())
    }

    fn current_frame(&mut self) -> Result<&mut CallFrame, ErrorKind> {
        self.call_frames
            .last_mut()
            .ok_or_else(|| ErrorKind::InternalInvariant("Bind/Call with no active call frame".to_string()))
    }

    /// Plain `Bind` (`spec.md` §4.5 instruction list): the original
    /// `gsm.cc` defines `GSM::Bind` as exactly `BindRef` (see
    /// `SPEC_FULL.md`'s grounding notes), so this is not a third mode —
    /// it is `bind_ref` under another name.
    pub fn bind(&mut self) -> Result<(), ErrorKind> {
        self.bind_ref()
    }

    /// `BindVal` (`spec.md` §4.4): dereference if `ref`, clear shadow-of,
    /// store in the current slot.
    pub fn bind_val(&mut self) -> Result<(), ErrorKind> {
        let param = self.stack.pop()?;
        let resolved = self.resolve_if_ref(param)?;
        let resolved = resolved.without_shadow();
        let bound = BoundParam { value: Some(resolved), original_ref: None, shadow_of: None };
        self.current_frame()?.bind(bound);
        Ok(())
    }

    /// `BindRef` (`spec.md` §4.4): if `ref`, keep a copy of the reference
    /// and soft-resolve once (undefined -> deferred, not an error here);
    /// if a shadow, record its origin; otherwise fall back to `BindVal`.
    pub fn bind_ref(&mut self) -> Result<(), ErrorKind> {
        let param = self.stack.pop()?;
        match &param.data {
            Data::Ref(r) => {
                let original_ref = r.clone();
                let resolved = self.resolve_if_ref_soft(&param);
                let bound = BoundParam { value: resolved, original_ref: Some(original_ref), shadow_of: None };
                self.current_frame()?.bind(bound);
                Ok(())
            }
            _ if param.shadow_of.is_some() => {
                let shadow = param.shadow_of.clone().expect("checked is_some above");
                let value = param.clone().without_shadow();
                let bound =
                    BoundParam { value: Some(value), original_ref: None, shadow_of: Some((shadow.list, shadow.index)) };
                self.current_frame()?.bind(bound);
                Ok(())
            }
            _ => {
                self.stack.push(param);
                self.bind_val()
            }
        }
    }

    pub fn bind_named(&mut self, param_name: &str, by_ref: bool) -> Result<(), ErrorKind> {
        self.current_frame()?.set_current_param(param_name)?;
        if by_ref {
            self.bind_ref()
        } else {
            self.bind_val()
        }
    }

    /// `Call` (`spec.md` §4.4): resolve the overload, invoke the handler,
    /// push the result, and perform by-reference writebacks. A handler
    /// returning `None` is reported to the error sink before its `err`
    /// placeholder is pushed (`spec.md` §7; ground truth `GSM::CallFunction`
    /// in `original_source/sources/gsm.cc` reports before pushing
    /// `Error_Portion`).
    pub fn call(&mut self) -> Result<(), ErrorKind> {
        let frame = self
            .call_frames
            .pop()
            .ok_or_else(|| ErrorKind::InternalInvariant("Call with no active call frame".to_string()))?;
        let (result, writebacks, handler_error) = frame.finalize()?;
        if let Some(e) = &handler_error {
            self.report(e);
        }
        self.stack.push(result);
        for wb in writebacks {
            match wb {
                Writeback::Binding(r, value) if !r.has_sub() => self.env.define(&r.name, value),
                Writeback::Binding(r, value) => self.env.assign_sub(&r.name, &r.sub, value)?,
                Writeback::ListSlot(list, index, value) => {
                    list::assign_through_shadow(&list, index, value);
                }
            }
        }
        Ok(())
    }

    // -- reporting ------------------------------------------------------

    /// Report a recoverable error to the error sink if its message is
    /// non-empty (`spec.md` §7: "an empty message means 'already
    /// reported, suppress'").
    fn report(&mut self, err: &ErrorKind) {
        warn!("recoverable error: {}", err);
        let message = err.message();
        if !message.is_empty() {
            let _ = writeln!(self.errors, "{}", message);
        }
    }

    // -- driver (`spec.md` §4.5) -----------------------------------------

    /// Execute an instruction list to completion, report `Status`, and
    /// guarantee the shutdown flush discipline of `spec.md` §5 and §8
    /// property 1 regardless of outcome.
    pub fn execute(&mut self, program: &[Instr]) -> Status {
        let status = self.run(program);
        self.flush();
        status
    }

    fn run(&mut self, program: &[Instr]) -> Status {
        let mut pc: usize = 1;
        loop {
            if pc < 1 || pc > program.len() {
                return Status::Success;
            }
            let instr = &program[pc - 1];
            trace!("pc={} instr={:?}", pc, instr);
            match instr {
                Instr::Quit => return Status::Quit,
                Instr::IfGoto(target) => match self.stack.pop() {
                    Ok(top) => match top.as_bool() {
                        Some(true) => {
                            pc = *target;
                            continue;
                        }
                        Some(false) => {
                            pc += 1;
                            continue;
                        }
                        None => {
                            self.report(&ErrorKind::NonBoolBranch);
                            self.stack.push(top);
                            return Status::Fail;
                        }
                    },
                    Err(e) => {
                        self.report(&e);
                        return Status::Fail;
                    }
                },
                Instr::Goto(target) => {
                    assert!(*target >= 1 && *target <= program.len() + 1, "jump target out of range");
                    pc = *target;
                    continue;
                }
                other => {
                    if let Err(e) = self.execute_one(other) {
                        if e.is_internal_invariant() && self.config.strict_internal_invariants {
                            panic!("internal invariant violated: {}", e);
                        }
                        self.report(&e);
                        return Status::Fail;
                    }
                }
            }
            pc += 1;
        }
    }

    fn execute_one(&mut self, instr: &Instr) -> Result<(), ErrorKind> {
        match instr {
            Instr::PushLiteral(lit) => {
                self.stack.push(lit.clone().into_value());
                Ok(())
            }
            Instr::PushRef { name, sub } => {
                self.stack.push(Value::reference(name.clone(), sub.clone()));
                Ok(())
            }
            Instr::Assign => self.assign(),
            Instr::UnAssign => self.unassign(),
            Instr::Op { kind } => self.op(*kind),
            Instr::InitCall(name) => {
                debug!("init_call {}", name);
                self.init_call(name)
            }
            Instr::Bind => self.bind(),
            Instr::BindVal => self.bind_val(),
            Instr::BindRef => self.bind_ref(),
            Instr::BindNamed { param_name, by_ref } => self.bind_named(param_name, *by_ref),
            Instr::Call => self.call(),
            Instr::List(n) => self.push_list(*n),
            Instr::Subscript => self.subscript(),
            Instr::Pop => self.pop().map(|_| ()),
            Instr::Output => self.output(),
            Instr::IfGoto(_) | Instr::Goto(_) | Instr::Quit => {
                unreachable!("branch instructions are handled in run()")
            }
        }
    }
}
