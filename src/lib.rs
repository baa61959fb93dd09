//! `gsm_vm` — the stack-based command interpreter and value system behind
//! a game-theoretic command language (`spec.md` §1).
//!
//! This crate is the VM core only: the parser/compiler that produces
//! [`instr::Instr`] sequences, the concrete game-theory library whose
//! objects travel through the VM as opaque values, and the command-line
//! front end are all external collaborators (`spec.md` §1, §6).

pub mod env;
pub mod error;
pub mod func;
pub mod instr;
pub mod list;
pub mod op;
pub mod stack;
pub mod value;
pub mod vm;

pub use error::ErrorKind;
pub use func::{BoundParam, FuncDescriptor, FuncRegistry, Overload, ParamSpec, ParamType, PassMode, ValueKindTag};
pub use instr::{Instr, Literal};
pub use op::OpKind;
pub use value::{Data, ListHandle, OpaqueHandle, OpaqueValue, RefName, StreamHandle, SubVariables, Value, ValueKind};
pub use vm::{Status, Vm, VmConfig};
