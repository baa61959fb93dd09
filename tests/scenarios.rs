//! End-to-end literal programs from `spec.md` §8 ("End-to-end scenarios").

use gsm_vm::{Instr, Literal, OpKind, Status, Vm, VmConfig};
use num_bigint::BigInt;
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::io::Write as IoWrite;
use std::rc::Rc;

struct SharedWriter(Rc<RefCell<Vec<u8>>>);

impl IoWrite for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn new_vm() -> (Vm, Rc<RefCell<Vec<u8>>>, Rc<RefCell<Vec<u8>>>) {
    let _ = env_logger::try_init();
    let out = Rc::new(RefCell::new(Vec::new()));
    let err = Rc::new(RefCell::new(Vec::new()));
    let vm = Vm::new(VmConfig::default(), Box::new(SharedWriter(out.clone())), Box::new(SharedWriter(err.clone())));
    (vm, out, err)
}

fn text(buf: &Rc<RefCell<Vec<u8>>>) -> String {
    String::from_utf8(buf.borrow().clone()).unwrap()
}

#[test]
fn scenario_a_integer_add() {
    let (mut vm, out, _err) = new_vm();
    let program = vec![
        Instr::PushLiteral(Literal::Int(BigInt::from(2))),
        Instr::PushLiteral(Literal::Int(BigInt::from(3))),
        Instr::Op { kind: OpKind::Add },
        Instr::Output,
        Instr::Quit,
    ];
    assert_eq!(vm.execute(&program), Status::Quit);
    assert_eq!(text(&out), "5\n");
}

#[test]
fn scenario_b_integer_divide_yields_rational() {
    let (mut vm, out, _err) = new_vm();
    let program = vec![
        Instr::PushLiteral(Literal::Int(BigInt::from(5))),
        Instr::PushLiteral(Literal::Int(BigInt::from(2))),
        Instr::Op { kind: OpKind::Divide },
        Instr::Output,
        Instr::Quit,
    ];
    assert_eq!(vm.execute(&program), Status::Quit);
    assert_eq!(text(&out), "5/2\n");
}

#[test]
fn scenario_c_reference_roundtrip_and_string_concat() {
    let (mut vm, out, _err) = new_vm();
    let program = vec![
        Instr::PushLiteral(Literal::Str("x".to_string())),
        Instr::PushRef { name: "a".to_string(), sub: String::new() },
        Instr::Assign,
        Instr::PushRef { name: "a".to_string(), sub: String::new() },
        Instr::PushLiteral(Literal::Str(" ".to_string())),
        Instr::PushRef { name: "a".to_string(), sub: String::new() },
        Instr::Op { kind: OpKind::Add },
        Instr::Op { kind: OpKind::Add },
        Instr::Output,
        Instr::Quit,
    ];
    assert_eq!(vm.execute(&program), Status::Quit);
    assert_eq!(text(&out), "\"x x\"\n");
}

#[test]
fn scenario_d_list_element_shadow_assignment() {
    let (mut vm, out, _err) = new_vm();
    let program = vec![
        Instr::PushLiteral(Literal::Int(BigInt::from(1))),
        Instr::PushLiteral(Literal::Int(BigInt::from(2))),
        Instr::PushLiteral(Literal::Int(BigInt::from(3))),
        Instr::List(3),
        Instr::PushRef { name: "L".to_string(), sub: String::new() },
        Instr::Assign,
        Instr::PushRef { name: "L".to_string(), sub: String::new() },
        Instr::PushLiteral(Literal::Int(BigInt::from(2))),
        Instr::Subscript,
        Instr::PushLiteral(Literal::Int(BigInt::from(99))),
        Instr::Assign,
        Instr::Pop,
        Instr::PushRef { name: "L".to_string(), sub: String::new() },
        Instr::Output,
        Instr::Quit,
    ];
    assert_eq!(vm.execute(&program), Status::Quit);
    assert_eq!(text(&out), "[1, 99, 3]\n");
}

#[test]
fn scenario_e_branch_not_taken() {
    let (mut vm, out, _err) = new_vm();
    let program = vec![
        Instr::PushLiteral(Literal::Bool(false)),
        Instr::IfGoto(5),
        Instr::PushLiteral(Literal::Int(BigInt::from(7))),
        Instr::Goto(6),
        Instr::PushLiteral(Literal::Int(BigInt::from(9))),
        Instr::Output,
        Instr::Quit,
    ];
    assert_eq!(vm.execute(&program), Status::Quit);
    assert_eq!(text(&out), "7\n");
}

#[test]
fn scenario_e_branch_taken() {
    let (mut vm, out, _err) = new_vm();
    let program = vec![
        Instr::PushLiteral(Literal::Bool(true)),
        Instr::IfGoto(5),
        Instr::PushLiteral(Literal::Int(BigInt::from(7))),
        Instr::Goto(6),
        Instr::PushLiteral(Literal::Int(BigInt::from(9))),
        Instr::Output,
        Instr::Quit,
    ];
    assert_eq!(vm.execute(&program), Status::Quit);
    assert_eq!(text(&out), "9\n");
}

#[test]
fn scenario_f_unknown_function_fails() {
    let (mut vm, _out, err) = new_vm();
    let program = vec![Instr::InitCall("unknown".to_string()), Instr::Call];
    assert_eq!(vm.execute(&program), Status::Fail);
    assert!(text(&err).contains("unknown function"));
}

#[test]
fn stack_is_empty_after_flush_regardless_of_terminal_status() {
    // `spec.md` §8 property 1.
    let (mut vm, _out, _err) = new_vm();
    let program = vec![Instr::PushLiteral(Literal::Int(BigInt::from(1))), Instr::IfGoto(99)];
    assert_eq!(vm.execute(&program), Status::Fail);
    assert_eq!(vm.depth(), 0);
}
