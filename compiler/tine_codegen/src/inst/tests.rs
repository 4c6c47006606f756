use pretty_assertions::assert_eq;
use smallvec::smallvec;
use tine_ir::{BinaryOp, FunctionId, IndexPolicy, NativeType, Value};

use super::*;

#[test]
fn banks_follow_the_register_class() {
    assert_eq!(Bank::of(NativeType::Integer), Bank::Gp);
    assert_eq!(Bank::of(NativeType::Bool), Bank::Gp);
    assert_eq!(Bank::of(NativeType::Pointer), Bank::Gp);
    assert_eq!(Bank::of(NativeType::Float), Bank::Fp);
    assert_eq!(Bank::of(NativeType::Double), Bank::Fp);
}

#[test]
fn slots_past_the_machine_registers_are_memory_backed() {
    assert!(!Reg::new(Bank::Gp, 13).is_memory_backed());
    assert!(Reg::new(Bank::Gp, 14).is_memory_backed());
    assert!(!Reg::new(Bank::Fp, 15).is_memory_backed());
    assert_eq!(Reg::new(Bank::Fp, 16).to_string(), "f16!");
}

#[test]
fn disassembly_shows_immediates_and_addresses() {
    let r0 = Reg::new(Bank::Gp, 0);
    let r1 = Reg::new(Bank::Gp, 1);
    let f0 = Reg::new(Bank::Fp, 0);
    let lines: Vec<String> = [
        Inst::Binary {
            op: BinaryOp::Mul,
            ty: NativeType::Integer,
            dst: r0,
            lhs: r1,
            rhs: Operand::Imm(Value::Int(2)),
        },
        Inst::Load {
            ty: NativeType::Float,
            dst: f0,
            addr: Address::global(4),
        },
        Inst::Store {
            ty: NativeType::Integer,
            addr: Address::reg(r1).plus(8),
            src: Operand::Reg(r0),
        },
        Inst::ElementAddr {
            dst: r0,
            base: r1,
            index: Operand::Reg(r0),
            len: Operand::Imm(Value::Int(4)),
            stride: 4,
            policy: IndexPolicy::Wrapped,
        },
        Inst::Call {
            func: FunctionId::new(3),
            args: smallvec![(NativeType::Float, Operand::Reg(f0))],
            ret: Some((NativeType::Float, f0)),
        },
        Inst::Ret { value: None },
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    assert_eq!(
        lines,
        vec![
            "mul.i32 r0, r1, #2",
            "ld.f32 f0, [g+4]",
            "st.i32 [r1+8], r0",
            "elem.wrapped r0, r1[r0 < #4] * 4",
            "call #3(f0) -> f32.f0",
            "ret",
        ]
    );
}

#[test]
fn spill_slots_follow_the_locals() {
    let code = Code {
        gp_slots: 16,
        fp_slots: 17,
        spill_offset: 32,
        ..Code::default()
    };
    assert_eq!(code.memory_backed_slots(), 3);
    assert_eq!(code.spill_address(Reg::new(Bank::Gp, 3)), None);
    assert_eq!(code.spill_address(Reg::new(Bank::Gp, 15)), Some(40));
    assert_eq!(code.spill_address(Reg::new(Bank::Fp, 16)), Some(48));
}

#[test]
fn labels_are_printed_before_their_instruction() {
    let code = Code {
        name: "f".into(),
        insts: vec![Inst::Jump(Label(0)), Inst::Ret { value: None }],
        labels: vec![1],
        ..Code::default()
    };
    let text = code.to_string();
    assert!(text.contains("    jmp L0\nL0:\n    ret\n"), "{text}");
}
