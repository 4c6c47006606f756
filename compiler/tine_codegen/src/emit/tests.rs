use pretty_assertions::assert_eq;
use tine_ir::{BinaryOp, NativeType, Value};

use crate::inst::{Base, Inst, Operand};
use crate::test_support::{compiled, compiled_debug};

fn insts(src: &str, name: &str) -> Vec<Inst> {
    let artifact = compiled(src);
    let code = artifact
        .code(name)
        .unwrap_or_else(|| panic!("no code for `{name}`"));
    code.insts.clone()
}

fn global_stores(insts: &[Inst]) -> usize {
    insts
        .iter()
        .filter(|i| {
            matches!(
                i,
                Inst::Store { addr, .. } if addr.base == Base::Globals
            )
        })
        .count()
}

#[test]
fn literals_stay_immediate() {
    let artifact = compiled("int test(int input) { return input * 2; }");
    let listing = artifact.disassemble("test").unwrap();
    assert!(listing.contains("mul.i32"), "{listing}");
    assert!(listing.contains("#2"), "{listing}");
    let stats = artifact.stats().iter().find(|s| s.name == "test").unwrap();
    assert_eq!(stats.materialized, 0);
}

#[test]
fn immediate_left_operands_are_mirrored() {
    let code = insts("bool f(int a) { return 3 < a; }", "f");
    let compare = code
        .iter()
        .find_map(|i| match i {
            Inst::Binary { op, rhs, .. } => Some((*op, *rhs)),
            _ => None,
        })
        .unwrap();
    assert_eq!(compare, (BinaryOp::Gt, Operand::Imm(Value::Int(3))));
}

#[test]
fn integer_divisors_are_materialized() {
    let artifact = compiled("int f(int a) { return a / 3; }\nfloat g(float a) { return a / 3.0f; }");
    let stats = |name: &str| {
        artifact
            .stats()
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.materialized)
    };
    assert_eq!(stats("f"), Some(1));
    assert_eq!(stats("g"), Some(0));
}

#[test]
fn globals_are_cached_until_exit() {
    let code = insts("int g;\nvoid f() { g = 1; g = g + 2; }", "f");
    assert_eq!(global_stores(&code), 1);
    let loads = code
        .iter()
        .filter(|i| matches!(i, Inst::Load { addr, .. } if addr.base == Base::Globals))
        .count();
    assert_eq!(loads, 0);
    assert!(matches!(code.last(), Some(Inst::Ret { value: None })));
}

#[test]
fn calls_flush_dirty_globals_first() {
    let code = insts("int g;\nvoid h() { }\nvoid f() { g = 4; h(); g = 5; }", "f");
    let call = code.iter().position(|i| matches!(i, Inst::Call { .. })).unwrap();
    assert_eq!(global_stores(&code[..call]), 1);
    assert_eq!(global_stores(&code[call..]), 1);
}

#[test]
fn loops_reload_globals_at_the_head() {
    let code = insts(
        "int g;\nvoid f() { for (int i = 0; i < 4; i++) { g = g + i; } }",
        "f",
    );
    assert!(code.iter().any(|i| matches!(i, Inst::Jump(_))));
    assert!(code
        .iter()
        .any(|i| matches!(i, Inst::Load { ty: NativeType::Integer, addr, .. } if addr.base == Base::Globals)));
}

#[test]
fn initializer_writes_globals() {
    let artifact = compiled("int g = 5;\nspan<float, 2> s = {1.0f, 2.0f};\nint f() { return g; }");
    let init = artifact.code(crate::INIT_NAME).unwrap();
    assert!(global_stores(&init.insts) >= 3);
    assert!(matches!(init.insts.last(), Some(Inst::Ret { value: None })));
}

#[test]
fn debug_mode_emits_statement_hooks() {
    let artifact = compiled_debug("int f(int a) {\n  int b = a;\n  return b;\n}");
    let lines: Vec<u32> = artifact
        .code("f")
        .unwrap()
        .insts
        .iter()
        .filter_map(|i| match i {
            Inst::Hook { line } => Some(*line),
            _ => None,
        })
        .collect();
    assert_eq!(lines, vec![2, 3]);

    let plain = compiled("int f(int a) {\n  int b = a;\n  return b;\n}");
    assert!(!plain.code("f").unwrap().insts.iter().any(|i| matches!(i, Inst::Hook { .. })));
}

#[test]
fn many_live_values_become_memory_backed() {
    let mut src = String::from("int f() {\n");
    for i in 0..18 {
        src.push_str(&format!("  int v{i} = {i};\n"));
    }
    src.push_str("  return v0");
    for i in 1..18 {
        src.push_str(&format!(" + v{i}"));
    }
    src.push_str(";\n}");
    let artifact = compiled(&src);
    let stats = artifact.stats().iter().find(|s| s.name == "f").unwrap();
    assert!(stats.memory_backed() > 0, "{stats:?}");
    let code = artifact.code("f").unwrap();
    assert!(code.frame_size >= code.spill_offset + stats.memory_backed() * 8);
}
