use pretty_assertions::assert_eq;
use tine_diagnostic::ErrorCode;
use tine_ir::{NativeType, Value};

use super::{global_address, Memory, GUARD, MAX_STACK_SIZE};
use tine_types::MAX_SIZE;

#[test]
fn statics_are_in_the_fresh_image() {
    let memory = Memory::new(16, &[(4, Value::Int(7)), (8, Value::Double(0.5))], 64).unwrap();
    assert_eq!(memory.read(NativeType::Integer, global_address(4)).unwrap(), Value::Int(7));
    assert_eq!(memory.read(NativeType::Double, global_address(8)).unwrap(), Value::Double(0.5));
    assert_eq!(memory.stack_base(), 32);
}

#[test]
fn the_null_guard_is_not_accessible() {
    let memory = Memory::new(8, &[], 64).unwrap();
    let err = memory.read(NativeType::Integer, 0).unwrap_err();
    assert_eq!(err.code, ErrorCode::E6004);
    assert!(memory.read(NativeType::Integer, u64::from(GUARD)).is_ok());
}

#[test]
fn accesses_past_the_end_fail() {
    let mut memory = Memory::new(0, &[], 32).unwrap();
    let end = memory.len();
    assert!(memory.write(end - 4, Value::Int(1)).is_ok());
    assert_eq!(memory.write(end - 2, Value::Int(1)).unwrap_err().code, ErrorCode::E6004);
    assert_eq!(memory.zero(u64::MAX - 2, 8).unwrap_err().code, ErrorCode::E6004);
}

#[test]
fn overlapping_copy() {
    let mut memory = Memory::new(16, &[(0, Value::Int(1)), (4, Value::Int(2))], 0).unwrap();
    memory.copy(global_address(4), global_address(0), 8).unwrap();
    assert_eq!(memory.read(NativeType::Integer, global_address(4)).unwrap(), Value::Int(1));
    assert_eq!(memory.read(NativeType::Integer, global_address(8)).unwrap(), Value::Int(2));
}

#[test]
fn oversized_images_are_refused() {
    let err = Memory::new(MAX_SIZE + 1, &[], 64).unwrap_err();
    assert_eq!(err.code, ErrorCode::E6007);
    let err = Memory::new(16, &[], MAX_STACK_SIZE + 1).unwrap_err();
    assert_eq!(err.code, ErrorCode::E6007);
    assert!(Memory::new(16, &[], MAX_STACK_SIZE).is_ok());
}
