use super::*;
use proptest::prelude::*;

#[test]
fn scalar_sizes_and_classes() {
    assert_eq!(NativeType::Integer.size(), 4);
    assert_eq!(NativeType::Float.size(), 4);
    assert_eq!(NativeType::Bool.size(), 4);
    assert_eq!(NativeType::Double.size(), 8);
    assert_eq!(NativeType::Pointer.size(), 8);
    assert_eq!(NativeType::Bool.register_class(), RegisterClass::Integer);
    assert_eq!(NativeType::Dynamic.register_class(), RegisterClass::DynamicPending);
}

#[test]
fn auto_is_unresolved() {
    assert!(TypeInfo::auto().is_unresolved());
    assert!(!TypeInfo::int().is_unresolved());
}

#[test]
fn flags_do_not_affect_base() {
    let t = TypeInfo::float().as_const().as_reference();
    assert!(t.is_const());
    assert!(t.is_ref());
    assert!(t.same_base(TypeInfo::float()));
    assert_eq!(t.base(), TypeInfo::float());
}

#[test]
fn index_policies() {
    assert_eq!(IndexPolicy::Wrapped.apply(5, 4), Some(1));
    assert_eq!(IndexPolicy::Wrapped.apply(-1, 4), Some(3));
    assert_eq!(IndexPolicy::Clamped.apply(9, 4), Some(3));
    assert_eq!(IndexPolicy::Clamped.apply(-9, 4), Some(0));
    assert_eq!(IndexPolicy::Checked.apply(4, 4), None);
    assert_eq!(IndexPolicy::Checked.apply(3, 4), Some(3));
    assert_eq!(IndexPolicy::Wrapped.apply(0, 0), None);
}

proptest! {
    #[test]
    fn checked_policies_stay_in_bounds(index in any::<i32>(), len in 1i32..1024) {
        for policy in [IndexPolicy::Checked, IndexPolicy::Wrapped, IndexPolicy::Clamped] {
            if let Some(i) = policy.apply(index, len) {
                prop_assert!((0..len).contains(&i));
            }
        }
    }

    #[test]
    fn wrap_and_clamp_never_fail(index in any::<i32>(), len in 1i32..1024) {
        prop_assert!(IndexPolicy::Wrapped.apply(index, len).is_some());
        prop_assert!(IndexPolicy::Clamped.apply(index, len).is_some());
    }
}
