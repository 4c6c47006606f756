use super::*;
use proptest::prelude::*;

#[test]
fn align_up_rounds_to_multiples() {
    assert_eq!(align_up(0, 8), 0);
    assert_eq!(align_up(1, 8), 8);
    assert_eq!(align_up(8, 8), 8);
    assert_eq!(align_up(5, 4), 8);
    assert_eq!(align_up(7, 1), 7);
}

#[test]
fn dyn_contract() {
    assert_eq!(DYN_SIZE, 16);
    assert_eq!(DYN_ALIGNMENT, 8);
    assert_eq!(DYN_LENGTH_OFFSET, 0);
    assert_eq!(DYN_DATA_OFFSET, 8);
}

proptest! {
    #[test]
    fn align_up_is_smallest_multiple(offset in 0u32..10_000, shift in 0u32..4) {
        let alignment = 1 << shift;
        let aligned = align_up(offset, alignment);
        prop_assert!(aligned >= offset);
        prop_assert_eq!(aligned % alignment, 0);
        prop_assert!(aligned - offset < alignment);
    }
}
