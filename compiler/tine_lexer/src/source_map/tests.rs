use super::*;

#[test]
fn identity_maps_every_offset_to_itself() {
    let map = SourceMap::identity(10);
    assert_eq!(map.to_original(0), 0);
    assert_eq!(map.to_original(7), 7);
}

#[test]
fn expansion_maps_to_call_site() {
    // original: "a = M;"  with M -> "(1+2)"
    // processed: "a = (1+2);"
    let mut map = SourceMap::new();
    map.push_verbatim(0, 0, 4);
    map.push_expansion(4, 5, 4);
    map.push_verbatim(9, 5, 1);
    assert_eq!(map.to_original(2), 2);
    assert_eq!(map.to_original(4), 4);
    assert_eq!(map.to_original(8), 4);
    assert_eq!(map.to_original(9), 5);
    assert!(map.is_expanded(6));
    assert!(!map.is_expanded(9));
}

#[test]
fn adjacent_verbatim_segments_merge() {
    let mut map = SourceMap::new();
    map.push_verbatim(0, 0, 3);
    map.push_verbatim(3, 3, 3);
    assert_eq!(map, SourceMap::identity(6));
}
