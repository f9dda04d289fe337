//! Keypath segment round-trip invariants over generated paths.

use proptest::prelude::*;
use weft_core::keypath::{join, parse, stringify};

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,5}"
}

fn segments() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(segment(), 1..6)
}

proptest! {
    #[test]
    fn stringify_then_parse_returns_the_segments(parts in segments()) {
        let keypath = stringify(&parts);
        let reparsed = parse(&keypath);
        prop_assert_eq!(reparsed.as_slice(), parts.as_slice());
    }

    #[test]
    fn join_concatenates_segment_lists(base in segments(), sub in segments()) {
        let joined = join(&stringify(&base), &stringify(&sub));
        let mut expected = base;
        expected.extend(sub);
        let reparsed = parse(&joined);
        prop_assert_eq!(reparsed.as_slice(), expected.as_slice());
    }
}
