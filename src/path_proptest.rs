//! Property-based tests for repository identities and change keys.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all of them.

#[cfg(test)]
mod proptest_tests {
    use crate::lock::normalize_identity;
    use crate::path::encode_path_component;
    use crate::yaml_path::{parse_key, to_expression, PathSegment};
    use proptest::prelude::*;

    // ============================================================================
    // normalize_identity property tests
    // ============================================================================

    proptest! {
        /// Property: normalizing an HTTPS URL twice gives the same identity
        #[test]
        fn normalize_https_is_idempotent(
            url in "https://[a-zA-Z]{1,10}\\.com/[a-z]{1,8}/[a-z]{1,8}(\\.git)?/?"
        ) {
            let once = normalize_identity(&url);
            prop_assert_eq!(normalize_identity(&once), once);
        }

        /// Property: normalizing an scp-like URL twice gives the same identity
        #[test]
        fn normalize_scp_is_idempotent(
            url in "[a-z]{1,8}@[a-zA-Z]{1,8}\\.com:[a-z]{1,8}/[a-z]{1,8}(\\.git)?"
        ) {
            let once = normalize_identity(&url);
            prop_assert_eq!(normalize_identity(&once), once);
        }

        /// Property: host case, a `.git` suffix and a trailing slash do not
        /// change the identity
        #[test]
        fn normalize_ignores_cosmetic_differences(
            host in "[a-z]{1,10}",
            owner in "[a-z]{1,8}",
            name in "[a-z]{1,8}",
        ) {
            let plain = format!("https://{}.com/{}/{}", host, owner, name);
            let noisy = format!(" https://{}.COM/{}/{}.git/ ", host.to_uppercase(), owner, name);
            prop_assert_eq!(normalize_identity(&plain), normalize_identity(&noisy));
        }

        /// Property: different repository paths never share an identity
        #[test]
        fn normalize_keeps_distinct_paths_apart(
            a in "[a-z]{1,8}",
            b in "[a-z]{1,8}",
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(
                normalize_identity(&format!("https://example.com/org/{}", a)),
                normalize_identity(&format!("https://example.com/org/{}", b))
            );
        }
    }

    // ============================================================================
    // parse_key property tests
    // ============================================================================

    fn segment() -> impl Strategy<Value = PathSegment> {
        prop_oneof![
            "[a-zA-Z_][a-zA-Z0-9_-]{0,8}".prop_map(PathSegment::Key),
            "[a-zA-Z0-9./_\"'\\\\-]{1,12}".prop_map(PathSegment::Key),
            (0usize..100).prop_map(PathSegment::Index),
        ]
    }

    proptest! {
        /// Property: rendering segments to an expression and parsing it back
        /// gives the same segments
        #[test]
        fn expression_round_trips(segments in prop::collection::vec(segment(), 1..6)) {
            let expression = to_expression(&segments);
            prop_assert!(expression.starts_with('.'));
            prop_assert_eq!(parse_key(&expression).unwrap(), segments);
        }

        /// Property: keys without the root marker are always rejected
        #[test]
        fn keys_without_root_marker_are_rejected(key in "[a-zA-Z][a-zA-Z0-9.]{0,20}") {
            prop_assert!(parse_key(&key).is_err());
        }

        /// Property: keys with shell or yq program characters are rejected
        #[test]
        fn keys_with_program_text_are_rejected(
            prefix in "[a-z]{1,8}",
            bad in "[|=();]",
            suffix in "[a-z]{0,8}",
        ) {
            let key = format!(".{}{}{}", prefix, bad, suffix);
            prop_assert!(parse_key(&key).is_err());
        }
    }

    // ============================================================================
    // encode_path_component property tests
    // ============================================================================

    proptest! {
        /// Property: encoded names never contain path separators
        #[test]
        fn encode_never_produces_separators(input in ".*") {
            let result = encode_path_component(&input);
            for ch in ['/', '\\', ':'] {
                prop_assert!(!result.contains(ch));
            }
        }

        /// Property: encoding preserves the character count
        #[test]
        fn encode_preserves_char_count(input in ".+") {
            prop_assert_eq!(
                encode_path_component(&input).chars().count(),
                input.chars().count()
            );
        }
    }
}
