//! Property-based tests for file pair parsing.
//!
//! These tests use proptest to generate random pairs and verify that the
//! parser accepts exactly the well-formed ones.

#[cfg(test)]
mod proptest_tests {
    use crate::pair::FilePair;
    use proptest::prelude::*;
    use std::path::PathBuf;

    const SEGMENT: &str = "[a-z0-9_-]{1,8}(\\.[a-z]{1,4})?";

    fn relative_path() -> impl Strategy<Value = String> {
        prop::collection::vec(SEGMENT, 1..4).prop_map(|segments| segments.join("/"))
    }

    fn absolute_path() -> impl Strategy<Value = String> {
        relative_path().prop_map(|path| format!("/{}", path))
    }

    /// Segments that may contain literal colons and backslashes.
    fn colon_path() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-z:\\\\]{1,8}", 1..4).prop_map(|segments| segments.join("/"))
    }

    proptest! {
        /// Property: a relative and an absolute path joined by ':' always parse back
        #[test]
        fn well_formed_pairs_parse(repo in relative_path(), system in absolute_path()) {
            let pair = FilePair::parse(&format!("{}:{}", repo, system)).unwrap();
            prop_assert_eq!(pair.repo_path, PathBuf::from(&repo));
            prop_assert_eq!(pair.system_path, PathBuf::from(&system));
        }

        /// Property: without any ':' there is never a pair
        #[test]
        fn input_without_separator_is_rejected(input in "[^:]*") {
            prop_assert!(FilePair::parse(&input).is_err());
        }

        /// Property: the system side must be absolute
        #[test]
        fn relative_system_path_is_rejected(repo in relative_path(), system in relative_path()) {
            let input = format!("{}:{}", repo, system);
            prop_assert!(FilePair::parse(&input).is_err());
        }

        /// Property: the displayed form of a pair parses to the same pair,
        /// literal colons and backslashes included
        #[test]
        fn display_form_parses_back(repo in colon_path(), system in colon_path()) {
            let pair = FilePair {
                repo_path: PathBuf::from(&repo),
                system_path: PathBuf::from(format!("/{}", system)),
            };
            let reparsed = FilePair::parse(&pair.to_string()).unwrap();
            prop_assert_eq!(reparsed, pair);
        }
    }
}
