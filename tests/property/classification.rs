//! Classification is a pure "any pattern matches" over the message

use gke_provisioner::retry::ErrorClassifier;
use proptest::prelude::*;

proptest! {
    #[test]
    fn empty_pattern_set_is_never_retryable(message in ".*") {
        let classifier = ErrorClassifier::default();
        prop_assert!(!classifier.is_retryable(&message));
    }

    #[test]
    fn retryable_iff_some_literal_pattern_occurs(
        patterns in prop::collection::vec("[a-z]{1,6}", 0..4),
        message in "[a-z ]{0,40}",
    ) {
        let escaped: Vec<String> = patterns.iter().map(|p| regex::escape(p)).collect();
        let classifier = ErrorClassifier::new(&escaped).unwrap();
        let expected = patterns.iter().any(|p| message.contains(p.as_str()));
        prop_assert_eq!(classifier.is_retryable(&message), expected);
    }

    #[test]
    fn pattern_embedded_anywhere_matches(
        prefix in "[A-Za-z0-9 :]{0,20}",
        suffix in "[A-Za-z0-9 :]{0,20}",
    ) {
        let classifier = ErrorClassifier::new(&["ZONE_RESOURCE_POOL_EXHAUSTED"]).unwrap();
        let message = format!("{}ZONE_RESOURCE_POOL_EXHAUSTED{}", prefix, suffix);
        prop_assert!(classifier.is_retryable(&message));
        // Same answer on every call.
        prop_assert_eq!(classifier.is_retryable(&message), classifier.is_retryable(&message));
    }
}
