//! Generated cluster names are distinct, prefixed and bounded

use gke_provisioner::topology::generate_cluster_names;
use proptest::prelude::*;
use std::collections::HashSet;

proptest! {
    #[test]
    fn names_are_distinct_and_share_a_prefix(n in 1usize..=99, uid in "[a-z0-9-]{0,60}") {
        let names = generate_cluster_names(n, &uid);
        prop_assert_eq!(names.len(), n);

        let unique: HashSet<_> = names.iter().collect();
        prop_assert_eq!(unique.len(), n);

        let trimmed: String = uid.chars().take(33).collect();
        for (i, name) in names.iter().enumerate() {
            prop_assert!(name.starts_with("kt2-"));
            prop_assert!(name.ends_with(&(i + 1).to_string()));
            prop_assert!(name.contains(&trimmed));
            prop_assert!(name.len() <= 40);
        }
    }
}
