//! Location selection is deterministic and clamps the shorter list

use gke_provisioner::retry::{Location, LocationCandidates};
use proptest::prelude::*;

fn region() -> impl Strategy<Value = String> {
    "[a-z]{2,6}-[a-z]{2,6}[1-9]"
}

fn zone() -> impl Strategy<Value = String> {
    (region(), "[a-f]").prop_map(|(r, z)| format!("{}-{}", r, z))
}

proptest! {
    #[test]
    fn selection_is_pure_and_in_bounds(
        regions in prop::collection::vec(region(), 0..4),
        zones in prop::collection::vec(zone(), 0..4),
    ) {
        prop_assume!(!regions.is_empty() || !zones.is_empty());
        let candidates = LocationCandidates::new(regions.clone(), zones.clone());
        let total = candidates.total_attempts();
        prop_assert_eq!(total, regions.len().max(zones.len()));

        for attempt in 0..total {
            let first = candidates.select(attempt).unwrap();
            let second = candidates.select(attempt).unwrap();
            prop_assert_eq!(&first, &second);

            if !regions.is_empty() {
                let expected = &regions[attempt.min(regions.len() - 1)];
                prop_assert_eq!(&first.region, expected);
            }
            match zones.get(attempt.min(zones.len().saturating_sub(1))) {
                Some(zone) => {
                    prop_assert_eq!(first.zone.as_ref(), Some(zone));
                    prop_assert_eq!(first.flag(), format!("--zone={}", zone));
                }
                None => {
                    prop_assert_eq!(first.flag(), format!("--region={}", first.region));
                }
            }
        }
    }

    #[test]
    fn zone_only_candidates_derive_their_region(zone in zone()) {
        let location = LocationCandidates::new(Vec::new(), vec![zone.clone()]).select(0).unwrap();
        prop_assert!(zone.starts_with(&location.region));
        prop_assert_eq!(Location::parse(&zone), location);
    }
}
