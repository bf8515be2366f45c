//! Location selection per attempt.
//!
//! Attempt `i` uses `regions[min(i, len - 1)]` and `zones[min(i, len - 1)]`:
//! once the shorter list is exhausted its last entry is reused. The number of
//! attempts is the length of the longer list. A selected zone takes precedence
//! over the region for the location directive passed to `gcloud`.

use serde::Serialize;
use std::fmt;

/// The location one attempt creates its clusters in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    /// Region used for subnets; derived from the zone when no region was given.
    pub region: String,
    pub zone: Option<String>,
}

impl Location {
    pub fn regional(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            zone: None,
        }
    }

    pub fn zonal(zone: impl Into<String>) -> Self {
        let zone = zone.into();
        Self {
            region: region_from_zone(&zone),
            zone: Some(zone),
        }
    }

    /// Parse a location as gcloud reports it: `us-central1-a` is a zone, `us-central1` a region.
    pub fn parse(location: &str) -> Self {
        let is_zone = location
            .rsplit_once('-')
            .map(|(_, suffix)| suffix.len() == 1 && suffix.chars().all(|c| c.is_ascii_lowercase()))
            .unwrap_or(false);
        if is_zone {
            Self::zonal(location)
        } else {
            Self::regional(location)
        }
    }

    /// `--zone=<zone>` or `--region=<region>`.
    pub fn flag(&self) -> String {
        match &self.zone {
            Some(zone) => format!("--zone={}", zone),
            None => format!("--region={}", self.region),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.zone {
            Some(zone) => write!(f, "zone {}", zone),
            None => write!(f, "region {}", self.region),
        }
    }
}

/// `us-central1-c` -> `us-central1`.
pub fn region_from_zone(zone: &str) -> String {
    match zone.rsplit_once('-') {
        Some((region, _)) => region.to_string(),
        None => zone.to_string(),
    }
}

fn clamped<'a>(list: &'a [String], attempt: usize) -> Option<&'a String> {
    if list.is_empty() {
        None
    } else {
        list.get(attempt.min(list.len() - 1))
    }
}

/// Number of attempts the candidate lists allow.
pub fn total_attempts(regions: &[String], zones: &[String]) -> usize {
    regions.len().max(zones.len())
}

/// Location for `attempt`. `None` only when both lists are empty.
pub fn select(regions: &[String], zones: &[String], attempt: usize) -> Option<Location> {
    let region = clamped(regions, attempt);
    let zone = clamped(zones, attempt);
    match (region, zone) {
        (None, None) => None,
        (Some(region), None) => Some(Location::regional(region.clone())),
        (None, Some(zone)) => Some(Location::zonal(zone.clone())),
        (Some(region), Some(zone)) => Some(Location {
            region: region.clone(),
            zone: Some(zone.clone()),
        }),
    }
}

/// Ordered region and zone candidates for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationCandidates {
    regions: Vec<String>,
    zones: Vec<String>,
}

impl LocationCandidates {
    pub fn new(regions: Vec<String>, zones: Vec<String>) -> Self {
        Self { regions, zones }
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn zones(&self) -> &[String] {
        &self.zones
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty() && self.zones.is_empty()
    }

    pub fn total_attempts(&self) -> usize {
        total_attempts(&self.regions, &self.zones)
    }

    pub fn select(&self, attempt: usize) -> Option<Location> {
        select(&self.regions, &self.zones, attempt)
    }
}
