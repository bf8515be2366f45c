//! Project/cluster topology: which clusters get created in which project.

use crate::config::DeployerConfig;
use crate::error::ProvisionError;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

const CLUSTER_NAME_PREFIX: &str = "kt2-";
const MAX_RUN_ID_LENGTH: usize = 33;

/// One cluster to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterSpec {
    pub name: String,
    /// Position in the overall layout; selects the private master CIDR.
    pub index: usize,
    pub machine_type: String,
    pub num_nodes: usize,
    pub image_type: String,
}

/// Project id -> clusters, in project order. Fixed for the lifetime of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Topology {
    projects: Vec<String>,
    clusters: BTreeMap<String, Vec<ClusterSpec>>,
}

impl Topology {
    /// Build from the projects and explicit layout entries (`name` or `name:projectIndex`).
    ///
    /// Entries without an index go to the first project.
    pub fn build(
        projects: &[String],
        cluster_entries: &[String],
        config: &DeployerConfig,
    ) -> Result<Self, ProvisionError> {
        if projects.is_empty() {
            return Err(ProvisionError::Validation(
                "at least one project is required".to_string(),
            ));
        }

        let mut clusters: BTreeMap<String, Vec<ClusterSpec>> = projects
            .iter()
            .map(|p| (p.clone(), Vec::new()))
            .collect();
        let mut seen: HashSet<(usize, String)> = HashSet::new();

        for (index, entry) in cluster_entries.iter().enumerate() {
            let (name, project_index) = parse_layout_entry(entry)?;
            let project = projects.get(project_index).ok_or_else(|| {
                ProvisionError::Validation(format!(
                    "cluster {:?} refers to project index {} but only {} project(s) are configured",
                    name,
                    project_index,
                    projects.len()
                ))
            })?;
            if !seen.insert((project_index, name.clone())) {
                return Err(ProvisionError::Validation(format!(
                    "duplicate cluster name {:?} in project {}",
                    name, project
                )));
            }
            clusters.entry(project.clone()).or_default().push(ClusterSpec {
                name,
                index,
                machine_type: config.machine_type.clone(),
                num_nodes: config.num_nodes,
                image_type: config.image_type.clone(),
            });
        }

        Ok(Self {
            projects: projects.to_vec(),
            clusters,
        })
    }

    pub fn projects(&self) -> &[String] {
        &self.projects
    }

    pub fn clusters(&self, project: &str) -> &[ClusterSpec] {
        self.clusters.get(project).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every (project, cluster) pair, project order first.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, &str, &ClusterSpec)> {
        self.projects.iter().enumerate().flat_map(move |(i, project)| {
            self.clusters(project)
                .iter()
                .map(move |cluster| (i, project.as_str(), cluster))
        })
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.values().map(Vec::len).sum()
    }

    /// First project; hosts the shared network in multi-project runs.
    pub fn host_project(&self) -> &str {
        &self.projects[0]
    }

    pub fn is_multi_project(&self) -> bool {
        self.projects.len() > 1
    }
}

fn parse_layout_entry(entry: &str) -> Result<(String, usize), ProvisionError> {
    let entry = entry.trim();
    let (name, index) = match entry.split_once(':') {
        Some((name, index)) => {
            let index = index.trim().parse::<usize>().map_err(|_| {
                ProvisionError::Validation(format!(
                    "invalid project index in cluster entry {:?}",
                    entry
                ))
            })?;
            (name.trim(), index)
        }
        None => (entry, 0),
    };
    if name.is_empty() {
        return Err(ProvisionError::Validation(format!(
            "empty cluster name in entry {:?}",
            entry
        )));
    }
    Ok((name.to_string(), index))
}

/// `kt2-<uid>-<i>` for i in 1..=num_clusters; the uid is cut to 33 characters
/// so names stay within GKE's 40 character limit.
pub fn generate_cluster_names(num_clusters: usize, uid: &str) -> Vec<String> {
    let id = if uid.is_empty() {
        String::new()
    } else {
        let trimmed: String = uid.chars().take(MAX_RUN_ID_LENGTH).collect();
        format!("{}-", trimmed)
    };
    (1..=num_clusters)
        .map(|i| format!("{}{}{}", CLUSTER_NAME_PREFIX, id, i))
        .collect()
}
