//! Project grouping: derive a project name from a container name and bucket containers by it

use crate::runtime::ContainerRecord;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
pub struct ProjectGroup {
    pub name: String,
    pub containers: Vec<ContainerRecord>,
}

impl ProjectGroup {
    pub fn new(name: String) -> Self {
        Self {
            name,
            containers: Vec::new(),
        }
    }

    pub fn add_container(&mut self, container: ContainerRecord) {
        self.containers.push(container);
    }
}

/// Project name for a container: everything before the first `_`
/// (compose v1 naming), else before the first `-` (compose v2), else the
/// whole name.
pub fn derive_project_name(container_name: &str) -> &str {
    if let Some(idx) = container_name.find('_') {
        return &container_name[..idx];
    }
    if let Some(idx) = container_name.find('-') {
        return &container_name[..idx];
    }
    container_name
}

pub struct ProjectGroupManager;

impl ProjectGroupManager {
    /// Group containers by derived project name. Projects come out in
    /// byte-wise name order, and so do the containers inside each project.
    pub fn group_by_project(containers: &[ContainerRecord]) -> Vec<ProjectGroup> {
        let mut groups: BTreeMap<String, ProjectGroup> = BTreeMap::new();

        for container in containers {
            let project = derive_project_name(&container.name);
            groups
                .entry(project.to_string())
                .or_insert_with(|| ProjectGroup::new(project.to_string()))
                .add_container(container.clone());
        }

        groups
            .into_values()
            .map(|mut group| {
                group.containers.sort_by(|a, b| a.name.cmp(&b.name));
                group
            })
            .collect()
    }
}
