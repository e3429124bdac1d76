//! Project/container tree with a flattened, navigable view
//!
//! Nodes live in an arena (`Vec<Node>`) and refer to each other by index.
//! The tree is rebuilt from scratch on every refresh; a node's path
//! (`project/container`) is its only identity across rebuilds.

use crate::grouping::ProjectGroupManager;
use crate::runtime::ContainerRecord;
use std::collections::HashMap;

pub type NodeId = usize;

/// Arena index of the synthetic root.
pub const ROOT: NodeId = 0;
pub const ROOT_NAME: &str = "root";

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Project { expanded: bool },
    Container(ContainerRecord),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    /// Back-reference for depth/path only; `None` for the root.
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn is_project(&self) -> bool {
        matches!(self.kind, NodeKind::Project { .. })
    }

    pub fn is_expanded(&self) -> bool {
        matches!(self.kind, NodeKind::Project { expanded: true })
    }

    pub fn container(&self) -> Option<&ContainerRecord> {
        match &self.kind {
            NodeKind::Container(record) => Some(record),
            NodeKind::Project { .. } => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    flat: Vec<NodeId>,
    selected: usize,
}

impl Default for Tree {
    fn default() -> Self {
        Self {
            nodes: vec![Node {
                name: ROOT_NAME.to_string(),
                kind: NodeKind::Project { expanded: true },
                parent: None,
                children: Vec::new(),
            }],
            flat: Vec::new(),
            selected: 0,
        }
    }
}

impl Tree {
    /// Group the containers into projects (all expanded) under a fresh root.
    pub fn build(containers: &[ContainerRecord]) -> Self {
        let mut tree = Tree::default();

        for group in ProjectGroupManager::group_by_project(containers) {
            let project_id = tree.push(ROOT, group.name, NodeKind::Project { expanded: true });
            for record in group.containers {
                tree.push(project_id, record.name.clone(), NodeKind::Container(record));
            }
        }

        tree.flatten();
        tree
    }

    /// Replace this tree with one built from `containers`, carrying over
    /// expansion flags (by project name) and the selection (by path).
    pub fn rebuild(&mut self, containers: &[ContainerRecord]) {
        let selected_path = self.selected_id().map(|id| self.path(id)).unwrap_or_default();
        let expansion = self.expansion_state();
        let previous_index = self.selected;

        let mut next = Tree::build(containers);
        next.apply_expansion_state(&expansion);
        next.selected = previous_index;
        next.restore_selection(&selected_path);

        *self = next;
    }

    fn push(&mut self, parent: NodeId, name: String, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            name,
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    /// Recompute the visible sequence: pre-order from the root's children,
    /// descending only into expanded projects.
    pub fn flatten(&mut self) {
        let mut flat = Vec::with_capacity(self.nodes.len().saturating_sub(1));
        for &child in &self.nodes[ROOT].children {
            self.flatten_into(child, &mut flat);
        }
        self.flat = flat;
    }

    fn flatten_into(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        if self.nodes[id].is_expanded() {
            for &child in &self.nodes[id].children {
                self.flatten_into(child, out);
            }
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn flat(&self) -> &[NodeId] {
        &self.flat
    }

    pub fn len(&self) -> usize {
        self.flat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }

    /// Top-level project ids in display order.
    pub fn projects(&self) -> &[NodeId] {
        &self.nodes[ROOT].children
    }

    /// The raw selection index; only meaningful when `selected_id` is `Some`.
    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_id(&self) -> Option<NodeId> {
        self.flat.get(self.selected).copied()
    }

    pub fn selected_node(&self) -> Option<&Node> {
        self.selected_id().map(|id| &self.nodes[id])
    }

    pub fn move_up(&mut self) {
        if self.selected > 0 && !self.flat.is_empty() {
            self.selected -= 1;
        }
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.flat.len() {
            self.selected += 1;
        }
    }

    pub fn page_up(&mut self, rows: usize) {
        for _ in 0..rows {
            self.move_up();
        }
    }

    pub fn page_down(&mut self, rows: usize) {
        for _ in 0..rows {
            self.move_down();
        }
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self) {
        if !self.flat.is_empty() {
            self.selected = self.flat.len() - 1;
        }
    }

    /// Flip the selected project's expansion. Containers are left alone.
    pub fn toggle_expanded(&mut self) {
        if let Some(id) = self.selected_id() {
            if let NodeKind::Project { expanded } = self.nodes[id].kind {
                self.set_expanded(id, !expanded);
            }
        }
    }

    pub fn collapse_selected(&mut self) {
        if let Some(id) = self.selected_id() {
            if self.nodes[id].is_expanded() {
                self.set_expanded(id, false);
            }
        }
    }

    pub fn expand_selected(&mut self) {
        if let Some(id) = self.selected_id() {
            if matches!(self.nodes[id].kind, NodeKind::Project { expanded: false }) {
                self.set_expanded(id, true);
            }
        }
    }

    fn set_expanded(&mut self, id: NodeId, value: bool) {
        if let NodeKind::Project { expanded } = &mut self.nodes[id].kind {
            *expanded = value;
            self.flatten();
        }
    }

    /// Parent hops between the node and the root: 0 for projects, 1 for
    /// their containers.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.nodes[id].parent;
        while let Some(parent) = current {
            if parent == ROOT {
                break;
            }
            depth += 1;
            current = self.nodes[parent].parent;
        }
        depth
    }

    /// Slash-joined names from the top-level project down to the node.
    /// Empty for the root.
    pub fn path(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == ROOT {
                break;
            }
            names.push(self.nodes[node_id].name.as_str());
            current = self.nodes[node_id].parent;
        }
        names.reverse();
        names.join("/")
    }

    /// Select the visible node with this path. If it is gone, the index is
    /// kept unless it fell off the end, in which case it resets to 0.
    pub fn restore_selection(&mut self, path: &str) {
        if !path.is_empty() {
            if let Some(index) = self.flat.iter().position(|&id| self.path(id) == path) {
                self.selected = index;
                return;
            }
        }
        if self.selected >= self.flat.len() {
            self.selected = 0;
        }
    }

    /// Expansion flag of every project, keyed by project name.
    pub fn expansion_state(&self) -> HashMap<String, bool> {
        self.projects()
            .iter()
            .map(|&id| (self.nodes[id].name.clone(), self.nodes[id].is_expanded()))
            .collect()
    }

    /// Re-apply saved flags by name; projects not in the map keep their
    /// default.
    pub fn apply_expansion_state(&mut self, state: &HashMap<String, bool>) {
        let projects = self.projects().to_vec();
        for id in projects {
            if let Some(&saved) = state.get(&self.nodes[id].name) {
                if let NodeKind::Project { expanded } = &mut self.nodes[id].kind {
                    *expanded = saved;
                }
            }
        }
        self.flatten();
    }

    /// Member records of a project node, in display order.
    pub fn project_children(&self, id: NodeId) -> Vec<&ContainerRecord> {
        self.nodes[id]
            .children
            .iter()
            .filter_map(|&child| self.nodes[child].container())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fake::record;
    use proptest::prelude::*;

    fn names(tree: &Tree) -> Vec<String> {
        tree.flat().iter().map(|&id| tree.node(id).name.clone()).collect()
    }

    fn sample() -> Vec<ContainerRecord> {
        vec![
            record("shopapp_web_1", "running"),
            record("shopapp_db_1", "running"),
            record("standalone", "exited"),
            record("blog-app-1", "running"),
        ]
    }

    fn select_path(tree: &mut Tree, path: &str) {
        tree.restore_selection(path);
        assert_eq!(tree.selected_id().map(|id| tree.path(id)).as_deref(), Some(path));
    }

    #[test]
    fn build_flattens_projects_then_children() {
        let tree = Tree::build(&sample());

        assert_eq!(
            names(&tree),
            vec!["blog", "blog-app-1", "shopapp", "shopapp_db_1", "shopapp_web_1", "standalone", "standalone"]
        );
        assert!(tree.flat().iter().all(|&id| id != ROOT));
        assert_eq!(tree.selected_index(), 0);
    }

    #[test]
    fn depth_and_path() {
        let tree = Tree::build(&sample());
        let project = tree.flat()[2];
        let container = tree.flat()[3];

        assert_eq!(tree.depth(project), 0);
        assert_eq!(tree.depth(container), 1);
        assert_eq!(tree.path(project), "shopapp");
        assert_eq!(tree.path(container), "shopapp/shopapp_db_1");
        assert_eq!(tree.path(ROOT), "");
        assert_eq!(tree.depth(ROOT), 0);
    }

    #[test]
    fn navigation_is_clamped() {
        let mut tree = Tree::build(&sample());
        tree.move_up();
        assert_eq!(tree.selected_index(), 0);

        tree.page_down(100);
        assert_eq!(tree.selected_index(), tree.len() - 1);
        tree.move_down();
        assert_eq!(tree.selected_index(), tree.len() - 1);

        tree.select_first();
        assert_eq!(tree.selected_index(), 0);
        tree.select_last();
        tree.page_up(2);
        assert_eq!(tree.selected_index(), tree.len() - 3);
    }

    #[test]
    fn navigation_on_empty_tree_is_a_no_op() {
        let mut tree = Tree::build(&[]);
        tree.move_down();
        tree.move_up();
        tree.select_last();
        tree.toggle_expanded();
        assert!(tree.is_empty());
        assert_eq!(tree.selected_index(), 0);
        assert!(tree.selected_node().is_none());
    }

    #[test]
    fn toggle_only_affects_projects() {
        let mut tree = Tree::build(&sample());
        select_path(&mut tree, "shopapp/shopapp_db_1");
        let before = names(&tree);
        tree.toggle_expanded();
        assert_eq!(names(&tree), before);

        select_path(&mut tree, "shopapp");
        tree.toggle_expanded();
        assert_eq!(names(&tree), vec!["blog", "blog-app-1", "shopapp", "standalone", "standalone"]);
        tree.toggle_expanded();
        assert_eq!(names(&tree), before);
    }

    #[test]
    fn collapse_and_expand_are_directional() {
        let mut tree = Tree::build(&sample());
        select_path(&mut tree, "blog");

        tree.expand_selected();
        assert_eq!(tree.len(), 7);
        tree.collapse_selected();
        assert_eq!(tree.len(), 6);
        tree.collapse_selected();
        assert_eq!(tree.len(), 6);
        tree.expand_selected();
        assert_eq!(tree.len(), 7);
    }

    #[test]
    fn rebuild_preserves_selection_and_expansion() {
        let mut tree = Tree::build(&sample());
        select_path(&mut tree, "shopapp");
        tree.toggle_expanded();
        select_path(&mut tree, "standalone/standalone");

        let mut containers = sample();
        containers.push(record("api_worker_1", "running"));
        tree.rebuild(&containers);

        assert_eq!(tree.selected_node().map(|n| n.name.as_str()), Some("standalone"));
        assert_eq!(tree.path(tree.selected_id().unwrap()), "standalone/standalone");
        assert_eq!(tree.expansion_state().get("shopapp"), Some(&false));
        assert_eq!(tree.expansion_state().get("api"), Some(&true));
    }

    #[test]
    fn rebuild_keeps_index_when_selected_path_disappears() {
        let mut tree = Tree::build(&sample());
        select_path(&mut tree, "shopapp/shopapp_db_1");
        let index = tree.selected_index();

        let containers: Vec<_> = sample().into_iter().filter(|c| c.name != "shopapp_db_1").collect();
        tree.rebuild(&containers);

        assert_eq!(tree.selected_index(), index);
    }

    #[test]
    fn rebuild_resets_out_of_range_selection() {
        let mut tree = Tree::build(&sample());
        tree.select_last();

        tree.rebuild(&[record("solo", "running")]);

        assert_eq!(tree.selected_index(), 0);
        assert_eq!(tree.selected_node().map(|n| n.name.as_str()), Some("solo"));
    }

    #[test]
    fn rebuild_into_empty_tree() {
        let mut tree = Tree::build(&sample());
        tree.select_last();
        tree.rebuild(&[]);
        assert!(tree.is_empty());
        assert!(tree.selected_node().is_none());
    }

    #[test]
    fn project_children_lists_member_records() {
        let tree = Tree::build(&sample());
        let shopapp = tree.projects()[1];
        let children: Vec<&str> = tree.project_children(shopapp).iter().map(|c| c.name.as_str()).collect();
        assert_eq!(children, vec!["shopapp_db_1", "shopapp_web_1"]);
    }

    fn containers_strategy() -> impl Strategy<Value = Vec<ContainerRecord>> {
        proptest::collection::btree_set("[a-c]{1,2}[_-]?[a-c0-9]{0,3}", 0..20).prop_map(|names| {
            names
                .into_iter()
                .map(|name| record(&name, "running"))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn flat_length_counts_projects_and_expanded_children(
            containers in containers_strategy(),
            collapse_mask in proptest::collection::vec(any::<bool>(), 20),
        ) {
            let mut tree = Tree::build(&containers);
            let projects = tree.projects().to_vec();
            let state: HashMap<String, bool> = projects
                .iter()
                .enumerate()
                .map(|(i, &id)| (tree.node(id).name.clone(), !collapse_mask[i % collapse_mask.len()]))
                .collect();
            tree.apply_expansion_state(&state);

            let expected: usize = projects
                .iter()
                .map(|&id| 1 + if tree.node(id).is_expanded() { tree.node(id).children.len() } else { 0 })
                .sum();
            prop_assert_eq!(tree.len(), expected);
            prop_assert!(tree.flat().iter().all(|&id| id != ROOT));
        }

        #[test]
        fn collapse_removes_exactly_descendants_and_expand_restores(
            containers in containers_strategy(),
            pick in any::<prop::sample::Index>(),
        ) {
            let mut tree = Tree::build(&containers);
            prop_assume!(!tree.projects().is_empty());
            let project = tree.projects()[pick.index(tree.projects().len())];
            let path = tree.path(project);
            let before = names(&tree);
            let descendants = tree.node(project).children.len();

            tree.restore_selection(&path);
            tree.toggle_expanded();
            let collapsed = names(&tree);
            prop_assert_eq!(collapsed.len(), before.len() - descendants);

            let start = tree.flat().iter().position(|&id| id == project).unwrap();
            let mut expected = before.clone();
            expected.drain(start + 1..start + 1 + descendants);
            prop_assert_eq!(&collapsed, &expected);

            tree.toggle_expanded();
            prop_assert_eq!(names(&tree), before);
        }

        #[test]
        fn rebuilding_identical_input_is_idempotent(containers in containers_strategy()) {
            let mut tree = Tree::build(&containers);
            tree.rebuild(&containers);
            let first = names(&tree);
            tree.rebuild(&containers);
            prop_assert_eq!(names(&tree), first);
        }
    }
}
