//! Name-based lookup over control and schema trees.
//!
//! Both trees implement [`TreeNode`], so the search rules live in one place:
//!
//! - [`find_by_name`] checks the direct children of the start node, then
//!   descends into each composite child in declaration order. The first match
//!   wins. Array items are searched but never matched by their index name.
//! - [`find_root`] follows parent links until a node has no parent.

use crate::control::ControlNode;

/// The read-only navigation surface shared by control and schema nodes.
pub trait TreeNode: Clone {
    fn node_name(&self) -> String;

    fn parent_node(&self) -> Option<Self>;

    fn child_nodes(&self) -> Vec<Self>;

    /// Groups and arrays.
    fn is_composite(&self) -> bool;

    /// Arrays only. Their children are anonymous items.
    fn is_array(&self) -> bool;
}

impl TreeNode for ControlNode {
    fn node_name(&self) -> String {
        self.name()
    }

    fn parent_node(&self) -> Option<Self> {
        self.parent()
    }

    fn child_nodes(&self) -> Vec<Self> {
        self.children()
    }

    fn is_composite(&self) -> bool {
        !matches!(self, ControlNode::Scalar(_))
    }

    fn is_array(&self) -> bool {
        matches!(self, ControlNode::Array(_))
    }
}

/// Depth-first, first-declared-wins search below `root`.
pub fn find_by_name<N: TreeNode>(name: &str, root: &N) -> Option<N> {
    let children = root.child_nodes();
    if !root.is_array() {
        if let Some(found) = children.iter().find(|child| child.node_name() == name) {
            return Some(found.clone());
        }
    }
    children
        .iter()
        .filter(|child| child.is_composite())
        .find_map(|child| find_by_name(name, child))
}

/// Walk parent links up to the node without a parent.
pub fn find_root<N: TreeNode>(node: &N) -> N {
    let mut current = node.clone();
    while let Some(parent) = current.parent_node() {
        current = parent;
    }
    current
}

/// Search the scope enclosing `node`, then each wider scope up to the root.
///
/// For names that are unique in the tree this finds the same node as a
/// search from the root. Inside array items it prefers fields of the same
/// item.
pub fn find_nearest<N: TreeNode>(name: &str, node: &N) -> Option<N> {
    let mut scope = node.parent_node();
    while let Some(current) = scope {
        if let Some(found) = find_by_name(name, &current) {
            return Some(found);
        }
        scope = current.parent_node();
    }
    None
}

/// Names and nesting of a tree, without values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeShape {
    pub name: String,
    pub composite: bool,
    pub children: Vec<TreeShape>,
}

pub fn shape<N: TreeNode>(node: &N) -> TreeShape {
    TreeShape {
        name: node.node_name(),
        composite: node.is_composite(),
        children: node.child_nodes().iter().map(shape).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ArrayControl, GroupControl, ScalarControl};
    use serde_json::json;

    /// root { a, home { street }, items [ { street, note } ], work { street } }
    fn tree() -> GroupControl {
        let root = GroupControl::new("root");
        root.add_control(ScalarControl::new("a", json!(1)).into());

        let home = GroupControl::new("home");
        home.add_control(ScalarControl::new("street", json!("home st")).into());
        root.add_control(home.into());

        let items = ArrayControl::new("items");
        let item = GroupControl::new("item");
        item.add_control(ScalarControl::new("street", json!("item st")).into());
        item.add_control(ScalarControl::new("note", json!("n")).into());
        items.push(item);
        root.add_control(items.into());

        let work = GroupControl::new("work");
        work.add_control(ScalarControl::new("street", json!("work st")).into());
        root.add_control(work.into());
        root
    }

    #[test]
    fn direct_children_win() {
        let root = ControlNode::Group(tree());
        let found = find_by_name("a", &root).unwrap();
        assert_eq!(found.value(), json!(1));
    }

    #[test]
    fn first_declared_branch_wins() {
        let root = ControlNode::Group(tree());
        let found = find_by_name("street", &root).unwrap();
        assert_eq!(found.value(), json!("home st"));
    }

    #[test]
    fn searches_into_array_items() {
        let root = ControlNode::Group(tree());
        let found = find_by_name("note", &root).unwrap();
        assert_eq!(found.value(), json!("n"));
    }

    #[test]
    fn array_items_are_not_matched_by_index() {
        let root = ControlNode::Group(tree());
        assert!(find_by_name("0", &root).is_none());
        assert!(find_by_name("missing", &root).is_none());
    }

    #[test]
    fn root_from_any_depth() {
        let root = ControlNode::Group(tree());
        let leaf = root.at(&["items", "0", "note"]).unwrap();
        assert!(find_root(&leaf).ptr_eq(&root));
        assert!(find_root(&root).ptr_eq(&root));
    }

    #[test]
    fn nearest_scope_prefers_siblings() {
        let root = ControlNode::Group(tree());
        let note = root.at(&["items", "0", "note"]).unwrap();
        let found = find_nearest("street", &note).unwrap();
        assert_eq!(found.value(), json!("item st"));

        let a = root.at(&["a"]).unwrap();
        assert_eq!(find_nearest("street", &a).unwrap().value(), json!("home st"));
    }

    #[test]
    fn shape_ignores_values() {
        let a = ControlNode::Group(tree());
        let b = ControlNode::Group(tree());
        b.at(&["a"]).unwrap().as_scalar().unwrap().set_value(json!(99));
        assert_eq!(shape(&a), shape(&b));
    }
}
