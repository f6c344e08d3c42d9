use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::traits::NodeId;

/// A node of a reconstructed subtree together with its children.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode<T> {
    pub id: NodeId,
    /// Immediate ancestor; [`VIRTUAL_ROOT`](crate::VIRTUAL_ROOT) for top-level nodes.
    pub parent_id: NodeId,
    pub item: T,
    pub children: Vec<TreeNode<T>>,
}

/// Ids-only form returned by [`Tree::tree_descendant_ids`](crate::Tree::tree_descendant_ids).
pub type IdTree = TreeNode<()>;

/// One row of a flat descendant listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Descendant<M> {
    pub node: M,
    pub parent_id: NodeId,
    /// Edges between the queried ancestor and this node.
    pub depth: i32,
}

/// Group flat `(id, parent_id, item)` rows into a forest.
///
/// Rows whose parent is not part of the input become roots. Children keep
/// the relative order of the input rows.
pub(crate) fn assemble<T>(rows: Vec<(NodeId, NodeId, T)>) -> Vec<TreeNode<T>> {
    let present: HashSet<NodeId> = rows.iter().map(|(id, _, _)| *id).collect();

    let mut children_of: HashMap<NodeId, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();
    for (index, (id, parent_id, _)) in rows.iter().enumerate() {
        if parent_id != id && present.contains(parent_id) {
            children_of.entry(*parent_id).or_default().push(index);
        } else {
            roots.push(index);
        }
    }

    let mut slots: Vec<Option<(NodeId, NodeId, T)>> = rows.into_iter().map(Some).collect();
    roots
        .into_iter()
        .filter_map(|index| build(index, &mut slots, &children_of))
        .collect()
}

fn build<T>(
    index: usize,
    slots: &mut [Option<(NodeId, NodeId, T)>],
    children_of: &HashMap<NodeId, Vec<usize>>,
) -> Option<TreeNode<T>> {
    let (id, parent_id, item) = slots[index].take()?;
    let children = match children_of.get(&id) {
        Some(indexes) => indexes
            .iter()
            .filter_map(|&child| build(child, slots, children_of))
            .collect(),
        None => Vec::new(),
    };
    Some(TreeNode {
        id,
        parent_id,
        item,
        children,
    })
}

/// Order every level of the forest by node id.
pub fn sort_forest<T>(nodes: &mut [TreeNode<T>]) {
    nodes.sort_by_key(|node| node.id);
    for node in nodes.iter_mut() {
        sort_forest(&mut node.children);
    }
}
