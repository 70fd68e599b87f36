//! Transform System
//!
//! Propagates local transforms into world matrices. It only borrows the node
//! arena, so callers holding other parts of an avatar mutably (humanoid,
//! spring bones) can still run it.
//!
//! Two flavours are provided:
//! - full-hierarchy propagation from the roots, skipping clean subtrees;
//! - targeted updates (a single node, its ancestor chain, a subtree) that
//!   always recompute, used by the humanoid and the spring-bone solver which
//!   need fresh parent matrices in the middle of a frame.
//!
//! A targeted update consumes the node's local dirty state, so it leaves a
//! pending mark that makes the next full pass refresh the node's children.

use glam::Affine3A;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::scene::NodeHandle;
use crate::scene::node::Node;

/// Updates the world matrices of every node reachable from `roots`.
///
/// Uses an explicit stack instead of recursion; a node's world matrix is only
/// rebuilt when its local matrix or an ancestor changed.
pub fn update_hierarchy_iterative(nodes: &mut SlotMap<NodeHandle, Node>, roots: &[NodeHandle]) {
    // (node, parent world matrix, parent changed)
    let mut stack: Vec<(NodeHandle, Affine3A, bool)> = Vec::with_capacity(64);

    for &root_handle in roots.iter().rev() {
        stack.push((root_handle, Affine3A::IDENTITY, false));
    }

    while let Some((node_handle, parent_world_matrix, parent_changed)) = stack.pop() {
        let Some(node) = nodes.get_mut(node_handle) else {
            continue;
        };

        let local_changed = node.transform.update_local_matrix();
        let pending = node.transform.take_world_pending();
        let world_needs_update = local_changed || parent_changed || pending;

        if world_needs_update {
            let new_world = parent_world_matrix * *node.transform.local_matrix();
            node.transform.set_world_matrix(new_world);
        }

        let current_world = node.transform.world_matrix;
        for &child_handle in node.children.iter().rev() {
            stack.push((child_handle, current_world, world_needs_update));
        }
    }
}

/// Recomputes a single node's world matrix from its parent's cached one.
///
/// Children are left untouched until the next full pass.
pub fn update_node_world(nodes: &mut SlotMap<NodeHandle, Node>, handle: NodeHandle) {
    let parent_world = parent_world_matrix(nodes, handle);

    if let Some(node) = nodes.get_mut(handle) {
        node.transform.update_local_matrix();
        let new_world = parent_world * *node.transform.local_matrix();
        node.transform.set_world_matrix(new_world);
        node.transform.mark_world_pending();
    }
}

/// Recomputes the world matrices along the chain root → `handle`.
pub fn update_ancestors(nodes: &mut SlotMap<NodeHandle, Node>, handle: NodeHandle) {
    let mut chain: SmallVec<[NodeHandle; 16]> = SmallVec::new();
    let mut current = Some(handle);

    while let Some(h) = current {
        if chain.contains(&h) {
            log::warn!("Cycle detected in node hierarchy while updating ancestors");
            break;
        }
        chain.push(h);
        current = nodes.get(h).and_then(|n| n.parent);
    }

    for &h in chain.iter().rev() {
        update_node_world(nodes, h);
    }
}

/// Recomputes the world matrices of `root_handle` and all its descendants.
pub fn update_subtree(nodes: &mut SlotMap<NodeHandle, Node>, root_handle: NodeHandle) {
    let parent_world = parent_world_matrix(nodes, root_handle);

    let mut stack: Vec<(NodeHandle, Affine3A)> = vec![(root_handle, parent_world)];

    while let Some((node_handle, parent_world)) = stack.pop() {
        let Some(node) = nodes.get_mut(node_handle) else {
            continue;
        };

        node.transform.update_local_matrix();
        let new_world = parent_world * *node.transform.local_matrix();
        node.transform.set_world_matrix(new_world);

        for &child_handle in node.children.iter().rev() {
            stack.push((child_handle, new_world));
        }
    }
}

#[inline]
fn parent_world_matrix(nodes: &SlotMap<NodeHandle, Node>, handle: NodeHandle) -> Affine3A {
    nodes
        .get(handle)
        .and_then(|n| n.parent)
        .and_then(|p| nodes.get(p))
        .map_or(Affine3A::IDENTITY, |p| p.transform.world_matrix)
}
