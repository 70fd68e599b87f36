use glam::{Affine3A, Quat, Vec3};
use slotmap::SlotMap;

use crate::scene::node::Node;
use crate::scene::transform_system;
use crate::scene::NodeHandle;

/// Scene graph container.
///
/// `Scene` is a pure data layer: a node arena plus the list of root nodes.
/// World matrices are refreshed explicitly through [`Scene::update_matrix_world`]
/// or the targeted [`Scene::update_world_matrix`].
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub nodes: SlotMap<NodeHandle, Node>,
    pub root_nodes: Vec<NodeHandle>,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root_nodes: Vec::new(),
        }
    }

    // ========================================================================
    // Node creation & hierarchy
    // ========================================================================

    /// Inserts a detached node (not a root, no parent).
    pub fn create_node(&mut self) -> NodeHandle {
        self.nodes.insert(Node::new())
    }

    /// Inserts a detached named node.
    pub fn create_node_with_name(&mut self, name: &str) -> NodeHandle {
        self.nodes.insert(Node::with_name(name))
    }

    /// Adds a node as a scene root.
    pub fn add_node(&mut self, node: Node) -> NodeHandle {
        let handle = self.nodes.insert(node);
        self.root_nodes.push(handle);
        handle
    }

    /// Adds a node directly under `parent`.
    pub fn add_to_parent(&mut self, child: Node, parent: NodeHandle) -> NodeHandle {
        let handle = self.nodes.insert(child);
        self.attach(handle, parent);
        handle
    }

    /// Removes a node and its whole subtree.
    pub fn remove_node(&mut self, handle: NodeHandle) {
        let children = if let Some(node) = self.nodes.get(handle) {
            node.children.clone()
        } else {
            return;
        };

        for child in children {
            self.remove_node(child);
        }

        self.detach(handle);
        self.root_nodes.retain(|&h| h != handle);
        self.nodes.remove(handle);
    }

    /// Re-parents `child` under `parent`, keeping both sides in sync.
    pub fn attach(&mut self, child: NodeHandle, parent: NodeHandle) {
        if child == parent {
            log::warn!("Cannot attach node to itself!");
            return;
        }
        if self.is_ancestor(child, parent) {
            log::warn!("Cannot attach a node under its own descendant");
            return;
        }
        if !self.nodes.contains_key(parent) {
            log::error!("Parent node not found during attach!");
            return;
        }

        self.detach(child);
        self.root_nodes.retain(|&h| h != child);

        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
            c.transform.mark_dirty();
        }
    }

    /// Unlinks `handle` from its parent. The node stays in the arena.
    pub fn detach(&mut self, handle: NodeHandle) {
        let Some(parent) = self.nodes.get(handle).and_then(|n| n.parent) else {
            return;
        };

        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|&h| h != handle);
        }
        if let Some(c) = self.nodes.get_mut(handle) {
            c.parent = None;
            c.transform.mark_dirty();
        }
    }

    /// Returns whether `ancestor` is `node` or one of its ancestors.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        let mut current = Some(node);
        let mut guard = self.nodes.len() + 1;
        while let Some(h) = current {
            if h == ancestor {
                return true;
            }
            guard -= 1;
            if guard == 0 {
                return false;
            }
            current = self.nodes.get(h).and_then(|n| n.parent);
        }
        false
    }

    #[must_use]
    pub fn get_node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    pub fn get_node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    #[must_use]
    pub fn get_name(&self, handle: NodeHandle) -> Option<&str> {
        self.nodes.get(handle).map(|n| n.name.as_str())
    }

    pub fn set_name(&mut self, handle: NodeHandle, name: &str) {
        if let Some(node) = self.nodes.get_mut(handle) {
            name.clone_into(&mut node.name);
        }
    }

    /// Depth-first search for a node called `name` in the subtree of `root`.
    #[must_use]
    pub fn find_node_by_name(&self, root: NodeHandle, name: &str) -> Option<NodeHandle> {
        let mut stack = vec![root];
        while let Some(handle) = stack.pop() {
            let Some(node) = self.nodes.get(handle) else {
                continue;
            };
            if node.name == name {
                return Some(handle);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }

    /// Iterates `handle`'s ancestors, nearest first.
    pub fn ancestors(&self, handle: NodeHandle) -> impl Iterator<Item = NodeHandle> + '_ {
        let mut current = self.nodes.get(handle).and_then(|n| n.parent);
        let mut remaining = self.nodes.len();
        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            remaining -= 1;
            let h = current?;
            current = self.nodes.get(h).and_then(|n| n.parent);
            Some(h)
        })
    }

    // ========================================================================
    // Transform propagation
    // ========================================================================

    /// Refreshes the world matrices of the whole scene.
    pub fn update_matrix_world(&mut self) {
        transform_system::update_hierarchy_iterative(&mut self.nodes, &self.root_nodes);
    }

    /// Refreshes one node's world matrix, optionally its ancestors first and
    /// its descendants afterwards.
    pub fn update_world_matrix(&mut self, handle: NodeHandle, update_parents: bool, update_children: bool) {
        if update_parents {
            transform_system::update_ancestors(&mut self.nodes, handle);
        } else {
            transform_system::update_node_world(&mut self.nodes, handle);
        }

        if update_children {
            transform_system::update_subtree(&mut self.nodes, handle);
        }
    }

    /// Cached world matrix (identity for unknown handles).
    #[must_use]
    pub fn world_matrix(&self, handle: NodeHandle) -> Affine3A {
        self.nodes
            .get(handle)
            .map_or(Affine3A::IDENTITY, |n| n.transform.world_matrix)
    }

    #[must_use]
    pub fn world_position(&self, handle: NodeHandle) -> Vec3 {
        self.world_matrix(handle).translation.into()
    }

    #[must_use]
    pub fn world_rotation(&self, handle: NodeHandle) -> Quat {
        self.nodes
            .get(handle)
            .map_or(Quat::IDENTITY, |n| n.transform.world_rotation())
    }

    /// Cached world matrix of the parent (identity for roots).
    #[must_use]
    pub fn parent_world_matrix(&self, handle: NodeHandle) -> Affine3A {
        self.nodes
            .get(handle)
            .and_then(|n| n.parent)
            .map_or(Affine3A::IDENTITY, |p| self.world_matrix(p))
    }
}
