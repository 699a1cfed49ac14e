//! Scene graph container.
//!
//! The scene owns every attached node in an id-keyed arena. Parent links are
//! ids, so ownership only flows from the arena; a node's `parent` and its
//! parent's `children` are updated together by the methods here.

use crate::shapes::{NodeId, NodeTree, ShapeNode};
use kurbo::{Affine, Point};
use std::collections::HashMap;

/// Where a node sits: under `parent` (or the root list) at `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub parent: Option<NodeId>,
    pub index: usize,
}

impl Slot {
    pub fn root(index: usize) -> Self {
        Self {
            parent: None,
            index,
        }
    }
}

/// The shape tree and its selection.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    nodes: HashMap<NodeId, ShapeNode>,
    /// Top-level nodes, back to front.
    roots: Vec<NodeId>,
    selection: Vec<NodeId>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attached nodes, including group members.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&ShapeNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut ShapeNode> {
        self.nodes.get_mut(&id)
    }

    /// Top-level node ids, back to front.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Every attached node, depth first in paint order.
    pub fn all_nodes(&self) -> Vec<&ShapeNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for &root in &self.roots {
            self.collect_depth_first(root, &mut out);
        }
        out
    }

    fn collect_depth_first<'a>(&'a self, id: NodeId, out: &mut Vec<&'a ShapeNode>) {
        if let Some(node) = self.nodes.get(&id) {
            out.push(node);
            for &child in &node.children {
                self.collect_depth_first(child, out);
            }
        }
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(cur) = current {
            if cur == ancestor {
                return true;
            }
            current = self.nodes.get(&cur).and_then(|n| n.parent);
        }
        false
    }

    /// Current slot of an attached node.
    pub fn slot_of(&self, id: NodeId) -> Option<Slot> {
        let node = self.nodes.get(&id)?;
        let siblings = self.siblings(node.parent)?;
        let index = siblings.iter().position(|&s| s == id)?;
        Some(Slot {
            parent: node.parent,
            index,
        })
    }

    fn siblings(&self, parent: Option<NodeId>) -> Option<&Vec<NodeId>> {
        match parent {
            Some(p) => self.nodes.get(&p).map(|n| &n.children),
            None => Some(&self.roots),
        }
    }

    fn siblings_mut(&mut self, parent: Option<NodeId>) -> Option<&mut Vec<NodeId>> {
        match parent {
            Some(p) => self.nodes.get_mut(&p).map(|n| &mut n.children),
            None => Some(&mut self.roots),
        }
    }

    /// Attach a subtree as the frontmost top-level node.
    pub fn add_node(&mut self, tree: NodeTree) -> NodeId {
        let id = tree.id();
        let index = self.roots.len();
        self.attach(tree, Slot::root(index));
        id
    }

    /// Attach a subtree at `slot`. The index is clamped to the sibling count.
    ///
    /// Returns false (leaving the scene untouched) if any id in the tree is
    /// already attached.
    pub fn attach(&mut self, tree: NodeTree, slot: Slot) -> bool {
        if tree.ids().iter().any(|id| self.nodes.contains_key(id)) {
            log::warn!("Refusing to attach {}: id already in scene", tree.id());
            return false;
        }
        let slot = match slot.parent {
            Some(parent) if !self.nodes.contains_key(&parent) => {
                log::warn!("Parent {parent} missing, attaching {} at top level", tree.id());
                Slot::root(self.roots.len())
            }
            _ => slot,
        };
        let id = tree.id();
        self.insert_tree(tree, slot.parent);
        if let Some(siblings) = self.siblings_mut(slot.parent) {
            let index = slot.index.min(siblings.len());
            siblings.insert(index, id);
        }
        self.debug_check(id);
        true
    }

    fn insert_tree(&mut self, tree: NodeTree, parent: Option<NodeId>) {
        let NodeTree { mut node, children } = tree;
        node.parent = parent;
        node.children = children.iter().map(NodeTree::id).collect();
        let id = node.id;
        self.nodes.insert(id, node);
        for child in children {
            self.insert_tree(child, Some(id));
        }
    }

    /// Detach a node and its descendants from the scene.
    ///
    /// Children are unlinked from the node before it is removed, then handed
    /// back inside the returned tree together with the slot it occupied.
    pub fn detach(&mut self, id: NodeId) -> Option<(Slot, NodeTree)> {
        let slot = self.slot_of(id)?;
        if let Some(siblings) = self.siblings_mut(slot.parent) {
            siblings.retain(|&s| s != id);
        }
        let tree = self.take_tree(id)?;
        Some((slot, tree))
    }

    fn take_tree(&mut self, id: NodeId) -> Option<NodeTree> {
        let child_ids = self.nodes.get(&id)?.children.clone();
        let children = child_ids
            .into_iter()
            .filter_map(|child| self.take_tree(child))
            .collect();
        let mut node = self.nodes.remove(&id)?;
        node.parent = None;
        node.children.clear();
        self.selection.retain(|&s| s != id);
        Some(NodeTree { node, children })
    }

    /// Remove a node and its subtree.
    pub fn remove_node(&mut self, id: NodeId) -> Option<NodeTree> {
        self.detach(id).map(|(_, tree)| tree)
    }

    /// Move an attached node under `parent` (or to the top level) at `index`.
    ///
    /// Position and transforms are left as they are; callers fix up frames.
    pub fn reparent(&mut self, id: NodeId, parent: Option<NodeId>, index: usize) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }
        if let Some(p) = parent {
            if !self.nodes.contains_key(&p) || self.is_ancestor_or_self(id, p) {
                return false;
            }
        }
        let Some(old) = self.slot_of(id) else {
            return false;
        };
        if let Some(siblings) = self.siblings_mut(old.parent) {
            siblings.retain(|&s| s != id);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = parent;
        }
        if let Some(siblings) = self.siblings_mut(parent) {
            let index = index.min(siblings.len());
            siblings.insert(index, id);
        }
        self.debug_check(id);
        true
    }

    /// Transform from a node's local frame to scene coordinates.
    pub fn world_transform(&self, id: NodeId) -> Affine {
        let mut affine = Affine::IDENTITY;
        let mut current = self.nodes.get(&id);
        while let Some(node) = current {
            affine = node.local_affine() * affine;
            current = node.parent.and_then(|p| self.nodes.get(&p));
        }
        affine
    }

    /// Transform from a node's parent frame to scene coordinates.
    pub fn parent_world_transform(&self, id: NodeId) -> Affine {
        self.nodes
            .get(&id)
            .and_then(|n| n.parent)
            .map(|p| self.world_transform(p))
            .unwrap_or(Affine::IDENTITY)
    }

    /// A node's position in scene coordinates.
    pub fn world_position(&self, id: NodeId) -> Option<Point> {
        let node = self.nodes.get(&id)?;
        Some(self.parent_world_transform(id) * node.position)
    }

    /// Select a node. Non-selectable and unknown nodes are ignored.
    pub fn select(&mut self, id: NodeId) -> bool {
        let selectable = self.nodes.get(&id).is_some_and(|n| n.flags.selectable);
        if selectable && !self.selection.contains(&id) {
            self.selection.push(id);
        }
        selectable
    }

    pub fn deselect(&mut self, id: NodeId) {
        self.selection.retain(|&s| s != id);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn set_selection(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.selection.clear();
        for id in ids {
            self.select(id);
        }
    }

    pub fn is_selected(&self, id: NodeId) -> bool {
        self.selection.contains(&id)
    }

    /// Selected nodes, in selection order.
    pub fn selected_nodes(&self) -> &[NodeId] {
        &self.selection
    }

    /// Remove every node.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
        self.selection.clear();
    }

    /// Highest z-order among top-level nodes.
    pub fn max_root_z(&self) -> Option<f64> {
        self.roots
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|n| n.z_order)
            .reduce(f64::max)
    }

    /// Verify that parent and child links agree around `id`.
    fn debug_check(&self, id: NodeId) {
        if cfg!(debug_assertions) {
            if let Some(node) = self.nodes.get(&id) {
                let listed = self
                    .siblings(node.parent)
                    .is_some_and(|siblings| siblings.contains(&id));
                debug_assert!(listed, "node {id} missing from its parent's children");
                for child in &node.children {
                    let back = self.nodes.get(child).and_then(|c| c.parent);
                    debug_assert_eq!(back, Some(id), "child {child} does not point back to {id}");
                }
                if !node.children.is_empty() {
                    debug_assert!(node.is_group(), "leaf node {id} has children");
                }
            }
        }
    }

    /// Check every link in the scene. Returns a description of the first
    /// inconsistency found.
    pub fn validate(&self) -> Result<(), String> {
        for &root in &self.roots {
            match self.nodes.get(&root) {
                Some(node) if node.parent.is_none() => {}
                Some(_) => return Err(format!("root {root} has a parent")),
                None => return Err(format!("root {root} is not in the arena")),
            }
        }
        for (id, node) in &self.nodes {
            if !node.children.is_empty() && !node.is_group() {
                return Err(format!("leaf node {id} has children"));
            }
            for child in &node.children {
                if self.nodes.get(child).and_then(|c| c.parent) != Some(*id) {
                    return Err(format!("child {child} does not point back to {id}"));
                }
            }
            match node.parent {
                Some(parent) => {
                    let listed = self
                        .nodes
                        .get(&parent)
                        .is_some_and(|p| p.children.contains(id));
                    if !listed {
                        return Err(format!("{id} missing from parent {parent}"));
                    }
                }
                None if !self.roots.contains(id) => {
                    return Err(format!("{id} has no parent and is not a root"));
                }
                None => {}
            }
        }
        Ok(())
    }
}
