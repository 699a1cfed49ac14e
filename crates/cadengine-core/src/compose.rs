//! Group and ungroup.
//!
//! Grouping folds top-level nodes into a new group placed at the centroid of
//! their world positions. Each member's position is re-expressed in the
//! group's frame so nothing moves on screen. Ungrouping maps members back
//! through the group's transform and puts them at the top level again.

use crate::geometry::{Inversion, invert_or_identity, is_translation, linear_part};
use crate::scene::{Scene, Slot};
use crate::shapes::{Geometry, GroupGeometry, NodeFlags, NodeId, NodeTree, ShapeNode};
use kurbo::{Affine, Point, Rect};
use uuid::Uuid;

/// Pre-group state of one member.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberState {
    pub id: NodeId,
    pub slot: Slot,
    pub position: Point,
    pub transform: Affine,
    pub flags: NodeFlags,
    pub selected: bool,
}

impl MemberState {
    fn capture(scene: &Scene, id: NodeId) -> Option<Self> {
        let node = scene.get(id)?;
        Some(Self {
            id,
            slot: scene.slot_of(id)?,
            position: node.position,
            transform: node.transform,
            flags: node.flags,
            selected: scene.is_selected(id),
        })
    }
}

/// Nodes that can be grouped together: attached, top-level, unique, in
/// back-to-front order. Fewer than two means grouping is a no-op.
pub fn groupable(scene: &Scene, ids: &[NodeId]) -> Vec<NodeId> {
    scene
        .roots()
        .iter()
        .copied()
        .filter(|root| ids.contains(root))
        .collect()
}

/// Fold `ids` into a new group with id `group_id`.
///
/// Returns the members' previous state, or `None` (leaving the scene
/// untouched) when fewer than two nodes qualify.
pub fn group_nodes(
    scene: &mut Scene,
    ids: &[NodeId],
    group_id: NodeId,
    placeholder: f64,
) -> Option<Vec<MemberState>> {
    let members = groupable(scene, ids);
    if members.len() < 2 || scene.contains(group_id) {
        return None;
    }
    let states: Vec<MemberState> = members
        .iter()
        .filter_map(|&id| MemberState::capture(scene, id))
        .collect();
    let world: Vec<Point> = members
        .iter()
        .filter_map(|&id| scene.world_position(id))
        .collect();
    let centroid = world
        .iter()
        .fold(Point::ZERO, |acc, p| acc + p.to_vec2() / world.len() as f64);

    // Insert right above the frontmost member.
    let front = states.iter().map(|s| s.slot.index).max().unwrap_or(0);
    let top_z = members
        .iter()
        .filter_map(|&id| scene.get(id).map(|n| n.z_order))
        .reduce(f64::max)
        .unwrap_or(0.0);
    let mut group = ShapeNode::with_id(
        group_id,
        Geometry::Group(GroupGeometry::placeholder(placeholder)),
    );
    group.position = centroid;
    group.z_order = top_z;
    scene.attach(NodeTree::leaf(group), Slot::root(front + 1));

    let (to_group, _) = invert_or_identity(scene.world_transform(group_id));
    for (&id, &world_pos) in members.iter().zip(&world) {
        scene.deselect(id);
        scene.reparent(id, Some(group_id), usize::MAX);
        if let Some(node) = scene.get_mut(id) {
            node.position = to_group * world_pos;
            node.flags = NodeFlags::grouped();
        }
    }
    fit_group(scene, group_id, placeholder);
    scene.set_selection([group_id]);
    log::debug!("Grouped {} nodes into {group_id}", members.len());
    Some(states)
}

/// Recompute a group's rectangle from its members.
pub fn fit_group(scene: &mut Scene, group_id: NodeId, placeholder: f64) {
    let union = scene
        .children_of(group_id)
        .iter()
        .filter_map(|&id| scene.get(id).map(ShapeNode::bounds_in_parent))
        .reduce(|a, b| a.union(b));
    let rect = match union {
        Some(rect) if rect.width() > 0.0 || rect.height() > 0.0 => rect,
        _ => GroupGeometry::placeholder(placeholder).rect,
    };
    if let Some(node) = scene.get_mut(group_id) {
        if let Some(geometry) = node.geometry.as_group_mut() {
            geometry.rect = rect;
        }
        node.refresh_handles();
    }
}

/// Put grouped members back where `states` says, then drop the group.
pub fn restore_members(scene: &mut Scene, group_id: NodeId, states: &[MemberState]) -> bool {
    if !scene.contains(group_id) {
        return false;
    }
    for state in states {
        scene.reparent(state.id, None, usize::MAX);
    }
    scene.remove_node(group_id);

    let mut ordered: Vec<&MemberState> = states.iter().collect();
    ordered.sort_by_key(|s| s.slot.index);
    for state in ordered {
        scene.reparent(state.id, state.slot.parent, state.slot.index);
        if let Some(node) = scene.get_mut(state.id) {
            node.position = state.position;
            node.transform = state.transform;
            node.flags = state.flags;
        }
        if state.selected {
            scene.select(state.id);
        }
    }
    log::debug!("Restored {} members of {group_id}", states.len());
    true
}

/// Member layout inside a group, kept so an ungroup can be reverted.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupFrame {
    pub group: ShapeNode,
    pub slot: Slot,
    pub members: Vec<MemberState>,
}

/// Result of ungrouping one group.
#[derive(Debug, Clone, PartialEq)]
pub struct Ungrouped {
    pub frame: GroupFrame,
    pub members: Vec<NodeId>,
    /// Fallback if a member's frame could not be inverted.
    pub inversion: Inversion,
}

/// Move a group's members to the top level at their world positions and
/// remove the group.
pub fn ungroup_node(scene: &mut Scene, group_id: NodeId) -> Option<Ungrouped> {
    let group = scene.get(group_id)?;
    if !group.is_group() {
        return None;
    }
    let slot = scene.slot_of(group_id)?;
    let group_world = scene.world_transform(group_id);
    let linear = linear_part(group_world);
    let group_node = group.unlinked();
    let member_ids = group.children().to_vec();

    let mut inversion = Inversion::Exact;
    let mut states = Vec::with_capacity(member_ids.len());
    let mut placed = Vec::with_capacity(member_ids.len());
    for &id in &member_ids {
        let Some(state) = MemberState::capture(scene, id) else {
            continue;
        };
        let Some(node) = scene.get(id) else {
            continue;
        };
        let world_pos = group_world * node.position;
        let transform = if is_translation(linear) {
            node.transform
        } else {
            // Fold the group's linear part into the member: the member's own
            // rotation and scale stay outermost, so the extra goes inside them.
            let own = Affine::rotate(node.rotation.to_radians()) * Affine::scale(node.scale);
            let (own_inverse, how) = invert_or_identity(own);
            inversion = inversion.merge(how);
            own_inverse * linear * own * node.transform
        };
        placed.push((id, world_pos, transform));
        states.push(state);
    }

    let base = match slot.parent {
        None => slot.index + 1,
        Some(_) => scene.roots().len(),
    };
    for (offset, (id, world_pos, transform)) in placed.into_iter().enumerate() {
        scene.reparent(id, None, base + offset);
        if let Some(node) = scene.get_mut(id) {
            node.position = world_pos;
            node.transform = transform;
            node.flags = NodeFlags::default();
        }
    }
    scene.remove_node(group_id);
    scene.set_selection(member_ids.iter().copied());
    if inversion.is_fallback() {
        log::warn!("Ungroup of {group_id} used an identity fallback");
    }
    log::debug!("Ungrouped {} members from {group_id}", member_ids.len());
    Some(Ungrouped {
        frame: GroupFrame {
            group: group_node,
            slot,
            members: states,
        },
        members: member_ids,
        inversion,
    })
}

/// Recreate a group from a frame saved by [`ungroup_node`].
pub fn regroup(scene: &mut Scene, frame: &GroupFrame) -> bool {
    let group_id = frame.group.id();
    if scene.contains(group_id) {
        return false;
    }
    for state in &frame.members {
        scene.deselect(state.id);
    }
    if !scene.attach(NodeTree::leaf(frame.group.clone()), frame.slot) {
        return false;
    }
    for state in &frame.members {
        scene.reparent(state.id, Some(group_id), state.slot.index);
        if let Some(node) = scene.get_mut(state.id) {
            node.position = state.position;
            node.transform = state.transform;
            node.flags = state.flags;
        }
    }
    scene.set_selection([group_id]);
    true
}

/// History entry for grouping.
#[derive(Debug, Clone)]
pub struct GroupCommand {
    group: NodeId,
    members: Vec<NodeId>,
    placeholder: f64,
    restore: Vec<MemberState>,
}

impl GroupCommand {
    pub fn new(members: Vec<NodeId>, placeholder: f64) -> Self {
        Self {
            group: Uuid::new_v4(),
            members,
            placeholder,
            restore: Vec::new(),
        }
    }

    /// Id the group node gets whenever this command is applied.
    pub fn group_id(&self) -> NodeId {
        self.group
    }

    pub(crate) fn apply(&mut self, scene: &mut Scene) -> bool {
        match group_nodes(scene, &self.members, self.group, self.placeholder) {
            Some(states) => {
                self.restore = states;
                true
            }
            None => false,
        }
    }

    pub(crate) fn revert(&mut self, scene: &mut Scene) -> bool {
        restore_members(scene, self.group, &self.restore)
    }
}

/// History entry for ungrouping.
#[derive(Debug, Clone)]
pub struct UngroupCommand {
    group: NodeId,
    frame: Option<GroupFrame>,
    inversion: Inversion,
}

impl UngroupCommand {
    pub fn new(group: NodeId) -> Self {
        Self {
            group,
            frame: None,
            inversion: Inversion::Exact,
        }
    }

    pub fn group_id(&self) -> NodeId {
        self.group
    }

    /// Outcome of the last inversion done while applying.
    pub fn inversion(&self) -> Inversion {
        self.inversion
    }

    pub(crate) fn apply(&mut self, scene: &mut Scene) -> bool {
        match ungroup_node(scene, self.group) {
            Some(result) => {
                self.inversion = result.inversion;
                self.frame = Some(result.frame);
                true
            }
            None => false,
        }
    }

    pub(crate) fn revert(&mut self, scene: &mut Scene) -> bool {
        match &self.frame {
            Some(frame) => regroup(scene, frame),
            None => false,
        }
    }
}

/// Bounding box of a node in scene coordinates.
pub fn world_bounds(scene: &Scene, id: NodeId) -> Option<Rect> {
    let node = scene.get(id)?;
    Some(scene.world_transform(id).transform_rect_bbox(node.bounds()))
}
