//! Resize handles and drag sessions.
//!
//! Every shape kind exposes a handful of named control points in its local
//! frame. Dragging one of them reshapes the node according to the kind's
//! rule (see [`ShapeGeometry::resize_from_handle`]). The [`HandleController`]
//! wraps a press/drag/release gesture so that only the net change becomes a
//! history entry.

use crate::geometry::{invert_or_identity, map_vector};
use crate::history::Command;
use crate::scene::Scene;
use crate::shapes::{CornerScale, GeometryTuple, NodeId, ShapeGeometry};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Named control point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleRole {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Top,
    Bottom,
    Left,
    Right,
    /// First endpoint of a line.
    Start,
    /// Second endpoint of a line.
    End,
}

/// Handles of rectangle-like shapes.
pub const BOX_HANDLES: [HandleRole; 8] = [
    HandleRole::TopLeft,
    HandleRole::TopRight,
    HandleRole::BottomLeft,
    HandleRole::BottomRight,
    HandleRole::Top,
    HandleRole::Bottom,
    HandleRole::Left,
    HandleRole::Right,
];

/// Handles of text blocks.
pub const TEXT_HANDLES: [HandleRole; 6] = [
    HandleRole::TopLeft,
    HandleRole::TopRight,
    HandleRole::BottomLeft,
    HandleRole::BottomRight,
    HandleRole::Left,
    HandleRole::Right,
];

impl HandleRole {
    pub fn name(&self) -> &'static str {
        match self {
            HandleRole::TopLeft => "top_left",
            HandleRole::TopRight => "top_right",
            HandleRole::BottomLeft => "bottom_left",
            HandleRole::BottomRight => "bottom_right",
            HandleRole::Top => "top",
            HandleRole::Bottom => "bottom",
            HandleRole::Left => "left",
            HandleRole::Right => "right",
            HandleRole::Start => "start",
            HandleRole::End => "end",
        }
    }

    pub fn is_corner(&self) -> bool {
        matches!(
            self,
            HandleRole::TopLeft | HandleRole::TopRight | HandleRole::BottomLeft | HandleRole::BottomRight
        )
    }

    pub fn is_edge(&self) -> bool {
        matches!(
            self,
            HandleRole::Top | HandleRole::Bottom | HandleRole::Left | HandleRole::Right
        )
    }

    pub fn is_left_side(&self) -> bool {
        matches!(
            self,
            HandleRole::TopLeft | HandleRole::BottomLeft | HandleRole::Left
        )
    }

    pub fn is_right_side(&self) -> bool {
        matches!(
            self,
            HandleRole::TopRight | HandleRole::BottomRight | HandleRole::Right
        )
    }

    /// Whether dragging this handle changes the horizontal extent.
    pub fn moves_x(&self) -> bool {
        self.is_left_side() || self.is_right_side()
    }

    /// Whether dragging this handle changes the vertical extent.
    pub fn moves_y(&self) -> bool {
        !matches!(
            self,
            HandleRole::Left | HandleRole::Right | HandleRole::Start | HandleRole::End
        )
    }

    /// The corner that stays fixed while this corner handle moves.
    pub fn opposite_corner(&self, rect: Rect) -> Option<Point> {
        match self {
            HandleRole::TopLeft => Some(Point::new(rect.x1, rect.y1)),
            HandleRole::TopRight => Some(Point::new(rect.x0, rect.y1)),
            HandleRole::BottomLeft => Some(Point::new(rect.x1, rect.y0)),
            HandleRole::BottomRight => Some(Point::new(rect.x0, rect.y0)),
            _ => None,
        }
    }
}

impl std::str::FromStr for HandleRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BOX_HANDLES
            .into_iter()
            .chain([HandleRole::Start, HandleRole::End])
            .find(|role| role.name() == s)
            .ok_or_else(|| format!("unknown handle '{s}'"))
    }
}

/// Position of a box handle on `rect`.
pub fn rect_handle_position(rect: Rect, role: HandleRole) -> Option<Point> {
    let center = rect.center();
    match role {
        HandleRole::TopLeft => Some(Point::new(rect.x0, rect.y0)),
        HandleRole::TopRight => Some(Point::new(rect.x1, rect.y0)),
        HandleRole::BottomLeft => Some(Point::new(rect.x0, rect.y1)),
        HandleRole::BottomRight => Some(Point::new(rect.x1, rect.y1)),
        HandleRole::Top => Some(Point::new(center.x, rect.y0)),
        HandleRole::Bottom => Some(Point::new(center.x, rect.y1)),
        HandleRole::Left => Some(Point::new(rect.x0, center.y)),
        HandleRole::Right => Some(Point::new(rect.x1, center.y)),
        HandleRole::Start | HandleRole::End => None,
    }
}

/// A control point with its position in the node's local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    pub role: HandleRole,
    pub position: Point,
}

/// Geometry of a node at one instant: its position, its canonical tuple and,
/// for groups, the snapshots of its members.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometrySnapshot {
    pub position: Point,
    pub tuple: GeometryTuple,
    pub children: Vec<(NodeId, GeometrySnapshot)>,
}

impl std::fmt::Display for GeometrySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pos ({}, {}) {}",
            self.position.x, self.position.y, self.tuple
        )?;
        if !self.children.is_empty() {
            write!(f, " +{} members", self.children.len())?;
        }
        Ok(())
    }
}

/// Capture the geometry of a node and, for groups, its members.
pub fn capture_geometry(scene: &Scene, id: NodeId) -> Option<GeometrySnapshot> {
    let node = scene.get(id)?;
    let children = node
        .children()
        .iter()
        .filter_map(|&child| capture_geometry(scene, child).map(|snap| (child, snap)))
        .collect();
    Some(GeometrySnapshot {
        position: node.position,
        tuple: node.geometry.capture(),
        children,
    })
}

/// Restore a snapshot taken by [`capture_geometry`]. Nodes already matching
/// are left alone.
pub fn apply_geometry(scene: &mut Scene, id: NodeId, snapshot: &GeometrySnapshot) -> bool {
    let Some(node) = scene.get_mut(id) else {
        log::warn!("Geometry target {id} is not in the scene");
        return false;
    };
    if node.position != snapshot.position || node.geometry.capture() != snapshot.tuple {
        node.position = snapshot.position;
        if !node.geometry.restore(&snapshot.tuple) {
            log::warn!("Geometry tuple does not match {} node {id}", node.kind().tag());
            return false;
        }
        node.refresh_handles();
    }
    snapshot
        .children
        .iter()
        .all(|(child, snap)| apply_geometry(scene, *child, snap))
}

/// Move one handle of a node to `to`, given in the node's local frame.
///
/// Group members are rescaled with the group, relative to the fixed corner.
pub fn drag_handle(scene: &mut Scene, id: NodeId, role: HandleRole, to: Point) -> bool {
    let Some(node) = scene.get_mut(id) else {
        return false;
    };
    if !node.geometry.handle_roles().contains(&role) {
        return false;
    }
    let member_scale = node
        .geometry
        .as_group_mut()
        .and_then(|group| group.corner_scale(role, to));
    let shift = node.geometry.resize_from_handle(role, to);
    if shift != Vec2::ZERO {
        let delta = map_vector(node.local_affine(), shift);
        node.position += delta;
    }
    node.refresh_handles();
    let members = node.children().to_vec();

    if let Some(scale) = member_scale {
        if !scale.is_identity() {
            for member in members {
                rescale_member(scene, member, &scale);
            }
        }
    }
    true
}

/// Rescale a group member in its parent's frame. Nested members follow
/// about their own parent's origin.
fn rescale_member(scene: &mut Scene, id: NodeId, scale: &CornerScale) {
    let Some(node) = scene.get_mut(id) else {
        return;
    };
    node.position = scale.apply(node.position);
    node.geometry.scale_about_origin(scale.sx, scale.sy);
    node.refresh_handles();
    let nested = CornerScale {
        fixed: Point::ZERO,
        ..*scale
    };
    for child in node.children().to_vec() {
        rescale_member(scene, child, &nested);
    }
}

#[derive(Debug, Clone)]
struct DragSession {
    node: NodeId,
    role: HandleRole,
    before: GeometrySnapshot,
    was_movable: bool,
}

/// Tracks one handle gesture at a time.
#[derive(Debug, Default)]
pub struct HandleController {
    session: Option<DragSession>,
}

impl HandleController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    pub fn active(&self) -> Option<(NodeId, HandleRole)> {
        self.session.as_ref().map(|s| (s.node, s.role))
    }

    /// Press on a handle. Ignored unless the node is selected and has the
    /// handle. A session left over from a missed release is cancelled
    /// first, so its geometry goes back to where the press found it.
    pub fn begin(&mut self, scene: &mut Scene, id: NodeId, role: HandleRole) -> bool {
        if let Some(orphan) = &self.session {
            log::debug!("Cancelling orphaned drag on {}", orphan.node);
            self.cancel(scene);
        }
        if !scene.is_selected(id) {
            return false;
        }
        let Some(before) = capture_geometry(scene, id) else {
            return false;
        };
        let Some(node) = scene.get_mut(id) else {
            return false;
        };
        if !node.geometry.handle_roles().contains(&role) {
            return false;
        }
        let was_movable = node.flags.movable;
        node.flags.movable = false;
        self.session = Some(DragSession {
            node: id,
            role,
            before,
            was_movable,
        });
        true
    }

    /// Drag the active handle to a point in scene coordinates.
    pub fn drag(&mut self, scene: &mut Scene, scene_point: Point) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        if !scene.is_selected(session.node) {
            return false;
        }
        let (to_local, _) = invert_or_identity(scene.world_transform(session.node));
        drag_handle(scene, session.node, session.role, to_local * scene_point)
    }

    /// Release the handle. Returns a geometry command when the gesture
    /// changed anything.
    pub fn end(&mut self, scene: &mut Scene) -> Option<Command> {
        let session = self.session.take()?;
        restore_movable(scene, &session);
        let after = capture_geometry(scene, session.node)?;
        if after == session.before {
            return None;
        }
        let kind = scene.get(session.node)?.kind();
        Some(Command::ModifyGeometry {
            id: session.node,
            old: session.before,
            new: after,
            description: format!("Resize {}", kind.tag()),
        })
    }

    /// Abandon the gesture and put the geometry back.
    pub fn cancel(&mut self, scene: &mut Scene) {
        if let Some(session) = self.session.take() {
            apply_geometry(scene, session.node, &session.before);
            restore_movable(scene, &session);
        }
    }
}

fn restore_movable(scene: &mut Scene, session: &DragSession) {
    if let Some(node) = scene.get_mut(session.node) {
        node.flags.movable = session.was_movable;
    }
}
