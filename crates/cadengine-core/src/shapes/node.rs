//! Scene-graph node.

use super::{FillStyle, Geometry, ShapeGeometry, ShapeKind, StrokeStyle};
use crate::handles::Handle;
use kurbo::{Affine, Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier for nodes.
pub type NodeId = Uuid;

/// Scalar or string value stored in a node's metadata slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        MetaValue::Bool(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        MetaValue::Int(value)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        MetaValue::Float(value)
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::Text(value)
    }
}

/// Integer-keyed extension slots.
pub type Metadata = BTreeMap<u32, MetaValue>;

/// Interaction capabilities of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeFlags {
    pub movable: bool,
    pub selectable: bool,
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self {
            movable: true,
            selectable: true,
        }
    }
}

impl NodeFlags {
    pub const MOVABLE: &'static str = "movable";
    pub const SELECTABLE: &'static str = "selectable";

    /// Flags held by a group member: the group mediates interaction.
    pub fn grouped() -> Self {
        Self {
            movable: false,
            selectable: false,
        }
    }

    /// Names of the set flags, in a fixed order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.movable {
            names.push(Self::MOVABLE);
        }
        if self.selectable {
            names.push(Self::SELECTABLE);
        }
        names
    }

    /// Build flags from names; unknown names are ignored.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut flags = Self {
            movable: false,
            selectable: false,
        };
        for name in names {
            match name {
                Self::MOVABLE => flags.movable = true,
                Self::SELECTABLE => flags.selectable = true,
                other => log::debug!("Ignoring unknown flag '{other}'"),
            }
        }
        flags
    }
}

/// A drawable shape or group in the scene graph.
///
/// Parent and children are stored as ids; the [`Scene`](crate::scene::Scene)
/// owns the nodes and keeps both directions consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeNode {
    pub(crate) id: NodeId,
    pub geometry: Geometry,
    /// Position in the parent's frame.
    pub position: Point,
    /// Extra transform applied after scale and rotation.
    pub transform: Affine,
    pub z_order: f64,
    pub visible: bool,
    pub scale: f64,
    /// Rotation in degrees.
    pub rotation: f64,
    pub stroke: Option<StrokeStyle>,
    pub fill: Option<FillStyle>,
    pub metadata: Metadata,
    pub flags: NodeFlags,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) handles: Vec<Handle>,
}

impl ShapeNode {
    /// Create a node with a fresh id and default styles for its kind.
    pub fn new(geometry: Geometry) -> Self {
        Self::with_id(Uuid::new_v4(), geometry)
    }

    /// Create a node with a specific id (used when restoring).
    pub fn with_id(id: NodeId, geometry: Geometry) -> Self {
        let kind = geometry.kind();
        let mut node = Self {
            id,
            geometry,
            position: Point::ZERO,
            transform: Affine::IDENTITY,
            z_order: 0.0,
            visible: true,
            scale: 1.0,
            rotation: 0.0,
            stroke: kind.uses_stroke().then(StrokeStyle::default),
            fill: kind.uses_fill().then(FillStyle::default),
            metadata: Metadata::new(),
            flags: NodeFlags::default(),
            parent: None,
            children: Vec::new(),
            handles: Vec::new(),
        };
        node.refresh_handles();
        node
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> ShapeKind {
        self.geometry.kind()
    }

    pub fn is_group(&self) -> bool {
        self.kind() == ShapeKind::Group
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Current control points, in the node's local frame.
    pub fn handles(&self) -> &[Handle] {
        &self.handles
    }

    /// Node-to-parent transform.
    pub fn local_affine(&self) -> Affine {
        Affine::translate(self.position.to_vec2())
            * Affine::rotate(self.rotation.to_radians())
            * Affine::scale(self.scale)
            * self.transform
    }

    /// Bounds in the node's local frame.
    pub fn bounds(&self) -> Rect {
        self.geometry.bounds()
    }

    /// Bounds mapped into the parent's frame.
    pub fn bounds_in_parent(&self) -> Rect {
        self.local_affine().transform_rect_bbox(self.bounds())
    }

    /// Recompute control points from the current geometry.
    pub fn refresh_handles(&mut self) {
        let geometry = &self.geometry;
        self.handles = geometry
            .handle_roles()
            .iter()
            .filter_map(|&role| {
                geometry
                    .handle_position(role)
                    .map(|position| Handle { role, position })
            })
            .collect();
    }

    /// A copy of this node with its links cleared.
    pub(crate) fn unlinked(&self) -> Self {
        let mut node = self.clone();
        node.parent = None;
        node.children.clear();
        node
    }
}

/// An owned subtree that is not attached to a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTree {
    pub node: ShapeNode,
    pub children: Vec<NodeTree>,
}

impl NodeTree {
    pub fn leaf(node: ShapeNode) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.node.id
    }

    /// Number of nodes in the subtree, including the root.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(NodeTree::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Every id in the subtree, depth first.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids = vec![self.node.id];
        for child in &self.children {
            ids.extend(child.ids());
        }
        ids
    }
}
