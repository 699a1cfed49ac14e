//! Editing session: scene, history and handle gestures behind one API.
//!
//! Every user-visible mutation goes through [`History`], so anything done
//! here can be undone.

use crate::compose::{GroupCommand, UngroupCommand, groupable};
use crate::config::EngineConfig;
use crate::geometry::{Inversion, invert_or_identity, map_vector};
use crate::handles::{HandleController, HandleRole, capture_geometry};
use crate::history::{Command, History, StyleSnapshot};
use crate::scene::Scene;
use crate::serialize::{
    DecodeError, LoadReport, SceneError, ShapeRegistry, SkippedRecord, deserialize_scene,
    serialize_node, serialize_scene,
};
use crate::shapes::{
    BoxGeometry, Geometry, ImageGeometry, LineGeometry, NodeId, NodeTree, RegularGeometry,
    ShapeKind, ShapeNode, TextGeometry, check_image_size,
};
use crate::storage::{SceneStorage, StorageError};
use image::RgbaImage;
use kurbo::{Point, Vec2};
use serde_json::Value;
use thiserror::Error;

/// Editor errors.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("cannot create {kind} from {given}")]
    InvalidArgs {
        kind: &'static str,
        given: &'static str,
    },
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Input for [`Editor::create_shape`].
#[derive(Debug, Clone)]
pub enum ShapeArgs {
    /// Two opposite corners, or the endpoints of a line.
    Corners { first: Point, second: Point },
    /// A centre and a point on the outline's bounding box.
    Centered { center: Point, edge: Point },
    /// Line endpoints with the end snapped to an axis.
    ConstrainedLine { start: Point, end: Point },
    Text { position: Point, content: String },
    Image { position: Point, pixels: RgbaImage },
}

impl ShapeArgs {
    fn name(&self) -> &'static str {
        match self {
            ShapeArgs::Corners { .. } => "corners",
            ShapeArgs::Centered { .. } => "a centre",
            ShapeArgs::ConstrainedLine { .. } => "constrained line",
            ShapeArgs::Text { .. } => "text",
            ShapeArgs::Image { .. } => "image",
        }
    }
}

/// What an ungroup did.
#[derive(Debug, Clone, PartialEq)]
pub struct UngroupReport {
    pub groups: Vec<NodeId>,
    /// Former members, now top-level and selected.
    pub members: Vec<NodeId>,
    pub inversion: Inversion,
}

/// An editing session over one scene.
#[derive(Debug)]
pub struct Editor {
    scene: Scene,
    history: History,
    controller: HandleController,
    config: EngineConfig,
    registry: ShapeRegistry,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Editor {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            scene: Scene::new(),
            history: History::new(config.history_limit),
            controller: HandleController::new(),
            config,
            registry: ShapeRegistry::builtin(),
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Direct scene access. Changes made here bypass the history.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registry used when loading; register extra tags here.
    pub fn registry_mut(&mut self) -> &mut ShapeRegistry {
        &mut self.registry
    }

    /// Create a shape with the configured default styles and put it in
    /// front of every top-level node.
    pub fn create_shape(&mut self, kind: ShapeKind, args: ShapeArgs) -> Result<NodeId, EditorError> {
        let style = &self.config.style;
        let invalid = |args: &ShapeArgs| EditorError::InvalidArgs {
            kind: kind.tag(),
            given: args.name(),
        };
        let (geometry, position) = match (kind, args) {
            (ShapeKind::Line, ShapeArgs::Corners { first, second }) => {
                (Geometry::Line(LineGeometry::new(first, second)), Point::ZERO)
            }
            (ShapeKind::Line, ShapeArgs::ConstrainedLine { start, end }) => (
                Geometry::Line(LineGeometry::constrained(start, end)),
                Point::ZERO,
            ),
            (ShapeKind::Rectangle, ShapeArgs::Corners { first, second }) => (
                Geometry::Rectangle(BoxGeometry::from_corners(first, second)),
                Point::ZERO,
            ),
            (ShapeKind::Ellipse, ShapeArgs::Corners { first, second }) => (
                Geometry::Ellipse(BoxGeometry::from_corners(first, second)),
                Point::ZERO,
            ),
            (ShapeKind::Circle, ShapeArgs::Corners { first, second }) => (
                Geometry::Circle(RegularGeometry::from_corners(first, second)),
                Point::ZERO,
            ),
            (ShapeKind::Square, ShapeArgs::Corners { first, second }) => (
                Geometry::Square(RegularGeometry::from_corners(first, second)),
                Point::ZERO,
            ),
            (ShapeKind::Rectangle, ShapeArgs::Centered { center, edge }) => (
                Geometry::Rectangle(BoxGeometry::from_center(center, edge)),
                Point::ZERO,
            ),
            (ShapeKind::Ellipse, ShapeArgs::Centered { center, edge }) => (
                Geometry::Ellipse(BoxGeometry::from_center(center, edge)),
                Point::ZERO,
            ),
            (ShapeKind::Circle, ShapeArgs::Centered { center, edge }) => (
                Geometry::Circle(RegularGeometry::from_center(center, edge)),
                Point::ZERO,
            ),
            (ShapeKind::Square, ShapeArgs::Centered { center, edge }) => (
                Geometry::Square(RegularGeometry::from_center(center, edge)),
                Point::ZERO,
            ),
            (ShapeKind::Text, ShapeArgs::Text { position, content }) => {
                let text = TextGeometry::new(content, self.config.default_text_width)
                    .with_font(style.font.clone())
                    .with_color(style.text_color);
                (Geometry::Text(text), position)
            }
            (ShapeKind::Image, ShapeArgs::Image { pixels, .. })
                if pixels.width() == 0 || pixels.height() == 0 =>
            {
                return Err(EditorError::InvalidArgs {
                    kind: kind.tag(),
                    given: "an empty image",
                });
            }
            (ShapeKind::Image, ShapeArgs::Image { pixels, .. })
                if check_image_size(f64::from(pixels.width()), f64::from(pixels.height()))
                    .is_err() =>
            {
                return Err(EditorError::InvalidArgs {
                    kind: kind.tag(),
                    given: "an oversized image",
                });
            }
            (ShapeKind::Image, ShapeArgs::Image { position, pixels }) => (
                Geometry::Image(ImageGeometry::new(Point::ZERO, pixels)),
                position,
            ),
            (_, args) => return Err(invalid(&args)),
        };

        let mut node = ShapeNode::new(geometry);
        node.position = position;
        if node.stroke.is_some() {
            node.stroke = Some(style.stroke);
        }
        if node.fill.is_some() {
            node.fill = Some(style.fill);
        }
        node.z_order = self.scene.max_root_z().map_or(0.0, |z| z + 1.0);
        let id = node.id();
        self.history
            .push(Command::add(NodeTree::leaf(node)), &mut self.scene);
        Ok(id)
    }

    pub fn select(&mut self, id: NodeId) -> bool {
        self.scene.select(id)
    }

    pub fn clear_selection(&mut self) {
        self.scene.clear_selection();
    }

    pub fn selection(&self) -> &[NodeId] {
        self.scene.selected_nodes()
    }

    /// Press on a handle of a selected node. A drag whose release was never
    /// seen is recorded before the new one starts.
    pub fn begin_handle_drag(&mut self, id: NodeId, role: HandleRole) -> bool {
        if self.controller.is_dragging() {
            log::debug!("Committing unreleased handle drag");
            self.end_handle_drag();
        }
        self.controller.begin(&mut self.scene, id, role)
    }

    /// Move the pressed handle to a point in scene coordinates.
    pub fn drag_handle_to(&mut self, point: Point) -> bool {
        self.controller.drag(&mut self.scene, point)
    }

    /// Release the handle and record the net change as one entry.
    pub fn end_handle_drag(&mut self) -> bool {
        match self.controller.end(&mut self.scene) {
            Some(command) => {
                self.history.push(command, &mut self.scene);
                true
            }
            None => false,
        }
    }

    pub fn cancel_handle_drag(&mut self) {
        self.controller.cancel(&mut self.scene);
    }

    /// Translate the selected movable nodes by `delta` (scene units).
    pub fn move_selected(&mut self, delta: Vec2) -> bool {
        let mut commands = Vec::new();
        for &id in self.scene.selected_nodes() {
            let Some(node) = self.scene.get(id) else {
                continue;
            };
            if !node.flags.movable {
                continue;
            }
            let Some(old) = capture_geometry(&self.scene, id) else {
                continue;
            };
            let (to_parent, _) = invert_or_identity(self.scene.parent_world_transform(id));
            let mut new = old.clone();
            new.position += map_vector(to_parent, delta);
            commands.push(Command::ModifyGeometry {
                id,
                old,
                new,
                description: format!("Move {}", node.kind().tag()),
            });
        }
        self.push_batch(commands, "Move selection")
    }

    /// Edit a node's style through its snapshot. Nothing is recorded if the
    /// edit leaves the style unchanged.
    pub fn modify_style(
        &mut self,
        id: NodeId,
        description: impl Into<String>,
        edit: impl FnOnce(&mut StyleSnapshot),
    ) -> bool {
        let Some(node) = self.scene.get(id) else {
            return false;
        };
        let old = StyleSnapshot::capture(node);
        let mut new = old.clone();
        edit(&mut new);
        if new == old {
            return false;
        }
        self.history.push(
            Command::ModifyStyle {
                id,
                old,
                new,
                description: description.into(),
            },
            &mut self.scene,
        );
        true
    }

    pub fn bring_to_front(&mut self, id: NodeId) -> bool {
        let others = self
            .scene
            .roots()
            .iter()
            .filter(|&&root| root != id)
            .filter_map(|&root| self.scene.get(root))
            .map(|n| n.z_order)
            .reduce(f64::max);
        let Some(top) = others else {
            return false;
        };
        self.modify_style(id, "Bring to front", |style| {
            if style.z_order <= top {
                style.z_order = top + 1.0;
            }
        })
    }

    pub fn send_to_back(&mut self, id: NodeId) -> bool {
        let others = self
            .scene
            .roots()
            .iter()
            .filter(|&&root| root != id)
            .filter_map(|&root| self.scene.get(root))
            .map(|n| n.z_order)
            .reduce(f64::min);
        let Some(bottom) = others else {
            return false;
        };
        self.modify_style(id, "Send to back", |style| {
            if style.z_order >= bottom {
                style.z_order = bottom - 1.0;
            }
        })
    }

    pub fn remove_node(&mut self, id: NodeId) -> bool {
        if !self.scene.contains(id) {
            return false;
        }
        self.controller.cancel(&mut self.scene);
        self.history.push(Command::remove(id), &mut self.scene);
        true
    }

    /// Remove every selected node as one entry. Nodes inside another
    /// selected node go with it.
    pub fn delete_selected(&mut self) -> bool {
        let selected = self.scene.selected_nodes().to_vec();
        let commands: Vec<Command> = selected
            .iter()
            .copied()
            .filter(|&id| {
                !selected
                    .iter()
                    .any(|&other| other != id && self.scene.is_ancestor_or_self(other, id))
            })
            .map(Command::remove)
            .collect();
        if commands.is_empty() {
            return false;
        }
        self.controller.cancel(&mut self.scene);
        self.push_batch(commands, "Delete selection")
    }

    /// Group the selected top-level nodes. Returns the new group's id, or
    /// `None` when fewer than two nodes qualify.
    pub fn group_selected(&mut self) -> Option<NodeId> {
        let members = groupable(&self.scene, self.scene.selected_nodes());
        if members.len() < 2 {
            return None;
        }
        self.controller.cancel(&mut self.scene);
        let command = GroupCommand::new(members, self.config.group_placeholder);
        let group_id = command.group_id();
        self.history.push(Command::Group(command), &mut self.scene);
        self.scene.contains(group_id).then_some(group_id)
    }

    /// Ungroup every selected group as one entry.
    pub fn ungroup_selected(&mut self) -> Option<UngroupReport> {
        let groups: Vec<NodeId> = self
            .scene
            .selected_nodes()
            .iter()
            .copied()
            .filter(|&id| self.scene.get(id).is_some_and(ShapeNode::is_group))
            .collect();
        if groups.is_empty() {
            return None;
        }
        self.controller.cancel(&mut self.scene);
        let members: Vec<NodeId> = groups
            .iter()
            .flat_map(|&id| self.scene.children_of(id).to_vec())
            .collect();

        let mut commands: Vec<Command> = groups
            .iter()
            .map(|&id| Command::Ungroup(UngroupCommand::new(id)))
            .collect();
        let command = if commands.len() == 1 {
            commands.remove(0)
        } else {
            Command::Composite {
                commands,
                description: "Ungroup".to_string(),
            }
        };
        self.history.push(command, &mut self.scene);
        self.scene.set_selection(members.iter().copied());

        let inversion = self
            .history
            .last_applied()
            .map_or(Inversion::Exact, ungroup_inversion);
        Some(UngroupReport {
            groups,
            members,
            inversion,
        })
    }

    pub fn undo(&mut self) -> bool {
        self.controller.cancel(&mut self.scene);
        self.history.undo(&mut self.scene)
    }

    pub fn redo(&mut self) -> bool {
        self.controller.cancel(&mut self.scene);
        self.history.redo(&mut self.scene)
    }

    pub fn serialize_scene(&self) -> Result<Value, SceneError> {
        serialize_scene(&self.scene)
    }

    pub fn serialize_node(&self, id: NodeId) -> Result<Value, SceneError> {
        serialize_node(&self.scene, id)
    }

    pub fn to_json(&self) -> Result<String, SceneError> {
        Ok(serde_json::to_string_pretty(&self.serialize_scene()?)?)
    }

    /// Add the nodes of a document to the scene as one undoable entry.
    ///
    /// Subtrees whose ids are already in the scene are skipped and listed in
    /// the report. Returns the ids of the added top-level nodes.
    pub fn deserialize_scene(
        &mut self,
        document: &Value,
    ) -> Result<(Vec<NodeId>, LoadReport), SceneError> {
        let (trees, mut report) = deserialize_scene(document, &self.registry)?;
        let mut commands = Vec::with_capacity(trees.len());
        let mut added = Vec::with_capacity(trees.len());
        for tree in trees {
            if let Some(clash) = tree.ids().into_iter().find(|&id| self.scene.contains(id)) {
                report.loaded -= tree.len();
                let skipped = SkippedRecord {
                    path: format!("node {}", tree.id()),
                    tag: Some(tree.node.kind().tag().to_string()),
                    error: DecodeError::DuplicateId(clash),
                };
                log::warn!("Skipping {}: {}", skipped.path, skipped.error);
                report.skipped.push(skipped);
                continue;
            }
            added.push(tree.id());
            commands.push(Command::add(tree));
        }
        self.push_batch(commands, "Import");
        Ok((added, report))
    }

    /// Replace the scene with a document and start a fresh history. On
    /// error the current scene is kept.
    pub fn load_scene(&mut self, document: &Value) -> Result<LoadReport, SceneError> {
        let (trees, report) = deserialize_scene(document, &self.registry)?;
        self.controller.cancel(&mut self.scene);
        self.scene.clear();
        self.history.clear();
        for tree in trees {
            self.scene.add_node(tree);
        }
        log::info!("Loaded scene: {report}");
        Ok(report)
    }

    pub fn save_to(&self, storage: &dyn SceneStorage, id: &str) -> Result<(), EditorError> {
        storage.save(id, &self.serialize_scene()?)?;
        log::info!("Saved scene '{id}' ({} nodes)", self.scene.len());
        Ok(())
    }

    pub fn load_from(&mut self, storage: &dyn SceneStorage, id: &str) -> Result<LoadReport, EditorError> {
        let document = storage.load(id)?;
        Ok(self.load_scene(&document)?)
    }

    fn push_batch(&mut self, mut commands: Vec<Command>, description: &str) -> bool {
        let command = match commands.len() {
            0 => return false,
            1 => commands.remove(0),
            _ => Command::Composite {
                commands,
                description: description.to_string(),
            },
        };
        self.history.push(command, &mut self.scene);
        true
    }
}

fn ungroup_inversion(command: &Command) -> Inversion {
    match command {
        Command::Ungroup(cmd) => cmd.inversion(),
        Command::Composite { commands, .. } => commands
            .iter()
            .map(ungroup_inversion)
            .fold(Inversion::Exact, Inversion::merge),
        _ => Inversion::Exact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{nearly_equal, points_nearly_equal, rects_nearly_equal};
    use crate::handles::BOX_HANDLES;
    use crate::shapes::{Rgba, ShapeGeometry};
    use crate::storage::MemoryStorage;
    use kurbo::Rect;

    fn corners(x0: f64, y0: f64, x1: f64, y1: f64) -> ShapeArgs {
        ShapeArgs::Corners {
            first: Point::new(x0, y0),
            second: Point::new(x1, y1),
        }
    }

    fn rect_of(editor: &Editor, id: NodeId) -> Rect {
        editor.scene().get(id).unwrap().geometry.rect().unwrap()
    }

    #[test]
    fn test_resize_rectangle_then_undo() {
        let mut editor = Editor::default();
        let id = editor
            .create_shape(ShapeKind::Rectangle, corners(50.0, 100.0, 100.0, 150.0))
            .unwrap();
        assert!(editor.select(id));

        // Bottom-right pivots on the top-left corner (50, 100).
        assert!(editor.begin_handle_drag(id, HandleRole::BottomRight));
        assert!(editor.drag_handle_to(Point::new(150.0, 120.0)));
        assert!(editor.drag_handle_to(Point::new(200.0, 50.0)));
        assert!(editor.end_handle_drag());
        assert!(rects_nearly_equal(
            rect_of(&editor, id),
            Rect::new(50.0, 50.0, 200.0, 100.0)
        ));
        // Intermediate frames are not recorded.
        assert_eq!(editor.history().len(), 2);

        assert!(editor.undo());
        assert!(rects_nearly_equal(
            rect_of(&editor, id),
            Rect::new(50.0, 100.0, 100.0, 150.0)
        ));
        assert!(editor.scene().get(id).unwrap().flags.movable);

        // Top-right pivots on the bottom-left corner (50, 150).
        assert!(editor.begin_handle_drag(id, HandleRole::TopRight));
        assert!(editor.drag_handle_to(Point::new(200.0, 50.0)));
        assert!(editor.end_handle_drag());
        let rect = rect_of(&editor, id);
        assert!(rects_nearly_equal(rect, Rect::new(50.0, 50.0, 200.0, 150.0)));
        assert_eq!((rect.width(), rect.height()), (150.0, 100.0));
        assert!(editor.undo());
        assert!(rects_nearly_equal(
            rect_of(&editor, id),
            Rect::new(50.0, 100.0, 100.0, 150.0)
        ));
    }

    #[test]
    fn test_drag_requires_selection() {
        let mut editor = Editor::default();
        let id = editor
            .create_shape(ShapeKind::Square, corners(0.0, 0.0, 10.0, 10.0))
            .unwrap();
        assert!(!editor.begin_handle_drag(id, HandleRole::TopLeft));
        assert!(!editor.end_handle_drag());
        assert_eq!(editor.history().len(), 1);
    }

    #[test]
    fn test_group_then_ungroup_restores_positions() {
        let mut editor = Editor::default();
        let a = editor
            .create_shape(ShapeKind::Rectangle, corners(0.0, 0.0, 20.0, 10.0))
            .unwrap();
        let b = editor
            .create_shape(ShapeKind::Ellipse, corners(0.0, 0.0, 10.0, 30.0))
            .unwrap();
        editor.scene_mut().get_mut(b).unwrap().position = Point::new(100.0, 100.0);
        editor.select(a);
        editor.select(b);

        let group = editor.group_selected().unwrap();
        assert!(points_nearly_equal(
            editor.scene().world_position(group).unwrap(),
            Point::new(50.0, 50.0)
        ));
        assert_eq!(editor.scene().children_of(group), &[a, b]);
        assert_eq!(editor.selection(), &[group]);

        let report = editor.ungroup_selected().unwrap();
        assert_eq!(report.groups, vec![group]);
        assert_eq!(report.members, vec![a, b]);
        assert_eq!(report.inversion, Inversion::Exact);
        assert!(!editor.scene().contains(group));
        assert_eq!(
            editor.scene().world_position(a).unwrap(),
            Point::new(0.0, 0.0)
        );
        assert_eq!(
            editor.scene().world_position(b).unwrap(),
            Point::new(100.0, 100.0)
        );
        assert!(editor.scene().get(a).unwrap().flags.selectable);
    }

    #[test]
    fn test_group_needs_two_top_level_nodes() {
        let mut editor = Editor::default();
        assert_eq!(editor.group_selected(), None);
        let a = editor
            .create_shape(ShapeKind::Circle, corners(0.0, 0.0, 5.0, 5.0))
            .unwrap();
        editor.select(a);
        assert_eq!(editor.group_selected(), None);
        assert_eq!(editor.ungroup_selected(), None);
        assert_eq!(editor.history().len(), 1);
    }

    #[test]
    fn test_undo_redo_symmetry() {
        let mut editor = Editor::default();
        let before = editor.serialize_scene().unwrap();

        let a = editor
            .create_shape(ShapeKind::Rectangle, corners(0.0, 0.0, 40.0, 20.0))
            .unwrap();
        let b = editor
            .create_shape(ShapeKind::Circle, corners(60.0, 60.0, 90.0, 80.0))
            .unwrap();
        let t = editor
            .create_shape(
                ShapeKind::Text,
                ShapeArgs::Text {
                    position: Point::new(5.0, 200.0),
                    content: "label".into(),
                },
            )
            .unwrap();
        editor.select(a);
        editor.select(b);
        assert!(editor.move_selected(Vec2::new(5.0, -5.0)));
        assert!(editor.modify_style(a, "Fill", |style| {
            style.fill = Some(crate::shapes::FillStyle {
                color: Rgba::new(255, 0, 0, 255),
            });
        }));
        assert!(editor.modify_style(t, "Edit text", |style| {
            if let Some(text) = style.text.as_mut() {
                text.content = "label\nsecond line".into();
            }
        }));
        editor.group_selected().unwrap();
        assert!(editor.send_to_back(t));

        let after = editor.serialize_scene().unwrap();
        let steps = editor.history().cursor();
        assert_eq!(steps, 8);

        for _ in 0..steps {
            assert!(editor.undo());
        }
        assert!(!editor.undo());
        assert!(editor.scene().is_empty());
        assert_eq!(editor.serialize_scene().unwrap(), before);

        for _ in 0..steps {
            assert!(editor.redo());
        }
        assert!(!editor.redo());
        assert_eq!(editor.serialize_scene().unwrap(), after);
        assert!(editor.scene().validate().is_ok());
    }

    #[test]
    fn test_push_after_undo_truncates() {
        let mut editor = Editor::default();
        for i in 0..3 {
            let x = f64::from(i) * 10.0;
            editor
                .create_shape(ShapeKind::Square, corners(x, 0.0, x + 5.0, 5.0))
                .unwrap();
        }
        assert!(editor.undo());
        assert!(editor.undo());
        assert!(editor.history().can_redo());

        editor
            .create_shape(ShapeKind::Line, corners(0.0, 0.0, 10.0, 10.0))
            .unwrap();
        assert_eq!(editor.history().len(), 2);
        assert!(!editor.history().can_redo());
        assert!(!editor.redo());
        assert_eq!(editor.scene().len(), 2);
    }

    #[test]
    fn test_history_limit_drops_oldest() {
        let config = EngineConfig {
            history_limit: Some(2),
            ..EngineConfig::default()
        };
        let mut editor = Editor::new(config);
        for i in 0..4 {
            let x = f64::from(i) * 10.0;
            editor
                .create_shape(ShapeKind::Rectangle, corners(x, 0.0, x + 5.0, 5.0))
                .unwrap();
        }
        assert_eq!(editor.history().len(), 2);
        assert!(editor.undo());
        assert!(editor.undo());
        assert!(!editor.undo());
        assert_eq!(editor.scene().len(), 2);
    }

    #[test]
    fn test_regular_shapes_stay_square_under_any_drag() {
        let targets = [
            Point::new(-30.0, 12.0),
            Point::new(75.0, 5.0),
            Point::new(41.0, 140.0),
            Point::new(-8.0, -60.0),
        ];
        for kind in [ShapeKind::Circle, ShapeKind::Square] {
            let mut editor = Editor::default();
            let id = editor.create_shape(kind, corners(10.0, 10.0, 50.0, 50.0)).unwrap();
            editor.select(id);
            for role in BOX_HANDLES {
                for target in targets {
                    assert!(editor.begin_handle_drag(id, role));
                    editor.drag_handle_to(target);
                    editor.end_handle_drag();
                    let rect = rect_of(&editor, id);
                    assert!(
                        (rect.width() - rect.height()).abs() < 1e-6,
                        "{kind:?} {role:?} -> {target:?} gave {rect:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_move_and_delete_are_single_entries() {
        let mut editor = Editor::default();
        let a = editor
            .create_shape(ShapeKind::Rectangle, corners(0.0, 0.0, 10.0, 10.0))
            .unwrap();
        let b = editor
            .create_shape(ShapeKind::Line, corners(0.0, 0.0, 10.0, 0.0))
            .unwrap();
        editor.select(a);
        editor.select(b);

        assert!(editor.move_selected(Vec2::new(3.0, 4.0)));
        assert_eq!(editor.history().undo_description().as_deref(), Some("Move selection"));
        assert_eq!(editor.scene().get(b).unwrap().position, Point::new(3.0, 4.0));

        assert!(editor.delete_selected());
        assert!(editor.scene().is_empty());
        assert_eq!(editor.history().len(), 4);

        assert!(editor.undo());
        assert_eq!(editor.scene().roots(), &[a, b]);
        assert!(editor.undo());
        assert_eq!(editor.scene().get(a).unwrap().position, Point::ZERO);
    }

    #[test]
    fn test_z_order_helpers() {
        let mut editor = Editor::default();
        let a = editor
            .create_shape(ShapeKind::Rectangle, corners(0.0, 0.0, 10.0, 10.0))
            .unwrap();
        let b = editor
            .create_shape(ShapeKind::Ellipse, corners(0.0, 0.0, 10.0, 10.0))
            .unwrap();
        let z = |editor: &Editor, id| editor.scene().get(id).unwrap().z_order;
        assert!(z(&editor, b) > z(&editor, a));

        assert!(editor.bring_to_front(a));
        assert!(z(&editor, a) > z(&editor, b));
        // Already in front.
        assert!(!editor.bring_to_front(a));
        assert!(editor.send_to_back(a));
        assert!(z(&editor, a) < z(&editor, b));

        editor.undo();
        editor.undo();
        assert!(nearly_equal(z(&editor, a), 0.0));
    }

    #[test]
    fn test_create_rejects_mismatched_args() {
        let mut editor = Editor::default();
        let err = editor
            .create_shape(ShapeKind::Group, corners(0.0, 0.0, 1.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, EditorError::InvalidArgs { kind: "group", .. }));
        assert!(
            editor
                .create_shape(
                    ShapeKind::Rectangle,
                    ShapeArgs::Text {
                        position: Point::ZERO,
                        content: String::new(),
                    },
                )
                .is_err()
        );
        assert!(editor.history().is_empty());
    }

    #[test]
    fn test_new_shapes_use_style_defaults() {
        let mut config = EngineConfig::default();
        config.style.stroke.width = 4;
        config.style.text_color = Rgba::new(0, 0, 255, 255);
        config.default_text_width = 90.0;
        let mut editor = Editor::new(config);

        let rect = editor
            .create_shape(ShapeKind::Rectangle, corners(0.0, 0.0, 10.0, 10.0))
            .unwrap();
        assert_eq!(editor.scene().get(rect).unwrap().stroke.unwrap().width, 4);

        let text = editor
            .create_shape(
                ShapeKind::Text,
                ShapeArgs::Text {
                    position: Point::new(1.0, 2.0),
                    content: "hi".into(),
                },
            )
            .unwrap();
        let node = editor.scene().get(text).unwrap();
        let geometry = node.geometry.as_text().unwrap();
        assert_eq!(geometry.color, Rgba::new(0, 0, 255, 255));
        assert_eq!(geometry.wrap_width, 90.0);
        assert_eq!(node.position, Point::new(1.0, 2.0));
        assert!(node.stroke.is_none());

        let line = editor
            .create_shape(
                ShapeKind::Line,
                ShapeArgs::ConstrainedLine {
                    start: Point::ZERO,
                    end: Point::new(10.0, 3.0),
                },
            )
            .unwrap();
        let line = editor.scene().get(line).unwrap().geometry.as_line().unwrap();
        assert_eq!(line.end, Point::new(10.0, 0.0));
    }

    #[test]
    fn test_unreleased_drag_is_recorded_before_next_press() {
        let mut editor = Editor::default();
        let a = editor
            .create_shape(ShapeKind::Rectangle, corners(0.0, 0.0, 10.0, 10.0))
            .unwrap();
        let b = editor
            .create_shape(ShapeKind::Rectangle, corners(20.0, 20.0, 30.0, 30.0))
            .unwrap();
        editor.select(a);
        editor.select(b);

        assert!(editor.begin_handle_drag(a, HandleRole::BottomRight));
        assert!(editor.drag_handle_to(Point::new(40.0, 40.0)));
        // The release for `a` never arrives.
        assert!(editor.begin_handle_drag(b, HandleRole::BottomRight));
        assert_eq!(editor.history().len(), 3);
        assert!(editor.scene().get(a).unwrap().flags.movable);
        assert!(editor.drag_handle_to(Point::new(50.0, 50.0)));
        assert!(editor.end_handle_drag());
        assert_eq!(editor.history().len(), 4);
        assert_eq!(rect_of(&editor, a), Rect::new(0.0, 0.0, 40.0, 40.0));
        assert_eq!(rect_of(&editor, b), Rect::new(20.0, 20.0, 50.0, 50.0));

        assert!(editor.undo());
        assert_eq!(rect_of(&editor, b), Rect::new(20.0, 20.0, 30.0, 30.0));
        assert!(editor.undo());
        assert_eq!(rect_of(&editor, a), Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(editor.undo());
        assert!(editor.undo());
        assert!(editor.scene().is_empty());

        assert!(editor.redo());
        assert_eq!(rect_of(&editor, a), Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(editor.redo());
        assert!(editor.redo());
        assert_eq!(rect_of(&editor, a), Rect::new(0.0, 0.0, 40.0, 40.0));
    }

    #[test]
    fn test_centered_creation() {
        let mut editor = Editor::default();
        let centered = |x, y| ShapeArgs::Centered {
            center: Point::new(50.0, 50.0),
            edge: Point::new(x, y),
        };
        let circle = editor
            .create_shape(ShapeKind::Circle, centered(53.0, 46.0))
            .unwrap();
        assert_eq!(rect_of(&editor, circle), Rect::new(46.0, 46.0, 54.0, 54.0));
        let rect = editor
            .create_shape(ShapeKind::Rectangle, centered(53.0, 46.0))
            .unwrap();
        assert_eq!(rect_of(&editor, rect), Rect::new(47.0, 46.0, 53.0, 54.0));
        assert!(matches!(
            editor.create_shape(ShapeKind::Line, centered(0.0, 0.0)),
            Err(EditorError::InvalidArgs { kind: "line", .. })
        ));
    }

    #[test]
    fn test_image_without_pixels_is_rejected() {
        let mut editor = Editor::default();
        let result = editor.create_shape(
            ShapeKind::Image,
            ShapeArgs::Image {
                position: Point::ZERO,
                pixels: RgbaImage::new(0, 0),
            },
        );
        assert!(matches!(result, Err(EditorError::InvalidArgs { kind: "image", .. })));
        assert!(editor.history().is_empty());
        assert!(editor.serialize_scene().is_ok());
    }

    #[test]
    fn test_load_skips_oversized_image() {
        let mut editor = Editor::default();
        editor
            .create_shape(
                ShapeKind::Image,
                ShapeArgs::Image {
                    position: Point::ZERO,
                    pixels: RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 255])),
                },
            )
            .unwrap();
        let square = editor
            .create_shape(ShapeKind::Square, corners(0.0, 0.0, 5.0, 5.0))
            .unwrap();
        let mut document = editor.serialize_scene().unwrap();
        document["nodes"][0]["geometry"]["width"] = serde_json::json!(1e7);
        document["nodes"][0]["geometry"]["height"] = serde_json::json!(1e7);

        let mut restored = Editor::default();
        let report = restored.load_scene(&document).unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(report.skipped[0].error, DecodeError::Image(_)));
        assert_eq!(restored.scene().roots(), &[square]);
    }

    #[test]
    fn test_storage_round_trip() {
        let storage = MemoryStorage::new();
        let mut editor = Editor::default();
        let a = editor
            .create_shape(ShapeKind::Square, corners(0.0, 0.0, 12.0, 12.0))
            .unwrap();
        let b = editor
            .create_shape(
                ShapeKind::Image,
                ShapeArgs::Image {
                    position: Point::new(30.0, 30.0),
                    pixels: RgbaImage::from_pixel(4, 2, image::Rgba([9, 8, 7, 255])),
                },
            )
            .unwrap();
        editor.select(a);
        editor.select(b);
        let group = editor.group_selected().unwrap();
        editor.save_to(&storage, "drawing").unwrap();

        let mut restored = Editor::default();
        let report = restored.load_from(&storage, "drawing").unwrap();
        assert!(report.is_clean());
        assert_eq!(report.loaded, 3);
        assert_eq!(restored.scene().roots(), &[group]);
        assert_eq!(restored.scene().children_of(group), &[a, b]);
        assert!(restored.history().is_empty());
        let image = restored.scene().get(b).unwrap();
        assert_eq!(image.geometry.bounds(), editor.scene().get(b).unwrap().geometry.bounds());

        assert!(matches!(
            restored.load_from(&storage, "missing"),
            Err(EditorError::Storage(StorageError::NotFound(_)))
        ));
        assert_eq!(restored.scene().len(), 3);
    }

    #[test]
    fn test_import_skips_ids_already_present() {
        let mut editor = Editor::default();
        editor
            .create_shape(ShapeKind::Rectangle, corners(0.0, 0.0, 10.0, 10.0))
            .unwrap();
        let document = editor.serialize_scene().unwrap();

        let (added, report) = editor.deserialize_scene(&document).unwrap();
        assert!(added.is_empty());
        assert_eq!(report.loaded, 0);
        assert!(matches!(
            report.skipped[0].error,
            DecodeError::DuplicateId(_)
        ));
        assert_eq!(editor.scene().len(), 1);

        let mut other = Editor::default();
        let (added, report) = other.deserialize_scene(&document).unwrap();
        assert_eq!(added.len(), 1);
        assert!(report.is_clean());
        assert!(other.undo());
        assert!(other.scene().is_empty());
    }
}
