//! Undo/redo log.
//!
//! A [`History`] is a linear list of [`Command`]s with a cursor. Entries
//! before the cursor are applied; entries after it can be redone until the
//! next push discards them.

use crate::compose::{GroupCommand, UngroupCommand};
use crate::handles::{GeometrySnapshot, apply_geometry};
use crate::scene::{Scene, Slot};
use crate::shapes::{FillStyle, FontSpec, NodeId, NodeTree, Rgba, ShapeNode, StrokeStyle};

/// Text attributes captured by a style snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub content: String,
    pub color: Rgba,
    pub font: FontSpec,
    pub wrap_width: f64,
}

/// Style state of a node at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleSnapshot {
    pub stroke: Option<StrokeStyle>,
    pub fill: Option<FillStyle>,
    pub z_order: f64,
    /// Present for text nodes only.
    pub text: Option<TextStyle>,
}

impl StyleSnapshot {
    pub fn capture(node: &ShapeNode) -> Self {
        Self {
            stroke: node.stroke,
            fill: node.fill,
            z_order: node.z_order,
            text: node.geometry.as_text().map(|text| TextStyle {
                content: text.content.clone(),
                color: text.color,
                font: text.font.clone(),
                wrap_width: text.wrap_width,
            }),
        }
    }

    pub fn apply(&self, node: &mut ShapeNode) {
        node.stroke = self.stroke;
        node.fill = self.fill;
        node.z_order = self.z_order;
        if let (Some(style), Some(text)) = (&self.text, node.geometry.as_text_mut()) {
            text.content = style.content.clone();
            text.color = style.color;
            text.font = style.font.clone();
            text.wrap_width = style.wrap_width;
        }
        node.refresh_handles();
    }
}

/// A reversible scene mutation.
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum Command {
    /// Attach a subtree. `pending` holds it while it is not in the scene.
    AddNode {
        id: NodeId,
        pending: Option<NodeTree>,
        slot: Slot,
    },
    /// Detach a subtree. `detached` holds it while it is out of the scene.
    RemoveNode {
        id: NodeId,
        detached: Option<(Slot, NodeTree)>,
    },
    ModifyGeometry {
        id: NodeId,
        old: GeometrySnapshot,
        new: GeometrySnapshot,
        description: String,
    },
    ModifyStyle {
        id: NodeId,
        old: StyleSnapshot,
        new: StyleSnapshot,
        description: String,
    },
    Group(GroupCommand),
    Ungroup(UngroupCommand),
    /// Several commands recorded as one entry.
    Composite {
        commands: Vec<Command>,
        description: String,
    },
}

impl Command {
    /// Add a subtree at the top of the root list.
    pub fn add(tree: NodeTree) -> Self {
        Command::AddNode {
            id: tree.id(),
            pending: Some(tree),
            slot: Slot::root(usize::MAX),
        }
    }

    pub fn remove(id: NodeId) -> Self {
        Command::RemoveNode { id, detached: None }
    }

    /// Run the forward action. Returns false if the target was missing.
    pub fn apply(&mut self, scene: &mut Scene) -> bool {
        match self {
            Command::AddNode { pending, slot, .. } => match pending.take() {
                Some(tree) => scene.attach(tree, *slot),
                None => false,
            },
            Command::RemoveNode { id, detached } => {
                // Children are unlinked first and kept inside the tree.
                match scene.detach(*id) {
                    Some(entry) => {
                        *detached = Some(entry);
                        true
                    }
                    None => false,
                }
            }
            Command::ModifyGeometry { id, new, .. } => apply_geometry(scene, *id, new),
            Command::ModifyStyle { id, new, .. } => apply_style(scene, *id, new),
            Command::Group(cmd) => cmd.apply(scene),
            Command::Ungroup(cmd) => cmd.apply(scene),
            Command::Composite { commands, .. } => commands
                .iter_mut()
                .fold(true, |ok, cmd| cmd.apply(scene) && ok),
        }
    }

    /// Run the inverse action.
    pub fn revert(&mut self, scene: &mut Scene) -> bool {
        match self {
            Command::AddNode { id, pending, slot } => match scene.detach(*id) {
                Some((was, tree)) => {
                    *slot = was;
                    *pending = Some(tree);
                    true
                }
                None => false,
            },
            Command::RemoveNode { detached, .. } => match detached.take() {
                Some((slot, tree)) => scene.attach(tree, slot),
                None => false,
            },
            Command::ModifyGeometry { id, old, .. } => apply_geometry(scene, *id, old),
            Command::ModifyStyle { id, old, .. } => apply_style(scene, *id, old),
            Command::Group(cmd) => cmd.revert(scene),
            Command::Ungroup(cmd) => cmd.revert(scene),
            Command::Composite { commands, .. } => commands
                .iter_mut()
                .rev()
                .fold(true, |ok, cmd| cmd.revert(scene) && ok),
        }
    }

    /// Short label for UI display.
    pub fn description(&self) -> String {
        match self {
            Command::AddNode { pending, .. } => match pending {
                Some(tree) => format!("Add {}", tree.node.kind().tag()),
                None => "Add shape".to_string(),
            },
            Command::RemoveNode { detached, .. } => match detached {
                Some((_, tree)) => format!("Remove {}", tree.node.kind().tag()),
                None => "Remove shape".to_string(),
            },
            Command::ModifyGeometry { description, .. }
            | Command::ModifyStyle { description, .. }
            | Command::Composite { description, .. } => description.clone(),
            Command::Group(_) => "Group".to_string(),
            Command::Ungroup(_) => "Ungroup".to_string(),
        }
    }

    /// Description with before/after values where they exist.
    pub fn details(&self) -> String {
        match self {
            Command::ModifyGeometry {
                description,
                old,
                new,
                ..
            } => format!("{description} | {old} -> {new}"),
            Command::ModifyStyle {
                description,
                old,
                new,
                ..
            } => format!("{description} | z {} -> {}", old.z_order, new.z_order),
            Command::Composite {
                commands,
                description,
            } => format!("{description} ({} steps)", commands.len()),
            other => other.description(),
        }
    }
}

fn apply_style(scene: &mut Scene, id: NodeId, style: &StyleSnapshot) -> bool {
    match scene.get_mut(id) {
        Some(node) => {
            style.apply(node);
            true
        }
        None => {
            log::warn!("Style target {id} is not in the scene");
            false
        }
    }
}

/// Linear undo/redo log with an optional length limit.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<Command>,
    cursor: usize,
    limit: Option<usize>,
}

impl History {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of applied entries.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// Drop the redo tail, run `command` and append it.
    pub fn push(&mut self, mut command: Command, scene: &mut Scene) {
        let discarded = self.entries.len() - self.cursor;
        if discarded > 0 {
            log::debug!("Discarding {discarded} redo entries");
        }
        self.entries.truncate(self.cursor);
        if !command.apply(scene) {
            log::warn!("'{}' did not apply cleanly", command.description());
        }
        log::debug!("Push: {}", command.details());
        self.entries.push(command);
        self.cursor += 1;

        if let Some(limit) = self.limit {
            if self.entries.len() > limit {
                let excess = self.entries.len() - limit;
                self.entries.drain(..excess);
                self.cursor -= excess;
            }
        }
    }

    /// Revert the last applied entry. No-op at the start of the log.
    pub fn undo(&mut self, scene: &mut Scene) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let command = &mut self.entries[self.cursor];
        log::debug!("Undo: {}", command.description());
        command.revert(scene);
        true
    }

    /// Re-apply the next entry. No-op at the end of the log.
    pub fn redo(&mut self, scene: &mut Scene) -> bool {
        if self.cursor == self.entries.len() {
            return false;
        }
        let command = &mut self.entries[self.cursor];
        log::debug!("Redo: {}", command.description());
        command.apply(scene);
        self.cursor += 1;
        true
    }

    /// Labels of every entry, oldest first.
    pub fn descriptions(&self) -> Vec<String> {
        self.entries.iter().map(Command::description).collect()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .map(Command::description)
    }

    pub fn redo_description(&self) -> Option<String> {
        self.entries.get(self.cursor).map(Command::description)
    }

    /// The entry an undo would revert.
    pub fn last_applied(&self) -> Option<&Command> {
        self.cursor.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}
