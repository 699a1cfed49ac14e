//! CadEngine Core Library
//!
//! Scene graph, resize handles, undo history, grouping and persistence for
//! the CadEngine drawing canvas. Rendering and input live in the host.

pub mod compose;
pub mod config;
pub mod editor;
pub mod geometry;
pub mod handles;
pub mod history;
pub mod scene;
pub mod serialize;
pub mod shapes;
pub mod storage;

pub use compose::{GroupCommand, UngroupCommand, group_nodes, ungroup_node};
pub use config::{EngineConfig, StyleDefaults};
pub use editor::{Editor, EditorError, ShapeArgs, UngroupReport};
pub use geometry::{GeometryError, Inversion};
pub use handles::{Handle, HandleController, HandleRole, GeometrySnapshot};
pub use history::{Command, History, StyleSnapshot};
pub use scene::{Scene, Slot};
pub use serialize::{LoadReport, SceneError, ShapeRegistry, SCHEMA_VERSION};
pub use shapes::{Geometry, NodeId, NodeTree, ShapeGeometry, ShapeKind, ShapeNode};
pub use storage::{SceneStorage, StorageError};
