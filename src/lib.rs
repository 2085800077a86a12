//! Core of a drag-and-drop form designer built on `egui` geometry.
//!
//! The [`Designer`] owns an [`ElementTree`] of controls, drives move/resize
//! sessions through the [`DragEngine`], moves dropped elements between
//! containers, and records every edit in a coalescing [`UndoStack`].

pub mod config;
pub mod container;
pub mod designer;
pub mod drag;
pub mod project;
pub mod reparent;
pub mod selection;
pub mod tree;
pub mod undo;
pub mod widget;

pub use config::{ConfigError, DesignerConfig};
pub use container::{ContainerInfo, ContainerRegistry};
pub use designer::{Designer, DesignerError, DesignerObserver};
pub use drag::{DragEngine, DragKind, DragOutcome, PointerEvent, ResizeHandle};
pub use project::{Project, ProjectError};
pub use selection::Selection;
pub use tree::{ElementNode, ElementTree, TreeError};
pub use undo::{Snapshot, UndoEntry, UndoKind, UndoStack};
pub use widget::{WidgetId, WidgetKind, WidgetProps};
