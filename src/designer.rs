//! The designer service: one owner for the tree, selection, drag engine and
//! undo history, with explicit old/new snapshots at every mutation boundary.

use crate::config::DesignerConfig;
use crate::container::{ContainerInfo, ContainerRegistry};
use crate::drag::{DragEngine, DragKind, DragOutcome, PointerEvent};
use crate::project::Project;
use crate::reparent::{find_container_at, into_container, resolve_after_move};
use crate::selection::Selection;
use crate::tree::{DetachedSubtree, ElementNode, ElementTree, NodePatch, TreeError};
use crate::undo::{ReplayReport, Snapshot, UndoEntry, UndoKind, UndoStack};
use crate::widget::{UNTABBED_SCROLL_KEY, WidgetId, WidgetKind, WidgetProps, snap_pos_with_grid};
use egui::{Pos2, Rect, Vec2, vec2};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

/// Collaborators that react to committed changes. Failures are logged and
/// never undo the change that triggered them.
pub trait DesignerObserver {
    /// An element was created, deleted or moved to another container.
    fn on_structural_change(&mut self, _element: &ElementNode) -> anyhow::Result<()> {
        Ok(())
    }

    /// Anything in the tree changed; a good moment to schedule a save.
    fn on_tree_changed(&mut self) {}
}

#[derive(Debug, Error)]
pub enum DesignerError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("nothing to paste")]
    EmptyClipboard,
}

pub struct Designer {
    config: DesignerConfig,
    canvas_size: Vec2,
    tree: ElementTree,
    selection: Selection,
    drag: DragEngine,
    undo: UndoStack,
    observers: Vec<Box<dyn DesignerObserver>>,
    clipboard: Vec<ElementNode>,
    next_id: u64,
}

impl Default for Designer {
    fn default() -> Self {
        Self::new(DesignerConfig::default())
    }
}

impl Designer {
    pub fn new(config: DesignerConfig) -> Self {
        let mut tree = ElementTree::new();
        tree.set_min_size(config.min_size);
        Self {
            canvas_size: config.canvas_size,
            tree,
            selection: Selection::default(),
            drag: DragEngine::new(config.min_size, config.grid_size),
            undo: UndoStack::new(config.coalesce_window(), config.undo_limit),
            observers: Vec::new(),
            clipboard: Vec::new(),
            next_id: 1,
            config,
        }
    }

    pub fn with_tree(config: DesignerConfig, tree: ElementTree) -> Self {
        let mut designer = Self::new(config);
        designer.replace_tree(tree);
        designer
    }

    pub fn config(&self) -> &DesignerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: DesignerConfig) {
        self.drag.set_limits(config.min_size, config.grid_size);
        self.tree.set_min_size(config.min_size);
        self.undo.set_window(config.coalesce_window());
        self.config = config;
    }

    pub fn canvas_size(&self) -> Vec2 {
        self.canvas_size
    }

    pub fn tree(&self) -> &ElementTree {
        &self.tree
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn drag_engine(&self) -> &DragEngine {
        &self.drag
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo
    }

    pub fn add_observer(&mut self, observer: Box<dyn DesignerObserver>) {
        self.observers.push(observer);
    }

    /// Advances the undo coalescing clock.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.undo.tick(now)
    }

    fn moving_ids(&self) -> Vec<WidgetId> {
        match self.drag.session() {
            Some(session) if session.kind == DragKind::Move => {
                session.cached.iter().map(|c| c.id).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Containers below `root`, leaving out anything mid-move.
    pub fn compute_containers(&self, root: Option<WidgetId>) -> ContainerRegistry {
        ContainerRegistry::compute(&self.tree, root, &self.moving_ids())
    }

    /// The container a drop at `point` (root frame) would land in.
    pub fn find_container_at(&self, point: Pos2) -> Option<ContainerInfo> {
        let registry = self.compute_containers(None);
        let self_name = self
            .drag
            .session()
            .and_then(|s| self.tree.get_node(s.reference))
            .map(|n| n.name.as_str())
            .unwrap_or_default();
        find_container_at(point, &registry, &self.tree, self_name).cloned()
    }

    // ---- drag/resize -------------------------------------------------------

    pub fn begin_drag(&mut self, event: PointerEvent, id: WidgetId, kind: DragKind) -> DragOutcome {
        if !self.drag.is_active() && !self.selection.contains(id) && self.tree.contains(id) {
            self.selection.select_single(id);
        }
        self.drag
            .begin(event, id, kind, &self.tree, self.selection.ids())
    }

    pub fn update_drag(&mut self, pointer: Pos2) -> DragOutcome {
        self.drag.update(pointer)
    }

    /// Commits the session, resolves container changes for moves and records
    /// one history entry per affected element.
    pub fn end_drag(&mut self, pointer: Pos2, now: Instant) -> DragOutcome {
        let outcome = self.drag.end(pointer, &mut self.tree);
        let DragOutcome::Committed(committed) = &outcome else {
            return outcome;
        };

        let changes = resolve_after_move(&mut self.tree, committed, &self.selection);
        let reparented: HashSet<WidgetId> = changes.iter().map(|c| c.id).collect();
        for change in &changes {
            self.undo
                .add_entry(&self.tree, UndoEntry::switch_container(change), now);
            if let Some(node) = self.tree.get_node(change.id) {
                notify_structural(&mut self.observers, node);
            }
        }

        for cached in &committed.elements {
            if reparented.contains(&cached.id) || cached.original == cached.current {
                continue;
            }
            let Some(new) = self.tree.get_node(cached.id) else {
                continue;
            };
            let mut old = new.clone();
            old.pos = cached.original.min;
            old.size = cached.original.size();
            self.undo
                .add_entry(&self.tree, UndoEntry::property(&old, new), now);
        }
        self.tree_changed();
        outcome
    }

    pub fn cancel_drag(&mut self) -> DragOutcome {
        self.drag.cancel()
    }

    // ---- history -----------------------------------------------------------

    /// Records an arbitrary edit against `id`.
    pub fn add_entry(
        &mut self,
        kind: UndoKind,
        id: WidgetId,
        old: Option<Snapshot>,
        new: Option<Snapshot>,
        now: Instant,
    ) -> bool {
        let target = self
            .tree
            .get_node(id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| id.to_string());
        self.undo
            .add_entry(&self.tree, UndoEntry::new(kind, id, target, old, new), now)
    }

    pub fn undo(&mut self) -> ReplayReport {
        self.drag.cancel();
        let report = self.undo.undo(&mut self.tree);
        self.after_replay(&report);
        report
    }

    pub fn redo(&mut self) -> ReplayReport {
        self.drag.cancel();
        let report = self.undo.redo(&mut self.tree);
        self.after_replay(&report);
        report
    }

    fn after_replay(&mut self, report: &ReplayReport) {
        if report.applied.is_empty() {
            return;
        }
        let tree = &self.tree;
        self.selection.retain(|id| tree.contains(*id));
        for entry in &report.applied {
            if entry.kind == UndoKind::Default {
                continue;
            }
            let node = self.tree.get_node(entry.id).or_else(|| {
                [&entry.old, &entry.new].into_iter().find_map(|s| match s {
                    Some(Snapshot::Subtree(subtree)) => subtree.root(),
                    _ => None,
                })
            });
            if let Some(node) = node {
                notify_structural(&mut self.observers, node);
            }
        }
        self.tree_changed();
    }

    // ---- element lifecycle -------------------------------------------------

    fn allocate_id(&mut self) -> WidgetId {
        let id = WidgetId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn fresh_name(&self, prefix: &str, reserved: &HashSet<String>) -> String {
        (1..)
            .map(|n| format!("{prefix}{n}"))
            .find(|name| !self.tree.contains_name(name) && !reserved.contains(name))
            .unwrap_or_else(|| prefix.to_owned())
    }

    fn record_create(&mut self, id: WidgetId, now: Instant) {
        let Some(subtree) = self.subtree_snapshot(id) else {
            return;
        };
        if let Some(entry) = UndoEntry::create(subtree) {
            self.undo.add_entry(&self.tree, entry, now);
        }
        if let Some(node) = self.tree.get_node(id) {
            notify_structural(&mut self.observers, node);
        }
        self.tree_changed();
    }

    fn subtree_snapshot(&self, id: WidgetId) -> Option<DetachedSubtree> {
        let index = self.tree.index_in_parent(id)?;
        let nodes = std::iter::once(id)
            .chain(self.tree.descendants(id))
            .filter_map(|n| self.tree.get_node(n).cloned())
            .collect();
        Some(DetachedSubtree { nodes, index })
    }

    /// Adds a new `kind` element with its top-left at `pos` inside `container`.
    pub fn create_element(
        &mut self,
        kind: WidgetKind,
        pos: Pos2,
        container: Option<&str>,
        now: Instant,
    ) -> Result<WidgetId, DesignerError> {
        let tab = match container {
            Some(name) => self
                .tree
                .find_by_name(name)
                .and_then(|c| c.active_tab())
                .map(str::to_owned),
            None => None,
        };
        let id = WidgetId::new(self.next_id);
        let name = self.tree.unique_name(kind.descriptor().name_prefix);
        let mut node = ElementNode::new(id, name, kind, pos);
        node.from_container = container.map(str::to_owned);
        node.from_tab_id = tab;
        self.tree.insert(node, None)?;
        self.next_id += 1;

        debug!("created {kind:?} element {id}");
        self.selection.select_single(id);
        self.record_create(id, now);
        Ok(id)
    }

    /// Drops a new element centered on `point` (root frame), inside whatever
    /// container is under the point.
    pub fn drop_new_element(
        &mut self,
        kind: WidgetKind,
        point: Pos2,
        now: Instant,
    ) -> Result<WidgetId, DesignerError> {
        let registry = self.compute_containers(None);
        let target = find_container_at(point, &registry, &self.tree, "");
        let top_left = point - kind.default_size() * 0.5;
        let local = match target {
            Some(info) => into_container(top_left, info),
            None => top_left,
        };
        let pos = snap_pos_with_grid(local, self.config.grid_size);
        let container = target.map(|t| t.name.clone());
        self.create_element(kind, pos, container.as_deref(), now)
    }

    pub fn copy_selection(&mut self) -> bool {
        let Some(reference) = self.selection.reference() else {
            return false;
        };
        match self.subtree_snapshot(reference) {
            Some(subtree) => {
                self.clipboard = subtree.nodes;
                true
            }
            None => false,
        }
    }

    /// Pastes the copied subtree 20px down-right, with fresh ids and names.
    pub fn paste(&mut self, now: Instant) -> Result<WidgetId, DesignerError> {
        let Some(first) = self.clipboard.first() else {
            return Err(DesignerError::EmptyClipboard);
        };
        let parent_ok = first
            .from_container
            .as_deref()
            .and_then(|name| self.tree.find_by_name(name))
            .is_some_and(ElementNode::accepts_children);

        let mut reserved = HashSet::new();
        let mut renames = HashMap::new();
        let mut nodes = Vec::with_capacity(self.clipboard.len());
        for (i, source) in self.clipboard.clone().into_iter().enumerate() {
            let name = self.fresh_name(source.kind.descriptor().name_prefix, &reserved);
            reserved.insert(name.clone());
            renames.insert(source.name.clone(), name.clone());

            let mut node = source;
            node.id = self.allocate_id();
            node.name = name;
            if i == 0 {
                node.pos += vec2(20.0, 20.0);
                if !parent_ok {
                    node.from_container = None;
                    node.from_tab_id = None;
                }
            } else {
                node.from_container = node
                    .from_container
                    .as_ref()
                    .and_then(|old| renames.get(old).cloned());
            }
            nodes.push(node);
        }

        let root = nodes.first().map_or(WidgetId::new(0), |n| n.id);
        self.tree.insert_subtree(nodes, None)?;
        self.selection.select_single(root);
        self.record_create(root, now);
        Ok(root)
    }

    /// Deletes every selected element (and its subtree) as one history step.
    pub fn delete_selected(&mut self, now: Instant) -> usize {
        self.drag.cancel();
        let selected: Vec<WidgetId> = self
            .selection
            .ids()
            .iter()
            .copied()
            .filter(|id| self.tree.contains(*id))
            .collect();
        let roots: Vec<WidgetId> = selected
            .iter()
            .copied()
            .filter(|id| !selected.iter().any(|other| self.tree.is_ancestor(*other, *id)))
            .collect();

        let mut deleted = 0;
        for id in roots {
            let Some(subtree) = self.subtree_snapshot(id) else {
                continue;
            };
            if let Some(entry) = UndoEntry::delete(subtree) {
                self.undo.add_entry(&self.tree, entry, now);
            }
            match self.tree.remove_subtree(id) {
                Ok(removed) => {
                    deleted += 1;
                    if let Some(root) = removed.root() {
                        notify_structural(&mut self.observers, root);
                    }
                }
                Err(err) => warn!("could not delete {id}: {err}"),
            }
        }
        self.selection.clear();
        if deleted > 0 {
            self.tree_changed();
        }
        deleted
    }

    // ---- property edits ----------------------------------------------------

    /// Renames `id`. A clash leaves the old name in place and records nothing.
    pub fn rename(&mut self, id: WidgetId, name: &str, now: Instant) -> Result<(), DesignerError> {
        let old = self
            .tree
            .get_node(id)
            .cloned()
            .ok_or(TreeError::UnknownElement(id))?;
        self.tree.rename(id, name)?;
        self.record_property(&old, now);
        Ok(())
    }

    pub fn set_props(
        &mut self,
        id: WidgetId,
        props: WidgetProps,
        now: Instant,
    ) -> Result<(), DesignerError> {
        self.patch(
            id,
            NodePatch {
                props: Some(props),
                ..Default::default()
            },
            now,
        )
    }

    /// Sets position and size; sizes are held at the configured minimum.
    pub fn set_geometry(&mut self, id: WidgetId, rect: Rect, now: Instant) -> Result<(), DesignerError> {
        let min = self.config.min_size;
        let size = vec2(rect.width().max(min), rect.height().max(min));
        self.patch(id, NodePatch::geometry(Rect::from_min_size(rect.min, size)), now)
    }

    /// Scroll position is view state and is not recorded in history.
    pub fn set_scroll(&mut self, id: WidgetId, offset: Vec2) -> Result<(), DesignerError> {
        let node = self.tree.get_node(id).ok_or(TreeError::UnknownElement(id))?;
        let key = node.active_tab().unwrap_or(UNTABBED_SCROLL_KEY).to_owned();
        let mut props = node.props.clone();
        props.scroll.insert(key, offset);
        self.tree.mutate_node(
            id,
            NodePatch {
                props: Some(props),
                ..Default::default()
            },
        )?;
        Ok(())
    }

    fn patch(&mut self, id: WidgetId, patch: NodePatch, now: Instant) -> Result<(), DesignerError> {
        let old = self
            .tree
            .get_node(id)
            .cloned()
            .ok_or(TreeError::UnknownElement(id))?;
        self.tree.mutate_node(id, patch)?;
        self.record_property(&old, now);
        Ok(())
    }

    /// Diffs `old` against the element's current state and records the edit.
    fn record_property(&mut self, old: &ElementNode, now: Instant) {
        let Some(new) = self.tree.get_node(old.id) else {
            return;
        };
        if new == old {
            return;
        }
        self.undo
            .add_entry(&self.tree, UndoEntry::property(old, new), now);
        self.tree_changed();
    }

    /// Moves every selected element by `delta`, as one history step.
    pub fn nudge_selected(&mut self, delta: Vec2, now: Instant) {
        let ids = self.selection.ids().to_vec();
        for id in ids {
            let Some(node) = self.tree.get_node(id) else {
                continue;
            };
            let pos = node.pos + delta;
            if let Err(err) = self.patch(
                id,
                NodePatch {
                    pos: Some(pos),
                    ..Default::default()
                },
                now,
            ) {
                warn!("could not nudge {id}: {err}");
            }
        }
    }

    /// Applies `f(reference, element)` to each selected sibling of the
    /// reference element.
    fn arrange(&mut self, now: Instant, f: impl Fn(Rect, Rect) -> Rect) {
        let Some(reference) = self.selection.reference().and_then(|id| self.tree.get_node(id))
        else {
            return;
        };
        let anchor = reference.rect();
        let parent = reference.from_container.clone();
        let ids: Vec<WidgetId> = self
            .selection
            .ids()
            .iter()
            .copied()
            .filter(|id| {
                self.tree
                    .get_node(*id)
                    .is_some_and(|n| n.from_container == parent)
            })
            .collect();
        if ids.len() < 2 {
            return;
        }
        for id in ids {
            let Some(node) = self.tree.get_node(id) else {
                continue;
            };
            let rect = f(anchor, node.rect());
            if let Err(err) = self.set_geometry(id, rect, now) {
                warn!("could not arrange {id}: {err}");
            }
        }
    }

    pub fn align_left(&mut self, now: Instant) {
        self.arrange(now, |a, r| r.translate(vec2(a.min.x - r.min.x, 0.0)));
    }

    pub fn align_right(&mut self, now: Instant) {
        self.arrange(now, |a, r| r.translate(vec2(a.max.x - r.max.x, 0.0)));
    }

    pub fn align_top(&mut self, now: Instant) {
        self.arrange(now, |a, r| r.translate(vec2(0.0, a.min.y - r.min.y)));
    }

    pub fn align_bottom(&mut self, now: Instant) {
        self.arrange(now, |a, r| r.translate(vec2(0.0, a.max.y - r.max.y)));
    }

    pub fn match_width(&mut self, now: Instant) {
        self.arrange(now, |a, r| Rect::from_min_size(r.min, vec2(a.width(), r.height())));
    }

    pub fn match_height(&mut self, now: Instant) {
        self.arrange(now, |a, r| Rect::from_min_size(r.min, vec2(r.width(), a.height())));
    }

    // ---- documents ---------------------------------------------------------

    pub fn project(&self) -> Project {
        Project::from_tree(&self.tree, self.canvas_size)
    }

    /// Switches to another document; history does not carry over.
    pub fn load_project(&mut self, project: Project) {
        self.canvas_size = project.canvas_size;
        self.replace_tree(project.into_tree());
    }

    pub fn new_project(&mut self) {
        self.canvas_size = self.config.canvas_size;
        self.replace_tree(ElementTree::new());
    }

    fn replace_tree(&mut self, mut tree: ElementTree) {
        tree.set_min_size(self.config.min_size);
        self.drag.cancel();
        self.next_id = tree.max_id().map_or(1, |id| id.get() + 1);
        self.tree = tree;
        self.selection.clear();
        self.undo.reset();
        self.tree_changed();
    }

    fn tree_changed(&mut self) {
        for observer in &mut self.observers {
            observer.on_tree_changed();
        }
    }
}

fn notify_structural(observers: &mut [Box<dyn DesignerObserver>], node: &ElementNode) {
    for observer in observers {
        if let Err(err) = observer.on_structural_change(node) {
            warn!("structural change observer failed for {}: {err:#}", node.name);
        }
    }
}
