//! Undo/redo history with gesture coalescing.
//!
//! Entries are buffered and only become a history slot once no new entry has
//! arrived for the coalescing window. A slot holding several entries undoes as
//! one step.

use crate::reparent::ReparentChange;
use crate::tree::{DetachedSubtree, ElementNode, ElementTree, NodePatch, Placement, TreeError};
use crate::widget::WidgetId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Replay order follows declaration order: later kinds undo first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UndoKind {
    Default,
    Create,
    Delete,
    SwitchContainer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Snapshot {
    /// Full element configuration (children excluded).
    Config(ElementNode),
    Placement(Placement),
    Subtree(DetachedSubtree),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UndoEntry {
    pub kind: UndoKind,
    pub id: WidgetId,
    /// Element name when the entry was recorded.
    pub target: String,
    pub old: Option<Snapshot>,
    pub new: Option<Snapshot>,
}

impl UndoEntry {
    pub fn new(
        kind: UndoKind,
        id: WidgetId,
        target: impl Into<String>,
        old: Option<Snapshot>,
        new: Option<Snapshot>,
    ) -> Self {
        Self {
            kind,
            id,
            target: target.into(),
            old,
            new,
        }
    }

    pub fn property(old: &ElementNode, new: &ElementNode) -> Self {
        Self::new(
            UndoKind::Default,
            new.id,
            new.name.clone(),
            Some(Snapshot::Config(old.clone())),
            Some(Snapshot::Config(new.clone())),
        )
    }

    pub fn create(subtree: DetachedSubtree) -> Option<Self> {
        let root = subtree.root()?;
        Some(Self::new(
            UndoKind::Create,
            root.id,
            root.name.clone(),
            None,
            Some(Snapshot::Subtree(subtree)),
        ))
    }

    pub fn delete(subtree: DetachedSubtree) -> Option<Self> {
        let root = subtree.root()?;
        Some(Self::new(
            UndoKind::Delete,
            root.id,
            root.name.clone(),
            Some(Snapshot::Subtree(subtree)),
            None,
        ))
    }

    pub fn switch_container(change: &ReparentChange) -> Self {
        Self::new(
            UndoKind::SwitchContainer,
            change.id,
            change.name.clone(),
            Some(Snapshot::Placement(change.old.clone())),
            Some(Snapshot::Placement(change.new.clone())),
        )
    }
}

/// One step of history.
#[derive(Clone, Debug, PartialEq)]
pub enum HistorySlot {
    Single(UndoEntry),
    Batch(Vec<UndoEntry>),
}

impl HistorySlot {
    fn from_entries(mut entries: Vec<UndoEntry>) -> Option<Self> {
        match entries.len() {
            0 => None,
            1 => entries.pop().map(HistorySlot::Single),
            _ => Some(HistorySlot::Batch(entries)),
        }
    }

    pub fn entries(&self) -> &[UndoEntry] {
        match self {
            HistorySlot::Single(entry) => std::slice::from_ref(entry),
            HistorySlot::Batch(entries) => entries,
        }
    }

    /// Undo order: newest first, then stable by kind, highest kind first.
    fn undo_order(&self) -> Vec<&UndoEntry> {
        let mut order: Vec<&UndoEntry> = self.entries().iter().rev().collect();
        order.sort_by(|a, b| b.kind.cmp(&a.kind));
        order
    }
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("{kind:?} entry for {target} has no usable snapshot")]
    CorruptSnapshot { kind: UndoKind, target: String },
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// What a replay did; skipped entries were logged and left out.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplayReport {
    pub applied: Vec<UndoEntry>,
    pub skipped: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

#[derive(Debug)]
pub struct UndoStack {
    undo: Vec<HistorySlot>,
    redo: Vec<HistorySlot>,
    pending: Vec<UndoEntry>,
    deadline: Option<Instant>,
    window: Duration,
    limit: usize,
    /// Targets being replayed; entries for them are dropped until the next tick.
    suppressed: HashSet<WidgetId>,
}

impl UndoStack {
    pub fn new(window: Duration, limit: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            pending: Vec::new(),
            deadline: None,
            window,
            limit: limit.max(1),
            suppressed: HashSet::new(),
        }
    }

    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty() || !self.pending.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty() && self.pending.is_empty()
    }

    pub fn history_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn history(&self) -> &[HistorySlot] {
        &self.undo
    }

    pub fn is_suppressed(&self, id: WidgetId) -> bool {
        self.suppressed.contains(&id)
    }

    /// Buffers an entry and restarts the coalescing window.
    ///
    /// Entries for elements not in the tree are dropped, except container
    /// switches, which stay meaningful across remounts. Entries for elements
    /// being replayed are dropped too.
    pub fn add_entry(&mut self, tree: &ElementTree, entry: UndoEntry, now: Instant) -> bool {
        if self.suppressed.contains(&entry.id) {
            trace!("dropping {:?} entry for {} during replay", entry.kind, entry.target);
            return false;
        }
        if entry.kind != UndoKind::SwitchContainer && !tree.contains(entry.id) {
            trace!("dropping {:?} entry for unmounted {}", entry.kind, entry.target);
            return false;
        }
        self.pending.push(entry);
        self.deadline = Some(now + self.window);
        true
    }

    /// Flushes the buffer once the window has elapsed and clears replay flags.
    /// Returns whether a slot was pushed.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.suppressed.clear();
        match self.deadline {
            Some(deadline) if now >= deadline => self.flush(),
            _ => false,
        }
    }

    /// Turns the buffered entries into one history slot right away.
    pub fn flush(&mut self) -> bool {
        self.deadline = None;
        let Some(slot) = HistorySlot::from_entries(std::mem::take(&mut self.pending)) else {
            return false;
        };
        debug!("recorded history slot with {} entr(ies)", slot.entries().len());
        self.undo.push(slot);
        self.redo.clear();
        if self.undo.len() > self.limit {
            let excess = self.undo.len() - self.limit;
            self.undo.drain(..excess);
        }
        true
    }

    /// Drops the buffered entries and the pending deadline.
    pub fn cancel_pending(&mut self) {
        self.pending.clear();
        self.deadline = None;
    }

    pub fn reset(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.cancel_pending();
        self.suppressed.clear();
    }

    /// Reverts the most recent slot. Empty history is a no-op.
    pub fn undo(&mut self, tree: &mut ElementTree) -> ReplayReport {
        self.flush();
        let Some(slot) = self.undo.pop() else {
            return ReplayReport::default();
        };
        let report = self.replay(tree, slot.undo_order(), Direction::Undo);
        self.redo.push(slot);
        report
    }

    /// Re-applies the most recently undone slot.
    pub fn redo(&mut self, tree: &mut ElementTree) -> ReplayReport {
        if !self.pending.is_empty() {
            self.flush();
        }
        let Some(slot) = self.redo.pop() else {
            return ReplayReport::default();
        };
        let mut order = slot.undo_order();
        order.reverse();
        let report = self.replay(tree, order, Direction::Redo);
        self.undo.push(slot);
        report
    }

    fn replay(
        &mut self,
        tree: &mut ElementTree,
        order: Vec<&UndoEntry>,
        direction: Direction,
    ) -> ReplayReport {
        let mut report = ReplayReport::default();
        for entry in order {
            self.suppressed.insert(entry.id);
            let result = match direction {
                Direction::Undo => apply_inverse(tree, entry),
                Direction::Redo => apply_forward(tree, entry),
            };
            match result {
                Ok(()) => report.applied.push(entry.clone()),
                Err(err) => {
                    warn!("skipping {direction:?} of {:?} for {}: {err}", entry.kind, entry.target);
                    report.skipped += 1;
                }
            }
        }
        report
    }
}

fn corrupt(entry: &UndoEntry) -> ReplayError {
    ReplayError::CorruptSnapshot {
        kind: entry.kind,
        target: entry.target.clone(),
    }
}

fn apply_inverse(tree: &mut ElementTree, entry: &UndoEntry) -> Result<(), ReplayError> {
    match (entry.kind, &entry.old, &entry.new) {
        (UndoKind::Default, Some(Snapshot::Config(old)), _) => restore_config(tree, entry.id, old),
        (UndoKind::Create, _, Some(Snapshot::Subtree(_))) => {
            tree.remove_subtree(entry.id)?;
            Ok(())
        }
        (UndoKind::Delete, Some(Snapshot::Subtree(subtree)), _) => {
            tree.insert_subtree(subtree.nodes.clone(), Some(subtree.index))?;
            Ok(())
        }
        (UndoKind::SwitchContainer, Some(Snapshot::Placement(old)), _) => {
            tree.apply_placement(entry.id, old)?;
            Ok(())
        }
        _ => Err(corrupt(entry)),
    }
}

fn apply_forward(tree: &mut ElementTree, entry: &UndoEntry) -> Result<(), ReplayError> {
    match (entry.kind, &entry.old, &entry.new) {
        (UndoKind::Default, _, Some(Snapshot::Config(new))) => restore_config(tree, entry.id, new),
        (UndoKind::Create, _, Some(Snapshot::Subtree(subtree))) => {
            tree.insert_subtree(subtree.nodes.clone(), Some(subtree.index))?;
            Ok(())
        }
        (UndoKind::Delete, Some(Snapshot::Subtree(_)), _) => {
            tree.remove_subtree(entry.id)?;
            Ok(())
        }
        (UndoKind::SwitchContainer, _, Some(Snapshot::Placement(new))) => {
            tree.apply_placement(entry.id, new)?;
            Ok(())
        }
        _ => Err(corrupt(entry)),
    }
}

/// Writes every non-structural field of `config` back onto `id`.
fn restore_config(tree: &mut ElementTree, id: WidgetId, config: &ElementNode) -> Result<(), ReplayError> {
    let node = tree.get_node(id).ok_or(TreeError::UnknownElement(id))?;
    if node.kind != config.kind {
        return Err(ReplayError::CorruptSnapshot {
            kind: UndoKind::Default,
            target: config.name.clone(),
        });
    }
    if node.name != config.name {
        tree.rename(id, &config.name)?;
    }
    tree.mutate_node(
        id,
        NodePatch {
            pos: Some(config.pos),
            size: Some(config.size),
            props: Some(config.props.clone()),
        },
    )?;
    Ok(())
}
