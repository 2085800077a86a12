//! Pointer-driven move/resize sessions.
//!
//! While a session is active only the cached rects change; the tree sees the
//! result once, when the session ends.

use crate::tree::{ElementTree, NodePatch};
use crate::widget::{WidgetId, snap_pos_with_grid};
use egui::{PointerButton, Pos2, Rect, Vec2, pos2};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Which edges a resize handle controls, as a sign per axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResizeHandle {
    sx: i8,
    sy: i8,
}

impl ResizeHandle {
    pub const TOP_LEFT: Self = Self { sx: -1, sy: -1 };
    pub const TOP: Self = Self { sx: 0, sy: -1 };
    pub const TOP_RIGHT: Self = Self { sx: 1, sy: -1 };
    pub const RIGHT: Self = Self { sx: 1, sy: 0 };
    pub const BOTTOM_RIGHT: Self = Self { sx: 1, sy: 1 };
    pub const BOTTOM: Self = Self { sx: 0, sy: 1 };
    pub const BOTTOM_LEFT: Self = Self { sx: -1, sy: 1 };
    pub const LEFT: Self = Self { sx: -1, sy: 0 };

    pub const ALL: [Self; 8] = [
        Self::TOP_LEFT,
        Self::TOP,
        Self::TOP_RIGHT,
        Self::RIGHT,
        Self::BOTTOM_RIGHT,
        Self::BOTTOM,
        Self::BOTTOM_LEFT,
        Self::LEFT,
    ];

    /// `None` unless both signs are in `-1..=1` and at least one is non-zero.
    pub const fn new(sx: i8, sy: i8) -> Option<Self> {
        if sx < -1 || sx > 1 || sy < -1 || sy > 1 || (sx == 0 && sy == 0) {
            return None;
        }
        Some(Self { sx, sy })
    }

    pub const fn signs(&self) -> (i8, i8) {
        (self.sx, self.sy)
    }

    /// The handle's anchor point on `rect`.
    pub fn anchor(&self, rect: Rect) -> Pos2 {
        let pick = |s: i8, lo: f32, hi: f32| match s {
            -1 => lo,
            1 => hi,
            _ => (lo + hi) * 0.5,
        };
        pos2(
            pick(self.sx, rect.min.x, rect.max.x),
            pick(self.sy, rect.min.y, rect.max.y),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DragKind {
    Move,
    Resize(ResizeHandle),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub pos: Pos2,
    pub button: PointerButton,
}

impl PointerEvent {
    pub fn primary(pos: Pos2) -> Self {
        Self {
            pos,
            button: PointerButton::Primary,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CachedGeometry {
    pub id: WidgetId,
    pub original: Rect,
    pub current: Rect,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DragSession {
    pub kind: DragKind,
    pub reference: WidgetId,
    pub start_pointer: Pos2,
    pub last_pointer: Pos2,
    pub cached: Vec<CachedGeometry>,
}

/// Why a lifecycle call was safely ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragNoop {
    NotPrimaryButton,
    SessionActive,
    NoActiveSession,
    UnknownElement,
}

/// A finished session whose geometry has been written to the tree.
#[derive(Clone, Debug, PartialEq)]
pub struct CommittedDrag {
    pub kind: DragKind,
    pub reference: WidgetId,
    pub release: Pos2,
    pub elements: Vec<CachedGeometry>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DragOutcome {
    Started { kind: DragKind, elements: usize },
    Updated { delta: Vec2 },
    Committed(CommittedDrag),
    Cancelled,
    Ignored(DragNoop),
}

/// Resizes `rect` by a pointer `delta` through `handle`.
///
/// Each axis is clamped on its own: an axis whose new extent would drop below
/// `min_size` keeps its old extent and origin.
pub fn resize_rect(rect: Rect, delta: Vec2, handle: ResizeHandle, min_size: f32) -> Rect {
    let (sx, sy) = handle.signs();
    let mut pos = rect.min;
    let mut size = rect.size();

    let adj_x = delta.x * f32::from(sx);
    let adj_y = delta.y * f32::from(sy);

    if sx != 0 && size.x + adj_x >= min_size {
        size.x += adj_x;
        if sx == -1 {
            pos.x -= adj_x;
        }
    }
    if sy != 0 && size.y + adj_y >= min_size {
        size.y += adj_y;
        if sy == -1 {
            pos.y -= adj_y;
        }
    }
    Rect::from_min_size(pos, size)
}

#[derive(Clone, Debug)]
pub struct DragEngine {
    session: Option<DragSession>,
    min_size: f32,
    grid: f32,
}

impl DragEngine {
    pub fn new(min_size: f32, grid: f32) -> Self {
        Self {
            session: None,
            min_size,
            grid,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    /// In-flight rect of `id` while a session holds it.
    pub fn preview(&self, id: WidgetId) -> Option<Rect> {
        self.session
            .as_ref()?
            .cached
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.current)
    }

    /// Starts a session on `element`. Selected elements sharing its parent
    /// container ride along; everything else stays put.
    pub fn begin(
        &mut self,
        event: PointerEvent,
        element: WidgetId,
        kind: DragKind,
        tree: &ElementTree,
        selected: &[WidgetId],
    ) -> DragOutcome {
        if event.button != PointerButton::Primary {
            return DragOutcome::Ignored(DragNoop::NotPrimaryButton);
        }
        if self.session.is_some() {
            trace!("ignoring pointer-down on {element}, a drag is already active");
            return DragOutcome::Ignored(DragNoop::SessionActive);
        }
        let Some(reference) = tree.get_node(element) else {
            return DragOutcome::Ignored(DragNoop::UnknownElement);
        };

        let mut cached = vec![CachedGeometry {
            id: reference.id,
            original: reference.rect(),
            current: reference.rect(),
        }];
        cached.extend(
            selected
                .iter()
                .filter(|id| **id != element)
                .filter_map(|id| tree.get_node(*id))
                .filter(|node| node.from_container == reference.from_container)
                .map(|node| CachedGeometry {
                    id: node.id,
                    original: node.rect(),
                    current: node.rect(),
                }),
        );

        debug!(
            "drag {kind:?} started on {} with {} element(s)",
            reference.name,
            cached.len()
        );
        let elements = cached.len();
        self.session = Some(DragSession {
            kind,
            reference: element,
            start_pointer: event.pos,
            last_pointer: event.pos,
            cached,
        });
        DragOutcome::Started { kind, elements }
    }

    /// Applies the movement since the previous sample to every cached rect.
    pub fn update(&mut self, pointer: Pos2) -> DragOutcome {
        let min_size = self.min_size;
        let Some(session) = self.session.as_mut() else {
            return DragOutcome::Ignored(DragNoop::NoActiveSession);
        };
        let delta = pointer - session.last_pointer;
        session.last_pointer = pointer;
        if delta == Vec2::ZERO {
            return DragOutcome::Updated { delta };
        }

        for cached in &mut session.cached {
            cached.current = match session.kind {
                DragKind::Move => cached.current.translate(delta),
                DragKind::Resize(handle) => resize_rect(cached.current, delta, handle, min_size),
            };
        }
        DragOutcome::Updated { delta }
    }

    /// Ends the session and writes the cached geometry into `tree`.
    pub fn end(&mut self, pointer: Pos2, tree: &mut ElementTree) -> DragOutcome {
        if self.session.is_none() {
            return DragOutcome::Ignored(DragNoop::NoActiveSession);
        }
        self.update(pointer);
        let Some(mut session) = self.session.take() else {
            return DragOutcome::Ignored(DragNoop::NoActiveSession);
        };

        for cached in &mut session.cached {
            if session.kind == DragKind::Move {
                cached.current = Rect::from_min_size(
                    snap_pos_with_grid(cached.current.min, self.grid),
                    cached.current.size(),
                );
            }
            if let Err(err) = tree.mutate_node(cached.id, NodePatch::geometry(cached.current)) {
                warn!("could not commit drag geometry for {}: {err}", cached.id);
            }
        }
        debug!(
            "drag {:?} committed, total delta {:?}",
            session.kind,
            pointer - session.start_pointer
        );
        DragOutcome::Committed(CommittedDrag {
            kind: session.kind,
            reference: session.reference,
            release: pointer,
            elements: session.cached,
        })
    }

    /// Drops the session without touching the tree.
    pub fn cancel(&mut self) -> DragOutcome {
        match self.session.take() {
            Some(session) => {
                debug!("drag {:?} on {} cancelled", session.kind, session.reference);
                DragOutcome::Cancelled
            }
            None => DragOutcome::Ignored(DragNoop::NoActiveSession),
        }
    }

    pub fn set_limits(&mut self, min_size: f32, grid: f32) {
        self.min_size = min_size;
        self.grid = grid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::tests::sample_tree;
    use crate::tree::ElementNode;
    use crate::widget::WidgetKind;
    use egui::vec2;
    use proptest::prelude::*;

    const LABEL: WidgetId = WidgetId::new(2);

    fn tree_with_siblings() -> ElementTree {
        let mut tree = sample_tree();
        for (id, name) in [(10, "button1"), (11, "button2")] {
            let node = ElementNode::new(WidgetId::new(id), name, WidgetKind::Button, pos2(0.0, 100.0))
                .inside("panel1", None);
            tree.insert(node, None).unwrap();
        }
        tree
    }

    #[test]
    fn test_top_left_resize_keeps_bottom_right_fixed() {
        let rect = Rect::from_min_size(pos2(50.0, 50.0), vec2(100.0, 40.0));
        let out = resize_rect(rect, vec2(-20.0, -10.0), ResizeHandle::TOP_LEFT, 20.0);
        assert_eq!(out.size(), vec2(120.0, 50.0));
        assert_eq!(out.min, pos2(30.0, 40.0));
        assert_eq!(out.max, rect.max);
    }

    #[test]
    fn test_right_handle_never_moves_origin() {
        let rect = Rect::from_min_size(pos2(50.0, 50.0), vec2(100.0, 40.0));
        let out = resize_rect(rect, vec2(15.0, 99.0), ResizeHandle::RIGHT, 20.0);
        assert_eq!(out.min, rect.min);
        assert_eq!(out.size(), vec2(115.0, 40.0));
    }

    #[test]
    fn test_axes_clamp_independently() {
        let rect = Rect::from_min_size(pos2(0.0, 0.0), vec2(30.0, 40.0));
        let out = resize_rect(rect, vec2(-15.0, 10.0), ResizeHandle::BOTTOM_RIGHT, 20.0);
        assert_eq!(out.size(), vec2(30.0, 50.0));
    }

    #[test]
    fn test_handle_validation() {
        assert_eq!(ResizeHandle::new(0, 0), None);
        assert_eq!(ResizeHandle::new(2, 0), None);
        assert_eq!(ResizeHandle::new(-1, 1), Some(ResizeHandle::BOTTOM_LEFT));
    }

    #[test]
    fn test_move_session_touches_tree_only_on_end() {
        let mut tree = sample_tree();
        let mut engine = DragEngine::new(20.0, 1.0);
        let started = engine.begin(
            PointerEvent::primary(pos2(260.0, 160.0)),
            LABEL,
            DragKind::Move,
            &tree,
            &[LABEL],
        );
        assert_eq!(
            started,
            DragOutcome::Started {
                kind: DragKind::Move,
                elements: 1
            }
        );

        engine.update(pos2(265.0, 162.0));
        engine.update(pos2(270.0, 170.0));
        assert_eq!(tree.get_node(LABEL).unwrap().pos, pos2(50.0, 50.0));
        assert_eq!(engine.preview(LABEL).unwrap().min, pos2(60.0, 60.0));

        let outcome = engine.end(pos2(270.0, 170.0), &mut tree);
        assert!(matches!(outcome, DragOutcome::Committed(_)));
        assert_eq!(tree.get_node(LABEL).unwrap().pos, pos2(60.0, 60.0));
        assert!(!engine.is_active());
    }

    #[test]
    fn test_second_begin_is_ignored() {
        let tree = sample_tree();
        let mut engine = DragEngine::new(20.0, 1.0);
        let event = PointerEvent::primary(pos2(0.0, 0.0));
        engine.begin(event, LABEL, DragKind::Move, &tree, &[]);
        let again = engine.begin(event, WidgetId::new(1), DragKind::Move, &tree, &[]);
        assert_eq!(again, DragOutcome::Ignored(DragNoop::SessionActive));
        assert_eq!(engine.session().unwrap().reference, LABEL);
    }

    #[test]
    fn test_secondary_button_is_ignored() {
        let tree = sample_tree();
        let mut engine = DragEngine::new(20.0, 1.0);
        let event = PointerEvent {
            pos: pos2(0.0, 0.0),
            button: PointerButton::Secondary,
        };
        assert_eq!(
            engine.begin(event, LABEL, DragKind::Move, &tree, &[]),
            DragOutcome::Ignored(DragNoop::NotPrimaryButton)
        );
        assert!(!engine.is_active());
    }

    #[test]
    fn test_calls_without_session_are_noops() {
        let mut tree = sample_tree();
        let mut engine = DragEngine::new(20.0, 1.0);
        let noop = DragOutcome::Ignored(DragNoop::NoActiveSession);
        assert_eq!(engine.update(pos2(1.0, 1.0)), noop);
        assert_eq!(engine.end(pos2(1.0, 1.0), &mut tree), noop);
        assert_eq!(engine.cancel(), noop);
    }

    #[test]
    fn test_cancel_discards_geometry() {
        let mut tree = sample_tree();
        let mut engine = DragEngine::new(20.0, 1.0);
        engine.begin(
            PointerEvent::primary(pos2(0.0, 0.0)),
            LABEL,
            DragKind::Resize(ResizeHandle::BOTTOM_RIGHT),
            &tree,
            &[],
        );
        engine.update(pos2(40.0, 40.0));
        assert_eq!(engine.cancel(), DragOutcome::Cancelled);
        assert_eq!(engine.end(pos2(40.0, 40.0), &mut tree), DragOutcome::Ignored(DragNoop::NoActiveSession));
        assert_eq!(tree.get_node(LABEL).unwrap().size, vec2(100.0, 40.0));
    }

    #[test]
    fn test_only_same_parent_selection_is_cached() {
        let tree = tree_with_siblings();
        let mut engine = DragEngine::new(20.0, 1.0);
        let selected = [LABEL, WidgetId::new(10), WidgetId::new(4), WidgetId::new(11)];
        let outcome = engine.begin(
            PointerEvent::primary(pos2(0.0, 0.0)),
            LABEL,
            DragKind::Move,
            &tree,
            &selected,
        );
        assert_eq!(
            outcome,
            DragOutcome::Started {
                kind: DragKind::Move,
                elements: 3
            }
        );
        let ids: Vec<_> = engine.session().unwrap().cached.iter().map(|c| c.id).collect();
        assert_eq!(ids, [LABEL, WidgetId::new(10), WidgetId::new(11)]);
    }

    #[test]
    fn test_grid_snaps_move_on_commit() {
        let mut tree = sample_tree();
        let mut engine = DragEngine::new(20.0, 8.0);
        engine.begin(PointerEvent::primary(pos2(0.0, 0.0)), LABEL, DragKind::Move, &tree, &[]);
        engine.update(pos2(3.0, 5.0));
        engine.end(pos2(3.0, 5.0), &mut tree);
        assert_eq!(tree.get_node(LABEL).unwrap().pos, pos2(56.0, 56.0));
    }

    proptest! {
        #[test]
        fn resize_never_goes_below_minimum(
            w in 20.0f32..400.0,
            h in 20.0f32..400.0,
            handle in 0usize..8,
            deltas in prop::collection::vec((-300.0f32..300.0, -300.0f32..300.0), 1..12),
        ) {
            let handle = ResizeHandle::ALL[handle];
            let mut rect = Rect::from_min_size(pos2(100.0, 100.0), vec2(w, h));
            for (dx, dy) in deltas {
                rect = resize_rect(rect, vec2(dx, dy), handle, 20.0);
                prop_assert!(rect.width() >= 20.0);
                prop_assert!(rect.height() >= 20.0);
            }
        }

        #[test]
        fn move_is_the_sum_of_incremental_deltas(
            steps in prop::collection::vec((-50i32..50, -50i32..50), 1..10),
        ) {
            let mut tree = sample_tree();
            let mut engine = DragEngine::new(20.0, 1.0);
            engine.begin(PointerEvent::primary(pos2(0.0, 0.0)), LABEL, DragKind::Move, &tree, &[]);
            let mut pointer = pos2(0.0, 0.0);
            for (dx, dy) in steps {
                pointer += vec2(dx as f32, dy as f32);
                engine.update(pointer);
            }
            engine.end(pointer, &mut tree);
            prop_assert_eq!(tree.get_node(LABEL).unwrap().pos, pos2(50.0, 50.0) + pointer.to_vec2());
        }
    }
}
