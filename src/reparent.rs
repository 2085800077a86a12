//! Decides, after a move, which container an element was dropped into and
//! converts its position into that container's frame.

use crate::container::{ContainerInfo, ContainerRegistry, frame_of, is_container_visible};
use crate::drag::{CommittedDrag, DragKind};
use crate::selection::Selection;
use crate::tree::{ElementTree, NodePatch, Placement, TreeError};
use crate::widget::WidgetId;
use egui::Pos2;
use tracing::{debug, warn};

/// One element that changed parent, with where it was and where it is now.
#[derive(Clone, Debug, PartialEq)]
pub struct ReparentChange {
    pub id: WidgetId,
    pub name: String,
    pub old: Placement,
    pub new: Placement,
}

/// Hit-tests `point` (root frame) against the registry, deepest container first.
///
/// Returns `None` when the point lands on the bare form.
pub fn find_container_at<'a>(
    point: Pos2,
    registry: &'a ContainerRegistry,
    tree: &ElementTree,
    self_name: &str,
) -> Option<&'a ContainerInfo> {
    registry.iter().rev().find(|c| {
        let probe = point + c.screen_offset;
        c.global_rect().contains(probe)
            && c.name != self_name
            && tree.get_node(c.id).is_some_and(|n| n.accepts_children())
            && is_container_visible(tree, c.id)
    })
}

/// Local position in `from` to root-frame position.
pub fn out_of_container(pos: Pos2, from: &ContainerInfo) -> Pos2 {
    pos + from.content_origin().to_vec2()
}

/// Root-frame position to local position in `to`.
pub fn into_container(pos: Pos2, to: &ContainerInfo) -> Pos2 {
    pos - to.content_origin().to_vec2()
}

/// Moves `id` under `target` (the root for `None`) keeping its on-screen
/// position. Returns `None` when the parent does not change.
pub fn reparent(
    tree: &mut ElementTree,
    registry: &ContainerRegistry,
    id: WidgetId,
    target: Option<&ContainerInfo>,
) -> Result<Option<ReparentChange>, TreeError> {
    let node = tree.get_node(id).ok_or(TreeError::UnknownElement(id))?;
    let name = node.name.clone();
    let local = node.pos;
    let current_parent = tree.parent_of(id);
    if current_parent == target.map(|t| t.id) {
        return Ok(None);
    }
    let old = tree.placement(id).ok_or(TreeError::UnknownElement(id))?;

    let root_pos = match current_parent.and_then(|p| tree.get_node(p)) {
        Some(parent) => match registry.get(&parent.name) {
            Some(info) => out_of_container(local, info),
            None => {
                let (global, scroll) = frame_of(tree, parent.id);
                local + (global - scroll).to_vec2()
            }
        },
        None => local,
    };
    let new_pos = match target {
        Some(info) => into_container(root_pos, info),
        None => root_pos,
    };
    let tab = target
        .and_then(|t| tree.get_node(t.id))
        .and_then(|t| t.active_tab())
        .map(str::to_owned);

    tree.move_node(id, target.map(|t| t.id), tab, None)?;
    tree.mutate_node(
        id,
        NodePatch {
            pos: Some(new_pos),
            ..Default::default()
        },
    )?;
    let new = tree.placement(id).ok_or(TreeError::UnknownElement(id))?;
    debug!(
        "reparented {name} from {:?} to {:?}",
        old.container, new.container
    );
    Ok(Some(ReparentChange { id, name, old, new }))
}

/// Runs the resolver for every selected, reparentable element of a finished
/// move. Each element is probed at the release point shifted by its offset
/// from the reference element.
pub fn resolve_after_move(
    tree: &mut ElementTree,
    committed: &CommittedDrag,
    selection: &Selection,
) -> Vec<ReparentChange> {
    if committed.kind != DragKind::Move {
        return Vec::new();
    }
    let moving: Vec<WidgetId> = committed.elements.iter().map(|c| c.id).collect();
    let registry = ContainerRegistry::compute(tree, None, &moving);
    let Some(reference) = committed
        .elements
        .iter()
        .find(|c| c.id == committed.reference)
    else {
        return Vec::new();
    };

    let mut changes = Vec::new();
    for cached in &committed.elements {
        let Some(node) = tree.get_node(cached.id) else {
            continue;
        };
        if !selection.contains(cached.id) || !node.kind.descriptor().reparentable {
            continue;
        }
        let probe = committed.release + (cached.current.min - reference.current.min);
        let target = find_container_at(probe, &registry, tree, &node.name);
        match reparent(tree, &registry, cached.id, target) {
            Ok(Some(mut change)) => {
                change.old.pos = cached.original.min;
                changes.push(change);
            }
            Ok(None) => {}
            Err(err) => warn!("could not reparent {}: {err}", cached.id),
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::element_screen_pos;
    use crate::drag::{DragEngine, DragOutcome, PointerEvent};
    use crate::tree::tests::sample_tree;
    use crate::tree::ElementNode;
    use crate::widget::WidgetKind;
    use egui::{pos2, vec2};
    use proptest::prelude::*;

    const PANEL: WidgetId = WidgetId::new(1);
    const LABEL: WidgetId = WidgetId::new(2);
    const TABS: WidgetId = WidgetId::new(3);
    const GROUP1: WidgetId = WidgetId::new(4);

    fn scroll_tabs(tree: &mut ElementTree, tab: &str, by: f32) {
        let mut props = tree.get_node(TABS).unwrap().props.clone();
        props.scroll.insert(tab.into(), vec2(0.0, by));
        tree.mutate_node(
            TABS,
            NodePatch {
                props: Some(props),
                ..Default::default()
            },
        )
        .unwrap();
    }

    fn drag(tree: &mut ElementTree, id: WidgetId, from: Pos2, to: Pos2) -> CommittedDrag {
        let mut engine = DragEngine::new(20.0, 1.0);
        engine.begin(PointerEvent::primary(from), id, DragKind::Move, tree, &[id]);
        match engine.end(to, tree) {
            DragOutcome::Committed(c) => c,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_nested_container_wins() {
        let tree = sample_tree();
        let registry = ContainerRegistry::compute(&tree, None, &[]);
        let hit = find_container_at(pos2(30.0, 420.0), &registry, &tree, "label1").unwrap();
        assert_eq!(hit.name, "group1");

        let hit = find_container_at(pos2(300.0, 420.0), &registry, &tree, "label1").unwrap();
        assert_eq!(hit.name, "tabs1");

        assert!(find_container_at(pos2(5.0, 5.0), &registry, &tree, "label1").is_none());
    }

    #[test]
    fn test_self_is_never_returned() {
        let tree = sample_tree();
        let registry = ContainerRegistry::compute(&tree, None, &[]);
        let hit = find_container_at(pos2(30.0, 420.0), &registry, &tree, "group1").unwrap();
        assert_eq!(hit.name, "tabs1");
    }

    #[test]
    fn test_hidden_tab_is_never_hit() {
        let tree = sample_tree();
        let registry = ContainerRegistry::compute(&tree, None, &[]);
        // group2 overlaps group1 exactly but sits on the inactive tab.
        let hit = find_container_at(pos2(30.0, 420.0), &registry, &tree, "x").unwrap();
        assert_ne!(hit.name, "group2");
    }

    #[test]
    fn test_scroll_is_added_to_probe() {
        let mut tree = sample_tree();
        scroll_tabs(&mut tree, "tab1", 100.0);
        let registry = ContainerRegistry::compute(&tree, None, &[]);
        // group1 spans y 410..560 in document space and 310..460 on screen.
        let hit = find_container_at(pos2(30.0, 320.0), &registry, &tree, "x");
        assert_eq!(hit.map(|c| c.name.as_str()), Some("group1"));
    }

    #[test]
    fn test_drop_on_form_moves_to_root() {
        let mut tree = sample_tree();
        let before = element_screen_pos(&tree, LABEL).unwrap();
        // Drag the label up-left by 240 so it ends outside panel1.
        let committed = drag(&mut tree, LABEL, pos2(260.0, 160.0), pos2(20.0, 20.0));
        let changes = resolve_after_move(&mut tree, &committed, &Selection::default_with(LABEL));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old.container.as_deref(), Some("panel1"));
        assert_eq!(changes[0].old.pos, pos2(50.0, 50.0));
        assert_eq!(changes[0].new.container, None);

        let after = element_screen_pos(&tree, LABEL).unwrap();
        assert_eq!(after, before + vec2(-240.0, -140.0));
        assert_eq!(tree.get_node(LABEL).unwrap().pos, after);
        assert!(tree.children(Some(PANEL)).is_empty());
        assert_eq!(tree.children(None).last(), Some(&LABEL));
    }

    #[test]
    fn test_join_tabbed_container_takes_active_tab() {
        let mut tree = sample_tree();
        let committed = drag(&mut tree, LABEL, pos2(260.0, 160.0), pos2(40.0, 440.0));
        let changes = resolve_after_move(&mut tree, &committed, &Selection::default_with(LABEL));
        assert_eq!(changes[0].new.container.as_deref(), Some("group1"));
        let label = tree.get_node(LABEL).unwrap();
        assert_eq!(label.from_container.as_deref(), Some("group1"));
        assert_eq!(label.from_tab_id, None);

        let mut tree = sample_tree();
        let committed = drag(&mut tree, LABEL, pos2(260.0, 160.0), pos2(300.0, 600.0));
        resolve_after_move(&mut tree, &committed, &Selection::default_with(LABEL));
        let label = tree.get_node(LABEL).unwrap();
        assert_eq!(label.from_container.as_deref(), Some("tabs1"));
        assert_eq!(label.from_tab_id.as_deref(), Some("tab1"));
    }

    #[test]
    fn test_unselected_and_toolbar_elements_stay() {
        let mut tree = sample_tree();
        let committed = drag(&mut tree, LABEL, pos2(260.0, 160.0), pos2(20.0, 20.0));
        assert!(resolve_after_move(&mut tree, &committed, &Selection::default()).is_empty());

        let mut tree = sample_tree();
        let bar = ElementNode::new(WidgetId::new(7), "toolBar1", WidgetKind::ToolBar, pos2(0.0, 0.0))
            .inside("panel1", None);
        tree.insert(bar, None).unwrap();
        let committed = drag(&mut tree, WidgetId::new(7), pos2(210.0, 110.0), pos2(5.0, 700.0));
        let sel = Selection::default_with(WidgetId::new(7));
        assert!(resolve_after_move(&mut tree, &committed, &sel).is_empty());
    }

    #[test]
    fn test_container_cannot_drop_into_own_child() {
        let mut tree = sample_tree();
        // tabs1 dragged slightly: the release point is over its own group1.
        let committed = drag(&mut tree, TABS, pos2(30.0, 420.0), pos2(35.0, 425.0));
        let changes = resolve_after_move(&mut tree, &committed, &Selection::default_with(TABS));
        assert!(changes.is_empty());
        assert_eq!(tree.parent_of(TABS), None);
        assert_eq!(tree.parent_of(GROUP1), Some(TABS));
    }

    impl Selection {
        fn default_with(id: WidgetId) -> Self {
            let mut sel = Selection::default();
            sel.select_single(id);
            sel
        }
    }

    proptest! {
        #[test]
        fn reparent_preserves_screen_position(
            x in 0.0f32..700.0,
            y in 0.0f32..800.0,
            scroll in 0.0f32..200.0,
        ) {
            let mut tree = sample_tree();
            scroll_tabs(&mut tree, "tab1", scroll);
            let registry = ContainerRegistry::compute(&tree, None, &[LABEL]);
            let before = element_screen_pos(&tree, LABEL).unwrap();
            let target = find_container_at(pos2(x, y), &registry, &tree, "label1");
            reparent(&mut tree, &registry, LABEL, target).unwrap();
            let after = element_screen_pos(&tree, LABEL).unwrap();
            prop_assert!((after - before).length() < 1e-3);
        }

        #[test]
        fn hit_test_never_returns_self(x in 0.0f32..700.0, y in 0.0f32..800.0) {
            let tree = sample_tree();
            let registry = ContainerRegistry::compute(&tree, None, &[]);
            for name in ["panel1", "tabs1", "group1", "group2"] {
                let hit = find_container_at(pos2(x, y), &registry, &tree, name);
                prop_assert!(hit.is_none_or(|c| c.name != name));
            }
        }
    }
}
