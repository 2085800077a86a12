//! Container registry: absolute frames of every container in the tree.

use crate::tree::ElementTree;
use crate::widget::WidgetId;
use egui::{Pos2, Rect, Vec2};
use std::collections::VecDeque;

#[derive(Clone, Debug, PartialEq)]
pub struct ContainerInfo {
    pub id: WidgetId,
    pub name: String,
    /// Top-left in document space; scrolling never changes it.
    pub global: Pos2,
    /// Sum of the scroll offsets of every ancestor ("screenLeft/screenTop").
    pub screen_offset: Vec2,
    /// `screen_offset` plus this container's own active scroll, as seen by its children.
    pub content_scroll: Vec2,
    pub size: Vec2,
}

impl ContainerInfo {
    pub fn global_rect(&self) -> Rect {
        Rect::from_min_size(self.global, self.size)
    }

    /// Where the container is drawn in the root frame.
    pub fn screen_pos(&self) -> Pos2 {
        self.global - self.screen_offset
    }

    /// Root-frame position of the container's local origin, i.e. where a child at (0, 0) appears.
    pub fn content_origin(&self) -> Pos2 {
        self.global - self.content_scroll
    }
}

/// Containers in breadth-first registration order; deeper containers come later.
#[derive(Clone, Debug, Default)]
pub struct ContainerRegistry {
    containers: Vec<ContainerInfo>,
}

impl ContainerRegistry {
    /// Walks the tree below `root` (the whole form for `None`).
    ///
    /// Elements in `moving` are left out together with their subtrees, so a
    /// dragged container can never become its own reparent target.
    pub fn compute(tree: &ElementTree, root: Option<WidgetId>, moving: &[WidgetId]) -> Self {
        let (origin, scroll) = match root {
            Some(id) => frame_of(tree, id),
            None => (Pos2::ZERO, Vec2::ZERO),
        };

        let mut containers = Vec::new();
        let mut queue: VecDeque<(WidgetId, Pos2, Vec2)> = tree
            .children(root)
            .iter()
            .map(|id| (*id, origin, scroll))
            .collect();

        while let Some((id, parent_global, parent_scroll)) = queue.pop_front() {
            if moving.contains(&id) {
                continue;
            }
            let Some(node) = tree.get_node(id) else {
                continue;
            };
            if !node.is_container() {
                continue;
            }
            let global = parent_global + node.pos.to_vec2();
            let content_scroll = parent_scroll + node.own_scroll();
            containers.push(ContainerInfo {
                id,
                name: node.name.clone(),
                global,
                screen_offset: parent_scroll,
                content_scroll,
                size: node.size,
            });
            queue.extend(
                node.children()
                    .iter()
                    .map(|child| (*child, global, content_scroll)),
            );
        }
        Self { containers }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ContainerInfo> {
        self.containers.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ContainerInfo> {
        self.containers.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

/// Global position and accumulated content scroll of `id`'s local frame.
pub fn frame_of(tree: &ElementTree, id: WidgetId) -> (Pos2, Vec2) {
    let mut global = Pos2::ZERO;
    let mut scroll = Vec2::ZERO;
    let mut current = Some(id);
    let mut steps = 0;
    while let Some(cur) = current {
        let Some(node) = tree.get_node(cur) else {
            break;
        };
        global += node.pos.to_vec2();
        scroll += node.own_scroll();
        steps += 1;
        if steps > tree.len() {
            break;
        }
        current = tree.parent_of(cur);
    }
    (global, scroll)
}

/// Root-frame screen position of an element: its global position minus the
/// scroll of every ancestor.
pub fn element_screen_pos(tree: &ElementTree, id: WidgetId) -> Option<Pos2> {
    let node = tree.get_node(id)?;
    let parent_origin = match tree.parent_of(id) {
        Some(parent) => {
            let (global, scroll) = frame_of(tree, parent);
            global - scroll
        }
        None => Pos2::ZERO,
    };
    Some(parent_origin + node.pos.to_vec2())
}

/// False when any tab control above `id` is showing a different tab than the
/// one the path to `id` lives on.
pub fn is_container_visible(tree: &ElementTree, id: WidgetId) -> bool {
    let mut current = id;
    for _ in 0..=tree.len() {
        let Some(parent) = tree.parent_of(current) else {
            return true;
        };
        let (Some(node), Some(parent_node)) = (tree.get_node(current), tree.get_node(parent))
        else {
            return true;
        };
        if parent_node.is_tabbed() && node.from_tab_id.as_deref() != parent_node.active_tab() {
            return false;
        }
        current = parent;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::tests::sample_tree;
    use crate::tree::{ElementNode, NodePatch};
    use crate::widget::WidgetKind;
    use egui::{pos2, vec2};

    fn scroll_tab(tree: &mut ElementTree, id: WidgetId, tab: &str, by: Vec2) {
        let mut props = tree.get_node(id).unwrap().props.clone();
        props.scroll.insert(tab.into(), by);
        tree.mutate_node(
            id,
            NodePatch {
                props: Some(props),
                ..Default::default()
            },
        )
        .unwrap();
    }

    #[test]
    fn test_breadth_first_global_positions() {
        let tree = sample_tree();
        let registry = ContainerRegistry::compute(&tree, None, &[]);
        let names: Vec<_> = registry.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["panel1", "tabs1", "group1", "group2"]);

        let group1 = registry.get("group1").unwrap();
        assert_eq!(group1.global, pos2(20.0, 410.0));
        assert_eq!(group1.screen_offset, Vec2::ZERO);
    }

    #[test]
    fn test_scroll_affects_screen_offset_only() {
        let mut tree = sample_tree();
        scroll_tab(&mut tree, WidgetId::new(3), "tab1", vec2(0.0, 30.0));
        let registry = ContainerRegistry::compute(&tree, None, &[]);

        let tabs = registry.get("tabs1").unwrap();
        assert_eq!(tabs.screen_offset, Vec2::ZERO);
        assert_eq!(tabs.content_scroll, vec2(0.0, 30.0));

        let group1 = registry.get("group1").unwrap();
        assert_eq!(group1.global, pos2(20.0, 410.0));
        assert_eq!(group1.screen_offset, vec2(0.0, 30.0));
        assert_eq!(group1.screen_pos(), pos2(20.0, 380.0));

        // Hidden tabs stay registered; visibility is decided at hit-test time.
        assert!(registry.get("group2").is_some());
    }

    #[test]
    fn test_moving_element_and_subtree_are_excluded() {
        let tree = sample_tree();
        let registry = ContainerRegistry::compute(&tree, None, &[WidgetId::new(3)]);
        let names: Vec<_> = registry.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["panel1"]);
    }

    #[test]
    fn test_compute_from_subtree_root() {
        let tree = sample_tree();
        let registry = ContainerRegistry::compute(&tree, Some(WidgetId::new(3)), &[]);
        let names: Vec<_> = registry.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["group1", "group2"]);
        assert_eq!(registry.get("group2").unwrap().global, pos2(20.0, 410.0));
    }

    #[test]
    fn test_tab_visibility() {
        let mut tree = sample_tree();
        assert!(is_container_visible(&tree, WidgetId::new(4)));
        assert!(!is_container_visible(&tree, WidgetId::new(5)));

        let mut props = tree.get_node(WidgetId::new(3)).unwrap().props.clone();
        props.selected = 1;
        tree.mutate_node(
            WidgetId::new(3),
            NodePatch {
                props: Some(props),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(!is_container_visible(&tree, WidgetId::new(4)));
        assert!(is_container_visible(&tree, WidgetId::new(5)));
    }

    #[test]
    fn test_nested_invisible_ancestor_hides_descendant() {
        let mut tree = sample_tree();
        let inner = ElementNode::new(WidgetId::new(6), "panel2", WidgetKind::Panel, pos2(5.0, 5.0))
            .inside("group2", None);
        tree.insert(inner, None).unwrap();
        assert!(!is_container_visible(&tree, WidgetId::new(6)));
    }

    #[test]
    fn test_element_screen_pos() {
        let mut tree = sample_tree();
        assert_eq!(
            element_screen_pos(&tree, WidgetId::new(2)),
            Some(pos2(250.0, 150.0))
        );
        scroll_tab(&mut tree, WidgetId::new(3), "tab1", vec2(0.0, 30.0));
        assert_eq!(
            element_screen_pos(&tree, WidgetId::new(4)),
            Some(pos2(20.0, 380.0))
        );
    }
}
