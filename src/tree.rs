//! The element tree: the authoritative store of control configurations.
//!
//! Every node records its parent by *name* (`from_container`), and the tree keeps
//! ordered child lists (paint order) alongside so both views always agree.
//! Structural mutations validate first and apply second; a rejected mutation
//! leaves the tree untouched.

use crate::widget::{UNTABBED_SCROLL_KEY, WidgetId, WidgetKind, WidgetProps};
use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    #[error("no element with id {0}")]
    UnknownElement(WidgetId),
    #[error("element id {0} is already in use")]
    DuplicateId(WidgetId),
    #[error("the name \"{0}\" is already used by another element")]
    NameTaken(String),
    #[error("element names cannot be empty")]
    EmptyName,
    #[error("no container named \"{0}\"")]
    UnknownContainer(String),
    #[error("\"{0}\" does not accept children")]
    NotAContainer(String),
    #[error("tab {tab:?} is not valid inside {container:?}")]
    InvalidTab {
        container: Option<String>,
        tab: Option<String>,
    },
    #[error("cannot move \"{0}\" into its own subtree")]
    Cycle(String),
    #[error("element geometry must be finite")]
    InvalidGeometry,
    #[error("element size {width}x{height} is below the minimum of {min}")]
    TooSmall { width: f32, height: f32, min: f32 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub id: WidgetId,
    pub name: String,
    pub kind: WidgetKind,
    pub pos: Pos2,  // top-left in the parent container's frame
    pub size: Vec2, // width/height
    #[serde(default)]
    pub from_container: Option<String>,
    #[serde(default)]
    pub from_tab_id: Option<String>,
    #[serde(default)]
    pub props: WidgetProps,
    #[serde(skip)]
    pub(crate) children: Vec<WidgetId>,
}

impl ElementNode {
    pub fn new(id: WidgetId, name: impl Into<String>, kind: WidgetKind, pos: Pos2) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            pos,
            size: kind.default_size(),
            from_container: None,
            from_tab_id: None,
            props: kind.default_props(),
            children: Vec::new(),
        }
    }

    pub fn with_size(mut self, size: Vec2) -> Self {
        self.size = size;
        self
    }

    pub fn inside(mut self, container: impl Into<String>, tab: Option<&str>) -> Self {
        self.from_container = Some(container.into());
        self.from_tab_id = tab.map(str::to_owned);
        self
    }

    pub fn children(&self) -> &[WidgetId] {
        &self.children
    }

    pub fn rect(&self) -> Rect {
        Rect::from_min_size(self.pos, self.size)
    }

    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }

    pub fn is_tabbed(&self) -> bool {
        self.kind.is_tabbed()
    }

    /// Declared tab ids; empty for anything that is not a tab control.
    pub fn tab_ids(&self) -> &[String] {
        if self.is_tabbed() {
            &self.props.items
        } else {
            &[]
        }
    }

    pub fn active_tab(&self) -> Option<&str> {
        let tabs = self.tab_ids();
        if tabs.is_empty() {
            return None;
        }
        tabs.get(self.props.selected.min(tabs.len() - 1))
            .map(String::as_str)
    }

    pub fn accepts_children(&self) -> bool {
        self.is_container() && (!self.is_tabbed() || !self.tab_ids().is_empty())
    }

    /// Scroll offset this container applies to its visible content.
    pub fn own_scroll(&self) -> Vec2 {
        if !self.kind.descriptor().scrollable {
            return Vec2::ZERO;
        }
        let key = self.active_tab().unwrap_or(UNTABBED_SCROLL_KEY);
        self.props.scroll.get(key).copied().unwrap_or(Vec2::ZERO)
    }
}

/// Where an element lives: parent container, tab, local position and paint index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub container: Option<String>,
    pub tab: Option<String>,
    pub pos: Pos2,
    pub index: usize,
}

/// A subtree lifted out of the tree, in pre-order, with its former index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetachedSubtree {
    pub nodes: Vec<ElementNode>,
    pub index: usize,
}

impl DetachedSubtree {
    pub fn root(&self) -> Option<&ElementNode> {
        self.nodes.first()
    }
}

/// Partial update for the non-structural parts of a node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodePatch {
    pub pos: Option<Pos2>,
    pub size: Option<Vec2>,
    pub props: Option<WidgetProps>,
}

impl NodePatch {
    pub fn geometry(rect: Rect) -> Self {
        Self {
            pos: Some(rect.min),
            size: Some(rect.size()),
            props: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ElementTree {
    nodes: HashMap<WidgetId, ElementNode>,
    names: HashMap<String, WidgetId>,
    roots: Vec<WidgetId>,
    min_size: f32,
}

impl ElementTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from a flat element list, repairing what it can.
    ///
    /// Dangling parent references and parent cycles promote the element to the
    /// root, bad tab ids are replaced, negative sizes are clamped, and
    /// duplicate ids or names are dropped.
    pub fn from_elements(elements: Vec<ElementNode>) -> Self {
        let mut tree = Self::new();
        let mut order = Vec::with_capacity(elements.len());
        for mut node in elements {
            if tree.nodes.contains_key(&node.id) {
                warn!("dropping element {} with duplicate id {}", node.name, node.id);
                continue;
            }
            if node.name.is_empty() || tree.names.contains_key(&node.name) {
                warn!("dropping element {} with empty or duplicate name", node.id);
                continue;
            }
            node.children.clear();
            tree.names.insert(node.name.clone(), node.id);
            order.push(node.id);
            tree.clamp_size(&mut node);
            tree.nodes.insert(node.id, node);
        }

        for id in &order {
            let parent = tree.parent_of(*id);
            if parent.is_none()
                && let Some(node) = tree.nodes.get_mut(id)
            {
                node.from_container = None;
            }
            tree.repair_tab(*id, parent);
            tree.child_list_mut(parent).push(*id);
        }

        // Parent cycles leave nodes unreachable from the root; break them there.
        loop {
            let reachable: HashSet<WidgetId> = tree.preorder().into_iter().collect();
            let Some(&orphan) = order.iter().find(|id| !reachable.contains(id)) else {
                break;
            };
            warn!("element {orphan} is part of a parent cycle, moving it to the root");
            let parent = tree.parent_of(orphan);
            tree.child_list_mut(parent).retain(|c| *c != orphan);
            if let Some(node) = tree.nodes.get_mut(&orphan) {
                node.from_container = None;
                node.from_tab_id = None;
            }
            tree.roots.push(orphan);
        }
        tree
    }

    /// Flat pre-order copy of every element, suitable for persistence.
    pub fn to_elements(&self) -> Vec<ElementNode> {
        self.preorder()
            .into_iter()
            .filter_map(|id| self.nodes.get(&id).cloned())
            .collect()
    }

    pub fn min_size(&self) -> f32 {
        self.min_size
    }

    /// Sets the smallest allowed width and height. Elements already below it
    /// are grown in place.
    pub fn set_min_size(&mut self, min_size: f32) {
        self.min_size = min_size;
        let min = self.min_size;
        for node in self.nodes.values_mut() {
            clamp_node_size(node, min);
        }
    }

    fn clamp_size(&self, node: &mut ElementNode) {
        clamp_node_size(node, self.min_size);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: WidgetId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn get_node(&self, id: WidgetId) -> Option<&ElementNode> {
        self.nodes.get(&id)
    }

    pub fn id_of(&self, name: &str) -> Option<WidgetId> {
        self.names.get(name).copied()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ElementNode> {
        self.id_of(name).and_then(|id| self.nodes.get(&id))
    }

    /// Ordered children of `parent`, or of the form root for `None`.
    pub fn children(&self, parent: Option<WidgetId>) -> &[WidgetId] {
        match parent {
            None => &self.roots,
            Some(id) => self.nodes.get(&id).map_or(&[], |n| n.children.as_slice()),
        }
    }

    fn child_list_mut(&mut self, parent: Option<WidgetId>) -> &mut Vec<WidgetId> {
        match parent.and_then(|id| self.nodes.get_mut(&id)) {
            Some(node) => &mut node.children,
            None => &mut self.roots,
        }
    }

    /// Resolves an element's parent by its `from_container` name.
    ///
    /// A reference to a missing element, or to something that is not a
    /// container, resolves to the root.
    pub fn parent_of(&self, id: WidgetId) -> Option<WidgetId> {
        let name = self.nodes.get(&id)?.from_container.as_deref()?;
        match self.find_by_name(name) {
            Some(parent) if parent.is_container() && parent.id != id => Some(parent.id),
            _ => {
                warn!("element {id} refers to missing container {name:?}, treating it as root-level");
                None
            }
        }
    }

    pub fn index_in_parent(&self, id: WidgetId) -> Option<usize> {
        self.children(self.parent_of(id))
            .iter()
            .position(|c| *c == id)
    }

    pub fn placement(&self, id: WidgetId) -> Option<Placement> {
        let node = self.nodes.get(&id)?;
        let parent = self.parent_of(id);
        Some(Placement {
            container: parent.and_then(|p| self.nodes.get(&p)).map(|p| p.name.clone()),
            tab: node.from_tab_id.clone(),
            pos: node.pos,
            index: self.index_in_parent(id).unwrap_or(0),
        })
    }

    /// All element ids in paint order: each parent before its children.
    pub fn preorder(&self) -> Vec<WidgetId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<WidgetId> = self.roots.iter().rev().copied().collect();
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            out.push(id);
            stack.extend(self.children(Some(id)).iter().rev());
        }
        out
    }

    /// Every element below `id`, not including `id` itself.
    pub fn descendants(&self, id: WidgetId) -> Vec<WidgetId> {
        let mut out = Vec::new();
        let mut stack: Vec<WidgetId> = self.children(Some(id)).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            if next == id || out.contains(&next) {
                continue;
            }
            out.push(next);
            stack.extend(self.children(Some(next)).iter().rev());
        }
        out
    }

    pub fn is_ancestor(&self, ancestor: WidgetId, id: WidgetId) -> bool {
        let mut current = self.parent_of(id);
        let mut steps = 0;
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.nodes.len() {
                return false;
            }
            current = self.parent_of(p);
        }
        false
    }

    /// Checks that `tab` is a legal `from_tab_id` under `parent`.
    fn check_tab(&self, parent: Option<&ElementNode>, tab: Option<&str>) -> Result<(), TreeError> {
        let ok = match parent {
            Some(p) if p.is_tabbed() => tab.is_some_and(|t| p.tab_ids().iter().any(|id| id == t)),
            _ => tab.is_none(),
        };
        if ok {
            Ok(())
        } else {
            Err(TreeError::InvalidTab {
                container: parent.map(|p| p.name.clone()),
                tab: tab.map(str::to_owned),
            })
        }
    }

    fn repair_tab(&mut self, id: WidgetId, parent: Option<WidgetId>) {
        let parent_node = parent.and_then(|p| self.nodes.get(&p));
        let tab = self.nodes.get(&id).and_then(|n| n.from_tab_id.clone());
        if self.check_tab(parent_node, tab.as_deref()).is_ok() {
            return;
        }
        let replacement = parent_node.and_then(|p| p.active_tab()).map(str::to_owned);
        warn!("element {id} has invalid tab {tab:?}, using {replacement:?}");
        if let Some(node) = self.nodes.get_mut(&id) {
            node.from_tab_id = replacement;
        }
    }

    /// Resolves a container name for new children, rejecting anything else.
    fn resolve_container(&self, name: Option<&str>) -> Result<Option<&ElementNode>, TreeError> {
        let Some(name) = name else {
            return Ok(None);
        };
        let node = self
            .find_by_name(name)
            .ok_or_else(|| TreeError::UnknownContainer(name.to_owned()))?;
        if !node.accepts_children() {
            return Err(TreeError::NotAContainer(name.to_owned()));
        }
        Ok(Some(node))
    }

    fn check_pos(pos: Pos2) -> Result<(), TreeError> {
        if pos.x.is_finite() && pos.y.is_finite() {
            Ok(())
        } else {
            Err(TreeError::InvalidGeometry)
        }
    }

    fn check_geometry(&self, pos: Pos2, size: Vec2) -> Result<(), TreeError> {
        Self::check_pos(pos)?;
        if !(size.x.is_finite() && size.y.is_finite()) {
            return Err(TreeError::InvalidGeometry);
        }
        if size.x < self.min_size || size.y < self.min_size {
            return Err(TreeError::TooSmall {
                width: size.x,
                height: size.y,
                min: self.min_size,
            });
        }
        Ok(())
    }

    /// Inserts a single element under its `from_container` at `index`
    /// (appended when `None` or out of range).
    pub fn insert(&mut self, node: ElementNode, index: Option<usize>) -> Result<(), TreeError> {
        self.insert_subtree(vec![node], index)
    }

    /// Inserts a pre-ordered subtree; the first node is placed at `index`
    /// in its parent and the rest follow their own parents.
    pub fn insert_subtree(
        &mut self,
        nodes: Vec<ElementNode>,
        index: Option<usize>,
    ) -> Result<(), TreeError> {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        let mut containers: HashMap<&str, &ElementNode> = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            if node.name.is_empty() {
                return Err(TreeError::EmptyName);
            }
            if self.nodes.contains_key(&node.id) || !ids.insert(node.id) {
                return Err(TreeError::DuplicateId(node.id));
            }
            if self.names.contains_key(&node.name) || !names.insert(node.name.as_str()) {
                return Err(TreeError::NameTaken(node.name.clone()));
            }
            self.check_geometry(node.pos, node.size)?;
            let parent = if i == 0 {
                self.resolve_container(node.from_container.as_deref())?
            } else {
                let name = node.from_container.as_deref().unwrap_or_default();
                let parent = containers
                    .get(name)
                    .copied()
                    .ok_or_else(|| TreeError::UnknownContainer(name.to_owned()))?;
                if !parent.accepts_children() {
                    return Err(TreeError::NotAContainer(name.to_owned()));
                }
                Some(parent)
            };
            self.check_tab(parent, node.from_tab_id.as_deref())?;
            containers.insert(node.name.as_str(), node);
        }

        for (i, mut node) in nodes.into_iter().enumerate() {
            node.children.clear();
            let id = node.id;
            self.names.insert(node.name.clone(), id);
            self.nodes.insert(id, node);
            let parent = self.parent_of(id);
            let list = self.child_list_mut(parent);
            match index {
                Some(at) if i == 0 && at <= list.len() => list.insert(at, id),
                _ => list.push(id),
            }
        }
        Ok(())
    }

    /// Lifts `id` and everything below it out of the tree.
    pub fn remove_subtree(&mut self, id: WidgetId) -> Result<DetachedSubtree, TreeError> {
        if !self.nodes.contains_key(&id) {
            return Err(TreeError::UnknownElement(id));
        }
        let parent = self.parent_of(id);
        let siblings = self.child_list_mut(parent);
        let index = siblings.iter().position(|c| *c == id).unwrap_or(siblings.len());
        siblings.retain(|c| *c != id);

        let mut order = vec![id];
        order.extend(self.descendants(id));
        let nodes = order
            .into_iter()
            .filter_map(|removed| {
                let node = self.nodes.remove(&removed)?;
                self.names.remove(&node.name);
                Some(node)
            })
            .collect();
        Ok(DetachedSubtree { nodes, index })
    }

    /// Moves `id` into container `to` (root for `None`), splicing it out of its
    /// old child list. Appends when `index` is `None`.
    pub fn move_node(
        &mut self,
        id: WidgetId,
        to: Option<WidgetId>,
        tab: Option<String>,
        index: Option<usize>,
    ) -> Result<(), TreeError> {
        let node = self.nodes.get(&id).ok_or(TreeError::UnknownElement(id))?;
        let target = match to {
            Some(to_id) => {
                let target = self.nodes.get(&to_id).ok_or(TreeError::UnknownElement(to_id))?;
                if to_id == id || self.is_ancestor(id, to_id) {
                    return Err(TreeError::Cycle(node.name.clone()));
                }
                if !target.accepts_children() {
                    return Err(TreeError::NotAContainer(target.name.clone()));
                }
                Some(target)
            }
            None => None,
        };
        self.check_tab(target, tab.as_deref())?;
        let target_name = target.map(|t| t.name.clone());

        let old_parent = self.parent_of(id);
        self.child_list_mut(old_parent).retain(|c| *c != id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.from_container = target_name;
            node.from_tab_id = tab;
        }
        let list = self.child_list_mut(to);
        match index {
            Some(at) if at <= list.len() => list.insert(at, id),
            _ => list.push(id),
        }
        Ok(())
    }

    /// Puts `id` back where `placement` says, resolving the container by name.
    pub fn apply_placement(&mut self, id: WidgetId, placement: &Placement) -> Result<(), TreeError> {
        let to = match placement.container.as_deref() {
            Some(name) => Some(
                self.id_of(name)
                    .ok_or_else(|| TreeError::UnknownContainer(name.to_owned()))?,
            ),
            None => None,
        };
        Self::check_pos(placement.pos)?;
        self.move_node(id, to, placement.tab.clone(), Some(placement.index))?;
        if let Some(node) = self.nodes.get_mut(&id) {
            node.pos = placement.pos;
        }
        Ok(())
    }

    /// Applies a non-structural patch. Tab lists may only shrink when no child
    /// still lives on a removed tab.
    pub fn mutate_node(&mut self, id: WidgetId, patch: NodePatch) -> Result<(), TreeError> {
        let node = self.nodes.get(&id).ok_or(TreeError::UnknownElement(id))?;
        self.check_geometry(
            patch.pos.unwrap_or(node.pos),
            patch.size.unwrap_or(node.size),
        )?;
        if let Some(props) = &patch.props
            && node.is_tabbed()
        {
            for child in &node.children {
                let tab = self.nodes.get(child).and_then(|c| c.from_tab_id.as_deref());
                if !tab.is_some_and(|t| props.items.iter().any(|i| i == t)) {
                    return Err(TreeError::InvalidTab {
                        container: Some(node.name.clone()),
                        tab: tab.map(str::to_owned),
                    });
                }
            }
        }

        let node = self.nodes.get_mut(&id).ok_or(TreeError::UnknownElement(id))?;
        if let Some(pos) = patch.pos {
            node.pos = pos;
        }
        if let Some(size) = patch.size {
            node.size = size;
        }
        if let Some(props) = patch.props {
            node.props = props;
        }
        Ok(())
    }

    /// Renames an element, keeping children that point at it by name in sync.
    pub fn rename(&mut self, id: WidgetId, new_name: &str) -> Result<(), TreeError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(TreeError::EmptyName);
        }
        let old_name = self
            .nodes
            .get(&id)
            .ok_or(TreeError::UnknownElement(id))?
            .name
            .clone();
        if old_name == new_name {
            return Ok(());
        }
        if self.names.contains_key(new_name) {
            return Err(TreeError::NameTaken(new_name.to_owned()));
        }

        let children = self.children(Some(id)).to_vec();
        for child in children {
            if let Some(c) = self.nodes.get_mut(&child) {
                c.from_container = Some(new_name.to_owned());
            }
        }
        self.names.remove(&old_name);
        self.names.insert(new_name.to_owned(), id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.name = new_name.to_owned();
        }
        Ok(())
    }

    /// Smallest `<prefix><n>` name not yet used in the tree.
    pub fn unique_name(&self, prefix: &str) -> String {
        (1..)
            .map(|n| format!("{prefix}{n}"))
            .find(|candidate| !self.names.contains_key(candidate))
            .unwrap_or_else(|| prefix.to_owned())
    }

    pub fn max_id(&self) -> Option<WidgetId> {
        self.nodes.keys().max().copied()
    }
}

/// Grows `node` to at least `min` on both axes; a NaN extent becomes `min`.
fn clamp_node_size(node: &mut ElementNode, min: f32) {
    let size = node.size;
    let clamped = Vec2::new(size.x.max(min), size.y.max(min));
    if clamped != size {
        warn!(
            "element {} has size {size:?}, below the minimum {min}; growing it to {clamped:?}",
            node.name
        );
        node.size = clamped;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use egui::{pos2, vec2};

    /// Form with `panel1` at (200,100) holding `label1`, and `tabs1` holding
    /// `group1` on tab1 and `group2` on tab2.
    pub(crate) fn sample_tree() -> ElementTree {
        ElementTree::from_elements(vec![
            ElementNode::new(WidgetId::new(1), "panel1", WidgetKind::Panel, pos2(200.0, 100.0)),
            ElementNode::new(WidgetId::new(2), "label1", WidgetKind::Label, pos2(50.0, 50.0))
                .with_size(vec2(100.0, 40.0))
                .inside("panel1", None),
            ElementNode::new(WidgetId::new(3), "tabs1", WidgetKind::TabControl, pos2(10.0, 400.0)),
            ElementNode::new(WidgetId::new(4), "group1", WidgetKind::Group, pos2(10.0, 10.0))
                .inside("tabs1", Some("tab1")),
            ElementNode::new(WidgetId::new(5), "group2", WidgetKind::Group, pos2(10.0, 10.0))
                .inside("tabs1", Some("tab2")),
        ])
    }

    #[test]
    fn test_from_elements_builds_children() {
        let tree = sample_tree();
        assert_eq!(tree.len(), 5);
        assert_eq!(
            tree.children(None),
            &[WidgetId::new(1), WidgetId::new(3)]
        );
        assert_eq!(tree.children(Some(WidgetId::new(1))), &[WidgetId::new(2)]);
        assert_eq!(tree.parent_of(WidgetId::new(4)), Some(WidgetId::new(3)));
        assert_eq!(tree.index_in_parent(WidgetId::new(5)), Some(1));
    }

    #[test]
    fn test_dangling_parent_promotes_to_root() {
        let tree = ElementTree::from_elements(vec![
            ElementNode::new(WidgetId::new(1), "label1", WidgetKind::Label, pos2(0.0, 0.0))
                .inside("missing", None),
        ]);
        assert_eq!(tree.children(None), &[WidgetId::new(1)]);
        assert_eq!(tree.parent_of(WidgetId::new(1)), None);
    }

    #[test]
    fn test_parent_cycle_is_broken_on_load() {
        let tree = ElementTree::from_elements(vec![
            ElementNode::new(WidgetId::new(1), "a", WidgetKind::Panel, pos2(0.0, 0.0))
                .inside("b", None),
            ElementNode::new(WidgetId::new(2), "b", WidgetKind::Panel, pos2(0.0, 0.0))
                .inside("a", None),
        ]);
        assert_eq!(tree.preorder().len(), 2);
        assert_eq!(tree.children(None), &[WidgetId::new(1)]);
        assert_eq!(tree.get_node(WidgetId::new(1)).unwrap().from_container, None);
    }

    #[test]
    fn test_invalid_tab_is_repaired_on_load() {
        let tree = ElementTree::from_elements(vec![
            ElementNode::new(WidgetId::new(1), "tabs1", WidgetKind::TabControl, pos2(0.0, 0.0)),
            ElementNode::new(WidgetId::new(2), "label1", WidgetKind::Label, pos2(0.0, 0.0))
                .inside("tabs1", Some("nope")),
        ]);
        let label = tree.get_node(WidgetId::new(2)).unwrap();
        assert_eq!(label.from_tab_id.as_deref(), Some("tab1"));
    }

    #[test]
    fn test_insert_rejects_duplicate_name() {
        let mut tree = sample_tree();
        let dup = ElementNode::new(WidgetId::new(9), "label1", WidgetKind::Label, pos2(0.0, 0.0));
        assert_eq!(
            tree.insert(dup, None),
            Err(TreeError::NameTaken("label1".into()))
        );
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_insert_requires_tab_inside_tabbed_parent() {
        let mut tree = sample_tree();
        let node = ElementNode::new(WidgetId::new(9), "label9", WidgetKind::Label, pos2(0.0, 0.0))
            .inside("tabs1", None);
        assert!(matches!(
            tree.insert(node.clone(), None),
            Err(TreeError::InvalidTab { .. })
        ));
        let node = node.inside("tabs1", Some("tab2"));
        assert_eq!(tree.insert(node, Some(0)), Ok(()));
        assert_eq!(tree.index_in_parent(WidgetId::new(9)), Some(0));
    }

    #[test]
    fn test_tab_outside_tabbed_parent_is_rejected() {
        let mut tree = sample_tree();
        let node = ElementNode::new(WidgetId::new(9), "label9", WidgetKind::Label, pos2(0.0, 0.0))
            .inside("panel1", Some("tab1"));
        assert!(matches!(
            tree.insert(node, None),
            Err(TreeError::InvalidTab { .. })
        ));
    }

    #[test]
    fn test_remove_and_reinsert_subtree() {
        let mut tree = sample_tree();
        let before = tree.to_elements();
        let detached = tree.remove_subtree(WidgetId::new(3)).unwrap();
        assert_eq!(detached.index, 1);
        assert_eq!(detached.nodes.len(), 3);
        assert!(!tree.contains_name("group1"));

        tree.insert_subtree(detached.nodes, Some(detached.index)).unwrap();
        assert_eq!(tree.to_elements(), before);
    }

    #[test]
    fn test_move_node_rejects_cycle() {
        let mut tree = sample_tree();
        let err = tree.move_node(WidgetId::new(3), Some(WidgetId::new(4)), None, None);
        assert_eq!(err, Err(TreeError::Cycle("tabs1".into())));
    }

    #[test]
    fn test_move_node_appends_to_new_parent() {
        let mut tree = sample_tree();
        tree.move_node(WidgetId::new(2), Some(WidgetId::new(4)), None, None)
            .unwrap();
        assert!(tree.children(Some(WidgetId::new(1))).is_empty());
        assert_eq!(tree.children(Some(WidgetId::new(4))), &[WidgetId::new(2)]);
        let label = tree.get_node(WidgetId::new(2)).unwrap();
        assert_eq!(label.from_container.as_deref(), Some("group1"));
    }

    #[test]
    fn test_rename_updates_children_references() {
        let mut tree = sample_tree();
        tree.rename(WidgetId::new(1), "mainPanel").unwrap();
        assert_eq!(
            tree.get_node(WidgetId::new(2)).unwrap().from_container.as_deref(),
            Some("mainPanel")
        );
        assert_eq!(tree.parent_of(WidgetId::new(2)), Some(WidgetId::new(1)));
        assert_eq!(
            tree.rename(WidgetId::new(2), "tabs1"),
            Err(TreeError::NameTaken("tabs1".into()))
        );
        assert_eq!(tree.rename(WidgetId::new(2), "  "), Err(TreeError::EmptyName));
    }

    #[test]
    fn test_mutate_node_keeps_tab_invariant() {
        let mut tree = sample_tree();
        let mut props = tree.get_node(WidgetId::new(3)).unwrap().props.clone();
        props.items = vec!["tab1".into()];
        let patch = NodePatch {
            props: Some(props),
            ..Default::default()
        };
        assert!(tree.mutate_node(WidgetId::new(3), patch).is_err());

        let patch = NodePatch {
            size: Some(vec2(f32::NAN, 10.0)),
            ..Default::default()
        };
        assert_eq!(
            tree.mutate_node(WidgetId::new(2), patch),
            Err(TreeError::InvalidGeometry)
        );
    }

    #[test]
    fn test_negative_size_is_clamped_on_load() {
        let tree = ElementTree::from_elements(vec![
            ElementNode::new(WidgetId::new(1), "label1", WidgetKind::Label, pos2(0.0, 0.0))
                .with_size(vec2(5.0, -3.0)),
        ]);
        assert_eq!(tree.get_node(WidgetId::new(1)).unwrap().size, vec2(5.0, 0.0));
    }

    #[test]
    fn test_min_size_grows_existing_and_guards_edits() {
        let mut tree = ElementTree::from_elements(vec![
            ElementNode::new(WidgetId::new(1), "label1", WidgetKind::Label, pos2(0.0, 0.0))
                .with_size(vec2(5.0, 40.0)),
        ]);
        tree.set_min_size(20.0);
        assert_eq!(tree.get_node(WidgetId::new(1)).unwrap().size, vec2(20.0, 40.0));

        let patch = NodePatch {
            size: Some(vec2(19.0, 40.0)),
            ..Default::default()
        };
        assert!(matches!(
            tree.mutate_node(WidgetId::new(1), patch),
            Err(TreeError::TooSmall { .. })
        ));
        assert_eq!(tree.get_node(WidgetId::new(1)).unwrap().size, vec2(20.0, 40.0));

        let small = ElementNode::new(WidgetId::new(2), "label2", WidgetKind::Label, pos2(0.0, 0.0))
            .with_size(vec2(10.0, 10.0));
        assert!(matches!(
            tree.insert(small, None),
            Err(TreeError::TooSmall { .. })
        ));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_unique_name() {
        let tree = sample_tree();
        assert_eq!(tree.unique_name("label"), "label2");
        assert_eq!(tree.unique_name("button"), "button1");
    }
}
