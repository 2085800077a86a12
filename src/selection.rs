use crate::widget::WidgetId;

/// Currently selected elements. The first entry is the reference element that
/// drives group resize and alignment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<WidgetId>,
}

impl Selection {
    pub fn ids(&self) -> &[WidgetId] {
        &self.ids
    }

    pub fn reference(&self) -> Option<WidgetId> {
        self.ids.first().copied()
    }

    pub fn contains(&self, id: WidgetId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Select a single widget (clears other selections)
    pub fn select_single(&mut self, id: WidgetId) {
        self.ids = vec![id];
    }

    pub fn set(&mut self, ids: Vec<WidgetId>) {
        self.ids = ids;
        self.ids.dedup();
    }

    /// Toggle selection of a widget (for Shift+click multi-select)
    pub fn toggle(&mut self, id: WidgetId) {
        if let Some(pos) = self.ids.iter().position(|&x| x == id) {
            self.ids.remove(pos);
        } else {
            self.ids.push(id);
        }
    }

    pub fn add(&mut self, id: WidgetId) {
        if !self.ids.contains(&id) {
            self.ids.push(id);
        }
    }

    /// Makes `id` the reference element, selecting it if needed.
    pub fn make_reference(&mut self, id: WidgetId) {
        self.ids.retain(|x| *x != id);
        self.ids.insert(0, id);
    }

    pub fn remove(&mut self, id: WidgetId) {
        self.ids.retain(|x| *x != id);
    }

    pub fn retain(&mut self, keep: impl FnMut(&WidgetId) -> bool) {
        self.ids.retain(keep);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}
