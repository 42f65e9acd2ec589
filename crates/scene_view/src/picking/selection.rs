//! Selection id allocation and selection flags

use std::collections::BTreeMap;

use super::{PickingError, SelectionId};
use crate::scene::{NodeId, NodeTree};

/// How a pick result changes the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Replace current selection (default)
    #[default]
    Replace,
    /// Add to current selection (Ctrl)
    Add,
    /// Remove from current selection (Shift)
    Remove,
}

impl SelectionMode {
    /// Mode implied by the held modifier keys; Shift wins over Ctrl
    pub fn from_modifiers(ctrl: bool, shift: bool) -> Self {
        match (ctrl, shift) {
            (_, true) => SelectionMode::Remove,
            (true, false) => SelectionMode::Add,
            (false, false) => SelectionMode::Replace,
        }
    }
}

/// Who owns each id, which ids are selected, and the current one
///
/// The id to node map keeps entries for removed nodes: an id always means
/// the same node, and lookups through a [`NodeTree`] report it as gone.
#[derive(Debug, Clone)]
pub struct SelectionState {
    objects: BTreeMap<SelectionId, NodeId>,
    selected: BTreeMap<SelectionId, bool>,
    current: Option<SelectionId>,
    next_id: Option<u32>,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::new(1)
    }
}

impl SelectionState {
    /// Create a state whose first id is `base`
    pub fn new(base: u32) -> Self {
        Self {
            objects: BTreeMap::new(),
            selected: BTreeMap::new(),
            current: None,
            next_id: Some(base),
        }
    }

    /// Hand out the next id and record its node
    pub fn alloc(&mut self, node: NodeId) -> Result<SelectionId, PickingError> {
        let id = self.next_id.ok_or(PickingError::Exhausted)?;
        self.next_id = id.checked_add(1);
        let id = SelectionId(id);
        self.objects.insert(id, node);
        log::trace!("allocated selection id {} for {:?}", id, node);
        Ok(id)
    }

    /// Number of ids handed out so far
    pub fn allocated(&self) -> usize {
        self.objects.len()
    }

    /// Node recorded for `id`, live or not
    pub fn object(&self, id: SelectionId) -> Option<NodeId> {
        self.objects.get(&id).copied()
    }

    /// Node recorded for `id` if it is still in `tree`
    pub fn live_object(&self, id: SelectionId, tree: &NodeTree) -> Option<NodeId> {
        self.object(id).filter(|node| tree.contains(*node))
    }

    /// True when `id` is flagged selected
    pub fn is_selected(&self, id: SelectionId) -> bool {
        self.selected.get(&id).copied().unwrap_or(false)
    }

    /// Flag `id` selected and make it current
    pub fn set_selected(&mut self, id: SelectionId) {
        self.selected.insert(id, true);
        self.current = Some(id);
    }

    /// Clear the flag of `id`; it stops being current
    pub fn unselect(&mut self, id: SelectionId) {
        self.selected.insert(id, false);
        if self.current == Some(id) {
            self.current = None;
        }
    }

    /// Current selection id
    pub fn selected_id(&self) -> Option<SelectionId> {
        self.current
    }

    /// All ids flagged selected, ascending
    pub fn selected_ids(&self) -> impl Iterator<Item = SelectionId> + '_ {
        self.selected.iter().filter(|(_, on)| **on).map(|(id, _)| *id)
    }

    /// Clear every flag and the current id
    pub fn clear_selection(&mut self) {
        self.selected.clear();
        self.current = None;
    }

    /// Fold a pick result into the selection
    pub fn apply(&mut self, hit: Option<SelectionId>, mode: SelectionMode) {
        match (mode, hit) {
            (SelectionMode::Replace, Some(id)) => {
                self.clear_selection();
                self.set_selected(id);
            }
            (SelectionMode::Replace, None) => self.clear_selection(),
            (SelectionMode::Add, Some(id)) => self.set_selected(id),
            (SelectionMode::Remove, Some(id)) => self.unselect(id),
            (SelectionMode::Add | SelectionMode::Remove, None) => {}
        }
    }

    /// Drop flags whose nodes are gone; ids stay allocated
    pub fn prune(&mut self, tree: &NodeTree) {
        let objects = &self.objects;
        self.selected
            .retain(|id, _| objects.get(id).is_some_and(|node| tree.contains(*node)));
        if let Some(current) = self.current {
            if !self.selected.contains_key(&current) {
                self.current = None;
            }
        }
    }

    /// Forget flags and ownership; the counter keeps going
    pub fn reset(&mut self) {
        self.objects.clear();
        self.clear_selection();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneNode;

    fn tree_with(n: usize) -> (NodeTree, Vec<NodeId>) {
        let mut tree = NodeTree::new();
        let ids = (0..n)
            .map(|i| tree.add_child(tree.root(), SceneNode::new(format!("n{i}"))).unwrap())
            .collect();
        (tree, ids)
    }

    #[test]
    fn test_ids_strictly_increase_from_base() {
        let (_, nodes) = tree_with(5);
        let mut state = SelectionState::new(1);
        let ids: Vec<_> = nodes.iter().map(|n| state.alloc(*n).unwrap()).collect();
        assert_eq!(ids, (1..=5).map(SelectionId).collect::<Vec<_>>());
    }

    #[test]
    fn test_removed_node_id_not_reused() {
        let (mut tree, nodes) = tree_with(2);
        let mut state = SelectionState::default();
        let first = state.alloc(nodes[0]).unwrap();
        tree.remove(nodes[0]).unwrap();

        let second = state.alloc(nodes[1]).unwrap();
        assert!(second > first);
        assert_eq!(state.object(first), Some(nodes[0]));
        assert_eq!(state.live_object(first, &tree), None);
        assert_eq!(state.live_object(second, &tree), Some(nodes[1]));
    }

    #[test]
    fn test_exhausted_id_space() {
        let (_, nodes) = tree_with(1);
        let mut state = SelectionState::new(u32::MAX);
        assert_eq!(state.alloc(nodes[0]), Ok(SelectionId(u32::MAX)));
        assert_eq!(state.alloc(nodes[0]), Err(PickingError::Exhausted));
    }

    #[test]
    fn test_selection_modes() {
        let mut state = SelectionState::default();
        let (a, b) = (SelectionId(1), SelectionId(2));

        state.apply(Some(a), SelectionMode::Replace);
        state.apply(Some(b), SelectionMode::Add);
        assert!(state.is_selected(a) && state.is_selected(b));
        assert_eq!(state.selected_id(), Some(b));

        state.apply(Some(b), SelectionMode::Remove);
        assert!(!state.is_selected(b));
        assert_eq!(state.selected_id(), None);

        state.apply(Some(b), SelectionMode::Replace);
        assert!(!state.is_selected(a));
        assert_eq!(state.selected_ids().collect::<Vec<_>>(), vec![b]);

        state.apply(None, SelectionMode::Replace);
        assert_eq!(state.selected_id(), None);
        assert_eq!(state.selected_ids().count(), 0);
    }

    #[test]
    fn test_modifier_mapping() {
        assert_eq!(SelectionMode::from_modifiers(false, false), SelectionMode::Replace);
        assert_eq!(SelectionMode::from_modifiers(true, false), SelectionMode::Add);
        assert_eq!(SelectionMode::from_modifiers(true, true), SelectionMode::Remove);
    }

    #[test]
    fn test_prune_drops_dead_selection() {
        let (mut tree, nodes) = tree_with(2);
        let mut state = SelectionState::default();
        let a = state.alloc(nodes[0]).unwrap();
        let b = state.alloc(nodes[1]).unwrap();
        state.set_selected(b);
        state.set_selected(a);
        tree.remove(nodes[0]).unwrap();

        state.prune(&tree);
        assert!(!state.is_selected(a));
        assert!(state.is_selected(b));
        assert_eq!(state.selected_id(), None);
    }
}
