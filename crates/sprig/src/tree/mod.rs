//! Component tree: nodes in a generational arena, addressed by [`NodeId`] and by client id.

mod arena;
mod node;

pub use arena::{Arena, NodeId};
pub use node::{ComponentNode, Listener, ListenerFn, ListenerKind, NodeKind, OutputState};

use rustc_hash::FxHashMap;

use crate::error::TreeError;
use crate::event::{EventQueue, FacesEvent};

/// A strict tree of components plus the event queue owned by its root.
pub struct ComponentTree {
    arena: Arena<ComponentNode>,
    root: NodeId,
    index: FxHashMap<String, NodeId>,
    events: EventQueue,
}

impl ComponentTree {
    pub fn new(root: ComponentNode) -> Self {
        let mut arena = Arena::new();
        let client_id = root.client_id.clone();
        let root = arena.alloc(root);
        let mut index = FxHashMap::default();
        index.insert(client_id, root);
        Self {
            arena,
            root,
            index,
            events: EventQueue::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn add_child(&mut self, parent: NodeId, node: ComponentNode) -> Result<NodeId, TreeError> {
        let id = self.attach(parent, node)?;
        if let Some(parent) = self.arena.get_mut(parent) {
            parent.children.push(id);
        }
        Ok(id)
    }

    /// Attach `node` as facet `name` of `parent`. An existing facet of that name is detached.
    pub fn add_facet(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        node: ComponentNode,
    ) -> Result<NodeId, TreeError> {
        let name = name.into();
        let previous = self.node(parent).ok_or(TreeError::UnknownNode(parent))?.facet(&name);
        if let Some(previous) = previous {
            self.detach(previous)?;
        }
        let id = self.attach(parent, node)?;
        if let Some(parent) = self.arena.get_mut(parent) {
            parent.facets.insert(name, id);
        }
        Ok(id)
    }

    fn attach(&mut self, parent: NodeId, mut node: ComponentNode) -> Result<NodeId, TreeError> {
        if !self.arena.is_valid(parent) {
            return Err(TreeError::UnknownNode(parent));
        }
        if self.index.contains_key(&node.client_id) {
            return Err(TreeError::DuplicateId(node.client_id));
        }
        node.parent = Some(parent);
        node.children.clear();
        node.facets.clear();
        let client_id = node.client_id.clone();
        let id = self.arena.alloc(node);
        self.index.insert(client_id, id);
        Ok(id)
    }

    /// Remove `id` and its whole subtree. Ids into the removed subtree stop resolving.
    pub fn detach(&mut self, id: NodeId) -> Result<(), TreeError> {
        if id == self.root {
            return Err(TreeError::RootDetach);
        }
        let parent = self.arena.get(id).ok_or(TreeError::UnknownNode(id))?.parent;
        if let Some(parent) = parent.and_then(|parent| self.arena.get_mut(parent)) {
            parent.children.retain(|child| *child != id);
            parent.facets.retain(|_, facet| *facet != id);
        }

        let mut pending = vec![id];
        let mut removed = 0usize;
        while let Some(next) = pending.pop() {
            if let Some(node) = self.arena.free(next) {
                self.index.remove(&node.client_id);
                pending.extend(node.facets.values().copied());
                pending.extend(node.children.iter().copied());
                removed += 1;
            }
        }
        log::trace!("detached {} node(s) starting at {}", removed, id);
        Ok(())
    }

    pub fn find(&self, client_id: &str) -> Option<NodeId> {
        self.index.get(client_id).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.is_valid(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&ComponentNode> {
        self.arena.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut ComponentNode> {
        self.arena.get_mut(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(ComponentNode::parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(ComponentNode::children).unwrap_or(&[])
    }

    /// Facets of `id` in insertion order.
    pub fn facets(&self, id: NodeId) -> impl Iterator<Item = (&str, NodeId)> {
        self.node(id)
            .into_iter()
            .flat_map(|node| node.facets.iter().map(|(name, id)| (name.as_str(), *id)))
    }

    /// Live nodes in slot order, not tree order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &ComponentNode)> {
        self.arena.iter()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn queue_event(&mut self, event: FacesEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> (ComponentTree, NodeId) {
        let mut tree = ComponentTree::new(ComponentNode::container("view"));
        let form = tree.add_child(tree.root(), ComponentNode::container("form")).unwrap();
        (tree, form)
    }

    #[test]
    fn children_keep_insertion_order() {
        let (mut tree, form) = form();
        let a = tree.add_child(form, ComponentNode::container("a")).unwrap();
        let b = tree.add_child(form, ComponentNode::container("b")).unwrap();

        assert_eq!(tree.children(form), &[a, b]);
        assert_eq!(tree.parent(b), Some(form));
        assert_eq!(tree.find("b"), Some(b));
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn duplicate_client_ids_are_rejected() {
        let (mut tree, form) = form();
        tree.add_child(form, ComponentNode::container("a")).unwrap();
        let err = tree.add_child(form, ComponentNode::container("a")).unwrap_err();
        assert_eq!(err, TreeError::DuplicateId("a".to_string()));
    }

    #[test]
    fn detach_frees_the_whole_subtree() {
        let (mut tree, form) = form();
        let inner = tree.add_child(form, ComponentNode::container("inner")).unwrap();
        let leaf = tree.add_child(inner, ComponentNode::container("leaf")).unwrap();
        let header = tree.add_facet(form, "header", ComponentNode::container("header")).unwrap();

        tree.detach(form).unwrap();

        for id in [form, inner, leaf, header] {
            assert!(!tree.contains(id));
        }
        assert_eq!(tree.find("leaf"), None);
        assert!(tree.children(tree.root()).is_empty());
        assert_eq!(tree.len(), 1);
        let live: Vec<_> = tree.nodes().map(|(id, node)| (id, node.client_id().to_string())).collect();
        assert_eq!(live, vec![(tree.root(), "view".to_string())]);

        // Freed client ids may be reused.
        tree.add_child(tree.root(), ComponentNode::container("leaf")).unwrap();
    }

    #[test]
    fn root_cannot_be_detached() {
        let (mut tree, _) = form();
        assert_eq!(tree.detach(tree.root()), Err(TreeError::RootDetach));
    }

    #[test]
    fn replacing_a_facet_detaches_the_old_one() {
        let (mut tree, form) = form();
        let first = tree.add_facet(form, "footer", ComponentNode::container("footer")).unwrap();
        let second = tree.add_facet(form, "footer", ComponentNode::container("footer")).unwrap();

        assert!(!tree.contains(first));
        assert_eq!(tree.facets(form).collect::<Vec<_>>(), vec![("footer", second)]);
    }
}
