//! Node graph data structures and operations
//!
//! The graph owns every node and text block plus the connection set. A
//! connection is stored as `child input -> parent output` since inputs have
//! at most one parent; the reverse map of children per output is kept next
//! to it so both directions answer in one lookup.

use std::collections::{BTreeMap, BTreeSet};

use glam::IVec2;
use log::debug;

use crate::error::GraphError;
use crate::nodes::hooks::SegmentHandling;
use crate::nodes::node::{Node, NodeId, NodeMode, ProxyPayload};
use crate::nodes::operations::propagate_type_codename;
use crate::nodes::port::{ChildSocket, InputSocketId, OutputSocketId};
use crate::nodes::widgets::Widget;

/// Free-floating comment on the canvas
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub position: IVec2,
    pub text: String,
}

impl TextBlock {
    pub fn new(position: IVec2, text: impl Into<String>) -> Self {
        Self {
            position,
            text: text.into(),
        }
    }
}

/// Something the editor can select
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SelectedObj {
    Node(NodeId),
    TextBlock(usize),
}

/// A graph containing nodes, text blocks and their connections
#[derive(Debug, Clone, Default)]
pub struct NodeGraph {
    pub(crate) nodes: BTreeMap<NodeId, Node>,
    pub text_blocks: Vec<TextBlock>,
    /// Child input -> parent output
    pub(crate) connections: BTreeMap<InputSocketId, OutputSocketId>,
    /// Parent output -> child inputs, derived from `connections`
    pub(crate) children: BTreeMap<OutputSocketId, BTreeSet<InputSocketId>>,
    pub(crate) selected_objs: BTreeSet<SelectedObj>,
}

impl NodeGraph {
    /// Creates a new empty node graph
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Mutable access for edits that don't touch sockets (position, widgets)
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn selected_objs(&self) -> &BTreeSet<SelectedObj> {
        &self.selected_objs
    }

    pub fn select(&mut self, obj: SelectedObj) {
        self.selected_objs.insert(obj);
    }

    pub fn clear_selection(&mut self) {
        self.selected_objs.clear();
    }

    /// Smallest id not used by any node
    pub fn next_node_id(&self) -> NodeId {
        (0..)
            .find(|id| !self.nodes.contains_key(id))
            .unwrap_or(self.nodes.len())
    }

    /// Adds a node under its own id
    pub fn insert_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        let id = node.id;
        if self.nodes.contains_key(&id) {
            return Err(GraphError::IdCollision(id));
        }
        debug!("Inserting node {} ({})", id, node.title_text());
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Severs every connection of the node, then removes it
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, GraphError> {
        if !self.nodes.contains_key(&id) {
            return Err(GraphError::NodeNotFound(id));
        }
        self.sever_all_connections(id);
        self.selected_objs.remove(&SelectedObj::Node(id));
        debug!("Removing node {}", id);
        self.nodes.remove(&id).ok_or(GraphError::NodeNotFound(id))
    }

    pub fn add_text_block(&mut self, block: TextBlock) -> usize {
        self.text_blocks.push(block);
        self.text_blocks.len() - 1
    }

    pub fn remove_text_block(&mut self, index: usize) -> Option<TextBlock> {
        if index >= self.text_blocks.len() {
            return None;
        }
        self.selected_objs.remove(&SelectedObj::TextBlock(index));
        Some(self.text_blocks.remove(index))
    }

    pub fn parent_of(&self, socket: &InputSocketId) -> Option<&OutputSocketId> {
        self.connections.get(socket)
    }

    pub fn has_parent(&self, socket: &InputSocketId) -> bool {
        self.connections.contains_key(socket)
    }

    pub fn has_children(&self, socket: &OutputSocketId) -> bool {
        self.children.contains_key(socket)
    }

    pub fn children_of(&self, socket: &OutputSocketId) -> impl Iterator<Item = &InputSocketId> {
        self.children.get(socket).into_iter().flatten()
    }

    /// Every connection as `(parent, child)`, ordered by child
    pub fn connections(&self) -> impl Iterator<Item = (&OutputSocketId, &InputSocketId)> {
        self.connections.iter().map(|(child, parent)| (parent, child))
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Nodes feeding `id` directly
    pub fn upstream_nodes(&self, id: NodeId) -> BTreeSet<NodeId> {
        self.connections
            .iter()
            .filter(|(child, _)| child.node_id == id)
            .map(|(_, parent)| parent.node_id)
            .collect()
    }

    /// Nodes fed by `id` directly
    pub fn downstream_nodes(&self, id: NodeId) -> BTreeSet<NodeId> {
        self.connections
            .iter()
            .filter(|(_, parent)| parent.node_id == id)
            .map(|(child, _)| child.node_id)
            .collect()
    }

    /// Whether `target` can be reached by following connections from `from`
    pub fn reaches(&self, from: NodeId, target: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = BTreeSet::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if seen.insert(id) {
                stack.extend(self.downstream_nodes(id));
            }
        }
        false
    }

    /// Connects an output to an input, or to a placeholder which then
    /// materializes a new subparameter. Returns the child input socket.
    pub fn connect(
        &mut self,
        parent: OutputSocketId,
        child: impl Into<ChildSocket>,
    ) -> Result<InputSocketId, GraphError> {
        let child = child.into();
        let parent_node = self
            .nodes
            .get(&parent.node_id)
            .ok_or(GraphError::NodeNotFound(parent.node_id))?;
        if !parent_node.has_output_socket(&parent) {
            return Err(GraphError::SocketNotFound(parent.to_string()));
        }
        let child_id = child.node_id();
        let child_node = self
            .nodes
            .get(&child_id)
            .ok_or(GraphError::NodeNotFound(child_id))?;
        if child_id == parent.node_id {
            return Err(GraphError::SameNodeConnection(child_id));
        }
        match &child {
            ChildSocket::Input(socket) => {
                if !child_node.has_input_socket(socket) {
                    return Err(GraphError::SocketNotFound(socket.to_string()));
                }
                if self.has_parent(socket) {
                    return Err(GraphError::AlreadyParented(socket.to_string()));
                }
            }
            ChildSocket::Placeholder(placeholder) => {
                if !child_node.has_placeholder(placeholder) {
                    return Err(GraphError::SocketNotFound(placeholder.to_string()));
                }
            }
        }
        if self.reaches(child_id, parent.node_id) {
            return Err(GraphError::CycleIntroduced {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }

        let socket = match child {
            ChildSocket::Input(socket) => socket,
            ChildSocket::Placeholder(placeholder) => {
                let callable = self
                    .nodes
                    .get_mut(&child_id)
                    .and_then(Node::as_callable_mut)
                    .ok_or_else(|| GraphError::SocketNotFound(placeholder.to_string()))?;
                let index = callable.add_subparam(&placeholder.param_name, None)?;
                InputSocketId::subparam(child_id, &placeholder.param_name, index)
            }
        };

        debug!("Connecting {} -> {}", parent, socket);
        self.connections.insert(socket.clone(), parent.clone());
        self.children.entry(parent.clone()).or_default().insert(socket.clone());

        if let Some(node) = self.nodes.get_mut(&child_id) {
            node.on_connection(&socket);
        }
        if socket.is_proxy() {
            let codename = self
                .nodes
                .get(&parent.node_id)
                .map(|node| node.output_type_codename(&parent.output_name));
            propagate_type_codename(self, child_id, codename);
        }
        Ok(socket)
    }

    /// Removes the parent of `child`, if any. Returns the former parent.
    pub fn sever(&mut self, child: &InputSocketId) -> Option<OutputSocketId> {
        let parent = self.connections.remove(child)?;
        self.remove_child_entry(&parent, child);
        debug!("Severed {} -> {}", parent, child);

        let dissolved = self
            .nodes
            .get_mut(&child.node_id)
            .and_then(|node| node.on_severance(child));
        if let (Some(index), Some(param)) = (dissolved, child.param_name()) {
            self.compact_subparams(child.node_id, param, index);
        }
        if child.is_proxy() {
            propagate_type_codename(self, child.node_id, None);
        }
        Some(parent)
    }

    /// Severs every connection that has the node on either end
    pub fn sever_all_connections(&mut self, id: NodeId) {
        loop {
            let next = self
                .connections
                .iter()
                .find(|(child, parent)| child.node_id == id || parent.node_id == id)
                .map(|(child, _)| child.clone());
            match next {
                Some(child) => {
                    self.sever(&child);
                }
                None => break,
            }
        }
    }

    /// Moves the connection stored under `old_id` to `new_id`
    pub fn fix_input_socket_id(&mut self, new_id: InputSocketId, old_id: &InputSocketId) {
        let Some(parent) = self.connections.remove(old_id) else {
            return;
        };
        self.remove_child_entry(&parent, old_id);
        self.children.entry(parent.clone()).or_default().insert(new_id.clone());
        self.connections.insert(new_id, parent);
    }

    /// Moves the children stored under `old_id` to `new_id`
    pub fn fix_output_socket_id(&mut self, new_id: OutputSocketId, old_id: &OutputSocketId) {
        let Some(children) = self.children.remove(old_id) else {
            return;
        };
        for child in &children {
            self.connections.insert(child.clone(), new_id.clone());
        }
        self.children.insert(new_id, children);
    }

    /// Switches a node's mode; every connection of the node is severed first
    pub fn set_mode(&mut self, id: NodeId, mode: NodeMode) -> Result<(), GraphError> {
        let node = self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))?;
        if !node.supports_mode(mode) {
            return Err(GraphError::ModeNotSupported {
                node_id: id,
                mode: mode.to_string(),
            });
        }
        if node.mode == mode {
            return Ok(());
        }
        self.sever_all_connections(id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.on_mode_change(mode);
        }
        Ok(())
    }

    /// Renames a proxy node; its output socket follows the new title
    pub fn set_proxy_title(&mut self, id: NodeId, title: &str) -> Result<(), GraphError> {
        let proxy = self
            .nodes
            .get_mut(&id)
            .ok_or(GraphError::NodeNotFound(id))?
            .as_proxy_mut()
            .ok_or_else(|| GraphError::SocketNotFound(format!("proxy socket of node {}", id)))?;
        let old = OutputSocketId::new(id, &proxy.title);
        proxy.title = title.to_string();
        self.fix_output_socket_id(OutputSocketId::new(id, title), &old);
        Ok(())
    }

    /// Materializes a subparameter holding `widget`; returns its index
    pub fn add_subparam_widget(
        &mut self,
        id: NodeId,
        param: &str,
        widget: Widget,
    ) -> Result<usize, GraphError> {
        self.nodes
            .get_mut(&id)
            .ok_or(GraphError::NodeNotFound(id))?
            .as_callable_mut()
            .ok_or_else(|| GraphError::SocketNotFound(format!("({}, {})", id, param)))?
            .add_subparam(param, Some(widget))
    }

    /// Removes the widget of a subparameter; the subparameter itself is
    /// dissolved when its socket has no parent
    pub fn remove_subparam_widget(
        &mut self,
        id: NodeId,
        param: &str,
        index: usize,
    ) -> Result<Option<Widget>, GraphError> {
        let socket = InputSocketId::subparam(id, param, index);
        let parented = self.has_parent(&socket);
        let callable = self
            .nodes
            .get_mut(&id)
            .ok_or(GraphError::NodeNotFound(id))?
            .as_callable_mut()
            .ok_or_else(|| GraphError::SocketNotFound(socket.to_string()))?;
        if callable.subparam(param, index).is_none() {
            return Err(GraphError::SocketNotFound(socket.to_string()));
        }
        if parented {
            let widget = callable
                .subparams
                .get_mut(param)
                .and_then(|subparams| subparams.get_mut(index))
                .and_then(|sub| sub.widget.take());
            return Ok(widget);
        }
        let removed = callable.remove_subparam(param, index);
        self.compact_subparams(id, param, index);
        Ok(removed.and_then(|sub| sub.widget))
    }

    /// Re-keys connections of the subparameters that followed a removed one
    fn compact_subparams(&mut self, id: NodeId, param: &str, removed: usize) {
        let mut shifted: Vec<usize> = self
            .connections
            .keys()
            .filter(|socket| socket.node_id == id && socket.param_name() == Some(param))
            .filter_map(InputSocketId::subparam_index)
            .filter(|index| *index > removed)
            .collect();
        shifted.sort_unstable();
        for index in shifted {
            self.fix_input_socket_id(
                InputSocketId::subparam(id, param, index - 1),
                &InputSocketId::subparam(id, param, index),
            );
        }
    }

    fn remove_child_entry(&mut self, parent: &OutputSocketId, child: &InputSocketId) {
        if let Some(children) = self.children.get_mut(parent) {
            children.remove(child);
            if children.is_empty() {
                self.children.remove(parent);
            }
        }
    }

    /// Whether following redirects upstream from `id` ends at a node that
    /// produces data
    pub fn proxy_has_source(&self, id: NodeId) -> bool {
        let mut current = id;
        for _ in 0..=self.nodes.len() {
            let Some(node) = self.nodes.get(&current) else {
                return false;
            };
            match node.as_proxy().map(|proxy| &proxy.payload) {
                Some(ProxyPayload::Data(_)) | None => return true,
                Some(ProxyPayload::Redirect) => {
                    match self.parent_of(&InputSocketId::proxy(current)) {
                        Some(parent) => current = parent.node_id,
                        None => return false,
                    }
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Value;
    use crate::nodes::port::PlaceholderSocket;
    use crate::nodes::types::TypeCodename;
    use crate::nodes::{CallableKind, CallableRegistry};

    fn data(id: NodeId, value: i64) -> Node {
        Node::data(id, "value", Widget::literal_entry(Value::Int(value)).unwrap())
    }

    fn capsule(id: NodeId, name: &str) -> Node {
        let registry = CallableRegistry::with_defaults();
        crate::nodes::test_support::registry_node(&registry, id, CallableKind::Capsule, name)
    }

    fn add_graph() -> NodeGraph {
        let mut graph = NodeGraph::new();
        graph.insert_node(data(0, 3)).unwrap();
        graph.insert_node(data(1, 4)).unwrap();
        graph.insert_node(Node::operator(2, "a + b").unwrap()).unwrap();
        graph
            .connect(OutputSocketId::new(0, "value"), InputSocketId::param(2, "a"))
            .unwrap();
        graph
            .connect(OutputSocketId::new(1, "value"), InputSocketId::param(2, "b"))
            .unwrap();
        graph
    }

    #[test]
    fn test_insert_and_id_allocation() {
        let mut graph = add_graph();
        assert_eq!(graph.next_node_id(), 3);
        assert_eq!(graph.insert_node(data(1, 0)), Err(GraphError::IdCollision(1)));
        graph.remove_node(0).unwrap();
        assert_eq!(graph.next_node_id(), 0);
        assert_eq!(graph.connection_count(), 1);
    }

    #[test]
    fn test_connect_rejections() {
        let mut graph = add_graph();
        graph.insert_node(Node::operator(3, "-a").unwrap()).unwrap();

        let result = graph.connect(OutputSocketId::new(0, "value"), InputSocketId::param(2, "a"));
        assert!(matches!(result, Err(GraphError::AlreadyParented(_))));

        let result = graph.connect(OutputSocketId::new(3, "output"), InputSocketId::param(3, "a"));
        assert_eq!(result, Err(GraphError::SameNodeConnection(3)));

        graph
            .connect(OutputSocketId::new(2, "output"), InputSocketId::param(3, "a"))
            .unwrap();
        graph.sever(&InputSocketId::param(2, "b"));
        let result = graph.connect(OutputSocketId::new(3, "output"), InputSocketId::param(2, "b"));
        assert!(matches!(result, Err(GraphError::CycleIntroduced { .. })));

        let result = graph.connect(OutputSocketId::new(0, "nothing"), InputSocketId::param(2, "b"));
        assert!(matches!(result, Err(GraphError::SocketNotFound(_))));
    }

    #[test]
    fn test_sever_is_idempotent() {
        let mut graph = add_graph();
        let child = InputSocketId::param(2, "a");
        assert_eq!(graph.sever(&child), Some(OutputSocketId::new(0, "value")));
        assert_eq!(graph.sever(&child), None);
        assert!(!graph.has_children(&OutputSocketId::new(0, "value")));
    }

    #[test]
    fn test_placeholder_materializes_and_severance_dissolves() {
        let mut graph = NodeGraph::new();
        graph.insert_node(data(0, 1)).unwrap();
        graph.insert_node(data(1, 2)).unwrap();
        graph.insert_node(capsule(2, "tuple_from_args")).unwrap();

        let first = graph
            .connect(OutputSocketId::new(0, "value"), PlaceholderSocket::new(2, "args"))
            .unwrap();
        let second = graph
            .connect(OutputSocketId::new(1, "value"), PlaceholderSocket::new(2, "args"))
            .unwrap();
        assert_eq!(first, InputSocketId::subparam(2, "args", 0));
        assert_eq!(second, InputSocketId::subparam(2, "args", 1));

        graph.sever(&first);
        let callable = graph.node(2).unwrap().as_callable().unwrap();
        assert_eq!(callable.subparams("args").len(), 1);
        assert_eq!(
            graph.parent_of(&InputSocketId::subparam(2, "args", 0)),
            Some(&OutputSocketId::new(1, "value"))
        );
        assert!(graph.children_of(&OutputSocketId::new(1, "value")).eq([&InputSocketId::subparam(2, "args", 0)]));
    }

    #[test]
    fn test_subparam_with_widget_survives_severance() {
        let mut graph = NodeGraph::new();
        graph.insert_node(data(0, 1)).unwrap();
        graph.insert_node(capsule(1, "tuple_from_args")).unwrap();
        graph
            .add_subparam_widget(1, "args", Widget::literal_entry(Value::Int(5)).unwrap())
            .unwrap();
        graph
            .connect(OutputSocketId::new(0, "value"), InputSocketId::subparam(1, "args", 0))
            .unwrap();
        graph.sever(&InputSocketId::subparam(1, "args", 0));
        assert_eq!(graph.node(1).unwrap().widget_value("args", Some(0)), Some(&Value::Int(5)));

        let widget = graph.remove_subparam_widget(1, "args", 0).unwrap();
        assert!(widget.is_some());
        assert!(graph.node(1).unwrap().as_callable().unwrap().subparams("args").is_empty());
    }

    #[test]
    fn test_redirect_codename_propagates() {
        let mut graph = NodeGraph::new();
        let text = crate::literal::parse_literal(
            "{'widget_name': 'string_entry', 'widget_kwargs': {'value': 'hi'}}",
        )
        .unwrap();
        graph
            .insert_node(Node::data(0, "text", Widget::from_data(&text).unwrap()))
            .unwrap();
        graph.insert_node(Node::redirect(1, "r1")).unwrap();
        graph.insert_node(Node::redirect(2, "r2")).unwrap();
        graph
            .connect(OutputSocketId::new(1, "r1"), InputSocketId::proxy(2))
            .unwrap();
        graph
            .connect(OutputSocketId::new(0, "text"), InputSocketId::proxy(1))
            .unwrap();
        let codename = |graph: &NodeGraph, id| graph.node(id).unwrap().as_proxy().unwrap().source_type_codename;
        assert_eq!(codename(&graph, 2), Some(TypeCodename::Str));

        graph.sever(&InputSocketId::proxy(1));
        assert_eq!(codename(&graph, 1), None);
        assert_eq!(codename(&graph, 2), None);
        assert!(!graph.proxy_has_source(2));
    }

    #[test]
    fn test_mode_change_severs() {
        let mut graph = add_graph();
        graph.set_mode(2, NodeMode::Callable).unwrap();
        assert_eq!(graph.connection_count(), 0);
        let result = graph.set_mode(0, NodeMode::Callable);
        assert!(matches!(result, Err(GraphError::ModeNotSupported { .. })));
    }

    #[test]
    fn test_proxy_title_rekeys_output() {
        let mut graph = add_graph();
        graph.set_proxy_title(0, "three").unwrap();
        assert_eq!(
            graph.parent_of(&InputSocketId::param(2, "a")),
            Some(&OutputSocketId::new(0, "three"))
        );
        assert!(graph.has_children(&OutputSocketId::new(0, "three")));
    }
}
