//! Graph-level operations: duplication, renumbering, commenting out and
//! type-codename propagation along redirect chains

use std::collections::{BTreeMap, BTreeSet};

use glam::IVec2;
use log::debug;

use crate::error::GraphError;
use crate::nodes::graph::{NodeGraph, SelectedObj, TextBlock};
use crate::nodes::node::{NodeId, NodeKind, ProxyPayload};
use crate::nodes::port::{InputSocketId, OutputSocketId};
use crate::nodes::types::TypeCodename;

/// Sets the mirrored codename of a redirect node and, depth-first, of every
/// redirect fed by it
pub fn propagate_type_codename(graph: &mut NodeGraph, proxy_id: NodeId, codename: Option<TypeCodename>) {
    let Some(proxy) = graph.nodes.get_mut(&proxy_id).and_then(|node| node.as_proxy_mut()) else {
        return;
    };
    if proxy.payload != ProxyPayload::Redirect {
        return;
    }
    proxy.source_type_codename = codename;
    let output = OutputSocketId::new(proxy_id, &proxy.title);

    let descendants: Vec<NodeId> = graph
        .children_of(&output)
        .filter(|child| child.is_proxy())
        .map(|child| child.node_id)
        .collect();
    for descendant in descendants {
        propagate_type_codename(graph, descendant, codename);
    }
}

/// Copies the given nodes and text blocks, shifted by `offset`, with fresh
/// ids and no connections. The copies become the selection.
pub fn duplicate(
    graph: &mut NodeGraph,
    objects: &[SelectedObj],
    offset: IVec2,
) -> Result<Vec<SelectedObj>, GraphError> {
    let mut copies = Vec::with_capacity(objects.len());
    for object in objects {
        match *object {
            SelectedObj::Node(id) => {
                let mut node = graph.node(id).ok_or(GraphError::NodeNotFound(id))?.clone();
                node.id = graph.next_node_id();
                node.position += offset;
                match &mut node.kind {
                    NodeKind::Callable(callable) => {
                        for subparams in callable.subparams.values_mut() {
                            subparams.retain(|sub| sub.widget.is_some());
                        }
                    }
                    NodeKind::Proxy(proxy) if proxy.payload == ProxyPayload::Redirect => {
                        proxy.source_type_codename = None;
                    }
                    _ => {}
                }
                debug!("Duplicated node {} as {}", id, node.id);
                copies.push(SelectedObj::Node(graph.insert_node(node)?));
            }
            SelectedObj::TextBlock(index) => {
                let block = graph
                    .text_blocks
                    .get(index)
                    .ok_or_else(|| GraphError::SocketNotFound(format!("text block {}", index)))?;
                let copy = TextBlock::new(block.position + offset, block.text.clone());
                copies.push(SelectedObj::TextBlock(graph.add_text_block(copy)));
            }
        }
    }
    graph.selected_objs = copies.iter().copied().collect();
    Ok(copies)
}

/// Gives a node a new id; every connection and socket id follows
pub fn renumber(graph: &mut NodeGraph, old: NodeId, new: NodeId) -> Result<(), GraphError> {
    if !graph.nodes.contains_key(&old) {
        return Err(GraphError::NodeNotFound(old));
    }
    if old == new {
        return Ok(());
    }
    if graph.nodes.contains_key(&new) {
        return Err(GraphError::IdCollision(new));
    }

    if let Some(mut node) = graph.nodes.remove(&old) {
        node.id = new;
        graph.nodes.insert(new, node);
    }

    let rekey_input = |socket: &InputSocketId| {
        let mut socket = socket.clone();
        if socket.node_id == old {
            socket.node_id = new;
        }
        socket
    };
    let rekey_output = |socket: &OutputSocketId| {
        let mut socket = socket.clone();
        if socket.node_id == old {
            socket.node_id = new;
        }
        socket
    };

    graph.connections = graph
        .connections
        .iter()
        .map(|(child, parent)| (rekey_input(child), rekey_output(parent)))
        .collect();
    graph.children = graph
        .children
        .iter()
        .map(|(parent, children)| {
            (
                rekey_output(parent),
                children.iter().map(rekey_input).collect::<BTreeSet<_>>(),
            )
        })
        .collect::<BTreeMap<_, _>>();
    if graph.selected_objs.remove(&SelectedObj::Node(old)) {
        graph.selected_objs.insert(SelectedObj::Node(new));
    }
    debug!("Renumbered node {} to {}", old, new);
    Ok(())
}

/// Toggles whether the engine skips the node; connections are kept
pub fn set_commented_out(graph: &mut NodeGraph, id: NodeId, commented_out: bool) -> Result<(), GraphError> {
    let node = graph.node_mut(id).ok_or(GraphError::NodeNotFound(id))?;
    node.commented_out = commented_out;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Value;
    use crate::nodes::node::Node;
    use crate::nodes::widgets::Widget;

    fn chain() -> NodeGraph {
        let mut graph = NodeGraph::new();
        let widget = Widget::literal_entry(Value::Int(3)).unwrap();
        graph.insert_node(Node::data(0, "value", widget)).unwrap();
        graph.insert_node(Node::operator(1, "-a").unwrap()).unwrap();
        graph
            .connect(OutputSocketId::new(0, "value"), InputSocketId::param(1, "a"))
            .unwrap();
        graph
    }

    #[test]
    fn test_duplicate_has_no_connections() {
        let mut graph = chain();
        graph.add_text_block(TextBlock::new(IVec2::new(5, 5), "note"));
        let copies = duplicate(
            &mut graph,
            &[SelectedObj::Node(1), SelectedObj::TextBlock(0)],
            IVec2::new(20, 20),
        )
        .unwrap();
        assert_eq!(copies, [SelectedObj::Node(2), SelectedObj::TextBlock(1)]);
        assert_eq!(graph.node(2).unwrap().position, IVec2::new(20, 20));
        assert_eq!(graph.text_blocks[1].position, IVec2::new(25, 25));
        assert!(graph.upstream_nodes(2).is_empty());
        assert_eq!(graph.connection_count(), 1);
        assert_eq!(graph.selected_objs().len(), 2);
    }

    #[test]
    fn test_renumber_rekeys_connections() {
        let mut graph = chain();
        assert_eq!(renumber(&mut graph, 0, 1), Err(GraphError::IdCollision(1)));
        renumber(&mut graph, 0, 7).unwrap();
        assert_eq!(
            graph.parent_of(&InputSocketId::param(1, "a")),
            Some(&OutputSocketId::new(7, "value"))
        );
        assert!(graph.has_children(&OutputSocketId::new(7, "value")));
        assert_eq!(graph.node(7).unwrap().id, 7);
        assert!(graph.node(0).is_none());
    }

    #[test]
    fn test_comment_out_keeps_connections() {
        let mut graph = chain();
        set_commented_out(&mut graph, 0, true).unwrap();
        assert!(graph.node(0).unwrap().commented_out);
        assert_eq!(graph.connection_count(), 1);
    }
}
