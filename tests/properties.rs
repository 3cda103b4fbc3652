//! Graph invariants under arbitrary edit sequences

use std::collections::BTreeMap;

use proptest::prelude::*;

use nodezator::editor::Document;
use nodezator::literal::Value;
use nodezator::nodes::{
    CallableKind, CallableRegistry, CallableSource, ExecutionEngine, InputSocketId, Node, NodeFactory, NodeGraph,
    OutputSocketId, PlaceholderSocket, Widget,
};
use nodezator::plugins::NodePackRegistry;

fn factory() -> NodeFactory {
    NodeFactory::new(CallableRegistry::with_defaults(), NodePackRegistry::with_search_dirs(Vec::new()))
}

fn document_text(graph: &NodeGraph) -> String {
    let mut document = Document::new(8);
    document.graph = graph.clone();
    document.to_text()
}

#[derive(Debug, Clone)]
enum SubparamEdit {
    AddWidget(i64),
    Connect,
    Sever(usize),
    RemoveWidget(usize),
}

fn subparam_edit() -> impl Strategy<Value = SubparamEdit> {
    prop_oneof![
        any::<i64>().prop_map(SubparamEdit::AddWidget),
        Just(SubparamEdit::Connect),
        (0usize..6).prop_map(SubparamEdit::Sever),
        (0usize..6).prop_map(SubparamEdit::RemoveWidget),
    ]
}

proptest! {
    #[test]
    fn subparam_indices_stay_contiguous(edits in prop::collection::vec(subparam_edit(), 0..24)) {
        let mut factory = factory();
        let mut graph = NodeGraph::new();
        graph.insert_node(Node::data(0, "source", Widget::literal_entry(Value::Int(1)).unwrap())).unwrap();
        let node = factory
            .callable_node(1, CallableSource::Registry(CallableKind::Capsule, "list_from_args".to_string()))
            .unwrap();
        graph.insert_node(node).unwrap();

        for edit in edits {
            match edit {
                SubparamEdit::AddWidget(value) => {
                    graph.add_subparam_widget(1, "args", Widget::literal_entry(Value::Int(value)).unwrap()).unwrap();
                }
                SubparamEdit::Connect => {
                    graph.connect(OutputSocketId::new(0, "source"), PlaceholderSocket::new(1, "args")).unwrap();
                }
                SubparamEdit::Sever(index) => {
                    graph.sever(&InputSocketId::subparam(1, "args", index));
                }
                SubparamEdit::RemoveWidget(index) => {
                    let _ = graph.remove_subparam_widget(1, "args", index);
                }
            }

            let len = graph.node(1).and_then(Node::as_callable).unwrap().subparams("args").len();
            for (_, child) in graph.connections() {
                if let Some(index) = child.subparam_index() {
                    prop_assert!(index < len);
                }
            }
            // a subparameter with neither widget nor parent does not survive
            for (index, subparam) in graph.node(1).and_then(Node::as_callable).unwrap().subparams("args").iter().enumerate() {
                prop_assert!(subparam.widget.is_some() || graph.has_parent(&InputSocketId::subparam(1, "args", index)));
            }
        }

        let report = ExecutionEngine::new().run(&graph, None);
        prop_assert!(report.is_success());
    }

    #[test]
    fn connections_keep_single_parents_and_topological_order(
        pairs in prop::collection::vec((0usize..8, 0usize..8, any::<bool>()), 0..40)
    ) {
        let mut graph = NodeGraph::new();
        for id in 0..8 {
            graph.insert_node(Node::operator(id, "a + b").unwrap()).unwrap();
        }
        let mut accepted = 0;
        for (parent, child, first) in pairs {
            let param = if first { "a" } else { "b" };
            let socket = InputSocketId::param(child, param);
            let had_parent = graph.has_parent(&socket);
            match graph.connect(OutputSocketId::new(parent, "output"), socket.clone()) {
                Ok(_) => {
                    prop_assert!(!had_parent);
                    accepted += 1;
                }
                Err(_) => prop_assert_eq!(graph.has_parent(&socket), had_parent),
            }
        }
        prop_assert_eq!(graph.connection_count(), accepted);

        let mut parents = BTreeMap::new();
        for (parent, child) in graph.connections() {
            prop_assert!(parents.insert(child.clone(), parent.clone()).is_none());
            let children: Vec<_> = graph.children_of(parent).collect();
            let mut deduped = children.clone();
            deduped.dedup();
            prop_assert_eq!(children.len(), deduped.len());
        }

        let order = ExecutionEngine::execution_order(&graph, None).unwrap();
        prop_assert_eq!(order.len(), 8);
        let position = |id| order.iter().position(|other| *other == id).unwrap();
        for (parent, child) in graph.connections() {
            prop_assert!(position(parent.node_id) < position(child.node_id));
        }
    }

    #[test]
    fn connect_then_sever_restores_graph(
        chain in 1usize..5,
        value in -1000i64..1000,
        target in 0usize..5,
    ) {
        let mut graph = NodeGraph::new();
        graph.insert_node(Node::data(0, "value", Widget::literal_entry(Value::Int(value)).unwrap())).unwrap();
        for id in 1..=chain {
            graph.insert_node(Node::redirect(id, &format!("r{}", id))).unwrap();
            if id > 1 {
                graph.connect(OutputSocketId::new(id - 1, &format!("r{}", id - 1)), InputSocketId::proxy(id)).unwrap();
            }
        }
        graph.insert_node(Node::operator(chain + 1, "-a").unwrap()).unwrap();
        graph.connect(OutputSocketId::new(chain, &format!("r{}", chain)), InputSocketId::param(chain + 1, "a")).unwrap();

        let before = document_text(&graph);
        let target = 1 + target % chain;
        if target == 1 {
            graph.connect(OutputSocketId::new(0, "value"), InputSocketId::proxy(1)).unwrap();
            prop_assert_ne!(document_text(&graph), before.clone());
            let report = ExecutionEngine::new().run(&graph, None);
            prop_assert_eq!(report.result(chain + 1), Some(&Value::Int(-value)));
            graph.sever(&InputSocketId::proxy(1));
        } else {
            let parent = graph.sever(&InputSocketId::proxy(target)).unwrap();
            let severed = document_text(&graph);
            graph.connect(parent, InputSocketId::proxy(target)).unwrap();
            prop_assert_eq!(document_text(&graph), before.clone());
            graph.sever(&InputSocketId::proxy(target));
            prop_assert_eq!(document_text(&graph), severed);
            return Ok(());
        }
        prop_assert_eq!(document_text(&graph), before);
    }
}
