//! Node graph execution engine
//!
//! Runs a graph once, in topological order:
//! - Node selection (requested nodes plus everything upstream of them)
//! - Execution ordering via Kahn's algorithm, stable by node id
//! - Argument resolution from parents, embedded widgets and defaults,
//!   including `*args`/`**kwargs` subparameters and unpacking
//! - Splitting of multi-output return values
//! - Cooperative cancellation between node invocations

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info};

use crate::error::ExecutionError;
use crate::literal::{CallArgs, CallError, Value};
use crate::nodes::node::{Node, NodeId, NodeKind, NodeMode, ProxyPayload};
use crate::nodes::port::{InputSocketId, OutputSocketId};
use crate::nodes::signature::{ParamKind, SignatureRecord};
use crate::nodes::NodeGraph;

/// Shared flag used to stop a run between two node invocations
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Outcome of one node during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Produced its outputs
    Done,
    /// Produced nothing: commented out, missing input or a redirect without source
    NoData,
    /// Raised or produced an unusable value
    Failed,
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// Output name -> value, per node that produced data
    pub results: BTreeMap<NodeId, BTreeMap<String, Value>>,
    /// Nodes in the order they produced data
    pub order: Vec<NodeId>,
    /// Values of outputs flagged for visualization
    pub visuals: BTreeMap<NodeId, BTreeMap<String, Value>>,
    /// Commented-out nodes
    pub skipped: Vec<NodeId>,
    /// Nodes that never ran because an upstream node failed
    pub blocked: Vec<NodeId>,
    pub states: BTreeMap<NodeId, NodeState>,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub errors: Vec<ExecutionError>,
}

impl ExecutionReport {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            results: BTreeMap::new(),
            order: Vec::new(),
            visuals: BTreeMap::new(),
            skipped: Vec::new(),
            blocked: Vec::new(),
            states: BTreeMap::new(),
            started: now,
            finished: now,
            errors: Vec::new(),
        }
    }

    /// Whether the run had no errors besides skipped nodes
    pub fn is_success(&self) -> bool {
        self.errors
            .iter()
            .all(|err| matches!(err, ExecutionError::Skipped(_)))
    }

    pub fn output(&self, node_id: NodeId, output_name: &str) -> Option<&Value> {
        self.results.get(&node_id)?.get(output_name)
    }

    /// The value of a node with exactly one output
    pub fn result(&self, node_id: NodeId) -> Option<&Value> {
        let outputs = self.results.get(&node_id)?;
        match outputs.len() {
            1 => outputs.values().next(),
            _ => None,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished - self.started
    }

    /// JSON summary used by the command-line launcher
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "results": self.results.iter().map(|(id, outputs)| (id.to_string(), outputs)).collect::<BTreeMap<_, _>>(),
            "order": self.order,
            "skipped": self.skipped,
            "blocked": self.blocked,
            "errors": self.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "started": self.started.to_rfc3339(),
            "finished": self.finished.to_rfc3339(),
        })
    }
}

/// Execution engine for node graphs
#[derive(Debug, Default)]
pub struct ExecutionEngine {
    cancel: CancelHandle,
}

impl ExecutionEngine {
    /// Create a new execution engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that can cancel runs of this engine from elsewhere
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Topological order of the requested nodes and their ancestors; all
    /// nodes when `requested` is `None`. Among independent nodes the smaller
    /// id comes first. On a cycle, returns the nodes that could not be ordered.
    pub fn execution_order(
        graph: &NodeGraph,
        requested: Option<&[NodeId]>,
    ) -> Result<Vec<NodeId>, Vec<NodeId>> {
        let selected: BTreeSet<NodeId> = match requested {
            None => graph.node_ids().collect(),
            Some(ids) => {
                let mut selected = BTreeSet::new();
                let mut stack: Vec<NodeId> = ids.iter().copied().filter(|id| graph.node(*id).is_some()).collect();
                while let Some(id) = stack.pop() {
                    if selected.insert(id) {
                        stack.extend(graph.upstream_nodes(id));
                    }
                }
                selected
            }
        };

        let mut in_degree: HashMap<NodeId, usize> = selected.iter().map(|id| (*id, 0)).collect();
        let mut adjacency: HashMap<NodeId, BTreeSet<NodeId>> = HashMap::new();
        for (parent, child) in graph.connections() {
            if selected.contains(&parent.node_id) && selected.contains(&child.node_id) {
                // several connections between the same pair count once
                if adjacency.entry(parent.node_id).or_default().insert(child.node_id) {
                    *in_degree.entry(child.node_id).or_default() += 1;
                }
            }
        }

        let mut ready: BTreeSet<NodeId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(selected.len());
        while let Some(id) = ready.pop_first() {
            order.push(id);
            for child in adjacency.get(&id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(*child);
                    }
                }
            }
        }

        if order.len() == selected.len() {
            Ok(order)
        } else {
            let done: BTreeSet<NodeId> = order.into_iter().collect();
            Err(selected.difference(&done).copied().collect())
        }
    }

    /// Runs the requested nodes (all when `None`) and their ancestors
    pub fn run(&self, graph: &NodeGraph, requested: Option<&[NodeId]>) -> ExecutionReport {
        let mut report = ExecutionReport::new();
        let order = match Self::execution_order(graph, requested) {
            Ok(order) => order,
            Err(stuck) => {
                error!("Nodes {:?} wait on each other; nothing was run", stuck);
                report.errors.push(ExecutionError::Deadlock(stuck));
                report.finished = Utc::now();
                return report;
            }
        };
        info!("Running {} nodes", order.len());

        for (position, &id) in order.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("Run cancelled before node {}", id);
                report.errors.push(ExecutionError::Cancelled);
                break;
            }
            let Some(node) = graph.node(id) else {
                continue;
            };

            if node.commented_out {
                debug!("Skipping commented-out node {}", id);
                report.skipped.push(id);
                report.errors.push(ExecutionError::Skipped(id));
                report.states.insert(id, NodeState::NoData);
                continue;
            }

            match self.execute_node(graph, node, &report.results) {
                Ok(Some(outputs)) => {
                    self.record_visuals(node, &outputs, &mut report);
                    report.results.insert(id, outputs);
                    report.order.push(id);
                    report.states.insert(id, NodeState::Done);
                }
                Ok(None) => {
                    report.states.insert(id, NodeState::NoData);
                }
                Err(err) if !err.aborts_run() => {
                    info!("{}", err);
                    report.errors.push(err);
                    report.states.insert(id, NodeState::NoData);
                }
                Err(err) => {
                    error!("{}", err);
                    report.errors.push(err);
                    report.states.insert(id, NodeState::Failed);
                    report.blocked = Self::descendants_among(graph, id, &order[position + 1..]);
                    break;
                }
            }
        }

        report.finished = Utc::now();
        info!(
            "Run finished: {} nodes produced data, {} errors",
            report.order.len(),
            report.errors.len()
        );
        report
    }

    /// Nodes of `remaining` reachable from `failed`
    fn descendants_among(graph: &NodeGraph, failed: NodeId, remaining: &[NodeId]) -> Vec<NodeId> {
        remaining
            .iter()
            .copied()
            .filter(|id| graph.reaches(failed, *id))
            .collect()
    }

    fn record_visuals(&self, node: &Node, outputs: &BTreeMap<String, Value>, report: &mut ExecutionReport) {
        let Some(signature) = node.signature() else {
            return;
        };
        if node.mode == NodeMode::Callable {
            return;
        }
        for output in signature.outputs.iter().filter(|output| output.viz.is_some()) {
            if let Some(value) = outputs.get(&output.name) {
                report
                    .visuals
                    .entry(node.id)
                    .or_default()
                    .insert(output.name.clone(), value.clone());
            }
        }
    }

    /// Runs one node. `Ok(None)` means the node has no data to offer.
    fn execute_node(
        &self,
        graph: &NodeGraph,
        node: &Node,
        results: &BTreeMap<NodeId, BTreeMap<String, Value>>,
    ) -> Result<Option<BTreeMap<String, Value>>, ExecutionError> {
        let single = |name: &str, value: Value| Some(BTreeMap::from([(name.to_string(), value)]));

        if node.mode == NodeMode::Callable {
            let value = match &node.kind {
                NodeKind::Callable(callable) => Value::Callable(callable.def.callable_value()),
                NodeKind::Operator(op) => Value::Callable(op.operator.callable_value()),
                NodeKind::Proxy(_) => return Ok(None),
            };
            return Ok(node.callable_output_name().and_then(|name| single(name, value)));
        }

        match &node.kind {
            NodeKind::Proxy(proxy) => {
                let value = match &proxy.payload {
                    ProxyPayload::Data(widget) => Some(widget.get().clone()),
                    ProxyPayload::Redirect => socket_data(graph, results, &InputSocketId::proxy(node.id)),
                };
                Ok(value.and_then(|value| single(&proxy.title, value)))
            }
            NodeKind::Operator(op) => {
                let args = bind_arguments(graph, results, node, &op.signature)?;
                debug!("Applying '{}' on node {}", op.operator.id, node.id);
                let value = op
                    .operator
                    .apply(&args.positional)
                    .map_err(|error| ExecutionError::CallableFailed { node_id: node.id, error })?;
                split_outputs(node.id, &op.signature, value).map(Some)
            }
            NodeKind::Callable(callable) => {
                let args = bind_arguments(graph, results, node, &callable.signature)?;
                debug!("Calling {} on node {}", callable.def.name, node.id);
                let value = callable
                    .def
                    .call(&args)
                    .map_err(|error| ExecutionError::CallableFailed { node_id: node.id, error })?;
                split_outputs(node.id, &callable.signature, value).map(Some)
            }
        }
    }
}

/// Follows redirects upstream from `output` until a node that produces data
/// itself. `None` when a redirect in the chain has no source or is
/// commented out.
pub fn resolve_source<'g>(graph: &'g NodeGraph, output: &'g OutputSocketId) -> Option<&'g OutputSocketId> {
    let mut current = output;
    // connect rejects cycles, so a chain never exceeds the node count
    for _ in 0..=graph.node_count() {
        let node = graph.node(current.node_id)?;
        if !node.is_redirect() {
            return Some(current);
        }
        if node.commented_out {
            return None;
        }
        current = graph.parent_of(&InputSocketId::proxy(current.node_id))?;
    }
    None
}

/// Data arriving at an input socket, if its parent produced any
fn socket_data(
    graph: &NodeGraph,
    results: &BTreeMap<NodeId, BTreeMap<String, Value>>,
    socket: &InputSocketId,
) -> Option<Value> {
    let parent = graph.parent_of(socket)?;
    let source = resolve_source(graph, parent)?;
    results.get(&source.node_id)?.get(&source.output_name).cloned()
}

/// Resolves every parameter of a node into call arguments
fn bind_arguments(
    graph: &NodeGraph,
    results: &BTreeMap<NodeId, BTreeMap<String, Value>>,
    node: &Node,
    signature: &SignatureRecord,
) -> Result<CallArgs, ExecutionError> {
    let mut positional = Vec::new();
    let mut var_positional = Vec::new();
    let mut keywords: Vec<(String, Value)> = Vec::new();
    let mut var_keywords: Vec<(String, Value)> = Vec::new();
    let mut missing = Vec::new();

    for param in &signature.parameters {
        match param.kind {
            ParamKind::Positional | ParamKind::KeywordOnly => {
                let value = socket_data(graph, results, &InputSocketId::param(node.id, &param.name))
                    .or_else(|| node.widget_value(&param.name, None).cloned())
                    .or_else(|| param.default.clone());
                match (value, param.kind) {
                    (None, _) => missing.push(param.name.clone()),
                    (Some(value), ParamKind::Positional) => positional.push(value),
                    (Some(value), _) => keywords.push((param.name.clone(), value)),
                }
            }
            ParamKind::VarPositional | ParamKind::VarKeyword => {
                let subparams = node.as_callable().map(|c| c.subparams(&param.name)).unwrap_or(&[]);
                for (index, subparam) in subparams.iter().enumerate() {
                    let socket = InputSocketId::subparam(node.id, &param.name, index);
                    let value = socket_data(graph, results, &socket)
                        .or_else(|| subparam.widget.as_ref().map(|widget| widget.get().clone()));
                    let Some(value) = value else {
                        missing.push(format!("{}[{}]", param.name, index));
                        continue;
                    };

                    if param.kind == ParamKind::VarPositional {
                        if !subparam.unpacking {
                            var_positional.push(value);
                            continue;
                        }
                        let items = value.iterate().map_err(|err| ExecutionError::PositionalUnpackError {
                            node_id: node.id,
                            param: param.name.clone(),
                            subparam: index,
                            message: err.to_string(),
                        })?;
                        var_positional.extend(items);
                        continue;
                    }

                    if !subparam.unpacking {
                        let keyword = subparam
                            .keyword
                            .clone()
                            .unwrap_or_else(|| format!("key_{}", index));
                        merge_keyword(&mut var_keywords, keyword, value);
                        continue;
                    }
                    let unpack_error = |message: String| ExecutionError::KeywordUnpackError {
                        node_id: node.id,
                        param: param.name.clone(),
                        subparam: index,
                        message,
                    };
                    let items = value.as_mapping().ok_or_else(|| {
                        unpack_error(format!("argument after ** must be a mapping, not {}", value.type_name()))
                    })?;
                    for (key, item) in items {
                        let Value::Str(key) = key else {
                            return Err(unpack_error(format!("keywords must be strings, got {}", key.repr())));
                        };
                        merge_keyword(&mut var_keywords, key.clone(), item.clone());
                    }
                }
            }
        }
    }

    if !missing.is_empty() {
        return Err(ExecutionError::MissingInput {
            node_id: node.id,
            params: missing,
        });
    }

    // a named parameter cannot also arrive through **kwargs
    if let Some((name, _)) = var_keywords.iter().find(|(name, _)| {
        signature.parameters.iter().any(|param| {
            param.name == *name && matches!(param.kind, ParamKind::Positional | ParamKind::KeywordOnly)
        })
    }) {
        return Err(ExecutionError::CallableFailed {
            node_id: node.id,
            error: CallError::type_error(format!("got multiple values for argument '{}'", name)),
        });
    }

    let mut args = CallArgs::positional(positional);
    args.positional.extend(var_positional);
    for (name, value) in keywords.into_iter().chain(var_keywords) {
        args.push_keyword(name, value);
    }
    Ok(args)
}

/// Inserts or replaces a keyword argument, like `dict.update`
fn merge_keyword(keywords: &mut Vec<(String, Value)>, key: String, value: Value) {
    match keywords.iter_mut().find(|(existing, _)| *existing == key) {
        Some(slot) => slot.1 = value,
        None => keywords.push((key, value)),
    }
}

/// Maps a return value onto the node's outputs
fn split_outputs(
    node_id: NodeId,
    signature: &SignatureRecord,
    value: Value,
) -> Result<BTreeMap<String, Value>, ExecutionError> {
    if !signature.is_multi_output() {
        let name = signature
            .outputs
            .first()
            .map(|output| output.name.clone())
            .unwrap_or_default();
        return Ok(BTreeMap::from([(name, value)]));
    }
    if value.as_mapping().is_none() {
        return Err(ExecutionError::SplitReturnError {
            node_id,
            message: format!("expected a dict keyed by output name, got {}", value.type_name()),
        });
    }
    signature
        .outputs
        .iter()
        .map(|output| {
            value
                .get_key(&output.name)
                .map(|item| (output.name.clone(), item.clone()))
                .ok_or_else(|| ExecutionError::SplitReturnError {
                    node_id,
                    message: format!("returned dict has no '{}' key", output.name),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::factory::{CallableDef, CallableKind, CallableRegistry};
    use crate::nodes::node::{CallableNode, CallableSource};
    use crate::nodes::port::PlaceholderSocket;
    use crate::nodes::signature::{Annotation, ParamDecl, SignatureDecl};
    use crate::literal::parse_literal;
    use crate::nodes::widgets::Widget;

    fn data(id: NodeId, value: Value) -> Node {
        Node::data(id, "value", Widget::literal_entry(value).unwrap())
    }

    fn custom(id: NodeId, def: CallableDef) -> Node {
        let signature = Arc::new(SignatureRecord::from_decl(&def.name, &def.signature).unwrap());
        let source = CallableSource::Registry(CallableKind::ThirdLib, def.name.clone());
        Node::new(id, NodeKind::Callable(CallableNode::new(source, Arc::new(def), signature).unwrap()))
    }

    fn registry_node(id: NodeId, kind: CallableKind, name: &str) -> Node {
        let registry = CallableRegistry::with_defaults();
        crate::nodes::test_support::registry_node(&registry, id, kind, name)
    }

    fn out(id: NodeId, name: &str) -> OutputSocketId {
        OutputSocketId::new(id, name)
    }

    #[test]
    fn test_operator_addition() {
        let mut graph = NodeGraph::new();
        graph.insert_node(data(0, Value::Int(3))).unwrap();
        graph.insert_node(data(1, Value::Int(4))).unwrap();
        graph.insert_node(Node::operator(2, "a + b").unwrap()).unwrap();
        graph.connect(out(0, "value"), InputSocketId::param(2, "a")).unwrap();
        graph.connect(out(1, "value"), InputSocketId::param(2, "b")).unwrap();

        let report = ExecutionEngine::new().run(&graph, None);
        assert!(report.is_success(), "{:?}", report.errors);
        assert_eq!(report.result(2), Some(&Value::Int(7)));
        assert_eq!(report.order, [0, 1, 2]);
    }

    #[test]
    fn test_requested_nodes_pull_ancestors_only() {
        let mut graph = NodeGraph::new();
        graph.insert_node(data(0, Value::Int(3))).unwrap();
        graph.insert_node(Node::operator(1, "-a").unwrap()).unwrap();
        graph.insert_node(data(2, Value::Int(9))).unwrap();
        graph.connect(out(0, "value"), InputSocketId::param(1, "a")).unwrap();

        let report = ExecutionEngine::new().run(&graph, Some(&[1]));
        assert_eq!(report.result(1), Some(&Value::Int(-3)));
        assert!(report.result(2).is_none());
    }

    #[test]
    fn test_unpacking_positional() {
        let mut graph = NodeGraph::new();
        let list = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        graph.insert_node(data(0, list.clone())).unwrap();
        graph.insert_node(registry_node(1, CallableKind::Capsule, "tuple_from_args")).unwrap();
        graph.connect(out(0, "value"), PlaceholderSocket::new(1, "args")).unwrap();

        let report = ExecutionEngine::new().run(&graph, None);
        assert_eq!(report.result(1), Some(&Value::Tuple(vec![list])));

        let node = graph.node_mut(1).unwrap().as_callable_mut().unwrap();
        node.set_unpacking("args", 0, true).unwrap();
        let report = ExecutionEngine::new().run(&graph, None);
        assert_eq!(
            report.result(1),
            Some(&Value::Tuple(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
        );
    }

    #[test]
    fn test_positional_unpack_error_aborts() {
        let mut graph = NodeGraph::new();
        graph.insert_node(data(0, Value::Int(5))).unwrap();
        graph.insert_node(registry_node(1, CallableKind::Capsule, "tuple_from_args")).unwrap();
        graph.insert_node(Node::operator(2, "-a").unwrap()).unwrap();
        graph.connect(out(0, "value"), PlaceholderSocket::new(1, "args")).unwrap();
        graph.connect(out(1, "output"), InputSocketId::param(2, "a")).unwrap();
        graph.node_mut(1).unwrap().as_callable_mut().unwrap().set_unpacking("args", 0, true).unwrap();

        let report = ExecutionEngine::new().run(&graph, None);
        assert!(matches!(
            report.errors.as_slice(),
            [ExecutionError::PositionalUnpackError { node_id: 1, subparam: 0, .. }]
        ));
        assert_eq!(report.blocked, [2]);
        assert_eq!(report.result(0), Some(&Value::Int(5)));
    }

    #[test]
    fn test_keyword_merging_and_errors() {
        let mut graph = NodeGraph::new();
        graph.insert_node(data(0, Value::Int(1))).unwrap();
        graph.insert_node(data(1, parse_literal("{'b': 2, 'c': 3}").unwrap())).unwrap();
        graph.insert_node(registry_node(2, CallableKind::Capsule, "dict_from_kwargs")).unwrap();
        graph.connect(out(0, "value"), PlaceholderSocket::new(2, "kwargs")).unwrap();
        graph.connect(out(1, "value"), PlaceholderSocket::new(2, "kwargs")).unwrap();
        {
            let node = graph.node_mut(2).unwrap().as_callable_mut().unwrap();
            node.set_keyword("kwargs", 0, "a").unwrap();
            node.set_unpacking("kwargs", 1, true).unwrap();
        }
        let report = ExecutionEngine::new().run(&graph, None);
        assert_eq!(
            report.result(2),
            Some(&parse_literal("{'a': 1, 'b': 2, 'c': 3}").unwrap())
        );

        graph.node_mut(1).unwrap().set_widget_value(None, None, parse_literal("[('b', 2)]").unwrap()).unwrap();
        let report = ExecutionEngine::new().run(&graph, None);
        assert!(matches!(
            report.errors.as_slice(),
            [ExecutionError::KeywordUnpackError { node_id: 2, subparam: 1, .. }]
        ));
    }

    #[test]
    fn test_missing_input_does_not_abort() {
        let mut graph = NodeGraph::new();
        graph.insert_node(Node::operator(0, "-a").unwrap()).unwrap();
        graph.insert_node(data(1, Value::Int(2))).unwrap();
        graph.insert_node(Node::operator(2, "-a").unwrap()).unwrap();
        graph.connect(out(1, "value"), InputSocketId::param(2, "a")).unwrap();

        let report = ExecutionEngine::new().run(&graph, None);
        assert_eq!(
            report.errors,
            [ExecutionError::MissingInput { node_id: 0, params: vec!["a".to_string()] }]
        );
        assert_eq!(report.result(2), Some(&Value::Int(-2)));
        assert_eq!(report.states[&0], NodeState::NoData);
    }

    #[test]
    fn test_commented_out_falls_back_to_default() {
        let mut graph = NodeGraph::new();
        graph.insert_node(data(0, Value::Bool(true))).unwrap();
        graph.insert_node(registry_node(1, CallableKind::Builtin, "sorted")).unwrap();
        graph.insert_node(data(2, parse_literal("[2, 1, 3]").unwrap())).unwrap();
        graph.connect(out(2, "value"), InputSocketId::param(1, "iterable")).unwrap();
        graph.connect(out(0, "value"), InputSocketId::param(1, "reverse")).unwrap();

        let report = ExecutionEngine::new().run(&graph, None);
        assert_eq!(report.result(1), Some(&parse_literal("[3, 2, 1]").unwrap()));

        graph.node_mut(0).unwrap().commented_out = true;
        let report = ExecutionEngine::new().run(&graph, None);
        assert_eq!(report.result(1), Some(&parse_literal("[1, 2, 3]").unwrap()));
        assert_eq!(report.skipped, [0]);
        assert!(report.is_success());
    }

    #[test]
    fn test_split_return() {
        let decl = SignatureDecl::new(vec![ParamDecl::positional("x")]).returning(Annotation::Literal(
            parse_literal("[{'name': 'double'}, {'name': 'half', 'viz': 'side'}]").unwrap(),
        ));
        let good = CallableDef::new("split", decl.clone(), |args| {
            let x = args.require(0, "x")?.as_float().unwrap_or(0.0);
            Ok(Value::dict([("double", Value::Float(x * 2.0)), ("half", Value::Float(x / 2.0))]))
        });
        let bad = CallableDef::new("broken", decl, |_| Ok(Value::Int(1)));

        let mut graph = NodeGraph::new();
        graph.insert_node(data(0, Value::Float(4.0))).unwrap();
        graph.insert_node(custom(1, good)).unwrap();
        graph.connect(out(0, "value"), InputSocketId::param(1, "x")).unwrap();
        let report = ExecutionEngine::new().run(&graph, None);
        assert_eq!(report.output(1, "double"), Some(&Value::Float(8.0)));
        assert_eq!(report.visuals[&1]["half"], Value::Float(2.0));

        graph.insert_node(custom(2, bad)).unwrap();
        graph.connect(out(0, "value"), InputSocketId::param(2, "x")).unwrap();
        let report = ExecutionEngine::new().run(&graph, None);
        assert!(matches!(report.errors.as_slice(), [ExecutionError::SplitReturnError { node_id: 2, .. }]));
    }

    #[test]
    fn test_callable_error_is_tagged() {
        let failing = CallableDef::new("fail", SignatureDecl::default(), |_| {
            Err(CallError::value_error("nope"))
        });
        let mut graph = NodeGraph::new();
        graph.insert_node(custom(3, failing)).unwrap();
        let report = ExecutionEngine::new().run(&graph, None);
        assert_eq!(
            report.errors,
            [ExecutionError::CallableFailed { node_id: 3, error: CallError::value_error("nope") }]
        );
        assert!(!report.is_success());
    }

    #[test]
    fn test_cancelled_run_keeps_nothing_new() {
        let mut graph = NodeGraph::new();
        graph.insert_node(data(0, Value::Int(1))).unwrap();
        let engine = ExecutionEngine::new();
        engine.cancel_handle().cancel();
        let report = engine.run(&graph, None);
        assert_eq!(report.errors, [ExecutionError::Cancelled]);
        assert!(report.results.is_empty());
    }

    #[test]
    fn test_callable_mode_outputs_function() {
        let mut graph = NodeGraph::new();
        graph.insert_node(Node::operator(0, "a * b").unwrap()).unwrap();
        graph.insert_node(registry_node(1, CallableKind::Capsule, "perform_call")).unwrap();
        graph.insert_node(data(2, Value::Int(6))).unwrap();
        graph.insert_node(data(3, Value::Int(7))).unwrap();
        graph.set_mode(0, NodeMode::Callable).unwrap();
        graph.connect(out(0, "operation"), InputSocketId::param(1, "func")).unwrap();
        graph.connect(out(2, "value"), PlaceholderSocket::new(1, "args")).unwrap();
        graph.connect(out(3, "value"), PlaceholderSocket::new(1, "args")).unwrap();

        let report = ExecutionEngine::new().run(&graph, None);
        assert_eq!(report.result(1), Some(&Value::Int(42)));
    }

    #[test]
    fn test_keyword_colliding_with_named_param_fails() {
        let mut graph = NodeGraph::new();
        graph.insert_node(Node::operator(0, "a * b").unwrap()).unwrap();
        graph.insert_node(registry_node(1, CallableKind::Capsule, "perform_call")).unwrap();
        graph.insert_node(data(2, Value::Int(6))).unwrap();
        graph.set_mode(0, NodeMode::Callable).unwrap();
        graph.connect(out(0, "operation"), InputSocketId::param(1, "func")).unwrap();
        graph.connect(out(2, "value"), PlaceholderSocket::new(1, "kwargs")).unwrap();
        graph.node_mut(1).unwrap().as_callable_mut().unwrap().set_keyword("kwargs", 0, "func").unwrap();

        let report = ExecutionEngine::new().run(&graph, None);
        assert_eq!(
            report.errors,
            [ExecutionError::CallableFailed {
                node_id: 1,
                error: CallError::type_error("got multiple values for argument 'func'"),
            }]
        );
        assert!(report.result(1).is_none());
    }

    #[test]
    fn test_oversized_repetition_is_tagged() {
        let mut graph = NodeGraph::new();
        graph.insert_node(data(0, Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))).unwrap();
        graph.insert_node(data(1, Value::Int(1 << 62))).unwrap();
        graph.insert_node(Node::operator(2, "a * b").unwrap()).unwrap();
        graph.connect(out(0, "value"), InputSocketId::param(2, "a")).unwrap();
        graph.connect(out(1, "value"), InputSocketId::param(2, "b")).unwrap();

        let report = ExecutionEngine::new().run(&graph, None);
        assert!(matches!(
            report.errors.as_slice(),
            [ExecutionError::CallableFailed { node_id: 2, error }] if error.kind == "MemoryError"
        ));
        assert!(report.result(2).is_none());
    }

    #[test]
    fn test_redirect_chain_and_missing_source() {
        let mut graph = NodeGraph::new();
        graph.insert_node(data(0, Value::str("hi"))).unwrap();
        graph.insert_node(Node::redirect(1, "r1")).unwrap();
        graph.insert_node(Node::redirect(2, "r2")).unwrap();
        graph.insert_node(registry_node(3, CallableKind::Builtin, "len")).unwrap();
        graph.connect(out(0, "value"), InputSocketId::proxy(1)).unwrap();
        graph.connect(out(1, "r1"), InputSocketId::proxy(2)).unwrap();
        graph.connect(out(2, "r2"), InputSocketId::param(3, "obj")).unwrap();

        let report = ExecutionEngine::new().run(&graph, None);
        assert_eq!(report.result(3), Some(&Value::Int(2)));

        graph.sever(&InputSocketId::proxy(1));
        let report = ExecutionEngine::new().run(&graph, None);
        assert_eq!(
            report.errors,
            [ExecutionError::MissingInput { node_id: 3, params: vec!["obj".to_string()] }]
        );
    }

    #[test]
    fn test_execution_order_is_stable() {
        let mut graph = NodeGraph::new();
        for id in [5, 3, 1] {
            graph.insert_node(data(id, Value::Int(0))).unwrap();
        }
        graph.insert_node(Node::operator(0, "a + b").unwrap()).unwrap();
        graph.connect(out(5, "value"), InputSocketId::param(0, "a")).unwrap();
        graph.connect(out(3, "value"), InputSocketId::param(0, "b")).unwrap();
        assert_eq!(ExecutionEngine::execution_order(&graph, None), Ok(vec![1, 3, 5, 0]));
    }
}
