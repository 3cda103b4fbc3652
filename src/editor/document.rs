//! `.ndz` document codec
//!
//! A document is a Python-literal dict with the keys `nodes`, `text_blocks`,
//! `node_packs`, `category_index_map` and `parent_sockets`. Unknown keys are
//! ignored; missing optional keys take their defaults. Decoding builds a
//! fresh graph and fails as a whole: nothing is applied on error.

use std::collections::BTreeMap;
use std::path::Path;

use glam::IVec2;
use log::{debug, info, warn};

use crate::error::ValidationError;
use crate::literal::{parse_literal, pformat, Value};
use crate::nodes::factory::{CallableKind, NodeFactory};
use crate::nodes::node::{CallableNode, CallableSource, Node, NodeId, NodeKind, NodeMode, ProxyPayload, ScriptId, Subparameter};
use crate::nodes::port::{InputKey, InputSocketId, OutputSocketId};
use crate::nodes::signature::{is_identifier, ParamKind};
use crate::nodes::types::TypeCodename;
use crate::nodes::widgets::Widget;
use crate::nodes::{NodeGraph, TextBlock};
use crate::plugins::CategoryPalette;

fn malformed(reason: impl Into<String>) -> ValidationError {
    ValidationError::MalformedDocument(reason.into())
}

/// A loaded document: the graph plus the node packs it draws from
#[derive(Debug, Clone)]
pub struct Document {
    pub graph: NodeGraph,
    /// Pack identifiers, as written in the file
    pub node_packs: Vec<String>,
    pub palette: CategoryPalette,
}

impl Document {
    /// Empty document
    pub fn new(palette_size: usize) -> Self {
        Self {
            graph: NodeGraph::new(),
            node_packs: Vec::new(),
            palette: CategoryPalette::new(palette_size),
        }
    }

    /// Parses the text of a `.ndz` file
    pub fn parse(text: &str, factory: &mut NodeFactory, palette_size: usize) -> Result<Self, ValidationError> {
        let value = parse_literal(text).map_err(|err| malformed(err.to_string()))?;
        Self::from_value(&value, factory, palette_size)
    }

    /// Decodes a document value
    pub fn from_value(value: &Value, factory: &mut NodeFactory, palette_size: usize) -> Result<Self, ValidationError> {
        if value.as_mapping().is_none() {
            return Err(malformed(format!("top level must be a dict, got {}", value.type_name())));
        }
        let node_values = value
            .get_key("nodes")
            .ok_or_else(|| malformed("missing 'nodes'"))
            .and_then(|nodes| list_items(nodes, "nodes"))?;

        let node_packs = match value.get_key("node_packs") {
            None => Vec::new(),
            Some(packs) => list_items(packs, "node_packs")?
                .iter()
                .map(|pack| pack.as_str().map(str::to_string).ok_or_else(|| malformed("node pack identifiers must be strings")))
                .collect::<Result<Vec<_>, _>>()?,
        };
        let pack_names = factory.node_packs.resolve_all(&node_packs)?;

        let mut palette = match value.get_key("category_index_map") {
            Some(map) => CategoryPalette::from_value(palette_size, map)?,
            None => CategoryPalette::new(palette_size),
        };

        let mut graph = NodeGraph::new();
        for node_value in node_values {
            let node = decode_node(node_value, factory, &pack_names)?;
            if let Some(CallableSource::Script(script_id)) = node.as_callable().map(|c| &c.source) {
                palette.index_of(&script_id.pack, &script_id.category);
            }
            graph.insert_node(node).map_err(|err| malformed(err.to_string()))?;
        }

        if let Some(blocks) = value.get_key("text_blocks") {
            for block in list_items(blocks, "text_blocks")? {
                let position = decode_midtop(block.get_key("midtop"))?;
                let text = block
                    .get_key("text")
                    .and_then(Value::as_str)
                    .ok_or_else(|| malformed("text block without text"))?;
                graph.add_text_block(TextBlock::new(position, text));
            }
        }

        if let Some(connections) = value.get_key("parent_sockets") {
            for connection in list_items(connections, "parent_sockets")? {
                let parent = decode_parent(connection.get_key("parent"))?;
                let child = decode_child(connection.get_key("child"))?;
                graph
                    .connect(parent, child)
                    .map_err(|err| malformed(format!("cannot restore connection: {}", err)))?;
            }
        }

        info!(
            "Loaded document with {} nodes and {} connections",
            graph.node_count(),
            graph.connection_count()
        );
        Ok(Self {
            graph,
            node_packs,
            palette,
        })
    }

    /// Encodes the document
    pub fn to_value(&self) -> Value {
        let nodes = self.graph.nodes().map(encode_node).collect();
        let text_blocks = self
            .graph
            .text_blocks
            .iter()
            .map(|block| Value::dict([("midtop", encode_midtop(block.position)), ("text", Value::str(block.text.as_str()))]))
            .collect();
        let parent_sockets = self
            .graph
            .connections()
            .map(|(parent, child)| {
                Value::dict([
                    ("parent", Value::Tuple(vec![Value::from(parent.node_id), Value::str(parent.output_name.as_str())])),
                    ("child", encode_child(child)),
                ])
            })
            .collect();

        Value::dict([
            ("nodes", Value::List(nodes)),
            ("text_blocks", Value::List(text_blocks)),
            ("node_packs", Value::List(self.node_packs.iter().map(|pack| Value::str(pack.as_str())).collect())),
            ("category_index_map", self.palette.to_value()),
            ("parent_sockets", Value::List(parent_sockets)),
        ])
    }

    /// Canonical file text
    pub fn to_text(&self) -> String {
        let mut text = pformat(&self.to_value());
        text.push('\n');
        text
    }
}

/// Repoints node-pack identifiers in a document value that failed to load
/// with [`ValidationError::MissingNodePacks`]. Script ids and category keys
/// follow the renamed packs.
pub fn rename_node_packs(document: &Value, renames: &BTreeMap<String, String>) -> Value {
    let pack_name = |identifier: &str| {
        Path::new(identifier)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(identifier)
            .to_string()
    };
    let name_renames: BTreeMap<String, String> = renames
        .iter()
        .map(|(old, new)| (pack_name(old), pack_name(new)))
        .filter(|(old, new)| old != new)
        .collect();
    for (old, new) in renames {
        warn!("Renaming node pack '{}' to '{}'", old, new);
    }

    let rename_name = |value: &Value| match value {
        Value::Str(name) => Value::str(name_renames.get(name).unwrap_or(name).as_str()),
        other => other.clone(),
    };

    let Some(items) = document.as_mapping() else {
        return document.clone();
    };
    let items = items
        .iter()
        .map(|(key, value)| {
            let value = match (key.as_str(), value) {
                (Some("node_packs"), Value::List(packs)) => Value::List(
                    packs
                        .iter()
                        .map(|pack| match pack {
                            Value::Str(identifier) => Value::str(renames.get(identifier).unwrap_or(identifier).as_str()),
                            other => other.clone(),
                        })
                        .collect(),
                ),
                (Some("category_index_map"), Value::Dict(entries)) => Value::Dict(
                    entries
                        .iter()
                        .map(|(key, index)| {
                            let key = match key {
                                Value::Tuple(parts) if parts.len() == 2 => {
                                    Value::Tuple(vec![rename_name(&parts[0]), parts[1].clone()])
                                }
                                other => other.clone(),
                            };
                            (key, index.clone())
                        })
                        .collect(),
                ),
                (Some("nodes"), Value::List(nodes)) => Value::List(
                    nodes
                        .iter()
                        .map(|node| match node {
                            Value::Dict(fields) => Value::Dict(
                                fields
                                    .iter()
                                    .map(|(field, value)| match (field.as_str(), value) {
                                        (Some("script_id"), Value::Tuple(parts)) if parts.len() == 3 => {
                                            let mut parts = parts.clone();
                                            parts[0] = rename_name(&parts[0]);
                                            (field.clone(), Value::Tuple(parts))
                                        }
                                        _ => (field.clone(), value.clone()),
                                    })
                                    .collect(),
                            ),
                            other => other.clone(),
                        })
                        .collect(),
                ),
                _ => value.clone(),
            };
            (key.clone(), value)
        })
        .collect();
    Value::Dict(items)
}

fn list_items<'v>(value: &'v Value, key: &str) -> Result<&'v [Value], ValidationError> {
    match value {
        Value::List(items) | Value::Tuple(items) => Ok(items),
        other => Err(malformed(format!("'{}' must be a list, got {}", key, other.type_name()))),
    }
}

fn decode_id(value: Option<&Value>) -> Result<NodeId, ValidationError> {
    match value {
        Some(Value::Int(id)) if *id >= 0 => Ok(*id as NodeId),
        Some(other) => Err(malformed(format!("invalid node id {}", other.repr()))),
        None => Err(malformed("node without an id")),
    }
}

fn decode_midtop(value: Option<&Value>) -> Result<IVec2, ValidationError> {
    let Some(value) = value else {
        return Ok(IVec2::ZERO);
    };
    let coordinate = |v: &Value| v.as_int().and_then(|i| i32::try_from(i).ok());
    match value.as_sequence() {
        Some([x, y]) => match (coordinate(x), coordinate(y)) {
            (Some(x), Some(y)) => Ok(IVec2::new(x, y)),
            _ => Err(malformed(format!("invalid midtop {}", value.repr()))),
        },
        _ => Err(malformed(format!("invalid midtop {}", value.repr()))),
    }
}

fn encode_midtop(position: IVec2) -> Value {
    Value::Tuple(vec![Value::Int(position.x as i64), Value::Int(position.y as i64)])
}

fn decode_parent(value: Option<&Value>) -> Result<OutputSocketId, ValidationError> {
    match value.and_then(Value::as_sequence) {
        Some([id, Value::Str(name)]) => Ok(OutputSocketId::new(decode_id(Some(id))?, name)),
        _ => Err(malformed("connection parent must be (node_id, output_name)")),
    }
}

fn decode_child(value: Option<&Value>) -> Result<InputSocketId, ValidationError> {
    match value.and_then(Value::as_sequence) {
        Some([id]) => Ok(InputSocketId::proxy(decode_id(Some(id))?)),
        Some([id, Value::Str(param)]) => Ok(InputSocketId::param(decode_id(Some(id))?, param)),
        Some([id, Value::Str(param), Value::Int(index)]) if *index >= 0 => {
            Ok(InputSocketId::subparam(decode_id(Some(id))?, param, *index as usize))
        }
        _ => Err(malformed("connection child must be (node_id,), (node_id, param) or (node_id, param, index)")),
    }
}

fn encode_child(child: &InputSocketId) -> Value {
    let id = Value::from(child.node_id);
    match &child.key {
        InputKey::Proxy => Value::Tuple(vec![id]),
        InputKey::Param { name, subparam: None } => Value::Tuple(vec![id, Value::str(name.as_str())]),
        InputKey::Param {
            name,
            subparam: Some(index),
        } => Value::Tuple(vec![id, Value::str(name.as_str()), Value::from(*index)]),
    }
}

fn decode_node(value: &Value, factory: &mut NodeFactory, pack_names: &[String]) -> Result<Node, ValidationError> {
    if value.as_mapping().is_none() {
        return Err(malformed("node entries must be dicts"));
    }
    let id = decode_id(value.get_key("id"))?;
    let position = decode_midtop(value.get_key("midtop"))?;
    let mode = match value.get_key("mode") {
        None => NodeMode::default(),
        Some(Value::Str(mode)) => NodeMode::parse(mode).ok_or_else(|| malformed(format!("node {} has unknown mode '{}'", id, mode)))?,
        Some(other) => return Err(malformed(format!("node {} has invalid mode {}", id, other.repr()))),
    };
    let commented_out = match value.get_key("commented_out") {
        None => false,
        Some(Value::Bool(flag)) => *flag,
        Some(other) => return Err(malformed(format!("node {} has invalid commented_out {}", id, other.repr()))),
    };

    let mut node = if let Some(script) = value.get_key("script_id") {
        let script_id = ScriptId::from_value(script)
            .ok_or_else(|| malformed(format!("node {} has invalid script_id {}", id, script.repr())))?;
        if !pack_names.contains(&script_id.pack) {
            return Err(ValidationError::UnknownCallableRef {
                node_id: id,
                reference: format!("script_id {} (pack not listed in node_packs)", script_id),
            });
        }
        decode_callable(value, factory, id, CallableSource::Script(script_id))?
    } else if let Some((kind, callable_id)) = CallableKind::ALL
        .iter()
        .find_map(|kind| value.get_key(kind.id_key()).map(|callable_id| (*kind, callable_id)))
    {
        let callable_id = callable_id
            .as_str()
            .ok_or_else(|| malformed(format!("node {} has invalid {}", id, kind.id_key())))?;
        decode_callable(value, factory, id, CallableSource::Registry(kind, callable_id.to_string()))?
    } else if let Some(operation) = value.get_key("operation_id") {
        let operation = operation
            .as_str()
            .ok_or_else(|| malformed(format!("node {} has invalid operation_id", id)))?;
        Node::operator(id, operation)?
    } else if let Some(title) = value.get_key("title").and_then(Value::as_str) {
        decode_proxy(value, id, title)?
    } else {
        return Err(malformed(format!("node {} has no callable reference nor title", id)));
    };

    if !node.supports_mode(mode) {
        return Err(malformed(format!("node {} cannot be in mode '{}'", id, mode)));
    }
    node.mode = mode;
    node.position = position;
    node.commented_out = commented_out;
    debug!("Decoded node {} ({})", id, node.title_text());
    Ok(node)
}

fn decode_proxy(value: &Value, id: NodeId, title: &str) -> Result<Node, ValidationError> {
    let mut node = match value.get_key("widget_data") {
        Some(data) => {
            let widget = Widget::from_data(data).map_err(|reason| malformed(format!("node {}: {}", id, reason)))?;
            Node::data(id, title, widget)
        }
        None => Node::redirect(id, title),
    };
    if let Some(proxy) = node.as_proxy_mut() {
        if let Some(source_name) = value.get_key("source_name").and_then(Value::as_str) {
            proxy.source_name = source_name.to_string();
        }
        match value.get_key("source_type_codename") {
            Some(Value::Str(codename)) => proxy.source_type_codename = Some(TypeCodename::parse(codename)),
            Some(Value::None) => proxy.source_type_codename = None,
            Some(other) => return Err(malformed(format!("node {} has invalid source_type_codename {}", id, other.repr()))),
            None => {}
        }
    }
    Ok(node)
}

fn decode_callable(
    value: &Value,
    factory: &mut NodeFactory,
    id: NodeId,
    source: CallableSource,
) -> Result<Node, ValidationError> {
    let mut node = factory.callable_node(id, source)?;
    if let Some(values) = value.get_key("param_widget_value_map") {
        let items = values
            .as_mapping()
            .ok_or_else(|| malformed(format!("node {}: param_widget_value_map must be a dict", id)))?;
        for (param, widget_value) in items {
            let param = param
                .as_str()
                .ok_or_else(|| malformed(format!("node {}: parameter names must be strings", id)))?;
            node.set_widget_value(Some(param), None, widget_value.clone())
                .map_err(|err| malformed(format!("node {}: {}", id, err)))?;
        }
    }
    if let Some(callable) = node.as_callable_mut() {
        decode_subparams(value, callable, id)?;
    }
    Ok(node)
}

/// Per-param entry of one of the `subparam_*_map` fields
fn subparam_entry<'v>(value: &'v Value, map: &str, param: &str) -> Option<&'v Value> {
    value.get_key(map)?.get_key(param)
}

fn indexed<'v>(entry: Option<&'v Value>, index: usize) -> Option<&'v Value> {
    entry?
        .as_mapping()?
        .iter()
        .find(|(key, _)| key.as_int() == Some(index as i64))
        .map(|(_, value)| value)
}

fn decode_subparams(value: &Value, callable: &mut CallableNode, id: NodeId) -> Result<(), ValidationError> {
    let variable: Vec<(String, ParamKind)> = callable
        .signature
        .variable_parameters()
        .map(|param| (param.name.clone(), param.kind))
        .collect();

    for (param, kind) in variable {
        let indices = match subparam_entry(value, "subparam_map", &param) {
            None => continue,
            Some(indices) => list_items(indices, "subparam_map")?,
        };
        let contiguous = indices
            .iter()
            .enumerate()
            .all(|(position, index)| index.as_int() == Some(position as i64));
        if !contiguous {
            return Err(malformed(format!("node {}: subparameters of '{}' are not numbered 0..n", id, param)));
        }

        let widgets = subparam_entry(value, "subparam_widget_map", &param);
        let keywords = subparam_entry(value, "subparam_keyword_map", &param);
        let unpacking: Vec<i64> = match subparam_entry(value, "subparam_unpacking_map", &param) {
            None => Vec::new(),
            Some(list) => list_items(list, "subparam_unpacking_map")?
                .iter()
                .filter_map(Value::as_int)
                .collect(),
        };

        let mut subparams = Vec::with_capacity(indices.len());
        for index in 0..indices.len() {
            let widget = indexed(widgets, index)
                .map(Widget::from_data)
                .transpose()
                .map_err(|reason| malformed(format!("node {}: {}", id, reason)))?;
            let keyword = match indexed(keywords, index) {
                None => None,
                Some(Value::Str(keyword)) if kind == ParamKind::VarKeyword && is_identifier(keyword) => Some(keyword.clone()),
                Some(other) => {
                    return Err(malformed(format!("node {}: invalid keyword {} for '{}'", id, other.repr(), param)))
                }
            };
            subparams.push(Subparameter {
                widget,
                keyword,
                unpacking: unpacking.contains(&(index as i64)),
            });
        }

        let mut seen = Vec::new();
        for subparam in &subparams {
            if let Some(keyword) = &subparam.keyword {
                if subparam.unpacking || seen.contains(keyword) {
                    return Err(malformed(format!("node {}: keyword '{}' of '{}' is repeated or unpacked", id, keyword, param)));
                }
                seen.push(keyword.clone());
            }
        }
        callable.subparams.insert(param.clone(), subparams);

        if kind == ParamKind::VarKeyword {
            for index in 0..indices.len() {
                let needs_keyword = callable
                    .subparam(&param, index)
                    .is_some_and(|sub| !sub.unpacking && sub.keyword.is_none());
                if needs_keyword {
                    let keyword = callable.next_keyword(&param);
                    if let Some(sub) = callable.subparams.get_mut(&param).and_then(|subs| subs.get_mut(index)) {
                        sub.keyword = Some(keyword);
                    }
                }
            }
        }
    }
    Ok(())
}

fn encode_node(node: &Node) -> Value {
    let mut fields: Vec<(Value, Value)> = vec![
        (Value::str("id"), Value::from(node.id)),
        (Value::str("midtop"), encode_midtop(node.position)),
        (Value::str("mode"), Value::str(node.mode.as_str())),
        (Value::str("commented_out"), Value::Bool(node.commented_out)),
    ];
    let mut push = |key: &str, value: Value| fields.push((Value::str(key), value));

    match &node.kind {
        NodeKind::Callable(callable) => {
            match &callable.source {
                CallableSource::Script(script_id) => push("script_id", script_id.to_value()),
                CallableSource::Registry(kind, id) => push(kind.id_key(), Value::str(id.as_str())),
            }
            push(
                "param_widget_value_map",
                Value::dict(callable.param_widgets.iter().map(|(param, widget)| (param.as_str(), widget.get().clone()))),
            );

            let mut subparam_map = Vec::new();
            let mut widget_map = Vec::new();
            let mut keyword_map = Vec::new();
            let mut unpacking_map = Vec::new();
            for param in callable.signature.variable_parameters() {
                let subparams = callable.subparams(&param.name);
                let name = Value::str(param.name.as_str());
                subparam_map.push((name.clone(), Value::List((0..subparams.len()).map(Value::from).collect())));

                let widgets: Vec<(Value, Value)> = subparams
                    .iter()
                    .enumerate()
                    .filter_map(|(index, sub)| sub.widget.as_ref().map(|w| (Value::from(index), w.to_data())))
                    .collect();
                if !widgets.is_empty() {
                    widget_map.push((name.clone(), Value::Dict(widgets)));
                }
                let keywords: Vec<(Value, Value)> = subparams
                    .iter()
                    .enumerate()
                    .filter_map(|(index, sub)| sub.keyword.as_ref().map(|k| (Value::from(index), Value::str(k.as_str()))))
                    .collect();
                if !keywords.is_empty() {
                    keyword_map.push((name.clone(), Value::Dict(keywords)));
                }
                let unpacked: Vec<Value> = subparams
                    .iter()
                    .enumerate()
                    .filter(|(_, sub)| sub.unpacking)
                    .map(|(index, _)| Value::from(index))
                    .collect();
                if !unpacked.is_empty() {
                    unpacking_map.push((name, Value::List(unpacked)));
                }
            }
            push("subparam_map", Value::Dict(subparam_map));
            for (key, map) in [
                ("subparam_widget_map", widget_map),
                ("subparam_keyword_map", keyword_map),
                ("subparam_unpacking_map", unpacking_map),
            ] {
                if !map.is_empty() {
                    push(key, Value::Dict(map));
                }
            }
        }
        NodeKind::Operator(op) => push("operation_id", Value::str(op.operator.id)),
        NodeKind::Proxy(proxy) => {
            push("title", Value::str(proxy.title.as_str()));
            push("source_name", Value::str(proxy.source_name.as_str()));
            push(
                "source_type_codename",
                proxy
                    .source_type_codename
                    .map_or(Value::None, |codename| Value::str(codename.as_str())),
            );
            if let ProxyPayload::Data(widget) = &proxy.payload {
                push("widget_data", widget.to_data());
            }
        }
    }
    Value::Dict(fields)
}
