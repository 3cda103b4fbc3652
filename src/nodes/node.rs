//! Node types and core node functionality
//!
//! Every node shares a header (id, position, mode, commented-out flag) and
//! carries a variant payload: a callable from a node pack or a fixed
//! registry, a Python operator, or a proxy (data or redirect) node. Sockets
//! are derived from the payload on demand; the graph only stores ids.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use glam::IVec2;

use crate::error::{GraphError, ValidationError};
use crate::literal::Value;
use crate::nodes::factory::{CallableDef, CallableKind};
use crate::nodes::operator::{self, OperatorDef, OPERATION_OUTPUT_NAME};
use crate::nodes::port::{InputKey, InputSocketId, OutputSocketId, PlaceholderSocket};
use crate::nodes::signature::{is_identifier, ParamKind, SignatureRecord};
use crate::nodes::types::{PyType, TypeCodename, TypeHint};
use crate::nodes::widgets::{resolve_signature_widgets, Widget, WidgetMeta};

/// Unique identifier for a node
pub type NodeId = usize;

/// Which sockets a node exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeMode {
    #[default]
    ExpandedSignature,
    /// Same sockets as the expanded signature; only the body layout differs
    CollapsedSignature,
    /// No inputs; the single output holds the callable itself
    Callable,
}

impl NodeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeMode::ExpandedSignature => "expanded_signature",
            NodeMode::CollapsedSignature => "collapsed_signature",
            NodeMode::Callable => "callable",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "expanded_signature" => Some(NodeMode::ExpandedSignature),
            "collapsed_signature" => Some(NodeMode::CollapsedSignature),
            "callable" => Some(NodeMode::Callable),
            _ => None,
        }
    }
}

impl fmt::Display for NodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable id of a node-pack callable: `(pack, category, script)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptId {
    pub pack: String,
    pub category: String,
    pub script: String,
}

impl ScriptId {
    pub fn new(pack: &str, category: &str, script: &str) -> Self {
        Self {
            pack: pack.to_string(),
            category: category.to_string(),
            script: script.to_string(),
        }
    }

    /// Document form: a tuple of three strings
    pub fn to_value(&self) -> Value {
        Value::Tuple(vec![
            Value::str(self.pack.as_str()),
            Value::str(self.category.as_str()),
            Value::str(self.script.as_str()),
        ])
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value.as_sequence()? {
            [Value::Str(pack), Value::Str(category), Value::Str(script)] => {
                Some(Self::new(pack, category, script))
            }
            _ => None,
        }
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.pack, self.category, self.script)
    }
}

/// Where the callable of a callable node comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallableSource {
    Script(ScriptId),
    Registry(CallableKind, String),
}

impl CallableSource {
    /// Key under which the callable's signature record is memoized
    pub fn cache_key(&self) -> String {
        match self {
            CallableSource::Script(script_id) => format!("script:{}", script_id),
            CallableSource::Registry(kind, id) => format!("{}:{}", kind.label(), id),
        }
    }
}

impl fmt::Display for CallableSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallableSource::Script(script_id) => write!(f, "script_id {}", script_id),
            CallableSource::Registry(kind, id) => write!(f, "{} '{}'", kind.id_key(), id),
        }
    }
}

/// One argument slot of a variable parameter
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Subparameter {
    pub widget: Option<Widget>,
    /// Keyword under which the value is passed (`**kwargs` only)
    pub keyword: Option<String>,
    /// Splat the value (`*value` or `**value`)
    pub unpacking: bool,
}

/// Payload of nodes wrapping a callable
#[derive(Debug, Clone)]
pub struct CallableNode {
    pub source: CallableSource,
    pub def: Arc<CallableDef>,
    pub signature: Arc<SignatureRecord>,
    pub param_widgets: BTreeMap<String, Widget>,
    pub subparams: BTreeMap<String, Vec<Subparameter>>,
}

impl CallableNode {
    /// Builds the payload, giving every parameter with a default its widget
    pub fn new(
        source: CallableSource,
        def: Arc<CallableDef>,
        signature: Arc<SignatureRecord>,
    ) -> Result<Self, ValidationError> {
        let metas = resolve_signature_widgets(&signature)?;
        Self::with_widget_metas(source, def, signature, &metas)
    }

    /// Builds the payload from already resolved widget metadata
    pub fn with_widget_metas(
        source: CallableSource,
        def: Arc<CallableDef>,
        signature: Arc<SignatureRecord>,
        metas: &BTreeMap<String, WidgetMeta>,
    ) -> Result<Self, ValidationError> {
        let mut param_widgets = BTreeMap::new();
        for (param, meta) in metas {
            let widget = Widget::from_meta(meta).map_err(|err| ValidationError::InvalidWidgetAnnotation {
                param: param.clone(),
                reason: err.to_string(),
            })?;
            param_widgets.insert(param.clone(), widget);
        }
        let subparams = signature
            .variable_parameters()
            .map(|param| (param.name.clone(), Vec::new()))
            .collect();
        Ok(Self {
            source,
            def,
            signature,
            param_widgets,
            subparams,
        })
    }

    pub fn param_kind(&self, param: &str) -> Option<ParamKind> {
        self.signature.parameter(param).map(|p| p.kind)
    }

    /// Subparameters of a variable parameter, in index order
    pub fn subparams(&self, param: &str) -> &[Subparameter] {
        self.subparams.get(param).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn subparam(&self, param: &str, index: usize) -> Option<&Subparameter> {
        self.subparams.get(param)?.get(index)
    }

    fn subparam_mut(&mut self, param: &str, index: usize) -> Result<&mut Subparameter, GraphError> {
        self.subparams
            .get_mut(param)
            .and_then(|subparams| subparams.get_mut(index))
            .ok_or_else(|| GraphError::SocketNotFound(format!("({}, {})", param, index)))
    }

    /// Smallest `key_<n>` keyword not used by another subparameter of `param`
    pub fn next_keyword(&self, param: &str) -> String {
        let used: Vec<&str> = self
            .subparams(param)
            .iter()
            .filter_map(|sub| sub.keyword.as_deref())
            .collect();
        (0..)
            .map(|n| format!("key_{}", n))
            .find(|candidate| !used.contains(&candidate.as_str()))
            .unwrap_or_default()
    }

    /// Appends a subparameter and returns its index
    pub fn add_subparam(&mut self, param: &str, widget: Option<Widget>) -> Result<usize, GraphError> {
        let kind = self.param_kind(param);
        if !kind.is_some_and(|kind| kind.is_variable()) {
            return Err(GraphError::SocketNotFound(format!("variable parameter '{}'", param)));
        }
        let keyword = (kind == Some(ParamKind::VarKeyword)).then(|| self.next_keyword(param));
        let subparams = self.subparams.entry(param.to_string()).or_default();
        subparams.push(Subparameter {
            widget,
            keyword,
            unpacking: false,
        });
        Ok(subparams.len() - 1)
    }

    /// Removes a subparameter; later indices shift down by one
    pub fn remove_subparam(&mut self, param: &str, index: usize) -> Option<Subparameter> {
        let subparams = self.subparams.get_mut(param)?;
        (index < subparams.len()).then(|| subparams.remove(index))
    }

    /// Renames the keyword of a `**kwargs` subparameter
    pub fn set_keyword(&mut self, param: &str, index: usize, keyword: &str) -> Result<(), GraphError> {
        let invalid = || GraphError::InvalidKeyword {
            param: param.to_string(),
            keyword: keyword.to_string(),
        };
        if self.param_kind(param) != Some(ParamKind::VarKeyword) || !is_identifier(keyword) {
            return Err(invalid());
        }
        let taken = self
            .subparams(param)
            .iter()
            .enumerate()
            .any(|(other, sub)| other != index && sub.keyword.as_deref() == Some(keyword));
        let subparam = self.subparam_mut(param, index)?;
        if taken || subparam.unpacking {
            return Err(invalid());
        }
        subparam.keyword = Some(keyword.to_string());
        Ok(())
    }

    /// Marks a subparameter for unpacking; on `**kwargs` this drops its
    /// keyword, and unmarking assigns a fresh one
    pub fn set_unpacking(&mut self, param: &str, index: usize, unpacking: bool) -> Result<(), GraphError> {
        let is_keyword_param = self.param_kind(param) == Some(ParamKind::VarKeyword);
        let fresh_keyword = self.next_keyword(param);
        let subparam = self.subparam_mut(param, index)?;
        if subparam.unpacking == unpacking {
            return Ok(());
        }
        subparam.unpacking = unpacking;
        if is_keyword_param {
            subparam.keyword = if unpacking { None } else { Some(fresh_keyword) };
        }
        Ok(())
    }
}

/// Payload of operator nodes
#[derive(Debug, Clone)]
pub struct OperatorNode {
    pub operator: &'static OperatorDef,
    pub signature: Arc<SignatureRecord>,
}

/// What a proxy node outputs
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyPayload {
    /// Data node: the widget value
    Data(Widget),
    /// Redirect node: whatever reaches its proxy socket
    Redirect,
}

/// Payload of proxy nodes
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyNode {
    /// User-editable; also the name of the output socket
    pub title: String,
    /// Label of the proxy socket
    pub source_name: String,
    /// Codename mirrored from the upstream socket
    pub source_type_codename: Option<TypeCodename>,
    pub payload: ProxyPayload,
}

impl ProxyNode {
    pub fn widget(&self) -> Option<&Widget> {
        match &self.payload {
            ProxyPayload::Data(widget) => Some(widget),
            ProxyPayload::Redirect => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Callable(CallableNode),
    Operator(OperatorNode),
    Proxy(ProxyNode),
}

/// A node placed on the canvas
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    /// Middle of the node's top edge, in canvas coordinates
    pub position: IVec2,
    pub commented_out: bool,
    pub mode: NodeMode,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            position: IVec2::ZERO,
            commented_out: false,
            mode: NodeMode::default(),
            kind,
        }
    }

    pub fn with_position(mut self, position: IVec2) -> Self {
        self.position = position;
        self
    }

    /// Creates an operator node from an operator id such as `"a + b"`
    pub fn operator(id: NodeId, operation_id: &str) -> Result<Self, ValidationError> {
        let operator = operator::operator(operation_id).ok_or_else(|| {
            ValidationError::UnknownCallableRef {
                node_id: id,
                reference: format!("operation_id '{}'", operation_id),
            }
        })?;
        Ok(Self::new(
            id,
            NodeKind::Operator(OperatorNode {
                operator,
                signature: operator.signature(),
            }),
        ))
    }

    /// Creates a data node holding `widget`
    pub fn data(id: NodeId, title: &str, widget: Widget) -> Self {
        let codename = widget.expected_type().codename();
        Self::new(
            id,
            NodeKind::Proxy(ProxyNode {
                title: title.to_string(),
                source_name: title.to_string(),
                source_type_codename: Some(codename),
                payload: ProxyPayload::Data(widget),
            }),
        )
    }

    /// Creates a redirect node
    pub fn redirect(id: NodeId, title: &str) -> Self {
        Self::new(
            id,
            NodeKind::Proxy(ProxyNode {
                title: title.to_string(),
                source_name: title.to_string(),
                source_type_codename: None,
                payload: ProxyPayload::Redirect,
            }),
        )
    }

    pub fn as_callable(&self) -> Option<&CallableNode> {
        match &self.kind {
            NodeKind::Callable(callable) => Some(callable),
            _ => None,
        }
    }

    pub fn as_callable_mut(&mut self) -> Option<&mut CallableNode> {
        match &mut self.kind {
            NodeKind::Callable(callable) => Some(callable),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&ProxyNode> {
        match &self.kind {
            NodeKind::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    pub fn as_proxy_mut(&mut self) -> Option<&mut ProxyNode> {
        match &mut self.kind {
            NodeKind::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(
            &self.kind,
            NodeKind::Proxy(ProxyNode {
                payload: ProxyPayload::Redirect,
                ..
            })
        )
    }

    pub fn title_text(&self) -> String {
        match &self.kind {
            NodeKind::Callable(callable) => match &callable.source {
                CallableSource::Registry(_, id) => id.clone(),
                CallableSource::Script(_) => callable.def.name.clone(),
            },
            NodeKind::Operator(op) => op.operator.id.to_string(),
            NodeKind::Proxy(proxy) => proxy.title.clone(),
        }
    }

    /// Signature record; proxies have none
    pub fn signature(&self) -> Option<&SignatureRecord> {
        match &self.kind {
            NodeKind::Callable(callable) => Some(&callable.signature),
            NodeKind::Operator(op) => Some(&op.signature),
            NodeKind::Proxy(_) => None,
        }
    }

    /// Whether the node may be switched to `mode`
    pub fn supports_mode(&self, mode: NodeMode) -> bool {
        match self.kind {
            NodeKind::Proxy(_) => mode == NodeMode::ExpandedSignature,
            _ => true,
        }
    }

    /// Applies a mode change; the graph severs connections beforehand
    pub fn on_mode_change(&mut self, mode: NodeMode) {
        self.mode = mode;
    }

    /// Input sockets in signature order, subparameters flattened in index order
    pub fn input_sockets(&self) -> Vec<InputSocketId> {
        if self.mode == NodeMode::Callable {
            return Vec::new();
        }
        match &self.kind {
            NodeKind::Callable(callable) => callable
                .signature
                .parameters
                .iter()
                .flat_map(|param| {
                    if param.kind.is_variable() {
                        (0..callable.subparams(&param.name).len())
                            .map(|index| InputSocketId::subparam(self.id, &param.name, index))
                            .collect()
                    } else {
                        vec![InputSocketId::param(self.id, &param.name)]
                    }
                })
                .collect(),
            NodeKind::Operator(op) => op
                .operator
                .params()
                .iter()
                .map(|name| InputSocketId::param(self.id, name))
                .collect(),
            NodeKind::Proxy(proxy) => match proxy.payload {
                ProxyPayload::Redirect => vec![InputSocketId::proxy(self.id)],
                ProxyPayload::Data(_) => Vec::new(),
            },
        }
    }

    /// Placeholder sockets, one per variable parameter
    pub fn placeholder_sockets(&self) -> Vec<PlaceholderSocket> {
        if self.mode == NodeMode::Callable {
            return Vec::new();
        }
        match &self.kind {
            NodeKind::Callable(callable) => callable
                .signature
                .variable_parameters()
                .map(|param| PlaceholderSocket::new(self.id, &param.name))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Name of the single output exposed in callable mode
    pub fn callable_output_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Callable(callable) => Some(&callable.def.name),
            NodeKind::Operator(_) => Some(OPERATION_OUTPUT_NAME),
            NodeKind::Proxy(_) => None,
        }
    }

    /// Output sockets in signature order
    pub fn output_sockets(&self) -> Vec<OutputSocketId> {
        if self.mode == NodeMode::Callable {
            return self
                .callable_output_name()
                .map(|name| vec![OutputSocketId::new(self.id, name)])
                .unwrap_or_default();
        }
        match &self.kind {
            NodeKind::Proxy(proxy) => vec![OutputSocketId::new(self.id, &proxy.title)],
            _ => self
                .signature()
                .map(|signature| {
                    signature
                        .outputs
                        .iter()
                        .map(|output| OutputSocketId::new(self.id, &output.name))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn has_input_socket(&self, socket: &InputSocketId) -> bool {
        socket.node_id == self.id && self.input_sockets().contains(socket)
    }

    pub fn has_output_socket(&self, socket: &OutputSocketId) -> bool {
        socket.node_id == self.id && self.output_sockets().contains(socket)
    }

    pub fn has_placeholder(&self, socket: &PlaceholderSocket) -> bool {
        socket.node_id == self.id && self.placeholder_sockets().contains(socket)
    }

    /// Widget embedded in a parameter or subparameter socket
    pub fn widget(&self, param: &str, subparam: Option<usize>) -> Option<&Widget> {
        let callable = self.as_callable()?;
        match subparam {
            Some(index) => callable.subparam(param, index)?.widget.as_ref(),
            None => callable.param_widgets.get(param),
        }
    }

    /// Value used for a socket with no parent
    pub fn widget_value(&self, param: &str, subparam: Option<usize>) -> Option<&Value> {
        self.widget(param, subparam).map(Widget::get)
    }

    /// Sets the value of an embedded widget, or of the widget of a data node
    /// when `param` is `None`
    pub fn set_widget_value(
        &mut self,
        param: Option<&str>,
        subparam: Option<usize>,
        value: Value,
    ) -> Result<(), GraphError> {
        let node_id = self.id;
        let missing = || GraphError::SocketNotFound(format!("widget of node {}", node_id));
        let widget = match (&mut self.kind, param) {
            (NodeKind::Proxy(proxy), None) => match &mut proxy.payload {
                ProxyPayload::Data(widget) => widget,
                ProxyPayload::Redirect => return Err(missing()),
            },
            (NodeKind::Callable(callable), Some(param)) => match subparam {
                Some(index) => callable
                    .subparams
                    .get_mut(param)
                    .and_then(|subparams| subparams.get_mut(index))
                    .and_then(|sub| sub.widget.as_mut())
                    .ok_or_else(missing)?,
                None => callable.param_widgets.get_mut(param).ok_or_else(missing)?,
            },
            _ => return Err(missing()),
        };
        widget.set(value)
    }

    /// Type codename shown on an output socket
    pub fn output_type_codename(&self, output_name: &str) -> TypeCodename {
        if self.mode == NodeMode::Callable {
            return TypeHint::of(PyType::Callable).codename();
        }
        match &self.kind {
            NodeKind::Proxy(proxy) => proxy
                .source_type_codename
                .unwrap_or(TypeCodename::NotSpecified),
            _ => self
                .signature()
                .and_then(|signature| signature.output(output_name))
                .map(|output| output.type_hint.codename())
                .unwrap_or(TypeCodename::NotSpecified),
        }
    }

    /// Type codename shown on an input socket
    pub fn input_type_codename(&self, socket: &InputSocketId) -> TypeCodename {
        match (&socket.key, &self.kind) {
            (InputKey::Proxy, NodeKind::Proxy(proxy)) => proxy
                .source_type_codename
                .unwrap_or(TypeCodename::NotSpecified),
            (InputKey::Param { name, .. }, _) => self
                .signature()
                .and_then(|signature| signature.parameter(name))
                .map(|param| param.type_hint.codename())
                .unwrap_or(TypeCodename::NotSpecified),
            _ => TypeCodename::NotSpecified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::factory::CallableRegistry;

    fn registry_node(id: NodeId, kind: CallableKind, name: &str) -> Node {
        crate::nodes::test_support::registry_node(&CallableRegistry::with_defaults(), id, kind, name)
    }

    #[test]
    fn test_sockets_follow_signature_order() {
        let mut node = registry_node(1, CallableKind::Builtin, "print");
        assert!(node.input_sockets().iter().all(|s| s.param_name() != Some("objects")));
        node.as_callable_mut().unwrap().add_subparam("objects", None).unwrap();
        node.as_callable_mut().unwrap().add_subparam("objects", None).unwrap();

        let names: Vec<String> = node.input_sockets().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, ["(1, objects, 0)", "(1, objects, 1)", "(1, sep)", "(1, end)"]);
        assert_eq!(node.placeholder_sockets().len(), 1);
        assert_eq!(node.output_sockets(), [OutputSocketId::new(1, "output")]);
    }

    #[test]
    fn test_widgets_from_defaults() {
        let node = registry_node(1, CallableKind::Builtin, "print");
        assert_eq!(node.widget_value("sep", None), Some(&Value::str(" ")));
        assert_eq!(node.widget("sep", None).unwrap().name(), "string_entry");
        assert!(node.widget_value("objects", Some(0)).is_none());
    }

    #[test]
    fn test_callable_mode_sockets() {
        let mut node = Node::operator(4, "a + b").unwrap();
        assert_eq!(node.input_sockets().len(), 2);
        node.on_mode_change(NodeMode::Callable);
        assert!(node.input_sockets().is_empty());
        assert_eq!(node.output_sockets(), [OutputSocketId::new(4, "operation")]);

        let mut printer = registry_node(2, CallableKind::Builtin, "print");
        printer.on_mode_change(NodeMode::Callable);
        assert_eq!(printer.output_sockets(), [OutputSocketId::new(2, "print")]);
    }

    #[test]
    fn test_keyword_subparams() {
        let mut node = registry_node(3, CallableKind::Capsule, "dict_from_kwargs");
        let callable = node.as_callable_mut().unwrap();
        assert_eq!(callable.add_subparam("kwargs", None).unwrap(), 0);
        assert_eq!(callable.add_subparam("kwargs", None).unwrap(), 1);
        assert_eq!(callable.subparams("kwargs")[1].keyword.as_deref(), Some("key_1"));

        assert!(callable.set_keyword("kwargs", 1, "key_0").is_err());
        assert!(callable.set_keyword("kwargs", 1, "not valid").is_err());
        callable.set_keyword("kwargs", 1, "alpha").unwrap();

        callable.set_unpacking("kwargs", 0, true).unwrap();
        assert_eq!(callable.subparams("kwargs")[0].keyword, None);
        assert!(callable.set_keyword("kwargs", 0, "beta").is_err());
        callable.set_unpacking("kwargs", 0, false).unwrap();
        assert_eq!(callable.subparams("kwargs")[0].keyword.as_deref(), Some("key_0"));
    }

    #[test]
    fn test_remove_subparam_compacts() {
        let mut node = registry_node(3, CallableKind::Capsule, "tuple_from_args");
        let callable = node.as_callable_mut().unwrap();
        for value in 0..3 {
            let widget = Widget::literal_entry(Value::Int(value)).unwrap();
            callable.add_subparam("args", Some(widget)).unwrap();
        }
        callable.remove_subparam("args", 1).unwrap();
        assert_eq!(node.widget_value("args", Some(1)), Some(&Value::Int(2)));
        assert!(node.widget_value("args", Some(2)).is_none());
    }

    #[test]
    fn test_operator_nodes_share_signature() {
        let first = Node::operator(1, "a * b").unwrap();
        let second = Node::operator(2, "a * b").unwrap();
        assert!(std::ptr::eq(first.signature().unwrap(), second.signature().unwrap()));
        assert!(Node::operator(3, "a ** c").is_err());
    }

    #[test]
    fn test_proxy_nodes() {
        let data = Node::data(5, "number", Widget::literal_entry(Value::Int(3)).unwrap());
        assert!(data.input_sockets().is_empty());
        assert_eq!(data.output_sockets(), [OutputSocketId::new(5, "number")]);
        assert!(!data.supports_mode(NodeMode::Callable));

        let redirect = Node::redirect(6, "relay");
        assert!(redirect.is_redirect());
        assert_eq!(redirect.input_sockets(), [InputSocketId::proxy(6)]);
        assert_eq!(redirect.output_type_codename("relay"), TypeCodename::NotSpecified);
    }

    #[test]
    fn test_set_widget_value() {
        let mut data = Node::data(5, "n", Widget::literal_entry(Value::Int(3)).unwrap());
        data.set_widget_value(None, None, Value::Int(9)).unwrap();
        assert_eq!(data.as_proxy().unwrap().widget().unwrap().get(), &Value::Int(9));

        let mut node = registry_node(1, CallableKind::Builtin, "sorted");
        assert!(node.set_widget_value(Some("reverse"), None, Value::str("yes")).is_err());
        node.set_widget_value(Some("reverse"), None, Value::Bool(true)).unwrap();
        assert_eq!(node.widget_value("reverse", None), Some(&Value::Bool(true)));
    }
}
