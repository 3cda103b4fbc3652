//! Callable definitions and the registries that hold them
//!
//! Every callable a node can wrap is described by a [`CallableDef`]: the
//! function itself, its declared signature, and what the Python exporter
//! needs to reproduce the call (import lines, call name or a substitution
//! template).

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::error::ValidationError;
use crate::export::template::SubstitutionTemplate;
use crate::literal::{CallArgs, CallError, CallableFn, CallableValue, Value};
use crate::nodes::cache::{SignatureCache, WidgetMetaCache};
use crate::nodes::node::{CallableNode, CallableSource, Node, NodeId, NodeKind};
use crate::nodes::signature::{SignatureDecl, SignatureRecord};
use crate::plugins::NodePackRegistry;

/// A callable usable by callable nodes
#[derive(Clone)]
pub struct CallableDef {
    /// Python name of the callable
    pub name: String,
    pub signature: SignatureDecl,
    func: Arc<CallableFn>,
    pub substitution: Option<SubstitutionTemplate>,
    pub stlib_import_text: Option<String>,
    pub third_party_import_text: Option<String>,
    /// Name used for exported calls; defaults to `name`
    pub call_format: Option<String>,
    /// Built-ins are reachable without any import
    pub needs_import: bool,
}

impl CallableDef {
    pub fn new<F>(name: &str, signature: SignatureDecl, func: F) -> Self
    where
        F: Fn(&CallArgs) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            signature,
            func: Arc::new(func),
            substitution: None,
            stlib_import_text: None,
            third_party_import_text: None,
            call_format: None,
            needs_import: true,
        }
    }

    /// A Python built-in: exported calls need no import
    pub fn builtin<F>(name: &str, signature: SignatureDecl, func: F) -> Self
    where
        F: Fn(&CallArgs) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        let mut def = Self::new(name, signature, func);
        def.needs_import = false;
        def
    }

    pub fn with_substitution(mut self, template: &str) -> Self {
        self.substitution = Some(SubstitutionTemplate::new(template));
        self
    }

    pub fn with_stlib_import(mut self, import_text: &str) -> Self {
        self.stlib_import_text = Some(import_text.to_string());
        self
    }

    pub fn with_third_party_import(mut self, import_text: &str) -> Self {
        self.third_party_import_text = Some(import_text.to_string());
        self
    }

    pub fn with_call_format(mut self, call_format: &str) -> Self {
        self.call_format = Some(call_format.to_string());
        self
    }

    /// Name written in exported calls
    pub fn call_name(&self) -> &str {
        self.call_format.as_deref().unwrap_or(&self.name)
    }

    /// Whether an exported call can reach the callable through an import
    pub fn is_importable(&self) -> bool {
        !self.needs_import
            || self.stlib_import_text.is_some()
            || self.third_party_import_text.is_some()
    }

    /// Whether the exporter can render nodes using this callable
    pub fn is_exportable(&self) -> bool {
        self.is_importable() || self.substitution.is_some()
    }

    pub fn call(&self, args: &CallArgs) -> Result<Value, CallError> {
        (self.func)(args)
    }

    /// The callable as a value, for nodes in callable mode
    pub fn callable_value(&self) -> CallableValue {
        CallableValue::from_shared(self.name.clone(), Arc::clone(&self.func))
    }
}

impl fmt::Debug for CallableDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableDef")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("substitution", &self.substitution)
            .field("stlib_import_text", &self.stlib_import_text)
            .field("third_party_import_text", &self.third_party_import_text)
            .field("call_format", &self.call_format)
            .finish_non_exhaustive()
    }
}

/// Fixed registries a node can pick its callable from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CallableKind {
    Builtin,
    Stdlib,
    Capsule,
    GenViewer,
    ThirdLib,
}

impl CallableKind {
    pub const ALL: [CallableKind; 5] = [
        CallableKind::Builtin,
        CallableKind::Stdlib,
        CallableKind::Capsule,
        CallableKind::GenViewer,
        CallableKind::ThirdLib,
    ];

    /// Document key holding the callable id of nodes of this kind
    pub fn id_key(&self) -> &'static str {
        match self {
            CallableKind::Builtin => "builtin_id",
            CallableKind::Stdlib => "stlib_id",
            CallableKind::Capsule => "capsule_id",
            CallableKind::GenViewer => "genviewer_id",
            CallableKind::ThirdLib => "third_lib_id",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CallableKind::Builtin => "builtin",
            CallableKind::Stdlib => "stlib",
            CallableKind::Capsule => "capsule",
            CallableKind::GenViewer => "genviewer",
            CallableKind::ThirdLib => "third_lib",
        }
    }
}

/// Callables keyed by string id, one table per [`CallableKind`]
#[derive(Debug, Clone, Default)]
pub struct CallableRegistry {
    tables: HashMap<CallableKind, BTreeMap<String, Arc<CallableDef>>>,
}

impl CallableRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the bundled built-ins, standard library callables,
    /// capsules and viewers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        super::library::register_defaults(&mut registry);
        registry
    }

    pub fn register(&mut self, kind: CallableKind, id: &str, def: CallableDef) {
        debug!("Registering {} callable '{}'", kind.label(), id);
        self.tables
            .entry(kind)
            .or_default()
            .insert(id.to_string(), Arc::new(def));
    }

    pub fn get(&self, kind: CallableKind, id: &str) -> Option<Arc<CallableDef>> {
        self.tables.get(&kind)?.get(id).cloned()
    }

    /// Registered ids of one kind, sorted
    pub fn ids(&self, kind: CallableKind) -> Vec<&str> {
        self.tables
            .get(&kind)
            .map(|table| table.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// Creates callable nodes from callable references, memoizing the signature
/// record and widget metadata of every callable it has seen
pub struct NodeFactory {
    pub callables: CallableRegistry,
    pub node_packs: NodePackRegistry,
    signatures: SignatureCache,
    widget_metas: WidgetMetaCache,
}

impl NodeFactory {
    pub fn new(callables: CallableRegistry, node_packs: NodePackRegistry) -> Self {
        Self {
            callables,
            node_packs,
            signatures: SignatureCache::new(),
            widget_metas: WidgetMetaCache::new(),
        }
    }

    pub fn callable_def(&self, source: &CallableSource) -> Option<Arc<CallableDef>> {
        match source {
            CallableSource::Script(script_id) => self.node_packs.script(script_id),
            CallableSource::Registry(kind, id) => self.callables.get(*kind, id),
        }
    }

    /// Builds a callable node with id `id` wrapping the referenced callable
    pub fn callable_node(&mut self, id: NodeId, source: CallableSource) -> Result<Node, ValidationError> {
        let def = self
            .callable_def(&source)
            .ok_or_else(|| ValidationError::UnknownCallableRef {
                node_id: id,
                reference: source.to_string(),
            })?;
        let key = source.cache_key();
        let signature = self
            .signatures
            .get_or_try_insert(&key, || SignatureRecord::from_decl(&def.name, &def.signature))?;
        let metas = self.widget_metas.metas_for(&key, &signature)?;
        let payload = CallableNode::with_widget_metas(source, def, signature, &metas)?;
        Ok(Node::new(id, NodeKind::Callable(payload)))
    }

    /// Number of callables whose signature has been resolved
    pub fn cached_signatures(&self) -> usize {
        self.signatures.len()
    }
}

impl Default for NodeFactory {
    fn default() -> Self {
        Self::new(CallableRegistry::with_defaults(), NodePackRegistry::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::signature::ParamDecl;

    #[test]
    fn test_register_and_call() {
        let mut registry = CallableRegistry::new();
        let def = CallableDef::new(
            "double",
            SignatureDecl::new(vec![ParamDecl::positional("x")]),
            |args| {
                let x = args.require(0, "x")?.as_int().unwrap_or(0);
                Ok(Value::Int(x * 2))
            },
        )
        .with_third_party_import("from doubling import double");
        registry.register(CallableKind::ThirdLib, "doubling.double", def);

        let def = registry.get(CallableKind::ThirdLib, "doubling.double").unwrap();
        let result = def.call(&CallArgs::positional(vec![Value::Int(4)])).unwrap();
        assert_eq!(result, Value::Int(8));
        assert!(def.is_importable());
        assert!(registry.get(CallableKind::Builtin, "doubling.double").is_none());
    }

    #[test]
    fn test_exportability() {
        let plain = CallableDef::new("f", SignatureDecl::default(), |_| Ok(Value::None));
        assert!(!plain.is_exportable());
        let templated = plain.clone().with_substitution("None");
        assert!(templated.is_exportable());
        assert!(!templated.is_importable());
        let builtin = CallableDef::builtin("g", SignatureDecl::default(), |_| Ok(Value::None));
        assert!(builtin.is_importable());
        assert_eq!(builtin.call_name(), "g");
    }

    #[test]
    fn test_defaults_present() {
        let registry = CallableRegistry::with_defaults();
        for id in ["print", "len", "sorted", "range"] {
            assert!(registry.get(CallableKind::Builtin, id).is_some(), "{}", id);
        }
        assert!(registry.get(CallableKind::Stdlib, "math.sqrt").is_some());
        assert!(registry.get(CallableKind::Capsule, "tuple_from_args").is_some());
        assert!(registry.get(CallableKind::GenViewer, "view_repr").is_some());
    }

    #[test]
    fn test_callable_value_shares_function() {
        let def = CallableDef::new("f", SignatureDecl::default(), |_| Ok(Value::Int(1)));
        let first = def.callable_value();
        let second = def.callable_value();
        assert_eq!(first, second);
        assert_eq!(first.call(&CallArgs::new()).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_factory_caches_signatures() {
        let mut factory = NodeFactory::new(CallableRegistry::with_defaults(), NodePackRegistry::with_search_dirs(Vec::new()));
        let source = CallableSource::Registry(CallableKind::Builtin, "sorted".to_string());
        let first = factory.callable_node(1, source.clone()).unwrap();
        let second = factory.callable_node(2, source).unwrap();
        assert_eq!(factory.cached_signatures(), 1);
        assert!(Arc::ptr_eq(
            &first.as_callable().unwrap().signature,
            &second.as_callable().unwrap().signature
        ));
        assert!(second.widget("reverse", None).is_some());

        let unknown = CallableSource::Registry(CallableKind::Builtin, "nope".to_string());
        assert!(matches!(
            factory.callable_node(3, unknown),
            Err(ValidationError::UnknownCallableRef { node_id: 3, .. })
        ));
    }
}
