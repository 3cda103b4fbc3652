//! Node system - graph model, callables and execution

// Core node system modules
pub mod cache;
pub mod execution_engine;
pub mod factory;
pub mod graph;
pub mod hooks;
pub mod node;
pub mod operations;
pub mod port;
pub mod widgets;

// Callable descriptions
pub mod library;
pub mod operator;
pub mod presets;
pub mod signature;
pub mod types;

// Re-export core types
pub use graph::{NodeGraph, SelectedObj, TextBlock};
pub use node::{
    CallableNode, CallableSource, Node, NodeId, NodeKind, NodeMode, OperatorNode, ProxyNode,
    ProxyPayload, ScriptId, Subparameter,
};
pub use port::{ChildSocket, InputKey, InputSocketId, OutputSocketId, PlaceholderSocket};

// Re-export callable types
pub use factory::{CallableDef, CallableKind, CallableRegistry, NodeFactory};
pub use operator::{operator, OperatorDef};
pub use signature::{Annotation, ParamDecl, ParamKind, SignatureDecl, SignatureRecord};
pub use types::{PyType, TypeCodename, TypeHint};
pub use widgets::{Widget, WidgetMeta};

// Re-export execution engine types
pub use execution_engine::{CancelHandle, ExecutionEngine, ExecutionReport, NodeState};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use super::*;

    /// Node wrapping a registered callable; panics when `name` is unknown
    pub fn registry_node(registry: &CallableRegistry, id: NodeId, kind: CallableKind, name: &str) -> Node {
        let def = registry.get(kind, name).unwrap();
        let signature = Arc::new(SignatureRecord::from_decl(name, &def.signature).unwrap());
        let payload = CallableNode::new(CallableSource::Registry(kind, name.to_string()), def, signature).unwrap();
        Node::new(id, NodeKind::Callable(payload))
    }
}
