//! Socket identifiers
//!
//! Sockets are addressed by value: the owning node id plus a key. Nothing
//! holds a pointer to a node, so removing a node only requires dropping the
//! ids that mention it.

use std::fmt;

use crate::nodes::NodeId;

/// Which input of a node a socket stands for
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InputKey {
    /// A parameter, or one subparameter of a variable parameter
    Param {
        name: String,
        subparam: Option<usize>,
    },
    /// The single input of a proxy node
    Proxy,
}

/// Input socket address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputSocketId {
    pub node_id: NodeId,
    pub key: InputKey,
}

impl InputSocketId {
    pub fn param(node_id: NodeId, name: &str) -> Self {
        Self {
            node_id,
            key: InputKey::Param {
                name: name.to_string(),
                subparam: None,
            },
        }
    }

    pub fn subparam(node_id: NodeId, name: &str, index: usize) -> Self {
        Self {
            node_id,
            key: InputKey::Param {
                name: name.to_string(),
                subparam: Some(index),
            },
        }
    }

    pub fn proxy(node_id: NodeId) -> Self {
        Self {
            node_id,
            key: InputKey::Proxy,
        }
    }

    pub fn param_name(&self) -> Option<&str> {
        match &self.key {
            InputKey::Param { name, .. } => Some(name),
            InputKey::Proxy => None,
        }
    }

    pub fn subparam_index(&self) -> Option<usize> {
        match &self.key {
            InputKey::Param { subparam, .. } => *subparam,
            InputKey::Proxy => None,
        }
    }

    pub fn is_proxy(&self) -> bool {
        self.key == InputKey::Proxy
    }
}

impl fmt::Display for InputSocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            InputKey::Param {
                name,
                subparam: Some(index),
            } => write!(f, "({}, {}, {})", self.node_id, name, index),
            InputKey::Param { name, subparam: None } => write!(f, "({}, {})", self.node_id, name),
            InputKey::Proxy => write!(f, "({}, <proxy>)", self.node_id),
        }
    }
}

/// Output socket address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputSocketId {
    pub node_id: NodeId,
    pub output_name: String,
}

impl OutputSocketId {
    pub fn new(node_id: NodeId, output_name: &str) -> Self {
        Self {
            node_id,
            output_name: output_name.to_string(),
        }
    }
}

impl fmt::Display for OutputSocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.node_id, self.output_name)
    }
}

/// Dummy socket on a variable parameter; connecting to it creates a subparameter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaceholderSocket {
    pub node_id: NodeId,
    pub param_name: String,
}

impl PlaceholderSocket {
    pub fn new(node_id: NodeId, param_name: &str) -> Self {
        Self {
            node_id,
            param_name: param_name.to_string(),
        }
    }
}

impl fmt::Display for PlaceholderSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, <placeholder>)", self.node_id, self.param_name)
    }
}

/// Child end of a new connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildSocket {
    Input(InputSocketId),
    Placeholder(PlaceholderSocket),
}

impl ChildSocket {
    pub fn node_id(&self) -> NodeId {
        match self {
            ChildSocket::Input(socket) => socket.node_id,
            ChildSocket::Placeholder(socket) => socket.node_id,
        }
    }
}

impl fmt::Display for ChildSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildSocket::Input(socket) => socket.fmt(f),
            ChildSocket::Placeholder(socket) => socket.fmt(f),
        }
    }
}

impl From<InputSocketId> for ChildSocket {
    fn from(socket: InputSocketId) -> Self {
        ChildSocket::Input(socket)
    }
}

impl From<PlaceholderSocket> for ChildSocket {
    fn from(socket: PlaceholderSocket) -> Self {
        ChildSocket::Placeholder(socket)
    }
}
